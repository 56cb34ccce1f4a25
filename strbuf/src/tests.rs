/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Unit tests for the growth funnel. The exact capacity sequences of the
//! policy are pinned here; behavioral coverage of the public API lives in
//! the integration suite.

use crate::{AllocError, DEFAULT_GROW_BY, MIN_FIRST_ALLOC, StrBuf};

/// The byte at `len` must always be a NUL terminator.
fn assert_terminated(buf: &StrBuf) {
    let ptr = buf.data.expect("buffer should be allocated");
    // SAFETY: `len + 1 <= capacity` whenever the allocation is present.
    let terminator = unsafe { ptr.as_ptr().add(buf.len).read() };
    assert_eq!(terminator, 0);
}

#[test]
fn first_allocation_has_a_floor() {
    let mut buf = StrBuf::new();
    assert_eq!(buf.capacity(), 0);

    buf.append("x").unwrap();
    assert_eq!(buf.capacity(), MIN_FIRST_ALLOC);
    assert_eq!(buf.len(), 1);
    assert_terminated(&buf);
}

#[test]
fn first_allocation_fits_large_content_exactly() {
    let mut buf = StrBuf::new();
    let text = "a".repeat(200);

    buf.append(&text).unwrap();
    // Sized directly as `incoming + 1`, not by the growth increment.
    assert_eq!(buf.capacity(), 201);
    assert_eq!(buf.len(), 200);
    assert_terminated(&buf);
}

#[test]
fn appending_nothing_still_allocates_the_floor() {
    let mut buf = StrBuf::new();
    assert_eq!(buf.append("").unwrap(), 0);
    assert_eq!(buf.capacity(), MIN_FIRST_ALLOC);
    assert_eq!(buf.len(), 0);
    assert_terminated(&buf);
}

#[test]
fn growth_from_empty_reserves_the_terminator_slot() {
    // A pre-reserved buffer of 1 byte has no terminator slot to reuse, so
    // the increment gains one extra byte.
    let mut buf = StrBuf::with_capacity(1);
    buf.append("x").unwrap();
    assert_eq!(buf.capacity(), 1 + DEFAULT_GROW_BY + 1);
    assert_eq!(buf.len(), 1);
    assert_terminated(&buf);
}

#[test]
fn growth_with_content_reuses_the_terminator_slot() {
    let mut buf = StrBuf::with_capacity(4);
    buf.append("ab").unwrap();
    assert_eq!(buf.capacity(), 4);

    buf.append("cd").unwrap();
    assert_eq!(buf.capacity(), 4 + DEFAULT_GROW_BY);
    assert_eq!(buf.as_str(), "abcd");
    assert_terminated(&buf);
}

#[test]
fn incoming_larger_than_increment_sizes_the_growth() {
    let mut buf = StrBuf::with_capacity(10);
    let text = "b".repeat(5000);

    buf.append(&text).unwrap();
    // max(1024, 5000) plus the extra terminator byte for an empty buffer.
    assert_eq!(buf.capacity(), 10 + 5000 + 1);
    assert_eq!(buf.len(), 5000);
}

#[test]
fn incoming_larger_than_increment_with_existing_content() {
    let mut buf = StrBuf::new();
    buf.append("ab").unwrap();
    assert_eq!(buf.capacity(), MIN_FIRST_ALLOC);

    let text = "c".repeat(5000);
    buf.append(&text).unwrap();
    assert_eq!(buf.capacity(), MIN_FIRST_ALLOC + 5000);
    assert_eq!(buf.len(), 5002);
    assert_terminated(&buf);
}

#[test]
fn custom_increment_governs_growth() {
    let mut buf = StrBuf::with_capacity(8);
    buf.set_grow_by(16);

    buf.append("0123456789").unwrap();
    assert_eq!(buf.capacity(), 8 + 16 + 1);
    assert_eq!(buf.as_str(), "0123456789");
}

#[test]
fn zero_increment_falls_back_to_the_default() {
    let mut buf = StrBuf::with_capacity(1);
    buf.set_grow_by(0);

    buf.append("x").unwrap();
    assert_eq!(buf.capacity(), 1 + DEFAULT_GROW_BY + 1);
}

#[test]
fn fitting_append_is_a_no_op_for_capacity() {
    let mut buf = StrBuf::with_capacity(64);
    buf.append("abc").unwrap();
    buf.append("def").unwrap();
    assert_eq!(buf.capacity(), 64);
    assert_eq!(buf.as_str(), "abcdef");
    assert_terminated(&buf);
}

#[test]
fn append_returns_the_cumulative_length() {
    let mut buf = StrBuf::new();
    assert_eq!(buf.append("ab").unwrap(), 2);
    assert_eq!(buf.append("cde").unwrap(), 5);
    assert_eq!(buf.append("").unwrap(), 5);
    assert_eq!(buf.append("f").unwrap(), 6);
}

#[test]
fn reserving_a_ridiculous_size_reports_overflow() {
    let mut buf = StrBuf::new();
    assert_eq!(
        buf.reserve(usize::MAX).unwrap_err(),
        AllocError::CapacityOverflow
    );

    buf.append("abc").unwrap();
    assert_eq!(
        buf.reserve(usize::MAX - 1).unwrap_err(),
        AllocError::CapacityOverflow
    );
    // The failed reservation left the buffer intact.
    assert_eq!(buf.as_str(), "abc");
    assert_eq!(buf.capacity(), MIN_FIRST_ALLOC);
}

#[test]
fn content_survives_repeated_reallocation() {
    let mut buf = StrBuf::with_capacity(4);
    buf.set_grow_by(8);
    let mut expected = String::new();

    for i in 0..64 {
        let fragment = format!("<{i}>");
        expected.push_str(&fragment);
        buf.append(&fragment).unwrap();
        assert_eq!(buf.as_str(), expected);
        assert_terminated(&buf);
    }
}

#[test]
fn capacity_never_decreases() {
    let mut buf = StrBuf::new();
    let mut last = 0;

    for i in 0..200 {
        buf.append(&"x".repeat(i % 37)).unwrap();
        assert!(buf.capacity() >= last);
        last = buf.capacity();
    }
}

#[test]
fn bounded_format_grows_against_the_estimate() {
    let mut buf = StrBuf::with_capacity(2);
    // Estimate larger than the output: growth is sized by the estimate.
    buf.append_format_bounded(2000, format_args!("{}", "hi"))
        .unwrap();
    assert_eq!(buf.capacity(), 2 + 2000 + 1);
    assert_eq!(buf.as_str(), "hi");
    assert_terminated(&buf);
}

#[test]
fn format_append_measures_exactly() {
    let mut buf = StrBuf::new();
    let text = "z".repeat(300);

    buf.append_format(format_args!("{text}")).unwrap();
    // First allocation sized by the measured length, not the estimate-free
    // floor.
    assert_eq!(buf.capacity(), 301);
    assert_eq!(buf.len(), 300);
    assert_terminated(&buf);
}
