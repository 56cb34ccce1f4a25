/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! Internal [`fmt::Write`] adapters used by the formatted-append paths.

use std::fmt;

/// Measures the exact byte length of a formatted write without storing it.
#[derive(Default)]
pub(crate) struct LenCounter(pub(crate) usize);

impl fmt::Write for LenCounter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0 += s.len();
        Ok(())
    }
}

/// Writes formatted output into a destination slice sized for the exact
/// measured length.
///
/// A well-behaved `Display` implementation produces the same output on both
/// passes and never hits the bound. One that produces more on the second pass
/// is cut at the destination size (on a `char` boundary) and the formatting
/// machinery stops at the resulting error.
pub(crate) struct TailWriter<'a> {
    dest: &'a mut [u8],
    pub(crate) written: usize,
}

impl<'a> TailWriter<'a> {
    pub(crate) fn new(dest: &'a mut [u8]) -> Self {
        Self { dest, written: 0 }
    }
}

impl fmt::Write for TailWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.dest.len() - self.written;
        if s.len() > room {
            let cut = floor_char_boundary(s, room);
            self.dest[self.written..self.written + cut].copy_from_slice(&s.as_bytes()[..cut]);
            self.written += cut;
            return Err(fmt::Error);
        }
        self.dest[self.written..self.written + s.len()].copy_from_slice(s.as_bytes());
        self.written += s.len();
        Ok(())
    }
}

/// Writes at most the destination's size while counting the full length the
/// formatter wanted to produce.
///
/// Once a fragment does not fit in full, the writer closes: the stored bytes
/// stay a prefix (cut on a `char` boundary) of the formatted output, while
/// `wanted` keeps accumulating. `write_str` never reports an error, so the
/// formatting machinery runs the format to completion and `wanted` ends up
/// as the untruncated length.
pub(crate) struct BoundedTailWriter<'a> {
    dest: &'a mut [u8],
    pub(crate) written: usize,
    pub(crate) wanted: usize,
    closed: bool,
}

impl<'a> BoundedTailWriter<'a> {
    pub(crate) fn new(dest: &'a mut [u8]) -> Self {
        Self {
            dest,
            written: 0,
            wanted: 0,
            closed: false,
        }
    }
}

impl fmt::Write for BoundedTailWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.wanted += s.len();
        if self.closed {
            return Ok(());
        }
        let room = self.dest.len() - self.written;
        if s.len() <= room {
            self.dest[self.written..self.written + s.len()].copy_from_slice(s.as_bytes());
            self.written += s.len();
        } else {
            let cut = floor_char_boundary(s, room);
            self.dest[self.written..self.written + cut].copy_from_slice(&s.as_bytes()[..cut]);
            self.written += cut;
            self.closed = true;
        }
        Ok(())
    }
}

/// The largest index no greater than `at` that lies on a `char` boundary of
/// `s`.
fn floor_char_boundary(s: &str, at: usize) -> usize {
    if at >= s.len() {
        return s.len();
    }
    let mut at = at;
    while !s.is_char_boundary(at) {
        at -= 1;
    }
    at
}
