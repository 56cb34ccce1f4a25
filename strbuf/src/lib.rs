/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! A string buffer that can be appended endlessly and reallocates its backing
//! memory as needed to fit the newly appended content.
//!
//! # Usecase
//!
//! Assembling a large string out of many small fragments with a plain
//! fixed-size buffer forces the caller to track sizes and reallocate by hand.
//! [`StrBuf`] owns that bookkeeping: every append lands at the tail, and a
//! single growth policy decides when and by how much the backing allocation
//! expands, keeping the number of reallocations bounded relative to the total
//! bytes appended.
//!
//! ```
//! use strbuf::StrBuf;
//!
//! let mut buf = StrBuf::new();
//! buf.append("Hello").unwrap();
//! buf.append(", world!").unwrap();
//! assert_eq!(buf.as_str(), "Hello, world!");
//! assert_eq!(buf.len(), 13);
//! ```
//!
//! # Growth policy
//!
//! The buffer keeps one contiguous allocation holding the content plus one
//! reserved terminator byte. Room for an append is decided in a single place:
//!
//! * Content that fits in the current capacity costs no allocator traffic
//!   at all.
//! * The very first allocation of a buffer created without capacity is sized
//!   directly as `max(incoming + 1, 128)` bytes, so small first appends don't
//!   pay for a full growth increment.
//! * Every later growth adds `max(grow_by, incoming)` bytes on top of the
//!   current capacity (plus one extra byte when the buffer is still empty,
//!   where no terminator slot exists to reuse). The increment defaults to
//!   1024 bytes and is configurable per instance via
//!   [`set_grow_by`](StrBuf::set_grow_by).
//!
//! Capacity only ever grows. A failed reallocation leaves the buffer exactly
//! as it was: content, length and capacity are untouched, and the call
//! reports an [`AllocError`] for the caller to handle.
//!
//! # Formatted appends
//!
//! Two entry points accept [`format_args!`] output, trading safety against
//! speed:
//!
//! * [`append_format`](StrBuf::append_format) measures the exact formatted
//!   length first and can therefore never truncate.
//! * [`append_format_bounded`](StrBuf::append_format_bounded) trusts a
//!   caller-supplied length estimate and writes at most that many bytes.
//!   An estimate that is too small **silently truncates the stored content**
//!   while the returned length still reflects what the formatter wanted to
//!   write. That hazard is part of the contract; see the method docs.
//!
//! # Diagnostics
//!
//! Reallocation traffic and failures are reported through two optional
//! caller-supplied [sinks](sink), no-ops unless set:
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use strbuf::StrBuf;
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink_log = Rc::clone(&log);
//!
//! let mut buf = StrBuf::new();
//! buf.set_debug_sink(move |args| sink_log.borrow_mut().push(args.to_string()));
//!
//! buf.append(&"x".repeat(200)).unwrap(); // first allocation, no reallocation
//! assert!(log.borrow().is_empty());
//!
//! buf.append(&"y".repeat(200)).unwrap(); // outgrows the first allocation
//! assert!(!log.borrow().is_empty());
//! ```
//!
//! # What this is not
//!
//! A single owner mutates the buffer at a time (`&mut self`); there is no
//! internal synchronization. Content is plain UTF-8 with no Unicode-aware
//! editing operations, capacity is never given back, and nothing is
//! persisted anywhere.

use std::alloc::{Layout, handle_alloc_error};
use std::fmt;
use std::ptr::{NonNull, copy_nonoverlapping};
use std::slice;

mod alloc;
pub mod sink;
mod writer;

pub use crate::alloc::{Alloc, Global};
pub use crate::sink::SinkFn;

use crate::writer::{BoundedTailWriter, LenCounter, TailWriter};

/// Default extra capacity requested per reallocation beyond the minimum
/// required.
pub const DEFAULT_GROW_BY: usize = 1024;

/// Smallest first allocation of a buffer created without initial capacity.
pub const MIN_FIRST_ALLOC: usize = 128;

/// Error returned when the buffer cannot obtain memory.
///
/// The failing call leaves the buffer in its last valid state; content,
/// length and capacity are exactly what they were before the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The allocator refused a request for this many bytes.
    #[error("failed to allocate {0} bytes")]
    AllocFailed(usize),
    /// The required capacity does not fit in a `usize`.
    #[error("required capacity overflows usize")]
    CapacityOverflow,
}

/// An endlessly appendable string buffer with a configurable growth policy.
///
/// See the [crate docs](crate) for the growth policy and usage examples.
///
/// # Invariants
///
/// * The allocation is present exactly when `capacity > 0`.
/// * `len + 1 <= capacity` whenever the allocation is present; the byte at
///   `len` is a NUL terminator.
/// * The first `len` bytes are initialized, valid UTF-8 content.
pub struct StrBuf<A: Alloc = Global> {
    /// Backing allocation; absent until the first append when the buffer was
    /// created without initial capacity.
    data: Option<NonNull<u8>>,
    /// Total allocated size in bytes, including the terminator slot.
    capacity: usize,
    /// Current content length in bytes.
    len: usize,
    /// Extra capacity requested per reallocation. Zero falls back to
    /// [`DEFAULT_GROW_BY`] at reallocation time.
    grow_by: usize,
    alloc: A,
    debug_sink: Option<SinkFn>,
    error_sink: Option<SinkFn>,
}

impl StrBuf {
    /// Creates a new empty buffer.
    ///
    /// This does not allocate; storage is deferred to the first append.
    pub fn new() -> Self {
        Self::new_in(Global)
    }

    /// Creates a new empty buffer with `capacity` bytes pre-reserved.
    ///
    /// A `capacity` of zero behaves like [`new`](StrBuf::new). Aborts via
    /// [`handle_alloc_error`] if the global allocator fails; use
    /// [`try_with_capacity_in`](StrBuf::try_with_capacity_in) for a
    /// recoverable variant.
    ///
    /// ```
    /// use strbuf::StrBuf;
    ///
    /// let mut buf = StrBuf::with_capacity(64);
    /// assert_eq!(buf.capacity(), 64);
    ///
    /// // Content fitting the reserved capacity triggers no reallocation.
    /// buf.append("abc").unwrap();
    /// assert_eq!(buf.capacity(), 64);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::try_with_capacity_in(capacity, Global).unwrap_or_else(|_| {
            let layout = Layout::array::<u8>(capacity).unwrap_or(Layout::new::<u8>());
            handle_alloc_error(layout)
        })
    }
}

impl Default for StrBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Alloc> StrBuf<A> {
    /// Creates a new empty buffer that allocates through `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            data: None,
            capacity: 0,
            len: 0,
            grow_by: DEFAULT_GROW_BY,
            alloc,
            debug_sink: None,
            error_sink: None,
        }
    }

    /// Creates a new empty buffer with `capacity` bytes pre-reserved from
    /// `alloc`, reporting failure instead of aborting.
    pub fn try_with_capacity_in(capacity: usize, alloc: A) -> Result<Self, AllocError> {
        let mut buf = Self::new_in(alloc);
        if capacity > 0 {
            let Some(ptr) = buf.alloc.alloc_zeroed(capacity) else {
                return Err(AllocError::AllocFailed(capacity));
            };
            buf.data = Some(ptr);
            buf.capacity = capacity;
        }
        Ok(buf)
    }

    /// Current content length in bytes. Zero for an unallocated buffer.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no content.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total allocated size in bytes, including the reserved terminator
    /// slot. Zero until the first allocation.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The configured growth increment.
    pub fn grow_by(&self) -> usize {
        self.grow_by
    }

    /// Sets the extra capacity requested per reallocation.
    ///
    /// A value of zero falls back to the [`DEFAULT_GROW_BY`] of 1024 bytes
    /// at reallocation time.
    ///
    /// ```
    /// use strbuf::StrBuf;
    ///
    /// let mut buf = StrBuf::new();
    /// buf.set_grow_by(4096);
    /// assert_eq!(buf.grow_by(), 4096);
    /// ```
    pub fn set_grow_by(&mut self, grow_by: usize) {
        self.grow_by = grow_by;
    }

    /// Installs the debug sink, which receives a diagnostic before and after
    /// every reallocation.
    pub fn set_debug_sink(&mut self, sink: impl Fn(fmt::Arguments<'_>) + 'static) {
        self.debug_sink = Some(Box::new(sink));
    }

    /// Installs the error sink, which receives a diagnostic on allocation
    /// failure and on formatted-output truncation.
    pub fn set_error_sink(&mut self, sink: impl Fn(fmt::Arguments<'_>) + 'static) {
        self.error_sink = Some(Box::new(sink));
    }

    /// The current content.
    ///
    /// Empty for a buffer that was never appended to. The returned view
    /// borrows the buffer's storage; any mutating call may move that storage,
    /// which is why the borrow ends there.
    pub fn as_str(&self) -> &str {
        // SAFETY: every append path writes whole `&str`s and truncates only
        // at `char` boundaries, so the content is always valid UTF-8.
        unsafe { std::str::from_utf8_unchecked(self.as_bytes()) }
    }

    /// The current content as raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self.data {
            None => &[],
            // SAFETY: the first `len` bytes of the allocation are
            // initialized content.
            Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr(), self.len) },
        }
    }

    /// Appends `text`, growing the buffer as needed.
    ///
    /// Returns the new total length. On allocation failure the buffer is
    /// unchanged.
    ///
    /// ```
    /// use strbuf::StrBuf;
    ///
    /// let mut buf = StrBuf::new();
    /// assert_eq!(buf.append("ab").unwrap(), 2);
    /// assert_eq!(buf.append("cd").unwrap(), 4);
    /// assert_eq!(buf.as_str(), "abcd");
    /// ```
    pub fn append(&mut self, text: &str) -> Result<usize, AllocError> {
        let ptr = self.reserve(text.len())?;
        // SAFETY: `reserve` guarantees room for `text.len() + 1` bytes past
        // the current length.
        unsafe { self.commit(ptr, text.as_bytes()) };
        Ok(self.len)
    }

    /// Appends formatted output, measuring its exact length first.
    ///
    /// The format is rendered once against a counting writer to determine
    /// the exact byte length, the buffer grows for precisely that length,
    /// and the output is then rendered into the reserved tail. There is no
    /// truncation risk, at the cost of formatting twice.
    ///
    /// Returns the new total length. On allocation failure the buffer is
    /// unchanged.
    ///
    /// ```
    /// use strbuf::StrBuf;
    ///
    /// let mut buf = StrBuf::new();
    /// buf.append_format(format_args!("{} + {} = {}", 2, 2, 4)).unwrap();
    /// assert_eq!(buf.as_str(), "2 + 2 = 4");
    /// ```
    pub fn append_format(&mut self, args: fmt::Arguments<'_>) -> Result<usize, AllocError> {
        let mut counter = LenCounter::default();
        // The counting writer never fails.
        let _ = fmt::Write::write_fmt(&mut counter, args);
        let incoming = counter.0;

        let ptr = self.reserve(incoming)?;

        let written = {
            // SAFETY: `reserve` guarantees room for `incoming + 1` bytes
            // past the current length.
            let dest = unsafe { slice::from_raw_parts_mut(ptr.as_ptr().add(self.len), incoming) };
            let mut tail = TailWriter::new(dest);
            // Fails only if the format renders differently across the two
            // passes; the tail writer clamps at the measured length either
            // way.
            let _ = fmt::Write::write_fmt(&mut tail, args);
            tail.written
        };

        self.len += written;
        // SAFETY: `written <= incoming`, so the terminator slot is within
        // the reservation.
        unsafe { ptr.as_ptr().add(self.len).write(0) };
        Ok(self.len)
    }

    /// Appends formatted output sized against a caller-supplied estimate.
    ///
    /// `expected_len` is the caller's upper bound on the formatted byte
    /// length, not counting the terminator. For argument-free formats whose
    /// template is longer than the estimate, the template length is used as
    /// a floor. Growth is sized against the estimate, and at most
    /// `expected_len` content bytes are stored.
    ///
    /// # Truncation hazard
    ///
    /// When the formatted output is longer than `expected_len`, the stored
    /// content is **silently cut** to an `expected_len`-byte prefix (ending
    /// on a `char` boundary), yet the returned value still reports the
    /// length the formatter wanted to produce, not what was stored. A
    /// diagnostic is emitted through the error sink when this happens.
    /// Callers that cannot supply a conservative estimate should use
    /// [`append_format`](StrBuf::append_format) instead.
    ///
    /// ```
    /// use strbuf::StrBuf;
    ///
    /// let mut buf = StrBuf::new();
    /// let reported = buf.append_format_bounded(3, format_args!("{}", "hello")).unwrap();
    ///
    /// // The reported length covers the whole formatted output...
    /// assert_eq!(reported, 5);
    /// // ...while the buffer kept only the estimated 3 bytes.
    /// assert_eq!(buf.as_str(), "hel");
    /// assert_eq!(buf.len(), 3);
    /// ```
    ///
    /// Returns `Err` only for allocation failure, with the buffer unchanged.
    pub fn append_format_bounded(
        &mut self,
        expected_len: usize,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, AllocError> {
        let mut bound = expected_len;
        if let Some(template) = args.as_str() {
            bound = bound.max(template.len());
        }

        let ptr = self.reserve(bound)?;
        let old_len = self.len;

        let (written, wanted) = {
            // SAFETY: `reserve` guarantees room for `bound + 1` bytes past
            // the current length.
            let dest = unsafe { slice::from_raw_parts_mut(ptr.as_ptr().add(old_len), bound) };
            let mut tail = BoundedTailWriter::new(dest);
            // The bounded writer never reports an error; overflow is counted
            // in `wanted` instead.
            let _ = fmt::Write::write_fmt(&mut tail, args);
            (tail.written, tail.wanted)
        };

        self.len = old_len + written;
        // SAFETY: `written <= bound`, so the terminator slot is within the
        // reservation.
        unsafe { ptr.as_ptr().add(self.len).write(0) };

        if wanted > bound {
            self.error(format_args!(
                "formatted output longer than anticipated ({wanted} > {bound})"
            ));
        }

        Ok(old_len + wanted)
    }

    /// Makes room for `incoming` more content bytes plus the terminator,
    /// returning the (possibly moved) allocation.
    fn reserve(&mut self, incoming: usize) -> Result<NonNull<u8>, AllocError> {
        match self.data {
            None => self.allocate_first(incoming),
            Some(ptr) => self.ensure_capacity(ptr, incoming),
        }
    }

    /// First allocation of a buffer created without capacity: sized directly
    /// as `max(incoming + 1, 128)`, bypassing the increment-based policy so
    /// small first appends don't pay for a full growth increment.
    fn allocate_first(&mut self, incoming: usize) -> Result<NonNull<u8>, AllocError> {
        debug_assert!(self.data.is_none());
        let size = incoming
            .checked_add(1)
            .ok_or(AllocError::CapacityOverflow)?
            .max(MIN_FIRST_ALLOC);
        let Some(ptr) = self.alloc.alloc_zeroed(size) else {
            self.error(format_args!("failed allocating memory"));
            return Err(AllocError::AllocFailed(size));
        };
        self.data = Some(ptr);
        self.capacity = size;
        Ok(ptr)
    }

    /// The single growth decision point: reallocates when `incoming` more
    /// bytes (plus the terminator) would not fit the current capacity.
    ///
    /// Grows by `max(grow_by, incoming)` bytes; the old terminator slot is
    /// overwritten by the new content, so no extra byte is needed, unless
    /// the buffer is still empty and no terminator slot was in use yet.
    fn ensure_capacity(
        &mut self,
        ptr: NonNull<u8>,
        incoming: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let required = self
            .len
            .checked_add(incoming)
            .and_then(|n| n.checked_add(1))
            .ok_or(AllocError::CapacityOverflow)?;
        if required <= self.capacity {
            return Ok(ptr);
        }

        let mut added = if self.grow_by > 0 {
            self.grow_by
        } else {
            DEFAULT_GROW_BY
        };
        if added < incoming {
            added = incoming;
        }
        if self.len == 0 {
            added += 1;
        }
        let new_capacity = self
            .capacity
            .checked_add(added)
            .ok_or(AllocError::CapacityOverflow)?;

        self.debug(format_args!("reallocating {added} bytes for string buffer"));

        // SAFETY: `ptr` is the buffer's allocation of `self.capacity` bytes,
        // obtained from `self.alloc`; `new_capacity` is strictly larger.
        let new_ptr = unsafe { self.alloc.grow(ptr, self.capacity, new_capacity) };
        let Some(new_ptr) = new_ptr else {
            self.error(format_args!("failed allocating memory"));
            return Err(AllocError::AllocFailed(new_capacity));
        };

        self.data = Some(new_ptr);
        self.capacity = new_capacity;
        self.debug(format_args!("new capacity is {new_capacity}"));

        Ok(new_ptr)
    }

    /// Copies `bytes` onto the tail and rewrites the terminator.
    ///
    /// # Safety
    ///
    /// `ptr` must be the buffer's allocation with room for at least
    /// `len + bytes.len() + 1` bytes.
    unsafe fn commit(&mut self, ptr: NonNull<u8>, bytes: &[u8]) {
        // SAFETY: the caller reserved `bytes.len() + 1` bytes past `len`,
        // and `bytes` cannot alias the buffer's exclusively owned storage.
        unsafe {
            copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr().add(self.len), bytes.len());
        }
        self.len += bytes.len();
        // SAFETY: `len + 1 <= capacity` after the reservation.
        unsafe { ptr.as_ptr().add(self.len).write(0) };
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.debug_sink {
            sink(args);
        }
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        if let Some(sink) = &self.error_sink {
            sink(args);
        }
    }
}

impl<A: Alloc> Drop for StrBuf<A> {
    fn drop(&mut self) {
        if let Some(ptr) = self.data.take() {
            // SAFETY: `ptr` was obtained from `self.alloc` for
            // `self.capacity` bytes and is released exactly once; `take`
            // clears the field.
            unsafe { self.alloc.dealloc(ptr, self.capacity) };
        }
    }
}

impl<A: Alloc> fmt::Write for StrBuf<A> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s).map(drop).map_err(|_| fmt::Error)
    }

    fn write_fmt(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        self.append_format(args).map(drop).map_err(|_| fmt::Error)
    }
}

impl<A: Alloc> fmt::Debug for StrBuf<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

impl<A: Alloc> fmt::Display for StrBuf<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<A: Alloc> AsRef<str> for StrBuf<A> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<A: Alloc> AsRef<[u8]> for StrBuf<A> {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests;
