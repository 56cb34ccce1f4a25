/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The memory provider behind [`StrBuf`](crate::StrBuf).
//!
//! Every allocation a buffer performs flows through an [`Alloc`]
//! implementation. The default, [`Global`], delegates to [`std::alloc`].
//! The seam exists so that allocation failure is an observable, recoverable
//! event: implementations report failure by returning `None`, and the buffer
//! turns that into an [`AllocError`](crate::AllocError) while keeping its
//! previous content intact. Tests inject deliberately failing providers to
//! exercise exactly that path.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// A raw byte-allocation provider.
///
/// All methods take `&self`; providers that need to track state (quotas,
/// failure injection) use interior mutability.
///
/// # Safety
///
/// Implementations must hand out blocks that are valid for reads and writes
/// of the requested size and that stay valid until released through
/// [`dealloc`](Alloc::dealloc) or resized through [`grow`](Alloc::grow).
/// `grow` must preserve the first `old_size` bytes of the block.
pub unsafe trait Alloc {
    /// Allocate `size` zeroed bytes.
    ///
    /// `size` must be non-zero. Returns `None` if the request cannot be
    /// satisfied.
    fn alloc_zeroed(&self, size: usize) -> Option<NonNull<u8>>;

    /// Resize the block at `ptr` from `old_size` to `new_size` bytes,
    /// preserving the first `old_size` bytes. The block may move.
    ///
    /// Returns `None` if the request cannot be satisfied; the original block
    /// is untouched and stays valid in that case.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this provider for a block of
    /// `old_size` bytes, and `new_size` must be non-zero.
    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>>;

    /// Release the block at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by this provider for a block of `size`
    /// bytes and must not be used afterwards.
    unsafe fn dealloc(&self, ptr: NonNull<u8>, size: usize);
}

/// The process-wide allocator, backed by [`std::alloc`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Global;

// SAFETY: all methods delegate to the global allocator using byte-aligned
// layouts of the requested size; `realloc` preserves the prefix of the old
// block.
unsafe impl Alloc for Global {
    fn alloc_zeroed(&self, size: usize) -> Option<NonNull<u8>> {
        debug_assert!(size > 0);
        let layout = Layout::array::<u8>(size).ok()?;
        // SAFETY: `layout` has non-zero size.
        NonNull::new(unsafe { alloc::alloc_zeroed(layout) })
    }

    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_size: usize,
        new_size: usize,
    ) -> Option<NonNull<u8>> {
        debug_assert!(new_size > 0);
        if new_size > isize::MAX as usize {
            return None;
        }
        let old_layout = Layout::array::<u8>(old_size).ok()?;
        // SAFETY: `ptr` was allocated by this provider with `old_layout`, and
        // `new_size` is non-zero and does not exceed `isize::MAX`.
        NonNull::new(unsafe { alloc::realloc(ptr.as_ptr(), old_layout, new_size) })
    }

    unsafe fn dealloc(&self, ptr: NonNull<u8>, size: usize) {
        // SAFETY: `size` was accepted by a previous allocation through this
        // provider, so the byte-array layout for it is valid and matches the
        // one `ptr` was allocated with.
        unsafe {
            alloc::dealloc(ptr.as_ptr(), Layout::from_size_align_unchecked(size, 1));
        }
    }
}
