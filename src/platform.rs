// Copyright 2026 The Sysmem Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The only module in this crate allowed to talk to the host OS directly.
//!
//! Everything here is a thin boundary: no tag accounting, no logging beyond
//! what bubbles up through [`MemoryError::EnvironmentFailure`]. The façade
//! is the sole caller of [`os_alloc`]/[`os_free`]; [`crate::primitives`]
//! forwards to the byte-level functions below.

use core::ffi::c_void;
use core::num::NonZeroUsize;
use core::ptr;

use crate::error::{MemoryError, Result};

/// Acquire a zeroed, page-granular anonymous mapping of at least `bytes`
/// from the host OS.
pub fn os_alloc(bytes: usize) -> Result<*mut u8> {
    if bytes == 0 {
        return Err(MemoryError::PreconditionViolation(
            "os_alloc byte count must be > 0",
        ));
    }
    // SAFETY: a fixed, well-known set of flags for an anonymous, private
    // mapping; the returned pointer is checked against MAP_FAILED below
    // before being trusted.
    let ptr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            bytes,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if ptr == libc::MAP_FAILED {
        let errno = std::io::Error::last_os_error();
        log::error!("platform: os_alloc({bytes}) failed: {errno}");
        return Err(MemoryError::EnvironmentFailure("mmap failed"));
    }
    Ok(ptr as *mut u8)
}

/// Release a mapping previously returned by [`os_alloc`]. `bytes` must
/// match the length originally requested.
///
/// # Safety
/// `ptr` must be a pointer previously returned by [`os_alloc`] with the
/// same `bytes`, not already freed.
pub unsafe fn os_free(ptr: *mut u8, bytes: usize) {
    if libc::munmap(ptr as *mut c_void, bytes) != 0 {
        let errno = std::io::Error::last_os_error();
        log::error!("platform: os_free({ptr:p}, {bytes}) failed: {errno}");
    }
}

/// Zero `len` bytes starting at `dst`.
///
/// # Safety
/// `dst` must be valid for writes of `len` bytes.
pub unsafe fn os_clear(dst: *mut u8, len: usize) {
    os_set(dst, 0, len);
}

/// Write `val` to each of the `len` bytes starting at `dst`.
///
/// # Safety
/// `dst` must be valid for writes of `len` bytes.
pub unsafe fn os_set(dst: *mut u8, val: u8, len: usize) {
    ptr::write_bytes(dst, val, len);
}

/// Copy `len` bytes from `src` to `dst`. The regions must not overlap.
///
/// # Safety
/// `dst` and `src` must be valid for writes/reads of `len` bytes and must
/// not overlap.
pub unsafe fn os_copy(dst: *mut u8, src: *const u8, len: usize) {
    ptr::copy_nonoverlapping(src, dst, len);
}

/// Copy `len` bytes from `src` to `dst`; the regions may overlap.
///
/// # Safety
/// `dst` and `src` must be valid for writes/reads of `len` bytes.
pub unsafe fn os_move(dst: *mut u8, src: *const u8, len: usize) {
    ptr::copy(src, dst, len);
}

/// Byte-wise equality of the `len`-byte regions starting at `a` and `b`.
///
/// # Safety
/// `a` and `b` must be valid for reads of `len` bytes.
pub unsafe fn os_equal(a: *const u8, b: *const u8, len: usize) -> bool {
    if a == b {
        return true;
    }
    // SAFETY: caller guarantees both regions are valid for `len` reads.
    let (a, b) = unsafe {
        (
            core::slice::from_raw_parts(a, len),
            core::slice::from_raw_parts(b, len),
        )
    };
    a == b
}

/// Number of processors available to this process, used only by the
/// demonstration binary.
pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}
