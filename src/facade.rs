// Copyright 2026 The Sysmem Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! The process-wide, thread-safe allocation service every other subsystem
//! is meant to go through. Internally this is a once-initialized global
//! guarded by a single [`parking_lot::Mutex`] — every mutating call locks,
//! delegates to the [`DynamicAllocator`], updates tag accounting, and
//! unlocks. There is no per-call timeout or retry: the only thing that can
//! block is the mutex itself.

use std::sync::OnceLock;

use parking_lot::Mutex;

use crate::dynamic_allocator::DynamicAllocator;
use crate::error::{MemoryError, Result};
use crate::platform;
use crate::primitives;
use crate::tag::{Tag, ALL_TAGS, TAG_COUNT};

struct Inner {
    os_ptr: *mut u8,
    os_len: usize,
    allocator: DynamicAllocator,
    tagged: [u64; TAG_COUNT],
    allocation_count: u64,
    free_count: u64,
}

// SAFETY: `Inner` is only ever reached through `PHASE`'s mutex, so all
// access to the raw pointer and the allocator it backs is already
// serialized.
unsafe impl Send for Inner {}

enum Phase {
    NotStarted,
    Running(Inner),
    ShutDown,
}

static PHASE: OnceLock<Mutex<Phase>> = OnceLock::new();

fn phase() -> &'static Mutex<Phase> {
    PHASE.get_or_init(|| Mutex::new(Phase::NotStarted))
}

/// Bring the façade up with a single reservation of `capacity` bytes.
/// Refuses a second call while already running.
pub fn startup(capacity: u64) -> Result<()> {
    if capacity == 0 {
        log::error!("facade: startup capacity must be > 0");
        return Err(MemoryError::PreconditionViolation(
            "facade capacity must be > 0",
        ));
    }

    let mut guard = phase().lock();
    if matches!(&*guard, Phase::Running(_)) {
        log::error!("facade: startup called while already running");
        return Err(MemoryError::PreconditionViolation(
            "facade already started",
        ));
    }

    let os_len = capacity as usize;
    let os_ptr = platform::os_alloc(os_len)?;

    // SAFETY: `os_ptr` was just returned by `os_alloc` with length `os_len`
    // and is not reachable from anywhere else yet.
    let allocator = match unsafe { DynamicAllocator::from_raw_parts(os_ptr, capacity) } {
        Ok(allocator) => allocator,
        Err(err) => {
            // SAFETY: `os_ptr`/`os_len` exactly match the `os_alloc` call above.
            unsafe { platform::os_free(os_ptr, os_len) };
            return Err(err);
        }
    };

    *guard = Phase::Running(Inner {
        os_ptr,
        os_len,
        allocator,
        tagged: [0; TAG_COUNT],
        allocation_count: 0,
        free_count: 0,
    });
    log::info!("facade: started with a {capacity}-byte reservation");
    Ok(())
}

/// Tear the façade down. Idempotent: a second call, or a call before
/// `startup`, is a no-op. If cumulative allocations and frees disagree, logs
/// a leak diagnostic with the full tag breakdown but does not fail.
pub fn shutdown() -> Result<()> {
    let mut guard = phase().lock();
    if !matches!(&*guard, Phase::Running(_)) {
        return Ok(());
    }
    let inner = match std::mem::replace(&mut *guard, Phase::ShutDown) {
        Phase::Running(inner) => inner,
        _ => unreachable!("checked above"),
    };

    if inner.allocation_count != inner.free_count {
        log::warn!(
            "facade: shutdown with {} unmatched allocations (allocs={}, frees={}); {}",
            inner.allocation_count.saturating_sub(inner.free_count),
            inner.allocation_count,
            inner.free_count,
            render_tag_breakdown(&inner.tagged),
        );
    }

    let Inner { os_ptr, os_len, allocator, .. } = inner;
    drop(allocator);
    // SAFETY: `os_ptr`/`os_len` exactly match the `os_alloc` call in `startup`,
    // and `allocator` (the last thing that could still reference the
    // mapping) has just been dropped.
    unsafe { platform::os_free(os_ptr, os_len) };
    log::info!("facade: shut down");
    Ok(())
}

fn render_tag_breakdown(tagged: &[u64; TAG_COUNT]) -> String {
    let mut parts = Vec::new();
    for tag in ALL_TAGS {
        let bytes = tagged[tag.index()];
        if bytes > 0 {
            parts.push(format!("{tag}={bytes}"));
        }
    }
    if parts.is_empty() {
        "no tagged bytes outstanding".to_string()
    } else {
        parts.join(", ")
    }
}

/// `allocate_aligned(size, 1, tag)`.
pub fn allocate(size: u64, tag: Tag) -> Result<*mut u8> {
    allocate_aligned(size, 1, tag)
}

/// Allocate `size` bytes aligned to `alignment`, attributed to `tag`. The
/// returned block is zero-filled. Before `startup` this passes through to
/// the OS, unaccounted; after `shutdown` it fails.
pub fn allocate_aligned(size: u64, alignment: u16, tag: Tag) -> Result<*mut u8> {
    if size == 0 {
        log::error!("facade: allocate size must be > 0");
        return Err(MemoryError::PreconditionViolation(
            "allocate size must be > 0",
        ));
    }
    if tag == Tag::Unknown {
        log::warn!("facade: allocate with tag=unknown");
    }

    let mut guard = phase().lock();
    match &mut *guard {
        Phase::NotStarted => {
            log::debug!("facade: allocate before startup, falling back to raw OS allocation");
            drop(guard);
            platform::os_alloc(size as usize)
        }
        Phase::ShutDown => {
            log::error!("facade: allocate called after shutdown");
            Err(MemoryError::InvariantViolation("facade already shut down"))
        }
        Phase::Running(inner) => {
            let offset = inner.allocator.allocate_aligned(size, alignment)?;
            let ptr = inner.allocator.offset_ptr(offset);
            // SAFETY: `ptr` was just carved out of the allocator's managed
            // region and is valid for `size` writes.
            unsafe { primitives::clear(ptr, size as usize) };
            inner.allocation_count += 1;
            inner.tagged[tag.index()] += size;
            Ok(ptr)
        }
    }
}

/// `free_aligned(ptr, size, 1, tag)`.
pub fn free(ptr: *mut u8, size: u64, tag: Tag) -> Result<()> {
    free_aligned(ptr, size, 1, tag)
}

/// Release a block returned by [`allocate_aligned`]. `size` and `alignment`
/// must match the original request; they drive tag accounting here, while
/// the allocator itself recovers the true size and alignment from the
/// block's own header. A `size` exceeding the tag's tracked total is an
/// accounting underflow: logged and clamped rather than allowed to
/// underflow the counter.
pub fn free_aligned(ptr: *mut u8, size: u64, _alignment: u16, tag: Tag) -> Result<()> {
    let mut guard = phase().lock();
    match &mut *guard {
        Phase::NotStarted => {
            log::debug!("facade: free before startup, falling back to raw OS free");
            drop(guard);
            // SAFETY: caller contract — `ptr`/`size` came from the matching
            // pre-startup `allocate` fallback.
            unsafe { platform::os_free(ptr, size as usize) };
            Ok(())
        }
        Phase::ShutDown => {
            log::error!("facade: free called after shutdown");
            Err(MemoryError::InvariantViolation("facade already shut down"))
        }
        Phase::Running(inner) => {
            let offset = inner.allocator.offset_of(ptr)?;
            inner.allocator.free_aligned(offset)?;
            inner.free_count += 1;
            let have = inner.tagged[tag.index()];
            let charge = if size > have {
                log::error!(
                    "facade: accounting underflow for tag {tag}: freed {size}, \
                     only {have} tracked"
                );
                have
            } else {
                size
            };
            inner.tagged[tag.index()] -= charge;
            Ok(())
        }
    }
}

/// `set(ptr, 0, size)`.
///
/// # Safety
/// `ptr` must be valid for writes of `size` bytes.
pub unsafe fn clear(ptr: *mut u8, size: usize) {
    unsafe { primitives::clear(ptr, size) }
}

/// Write `value` to each of the `size` bytes starting at `ptr`.
///
/// # Safety
/// `ptr` must be valid for writes of `size` bytes.
pub unsafe fn set(ptr: *mut u8, value: u8, size: usize) {
    unsafe { primitives::set(ptr, value, size) }
}

/// Copy `size` bytes from `src` to `dst`. The regions must not overlap.
///
/// # Safety
/// `dst` and `src` must be valid for writes/reads of `size` bytes and must
/// not overlap.
pub unsafe fn copy(dst: *mut u8, src: *const u8, size: usize) {
    unsafe { primitives::copy(dst, src, size) }
}

/// Copy `size` bytes from `src` to `dst`; the regions may overlap.
///
/// # Safety
/// `dst` and `src` must be valid for writes/reads of `size` bytes.
pub unsafe fn mv(dst: *mut u8, src: *const u8, size: usize) {
    unsafe { primitives::mv(dst, src, size) }
}

/// Byte-wise equality of the `size`-byte regions starting at `a` and `b`.
///
/// # Safety
/// `a` and `b` must be valid for reads of `size` bytes.
pub unsafe fn equal(a: *const u8, b: *const u8, size: usize) -> bool {
    unsafe { primitives::equal(a, b, size) }
}

/// Render a human-readable per-tag usage report.
pub fn stat() -> String {
    let guard = phase().lock();
    match &*guard {
        Phase::Running(inner) => format!(
            "facade: allocs={} frees={} {}",
            inner.allocation_count,
            inner.free_count,
            render_tag_breakdown(&inner.tagged),
        ),
        Phase::NotStarted => "facade: not started".to_string(),
        Phase::ShutDown => "facade: shut down".to_string(),
    }
}

/// Cumulative successful allocations since `startup`.
pub fn allocation_count() -> u64 {
    match &*phase().lock() {
        Phase::Running(inner) => inner.allocation_count,
        _ => 0,
    }
}

/// Cumulative successful frees since `startup`.
pub fn free_count() -> u64 {
    match &*phase().lock() {
        Phase::Running(inner) => inner.free_count,
        _ => 0,
    }
}

/// Bytes currently attributed to `tag`, or the total across every tag when
/// `tag` is `None` (the source's `ALL` sentinel).
pub fn amount_allocated(tag: Option<Tag>) -> u64 {
    match &*phase().lock() {
        Phase::Running(inner) => match tag {
            Some(tag) => inner.tagged[tag.index()],
            None => inner.tagged.iter().sum(),
        },
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // The façade is a process-wide singleton; serialize tests that touch it
    // so they don't observe each other's startup/shutdown transitions.
    static TEST_LOCK: StdMutex<()> = StdMutex::new(());

    // Every test starts from a known phase rather than trusting whatever the
    // previous test (in whatever order the harness chose) left behind.
    fn reset_to_not_started() {
        *phase().lock() = Phase::NotStarted;
    }

    #[test]
    fn pre_startup_allocate_passes_through_unaccounted() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_to_not_started();
        let ptr = allocate(64, Tag::Application).unwrap();
        assert_eq!(allocation_count(), 0);
        free(ptr, 64, Tag::Application).unwrap();
    }

    #[test]
    fn accounting_tracks_allocate_and_free() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_to_not_started();
        startup(1024 * 1024).unwrap();

        let p1 = allocate(100, Tag::String).unwrap();
        let p2 = allocate(200, Tag::Array).unwrap();
        assert_eq!(amount_allocated(Some(Tag::String)), 100);
        assert_eq!(amount_allocated(Some(Tag::Array)), 200);
        assert_eq!(amount_allocated(None), 300);

        free(p1, 100, Tag::String).unwrap();
        free(p2, 200, Tag::Array).unwrap();
        assert_eq!(amount_allocated(None), 0);

        shutdown().unwrap();
        reset_to_not_started();
    }

    #[test]
    fn post_shutdown_calls_are_invariant_violations() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_to_not_started();
        startup(4096).unwrap();
        shutdown().unwrap();
        assert!(matches!(
            allocate(16, Tag::Application),
            Err(MemoryError::InvariantViolation(_))
        ));
        reset_to_not_started();
    }

    #[test]
    fn second_startup_is_refused() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_to_not_started();
        startup(4096).unwrap();
        assert!(matches!(
            startup(4096),
            Err(MemoryError::PreconditionViolation(_))
        ));
        shutdown().unwrap();
        reset_to_not_started();
    }

    #[test]
    fn shutdown_is_idempotent() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_to_not_started();
        startup(4096).unwrap();
        shutdown().unwrap();
        shutdown().unwrap();
        reset_to_not_started();
    }

    #[test]
    fn clean_shutdown_without_leaks_reports_zero_imbalance() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset_to_not_started();
        startup(4096).unwrap();
        let p = allocate(32, Tag::Queue).unwrap();
        free(p, 32, Tag::Queue).unwrap();
        assert_eq!(allocation_count(), free_count());
        shutdown().unwrap();
        reset_to_not_started();
    }

    #[test]
    fn concurrent_allocate_free_preserves_accounting() {
        use rand::Rng;
        use std::thread;

        let _guard = TEST_LOCK.lock().unwrap();
        reset_to_not_started();
        startup(2 * 1024 * 1024).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                thread::spawn(|| {
                    let mut rng = rand::rng();
                    for _ in 0..200 {
                        let size = rng.random_range(1..=256);
                        if let Ok(ptr) = allocate(size, Tag::Application) {
                            free(ptr, size, Tag::Application).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(allocation_count(), free_count());
        assert_eq!(amount_allocated(None), 0);
        shutdown().unwrap();
        reset_to_not_started();
    }
}
