//! Block allocation for chunk columns.
//!
//! Every component column of a chunk is one block obtained from a
//! [`BlockAllocator`]. Blocks are zero-initialized, so a fresh column of any
//! [`Component`](crate::Component) type holds valid values.

use std::alloc::{self, Layout};
use std::fmt;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Source of zeroed memory blocks for chunk columns.
pub trait BlockAllocator: fmt::Debug + Send + Sync {
    /// Allocates a zero-initialized block for `layout`.
    ///
    /// Callers never pass a zero-sized layout; see [`allocate_block`].
    fn allocate(&self, layout: Layout) -> NonNull<u8>;

    /// Returns a block to the allocator.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by [`BlockAllocator::allocate`] on this
    /// allocator with the same `layout`, and must not be used afterwards.
    unsafe fn deallocate(&self, block: NonNull<u8>, layout: Layout);
}

/// Allocates a block, handing zero-sized layouts a dangling aligned pointer
/// without touching the allocator.
#[must_use]
pub fn allocate_block(allocator: &dyn BlockAllocator, layout: Layout) -> NonNull<u8> {
    if layout.size() == 0 {
        dangling(layout)
    } else {
        allocator.allocate(layout)
    }
}

/// Releases a block obtained from [`allocate_block`].
///
/// # Safety
///
/// Same contract as [`BlockAllocator::deallocate`].
pub unsafe fn free_block(allocator: &dyn BlockAllocator, block: NonNull<u8>, layout: Layout) {
    if layout.size() != 0 {
        // SAFETY: forwarded from the caller.
        unsafe { allocator.deallocate(block, layout) };
    }
}

fn dangling(layout: Layout) -> NonNull<u8> {
    match NonNull::new(ptr::without_provenance_mut::<u8>(layout.align())) {
        Some(block) => block,
        None => crate::fatal(format_args!("layout alignment is zero")),
    }
}

/// The process allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl BlockAllocator for SystemAllocator {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        // SAFETY: callers never pass a zero-sized layout.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        match NonNull::new(raw) {
            Some(block) => block,
            None => alloc::handle_alloc_error(layout),
        }
    }

    unsafe fn deallocate(&self, block: NonNull<u8>, layout: Layout) {
        // SAFETY: `block` came from `alloc_zeroed` with this layout.
        unsafe { alloc::dealloc(block.as_ptr(), layout) };
    }
}

/// Snapshot of a [`TrackingAllocator`]'s counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AllocationStats {
    /// Bytes currently allocated.
    pub live_bytes: usize,
    /// Blocks currently allocated.
    pub live_blocks: usize,
    /// Highest value `live_bytes` has reached.
    pub peak_bytes: usize,
    /// Allocations over the allocator's lifetime.
    pub total_allocations: u64,
    /// Deallocations over the allocator's lifetime.
    pub total_deallocations: u64,
}

impl AllocationStats {
    /// Returns true when every allocated block has been returned.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.live_blocks == 0 && self.total_allocations == self.total_deallocations
    }
}

/// Wraps another allocator and counts the blocks passing through it.
#[derive(Debug, Default)]
pub struct TrackingAllocator<A = SystemAllocator> {
    inner: A,
    live_bytes: AtomicUsize,
    live_blocks: AtomicUsize,
    peak_bytes: AtomicUsize,
    total_allocations: AtomicU64,
    total_deallocations: AtomicU64,
}

impl<A> TrackingAllocator<A> {
    /// Creates a tracking allocator around `inner`.
    #[must_use]
    pub const fn new(inner: A) -> Self {
        Self {
            inner,
            live_bytes: AtomicUsize::new(0),
            live_blocks: AtomicUsize::new(0),
            peak_bytes: AtomicUsize::new(0),
            total_allocations: AtomicU64::new(0),
            total_deallocations: AtomicU64::new(0),
        }
    }

    /// Reads the current counters.
    #[must_use]
    pub fn stats(&self) -> AllocationStats {
        AllocationStats {
            live_bytes: self.live_bytes.load(Ordering::Relaxed),
            live_blocks: self.live_blocks.load(Ordering::Relaxed),
            peak_bytes: self.peak_bytes.load(Ordering::Relaxed),
            total_allocations: self.total_allocations.load(Ordering::Relaxed),
            total_deallocations: self.total_deallocations.load(Ordering::Relaxed),
        }
    }
}

impl<A: BlockAllocator> BlockAllocator for TrackingAllocator<A> {
    fn allocate(&self, layout: Layout) -> NonNull<u8> {
        let block = self.inner.allocate(layout);
        let size = layout.size();
        let result = self
            .live_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_add(size)
            });
        match result {
            Ok(previous) => {
                self.peak_bytes.fetch_max(previous + size, Ordering::Relaxed);
                self.live_blocks.fetch_add(1, Ordering::Relaxed);
                self.total_allocations.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => log::error!("block tracking counter overflowed during allocate: {size}B"),
        }
        block
    }

    unsafe fn deallocate(&self, block: NonNull<u8>, layout: Layout) {
        let size = layout.size();
        let result = self
            .live_bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(size)
            });
        if result.is_err() {
            log::error!("block tracking counter underflowed during deallocate: {size}B");
        } else {
            self.live_blocks.fetch_sub(1, Ordering::Relaxed);
            self.total_deallocations.fetch_add(1, Ordering::Relaxed);
        }
        // SAFETY: forwarded from the caller.
        unsafe { self.inner.deallocate(block, layout) };
    }
}
