// Frame buffer pool
//
// A fixed set of receive buffers handed out by packet sources and returned by
// the processing stage. All storage is allocated once up front, so the receive
// loop never touches the heap.
//
// Ownership of a buffer is represented by a `FrameSlot`. The slot is not
// `Clone` or `Copy` and `deallocate` consumes it, so a buffer can only be
// returned once per allocation.

/// Size of one frame buffer. Large enough for a standard 1500-byte MTU frame
/// with link-layer headers; longer frames are truncated by the receive call.
pub const FRAME_CAPACITY: usize = 2048;

/// Exclusive handle to one buffer of a [`FramePool`].
#[must_use = "a FrameSlot must be returned to its pool"]
#[derive(Debug, PartialEq, Eq)]
pub struct FrameSlot {
    index: usize,
}

impl FrameSlot {
    /// Index of the buffer within its pool.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A pre-allocated pool of `FRAME_CAPACITY`-byte buffers.
///
/// O(1) allocation and deallocation via a stack of free indices.
///
/// # Example
///
/// ```
/// use common::frame_pool::FramePool;
///
/// let mut pool = FramePool::with_capacity(4);
/// let slot = pool.allocate().expect("pool not exhausted");
/// pool.buffer_mut(&slot)[0] = 0xAB;
/// assert_eq!(pool.buffer(&slot)[0], 0xAB);
/// pool.deallocate(slot);
/// assert_eq!(pool.in_use(), 0);
/// ```
pub struct FramePool {
    storage: Box<[[u8; FRAME_CAPACITY]]>,
    /// free_list[0..len] holds the free indices; the top of the stack is the last element
    free_list: Vec<usize>,
}

impl FramePool {
    /// Creates a pool with `capacity` buffers, all free.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "FramePool capacity must be greater than 0");

        let storage = vec![[0u8; FRAME_CAPACITY]; capacity].into_boxed_slice();
        // Reversed so that the first allocation hands out index 0
        let free_list = (0..capacity).rev().collect();

        Self { storage, free_list }
    }

    /// Takes a buffer from the pool, `None` when every buffer is in use.
    #[inline]
    pub fn allocate(&mut self) -> Option<FrameSlot> {
        self.free_list.pop().map(|index| FrameSlot { index })
    }

    /// Returns a buffer to the pool.
    #[inline]
    pub fn deallocate(&mut self, slot: FrameSlot) {
        debug_assert!(slot.index < self.storage.len(), "FrameSlot from another pool");
        debug_assert!(
            self.free_list.len() < self.storage.len(),
            "Double release detected: pool already has all buffers free"
        );
        debug_assert!(
            !self.free_list.contains(&slot.index),
            "Double release detected: buffer already free"
        );

        // Never grows past the capacity reserved in with_capacity
        self.free_list.push(slot.index);
    }

    /// Read access to an allocated buffer.
    #[inline]
    pub fn buffer(&self, slot: &FrameSlot) -> &[u8; FRAME_CAPACITY] {
        &self.storage[slot.index]
    }

    /// Write access to an allocated buffer.
    #[inline]
    pub fn buffer_mut(&mut self, slot: &FrameSlot) -> &mut [u8; FRAME_CAPACITY] {
        &mut self.storage[slot.index]
    }

    /// Number of free buffers.
    #[inline]
    pub fn available(&self) -> usize {
        self.free_list.len()
    }

    /// Number of buffers currently handed out.
    #[inline]
    pub fn in_use(&self) -> usize {
        self.storage.len() - self.free_list.len()
    }

    /// Total number of buffers.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pool_all_available() {
        let pool = FramePool::with_capacity(8);
        assert_eq!(pool.capacity(), 8);
        assert_eq!(pool.available(), 8);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_allocate_until_exhausted() {
        let mut pool = FramePool::with_capacity(2);

        let a = pool.allocate().expect("first");
        let b = pool.allocate().expect("second");
        assert!(pool.allocate().is_none());
        assert_eq!(pool.in_use(), 2);

        pool.deallocate(a);
        assert_eq!(pool.available(), 1);
        let c = pool.allocate().expect("reuse");
        assert!(pool.allocate().is_none());

        pool.deallocate(b);
        pool.deallocate(c);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_first_allocation_is_index_zero() {
        let mut pool = FramePool::with_capacity(3);
        let slot = pool.allocate().unwrap();
        assert_eq!(slot.index(), 0);
        pool.deallocate(slot);
    }

    #[test]
    fn test_buffers_are_independent() {
        let mut pool = FramePool::with_capacity(2);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();

        pool.buffer_mut(&a)[..3].copy_from_slice(&[1, 2, 3]);
        pool.buffer_mut(&b)[..3].copy_from_slice(&[9, 9, 9]);

        assert_eq!(&pool.buffer(&a)[..3], &[1, 2, 3]);
        assert_eq!(&pool.buffer(&b)[..3], &[9, 9, 9]);

        pool.deallocate(a);
        pool.deallocate(b);
    }

    #[test]
    fn test_lifo_reuse() {
        let mut pool = FramePool::with_capacity(4);
        let a = pool.allocate().unwrap();
        let index = a.index();
        pool.deallocate(a);

        let again = pool.allocate().unwrap();
        assert_eq!(again.index(), index);
        pool.deallocate(again);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _pool = FramePool::with_capacity(0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "Double release")]
    fn test_forged_double_release_detected() {
        let mut pool = FramePool::with_capacity(2);
        let a = pool.allocate().unwrap();
        let forged = FrameSlot { index: a.index() };
        pool.deallocate(a);
        pool.deallocate(forged);
    }
}
