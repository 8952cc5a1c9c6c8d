// Lock-free SPSC queue
//
// Carries log entries from a receive loop to the logger's writer thread. One
// thread pushes, one thread pops. Producer and consumer indices live on
// separate cache lines so the hot loop never contends with the writer.
//
// The ring is only reachable through a `Producer` and a `Consumer` handle.
// Each handle can move to another thread but cannot be shared, so two
// threads can never push (or pop) concurrently.
//
// Memory ordering:
// - producer publishes a slot with a Release store of `tail`
// - consumer observes it with an Acquire load of `tail`
// - consumer frees a slot with a Release store of `head`
// - producer observes free space with an Acquire load of `head`

use crossbeam_utils::CachePadded;
use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Shared storage behind a producer/consumer pair
struct Ring<T, const N: usize> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    /// Next slot the consumer reads
    head: CachePadded<AtomicUsize>,
    /// Next slot the producer writes
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: the ring is only touched through one Producer and one Consumer.
// Neither handle is Sync, so each side runs on a single thread at a time and
// slot hand-off is synchronized through the head/tail atomics.
unsafe impl<T: Send, const N: usize> Send for Ring<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for Ring<T, N> {}

impl<T, const N: usize> Ring<T, N> {
    const MASK: usize = N - 1;

    fn new() -> Self {
        assert!(N > 0 && N.is_power_of_two(), "Capacity must be a power of 2");

        let slots = (0..N)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            slots,
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    #[inline]
    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }
}

impl<T, const N: usize> Drop for Ring<T, N> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let mut index = head;
        while index != tail {
            // SAFETY: slots in [head, tail) were written and never read.
            unsafe { self.slots[index & Self::MASK].get_mut().assume_init_drop() };
            index = index.wrapping_add(1);
        }
    }
}

/// `Cell` is Send but not Sync, which is exactly what the handles need.
type NotSync = PhantomData<Cell<()>>;

/// Write side of a bounded SPSC queue
///
/// ```compile_fail
/// fn assert_sync<S: Sync>() {}
/// assert_sync::<common::lf_queue::Producer<u64, 8>>();
/// ```
pub struct Producer<T, const N: usize> {
    ring: Arc<Ring<T, N>>,
    _not_sync: NotSync,
}

/// Read side of a bounded SPSC queue
///
/// ```compile_fail
/// fn assert_sync<S: Sync>() {}
/// assert_sync::<common::lf_queue::Consumer<u64, 8>>();
/// ```
pub struct Consumer<T, const N: usize> {
    ring: Arc<Ring<T, N>>,
    _not_sync: NotSync,
}

/// Creates an empty queue with capacity `N` (a power of two) and returns its
/// two ends. Storage is allocated on the heap.
///
/// # Panics
/// Panics if N is not a power of 2.
///
/// ```
/// use common::lf_queue::channel;
/// let (producer, consumer) = channel::<u32, 64>();
/// producer.push(7).unwrap();
/// assert_eq!(consumer.pop(), Some(7));
/// ```
pub fn channel<T, const N: usize>() -> (Producer<T, N>, Consumer<T, N>) {
    let ring = Arc::new(Ring::new());
    (
        Producer {
            ring: Arc::clone(&ring),
            _not_sync: PhantomData,
        },
        Consumer {
            ring,
            _not_sync: PhantomData,
        },
    )
}

impl<T, const N: usize> Producer<T, N> {
    /// Pushes an item, handing it back as `Err` when the queue is full.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        let ring = &*self.ring;
        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);

        if tail.wrapping_sub(head) >= N {
            return Err(item);
        }

        // SAFETY: the slot at `tail` is outside [head, tail) so the consumer
        // is not reading it, and this handle is the only writer.
        unsafe {
            (*ring.slots[tail & Ring::<T, N>::MASK].get()).write(item);
        }

        ring.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Number of queued items. Approximate while the consumer is active.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<T, const N: usize> Consumer<T, N> {
    /// Pops the oldest item, `None` when empty.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        let ring = &*self.ring;
        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);

        if head == tail {
            return None;
        }

        // SAFETY: head < tail, so the producer finished writing this slot
        // (Acquire on tail) and will not touch it until head moves past it.
        let item = unsafe { (*ring.slots[head & Ring::<T, N>::MASK].get()).assume_init_read() };

        ring.head.store(head.wrapping_add(1), Ordering::Release);
        Some(item)
    }

    /// Number of queued items. Approximate while the producer is active.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_queue_is_empty() {
        let (producer, consumer) = channel::<u32, 8>();
        assert!(producer.is_empty());
        assert_eq!(consumer.len(), 0);
        assert_eq!(producer.capacity(), 8);
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let (producer, consumer) = channel::<u32, 8>();
        for i in 0..8 {
            producer.push(i).unwrap();
        }
        for i in 0..8 {
            assert_eq!(consumer.pop(), Some(i));
        }
        assert!(consumer.is_empty());
    }

    #[test]
    fn test_full_queue_returns_item() {
        let (producer, _consumer) = channel::<u32, 4>();
        for i in 0..4 {
            producer.push(i).unwrap();
        }
        assert_eq!(producer.push(100), Err(100));
        assert_eq!(producer.len(), 4);
    }

    #[test]
    fn test_wraparound() {
        let (producer, consumer) = channel::<u32, 4>();
        for round in 0..10 {
            let base = round * 4;
            for i in 0..4 {
                producer.push(base + i).unwrap();
            }
            for i in 0..4 {
                assert_eq!(consumer.pop(), Some(base + i), "round {}", round);
            }
        }
    }

    #[test]
    #[should_panic(expected = "Capacity must be a power of 2")]
    fn test_non_power_of_two_panics() {
        let _queue = channel::<u32, 5>();
    }

    #[test]
    fn test_drop_releases_remaining_items() {
        static DROPS: AtomicUsize = AtomicUsize::new(0);

        struct Counted;
        impl Drop for Counted {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::SeqCst);
            }
        }

        {
            let (producer, consumer) = channel::<Counted, 4>();
            let _ = producer.push(Counted);
            let _ = producer.push(Counted);
            let _ = producer.push(Counted);
            drop(consumer.pop());
            assert_eq!(DROPS.load(Ordering::SeqCst), 1);
        }

        assert_eq!(DROPS.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_handles_are_send_but_not_shared() {
        fn assert_send<S: Send>() {}
        assert_send::<Producer<u64, 8>>();
        assert_send::<Consumer<u64, 8>>();
    }

    #[test]
    fn test_cross_thread_transfer() {
        const COUNT: u64 = 10_000;
        let (producer, consumer) = channel::<u64, 64>();

        let producer = std::thread::spawn(move || {
            for i in 0..COUNT {
                let mut item = i;
                while let Err(back) = producer.push(item) {
                    item = back;
                    std::hint::spin_loop();
                }
            }
        });

        let mut expected = 0;
        while expected < COUNT {
            if let Some(value) = consumer.pop() {
                assert_eq!(value, expected);
                expected += 1;
            } else {
                std::hint::spin_loop();
            }
        }

        producer.join().unwrap();
        assert!(consumer.is_empty());
    }
}
