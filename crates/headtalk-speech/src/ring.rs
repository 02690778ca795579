//! Lock-free single-producer/single-consumer sample ring buffer.
//!
//! The producer (synthesis task) pushes decoded chunks at an irregular rate;
//! the consumer (audio callback) pops a fixed-size frame every callback
//! period. The two sides synchronize only through the atomic cursor
//! invariant `0 <= write - read <= capacity` — no locks, and no heap
//! allocation after construction, so `pop` is safe to call from the
//! real-time audio thread.
//!
//! Sample cells are stored as `f32` bit patterns in `AtomicU32`, which keeps
//! the whole structure free of unsafe code under the workspace-wide
//! `unsafe_code = "deny"` lint. A torn read is impossible (each cell is one
//! atomic word) and a racy read of a cell the producer is concurrently
//! writing cannot happen because the consumer only reads below the published
//! write cursor.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Fixed-capacity circular buffer of mono f32 PCM samples.
///
/// Capacity is rounded up to the next power of two so cursor wraparound is a
/// mask, not a modulo, in the real-time path. Cursors are free-running and
/// monotonic; the index into the cell array is `cursor & (capacity - 1)`.
///
/// Contract: at most one thread pushes and at most one thread pops at a
/// time. [`clear`](Self::clear) may be called from the producer side
/// concurrently with a `pop` — both advance the read cursor with
/// `fetch_max`, so whichever is further ahead wins and the cursor never
/// moves backwards.
pub struct SampleRingBuffer {
    cells: Box<[AtomicU32]>,
    mask: usize,
    /// Free-running write cursor (producer-owned, consumer-read).
    write: AtomicUsize,
    /// Free-running read cursor (consumer-advanced, producer-read;
    /// also advanced by `clear`).
    read: AtomicUsize,
}

impl SampleRingBuffer {
    /// Create a buffer holding at least `capacity` samples (rounded up to a
    /// power of two, minimum 2).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let cells = (0..capacity)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            cells,
            mask: capacity - 1,
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        }
    }

    /// Total sample capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of samples currently buffered.
    #[must_use]
    pub fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Whether the buffer holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free space in samples.
    #[must_use]
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Copy `samples` into the buffer. All-or-nothing: returns `false`
    /// without writing anything if the chunk would overtake the read cursor.
    ///
    /// Producer side only.
    pub fn push(&self, samples: &[f32]) -> bool {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);

        if samples.len() > self.capacity() - write.wrapping_sub(read) {
            return false;
        }

        for (i, &sample) in samples.iter().enumerate() {
            self.cells[write.wrapping_add(i) & self.mask].store(sample.to_bits(), Ordering::Relaxed);
        }

        // Publish the new samples to the consumer.
        self.write
            .store(write.wrapping_add(samples.len()), Ordering::Release);
        true
    }

    /// Fill `out` from the buffer. Copies what is available, zero-fills the
    /// shortfall, advances the read cursor by the amount actually copied,
    /// and returns that amount. Never blocks and never allocates.
    ///
    /// Consumer side only.
    pub fn pop(&self, out: &mut [f32]) -> usize {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);

        let available = write.wrapping_sub(read);
        let taken = available.min(out.len());

        for (i, slot) in out.iter_mut().take(taken).enumerate() {
            *slot = f32::from_bits(
                self.cells[read.wrapping_add(i) & self.mask].load(Ordering::Relaxed),
            );
        }
        for slot in out.iter_mut().skip(taken) {
            *slot = 0.0;
        }

        // fetch_max rather than store: a concurrent `clear` may already have
        // advanced the cursor past us, and the cursor must never regress.
        self.read
            .fetch_max(read.wrapping_add(taken), Ordering::AcqRel);
        taken
    }

    /// Drop all buffered samples immediately by advancing the read cursor to
    /// the write cursor. Safe to call concurrently with an in-flight `pop`.
    pub fn clear(&self) {
        let write = self.write.load(Ordering::Acquire);
        self.read.fetch_max(write, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for SampleRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        assert_eq!(SampleRingBuffer::new(100).capacity(), 128);
        assert_eq!(SampleRingBuffer::new(256).capacity(), 256);
        assert_eq!(SampleRingBuffer::new(0).capacity(), 2);
    }

    #[test]
    fn push_then_pop_round_trips() {
        let ring = SampleRingBuffer::new(8);
        assert!(ring.push(&[1.0, 2.0, 3.0]));
        assert_eq!(ring.len(), 3);

        let mut out = [0.0f32; 3];
        assert_eq!(ring.pop(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn push_rejects_overflow_without_writing() {
        let ring = SampleRingBuffer::new(4);
        assert!(ring.push(&[1.0, 2.0, 3.0]));
        assert!(!ring.push(&[4.0, 5.0]));
        assert_eq!(ring.len(), 3, "rejected push must not change the buffer");
    }

    #[test]
    fn pop_zero_fills_shortfall() {
        let ring = SampleRingBuffer::new(8);
        ring.push(&[1.0, 2.0]);

        let mut out = [9.0f32; 5];
        assert_eq!(ring.pop(&mut out), 2);
        assert_eq!(out, [1.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn pop_from_empty_is_all_silence() {
        let ring = SampleRingBuffer::new(8);
        let mut out = [7.0f32; 4];
        assert_eq!(ring.pop(&mut out), 0);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn cursor_invariant_holds_through_wraparound() {
        let ring = SampleRingBuffer::new(4);
        let mut out = [0.0f32; 3];

        // Many cycles so the cursors wrap the mask repeatedly.
        for cycle in 0..100 {
            let v = cycle as f32;
            assert!(ring.push(&[v, v + 0.5, v + 0.75]));
            assert!(ring.len() <= ring.capacity());

            assert_eq!(ring.pop(&mut out), 3);
            assert_eq!(out, [v, v + 0.5, v + 0.75]);
            assert!(ring.is_empty());
        }
    }

    #[test]
    fn interleaved_push_pop_preserves_order() {
        let ring = SampleRingBuffer::new(8);
        let mut popped = Vec::new();
        let mut out = [0.0f32; 2];

        for i in 0..20 {
            assert!(ring.push(&[i as f32, i as f32 + 0.25]));
            let n = ring.pop(&mut out);
            popped.extend_from_slice(&out[..n]);
        }

        for (i, pair) in popped.chunks(2).enumerate() {
            assert_eq!(pair, [i as f32, i as f32 + 0.25]);
        }
    }

    #[test]
    fn clear_drops_everything() {
        let ring = SampleRingBuffer::new(8);
        ring.push(&[1.0; 6]);
        ring.clear();
        assert!(ring.is_empty());

        // Buffer is usable again after a clear.
        assert!(ring.push(&[2.0; 8]));
        assert_eq!(ring.len(), 8);
    }

    #[test]
    fn concurrent_producer_consumer() {
        use std::sync::Arc;

        let ring = Arc::new(SampleRingBuffer::new(64));
        let total = 10_000usize;

        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                let mut next = 0usize;
                while next < total {
                    if ring.push(&[next as f32]) {
                        next += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };

        let mut seen = 0usize;
        let mut out = [0.0f32; 16];
        while seen < total {
            let n = ring.pop(&mut out);
            for &v in &out[..n] {
                assert_eq!(v, seen as f32, "samples must arrive in push order");
                seen += 1;
            }
            if n == 0 {
                std::thread::yield_now();
            }
        }

        producer.join().unwrap();
        assert!(ring.is_empty());
    }
}
