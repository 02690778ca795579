//! Playback buffer controller — the seam between synthesis producers and
//! the audio callback.
//!
//! Owns the [`SampleRingBuffer`] and layers utterance semantics on top of
//! it: generation and sequence gating on `enqueue`, pause (silence without
//! consuming), end-of-stream tracking for completion detection, and
//! underrun/overrun accounting. Underrun and overrun are observability
//! events, never failures of the controller itself.
//!
//! Every method is `&self` and lock-free, so a single `Arc` of the
//! controller can be shared between the control domain and the real-time
//! audio callback.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, AtomicU64, Ordering};

use crate::error::SpeechError;
use crate::ring::SampleRingBuffer;
use crate::utterance::{SampleChunk, UtteranceId};

/// Default ring capacity in samples (~0.68 s of mono audio at 24 kHz).
pub const DEFAULT_BUFFER_CAPACITY: usize = 16_384;

// Latest-event codes (kept in one atomic so the RT path never locks).
const EVENT_NONE: u8 = 0;
const EVENT_UNDERRUN: u8 = 1;
const EVENT_OVERRUN: u8 = 2;

/// The most recent buffer anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferEvent {
    /// The consumer drained faster than the producer supplied; the shortfall
    /// was filled with silence.
    Underrun,

    /// A producer chunk was rejected because the buffer was full.
    Overrun,
}

/// Snapshot of the controller's counters.
#[derive(Debug, Clone, Copy)]
pub struct BufferStats {
    /// Silence-filled drains while an utterance's stream was still open.
    pub underruns: u64,

    /// Chunks rejected with `BufferFull`.
    pub overruns: u64,

    /// Samples currently buffered.
    pub buffered: usize,

    /// Total sample capacity.
    pub capacity: usize,
}

/// Controller pairing the ring buffer with the current utterance.
pub struct PlaybackBufferController {
    ring: SampleRingBuffer,

    /// Id of the utterance whose samples are accepted; 0 = none.
    generation: AtomicU64,

    /// Last accepted chunk sequence number (-1 = none yet this utterance).
    last_seq: AtomicI64,

    /// Whether this utterance's strategy delivers PCM chunks at all.
    /// Engine-driven (local) playback leaves this false so silence is not
    /// miscounted as underrun.
    expecting_samples: AtomicBool,

    /// Producer has delivered the final chunk of the stream.
    end_of_stream: AtomicBool,

    /// Paused: drain returns silence without consuming.
    paused: AtomicBool,

    underruns: AtomicU64,
    overruns: AtomicU64,
    last_event: AtomicU8,
}

impl PlaybackBufferController {
    /// Create a controller with a ring of at least `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: SampleRingBuffer::new(capacity),
            generation: AtomicU64::new(0),
            last_seq: AtomicI64::new(-1),
            expecting_samples: AtomicBool::new(false),
            end_of_stream: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            underruns: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
            last_event: AtomicU8::new(EVENT_NONE),
        }
    }

    // ── Utterance lifecycle ────────────────────────────────────────

    /// Retag the controller for a new utterance, flushing anything left from
    /// the previous one. `expecting_samples` is false for engine-driven
    /// strategies that never deliver PCM.
    pub fn begin_utterance(&self, id: UtteranceId, expecting_samples: bool) {
        self.ring.clear();
        self.last_seq.store(-1, Ordering::Release);
        self.end_of_stream.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.expecting_samples
            .store(expecting_samples, Ordering::Release);
        self.generation.store(id.0, Ordering::Release);

        tracing::debug!(utterance = %id, expecting_samples, "Playback buffer retagged");
    }

    /// Detach from the current utterance: flush immediately and reject all
    /// further chunks until the next `begin_utterance`. Idempotent.
    pub fn clear_utterance(&self) {
        self.generation.store(0, Ordering::Release);
        self.expecting_samples.store(false, Ordering::Release);
        self.end_of_stream.store(false, Ordering::Release);
        self.paused.store(false, Ordering::Release);
        self.ring.clear();
    }

    /// Producer marks the stream complete; playback finishes when the ring
    /// drains.
    pub fn finish_stream(&self) {
        self.end_of_stream.store(true, Ordering::Release);
    }

    /// Whether all delivered audio has been played out. Trivially true for
    /// engine-driven utterances that never stream samples.
    #[must_use]
    pub fn is_drained(&self) -> bool {
        if !self.expecting_samples.load(Ordering::Acquire) {
            return true;
        }
        self.end_of_stream.load(Ordering::Acquire) && self.ring.is_empty()
    }

    // ── Producer side ──────────────────────────────────────────────

    /// Accept a chunk into the ring.
    ///
    /// Fails with [`SpeechError::StaleChunk`] when the chunk's utterance id
    /// does not match the current generation (or its sequence number runs
    /// backwards), and with [`SpeechError::BufferFull`] when the ring cannot
    /// hold it — the producer must back off and retry, never drop.
    pub fn enqueue(&self, chunk: &SampleChunk) -> Result<(), SpeechError> {
        if self.generation.load(Ordering::Acquire) != chunk.utterance.0 {
            return Err(SpeechError::StaleChunk);
        }

        let last = self.last_seq.load(Ordering::Acquire);
        if i64::from(chunk.seq) <= last {
            tracing::trace!(
                utterance = %chunk.utterance,
                seq = chunk.seq,
                last,
                "Out-of-order chunk rejected"
            );
            return Err(SpeechError::StaleChunk);
        }

        if !self.ring.push(&chunk.samples) {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            self.last_event.store(EVENT_OVERRUN, Ordering::Relaxed);
            return Err(SpeechError::BufferFull);
        }

        // The utterance may have been superseded between the generation
        // check and the push; if so, scrub what we just wrote.
        if self.generation.load(Ordering::Acquire) != chunk.utterance.0 {
            self.ring.clear();
            return Err(SpeechError::StaleChunk);
        }

        self.last_seq.store(i64::from(chunk.seq), Ordering::Release);
        Ok(())
    }

    // ── Consumer side (real-time) ──────────────────────────────────

    /// Fill `out` for one audio callback. Always fills the whole frame —
    /// real samples first, silence for any shortfall — and never blocks,
    /// allocates, or takes a lock. While paused the ring is left untouched.
    ///
    /// Returns the number of real (non-silence) samples delivered.
    pub fn drain(&self, out: &mut [f32]) -> usize {
        if self.paused.load(Ordering::Acquire) {
            out.fill(0.0);
            return 0;
        }

        let taken = self.ring.pop(out);

        if taken < out.len()
            && self.expecting_samples.load(Ordering::Acquire)
            && !self.end_of_stream.load(Ordering::Acquire)
        {
            self.underruns.fetch_add(1, Ordering::Relaxed);
            self.last_event.store(EVENT_UNDERRUN, Ordering::Relaxed);
        }

        taken
    }

    /// Drop all buffered samples immediately. Safe to call concurrently with
    /// an in-flight `drain`.
    pub fn flush(&self) {
        self.ring.clear();
    }

    // ── Pause ──────────────────────────────────────────────────────

    /// Suspend consumption; subsequent drains return silence and leave the
    /// buffer intact.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume consumption from the same read position.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Whether the controller is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    // ── Observability ──────────────────────────────────────────────

    /// Current utterance generation (0 = none).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Counter snapshot for observability collaborators.
    #[must_use]
    pub fn stats(&self) -> BufferStats {
        BufferStats {
            underruns: self.underruns.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
            buffered: self.ring.len(),
            capacity: self.ring.capacity(),
        }
    }

    /// Latest anomaly, if any.
    #[must_use]
    pub fn last_event(&self) -> Option<BufferEvent> {
        match self.last_event.load(Ordering::Relaxed) {
            EVENT_UNDERRUN => Some(BufferEvent::Underrun),
            EVENT_OVERRUN => Some(BufferEvent::Overrun),
            _ => None,
        }
    }
}

impl Default for PlaybackBufferController {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: u64, seq: u32, len: usize) -> SampleChunk {
        SampleChunk::new(UtteranceId(id), seq, vec![0.5; len])
    }

    #[test]
    fn stale_generation_chunk_never_reaches_the_ring() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(2), true);

        let err = ctl.enqueue(&chunk(1, 0, 100)).unwrap_err();
        assert!(matches!(err, SpeechError::StaleChunk));
        assert_eq!(ctl.stats().buffered, 0, "buffer must be unchanged");
    }

    #[test]
    fn enqueue_without_active_utterance_is_stale() {
        let ctl = PlaybackBufferController::new(256);
        assert!(matches!(
            ctl.enqueue(&chunk(1, 0, 10)),
            Err(SpeechError::StaleChunk)
        ));
    }

    #[test]
    fn backpressure_on_third_chunk_until_drain_frees_space() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);

        assert!(ctl.enqueue(&chunk(1, 0, 100)).is_ok());
        assert!(ctl.enqueue(&chunk(1, 1, 100)).is_ok());
        assert!(matches!(
            ctl.enqueue(&chunk(1, 2, 100)),
            Err(SpeechError::BufferFull)
        ));
        assert_eq!(ctl.stats().overruns, 1);
        assert_eq!(ctl.last_event(), Some(BufferEvent::Overrun));

        let mut out = [0.0f32; 100];
        assert_eq!(ctl.drain(&mut out), 100);

        assert!(ctl.enqueue(&chunk(1, 2, 100)).is_ok());
    }

    #[test]
    fn out_of_order_sequence_is_rejected() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);

        assert!(ctl.enqueue(&chunk(1, 3, 10)).is_ok());
        assert!(matches!(
            ctl.enqueue(&chunk(1, 3, 10)),
            Err(SpeechError::StaleChunk)
        ));
        assert!(matches!(
            ctl.enqueue(&chunk(1, 2, 10)),
            Err(SpeechError::StaleChunk)
        ));
        assert!(ctl.enqueue(&chunk(1, 4, 10)).is_ok());
    }

    #[test]
    fn drain_always_fills_the_frame() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);
        ctl.enqueue(&chunk(1, 0, 30)).unwrap();

        let mut out = [9.0f32; 64];
        assert_eq!(ctl.drain(&mut out), 30);
        assert!(out[30..].iter().all(|&s| s == 0.0), "shortfall is silence");
        assert_eq!(ctl.stats().underruns, 1);
        assert_eq!(ctl.last_event(), Some(BufferEvent::Underrun));
    }

    #[test]
    fn underrun_not_counted_after_end_of_stream() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);
        ctl.enqueue(&chunk(1, 0, 10)).unwrap();
        ctl.finish_stream();

        let mut out = [0.0f32; 64];
        ctl.drain(&mut out);
        ctl.drain(&mut out);
        assert_eq!(ctl.stats().underruns, 0, "tail silence is not an underrun");
        assert!(ctl.is_drained());
    }

    #[test]
    fn underrun_not_counted_for_engine_driven_utterance() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), false);

        let mut out = [0.0f32; 64];
        ctl.drain(&mut out);
        assert_eq!(ctl.stats().underruns, 0);
        assert!(ctl.is_drained());
    }

    #[test]
    fn paused_drain_returns_silence_and_preserves_samples() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);
        ctl.enqueue(&chunk(1, 0, 50)).unwrap();

        ctl.pause();
        let mut out = [3.0f32; 32];
        for _ in 0..5 {
            assert_eq!(ctl.drain(&mut out), 0);
            assert!(out.iter().all(|&s| s == 0.0));
        }
        assert_eq!(ctl.stats().buffered, 50, "pause must not lose data");
        assert_eq!(ctl.stats().underruns, 0, "pause silence is not an underrun");

        ctl.resume();
        assert_eq!(ctl.drain(&mut out), 32);
        assert!(out.iter().all(|&s| (s - 0.5).abs() < f32::EPSILON));
    }

    #[test]
    fn flush_empties_immediately() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);
        ctl.enqueue(&chunk(1, 0, 100)).unwrap();

        ctl.flush();
        assert_eq!(ctl.stats().buffered, 0);
    }

    #[test]
    fn clear_utterance_rejects_late_chunks() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);
        ctl.enqueue(&chunk(1, 0, 10)).unwrap();

        ctl.clear_utterance();
        assert!(matches!(
            ctl.enqueue(&chunk(1, 1, 10)),
            Err(SpeechError::StaleChunk)
        ));
        assert_eq!(ctl.stats().buffered, 0);
    }

    #[test]
    fn is_drained_requires_end_of_stream() {
        let ctl = PlaybackBufferController::new(256);
        ctl.begin_utterance(UtteranceId(1), true);
        assert!(!ctl.is_drained(), "stream still open");

        ctl.finish_stream();
        assert!(ctl.is_drained());
    }
}
