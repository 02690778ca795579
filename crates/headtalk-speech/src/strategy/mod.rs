//! Synthesis strategy traits — engine-agnostic interfaces for producing
//! speech audio.
//!
//! The [`SpeechPipeline`](crate::pipeline::SpeechPipeline) operates on
//! strategy trait objects so the primary and fallback paths can be swapped
//! without touching the state machine. Strategies never mutate pipeline
//! state from callback contexts: every outcome is a [`StrategySignal`]
//! delivered over a channel, tagged with the utterance id so stale signals
//! from a superseded attempt are discarded at the receiving end.
//!
//! | Implementation | Audio path |
//! |---|---|
//! | [`LocalVoiceSynthesis`](local::LocalVoiceSynthesis) | external engine plays; no PCM chunks |
//! | [`RemoteAudioSynthesis`](remote::RemoteAudioSynthesis) | fetch + decode; streams chunks into the playback buffer |

pub mod local;
pub mod remote;

use std::sync::Arc;

use headtalk_core::SpeechParams;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::buffer::PlaybackBufferController;
use crate::utterance::UtteranceId;

// ── Shared types ───────────────────────────────────────────────────

/// Which synthesis path an utterance uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    /// An external speech engine renders and plays the audio itself.
    LocalVoice,

    /// Audio bytes are fetched remotely, decoded, and streamed into the
    /// playback buffer.
    RemoteAudio,
}

impl StrategyKind {
    /// Whether this path delivers PCM chunks into the playback buffer.
    #[must_use]
    pub const fn produces_chunks(self) -> bool {
        matches!(self, Self::RemoteAudio)
    }
}

/// Signals a strategy delivers into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategySignal {
    /// Audio is confirmed playing (engine start event, or the first decoded
    /// chunk accepted by the buffer).
    Started,

    /// Speech has progressed to the given character position in the text.
    Progress {
        /// Character index into the utterance text.
        char_index: usize,
    },

    /// End of audio: the engine finished, or the final chunk was delivered.
    Finished,

    /// Synthesis failed.
    Failed {
        /// Transient failures are eligible for the one-shot fallback.
        retryable: bool,
        /// Human-readable description.
        reason: String,
    },
}

/// Generation-tagged sender handed to a strategy for one utterance.
///
/// Every signal carries the utterance id it was created for; the pipeline
/// drops signals whose id no longer matches the active utterance, so a
/// superseded strategy task can keep sending harmlessly until it notices.
#[derive(Debug, Clone)]
pub struct SignalSender {
    id: UtteranceId,
    tx: mpsc::UnboundedSender<(UtteranceId, StrategySignal)>,
}

impl SignalSender {
    /// Create a sender bound to one utterance.
    #[must_use]
    pub fn new(id: UtteranceId, tx: mpsc::UnboundedSender<(UtteranceId, StrategySignal)>) -> Self {
        Self { id, tx }
    }

    /// The utterance this sender is bound to.
    #[must_use]
    pub fn id(&self) -> UtteranceId {
        self.id
    }

    /// Deliver a signal (best-effort — if the pipeline is gone, the signal
    /// is moot anyway).
    pub fn send(&self, signal: StrategySignal) {
        let _ = self.tx.send((self.id, signal));
    }
}

/// Everything a strategy needs to synthesize one utterance.
pub struct SynthesisRequest {
    /// The utterance id (doubles as the staleness generation).
    pub id: UtteranceId,

    /// Normalized text to speak.
    pub text: String,

    /// Parameters frozen at request time.
    pub params: SpeechParams,

    /// Where chunk-producing strategies deliver samples.
    pub buffer: Arc<PlaybackBufferController>,

    /// Where all strategies deliver their signals.
    pub signals: SignalSender,
}

// ── Strategy trait ─────────────────────────────────────────────────

/// A synthesis path the pipeline can drive.
///
/// Object-safe; all methods take `&self` — implementations use interior
/// mutability and background tasks. `start` must return promptly (it hands
/// the work to a task or an external engine); the outcome arrives later as
/// [`StrategySignal`]s.
pub trait SynthesisStrategy: Send + Sync {
    /// Which path this is.
    fn kind(&self) -> StrategyKind;

    /// Begin synthesizing the request.
    fn start(&self, request: SynthesisRequest);

    /// Cancel any in-flight synthesis. Must be idempotent; a strategy that
    /// has already finished treats this as a no-op.
    fn stop(&self);

    /// Suspend engine-driven playback. Chunk-producing strategies ignore
    /// this — pausing the playback buffer is the pipeline's job.
    fn pause(&self) {}

    /// Resume engine-driven playback.
    fn resume(&self) {}
}
