//! Utterance data model — one logical request to speak a piece of text.

use headtalk_core::SpeechParams;
use serde::{Deserialize, Serialize};

use crate::strategy::StrategyKind;

/// Identifier of one utterance.
///
/// Issued once per `speak()` call from a monotonic counter; it doubles as the
/// generation token that lets in-flight async work detect it has been
/// superseded. Events and chunks tagged with an older id are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

impl std::fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "u{}", self.0)
    }
}

/// Lifecycle state of an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UtteranceState {
    /// No utterance requested yet.
    Idle,

    /// Synthesis requested, audio not yet confirmed.
    Requesting,

    /// Audio is playing (or streaming into the playback buffer).
    Speaking,

    /// Playback suspended; buffered samples remain queued.
    Paused,

    /// All audio played to the end.
    Completed,

    /// Stopped explicitly or superseded by a newer `speak()` call.
    Cancelled,

    /// Synthesis failed terminally (including a failed fallback).
    Failed,
}

impl UtteranceState {
    /// Whether this state ends the utterance's lifecycle. A terminal
    /// utterance no longer blocks a new `speak()` call.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// A single speech attempt, from request to terminal state.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Monotonic identifier, also the staleness generation.
    pub id: UtteranceId,

    /// Normalized source text (never empty).
    pub text: String,

    /// Which synthesis path is currently active.
    pub strategy: StrategyKind,

    /// Current lifecycle state.
    pub state: UtteranceState,

    /// Parameters frozen at request time.
    pub params: SpeechParams,
}

/// An immutable run of PCM samples produced for one utterance.
///
/// `seq` is assigned by the producer and must be strictly increasing per
/// utterance; together with the utterance id it lets the playback buffer
/// reject data from a superseded timeline.
#[derive(Debug, Clone)]
pub struct SampleChunk {
    /// The utterance this chunk belongs to.
    pub utterance: UtteranceId,

    /// Producer-assigned sequence number, strictly increasing.
    pub seq: u32,

    /// Mono f32 PCM samples.
    pub samples: Vec<f32>,
}

impl SampleChunk {
    /// Create a chunk tagged with its utterance and sequence number.
    #[must_use]
    pub fn new(utterance: UtteranceId, seq: u32, samples: Vec<f32>) -> Self {
        Self {
            utterance,
            seq,
            samples,
        }
    }
}
