//! Speech engine error types.

/// Errors that can occur in the speech engine.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    /// An utterance is already in flight and the caller asked not to
    /// interrupt it. A no-op — the active utterance is untouched.
    #[error("An utterance is already in flight")]
    Busy,

    /// The text to speak was empty or whitespace-only. A no-op — no
    /// utterance is created and no state transition occurs.
    #[error("Cannot speak empty or whitespace-only text")]
    EmptyText,

    /// The chunk carries the id of a superseded or cancelled utterance.
    /// The buffer is unchanged; producers drop the chunk and stop.
    #[error("Sample chunk belongs to a superseded utterance")]
    StaleChunk,

    /// Accepting the chunk would overflow the ring buffer. Backpressure
    /// signal — the producer must slow down and retry, not drop the chunk.
    #[error("Playback buffer full")]
    BufferFull,

    /// Speech synthesis failed.
    #[error("Speech synthesis failed: {reason}")]
    Synthesis {
        /// Human-readable description of the failure.
        reason: String,
        /// Whether the failure is transient (eligible for the one-shot
        /// strategy fallback).
        retryable: bool,
    },

    /// No audio output device found.
    #[error("No audio output device found")]
    NoOutputDevice,

    /// Failed to open the audio output stream.
    #[error("Failed to open audio output stream: {0}")]
    OutputStream(String),

    /// The audio output thread died unexpectedly.
    #[error("Audio output thread died")]
    AudioThreadDied,

    /// The speech service control task is no longer running.
    #[error("Speech service is no longer running")]
    ServiceClosed,
}
