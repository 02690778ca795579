//! Remote fetch-and-stream synthesis.
//!
//! Fetches fully synthesized audio from a remote service, decodes it to
//! mono f32 PCM, and streams it into the playback buffer in fixed-size
//! chunks. Backpressure from a full buffer pauses the producer; a stale
//! generation aborts it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::SpeechError;
use crate::strategy::{StrategyKind, StrategySignal, SynthesisRequest, SynthesisStrategy};
use crate::utterance::SampleChunk;

/// Samples per chunk streamed into the buffer (~85 ms at 24 kHz).
pub const CHUNK_SAMPLES: usize = 2048;

/// How long the producer sleeps before retrying a full buffer.
const BACKPRESSURE_DELAY: Duration = Duration::from_millis(5);

/// Failure from a remote synthesis fetch.
#[derive(Debug, thiserror::Error)]
#[error("{reason}")]
pub struct FetchError {
    /// Human-readable description.
    pub reason: String,

    /// Whether a retry (or the fallback path) might succeed.
    pub retryable: bool,

    /// Underlying cause, when one exists.
    #[source]
    pub source: Option<anyhow::Error>,
}

impl FetchError {
    /// A failure worth retrying (network trouble, server-side errors).
    #[must_use]
    pub fn retryable(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: true,
            source: None,
        }
    }

    /// A failure that will not improve on retry (bad request, auth).
    #[must_use]
    pub fn terminal(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            retryable: false,
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Fetches synthesized audio bytes for a piece of text.
///
/// Implementations return raw little-endian 16-bit PCM at the service's
/// sample rate; decoding to f32 happens on this side.
#[async_trait]
pub trait SpeechFetcher: Send + Sync {
    /// Synthesize `text` with the given voice and speed, returning the
    /// encoded audio bytes.
    async fn fetch(&self, text: &str, voice: &str, speed: f32) -> Result<Vec<u8>, FetchError>;
}

/// Strategy that fetches remote audio and streams it through the buffer.
pub struct RemoteAudioSynthesis {
    fetcher: Arc<dyn SpeechFetcher>,
    /// Producer task for the utterance in flight, aborted on stop.
    producer: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl RemoteAudioSynthesis {
    /// Create a strategy around a fetcher.
    #[must_use]
    pub fn new(fetcher: Arc<dyn SpeechFetcher>) -> Self {
        Self {
            fetcher,
            producer: Mutex::new(None),
        }
    }

    fn abort_producer(&self) {
        if let Ok(mut guard) = self.producer.lock()
            && let Some(handle) = guard.take()
        {
            handle.abort();
        }
    }
}

impl SynthesisStrategy for RemoteAudioSynthesis {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RemoteAudio
    }

    fn start(&self, request: SynthesisRequest) {
        self.abort_producer();

        let fetcher = Arc::clone(&self.fetcher);
        let handle = tokio::spawn(async move {
            produce(fetcher, request).await;
        });

        if let Ok(mut guard) = self.producer.lock() {
            *guard = Some(handle);
        }
    }

    fn stop(&self) {
        self.abort_producer();
    }
}

/// Fetch, decode, and stream one utterance.
async fn produce(fetcher: Arc<dyn SpeechFetcher>, request: SynthesisRequest) {
    let SynthesisRequest {
        id,
        text,
        params,
        buffer,
        signals,
    } = request;

    let bytes = match fetcher.fetch(&text, &params.voice, params.rate).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(utterance = %id, error = %err, "Remote synthesis fetch failed");
            signals.send(StrategySignal::Failed {
                retryable: err.retryable,
                reason: err.reason,
            });
            return;
        }
    };

    let samples = decode_pcm16(&bytes, params.volume);
    if samples.is_empty() {
        signals.send(StrategySignal::Failed {
            retryable: true,
            reason: "remote service returned no audio".into(),
        });
        return;
    }

    tracing::debug!(utterance = %id, samples = samples.len(), "Streaming remote audio");

    let text_chars = text.chars().count();
    let total = samples.len();
    let mut delivered = 0usize;
    let mut started = false;

    for (seq, piece) in samples.chunks(CHUNK_SAMPLES).enumerate() {
        let chunk = SampleChunk::new(id, seq as u32, piece.to_vec());
        loop {
            match buffer.enqueue(&chunk) {
                Ok(()) => break,
                Err(SpeechError::BufferFull) => {
                    tokio::time::sleep(BACKPRESSURE_DELAY).await;
                }
                Err(_) => {
                    // Superseded; the pipeline already moved on.
                    tracing::debug!(utterance = %id, "Producer aborting on stale chunk");
                    return;
                }
            }
        }

        if !started {
            started = true;
            signals.send(StrategySignal::Started);
        }

        delivered += piece.len();
        signals.send(StrategySignal::Progress {
            char_index: text_chars * delivered / total,
        });
    }

    buffer.finish_stream();
    signals.send(StrategySignal::Finished);
}

/// Decode little-endian 16-bit PCM into mono f32, applying `volume` gain.
/// A trailing odd byte is ignored.
#[must_use]
pub fn decode_pcm16(bytes: &[u8], volume: f32) -> Vec<f32> {
    let gain = volume.clamp(0.0, 1.0);
    bytes
        .chunks_exact(2)
        .map(|pair| {
            let raw = i16::from_le_bytes([pair[0], pair[1]]);
            f32::from(raw) / f32::from(i16::MAX) * gain
        })
        .collect()
}
