//! Speech playback coordination for a talking-head avatar.
//!
//! One utterance at a time flows through a state machine
//! ([`SpeechPipeline`]) that arbitrates between a primary and a fallback
//! synthesis strategy, streams decoded samples through a lock-free playback
//! buffer, and drives the audio device from a dedicated output thread.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use headtalk_speech::fetch::HttpSpeechFetcher;
//! use headtalk_speech::output::AudioOutputHandle;
//! use headtalk_speech::pipeline::{NullNotifier, SpeechPipeline, SpeechPipelineConfig};
//! use headtalk_speech::service::SpeechService;
//! use headtalk_speech::strategy::remote::RemoteAudioSynthesis;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let fetcher = Arc::new(HttpSpeechFetcher::new("sk-..."));
//! let remote = Arc::new(RemoteAudioSynthesis::new(fetcher));
//!
//! let pipeline = SpeechPipeline::new(
//!     remote,
//!     None,
//!     Arc::new(NullNotifier),
//!     SpeechPipelineConfig::default(),
//! );
//! let _audio = AudioOutputHandle::spawn(pipeline.buffer())?;
//!
//! let speech = SpeechService::spawn(pipeline);
//! speech.speak("Hello there!").await?;
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod ring;
pub mod service;
pub mod strategy;
pub mod text;
pub mod utterance;

pub use buffer::{BufferEvent, BufferStats, DEFAULT_BUFFER_CAPACITY, PlaybackBufferController};
pub use error::SpeechError;
pub use pipeline::{
    AvatarNotifier, NullNotifier, SpeechEvent, SpeechPipeline, SpeechPipelineConfig,
};
pub use service::{SpeechHandle, SpeechService};
pub use strategy::{SignalSender, StrategyKind, StrategySignal, SynthesisRequest, SynthesisStrategy};
pub use utterance::{SampleChunk, Utterance, UtteranceId, UtteranceState};
