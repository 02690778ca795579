//! Local engine-driven synthesis.
//!
//! The platform speech engine renders and plays audio itself; this strategy
//! only drives its lifecycle and translates the engine's events into
//! [`StrategySignal`]s tagged with the owning utterance. No PCM flows
//! through the playback buffer on this path.

use std::sync::{Arc, Mutex};

use headtalk_core::SpeechParams;
use tokio::sync::mpsc;

use crate::error::SpeechError;
use crate::strategy::{SignalSender, StrategyKind, StrategySignal, SynthesisRequest, SynthesisStrategy};

/// Event emitted by a platform speech engine during playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The engine started producing audio.
    Started,

    /// The engine reached a word or sentence boundary at the given
    /// character index into the text.
    Boundary {
        /// Character index into the spoken text.
        char_index: usize,
    },

    /// The engine finished the whole text.
    Ended,

    /// The engine failed.
    Error {
        /// Human-readable description.
        reason: String,
        /// Whether the failure looks transient.
        retryable: bool,
    },
}

/// Abstraction over a platform speech engine that plays audio itself.
///
/// `speak` must not block on playback: it kicks the engine off and reports
/// progress through the event channel. Only one utterance is spoken at a
/// time; `cancel` discards whatever is in flight.
pub trait LocalSpeechEngine: Send + Sync {
    /// Start speaking `text`, delivering lifecycle events on `events`.
    fn speak(
        &self,
        text: &str,
        params: &SpeechParams,
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<(), SpeechError>;

    /// Suspend playback in place.
    fn pause(&self);

    /// Resume suspended playback.
    fn resume(&self);

    /// Discard the current utterance. Idempotent.
    fn cancel(&self);
}

/// Strategy adapter over a [`LocalSpeechEngine`].
pub struct LocalVoiceSynthesis {
    engine: Arc<dyn LocalSpeechEngine>,
    /// Forwarder task for the utterance in flight, aborted on stop.
    forwarder: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl LocalVoiceSynthesis {
    /// Wrap a platform engine.
    #[must_use]
    pub fn new(engine: Arc<dyn LocalSpeechEngine>) -> Self {
        Self {
            engine,
            forwarder: Mutex::new(None),
        }
    }

    fn abort_forwarder(&self) {
        if let Ok(mut guard) = self.forwarder.lock()
            && let Some(handle) = guard.take()
        {
            handle.abort();
        }
    }
}

impl SynthesisStrategy for LocalVoiceSynthesis {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LocalVoice
    }

    fn start(&self, request: SynthesisRequest) {
        self.abort_forwarder();

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        if let Err(err) = self
            .engine
            .speak(&request.text, &request.params, event_tx)
        {
            tracing::warn!(utterance = %request.id, error = %err, "Local engine refused to speak");
            let retryable = matches!(err, SpeechError::Synthesis { retryable: true, .. });
            request.signals.send(StrategySignal::Failed {
                retryable,
                reason: err.to_string(),
            });
            return;
        }

        let handle = tokio::spawn(forward_events(event_rx, request.signals));
        if let Ok(mut guard) = self.forwarder.lock() {
            *guard = Some(handle);
        }
    }

    fn stop(&self) {
        self.engine.cancel();
        self.abort_forwarder();
    }

    fn pause(&self) {
        self.engine.pause();
    }

    fn resume(&self) {
        self.engine.resume();
    }
}

/// Translate engine events into utterance-tagged signals until the engine
/// reports a terminal event or closes the channel.
async fn forward_events(
    mut events: mpsc::UnboundedReceiver<EngineEvent>,
    signals: SignalSender,
) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Started => signals.send(StrategySignal::Started),
            EngineEvent::Boundary { char_index } => {
                signals.send(StrategySignal::Progress { char_index });
            }
            EngineEvent::Ended => {
                signals.send(StrategySignal::Finished);
                return;
            }
            EngineEvent::Error { reason, retryable } => {
                signals.send(StrategySignal::Failed { retryable, reason });
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PlaybackBufferController;
    use crate::utterance::UtteranceId;

    /// Engine that immediately replays a scripted event sequence.
    struct ScriptedEngine {
        script: Vec<EngineEvent>,
    }

    impl LocalSpeechEngine for ScriptedEngine {
        fn speak(
            &self,
            _text: &str,
            _params: &SpeechParams,
            events: mpsc::UnboundedSender<EngineEvent>,
        ) -> Result<(), SpeechError> {
            for event in &self.script {
                let _ = events.send(event.clone());
            }
            Ok(())
        }

        fn pause(&self) {}
        fn resume(&self) {}
        fn cancel(&self) {}
    }

    fn request(
        id: u64,
        tx: mpsc::UnboundedSender<(UtteranceId, StrategySignal)>,
    ) -> SynthesisRequest {
        SynthesisRequest {
            id: UtteranceId(id),
            text: "Hello there".into(),
            params: SpeechParams::default(),
            buffer: Arc::new(PlaybackBufferController::default()),
            signals: SignalSender::new(UtteranceId(id), tx),
        }
    }

    #[tokio::test]
    async fn engine_events_become_tagged_signals() {
        let strategy = LocalVoiceSynthesis::new(Arc::new(ScriptedEngine {
            script: vec![
                EngineEvent::Started,
                EngineEvent::Boundary { char_index: 6 },
                EngineEvent::Ended,
            ],
        }));

        let (tx, mut rx) = mpsc::unbounded_channel();
        strategy.start(request(3, tx));

        let mut signals = Vec::new();
        while let Some((id, signal)) = rx.recv().await {
            assert_eq!(id, UtteranceId(3));
            signals.push(signal);
        }
        assert_eq!(
            signals,
            vec![
                StrategySignal::Started,
                StrategySignal::Progress { char_index: 6 },
                StrategySignal::Finished,
            ]
        );
    }

    #[tokio::test]
    async fn engine_error_becomes_failed_signal() {
        let strategy = LocalVoiceSynthesis::new(Arc::new(ScriptedEngine {
            script: vec![EngineEvent::Error {
                reason: "voice unavailable".into(),
                retryable: true,
            }],
        }));

        let (tx, mut rx) = mpsc::unbounded_channel();
        strategy.start(request(1, tx));

        let (_, signal) = rx.recv().await.expect("signal");
        assert_eq!(
            signal,
            StrategySignal::Failed {
                retryable: true,
                reason: "voice unavailable".into(),
            }
        );
    }

    /// Engine whose `speak` fails synchronously.
    struct RefusingEngine;

    impl LocalSpeechEngine for RefusingEngine {
        fn speak(
            &self,
            _text: &str,
            _params: &SpeechParams,
            _events: mpsc::UnboundedSender<EngineEvent>,
        ) -> Result<(), SpeechError> {
            Err(SpeechError::Synthesis {
                reason: "no voices installed".into(),
                retryable: false,
            })
        }

        fn pause(&self) {}
        fn resume(&self) {}
        fn cancel(&self) {}
    }

    #[tokio::test]
    async fn synchronous_refusal_reports_failed() {
        let strategy = LocalVoiceSynthesis::new(Arc::new(RefusingEngine));
        let (tx, mut rx) = mpsc::unbounded_channel();
        strategy.start(request(1, tx));

        let (_, signal) = rx.recv().await.expect("signal");
        assert!(matches!(
            signal,
            StrategySignal::Failed { retryable: false, .. }
        ));
    }
}
