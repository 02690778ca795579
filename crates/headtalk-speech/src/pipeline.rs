//! Utterance state machine with single-flight arbitration and one-shot
//! strategy fallback.
//!
//! The pipeline owns at most one utterance at a time. A new `speak`
//! supersedes the current one (cancelling it first); `try_speak` refuses
//! instead. Strategy outcomes arrive as [`StrategySignal`]s tagged with the
//! utterance id they belong to, and anything tagged with a superseded id is
//! dropped on the floor, so no amount of late async work can corrupt the
//! current utterance.
//!
//! All methods take `&mut self` and are expected to be called from one
//! task; the [`SpeechService`](crate::service::SpeechService) wraps the
//! pipeline in exactly that shape.

use std::sync::Arc;
use std::time::{Duration, Instant};

use headtalk_core::SpeechParams;
use tokio::sync::mpsc;

use crate::buffer::PlaybackBufferController;
use crate::error::SpeechError;
use crate::strategy::{SignalSender, StrategySignal, SynthesisRequest, SynthesisStrategy};
use crate::text::{self, Fragment};
use crate::utterance::{Utterance, UtteranceId, UtteranceState};

/// Pipeline events for observers (UI layers, logging).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// An utterance changed lifecycle state.
    StateChanged {
        /// The utterance affected.
        utterance: UtteranceId,
        /// Its new state.
        state: UtteranceState,
    },

    /// Speech progressed into a new text fragment.
    Fragment {
        /// The utterance being spoken.
        utterance: UtteranceId,
        /// Index of the fragment within the utterance text.
        index: usize,
        /// The fragment text.
        text: String,
    },

    /// The primary strategy failed and the fallback took over.
    FallbackEngaged {
        /// The utterance that switched strategies.
        utterance: UtteranceId,
        /// Why the primary failed.
        reason: String,
    },
}

/// Hook for the avatar layer (mouth animation, subtitles).
///
/// All methods default to no-ops so callers only implement what they need.
/// Called from the pipeline's task; implementations must not block.
pub trait AvatarNotifier: Send + Sync {
    /// Audio for the utterance is confirmed playing.
    fn utterance_started(&self, _utterance: UtteranceId) {}

    /// Speech progressed into the given fragment, `elapsed` after audio
    /// started.
    fn fragment_spoken(&self, _utterance: UtteranceId, _fragment: &Fragment, _elapsed: Duration) {}

    /// The utterance reached a terminal state.
    fn utterance_ended(&self, _utterance: UtteranceId, _state: UtteranceState) {}
}

/// Notifier that does nothing.
pub struct NullNotifier;

impl AvatarNotifier for NullNotifier {}

/// Pipeline construction parameters.
#[derive(Debug, Clone)]
pub struct SpeechPipelineConfig {
    /// Initial speech parameters.
    pub params: SpeechParams,

    /// Playback ring capacity in samples.
    pub buffer_capacity: usize,

    /// Whether a retryable primary failure may engage the fallback.
    pub fallback_enabled: bool,
}

impl Default for SpeechPipelineConfig {
    fn default() -> Self {
        Self {
            params: SpeechParams::default(),
            buffer_capacity: crate::buffer::DEFAULT_BUFFER_CAPACITY,
            fallback_enabled: true,
        }
    }
}

/// The utterance state machine.
pub struct SpeechPipeline {
    params: SpeechParams,
    fallback_enabled: bool,

    primary: Arc<dyn SynthesisStrategy>,
    fallback: Option<Arc<dyn SynthesisStrategy>>,
    notifier: Arc<dyn AvatarNotifier>,

    buffer: Arc<PlaybackBufferController>,

    current: Option<Utterance>,
    next_id: u64,

    /// The active strategy is the fallback, not the primary.
    on_fallback: bool,

    /// The fallback has been engaged once for the current utterance.
    fallback_used: bool,

    /// The strategy reported `Finished`; completion waits for the buffer
    /// to drain.
    stream_finished: bool,

    fragments: Vec<Fragment>,
    last_fragment: Option<usize>,

    /// When audio was confirmed playing; timestamps fragment notifications.
    started_at: Option<Instant>,

    signal_tx: mpsc::UnboundedSender<(UtteranceId, StrategySignal)>,
    signal_rx: Option<mpsc::UnboundedReceiver<(UtteranceId, StrategySignal)>>,

    event_tx: mpsc::UnboundedSender<SpeechEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SpeechEvent>>,
}

impl SpeechPipeline {
    /// Create a pipeline with a primary strategy and an optional fallback.
    #[must_use]
    pub fn new(
        primary: Arc<dyn SynthesisStrategy>,
        fallback: Option<Arc<dyn SynthesisStrategy>>,
        notifier: Arc<dyn AvatarNotifier>,
        config: SpeechPipelineConfig,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            params: config.params.clamped(),
            fallback_enabled: config.fallback_enabled,
            primary,
            fallback,
            notifier,
            buffer: Arc::new(PlaybackBufferController::new(config.buffer_capacity)),
            current: None,
            next_id: 1,
            on_fallback: false,
            fallback_used: false,
            stream_finished: false,
            fragments: Vec::new(),
            last_fragment: None,
            started_at: None,
            signal_tx,
            signal_rx: Some(signal_rx),
            event_tx,
            event_rx: Some(event_rx),
        }
    }

    /// Take the strategy signal receiver. The owner must feed every received
    /// signal back into [`handle_signal`](Self::handle_signal).
    pub fn take_signal_receiver(
        &mut self,
    ) -> Option<mpsc::UnboundedReceiver<(UtteranceId, StrategySignal)>> {
        self.signal_rx.take()
    }

    /// Take the event receiver for observers.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SpeechEvent>> {
        self.event_rx.take()
    }

    /// The playback buffer, shared with the audio output.
    #[must_use]
    pub fn buffer(&self) -> Arc<PlaybackBufferController> {
        Arc::clone(&self.buffer)
    }

    // ── Public operations ──────────────────────────────────────────

    /// Speak `text`, superseding any utterance in flight (the previous one
    /// is cancelled first, its buffered audio flushed).
    pub fn speak(&mut self, text: &str) -> Result<UtteranceId, SpeechError> {
        let normalized = text::normalize(text).ok_or(SpeechError::EmptyText)?;
        self.cancel_current();
        Ok(self.begin_utterance(normalized))
    }

    /// Speak `text` only if nothing is in flight; otherwise return
    /// [`SpeechError::Busy`] and leave the active utterance untouched.
    pub fn try_speak(&mut self, text: &str) -> Result<UtteranceId, SpeechError> {
        let normalized = text::normalize(text).ok_or(SpeechError::EmptyText)?;
        if self
            .current
            .as_ref()
            .is_some_and(|u| !u.state.is_terminal())
        {
            return Err(SpeechError::Busy);
        }
        Ok(self.begin_utterance(normalized))
    }

    /// Suspend playback of the current utterance. No-op unless speaking.
    pub fn pause(&mut self) {
        if self.state() != UtteranceState::Speaking {
            return;
        }
        self.buffer.pause();
        self.active_strategy().pause();
        self.transition(UtteranceState::Paused);
    }

    /// Resume a paused utterance. No-op unless paused.
    pub fn resume(&mut self) {
        if self.state() != UtteranceState::Paused {
            return;
        }
        self.buffer.resume();
        self.active_strategy().resume();
        self.transition(UtteranceState::Speaking);
    }

    /// Stop the current utterance, flushing buffered audio immediately.
    /// Idempotent; a no-op when nothing is in flight.
    pub fn stop(&mut self) {
        self.cancel_current();
    }

    /// Replace the speech parameters used for subsequent utterances. The
    /// utterance in flight keeps the parameters it started with.
    pub fn set_params(&mut self, params: SpeechParams) {
        self.params = params.clamped();
    }

    /// Current speech parameters.
    #[must_use]
    pub fn params(&self) -> &SpeechParams {
        &self.params
    }

    /// State of the current utterance, or `Idle` when none exists.
    #[must_use]
    pub fn state(&self) -> UtteranceState {
        self.current
            .as_ref()
            .map_or(UtteranceState::Idle, |u| u.state)
    }

    /// The current utterance, if any (terminal ones linger until the next
    /// `speak`).
    #[must_use]
    pub fn current(&self) -> Option<&Utterance> {
        self.current.as_ref()
    }

    // ── Signal handling ────────────────────────────────────────────

    /// Apply one strategy signal. Signals tagged with anything other than
    /// the live utterance id are discarded.
    pub fn handle_signal(&mut self, id: UtteranceId, signal: StrategySignal) {
        let live = self
            .current
            .as_ref()
            .is_some_and(|u| u.id == id && !u.state.is_terminal());
        if !live {
            tracing::trace!(utterance = %id, ?signal, "Dropping stale signal");
            return;
        }

        match signal {
            StrategySignal::Started => {
                if self.state() == UtteranceState::Requesting {
                    self.started_at = Some(Instant::now());
                    self.transition(UtteranceState::Speaking);
                    self.notifier.utterance_started(id);
                }
            }
            StrategySignal::Progress { char_index } => {
                self.progress_to(id, char_index);
            }
            StrategySignal::Finished => {
                self.stream_finished = true;
                self.try_complete();
            }
            StrategySignal::Failed { retryable, reason } => {
                self.handle_failure(id, retryable, reason);
            }
        }
    }

    /// Periodic poll. Completion of a chunk-streaming utterance happens
    /// here, once the strategy has finished and the buffer has drained.
    pub fn on_tick(&mut self) {
        self.try_complete();
    }

    // ── Internals ──────────────────────────────────────────────────

    fn begin_utterance(&mut self, text: String) -> UtteranceId {
        let id = UtteranceId(self.next_id);
        self.next_id += 1;

        self.on_fallback = false;
        self.fallback_used = false;
        self.stream_finished = false;
        self.fragments = text::fragments(&text);
        self.last_fragment = None;
        self.started_at = None;

        let params = self.params.clone();
        let kind = self.primary.kind();
        self.current = Some(Utterance {
            id,
            text: text.clone(),
            strategy: kind,
            state: UtteranceState::Requesting,
            params: params.clone(),
        });

        tracing::info!(utterance = %id, ?kind, chars = text.chars().count(), "Speaking");
        self.emit(SpeechEvent::StateChanged {
            utterance: id,
            state: UtteranceState::Requesting,
        });

        self.buffer.begin_utterance(id, kind.produces_chunks());
        self.primary.start(SynthesisRequest {
            id,
            text,
            params,
            buffer: Arc::clone(&self.buffer),
            signals: SignalSender::new(id, self.signal_tx.clone()),
        });

        id
    }

    fn cancel_current(&mut self) {
        let Some(utterance) = self.current.as_ref() else {
            return;
        };
        if utterance.state.is_terminal() {
            return;
        }

        let id = utterance.id;
        tracing::debug!(utterance = %id, "Cancelling");

        self.active_strategy().stop();
        // Retag before flushing so in-flight producer chunks go stale
        // rather than landing in an empty buffer.
        self.buffer.clear_utterance();
        self.stream_finished = false;
        self.transition(UtteranceState::Cancelled);
    }

    fn handle_failure(&mut self, id: UtteranceId, retryable: bool, reason: String) {
        let eligible = retryable
            && self.fallback_enabled
            && !self.fallback_used
            && matches!(
                self.state(),
                UtteranceState::Requesting | UtteranceState::Speaking
            );

        let fallback = if eligible { self.fallback.clone() } else { None };
        let Some(fallback) = fallback else {
            tracing::warn!(utterance = %id, retryable, %reason, "Utterance failed");
            self.active_strategy().stop();
            self.buffer.clear_utterance();
            self.stream_finished = false;
            self.transition(UtteranceState::Failed);
            return;
        };

        tracing::warn!(utterance = %id, %reason, "Primary strategy failed, engaging fallback");
        self.fallback_used = true;
        self.on_fallback = true;

        // Discard whatever the primary half-delivered.
        self.primary.stop();
        self.stream_finished = false;
        self.last_fragment = None;

        let kind = fallback.kind();
        let Some(utterance) = self.current.as_mut() else {
            return;
        };
        utterance.strategy = kind;
        let text = utterance.text.clone();
        let params = utterance.params.clone();

        self.emit(SpeechEvent::FallbackEngaged {
            utterance: id,
            reason,
        });
        self.transition(UtteranceState::Requesting);

        // Same id, fresh sequence numbering; stale primary chunks bounce.
        self.buffer.begin_utterance(id, kind.produces_chunks());
        fallback.start(SynthesisRequest {
            id,
            text,
            params,
            buffer: Arc::clone(&self.buffer),
            signals: SignalSender::new(id, self.signal_tx.clone()),
        });
    }

    fn progress_to(&mut self, id: UtteranceId, char_index: usize) {
        let Some(index) = text::fragment_at(&self.fragments, char_index) else {
            return;
        };
        if self.last_fragment == Some(index) {
            return;
        }
        self.last_fragment = Some(index);

        let fragment = self.fragments[index].clone();
        let elapsed = self
            .started_at
            .map_or(Duration::ZERO, |started| started.elapsed());
        self.notifier.fragment_spoken(id, &fragment, elapsed);
        self.emit(SpeechEvent::Fragment {
            utterance: id,
            index,
            text: fragment.text,
        });
    }

    fn try_complete(&mut self) {
        if !self.stream_finished {
            return;
        }
        if !matches!(
            self.state(),
            UtteranceState::Requesting | UtteranceState::Speaking
        ) {
            return;
        }
        if !self.buffer.is_drained() {
            return;
        }

        self.stream_finished = false;
        self.buffer.clear_utterance();
        self.transition(UtteranceState::Completed);
    }

    fn transition(&mut self, state: UtteranceState) {
        let Some(utterance) = self.current.as_mut() else {
            return;
        };
        if utterance.state == state {
            return;
        }

        let id = utterance.id;
        tracing::debug!(utterance = %id, from = ?utterance.state, to = ?state, "State transition");
        utterance.state = state;

        self.emit(SpeechEvent::StateChanged {
            utterance: id,
            state,
        });
        if state.is_terminal() {
            self.notifier.utterance_ended(id, state);
        }
    }

    fn active_strategy(&self) -> Arc<dyn SynthesisStrategy> {
        if self.on_fallback
            && let Some(fallback) = self.fallback.as_ref()
        {
            return Arc::clone(fallback);
        }
        Arc::clone(&self.primary)
    }

    fn emit(&self, event: SpeechEvent) {
        let _ = self.event_tx.send(event);
    }
}
