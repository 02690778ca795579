//! Async service wrapper around the pipeline.
//!
//! The [`SpeechPipeline`] is single-task by design; the service owns it in
//! one control task that multiplexes caller commands, strategy signals, and
//! a periodic completion tick. Callers interact through a cloneable
//! [`SpeechHandle`].

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;

use headtalk_core::SpeechParams;

use crate::error::SpeechError;
use crate::pipeline::SpeechPipeline;
use crate::utterance::{UtteranceId, UtteranceState};

/// How often the control task polls the pipeline for drain completion.
const TICK_PERIOD: Duration = Duration::from_millis(20);

enum Command {
    Speak {
        text: String,
        reply: oneshot::Sender<Result<UtteranceId, SpeechError>>,
    },
    TrySpeak {
        text: String,
        reply: oneshot::Sender<Result<UtteranceId, SpeechError>>,
    },
    Pause,
    Resume,
    Stop,
    SetParams(SpeechParams),
    State {
        reply: oneshot::Sender<UtteranceState>,
    },
    Shutdown,
}

/// Spawns and owns the pipeline control task.
pub struct SpeechService;

impl SpeechService {
    /// Move `pipeline` into a control task and return a handle to it.
    ///
    /// Take the event receiver from the pipeline before spawning if you
    /// want to observe [`SpeechEvent`](crate::pipeline::SpeechEvent)s.
    pub fn spawn(mut pipeline: SpeechPipeline) -> SpeechHandle {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();

        // The pipeline holds the matching sender, so this receiver stays
        // open for the lifetime of the task.
        let mut signal_rx = pipeline
            .take_signal_receiver()
            .unwrap_or_else(|| mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(TICK_PERIOD);
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    cmd = cmd_rx.recv() => {
                        let Some(cmd) = cmd else { break };
                        if matches!(cmd, Command::Shutdown) {
                            break;
                        }
                        handle_command(&mut pipeline, cmd);
                    }
                    signal = signal_rx.recv() => {
                        if let Some((id, signal)) = signal {
                            pipeline.handle_signal(id, signal);
                        }
                    }
                    _ = tick.tick() => {
                        pipeline.on_tick();
                    }
                }
            }

            pipeline.stop();
            tracing::debug!("Speech service task exiting");
        });

        SpeechHandle { tx: cmd_tx }
    }
}

fn handle_command(pipeline: &mut SpeechPipeline, cmd: Command) {
    match cmd {
        Command::Speak { text, reply } => {
            let _ = reply.send(pipeline.speak(&text));
        }
        Command::TrySpeak { text, reply } => {
            let _ = reply.send(pipeline.try_speak(&text));
        }
        Command::Pause => pipeline.pause(),
        Command::Resume => pipeline.resume(),
        Command::Stop => pipeline.stop(),
        Command::SetParams(params) => pipeline.set_params(params),
        Command::State { reply } => {
            let _ = reply.send(pipeline.state());
        }
        Command::Shutdown => {}
    }
}

/// Cloneable handle to a running speech service.
#[derive(Clone)]
pub struct SpeechHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl SpeechHandle {
    /// Speak `text`, superseding any utterance in flight.
    pub async fn speak(&self, text: impl Into<String>) -> Result<UtteranceId, SpeechError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Speak {
            text: text.into(),
            reply,
        })?;
        rx.await.map_err(|_| SpeechError::ServiceClosed)?
    }

    /// Speak `text` only if nothing is in flight.
    pub async fn try_speak(&self, text: impl Into<String>) -> Result<UtteranceId, SpeechError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::TrySpeak {
            text: text.into(),
            reply,
        })?;
        rx.await.map_err(|_| SpeechError::ServiceClosed)?
    }

    /// Suspend playback of the current utterance.
    pub fn pause(&self) -> Result<(), SpeechError> {
        self.send(Command::Pause)
    }

    /// Resume a paused utterance.
    pub fn resume(&self) -> Result<(), SpeechError> {
        self.send(Command::Resume)
    }

    /// Stop the current utterance and flush buffered audio.
    pub fn stop(&self) -> Result<(), SpeechError> {
        self.send(Command::Stop)
    }

    /// Replace the parameters used for subsequent utterances.
    pub fn set_params(&self, params: SpeechParams) -> Result<(), SpeechError> {
        self.send(Command::SetParams(params))
    }

    /// State of the current utterance.
    pub async fn state(&self) -> Result<UtteranceState, SpeechError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::State { reply })?;
        rx.await.map_err(|_| SpeechError::ServiceClosed)
    }

    /// Stop the service task. Outstanding commands are dropped.
    pub fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown);
    }

    fn send(&self, cmd: Command) -> Result<(), SpeechError> {
        self.tx.send(cmd).map_err(|_| SpeechError::ServiceClosed)
    }
}
