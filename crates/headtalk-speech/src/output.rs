//! Audio output thread.
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated OS
//! thread for its whole life. The real-time callback drains the shared
//! [`PlaybackBufferController`] into a preallocated mono scratch buffer and
//! fans it out to the device's channel count; when the buffer has nothing,
//! the controller hands back silence, so the callback never blocks.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::buffer::PlaybackBufferController;
use crate::error::SpeechError;

/// Sample rate the synthesis side produces (OpenAI PCM output).
pub const OUTPUT_SAMPLE_RATE: u32 = 24_000;

/// Mono samples the callback processes per pass of its scratch buffer.
const SCRATCH_SAMPLES: usize = 4096;

/// Handle to the running audio output thread.
///
/// Dropping the handle shuts the stream down and joins the thread.
pub struct AudioOutputHandle {
    shutdown_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutputHandle {
    /// Open the default output device and start draining `buffer` at
    /// [`OUTPUT_SAMPLE_RATE`]. Blocks until the stream is playing or setup
    /// has failed.
    pub fn spawn(buffer: Arc<PlaybackBufferController>) -> Result<Self, SpeechError> {
        let (init_tx, init_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name("headtalk-audio".to_string())
            .spawn(move || match open_stream(&buffer) {
                Ok(stream) => {
                    let _ = init_tx.send(Ok(()));
                    // Hold the stream until shutdown; recv also returns when
                    // the handle is dropped without an explicit send.
                    let _ = shutdown_rx.recv();
                    drop(stream);
                    tracing::debug!("Audio output thread exiting");
                }
                Err(err) => {
                    let _ = init_tx.send(Err(err));
                }
            })
            .map_err(|err| SpeechError::OutputStream(err.to_string()))?;

        match init_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                shutdown_tx: Some(shutdown_tx),
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => Err(SpeechError::AudioThreadDied),
        }
    }
}

impl Drop for AudioOutputHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn open_stream(buffer: &Arc<PlaybackBufferController>) -> Result<cpal::Stream, SpeechError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(SpeechError::NoOutputDevice)?;

    let default_config = device
        .default_output_config()
        .map_err(|err| SpeechError::OutputStream(err.to_string()))?;
    let channels = usize::from(default_config.channels());

    let config = cpal::StreamConfig {
        channels: default_config.channels(),
        sample_rate: cpal::SampleRate(OUTPUT_SAMPLE_RATE),
        buffer_size: cpal::BufferSize::Default,
    };

    tracing::info!(
        device = device.name().unwrap_or_else(|_| "<unknown>".into()),
        channels,
        sample_rate = OUTPUT_SAMPLE_RATE,
        "Opening audio output stream"
    );

    let buffer = Arc::clone(buffer);
    let mut scratch = vec![0.0f32; SCRATCH_SAMPLES];

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frames in data.chunks_mut(SCRATCH_SAMPLES * channels) {
                    let mono = frames.len() / channels;
                    buffer.drain(&mut scratch[..mono]);
                    fan_out(&scratch[..mono], frames, channels);
                }
            },
            |err| tracing::error!(error = %err, "Audio output stream error"),
            None,
        )
        .map_err(|err| SpeechError::OutputStream(err.to_string()))?;

    stream
        .play()
        .map_err(|err| SpeechError::OutputStream(err.to_string()))?;

    Ok(stream)
}

/// Copy mono samples into an interleaved frame, duplicating each sample
/// across every channel.
fn fan_out(mono: &[f32], interleaved: &mut [f32], channels: usize) {
    for (frame, &sample) in interleaved.chunks_mut(channels).zip(mono) {
        frame.fill(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_out_duplicates_across_channels() {
        let mono = [0.1f32, 0.2, 0.3];
        let mut interleaved = [0.0f32; 6];
        fan_out(&mono, &mut interleaved, 2);
        assert_eq!(interleaved, [0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn fan_out_mono_passthrough() {
        let mono = [0.5f32, -0.5];
        let mut interleaved = [0.0f32; 2];
        fan_out(&mono, &mut interleaved, 1);
        assert_eq!(interleaved, [0.5, -0.5]);
    }
}
