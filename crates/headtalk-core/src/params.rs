//! Speech parameters — the per-utterance knobs a caller can set.

use serde::{Deserialize, Serialize};

/// Rate multiplier bounds (matches what speech engines commonly accept).
const RATE_RANGE: (f32, f32) = (0.5, 2.0);

/// Pitch multiplier bounds.
const PITCH_RANGE: (f32, f32) = (0.0, 2.0);

/// Parameters for one spoken utterance.
///
/// Immutable for the lifetime of an utterance — the engine copies them at
/// request time, so later edits (e.g. a slider move) affect only the next
/// `speak` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechParams {
    /// Speaking rate multiplier (0.5–2.0, 1.0 = normal).
    pub rate: f32,

    /// Pitch multiplier (0.0–2.0, 1.0 = normal).
    pub pitch: f32,

    /// Output volume (0.0 = muted, 1.0 = full).
    pub volume: f32,

    /// Voice identifier (engine-specific meaning, e.g. `"alloy"`).
    pub voice: String,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: "alloy".to_string(),
        }
    }
}

impl SpeechParams {
    /// Return a copy with every numeric field clamped to its valid range.
    #[must_use]
    pub fn clamped(mut self) -> Self {
        self.rate = self.rate.clamp(RATE_RANGE.0, RATE_RANGE.1);
        self.pitch = self.pitch.clamp(PITCH_RANGE.0, PITCH_RANGE.1);
        self.volume = self.volume.clamp(0.0, 1.0);
        self
    }

    /// Whether the volume is effectively zero.
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.volume <= f32::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_neutral() {
        let p = SpeechParams::default();
        assert!((p.rate - 1.0).abs() < f32::EPSILON);
        assert!((p.volume - 1.0).abs() < f32::EPSILON);
        assert!(!p.is_muted());
    }

    #[test]
    fn clamped_restricts_ranges() {
        let p = SpeechParams {
            rate: 10.0,
            pitch: -1.0,
            volume: 2.0,
            voice: "alloy".into(),
        }
        .clamped();

        assert!((p.rate - 2.0).abs() < f32::EPSILON);
        assert!(p.pitch.abs() < f32::EPSILON);
        assert!((p.volume - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn zero_volume_is_muted() {
        let p = SpeechParams {
            volume: 0.0,
            ..SpeechParams::default()
        };
        assert!(p.is_muted());
    }
}
