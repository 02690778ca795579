//! Remote voice catalog — curated list of voices the remote synthesis
//! service offers.
//!
//! Local engine voices are enumerated at runtime by the engine collaborator;
//! only the remote service's fixed roster is known statically.

use serde::{Deserialize, Serialize};

/// Information about an available voice.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Voice identifier (used in API calls).
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Gender.
    pub gender: VoiceGender,
}

/// Voice gender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceGender {
    Female,
    Male,
    Neutral,
}

/// Voices offered by the remote synthesis service.
#[must_use]
pub fn remote_voices() -> Vec<VoiceInfo> {
    vec![
        voice_info("alloy", "Alloy (Neutral)", VoiceGender::Neutral),
        voice_info("echo", "Echo (Male)", VoiceGender::Male),
        voice_info("fable", "Fable (British Male)", VoiceGender::Male),
        voice_info("onyx", "Onyx (Deep Male)", VoiceGender::Male),
        voice_info("nova", "Nova (Female)", VoiceGender::Female),
        voice_info("shimmer", "Shimmer (Soft Female)", VoiceGender::Female),
    ]
}

fn voice_info(id: &str, name: &str, gender: VoiceGender) -> VoiceInfo {
    VoiceInfo {
        id: id.to_string(),
        name: name.to_string(),
        gender,
    }
}
