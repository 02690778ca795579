//! Speaker profiles and the persistence port.
//!
//! A profile is a named bundle of plain parameter values. Storage lives
//! outside the engine — a database, a config file, a browser — behind the
//! [`ProfileStore`] port. The engine only reads values at utterance-start
//! time and never touches the store itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::params::SpeechParams;

/// A named, persisted set of speech parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeakerProfile {
    /// Display name, unique per store.
    pub name: String,

    /// Voice identifier.
    pub voice: String,

    /// Speaking rate multiplier.
    pub rate: f32,

    /// Pitch multiplier.
    pub pitch: f32,

    /// Output volume.
    pub volume: f32,

    /// Whether audible output is suppressed (avatar still animates).
    pub muted: bool,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SpeakerProfile {
    /// Build a profile from the current parameters.
    #[must_use]
    pub fn from_params(name: impl Into<String>, params: &SpeechParams, muted: bool) -> Self {
        Self {
            name: name.into(),
            voice: params.voice.clone(),
            rate: params.rate,
            pitch: params.pitch,
            volume: params.volume,
            muted,
            created_at: Utc::now(),
        }
    }

    /// Convert back into engine parameters (clamped).
    #[must_use]
    pub fn to_params(&self) -> SpeechParams {
        SpeechParams {
            rate: self.rate,
            pitch: self.pitch,
            volume: if self.muted { 0.0 } else { self.volume },
            voice: self.voice.clone(),
        }
        .clamped()
    }
}

/// Errors a profile store can report.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// No profile with the given name exists.
    #[error("Profile '{0}' not found")]
    NotFound(String),

    /// A profile with the given name already exists.
    #[error("Profile '{0}' already exists")]
    Duplicate(String),

    /// The backing store failed.
    #[error("Profile store failure: {0}")]
    Store(String),
}

/// Port implemented by an external profile store.
///
/// Object-safe (`Box<dyn ProfileStore>` / `Arc<dyn ProfileStore>`); all
/// methods take `&self` so implementations use interior mutability or a
/// connection handle.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Persist a profile. Fails with [`ProfileError::Duplicate`] if the name
    /// is taken.
    async fn save(&self, profile: &SpeakerProfile) -> Result<(), ProfileError>;

    /// List all profiles, newest first.
    async fn list(&self) -> Result<Vec<SpeakerProfile>, ProfileError>;

    /// Fetch one profile by name.
    async fn get(&self, name: &str) -> Result<SpeakerProfile, ProfileError>;

    /// Delete a profile by name.
    async fn delete(&self, name: &str) -> Result<(), ProfileError>;
}
