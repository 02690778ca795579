//! Core domain types and port definitions for headtalk.
//!
//! This crate holds the types shared between the speech engine and any
//! frontend: speech parameters, speaker profiles (plus the persistence port
//! an external store implements), and the remote voice catalog. It contains
//! no engine logic and no I/O.

pub mod params;
pub mod profile;
pub mod voices;

// Re-export commonly used types for convenience
pub use params::SpeechParams;
pub use profile::{ProfileError, ProfileStore, SpeakerProfile};
pub use voices::{VoiceGender, VoiceInfo, remote_voices};
