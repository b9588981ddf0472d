//! Sound capability
//!
//! Playback is addressed by clip name and [`AudioKind`]: music and effects
//! each have one playback slot, their own volume and their own pause state.

pub mod mixer;
pub mod sound_manager;

pub use mixer::AudioMixer;
pub use sound_manager::SoundManager;

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::engine::EngineComponent;

/// Audio channel category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioKind {
    /// Background music
    Music,
    /// Sound effects
    Effect,
}

impl fmt::Display for AudioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Music => f.write_str("music"),
            Self::Effect => f.write_str("effect"),
        }
    }
}

/// Audio errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// Playback requested for a clip that was never loaded
    #[error("{kind} clip '{name}' is not loaded")]
    NotLoaded {
        /// Clip name as passed to the backend
        name: String,
        /// Channel the clip was requested on
        kind: AudioKind,
    },

    /// Clip file does not exist under the asset root
    #[error("audio file not found: {0}")]
    FileNotFound(PathBuf),
}

/// Sound capability
pub trait SoundBackend: EngineComponent {
    /// Make a clip available for playback
    fn load_audio(&self, name: &str, kind: AudioKind) -> Result<(), AudioError>;

    /// Start playing a loaded clip on the kind's slot
    fn play_audio(&self, name: &str, kind: AudioKind) -> Result<(), AudioError>;

    /// Pause whatever plays on the kind's slot
    fn pause_audio(&self, kind: AudioKind);

    /// Resume a paused slot
    fn resume_audio(&self, kind: AudioKind);

    /// Stop and clear the kind's slot
    fn stop_audio(&self, kind: AudioKind);

    /// Set the kind's volume, clamped to `0.0..=1.0`
    fn set_volume(&self, value: f32, kind: AudioKind);
}
