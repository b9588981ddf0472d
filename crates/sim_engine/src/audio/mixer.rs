//! Audio mixer
//!
//! Volume and mute state per [`AudioKind`] under a master volume.

use std::collections::HashMap;

use super::AudioKind;

/// Volume levels and mute flags for each audio kind
#[derive(Debug, Clone)]
pub struct AudioMixer {
    master: f32,
    volumes: HashMap<AudioKind, f32>,
    muted: HashMap<AudioKind, bool>,
}

impl AudioMixer {
    /// Create a mixer with every volume at full
    pub fn new() -> Self {
        let mut volumes = HashMap::new();
        volumes.insert(AudioKind::Music, 1.0);
        volumes.insert(AudioKind::Effect, 1.0);

        Self {
            master: 1.0,
            volumes,
            muted: HashMap::new(),
        }
    }

    /// Set master volume (0.0 to 1.0)
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master = volume.clamp(0.0, 1.0);
    }

    /// Volume applied on top of every channel
    pub fn master_volume(&self) -> f32 {
        self.master
    }

    /// Set volume for one kind (0.0 to 1.0)
    pub fn set_volume(&mut self, kind: AudioKind, volume: f32) {
        self.volumes.insert(kind, volume.clamp(0.0, 1.0));
    }

    /// Channel volume before the master scale
    pub fn volume(&self, kind: AudioKind) -> f32 {
        self.volumes.get(&kind).copied().unwrap_or(1.0)
    }

    /// Volume a clip of this kind is actually played at
    pub fn effective_volume(&self, kind: AudioKind) -> f32 {
        if self.is_muted(kind) {
            return 0.0;
        }
        self.volume(kind) * self.master
    }

    /// Silence one channel without forgetting its volume
    pub fn mute(&mut self, kind: AudioKind) {
        self.muted.insert(kind, true);
    }

    /// Restore a muted channel
    pub fn unmute(&mut self, kind: AudioKind) {
        self.muted.insert(kind, false);
    }

    /// Whether the channel is muted
    pub fn is_muted(&self, kind: AudioKind) -> bool {
        self.muted.get(&kind).copied().unwrap_or(false)
    }

    /// Flip the mute state of one channel
    pub fn toggle_mute(&mut self, kind: AudioKind) {
        let muted = self.is_muted(kind);
        self.muted.insert(kind, !muted);
    }
}

impl Default for AudioMixer {
    fn default() -> Self {
        Self::new()
    }
}
