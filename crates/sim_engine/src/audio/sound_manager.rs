//! Device-less sound manager
//!
//! Tracks which clips are loaded and what each [`AudioKind`] slot is doing.
//! Actual sample output belongs to a platform backend; this manager keeps the
//! bookkeeping so game code and tests behave the same with or without one.

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use super::{AudioError, AudioKind, AudioMixer, SoundBackend};
use crate::engine::{EngineComponent, EngineError};

/// State of one playback slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    /// Nothing queued
    Stopped,
    /// Clip currently playing
    Playing(String),
    /// Clip paused mid-playback
    Paused(String),
}

#[derive(Debug, Default)]
struct SoundState {
    loaded: HashSet<(String, AudioKind)>,
    slots: HashMap<AudioKind, Playback>,
    mixer: AudioMixer,
}

/// Sound capability without an output device
#[derive(Debug, Default)]
pub struct SoundManager {
    asset_root: Option<PathBuf>,
    state: Mutex<SoundState>,
}

impl SoundManager {
    /// Manager that accepts any clip name
    pub fn new() -> Self {
        Self::default()
    }

    /// Manager that requires clips to exist as files under `root`
    pub fn with_asset_root(root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: Some(root.into()),
            state: Mutex::default(),
        }
    }

    /// Current state of a slot
    pub fn playback(&self, kind: AudioKind) -> Playback {
        self.state
            .lock()
            .slots
            .get(&kind)
            .cloned()
            .unwrap_or(Playback::Stopped)
    }

    /// Whether `name` has been loaded for `kind`
    pub fn is_loaded(&self, name: &str, kind: AudioKind) -> bool {
        self.state.lock().loaded.contains(&(name.to_string(), kind))
    }

    /// Volume the slot currently plays at
    pub fn effective_volume(&self, kind: AudioKind) -> f32 {
        self.state.lock().mixer.effective_volume(kind)
    }

    /// Adjust the mixer directly (master volume, mute)
    pub fn with_mixer<R>(&self, f: impl FnOnce(&mut AudioMixer) -> R) -> R {
        f(&mut self.state.lock().mixer)
    }
}

impl SoundBackend for SoundManager {
    fn load_audio(&self, name: &str, kind: AudioKind) -> Result<(), AudioError> {
        if let Some(root) = &self.asset_root {
            let path = root.join(name);
            if !path.is_file() {
                return Err(AudioError::FileNotFound(path));
            }
        }
        self.state.lock().loaded.insert((name.to_string(), kind));
        log::debug!("Loaded {kind} clip '{name}'");
        Ok(())
    }

    fn play_audio(&self, name: &str, kind: AudioKind) -> Result<(), AudioError> {
        let mut state = self.state.lock();
        if !state.loaded.contains(&(name.to_string(), kind)) {
            return Err(AudioError::NotLoaded {
                name: name.to_string(),
                kind,
            });
        }
        state.slots.insert(kind, Playback::Playing(name.to_string()));
        Ok(())
    }

    fn pause_audio(&self, kind: AudioKind) {
        let mut state = self.state.lock();
        if let Some(Playback::Playing(name)) = state.slots.get(&kind).cloned() {
            state.slots.insert(kind, Playback::Paused(name));
        }
    }

    fn resume_audio(&self, kind: AudioKind) {
        let mut state = self.state.lock();
        if let Some(Playback::Paused(name)) = state.slots.get(&kind).cloned() {
            state.slots.insert(kind, Playback::Playing(name));
        }
    }

    fn stop_audio(&self, kind: AudioKind) {
        self.state.lock().slots.remove(&kind);
    }

    fn set_volume(&self, value: f32, kind: AudioKind) {
        self.state.lock().mixer.set_volume(kind, value);
    }
}

impl EngineComponent for SoundManager {
    fn name(&self) -> &str {
        "sound_manager"
    }

    fn initialize(&self) -> Result<(), EngineError> {
        match &self.asset_root {
            Some(root) => log::info!("Sound manager reading clips from {}", root.display()),
            None => log::info!("Sound manager running without an asset root"),
        }
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        self.state.lock().slots.clear();
        log::debug!("Sound manager stopped all playback");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_play_requires_load() {
        let sound = SoundManager::new();
        assert_eq!(
            sound.play_audio("theme", AudioKind::Music),
            Err(AudioError::NotLoaded {
                name: "theme".to_string(),
                kind: AudioKind::Music,
            })
        );

        sound.load_audio("theme", AudioKind::Music).unwrap();
        sound.play_audio("theme", AudioKind::Music).unwrap();
        assert_eq!(sound.playback(AudioKind::Music), Playback::Playing("theme".into()));
    }

    #[test]
    fn test_clip_loaded_for_other_kind_is_not_loaded() {
        let sound = SoundManager::new();
        sound.load_audio("hit", AudioKind::Effect).unwrap();
        assert!(matches!(
            sound.play_audio("hit", AudioKind::Music),
            Err(AudioError::NotLoaded { .. })
        ));
    }

    #[test]
    fn test_pause_resume_stop() {
        let sound = SoundManager::new();
        sound.load_audio("theme", AudioKind::Music).unwrap();
        sound.load_audio("hit", AudioKind::Effect).unwrap();
        sound.play_audio("theme", AudioKind::Music).unwrap();
        sound.play_audio("hit", AudioKind::Effect).unwrap();

        sound.pause_audio(AudioKind::Music);
        assert_eq!(sound.playback(AudioKind::Music), Playback::Paused("theme".into()));
        assert_eq!(sound.playback(AudioKind::Effect), Playback::Playing("hit".into()));

        sound.resume_audio(AudioKind::Music);
        assert_eq!(sound.playback(AudioKind::Music), Playback::Playing("theme".into()));

        sound.stop_audio(AudioKind::Music);
        assert_eq!(sound.playback(AudioKind::Music), Playback::Stopped);

        // Resuming a stopped slot does nothing
        sound.resume_audio(AudioKind::Music);
        assert_eq!(sound.playback(AudioKind::Music), Playback::Stopped);
    }

    #[test]
    fn test_volume_goes_through_mixer() {
        let sound = SoundManager::new();
        sound.set_volume(0.5, AudioKind::Effect);
        sound.with_mixer(|mixer| mixer.set_master_volume(0.5));

        assert_relative_eq!(sound.effective_volume(AudioKind::Effect), 0.25);
        assert_relative_eq!(sound.effective_volume(AudioKind::Music), 0.5);
    }

    #[test]
    fn test_asset_root_rejects_missing_files() {
        let dir = std::env::temp_dir().join(format!("sim_engine_audio_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("present.ogg"), b"").unwrap();

        let sound = SoundManager::with_asset_root(&dir);
        sound.load_audio("present.ogg", AudioKind::Effect).unwrap();
        assert_eq!(
            sound.load_audio("absent.ogg", AudioKind::Effect),
            Err(AudioError::FileNotFound(dir.join("absent.ogg")))
        );

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_shutdown_stops_playback() {
        let sound = SoundManager::new();
        sound.load_audio("theme", AudioKind::Music).unwrap();
        sound.play_audio("theme", AudioKind::Music).unwrap();
        sound.shutdown().unwrap();
        assert_eq!(sound.playback(AudioKind::Music), Playback::Stopped);
        assert!(sound.is_loaded("theme", AudioKind::Music));
    }
}
