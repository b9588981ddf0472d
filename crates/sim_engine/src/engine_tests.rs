//! Engine lifecycle: preconditions, crash isolation and shutdown ordering

use parking_lot::Mutex;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::audio::{AudioError, AudioKind, SoundBackend};
use crate::core::EngineConfig;
use crate::ecs::component::{Component, ComponentBase};
use crate::ecs::Entity;
use crate::engine::{Capability, Engine, EngineBuilder, EngineComponent, EngineError};
use crate::events::EventBus;
use crate::foundation::logging::{CrashReport, EngineLogger, LogLevel};
use crate::input::{InputBackend, InputError, KeyAction, KeyCallback};
use crate::physics::PhysicsBackend;
use crate::render::GraphicsBackend;

type Journal = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy)]
enum Mode {
    Return,
    Block,
    Panic,
    Fail,
    FailOnce,
}

/// Component standing in for any capability; records lifecycle calls
struct Stub {
    name: &'static str,
    mode: Mode,
    journal: Journal,
    stop: AtomicBool,
}

impl Stub {
    fn new(name: &'static str, mode: Mode, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name,
            mode,
            journal: journal.clone(),
            stop: AtomicBool::new(false),
        })
    }
}

impl EngineComponent for Stub {
    fn name(&self) -> &str {
        self.name
    }

    fn initialize(&self) -> Result<(), EngineError> {
        self.journal.lock().push(format!("init:{}", self.name));
        match self.mode {
            Mode::Return => Ok(()),
            Mode::Block => {
                while !self.stop.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(1));
                }
                Ok(())
            }
            Mode::Panic => panic!("{} blew up", self.name),
            Mode::Fail => Err(EngineError::ComponentFault {
                component: self.name.to_string(),
                reason: "device unavailable".to_string(),
            }),
            Mode::FailOnce => {
                if entries(&self.journal, "init:").len() == 1 {
                    Err(EngineError::ComponentFault {
                        component: self.name.to_string(),
                        reason: "cold start".to_string(),
                    })
                } else {
                    Ok(())
                }
            }
        }
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        self.journal.lock().push(format!("shutdown:{}", self.name));
        self.stop.store(true, Ordering::Release);
        Ok(())
    }
}

impl GraphicsBackend for Stub {
    fn render(&self) {}

    fn frame_count(&self) -> u64 {
        0
    }
}

impl PhysicsBackend for Stub {
    fn step(&self) {}

    fn tick_count(&self) -> u64 {
        0
    }

    fn average_tick_duration(&self) -> Option<Duration> {
        None
    }
}

impl SoundBackend for Stub {
    fn load_audio(&self, _name: &str, _kind: AudioKind) -> Result<(), AudioError> {
        Ok(())
    }

    fn play_audio(&self, _name: &str, _kind: AudioKind) -> Result<(), AudioError> {
        Ok(())
    }

    fn pause_audio(&self, _kind: AudioKind) {}

    fn resume_audio(&self, _kind: AudioKind) {}

    fn stop_audio(&self, _kind: AudioKind) {}

    fn set_volume(&self, _value: f32, _kind: AudioKind) {}
}

impl InputBackend for Stub {
    fn update(&self) {}

    fn register_keybind(&self, _action: KeyAction, _callback: KeyCallback) {}

    fn replace_keybind(&self, _old: KeyAction, _new: KeyAction) -> Result<(), InputError> {
        Ok(())
    }
}

/// Logger keeping everything in memory
#[derive(Default)]
struct RecordingLogger {
    messages: Mutex<Vec<(LogLevel, String)>>,
    reports: Mutex<Vec<CrashReport>>,
}

impl RecordingLogger {
    fn fatal_messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .filter(|(level, _)| *level == LogLevel::Fatal)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl EngineLogger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        self.messages.lock().push((level, message.to_string()));
    }

    fn dump_crash_report(&self, report: &CrashReport) -> io::Result<PathBuf> {
        self.reports.lock().push(report.clone());
        Ok(PathBuf::from(report.file_name()))
    }
}

fn builder(logger: &Arc<RecordingLogger>) -> EngineBuilder {
    Engine::builder(EngineConfig::default()).with_logger(logger.clone())
}

fn entries(journal: &Journal, prefix: &str) -> Vec<String> {
    journal
        .lock()
        .iter()
        .filter_map(|entry| entry.strip_prefix(prefix).map(str::to_string))
        .collect()
}

fn wait_for(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_missing_graphics_refuses_to_start() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let physics = Stub::new("physics", Mode::Return, &journal);
    let engine = builder(&logger)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .register_physics(move |_| physics, true)
        .build();

    assert_eq!(
        engine.initialize(),
        Err(EngineError::MissingCapability(Capability::Graphics))
    );
    assert!(!engine.is_running());
    assert!(journal.lock().is_empty());
    assert_eq!(logger.fatal_messages().len(), 1);
}

#[test]
fn test_missing_event_bus_refuses_to_start() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let graphics = Stub::new("graphics", Mode::Return, &journal);
    let engine = builder(&logger)
        .register_graphics(move |_| graphics, false)
        .build();

    assert_eq!(
        engine.initialize(),
        Err(EngineError::MissingCapability(Capability::EventBus))
    );
    assert!(!engine.is_running());
    assert!(journal.lock().is_empty());
}

#[test]
fn test_graphics_initializes_first_and_shutdown_follows_priority() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let (input, sound) = (
        Stub::new("input", Mode::Return, &journal),
        Stub::new("sound", Mode::Return, &journal),
    );
    let (physics, graphics) = (
        Stub::new("physics", Mode::Return, &journal),
        Stub::new("graphics", Mode::Return, &journal),
    );
    let engine = builder(&logger)
        .register_input(move |_| input, false)
        .register_sound(move |_| sound, false)
        .register_physics(move |_| physics, false)
        .register_graphics(move |_| graphics, false)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .build();

    assert_eq!(engine.initialize(), Ok(()));

    assert_eq!(entries(&journal, "init:"), ["graphics", "input", "sound", "physics"]);
    assert_eq!(entries(&journal, "shutdown:"), ["sound", "physics", "graphics", "input"]);
    assert!(!engine.is_running());
    assert!(!engine.has_crashed());
}

#[test]
fn test_shutdown_is_idempotent() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let graphics = Stub::new("graphics", Mode::Return, &journal);
    let engine = builder(&logger)
        .register_graphics(move |_| graphics, false)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .build();

    engine.initialize().unwrap();
    engine.shutdown();
    engine.shutdown();

    assert_eq!(entries(&journal, "shutdown:"), ["graphics"]);
}

#[test]
fn test_dedicated_thread_panic_shuts_engine_down() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let graphics = Stub::new("graphics", Mode::Block, &journal);
    let physics = Stub::new("physics", Mode::Panic, &journal);
    let engine = builder(&logger)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .register_graphics(move |_| graphics, true)
        .register_physics(move |_| physics, true)
        .build();

    let result = engine.initialize();

    assert_eq!(
        result,
        Err(EngineError::ComponentFault {
            component: "physics".to_string(),
            reason: "physics blew up".to_string(),
        })
    );
    assert!(engine.has_crashed());
    assert!(!engine.is_running());

    // The blocked graphics loop was asked to stop; the dead physics thread was not
    assert_eq!(entries(&journal, "shutdown:"), ["graphics"]);

    let reports = logger.reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].component, "physics");
    assert!(reports[0].backtrace.as_deref().is_some_and(|trace| !trace.is_empty()));
    assert!(reports[0].render().contains("backtrace:"));
    assert!(logger.fatal_messages().iter().any(|m| m.contains("physics")));
}

#[test]
fn test_dedicated_thread_error_is_reported_like_a_panic() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let graphics = Stub::new("graphics", Mode::Block, &journal);
    let sound = Stub::new("sound", Mode::Fail, &journal);
    let engine = builder(&logger)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .register_graphics(move |_| graphics, true)
        .register_sound(move |_| sound, true)
        .build();

    let result = engine.initialize();

    assert!(matches!(result, Err(EngineError::ComponentFault { ref component, .. }) if component == "sound"));
    assert!(engine.has_crashed());
    let reports = logger.reports.lock();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].backtrace.is_some());
}

#[test]
fn test_restart_after_crash_reports_only_new_faults() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let graphics = Stub::new("graphics", Mode::FailOnce, &journal);
    let engine = builder(&logger)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .register_graphics(move |_| graphics, true)
        .build();

    assert!(matches!(
        engine.initialize(),
        Err(EngineError::ComponentFault { ref reason, .. }) if reason == "cold start"
    ));
    assert!(engine.has_crashed());

    assert_eq!(engine.initialize(), Ok(()));
    assert!(!engine.has_crashed());
    assert!(!engine.is_running());
    assert_eq!(entries(&journal, "init:"), ["graphics", "graphics"]);
    assert_eq!(logger.reports.lock().len(), 1);
}

#[test]
fn test_crash_report_written_by_default_logger() {
    let dir = std::env::temp_dir().join(format!("sim_engine_engine_{}", uuid::Uuid::new_v4()));
    let mut config = EngineConfig::default();
    config.logging.crash_report_dir = dir.to_string_lossy().to_string();
    let journal = Journal::default();
    let graphics = Stub::new("graphics", Mode::Panic, &journal);
    let engine = Engine::builder(config)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .register_graphics(move |_| graphics, true)
        .build();

    assert!(engine.initialize().is_err());

    let written: Vec<_> = std::fs::read_dir(&dir).unwrap().collect();
    assert_eq!(written.len(), 1);
    std::fs::remove_dir_all(dir).unwrap();
}

#[derive(Debug)]
struct StartCounter {
    base: ComponentBase,
    starts: AtomicUsize,
}

impl Component for StartCounter {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn type_tag(&self) -> &'static str {
        "StartCounter"
    }

    fn on_start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_running_engine_rejects_second_initialize_and_starts_late_components() {
    let logger = Arc::new(RecordingLogger::default());
    let journal = Journal::default();
    let graphics = Stub::new("graphics", Mode::Block, &journal);
    let engine = builder(&logger)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .register_graphics(move |_| graphics, true)
        .build();

    let early = engine.create_entity();
    let early_counter = early
        .attach_new(|owner| StartCounter {
            base: ComponentBase::new(owner),
            starts: AtomicUsize::new(0),
        })
        .unwrap();

    let runner = {
        let engine = engine.clone();
        thread::spawn(move || engine.initialize())
    };
    wait_for(|| entries(&journal, "init:").len() == 1);

    assert_eq!(engine.initialize(), Err(EngineError::AlreadyRunning));

    let late = engine.create_entity();
    let late_counter = late
        .attach_new(|owner| StartCounter {
            base: ComponentBase::new(owner),
            starts: AtomicUsize::new(0),
        })
        .unwrap();

    assert_eq!(early_counter.starts.load(Ordering::SeqCst), 1);
    assert_eq!(late_counter.starts.load(Ordering::SeqCst), 1);

    engine.shutdown();
    assert_eq!(runner.join().unwrap(), Ok(()));
    assert!(!engine.has_crashed());
}

#[test]
fn test_entity_created_listener_sees_children() {
    let engine = Engine::builder(EngineConfig::default())
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .build();
    let created = Arc::new(Mutex::new(Vec::new()));
    let sink = created.clone();
    engine.on_entity_created(Arc::new(move |entity: &Arc<Entity>| {
        sink.lock().push(entity.id().to_string());
    }));

    let parent = Entity::new();
    let child = Entity::new();
    parent.add_child(&child).unwrap();
    engine.add_entity(&parent);
    engine.add_entity(&parent);

    assert_eq!(*created.lock(), [parent.id().to_string(), child.id().to_string()]);
    assert_eq!(engine.entity_count(), 2);
    assert!(engine.find_entity(child.id()).is_some());
}
