//! Window-less frame driver
//!
//! Drives input polling, update and render notifications at a target frame
//! rate without a GPU. Useful for servers, tests and the sandbox. An optional
//! frame limit stops the whole engine once reached.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use crate::core::RenderLoopConfig;
use crate::engine::{EngineComponent, EngineError, EngineHandle};
use crate::events::{Tick, UI_RENDER_CHANNEL};
use crate::foundation::time::{remaining_in_period, Stopwatch, Timer};
use crate::render::GraphicsBackend;

/// Graphics capability with no output device
pub struct HeadlessRenderer {
    engine: EngineHandle,
    frame_period: Duration,
    max_frames: Option<u64>,
    running: AtomicBool,
    frames: AtomicU64,
    timer: Mutex<Timer>,
}

impl HeadlessRenderer {
    /// Stopped frame driver configured from `config`
    pub fn new(engine: EngineHandle, config: &RenderLoopConfig) -> Self {
        Self {
            engine,
            frame_period: config.frame_period(),
            max_frames: config.max_frames,
            running: AtomicBool::new(false),
            frames: AtomicU64::new(0),
            timer: Mutex::new(Timer::new()),
        }
    }

    /// Seconds elapsed since the loop started
    pub fn total_time(&self) -> f32 {
        self.timer.lock().total_time()
    }

    /// Advance one frame: poll input, update, render
    pub fn frame(&self) {
        let Some(engine) = self.engine.upgrade() else {
            return;
        };
        let delta = {
            let mut timer = self.timer.lock();
            timer.update();
            timer.delta_time()
        };

        if let Some(input) = engine.input() {
            input.update();
        }
        if let Some(bus) = engine.event_bus() {
            bus.notify_update(&Tick { delta });
        }
        self.render();
    }

    fn frame_limit_reached(&self) -> bool {
        self.max_frames
            .is_some_and(|limit| self.frame_count() >= limit)
    }
}

impl EngineComponent for HeadlessRenderer {
    fn name(&self) -> &str {
        "headless_renderer"
    }

    fn initialize(&self) -> Result<(), EngineError> {
        let engine = self.engine.engine()?;
        self.running.store(true, Ordering::Release);
        *self.timer.lock() = Timer::new();
        log::info!("Headless frame loop started at {:?} per frame", self.frame_period);

        while self.running.load(Ordering::Acquire) && engine.is_running() {
            let stopwatch = Stopwatch::start_new();
            self.frame();

            if self.frame_limit_reached() {
                log::info!("Frame limit of {} reached", self.frame_count());
                engine.shutdown();
                break;
            }

            if let Some(remaining) = remaining_in_period(self.frame_period, stopwatch.elapsed()) {
                thread::sleep(remaining);
            }
        }

        log::info!("Headless frame loop stopped after {} frames", self.frame_count());
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        self.running.store(false, Ordering::Release);
        Ok(())
    }
}

impl GraphicsBackend for HeadlessRenderer {
    fn render(&self) {
        if let Some(bus) = self.engine.upgrade().and_then(|engine| engine.event_bus()) {
            bus.notify_render();
            bus.trigger(UI_RENDER_CHANNEL);
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EngineConfig;
    use crate::engine::Engine;
    use crate::events::EventBus;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn test_render_triggers_ui_channel() {
        let engine = Engine::builder(EngineConfig::default())
            .register_event_bus(|_| Arc::new(EventBus::new()), false)
            .build();
        let renderer = HeadlessRenderer::new(engine.handle(), &RenderLoopConfig::default());
        let ui_passes = Arc::new(AtomicUsize::new(0));
        let counter = ui_passes.clone();
        engine.event_bus().unwrap().subscribe_channel(
            UI_RENDER_CHANNEL,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        renderer.frame();
        renderer.frame();

        assert_eq!(ui_passes.load(Ordering::SeqCst), 2);
        assert_eq!(renderer.frame_count(), 2);
    }

    #[test]
    fn test_frame_limit_stops_engine() {
        let config = EngineConfig {
            render: RenderLoopConfig {
                target_fps: 1000,
                max_frames: Some(3),
            },
            ..EngineConfig::default()
        };
        let render_config = config.render.clone();
        let engine = Engine::builder(config)
            .register_event_bus(|_| Arc::new(EventBus::new()), false)
            .register_graphics(move |handle| Arc::new(HeadlessRenderer::new(handle, &render_config)), true)
            .build();

        assert_eq!(engine.initialize(), Ok(()));

        assert!(!engine.is_running());
        assert_eq!(engine.graphics().unwrap().frame_count(), 3);
    }
}
