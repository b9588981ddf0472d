//! Graphics capability
//!
//! The graphics component owns the variable-rate frame loop: its
//! `initialize` blocks running frames until the engine stops.

pub mod headless;

pub use headless::HeadlessRenderer;

use crate::engine::EngineComponent;

/// Graphics capability
pub trait GraphicsBackend: EngineComponent {
    /// Render one frame: world render notification, then the UI render channel
    fn render(&self);

    /// Frames completed so far
    fn frame_count(&self) -> u64;
}
