//! Event bus
//!
//! Two delivery paths share one bus:
//! - the four core lifecycle notifications (start, update, physics update,
//!   render) fanned out to every subscribed [`Observer`];
//! - named channels holding multicast handlers for phases that do not warrant
//!   a dedicated hook (the UI render pass is the typical one).
//!
//! Subscriber tables are guarded by a lock, but delivery always works on a
//! snapshot taken under that lock, so observers may subscribe or unsubscribe
//! (themselves or others) from inside a callback.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::{EngineComponent, EngineError};
use crate::foundation::math::Vec3;

/// Channel triggered by the frame driver after world rendering
pub const UI_RENDER_CHANNEL: &str = "ui_render";

/// Variable-rate frame information handed to update hooks
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tick {
    /// Seconds since the previous frame
    pub delta: f32,
}

/// Fixed-rate step information handed to physics hooks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsStep {
    /// Fixed step length in seconds
    pub delta: f32,
    /// Gravity for this step
    pub gravity: Vec3,
}

impl Default for PhysicsStep {
    fn default() -> Self {
        Self {
            delta: 0.016,
            gravity: Vec3::new(0.0, -9.81, 0.0),
        }
    }
}

/// Receiver of core lifecycle notifications
///
/// All hooks default to no-ops. `is_active` gates update, physics update and
/// render delivery.
pub trait Observer: Send + Sync {
    /// Start notification
    fn handle_start(&self) {}

    /// Per-frame update notification
    fn handle_update(&self, _tick: &Tick) {}

    /// Fixed-step physics notification
    fn handle_physics_update(&self, _step: &PhysicsStep) {}

    /// Per-frame render notification
    fn handle_render(&self) {}

    /// Whether the observer currently receives notifications
    fn is_active(&self) -> bool {
        true
    }
}

/// Identity of a subscriber, derived from its address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverKey(usize);

impl ObserverKey {
    /// Key for the object behind a reference
    pub fn of<T: ?Sized>(target: &T) -> Self {
        Self((target as *const T).cast::<()>() as usize)
    }
}

/// Handler stored on a named channel
pub type ChannelHandler = Arc<dyn Fn() + Send + Sync>;

/// The event bus capability
pub trait EventDispatcher: EngineComponent {
    /// Add an observer; subscribing the same observer twice is a no-op
    fn subscribe(&self, observer: Arc<dyn Observer>);

    /// Remove an observer; unknown keys are ignored
    fn unsubscribe(&self, key: ObserverKey);

    /// Deliver the start notification
    fn notify_start(&self);

    /// Deliver the update notification
    fn notify_update(&self, tick: &Tick);

    /// Deliver the physics update notification
    fn notify_physics_update(&self, step: &PhysicsStep);

    /// Deliver the render notification
    fn notify_render(&self);

    /// Add a handler to a named channel, creating the channel on demand
    fn subscribe_channel(&self, channel: &str, handler: ChannelHandler);

    /// Remove a handler from a named channel
    fn unsubscribe_channel(&self, channel: &str, handler: &ChannelHandler);

    /// Invoke every handler of a named channel
    fn trigger(&self, channel: &str);

    /// Number of core subscribers
    fn subscriber_count(&self) -> usize;
}

/// Default in-process event bus
#[derive(Default)]
pub struct EventBus {
    observers: RwLock<HashMap<ObserverKey, Arc<dyn Observer>>>,
    channels: Mutex<HashMap<String, Vec<ChannelHandler>>>,
}

impl EventBus {
    /// Create an empty event bus
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Vec<Arc<dyn Observer>> {
        self.observers.read().values().cloned().collect()
    }

    fn broadcast(&self, deliver: impl Fn(&dyn Observer)) {
        for observer in self.snapshot() {
            if observer.is_active() {
                deliver(observer.as_ref());
            }
        }
    }

    /// Number of handlers registered on a channel
    pub fn channel_len(&self, channel: &str) -> usize {
        self.channels.lock().get(channel).map_or(0, Vec::len)
    }
}

fn same_handler(a: &ChannelHandler, b: &ChannelHandler) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

impl EngineComponent for EventBus {
    fn name(&self) -> &str {
        "event_bus"
    }

    fn initialize(&self) -> Result<(), EngineError> {
        log::info!("Event bus ready with {} subscriber(s)", self.subscriber_count());
        Ok(())
    }

    fn shutdown(&self) -> Result<(), EngineError> {
        log::debug!("Event bus shut down");
        Ok(())
    }
}

impl EventDispatcher for EventBus {
    fn subscribe(&self, observer: Arc<dyn Observer>) {
        let key = ObserverKey::of(observer.as_ref());
        self.observers.write().entry(key).or_insert(observer);
    }

    fn unsubscribe(&self, key: ObserverKey) {
        self.observers.write().remove(&key);
    }

    fn notify_start(&self) {
        self.broadcast(|observer| observer.handle_start());
    }

    fn notify_update(&self, tick: &Tick) {
        self.broadcast(|observer| observer.handle_update(tick));
    }

    fn notify_physics_update(&self, step: &PhysicsStep) {
        self.broadcast(|observer| observer.handle_physics_update(step));
    }

    fn notify_render(&self) {
        self.broadcast(|observer| observer.handle_render());
    }

    fn subscribe_channel(&self, channel: &str, handler: ChannelHandler) {
        let mut channels = self.channels.lock();
        let handlers = channels.entry(channel.to_string()).or_default();
        if !handlers.iter().any(|existing| same_handler(existing, &handler)) {
            handlers.push(handler);
        }
    }

    fn unsubscribe_channel(&self, channel: &str, handler: &ChannelHandler) {
        let mut channels = self.channels.lock();
        if let Some(handlers) = channels.get_mut(channel) {
            handlers.retain(|existing| !same_handler(existing, handler));
            if handlers.is_empty() {
                channels.remove(channel);
            }
        }
    }

    fn trigger(&self, channel: &str) {
        let handlers = match self.channels.lock().get(channel) {
            Some(handlers) => handlers.clone(),
            None => return,
        };
        for handler in handlers {
            handler();
        }
    }

    fn subscriber_count(&self) -> usize {
        self.observers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Weak;

    #[derive(Default)]
    struct Counter {
        starts: AtomicUsize,
        updates: AtomicUsize,
        physics: AtomicUsize,
        renders: AtomicUsize,
        disabled: AtomicBool,
    }

    impl Observer for Counter {
        fn handle_start(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn handle_update(&self, _tick: &Tick) {
            self.updates.fetch_add(1, Ordering::SeqCst);
        }

        fn handle_physics_update(&self, _step: &PhysicsStep) {
            self.physics.fetch_add(1, Ordering::SeqCst);
        }

        fn handle_render(&self) {
            self.renders.fetch_add(1, Ordering::SeqCst);
        }

        fn is_active(&self) -> bool {
            !self.disabled.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn test_physics_update_delivered_once_per_notify() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        bus.subscribe(counter.clone());

        for _ in 0..5 {
            bus.notify_physics_update(&PhysicsStep::default());
        }
        assert_eq!(counter.physics.load(Ordering::SeqCst), 5);
        assert_eq!(counter.updates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_duplicate_subscription_is_merged() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        bus.subscribe(counter.clone());
        bus.subscribe(counter.clone());
        assert_eq!(bus.subscriber_count(), 1);

        bus.notify_render();
        assert_eq!(counter.renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_unknown_is_noop() {
        let bus = EventBus::new();
        let counter = Counter::default();
        bus.unsubscribe(ObserverKey::of(&counter));
        assert_eq!(bus.subscriber_count(), 0);

        // No subscribers at all is not an error either
        bus.notify_start();
        bus.notify_update(&Tick { delta: 0.016 });
        bus.trigger("missing");
    }

    #[test]
    fn test_inactive_observer_is_skipped() {
        let bus = EventBus::new();
        let counter = Arc::new(Counter::default());
        bus.subscribe(counter.clone());

        counter.disabled.store(true, Ordering::SeqCst);
        bus.notify_update(&Tick { delta: 0.016 });
        bus.notify_render();
        assert_eq!(counter.updates.load(Ordering::SeqCst), 0);
        assert_eq!(counter.renders.load(Ordering::SeqCst), 0);

        counter.disabled.store(false, Ordering::SeqCst);
        bus.notify_update(&Tick { delta: 0.016 });
        assert_eq!(counter.updates.load(Ordering::SeqCst), 1);
    }

    struct SelfRemoving {
        bus: Weak<EventBus>,
        calls: AtomicUsize,
    }

    impl Observer for SelfRemoving {
        fn handle_update(&self, _tick: &Tick) {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(bus) = self.bus.upgrade() {
                bus.unsubscribe(ObserverKey::of(self));
                bus.subscribe(Arc::new(Counter::default()));
            }
        }
    }

    #[test]
    fn test_reentrant_subscription_changes() {
        let bus = Arc::new(EventBus::new());
        let observer = Arc::new(SelfRemoving {
            bus: Arc::downgrade(&bus),
            calls: AtomicUsize::new(0),
        });
        bus.subscribe(observer.clone());

        bus.notify_update(&Tick { delta: 0.016 });
        bus.notify_update(&Tick { delta: 0.016 });

        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_named_channels() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handler: ChannelHandler = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.subscribe_channel(UI_RENDER_CHANNEL, handler.clone());
        bus.subscribe_channel(UI_RENDER_CHANNEL, handler.clone());
        assert_eq!(bus.channel_len(UI_RENDER_CHANNEL), 1);

        bus.trigger(UI_RENDER_CHANNEL);
        bus.trigger("other");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        bus.unsubscribe_channel(UI_RENDER_CHANNEL, &handler);
        bus.trigger(UI_RENDER_CHANNEL);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.channel_len(UI_RENDER_CHANNEL), 0);
    }
}
