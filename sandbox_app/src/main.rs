//! Sandbox application
//!
//! Wires every capability together and runs a small scene headless: a
//! kinematic floor, a stack of falling crates and a camera rig that switches
//! between orbiting and following the crates. Settings are read from
//! `sandbox.toml` when present.

use parking_lot::Mutex;
use std::sync::Arc;

use sim_engine::ecs::components::Collider;
use sim_engine::foundation::logging;
use sim_engine::prelude::*;

const CONFIG_PATH: &str = "sandbox.toml";
const DEFAULT_FRAME_LIMIT: u64 = 600;
const CRATE_COUNT: usize = 5;

/// Camera behaviour while orbiting the scene origin
struct Orbit {
    radius: f32,
    speed: f32,
    angle: f32,
}

impl State<Transform> for Orbit {
    fn enter(&mut self, _owner: &Transform) {
        log::info!("Camera rig orbiting");
    }

    fn update(&mut self, owner: &Transform, delta_time: f32) {
        self.angle += self.speed * delta_time;
        let (sin, cos) = self.angle.sin_cos();
        owner.set_position(Vec3::new(cos * self.radius, 6.0, sin * self.radius));
    }
}

/// Camera behaviour while trailing a target entity
struct Follow {
    target: Arc<Entity>,
    offset: Vec3,
    stiffness: f32,
}

impl State<Transform> for Follow {
    fn enter(&mut self, _owner: &Transform) {
        log::info!("Camera rig following entity {}", self.target.id());
    }

    fn update(&mut self, owner: &Transform, delta_time: f32) {
        let goal = self.target.transform().position() + self.offset;
        let current = owner.position();
        let blend = (self.stiffness * delta_time).min(1.0);
        owner.set_position(current + (goal - current) * blend);
    }
}

/// Component switching the camera between orbit and follow
struct CameraRig {
    base: ComponentBase,
    machine: Mutex<StateMachine<Transform>>,
    switch_interval: f32,
    elapsed: Mutex<f32>,
}

impl CameraRig {
    fn new(owner: &Arc<Entity>, target: Arc<Entity>) -> Self {
        let mut machine = StateMachine::new();
        machine.add_state(Orbit {
            radius: 12.0,
            speed: 0.5,
            angle: 0.0,
        });
        machine.add_state(Follow {
            target,
            offset: Vec3::new(0.0, 3.0, 8.0),
            stiffness: 4.0,
        });
        Self {
            base: ComponentBase::new(owner),
            machine: Mutex::new(machine),
            switch_interval: 2.0,
            elapsed: Mutex::new(0.0),
        }
    }

    fn toggle(&self) {
        let Some(owner) = self.base.owner() else {
            return;
        };
        let transform = owner.transform();
        let mut machine = self.machine.lock();
        let result = if machine.is_current::<Orbit>() {
            machine.change_state::<Follow>(&transform)
        } else {
            machine.change_state::<Orbit>(&transform)
        };
        if let Err(e) = result {
            log::error!("Camera rig could not switch mode: {e}");
        }
    }
}

impl Component for CameraRig {
    fn base(&self) -> &ComponentBase {
        &self.base
    }

    fn type_tag(&self) -> &'static str {
        "CameraRig"
    }

    fn on_start(&self) {
        let Some(owner) = self.base.owner() else {
            return;
        };
        if let Err(e) = self.machine.lock().change_state::<Orbit>(&owner.transform()) {
            log::error!("Camera rig failed to start: {e}");
        }
    }

    fn on_update(&self, tick: &Tick) {
        let Some(owner) = self.base.owner() else {
            return;
        };

        let switch = {
            let mut elapsed = self.elapsed.lock();
            *elapsed += tick.delta;
            if *elapsed >= self.switch_interval {
                *elapsed = 0.0;
                true
            } else {
                false
            }
        };
        if switch {
            self.toggle();
        }

        self.machine.lock().update(&owner.transform(), tick.delta);
    }
}

fn spawn_floor(engine: &Engine) -> Result<Arc<Entity>, EntityError> {
    let floor = engine.create_entity();
    floor.transform().set_position(Vec3::new(0.0, -0.5, 0.0));
    floor.add(Rigidbody::kinematic(&floor))?;
    let collider = floor.add(BoxCollider::new(&floor).with_size(Vec3::new(40.0, 1.0, 40.0)))?;
    collider.on_contact(Arc::new(|other: &Arc<Entity>| {
        log::trace!("Floor touched by {}", other.id());
    }));
    Ok(floor)
}

fn spawn_crates(engine: &Engine) -> Result<Vec<Arc<Entity>>, EntityError> {
    let mut crates = Vec::with_capacity(CRATE_COUNT);
    for i in 0..CRATE_COUNT {
        let entity = engine.create_entity();
        #[allow(clippy::cast_precision_loss)]
        let index = i as f32;
        entity
            .transform()
            .set_position(Vec3::new(0.2 * (index % 2.0), 3.0 + 1.5 * index, 0.0));

        let body = entity.add(Rigidbody::new(&entity))?;
        body.set_mass(1.0 + 0.5 * (index % 3.0));
        body.set_drag(0.1);
        entity.add(BoxCollider::new(&entity))?;
        crates.push(entity);
    }

    // Chain the top crate to the one below it
    if let [.., below, top] = crates.as_slice() {
        let joint = top.add(DistanceJoint::new(top).with_rest_length(1.5))?;
        joint.set_target(below);
    }
    Ok(crates)
}

fn spawn_camera(engine: &Engine, target: Arc<Entity>) -> Result<Arc<CameraRig>, EntityError> {
    let camera = engine.create_entity();
    camera.attach_new(|owner| CameraRig::new(owner, target))
}

fn bind_keys(engine: &Engine, rig: &Arc<CameraRig>) {
    let Some(input) = engine.input() else {
        return;
    };
    let rig = Arc::clone(rig);
    input.register_keybind(
        KeyAction::pressed(KeyCode::C),
        Arc::new(move || rig.toggle()),
    );

    let handle = engine.handle();
    input.register_keybind(
        KeyAction::pressed(KeyCode::Escape),
        Arc::new(move || {
            if let Some(engine) = handle.upgrade() {
                engine.shutdown();
            }
        }),
    );
}

fn start_music(engine: &Engine) {
    let Some(sound) = engine.sound() else {
        return;
    };
    sound.set_volume(0.6, AudioKind::Music);
    if let Err(e) = sound
        .load_audio("ambient", AudioKind::Music)
        .and_then(|()| sound.play_audio("ambient", AudioKind::Music))
    {
        log::warn!("Background music unavailable: {e}");
    }
}

fn report(engine: &Engine, crates: &[Arc<Entity>], floor: &Arc<Entity>) {
    for (i, entity) in crates.iter().enumerate() {
        let position = entity.transform().position();
        log::info!("Crate {i} settled at ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z);
    }
    if let Some(collider) = floor.get_component::<BoxCollider>() {
        log::info!("Floor recorded {} contacts", collider.listeners().contact_count());
    }
    if let Some(physics) = engine.physics() {
        log::info!(
            "Physics ran {} ticks, average {:?}",
            physics.tick_count(),
            physics.average_tick_duration()
        );
    }
    if let Some(graphics) = engine.graphics() {
        log::info!("Rendered {} frames", graphics.frame_count());
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (mut config, load_error) = match EngineConfig::load_from_file(CONFIG_PATH) {
        Ok(config) => (config, None),
        Err(e) => (EngineConfig::default(), Some(e)),
    };
    logging::init_with_filter(&config.logging.level);
    if let Some(e) = load_error {
        log::info!("Using default configuration ({CONFIG_PATH}: {e})");
    }

    if config.render.max_frames.is_none() {
        config.render.max_frames = Some(DEFAULT_FRAME_LIMIT);
    }
    log::info!("Starting sandbox with {:?}", config.physics.partition);

    let render = config.render.clone();
    let physics = config.physics.clone();
    let engine = Engine::builder(config)
        .register_event_bus(|_| Arc::new(EventBus::new()), false)
        .register_input(|_| Arc::new(KeybindMap::new()), false)
        .register_sound(|_| Arc::new(SoundManager::new()), false)
        .register_graphics(move |handle| Arc::new(HeadlessRenderer::new(handle, &render)), true)
        .register_physics(move |handle| Arc::new(FixedStepPhysics::new(handle, &physics)), true)
        .build();

    let floor = spawn_floor(&engine)?;
    let crates = spawn_crates(&engine)?;
    let target = crates.first().cloned().unwrap_or_else(|| Arc::clone(&floor));
    let rig = spawn_camera(&engine, target)?;
    bind_keys(&engine, &rig);
    start_music(&engine);

    let result = engine.initialize();
    report(&engine, &crates, &floor);

    match result {
        Ok(()) => {
            log::info!("Sandbox finished cleanly");
            Ok(())
        }
        Err(e) => {
            log::error!("Sandbox stopped after a fault: {e}");
            Err(e.into())
        }
    }
}
