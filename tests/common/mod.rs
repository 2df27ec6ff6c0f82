//! Shared test harness: a deterministic scripted physics backend.
//!
//! Bodies are plain components integrated with explicit Euler once per fixed
//! tick; contacts are whatever the test scripts into [`ScriptedContacts`].
//! Ticks are driven manually so every scenario is exactly reproducible.

#![allow(dead_code)]

use std::time::Duration;

use bevy::prelude::*;
use platformer_controller::prelude::*;

pub const DT: f32 = 1.0 / 64.0;

/// Minimal kinematic state for one scripted body.
#[derive(Component, Debug, Clone, Default)]
pub struct ScriptedBody {
    pub velocity: Vec2,
    pub position: Vec2,
    pub gravity: Vec2,
    pub damping: f32,
    /// Force accumulated this tick, integrated at the start of the next.
    pub force: Vec2,
    /// Layers the controller asked the backend to ignore.
    pub ignored_layers: LayerMask,
}

/// Contacts the test wants the controller to see this tick.
#[derive(Component, Debug, Clone, Default)]
pub struct ScriptedContacts(pub Vec<CollideInfo>);

pub struct ScriptedBackend;

impl PhysicsBackend for ScriptedBackend {
    fn plugin() -> impl Plugin {
        ScriptedBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec2 {
        world
            .get::<ScriptedBody>(entity)
            .map(|b| b.velocity)
            .unwrap_or(Vec2::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec2) {
        if let Some(mut body) = world.get_mut::<ScriptedBody>(entity) {
            body.velocity = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec2) {
        if let Some(mut body) = world.get_mut::<ScriptedBody>(entity) {
            body.velocity += impulse;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec2) {
        if let Some(mut body) = world.get_mut::<ScriptedBody>(entity) {
            body.force += force;
        }
    }

    fn move_position(world: &mut World, entity: Entity, delta: Vec2) {
        if let Some(mut body) = world.get_mut::<ScriptedBody>(entity) {
            body.position += delta;
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec2 {
        world
            .get::<ScriptedBody>(entity)
            .map(|b| b.position)
            .unwrap_or(Vec2::ZERO)
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut body) = world.get_mut::<ScriptedBody>(entity) {
            body.damping = damping;
        }
    }

    fn set_layers_ignore(world: &mut World, entity: Entity, layer: u32, ignore: bool) {
        if let Some(mut body) = world.get_mut::<ScriptedBody>(entity) {
            if ignore {
                body.ignored_layers.insert(layer);
            } else {
                body.ignored_layers.remove(layer);
            }
        }
    }
}

struct ScriptedBackendPlugin;

impl Plugin for ScriptedBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (integrate_bodies, publish_contacts)
                .chain()
                .in_set(ControllerSet::Sensors),
        );
    }
}

/// Integrate last tick's forces and gravity, then advance positions.
fn integrate_bodies(mut q: Query<&mut ScriptedBody>) {
    for mut body in &mut q {
        let force = std::mem::take(&mut body.force);
        let accel = force + body.gravity;
        body.velocity += accel * DT;
        let step = body.velocity * DT;
        body.position += step;
    }
}

/// Copy scripted contacts into the controller's contact set.
fn publish_contacts(mut q: Query<(&ScriptedContacts, &mut ContactSet)>) {
    for (scripted, mut set) in &mut q {
        set.clear();
        for c in &scripted.0 {
            set.push(*c);
        }
    }
}

pub fn test_app() -> App {
    let mut app = App::new();
    app.init_resource::<Time>();
    app.insert_resource(Time::<Fixed>::from_hz(64.0));
    app.add_plugins(PlatformerControllerPlugin::<ScriptedBackend>::default());
    app
}

/// Advance both clocks by one fixed step and run the fixed schedule once.
pub fn tick(app: &mut App) {
    let dt = Duration::from_secs_f64(1.0 / 64.0);
    app.world_mut().resource_mut::<Time>().advance_by(dt);
    app.world_mut().resource_mut::<Time<Fixed>>().advance_by(dt);
    app.world_mut().run_schedule(FixedUpdate);
}

pub fn ticks(app: &mut App, n: usize) {
    for _ in 0..n {
        tick(app);
    }
}

/// Spawn a controller with the scripted backend's body components.
pub fn spawn_character(app: &mut App, config: ControllerConfig) -> Entity {
    app.world_mut()
        .spawn((
            config,
            MovementState::new(),
            MoveIntent::default(),
            ContactSet::new(),
            PlankState::new(),
            ScriptedBody::default(),
            ScriptedContacts::default(),
        ))
        .id()
}

/// Spawn a static entity to stand in for level geometry in contacts.
pub fn spawn_surface(app: &mut App) -> Entity {
    app.world_mut().spawn(ScriptedBody::default()).id()
}

pub fn ground_contact(surface: Entity) -> CollideInfo {
    CollideInfo::new(surface, Vec2::Y, ContactSide::Below, 0)
}

/// Wall on the controller's right: normal points left.
pub fn right_wall_contact(surface: Entity) -> CollideInfo {
    CollideInfo::new(surface, Vec2::NEG_X, ContactSide::Right, 0)
}

pub fn set_contacts(app: &mut App, entity: Entity, contacts: Vec<CollideInfo>) {
    app.world_mut()
        .get_mut::<ScriptedContacts>(entity)
        .unwrap()
        .0 = contacts;
}

pub fn set_jump(app: &mut App, entity: Entity, pressed: bool) {
    app.world_mut()
        .get_mut::<MoveIntent>(entity)
        .unwrap()
        .set_jump_pressed(pressed);
}

pub fn set_axes(app: &mut App, entity: Entity, x: f32, y: f32) {
    app.world_mut()
        .get_mut::<MoveIntent>(entity)
        .unwrap()
        .set_axes(x, y);
}

pub fn state(app: &App, entity: Entity) -> MovementState {
    app.world().get::<MovementState>(entity).unwrap().clone()
}

pub fn body(app: &App, entity: Entity) -> ScriptedBody {
    app.world().get::<ScriptedBody>(entity).unwrap().clone()
}

pub fn drain_jumped(app: &mut App) -> Vec<Jumped> {
    app.world_mut()
        .resource_mut::<Events<Jumped>>()
        .drain()
        .collect()
}

pub fn drain_landed(app: &mut App) -> Vec<Landed> {
    app.world_mut()
        .resource_mut::<Events<Landed>>()
        .drain()
        .collect()
}
