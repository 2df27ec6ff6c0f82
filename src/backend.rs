//! Physics backend abstraction.
//!
//! The movement core never talks to a physics engine directly. Body-level
//! operations (velocity, impulses, forces, repositioning, per-layer collision
//! ignores) go through this trait; queries that need the physics context
//! (contact enumeration, shape sweeps, penetration probes) are systems the
//! backend's plugin registers into [`crate::ControllerSet::Sensors`] so their results
//! are visible to the same tick's decisions.
//!
//! The rapier implementation lives in the `rapier` module (feature
//! `rapier2d`); tests inject a deterministic scripted backend.

use bevy::prelude::*;

/// Trait implemented by physics backends.
///
/// A backend's [`plugin`](Self::plugin) must register, in
/// [`crate::ControllerSet::Sensors`]:
///
/// 1. a contact-gathering system rebuilding every controller's
///    [`ContactSet`](crate::contact::ContactSet) from the engine's active
///    contacts, with normals pointing toward the controller;
/// 2. a platform sweep system filling
///    [`Platform::swept`](crate::platform::Platform) for platforms not using
///    trigger membership;
/// 3. a plank overlap probe updating
///    [`PlankState::overlap_mask`](crate::plank::PlankState) for controllers
///    with suppressed plank layers.
pub trait PhysicsBackend: 'static + Send + Sync {
    /// The plugin that wires this backend into the app.
    fn plugin() -> impl Plugin;

    /// Current linear velocity of a body, world space.
    fn get_velocity(world: &World, entity: Entity) -> Vec2;

    /// Overwrite a body's linear velocity.
    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec2);

    /// Instantaneous momentum change.
    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec2);

    /// Force integrated over the fixed timestep.
    fn apply_force(world: &mut World, entity: Entity, force: Vec2);

    /// Teleport a body by a delta, bypassing velocity (platform carry).
    fn move_position(world: &mut World, entity: Entity, delta: Vec2);

    /// Current world position of a body.
    fn get_position(world: &World, entity: Entity) -> Vec2;

    /// Angular speed of a body, radians/second. Backends without rotation
    /// support may leave the default.
    fn get_angular_velocity(_world: &World, _entity: Entity) -> f32 {
        0.0
    }

    /// Set a body's linear damping coefficient.
    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32);

    /// Toggle collision between a body and one physical layer (plank
    /// suppression).
    fn set_layers_ignore(world: &mut World, entity: Entity, layer: u32, ignore: bool);

    /// Duration of one fixed tick, seconds.
    fn fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&d| d > 0.0)
            .unwrap_or(1.0 / 64.0)
    }
}
