//! Rapier2D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier2D.
//! Enable with the `rapier2d` feature.

use bevy::prelude::*;
use bevy_rapier2d::geometry::Group;
use bevy_rapier2d::prelude::*;

use crate::backend::PhysicsBackend;
use crate::config::{ControllerConfig, ControllerOrientation};
use crate::contact::{CollideInfo, ContactSet, ContactSide, PhysicsLayer};
use crate::intent::MoveIntent;
use crate::plank::PlankState;
use crate::platform::Platform;
use crate::state::MovementState;
use crate::ControllerSet;

/// Rapier2D physics backend.
///
/// Body operations go through `Velocity`, `ExternalImpulse`, `ExternalForce`,
/// `Damping` and `Transform`. The context-dependent sensors (contact
/// gathering, platform sweeps, plank overlap probes) are systems registered
/// by [`Rapier2dBackendPlugin`] that take `RapierContext` as a parameter.
pub struct Rapier2dBackend;

impl PhysicsBackend for Rapier2dBackend {
    fn plugin() -> impl Plugin {
        Rapier2dBackendPlugin
    }

    fn get_velocity(world: &World, entity: Entity) -> Vec2 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.linvel)
            .unwrap_or(Vec2::ZERO)
    }

    fn set_velocity(world: &mut World, entity: Entity, velocity: Vec2) {
        if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            vel.linvel = velocity;
        }
    }

    fn apply_impulse(world: &mut World, entity: Entity, impulse: Vec2) {
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            ext_impulse.impulse += impulse;
        } else if let Some(mut vel) = world.get_mut::<Velocity>(entity) {
            // Fallback: apply as velocity change if no ExternalImpulse component
            vel.linvel += impulse;
        }
    }

    fn apply_force(world: &mut World, entity: Entity, force: Vec2) {
        // Controller forces are cleared at the start of every tick by
        // clear_controller_forces, so accumulation here is per-tick.
        if let Some(mut ext_force) = world.get_mut::<ExternalForce>(entity) {
            ext_force.force += force;
        }
    }

    fn move_position(world: &mut World, entity: Entity, delta: Vec2) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation += delta.extend(0.0);
        }
    }

    fn get_position(world: &World, entity: Entity) -> Vec2 {
        world
            .get::<Transform>(entity)
            .map(|t| t.translation.xy())
            .or_else(|| {
                world
                    .get::<GlobalTransform>(entity)
                    .map(|t| t.translation().xy())
            })
            .unwrap_or(Vec2::ZERO)
    }

    fn get_angular_velocity(world: &World, entity: Entity) -> f32 {
        world
            .get::<Velocity>(entity)
            .map(|v| v.angvel)
            .unwrap_or(0.0)
    }

    fn set_linear_damping(world: &mut World, entity: Entity, damping: f32) {
        if let Some(mut d) = world.get_mut::<Damping>(entity) {
            d.linear_damping = damping;
        }
    }

    fn set_layers_ignore(world: &mut World, entity: Entity, layer: u32, ignore: bool) {
        if let Some(mut groups) = world.get_mut::<CollisionGroups>(entity) {
            let bit = Group::from_bits_truncate(1 << layer);
            if ignore {
                groups.filters &= !bit;
            } else {
                groups.filters |= bit;
            }
        }
    }
}

/// Plugin wiring the Rapier2D sensors into the controller's fixed tick.
pub struct Rapier2dBackendPlugin;

impl Plugin for Rapier2dBackendPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            FixedUpdate,
            (
                clear_controller_forces,
                gather_contacts,
                sweep_platforms,
                platform_trigger_events,
                probe_plank_overlaps,
            )
                .chain()
                .in_set(ControllerSet::Sensors),
        );
    }
}

/// Zero controller-owned forces from the previous tick so this tick's
/// accumulation starts clean.
fn clear_controller_forces(
    mut q: Query<(&mut ExternalForce, &mut ExternalImpulse), With<MovementState>>,
) {
    for (mut force, mut impulse) in &mut q {
        force.force = Vec2::ZERO;
        force.torque = 0.0;
        impulse.impulse = Vec2::ZERO;
    }
}

/// Rebuild every controller's [`ContactSet`] from Rapier's active contact
/// pairs, with normals flipped to point toward the controller.
fn gather_contacts(
    rapier_context: ReadRapierContext,
    layers: Query<&PhysicsLayer>,
    mut q_controllers: Query<(
        Entity,
        &ControllerConfig,
        Option<&ControllerOrientation>,
        &mut ContactSet,
    )>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, config, orientation, mut contacts) in &mut q_controllers {
        contacts.clear();
        let up = orientation.copied().unwrap_or_default().up();

        for pair in context.contact_pairs_with(entity) {
            if !pair.has_any_active_contact() {
                continue;
            }
            let (other, flip) = if pair.collider1() == Some(entity) {
                (pair.collider2(), true)
            } else {
                (pair.collider1(), false)
            };
            let Some(other) = other else {
                continue;
            };
            let layer = layers.get(other).copied().unwrap_or_default().0;

            for manifold in pair.manifolds() {
                let mut normal = manifold.normal();
                if flip {
                    normal = -normal;
                }
                if normal == Vec2::ZERO {
                    continue;
                }
                let side = ContactSide::classify(normal, up, config.slope_limit);
                contacts.push(CollideInfo::new(other, normal, side, layer));
            }
        }
    }
}

/// Fill each non-trigger platform's sweep list with bodies overlapping its
/// collider shape offset along the sweep direction.
fn sweep_platforms(
    rapier_context: ReadRapierContext,
    mut q_platforms: Query<(Entity, &mut Platform, &GlobalTransform, &Collider)>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, mut platform, transform, collider) in &mut q_platforms {
        platform.swept.clear();
        if platform.use_trigger {
            continue;
        }
        let (_, rotation, translation) = transform.to_scale_rotation_translation();
        let (_, _, angle) = rotation.to_euler(EulerRot::XYZ);
        let origin = translation.xy() + platform.dir.vec() * platform.sweep_ofs;

        let filter = QueryFilter::default().exclude_collider(entity);
        let swept = &mut platform.swept;
        context.intersections_with_shape(origin, angle, collider, filter, |hit| {
            swept.push(hit);
            true
        });
    }
}

/// Maintain trigger-volume membership for platforms using sensor colliders.
fn platform_trigger_events(
    mut events: EventReader<CollisionEvent>,
    mut q_platforms: Query<&mut Platform>,
) {
    for event in events.read() {
        let (e1, e2, started) = match *event {
            CollisionEvent::Started(e1, e2, _) => (e1, e2, true),
            CollisionEvent::Stopped(e1, e2, _) => (e1, e2, false),
        };
        for (platform_entity, other) in [(e1, e2), (e2, e1)] {
            if let Ok(mut platform) = q_platforms.get_mut(platform_entity) {
                if platform.use_trigger {
                    if started {
                        platform.trigger_enter(other);
                    } else {
                        platform.trigger_exit(other);
                    }
                }
            }
        }
    }
}

/// Report which suppressed plank layers each controller still overlaps, so
/// the plank revalidation knows when collision is safe to restore.
fn probe_plank_overlaps(
    rapier_context: ReadRapierContext,
    mut q_controllers: Query<(Entity, &GlobalTransform, &Collider, &mut PlankState)>,
) {
    let Ok(context) = rapier_context.single() else {
        return;
    };

    for (entity, transform, collider, mut plank) in &mut q_controllers {
        plank.overlap_mask = crate::contact::LayerMask::NONE;
        let ignored = plank.ignored();
        if ignored.is_empty() {
            continue;
        }
        let (_, rotation, translation) = transform.to_scale_rotation_translation();
        let (_, _, angle) = rotation.to_euler(EulerRot::XYZ);
        let origin = translation.xy();

        for layer in ignored.iter() {
            let groups =
                CollisionGroups::new(Group::ALL, Group::from_bits_truncate(1 << layer));
            let filter = QueryFilter::default()
                .exclude_collider(entity)
                .groups(groups);
            let mut overlapping = false;
            context.intersections_with_shape(origin, angle, collider, filter, |_| {
                overlapping = true;
                false
            });
            if overlapping {
                plank.overlap_mask.insert(layer);
            }
        }
    }
}

/// Bundle for spawning a platformer character with Rapier2D physics.
///
/// Provides the rigid body, velocity tracking, force/impulse sinks, damping
/// and collision groups the controller systems write to. Rotation is locked
/// by default; platformer characters stay upright.
#[derive(Bundle)]
pub struct RapierCharacterBundle {
    pub rigid_body: RigidBody,
    pub velocity: Velocity,
    pub external_force: ExternalForce,
    pub external_impulse: ExternalImpulse,
    pub locked_axes: LockedAxes,
    pub damping: Damping,
    pub collision_groups: CollisionGroups,
    pub state: MovementState,
    pub intent: MoveIntent,
    pub contacts: ContactSet,
    pub plank: PlankState,
}

impl Default for RapierCharacterBundle {
    fn default() -> Self {
        Self::new()
    }
}

impl RapierCharacterBundle {
    pub fn new() -> Self {
        Self {
            rigid_body: RigidBody::Dynamic,
            velocity: Velocity::default(),
            external_force: ExternalForce::default(),
            external_impulse: ExternalImpulse::default(),
            locked_axes: LockedAxes::ROTATION_LOCKED,
            damping: Damping::default(),
            collision_groups: CollisionGroups::new(Group::ALL, Group::ALL),
            state: MovementState::new(),
            intent: MoveIntent::new(),
            contacts: ContactSet::new(),
            plank: PlankState::new(),
        }
    }

    pub fn with_body(mut self, body: RigidBody) -> Self {
        self.rigid_body = body;
        self
    }

    pub fn with_collision_groups(mut self, groups: CollisionGroups) -> Self {
        self.collision_groups = groups;
        self
    }
}
