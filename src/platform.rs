//! Moving platforms.
//!
//! A [`Platform`] discovers riders every fixed tick, either from the
//! backend's shape sweep or from trigger-volume membership, notifies their
//! [`MovementState`] of boarding/leaving, and propagates its own motion into
//! them before the controller refreshes collision state. Riders must opt in
//! with the [`PlatformRider`] marker.

use std::mem;

use bevy::ecs::component::HookContext;
use bevy::ecs::world::DeferredWorld;
use bevy::prelude::*;

use crate::backend::PhysicsBackend;
use crate::config::ControllerOrientation;
use crate::contact::{LayerMask, PhysicsLayer};
use crate::state::MovementState;

/// Direction a platform sweeps for riders, in its local frame.
#[derive(Reflect, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepDir {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl SweepDir {
    pub fn vec(self) -> Vec2 {
        match self {
            Self::Up => Vec2::Y,
            Self::Down => Vec2::NEG_Y,
            Self::Left => Vec2::NEG_X,
            Self::Right => Vec2::X,
        }
    }
}

/// A moving platform that carries [`PlatformRider`] bodies standing on it.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
#[component(on_remove = platform_on_remove)]
pub struct Platform {
    /// Physical layer this platform reports to riders; folded into their
    /// ground layer mask while boarded.
    pub layer: u32,
    /// Layers eligible to ride.
    pub rider_mask: LayerMask,
    /// Use trigger-volume membership instead of the shape sweep to find
    /// riders.
    pub use_trigger: bool,
    /// Carry a rider's upward launch speed as a one-shot boost when it jumps
    /// off while boarding.
    pub jump_boost: bool,
    /// Sweep direction for rider discovery.
    pub dir: SweepDir,
    /// Sweep distance beyond the platform surface.
    pub sweep_ofs: f32,
    /// Maximum angle between the sweep direction and a rider's up axis,
    /// radians. `None` accepts any rider orientation.
    pub up_dir_limit: Option<f32>,

    /// Sweep hits for this tick, written by the backend's sensor system when
    /// `use_trigger` is false.
    #[reflect(ignore)]
    pub(crate) swept: Vec<Entity>,
    /// Trigger-volume membership, maintained via [`Platform::trigger_enter`] /
    /// [`Platform::trigger_exit`].
    #[reflect(ignore)]
    trigger_riders: Vec<Entity>,
    /// Riders confirmed last tick (double-buffered against `riders`).
    #[reflect(ignore)]
    riders: Vec<Entity>,
    #[reflect(ignore)]
    riders_prev: Vec<Entity>,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Platform {
    pub fn new(layer: u32) -> Self {
        Self {
            layer,
            rider_mask: LayerMask::ALL,
            use_trigger: false,
            jump_boost: false,
            dir: SweepDir::Up,
            sweep_ofs: 0.15,
            up_dir_limit: None,
            swept: Vec::new(),
            trigger_riders: Vec::new(),
            riders: Vec::new(),
            riders_prev: Vec::new(),
        }
    }

    pub fn with_rider_mask(mut self, mask: LayerMask) -> Self {
        self.rider_mask = mask;
        self
    }

    pub fn with_jump_boost(mut self, boost: bool) -> Self {
        self.jump_boost = boost;
        self
    }

    pub fn with_trigger(mut self, use_trigger: bool) -> Self {
        self.use_trigger = use_trigger;
        self
    }

    pub fn with_up_dir_limit(mut self, limit: f32) -> Self {
        self.up_dir_limit = Some(limit);
        self
    }

    /// Record a body entering the platform's trigger volume.
    pub fn trigger_enter(&mut self, entity: Entity) {
        if !self.trigger_riders.contains(&entity) {
            self.trigger_riders.push(entity);
        }
    }

    /// Record a body leaving the platform's trigger volume.
    pub fn trigger_exit(&mut self, entity: Entity) {
        self.trigger_riders.retain(|e| *e != entity);
    }

    /// Entities currently confirmed as riders.
    pub fn riders(&self) -> &[Entity] {
        &self.riders
    }
}

/// Marker opting a body into platform carry.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct PlatformRider;

/// A removed platform releases its riders so they do not stay flagged as
/// boarded forever.
fn platform_on_remove(mut world: DeferredWorld, ctx: HookContext) {
    let Some(platform) = world.get::<Platform>(ctx.entity) else {
        return;
    };
    let layer = platform.layer;
    let riders: Vec<Entity> = platform.riders.clone();
    for rider in riders {
        if let Some(mut state) = world.get_mut::<MovementState>(rider) {
            state.platform_sweep(false, layer);
            // The floor just vanished; rebuild from scratch next tick.
            state.reset_collision();
        }
    }
}

/// Confirm riders from this tick's sweep (or trigger membership), notify
/// boarding transitions, and propagate the platform's motion into every
/// candidate. Jumping bodies are carried (or boosted) but never registered
/// as riders, so a jump-off clears the boarded state next tick.
///
/// Runs after the backend's sensors and before the controller's collision
/// refresh, so a boarding notice is visible to the same tick's decisions.
pub fn propagate_platforms<B: PhysicsBackend>(world: &mut World) {
    let dt = B::fixed_timestep(world);
    let platforms: Vec<Entity> = world
        .query_filtered::<Entity, With<Platform>>()
        .iter(world)
        .collect();

    for platform_entity in platforms {
        let mut platform = match world.get_mut::<Platform>(platform_entity) {
            Some(mut p) => mem::take(&mut *p),
            None => continue,
        };
        let velocity = B::get_velocity(world, platform_entity);
        let moving =
            velocity != Vec2::ZERO || B::get_angular_velocity(world, platform_entity) != 0.0;

        // Confirm this tick's riders into the spare buffer. Jumping bodies
        // are carried below but never registered, so jumping off drops the
        // boarded state on the next tick and arms the boost.
        let mut riders = mem::take(&mut platform.riders_prev);
        riders.clear();
        let candidates: Vec<Entity> = if platform.use_trigger {
            platform.trigger_riders.clone()
        } else {
            mem::take(&mut platform.swept)
        };
        for candidate in candidates {
            if candidate == platform_entity {
                continue;
            }
            let Ok(entity_ref) = world.get_entity(candidate) else {
                continue;
            };
            if !entity_ref.contains::<PlatformRider>() {
                continue;
            }
            let layer = entity_ref.get::<PhysicsLayer>().copied().unwrap_or_default();
            if !platform.rider_mask.contains(layer.0) {
                continue;
            }
            let orientation = entity_ref
                .get::<ControllerOrientation>()
                .copied()
                .unwrap_or_default();
            if let Some(limit) = platform.up_dir_limit {
                if platform.dir.vec().angle_to(orientation.up()).abs() > limit {
                    continue;
                }
            }
            let jumping = entity_ref
                .get::<MovementState>()
                .map(|s| s.is_jumping || s.is_wall_jumping)
                .unwrap_or(false);

            if moving {
                let local = orientation.to_local(velocity);
                if jumping {
                    if platform.jump_boost {
                        // Fires once the jumper has dropped out of the
                        // boarded set, the tick after jump-off.
                        if !platform.riders.contains(&candidate) {
                            let boost = Vec2::new(0.0, local.y.max(0.0));
                            B::apply_impulse(world, candidate, orientation.to_world(boost));
                        }
                    } else if local.y > 0.0 {
                        // Keep an upward platform underneath a jumper:
                        // lateral and downward carry, upward clamped out.
                        let carry =
                            orientation.to_world(Vec2::new(local.x, local.y.min(0.0))) * dt;
                        B::move_position(world, candidate, carry);
                    }
                } else {
                    // Carry laterally and downward; upward motion is handed
                    // to the contact solver's push.
                    let carry = orientation.to_world(Vec2::new(local.x, local.y.min(0.0))) * dt;
                    B::move_position(world, candidate, carry);
                }
            }

            if !jumping {
                riders.push(candidate);
            }
        }

        // Boarding and leaving notifications.
        for &rider in &riders {
            if !platform.riders.contains(&rider) {
                debug!(?rider, platform = ?platform_entity, "platform boarded");
                if let Some(mut state) = world.get_mut::<MovementState>(rider) {
                    state.platform_sweep(true, platform.layer);
                }
            }
        }
        for i in 0..platform.riders.len() {
            let rider = platform.riders[i];
            if !riders.contains(&rider) {
                debug!(?rider, platform = ?platform_entity, "platform left");
                if let Some(mut state) = world.get_mut::<MovementState>(rider) {
                    state.platform_sweep(false, platform.layer);
                }
            }
        }

        // Swap buffers and put the component back.
        platform.riders_prev = mem::replace(&mut platform.riders, riders);
        platform.swept.clear();
        if let Some(mut p) = world.get_mut::<Platform>(platform_entity) {
            *p = platform;
        }
    }
}
