//! Locomotion state owned by the movement controller.
//!
//! [`MovementState`] is mutated only by the controller's own fixed-tick
//! systems and by the public mutators on this type. Adapters (camera, facing,
//! animation, health) read the query surface and the marker components; they
//! never write.

use bevy::math::curve::{Curve, EaseFunction, EasingCurve};
use bevy::prelude::*;

use crate::config::ControllerConfig;
use crate::contact::{CollideInfo, CollisionFlags, ContactSide, LayerMask};

/// Locomotion state for one platformer controller.
///
/// Contact-derived fields (`collision_flags`, `ground_layer_mask`, the state
/// booleans) are fully recomputed every fixed tick from the current
/// [`ContactSet`](crate::contact::ContactSet); only the explicitly latched
/// timers and the jump counter carry over.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct MovementState {
    /// Velocity in the controller's local basis (x = right, y = up), sampled
    /// at the start of the tick.
    pub local_velocity: Vec2,
    /// Side bitset of this tick's contacts.
    #[reflect(ignore)]
    pub collision_flags: CollisionFlags,
    /// Layers currently contributing a Below contact (platform layer included
    /// while riding).
    pub ground_layer_mask: LayerMask,

    /// Jumps consumed since the last ground contact, `0..=jump_counter_max`.
    pub jump_counter: u32,
    pub is_jumping: bool,
    pub is_wall_jumping: bool,
    pub is_wall_sticking: bool,
    pub is_on_platform: bool,
    pub is_under_water: bool,
    /// Standing on a surface steeper than the traction threshold.
    pub is_on_slope: bool,

    /// Fixed-clock time of the last jump initiation (or of leaving the
    /// ground, to support the air-jump leniency window).
    pub last_jump_time: f32,
    /// Fixed-clock time we last left the ground.
    pub last_grounded_time: f32,
    /// Fixed-clock time wall-sticking last began.
    pub wall_stick_start_time: f32,
    /// Fixed-clock time of the last into-the-wall input (push mode).
    pub wall_stick_last_input_time: f32,

    /// Which side the stick wall is on.
    pub wall_stick_side: ContactSide,
    /// The contact that triggered sticking.
    pub wall_stick_contact: Option<CollideInfo>,

    /// Resolved horizontal move intent after state gating; what the physics
    /// force was derived from this tick. Facing adapters read this.
    pub move_side: f32,

    // Internal latches.
    pub(crate) last_grounded: bool,
    pub(crate) wall_stick_wait_input: bool,
    pub(crate) lock_drag: bool,
    pub(crate) platform_layer_mask: LayerMask,
    /// Down-intent snapped to {-1, 0, 1} while grounded, for plank drops.
    pub(crate) move_y_ground: f32,
    pub(crate) move_y_ground_down_time: f32,
    /// Set by [`reset_collision`](Self::reset_collision); consumed by the
    /// plank system to restore suppressed layers.
    pub(crate) plank_release_pending: bool,
}

impl Default for MovementState {
    fn default() -> Self {
        Self {
            local_velocity: Vec2::ZERO,
            collision_flags: CollisionFlags::empty(),
            ground_layer_mask: LayerMask::NONE,
            jump_counter: 0,
            is_jumping: false,
            is_wall_jumping: false,
            is_wall_sticking: false,
            is_on_platform: false,
            is_under_water: false,
            is_on_slope: false,
            last_jump_time: 0.0,
            last_grounded_time: 0.0,
            wall_stick_start_time: 0.0,
            wall_stick_last_input_time: 0.0,
            wall_stick_side: ContactSide::None,
            wall_stick_contact: None,
            move_side: 0.0,
            last_grounded: false,
            wall_stick_wait_input: false,
            lock_drag: false,
            platform_layer_mask: LayerMask::NONE,
            move_y_ground: 0.0,
            move_y_ground_down_time: 0.0,
            plank_release_pending: false,
        }
    }
}

impl MovementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grounded this tick: a Below contact on a walkable surface.
    pub fn is_grounded(&self) -> bool {
        self.collision_flags.contains(CollisionFlags::BELOW) && !self.is_on_slope
    }

    /// Wall jump is available: enabled and currently sticking.
    pub fn can_wall_jump(&self, config: &ControllerConfig) -> bool {
        config.jump_wall && self.is_wall_sticking
    }

    /// Clear all contact-derived state. Called on spawn/respawn, on external
    /// resets, and by a platform being removed under the controller.
    ///
    /// One tick of empty contacts after this call leaves the state identical
    /// to a freshly constructed controller.
    pub fn reset_collision(&mut self) {
        *self = Self {
            is_under_water: self.is_under_water,
            plank_release_pending: true,
            ..Self::default()
        };
    }

    /// Platform propagation entry point: a platform reports that this
    /// controller started (`on = true`) or stopped riding it.
    ///
    /// The platform's layer is folded into `ground_layer_mask` and the Below
    /// flag on the next collision refresh.
    pub fn platform_sweep(&mut self, on: bool, layer: u32) {
        if self.is_on_platform != on {
            self.is_on_platform = on;
            self.platform_layer_mask = if on {
                LayerMask::layer(layer)
            } else {
                LayerMask::NONE
            };
        }
    }

    /// Water volume transition. Entering resets the jump counter and clears
    /// wall-jumping; leaving mid-jump restamps the jump time so the held-jump
    /// window restarts from the surface.
    pub fn set_under_water(&mut self, under_water: bool, now: f32) {
        if self.is_under_water == under_water {
            return;
        }
        self.is_under_water = under_water;
        if under_water {
            self.jump_counter = 0;
            self.is_wall_jumping = false;
        } else if self.is_jumping {
            self.last_jump_time = now;
        }
    }

    /// Movement gate: may a move force be applied along `dir_world`?
    ///
    /// Accepts while below the horizontal speed cap; above it, only moves
    /// that sufficiently oppose the current velocity (dot below the cosine
    /// threshold) pass, so braking and reversal always work.
    pub fn can_move(&self, dir_world: Vec2, velocity_world: Vec2, config: &ControllerConfig) -> bool {
        let d = self.local_velocity.x * self.local_velocity.x;
        if d < config.max_speed * config.max_speed {
            return true;
        }
        let vel_dir = velocity_world.normalize_or_zero();
        dir_world.dot(vel_dir) < config.move_cos_check
    }

    /// Current downward speed cap while wall-sticking, ramped in with a
    /// sine ease over `wall_stick_down_ease_delay` from the stick start.
    pub fn wall_stick_down_cap(&self, config: &ControllerConfig, now: f32) -> f32 {
        let elapsed = now - self.wall_stick_start_time;
        if config.wall_stick_down_ease_delay <= 0.0 || elapsed >= config.wall_stick_down_ease_delay {
            return config.wall_stick_down_speed_cap;
        }
        let curve = EasingCurve::new(0.0, config.wall_stick_down_speed_cap, EaseFunction::SineIn);
        curve.sample_clamped(elapsed / config.wall_stick_down_ease_delay)
    }

    /// True when `axis` pushes into the stick wall.
    pub fn wall_stick_input_in(&self, axis: f32) -> bool {
        axis != 0.0
            && ((axis < 0.0 && self.wall_stick_side == ContactSide::Left)
                || (axis > 0.0 && self.wall_stick_side == ContactSide::Right))
    }

    /// True when `axis` pushes away from the stick wall.
    pub fn wall_stick_input_away(&self, axis: f32) -> bool {
        axis != 0.0
            && ((axis < 0.0 && self.wall_stick_side == ContactSide::Right)
                || (axis > 0.0 && self.wall_stick_side == ContactSide::Left))
    }
}

/// Marker: grounded this tick. Mutually exclusive with [`Airborne`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker: no walkable ground under the controller this tick.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Marker: clinging to a wall.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct WallSticking;

/// Marker: riding a moving platform.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct OnPlatform;

/// What initiated a jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// From the ground, a slope, or within the leniency window.
    Ground,
    /// Mid-air jump consuming the counter.
    Air,
    /// Off a wall while sticking.
    Wall,
}

/// Fired once per ground transition, and only when the controller was moving
/// downward (or not at all) at the instant of landing.
#[derive(Event, Debug, Clone, Copy)]
pub struct Landed {
    pub entity: Entity,
}

/// Fired once per successful jump initiation.
#[derive(Event, Debug, Clone, Copy)]
pub struct Jumped {
    pub entity: Entity,
    pub kind: JumpKind,
}
