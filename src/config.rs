//! Controller configuration and local orientation basis.
//!
//! All tunables are supplied at spawn time and treated as immutable for the
//! controller's lifetime. Malformed values (empty layer masks, zero jump
//! counters) disable the dependent feature instead of erroring.

use bevy::prelude::*;

use crate::contact::LayerMask;

/// Local up/right basis for a controller.
///
/// Velocities and movement rules are expressed in this basis, which may be
/// rotated away from world axes (slopes, rotating reference frames, gravity
/// redirection).
#[derive(Component, Reflect, Debug, Clone, Copy, PartialEq)]
#[reflect(Component)]
pub struct ControllerOrientation {
    up: Vec2,
}

impl Default for ControllerOrientation {
    fn default() -> Self {
        Self { up: Vec2::Y }
    }
}

impl ControllerOrientation {
    /// Build from an up direction; zero-length input falls back to `Vec2::Y`.
    pub fn new(up: Vec2) -> Self {
        let n = up.normalize_or_zero();
        Self {
            up: if n == Vec2::ZERO { Vec2::Y } else { n },
        }
    }

    #[inline]
    pub fn up(&self) -> Vec2 {
        self.up
    }

    #[inline]
    pub fn down(&self) -> Vec2 {
        -self.up
    }

    /// Perpendicular to up, clockwise.
    #[inline]
    pub fn right(&self) -> Vec2 {
        Vec2::new(self.up.y, -self.up.x)
    }

    pub fn set_up(&mut self, up: Vec2) {
        let n = up.normalize_or_zero();
        if n != Vec2::ZERO {
            self.up = n;
        }
    }

    /// Angle of the up direction from world +X, radians.
    pub fn angle(&self) -> f32 {
        self.up.to_angle()
    }

    /// Express a world-space vector in this basis (x = right, y = up).
    pub fn to_local(&self, world: Vec2) -> Vec2 {
        Vec2::new(world.dot(self.right()), world.dot(self.up))
    }

    /// Convert a local-basis vector back to world space.
    pub fn to_world(&self, local: Vec2) -> Vec2 {
        self.right() * local.x + self.up * local.y
    }
}

/// Static tunables for the platformer movement controller.
///
/// Defaults match a small-scale physics world (impulses in m/s terms); use the
/// builder methods to retune for your unit scale.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct ControllerConfig {
    // === Horizontal movement ===
    /// Force applied along the local right axis per unit of move intent.
    pub move_force: f32,
    /// Horizontal speed cap enforced by the movement gate.
    pub max_speed: f32,
    /// Cosine threshold for the movement gate's reversal exception: a move
    /// whose direction dotted with the velocity direction falls below this is
    /// allowed even at max speed (braking is never blocked).
    pub move_cos_check: f32,

    // === Jumping ===
    /// Maximum jumps before a fresh ground contact is required. 1 = single
    /// jump, 2 = double jump. 0 disables jumping from the air entirely.
    pub jump_counter_max: u32,
    /// Instant upward impulse on jump initiation.
    pub jump_impulse: f32,
    /// Continuous upward force while the button is held after a jump.
    pub jump_force: f32,
    /// How long the held-button force keeps applying after initiation.
    pub jump_delay: f32,
    /// Local vertical speed above which the held-jump force stops adding.
    pub air_max_speed: f32,
    /// Leniency window after leaving the ground during which a jump still
    /// counts as a ground jump (coyote time).
    pub jump_air_delay: f32,
    /// Permit the first air jump while already falling, outside the leniency
    /// window.
    pub jump_drop_allow: bool,
    /// Continuous upward force while jumping under water.
    pub jump_water_force: f32,
    /// On jump release, clamp upward local velocity down to
    /// `jump_release_clear_velocity_to` (shorter hops on early release).
    pub jump_release_clear_velocity: bool,
    pub jump_release_clear_velocity_to: f32,

    // === Wall jump ===
    /// Enable jumping off a wall while wall-sticking.
    pub jump_wall: bool,
    /// Impulse along the wall normal on a wall jump.
    pub jump_wall_impulse: f32,
    /// Impulse along local up on a wall jump.
    pub jump_wall_up_impulse: f32,
    /// Horizontal input is suppressed for this long after a wall jump; the
    /// wall-jumping flag force-clears when it elapses.
    pub jump_wall_lock_delay: f32,

    // === Wall stick ===
    pub wall_stick: bool,
    /// Push mode: sticking is sustained only while intent pushes into the
    /// wall. Off = passive mode: stick on contact, release on move-away.
    pub wall_stick_push: bool,
    /// Only stick when local vertical velocity is non-positive.
    pub wall_stick_down_only: bool,
    /// Acceptable deviation from perpendicular for a stickable wall, radians.
    /// Boundary inclusive: exactly `90deg - ofs` from up still sticks.
    pub wall_stick_angle_ofs: f32,
    /// Debounce before releasing the stick on input release/move-away.
    pub wall_stick_delay: f32,
    /// Window after stick start during which holding jump climbs the wall.
    pub wall_stick_up_delay: f32,
    /// Tangential climb force during the up-delay window.
    pub wall_stick_up_force: f32,
    /// Constant force into the wall while sticking (keeps the contact alive
    /// against restitution).
    pub wall_stick_force: f32,
    /// Ramp duration for the downward speed cap; 0 applies the cap instantly.
    pub wall_stick_down_ease_delay: f32,
    /// Downward local speed cap while sticking ("wall friction").
    pub wall_stick_down_speed_cap: f32,
    /// Layers that never allow wall stick.
    pub wall_stick_invalid_mask: LayerMask,

    // === Air damping ===
    /// Horizontal deceleration force while airborne with no contacts and no
    /// intent. 0 disables.
    pub air_damp_force: f32,
    /// Minimum |horizontal speed| before air damping engages.
    pub air_damp_min_speed: f32,

    // === Slopes ===
    /// Surfaces steeper than this (radians from up) stop counting as ground.
    pub slope_limit: f32,
    /// Permit jumping while sliding on a too-steep slope.
    pub slide_allow_jump: bool,

    // === Planks (one-way surfaces) ===
    /// Layers treated as planks; empty disables plank handling.
    pub plank_layer: LayerMask,
    /// Holding down drops through a plank underfoot.
    pub plank_enable_drop: bool,
    /// How long down must be held before dropping.
    pub plank_drop_delay: f32,
    /// Poll interval for re-enabling suppressed plank collision.
    pub plank_check_delay: f32,

    // === Drag ===
    /// Linear damping while grounded, applied unless a jump locked the drag.
    pub ground_drag: f32,
    /// Linear damping while airborne and while drag is jump-locked.
    pub air_drag: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            move_force: 60.0,
            max_speed: 10.0,
            move_cos_check: 0.6,

            jump_counter_max: 1,
            jump_impulse: 2.0,
            jump_force: 80.0,
            jump_delay: 0.1,
            air_max_speed: 6.0,
            jump_air_delay: 0.1,
            jump_drop_allow: true,
            jump_water_force: 5.0,
            jump_release_clear_velocity: false,
            jump_release_clear_velocity_to: 0.0,

            jump_wall: false,
            jump_wall_impulse: 8.0,
            jump_wall_up_impulse: 4.0,
            jump_wall_lock_delay: 0.1,

            wall_stick: true,
            wall_stick_push: false,
            wall_stick_down_only: false,
            wall_stick_angle_ofs: 10f32.to_radians(),
            wall_stick_delay: 0.2,
            wall_stick_up_delay: 0.2,
            wall_stick_up_force: 60.0,
            wall_stick_force: 40.0,
            wall_stick_down_ease_delay: 0.0,
            wall_stick_down_speed_cap: 5.0,
            wall_stick_invalid_mask: LayerMask::NONE,

            air_damp_force: 0.0,
            air_damp_min_speed: 0.0,

            slope_limit: 50f32.to_radians(),
            slide_allow_jump: false,

            plank_layer: LayerMask::NONE,
            plank_enable_drop: false,
            plank_drop_delay: 0.25,
            plank_check_delay: 0.2,

            ground_drag: 0.0,
            air_drag: 0.015,
        }
    }
}

impl ControllerConfig {
    /// Preset tuned for a responsive player character: double jump and wall
    /// jump enabled, mild air damping.
    pub fn player() -> Self {
        Self {
            jump_counter_max: 2,
            jump_wall: true,
            air_damp_force: 20.0,
            air_damp_min_speed: 1.0,
            ..default()
        }
    }

    /// Builder: jump counter maximum.
    pub fn with_jump_counter(mut self, max: u32) -> Self {
        self.jump_counter_max = max;
        self
    }

    /// Builder: enable/disable wall jump.
    pub fn with_wall_jump(mut self, enabled: bool) -> Self {
        self.jump_wall = enabled;
        self
    }

    /// Builder: wall stick mode and angle tolerance.
    pub fn with_wall_stick(mut self, enabled: bool, push_mode: bool) -> Self {
        self.wall_stick = enabled;
        self.wall_stick_push = push_mode;
        self
    }

    /// Builder: wall stick angle tolerance in radians.
    pub fn with_wall_stick_angle_ofs(mut self, ofs: f32) -> Self {
        self.wall_stick_angle_ofs = ofs;
        self
    }

    /// Builder: movement parameters.
    pub fn with_movement(mut self, move_force: f32, max_speed: f32) -> Self {
        self.move_force = move_force;
        self.max_speed = max_speed;
        self
    }

    /// Builder: jump impulse and held force.
    pub fn with_jump(mut self, impulse: f32, hold_force: f32, hold_delay: f32) -> Self {
        self.jump_impulse = impulse;
        self.jump_force = hold_force;
        self.jump_delay = hold_delay;
        self
    }

    /// Builder: plank layers and drop behavior.
    pub fn with_planks(mut self, layers: LayerMask, enable_drop: bool) -> Self {
        self.plank_layer = layers;
        self.plank_enable_drop = enable_drop;
        self
    }

    /// Builder: air damping force and engagement speed.
    pub fn with_air_damping(mut self, force: f32, min_speed: f32) -> Self {
        self.air_damp_force = force;
        self.air_damp_min_speed = min_speed;
        self
    }

    /// Whether plank handling is active at all.
    pub fn planks_enabled(&self) -> bool {
        !self.plank_layer.is_empty()
    }
}
