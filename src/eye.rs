//! Eye (camera anchor) follow adapter.
//!
//! A render-facing entity trailing its controller: position eased toward the
//! controller plus an offset, rotation turned toward the controller's up axis
//! at a capped angular speed. Runs in `Update`, outside the fixed tick.

use bevy::prelude::*;

use crate::config::ControllerOrientation;

/// Attach to a camera anchor (or similar) to trail a controller entity.
#[derive(Component, Reflect, Debug, Clone)]
pub struct EyeFollow {
    /// Controller entity to trail.
    pub target: Entity,
    /// Offset from the target, in the target's local basis.
    pub offset: Vec2,
    /// Exponential decay rate for position smoothing; higher is snappier.
    pub follow_rate: f32,
    /// Rotate to match the target's up axis.
    pub orient: bool,
    /// Angular speed cap for orientation, radians/second.
    pub orient_speed: f32,
    /// Freeze the eye in place (cutscenes, death).
    pub locked: bool,
}

impl EyeFollow {
    pub fn new(target: Entity) -> Self {
        Self {
            target,
            offset: Vec2::ZERO,
            follow_rate: 10.0,
            orient: true,
            orient_speed: std::f32::consts::PI,
            locked: false,
        }
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }
}

pub fn update_eye_follow(
    time: Res<Time>,
    targets: Query<(&Transform, Option<&ControllerOrientation>), Without<EyeFollow>>,
    mut eyes: Query<(&EyeFollow, &mut Transform)>,
) {
    let dt = time.delta_secs();
    for (eye, mut transform) in &mut eyes {
        if eye.locked {
            continue;
        }
        let Ok((target, orientation)) = targets.get(eye.target) else {
            continue;
        };
        let orientation = orientation.copied().unwrap_or_default();

        let goal = target.translation.truncate() + orientation.to_world(eye.offset);
        let mut pos = transform.translation.truncate();
        pos.smooth_nudge(&goal, eye.follow_rate, dt);
        transform.translation.x = pos.x;
        transform.translation.y = pos.y;

        if eye.orient {
            // Up axis angle relative to the default +Y.
            let goal_rot =
                Quat::from_rotation_z(orientation.angle() - std::f32::consts::FRAC_PI_2);
            let diff = transform.rotation.angle_between(goal_rot);
            if diff > 1e-4 {
                let t = (eye.orient_speed * dt / diff).min(1.0);
                transform.rotation = transform.rotation.slerp(goal_rot, t);
            }
        }
    }
}
