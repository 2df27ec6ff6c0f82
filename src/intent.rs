//! Movement intent from a player or AI.
//!
//! The intent is a dumb mailbox: input adapters write axis values and the
//! jump button state once before each fixed tick, and the controller systems
//! interpret them. Axis values are deliberately NOT clamped so acceleration
//! can be overdriven by design; clamping is the caller's business.

use bevy::prelude::*;

/// Per-tick movement intent for one controller.
#[derive(Component, Reflect, Debug, Clone, PartialEq)]
#[reflect(Component)]
pub struct MoveIntent {
    /// Horizontal axis, nominally in [-1, 1] but accepted as-is.
    pub move_axis: f32,
    /// Vertical axis, used under water and for plank drops.
    pub vertical_axis: f32,
    /// When true, the controller never overwrites
    /// [`MovementState::move_side`](crate::state::MovementState::move_side);
    /// an external driver owns it.
    pub side_lock: bool,
    /// Master input switch. Disabled controllers zero their move intent and
    /// stop any jump in progress.
    pub input_enabled: bool,
    /// Current jump button state. Edge-triggered by the controller: repeated
    /// writes of the same value are idempotent.
    pub jump_pressed: bool,
    /// Previous tick's button state, managed by the jump system.
    pub(crate) jump_pressed_prev: bool,
}

impl Default for MoveIntent {
    fn default() -> Self {
        Self {
            move_axis: 0.0,
            vertical_axis: 0.0,
            side_lock: false,
            input_enabled: true,
            jump_pressed: false,
            jump_pressed_prev: false,
        }
    }
}

impl MoveIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both movement axes. Values outside [-1, 1] are passed through.
    pub fn set_axes(&mut self, move_axis: f32, vertical_axis: f32) {
        self.move_axis = move_axis;
        self.vertical_axis = vertical_axis;
    }

    /// Set the jump button state. Call every tick with the current value from
    /// any source (keyboard, gamepad, AI); the controller reacts only to
    /// transitions.
    pub fn set_jump_pressed(&mut self, pressed: bool) {
        self.jump_pressed = pressed;
    }

    /// True on the tick the button goes down.
    pub(crate) fn jump_just_pressed(&self) -> bool {
        self.jump_pressed && !self.jump_pressed_prev
    }

    /// True on the tick the button goes up.
    pub(crate) fn jump_just_released(&self) -> bool {
        !self.jump_pressed && self.jump_pressed_prev
    }

    pub fn clear(&mut self) {
        self.move_axis = 0.0;
        self.vertical_axis = 0.0;
    }

    pub fn is_moving(&self) -> bool {
        self.move_axis.abs() > 0.001
    }
}
