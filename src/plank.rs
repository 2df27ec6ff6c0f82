//! One-way surfaces ("planks").
//!
//! The collision refresh decides when a plank layer gets suppressed (pass
//! through from below/side, or a deliberate drop). This module owns the
//! bookkeeping: which layers are suppressed, and the periodic revalidation
//! that restores collision once the backend's overlap probe reports the body
//! clear of the plank.

use std::mem;

use bevy::prelude::*;

use crate::backend::PhysicsBackend;
use crate::contact::LayerMask;
use crate::state::MovementState;

/// Plank suppression state for one controller.
#[derive(Component, Debug, Default, Clone)]
pub struct PlankState {
    /// Layers with collision currently suppressed.
    ignored: LayerMask,
    /// Suppressed layers the body still overlaps, written by the backend's
    /// probe each tick. Stale entries are harmless; they just delay restore
    /// by one poll.
    pub(crate) overlap_mask: LayerMask,
    /// Poll timer for restoration, running only while layers are suppressed.
    check_timer: Timer,
}

impl PlankState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layers with collision currently suppressed.
    pub fn ignored(&self) -> LayerMask {
        self.ignored
    }

    /// Mark a layer suppressed. Returns true when it was not already, in
    /// which case the caller owes the backend an ignore toggle.
    pub(crate) fn suppress(&mut self, layer: u32, check_delay: f32) -> bool {
        if self.ignored.contains(layer) {
            return false;
        }
        if self.ignored.is_empty() {
            self.check_timer = Timer::from_seconds(check_delay, TimerMode::Repeating);
        }
        self.ignored.insert(layer);
        true
    }
}

/// Restore suppressed plank layers once the body no longer overlaps them.
///
/// Polls on the configured interval rather than every tick. An external
/// collision reset restores everything immediately.
pub fn revalidate_planks<B: PhysicsBackend>(world: &mut World) {
    let delta = world
        .get_resource::<Time>()
        .map(|t| t.delta())
        .unwrap_or_default();

    let entities: Vec<Entity> = world
        .query_filtered::<Entity, With<PlankState>>()
        .iter(world)
        .collect();

    for entity in entities {
        let mut plank = match world.get_mut::<PlankState>(entity) {
            Some(mut p) => mem::take(&mut *p),
            None => continue,
        };

        let release_all = world
            .get_mut::<MovementState>(entity)
            .map(|mut s| mem::take(&mut s.plank_release_pending))
            .unwrap_or(false);

        if plank.ignored.is_empty() {
            if let Some(mut p) = world.get_mut::<PlankState>(entity) {
                *p = plank;
            }
            continue;
        }

        if release_all {
            for layer in plank.ignored.iter() {
                B::set_layers_ignore(world, entity, layer, false);
            }
            plank.ignored = LayerMask::NONE;
        } else {
            plank.check_timer.tick(delta);
            if plank.check_timer.just_finished() {
                for layer in plank.ignored.iter() {
                    if !plank.overlap_mask.contains(layer) {
                        debug!(?entity, layer, "plank collision restored");
                        B::set_layers_ignore(world, entity, layer, false);
                        plank.ignored.remove(layer);
                    }
                }
            }
        }

        if plank.ignored.is_empty() {
            plank.check_timer.reset();
        }
        if let Some(mut p) = world.get_mut::<PlankState>(entity) {
            *p = plank;
        }
    }
}
