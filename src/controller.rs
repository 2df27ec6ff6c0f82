//! Per-tick movement controller systems.
//!
//! These run in `FixedUpdate`, after the backend's sensor systems and the
//! platform propagation, in a fixed chain:
//!
//! 1. [`refresh_collision_state`] - recompute flags, planks, wall stick,
//!    ground transitions from this tick's contacts
//! 2. [`apply_movement`] - intent into gated horizontal/swim forces
//! 3. [`apply_jump`] - edge-triggered jump resolve plus held-button force
//! 4. [`apply_wall_stick_forces`] - down-speed cap, climb window, wall press
//! 5. [`apply_air_damping`] - horizontal drift decay in free air
//! 6. [`expire_wall_jump`] - time out the wall-jump input lock
//! 7. [`sync_state_markers`] - marker components for adapters
//!
//! All systems are generic over the [`PhysicsBackend`] and collect-then-act
//! so body operations can take `&mut World`.

use std::f32::consts::FRAC_PI_2;
use std::mem;

use bevy::prelude::*;

use crate::backend::PhysicsBackend;
use crate::config::{ControllerConfig, ControllerOrientation};
use crate::contact::{CollisionFlags, ContactSet, ContactSide};
use crate::intent::MoveIntent;
use crate::plank::PlankState;
use crate::state::{
    Airborne, Grounded, JumpKind, Jumped, Landed, MovementState, OnPlatform, WallSticking,
};

/// Slack on the wall-stick angle band so a surface lying exactly on the
/// boundary is accepted despite float rounding.
const BAND_EPS: f32 = 1e-4;

/// Project a vector onto the plane perpendicular to `normal` (wall tangent).
fn slide(v: Vec2, normal: Vec2) -> Vec2 {
    v - normal * v.dot(normal)
}

fn controller_entities(world: &mut World) -> Vec<Entity> {
    world
        .query_filtered::<Entity, (
            With<MovementState>,
            With<ControllerConfig>,
            With<MoveIntent>,
            With<ContactSet>,
        )>()
        .iter(world)
        .collect()
}

fn orientation_of(world: &World, entity: Entity) -> ControllerOrientation {
    world
        .get::<ControllerOrientation>(entity)
        .copied()
        .unwrap_or_default()
}

fn now(world: &World) -> f32 {
    world
        .get_resource::<Time>()
        .map(|t| t.elapsed_secs())
        .unwrap_or(0.0)
}

/// Zero any downward local velocity so a jump impulse never has to fight
/// residual fall speed.
fn prep_jump_velocity<B: PhysicsBackend>(
    world: &mut World,
    entity: Entity,
    orientation: &ControllerOrientation,
) {
    let mut local = orientation.to_local(B::get_velocity(world, entity));
    if local.y < 0.0 {
        local.y = 0.0;
        B::set_velocity(world, entity, orientation.to_world(local));
    }
}

/// Zero horizontal velocity and clamp downward speed to the eased cap: the
/// wall-stick entry clamp, also reapplied continuously while sticking.
fn clamp_stick_velocity<B: PhysicsBackend>(
    world: &mut World,
    entity: Entity,
    state: &MovementState,
    config: &ControllerConfig,
    orientation: &ControllerOrientation,
    tick_time: f32,
) -> Vec2 {
    let mut local = orientation.to_local(B::get_velocity(world, entity));
    local.x = 0.0;
    let cap = state.wall_stick_down_cap(config, tick_time);
    if local.y < -cap {
        local.y = -cap;
    }
    B::set_velocity(world, entity, orientation.to_world(local));
    local
}

/// Recompute all contact-derived state for this tick.
pub fn refresh_collision_state<B: PhysicsBackend>(world: &mut World) {
    let tick_time = now(world);

    for entity in controller_entities(world) {
        let Some(config) = world.get::<ControllerConfig>(entity).cloned() else {
            continue;
        };
        let orientation = orientation_of(world, entity);
        let mut state = match world.get::<MovementState>(entity) {
            Some(s) => s.clone(),
            None => continue,
        };
        // Take the set out so body ops can borrow the world freely.
        let mut contacts = match world.get_mut::<ContactSet>(entity) {
            Some(mut c) => mem::take(&mut *c),
            None => continue,
        };

        // Prune contacts whose collider died mid-tick.
        contacts.retain(|c| world.get_entity(c.entity).is_ok());

        let up = orientation.up();
        let fresh_local = orientation.to_local(B::get_velocity(world, entity));

        // Plank filtering. Non-Below plank contacts are pass-through: drop
        // the contact, restore the pre-collision velocity and suppress the
        // layer. Below plank contacts drop only on a held-down intent.
        if config.planks_enabled() {
            let mut plank_hit: Option<(u32, ContactSide)> = None;
            contacts.retain(|c| {
                if config.plank_layer.contains(c.layer) {
                    plank_hit = Some((c.layer, c.side));
                    return c.side == ContactSide::Below;
                }
                true
            });

            match plank_hit {
                Some((layer, ContactSide::Below)) => {
                    if config.plank_enable_drop
                        && state.move_y_ground < 0.0
                        && tick_time - state.move_y_ground_down_time >= config.plank_drop_delay
                    {
                        suppress_plank::<B>(world, entity, layer, config.plank_check_delay);
                    }
                }
                Some((layer, _)) => {
                    // The solver already reacted to the plank; revert to last
                    // tick's velocity and let the body pass through.
                    B::set_velocity(world, entity, orientation.to_world(state.local_velocity));
                    suppress_plank::<B>(world, entity, layer, config.plank_check_delay);
                }
                None => {
                    if state.is_grounded() && state.move_y_ground < 0.0 {
                        state.move_y_ground = 0.0;
                    }
                }
            }
        }

        state.local_velocity = fresh_local;

        // Full flag recomputation; no carry-over.
        state.collision_flags = contacts.flags();
        state.ground_layer_mask = contacts.ground_layers();

        // Slope: a support surface steeper than traction but shy of the
        // wall-stick band, with no walkable ground in the set.
        state.is_on_slope = !state.collision_flags.contains(CollisionFlags::BELOW)
            && contacts.iter().any(|c| {
                let a = c.normal.angle_to(up).abs();
                a > config.slope_limit && a < FRAC_PI_2 - config.wall_stick_angle_ofs - BAND_EPS
            });

        // Platform riding injects a Below contact and its layer.
        if state.is_on_platform {
            state.collision_flags |= CollisionFlags::BELOW;
            state.ground_layer_mask.0 |= state.platform_layer_mask.0;
            state.is_on_slope = false;
        }

        let last_stick = state.is_wall_sticking;
        state.is_wall_sticking = false;

        if state.is_on_slope {
            // Sliding: no traction, and no jumps left until solid ground.
            state.last_grounded = false;
            state.jump_counter = config.jump_counter_max;
        } else if config.wall_stick
            && !state.is_wall_jumping
            && state.collision_flags.sides_only()
            && (!config.wall_stick_down_only || state.local_velocity.y <= 0.0)
        {
            for c in contacts.iter() {
                if !c.side.is_side() {
                    continue;
                }
                if !config.wall_stick_invalid_mask.is_empty()
                    && config.wall_stick_invalid_mask.contains(c.layer)
                {
                    continue;
                }
                let a = c.normal.angle_to(up).abs();
                // Boundary inclusive on both ends of the band.
                if a >= FRAC_PI_2 - config.wall_stick_angle_ofs - BAND_EPS
                    && a <= FRAC_PI_2 + config.wall_stick_angle_ofs + BAND_EPS
                {
                    state.wall_stick_contact = Some(*c);
                    state.wall_stick_side = ContactSide::of_normal(c.normal, up);
                    state.is_wall_sticking = true;
                    break;
                }
            }
        }

        if state.is_wall_sticking {
            if config.wall_stick_push {
                // Sustained only while intent pushes into the wall, with a
                // debounce so direction flicker does not drop the stick.
                if state.wall_stick_input_in(state.move_side) {
                    if !state.wall_stick_wait_input {
                        state.local_velocity = clamp_stick_velocity::<B>(
                            world,
                            entity,
                            &state,
                            &config,
                            &orientation,
                            tick_time,
                        );
                        state.wall_stick_wait_input = true;
                    }
                    if !last_stick {
                        state.wall_stick_start_time = tick_time;
                    }
                    state.wall_stick_last_input_time = tick_time;
                } else if tick_time - state.wall_stick_last_input_time > config.wall_stick_delay {
                    state.wall_stick_wait_input = false;
                    state.is_wall_sticking = false;
                }
            } else {
                // Passive: stick on contact, release after the debounce once
                // intent pushes away.
                let expired =
                    tick_time - state.wall_stick_start_time > config.wall_stick_delay;
                if expired && state.wall_stick_input_away(state.move_side) {
                    if !state.wall_stick_wait_input {
                        state.is_wall_sticking = false;
                    }
                } else if !last_stick {
                    state.wall_stick_wait_input = true;
                    state.wall_stick_start_time = tick_time;
                    state.local_velocity = clamp_stick_velocity::<B>(
                        world,
                        entity,
                        &state,
                        &config,
                        &orientation,
                        tick_time,
                    );
                }
            }
        }

        if state.is_wall_sticking != last_stick {
            if state.is_wall_sticking {
                debug!(?entity, side = ?state.wall_stick_side, "wall stick start");
                state.is_jumping = false;
                state.lock_drag = false;
            } else if config.wall_stick_push {
                state.wall_stick_wait_input = false;
            }
        }

        // Drag follows grounded state unless a jump holds it at air drag.
        if !state.lock_drag {
            let drag = if state.is_grounded() {
                config.ground_drag
            } else {
                config.air_drag
            };
            B::set_linear_damping(world, entity, drag);
        }

        // Ground transition.
        let grounded = state.is_grounded();
        if state.last_grounded != grounded {
            if grounded {
                state.jump_counter = 0;
                if state.local_velocity.y <= 0.0 {
                    debug!(?entity, "landed");
                    world.send_event(Landed { entity });
                }
            } else {
                // Stamp both so the air-jump leniency window and the held
                // jump force behave as if the jump began at the ledge.
                state.last_jump_time = tick_time;
                state.last_grounded_time = tick_time;
            }
            state.last_grounded = grounded;
        }

        if let Some(mut s) = world.get_mut::<MovementState>(entity) {
            *s = state;
        }
        if let Some(mut c) = world.get_mut::<ContactSet>(entity) {
            *c = contacts;
        }
    }
}

fn suppress_plank<B: PhysicsBackend>(world: &mut World, entity: Entity, layer: u32, check_delay: f32) {
    let newly = world
        .get_mut::<PlankState>(entity)
        .map(|mut p| p.suppress(layer, check_delay))
        .unwrap_or(false);
    if newly {
        debug!(?entity, layer, "plank collision suppressed");
        B::set_layers_ignore(world, entity, layer, true);
    }
}

/// Resolve move intent into gated horizontal (or underwater two-axis) forces.
pub fn apply_movement<B: PhysicsBackend>(world: &mut World) {
    let tick_time = now(world);

    for entity in controller_entities(world) {
        let Some(config) = world.get::<ControllerConfig>(entity).cloned() else {
            continue;
        };
        let orientation = orientation_of(world, entity);
        let Some(intent) = world.get::<MoveIntent>(entity).cloned() else {
            continue;
        };
        let mut state = match world.get::<MovementState>(entity) {
            Some(s) => s.clone(),
            None => continue,
        };

        if !intent.input_enabled {
            if !intent.side_lock {
                state.move_side = 0.0;
            }
            state.is_jumping = false;
            state.move_y_ground = 0.0;
            if let Some(mut s) = world.get_mut::<MovementState>(entity) {
                *s = state;
            }
            continue;
        }

        let move_x = intent.move_axis;
        let move_y = intent.vertical_axis;

        if !intent.side_lock {
            state.move_side = 0.0;
        }

        let mut swim = false;
        if state.is_under_water && !state.is_grounded() {
            swim = true;
        } else if state.is_wall_sticking {
            if config.wall_stick_push {
                if !intent.side_lock {
                    state.move_side = move_x;
                }
            } else if state.wall_stick_wait_input {
                if state.wall_stick_input_away(move_x) {
                    state.wall_stick_wait_input = false;
                    state.wall_stick_start_time = tick_time;
                }
            } else if tick_time - state.wall_stick_start_time > config.wall_stick_delay
                && !intent.side_lock
            {
                state.move_side = move_x;
            }
        } else if !(state.is_on_slope || state.is_wall_jumping) {
            if !intent.side_lock {
                state.move_side = move_x;
            }
            if state.is_grounded() {
                // Snap the vertical intent for plank-drop timing.
                let new_y = if move_y < -0.1 {
                    -1.0
                } else if move_y > 0.1 {
                    1.0
                } else {
                    0.0
                };
                if state.move_y_ground != new_y {
                    state.move_y_ground = new_y;
                    if new_y < 0.0 {
                        state.move_y_ground_down_time = tick_time;
                    }
                }
            } else {
                state.move_y_ground = 0.0;
            }
        }

        let velocity = B::get_velocity(world, entity);
        if swim {
            let axis = Vec2::new(move_x, move_y);
            if axis != Vec2::ZERO {
                let dir = orientation.to_world(axis.normalize_or_zero());
                if state.can_move(dir, velocity, &config) {
                    B::apply_force(world, entity, orientation.to_world(axis) * config.move_force);
                }
            }
        } else if state.move_side != 0.0 {
            let dir = orientation.right() * state.move_side.signum();
            if state.can_move(dir, velocity, &config) {
                B::apply_force(
                    world,
                    entity,
                    orientation.right() * state.move_side * config.move_force,
                );
            }
        }

        if let Some(mut s) = world.get_mut::<MovementState>(entity) {
            *s = state;
        }
    }
}

/// Edge-triggered jump resolution plus the held-button continuation force.
///
/// Policy precedence on a press, highest first: underwater jump, wall jump,
/// then slope/ground/air jump.
pub fn apply_jump<B: PhysicsBackend>(world: &mut World) {
    let tick_time = now(world);

    for entity in controller_entities(world) {
        let Some(config) = world.get::<ControllerConfig>(entity).cloned() else {
            continue;
        };
        let orientation = orientation_of(world, entity);
        let Some(intent) = world.get::<MoveIntent>(entity).cloned() else {
            continue;
        };
        let mut state = match world.get::<MovementState>(entity) {
            Some(s) => s.clone(),
            None => continue,
        };

        if intent.input_enabled && intent.jump_just_pressed() {
            if state.is_under_water {
                // No impulse; the water force below carries the body up.
                state.is_wall_jumping = false;
                state.is_jumping = true;
                state.jump_counter = 0;
            } else if state.can_wall_jump(&config) {
                if let Some(contact) = state.wall_stick_contact {
                    B::set_velocity(world, entity, Vec2::ZERO);
                    state.lock_drag = true;
                    B::set_linear_damping(world, entity, config.air_drag);

                    let impulse = contact.normal * config.jump_wall_impulse
                        + orientation.up() * config.jump_wall_up_impulse;
                    B::apply_impulse(world, entity, impulse);

                    state.is_wall_jumping = true;
                    state.is_jumping = true;
                    state.is_wall_sticking = false;
                    state.last_jump_time = tick_time;
                    // A wall jump always counts as the first extra jump.
                    state.jump_counter = 1;

                    debug!(?entity, "wall jump");
                    world.send_event(Jumped {
                        entity,
                        kind: JumpKind::Wall,
                    });
                }
            } else if !state.is_on_slope || config.slide_allow_jump {
                let leniency = tick_time - state.last_grounded_time < config.jump_air_delay;
                let air_ok = state.jump_counter < config.jump_counter_max
                    && (leniency || config.jump_drop_allow || state.jump_counter > 0);

                if state.is_grounded() || state.is_on_slope || air_ok {
                    state.lock_drag = true;
                    B::set_linear_damping(world, entity, config.air_drag);

                    prep_jump_velocity::<B>(world, entity, &orientation);
                    B::apply_impulse(world, entity, orientation.up() * config.jump_impulse);

                    let kind = if state.is_grounded() || state.is_on_slope || leniency {
                        JumpKind::Ground
                    } else {
                        JumpKind::Air
                    };
                    state.jump_counter += 1;
                    state.is_wall_jumping = false;
                    state.is_wall_sticking = false;
                    state.is_jumping = true;
                    state.last_jump_time = tick_time;

                    world.send_event(Jumped { entity, kind });
                }
            }
        } else if intent.input_enabled
            && intent.jump_just_released()
            && config.jump_release_clear_velocity
        {
            // Short hop: trim any remaining upward speed.
            let mut local = orientation.to_local(B::get_velocity(world, entity));
            if local.y > config.jump_release_clear_velocity_to {
                local.y = config.jump_release_clear_velocity_to;
                B::set_velocity(world, entity, orientation.to_world(local));
            }
        }

        if let Some(mut i) = world.get_mut::<MoveIntent>(entity) {
            i.jump_pressed_prev = i.jump_pressed;
        }

        // Held-button continuation: variable jump height.
        if state.is_jumping && !state.is_wall_sticking {
            if state.is_under_water {
                B::apply_force(world, entity, orientation.up() * config.jump_water_force);
            } else if !intent.jump_pressed
                || tick_time - state.last_jump_time >= config.jump_delay
                || state.collision_flags.contains(CollisionFlags::ABOVE)
            {
                state.is_jumping = false;
                state.lock_drag = false;
            } else if state.local_velocity.y < config.air_max_speed {
                B::apply_force(world, entity, orientation.up() * config.jump_force);
            }
        }

        if let Some(mut s) = world.get_mut::<MovementState>(entity) {
            *s = state;
        }
    }
}

/// Continuous wall-stick physics: reapply the downward speed cap, the brief
/// tangential climb while holding jump, and the constant press into the wall.
pub fn apply_wall_stick_forces<B: PhysicsBackend>(world: &mut World) {
    let tick_time = now(world);

    for entity in controller_entities(world) {
        let Some(config) = world.get::<ControllerConfig>(entity).cloned() else {
            continue;
        };
        let orientation = orientation_of(world, entity);
        let Some(intent) = world.get::<MoveIntent>(entity).cloned() else {
            continue;
        };
        let state = match world.get::<MovementState>(entity) {
            Some(s) => s.clone(),
            None => continue,
        };

        if !state.is_wall_sticking {
            continue;
        }
        let Some(contact) = state.wall_stick_contact else {
            continue;
        };

        let local = orientation.to_local(B::get_velocity(world, entity));
        let cap = state.wall_stick_down_cap(&config, tick_time);
        if local.y < -cap {
            let clamped = Vec2::new(local.x, -cap);
            B::set_velocity(world, entity, orientation.to_world(clamped));
        } else if local.y >= 0.0 {
            let since_stick = tick_time - state.wall_stick_start_time;
            if since_stick <= config.wall_stick_up_delay
                && intent.jump_pressed
                && local.y < config.air_max_speed
            {
                let climb_dir = slide(orientation.up(), contact.normal);
                B::apply_force(world, entity, climb_dir * config.wall_stick_up_force);
            }
        }

        // Keep the contact alive against solver restitution.
        B::apply_force(world, entity, -contact.normal * config.wall_stick_force);
    }
}

/// Decay horizontal drift while airborne with no contacts and no intent.
pub fn apply_air_damping<B: PhysicsBackend>(world: &mut World) {
    for entity in controller_entities(world) {
        let Some(config) = world.get::<ControllerConfig>(entity).cloned() else {
            continue;
        };
        if config.air_damp_force == 0.0 {
            continue;
        }
        let orientation = orientation_of(world, entity);
        let state = match world.get::<MovementState>(entity) {
            Some(s) => s.clone(),
            None => continue,
        };
        let no_contacts = world
            .get::<ContactSet>(entity)
            .map(|c| c.is_empty())
            .unwrap_or(true);

        if state.is_wall_sticking || !no_contacts || state.move_side != 0.0 {
            continue;
        }
        let vx = state.local_velocity.x;
        if vx < -config.air_damp_min_speed || vx > config.air_damp_min_speed {
            let dir = if vx < 0.0 {
                orientation.right()
            } else {
                -orientation.right()
            };
            B::apply_force(world, entity, dir * config.air_damp_force);
        }
    }
}

/// Force-clear the wall-jumping flag once its input lock has elapsed,
/// independent of contact state.
pub fn expire_wall_jump(time: Res<Time>, mut q: Query<(&ControllerConfig, &mut MovementState)>) {
    let tick_time = time.elapsed_secs();
    for (config, mut state) in &mut q {
        if state.is_wall_jumping && tick_time - state.last_jump_time >= config.jump_wall_lock_delay
        {
            state.is_wall_jumping = false;
        }
    }
}

/// Sync marker components to this tick's state.
pub fn sync_state_markers(
    mut commands: Commands,
    q: Query<(
        Entity,
        &MovementState,
        Has<Grounded>,
        Has<Airborne>,
        Has<WallSticking>,
        Has<OnPlatform>,
    )>,
) {
    for (entity, state, has_grounded, has_airborne, has_stick, has_platform) in &q {
        let grounded = state.is_grounded();
        if grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !grounded && (has_grounded || !has_airborne) {
            commands.entity(entity).remove::<Grounded>().insert(Airborne);
        }

        if state.is_wall_sticking && !has_stick {
            commands.entity(entity).insert(WallSticking);
        } else if !state.is_wall_sticking && has_stick {
            commands.entity(entity).remove::<WallSticking>();
        }

        if state.is_on_platform && !has_platform {
            commands.entity(entity).insert(OnPlatform);
        } else if !state.is_on_platform && has_platform {
            commands.entity(entity).remove::<OnPlatform>();
        }
    }
}
