//! End-to-end controller scenarios on the scripted backend.
//!
//! Each test drives the full fixed-tick pipeline (sensors, platforms,
//! collision refresh, movement, markers) one deterministic step at a time.

mod common;

use bevy::prelude::*;
use common::*;
use platformer_controller::prelude::*;

#[test]
fn ground_transitions_and_landed_event() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);

    let s = state(&app, e);
    assert!(s.is_grounded());
    assert!(s.collision_flags.contains(CollisionFlags::BELOW));
    assert_eq!(drain_landed(&mut app).len(), 1);
    assert!(app.world().get::<Grounded>(e).is_some());

    // Staying grounded fires nothing further.
    tick(&mut app);
    assert!(drain_landed(&mut app).is_empty());

    // One tick of empty contacts and the controller is airborne.
    set_contacts(&mut app, e, vec![]);
    tick(&mut app);

    let s = state(&app, e);
    assert!(!s.is_grounded());
    assert!(s.collision_flags.is_empty());
    assert!(app.world().get::<Airborne>(e).is_some());
    assert!(app.world().get::<Grounded>(e).is_none());
}

#[test]
fn landing_while_rising_fires_no_landed() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    app.world_mut().get_mut::<ScriptedBody>(e).unwrap().velocity = Vec2::new(0.0, 5.0);
    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);

    let s = state(&app, e);
    assert!(s.is_grounded());
    // Counter still resets on the transition; only the event is gated.
    assert_eq!(s.jump_counter, 0);
    assert!(drain_landed(&mut app).is_empty());
}

#[test]
fn ground_jump_is_edge_triggered() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());
    let config = ControllerConfig::default();

    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);
    drain_landed(&mut app);

    set_jump(&mut app, e, true);
    tick(&mut app);

    let s = state(&app, e);
    assert_eq!(s.jump_counter, 1);
    assert!(s.is_jumping);
    let b = body(&app, e);
    assert!((b.velocity.y - config.jump_impulse).abs() < 1e-4);
    let jumped = drain_jumped(&mut app);
    assert_eq!(jumped.len(), 1);
    assert_eq!(jumped[0].kind, JumpKind::Ground);

    // Holding the button produces no second jump.
    tick(&mut app);
    tick(&mut app);
    assert!(drain_jumped(&mut app).is_empty());
    assert_eq!(state(&app, e).jump_counter, 1);
}

#[test]
fn held_jump_adds_force_until_delay_elapses() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);
    set_jump(&mut app, e, true);
    tick(&mut app);
    set_contacts(&mut app, e, vec![]);

    // Within jump_delay the held force keeps accelerating upward.
    let before = body(&app, e).velocity.y;
    tick(&mut app);
    let after = body(&app, e).velocity.y;
    assert!(after > before);

    // Well past jump_delay the jump is over and velocity stops growing.
    ticks(&mut app, 20);
    assert!(!state(&app, e).is_jumping);
    let settled = body(&app, e).velocity.y;
    tick(&mut app);
    assert!((body(&app, e).velocity.y - settled).abs() < 1e-5);
}

#[test]
fn double_jump_consumes_counter_then_refuses() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::player());

    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);
    drain_landed(&mut app);

    set_jump(&mut app, e, true);
    tick(&mut app);
    assert_eq!(drain_jumped(&mut app)[0].kind, JumpKind::Ground);
    set_contacts(&mut app, e, vec![]);
    set_jump(&mut app, e, false);

    // Leave the coyote window before the second press.
    ticks(&mut app, 10);

    set_jump(&mut app, e, true);
    tick(&mut app);
    let jumped = drain_jumped(&mut app);
    assert_eq!(jumped.len(), 1);
    assert_eq!(jumped[0].kind, JumpKind::Air);
    assert_eq!(state(&app, e).jump_counter, 2);

    // Counter exhausted: a third press does nothing.
    set_jump(&mut app, e, false);
    tick(&mut app);
    set_jump(&mut app, e, true);
    tick(&mut app);
    assert!(drain_jumped(&mut app).is_empty());
    assert_eq!(state(&app, e).jump_counter, 2);

    // Fresh ground contact resets the counter to zero.
    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);
    assert_eq!(state(&app, e).jump_counter, 0);
}

#[test]
fn wall_stick_entry_zeroes_horizontal_and_caps_fall() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    app.world_mut().get_mut::<ScriptedBody>(e).unwrap().velocity = Vec2::new(3.0, -8.0);
    set_contacts(&mut app, e, vec![right_wall_contact(surface)]);
    tick(&mut app);

    let s = state(&app, e);
    assert!(s.is_wall_sticking);
    assert_eq!(s.wall_stick_side, ContactSide::Right);
    assert!(!s.is_jumping);
    assert!(app.world().get::<WallSticking>(e).is_some());

    let config = ControllerConfig::default();
    let b = body(&app, e);
    assert_eq!(b.velocity.x, 0.0);
    assert!((b.velocity.y + config.wall_stick_down_speed_cap).abs() < 1e-4);
}

#[test]
fn wall_stick_releases_on_move_away_after_delay() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    set_contacts(&mut app, e, vec![right_wall_contact(surface)]);
    tick(&mut app);
    assert!(state(&app, e).is_wall_sticking);

    // Push away from the wall (wall on the right, intent to the left).
    set_axes(&mut app, e, -1.0, 0.0);
    ticks(&mut app, 2);
    assert!(state(&app, e).is_wall_sticking);

    // After the release debounce the stick lets go.
    ticks(&mut app, 20);
    assert!(!state(&app, e).is_wall_sticking);
}

#[test]
fn push_mode_needs_into_wall_input_to_hold() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(
        &mut app,
        ControllerConfig::default().with_wall_stick(true, true),
    );

    set_contacts(&mut app, e, vec![right_wall_contact(surface)]);

    // No input: the stick expires after wall_stick_delay.
    ticks(&mut app, 20);
    assert!(!state(&app, e).is_wall_sticking);

    // Pushing into the wall sustains it.
    set_axes(&mut app, e, 1.0, 0.0);
    ticks(&mut app, 3);
    assert!(state(&app, e).is_wall_sticking);
    ticks(&mut app, 20);
    assert!(state(&app, e).is_wall_sticking);
}

#[test]
fn wall_jump_launches_off_the_wall() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let config = ControllerConfig::default().with_wall_jump(true);
    let e = spawn_character(&mut app, config.clone());

    app.world_mut().get_mut::<ScriptedBody>(e).unwrap().velocity = Vec2::new(0.0, -2.0);
    set_contacts(&mut app, e, vec![right_wall_contact(surface)]);
    tick(&mut app);
    assert!(state(&app, e).is_wall_sticking);

    set_jump(&mut app, e, true);
    tick(&mut app);

    let s = state(&app, e);
    assert!(!s.is_wall_sticking);
    assert!(s.is_wall_jumping);
    // A wall jump always counts as exactly the first jump.
    assert_eq!(s.jump_counter, 1);

    let jumped = drain_jumped(&mut app);
    assert_eq!(jumped.len(), 1);
    assert_eq!(jumped[0].kind, JumpKind::Wall);

    // Velocity was zeroed, then the wall-normal and up impulses applied.
    let b = body(&app, e);
    assert!((b.velocity.x + config.jump_wall_impulse).abs() < 1e-4);
    assert!((b.velocity.y - config.jump_wall_up_impulse).abs() < 1e-4);

    // The input lock expires on its own.
    set_contacts(&mut app, e, vec![]);
    ticks(&mut app, 10);
    assert!(!state(&app, e).is_wall_jumping);
}

#[test]
fn wall_climb_force_only_within_window() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    // Jumping disabled so the held button exercises only the climb.
    let e = spawn_character(
        &mut app,
        ControllerConfig::default().with_jump_counter(0),
    );

    set_contacts(&mut app, e, vec![right_wall_contact(surface)]);
    tick(&mut app);
    assert!(state(&app, e).is_wall_sticking);

    set_jump(&mut app, e, true);
    ticks(&mut app, 3);
    let climbing = body(&app, e).velocity.y;
    assert!(climbing > 0.0);
    assert!(drain_jumped(&mut app).is_empty());

    // Past wall_stick_up_delay the climb force is gone.
    ticks(&mut app, 15);
    assert!(state(&app, e).is_wall_sticking);
    let settled = body(&app, e).velocity.y;
    tick(&mut app);
    assert!((body(&app, e).velocity.y - settled).abs() < 1e-5);
}

#[test]
fn stick_band_boundary_inclusive_at_80_degrees() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    // Normal 80 degrees from up: exactly on the band edge with 10 deg offset.
    let normal = Vec2::from_angle(170f32.to_radians());
    set_contacts(
        &mut app,
        e,
        vec![CollideInfo::new(surface, normal, ContactSide::Right, 0)],
    );
    tick(&mut app);
    assert!(state(&app, e).is_wall_sticking);
}

#[test]
fn surface_just_shy_of_band_slides_instead() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let config = ControllerConfig::default();
    let e = spawn_character(&mut app, config.clone());

    // 79 degrees from up: too shallow for the stick band, steeper than the
    // slope limit, so the controller slides.
    let normal = Vec2::from_angle(169f32.to_radians());
    set_contacts(
        &mut app,
        e,
        vec![CollideInfo::new(surface, normal, ContactSide::Right, 0)],
    );
    tick(&mut app);

    let s = state(&app, e);
    assert!(!s.is_wall_sticking);
    assert!(s.is_on_slope);
    assert!(!s.is_grounded());
    // Sliding exhausts the jump counter until solid ground.
    assert_eq!(s.jump_counter, config.jump_counter_max);
}

#[test]
fn reset_collision_round_trips_to_fresh_state() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    // Dirty the state: land, jump, leave the ground.
    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);
    set_jump(&mut app, e, true);
    tick(&mut app);
    set_contacts(&mut app, e, vec![]);
    tick(&mut app);
    assert_ne!(state(&app, e), MovementState::default());

    set_jump(&mut app, e, false);
    tick(&mut app);
    app.world_mut()
        .get_mut::<MovementState>(e)
        .unwrap()
        .reset_collision();
    app.world_mut().get_mut::<ScriptedBody>(e).unwrap().velocity = Vec2::ZERO;

    // One tick of empty contacts leaves the state factory-fresh.
    tick(&mut app);
    assert_eq!(state(&app, e), MovementState::default());
}

#[test]
fn platform_riding_sets_ground_and_carries() {
    let mut app = test_app();
    let e = spawn_character(&mut app, ControllerConfig::default());
    app.world_mut().entity_mut(e).insert(PlatformRider);

    let platform = app
        .world_mut()
        .spawn((
            Platform::new(4).with_trigger(true),
            ScriptedBody {
                velocity: Vec2::new(2.0, 0.0),
                ..Default::default()
            },
        ))
        .id();
    app.world_mut()
        .get_mut::<Platform>(platform)
        .unwrap()
        .trigger_enter(e);

    tick(&mut app);

    let s = state(&app, e);
    assert!(s.is_on_platform);
    assert!(s.collision_flags.contains(CollisionFlags::BELOW));
    assert!(s.ground_layer_mask.contains(4));
    assert!(s.is_grounded());
    assert!(app.world().get::<OnPlatform>(e).is_some());

    // Carried horizontally by one tick of platform motion.
    let b = body(&app, e);
    assert!((b.position.x - 2.0 * DT).abs() < 1e-4);

    // Leaving the trigger volume releases the rider.
    app.world_mut()
        .get_mut::<Platform>(platform)
        .unwrap()
        .trigger_exit(e);
    tick(&mut app);

    let s = state(&app, e);
    assert!(!s.is_on_platform);
    assert!(!s.is_grounded());
    assert!(app.world().get::<OnPlatform>(e).is_none());
}

#[test]
fn jumping_off_platform_releases_rider_and_applies_boost() {
    let mut app = test_app();
    let config = ControllerConfig::default();
    let e = spawn_character(&mut app, config.clone());
    app.world_mut().entity_mut(e).insert(PlatformRider);

    let platform = app
        .world_mut()
        .spawn((
            Platform::new(4).with_trigger(true).with_jump_boost(true),
            ScriptedBody {
                velocity: Vec2::new(0.0, 3.0),
                ..Default::default()
            },
        ))
        .id();
    app.world_mut()
        .get_mut::<Platform>(platform)
        .unwrap()
        .trigger_enter(e);

    tick(&mut app);
    assert!(state(&app, e).is_on_platform);
    assert!(state(&app, e).is_grounded());

    set_jump(&mut app, e, true);
    tick(&mut app);
    assert_eq!(drain_jumped(&mut app)[0].kind, JumpKind::Ground);

    // One tick after the jump the rider is off the boarded set: no forced
    // Below flag, no free re-jumps while still inside the trigger volume.
    tick(&mut app);
    let s = state(&app, e);
    assert!(!s.is_on_platform);
    assert!(!s.is_grounded());
    assert_eq!(s.jump_counter, 1);

    // The tick after that, the platform's upward speed is added on top of
    // the jump: impulse + two integrated ticks of hold force + the 3.0 boost.
    tick(&mut app);
    let expected = config.jump_impulse + 2.0 * config.jump_force * DT + 3.0;
    assert!((body(&app, e).velocity.y - expected).abs() < 1e-4);
}

#[test]
fn upward_platform_carries_jumper_laterally_without_lifting() {
    let mut app = test_app();
    let e = spawn_character(&mut app, ControllerConfig::default());
    app.world_mut().entity_mut(e).insert(PlatformRider);

    let platform = app
        .world_mut()
        .spawn((
            Platform::new(4).with_trigger(true),
            ScriptedBody {
                velocity: Vec2::new(2.0, 3.0),
                ..Default::default()
            },
        ))
        .id();
    app.world_mut()
        .get_mut::<Platform>(platform)
        .unwrap()
        .trigger_enter(e);

    tick(&mut app);
    set_jump(&mut app, e, true);
    tick(&mut app);
    assert!(state(&app, e).is_jumping);

    let before = body(&app, e);
    tick(&mut app);
    let after = body(&app, e);

    // Lateral carry continues while the jumper rises through the sweep.
    assert!((after.position.x - before.position.x - 2.0 * DT).abs() < 1e-4);
    // The platform's upward speed is clamped out of the reposition; only
    // the rider's own velocity moves it vertically.
    let own_dy = after.velocity.y * DT;
    assert!((after.position.y - before.position.y - own_dy).abs() < 1e-4);
}

#[test]
fn jump_shortly_after_leaving_ledge_counts_as_ground() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);
    drain_landed(&mut app);

    // Walk off the ledge, press jump two ticks later: well inside
    // jump_air_delay.
    set_contacts(&mut app, e, vec![]);
    ticks(&mut app, 2);
    assert!(!state(&app, e).is_grounded());

    set_jump(&mut app, e, true);
    tick(&mut app);

    let jumped = drain_jumped(&mut app);
    assert_eq!(jumped.len(), 1);
    assert_eq!(jumped[0].kind, JumpKind::Ground);
    assert_eq!(state(&app, e).jump_counter, 1);
}

#[test]
fn expired_leniency_window_refuses_jump_without_drop_allow() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(
        &mut app,
        ControllerConfig {
            jump_drop_allow: false,
            ..ControllerConfig::default()
        },
    );

    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    tick(&mut app);

    // Fall for well past jump_air_delay before pressing.
    set_contacts(&mut app, e, vec![]);
    ticks(&mut app, 10);

    set_jump(&mut app, e, true);
    tick(&mut app);
    assert!(drain_jumped(&mut app).is_empty());
    assert_eq!(state(&app, e).jump_counter, 0);
}

#[test]
fn air_damping_decays_drift_down_to_min_speed() {
    let mut app = test_app();
    let e = spawn_character(
        &mut app,
        ControllerConfig::default().with_air_damping(20.0, 1.0),
    );

    app.world_mut().get_mut::<ScriptedBody>(e).unwrap().velocity = Vec2::new(5.0, 0.0);
    ticks(&mut app, 5);
    let vx = body(&app, e).velocity.x;
    assert!(vx < 5.0 && vx > 0.0);

    // Decay stops once below air_damp_min_speed; drift never reverses.
    ticks(&mut app, 20);
    let settled = body(&app, e).velocity.x;
    assert!(settled > 0.0 && settled <= 1.0);
    tick(&mut app);
    assert!((body(&app, e).velocity.x - settled).abs() < 1e-5);

    // Intent overrides the damping.
    set_axes(&mut app, e, 1.0, 0.0);
    ticks(&mut app, 3);
    assert!(body(&app, e).velocity.x > settled);
}

#[test]
fn despawned_platform_releases_riders() {
    let mut app = test_app();
    let e = spawn_character(&mut app, ControllerConfig::default());
    app.world_mut().entity_mut(e).insert(PlatformRider);

    let platform = app
        .world_mut()
        .spawn((
            Platform::new(4).with_trigger(true),
            ScriptedBody {
                velocity: Vec2::new(1.0, 0.0),
                ..Default::default()
            },
        ))
        .id();
    app.world_mut()
        .get_mut::<Platform>(platform)
        .unwrap()
        .trigger_enter(e);
    tick(&mut app);
    assert!(state(&app, e).is_on_platform);

    app.world_mut().despawn(platform);
    assert!(!state(&app, e).is_on_platform);

    tick(&mut app);
    assert!(!state(&app, e).is_grounded());
}

#[test]
fn plank_hit_from_below_is_suppressed_then_restored() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(
        &mut app,
        ControllerConfig::default().with_planks(LayerMask::layer(8), false),
    );

    // Rising into the underside of a plank.
    app.world_mut().get_mut::<ScriptedBody>(e).unwrap().velocity = Vec2::new(0.0, 5.0);
    tick(&mut app);
    set_contacts(
        &mut app,
        e,
        vec![CollideInfo::new(surface, Vec2::NEG_Y, ContactSide::Above, 8)],
    );
    tick(&mut app);

    // The contact is discarded and the layer ignored; velocity survives.
    let s = state(&app, e);
    assert!(s.collision_flags.is_empty());
    assert!((body(&app, e).velocity.y - 5.0).abs() < 1e-4);
    assert!(body(&app, e).ignored_layers.contains(8));

    // Once clear of the plank the poll restores collision.
    set_contacts(&mut app, e, vec![]);
    ticks(&mut app, 15);
    assert!(!body(&app, e).ignored_layers.contains(8));
}

#[test]
fn holding_down_drops_through_plank() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(
        &mut app,
        ControllerConfig::default().with_planks(LayerMask::layer(8), true),
    );

    set_contacts(
        &mut app,
        e,
        vec![CollideInfo::new(surface, Vec2::Y, ContactSide::Below, 8)],
    );
    tick(&mut app);
    assert!(state(&app, e).is_grounded());

    set_axes(&mut app, e, 0.0, -1.0);
    ticks(&mut app, 5);
    assert!(!body(&app, e).ignored_layers.contains(8));

    // Past plank_drop_delay the plank layer is ignored.
    ticks(&mut app, 15);
    assert!(body(&app, e).ignored_layers.contains(8));
}

#[test]
fn underwater_jump_is_a_force_not_an_impulse() {
    let mut app = test_app();
    let e = spawn_character(&mut app, ControllerConfig::default());

    app.world_mut()
        .get_mut::<MovementState>(e)
        .unwrap()
        .set_under_water(true, 0.0);

    set_jump(&mut app, e, true);
    tick(&mut app);

    // No impulse and no jump event on the press tick.
    assert_eq!(body(&app, e).velocity.y, 0.0);
    assert!(drain_jumped(&mut app).is_empty());
    assert!(state(&app, e).is_jumping);

    // The water force integrates over following ticks.
    tick(&mut app);
    let config = ControllerConfig::default();
    assert!((body(&app, e).velocity.y - config.jump_water_force * DT).abs() < 1e-4);
}

#[test]
fn underwater_movement_uses_both_axes() {
    let mut app = test_app();
    let e = spawn_character(&mut app, ControllerConfig::default());

    app.world_mut()
        .get_mut::<MovementState>(e)
        .unwrap()
        .set_under_water(true, 0.0);

    set_axes(&mut app, e, 1.0, 1.0);
    ticks(&mut app, 2);

    let b = body(&app, e);
    assert!(b.velocity.x > 0.0);
    assert!(b.velocity.y > 0.0);
}

#[test]
fn disabled_input_stops_movement_and_jump() {
    let mut app = test_app();
    let surface = spawn_surface(&mut app);
    let e = spawn_character(&mut app, ControllerConfig::default());

    set_contacts(&mut app, e, vec![ground_contact(surface)]);
    set_axes(&mut app, e, 1.0, 0.0);
    ticks(&mut app, 3);
    assert!(body(&app, e).velocity.x > 0.0);
    assert!(state(&app, e).move_side > 0.0);

    app.world_mut()
        .get_mut::<MoveIntent>(e)
        .unwrap()
        .input_enabled = false;
    tick(&mut app);
    let s = state(&app, e);
    assert_eq!(s.move_side, 0.0);
    assert!(!s.is_jumping);
}
