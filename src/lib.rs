//! # `platformer_controller`
//!
//! A physics-coupled 2D platformer movement controller with physics backend
//! abstraction.
//!
//! This crate provides a tuneable, fixed-timestep movement core that:
//! - Drives a dynamic rigidbody through forces and impulses, never by
//!   teleporting it through walls
//! - Recomputes all collision-derived state from scratch every fixed tick
//! - Supports multi-jump with a counter, coyote time and variable jump height
//! - Sticks to walls, with wall jumps, wall climbing and wall friction
//! - Rides moving platforms, including jump boosts off them
//! - Passes through one-way planks from below and drops through them on intent
//! - Swims with two-axis movement while under water
//! - Abstracts the physics backend for easy swapping (Rapier2D included)
//!
//! ## Architecture
//!
//! Everything runs in `FixedUpdate` in a fixed chain of [`ControllerSet`]
//! phases. The backend's sensors run first and publish contacts, platform
//! sweep hits and plank overlaps into components; platforms then propagate
//! their motion into riders; finally the controller systems read the fresh
//! contact picture and decide movement, jumps, wall stick and damping.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use platformer_controller::prelude::*;
//!
//! // Components for a player character
//! let config = ControllerConfig::player();
//! let state = MovementState::new();
//! let intent = MoveIntent::default();
//!
//! // These are spawned together with the backend's physics components
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod config;
pub mod contact;
pub mod controller;
pub mod eye;
pub mod intent;
pub mod plank;
pub mod platform;
pub mod state;

#[cfg(feature = "rapier2d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::PhysicsBackend;
    pub use crate::config::{ControllerConfig, ControllerOrientation};
    pub use crate::contact::{
        CollideInfo, CollisionFlags, ContactSet, ContactSide, LayerMask, PhysicsLayer,
    };
    pub use crate::eye::EyeFollow;
    pub use crate::intent::MoveIntent;
    pub use crate::plank::PlankState;
    pub use crate::platform::{Platform, PlatformRider, SweepDir};
    pub use crate::state::{
        Airborne, Grounded, JumpKind, Jumped, Landed, MovementState, OnPlatform, WallSticking,
    };
    pub use crate::{ControllerSet, PlatformerControllerPlugin};

    #[cfg(feature = "rapier2d")]
    pub use crate::rapier::{Rapier2dBackend, RapierCharacterBundle};
}

/// Fixed-tick phases of the controller, chained in order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerSet {
    /// Backend sensors: contact gathering, platform sweeps, plank probes.
    Sensors,
    /// Platform rider confirmation and motion propagation.
    Platforms,
    /// Collision state refresh from this tick's contacts.
    Collision,
    /// Movement, jumps, wall stick, damping, plank revalidation.
    Movement,
    /// State marker sync for adapters.
    Markers,
}

/// Main plugin for the platformer movement controller.
///
/// Generic over a physics backend `B` providing body operations and the
/// sensor systems.
///
/// # Examples
///
/// With the Rapier2D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier2d::prelude::*;
/// use platformer_controller::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(PlatformerControllerPlugin::<Rapier2dBackend>::default())
///     .run();
/// ```
pub struct PlatformerControllerPlugin<B: backend::PhysicsBackend> {
    _marker: std::marker::PhantomData<B>,
}

impl<B: backend::PhysicsBackend> Default for PlatformerControllerPlugin<B> {
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::PhysicsBackend> Plugin for PlatformerControllerPlugin<B> {
    fn build(&self, app: &mut App) {
        // Register core types
        app.register_type::<config::ControllerConfig>();
        app.register_type::<config::ControllerOrientation>();
        app.register_type::<contact::PhysicsLayer>();
        app.register_type::<intent::MoveIntent>();
        app.register_type::<state::MovementState>();
        app.register_type::<state::Grounded>();
        app.register_type::<state::Airborne>();
        app.register_type::<state::WallSticking>();
        app.register_type::<state::OnPlatform>();
        app.register_type::<platform::Platform>();
        app.register_type::<eye::EyeFollow>();

        app.add_event::<state::Landed>();
        app.add_event::<state::Jumped>();

        app.configure_sets(
            FixedUpdate,
            (
                ControllerSet::Sensors,
                ControllerSet::Platforms,
                ControllerSet::Collision,
                ControllerSet::Movement,
                ControllerSet::Markers,
            )
                .chain(),
        );

        // The backend plugin fills the Sensors set.
        app.add_plugins(B::plugin());

        app.add_systems(
            FixedUpdate,
            platform::propagate_platforms::<B>.in_set(ControllerSet::Platforms),
        );
        app.add_systems(
            FixedUpdate,
            controller::refresh_collision_state::<B>.in_set(ControllerSet::Collision),
        );
        app.add_systems(
            FixedUpdate,
            (
                controller::apply_movement::<B>,
                controller::apply_jump::<B>,
                controller::apply_wall_stick_forces::<B>,
                controller::apply_air_damping::<B>,
                controller::expire_wall_jump,
                plank::revalidate_planks::<B>,
            )
                .chain()
                .in_set(ControllerSet::Movement),
        );
        app.add_systems(
            FixedUpdate,
            controller::sync_state_markers.in_set(ControllerSet::Markers),
        );

        app.add_systems(Update, eye::update_eye_follow);
    }
}
