//! Per-tick collision contact model.
//!
//! The physics backend rebuilds a [`ContactSet`] for every controller each
//! fixed tick. Nothing in here persists across ticks: the movement systems
//! recompute all contact-derived state from the current set.

use bevy::prelude::*;
use bitflags::bitflags;

bitflags! {
    /// Bitset summarizing which sides of the controller have active contacts
    /// this tick.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CollisionFlags: u8 {
        const ABOVE = 1 << 0;
        const BELOW = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        /// Either side wall.
        const SIDES = Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

impl CollisionFlags {
    /// True when the only active contacts are side walls (no floor, no ceiling).
    pub fn sides_only(self) -> bool {
        self.intersects(Self::SIDES) && !self.intersects(Self::ABOVE | Self::BELOW)
    }
}

/// Classification of a single contact relative to the controller's up axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub enum ContactSide {
    #[default]
    None,
    Above,
    Below,
    Left,
    Right,
}

impl ContactSide {
    /// Classify a contact normal against an up axis.
    ///
    /// A normal within `slope_limit` of `up` counts as ground, within
    /// `slope_limit` of `-up` as ceiling, everything else as a side wall.
    /// Left/right is decided by the sign of the normal's component along the
    /// local right axis: a wall on the controller's right pushes back with a
    /// normal pointing left.
    pub fn classify(normal: Vec2, up: Vec2, slope_limit: f32) -> Self {
        let n = normal.normalize_or_zero();
        if n == Vec2::ZERO {
            return Self::None;
        }
        let angle = n.angle_to(up).abs();
        if angle <= slope_limit {
            Self::Below
        } else if angle >= std::f32::consts::PI - slope_limit {
            Self::Above
        } else {
            // right = up rotated -90deg
            let right = Vec2::new(up.y, -up.x);
            if n.dot(right) > 0.0 {
                Self::Left
            } else {
                Self::Right
            }
        }
    }

    /// The collision flag bit for this side.
    pub fn flag(self) -> CollisionFlags {
        match self {
            Self::None => CollisionFlags::empty(),
            Self::Above => CollisionFlags::ABOVE,
            Self::Below => CollisionFlags::BELOW,
            Self::Left => CollisionFlags::LEFT,
            Self::Right => CollisionFlags::RIGHT,
        }
    }

    /// True for [`ContactSide::Left`] or [`ContactSide::Right`].
    pub fn is_side(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    /// The side the opposing surface sits on, derived from its normal.
    /// A normal pointing left means the wall is on the right.
    pub fn of_normal(normal: Vec2, up: Vec2) -> Self {
        let right = Vec2::new(up.y, -up.x);
        if normal.dot(right) > 0.0 {
            Self::Left
        } else if normal.dot(right) < 0.0 {
            Self::Right
        } else {
            Self::None
        }
    }
}

/// One active collision contact this tick.
#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub struct CollideInfo {
    /// Collider that owns the touched surface.
    pub entity: Entity,
    /// Unit surface normal, pointing away from the surface toward the controller.
    pub normal: Vec2,
    /// Side classification of the normal against the controller's up axis.
    pub side: ContactSide,
    /// Physical layer index of the touched collider (0..=31).
    pub layer: u32,
}

impl CollideInfo {
    pub fn new(entity: Entity, normal: Vec2, side: ContactSide, layer: u32) -> Self {
        Self {
            entity,
            normal,
            side,
            layer,
        }
    }
}

/// Bitmask over physical layer indices, Unity-style.
///
/// An empty mask means "matches nothing"; features keyed on a mask degrade to
/// disabled when the mask is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Reflect)]
pub struct LayerMask(pub u32);

impl LayerMask {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u32::MAX);

    /// Mask with a single layer bit set.
    pub fn layer(index: u32) -> Self {
        Self(1 << index)
    }

    pub fn contains(self, layer_index: u32) -> bool {
        self.0 & (1 << layer_index) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, layer_index: u32) {
        self.0 |= 1 << layer_index;
    }

    pub fn remove(&mut self, layer_index: u32) {
        self.0 &= !(1 << layer_index);
    }

    /// Iterate the set layer indices.
    pub fn iter(self) -> impl Iterator<Item = u32> {
        (0..32).filter(move |i| self.contains(*i))
    }
}

/// Physical layer index of a body, read by contact gathering and the platform
/// filters. Bodies without this component sit on layer 0.
#[derive(Component, Reflect, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[reflect(Component)]
pub struct PhysicsLayer(pub u32);

/// Per-tick set of active contacts for one controller.
///
/// The backend clears and refills the buffer every fixed tick; the `Vec` is
/// reused so steady-state operation does not allocate.
#[derive(Component, Debug, Default, Clone)]
pub struct ContactSet {
    contacts: Vec<CollideInfo>,
}

impl ContactSet {
    pub fn new() -> Self {
        Self {
            contacts: Vec::with_capacity(8),
        }
    }

    /// Clear the set at the start of a new tick. Capacity is retained.
    pub fn clear(&mut self) {
        self.contacts.clear();
    }

    pub fn push(&mut self, info: CollideInfo) {
        self.contacts.push(info);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollideInfo> {
        self.contacts.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Drop contacts rejected by the predicate.
    pub fn retain(&mut self, f: impl FnMut(&CollideInfo) -> bool) {
        self.contacts.retain(f);
    }

    /// OR together the side flags of all contacts.
    pub fn flags(&self) -> CollisionFlags {
        self.contacts
            .iter()
            .fold(CollisionFlags::empty(), |acc, c| acc | c.side.flag())
    }

    /// Mask of layers contributing a Below contact.
    pub fn ground_layers(&self) -> LayerMask {
        let mut mask = LayerMask::NONE;
        for c in &self.contacts {
            if c.side == ContactSide::Below {
                mask.insert(c.layer);
            }
        }
        mask
    }
}
