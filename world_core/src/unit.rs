//! Per-tick unit snapshot types.
//!
//! A [`Unit`] is one observed entity for the current tick. The list of units
//! is replaced wholesale every tick; the classification index owns the
//! canonical array and consumers hold views into it, never copies, unless
//! they explicitly materialize one.

use std::fmt;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Identity of a unit, stable across ticks while the unit stays visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTag(pub u64);

impl fmt::Display for UnitTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Categorical unit type identifier from the game's static data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(pub u32);

impl fmt::Display for UnitTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ability identifier carried by a unit order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AbilityId(pub u32);

/// Owning side of a unit, as seen from the agent's perspective.
///
/// The discriminant doubles as the major rank of the classification sort key
/// (own units first, neutral last).
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Alliance {
    #[default]
    Own = 0,
    Ally = 1,
    Enemy = 2,
    Neutral = 3,
}

impl Alliance {
    pub const ALL: [Alliance; 4] = [
        Alliance::Own,
        Alliance::Ally,
        Alliance::Enemy,
        Alliance::Neutral,
    ];
}

bitflags! {
    /// Per-unit observation flags supplied by the snapshot producer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct UnitFlags: u16 {
        /// Unit is airborne.
        const FLYING = 1 << 0;
        /// Unit is a structure rather than a mobile unit.
        const STRUCTURE = 1 << 1;
        /// Unit has at least one usable weapon.
        const ARMED = 1 << 2;
        /// Neutral resource carrying minerals.
        const MINERALS = 1 << 3;
        /// Neutral resource carrying vespene.
        const VESPENE = 1 << 4;
        /// Seen only as a fog snapshot; the tag may be stale.
        const SNAPSHOT = 1 << 5;
    }
}

/// One queued order on a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitOrder {
    pub ability: AbilityId,
    pub target: Option<Vec2>,
}

/// One observed entity, immutable for the duration of a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    pub tag: UnitTag,
    pub type_id: UnitTypeId,
    pub alliance: Alliance,
    pub pos: Vec2,
    pub flags: UnitFlags,
    pub radius: f32,
    /// Construction progress in `[0, 1]`; `1.0` once complete.
    pub build_progress: f32,
    pub orders: Vec<UnitOrder>,
}

impl Unit {
    #[inline]
    pub fn is_flying(&self) -> bool {
        self.flags.contains(UnitFlags::FLYING)
    }

    #[inline]
    pub fn is_structure(&self) -> bool {
        self.flags.contains(UnitFlags::STRUCTURE)
    }

    /// Whether the unit can attack at all (has a usable weapon).
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.flags.contains(UnitFlags::ARMED)
    }

    #[inline]
    pub fn has_minerals(&self) -> bool {
        self.flags.contains(UnitFlags::MINERALS)
    }

    #[inline]
    pub fn has_vespene(&self) -> bool {
        self.flags.contains(UnitFlags::VESPENE)
    }

    #[inline]
    pub fn is_snapshot(&self) -> bool {
        self.flags.contains(UnitFlags::SNAPSHOT)
    }

    /// Construction finished.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.build_progress >= 1.0
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.orders.is_empty()
    }

    #[inline]
    pub fn distance_squared(&self, pos: Vec2) -> f32 {
        self.pos.distance_squared(pos)
    }
}

/// Shorthand constructor used across the crate's tests.
#[cfg(test)]
pub(crate) fn test_unit(tag: u64, type_id: u32, alliance: Alliance, flags: UnitFlags) -> Unit {
    Unit {
        tag: UnitTag(tag),
        type_id: UnitTypeId(type_id),
        alliance,
        pos: Vec2::ZERO,
        flags,
        radius: 0.5,
        build_progress: 1.0,
        orders: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_predicates() {
        let u = test_unit(1, 10, Alliance::Own, UnitFlags::FLYING | UnitFlags::ARMED);
        assert!(u.is_flying());
        assert!(u.is_armed());
        assert!(!u.is_structure());
        assert!(u.is_ready());
        assert!(u.is_idle());
    }

    #[test]
    fn alliance_rank_order() {
        assert!(Alliance::Own < Alliance::Ally);
        assert!(Alliance::Ally < Alliance::Enemy);
        assert!(Alliance::Enemy < Alliance::Neutral);
    }
}
