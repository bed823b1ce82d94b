//! Per-tick unit classification index.
//!
//! Each tick the full entity snapshot is reordered into contiguous ranges
//! keyed by (alliance, flying, armed, structure) — with neutral units split
//! into minerals / geysers / other — so every category combination answers in
//! O(1) range lookups. The classification key is encoded in place into the
//! unused high bits of each unit's type id for the duration of the rebuild
//! and stripped again before any consumer can observe it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::Range;

use bitflags::bitflags;

use crate::sort::sort_units;
use crate::unit::{Alliance, Unit, UnitTypeId};
use crate::view::UnitsView;

/// Bits reserved for the bare type id; real type ids must fit below this.
const TYPE_BITS: u32 = 24;
const TYPE_MASK: u32 = (1 << TYPE_BITS) - 1;
const SUB_SHIFT: u32 = TYPE_BITS;
const ALLIANCE_SHIFT: u32 = TYPE_BITS + 3;

/// Neutral subgroup ranks.
const NEUTRAL_MINERALS: u32 = 0;
const NEUTRAL_VESPENE: u32 = 1;
const NEUTRAL_OTHER: u32 = 2;

/// Own/Ally/Enemy each get 8 subgroups, neutral gets 3.
const GROUPS: usize = 3 * 8 + 3;

bitflags! {
    /// Category constraints a view walks: one bit per side of each of the
    /// three subgroup axes. A subgroup is admitted when its bit on every
    /// axis is present, so `CategoryMask::all()` admits everything.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CategoryMask: u8 {
        const GROUND = 1 << 0;
        const FLYING = 1 << 1;
        const UNARMED = 1 << 2;
        const ARMED = 1 << 3;
        const MOBILE = 1 << 4;
        const STRUCTURE = 1 << 5;
    }
}

impl CategoryMask {
    /// Structures of any flight/armament category.
    pub const STRUCTURES: CategoryMask = CategoryMask::STRUCTURE
        .union(CategoryMask::FLYING)
        .union(CategoryMask::GROUND)
        .union(CategoryMask::ARMED)
        .union(CategoryMask::UNARMED);

    /// Mobile units of any flight/armament category.
    pub const MOBILE_UNITS: CategoryMask = CategoryMask::MOBILE
        .union(CategoryMask::FLYING)
        .union(CategoryMask::GROUND)
        .union(CategoryMask::ARMED)
        .union(CategoryMask::UNARMED);

    /// Units or structures that can attack, flying or not.
    pub const ATTACKERS: CategoryMask = CategoryMask::ARMED
        .union(CategoryMask::FLYING)
        .union(CategoryMask::GROUND)
        .union(CategoryMask::MOBILE)
        .union(CategoryMask::STRUCTURE);

    fn admits(self, sub: u32) -> bool {
        let fly = if sub & 0b100 != 0 {
            CategoryMask::FLYING
        } else {
            CategoryMask::GROUND
        };
        let armed = if sub & 0b010 != 0 {
            CategoryMask::ARMED
        } else {
            CategoryMask::UNARMED
        };
        let kind = if sub & 0b001 != 0 {
            CategoryMask::STRUCTURE
        } else {
            CategoryMask::MOBILE
        };
        self.contains(fly) && self.contains(armed) && self.contains(kind)
    }
}

fn subgroup(u: &Unit) -> u32 {
    if u.alliance == Alliance::Neutral {
        if u.has_minerals() {
            NEUTRAL_MINERALS
        } else if u.has_vespene() {
            NEUTRAL_VESPENE
        } else {
            NEUTRAL_OTHER
        }
    } else {
        (u.is_flying() as u32) << 2 | (u.is_armed() as u32) << 1 | u.is_structure() as u32
    }
}

#[inline]
fn group_of_key(key: u32) -> usize {
    let alliance = (key >> ALLIANCE_SHIFT) as usize & 0b11;
    let sub = (key >> SUB_SHIFT) as usize & 0b111;
    if alliance < 3 {
        alliance * 8 + sub
    } else {
        24 + sub
    }
}

/// Where the units of one (alliance, type) live. The rare type whose units
/// span two non-adjacent subgroups (e.g. a morphing type observed both
/// flying and grounded) is merged into a freshly allocated copy instead of
/// aliasing the sorted array twice.
#[derive(Debug, Clone)]
enum TypeSlice {
    Range(Range<usize>),
    Merged(Vec<Unit>),
}

/// The rebuilt-per-tick classification index. Owns the canonical unit array
/// for the tick; all queries hand out views borrowing it.
#[derive(Debug, Default)]
pub struct ClassIndex {
    units: Vec<Unit>,
    bounds: [usize; GROUPS + 1],
    types: [HashMap<UnitTypeId, TypeSlice>; 4],
    rebuilds: u64,
}

impl ClassIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the index from this tick's snapshot, consuming it. Returns the
    /// previous tick's storage so the snapshot producer can recycle it.
    pub fn reindex(&mut self, units: Vec<Unit>) -> Vec<Unit> {
        let previous = std::mem::replace(&mut self.units, units);
        self.rebuilds += 1;

        for u in &mut self.units {
            debug_assert!(u.type_id.0 <= TYPE_MASK, "type id overflows key bits");
            let class_bits = (u.alliance as u32) << ALLIANCE_SHIFT | subgroup(u) << SUB_SHIFT;
            u.type_id.0 |= class_bits;
        }
        sort_units(&mut self.units);
        self.scan_groups();
        self.scan_types();
        for u in &mut self.units {
            u.type_id.0 &= TYPE_MASK;
        }
        self.strip_merged();

        // An out-of-order group table would silently corrupt every query.
        assert!(
            self.bounds.windows(2).all(|w| w[0] <= w[1]),
            "group table boundaries out of order"
        );
        tracing::trace!(
            units = self.units.len(),
            rebuild = self.rebuilds,
            "classification index rebuilt"
        );
        previous
    }

    fn scan_groups(&mut self) {
        let n = self.units.len();
        self.bounds = [0; GROUPS + 1];
        let mut g = 0usize;
        for (i, u) in self.units.iter().enumerate() {
            let ug = group_of_key(u.type_id.0);
            while g < ug {
                g += 1;
                self.bounds[g] = i;
            }
        }
        while g < GROUPS {
            g += 1;
            self.bounds[g] = n;
        }
    }

    fn scan_types(&mut self) {
        for map in &mut self.types {
            map.clear();
        }
        let n = self.units.len();
        let mut start = 0;
        while start < n {
            let key = self.units[start].type_id.0;
            let mut end = start + 1;
            while end < n && self.units[end].type_id.0 == key {
                end += 1;
            }
            let alliance = (key >> ALLIANCE_SHIFT) as usize & 0b11;
            let bare = UnitTypeId(key & TYPE_MASK);
            match self.types[alliance].entry(bare) {
                Entry::Vacant(slot) => {
                    slot.insert(TypeSlice::Range(start..end));
                }
                Entry::Occupied(mut slot) => {
                    // Same bare type in a second subgroup: fold both runs
                    // into one owned copy.
                    let merged = match slot.get_mut() {
                        TypeSlice::Range(range) => {
                            let mut merged = self.units[range.clone()].to_vec();
                            merged.extend_from_slice(&self.units[start..end]);
                            merged
                        }
                        TypeSlice::Merged(existing) => {
                            let mut merged = std::mem::take(existing);
                            merged.extend_from_slice(&self.units[start..end]);
                            merged
                        }
                    };
                    slot.insert(TypeSlice::Merged(merged));
                }
            }
            start = end;
        }
    }

    /// Merged copies were taken before the strip pass and still carry
    /// encoded type ids.
    fn strip_merged(&mut self) {
        for map in &mut self.types {
            for slice in map.values_mut() {
                if let TypeSlice::Merged(units) = slice {
                    for u in units {
                        u.type_id.0 &= TYPE_MASK;
                    }
                }
            }
        }
    }

    /// The full sorted unit array for this tick.
    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Number of rebuilds performed so far.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }

    fn group_range(&self, ordinal: usize) -> &[Unit] {
        &self.units[self.bounds[ordinal]..self.bounds[ordinal + 1]]
    }

    fn view_of(&self, ordinals: impl Iterator<Item = usize>) -> UnitsView<'_> {
        let segments: Vec<&[Unit]> = ordinals
            .map(|g| self.group_range(g))
            .filter(|s| !s.is_empty())
            .collect();
        UnitsView::from_segments(segments)
    }

    /// View over the subgroups of `alliance` admitted by `mask`. For
    /// [`Alliance::Neutral`] the mask does not apply and the whole neutral
    /// range is returned.
    pub fn select(&self, alliance: Alliance, mask: CategoryMask) -> UnitsView<'_> {
        if alliance == Alliance::Neutral {
            return self.view_of(24..24 + 3);
        }
        let base = alliance as usize * 8;
        self.view_of((0..8usize).filter(|&sub| mask.admits(sub as u32)).map(|sub| base + sub))
    }

    /// View over all units of one type for one alliance.
    pub fn of_type(&self, alliance: Alliance, ty: UnitTypeId) -> UnitsView<'_> {
        let alliance_idx = alliance as usize;
        match self.types[alliance_idx].get(&ty) {
            Some(TypeSlice::Range(range)) => {
                UnitsView::from_segments(vec![&self.units[range.clone()]])
            }
            Some(TypeSlice::Merged(units)) => UnitsView::from_segments(vec![&units[..]]),
            None => UnitsView::empty(),
        }
    }

    pub fn own(&self) -> UnitsView<'_> {
        self.select(Alliance::Own, CategoryMask::all())
    }

    pub fn allies(&self) -> UnitsView<'_> {
        self.select(Alliance::Ally, CategoryMask::all())
    }

    pub fn enemies(&self) -> UnitsView<'_> {
        self.select(Alliance::Enemy, CategoryMask::all())
    }

    pub fn neutral(&self) -> UnitsView<'_> {
        self.view_of(24..24 + 3)
    }

    /// Neutral mineral patches.
    pub fn minerals(&self) -> UnitsView<'_> {
        self.view_of(std::iter::once(24 + NEUTRAL_MINERALS as usize))
    }

    /// Neutral vespene geysers.
    pub fn vespene_geysers(&self) -> UnitsView<'_> {
        self.view_of(std::iter::once(24 + NEUTRAL_VESPENE as usize))
    }

    /// Neutral units that are neither minerals nor geysers.
    pub fn neutral_other(&self) -> UnitsView<'_> {
        self.view_of(std::iter::once(24 + NEUTRAL_OTHER as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{test_unit, UnitFlags, UnitTag};

    fn snapshot() -> Vec<Unit> {
        vec![
            test_unit(1, 10, Alliance::Own, UnitFlags::ARMED),
            test_unit(2, 11, Alliance::Own, UnitFlags::STRUCTURE),
            test_unit(3, 10, Alliance::Own, UnitFlags::ARMED),
            test_unit(4, 20, Alliance::Enemy, UnitFlags::FLYING | UnitFlags::ARMED),
            test_unit(5, 21, Alliance::Enemy, UnitFlags::STRUCTURE),
            test_unit(6, 30, Alliance::Neutral, UnitFlags::MINERALS),
            test_unit(7, 31, Alliance::Neutral, UnitFlags::VESPENE),
            test_unit(8, 32, Alliance::Neutral, UnitFlags::empty()),
            test_unit(9, 12, Alliance::Ally, UnitFlags::empty()),
        ]
    }

    #[test]
    fn groups_partition_the_snapshot() {
        let mut index = ClassIndex::new();
        index.reindex(snapshot());

        assert_eq!(index.len(), 9);
        assert_eq!(index.own().len(), 3);
        assert_eq!(index.allies().len(), 1);
        assert_eq!(index.enemies().len(), 2);
        assert_eq!(index.neutral().len(), 3);
        assert_eq!(index.minerals().len(), 1);
        assert_eq!(index.vespene_geysers().len(), 1);
        assert_eq!(index.neutral_other().len(), 1);

        let enemy_structures = index.select(
            Alliance::Enemy,
            CategoryMask::STRUCTURE
                | CategoryMask::GROUND
                | CategoryMask::FLYING
                | CategoryMask::ARMED
                | CategoryMask::UNARMED,
        );
        assert_eq!(enemy_structures.len(), 1);
        assert_eq!(enemy_structures.first().unwrap().tag, UnitTag(5));

        let enemy_air = index.select(
            Alliance::Enemy,
            CategoryMask::FLYING
                | CategoryMask::ARMED
                | CategoryMask::UNARMED
                | CategoryMask::MOBILE
                | CategoryMask::STRUCTURE,
        );
        assert_eq!(enemy_air.first().unwrap().tag, UnitTag(4));
    }

    #[test]
    fn type_ids_are_restored_after_indexing() {
        let units = snapshot();
        let expected: Vec<(UnitTag, u32)> = units.iter().map(|u| (u.tag, u.type_id.0)).collect();

        let mut index = ClassIndex::new();
        index.reindex(units);

        for (tag, type_id) in expected {
            let found = index
                .units()
                .iter()
                .find(|u| u.tag == tag)
                .expect("unit survived indexing");
            assert_eq!(found.type_id.0, type_id, "encoding leaked for {tag}");
        }
    }

    #[test]
    fn of_type_returns_typed_ranges() {
        let mut index = ClassIndex::new();
        index.reindex(snapshot());

        let marines = index.of_type(Alliance::Own, UnitTypeId(10));
        assert_eq!(marines.len(), 2);
        assert!(marines.iter().all(|u| u.type_id == UnitTypeId(10)));
        assert!(index.of_type(Alliance::Own, UnitTypeId(999)).is_empty());
    }

    #[test]
    fn split_type_is_merged_into_owned_slice() {
        // Same bare type observed both flying and grounded lands in two
        // non-adjacent subgroups and must still come back as one set.
        let units = vec![
            test_unit(1, 40, Alliance::Own, UnitFlags::empty()),
            test_unit(2, 40, Alliance::Own, UnitFlags::FLYING),
            test_unit(3, 40, Alliance::Own, UnitFlags::empty()),
            test_unit(4, 41, Alliance::Own, UnitFlags::ARMED),
        ];
        let mut index = ClassIndex::new();
        index.reindex(units);

        let split = index.of_type(Alliance::Own, UnitTypeId(40));
        assert_eq!(split.len(), 3);
        assert!(split.iter().all(|u| u.type_id == UnitTypeId(40)));
        let mut tags: Vec<u64> = split.iter().map(|u| u.tag.0).collect();
        tags.sort_unstable();
        assert_eq!(tags, vec![1, 2, 3]);
    }

    #[test]
    fn empty_snapshot_yields_empty_views() {
        let mut index = ClassIndex::new();
        index.reindex(Vec::new());
        assert!(index.is_empty());
        assert!(index.own().is_empty());
        assert!(index.enemies().is_empty());
        assert!(index.minerals().is_empty());
        assert!(index.of_type(Alliance::Own, UnitTypeId(1)).is_empty());
    }

    #[test]
    fn reindex_returns_previous_storage() {
        let mut index = ClassIndex::new();
        index.reindex(snapshot());
        let previous = index.reindex(Vec::new());
        assert_eq!(previous.len(), 9);
        assert!(index.is_empty());
        assert_eq!(index.rebuilds(), 2);
    }
}
