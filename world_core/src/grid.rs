//! Tile grids: the bit-packed map rasters and the incrementally maintained
//! placement (buildability) grid.
//!
//! The raw buildability raster from game metadata is never mutated. A working
//! copy is patched each tick by diffing the visible structures against a
//! per-structure cache keyed by unit tag, so the grid tracks structure
//! occupancy without re-scanning the map.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use crate::game_data::TypeRegistry;
use crate::unit::{Unit, UnitTag, UnitTypeId};

/// Bit-per-tile boolean grid. Out-of-bounds reads are `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitGrid {
    width: i32,
    height: i32,
    words: Vec<u64>,
}

impl BitGrid {
    pub fn new(width: i32, height: i32) -> Self {
        Self::filled(width, height, false)
    }

    pub fn filled(width: i32, height: i32, value: bool) -> Self {
        let tiles = (width.max(0) as usize) * (height.max(0) as usize);
        let fill = if value { u64::MAX } else { 0 };
        Self {
            width,
            height,
            words: vec![fill; (tiles + 63) / 64],
        }
    }

    /// Decode a 1-bit-per-pixel raster in the wire layout (row-major, MSB of
    /// each byte first).
    pub fn from_packed_bits(width: i32, height: i32, data: &[u8]) -> Self {
        let mut grid = Self::new(width, height);
        let tiles = (width as usize) * (height as usize);
        debug_assert!(data.len() * 8 >= tiles, "packed raster too short");
        for i in 0..tiles.min(data.len() * 8) {
            let bit = data[i / 8] >> (7 - i % 8) & 1;
            if bit != 0 {
                let x = (i as i32) % width;
                let y = (i as i32) / width;
                grid.set(x, y, true);
            }
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x >= 0 && x < self.width && y >= 0 && y < self.height {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn get(&self, x: i32, y: i32) -> bool {
        match self.index(x, y) {
            Some(i) => self.words[i / 64] >> (i % 64) & 1 != 0,
            None => false,
        }
    }

    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: bool) {
        if let Some(i) = self.index(x, y) {
            if value {
                self.words[i / 64] |= 1 << (i % 64);
            } else {
                self.words[i / 64] &= !(1 << (i % 64));
            }
        }
    }

    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

/// Tile span of a structure, derived from its declared radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footprint {
    pub width: i32,
    pub height: i32,
}

impl Footprint {
    pub const EMPTY: Footprint = Footprint {
        width: 0,
        height: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Tile coordinates of the lower-left corner for a structure centered at
    /// `pos`. Odd spans center on a tile, even spans on a tile corner; the
    /// rounding is exact for both.
    fn origin(&self, pos: Vec2) -> (i32, i32) {
        let x0 = (pos.x - self.width as f32 * 0.5).round() as i32;
        let y0 = (pos.y - self.height as f32 * 0.5).round() as i32;
        (x0, y0)
    }
}

/// The radius-to-footprint mapping is invariant per game, so it is resolved
/// once per type and cached. Unknown types degrade to an empty footprint.
#[derive(Debug, Default)]
pub struct FootprintCache {
    by_type: HashMap<UnitTypeId, Footprint>,
}

impl FootprintCache {
    pub fn get(&mut self, type_id: UnitTypeId, data: &TypeRegistry) -> Footprint {
        *self
            .by_type
            .entry(type_id)
            .or_insert_with(|| footprint_from_radius(data.radius(type_id)))
    }
}

/// Snap the declared radius to the nearest half tile and express the square
/// footprint in whole tiles.
pub fn footprint_from_radius(radius: f32) -> Footprint {
    if radius <= 0.0 {
        return Footprint::EMPTY;
    }
    let span = (radius * 2.0 + 0.5).floor() as i32;
    let span = span.max(1);
    Footprint {
        width: span,
        height: span,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct StructureStamp {
    type_id: UnitTypeId,
    pos: Vec2,
    footprint: Footprint,
}

/// Buildability grid with incremental structure tracking.
#[derive(Debug, Default)]
pub struct PlacementGrid {
    raw: BitGrid,
    working: BitGrid,
    structures: HashMap<UnitTag, StructureStamp>,
    footprints: FootprintCache,
    seen: HashSet<UnitTag>,
    removed: Vec<UnitTag>,
}

impl PlacementGrid {
    pub fn new(raw: BitGrid) -> Self {
        let working = raw.clone();
        Self {
            raw,
            working,
            structures: HashMap::new(),
            footprints: FootprintCache::default(),
            seen: HashSet::new(),
            removed: Vec::new(),
        }
    }

    /// The untouched metadata grid.
    pub fn raw(&self) -> &BitGrid {
        &self.raw
    }

    /// The working grid reflecting current structure occupancy.
    pub fn working(&self) -> &BitGrid {
        &self.working
    }

    /// Whether the tile is currently free to build on.
    #[inline]
    pub fn is_free(&self, x: i32, y: i32) -> bool {
        self.working.get(x, y)
    }

    /// Diff this tick's visible structures against the per-structure cache:
    /// vanished, moved or retyped structures have their old footprint
    /// restored to the raw grid; new or moved structures have their current
    /// footprint blocked.
    pub fn sync<'a, I>(&mut self, structures: I, data: &TypeRegistry)
    where
        I: IntoIterator<Item = &'a Unit>,
    {
        self.seen.clear();
        for unit in structures {
            let footprint = self.footprints.get(unit.type_id, data);
            let stamp = StructureStamp {
                type_id: unit.type_id,
                pos: unit.pos,
                footprint,
            };
            self.seen.insert(unit.tag);
            match self.structures.get(&unit.tag) {
                Some(old) if *old == stamp => {}
                Some(old) => {
                    let old = *old;
                    restore(&mut self.working, &self.raw, old);
                    block(&mut self.working, stamp);
                    self.structures.insert(unit.tag, stamp);
                }
                None => {
                    block(&mut self.working, stamp);
                    self.structures.insert(unit.tag, stamp);
                }
            }
        }

        self.removed.clear();
        self.removed
            .extend(self.structures.keys().filter(|t| !self.seen.contains(*t)));
        for tag in self.removed.drain(..) {
            if let Some(old) = self.structures.remove(&tag) {
                restore(&mut self.working, &self.raw, old);
            }
        }
        tracing::trace!(tracked = self.structures.len(), "placement grid synced");
    }

    /// Whether every tile under the type's footprint at `pos` is free.
    pub fn can_place(&mut self, type_id: UnitTypeId, pos: Vec2, data: &TypeRegistry) -> bool {
        let footprint = self.footprints.get(type_id, data);
        if footprint.is_empty() {
            return false;
        }
        let (x0, y0) = footprint.origin(pos);
        for y in y0..y0 + footprint.height {
            for x in x0..x0 + footprint.width {
                if !self.working.get(x, y) {
                    return false;
                }
            }
        }
        true
    }
}

fn block(working: &mut BitGrid, stamp: StructureStamp) {
    let (x0, y0) = stamp.footprint.origin(stamp.pos);
    for y in y0..y0 + stamp.footprint.height {
        for x in x0..x0 + stamp.footprint.width {
            working.set(x, y, false);
        }
    }
}

fn restore(working: &mut BitGrid, raw: &BitGrid, stamp: StructureStamp) {
    let (x0, y0) = stamp.footprint.origin(stamp.pos);
    for y in y0..y0 + stamp.footprint.height {
        for x in x0..x0 + stamp.footprint.width {
            working.set(x, y, raw.get(x, y));
        }
    }
}
