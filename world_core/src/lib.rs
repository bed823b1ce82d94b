//! Client-side world model for a real-time strategy agent.
//!
//! Each simulation tick the agent receives a flat snapshot of visible units;
//! this crate rebuilds a classification index over it and answers categorical
//! and geometric queries on top: filtered unit views, clustering, base and
//! expansion tracking, and buildability/height/openness grids. Data flows one
//! direction per tick: snapshot -> [`ClassIndex`] -> views -> {clusters,
//! [`BaseRegistry`], grids} -> consumer queries, all driven through
//! [`WorldModel::on_tick`].

pub mod base;
pub mod cluster;
pub mod game_data;
pub mod grid;
pub mod heightfield;
pub mod index;
pub mod openness;
mod sort;
pub mod unit;
pub mod view;

use glam::Vec2;

pub use base::{
    calculate_expansion_locations, Base, BaseOwner, BaseRegistry, ExpansionSite, PathQuery,
    ResourcePatch, RESOURCE_CLUSTER_RADIUS,
};
pub use cluster::{cluster_greedy, cluster_greedy_weighted, Cluster, Dbscan};
pub use game_data::{GameDataError, TypeData, TypeRegistry, Weapon};
pub use grid::{footprint_from_radius, BitGrid, Footprint, FootprintCache, PlacementGrid};
pub use heightfield::{HeightMap, MIN_HEIGHT};
pub use index::{CategoryMask, ClassIndex};
pub use openness::OpennessGrid;
pub use unit::{AbilityId, Alliance, Unit, UnitFlags, UnitOrder, UnitTag, UnitTypeId};
pub use view::UnitsView;

/// Once-per-game map metadata handed over by the protocol layer.
#[derive(Debug, Clone)]
pub struct MapInfo {
    pub placement: BitGrid,
    pub pathing: BitGrid,
    pub terrain_height: HeightMap,
}

/// The assembled world model: one instance per game, fed one snapshot per
/// tick. Queries taken between ticks borrow the current index and cannot
/// outlive the next rebuild.
#[derive(Debug)]
pub struct WorldModel {
    data: TypeRegistry,
    index: ClassIndex,
    placement: PlacementGrid,
    openness: OpennessGrid,
    heights: HeightMap,
    bases: BaseRegistry,
    tick: u64,
}

impl WorldModel {
    /// Build the model from the static game data and map metadata. The
    /// openness transform runs once, here.
    pub fn new(data: TypeRegistry, map: MapInfo) -> Self {
        let openness = OpennessGrid::compute(&map.pathing);
        Self {
            data,
            index: ClassIndex::new(),
            placement: PlacementGrid::new(map.placement),
            openness,
            heights: map.terrain_height,
            bases: BaseRegistry::default(),
            tick: 0,
        }
    }

    /// Ingest this tick's snapshot: reindex, patch the placement grid from
    /// the indexed structures, refresh the base registry. Returns the
    /// previous tick's unit storage for the snapshot producer to recycle.
    pub fn on_tick(&mut self, units: Vec<Unit>) -> Vec<Unit> {
        self.tick += 1;
        let recycled = self.index.reindex(units);

        let Self {
            index,
            placement,
            bases,
            data,
            tick,
            ..
        } = self;
        placement.sync(index.units().iter().filter(|u| u.is_structure()), data);
        bases.update(index, data, *tick);
        recycled
    }

    /// Discover expansion sites from the current tick's neutral resources and
    /// memoize pairwise base distances. Idempotent after the first call.
    pub fn locate_bases(&mut self, pather: &mut dyn PathQuery) {
        if !self.bases.is_empty() {
            return;
        }
        let minerals = self.index.minerals();
        let geysers = self.index.vespene_geysers();
        let resources: Vec<&Unit> = minerals.iter().chain(geysers.iter()).collect();
        let sites = calculate_expansion_locations(&resources, self.placement.raw());
        self.bases = BaseRegistry::from_expansions(&sites);
        self.bases.compute_distances(pather);
        self.bases.update(&self.index, &self.data, self.tick);
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn data(&self) -> &TypeRegistry {
        &self.data
    }

    pub fn index(&self) -> &ClassIndex {
        &self.index
    }

    pub fn bases(&self) -> &BaseRegistry {
        &self.bases
    }

    pub fn bases_mut(&mut self) -> &mut BaseRegistry {
        &mut self.bases
    }

    pub fn placement(&self) -> &PlacementGrid {
        &self.placement
    }

    pub fn openness(&self) -> &OpennessGrid {
        &self.openness
    }

    pub fn heights(&self) -> &HeightMap {
        &self.heights
    }

    /// Whether the type's footprint fits on free tiles at `pos`.
    pub fn can_place(&mut self, type_id: UnitTypeId, pos: Vec2) -> bool {
        let Self {
            placement, data, ..
        } = self;
        placement.can_place(type_id, pos, data)
    }
}
