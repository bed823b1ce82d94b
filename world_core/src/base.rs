//! Expansion-site discovery and the live base registry.
//!
//! Expansion sites are found once at map load by clustering the neutral
//! resources and searching the buildability grid for the nearest viable
//! town-hall tile per cluster. The registry then tracks each site every
//! tick: ownership, the occupying town hall, resource depletion, gas
//! structures and worker assignment. Ownership is derived from scratch each
//! tick, never transitioned.

use std::collections::{HashMap, HashSet};

use glam::Vec2;

use crate::cluster::cluster_greedy_weighted;
use crate::game_data::TypeRegistry;
use crate::grid::BitGrid;
use crate::index::{CategoryMask, ClassIndex};
use crate::unit::{Alliance, Unit, UnitTag};
use crate::view::UnitsView;

/// Greedy clustering radius for grouping resources into fields.
pub const RESOURCE_CLUSTER_RADIUS: f32 = 15.0;
/// Geysers weigh more than single mineral patches when placing the centroid,
/// offsetting the mineral-count imbalance of a typical field.
const GEYSER_WEIGHT: f32 = 4.0;
/// Tiles around a resource no town hall may touch.
const RESOURCE_MARGIN: f32 = 3.0;
/// Second shrink pass: anything this close to a blocked tile is blocked too,
/// which keeps adjacent sites from landing right next to each other.
const BLOCK_DILATION: i32 = 2;
/// Square-ring search bound around a cluster centroid, in tiles.
const SITE_SEARCH_LIMIT: i32 = 30;
/// Resources are re-identified by position, not tag; this is the match
/// threshold.
const RESOURCE_MATCH_DIST: f32 = 1.0;
/// A resource absent from the snapshot for more than this many ticks is
/// considered depleted.
const RESOURCE_LINGER_TICKS: u64 = 1;

/// Batched path-distance collaborator. Each pair may fail independently.
pub trait PathQuery {
    fn query(&mut self, pairs: &[(Vec2, Vec2)]) -> Vec<Option<f32>>;
}

/// Which side, if any, holds a base slot this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseOwner {
    #[default]
    Unowned,
    Own,
    Enemy,
}

/// One mineral patch or geyser tracked by a base.
#[derive(Debug, Clone)]
pub struct ResourcePatch {
    /// Last tag the resource was seen under; snapshot entities may present
    /// stale tags, so identity is positional.
    pub tag: UnitTag,
    pub pos: Vec2,
    pub last_seen: u64,
}

/// A persistent base slot and its per-tick state.
#[derive(Debug, Clone)]
pub struct Base {
    /// Weighted centroid of the slot's resource field.
    pub resource_center: Vec2,
    /// Viable town-hall placement point (tile center).
    pub location: Vec2,
    pub owner: BaseOwner,
    pub town_hall: Option<UnitTag>,
    pub minerals: Vec<ResourcePatch>,
    pub geysers: Vec<ResourcePatch>,
    pub gas_buildings: Vec<UnitTag>,
    pub own_workers: HashSet<UnitTag>,
    pub other_workers: HashSet<UnitTag>,
}

impl Base {
    fn at(resource_center: Vec2, location: Vec2) -> Self {
        Self {
            resource_center,
            location,
            owner: BaseOwner::Unowned,
            town_hall: None,
            minerals: Vec::new(),
            geysers: Vec::new(),
            gas_buildings: Vec::new(),
            own_workers: HashSet::new(),
            other_workers: HashSet::new(),
        }
    }

    /// Mineral patches currently believed present.
    pub fn mineral_count(&self) -> usize {
        self.minerals.len()
    }
}

/// A discovered expansion site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpansionSite {
    pub resource_center: Vec2,
    pub location: Vec2,
}

/// Cluster the neutral resources and find the nearest viable town-hall tile
/// for each cluster, run once at map load.
pub fn calculate_expansion_locations(
    resources: &[&Unit],
    placement: &BitGrid,
) -> Vec<ExpansionSite> {
    let clusters = cluster_greedy_weighted(
        resources.iter().copied(),
        RESOURCE_CLUSTER_RADIUS,
        |u| if u.has_vespene() { GEYSER_WEIGHT } else { 1.0 },
    );

    // Pass 1: block every tile under a resource footprint plus margin.
    let mut influence = BitGrid::new(placement.width(), placement.height());
    for resource in resources {
        let (half_w, half_h) = resource_half_extents(resource);
        block_box(&mut influence, resource.pos, half_w, half_h, RESOURCE_MARGIN);
    }
    // Pass 2: grow the blocked set so sites keep their distance from any
    // influence, not just from resources themselves.
    let mut blocked = dilate(&influence, BLOCK_DILATION);

    let mut sites = Vec::with_capacity(clusters.len());
    for cluster in &clusters {
        let center = cluster.center();
        let Some((tx, ty)) = nearest_free_tile(center, placement, &blocked) else {
            tracing::warn!(?center, "no viable town-hall tile for resource cluster");
            continue;
        };
        let location = Vec2::new(tx as f32 + 0.5, ty as f32 + 0.5);
        sites.push(ExpansionSite {
            resource_center: center,
            location,
        });
        // An accepted site becomes influence for the remaining clusters.
        block_box(
            &mut blocked,
            location,
            BLOCK_DILATION as f32,
            BLOCK_DILATION as f32,
            RESOURCE_MARGIN,
        );
    }
    tracing::info!(
        clusters = clusters.len(),
        sites = sites.len(),
        "expansion locations calculated"
    );
    sites
}

fn resource_half_extents(resource: &Unit) -> (f32, f32) {
    if resource.has_minerals() {
        (1.0, 0.5)
    } else if resource.has_vespene() {
        (1.5, 1.5)
    } else {
        (resource.radius, resource.radius)
    }
}

fn block_box(grid: &mut BitGrid, pos: Vec2, half_w: f32, half_h: f32, margin: f32) {
    let x0 = (pos.x - half_w - margin).floor() as i32;
    let x1 = (pos.x + half_w + margin).ceil() as i32;
    let y0 = (pos.y - half_h - margin).floor() as i32;
    let y1 = (pos.y + half_h + margin).ceil() as i32;
    for y in y0..y1 {
        for x in x0..x1 {
            grid.set(x, y, true);
        }
    }
}

fn dilate(blocked: &BitGrid, radius: i32) -> BitGrid {
    let mut grown = blocked.clone();
    for y in 0..blocked.height() {
        for x in 0..blocked.width() {
            if blocked.get(x, y) {
                continue;
            }
            'scan: for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if blocked.get(x + dx, y + dy) {
                        grown.set(x, y, true);
                        break 'scan;
                    }
                }
            }
        }
    }
    grown
}

/// Expanding square-ring search for the free buildable tile truly nearest to
/// `center` by squared distance.
fn nearest_free_tile(center: Vec2, placement: &BitGrid, blocked: &BitGrid) -> Option<(i32, i32)> {
    let cx = center.x.floor() as i32;
    let cy = center.y.floor() as i32;
    let mut best: Option<((i32, i32), f32)> = None;
    let mut ring_tiles = Vec::new();
    for ring in 0..=SITE_SEARCH_LIMIT {
        if let Some((_, best_d2)) = best {
            // No tile on a farther ring can beat the current best.
            let ring_min = ((ring - 1).max(0)) as f32;
            if ring_min * ring_min > best_d2 {
                break;
            }
        }
        collect_ring(cx, cy, ring, &mut ring_tiles);
        for &(x, y) in &ring_tiles {
            if placement.get(x, y) && !blocked.get(x, y) {
                let tile_center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let d2 = tile_center.distance_squared(center);
                if best.map_or(true, |(_, bd2)| d2 < bd2) {
                    best = Some(((x, y), d2));
                }
            }
        }
    }
    best.map(|(tile, _)| tile)
}

fn collect_ring(cx: i32, cy: i32, radius: i32, out: &mut Vec<(i32, i32)>) {
    out.clear();
    if radius == 0 {
        out.push((cx, cy));
        return;
    }
    for x in cx - radius..=cx + radius {
        out.push((x, cy - radius));
        out.push((x, cy + radius));
    }
    for y in cy - radius + 1..cy + radius {
        out.push((cx - radius, y));
        out.push((cx + radius, y));
    }
}

/// Live registry of base slots, fixed for the game after discovery.
#[derive(Debug, Default)]
pub struct BaseRegistry {
    bases: Vec<Base>,
    /// Row-major pairwise path distances, memoized for the game.
    distances: Vec<f32>,
    /// Nearest-slot memo keyed by rounded position. Base topology never
    /// changes mid-game, so entries are never invalidated.
    slot_cache: HashMap<(i32, i32), usize>,
}

impl BaseRegistry {
    pub fn from_expansions(sites: &[ExpansionSite]) -> Self {
        Self {
            bases: sites
                .iter()
                .map(|s| Base::at(s.resource_center, s.location))
                .collect(),
            distances: Vec::new(),
            slot_cache: HashMap::new(),
        }
    }

    pub fn bases(&self) -> &[Base] {
        &self.bases
    }

    pub fn base(&self, slot: usize) -> Option<&Base> {
        self.bases.get(slot)
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Slots currently holding one of our town halls.
    pub fn owned_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bases
            .iter()
            .enumerate()
            .filter(|(_, b)| b.owner == BaseOwner::Own)
            .map(|(i, _)| i)
    }

    /// Query every slot pair in both directions and memoize the results.
    /// Asymmetric answers keep the max; pairs failing in both directions
    /// degrade to straight-line distance rather than blocking.
    pub fn compute_distances(&mut self, pather: &mut dyn PathQuery) {
        let n = self.bases.len();
        if n < 2 || !self.distances.is_empty() {
            self.distances.resize(n * n, 0.0);
            return;
        }

        let mut pairs = Vec::with_capacity(n * (n - 1));
        for i in 0..n {
            for j in i + 1..n {
                let a = self.bases[i].location;
                let b = self.bases[j].location;
                pairs.push((a, b));
                pairs.push((b, a));
            }
        }
        let mut results = pather.query(&pairs).into_iter();

        self.distances = vec![0.0; n * n];
        for i in 0..n {
            for j in i + 1..n {
                let forward = results.next().unwrap_or(None);
                let back = results.next().unwrap_or(None);
                let d = match (forward, back) {
                    (Some(a), Some(b)) => a.max(b),
                    (Some(a), None) | (None, Some(a)) => a,
                    (None, None) => {
                        let fallback =
                            self.bases[i].location.distance(self.bases[j].location);
                        tracing::warn!(
                            from = i,
                            to = j,
                            fallback,
                            "path query failed both ways, using straight-line distance"
                        );
                        fallback
                    }
                };
                self.distances[i * n + j] = d;
                self.distances[j * n + i] = d;
            }
        }
    }

    /// Path distance between two slots; straight-line when distances have
    /// not been computed yet.
    pub fn distance_between(&self, a: usize, b: usize) -> f32 {
        let n = self.bases.len();
        if a >= n || b >= n || a == b {
            return 0.0;
        }
        if self.distances.len() == n * n {
            self.distances[a * n + b]
        } else {
            self.bases[a].location.distance(self.bases[b].location)
        }
    }

    /// Slot whose resource field is nearest to `pos`, memoized by rounded
    /// position.
    pub fn nearest_slot(&mut self, pos: Vec2) -> Option<usize> {
        if self.bases.is_empty() {
            return None;
        }
        let key = (pos.x.round() as i32, pos.y.round() as i32);
        if let Some(&slot) = self.slot_cache.get(&key) {
            return Some(slot);
        }
        let slot = self
            .bases
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.resource_center
                    .distance_squared(pos)
                    .total_cmp(&b.resource_center.distance_squared(pos))
            })
            .map(|(i, _)| i)?;
        self.slot_cache.insert(key, slot);
        Some(slot)
    }

    /// Per-tick maintenance against the freshly rebuilt index.
    pub fn update(&mut self, index: &ClassIndex, data: &TypeRegistry, tick: u64) {
        if self.bases.is_empty() {
            return;
        }
        for base in &mut self.bases {
            base.owner = BaseOwner::Unowned;
            base.town_hall = None;
            base.gas_buildings.clear();
            base.own_workers.clear();
            base.other_workers.clear();
        }

        self.attribute_town_halls(index, data);
        self.match_resources(&index.minerals(), tick, ResourceKind::Mineral);
        self.match_resources(&index.vespene_geysers(), tick, ResourceKind::Geyser);
        self.prune_depleted(tick);
        self.attribute_structures_and_workers(index, data);

        tracing::debug!(
            tick,
            owned = self.owned_slots().count(),
            bases = self.bases.len(),
            "base registry updated"
        );
    }

    /// Ownership is whichever alliance's town hall sits nearest each slot's
    /// designated location this tick.
    fn attribute_town_halls(&mut self, index: &ClassIndex, data: &TypeRegistry) {
        let mut nearest: Vec<Option<(BaseOwner, UnitTag, f32)>> = vec![None; self.bases.len()];
        for (alliance, owner) in [(Alliance::Own, BaseOwner::Own), (Alliance::Enemy, BaseOwner::Enemy)] {
            let halls = index.select(alliance, CategoryMask::STRUCTURES);
            for hall in halls.iter().filter(|u| data.is_town_hall(u.type_id)) {
                let Some(slot) = self.nearest_slot(hall.pos) else {
                    continue;
                };
                let d2 = hall.pos.distance_squared(self.bases[slot].location);
                if nearest[slot].map_or(true, |(_, _, best)| d2 < best) {
                    nearest[slot] = Some((owner, hall.tag, d2));
                }
            }
        }
        for (slot, found) in nearest.into_iter().enumerate() {
            if let Some((owner, tag, _)) = found {
                self.bases[slot].owner = owner;
                self.bases[slot].town_hall = Some(tag);
            }
        }
    }

    fn match_resources(&mut self, view: &UnitsView<'_>, tick: u64, kind: ResourceKind) {
        let threshold = RESOURCE_MATCH_DIST * RESOURCE_MATCH_DIST;
        for resource in view.iter() {
            let Some(slot) = self.nearest_slot(resource.pos) else {
                continue;
            };
            let patches = match kind {
                ResourceKind::Mineral => &mut self.bases[slot].minerals,
                ResourceKind::Geyser => &mut self.bases[slot].geysers,
            };
            match patches
                .iter_mut()
                .find(|p| p.pos.distance_squared(resource.pos) <= threshold)
            {
                Some(patch) => {
                    // Same patch, possibly under a fresh snapshot tag.
                    patch.tag = resource.tag;
                    patch.pos = resource.pos;
                    patch.last_seen = tick;
                }
                None => patches.push(ResourcePatch {
                    tag: resource.tag,
                    pos: resource.pos,
                    last_seen: tick,
                }),
            }
        }
    }

    fn prune_depleted(&mut self, tick: u64) {
        for base in &mut self.bases {
            base.minerals
                .retain(|p| tick.saturating_sub(p.last_seen) <= RESOURCE_LINGER_TICKS);
            base.geysers
                .retain(|p| tick.saturating_sub(p.last_seen) <= RESOURCE_LINGER_TICKS);
        }
    }

    fn attribute_structures_and_workers(&mut self, index: &ClassIndex, data: &TypeRegistry) {
        for alliance in [Alliance::Own, Alliance::Ally, Alliance::Enemy] {
            let structures = index.select(alliance, CategoryMask::STRUCTURES);
            for s in structures.iter().filter(|u| data.is_gas_building(u.type_id)) {
                if let Some(slot) = self.nearest_slot(s.pos) {
                    self.bases[slot].gas_buildings.push(s.tag);
                }
            }

            let mobiles = index.select(alliance, CategoryMask::MOBILE_UNITS);
            for w in mobiles.iter().filter(|u| data.is_worker(u.type_id)) {
                let Some(slot) = self.nearest_slot(w.pos) else {
                    continue;
                };
                if alliance == Alliance::Own {
                    self.bases[slot].own_workers.insert(w.tag);
                } else {
                    self.bases[slot].other_workers.insert(w.tag);
                }
            }
        }
    }
}

#[derive(Clone, Copy)]
enum ResourceKind {
    Mineral,
    Geyser,
}
