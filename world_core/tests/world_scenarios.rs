//! End-to-end scenarios driving the assembled world model tick by tick.

use glam::Vec2;

use world_core::{
    Alliance, BaseOwner, BitGrid, HeightMap, MapInfo, PathQuery, TypeData, TypeRegistry, Unit,
    UnitFlags, UnitTag, UnitTypeId, WorldModel,
};

const TOWN_HALL: u32 = 18;
const WORKER: u32 = 45;
const SUPPLY: u32 = 19;
const MINERAL: u32 = 341;
const GEYSER: u32 = 342;

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::default();
    let plain = |name: &str, radius: f32| TypeData {
        name: name.into(),
        radius,
        weapons: Vec::new(),
        town_hall: false,
        gas_building: false,
        worker: false,
        mineral_field: false,
        vespene_geyser: false,
    };
    registry.insert(
        UnitTypeId(TOWN_HALL),
        TypeData {
            town_hall: true,
            ..plain("Hall", 2.75)
        },
    );
    registry.insert(
        UnitTypeId(WORKER),
        TypeData {
            worker: true,
            ..plain("Worker", 0.375)
        },
    );
    registry.insert(UnitTypeId(SUPPLY), plain("Supply", 1.0));
    registry.insert(
        UnitTypeId(MINERAL),
        TypeData {
            mineral_field: true,
            ..plain("Minerals", 1.125)
        },
    );
    registry.insert(
        UnitTypeId(GEYSER),
        TypeData {
            vespene_geyser: true,
            ..plain("Geyser", 1.5)
        },
    );
    registry
}

fn flat_map(size: i32) -> MapInfo {
    MapInfo {
        placement: BitGrid::filled(size, size, true),
        pathing: BitGrid::filled(size, size, true),
        terrain_height: HeightMap::new(size, size, vec![8.0; (size * size) as usize]),
    }
}

fn unit(tag: u64, type_id: u32, alliance: Alliance, flags: UnitFlags, x: f32, y: f32) -> Unit {
    Unit {
        tag: UnitTag(tag),
        type_id: UnitTypeId(type_id),
        alliance,
        pos: Vec2::new(x, y),
        flags,
        radius: 0.5,
        build_progress: 1.0,
        orders: Vec::new(),
    }
}

fn resource_field(first_tag: u64, cx: f32, cy: f32) -> Vec<Unit> {
    let mut units = vec![
        unit(
            first_tag,
            MINERAL,
            Alliance::Neutral,
            UnitFlags::MINERALS,
            cx - 2.0,
            cy,
        ),
        unit(
            first_tag + 1,
            MINERAL,
            Alliance::Neutral,
            UnitFlags::MINERALS,
            cx,
            cy,
        ),
        unit(
            first_tag + 2,
            MINERAL,
            Alliance::Neutral,
            UnitFlags::MINERALS,
            cx + 2.0,
            cy,
        ),
    ];
    units.push(unit(
        first_tag + 3,
        GEYSER,
        Alliance::Neutral,
        UnitFlags::VESPENE,
        cx,
        cy + 4.0,
    ));
    units
}

struct StraightLinePather;

impl PathQuery for StraightLinePather {
    fn query(&mut self, pairs: &[(Vec2, Vec2)]) -> Vec<Option<f32>> {
        pairs.iter().map(|(a, b)| Some(a.distance(*b) * 1.25)).collect()
    }
}

struct FailingPather;

impl PathQuery for FailingPather {
    fn query(&mut self, pairs: &[(Vec2, Vec2)]) -> Vec<Option<f32>> {
        vec![None; pairs.len()]
    }
}

#[test]
fn single_field_yields_one_clear_expansion() {
    let mut world = WorldModel::new(registry(), flat_map(48));
    world.on_tick(resource_field(100, 22.0, 20.0));
    world.locate_bases(&mut StraightLinePather);

    let bases = world.bases();
    assert_eq!(bases.len(), 1);
    let base = bases.base(0).unwrap();

    let tile = (
        base.location.x.floor() as i32,
        base.location.y.floor() as i32,
    );
    assert!(world.placement().raw().get(tile.0, tile.1));
    // Clear of every resource by at least three tiles.
    for resource in world.index().neutral().iter() {
        let dx = (base.location.x - resource.pos.x).abs();
        let dy = (base.location.y - resource.pos.y).abs();
        assert!(dx.max(dy) >= 3.0);
    }
    // Resources were attributed to the slot on the same tick.
    assert_eq!(base.mineral_count(), 3);
    assert_eq!(base.geysers.len(), 1);
    assert_eq!(base.owner, BaseOwner::Unowned);
}

#[test]
fn two_fields_get_distinct_slots_and_path_distances() {
    let mut world = WorldModel::new(registry(), flat_map(96));
    let mut units = resource_field(100, 20.0, 20.0);
    units.extend(resource_field(200, 72.0, 72.0));
    world.on_tick(units);
    world.locate_bases(&mut StraightLinePather);

    assert_eq!(world.bases().len(), 2);
    let d = world.bases().distance_between(0, 1);
    let straight = world
        .bases()
        .base(0)
        .unwrap()
        .location
        .distance(world.bases().base(1).unwrap().location);
    assert!((d - straight * 1.25).abs() < 1e-3);
}

#[test]
fn failing_pather_degrades_to_straight_line() {
    let mut world = WorldModel::new(registry(), flat_map(96));
    let mut units = resource_field(100, 20.0, 20.0);
    units.extend(resource_field(200, 72.0, 72.0));
    world.on_tick(units);
    world.locate_bases(&mut FailingPather);

    let straight = world
        .bases()
        .base(0)
        .unwrap()
        .location
        .distance(world.bases().base(1).unwrap().location);
    assert!((world.bases().distance_between(0, 1) - straight).abs() < 1e-3);
}

#[test]
fn base_ownership_follows_the_town_hall() {
    let mut world = WorldModel::new(registry(), flat_map(48));
    world.on_tick(resource_field(100, 22.0, 20.0));
    world.locate_bases(&mut StraightLinePather);
    let location = world.bases().base(0).unwrap().location;

    let mut with_hall = resource_field(100, 22.0, 20.0);
    with_hall.push(unit(
        1,
        TOWN_HALL,
        Alliance::Own,
        UnitFlags::STRUCTURE,
        location.x,
        location.y,
    ));
    with_hall.push(unit(2, WORKER, Alliance::Own, UnitFlags::empty(), 21.0, 19.0));
    world.on_tick(with_hall);

    let base = world.bases().base(0).unwrap();
    assert_eq!(base.owner, BaseOwner::Own);
    assert_eq!(base.town_hall, Some(UnitTag(1)));
    assert!(base.own_workers.contains(&UnitTag(2)));

    // Hall gone next tick: ownership is rederived, not remembered.
    world.on_tick(resource_field(100, 22.0, 20.0));
    let base = world.bases().base(0).unwrap();
    assert_eq!(base.owner, BaseOwner::Unowned);
    assert_eq!(base.town_hall, None);
}

#[test]
fn structure_lifecycle_leaves_placement_grid_intact() {
    let mut world = WorldModel::new(registry(), flat_map(32));
    world.on_tick(Vec::new());
    let before = world.placement().working().clone();
    assert!(world.can_place(UnitTypeId(SUPPLY), Vec2::new(10.0, 10.0)));

    world.on_tick(vec![unit(
        1,
        SUPPLY,
        Alliance::Own,
        UnitFlags::STRUCTURE,
        10.0,
        10.0,
    )]);
    assert!(!world.can_place(UnitTypeId(SUPPLY), Vec2::new(10.0, 10.0)));
    assert_ne!(*world.placement().working(), before);

    world.on_tick(Vec::new());
    assert_eq!(*world.placement().working(), before);
    assert!(world.can_place(UnitTypeId(SUPPLY), Vec2::new(10.0, 10.0)));
}

#[test]
fn openness_and_height_queries() {
    let size = 24;
    let mut map = flat_map(size);
    for y in 0..size {
        map.pathing.set(12, y, false);
    }
    let world = WorldModel::new(registry(), map);

    assert_eq!(world.openness().openness(12, 12), 0);
    assert_eq!(world.openness().openness(11, 12), 1);
    assert!(world.openness().openness(6, 12) > world.openness().openness(10, 12));

    assert_eq!(world.heights().sample(Vec2::new(8.0, 8.0)), 8.0);
}

#[test]
fn empty_snapshot_is_harmless() {
    let mut world = WorldModel::new(registry(), flat_map(16));
    world.on_tick(Vec::new());
    assert!(world.index().is_empty());
    assert!(world.index().enemies().is_empty());
    assert!(world.bases().is_empty());
    assert_eq!(world.tick(), 1);
}
