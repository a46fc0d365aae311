//! Demo network and traffic demand generation
//!
//! Builds a 3x3 arterial grid where the arterial cross carries a
//! curbside priority lane (index 0), and schedules a seeded-random mix
//! of standard and priority traffic. Everything here is operational
//! glue; the policy itself lives in [`crate::control`].

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::Rng;
use rand::SeedableRng;

use crate::control::types::{ClassSet, SegmentId, VehicleClass, VehicleId};
use crate::engine::{JunctionId, RoadNetwork, SegmentSpec, SimEngine};

/// Length of every grid segment, meters
const SEGMENT_LENGTH: f64 = 200.0;

/// Grid speed limit, meters per second
const SPEED_LIMIT: f64 = 13.9;

/// A lane open to every vehicle class
fn general_lane() -> ClassSet {
    ClassSet::from_classes(&[
        VehicleClass::Bus,
        VehicleClass::Emergency,
        VehicleClass::Taxi,
        VehicleClass::Passenger,
        VehicleClass::Private,
        VehicleClass::Evehicle,
        VehicleClass::Truck,
        VehicleClass::Other,
    ])
}

fn add_link(network: &mut RoadNetwork, from: &JunctionId, to: &JunctionId, arterial: bool) -> Result<()> {
    let lanes = if arterial {
        vec![ClassSet::priority(), general_lane()]
    } else {
        vec![general_lane()]
    };
    network.add_segment(SegmentSpec {
        id: SegmentId::new(format!("{}-{}", from, to)),
        from: from.clone(),
        to: to.clone(),
        length: SEGMENT_LENGTH,
        speed_limit: SPEED_LIMIT,
        lanes,
    })
}

/// Build the 3x3 demo grid
///
/// Horizontal segments on the middle row and vertical segments on the
/// middle column are arterials with a reserved lane 0; everything else
/// is a single general-traffic lane. All links are bidirectional
/// (two directed segments).
pub fn build_demo_network() -> Result<RoadNetwork> {
    let mut network = RoadNetwork::new();
    let spacing = 20.0;

    let mut grid: Vec<Vec<JunctionId>> = Vec::new();
    for row in 0..3 {
        let mut junctions = Vec::new();
        for col in 0..3 {
            let junction = JunctionId::new(format!("J{}{}", row, col));
            network.add_junction(
                junction.clone(),
                (col as f32 * spacing, row as f32 * spacing),
            );
            junctions.push(junction);
        }
        grid.push(junctions);
    }

    // Horizontal links
    for row in 0..3 {
        for col in 0..2 {
            let arterial = row == 1;
            add_link(&mut network, &grid[row][col], &grid[row][col + 1], arterial)?;
            add_link(&mut network, &grid[row][col + 1], &grid[row][col], arterial)?;
        }
    }

    // Vertical links
    for row in 0..2 {
        for col in 0..3 {
            let arterial = col == 1;
            add_link(&mut network, &grid[row][col], &grid[row + 1][col], arterial)?;
            add_link(&mut network, &grid[row + 1][col], &grid[row][col], arterial)?;
        }
    }

    Ok(network)
}

/// Pick a vehicle class from the demand mix
fn pick_class(rng: &mut StdRng) -> VehicleClass {
    match rng.random_range(0..100) {
        0..=5 => VehicleClass::Bus,
        6..=9 => VehicleClass::Taxi,
        10..=11 => VehicleClass::Emergency,
        12..=24 => VehicleClass::Truck,
        25..=34 => VehicleClass::Evehicle,
        35..=54 => VehicleClass::Private,
        _ => VehicleClass::Passenger,
    }
}

/// Nominal speed for a class, with a little jitter
fn pick_speed(rng: &mut StdRng, class: VehicleClass) -> f64 {
    let base = match class {
        VehicleClass::Bus => 9.0,
        VehicleClass::Emergency => 14.0,
        VehicleClass::Taxi => 11.0,
        VehicleClass::Truck => 8.0,
        _ => 10.0,
    };
    base + rng.random_range(-1.0..2.0)
}

/// Build the demo engine with `vehicle_count` scheduled trips
///
/// The same seed always produces the same network, demand mix, routes
/// and departure ticks.
pub fn build_demo_engine(seed: u64, vehicle_count: usize) -> Result<SimEngine> {
    let network = build_demo_network().context("Failed to build the demo network")?;
    let junctions: Vec<JunctionId> = network.junction_positions().keys().cloned().collect();
    let mut engine = SimEngine::new(network);
    let mut rng = StdRng::seed_from_u64(seed);

    let departure_window = (vehicle_count as u64 * 2).max(10);

    for index in 0..vehicle_count {
        let class = pick_class(&mut rng);
        let speed = pick_speed(&mut rng, class);

        let origin = junctions
            .choose(&mut rng)
            .context("Demo network has no junctions")?
            .clone();
        let destination = loop {
            let candidate = junctions
                .choose(&mut rng)
                .context("Demo network has no junctions")?;
            if *candidate != origin {
                break candidate.clone();
            }
        };

        let id = VehicleId::new(format!("{}{:03}", class, index));
        let depart_tick = rng.random_range(0..departure_window);
        engine
            .schedule_vehicle(id, class, speed, &origin, &destination, depart_tick)
            .context("Failed to schedule demo traffic")?;
    }

    Ok(engine)
}
