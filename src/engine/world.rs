//! Built-in deterministic traffic engine
//!
//! A self-contained engine behind the [`TrafficEngine`] trait so the
//! binary and the integration tests have a real collaborator. Vehicles
//! depart from a sorted queue, move along travel-time-weighted routes
//! and retire on arrival; all iteration is in key order so identical
//! seeds replay identically.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::info;
use sorted_vec::SortedVec;

use super::network::{JunctionId, RoadNetwork};
use super::vehicle::{choose_lane, SimVehicle, VehicleStep};
use super::TrafficEngine;
use crate::control::types::{ClassSet, LaneId, SegmentId, VehicleClass, VehicleId};

/// Occupancy weight applied per vehicle when measuring traversal time
const CONGESTION_FACTOR: f64 = 0.5;

/// A scheduled departure, ordered by tick then vehicle id
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Departure {
    tick: u64,
    vehicle: VehicleId,
}

/// The built-in simulation engine
pub struct SimEngine {
    network: RoadNetwork,

    /// Vehicles currently on the road
    vehicles: BTreeMap<VehicleId, SimVehicle>,

    /// Vehicles waiting for their departure tick
    scheduled: BTreeMap<VehicleId, SimVehicle>,

    /// Departure queue, kept sorted by departure tick
    departures: SortedVec<Departure>,

    tick: u64,
    tick_seconds: f64,
    spawned: usize,
    completed: usize,
    closed: bool,
}

impl SimEngine {
    pub fn new(network: RoadNetwork) -> Self {
        Self {
            network,
            vehicles: BTreeMap::new(),
            scheduled: BTreeMap::new(),
            departures: SortedVec::new(),
            tick: 0,
            tick_seconds: 1.0,
            spawned: 0,
            completed: 0,
            closed: false,
        }
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn spawned(&self) -> usize {
        self.spawned
    }

    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn active_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Schedule a vehicle trip; the route is computed against the
    /// travel-time weights current at scheduling time
    pub fn schedule_vehicle(
        &mut self,
        id: VehicleId,
        class: VehicleClass,
        speed: f64,
        origin: &JunctionId,
        destination: &JunctionId,
        depart_tick: u64,
    ) -> Result<()> {
        let route = self
            .network
            .find_route(origin, destination)
            .with_context(|| format!("No route from {} to {} for {}", origin, destination, id))?;
        if route.is_empty() {
            anyhow::bail!("Vehicle {} has no segments to travel", id);
        }

        let vehicle = SimVehicle::new(
            id.clone(),
            class,
            speed,
            destination.clone(),
            route,
            0,
            depart_tick,
        );
        self.departures.insert(Departure {
            tick: depart_tick,
            vehicle: id.clone(),
        });
        self.scheduled.insert(id, vehicle);
        Ok(())
    }

    /// Move due departures onto the road, picking each vehicle's entry
    /// lane against current permissions
    fn insert_departures(&mut self) -> Result<()> {
        while self
            .departures
            .first()
            .is_some_and(|departure| departure.tick <= self.tick)
        {
            let departure = self.departures.remove_index(0);
            let mut vehicle = match self.scheduled.remove(&departure.vehicle) {
                Some(vehicle) => vehicle,
                None => continue,
            };

            let segment = vehicle
                .current_segment()
                .cloned()
                .with_context(|| format!("Vehicle {} scheduled with empty route", vehicle.id))?;
            let spec = self
                .network
                .segment(&segment)
                .with_context(|| format!("Segment {} not found", segment))?;
            vehicle.lane_index = choose_lane(&spec.lanes, vehicle.class);

            self.spawned += 1;
            self.vehicles.insert(departure.vehicle, vehicle);
        }
        Ok(())
    }

    fn lane_parts(&self, lane: &LaneId) -> Result<(SegmentId, usize)> {
        let segment = lane.segment()?;
        let index = lane.index()?;
        let spec = self
            .network
            .segment(&segment)
            .with_context(|| format!("Lane {} names an unknown segment", lane))?;
        if index >= spec.lanes.len() {
            anyhow::bail!("Lane {} does not exist on segment {}", lane, segment);
        }
        Ok((segment, index))
    }

    /// Print an ASCII map of junctions, segments and vehicles
    pub fn draw_map(&self) {
        let positions = self.network.junction_positions();
        if positions.is_empty() {
            return;
        }

        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for &(x, y) in positions.values() {
            min_x = min_x.min(x);
            max_x = max_x.max(x);
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        min_x -= 2.0;
        max_x += 2.0;
        min_y -= 2.0;
        max_y += 2.0;

        let scale = 1.0;
        let width = ((max_x - min_x) * scale) as usize + 1;
        let height = ((max_y - min_y) * scale) as usize + 1;
        let mut grid = vec![vec![' '; width]; height];

        let to_grid = |x: f32, y: f32| -> (usize, usize) {
            let col = ((x - min_x) * scale) as usize;
            let row = ((max_y - y) * scale) as usize;
            (row.min(height - 1), col.min(width - 1))
        };

        // Segments as dotted lines
        for segment_id in self.network.segment_ids() {
            let spec = match self.network.segment(&segment_id) {
                Some(spec) => spec,
                None => continue,
            };
            let (Some(from), Some(to)) = (
                self.network.junction_position(&spec.from),
                self.network.junction_position(&spec.to),
            ) else {
                continue;
            };

            let (start_row, start_col) = to_grid(from.0, from.1);
            let (end_row, end_col) = to_grid(to.0, to.1);

            let dx = (end_col as i32 - start_col as i32).abs();
            let dy = (end_row as i32 - start_row as i32).abs();
            let sx = if start_col < end_col { 1 } else { -1 };
            let sy = if start_row < end_row { 1 } else { -1 };
            let mut err = dx - dy;
            let mut x = start_col as i32;
            let mut y = start_row as i32;

            loop {
                if x >= 0 && x < width as i32 && y >= 0 && y < height as i32 {
                    let (ux, uy) = (x as usize, y as usize);
                    if grid[uy][ux] == ' ' {
                        grid[uy][ux] = '.';
                    }
                }
                if x == end_col as i32 && y == end_row as i32 {
                    break;
                }
                let e2 = 2 * err;
                if e2 > -dy {
                    err -= dy;
                    x += sx;
                }
                if e2 < dx {
                    err += dx;
                    y += sy;
                }
            }
        }

        // Junctions
        for position in positions.values() {
            let (row, col) = to_grid(position.0, position.1);
            grid[row][col] = '+';
        }

        // Vehicles, interpolated along their current segment
        for vehicle in self.vehicles.values() {
            let Some(segment) = vehicle.current_segment() else {
                continue;
            };
            let Some(spec) = self.network.segment(segment) else {
                continue;
            };
            let (Some(from), Some(to)) = (
                self.network.junction_position(&spec.from),
                self.network.junction_position(&spec.to),
            ) else {
                continue;
            };
            let t = (vehicle.position / spec.length).clamp(0.0, 1.0) as f32;
            let x = from.0 + (to.0 - from.0) * t;
            let y = from.1 + (to.1 - from.1) * t;
            let (row, col) = to_grid(x, y);
            if grid[row][col] == ' ' || grid[row][col] == '.' {
                grid[row][col] = if vehicle.class.is_priority() { 'P' } else { 'v' };
            }
        }

        println!("=== Network Map (tick {}) ===", self.tick);
        println!("Legend: +=Junction, .=Segment, P=Priority vehicle, v=Other vehicle");
        for row in &grid {
            let line: String = row.iter().collect();
            println!("{}", line);
        }
        println!();
    }
}

impl TrafficEngine for SimEngine {
    fn segment_ids(&self) -> Vec<SegmentId> {
        self.network.segment_ids()
    }

    fn segment_lanes(&self, segment: &SegmentId) -> Result<Vec<LaneId>> {
        let spec = self
            .network
            .segment(segment)
            .with_context(|| format!("Segment {} not found", segment))?;
        Ok((0..spec.lanes.len())
            .map(|index| LaneId::from_parts(segment, index))
            .collect())
    }

    fn vehicles_on_lane(&self, lane: &LaneId) -> Result<Vec<VehicleId>> {
        let (segment, index) = self.lane_parts(lane)?;
        Ok(self
            .vehicles
            .values()
            .filter(|vehicle| {
                vehicle.lane_index == index && vehicle.current_segment() == Some(&segment)
            })
            .map(|vehicle| vehicle.id.clone())
            .collect())
    }

    fn vehicles_on_segment(&self, segment: &SegmentId) -> Result<Vec<VehicleId>> {
        if self.network.segment(segment).is_none() {
            anyhow::bail!("Segment {} not found", segment);
        }
        Ok(self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.current_segment() == Some(segment))
            .map(|vehicle| vehicle.id.clone())
            .collect())
    }

    fn vehicle_class(&self, vehicle: &VehicleId) -> Result<VehicleClass> {
        self.vehicles
            .get(vehicle)
            .map(|vehicle| vehicle.class)
            .with_context(|| format!("Vehicle {} is not active", vehicle))
    }

    fn allowed_classes(&self, lane: &LaneId) -> Result<ClassSet> {
        let (segment, index) = self.lane_parts(lane)?;
        let spec = self
            .network
            .segment(&segment)
            .with_context(|| format!("Segment {} not found", segment))?;
        Ok(spec.lanes[index].clone())
    }

    fn measured_travel_time(&self, segment: &SegmentId) -> Result<f64> {
        let spec = self
            .network
            .segment(segment)
            .with_context(|| format!("Segment {} not found", segment))?;
        let occupancy = self
            .vehicles
            .values()
            .filter(|vehicle| vehicle.current_segment() == Some(segment))
            .count();
        Ok(spec.free_flow_time() * (1.0 + CONGESTION_FACTOR * occupancy as f64))
    }

    fn remaining_vehicles(&self) -> Result<usize> {
        Ok(self.vehicles.len() + self.scheduled.len())
    }

    fn set_allowed_classes(&mut self, lane: &LaneId, classes: ClassSet) -> Result<()> {
        let (segment, index) = self.lane_parts(lane)?;
        let spec = self
            .network
            .segment_mut(&segment)
            .with_context(|| format!("Segment {} not found", segment))?;
        spec.lanes[index] = classes;
        Ok(())
    }

    fn change_vehicle_lane(
        &mut self,
        vehicle: &VehicleId,
        lane_index: usize,
        _deferral_ticks: u64,
    ) -> Result<()> {
        // This engine applies feasible moves immediately regardless of
        // the requested deferral
        let entry = self
            .vehicles
            .get_mut(vehicle)
            .with_context(|| format!("Vehicle {} is not active", vehicle))?;
        let segment = entry
            .current_segment()
            .cloned()
            .with_context(|| format!("Vehicle {} has no current segment", vehicle))?;
        let spec = self
            .network
            .segment(&segment)
            .with_context(|| format!("Segment {} not found", segment))?;
        if lane_index >= spec.lanes.len() {
            anyhow::bail!(
                "Segment {} has no lane {} for vehicle {}",
                segment,
                lane_index,
                vehicle
            );
        }
        entry.lane_index = lane_index;
        Ok(())
    }

    fn set_adapted_travel_time(&mut self, segment: &SegmentId, weight: f64) -> Result<()> {
        self.network.set_adapted_travel_time(segment, weight)
    }

    fn reroute_vehicle(&mut self, vehicle: &VehicleId) -> Result<()> {
        let (current, destination) = {
            let entry = self
                .vehicles
                .get(vehicle)
                .with_context(|| format!("Vehicle {} is not active", vehicle))?;
            let current = entry
                .current_segment()
                .cloned()
                .with_context(|| format!("Vehicle {} has no current segment", vehicle))?;
            (current, entry.destination.clone())
        };

        let next_junction = self
            .network
            .segment(&current)
            .with_context(|| format!("Segment {} not found", current))?
            .to
            .clone();

        let tail = if next_junction == destination {
            Vec::new()
        } else {
            self.network
                .find_route(&next_junction, &destination)
                .with_context(|| {
                    format!("No route from {} to {} for {}", next_junction, destination, vehicle)
                })?
        };

        let entry = self
            .vehicles
            .get_mut(vehicle)
            .with_context(|| format!("Vehicle {} is not active", vehicle))?;
        entry.route = std::iter::once(current).chain(tail).collect();
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        if self.closed {
            anyhow::bail!("Engine connection is closed");
        }

        self.insert_departures()?;

        let mut arrived = Vec::new();
        for vehicle in self.vehicles.values_mut() {
            if vehicle.step(self.tick_seconds, &self.network)? == VehicleStep::Arrived {
                arrived.push(vehicle.id.clone());
            }
        }
        for id in arrived {
            self.vehicles.remove(&id);
            self.completed += 1;
        }

        self.tick += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        info!("=== SIMULATION COMPLETE ===");
        info!("Ticks simulated: {}", self.tick);
        info!("Total vehicles spawned: {}", self.spawned);
        info!("Total vehicles completed: {}", self.completed);
        info!("Active vehicles: {}", self.vehicles.len());
        info!(
            "Completion rate: {:.1}%",
            if self.spawned > 0 {
                (self.completed as f64 / self.spawned as f64) * 100.0
            } else {
                0.0
            }
        );
        Ok(())
    }
}
