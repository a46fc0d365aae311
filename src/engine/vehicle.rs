//! Vehicle movement logic for the built-in engine

use anyhow::{Context, Result};

use super::network::{JunctionId, RoadNetwork};
use crate::control::types::{ClassSet, SegmentId, VehicleClass, VehicleId};

/// Result of a vehicle step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleStep {
    /// Still travelling
    Moving,
    /// Reached the end of its route this tick
    Arrived,
}

/// A vehicle in the built-in engine
///
/// The route is the remaining segment sequence; its first entry is the
/// segment currently occupied.
#[derive(Debug, Clone)]
pub struct SimVehicle {
    pub id: VehicleId,
    pub class: VehicleClass,
    /// Nominal speed in meters per second, capped by segment limits
    pub speed: f64,
    pub destination: JunctionId,
    pub route: Vec<SegmentId>,
    pub lane_index: usize,
    /// Meters travelled along the current segment
    pub position: f64,
    pub depart_tick: u64,
}

impl SimVehicle {
    pub fn new(
        id: VehicleId,
        class: VehicleClass,
        speed: f64,
        destination: JunctionId,
        route: Vec<SegmentId>,
        initial_lane: usize,
        depart_tick: u64,
    ) -> Self {
        Self {
            id,
            class,
            speed,
            destination,
            route,
            lane_index: initial_lane,
            position: 0.0,
            depart_tick,
        }
    }

    /// The segment the vehicle currently occupies
    pub fn current_segment(&self) -> Option<&SegmentId> {
        self.route.first()
    }

    /// Advance the vehicle by `dt` seconds, taking segment transitions
    /// as needed. On entering a segment the vehicle picks the
    /// lowest-indexed lane its class is allowed on.
    pub fn step(&mut self, dt: f64, network: &RoadNetwork) -> Result<VehicleStep> {
        let mut budget = dt;

        loop {
            let segment = match self.route.first() {
                Some(segment) => segment.clone(),
                None => return Ok(VehicleStep::Arrived),
            };
            let spec = network
                .segment(&segment)
                .with_context(|| format!("Segment {} not found", segment))?;

            let speed = self.speed.min(spec.speed_limit).max(0.1);
            let to_end = spec.length - self.position;
            let travelled = speed * budget;

            if travelled < to_end {
                self.position += travelled;
                return Ok(VehicleStep::Moving);
            }

            // Segment finished; spend the time it took and move on
            budget -= to_end / speed;
            self.route.remove(0);

            let next = match self.route.first() {
                Some(next) => next.clone(),
                None => return Ok(VehicleStep::Arrived),
            };
            let next_spec = network
                .segment(&next)
                .with_context(|| format!("Segment {} not found", next))?;

            self.lane_index = choose_lane(&next_spec.lanes, self.class);
            self.position = 0.0;
        }
    }
}

/// The lowest-indexed lane the class is currently allowed on; falls
/// back to lane 0 when no lane admits the class
pub(crate) fn choose_lane(lanes: &[ClassSet], class: VehicleClass) -> usize {
    lanes
        .iter()
        .position(|allowed| allowed.contains(class))
        .unwrap_or(0)
}
