//! Traffic-engine interface
//!
//! The control policy never talks to a concrete engine type; everything
//! it needs is behind [`TrafficEngine`] so a run can target the built-in
//! engine or a test stub interchangeably.

mod network;
mod vehicle;
mod world;

pub use network::{JunctionId, RoadNetwork, SegmentSpec};
pub use vehicle::{SimVehicle, VehicleStep};
pub use world::SimEngine;

use anyhow::Result;

use crate::control::types::{ClassSet, LaneId, SegmentId, VehicleClass, VehicleId};

/// Query and mutation interface of a traffic simulation engine
///
/// Topology is fixed for a run; per-tick state changes through the
/// engine's own stepping and through the mutation calls below. All
/// operations are synchronous; `advance` blocks until the engine has
/// computed the next tick.
pub trait TrafficEngine {
    /// All road segments, in the engine's stable iteration order
    fn segment_ids(&self) -> Vec<SegmentId>;

    /// A segment's lanes, ordered by lane index
    fn segment_lanes(&self, segment: &SegmentId) -> Result<Vec<LaneId>>;

    /// Vehicles currently on a lane
    fn vehicles_on_lane(&self, lane: &LaneId) -> Result<Vec<VehicleId>>;

    /// Vehicles currently on any lane of a segment
    fn vehicles_on_segment(&self, segment: &SegmentId) -> Result<Vec<VehicleId>>;

    /// The class of an active vehicle
    fn vehicle_class(&self, vehicle: &VehicleId) -> Result<VehicleClass>;

    /// A lane's currently allowed vehicle classes
    fn allowed_classes(&self, lane: &LaneId) -> Result<ClassSet>;

    /// The segment's most recently measured traversal time, in seconds
    fn measured_travel_time(&self, segment: &SegmentId) -> Result<f64>;

    /// How many vehicles are still active or expected to depart
    fn remaining_vehicles(&self) -> Result<usize>;

    /// Replace a lane's allowed vehicle classes
    fn set_allowed_classes(&mut self, lane: &LaneId, classes: ClassSet) -> Result<()>;

    /// Request a vehicle move to the given lane index on its current
    /// segment after `deferral_ticks` ticks (0 = immediate). Errors when
    /// the move is infeasible; the caller decides whether that matters.
    fn change_vehicle_lane(
        &mut self,
        vehicle: &VehicleId,
        lane_index: usize,
        deferral_ticks: u64,
    ) -> Result<()>;

    /// Set the segment's adapted travel-time weight used for routing
    fn set_adapted_travel_time(&mut self, segment: &SegmentId, weight: f64) -> Result<()>;

    /// Instruct a vehicle to recompute its route from current weights
    fn reroute_vehicle(&mut self, vehicle: &VehicleId) -> Result<()>;

    /// Advance the simulation by one tick
    fn advance(&mut self) -> Result<()>;

    /// Release the engine connection
    fn close(&mut self) -> Result<()>;
}
