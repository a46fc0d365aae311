//! Travel-time rebalancing after an access decision
//!
//! The freshly measured traversal time becomes the segment's adapted
//! weight as-is, with no smoothing, and every vehicle on the segment is
//! told to re-route against the updated weights.

use anyhow::Result;
use log::warn;

use super::types::{SegmentId, VehicleId};
use crate::engine::TrafficEngine;

/// Write the segment's measured traversal time back as its adapted
/// travel-time weight, then request a re-route for each given vehicle.
///
/// Failed per-vehicle re-routes are warnings, not errors; the weight
/// update itself is an engine call and stays fatal. Returns the number
/// of re-routes issued.
pub fn rebalance_segment<E: TrafficEngine>(
    engine: &mut E,
    segment: &SegmentId,
    vehicles: &[VehicleId],
) -> Result<usize> {
    let measured = engine.measured_travel_time(segment)?;
    engine.set_adapted_travel_time(segment, measured)?;

    let mut rerouted = 0;
    for vehicle in vehicles {
        match engine.reroute_vehicle(vehicle) {
            Ok(()) => rerouted += 1,
            Err(err) => {
                warn!("Could not re-route {} on {}: {:#}", vehicle, segment, err);
            }
        }
    }
    Ok(rerouted)
}
