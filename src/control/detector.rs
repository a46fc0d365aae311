//! Detection of priority-class vehicles on a set of lanes

use std::collections::BTreeSet;

use anyhow::Result;

use super::types::LaneId;
use crate::engine::TrafficEngine;

/// Whether at least one vehicle of a priority class is currently
/// present on any of the given lanes.
///
/// Scans lanes in sorted order and short-circuits on the first match,
/// so the answer is deterministic for a fixed engine snapshot. Pure
/// read; no engine state changes.
pub fn has_priority_vehicle<E: TrafficEngine>(
    engine: &E,
    priority_lanes: &BTreeSet<LaneId>,
) -> Result<bool> {
    for lane in priority_lanes {
        for vehicle in engine.vehicles_on_lane(lane)? {
            if engine.vehicle_class(&vehicle)?.is_priority() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
