//! Best-effort eviction of non-priority vehicles from priority lanes
//!
//! Runs only on the branch where standard access has just been revoked.
//! Vehicles that cannot be moved stay where they are; the next tick's
//! access decision deals with them.

use std::collections::BTreeSet;

use anyhow::Result;
use log::warn;

use super::types::LaneId;
use crate::engine::TrafficEngine;

/// Ask every non-priority vehicle on the given lanes to move to the
/// numerically adjacent lane (index + 1) on the same segment, with no
/// deferral.
///
/// Infeasible moves (no adjacent lane, vehicle already gone) are logged
/// and swallowed; this never fails the tick. Returns
/// `(attempted, performed)` counts.
pub fn evict_non_priority<E: TrafficEngine>(
    engine: &mut E,
    priority_lanes: &BTreeSet<LaneId>,
) -> Result<(usize, usize)> {
    let mut attempted = 0;
    let mut performed = 0;

    for lane in priority_lanes {
        let target_index = lane.index()? + 1;
        for vehicle in engine.vehicles_on_lane(lane)? {
            if engine.vehicle_class(&vehicle)?.is_priority() {
                continue;
            }
            attempted += 1;
            match engine.change_vehicle_lane(&vehicle, target_index, 0) {
                Ok(()) => performed += 1,
                Err(err) => {
                    warn!("Could not evict {} from {}: {:#}", vehicle, lane, err);
                }
            }
        }
    }

    Ok((attempted, performed))
}
