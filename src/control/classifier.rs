//! One-shot classification of a segment's lanes into the priority set
//!
//! Runs once per segment against the engine's initial permission state,
//! before the first tick; the result is treated as immutable for the
//! rest of the run.

use std::collections::BTreeSet;

use anyhow::Result;

use super::types::{ClassSet, LaneId};
use crate::engine::TrafficEngine;

/// Partition a segment's lanes, keeping those statically reserved for
/// priority traffic.
///
/// A lane qualifies when its allowed-class set intersects the priority
/// classes and does not intersect the general-traffic classes. Pure
/// read; input order is irrelevant to the result.
pub fn classify_priority_lanes<E: TrafficEngine>(
    engine: &E,
    segment_lanes: &[LaneId],
) -> Result<BTreeSet<LaneId>> {
    let priority = ClassSet::priority();
    let general = ClassSet::general_traffic();

    let mut priority_lanes = BTreeSet::new();
    for lane in segment_lanes {
        let allowed = engine.allowed_classes(lane)?;
        if allowed.intersects(&priority) && !allowed.intersects(&general) {
            priority_lanes.insert(lane.clone());
        }
    }
    Ok(priority_lanes)
}
