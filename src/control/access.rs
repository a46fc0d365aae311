//! Granting and revoking standard-vehicle access to priority lanes
//!
//! Both operations rewrite each lane's allowed-class set through the
//! engine and are idempotent: re-granting a granted lane or re-revoking
//! a revoked one leaves the set unchanged.

use std::collections::BTreeSet;

use anyhow::Result;

use super::types::{ClassSet, LaneId};
use crate::engine::TrafficEngine;

/// Allow standard-eligible vehicles onto the given lanes.
///
/// Each lane's allowed set is unioned with the standard-access classes
/// and written back. Returns the number of lanes whose set changed.
pub fn grant_standard_access<E: TrafficEngine>(
    engine: &mut E,
    lanes: &BTreeSet<LaneId>,
) -> Result<usize> {
    let standard = ClassSet::standard_access();

    let mut changed = 0;
    for lane in lanes {
        let current = engine.allowed_classes(lane)?;
        let granted = current.union(&standard);
        if granted != current {
            changed += 1;
        }
        engine.set_allowed_classes(lane, granted)?;
    }
    Ok(changed)
}

/// Bar standard-eligible vehicles from the given lanes.
///
/// Each lane's allowed set has the standard-access classes subtracted
/// and is written back. Returns the number of lanes whose set changed.
pub fn revoke_standard_access<E: TrafficEngine>(
    engine: &mut E,
    lanes: &BTreeSet<LaneId>,
) -> Result<usize> {
    let standard = ClassSet::standard_access();

    let mut changed = 0;
    for lane in lanes {
        let current = engine.allowed_classes(lane)?;
        let revoked = current.difference(&standard);
        if revoked != current {
            changed += 1;
        }
        engine.set_allowed_classes(lane, revoked)?;
    }
    Ok(changed)
}
