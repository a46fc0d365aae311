//! Priority-lane access control
//!
//! The policy core: one-time lane classification, per-tick detection
//! and arbitration, and the consequential travel-time rebalancing. All
//! components are generic over the engine interface so they run against
//! the built-in engine or a test stub alike.

pub mod access;
pub mod classifier;
pub mod cleaner;
mod control_loop;
pub mod detector;
pub mod rebalance;
pub mod types;

pub use access::{grant_standard_access, revoke_standard_access};
pub use classifier::classify_priority_lanes;
pub use cleaner::evict_non_priority;
pub use control_loop::{ControlLoop, LoopState};
pub use detector::has_priority_vehicle;
pub use rebalance::rebalance_segment;
pub use types::{
    AccessGroup, ClassSet, LaneId, SegmentId, VehicleClass, VehicleId, GENERAL_TRAFFIC_CLASSES,
    PRIORITY_CLASSES, STANDARD_ACCESS_CLASSES,
};
