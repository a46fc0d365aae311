//! Core types for the lane-control policy
//!
//! Identifiers mirror the engine's string ids; vehicle classes are a
//! closed set with explicit access-group membership.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{Context, Result};

/// A unique identifier for a road segment (edge)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentId(pub String);

impl SegmentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unique identifier for a lane, structured as `<segmentId>_<index>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneId(pub String);

impl LaneId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build a lane id from its segment and positional index
    pub fn from_parts(segment: &SegmentId, index: usize) -> Self {
        Self(format!("{}_{}", segment.0, index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The segment this lane belongs to (everything before the final `_`)
    pub fn segment(&self) -> Result<SegmentId> {
        let (segment, _) = self
            .0
            .rsplit_once('_')
            .with_context(|| format!("Lane id '{}' has no index suffix", self.0))?;
        Ok(SegmentId::new(segment))
    }

    /// The positional index appended to the segment id
    pub fn index(&self) -> Result<usize> {
        let (_, index) = self
            .0
            .rsplit_once('_')
            .with_context(|| format!("Lane id '{}' has no index suffix", self.0))?;
        index
            .parse()
            .with_context(|| format!("Lane id '{}' has a non-numeric index", self.0))
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A unique identifier for a vehicle
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VehicleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access-group membership of a vehicle class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessGroup {
    /// Entitled to unrestricted priority-lane use
    Priority,
    /// May be granted temporary priority-lane access
    StandardEligible,
    /// Never allowed on priority lanes
    Ineligible,
}

/// Type of vehicle in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VehicleClass {
    Bus,
    Emergency,
    Taxi,
    Passenger,
    Private,
    Evehicle,
    Truck,
    Other,
}

impl VehicleClass {
    /// Which access group this class belongs to
    pub fn access_group(&self) -> AccessGroup {
        match self {
            VehicleClass::Bus | VehicleClass::Emergency | VehicleClass::Taxi => {
                AccessGroup::Priority
            }
            VehicleClass::Passenger | VehicleClass::Private | VehicleClass::Evehicle => {
                AccessGroup::StandardEligible
            }
            VehicleClass::Truck | VehicleClass::Other => AccessGroup::Ineligible,
        }
    }

    pub fn is_priority(&self) -> bool {
        self.access_group() == AccessGroup::Priority
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Bus => "bus",
            VehicleClass::Emergency => "emergency",
            VehicleClass::Taxi => "taxi",
            VehicleClass::Passenger => "passenger",
            VehicleClass::Private => "private",
            VehicleClass::Evehicle => "evehicle",
            VehicleClass::Truck => "truck",
            VehicleClass::Other => "other",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classes entitled to priority-lane use
pub const PRIORITY_CLASSES: [VehicleClass; 3] = [
    VehicleClass::Bus,
    VehicleClass::Emergency,
    VehicleClass::Taxi,
];

/// Classes granted or revoked standard access to priority lanes
pub const STANDARD_ACCESS_CLASSES: [VehicleClass; 3] = [
    VehicleClass::Passenger,
    VehicleClass::Private,
    VehicleClass::Evehicle,
];

/// Classes whose static presence disqualifies a lane from being a
/// priority lane. Note this set does not contain `Other`.
pub const GENERAL_TRAFFIC_CLASSES: [VehicleClass; 4] = [
    VehicleClass::Private,
    VehicleClass::Evehicle,
    VehicleClass::Passenger,
    VehicleClass::Truck,
];

/// The set of vehicle classes allowed on a lane
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassSet(BTreeSet<VehicleClass>);

impl ClassSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_classes(classes: &[VehicleClass]) -> Self {
        classes.iter().copied().collect()
    }

    /// The classes entitled to priority-lane use
    pub fn priority() -> Self {
        Self::from_classes(&PRIORITY_CLASSES)
    }

    /// The classes granted or revoked by the access controller
    pub fn standard_access() -> Self {
        Self::from_classes(&STANDARD_ACCESS_CLASSES)
    }

    /// The classes that disqualify a lane from priority status
    pub fn general_traffic() -> Self {
        Self::from_classes(&GENERAL_TRAFFIC_CLASSES)
    }

    pub fn insert(&mut self, class: VehicleClass) -> bool {
        self.0.insert(class)
    }

    pub fn contains(&self, class: VehicleClass) -> bool {
        self.0.contains(&class)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if any class is in both sets
    pub fn intersects(&self, other: &ClassSet) -> bool {
        self.0.iter().any(|class| other.0.contains(class))
    }

    /// A new set containing the classes of both sets
    pub fn union(&self, other: &ClassSet) -> ClassSet {
        ClassSet(self.0.union(&other.0).copied().collect())
    }

    /// A new set containing this set's classes that are not in `other`
    pub fn difference(&self, other: &ClassSet) -> ClassSet {
        ClassSet(self.0.difference(&other.0).copied().collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = VehicleClass> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<VehicleClass> for ClassSet {
    fn from_iter<I: IntoIterator<Item = VehicleClass>>(iter: I) -> Self {
        ClassSet(iter.into_iter().collect())
    }
}
