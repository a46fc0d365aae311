//! Control-policy validation tests
//!
//! These tests drive the policy components against a scriptable stub
//! engine so every branch can be pinned down without a full simulation.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use anyhow::{Context, Result};

use lane_control::control::{
    classify_priority_lanes, evict_non_priority, grant_standard_access, has_priority_vehicle,
    revoke_standard_access, ClassSet, ControlLoop, LaneId, LoopState, SegmentId, VehicleClass,
    VehicleId,
};
use lane_control::engine::TrafficEngine;

/// A scriptable in-memory engine
#[derive(Default)]
struct StubEngine {
    segments: Vec<SegmentId>,
    lanes: BTreeMap<SegmentId, Vec<LaneId>>,
    allowed: BTreeMap<LaneId, ClassSet>,
    occupants: BTreeMap<LaneId, Vec<VehicleId>>,
    vehicle_lane: BTreeMap<VehicleId, LaneId>,
    classes: BTreeMap<VehicleId, VehicleClass>,
    remaining: usize,
    rerouted: Vec<VehicleId>,
    advanced: u64,
    closed: bool,
}

impl StubEngine {
    fn add_segment(&mut self, id: &str, lane_sets: Vec<ClassSet>) {
        let segment = SegmentId::new(id);
        let mut lanes = Vec::new();
        for (index, set) in lane_sets.into_iter().enumerate() {
            let lane = LaneId::from_parts(&segment, index);
            self.allowed.insert(lane.clone(), set);
            lanes.push(lane);
        }
        self.lanes.insert(segment.clone(), lanes);
        self.segments.push(segment);
    }

    fn place_vehicle(&mut self, lane: &LaneId, id: &str, class: VehicleClass) {
        let vehicle = VehicleId::new(id);
        self.occupants
            .entry(lane.clone())
            .or_default()
            .push(vehicle.clone());
        self.vehicle_lane.insert(vehicle.clone(), lane.clone());
        self.classes.insert(vehicle, class);
    }

    fn clear_lane(&mut self, lane: &LaneId) {
        for vehicle in self.occupants.remove(lane).unwrap_or_default() {
            self.vehicle_lane.remove(&vehicle);
            self.classes.remove(&vehicle);
        }
    }

    fn occupants_of(&self, lane: &LaneId) -> Vec<VehicleId> {
        self.occupants.get(lane).cloned().unwrap_or_default()
    }
}

impl TrafficEngine for StubEngine {
    fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.clone()
    }

    fn segment_lanes(&self, segment: &SegmentId) -> Result<Vec<LaneId>> {
        self.lanes
            .get(segment)
            .cloned()
            .with_context(|| format!("Unknown segment {}", segment))
    }

    fn vehicles_on_lane(&self, lane: &LaneId) -> Result<Vec<VehicleId>> {
        Ok(self.occupants_of(lane))
    }

    fn vehicles_on_segment(&self, segment: &SegmentId) -> Result<Vec<VehicleId>> {
        let lanes = self
            .lanes
            .get(segment)
            .with_context(|| format!("Unknown segment {}", segment))?;
        Ok(lanes
            .iter()
            .flat_map(|lane| self.occupants_of(lane))
            .collect())
    }

    fn vehicle_class(&self, vehicle: &VehicleId) -> Result<VehicleClass> {
        self.classes
            .get(vehicle)
            .copied()
            .with_context(|| format!("Unknown vehicle {}", vehicle))
    }

    fn allowed_classes(&self, lane: &LaneId) -> Result<ClassSet> {
        self.allowed
            .get(lane)
            .cloned()
            .with_context(|| format!("Unknown lane {}", lane))
    }

    fn measured_travel_time(&self, _segment: &SegmentId) -> Result<f64> {
        Ok(12.0)
    }

    fn remaining_vehicles(&self) -> Result<usize> {
        Ok(self.remaining)
    }

    fn set_allowed_classes(&mut self, lane: &LaneId, classes: ClassSet) -> Result<()> {
        let entry = self
            .allowed
            .get_mut(lane)
            .with_context(|| format!("Unknown lane {}", lane))?;
        *entry = classes;
        Ok(())
    }

    fn change_vehicle_lane(
        &mut self,
        vehicle: &VehicleId,
        lane_index: usize,
        _deferral_ticks: u64,
    ) -> Result<()> {
        let current = self
            .vehicle_lane
            .get(vehicle)
            .cloned()
            .with_context(|| format!("Unknown vehicle {}", vehicle))?;
        let segment = current.segment()?;
        let target = LaneId::from_parts(&segment, lane_index);
        if !self.allowed.contains_key(&target) {
            anyhow::bail!("Segment {} has no lane {}", segment, lane_index);
        }
        if let Some(occupants) = self.occupants.get_mut(&current) {
            occupants.retain(|id| id != vehicle);
        }
        self.occupants
            .entry(target.clone())
            .or_default()
            .push(vehicle.clone());
        self.vehicle_lane.insert(vehicle.clone(), target);
        Ok(())
    }

    fn set_adapted_travel_time(&mut self, _segment: &SegmentId, _weight: f64) -> Result<()> {
        Ok(())
    }

    fn reroute_vehicle(&mut self, vehicle: &VehicleId) -> Result<()> {
        self.rerouted.push(vehicle.clone());
        Ok(())
    }

    fn advance(&mut self) -> Result<()> {
        self.advanced += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

fn priority_set() -> ClassSet {
    ClassSet::priority()
}

fn standard_lane() -> ClassSet {
    ClassSet::from_classes(&[VehicleClass::Private, VehicleClass::Passenger])
}

fn lane(segment: &str, index: usize) -> LaneId {
    LaneId::from_parts(&SegmentId::new(segment), index)
}

#[test]
fn test_classification_is_stable() {
    let mut engine = StubEngine::default();
    engine.add_segment("E1", vec![standard_lane(), priority_set()]);

    let lanes = engine.segment_lanes(&SegmentId::new("E1")).unwrap();
    let first = classify_priority_lanes(&engine, &lanes).unwrap();
    let second = classify_priority_lanes(&engine, &lanes).unwrap();

    let expected: BTreeSet<LaneId> = [lane("E1", 1)].into_iter().collect();
    assert_eq!(first, expected);
    assert_eq!(first, second);
}

#[test]
fn test_classification_rejects_mixed_lanes() {
    let mut engine = StubEngine::default();
    engine.add_segment(
        "E2",
        vec![
            ClassSet::from_classes(&[VehicleClass::Bus, VehicleClass::Passenger]),
            ClassSet::from_classes(&[VehicleClass::Bus, VehicleClass::Truck]),
        ],
    );

    let lanes = engine.segment_lanes(&SegmentId::new("E2")).unwrap();
    let priority = classify_priority_lanes(&engine, &lanes).unwrap();
    assert!(priority.is_empty());
}

#[test]
fn test_classification_keeps_lane_shared_with_other() {
    // `other` is not a disqualifying class, unlike the standard and
    // truck classes
    let mut engine = StubEngine::default();
    engine.add_segment(
        "E3",
        vec![ClassSet::from_classes(&[
            VehicleClass::Bus,
            VehicleClass::Other,
        ])],
    );

    let lanes = engine.segment_lanes(&SegmentId::new("E3")).unwrap();
    let priority = classify_priority_lanes(&engine, &lanes).unwrap();
    assert_eq!(priority.len(), 1);
}

#[test]
fn test_grant_revoke_roundtrip_and_idempotence() {
    let mut engine = StubEngine::default();
    engine.add_segment("E1", vec![priority_set()]);
    let lanes: BTreeSet<LaneId> = [lane("E1", 0)].into_iter().collect();
    let original = engine.allowed_classes(&lane("E1", 0)).unwrap();

    grant_standard_access(&mut engine, &lanes).unwrap();
    let granted = engine.allowed_classes(&lane("E1", 0)).unwrap();
    assert!(granted.contains(VehicleClass::Passenger));
    assert!(granted.contains(VehicleClass::Private));
    assert!(granted.contains(VehicleClass::Evehicle));
    assert!(granted.contains(VehicleClass::Bus));

    // Granting again changes nothing
    grant_standard_access(&mut engine, &lanes).unwrap();
    assert_eq!(engine.allowed_classes(&lane("E1", 0)).unwrap(), granted);

    // Revoking restores the original set, priority classes intact
    revoke_standard_access(&mut engine, &lanes).unwrap();
    assert_eq!(engine.allowed_classes(&lane("E1", 0)).unwrap(), original);

    // Revoking twice is the same as once
    revoke_standard_access(&mut engine, &lanes).unwrap();
    assert_eq!(engine.allowed_classes(&lane("E1", 0)).unwrap(), original);
}

#[test]
fn test_detection_empty_lanes() {
    let mut engine = StubEngine::default();
    engine.add_segment("E1", vec![priority_set()]);
    let lanes: BTreeSet<LaneId> = [lane("E1", 0)].into_iter().collect();

    assert!(!has_priority_vehicle(&engine, &lanes).unwrap());
}

#[test]
fn test_detection_finds_single_emergency() {
    let mut engine = StubEngine::default();
    engine.add_segment("E1", vec![priority_set(), priority_set()]);
    engine.place_vehicle(&lane("E1", 1), "amb0", VehicleClass::Emergency);
    let lanes: BTreeSet<LaneId> = [lane("E1", 0), lane("E1", 1)].into_iter().collect();

    assert!(has_priority_vehicle(&engine, &lanes).unwrap());
}

#[test]
fn test_detection_ignores_trucks() {
    let mut engine = StubEngine::default();
    engine.add_segment("E1", vec![priority_set()]);
    engine.place_vehicle(&lane("E1", 0), "hgv0", VehicleClass::Truck);
    engine.place_vehicle(&lane("E1", 0), "hgv1", VehicleClass::Truck);
    let lanes: BTreeSet<LaneId> = [lane("E1", 0)].into_iter().collect();

    assert!(!has_priority_vehicle(&engine, &lanes).unwrap());
}

#[test]
fn test_eviction_moves_non_priority_to_adjacent_lane() {
    let mut engine = StubEngine::default();
    engine.add_segment("A1", vec![priority_set(), standard_lane()]);
    engine.place_vehicle(&lane("A1", 0), "car0", VehicleClass::Private);
    engine.place_vehicle(&lane("A1", 0), "bus0", VehicleClass::Bus);
    let lanes: BTreeSet<LaneId> = [lane("A1", 0)].into_iter().collect();

    let (attempted, performed) = evict_non_priority(&mut engine, &lanes).unwrap();
    assert_eq!(attempted, 1);
    assert_eq!(performed, 1);

    // The private car moved over; the bus stayed
    assert_eq!(
        engine.occupants_of(&lane("A1", 1)),
        vec![VehicleId::new("car0")]
    );
    assert_eq!(
        engine.occupants_of(&lane("A1", 0)),
        vec![VehicleId::new("bus0")]
    );
}

#[test]
fn test_eviction_tolerates_missing_target_lane() {
    let mut engine = StubEngine::default();
    engine.add_segment("S1", vec![priority_set()]);
    engine.place_vehicle(&lane("S1", 0), "hgv0", VehicleClass::Truck);
    let lanes: BTreeSet<LaneId> = [lane("S1", 0)].into_iter().collect();

    let (attempted, performed) = evict_non_priority(&mut engine, &lanes).unwrap();
    assert_eq!(attempted, 1);
    assert_eq!(performed, 0);

    // The truck is still where it was
    assert_eq!(
        engine.occupants_of(&lane("S1", 0)),
        vec![VehicleId::new("hgv0")]
    );
}

#[test]
fn test_loop_terminates_with_no_vehicles() {
    let mut engine = StubEngine::default();
    engine.add_segment("E1", vec![standard_lane(), priority_set()]);
    engine.remaining = 0;

    let mut control_loop = ControlLoop::new(engine);
    control_loop.run().unwrap();

    assert_eq!(control_loop.state(), LoopState::Terminated);
    assert_eq!(control_loop.stats().ticks, 0);
    assert_eq!(control_loop.engine().advanced, 0);
    assert!(control_loop.engine().closed);

    // Classification still ran
    let expected: BTreeSet<LaneId> = [lane("E1", 1)].into_iter().collect();
    assert_eq!(
        control_loop.priority_lanes(&SegmentId::new("E1")),
        Some(&expected)
    );
}

#[test]
fn test_segment_without_priority_lanes_is_processed_uniformly() {
    let mut engine = StubEngine::default();
    engine.add_segment("L1", vec![standard_lane()]);
    engine.place_vehicle(&lane("L1", 0), "car0", VehicleClass::Passenger);
    engine.remaining = 1;

    let before = engine.allowed_classes(&lane("L1", 0)).unwrap();

    let mut control_loop = ControlLoop::new(engine);
    assert!(control_loop.step().unwrap());

    // Permissions untouched, but the vehicle was still rebalanced
    assert_eq!(
        control_loop.engine().allowed_classes(&lane("L1", 0)).unwrap(),
        before
    );
    assert_eq!(control_loop.engine().rerouted, vec![VehicleId::new("car0")]);
    assert_eq!(control_loop.engine().advanced, 1);
}

#[test]
fn test_priority_lane_cycle_on_shared_segment() {
    let mut engine = StubEngine::default();
    engine.add_segment("E1", vec![standard_lane(), priority_set()]);
    engine.place_vehicle(&lane("E1", 0), "car0", VehicleClass::Private);
    engine.place_vehicle(&lane("E1", 1), "bus0", VehicleClass::Bus);
    engine.remaining = 2;

    let mut control_loop = ControlLoop::new(engine);

    // Tick with the bus present: standard access stays revoked
    assert!(control_loop.step().unwrap());
    let revoked = control_loop.engine().allowed_classes(&lane("E1", 1)).unwrap();
    assert!(!revoked.contains(VehicleClass::Passenger));
    assert!(!revoked.contains(VehicleClass::Private));
    assert!(!revoked.contains(VehicleClass::Evehicle));
    assert!(revoked.contains(VehicleClass::Bus));

    // Both occupants of the segment were rebalanced
    let rerouted: BTreeSet<VehicleId> = control_loop.engine().rerouted.iter().cloned().collect();
    assert!(rerouted.contains(&VehicleId::new("bus0")));
    assert!(rerouted.contains(&VehicleId::new("car0")));

    // The bus leaves; the next tick opens the lane to standard traffic
    control_loop.engine_mut().clear_lane(&lane("E1", 1));
    assert!(control_loop.step().unwrap());
    let granted = control_loop.engine().allowed_classes(&lane("E1", 1)).unwrap();
    assert!(granted.contains(VehicleClass::Passenger));
    assert!(granted.contains(VehicleClass::Private));
    assert!(granted.contains(VehicleClass::Evehicle));
    assert!(granted.contains(VehicleClass::Bus));

    // The engine drains once nothing is left
    control_loop.engine_mut().remaining = 0;
    assert!(!control_loop.step().unwrap());
    assert_eq!(control_loop.state(), LoopState::Terminated);
    assert!(control_loop.engine().closed);
}

#[test]
fn test_lane_id_parsing_with_underscored_segment() {
    let lane = LaneId::new("ramp_12_3");
    assert_eq!(lane.segment().unwrap(), SegmentId::new("ramp_12"));
    assert_eq!(lane.index().unwrap(), 3);

    assert!(LaneId::new("nounderscore").segment().is_err());
    assert!(LaneId::new("bad_index_x").index().is_err());
}
