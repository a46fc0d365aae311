//! The per-tick control loop
//!
//! Orchestrates detection, access arbitration, lane cleaning and
//! rebalancing over every segment, then advances the engine one tick.
//! One full pass over all segments happens between engine steps; no two
//! segments' processing ever overlaps.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use super::access::{grant_standard_access, revoke_standard_access};
use super::classifier::classify_priority_lanes;
use super::cleaner::evict_non_priority;
use super::detector::has_priority_vehicle;
use super::rebalance::rebalance_segment;
use super::types::{LaneId, SegmentId};
use crate::engine::TrafficEngine;
use crate::stats::RunStats;

/// Lifecycle state of a control-loop run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Classification has not run yet
    Initializing,
    /// Ticking while the engine reports remaining vehicles
    Stepping,
    /// Remaining vehicles reached zero; releasing the engine
    Draining,
    /// The run is over
    Terminated,
}

/// The control-loop orchestrator
///
/// Owns the engine handle and the immutable per-segment priority-lane
/// table built during initialization. With control disabled the loop
/// still initializes, steps and terminates the same way, but skips the
/// per-segment policy — the baseline for comparison runs.
pub struct ControlLoop<E: TrafficEngine> {
    engine: E,
    control_enabled: bool,
    state: LoopState,
    tick: u64,
    tick_limit: Option<u64>,
    segment_order: Vec<SegmentId>,
    priority_lanes: BTreeMap<SegmentId, BTreeSet<LaneId>>,
    stats: RunStats,
}

impl<E: TrafficEngine> ControlLoop<E> {
    fn new_internal(engine: E, control_enabled: bool) -> Self {
        Self {
            engine,
            control_enabled,
            state: LoopState::Initializing,
            tick: 0,
            tick_limit: None,
            segment_order: Vec::new(),
            priority_lanes: BTreeMap::new(),
            stats: RunStats::default(),
        }
    }

    /// A loop running the priority-lane policy
    pub fn new(engine: E) -> Self {
        Self::new_internal(engine, true)
    }

    /// A loop that only advances the engine, with no lane control
    pub fn new_baseline(engine: E) -> Self {
        Self::new_internal(engine, false)
    }

    /// Cap the number of ticks; a run that has not drained by then is
    /// terminated with a warning
    pub fn with_tick_limit(mut self, limit: u64) -> Self {
        self.tick_limit = Some(limit);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The priority lanes classified for a segment
    pub fn priority_lanes(&self, segment: &SegmentId) -> Option<&BTreeSet<LaneId>> {
        self.priority_lanes.get(segment)
    }

    /// Build the priority-lane table from the engine's initial
    /// permission state. Runs once; later calls are no-ops.
    pub fn initialize(&mut self) -> Result<()> {
        if self.state != LoopState::Initializing {
            return Ok(());
        }

        self.segment_order = self.engine.segment_ids();

        for segment in &self.segment_order {
            let lanes = self
                .engine
                .segment_lanes(segment)
                .with_context(|| format!("Failed to read lanes of segment {}", segment))?;
            let priority = classify_priority_lanes(&self.engine, &lanes)
                .with_context(|| format!("Failed to classify segment {}", segment))?;
            self.stats.priority_lanes += priority.len();
            self.priority_lanes.insert(segment.clone(), priority);
        }

        self.stats.segments = self.segment_order.len();
        info!(
            "Classified {} segments: {} priority lanes",
            self.stats.segments, self.stats.priority_lanes
        );

        self.state = LoopState::Stepping;
        Ok(())
    }

    /// Run one control tick: process every segment, then advance the
    /// engine. Returns false once the run has terminated.
    pub fn step(&mut self) -> Result<bool> {
        if self.state == LoopState::Initializing {
            self.initialize()?;
        }
        if self.state == LoopState::Terminated {
            return Ok(false);
        }

        let remaining = self
            .engine
            .remaining_vehicles()
            .context("Failed to read remaining vehicle count")?;
        if remaining == 0 {
            self.drain()?;
            return Ok(false);
        }

        if self.control_enabled {
            let segments = std::mem::take(&mut self.segment_order);
            for segment in &segments {
                self.process_segment(segment)
                    .with_context(|| format!("Tick {} failed on segment {}", self.tick, segment))?;
            }
            self.segment_order = segments;
        }

        self.engine
            .advance()
            .with_context(|| format!("Engine failed to advance past tick {}", self.tick))?;
        self.tick += 1;
        self.stats.ticks = self.tick;

        if let Some(limit) = self.tick_limit {
            if self.tick >= limit {
                warn!("Tick limit {} reached before the network drained", limit);
                self.drain()?;
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Run to termination
    pub fn run(&mut self) -> Result<()> {
        self.initialize()?;
        while self.step()? {}
        Ok(())
    }

    /// Detect, arbitrate and rebalance one segment
    fn process_segment(&mut self, segment: &SegmentId) -> Result<()> {
        let priority_lanes = self
            .priority_lanes
            .get(segment)
            .with_context(|| format!("Segment {} missing from the priority-lane table", segment))?;

        let vehicles = self.engine.vehicles_on_segment(segment)?;

        if has_priority_vehicle(&self.engine, priority_lanes)? {
            debug!("Priority vehicle on {}: revoking standard access", segment);
            self.stats.revocations += revoke_standard_access(&mut self.engine, priority_lanes)?;
            let (attempted, performed) = evict_non_priority(&mut self.engine, priority_lanes)?;
            self.stats.evictions_attempted += attempted;
            self.stats.evictions_performed += performed;
        } else {
            self.stats.grants += grant_standard_access(&mut self.engine, priority_lanes)?;
        }

        self.stats.reroutes += rebalance_segment(&mut self.engine, segment, &vehicles)?;
        Ok(())
    }

    /// Release the engine and finish the run
    fn drain(&mut self) -> Result<()> {
        self.state = LoopState::Draining;
        self.engine
            .close()
            .context("Failed to release the engine connection")?;
        self.stats.log_summary();
        self.state = LoopState::Terminated;
        Ok(())
    }
}
