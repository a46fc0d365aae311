//! Run statistics for the control loop

use log::info;

/// Counters accumulated over one control-loop run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Simulation ticks executed
    pub ticks: u64,
    /// Segments under control
    pub segments: usize,
    /// Priority lanes found during classification
    pub priority_lanes: usize,
    /// Lanes whose allowed set gained standard access
    pub grants: usize,
    /// Lanes whose allowed set lost standard access
    pub revocations: usize,
    /// Eviction requests issued for non-priority vehicles
    pub evictions_attempted: usize,
    /// Eviction requests the engine accepted
    pub evictions_performed: usize,
    /// Vehicle re-routes issued after travel-time updates
    pub reroutes: usize,
}

impl RunStats {
    /// Log the end-of-run summary block
    pub fn log_summary(&self) {
        info!("=== CONTROL LOOP COMPLETE ===");
        info!("Ticks executed: {}", self.ticks);
        info!(
            "Segments controlled: {} ({} priority lanes)",
            self.segments, self.priority_lanes
        );
        info!("Access grants: {}", self.grants);
        info!("Access revocations: {}", self.revocations);
        info!(
            "Evictions: {}/{} performed",
            self.evictions_performed, self.evictions_attempted
        );
        info!("Re-routes issued: {}", self.reroutes);
    }
}
