use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::info;

use super::DiscoveryManager;
use crate::types::RunOutcome;

/// Background task that triggers a discovery pass on a fixed interval.
/// Overlap with a manual run is handled by the manager's guard.
pub struct DiscoveryScheduler {
    manager: Arc<DiscoveryManager>,
    every: Duration,
    run_on_startup: bool,
}

impl DiscoveryScheduler {
    pub fn new(manager: Arc<DiscoveryManager>, every: Duration, run_on_startup: bool) -> Self {
        Self {
            manager,
            every,
            run_on_startup,
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.run_on_startup {
            interval.tick().await; // consume immediate first tick
        }
        info!(every_secs = self.every.as_secs(), "Discovery scheduler started");

        loop {
            interval.tick().await;
            match self.manager.run_discovery().await {
                RunOutcome::Completed(stats) => {
                    info!(saved = stats.total_deals_saved, "Scheduled discovery finished")
                }
                RunOutcome::AlreadyRunning => info!("Scheduled discovery skipped, a run is in progress"),
            }
        }
    }
}
