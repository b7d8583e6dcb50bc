//! Cycle resolution: find the newest published forecast run.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use swi_common::ForecastCycle;
use tracing::{debug, info};

/// Existence check for one candidate cycle on the upstream server.
///
/// A probe failure (network error, non-success status) counts as "not
/// available"; the resolver keeps searching backward.
#[async_trait]
pub trait AvailabilityProbe {
    async fn available(&self, cycle: &ForecastCycle) -> bool;
}

/// Walks 6-hour cycle boundaries backward from "now" until a probe
/// confirms a published run.
pub struct CycleResolver {
    max_probes: u32,
    forecast_hour: u32,
}

impl CycleResolver {
    pub fn new(max_probes: u32, forecast_hour: u32) -> Self {
        Self {
            max_probes,
            forecast_hour,
        }
    }

    /// Newest confirmed cycle at or before `now`, or `None` when no
    /// candidate in the probe window is published yet. `None` is the
    /// soft "nothing to do" outcome, not an error.
    pub async fn resolve<P>(&self, now: DateTime<Utc>, probe: &P) -> Option<ForecastCycle>
    where
        P: AvailabilityProbe + ?Sized,
    {
        let newest =
            ForecastCycle::new(ForecastCycle::floor_to_boundary(now), self.forecast_hour);

        for step in 0..self.max_probes {
            let candidate = newest.step_back(step);

            if probe.available(&candidate).await {
                info!(
                    cycle = %candidate.iso8601(),
                    probes = step + 1,
                    "Resolved forecast cycle"
                );
                return Some(candidate);
            }

            debug!(cycle = %candidate.iso8601(), "Cycle not yet published");
        }

        info!(
            probes = self.max_probes,
            "No published cycle within probe window"
        );
        None
    }
}
