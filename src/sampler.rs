use crate::endpoints::RpcEndpoint;
use crate::probe::{Probe, ProbeOutcome};
use crate::results::EndpointLatencyResult;
use crate::stats::LatencySummary;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Drives a burst of probes against one endpoint and summarises the successful ones.
#[derive(Debug)]
pub struct Sampler<P> {
    pub prober: Arc<P>,
    pub iterations: usize,
    pub sleep_interval: Duration,
    pub region: String,
}

impl<P: Probe> Sampler<P> {
    pub fn new(prober: Arc<P>, iterations: usize, sleep_interval: Duration, region: &str) -> Self {
        Self {
            prober,
            iterations,
            sleep_interval,
            region: region.to_string(),
        }
    }

    /// `None` when no probe succeeded.
    pub async fn sample(&self, endpoint: &RpcEndpoint) -> Option<EndpointLatencyResult> {
        tracing::info!("Starting ping test for {}...", endpoint.name);

        // Prime the connection, the warm-up never counts
        let _ = self.prober.probe(endpoint, nonce()).await;

        // Probes start sleep_interval apart and overlap in flight
        let probes = (0..self.iterations).map(|i| {
            let delay = self.sleep_interval.saturating_mul(i as u32);
            async move {
                tokio::time::sleep(delay).await;
                self.prober.probe(endpoint, nonce()).await
            }
        });
        let outcomes = join_all(probes).await;

        let ping_latencies = successful_millis(&outcomes);
        tracing::debug!(
            "{}: {}/{} probes succeeded",
            endpoint.name,
            ping_latencies.len(),
            outcomes.len()
        );
        let summary = match LatencySummary::from_millis(&ping_latencies) {
            Some(summary) => summary,
            None => {
                tracing::warn!("No successful pings for {}.", endpoint.name);
                return None;
            }
        };
        Some(EndpointLatencyResult::new(endpoint, summary, &self.region))
    }
}

fn successful_millis(outcomes: &[ProbeOutcome]) -> Vec<f64> {
    outcomes
        .iter()
        .filter(|o| o.succeeded)
        .map(|o| o.elapsed.as_nanos() as f64 / 1_000_000.0)
        .collect()
}

/// Request id for a probe, drawn from an rng seeded with the current time.
pub fn nonce() -> u64 {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    StdRng::seed_from_u64(seed).gen::<u32>() as u64
}
