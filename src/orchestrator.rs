use crate::endpoints::RpcEndpoint;
use crate::error::Error;
use crate::probe::Probe;
use crate::results::EndpointLatencyResult;
use crate::sampler::Sampler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

pub const MIN_ITERATIONS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingOptions {
    pub iterations: usize,
    pub sleep_interval: Duration,
    pub deadline: Duration,
}

impl PingOptions {
    pub fn new(iterations: usize, sleep_ms: u64, deadline_s: u64) -> Result<Self, Error> {
        if iterations < MIN_ITERATIONS {
            return Err(Error::InvalidArgument(format!(
                "Iterations must be greater than or equal to {}.",
                MIN_ITERATIONS
            )));
        }
        Ok(Self {
            iterations,
            sleep_interval: Duration::from_millis(sleep_ms),
            deadline: Duration::from_secs(deadline_s),
        })
    }
}

/// Sample every endpoint concurrently and rank the endpoints that produced a result, fastest
/// average first. Samplers still running when the deadline fires are abandoned.
pub async fn run<P>(
    prober: Arc<P>,
    endpoints: &[RpcEndpoint],
    options: &PingOptions,
    region: &str,
) -> Vec<EndpointLatencyResult>
where
    P: Probe + 'static,
{
    let sampler = Arc::new(Sampler::new(
        prober,
        options.iterations,
        options.sleep_interval,
        region,
    ));
    let deadline = Instant::now() + options.deadline;

    // Each sampler reports through the channel, only this task touches `results`
    let (tx, mut rx) = mpsc::unbounded_channel();
    let tasks: Vec<(String, JoinHandle<()>)> = endpoints
        .iter()
        .cloned()
        .map(|endpoint| {
            let sampler = sampler.clone();
            let tx = tx.clone();
            let name = endpoint.name.clone();
            let handle = tokio::spawn(async move {
                if let Some(result) = sampler.sample(&endpoint).await {
                    let _ = tx.send(result);
                }
            });
            (name, handle)
        })
        .collect();
    drop(tx);

    let mut results = Vec::with_capacity(tasks.len());
    let mut timed_out = false;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(result)) => results.push(result),
            Ok(None) => break,
            Err(_) => {
                timed_out = true;
                break;
            }
        }
    }

    if timed_out {
        let pending = tasks.iter().filter(|(_, h)| !h.is_finished()).count();
        tracing::warn!(
            "Deadline of {:?} reached, abandoning {} endpoint(s).",
            options.deadline,
            pending
        );
        for (_, handle) in tasks.iter() {
            handle.abort();
        }
    }
    for (name, handle) in tasks {
        if let Err(e) = handle.await {
            if e.is_panic() {
                tracing::error!("Sampler for {} failed: {}", name, e);
            }
        }
    }
    // Samplers that finished right at the deadline
    while let Ok(result) = rx.try_recv() {
        results.push(result);
    }

    results.sort_by_key(|r| r.avg_latency_ms);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::ProbeOutcome;
    use async_trait::async_trait;
    use std::collections::HashMap;

    enum Behavior {
        // Reported latency, time actually spent
        Ok(u64, u64),
        Fail,
        Hang,
        Panic,
    }

    struct RouteProbe {
        routes: HashMap<String, Behavior>,
    }

    impl RouteProbe {
        fn new(routes: Vec<(&str, Behavior)>) -> Arc<Self> {
            Arc::new(Self {
                routes: routes
                    .into_iter()
                    .map(|(n, b)| (n.to_string(), b))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl Probe for RouteProbe {
        async fn probe(&self, endpoint: &RpcEndpoint, _nonce: u64) -> ProbeOutcome {
            match &self.routes[&endpoint.name] {
                Behavior::Ok(reported, spent) => {
                    tokio::time::sleep(Duration::from_millis(*spent)).await;
                    ProbeOutcome::success(Duration::from_millis(*reported))
                }
                Behavior::Fail => ProbeOutcome::failure(Duration::from_millis(1), Some(429)),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    ProbeOutcome::failure(Duration::from_secs(3600), None)
                }
                Behavior::Panic => panic!("probe blew up"),
            }
        }
    }

    fn endpoints(names: &[&str]) -> Vec<RpcEndpoint> {
        names
            .iter()
            .map(|n| RpcEndpoint::new(*n, format!("https://{}.example", n)))
            .collect()
    }

    fn options(deadline_s: u64) -> PingOptions {
        PingOptions::new(3, 1000, deadline_s).unwrap()
    }

    #[test]
    fn fewer_than_two_iterations_is_rejected() {
        assert!(matches!(
            PingOptions::new(1, 1000, 120),
            Err(Error::InvalidArgument(_))
        ));
        let options = PingOptions::new(2, 250, 30).unwrap();
        assert_eq!(options.sleep_interval, Duration::from_millis(250));
        assert_eq!(options.deadline, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_ranked_by_average_latency() {
        // "late" finishes last but is the fastest on average
        let probe = RouteProbe::new(vec![
            ("early", Behavior::Ok(300, 1)),
            ("dead", Behavior::Fail),
            ("late", Behavior::Ok(100, 5000)),
        ]);
        let results = run(probe, &endpoints(&["early", "dead", "late"]), &options(120), "ams").await;
        let names: Vec<&str> = results.iter().map(|r| r.rpc_name.as_str()).collect();
        assert_eq!(names, vec!["late", "early"]);
        assert_eq!(results[0].avg_latency_ms, 100);
        assert_eq!(results[1].avg_latency_ms, 300);
        assert!(results.iter().all(|r| r.region == "ams"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_drops_incomplete_endpoints() {
        let probe = RouteProbe::new(vec![
            ("quick", Behavior::Ok(20, 20)),
            ("stuck", Behavior::Hang),
        ]);
        let started = Instant::now();
        let results = run(probe, &endpoints(&["quick", "stuck"]), &options(10), "sin").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rpc_name, "quick");
        assert!(started.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_with_nothing_complete_is_empty() {
        let probe = RouteProbe::new(vec![("stuck", Behavior::Hang)]);
        let results = run(probe, &endpoints(&["stuck"]), &options(5), "sin").await;
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_endpoints_is_empty() {
        let probe = RouteProbe::new(vec![]);
        let results = run(probe, &[], &options(5), "dev").await;
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_sampler_does_not_abort_run() {
        let probe = RouteProbe::new(vec![
            ("good", Behavior::Ok(50, 50)),
            ("broken", Behavior::Panic),
        ]);
        let results = run(probe, &endpoints(&["good", "broken"]), &options(120), "dev").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].rpc_name, "good");
    }
}
