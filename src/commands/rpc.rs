use crate::commands::PingArgs;
use crate::configuration::Settings;
use crate::endpoints::{fetch_rpc_endpoints, list_client, RpcEndpoint};
use crate::error::{Error, Result};
use crate::orchestrator::{self, PingOptions};
use crate::probe::RpcProber;
use crate::results::{EndpointLatencyResult, PersistedResult, TestRun};
use crate::store::{self, group_by_region, PgStore, ResultStore};
use chrono::Utc;
use prettytable::format::Alignment;
use prettytable::{row, Cell, Row, Table};
use reqwest::Client;
use std::fmt::Write;
use std::sync::Arc;
use uuid::Uuid;

pub async fn fetch(url: &str) -> Result<()> {
    let endpoints = fetch_rpc_endpoints(&list_client()?, url).await?;
    println!("{}", serde_json::to_string_pretty(&endpoints)?);
    Ok(())
}

pub async fn ping(settings: &Settings, args: &PingArgs) -> Result<()> {
    let options = PingOptions::new(args.iterations, args.sleep, args.timeout)?;
    let store = if args.write_to_db {
        Some(PgStore::connect(&settings.database()).await?)
    } else {
        None
    };
    let (endpoints, test_run) = prepare_run(
        &list_client()?,
        &args.rpcs_json_url,
        store.as_ref(),
        args.test_id.as_deref(),
    )
    .await?;
    if let Some(test_run) = &test_run {
        println!("Test ID: {}", test_run.id);
    }
    let timestamp = Utc::now().timestamp();

    println!(
        "Pinging {} RPC endpoints from region {}!",
        endpoints.len(),
        settings.fly_region
    );
    println!("Iterations: {}", options.iterations);
    println!("Sleep Time: {}ms\n", args.sleep);

    let results = orchestrator::run(
        Arc::new(RpcProber::new()?),
        &endpoints,
        &options,
        &settings.fly_region,
    )
    .await;
    results_table(&results, &settings.fly_region).printstd();

    if results.is_empty() {
        tracing::warn!("No endpoint produced a result.");
        return Ok(());
    }
    if let (Some(store), Some(test_run)) = (&store, &test_run) {
        println!("Writing results to the database...");
        persist_results(store, test_run, &results, timestamp).await?;
    }
    Ok(())
}

pub async fn cleanup(settings: &Settings) -> Result<()> {
    let store = PgStore::connect(&settings.database()).await?;
    for id in store::cleanup(&store).await? {
        println!("Deleting test {}", id);
    }
    Ok(())
}

pub async fn tests(settings: &Settings, test_id: Option<&str>) -> Result<()> {
    let store = PgStore::connect(&settings.database()).await?;
    print!("{}", render_test_run(&store, test_id).await?);
    Ok(())
}

pub fn parse_test_id(test_id: &str) -> Result<Uuid> {
    Uuid::parse_str(test_id)
        .map_err(|e| Error::InvalidArgument(format!("Invalid test ID {}: {}", test_id, e)))
}

/// Fetch the endpoint list, then resolve the test run when results are stored. A failed fetch
/// leaves the store untouched.
pub async fn prepare_run<S: ResultStore + ?Sized>(
    client: &Client,
    rpcs_json_url: &str,
    store: Option<&S>,
    test_id: Option<&str>,
) -> Result<(Vec<RpcEndpoint>, Option<TestRun>)> {
    let endpoints = fetch_rpc_endpoints(client, rpcs_json_url).await?;
    let test_run = match store {
        Some(store) => Some(resolve_test_run(store, test_id).await?),
        None => None,
    };
    Ok((endpoints, test_run))
}

/// Existing test run when an id is given, otherwise a fresh one.
pub async fn resolve_test_run<S: ResultStore + ?Sized>(
    store: &S,
    test_id: Option<&str>,
) -> Result<TestRun> {
    match test_id {
        Some(id) => Ok(store.get_test_run(parse_test_id(id)?).await?),
        None => Ok(store.create_test_run().await?),
    }
}

pub async fn persist_results<S: ResultStore + ?Sized>(
    store: &S,
    test_run: &TestRun,
    results: &[EndpointLatencyResult],
    timestamp: i64,
) -> Result<()> {
    let persisted: Vec<PersistedResult> = results
        .iter()
        .cloned()
        .map(|r| PersistedResult::new(r, test_run.id, timestamp))
        .collect();
    store.insert_results(test_run.id, &persisted).await?;
    tracing::info!(
        "Wrote {} results to test {}.",
        persisted.len(),
        test_run.id
    );
    Ok(())
}

/// Ranking of one regional run, in the order given.
pub fn results_table(results: &[EndpointLatencyResult], region: &str) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::new(vec![Cell::new_align(
        &format!("RPC latency from {}", region),
        Alignment::CENTER,
    )
    .with_hspan(6)]));
    table.add_row(row![
        "RPC",
        "Avg (ms)",
        "P10 (ms)",
        "P50 (ms)",
        "P90 (ms)",
        "Stdev (ms)",
    ]);
    for r in results {
        table.add_row(row![
            r.rpc_name,
            r.avg_latency_ms,
            r.p10_latency_ms,
            r.p50_latency_ms,
            r.p90_latency_ms,
            r.stdev_latency_ms,
        ]);
    }
    table
}

/// Results of one test run, per region, fastest first. Uses the latest test run without an id.
pub async fn render_test_run<S: ResultStore + ?Sized>(
    store: &S,
    test_id: Option<&str>,
) -> Result<String> {
    let test_run = match test_id {
        Some(id) => store.get_test_run(parse_test_id(id)?).await?,
        None => match store.latest_test_run().await? {
            Some(test_run) => test_run,
            None => return Ok("No tests found.\n".to_string()),
        },
    };
    let results = store.results_for(test_run.id).await?;

    let mut out = String::new();
    let created_at = match test_run.created_at() {
        Some(created_at) => created_at.to_string(),
        None => format!("epoch {}", test_run.timestamp),
    };
    let _ = writeln!(out, "Test {} ({})\n", test_run.id, created_at);
    for (region, results) in group_by_region(results) {
        let _ = writeln!(out, "Region: {}", region);
        for r in results {
            let _ = writeln!(out, "{} - {}ms", r.result.rpc_name, r.result.avg_latency_ms);
        }
        let _ = writeln!(out);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EndpointError, RestError, StoreError};
    use crate::store::MemoryStore;
    use crate::test_support::serve_once;

    fn result(name: &str, region: &str, avg: i64) -> EndpointLatencyResult {
        EndpointLatencyResult {
            rpc_name: name.to_string(),
            rpc_url: format!("https://{}.example", name),
            avg_latency_ms: avg,
            p10_latency_ms: avg - 10,
            p50_latency_ms: avg,
            p90_latency_ms: avg + 10,
            stdev_latency_ms: 4,
            region: region.to_string(),
        }
    }

    #[tokio::test]
    async fn resolve_without_id_creates_test_run() {
        let store = MemoryStore::default();
        let test_run = resolve_test_run(&store, None).await.unwrap();
        assert_eq!(store.get_test_run(test_run.id).await.unwrap(), test_run);
    }

    #[tokio::test]
    async fn resolve_with_unknown_id_fails() {
        let store = MemoryStore::default();
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            resolve_test_run(&store, Some(&id)).await,
            Err(Error::Store(StoreError::TestRunNotFound(_)))
        ));
        assert!(matches!(
            resolve_test_run(&store, Some("not-a-uuid")).await,
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn regions_report_into_shared_test_run() {
        let store = MemoryStore::default();
        let shared = store.create_test_run().await.unwrap();
        let id = shared.id.to_string();

        // Two regional workers resolve the same id and write their own results
        let ams = resolve_test_run(&store, Some(&id)).await.unwrap();
        persist_results(&store, &ams, &[result("mysten", "ams", 80)], 1_700_000_000)
            .await
            .unwrap();
        let sin = resolve_test_run(&store, Some(&id)).await.unwrap();
        persist_results(
            &store,
            &sin,
            &[result("mysten", "sin", 210), result("acme", "sin", 150)],
            1_700_000_005,
        )
        .await
        .unwrap();
        // A retried worker writing the same results again adds nothing
        persist_results(&store, &ams, &[result("mysten", "ams", 80)], 1_700_000_000)
            .await
            .unwrap();

        assert_eq!(store.count_results_for(shared.id).await.unwrap(), 3);
        let rendered = render_test_run(&store, Some(&id)).await.unwrap();
        assert!(rendered.contains("Region: ams\nmysten - 80ms\n"));
        assert!(rendered.contains("Region: sin\nacme - 150ms\nmysten - 210ms\n"));
    }

    #[tokio::test]
    async fn render_shows_raw_epoch_for_out_of_range_timestamp() {
        let store = MemoryStore::default();
        let test_run = TestRun {
            id: Uuid::new_v4(),
            timestamp: i64::MAX,
        };
        store.insert_test_run(test_run);
        let rendered = render_test_run(&store, Some(&test_run.id.to_string()))
            .await
            .unwrap();
        assert!(rendered.contains(&format!("(epoch {})", i64::MAX)));
    }

    #[tokio::test]
    async fn render_without_tests() {
        let store = MemoryStore::default();
        assert_eq!(render_test_run(&store, None).await.unwrap(), "No tests found.\n");
    }

    #[test]
    fn results_table_lists_in_given_order() {
        let table = results_table(&[result("fast", "dev", 50), result("slow", "dev", 400)], "dev");
        // Header row plus one row per result
        assert_eq!(table.len(), 3);
        let cell = |row: usize, col: usize| {
            table
                .get_row(row)
                .and_then(|r| r.get_cell(col))
                .map(|c| c.get_content())
                .unwrap()
        };
        assert_eq!(cell(0, 0), "RPC");
        assert_eq!(cell(1, 0), "fast");
        assert_eq!(cell(2, 0), "slow");
        assert_eq!(cell(2, 1), "400");
        assert_eq!(cell(2, 5), "4");
        assert!(table.to_string().contains("RPC latency from dev"));
    }

    #[tokio::test]
    async fn failed_list_fetch_creates_no_test_run() {
        let store = MemoryStore::default();
        let (url, server) = serve_once("503 Service Unavailable", "down").await;
        let prepared = prepare_run(&list_client().unwrap(), &url, Some(&store), None).await;
        assert!(matches!(
            prepared,
            Err(Error::Endpoints(EndpointError::Fetch(RestError::Api { status: 503, .. })))
        ));
        assert!(store.list_test_runs().await.unwrap().is_empty());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn fetched_list_then_creates_test_run() {
        let store = MemoryStore::default();
        let (url, server) = serve_once(
            "200 OK",
            r#"[{"name": "Mysten", "rpc_url": "https://fullnode.mainnet.sui.io"}]"#,
        )
        .await;
        let (endpoints, test_run) = prepare_run(&list_client().unwrap(), &url, Some(&store), None)
            .await
            .unwrap();
        assert_eq!(endpoints.len(), 1);
        let test_run = test_run.unwrap();
        assert_eq!(store.list_test_runs().await.unwrap(), vec![test_run]);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn without_store_no_test_run_is_resolved() {
        let (url, server) = serve_once("200 OK", "[]").await;
        let (endpoints, test_run) =
            prepare_run::<MemoryStore>(&list_client().unwrap(), &url, None, Some("ignored"))
                .await
                .unwrap();
        assert!(endpoints.is_empty());
        assert!(test_run.is_none());
        server.await.unwrap();
    }
}
