use crate::commands::BenchmarkRpcArgs;
use crate::configuration::Settings;
use crate::error::{DispatchError, Error, Result};
use crate::fleet::{dispatch, DispatchPlan, FlyMachinesClient, LaunchAck, MachineLauncher, VmSpec};
use crate::results::TestRun;
use crate::store::{PgStore, ResultStore};
use crate::utilities::confirm;
use std::future::Future;
use std::io;
use uuid::Uuid;

pub async fn rpc(settings: &Settings, args: &BenchmarkRpcArgs) -> Result<()> {
    let image = args
        .image_id
        .clone()
        .unwrap_or_else(|| settings.fly_image_id.clone());
    let vm = VmSpec {
        cpus: args.vm_cpus,
        cpu_kind: args.vm_kind.clone(),
        memory_mb: args.vm_memory,
    };
    let store = PgStore::connect(&settings.database()).await?;
    let launcher = FlyMachinesClient::new(&settings.fly_auth_token)?;

    let skip_prompt = args.yes;
    let dispatched = run_benchmark(&store, &launcher, &image, args.iterations, vm, |test_id| {
        ask_to_start(test_id, skip_prompt)
    })
    .await?;

    match dispatched {
        Some((test_run, acks)) => {
            for ack in acks.iter() {
                match &ack.outcome {
                    Ok(machine) => println!("{}: {}", ack.region, machine),
                    Err(e) => println!("{}: failed: {}", ack.region, e),
                }
            }
            let launched = acks.iter().filter(|a| a.outcome.is_ok()).count();
            println!(
                "Launched {}/{} workers for test {}.",
                launched,
                acks.len(),
                test_run.id
            );
        }
        None => println!("Aborted."),
    }
    Ok(())
}

/// Prompt on stdin from the blocking pool so the runtime keeps running.
async fn ask_to_start(test_id: Uuid, skip_prompt: bool) -> io::Result<bool> {
    if skip_prompt {
        return Ok(true);
    }
    let prompt = format!("Test ID: {}. Start the test?", test_id);
    tokio::task::spawn_blocking(move || confirm(&prompt)).await?
}

/// Create the shared test run and fan out to every region. A declined confirmation removes the
/// test run again and yields `None`. A failed prompt removes it too and is returned as an error.
pub async fn run_benchmark<S, L, C, F>(
    store: &S,
    launcher: &L,
    image: &str,
    iterations: usize,
    vm: VmSpec,
    confirm: C,
) -> Result<Option<(TestRun, Vec<LaunchAck>)>>
where
    S: ResultStore + ?Sized,
    L: MachineLauncher + ?Sized,
    C: FnOnce(Uuid) -> F,
    F: Future<Output = io::Result<bool>>,
{
    if image.trim().is_empty() {
        return Err(Error::InvalidArgument("Image ID is required.".to_string()));
    }

    let test_run = store.create_test_run().await?;
    let confirmed = match confirm(test_run.id).await {
        Ok(confirmed) => confirmed,
        Err(e) => {
            store.delete_test_run(test_run.id).await?;
            return Err(e.into());
        }
    };
    let plan = DispatchPlan::new(test_run.id, image, iterations, vm);
    match dispatch(launcher, &plan, |_: &DispatchPlan| confirmed).await {
        Ok(acks) => Ok(Some((test_run, acks))),
        Err(DispatchError::NotConfirmed) => {
            store.delete_test_run(test_run.id).await?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
