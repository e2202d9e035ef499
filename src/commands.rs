use crate::configuration::Settings;
use crate::endpoints::DEFAULT_RPCS_JSON_URL;
use crate::error::Result;
use clap::{Args, Parser, Subcommand};

pub mod benchmark;
pub mod rpc;

#[derive(Debug, Parser)]
#[clap(
    name = "suinfra",
    version,
    about = "Measure and rank Sui RPC endpoint latency from many regions"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// RPC endpoint latency tests
    Rpc {
        #[clap(subcommand)]
        command: RpcCommand,
    },
    /// Run tests in every Fly region
    Benchmark {
        #[clap(subcommand)]
        command: BenchmarkCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum RpcCommand {
    /// Fetch the list of current RPC endpoints
    Fetch {
        /// URL pointing to an rpcs.json file
        #[clap(default_value = DEFAULT_RPCS_JSON_URL)]
        url: String,
    },
    /// Ping all RPC nodes concurrently
    Ping(PingArgs),
    /// Clean up test runs with no associated results
    Cleanup,
    /// Show the results of a test run by region
    Tests {
        /// Test ID to show, defaults to the most recent test
        #[clap(long)]
        test_id: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct PingArgs {
    /// Number of times to ping each RPC URL
    #[clap(long, default_value_t = 10)]
    pub iterations: usize,
    /// Time to sleep in ms between pings
    #[clap(long, default_value_t = 1000)]
    pub sleep: u64,
    /// Timeout in seconds for the whole ping test
    #[clap(long, default_value_t = 120)]
    pub timeout: u64,
    /// Test ID to report results into
    #[clap(long)]
    pub test_id: Option<String>,
    /// Write results to the database
    #[clap(long)]
    pub write_to_db: bool,
    /// URL pointing to an RPCs JSON file
    #[clap(long, default_value = DEFAULT_RPCS_JSON_URL)]
    pub rpcs_json_url: String,
}

#[derive(Debug, Subcommand)]
pub enum BenchmarkCommand {
    /// Run an rpc ping test in every Fly region
    Rpc(BenchmarkRpcArgs),
}

#[derive(Debug, Args)]
pub struct BenchmarkRpcArgs {
    /// Fly image ID, defaults to FLY_IMAGE_ID
    pub image_id: Option<String>,
    /// Number of iterations
    #[clap(long, default_value_t = 30)]
    pub iterations: usize,
    /// Number of CPUs
    #[clap(long, default_value_t = 2)]
    pub vm_cpus: u32,
    /// CPU kind (shared or performance)
    #[clap(long, default_value = "shared")]
    pub vm_kind: String,
    /// Memory in MB
    #[clap(long, default_value_t = 1024)]
    pub vm_memory: u32,
    /// Skip the confirmation prompt
    #[clap(long)]
    pub yes: bool,
}

pub async fn run(command: &Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Rpc { command } => match command {
            RpcCommand::Fetch { url } => rpc::fetch(url).await,
            RpcCommand::Ping(args) => rpc::ping(settings, args).await,
            RpcCommand::Cleanup => rpc::cleanup(settings).await,
            RpcCommand::Tests { test_id } => rpc::tests(settings, test_id.as_deref()).await,
        },
        Command::Benchmark { command } => match command {
            BenchmarkCommand::Rpc(args) => benchmark::rpc(settings, args).await,
        },
    }
}
