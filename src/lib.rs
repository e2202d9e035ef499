//! Latency benchmarking for Sui RPC endpoints.
//!
//! A run fetches the published endpoint list, samples every endpoint concurrently from the
//! local region and ranks them by average latency. The same run can be fanned out to workers in
//! every Fly region, all reporting into one shared test run in Postgres.

pub mod commands;
pub mod configuration;
pub mod endpoints;
pub mod error;
pub mod fleet;
pub mod orchestrator;
pub mod probe;
pub mod results;
pub mod sampler;
pub mod stats;
pub mod store;
pub mod telemetry;
#[cfg(test)]
mod test_support;
pub mod utilities;
