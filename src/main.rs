use clap::Parser;
use suinfra::commands::{self, Cli};
use suinfra::configuration::Settings;

#[tokio::main]
async fn main() {
    // Parse arguments first so --help works without any configuration
    let cli = Cli::parse();
    suinfra::telemetry::init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> suinfra::error::Result<()> {
    // Load configuration
    let settings = Settings::from_configuration()?;
    // Run command
    commands::run(&cli.command, &settings).await
}
