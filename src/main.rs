//! readmit - readmission pipeline entry point

use clap::Parser;
use readmit_automl::cli::{run, Cli};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "readmit_automl=info,readmit=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let prefix = cli.command.failure_prefix();

    if let Err(e) = run(cli) {
        tracing::error!(error = %e, "{}", prefix);
        eprintln!("❌ {}: {}", prefix, e);
        std::process::exit(1);
    }
}
