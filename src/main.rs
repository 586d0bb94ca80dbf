use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use pdfstitch::cli::{self, Cli};
use pdfstitch::output::OutputFormatter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over the -v/-q defaults.
    let default_level = if cli.verbose {
        "pdfstitch=debug"
    } else if cli.quiet {
        "pdfstitch=error"
    } else {
        "pdfstitch=warn"
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let out = OutputFormatter::new(cli.quiet, cli.verbose);
    match cli::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            out.error(&err.to_string());
            ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}
