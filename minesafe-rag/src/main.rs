use anyhow::Context;
use clap::Parser;
use console::style;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose).context("failed to initialise logging")?;

    if let Err(err) = cli::run(cli).await {
        eprintln!("{} {err}", style("error:").red().bold());
        std::process::exit(err.exit_code());
    }
    Ok(())
}

/// `RUST_LOG` wins; otherwise `info`, or `debug` with `-v`. Logs go to stderr
/// so `--json` output on stdout stays parseable.
fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
