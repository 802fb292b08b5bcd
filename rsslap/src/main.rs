mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use rsslap::driver::{PostgresDriver, PrintDriver};
use rsslap::{Driver, Orchestrator, TaskSpec};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rsslap=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let driver = PostgresDriver::from_url(&args.url).context("URL parsing error")?;
    let spec = args.task_spec(driver.database())?;

    if args.only_print {
        run(spec, PrintDriver::new()).await
    } else {
        run(spec, driver).await
    }
}

async fn run<D: Driver>(spec: TaskSpec, driver: D) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(spec, driver);

    let cancel = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping agents");
            cancel.cancel();
        }
    });

    let stats = orchestrator.run().await?;
    println!("{stats}");
    Ok(())
}
