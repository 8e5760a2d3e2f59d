#![deny(clippy::all)]

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use listings_report::analysis;
use listings_report::config::ReportOptions;
use listings_report::error::Error;
use listings_report::readiness::ReadinessPoller;
use listings_report::report::ReportRunner;
use listings_report::store::ListingStore;

fn main() -> ExitCode {
    // diagnostics on stderr; stdout carries only the report itself
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Error> {
    let options = ReportOptions::from_env()?;
    let store = ListingStore::connect(&options)?;

    let poller = ReadinessPoller::new(options.max_attempts, options.interval);
    poller.poll(&store)?;
    info!("primary confirmed, running report on `{}.{}`", options.db, options.collection);

    let runner = ReportRunner::new(&store)?;
    info!("collection holds {} documents", runner.total_listings());

    for section in runner.sections() {
        println!("{}\n", section?);
    }

    for analysis in analysis::run_all(&store)? {
        println!("{analysis}\n");
    }

    Ok(())
}
