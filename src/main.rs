use clap::Parser;
use serde::Serialize;
use std::process::ExitCode;
use venue_harvest::sink::ResultSink;
use venue_harvest::{BatchRequest, HarvestConfig, Harvester, JsonFileSink};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => match HarvestConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                ::log::error!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => HarvestConfig::default(),
    }
    .with_env_overrides();

    let sink = match JsonFileSink::open(&args.output).await {
        Ok(sink) => sink,
        Err(e) => {
            ::log::error!("Cannot use {} for output: {}", args.output.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut harvester = Harvester::new(config);
    if args.no_render {
        harvester = harvester.without_render();
    } else {
        ::log::info!(
            "Rendering through WebDriver at {} (set WEBDRIVER_URL to change)",
            harvester.config().webdriver_url
        );
    }

    if args.catalog {
        return run_catalog(&harvester, &sink).await;
    }

    let max_regions = args
        .max_regions
        .unwrap_or(harvester.config().regions_per_call);
    let request = BatchRequest::new(args.start_index, max_regions);
    let started = std::time::Instant::now();
    ::log::info!(
        "Scraping up to {} regions from index {}",
        max_regions,
        args.start_index
    );

    let report = harvester.run(request, &sink).await;
    ::log::info!(
        "Batch {} done in {:.2} seconds",
        report.batch_info.current_batch,
        started.elapsed().as_secs_f64()
    );
    print_report(&report, report.success)
}

async fn run_catalog(harvester: &Harvester, sink: &dyn ResultSink) -> ExitCode {
    let listings = match harvester.harvest_catalog().await {
        Ok(listings) => listings,
        Err(e) => {
            ::log::error!("Catalog fetch failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let report = harvester.persist_catalog(listings, sink).await;
    ::log::info!(
        "Stored {} of {} catalog venues",
        report.stored,
        report.venues_scraped
    );
    print_report(&report, report.success)
}

/// Print a report as JSON; the exit code follows `success`
fn print_report<T: Serialize>(report: &T, success: bool) -> ExitCode {
    match serde_json::to_string_pretty(report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            ::log::error!("Could not serialize report: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
