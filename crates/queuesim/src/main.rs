use anyhow::{Context, Result};
use clap::Parser;
use queuesim_core::{expand_itinerary, format_percent, Config, Simulation, SimulationReport};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "queuesim")]
#[command(about = "Queueing-network simulator - drives synthetic load through bounded services")]
struct Args {
    /// Path to configuration file
    #[arg(long, default_value = "config/example.toml")]
    config: PathBuf,

    /// Seed for the load schedule (overrides config)
    #[arg(long)]
    seed: Option<u64>,

    /// Directory the JSON report is written to
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,

    /// Only print the topology and load plan without running
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {:?}", args.config))?;

    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }

    info!(
        "Loaded {} services and {} loads from {:?}",
        config.services.len(),
        config.load.len(),
        args.config
    );

    if args.dry_run {
        print_plan(&config);
        return Ok(());
    }

    let report = Simulation::new(config).run().await?;

    let output_path = write_report(&report, &args.output_dir)?;
    info!("Results written to {}", output_path.display());
    print_summary(&report);

    Ok(())
}

fn write_report(report: &SimulationReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir {:?}", dir))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let output_path = dir.join(format!("run_{}.json", timestamp));
    let report_json = serde_json::to_string_pretty(report)?;
    std::fs::write(&output_path, report_json)
        .with_context(|| format!("Failed to write {:?}", output_path))?;
    Ok(output_path)
}

fn print_plan(config: &Config) {
    println!("\n=== Services ===");
    for (name, service) in &config.services {
        println!(
            "{}: capacity {}, {} workers, request {}ms, response {}ms",
            name,
            service.max_client_conn,
            service.parallel,
            service.request_process_time_ms,
            service.response_process_time_ms
        );
    }

    println!("\n=== Loads ===");
    for (name, load) in &config.load {
        let hops: Vec<String> = expand_itinerary(load)
            .iter()
            .map(|step| format!("{:?}:{}", step.kind, step.target))
            .collect();
        println!("{}: {} clients via [{}]", name, load.count, hops.join(" -> "));
    }

    println!(
        "\nDispatch: {} workers at {} rps, seed {}",
        config.parallel,
        config.rps,
        config
            .seed
            .map_or_else(|| "random".to_string(), |s| s.to_string())
    );

    for (load, target) in config.unknown_targets() {
        println!("warning: load {} routes through unknown node {}", load, target);
    }
    println!();
}

fn print_summary(report: &SimulationReport) {
    println!("\n=== Simulation Summary (seed {}) ===", report.seed);
    println!("Duration: {}ms", report.elapsed_ms);
    for summary in &report.requests {
        println!(
            "{}: generated {}, successful {} ({}), failed {}",
            summary.request,
            summary
                .generated
                .map_or_else(|| "?".to_string(), |g| g.to_string()),
            summary.successful,
            format_percent(summary.successful_percent),
            summary.failed_total()
        );
        for bucket in &summary.failed {
            println!(
                "    dropped at {}: {} ({})",
                bucket.target,
                bucket.count,
                format_percent(bucket.percent)
            );
        }
    }
    println!();
}
