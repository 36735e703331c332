//! Water Data Acquisition Engine - Run Driver
//!
//! Executes one acquisition run described by run.toml:
//! 1. Discovers stations inside the boundary polygon per provider
//! 2. Fetches observations concurrently under per-provider rate limits
//! 3. Normalizes everything into the common observation schema
//! 4. Prints the run summary and optionally exports per-station CSVs
//!
//! Usage:
//!   cargo run --release                          # Use ./run.toml
//!   cargo run --release -- --config myrun.toml   # Alternate configuration
//!   cargo run --release -- --out data/           # Export series as CSV
//!
//! Environment:
//!   RUST_LOG - tracing filter, e.g. RUST_LOG=waterhub_service=debug

use std::env;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use waterhub_service::config::RunConfig;
use waterhub_service::engine::{Engine, EngineReport};
use waterhub_service::model::{CancelToken, ProgressEvent, ProgressKind};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("💧 Water Data Acquisition Engine");
    println!("================================\n");

    // Parse command-line arguments
    let args: Vec<String> = env::args().collect();
    let mut config_path = PathBuf::from("run.toml");
    let mut out_dir: Option<PathBuf> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                if i + 1 < args.len() {
                    config_path = PathBuf::from(&args[i + 1]);
                    i += 2;
                } else {
                    eprintln!("Error: --config requires a path");
                    std::process::exit(1);
                }
            }
            "--out" => {
                if i + 1 < args.len() {
                    out_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 2;
                } else {
                    eprintln!("Error: --out requires a directory");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                eprintln!("Usage: {} [--config PATH] [--out DIR]", args[0]);
                std::process::exit(1);
            }
        }
    }

    println!("📋 Loading {}...", config_path.display());
    let config = match RunConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("\n❌ Configuration error: {}\n", e);
            std::process::exit(1);
        }
    };
    println!(
        "   Range {} to {}, {:?} units",
        config.run.start_date, config.run.end_date, config.run.units
    );

    let engine = match Engine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("\n❌ Initialization failed: {}\n", e);
            std::process::exit(1);
        }
    };

    // Live per-task status on a dedicated thread; the channel closes when
    // the run finishes.
    let (progress_tx, progress_rx) = mpsc::channel::<ProgressEvent>();
    let printer = std::thread::spawn(move || {
        for event in progress_rx {
            match event.kind {
                ProgressKind::Succeeded { records } => println!(
                    "   ✓ {} {} {} - {} records",
                    event.provider, event.station_id, event.parameter_code, records
                ),
                ProgressKind::Failed { reason } => eprintln!(
                    "   ✗ {} {} {} - {}",
                    event.provider, event.station_id, event.parameter_code, reason
                ),
                ProgressKind::Skipped => println!(
                    "   - {} {} {} - skipped",
                    event.provider, event.station_id, event.parameter_code
                ),
            }
        }
    });

    println!("\n🔎 Discovering stations and fetching observations...\n");
    let cancel = CancelToken::new();
    let report = engine.run(&cancel, Some(progress_tx));
    let _ = printer.join();

    print_report(&report);

    if let Some(dir) = out_dir {
        if let Err(e) = export_series(&report, &dir) {
            eprintln!("\n❌ Export failed: {}", e);
            std::process::exit(1);
        }
        println!("\n💾 Series written to {}", dir.display());
    }

    if report.output.summary.partial {
        std::process::exit(2);
    }
}

fn print_report(report: &EngineReport) {
    println!("\n📊 Discovery:");
    for note in &report.discovery {
        match &note.error {
            Some(reason) => println!("   ✗ {} - discovery failed: {}", note.provider, reason),
            None => println!(
                "   ✓ {} - {} stations ({} excluded without coordinates)",
                note.provider, note.stations, note.missing_coordinates
            ),
        }
    }

    let summary = &report.output.summary;
    println!("\n📊 Run summary:");
    println!(
        "   {} attempted, {} succeeded, {} failed, {} skipped",
        summary.attempted, summary.succeeded, summary.failed, summary.skipped
    );
    for (provider, counts) in &summary.per_provider {
        println!(
            "   {} - {} succeeded, {} failed, {} skipped",
            provider, counts.succeeded, counts.failed, counts.skipped
        );
    }
    println!(
        "   {} records in {} combined parameter series, {:.1}s",
        summary.total_records,
        report.output.series.len(),
        summary.elapsed.as_secs_f64()
    );

    if !summary.failures.is_empty() {
        println!("\n⚠️  Failed tasks:");
        for failure in &summary.failures {
            println!(
                "   {} {} {} - {}",
                failure.provider, failure.station_id, failure.parameter_code, failure.reason
            );
        }
    }
    if summary.partial {
        println!("\n⚠️  Partial run - output covers only the tasks that succeeded");
    }
}

/// Writes one CSV per combined parameter series into `dir`, file name
/// derived from the parameter code with path-hostile characters replaced.
fn export_series(report: &EngineReport, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    for (parameter, records) in &report.output.series {
        let safe: String = parameter
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let mut writer = csv::Writer::from_path(dir.join(format!("{}.csv", safe)))?;
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }
    Ok(())
}
