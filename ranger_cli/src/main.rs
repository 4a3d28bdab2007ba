mod cli;
mod error_fmt;
mod run;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use error_fmt::{exit_code_for_error, format_error_json, humanize};
use eyre::{Result, WrapErr};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let _ = JSON_MODE.set(json);

    if let Err(e) = real_main(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        tracing::error!(error = %format!("{e:#}"), "command failed");
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> Result<()> {
    let _ = color_eyre::install();

    let cfg = if cli.cmd.needs_config() {
        Some(load_config(&cli.config)?)
    } else {
        None
    };
    init_logging(&cli, cfg.as_ref().map(|c| &c.logging));

    match cli.cmd {
        Commands::Run { frames, target_m } => {
            let cfg = require(cfg)?;
            let shutdown = Arc::new(AtomicBool::new(false));
            let flag = shutdown.clone();
            if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
                tracing::warn!(error = %e, "failed to install Ctrl-C handler");
            }
            let stats = run::run_ranging(&cfg, frames, target_m, cli.json, shutdown)?;
            run::print_summary(&stats, cli.json);
        }
        Commands::Correct {
            mm,
            reverse,
            batch,
            out,
        } => {
            let cfg = require(cfg)?;
            let corrector = ranger_core::conversions::load_corrector(&cfg.correction)?;
            match (batch, out, mm) {
                (Some(input), Some(out), _) => {
                    let table = require_lookup(&corrector)?;
                    let rows = ranger_config::append_converted_column(&input, &out, |d| {
                        table.reverse_lookup(d)
                    })?;
                    if cli.json {
                        println!(
                            "{}",
                            serde_json::json!({ "rows": rows, "out": out.display().to_string() })
                        );
                    } else {
                        println!("Corrected {rows} rows: {}", out.display());
                    }
                }
                (_, _, Some(mm)) if reverse => {
                    reverse_single(require_lookup(&corrector)?, mm, cli.json)?
                }
                (_, _, Some(mm)) => correct_single(&corrector, mm, cli.json),
                _ => eyre::bail!("correct needs --mm or --batch with --out"),
            }
        }
        Commands::CompileTable {
            samples,
            out,
            bin_mm,
            median,
            error_out,
            max_mm,
        } => {
            compile_table(&samples, &out, bin_mm, median, error_out.as_deref(), max_mm, cli.json)?;
        }
        Commands::SelfCheck => {
            let cfg = require(cfg)?;
            let corrector = ranger_core::conversions::load_corrector(&cfg.correction)?;
            let lookup = corrector.lookup_table().map(|t| t.len());
            let error = corrector.error_table().map(|t| t.len());
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "status": "ok",
                        "frame_len": cfg.frame_len(),
                        "lookup_entries": lookup,
                        "error_entries": error,
                    })
                );
            } else {
                println!(
                    "OK: {} samples per frame, lookup table: {}, error table: {}",
                    cfg.frame_len(),
                    lookup.map_or("none".to_string(), |n| format!("{n} entries")),
                    error.map_or("none".to_string(), |n| format!("{n} entries")),
                );
            }
        }
    }
    Ok(())
}

fn require_lookup(
    corrector: &ranger_core::correction::DistanceCorrector,
) -> Result<&ranger_core::correction::CorrectionTable> {
    corrector
        .lookup_table()
        .ok_or_else(|| eyre::eyre!("no lookup table: set correction.lookup_csv in the config"))
}

/// Forward correction; also names the nearest lookup entry.
fn correct_single(corrector: &ranger_core::correction::DistanceCorrector, mm: f32, json: bool) {
    let corrected = corrector.correct(mm);
    let nearest = corrector
        .lookup_table()
        .and_then(|t| t.entry(t.closest_index(mm)).map(|e| (e, t.exact(mm).is_some())));
    if json {
        let nearest = nearest.map(|((position_mm, distance_mm), exact)| {
            serde_json::json!({
                "position_mm": position_mm,
                "distance_mm": distance_mm,
                "exact": exact,
            })
        });
        println!(
            "{}",
            serde_json::json!({ "raw_mm": mm, "corrected_mm": corrected, "nearest_entry": nearest })
        );
    } else {
        match nearest {
            Some(((p, d), true)) => {
                println!("{mm:.3} mm -> {corrected:.3} mm (table entry {p:.2} -> {d:.2})")
            }
            Some(((p, d), false)) => {
                println!("{mm:.3} mm -> {corrected:.3} mm (nearest entry {p:.2} -> {d:.2})")
            }
            None => println!("{mm:.3} mm -> {corrected:.3} mm"),
        }
    }
}

/// Sensor reading to true position; error is reading minus position.
fn reverse_single(table: &ranger_core::correction::CorrectionTable, mm: f32, json: bool) -> Result<()> {
    let position = table
        .reverse_lookup(mm)
        .ok_or_else(|| eyre::eyre!("sensor distance {mm} mm is out of the lookup table's range"))?;
    let error = mm - position;
    if json {
        println!(
            "{}",
            serde_json::json!({
                "sensor_mm": mm,
                "position_mm": position,
                "error_mm": error,
                "offset_mm": table.correction_offset(mm),
            })
        );
    } else {
        println!("Sensor {mm:.2} mm -> true position {position:.2} mm | error {error:.2} mm");
    }
    Ok(())
}

fn require(cfg: Option<ranger_config::Config>) -> Result<ranger_config::Config> {
    cfg.ok_or_else(|| eyre::eyre!("invalid configuration: no config loaded"))
}

/// Read, parse and validate the TOML config; table paths resolve against its directory.
fn load_config(path: &Path) -> Result<ranger_config::Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading config {}", path.display()))?;
    let mut cfg = ranger_config::load_toml(&text)
        .map_err(|e: toml::de::Error| eyre::eyre!("invalid configuration: {}", e.message()))?;
    cfg.validate()?;
    if let Some(dir) = path.parent() {
        cfg.correction.resolve_paths(dir);
    }
    Ok(cfg)
}

fn init_logging(cli: &Cli, logging: Option<&ranger_config::Logging>) {
    let level = logging
        .and_then(|l| l.level.clone())
        .filter(|_| cli.log_level == "info")
        .unwrap_or_else(|| cli.log_level.clone());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info")));

    // Console goes to stderr so stdout carries only reports.
    let console_json = cli.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(false)
    });
    let console_text = (!cli.json).then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    let file_layer = logging.and_then(|l| l.file.as_deref()).map(|file| {
        let path = Path::new(file);
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let name = path.file_name().map_or_else(|| "ranger.log".into(), |n| n.to_owned());
        let appender = match logging.and_then(|l| l.rotation.as_deref()) {
            Some("daily") => tracing_appender::rolling::daily(dir, name),
            Some("hourly") => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        fmt::layer().json().with_ansi(false).with_writer(writer)
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_json)
        .with(console_text)
        .with(file_layer)
        .try_init();
}

fn compile_table(
    samples: &Path,
    out: &Path,
    bin_mm: f32,
    median: bool,
    error_out: Option<&Path>,
    max_mm: usize,
    json: bool,
) -> Result<()> {
    use ranger_config::{BinMethod, ErrorRow, TableRow};

    let rows = ranger_config::load_samples_csv(samples)?;
    let method = if median {
        BinMethod::Median
    } else {
        BinMethod::Average
    };
    let bins = ranger_config::compile_samples(&rows, bin_mm, method)?;
    for b in &bins {
        tracing::debug!(
            position_mm = b.position_mm,
            distance_mm = b.distance_mm,
            count = b.count,
            std_mm = b.std_mm,
            "compiled bin"
        );
    }
    let table: Vec<TableRow> = bins.iter().copied().map(TableRow::from).collect();
    ranger_config::write_lookup_csv(out, &table)?;

    if let Some(path) = error_out {
        let dense = ranger_config::error_table_from_samples(&rows, max_mm);
        let error_rows: Vec<ErrorRow> = dense
            .iter()
            .enumerate()
            .map(|(i, &e)| ErrorRow {
                distance_mm: i as f32,
                error_mm: e,
            })
            .collect();
        ranger_config::write_error_csv(path, &error_rows)?;
    }

    if json {
        println!(
            "{}",
            serde_json::json!({
                "samples": rows.len(),
                "bins": table.len(),
                "out": out.display().to_string(),
            })
        );
    } else {
        println!(
            "Compiled {} samples into {} bins: {}",
            rows.len(),
            table.len(),
            out.display()
        );
    }
    Ok(())
}
