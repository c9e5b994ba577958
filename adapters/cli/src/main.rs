#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line host that applies the woodgrain effect to gcode files.

mod report;
mod settings;

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueHint};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};
use woodgrain_core::{Progress, WoodgrainConfig};
use woodgrain_system_rewriter::{OutputDocument, RunStatus, Woodgrain, WoodgrainError};

use crate::{
    report::RunReport,
    settings::{default_config_toml, resolve_config, ConfigOverrides},
};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    name = "woodgrain",
    version,
    about = "Imprints a woodgrain pattern onto sliced gcode"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rewrite a gcode file with woodgrain temperatures and wall feedrates
    Apply(ApplyArgs),

    /// Print the default configuration as TOML
    DefaultConfig,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Sliced gcode to rewrite
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Destination for the rewritten gcode; defaults to standard output
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Write a JSON summary of every layer to this path
    #[arg(long, value_hint = ValueHint::FilePath)]
    report: Option<PathBuf>,

    /// Omit the generation time from the output header
    #[arg(long)]
    no_timestamp: bool,

    #[command(flatten)]
    overrides: ConfigOverrides,
}

/// Entry point for the woodgrain command-line interface.
fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Apply(args) => run_apply(&args),
        Command::DefaultConfig => {
            print!("{}", default_config_toml()?);
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn run_apply(args: &ApplyArgs) -> Result<()> {
    let config = resolve_config(args.config.as_deref(), &args.overrides)?;
    let input = fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read gcode from {}", args.input.display()))?;
    let input_lines = input.lines().count();

    let output = rewrite_on_worker(config.clone(), &input, !args.no_timestamp)
        .with_context(|| format!("failed to woodify {}", args.input.display()))?;

    for warning in output.warnings() {
        debug!(%warning, "parse warning");
    }
    if output.status() == RunStatus::PassThrough {
        info!("input already carries a woodgrain pass; copied unchanged");
    }

    write_output(args.output.as_deref(), &output)?;

    if let Some(path) = &args.report {
        RunReport::new(&config, input_lines, &output).write(path)?;
        info!(path = %path.display(), "wrote run report");
    }

    info!(
        layers = output.layers().len(),
        warnings = output.warnings().len(),
        "done"
    );
    Ok(())
}

/// Runs the rewrite on a worker thread while the calling thread reports progress.
fn rewrite_on_worker(
    config: WoodgrainConfig,
    input: &str,
    timestamp: bool,
) -> Result<OutputDocument> {
    let progress = Progress::new();

    let outcome = thread::scope(|scope| {
        let worker = scope.spawn(|| -> Result<OutputDocument, WoodgrainError> {
            let mut run = Woodgrain::new(config)?;
            if timestamp {
                run = run.generated_on(chrono::Local::now().naive_local());
            }
            run.with_progress(&progress).run(&[input])
        });

        let mut reported_decile = 0;
        while !worker.is_finished() {
            let decile = (progress.fraction() * 10.0) as usize;
            if decile > reported_decile {
                reported_decile = decile;
                info!(percent = decile * 10, "rewriting");
            }
            thread::sleep(POLL_INTERVAL);
        }
        worker.join()
    });

    let document = outcome.map_err(|_| anyhow!("rewrite worker panicked"))??;
    Ok(document)
}

fn write_output(path: Option<&Path>, output: &OutputDocument) -> Result<()> {
    let rendered = output.render();
    match path {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("failed to write gcode to {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .and_then(|()| stdout.flush())
                .context("failed to write gcode to standard output")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_arguments_parse() {
        let cli = Cli::try_parse_from([
            "woodgrain",
            "apply",
            "part.gcode",
            "-o",
            "part.wood.gcode",
            "--seed",
            "7",
            "--scan-for-zhop",
            "0",
            "--no-timestamp",
        ])
        .expect("arguments parse");

        let Command::Apply(args) = cli.command else {
            panic!("expected the apply subcommand");
        };
        assert_eq!(args.input, PathBuf::from("part.gcode"));
        assert_eq!(args.output, Some(PathBuf::from("part.wood.gcode")));
        assert!(args.no_timestamp);
        assert_eq!(args.overrides.seed, Some(7));
        assert_eq!(args.overrides.scan_for_zhop, Some(0));
        assert_eq!(args.overrides.avg_temp, None);
    }

    #[test]
    fn worker_produces_the_rewritten_document() {
        let config = WoodgrainConfig {
            scan_for_zhop_lines: 0,
            ..WoodgrainConfig::default()
        };
        let input = "G28\nG1 Z0.2\nG1 X1 Y1 E1\n";
        let document = rewrite_on_worker(config, input, false).expect("worker succeeds");
        assert_eq!(document.lines()[0], ";woodified gcode");
        assert_eq!(document.layers().len(), 1);
    }

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("woodgrain_cli_{}_{name}", std::process::id()))
    }

    #[test]
    fn apply_rewrites_a_file_with_configuration_and_flags() {
        let input = temp_path("part.gcode");
        let config = temp_path("settings.toml");
        let output = temp_path("part.wood.gcode");
        let report = temp_path("report.json");
        fs::write(
            &input,
            "G28\r\nG1 Z0.2 F1200\r\nG1 X10 Y10 E1\r\nG1 Z0.4\r\nG1 X10 Y20 E2\r\n",
        )
        .expect("input written");
        fs::write(
            &config,
            "seed = 7\ntemp_command = \"M109\"\nscan_for_zhop_lines = 0\n",
        )
        .expect("config written");

        let args = ApplyArgs {
            input: input.clone(),
            output: Some(output.clone()),
            config: Some(config.clone()),
            report: Some(report.clone()),
            no_timestamp: true,
            overrides: ConfigOverrides {
                avg_temp: Some(215.0),
                ..ConfigOverrides::default()
            },
        };
        run_apply(&args).expect("apply succeeds");

        let written = fs::read_to_string(&output).expect("output readable");
        let json = fs::read_to_string(&report).expect("report readable");
        for path in [&input, &config, &output, &report] {
            let _ = fs::remove_file(path);
        }

        assert!(written.starts_with(";woodified gcode\r\nM109 S210\r\nM116\r\nG28\r\n"));
        assert!(written.contains("avg=215C variation=20C"));
        assert!(written.contains("seed=7 layers=2\r\n"));
        assert!(!written.replace("\r\n", "").contains('\n'));

        let report: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(report["status"], "woodified");
        assert_eq!(report["input_lines"], 5);
        assert_eq!(report["config"]["seed"], 7);
        assert_eq!(report["config"]["avg_temp"], 215.0);
        assert_eq!(report["config"]["temp_command"], "M109");
        assert_eq!(report["layers"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn missing_configuration_file_is_reported() {
        let path = temp_path("absent.toml");
        let error = resolve_config(Some(&path), &ConfigOverrides::default())
            .expect_err("missing file fails");
        assert!(error.to_string().contains("failed to read configuration"));
    }

    #[test]
    fn worker_errors_are_propagated() {
        let error = rewrite_on_worker(WoodgrainConfig::default(), "", false)
            .expect_err("empty input fails");
        assert!(error.to_string().contains("input is empty"));
    }
}
