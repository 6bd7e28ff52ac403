//! Memory-computation trade-off analysis for the two solver modes.
//!
//! Measures wall-clock time and peak memory as the subspace dimension `k`
//! grows, for the standard (basis-materializing) and memory-priority
//! (basis-regenerating) drivers on a fixed problem.
//!
//! ## Methodology
//!
//! 1.  **Fixed problem**: one matrix file is used for the whole experiment,
//!     so the only independent variable is `k`.
//! 2.  **Statistical sampling**: each data point is measured over `S`
//!     independent samples to absorb scheduling noise.
//! 3.  **Process isolation**: every sample runs in a separate worker
//!     process, keeping the peak-RSS readings of one configuration
//!     uncontaminated by the allocations of another.
//! 4.  **Aggregation**: medians (robust to outliers) and standard
//!     deviations of both time and memory go to the output CSV.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use sgmres_project::utils::data_loader::load_csc;
use sgmres_project::utils::perf::get_peak_rss_kb;
use sgmres_project::{sgmres, LinearOperator, Mode, SgmresParams};
use statrs::statistics::{Data, Distribution, Median};

/// Environment variable used to differentiate orchestrator from worker.
const MODE_ENV_VAR: &str = "SGMRES_TRADEOFF_MODE";

/// The driver mode a worker process executes.
#[derive(ValueEnum, Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum SolverMode {
    Standard,
    MemoryPriority,
}

impl From<SolverMode> for Mode {
    fn from(mode: SolverMode) -> Mode {
        match mode {
            SolverMode::Standard => Mode::Standard,
            SolverMode::MemoryPriority => Mode::MemoryPriority,
        }
    }
}

/// Command-line arguments for the orchestrator process.
#[derive(Parser, Debug)]
#[clap(
    name = "tradeoff-runner",
    about = "Runs the memory-computation trade-off experiment for the sGMRES modes."
)]
struct TradeoffArgs {
    /// Path to the matrix file (ASCII triplets).
    #[clap(long, value_name = "PATH")]
    matrix: PathBuf,
    /// Path to the output CSV file.
    #[clap(long, value_name = "PATH")]
    output: PathBuf,
    /// The starting subspace dimension.
    #[clap(long, default_value_t = 50)]
    k_start: usize,
    /// The final subspace dimension.
    #[clap(long, default_value_t = 500)]
    k_end: usize,
    /// The step size for increasing `k`.
    #[clap(long, default_value_t = 50)]
    k_step: usize,
    /// Arnoldi truncation used by every run.
    #[clap(long, default_value_t = 4)]
    t: usize,
    /// Independent samples per data point.
    #[clap(long, default_value_t = 5)]
    num_samples: u32,
    /// Embedding seed, fixed so both modes see the same sketch.
    #[clap(long, default_value_t = 42)]
    seed: u64,
}

/// Command-line arguments for the isolated worker processes.
#[derive(Parser, Debug)]
struct WorkerArgs {
    #[clap(long)]
    matrix: PathBuf,
    #[clap(long)]
    k: usize,
    #[clap(long, default_value_t = 4)]
    t: usize,
    #[clap(long, default_value_t = 42)]
    seed: u64,
}

/// Data contract for a single sample, passed from worker to orchestrator.
#[derive(Debug, Serialize, Deserialize)]
struct SampleResult {
    mode: SolverMode,
    k: usize,
    time_s: f64,
    rss_kb: u64,
    residual_estimate: f64,
}

/// Aggregated row written to the output CSV.
#[derive(Debug, Serialize)]
struct AggregatedResult {
    mode: SolverMode,
    k: usize,
    time_s_median: f64,
    time_s_stddev: f64,
    rss_kb_median: f64,
    rss_kb_stddev: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logger: {}", e))?;

    if let Ok(mode_str) = std::env::var(MODE_ENV_VAR) {
        let mode = SolverMode::from_str(&mode_str, true)
            .map_err(|_| anyhow!("Invalid mode string in env var: {}", mode_str))?;
        run_worker(mode)
    } else {
        run_orchestrator()
    }
}

/// Orchestrator logic for managing the experiment lifecycle.
fn run_orchestrator() -> Result<()> {
    let args = TradeoffArgs::parse();
    log::info!("Orchestrator starting trade-off experiment...");

    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create CSV writer for {:?}", &args.output))?;

    for k in (args.k_start..=args.k_end).step_by(args.k_step.max(1)) {
        if k == 0 {
            continue;
        }
        log::info!("Processing k = {} with {} samples", k, args.num_samples);

        let mut samples: Vec<SampleResult> = Vec::new();

        for sample_id in 1..=args.num_samples {
            log::info!("--- Sample {}/{} for k = {} ---", sample_id, args.num_samples, k);

            for mode in [SolverMode::Standard, SolverMode::MemoryPriority] {
                let current_exe = std::env::current_exe()?;
                let child = Command::new(current_exe)
                    .arg("--matrix")
                    .arg(&args.matrix)
                    .arg("--k")
                    .arg(k.to_string())
                    .arg("--t")
                    .arg(args.t.to_string())
                    .arg("--seed")
                    .arg(args.seed.to_string())
                    .env(MODE_ENV_VAR, mode.to_possible_value().unwrap().get_name())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit())
                    .spawn()
                    .with_context(|| format!("Failed to spawn worker for mode {:?}", mode))?;

                let output = child.wait_with_output()?;
                if !output.status.success() {
                    log::error!("Worker for {:?} at k={} failed. Skipping sample.", mode, k);
                    continue;
                }

                let mut rdr = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .from_reader(output.stdout.as_slice());
                if let Some(result) = rdr.deserialize::<SampleResult>().next() {
                    samples.push(result?);
                }
            }
        }

        if samples.is_empty() {
            log::warn!("No successful samples for k = {}. Skipping aggregation.", k);
            continue;
        }

        for mode in [SolverMode::Standard, SolverMode::MemoryPriority] {
            let rows: Vec<&SampleResult> = samples.iter().filter(|r| r.mode == mode).collect();
            if rows.is_empty() {
                log::warn!("No data for mode {:?} at k = {}.", mode, k);
                continue;
            }

            let times: Vec<f64> = rows.iter().map(|r| r.time_s).collect();
            let rsss: Vec<f64> = rows.iter().map(|r| r.rss_kb as f64).collect();

            let time_data = Data::new(times);
            let rss_data = Data::new(rsss);

            let time_s_stddev = if time_data.len() > 1 {
                time_data.std_dev().unwrap_or(0.0)
            } else {
                0.0
            };
            let rss_kb_stddev = if rss_data.len() > 1 {
                rss_data.std_dev().unwrap_or(0.0)
            } else {
                0.0
            };

            writer.serialize(&AggregatedResult {
                mode,
                k,
                time_s_median: time_data.median(),
                time_s_stddev,
                rss_kb_median: rss_data.median(),
                rss_kb_stddev,
            })?;
        }
        writer.flush()?;
    }

    log::info!("Trade-off experiment complete. Results saved to {:?}.", &args.output);
    Ok(())
}

/// Worker logic for a single experimental run.
fn run_worker(mode: SolverMode) -> Result<()> {
    let args = WorkerArgs::parse();
    log::info!("Worker for {:?} started for k={}.", mode, args.k);

    let a = load_csc::<f64>(&args.matrix)
        .with_context(|| format!("Failed to load matrix from {:?}", args.matrix))?;
    let n = a.dim();

    let x_true = vec![1.0; n];
    let mut b = vec![0.0; n];
    a.apply(&x_true, &mut b);

    let mut params = SgmresParams::new(args.k, args.t.min(args.k));
    params.mode = mode.into();
    params.seed = Some(args.seed);

    let mut x = vec![0.0; n];
    let start = Instant::now();
    let report = sgmres(&a, &b, &mut x, &params)?;
    let time_s = start.elapsed().as_secs_f64();
    let rss_kb = get_peak_rss_kb();

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(std::io::stdout());
    writer.serialize(SampleResult {
        mode,
        k: args.k,
        time_s,
        rss_kb,
        residual_estimate: report.residual_estimate,
    })?;
    writer.flush()?;

    log::info!("Worker for {:?} at k={} finished.", mode, args.k);
    Ok(())
}
