//! Core B entry point: loads Core A's output ensemble, precomputes
//! detection probabilities, and runs the simulated-annealing search for a
//! high-value sampling pattern, writing the objective trace to disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use spatial_epidemic::anneal::{run_anneal, AnnealParams};
use spatial_epidemic::config::{AnnealConfig, RawConfig};
use spatial_epidemic::detection::{calc_prob_detect, DetectionParams};
use spatial_epidemic::ensemble::load_ensemble;
use spatial_epidemic::objective::{ObjFuncType, PDetectTable};
use spatial_epidemic::rng::Rng;

/// Runs the simulated-annealing sampling-pattern optimiser.
#[derive(Parser)]
struct Cli {
    #[arg(trailing_var_arg = true)]
    overrides: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "sampling-anneal failed");
            ExitCode::FAILURE
        }
    }
}

fn obj_func_type_from(code: i64) -> Result<ObjFuncType> {
    match code {
        0 => Ok(ObjFuncType::ProbAnyDetection),
        1 => Ok(ObjFuncType::BernoulliSample),
        2 => Ok(ObjFuncType::ExpectedFinds),
        other => Err(anyhow::anyhow!("unknown objFuncType {other}")),
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let exe = std::env::args().next().unwrap_or_else(|| "sampling-anneal".to_string());
    let cfg_path = spatial_epidemic::config::cfg_path_for_binary(&exe);
    let raw = RawConfig::load(&cfg_path, &cli.overrides).context("loading configuration")?;
    let cfg = AnnealConfig::from_raw(&raw).context("parsing configuration")?;

    info!(input_directory = %cfg.input_directory, "loading ensemble");
    let ensemble = load_ensemble(Path::new(&cfg.input_directory), &cfg.out_stub, cfg.num_its)
        .context("loading simulation ensemble")?;
    info!(num_hosts = ensemble.num_hosts(), num_runs = ensemble.num_runs(), "ensemble loaded");

    let detection_params = DetectionParams {
        true_min_flag: cfg.true_min_flag,
        within_cell_min: cfg.within_cell_min,
        within_cell_bulk_up: cfg.within_cell_bulk_up,
        test_sens: cfg.test_sens,
        det_lag: cfg.det_lag,
        samples_per_site: cfg.samples_per_site,
        delta: cfg.delta,
    };
    let per_run: Vec<Vec<f64>> = ensemble.runs.iter().map(|run| calc_prob_detect(run, &detection_params)).collect();
    let p_detect = PDetectTable { per_run };
    info!("detection probabilities computed");

    let anneal_params = AnnealParams {
        num_sites: cfg.num_sites,
        allow_duplicates: cfg.allow_duplicates,
        cool: cfg.cool,
        alpha: cfg.alpha,
        simann_n: cfg.simann_n,
        obj_func: obj_func_type_from(cfg.obj_func_type)?,
    };

    let mut rng = Rng::seed_from_entropy();
    let trace = run_anneal(&ensemble, &p_detect, &anneal_params, &mut rng);

    let file = File::create(&cfg.obj_func_out)?;
    let mut w = BufWriter::new(file);
    for step in &trace {
        write!(w, "{} {:.4}", step.iteration, step.obj_value)?;
        for host in &step.pattern {
            write!(w, " {host}")?;
        }
        writeln!(w)?;
    }

    info!(final_obj = trace.last().map(|t| t.obj_value).unwrap_or(0.0), "annealing complete");
    Ok(())
}
