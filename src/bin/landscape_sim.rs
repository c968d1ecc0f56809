//! Core A entry point: runs `num_its` independent landscape epidemics and
//! writes their output files alongside the ensemble summary files Core B
//! reads back.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use spatial_epidemic::bulkup::{incidence_at, logistic_j};
use spatial_epidemic::config::{Config, RawConfig};
use spatial_epidemic::dispersal::Dispersal;
use spatial_epidemic::epidemic::{run_epidemic, EpidemicParams, EpidemicTrace};
use spatial_epidemic::landscape::{read_landscape, Landscape};
use spatial_epidemic::output::{
    append_end_time, write_end_reason, write_end_time, write_last_run_number, write_reporting_ticks, write_run_records,
};
use spatial_epidemic::primary::PrimaryPressure;
use spatial_epidemic::rng::Rng;

/// Runs the landscape-scale stochastic epidemic simulator.
///
/// Accepts arbitrary `key=value` tokens that override the matching key
/// in `landscape-sim.cfg`, mirroring the original's positional argv scan
/// rather than GNU-style flags.
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
            error!(error = %err, "landscape-sim failed");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let exe = std::env::args().next().unwrap_or_else(|| "landscape-sim".to_string());
    let cfg_path = spatial_epidemic::config::cfg_path_for_binary(&exe);
    let raw = RawConfig::load(&cfg_path, &cli.overrides).context("loading configuration")?;
    let cfg = Config::from_raw(&raw).context("parsing configuration")?;

    info!(out_stub = %cfg.out_stub, num_its = cfg.num_its, "starting landscape-sim");

    let mut landscape = read_landscape(
        Path::new(&cfg.file_prop_full),
        Path::new(&cfg.file_rel_inf),
        Path::new(&cfg.file_rel_pri),
        Path::new(&cfg.file_rel_sus),
        cfg.cell_thresh,
    )
    .context("reading landscape rasters")?;

    write_active_landscape(&cfg.out_stub, &landscape).context("writing activeLandscape.txt")?;

    let primary_pressure = PrimaryPressure::setup(&landscape);
    let (dispersal, rate_scale) = Dispersal::setup(&landscape, cfg.disp_scale);
    let rate_sec_inf = cfg.rate_sec_inf * rate_scale;

    let params = EpidemicParams {
        rate_pri_inf: cfg.rate_pri_inf,
        rate_sec_inf,
        max_time: cfg.max_time,
        max_incidence: cfg.max_incidence,
        report_time: cfg.report_time,
        within_cell_min: cfg.within_cell_min,
        within_cell_bulk_up: cfg.within_cell_bulk_up,
        true_min_flag: cfg.true_min_flag,
    };

    let mut rng = Rng::seed_from_entropy();
    let end_times_path = PathBuf::from(format!("{}_endTimes.txt", cfg.out_stub));

    for i in 0..cfg.num_its {
        landscape.reset_run_state();
        let trace = run_epidemic(&mut landscape, &primary_pressure, &dispersal, &params, &mut rng)
            .with_context(|| format!("running iteration {i}"))?;

        info!(
            iteration = i,
            num_infected = trace.infected.len(),
            end_time = trace.end_time,
            end_reason = trace.end_reason,
            "iteration finished"
        );
        tracing::debug!(stats = ?trace.stats, "run stats");

        let cumulative_fractions = cumulative_incidence_fractions(&landscape, &trace, &params);
        write_run_records(
            &PathBuf::from(format!("{}_{}.txt", cfg.out_stub, i)),
            &landscape,
            &trace,
            &params,
            &cumulative_fractions,
        )?;
        write_reporting_ticks(&PathBuf::from(format!("{}_dpc_{}.txt", cfg.out_stub, i)), &trace)?;
        write_end_time(&PathBuf::from(format!("endTime_{i}.txt")), &trace)?;
        write_end_reason(&PathBuf::from(format!("endReason_{i}.txt")), &trace)?;
        append_end_time(&end_times_path, &trace)?;
        write_last_run_number(Path::new("lastRunNumber.txt"), i + 1)?;
    }

    Ok(())
}

/// The landscape-wide incidence fraction at the instant each cell `j` was
/// infected: `Σ_{k infected no later than j} getIncidence(tInf[j], cell_k)
/// / totalFull`, matching `landscapeScaleModel.c:1505-1509`. Quadratic in
/// the number of infected cells, same as the original's nested loop.
fn cumulative_incidence_fractions(landscape: &Landscape, trace: &EpidemicTrace, params: &EpidemicParams) -> Vec<f64> {
    // `trace.infected` is already in infection order (the invariant in
    // spec.md §3), so "cells infected no later than j" is just a prefix.
    (0..trace.infected.len())
        .map(|j| {
            let t_inf_j = landscape.cells[trace.infected[j]]
                .t_inf
                .expect("infected cells have t_inf");
            let sum: f64 = trace.infected[..=j]
                .iter()
                .map(|&cell_k| {
                    let cell = &landscape.cells[cell_k];
                    let t_inf_k = cell.t_inf.expect("infected cells have t_inf");
                    let j_param = logistic_j(params.true_min_flag, params.within_cell_min, cell.prop_full);
                    incidence_at(cell.prop_full, j_param, params.within_cell_bulk_up, t_inf_j - t_inf_k)
                })
                .sum();
            sum / landscape.total_full
        })
        .collect()
}

fn write_active_landscape(out_stub: &str, landscape: &spatial_epidemic::landscape::Landscape) -> Result<()> {
    use std::fs::File;
    use std::io::{BufWriter, Write};

    let dir = Path::new(out_stub).parent().unwrap_or_else(|| Path::new("."));
    let path = dir.join("activeLandscape.txt");
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for cell in &landscape.cells {
        writeln!(w, "{} {} {}", cell.x, cell.y, cell.prop_full)?;
    }
    Ok(())
}
