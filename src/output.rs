//! Per-run output writers for Core A (§6): the infected-cell record file,
//! the reporting-tick file, and the small one-value end-time/end-reason
//! files, plus the cross-run `endTimes.txt` / `lastRunNumber.txt` summary.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::bulkup::{incidence_at, logistic_j};
use crate::epidemic::{EpidemicParams, EpidemicTrace};
use crate::error::SimResult;
use crate::landscape::{InfectionSource, Landscape};

/// Writes `<out_stub>_<i>.txt`: one line per infected cell, in the order
/// cells were infected, matching the field order in spec.md §6.
///
/// Fields: `x y t_inf inf_type source_x source_y prop_full rel_inf rel_sus
/// rel_pri rank rank/num_cells cell_id cumulative_incidence_fraction
/// final_incidence_fraction`. `source_x`/`source_y` are `-1` for primary
/// infections, matching the original's sentinel (there is no Rust-side
/// `Option` here: this is the literal wire format Core B's ensemble
/// loader parses by position). `rank` is 1-based, matching
/// `landscapeScaleModel.c:1521-1522`. `final_incidence_fraction` is each
/// cell's own within-cell incidence fraction at the run's end time
/// (`landscapeScaleModel.c:1504`), not the landscape-wide figure.
pub fn write_run_records(
    path: &Path,
    landscape: &Landscape,
    trace: &EpidemicTrace,
    params: &EpidemicParams,
    cumulative_fractions: &[f64],
) -> SimResult<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    let num_cells = landscape.num_cells();

    for (rank, &cell_id) in trace.infected.iter().enumerate() {
        let cell = &landscape.cells[cell_id];
        let (inf_type, source_x, source_y) = match cell.inf_by {
            InfectionSource::None => (0, -1i64, -1i64),
            InfectionSource::Primary => (0, -1, -1),
            InfectionSource::Secondary(src) => {
                let src_cell = &landscape.cells[src];
                (1, src_cell.x, src_cell.y)
            }
        };
        let t_inf = cell.t_inf.unwrap_or(-1.0);
        let cum_frac = cumulative_fractions.get(rank).copied().unwrap_or(0.0);
        let j = logistic_j(params.true_min_flag, params.within_cell_min, cell.prop_full);
        let this_final_incidence =
            incidence_at(cell.prop_full, j, params.within_cell_bulk_up, trace.end_time - t_inf) / cell.prop_full;

        writeln!(
            w,
            "{} {} {} {} {} {} {} {} {} {} {} {} {} {} {}",
            cell.x,
            cell.y,
            t_inf,
            inf_type,
            source_x,
            source_y,
            cell.prop_full,
            cell.rel_inf,
            cell.rel_sus,
            cell.rel_pri,
            rank + 1,
            (rank + 1) as f64 / num_cells as f64,
            cell_id,
            cum_frac,
            this_final_incidence,
        )?;
    }
    Ok(())
}

/// Writes `<out_stub>_dpc_<i>.txt`: the disease-progress-curve reporting
/// ticks, one per `report_time` interval.
pub fn write_reporting_ticks(path: &Path, trace: &EpidemicTrace) -> SimResult<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    for tick in &trace.reports {
        writeln!(
            w,
            "{} {} {} {}",
            tick.t, tick.num_infected, tick.frac_infected, tick.frac_full_infected
        )?;
    }
    Ok(())
}

/// Writes `endTime_<i>.txt`: a single number, the run's end time.
pub fn write_end_time(path: &Path, trace: &EpidemicTrace) -> SimResult<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{}", trace.end_time)?;
    Ok(())
}

/// Writes `endReason_<i>.txt`: a single number, `0` (max_time reached) or
/// `1` (incidence threshold reached).
pub fn write_end_reason(path: &Path, trace: &EpidemicTrace) -> SimResult<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{}", trace.end_reason)?;
    Ok(())
}

/// Appends one `end_time` to the shared `endTimes.txt`, one line per
/// iteration completed so far, matching the original's incremental
/// append-as-you-go rather than a single end-of-run flush (so a killed
/// run leaves a usable partial file).
pub fn append_end_time(path: &Path, trace: &EpidemicTrace) -> SimResult<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", trace.end_time)?;
    Ok(())
}

/// Overwrites `lastRunNumber.txt` with the count of iterations completed
/// so far, matching the original's `fprintf(fp, "%d", numIts)`
/// (`landscapeScaleModel.c:1559`), letting Core B confirm how many runs
/// exist without re-probing the filesystem one file at a time.
pub fn write_last_run_number(path: &Path, num_runs: usize) -> SimResult<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{}", num_runs)?;
    Ok(())
}
