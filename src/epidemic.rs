//! The event-driven epidemic engine (§4.5): a single run of the landscape
//! epidemic from `t=0` until it hits `max_time` or the incidence threshold.

use tracing::debug;

use crate::bulkup::{incidence_at, logistic_j, secondary_delay};
use crate::dispersal::{Dispersal, DispersalOutcome};
use crate::error::{SimError, SimResult};
use crate::heap::EventHeap;
use crate::landscape::{InfectionSource, Landscape};
use crate::primary::{PrimaryClock, PrimaryPressure};
use crate::rng::Rng;

#[derive(Clone, Copy)]
pub struct EpidemicParams {
    pub rate_pri_inf: f64,
    pub rate_sec_inf: f64,
    pub max_time: f64,
    pub max_incidence: f64,
    pub report_time: f64,
    pub within_cell_min: f64,
    pub within_cell_bulk_up: f64,
    pub true_min_flag: bool,
}

/// Bookkeeping counters purely for end-of-run diagnostics; not part of the
/// output file contract.
#[derive(Default, Debug)]
pub struct RunStats {
    pub num_secondary_attempts: u64,
    pub num_non_empty: u64,
    pub num_non_infected: u64,
    pub num_successful: u64,
    pub num_find_next_secondary: u64,
}

/// One reporting tick: `(t, num_infected, frac_infected, frac_full_infected)`.
pub struct ReportTick {
    pub t: f64,
    pub num_infected: usize,
    pub frac_infected: f64,
    pub frac_full_infected: f64,
}

pub struct EpidemicTrace {
    /// Infected cell ids in infection order.
    pub infected: Vec<usize>,
    pub reports: Vec<ReportTick>,
    pub end_time: f64,
    /// 1 if the run stopped due to hitting `max_incidence`, else 0.
    pub end_reason: u8,
    pub stats: RunStats,
}

fn j_for(cell_prop_full: f64, params: &EpidemicParams) -> f64 {
    logistic_j(params.true_min_flag, params.within_cell_min, cell_prop_full)
}

fn schedule_next_secondary(
    landscape: &mut Landscape,
    cell_id: usize,
    now: f64,
    params: &EpidemicParams,
    heap: &mut EventHeap,
    stats: &mut RunStats,
    rng: &mut Rng,
) {
    stats.num_find_next_secondary += 1;
    let cell = &landscape.cells[cell_id];
    let lambda = cell.prop_full * cell.rel_inf * params.rate_sec_inf;
    if lambda <= 0.0 {
        return;
    }
    let u = rng.uniform_open01();
    let tau = now - cell.t_inf.expect("cell must be infected to emit a secondary");
    let j = j_for(cell.prop_full, params);
    let delta_real = secondary_delay(u, lambda, tau, params.within_cell_bulk_up, j);
    let t_next = now + delta_real;
    landscape.cells[cell_id].t_next = Some(t_next);
    heap.insert(cell_id, t_next);
}

fn infect(
    landscape: &mut Landscape,
    cell_id: usize,
    now: f64,
    source: InfectionSource,
    params: &EpidemicParams,
    heap: &mut EventHeap,
    infected: &mut Vec<usize>,
    stats: &mut RunStats,
    rng: &mut Rng,
) {
    landscape.cells[cell_id].t_inf = Some(now);
    landscape.cells[cell_id].inf_by = source;
    infected.push(cell_id);
    schedule_next_secondary(landscape, cell_id, now, params, heap, stats, rng);
}

fn true_incidence(landscape: &Landscape, infected: &[usize], t: f64, params: &EpidemicParams) -> f64 {
    infected
        .iter()
        .map(|&id| {
            let cell = &landscape.cells[id];
            let t_inf = cell.t_inf.expect("infected cells have t_inf");
            let j = j_for(cell.prop_full, params);
            incidence_at(cell.prop_full, j, params.within_cell_bulk_up, t - t_inf)
        })
        .sum()
}

/// Runs a single epidemic realisation to completion. `landscape` must have
/// been freshly reset (or never run) before calling; the caller is
/// responsible for calling [`Landscape::reset_run_state`] between runs.
pub fn run_epidemic(
    landscape: &mut Landscape,
    primary_pressure: &PrimaryPressure,
    dispersal: &Dispersal,
    params: &EpidemicParams,
    rng: &mut Rng,
) -> SimResult<EpidemicTrace> {
    let num_cells = landscape.num_cells();
    let mut heap = EventHeap::with_capacity(num_cells);
    let mut infected = Vec::with_capacity(num_cells);
    let mut reports = Vec::new();
    let mut stats = RunStats::default();

    let mut primary = PrimaryClock::new(params.rate_pri_inf);
    let mut t = 0.0_f64;
    primary.arm(t, rng);

    if params.rate_pri_inf == 0.0 {
        let first = rng.uniform_index(num_cells);
        infect(
            landscape,
            first,
            0.0,
            InfectionSource::Primary,
            params,
            &mut heap,
            &mut infected,
            &mut stats,
            rng,
        );
        debug!(cell = first, "forced primary seed at t=0 (rate_pri=0)");
    }

    let max_full_incidence = params.max_incidence * landscape.total_full;
    let mut next_report = 0.0_f64;
    let mut end_reason = 0u8;

    loop {
        while next_report <= t {
            let inc = true_incidence(landscape, &infected, next_report, params);
            reports.push(ReportTick {
                t: next_report,
                num_infected: infected.len(),
                frac_infected: infected.len() as f64 / num_cells as f64,
                frac_full_infected: inc / landscape.total_full,
            });
            next_report += params.report_time;
        }

        let t_pri = primary.next_t.expect("primary clock always armed");
        let t_sec = heap.peek_min_time().unwrap_or(t_pri + 1.0);

        let mut done_inf = false;
        if t_pri <= t_sec {
            if t_pri >= params.max_time {
                t = params.max_time;
                break;
            }
            t = t_pri;
            let target = primary_pressure.which_cell(rng);
            if landscape.cells[target].t_inf.is_none() {
                infect(
                    landscape,
                    target,
                    t,
                    InfectionSource::Primary,
                    params,
                    &mut heap,
                    &mut infected,
                    &mut stats,
                    rng,
                );
                done_inf = true;
            }
            primary.arm(t, rng);
        } else {
            if t_sec >= params.max_time {
                t = params.max_time;
                break;
            }
            t = t_sec;
            let source_id = heap.pop_min().ok_or_else(|| {
                SimError::Invariant("secondary infection from invalid cell".to_string())
            })?;
            stats.num_secondary_attempts += 1;

            let (src_x, src_y) = {
                let c = &landscape.cells[source_id];
                (c.x, c.y)
            };
            match dispersal.sample(src_x, src_y, landscape, rng) {
                DispersalOutcome::Cell(target) => {
                    stats.num_non_empty += 1;
                    if landscape.cells[target].t_inf.is_none() {
                        stats.num_non_infected += 1;
                        let infect_prob = landscape.cells[target].rel_sus * landscape.cells[target].prop_full;
                        if rng.uniform_open01() < infect_prob {
                            stats.num_successful += 1;
                            infect(
                                landscape,
                                target,
                                t,
                                InfectionSource::Secondary(source_id),
                                params,
                                &mut heap,
                                &mut infected,
                                &mut stats,
                                rng,
                            );
                            done_inf = true;
                        }
                    }
                }
                DispersalOutcome::WithinCell | DispersalOutcome::OffLandscape | DispersalOutcome::Miss => {}
            }
            schedule_next_secondary(landscape, source_id, t, params, &mut heap, &mut stats, rng);
        }

        if done_inf && params.max_incidence > 0.0 {
            let inc = true_incidence(landscape, &infected, t, params);
            if inc >= max_full_incidence {
                end_reason = 1;
                break;
            }
        }
        if t >= params.max_time {
            break;
        }
    }

    let final_inc = true_incidence(landscape, &infected, t, params);
    reports.push(ReportTick {
        t,
        num_infected: infected.len(),
        frac_infected: infected.len() as f64 / num_cells as f64,
        frac_full_infected: final_inc / landscape.total_full,
    });

    Ok(EpidemicTrace {
        infected,
        reports,
        end_time: t,
        end_reason,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landscape::Cell;

    fn single_active_cell() -> Landscape {
        Landscape {
            rows: 1,
            cols: 1,
            cells: vec![Cell {
                x: 0,
                y: 0,
                prop_full: 1.0,
                rel_inf: 1.0,
                rel_sus: 1.0,
                rel_pri: 1.0,
                t_inf: None,
                t_next: None,
                inf_by: InfectionSource::None,
            }],
            cell_lookup: vec![Some(0)],
            total_full: 1.0,
        }
    }

    fn two_cell_row() -> Landscape {
        let cell = |x: i64| Cell {
            x,
            y: 0,
            prop_full: 1.0,
            rel_inf: 1.0,
            rel_sus: 1.0,
            rel_pri: 1.0,
            t_inf: None,
            t_next: None,
            inf_by: InfectionSource::None,
        };
        Landscape {
            rows: 1,
            cols: 2,
            cells: vec![cell(0), cell(1)],
            cell_lookup: vec![Some(0), Some(1)],
            total_full: 2.0,
        }
    }

    /// Spec §8 scenario 1: single 1x1 active cell, rate_pri=1, rate_sec=0,
    /// max_time=10. Exactly one infection, exponentially distributed with
    /// mean 1, bounded above by 10.
    #[test]
    fn scenario_one_single_cell_primary_only() {
        let mut times = Vec::new();
        for i in 0..2000u32 {
            let mut landscape = single_active_cell();
            let pressure = PrimaryPressure::setup(&landscape);
            let (dispersal, _) = Dispersal::setup(&landscape, 1.0);
            let params = EpidemicParams {
                rate_pri_inf: 1.0,
                rate_sec_inf: 0.0,
                max_time: 10.0,
                max_incidence: 0.0,
                report_time: 1.0,
                within_cell_min: 0.01,
                within_cell_bulk_up: 1.0,
                true_min_flag: false,
            };
            let mut rng_i = Rng::from_seed(5000 + i);
            let trace = run_epidemic(&mut landscape, &pressure, &dispersal, &params, &mut rng_i).unwrap();
            assert_eq!(trace.infected.len(), 1);
            let t_inf = landscape.cells[0].t_inf.unwrap();
            assert!(t_inf <= 10.0);
            times.push(t_inf);
        }
        let mean: f64 = times.iter().sum::<f64>() / times.len() as f64;
        // Truncation at max_time=10 biases the mean down only negligibly
        // for rate=1 (P(Exp(1) > 10) is astronomically small).
        assert!((mean - 1.0).abs() < 0.1, "mean={mean}");
    }

    /// Spec §8 scenario 2: 2x1 landscape, rate_pri=0 (forced seed), cell 0
    /// seeded at t=0, cell 1 infected secondarily with delay ~Exp(10).
    #[test]
    fn scenario_two_forced_seed_and_secondary() {
        let mut landscape = two_cell_row();
        let pressure = PrimaryPressure::setup(&landscape);
        let (dispersal, _) = Dispersal::setup(&landscape, 1.0);
        let params = EpidemicParams {
            rate_pri_inf: 0.0,
            rate_sec_inf: 10.0,
            max_time: 5.0,
            max_incidence: 0.0,
            report_time: 1.0,
            within_cell_min: 1.0,
            within_cell_bulk_up: 100.0,
            true_min_flag: false,
        };
        let mut rng = Rng::from_seed(11);
        let trace = run_epidemic(&mut landscape, &pressure, &dispersal, &params, &mut rng).unwrap();
        assert!(trace.infected.contains(&0));
        assert_eq!(landscape.cells[0].t_inf, Some(0.0));
        if trace.infected.len() == 2 {
            assert_eq!(landscape.cells[1].inf_by, InfectionSource::Secondary(0));
            assert!(landscape.cells[1].t_inf.unwrap() > 0.0);
        }
    }

    #[test]
    fn monotone_time_and_infection_count() {
        let mut landscape = two_cell_row();
        let pressure = PrimaryPressure::setup(&landscape);
        let (dispersal, _) = Dispersal::setup(&landscape, 1.0);
        let params = EpidemicParams {
            rate_pri_inf: 1.0,
            rate_sec_inf: 1.0,
            max_time: 20.0,
            max_incidence: 0.0,
            report_time: 0.5,
            within_cell_min: 0.1,
            within_cell_bulk_up: 2.0,
            true_min_flag: false,
        };
        let mut rng = Rng::from_seed(21);
        let trace = run_epidemic(&mut landscape, &pressure, &dispersal, &params, &mut rng).unwrap();
        let mut last_t = f64::MIN;
        let mut last_n = 0usize;
        for report in &trace.reports {
            assert!(report.t >= last_t);
            assert!(report.num_infected >= last_n);
            last_t = report.t;
            last_n = report.num_infected;
        }
    }

    #[test]
    fn reset_then_rerun_with_same_seed_is_reproducible() {
        let params = EpidemicParams {
            rate_pri_inf: 1.0,
            rate_sec_inf: 2.0,
            max_time: 8.0,
            max_incidence: 0.0,
            report_time: 2.0,
            within_cell_min: 0.1,
            within_cell_bulk_up: 3.0,
            true_min_flag: false,
        };

        let mut landscape = two_cell_row();
        let pressure = PrimaryPressure::setup(&landscape);
        let (dispersal, _) = Dispersal::setup(&landscape, 1.0);

        let mut rng_a = Rng::from_seed(77);
        let trace_a = run_epidemic(&mut landscape, &pressure, &dispersal, &params, &mut rng_a).unwrap();
        let end_a = trace_a.end_time;
        let count_a = trace_a.infected.len();
        landscape.reset_run_state();

        let mut rng_b = Rng::from_seed(77);
        let trace_b = run_epidemic(&mut landscape, &pressure, &dispersal, &params, &mut rng_b).unwrap();

        assert_eq!(end_a, trace_b.end_time);
        assert_eq!(count_a, trace_b.infected.len());
    }
}
