//! The simulated-annealing loop (§4.8): mutate one slot of the sampling
//! pattern at a time, accept improving moves always and worsening moves
//! with Metropolis probability `exp((new-old)/cool)`, geometrically
//! cooling `cool *= alpha` after every step.

use tracing::{debug, info};

use crate::ensemble::Ensemble;
use crate::objective::{calc_obj_function, random_valid_host, ObjFuncType, PDetectTable};
use crate::rng::Rng;

#[derive(Clone, Copy)]
pub struct AnnealParams {
    pub num_sites: usize,
    pub allow_duplicates: bool,
    pub cool: f64,
    pub alpha: f64,
    pub simann_n: u64,
    pub obj_func: ObjFuncType,
}

/// One line of the objective-function trace: the iteration index, the
/// current (accepted) objective value, and the pattern it was achieved
/// with — matching `%d %.4f <host ids>` in the original's `fpObjOut`.
pub struct TraceStep {
    pub iteration: u64,
    pub obj_value: f64,
    pub pattern: Vec<usize>,
}

fn initial_pattern(ensemble: &Ensemble, params: &AnnealParams, rng: &mut Rng) -> Vec<usize> {
    let mut pattern = Vec::with_capacity(params.num_sites);
    for _ in 0..params.num_sites {
        let host = random_valid_host(ensemble, params.allow_duplicates, &pattern, rng);
        pattern.push(host);
    }
    pattern
}

/// Runs the full annealing schedule, returning the per-iteration trace
/// (including iteration 0, the initial pattern's objective value).
pub fn run_anneal(
    ensemble: &Ensemble,
    p_detect: &PDetectTable,
    params: &AnnealParams,
    rng: &mut Rng,
) -> Vec<TraceStep> {
    let mut pattern = initial_pattern(ensemble, params, rng);
    let mut old_obj = calc_obj_function(ensemble, p_detect, &pattern, params.obj_func, rng);
    let mut cool = params.cool;
    let mut trace = Vec::with_capacity(params.simann_n as usize + 1);

    for j in 0..=params.simann_n {
        let change_pos = rng.uniform_index(params.num_sites);
        let old_val = pattern[change_pos];
        pattern[change_pos] = random_valid_host(ensemble, params.allow_duplicates, &pattern, rng);

        let new_obj = calc_obj_function(ensemble, p_detect, &pattern, params.obj_func, rng);

        let prob_accept = if new_obj > old_obj {
            1.0
        } else if (new_obj - old_obj) / cool < -99.0 {
            0.0
        } else {
            ((new_obj - old_obj) / cool).exp()
        };

        let dice = rng.uniform_open01();
        if dice < prob_accept {
            old_obj = new_obj;
        } else {
            pattern[change_pos] = old_val;
        }

        if j % 100 == 0 {
            debug!(iteration = j, obj = old_obj, "annealing checkpoint");
        }
        trace.push(TraceStep {
            iteration: j,
            obj_value: old_obj,
            pattern: pattern.clone(),
        });

        cool *= params.alpha;
    }

    info!(
        final_obj = trace.last().map(|t| t.obj_value).unwrap_or(old_obj),
        "annealing finished"
    );
    trace
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{EverInfected, HostLookup, RunInfo};

    fn toy_ensemble(n_hosts: usize) -> Ensemble {
        let host_lookup: Vec<HostLookup> = (0..n_hosts).map(|h| HostLookup { host_id: h, host_pos: h }).collect();
        let run = RunInfo {
            host_lookup,
            time_inf: (0..n_hosts).map(|h| h as f64).collect(),
            host_density: vec![1.0; n_hosts],
            max_time_inf: n_hosts as f64 + 1.0,
        };
        let ever_infected = (0..n_hosts).map(|h| EverInfected { host_id: h, num_sims: 1 }).collect();
        Ensemble {
            hosts: vec![],
            runs: vec![run],
            ever_infected,
        }
    }

    #[test]
    fn trace_has_simann_n_plus_one_steps() {
        let ensemble = toy_ensemble(5);
        // make host 4 perfectly detectable, everyone else undetectable,
        // so the annealer should converge toward including host 4.
        let mut p_detect_row = vec![0.0; 5];
        p_detect_row[4] = 1.0;
        let table = PDetectTable {
            per_run: vec![p_detect_row],
        };
        let params = AnnealParams {
            num_sites: 2,
            allow_duplicates: false,
            cool: 1.0,
            alpha: 0.95,
            simann_n: 50,
            obj_func: ObjFuncType::ProbAnyDetection,
        };
        let mut rng = Rng::from_seed(42);
        let trace = run_anneal(&ensemble, &table, &params, &mut rng);
        assert_eq!(trace.len(), 51);
        for step in &trace {
            assert_eq!(step.pattern.len(), 2);
        }
    }

    #[test]
    fn objective_trace_is_non_decreasing_at_zero_temperature_limit() {
        // With cool extremely small, every worsening move's acceptance
        // probability underflows to (near) zero, so the accepted
        // objective value should never decrease once an improving
        // pattern is found.
        let ensemble = toy_ensemble(6);
        let mut p_detect_row = vec![0.1; 6];
        p_detect_row[5] = 0.95;
        let table = PDetectTable {
            per_run: vec![p_detect_row],
        };
        let params = AnnealParams {
            num_sites: 3,
            allow_duplicates: false,
            cool: 1e-6,
            alpha: 1.0,
            simann_n: 100,
            obj_func: ObjFuncType::ProbAnyDetection,
        };
        let mut rng = Rng::from_seed(7);
        let trace = run_anneal(&ensemble, &table, &params, &mut rng);
        let mut last = trace[0].obj_value;
        for step in &trace[1..] {
            assert!(step.obj_value >= last - 1e-12);
            last = step.obj_value;
        }
    }

    #[test]
    fn duplicates_disallowed_keeps_pattern_entries_unique() {
        let ensemble = toy_ensemble(8);
        let table = PDetectTable {
            per_run: vec![vec![0.2; 8]],
        };
        let params = AnnealParams {
            num_sites: 4,
            allow_duplicates: false,
            cool: 0.5,
            alpha: 0.99,
            simann_n: 30,
            obj_func: ObjFuncType::ExpectedFinds,
        };
        let mut rng = Rng::from_seed(13);
        let trace = run_anneal(&ensemble, &table, &params, &mut rng);
        for step in &trace {
            let mut sorted = step.pattern.clone();
            sorted.sort_unstable();
            sorted.dedup();
            assert_eq!(sorted.len(), step.pattern.len());
        }
    }
}
