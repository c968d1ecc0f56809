//! The sampling-pattern objective function (§4.7): given a pattern of
//! host ids to survey, what does it tell us across the whole ensemble?

use crate::ensemble::Ensemble;
use crate::rng::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjFuncType {
    /// Sum, over runs, of "probability of detecting at least one host in
    /// the pattern", averaged by run count.
    ProbAnyDetection,
    /// Same probability, but Bernoulli-sampled per run before averaging.
    BernoulliSample,
    /// Sum, over runs, of the expected number of hosts in the pattern
    /// that get detected.
    ExpectedFinds,
}

/// Per-run per-host detection probabilities, indexed the same way as
/// `Ensemble::runs` (one `Vec<f64>` per run, aligned with
/// `RunInfo::host_lookup`/`time_inf`/`host_density` by position).
pub struct PDetectTable {
    pub per_run: Vec<Vec<f64>>,
}

impl PDetectTable {
    fn p_detect_for(&self, run_idx: usize, ensemble: &Ensemble, host_id: usize) -> f64 {
        ensemble.runs[run_idx]
            .position_of(host_id)
            .map(|pos| self.per_run[run_idx][pos])
            .unwrap_or(0.0)
    }
}

/// Evaluates the objective function for `pattern` (a list of host ids),
/// averaging `obj_func` across every run in the ensemble.
pub fn calc_obj_function(
    ensemble: &Ensemble,
    p_detect: &PDetectTable,
    pattern: &[usize],
    obj_func: ObjFuncType,
    rng: &mut Rng,
) -> f64 {
    let mut total = 0.0;
    for run_idx in 0..ensemble.num_runs() {
        let mut p_not_detect_overall = 1.0;
        let mut expected_finds_this_run = 0.0;
        for &host_id in pattern {
            let p_detect_host = p_detect.p_detect_for(run_idx, ensemble, host_id);
            p_not_detect_overall *= 1.0 - p_detect_host;
            expected_finds_this_run += p_detect_host;
        }
        let p_detect_from_pattern = 1.0 - p_not_detect_overall;

        total += match obj_func {
            ObjFuncType::ProbAnyDetection => p_detect_from_pattern,
            ObjFuncType::BernoulliSample => {
                if rng.uniform_open01() < p_detect_from_pattern {
                    1.0
                } else {
                    0.0
                }
            }
            ObjFuncType::ExpectedFinds => expected_finds_this_run,
        };
    }
    total / ensemble.num_runs() as f64
}

/// Draws a host id, optionally excluding any already present in
/// `pattern_so_far` (used by the annealer to avoid duplicate sampling
/// sites unless `allow_duplicates` is set).
pub fn random_valid_host(ensemble: &Ensemble, allow_duplicates: bool, pattern_so_far: &[usize], rng: &mut Rng) -> usize {
    loop {
        let idx = rng.uniform_index(ensemble.ever_infected.len());
        let candidate = ensemble.ever_infected[idx].host_id;
        if allow_duplicates || !pattern_so_far.contains(&candidate) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::{EverInfected, HostLookup, RunInfo};

    fn toy_ensemble() -> Ensemble {
        let run0 = RunInfo {
            host_lookup: vec![
                HostLookup { host_id: 0, host_pos: 0 },
                HostLookup { host_id: 1, host_pos: 1 },
            ],
            time_inf: vec![0.0, 1.0],
            host_density: vec![1.0, 1.0],
            max_time_inf: 10.0,
        };
        let run1 = RunInfo {
            host_lookup: vec![HostLookup { host_id: 0, host_pos: 0 }],
            time_inf: vec![0.5],
            host_density: vec![1.0],
            max_time_inf: 10.0,
        };
        Ensemble {
            hosts: vec![],
            runs: vec![run0, run1],
            ever_infected: vec![
                EverInfected { host_id: 0, num_sims: 2 },
                EverInfected { host_id: 1, num_sims: 1 },
            ],
        }
    }

    #[test]
    fn prob_any_detection_matches_hand_computation() {
        let ensemble = toy_ensemble();
        let table = PDetectTable {
            per_run: vec![vec![0.5, 0.4], vec![0.3]],
        };
        let mut rng = Rng::from_seed(1);
        // pattern = host 0 only
        let obj = calc_obj_function(&ensemble, &table, &[0], ObjFuncType::ProbAnyDetection, &mut rng);
        let expected = (0.5 + 0.3) / 2.0;
        assert!((obj - expected).abs() < 1e-12);
    }

    #[test]
    fn missing_host_in_a_run_contributes_zero_detection() {
        let ensemble = toy_ensemble();
        let table = PDetectTable {
            per_run: vec![vec![0.5, 0.4], vec![0.3]],
        };
        let mut rng = Rng::from_seed(2);
        // host 1 is absent from run 1 entirely.
        let obj = calc_obj_function(&ensemble, &table, &[1], ObjFuncType::ExpectedFinds, &mut rng);
        let expected = (0.4 + 0.0) / 2.0;
        assert!((obj - expected).abs() < 1e-12);
    }

    #[test]
    fn multi_host_pattern_combines_via_product_of_non_detection() {
        let ensemble = toy_ensemble();
        let table = PDetectTable {
            per_run: vec![vec![0.5, 0.4], vec![0.3]],
        };
        let mut rng = Rng::from_seed(3);
        let obj = calc_obj_function(&ensemble, &table, &[0, 1], ObjFuncType::ProbAnyDetection, &mut rng);
        let run0 = 1.0 - (1.0 - 0.5) * (1.0 - 0.4);
        let run1 = 1.0 - (1.0 - 0.3) * (1.0 - 0.0);
        let expected = (run0 + run1) / 2.0;
        assert!((obj - expected).abs() < 1e-12);
    }

    #[test]
    fn random_valid_host_avoids_duplicates_when_disallowed() {
        let ensemble = toy_ensemble();
        let mut rng = Rng::from_seed(4);
        let pattern = vec![0];
        for _ in 0..50 {
            let host = random_valid_host(&ensemble, false, &pattern, &mut rng);
            assert_ne!(host, 0);
        }
    }

    #[test]
    fn random_valid_host_allows_duplicates_when_enabled() {
        let ensemble = toy_ensemble();
        let mut rng = Rng::from_seed(4);
        let pattern = vec![0, 0];
        // With only host 0 and 1 ever infected and duplicates allowed,
        // host 0 must be reachable even though it's already in pattern.
        let mut saw_zero = false;
        for _ in 0..200 {
            if random_valid_host(&ensemble, true, &pattern, &mut rng) == 0 {
                saw_zero = true;
                break;
            }
        }
        assert!(saw_zero);
    }
}
