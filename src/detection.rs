//! Detection-probability precomputation (§4.6): for every infection in
//! every run, the probability a regular survey programme (fixed interval
//! `delta`, sensitivity `test_sens`, `samples_per_site` samples drawn per
//! visit) would have caught it, averaged over the survey programme's
//! phase relative to the host's infection time.

use crate::bulkup::logistic_j;
use crate::ensemble::RunInfo;

pub const EPS: f64 = 1e-10;
const DAY: f64 = 1.0 / 365.0;

#[derive(Clone, Copy)]
pub struct DetectionParams {
    pub true_min_flag: bool,
    pub within_cell_min: f64,
    pub within_cell_bulk_up: f64,
    pub test_sens: f64,
    pub det_lag: f64,
    pub samples_per_site: usize,
    pub delta: f64,
}

/// Probability a single survey, taken `time_since_inf` after infection,
/// detects a host of density `host_density` given `samples_per_site`
/// independent samples per visit.
pub fn detect_prob_single_survey(time_since_inf: f64, host_density: f64, params: &DetectionParams) -> f64 {
    let j = logistic_j(params.true_min_flag, params.within_cell_min, host_density);
    let p_single = if time_since_inf < params.det_lag {
        0.0
    } else {
        params.test_sens * (1.0 / (1.0 + j * (-params.within_cell_bulk_up * (time_since_inf - params.det_lag)).exp()))
    };
    1.0 - (1.0 - p_single).powi(params.samples_per_site as i32)
}

/// Averages detection probability over every possible phase offset (one
/// day steps across one `delta` period) of a regular survey programme
/// running from `t=0` to the run's end time.
pub fn detect_prob_for_infection(time_inf: f64, host_density: f64, max_time_inf: f64, params: &DetectionParams) -> f64 {
    let num_surveys = ((max_time_inf + EPS) / params.delta) as i64 + 1;
    let mut p_detect = 0.0;
    let mut num_to_average = 0u64;
    let mut first_offset = 0.0;

    while first_offset < params.delta {
        let mut p_dont_detect = 1.0;
        for k in 0..num_surveys {
            let time_survey = first_offset + k as f64 * params.delta;
            let p_this_time = if time_survey < time_inf || time_survey > max_time_inf {
                0.0
            } else {
                detect_prob_single_survey(time_survey - time_inf, host_density, params)
            };
            p_dont_detect *= 1.0 - p_this_time;
        }
        p_detect += 1.0 - p_dont_detect;
        first_offset += DAY;
        num_to_average += 1;
    }
    p_detect / num_to_average as f64
}

/// Fills a per-run `p_detect` vector, one entry per infection record, in
/// the same order as `run.time_inf`/`run.host_density`.
pub fn calc_prob_detect(run: &RunInfo, params: &DetectionParams) -> Vec<f64> {
    run.time_inf
        .iter()
        .zip(&run.host_density)
        .map(|(&t_inf, &density)| detect_prob_for_infection(t_inf, density, run.max_time_inf, params))
        .collect()
}
