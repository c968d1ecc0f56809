//! Logistic within-cell bulk-up of infectiousness, shared by the epidemic
//! engine (§4.4) and the detection-probability computer (§4.6): both need
//! the same `J` and the same sigmoid.

/// `J` in `sigma(tau) = 1 / (1 + J * exp(-r*tau))`.
///
/// Under `true_min_flag`, `within_cell_min` is a density in the same units
/// as `density` (host count, say); otherwise it's a raw proportion in
/// `(0, 1)` applied directly. Preserves the original's literal behaviour
/// when `within_cell_min >= density`: `J` collapses to zero, meaning the
/// cell is treated as fully infectious immediately (design note 9.6 — this
/// is intentional, not a bug, and must not be "fixed").
pub fn logistic_j(true_min_flag: bool, within_cell_min: f64, density: f64) -> f64 {
    if true_min_flag {
        if within_cell_min >= density {
            0.0
        } else {
            let w = within_cell_min / density;
            (1.0 - w) / w
        }
    } else {
        (1.0 - within_cell_min) / within_cell_min
    }
}

/// Infectiousness at time `tau` since first infection, scaled by the
/// cell's full host density `density`.
pub fn incidence_at(density: f64, j: f64, r: f64, tau: f64) -> f64 {
    if tau < 0.0 {
        return 0.0;
    }
    density / (1.0 + j * (-r * tau).exp())
}

/// The next secondary-emission delay (§4.4), given the maximum per-unit
/// emission rate `lambda`, the draw `u`, elapsed time since infection
/// `tau`, bulk-up rate `r` and logistic offset `j`.
pub fn secondary_delay(u: f64, lambda: f64, tau: f64, r: f64, j: f64) -> f64 {
    let delta_min = -u.ln() / lambda;
    (1.0 / r) * ((r * (tau + delta_min)).exp() + j * ((r * delta_min).exp() - 1.0)).ln() - tau
}
