//! Primary-infection pressure: a cumulative sum that lets us draw "which
//! cell gets hit by inoculum from outside the landscape" in O(log n), plus
//! the clock that decides "when".

use crate::landscape::Landscape;
use crate::rng::Rng;

pub const VERY_LONG_TIME: f64 = 1.0e7;

pub struct PrimaryPressure {
    cum_pressure: Vec<f64>,
    pub total_pressure: f64,
}

impl PrimaryPressure {
    pub fn setup(landscape: &Landscape) -> Self {
        let mut cum = 0.0;
        let cum_pressure = landscape
            .cells
            .iter()
            .map(|c| {
                cum += c.prop_full * c.rel_pri * c.rel_sus;
                cum
            })
            .collect();
        PrimaryPressure {
            cum_pressure,
            total_pressure: cum,
        }
    }

    /// Smallest index `k` whose cumulative sum exceeds `draw`, matching
    /// the original's binary chop in `whichCellPrimary`.
    pub fn which_cell(&self, rng: &mut Rng) -> usize {
        let draw = self.total_pressure * rng.uniform_open01();
        self.cum_pressure.partition_point(|&c| c < draw)
    }
}

/// The Poisson arrival clock for primary infections across the whole
/// landscape.
pub struct PrimaryClock {
    pub next_t: Option<f64>,
    rate_pri: f64,
}

impl PrimaryClock {
    pub fn new(rate_pri: f64) -> Self {
        PrimaryClock {
            next_t: None,
            rate_pri,
        }
    }

    /// (Re)arms the clock at time `t`.
    pub fn arm(&mut self, t: f64, rng: &mut Rng) {
        self.next_t = Some(if self.rate_pri > 0.0 {
            let u = rng.uniform_open01();
            t - u.ln() / self.rate_pri
        } else {
            VERY_LONG_TIME
        });
    }
}
