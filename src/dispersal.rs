//! The dispersal kernel: a quadrant-folded cumulative distribution of
//! per-offset secondary-infection probabilities.

use ndarray::Array2;

use crate::landscape::Landscape;
use crate::rng::Rng;

pub enum DispersalOutcome {
    /// Secondary emission lands back within the source cell.
    WithinCell,
    /// Draw landed further than the stored kernel mass; target is off the
    /// simulated landscape.
    OffLandscape,
    /// Target grid cell exists but has no active host.
    Miss,
    /// Target is an active cell.
    Cell(usize),
}

pub struct Dispersal {
    cols: usize,
    rows: usize,
    /// Row-major cumulative sums over one quadrant, `(y, x)` offsets from
    /// the source cell.
    cum: Array2<f64>,
    pub in_cell: f64,
    pub on_landscape: f64,
}

impl Dispersal {
    /// Builds the quadrant kernel from a dispersal scale `sigma`. Returns
    /// the kernel plus a multiplier to apply to the caller's
    /// `rate_sec_inf` (1.0 unless renormalisation happened).
    pub fn setup(landscape: &Landscape, disp_scale: f64) -> (Self, f64) {
        let cols = landscape.cols;
        let rows = landscape.rows;
        let mut probs = Array2::<f64>::zeros((rows, cols));
        let mut checksum = 0.0;

        for y in 0..rows {
            for x in 0..cols {
                let dist_sq = (x * x + y * y) as f64;
                let mut p = (-dist_sq.sqrt() / disp_scale).exp();
                p /= disp_scale * disp_scale * 2.0 * std::f64::consts::PI;
                if x == 0 {
                    p /= 2.0;
                }
                if y == 0 {
                    p /= 2.0;
                }
                p *= 4.0;
                probs[[y, x]] = p;
                checksum += p;
            }
        }

        let mut on_landscape = checksum;

        // Convert to cumulative sums, row-major.
        let mut running = 0.0;
        for y in 0..rows {
            for x in 0..cols {
                running += probs[[y, x]];
                probs[[y, x]] = running;
            }
        }

        let mut rate_scale = 1.0;
        if on_landscape > 1.0 {
            let old_on_landscape = on_landscape;
            rate_scale = old_on_landscape;
            probs.mapv_inplace(|v| v / old_on_landscape);
            on_landscape = 1.0;
        }
        let in_cell = probs[[0, 0]];

        (
            Dispersal {
                cols,
                rows,
                cum: probs,
                in_cell,
                on_landscape,
            },
            rate_scale,
        )
    }

    fn decode(&self, flat_index: usize) -> (i64, i64) {
        let y = flat_index / self.cols;
        let x = flat_index % self.cols;
        (x as i64, y as i64)
    }

    /// Samples a target cell from a source at `(src_x, src_y)`.
    pub fn sample(&self, src_x: i64, src_y: i64, landscape: &Landscape, rng: &mut Rng) -> DispersalOutcome {
        let draw = 4.0 * rng.uniform_open01();
        let quadrant = draw as i64;
        let r = draw - quadrant as f64;

        if r < self.in_cell {
            return DispersalOutcome::WithinCell;
        }
        if r > self.on_landscape {
            return DispersalOutcome::OffLandscape;
        }

        let flat = self.cum.as_slice().unwrap();
        let idx = flat.partition_point(|&c| c < r);
        let (mut dx, mut dy) = self.decode(idx);

        match quadrant {
            0 => {}
            1 => dx = -dx,
            2 => {
                dx = -dx;
                dy = -dy;
            }
            3 => dy = -dy,
            _ => unreachable!("quadrant is in 0..4"),
        }

        let x = src_x + dx;
        let y = src_y + dy;
        match landscape.lookup(x, y) {
            Some(idx) => DispersalOutcome::Cell(idx),
            None => {
                if x < 0 || y < 0 || x as usize >= self.cols || y as usize >= self.rows {
                    DispersalOutcome::OffLandscape
                } else {
                    DispersalOutcome::Miss
                }
            }
        }
    }
}
