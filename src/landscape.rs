//! The raster landscape: a sparse list of active cells over a dense grid.

use std::path::Path;

use crate::error::SimError;

/// How a cell came to be infected.
///
/// A tagged variant rather than the original's `infBy = -1` sentinel
/// integer (design note 9.2): `inf_by` is folded in directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InfectionSource {
    None,
    Primary,
    Secondary(usize),
}

/// A single active grid cell and its mutable run state.
///
/// Once `t_inf` is set during a run it is never reassigned until
/// [`Landscape::reset_run_state`] is called.
#[derive(Debug, Clone)]
pub struct Cell {
    pub x: i64,
    pub y: i64,
    pub prop_full: f64,
    pub rel_inf: f64,
    pub rel_sus: f64,
    pub rel_pri: f64,
    pub t_inf: Option<f64>,
    pub t_next: Option<f64>,
    pub inf_by: InfectionSource,
}

impl Cell {
    fn new(x: i64, y: i64, prop_full: f64) -> Self {
        Cell {
            x,
            y,
            prop_full,
            rel_inf: 1.0,
            rel_sus: 1.0,
            rel_pri: 1.0,
            t_inf: None,
            t_next: None,
            inf_by: InfectionSource::None,
        }
    }
}

pub struct Landscape {
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
    /// Dense row-major lookup from grid position to active-cell index.
    pub cell_lookup: Vec<Option<usize>>,
    pub total_full: f64,
}

impl Landscape {
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn lookup(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x as usize >= self.cols || y as usize >= self.rows {
            return None;
        }
        self.cell_lookup[y as usize * self.cols + x as usize]
    }

    /// Clears per-run mutable state between iterations, matching the
    /// original's end-of-iteration reset.
    pub fn reset_run_state(&mut self) {
        for cell in &mut self.cells {
            cell.t_inf = None;
            cell.t_next = None;
            cell.inf_by = InfectionSource::None;
        }
    }
}

const GIS_HEADER_LENGTH: usize = 6;
const NODATA_TOKEN: &str = "-9999";

struct GridHeader {
    ncols: usize,
    nrows: usize,
}

fn parse_header(path: &Path, lines: &mut std::str::Lines, want_dims: bool) -> Result<Option<GridHeader>, SimError> {
    let mut ncols = None;
    let mut nrows = None;
    for _ in 0..GIS_HEADER_LENGTH {
        let line = lines.next().ok_or_else(|| SimError::Parse {
            file: path.to_path_buf(),
            detail: "header truncated".to_string(),
        })?;
        if want_dims {
            if let Some(rest) = line.strip_prefix("ncols") {
                ncols = rest.split_whitespace().next().and_then(|t| t.parse::<usize>().ok());
            }
            if let Some(rest) = line.strip_prefix("nrows") {
                nrows = rest.split_whitespace().next().and_then(|t| t.parse::<usize>().ok());
            }
        }
    }
    if !want_dims {
        return Ok(None);
    }
    match (ncols, nrows) {
        (Some(ncols), Some(nrows)) if ncols > 0 && nrows > 0 => Ok(Some(GridHeader { ncols, nrows })),
        _ => Err(SimError::Parse {
            file: path.to_path_buf(),
            detail: "failed to parse gis header".to_string(),
        }),
    }
}

/// Reads the four co-registered raster files and builds the active-cell
/// list. `prop_full` is read first to determine which cells are active;
/// NODATA at an active cell in any of the other three files is fatal.
pub fn read_landscape(
    file_prop_full: &Path,
    file_rel_inf: &Path,
    file_rel_pri: &Path,
    file_rel_sus: &Path,
    cell_thresh: f64,
) -> Result<Landscape, SimError> {
    let mut landscape = Landscape {
        rows: 0,
        cols: 0,
        cells: Vec::new(),
        cell_lookup: Vec::new(),
        total_full: 0.0,
    };

    let files = [
        (file_prop_full, 0usize),
        (file_rel_inf, 1),
        (file_rel_pri, 2),
        (file_rel_sus, 3),
    ];

    for (path, pass) in files {
        let contents = std::fs::read_to_string(path)?;
        let mut lines = contents.lines();
        let header = parse_header(path, &mut lines, pass == 0)?;
        if pass == 0 {
            let header = header.expect("dims requested on first pass");
            landscape.cols = header.ncols;
            landscape.rows = header.nrows;
            landscape.cell_lookup = vec![None; header.ncols * header.nrows];
        }

        let mut row_idx = 0usize;
        for line in lines.by_ref() {
            if line.trim().is_empty() {
                continue;
            }
            let mut col_idx = 0usize;
            for token in line.split_whitespace() {
                let pos = row_idx * landscape.cols + col_idx;
                let is_nodata = token == NODATA_TOKEN;
                let value = if is_nodata { 0.0 } else {
                    token.parse::<f64>().map_err(|_| SimError::Parse {
                        file: path.to_path_buf(),
                        detail: format!("bad numeric token '{token}' at row {row_idx}"),
                    })?
                };

                if pass == 0 {
                    if is_nodata || value < cell_thresh {
                        landscape.cell_lookup[pos] = None;
                    } else {
                        let idx = landscape.cells.len();
                        landscape.cell_lookup[pos] = Some(idx);
                        landscape.total_full += value;
                        landscape
                            .cells
                            .push(Cell::new(col_idx as i64, row_idx as i64, value));
                    }
                } else if let Some(idx) = landscape.cell_lookup[pos] {
                    if is_nodata {
                        return Err(SimError::Parse {
                            file: path.to_path_buf(),
                            detail: format!("NODATA when expecting value at row {row_idx}"),
                        });
                    }
                    match pass {
                        1 => landscape.cells[idx].rel_inf = value,
                        2 => landscape.cells[idx].rel_pri = value,
                        3 => landscape.cells[idx].rel_sus = value,
                        _ => unreachable!(),
                    }
                }
                col_idx += 1;
            }
            if col_idx != landscape.cols {
                return Err(SimError::Parse {
                    file: path.to_path_buf(),
                    detail: format!("bad number of columns ({col_idx}) at row {row_idx}"),
                });
            }
            row_idx += 1;
        }
        if row_idx != landscape.rows {
            return Err(SimError::Parse {
                file: path.to_path_buf(),
                detail: format!("bad number of rows ({row_idx})"),
            });
        }
    }

    Ok(landscape)
}
