//! Core B's ensemble loader: reads `activeLandscape.txt` (every active
//! host's position and density), then each run's infection records, and
//! builds the lookups the objective function needs in O(log n) per query.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{SimError, SimResult};

#[derive(Clone, Copy, Debug)]
pub struct HostInfo {
    pub host_id: usize,
    pub host_x: i64,
    pub host_y: i64,
    pub host_density: f64,
}

/// One (host_id, position) pair, kept sorted by `host_id` so a survey can
/// binary-search "was this host infected, and when".
#[derive(Clone, Copy, Debug)]
pub struct HostLookup {
    pub host_id: usize,
    pub host_pos: usize,
}

/// A single run's infection trace, as read back from `<out_stub>_<i>.txt`.
pub struct RunInfo {
    pub host_lookup: Vec<HostLookup>,
    pub time_inf: Vec<f64>,
    pub host_density: Vec<f64>,
    pub max_time_inf: f64,
}

impl RunInfo {
    /// Binary-searches for `host_id`; returns the position within this
    /// run's infection order if the host was ever infected.
    pub fn position_of(&self, host_id: usize) -> Option<usize> {
        self.host_lookup
            .binary_search_by_key(&host_id, |l| l.host_id)
            .ok()
            .map(|idx| self.host_lookup[idx].host_pos)
    }

    pub fn time_inf_at(&self, pos: usize) -> f64 {
        self.time_inf[pos]
    }
}

/// A host ever infected across the whole ensemble, with how many of the
/// runs it appeared in (used to avoid ever sampling a host that is never
/// infected in any run, per design note on `randomValidHost`).
#[derive(Clone, Copy, Debug)]
pub struct EverInfected {
    pub host_id: usize,
    pub num_sims: usize,
}

pub struct Ensemble {
    pub hosts: Vec<HostInfo>,
    pub runs: Vec<RunInfo>,
    pub ever_infected: Vec<EverInfected>,
}

impl Ensemble {
    pub fn num_hosts(&self) -> usize {
        self.hosts.len()
    }

    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }
}

/// Reads `<input_dir>/activeLandscape.txt`: one line per host, tokens
/// `x y density [host_id]`. The host id is assigned by row order; a
/// fourth token, if present, must agree (mismatch is fatal, matching the
/// original's `"host mismatch when parsing landscape"`).
fn read_host_info(input_dir: &Path) -> SimResult<Vec<HostInfo>> {
    let path = input_dir.join("activeLandscape.txt");
    let text = fs::read_to_string(&path)?;
    let mut hosts = Vec::new();
    for (host_id, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(SimError::Parse {
                file: path.clone(),
                detail: format!("line {} has fewer than 3 tokens", host_id),
            });
        }
        let host_x: i64 = tokens[0]
            .parse()
            .map_err(|_| parse_err(&path, "bad hostX"))?;
        let host_y: i64 = tokens[1]
            .parse()
            .map_err(|_| parse_err(&path, "bad hostY"))?;
        let host_density: f64 = tokens[2]
            .parse()
            .map_err(|_| parse_err(&path, "bad hostDensity"))?;
        if let Some(tok) = tokens.get(3) {
            let claimed: usize = tok.parse().map_err(|_| parse_err(&path, "bad host id"))?;
            if claimed != host_id {
                return Err(SimError::Invariant("host mismatch when parsing landscape".to_string()));
            }
        }
        hosts.push(HostInfo {
            host_id,
            host_x,
            host_y,
            host_density,
        });
    }
    Ok(hosts)
}

fn parse_err(path: &Path, detail: &str) -> SimError {
    SimError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

/// Reads one `<out_stub>_<i>.txt`: whitespace-separated infection records,
/// token positions `2 -> t_inf`, `6 -> host_density`, `12 -> host_id`
/// (matching spec.md §6 / the original's `readSims`).
fn read_run(path: &Path, run_index: usize) -> SimResult<RunInfo> {
    let text = fs::read_to_string(path)?;
    let mut host_lookup = Vec::new();
    let mut time_inf = Vec::new();
    let mut host_density = Vec::new();

    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() <= 12 {
            return Err(SimError::Parse {
                file: path.to_path_buf(),
                detail: format!("run {run_index}: record has fewer than 13 tokens"),
            });
        }
        let t_inf: f64 = tokens[2].parse().map_err(|_| parse_err(path, "bad t_inf token"))?;
        let density: f64 = tokens[6].parse().map_err(|_| parse_err(path, "bad density token"))?;
        let host_id: usize = tokens[12].parse().map_err(|_| parse_err(path, "bad host id token"))?;

        let pos = time_inf.len();
        host_lookup.push(HostLookup { host_id, host_pos: pos });
        time_inf.push(t_inf);
        host_density.push(density);
    }
    host_lookup.sort_by_key(|l| l.host_id);

    let end_time_path = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("endTime_{run_index}.txt"));
    let max_time_inf: f64 = fs::read_to_string(&end_time_path)?
        .trim()
        .parse()
        .map_err(|_| parse_err(&end_time_path, "bad end time"))?;

    Ok(RunInfo {
        host_lookup,
        time_inf,
        host_density,
        max_time_inf,
    })
}

/// Probes `<out_stub>_<i>.txt` one index at a time until a file is
/// missing, then cross-checks against `lastRunNumber.txt` — the
/// original's "infer number of runs" fallback, used only when the Core B
/// config doesn't supply `num_its` (design note, "New Open Question").
/// `lastRunNumber.txt` holds the run *count* (`samplingAnnealing.c:447`
/// compares it directly against `numRuns`), not a 0-based last index.
fn infer_num_runs(input_dir: &Path, out_stub: &str) -> SimResult<usize> {
    let mut count = 0usize;
    loop {
        let candidate = input_dir.join(format!("{out_stub}_{count}.txt"));
        if candidate.is_file() {
            count += 1;
        } else {
            break;
        }
    }
    let last_run_path = input_dir.join("lastRunNumber.txt");
    if let Ok(contents) = fs::read_to_string(&last_run_path) {
        let claimed: i64 = contents.trim().parse().unwrap_or(-1);
        if claimed != count as i64 {
            return Err(SimError::Invariant(format!(
                "inferred {count} runs but lastRunNumber.txt claims {claimed}"
            )));
        }
    }
    Ok(count)
}

/// Loads the full ensemble for `input_dir`. `num_its` of `None` triggers
/// the inference fallback.
pub fn load_ensemble(input_dir: &Path, out_stub: &str, num_its: Option<usize>) -> SimResult<Ensemble> {
    let hosts = read_host_info(input_dir)?;

    let num_runs = match num_its {
        Some(n) => n,
        None => infer_num_runs(input_dir, out_stub)?,
    };

    let mut runs = Vec::with_capacity(num_runs);
    for i in 0..num_runs {
        let path = input_dir.join(format!("{out_stub}_{i}.txt"));
        runs.push(read_run(&path, i)?);
    }

    let ever_infected = build_ever_infected(&runs);

    Ok(Ensemble {
        hosts,
        runs,
        ever_infected,
    })
}

/// Deduplicates every `(run, host_id)` infection pair into one entry per
/// distinct host, counting how many runs it appeared in, matching the
/// original's sort-then-collapse in `readSims`.
fn build_ever_infected(runs: &[RunInfo]) -> Vec<EverInfected> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for run in runs {
        for lookup in &run.host_lookup {
            *counts.entry(lookup.host_id).or_insert(0) += 1;
        }
    }
    let mut out: Vec<EverInfected> = counts
        .into_iter()
        .map(|(host_id, num_sims)| EverInfected { host_id, num_sims })
        .collect();
    out.sort_by_key(|e| e.host_id);
    out
}
