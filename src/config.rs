//! `key=value` configuration files, with command-line overrides.
//!
//! Grounded on `findKey`/`readParams` in the original `landscapeScaleModel.c`
//! and `samplingAnnealing.c`: values come from the command line first, and
//! fall back to a `.cfg` file with the same basename as the running binary.
//! Parsing the file format itself is deliberately unambitious (no nesting,
//! no comments, no quoting) to match the original's literal `key=value` line
//! scheme.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;

pub struct RawConfig(HashMap<String, String>);

impl RawConfig {
    /// Load a cfg file (if present) and merge in `key=value` override
    /// tokens, which take precedence over the file.
    pub fn load(cfg_path: &Path, overrides: &[String]) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        if cfg_path.exists() {
            let contents = std::fs::read_to_string(cfg_path)?;
            for line in contents.lines() {
                if let Some((key, value)) = split_key_value(line) {
                    map.insert(key.to_string(), value.to_string());
                }
            }
        }
        for token in overrides {
            if let Some((key, value)) = split_key_value(token) {
                map.insert(key.to_string(), value.to_string());
            }
        }
        Ok(RawConfig(map))
    }

    pub fn get_string(&self, key: &str) -> Result<String, ConfigError> {
        self.0
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
    }

    pub fn get_f64(&self, key: &str) -> Result<f64, ConfigError> {
        let value = self.get_string(key)?;
        value.trim().parse::<f64>().map_err(|_| ConfigError::BadValue {
            key: key.to_string(),
            value,
            expected: "a floating point number",
        })
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, ConfigError> {
        let value = self.get_string(key)?;
        value.trim().parse::<i64>().map_err(|_| ConfigError::BadValue {
            key: key.to_string(),
            value,
            expected: "an integer",
        })
    }

    pub fn get_usize(&self, key: &str) -> Result<usize, ConfigError> {
        Ok(self.get_i64(key)?.max(0) as usize)
    }

    /// Reads `0`/`1` flags the way the original's `trueMinFlag` and
    /// `allowDuplicates` are read: any nonzero integer is "true".
    pub fn get_flag(&self, key: &str) -> Result<bool, ConfigError> {
        Ok(self.get_i64(key)? != 0)
    }

    /// Like [`get_i64`], but missing keys return `None` instead of erroring
    /// (used for `numIts < 0` meaning "infer from input files").
    pub fn get_i64_opt(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(|v| v.trim().parse::<i64>().ok())
    }
}

/// Core A's typed configuration (§6), parsed from `landscape-sim.cfg`
/// plus CLI overrides.
pub struct Config {
    pub cell_thresh: f64,
    pub num_its: usize,
    pub file_prop_full: String,
    pub file_rel_inf: String,
    pub file_rel_sus: String,
    pub file_rel_pri: String,
    pub out_stub: String,
    pub max_time: f64,
    pub rate_pri_inf: f64,
    pub rate_sec_inf: f64,
    pub disp_scale: f64,
    pub report_time: f64,
    pub max_incidence: f64,
    pub within_cell_bulk_up: f64,
    pub within_cell_min: f64,
    pub true_min_flag: bool,
}

impl Config {
    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(Config {
            cell_thresh: raw.get_f64("cellThresh")?,
            num_its: raw.get_usize("numIts")?,
            file_prop_full: raw.get_string("filePropFull")?,
            file_rel_inf: raw.get_string("fileRelInf")?,
            file_rel_sus: raw.get_string("fileRelSus")?,
            file_rel_pri: raw.get_string("fileRelPri")?,
            out_stub: raw.get_string("outStub")?,
            max_time: raw.get_f64("maxTime")?,
            rate_pri_inf: raw.get_f64("ratePriInf")?,
            rate_sec_inf: raw.get_f64("rateSecInf")?,
            disp_scale: raw.get_f64("dispScale")?,
            report_time: raw.get_f64("reportTime")?,
            max_incidence: raw.get_f64("maxIncidence")?,
            within_cell_bulk_up: raw.get_f64("withinCellBulkUp")?,
            within_cell_min: raw.get_f64("withinCellMin")?,
            true_min_flag: raw.get_flag("trueMinFlag")?,
        })
    }
}

/// Core B's typed configuration (§6), parsed from `sampling-anneal.cfg`
/// plus CLI overrides.
pub struct AnnealConfig {
    pub input_directory: String,
    pub out_stub: String,
    pub num_its: Option<usize>,
    pub allow_duplicates: bool,
    pub num_sites: usize,
    pub samples_per_site: usize,
    pub within_cell_bulk_up: f64,
    pub within_cell_min: f64,
    pub true_min_flag: bool,
    pub test_sens: f64,
    pub det_lag: f64,
    pub delta: f64,
    pub cool: f64,
    pub alpha: f64,
    pub simann_n: u64,
    pub obj_func_type: i64,
    pub obj_func_out: String,
}

impl AnnealConfig {
    pub fn from_raw(raw: &RawConfig) -> Result<Self, ConfigError> {
        Ok(AnnealConfig {
            input_directory: raw.get_string("inputDirectory")?,
            out_stub: raw.get_string("outStub")?,
            num_its: raw.get_i64_opt("numIts").filter(|&n| n >= 0).map(|n| n as usize),
            allow_duplicates: raw.get_flag("allowDuplicates")?,
            num_sites: raw.get_usize("numSites")?,
            samples_per_site: raw.get_usize("samplesPerSite")?,
            within_cell_bulk_up: raw.get_f64("withinCellBulkUp")?,
            within_cell_min: raw.get_f64("withinCellMin")?,
            true_min_flag: raw.get_flag("trueMinFlag")?,
            test_sens: raw.get_f64("testSens")?,
            det_lag: raw.get_f64("detLag")?,
            delta: raw.get_f64("delta")?,
            cool: raw.get_f64("cool")?,
            alpha: raw.get_f64("alpha")?,
            simann_n: raw.get_i64("simann_n")?.max(0) as u64,
            obj_func_type: raw.get_i64("objFuncType")?,
            obj_func_out: raw.get_string("objFuncOut")?,
        })
    }
}

fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_end_matches(['\r', '\n']);
    let eq = line.find('=')?;
    Some((&line[..eq], &line[eq + 1..]))
}

/// Derives `<stub>.cfg` from the running binary's name, matching
/// `getCfgFileName()` in the original.
pub fn cfg_path_for_binary(exe_name: &str) -> std::path::PathBuf {
    let stub = Path::new(exe_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(exe_name);
    std::path::PathBuf::from(format!("{stub}.cfg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn split_key_value_handles_trailing_newline() {
        assert_eq!(split_key_value("cellThresh=0.5\r\n"), Some(("cellThresh", "0.5")));
        assert_eq!(split_key_value("noEquals"), None);
    }

    #[test]
    fn overrides_take_precedence_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("test.cfg");
        let mut f = std::fs::File::create(&cfg_path).unwrap();
        writeln!(f, "cellThresh=0.5").unwrap();
        writeln!(f, "numIts=10").unwrap();

        let raw = RawConfig::load(&cfg_path, &["numIts=20".to_string()]).unwrap();
        assert_eq!(raw.get_f64("cellThresh").unwrap(), 0.5);
        assert_eq!(raw.get_usize("numIts").unwrap(), 20);
    }

    #[test]
    fn missing_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let raw = RawConfig::load(&dir.path().join("missing.cfg"), &[]).unwrap();
        assert!(matches!(raw.get_f64("cellThresh"), Err(ConfigError::MissingKey(_))));
    }

    #[test]
    fn cfg_path_strips_extension_and_directories() {
        assert_eq!(
            cfg_path_for_binary("/usr/bin/landscape-sim"),
            std::path::PathBuf::from("landscape-sim.cfg")
        );
    }

    fn landscape_cfg_lines() -> Vec<&'static str> {
        vec![
            "cellThresh=0.1",
            "numIts=5",
            "filePropFull=prop.asc",
            "fileRelInf=inf.asc",
            "fileRelSus=sus.asc",
            "fileRelPri=pri.asc",
            "outStub=run",
            "maxTime=100",
            "ratePriInf=0.01",
            "rateSecInf=1.0",
            "dispScale=2.0",
            "reportTime=1.0",
            "maxIncidence=0.0",
            "withinCellBulkUp=5.0",
            "withinCellMin=0.1",
            "trueMinFlag=0",
        ]
    }

    #[test]
    fn config_from_raw_parses_every_required_key() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("landscape-sim.cfg");
        let mut f = std::fs::File::create(&cfg_path).unwrap();
        for line in landscape_cfg_lines() {
            writeln!(f, "{line}").unwrap();
        }
        let raw = RawConfig::load(&cfg_path, &[]).unwrap();
        let cfg = Config::from_raw(&raw).unwrap();
        assert_eq!(cfg.num_its, 5);
        assert!(!cfg.true_min_flag);
    }

    #[test]
    fn anneal_config_infers_num_its_as_none_when_negative() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_path = dir.path().join("sampling-anneal.cfg");
        let mut f = std::fs::File::create(&cfg_path).unwrap();
        for line in [
            "inputDirectory=./in/",
            "outStub=run",
            "numIts=-1",
            "allowDuplicates=0",
            "numSites=3",
            "samplesPerSite=2",
            "withinCellBulkUp=5.0",
            "withinCellMin=0.1",
            "trueMinFlag=0",
            "testSens=0.9",
            "detLag=0.5",
            "delta=0.1",
            "cool=1.0",
            "alpha=0.99",
            "simann_n=1000",
            "objFuncType=0",
            "objFuncOut=obj.txt",
        ] {
            writeln!(f, "{line}").unwrap();
        }
        let raw = RawConfig::load(&cfg_path, &[]).unwrap();
        let cfg = AnnealConfig::from_raw(&raw).unwrap();
        assert_eq!(cfg.num_its, None);
        assert_eq!(cfg.num_sites, 3);
    }
}
