use crate::generator::profile::ScenarioConfig;
use anyhow::Context;
use fourdd::prelude::DealiasConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub scenario: ScenarioConfig,
    pub dealias: DealiasConfig,
    /// Offer a generated sounding as the first profile source.
    pub use_sounding: bool,
    /// Fall back to the scenario's surface wind when no sounding matches.
    pub use_average_wind: bool,
    /// Pass synthetic reflectivity to the pre-filter.
    pub use_reflectivity: bool,
    /// Replace each volume with its first guess instead of dealiasing.
    pub emit_first_guess: bool,
    /// Replace every ray's Nyquist velocity before dealiasing.
    pub nyquist_override: Option<f32>,
    /// Derive each sweep's Nyquist velocity from its largest value.
    pub estimate_nyquist: bool,
    pub report_path: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            scenario: ScenarioConfig::default(),
            dealias: DealiasConfig::default(),
            use_sounding: true,
            use_average_wind: false,
            use_reflectivity: true,
            emit_first_guess: false,
            nyquist_override: None,
            estimate_nyquist: false,
            report_path: None,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .dealias
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(volumes: usize, nyquist_velocity: f32, seed: u64) -> Self {
        let mut config = Self::default();
        config.scenario.volumes = volumes;
        config.scenario.nyquist_velocity = nyquist_velocity;
        config.scenario.seed = seed;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fourdd::prelude::SecondPassPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_overrides_scenario() {
        let cfg = WorkflowConfig::from_args(5, 8.5, 42);
        assert_eq!(cfg.scenario.volumes, 5);
        assert_eq!(cfg.scenario.nyquist_velocity, 8.5);
        assert_eq!(cfg.dealias, DealiasConfig::default());
    }

    #[test]
    fn config_load_reads_partial_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"scenario:\n  num_rays: 72\n  volumes: 2\ndealias:\n  del_num_bins: 2\n  second_pass: first_guess_available\nemit_first_guess: true\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.scenario.num_rays, 72);
        assert_eq!(cfg.scenario.num_gates, ScenarioConfig::default().num_gates);
        assert_eq!(cfg.dealias.del_num_bins, 2);
        assert_eq!(cfg.dealias.second_pass, SecondPassPolicy::FirstGuessAvailable);
        assert!(cfg.emit_first_guess);
        assert!(cfg.use_sounding);
    }

    #[test]
    fn config_load_rejects_invalid_parameters() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(b"dealias:\n  max_count: 0\n").unwrap();
        let path = temp.into_temp_path();
        assert!(WorkflowConfig::load(&path).is_err());
    }
}
