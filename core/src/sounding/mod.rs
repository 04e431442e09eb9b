//! Time-indexed wind profile providers.
//!
//! Every provider loads one profile per `read` call and exposes it through
//! the same accessors, so the first-guess generator never knows whether the
//! levels came from a text file, a catalog or a fixed average wind.

pub mod catalog;
pub mod text;
pub mod uniform;

pub use catalog::CatalogProfileSource;
pub use text::TextProfileSource;
pub use uniform::UniformWindSource;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_PROFILE_MISSING: f64 = -9999.0;

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("catalog: {0}")]
    Json(#[from] serde_json::Error),
}

/// Source of altitude/U/V wind samples for a given volume time.
pub trait ProfileSource {
    /// Loads the profile valid at `time`; returns the number of levels, 0 when none qualifies.
    fn read(&mut self, time: DateTime<Utc>) -> Result<usize, ProfileError>;
    fn u(&self) -> &[f64];
    fn v(&self) -> &[f64];
    /// Meters above mean sea level.
    fn altitudes(&self) -> &[f64];
    fn num_points(&self) -> usize {
        self.altitudes().len()
    }
    fn missing_value(&self) -> f64;
    fn launch_time(&self) -> Option<DateTime<Utc>>;
    fn source_name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileLevel {
    pub altitude: f64,
    pub u: f64,
    pub v: f64,
}

/// One sounding as stored by the text and catalog providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundingRecord {
    pub launch_time: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_missing")]
    pub missing_value: f64,
    pub levels: Vec<ProfileLevel>,
}

fn default_missing() -> f64 {
    DEFAULT_PROFILE_MISSING
}

/// Most recent record launched at or before `time` and within `look_back`.
pub fn select_sounding(
    records: &[SoundingRecord],
    time: DateTime<Utc>,
    look_back: Duration,
) -> Option<&SoundingRecord> {
    records
        .iter()
        .filter(|record| record.launch_time <= time && time - record.launch_time <= look_back)
        .max_by_key(|record| record.launch_time)
}

/// Columnar storage of the currently loaded profile.
#[derive(Debug, Clone, Default)]
pub(crate) struct LoadedProfile {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub altitudes: Vec<f64>,
    pub missing_value: f64,
    pub launch_time: Option<DateTime<Utc>>,
    pub source: String,
}

impl LoadedProfile {
    pub fn clear(&mut self) {
        self.u.clear();
        self.v.clear();
        self.altitudes.clear();
        self.launch_time = None;
    }

    pub fn load(&mut self, record: &SoundingRecord) -> usize {
        self.clear();
        for level in &record.levels {
            self.altitudes.push(level.altitude);
            self.u.push(level.u);
            self.v.push(level.v);
        }
        self.missing_value = record.missing_value;
        self.launch_time = Some(record.launch_time);
        if !record.source.is_empty() {
            self.source = record.source.clone();
        }
        self.altitudes.len()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{at, record};
    use super::*;

    #[test]
    fn selects_latest_launch_before_volume_time() {
        let records = vec![record(0, "a", 1.0), record(6, "b", 2.0), record(12, "c", 3.0)];
        let chosen = select_sounding(&records, at(11, 30), Duration::hours(6)).unwrap();
        assert_eq!(chosen.source, "b");
    }

    #[test]
    fn look_back_excludes_stale_soundings() {
        let records = vec![record(0, "a", 1.0)];
        assert!(select_sounding(&records, at(7, 0), Duration::hours(6)).is_none());
        assert!(select_sounding(&records, at(6, 0), Duration::hours(6)).is_some());
    }
}
