use crate::sounding::{
    select_sounding, LoadedProfile, ProfileError, ProfileSource, SoundingRecord,
    DEFAULT_PROFILE_MISSING,
};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::Path;

/// Structured sounding lookup over a JSON catalog of [`SoundingRecord`]s.
pub struct CatalogProfileSource {
    records: Vec<SoundingRecord>,
    look_back: Duration,
    profile: LoadedProfile,
}

impl CatalogProfileSource {
    pub fn from_records(mut records: Vec<SoundingRecord>, look_back: Duration) -> Self {
        records.sort_by_key(|record| record.launch_time);
        Self {
            records,
            look_back,
            profile: LoadedProfile {
                missing_value: DEFAULT_PROFILE_MISSING,
                source: "catalog".into(),
                ..Default::default()
            },
        }
    }

    pub fn load<P: AsRef<Path>>(path: P, look_back: Duration) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ProfileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let records: Vec<SoundingRecord> = serde_json::from_str(&contents)?;
        Ok(Self::from_records(records, look_back))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl ProfileSource for CatalogProfileSource {
    fn read(&mut self, time: DateTime<Utc>) -> Result<usize, ProfileError> {
        self.profile.clear();
        Ok(select_sounding(&self.records, time, self.look_back)
            .map(|record| self.profile.load(record))
            .unwrap_or(0))
    }

    fn u(&self) -> &[f64] {
        &self.profile.u
    }

    fn v(&self) -> &[f64] {
        &self.profile.v
    }

    fn altitudes(&self) -> &[f64] {
        &self.profile.altitudes
    }

    fn missing_value(&self) -> f64 {
        self.profile.missing_value
    }

    fn launch_time(&self) -> Option<DateTime<Utc>> {
        self.profile.launch_time
    }

    fn source_name(&self) -> &str {
        &self.profile.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sounding::test_support::{at, record};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn catalog_round_trips_through_json_file() {
        let records = vec![record(6, "b", 2.0), record(0, "a", 1.0)];
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&records).unwrap().as_bytes())
            .unwrap();

        let mut source = CatalogProfileSource::load(file.path(), Duration::hours(3)).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.read(at(7, 0)).unwrap(), 2);
        assert_eq!(source.source_name(), "b");
        assert_eq!(source.u(), &[2.0, 4.0]);
        assert_eq!(source.altitudes(), &[500.0, 1500.0]);
    }

    #[test]
    fn stale_catalog_yields_no_levels() {
        let mut source =
            CatalogProfileSource::from_records(vec![record(0, "a", 1.0)], Duration::hours(1));
        assert_eq!(source.read(at(4, 0)).unwrap(), 0);
        assert!(source.launch_time().is_none());
    }

    #[test]
    fn malformed_catalog_is_json_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        assert!(matches!(
            CatalogProfileSource::load(file.path(), Duration::hours(1)),
            Err(ProfileError::Json(_))
        ));
    }
}
