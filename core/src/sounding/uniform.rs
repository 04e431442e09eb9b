use crate::sounding::{ProfileError, ProfileSource, DEFAULT_PROFILE_MISSING};
use chrono::{DateTime, Utc};

/// Constant average wind over an altitude window; used when no sounding is available.
pub struct UniformWindSource {
    u: Vec<f64>,
    v: Vec<f64>,
    altitudes: Vec<f64>,
    launch_time: Option<DateTime<Utc>>,
}

impl UniformWindSource {
    pub fn new(u: f64, v: f64, alt_min: f64, alt_max: f64) -> Self {
        Self {
            u: vec![u, u],
            v: vec![v, v],
            altitudes: vec![alt_min, alt_max],
            launch_time: None,
        }
    }
}

impl ProfileSource for UniformWindSource {
    fn read(&mut self, time: DateTime<Utc>) -> Result<usize, ProfileError> {
        self.launch_time = Some(time);
        Ok(self.altitudes.len())
    }

    fn u(&self) -> &[f64] {
        &self.u
    }

    fn v(&self) -> &[f64] {
        &self.v
    }

    fn altitudes(&self) -> &[f64] {
        &self.altitudes
    }

    fn missing_value(&self) -> f64 {
        DEFAULT_PROFILE_MISSING
    }

    fn launch_time(&self) -> Option<DateTime<Utc>> {
        self.launch_time
    }

    fn source_name(&self) -> &str {
        "average wind"
    }
}
