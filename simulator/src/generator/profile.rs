use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use fourdd::grid::{Ray, RayHeader, Sweep, Volume, DEFAULT_MISSING};
use fourdd::math::BeamModel;
use fourdd::processing::radial_velocity;
use fourdd::sounding::{ProfileLevel, SoundingRecord, DEFAULT_PROFILE_MISSING};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Synthetic scan strategy and sheared wind field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub elevations: Vec<f32>,
    pub num_rays: usize,
    pub num_gates: usize,
    pub gate_size: f32,
    pub range_first_gate: f32,
    pub nyquist_velocity: f32,
    /// Wind at the surface, m/s.
    pub surface_u: f64,
    pub surface_v: f64,
    /// Wind change per kilometer of height, m/s.
    pub shear_u: f64,
    pub shear_v: f64,
    /// Wind change per volume, m/s.
    pub drift_u: f64,
    pub drift_v: f64,
    /// Uniform velocity noise amplitude, m/s.
    pub noise: f32,
    pub seed: u64,
    pub volumes: usize,
    pub volume_interval_minutes: i64,
    pub start_time: DateTime<Utc>,
    /// Sounding levels from the surface up to `sounding_top`, in meters.
    pub sounding_levels: usize,
    pub sounding_top: f64,
    pub peak_dbz: f32,
    pub description: Option<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            elevations: vec![0.5, 1.5, 2.4, 3.4],
            num_rays: 360,
            num_gates: 160,
            gate_size: 250.0,
            range_first_gate: 2000.0,
            nyquist_velocity: 12.0,
            surface_u: 8.0,
            surface_v: 12.0,
            shear_u: 3.0,
            shear_v: 1.5,
            drift_u: 0.2,
            drift_v: -0.1,
            noise: 0.5,
            seed: 0,
            volumes: 3,
            volume_interval_minutes: 6,
            start_time: DateTime::<Utc>::default(),
            sounding_levels: 12,
            sounding_top: 12_000.0,
            peak_dbz: 45.0,
            description: None,
        }
    }
}

impl ScenarioConfig {
    pub fn volume_time(&self, index: usize) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.volume_interval_minutes * index as i64)
    }

    /// Wind at `height` meters above the radar during volume `index`.
    pub fn wind_at(&self, height: f64, index: usize) -> (f64, f64) {
        let km = height / 1000.0;
        let drift = index as f64;
        (
            self.surface_u + self.shear_u * km + self.drift_u * drift,
            self.surface_v + self.shear_v * km + self.drift_v * drift,
        )
    }

    /// Volume with this scan geometry and every gate missing.
    pub fn empty_volume(&self) -> Volume {
        let num_rays = self.num_rays.max(1);
        let sweeps = self
            .elevations
            .iter()
            .map(|&elevation| {
                let rays = (0..num_rays)
                    .map(|r| {
                        let header = RayHeader {
                            azimuth: r as f32 * 360.0 / num_rays as f32,
                            elevation,
                            nyquist_velocity: self.nyquist_velocity,
                            gate_size: self.gate_size,
                            range_first_gate: self.range_first_gate,
                            ..Default::default()
                        };
                        Ray::filled(header, self.num_gates, DEFAULT_MISSING)
                    })
                    .collect();
                Sweep::new(rays)
            })
            .collect();
        Volume::new(sweeps, DEFAULT_MISSING)
    }
}

/// Unfolded radial velocities of the scenario wind during volume `index`.
pub fn truth_volume(config: &ScenarioConfig, index: usize, direction_sign: i32) -> Volume {
    let beam = BeamModel::default();
    let mut volume = config.empty_volume().with_time(config.volume_time(index));
    for sweep in &mut volume.sweeps {
        for ray in &mut sweep.rays {
            let header = ray.header;
            let azimuth = (header.azimuth as f64).to_radians();
            for (gate, value) in ray.gates_mut().iter_mut().enumerate() {
                let point = beam.point(
                    header.gate_center_range(gate),
                    header.elevation as f64,
                    header.altitude as f64,
                );
                let (u, v) = config.wind_at(point.height, index);
                *value = radial_velocity(u, v, point.slope, azimuth, direction_sign) as f32;
            }
        }
    }
    volume
}

/// Adds noise and folds every gate into `[-Nyquist, Nyquist)`.
pub fn fold_volume(truth: &Volume, noise: f32, seed: u64) -> Volume {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut folded = truth.clone();
    for sweep in &mut folded.sweeps {
        for ray in &mut sweep.rays {
            let nyquist = ray.header.nyquist_velocity;
            for value in ray.gates_mut() {
                let jitter = if noise > 0.0 {
                    rng.gen_range(-noise..noise)
                } else {
                    0.0
                };
                *value = fold(*value + jitter, nyquist);
            }
        }
    }
    folded
}

pub fn fold(value: f32, nyquist: f32) -> f32 {
    (value + nyquist).rem_euclid(2.0 * nyquist) - nyquist
}

/// Sounding of the scenario wind launched at the start of volume `index`.
pub fn sounding(config: &ScenarioConfig, index: usize) -> anyhow::Result<SoundingRecord> {
    let count = config.sounding_levels.max(2);
    let step = config.sounding_top / (count - 1) as f64;
    anyhow::ensure!(step > 0.0, "sounding top must be above the surface");
    let levels = (0..count)
        .map(|k| {
            let altitude = step * k as f64;
            let (u, v) = config.wind_at(altitude, index);
            ProfileLevel { altitude, u, v }
        })
        .collect();
    let launch_time = config
        .volume_time(index)
        .checked_sub_signed(Duration::minutes(30))
        .context("sounding launch time out of range")?;
    Ok(SoundingRecord {
        launch_time,
        source: "scenario sounding".into(),
        missing_value: DEFAULT_PROFILE_MISSING,
        levels,
    })
}
