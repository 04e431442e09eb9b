use crate::grid::{GateStorage, Volume};
use crate::math::geometry::BeamModel;
use crate::prelude::DealiasConfig;
use crate::sounding::{ProfileLevel, ProfileSource};
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Utc};
use std::f64::consts::PI;

/// Shear-screened wind profile, sorted by altitude, with a ground level at 0 m.
#[derive(Debug, Clone, PartialEq)]
pub struct WindProfile {
    levels: Vec<ProfileLevel>,
    top_shear: (f64, f64),
}

impl WindProfile {
    /// Builds a profile from raw columns; `None` when no sample is usable.
    pub fn from_samples(
        altitudes: &[f64],
        u: &[f64],
        v: &[f64],
        missing: f64,
        config: &DealiasConfig,
    ) -> Option<Self> {
        let valid = |x: f64| x.is_finite() && (x - missing).abs() > 1e-6;
        let mut samples: Vec<ProfileLevel> = altitudes
            .iter()
            .zip(u)
            .zip(v)
            .map(|((&altitude, &u), &v)| ProfileLevel { altitude, u, v })
            .filter(|level| valid(level.altitude) && valid(level.u) && valid(level.v))
            .filter(|level| {
                level.altitude >= config.wind_alt_min && level.altitude <= config.wind_alt_max
            })
            .collect();
        samples.sort_by(|a, b| a.altitude.total_cmp(&b.altitude));
        samples.dedup_by(|a, b| a.altitude == b.altitude);

        let mut kept: Vec<ProfileLevel> = Vec::with_capacity(samples.len() + 1);
        for level in samples {
            match kept.last() {
                None => kept.push(level),
                Some(last) => {
                    let dz = level.altitude - last.altitude;
                    let shear_u = (level.u - last.u) / dz;
                    let shear_v = (level.v - last.v) / dz;
                    if shear_u.abs() <= config.max_shear && shear_v.abs() <= config.max_shear {
                        kept.push(level);
                    }
                }
            }
        }

        let lowest = *kept.first()?;
        if lowest.altitude > 0.0 {
            kept.insert(
                0,
                ProfileLevel {
                    altitude: 0.0,
                    ..lowest
                },
            );
        }

        let top_shear = match kept.as_slice() {
            [.., below, top] => {
                let dz = top.altitude - below.altitude;
                ((top.u - below.u) / dz, (top.v - below.v) / dz)
            }
            _ => (0.0, 0.0),
        };
        Some(Self { levels: kept, top_shear })
    }

    /// Builds a profile from whatever `source` currently holds.
    pub fn from_source(source: &dyn ProfileSource, config: &DealiasConfig) -> Option<Self> {
        Self::from_samples(
            source.altitudes(),
            source.u(),
            source.v(),
            source.missing_value(),
            config,
        )
    }

    pub fn levels(&self) -> &[ProfileLevel] {
        &self.levels
    }

    /// Interpolated `(u, v)` at `height` meters; above the top only when `extrapolate`.
    pub fn wind_at(&self, height: f64, extrapolate: bool) -> Option<(f64, f64)> {
        let first = self.levels.first()?;
        let top = self.levels.last()?;
        if !height.is_finite() || height < first.altitude {
            return None;
        }
        if height > top.altitude {
            if !extrapolate {
                return None;
            }
            let dz = height - top.altitude;
            return Some((top.u + self.top_shear.0 * dz, top.v + self.top_shear.1 * dz));
        }
        let upper = self
            .levels
            .partition_point(|level| level.altitude < height)
            .min(self.levels.len() - 1);
        if upper == 0 {
            return Some((first.u, first.v));
        }
        let below = self.levels[upper - 1];
        let above = self.levels[upper];
        let t = (height - below.altitude) / (above.altitude - below.altitude);
        Some((below.u + t * (above.u - below.u), below.v + t * (above.v - below.v)))
    }
}

/// Along-beam component of `(u, v)` for a ray at `azimuth_rad` and beam slope `slope`.
///
/// With a negative `direction_sign` positive velocities point away from the radar.
pub fn radial_velocity(u: f64, v: f64, slope: f64, azimuth_rad: f64, direction_sign: i32) -> f64 {
    let speed = u.hypot(v);
    if speed == 0.0 {
        return 0.0;
    }
    let offset = if direction_sign < 0 { 0.0 } else { PI };
    let bearing = (v / speed).clamp(-1.0, 1.0).acos();
    let direction = if u >= 0.0 {
        bearing + offset
    } else {
        offset - bearing
    };
    speed * slope.cos() * (direction - azimuth_rad).cos()
}

/// First guess built from a profile source.
#[derive(Debug, Clone)]
pub struct FirstGuess {
    pub volume: Volume,
    pub source_name: String,
    pub levels_used: usize,
}

/// Projects a wind profile onto the geometry of a target volume.
pub struct FirstGuessGenerator {
    config: DealiasConfig,
    beam: BeamModel,
    logger: LogManager,
}

impl FirstGuessGenerator {
    pub fn new(config: &DealiasConfig) -> Self {
        Self {
            config: config.clone(),
            beam: BeamModel::new(config.earth_radius_km, config.refractivity_gradient),
            logger: LogManager::verbose(config.verbose),
        }
    }

    /// Same-shaped volume of synthetic radial velocities; gates outside the profile are missing.
    pub fn generate<G: GateStorage>(&self, profile: &WindProfile, template: &Volume<G>) -> Volume {
        let mut guess = template.filled_like(template.missing_value());
        for sweep in &mut guess.sweeps {
            let Some(geometry) = sweep.rays.first().map(|ray| ray.header) else {
                continue;
            };
            let max_gates = sweep.max_gates();
            // one profile evaluation per gate index, shared by every ray of the sweep
            let column: Vec<Option<(f64, f64, f64)>> = (0..max_gates)
                .map(|gate| {
                    let point = self.beam.point(
                        geometry.gate_center_range(gate),
                        geometry.elevation as f64,
                        geometry.altitude as f64,
                    );
                    profile
                        .wind_at(point.height, self.config.extrapolate_above_profile)
                        .map(|(u, v)| (u, v, point.slope))
                })
                .collect();
            for ray in &mut sweep.rays {
                let azimuth = (ray.header.azimuth as f64).to_radians();
                for (gate, value) in ray.gates_mut().iter_mut().enumerate() {
                    if let Some((u, v, slope)) = column[gate] {
                        *value =
                            radial_velocity(u, v, slope, azimuth, self.config.direction_sign) as f32;
                    }
                }
            }
        }
        guess
    }

    /// Tries each source in order; the first that yields a usable profile wins.
    pub fn from_sources<G: GateStorage>(
        &self,
        sources: &mut [Box<dyn ProfileSource>],
        template: &Volume<G>,
        time: DateTime<Utc>,
    ) -> Option<FirstGuess> {
        for source in sources.iter_mut() {
            match source.read(time) {
                Ok(0) => {
                    self.logger.detail(|| {
                        format!("profile source '{}' has no data for {}", source.source_name(), time)
                    });
                }
                Ok(_) => {
                    if let Some(profile) = WindProfile::from_source(&**source, &self.config) {
                        self.logger.record(&format!(
                            "first guess from '{}' using {} levels",
                            source.source_name(),
                            profile.levels().len()
                        ));
                        return Some(FirstGuess {
                            volume: self.generate(&profile, template),
                            source_name: source.source_name().to_string(),
                            levels_used: profile.levels().len(),
                        });
                    }
                    self.logger.warn(&format!(
                        "profile source '{}' has no usable levels",
                        source.source_name()
                    ));
                }
                Err(err) => {
                    self.logger
                        .warn(&format!("profile source '{}' failed: {}", source.source_name(), err));
                }
            }
        }
        None
    }
}
