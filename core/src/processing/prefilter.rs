use crate::grid::{angular_distance, GateStorage, Ray, Volume};
use crate::prelude::{DealiasConfig, DealiasError, DealiasResult};
use crate::telemetry::log::LogManager;
use serde::Serialize;

const RANGE_TOLERANCE_M: f32 = 0.5;
const RATIO_TOLERANCE: f32 = 1e-3;

/// How velocity gates map onto reflectivity gates along one ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateMapping {
    /// `n` reflectivity gates per velocity gate.
    Finer(usize),
    /// `n` velocity gates per reflectivity gate.
    Coarser(usize),
}

impl GateMapping {
    fn from_sizes(velocity_gate: f32, reflectivity_gate: f32) -> Option<Self> {
        if !(velocity_gate > 0.0 && reflectivity_gate > 0.0) {
            return None;
        }
        let (ratio, finer) = if velocity_gate >= reflectivity_gate {
            (velocity_gate / reflectivity_gate, true)
        } else {
            (reflectivity_gate / velocity_gate, false)
        };
        let whole = ratio.round();
        if (ratio - whole).abs() > RATIO_TOLERANCE * ratio {
            return None;
        }
        let n = whole as usize;
        Some(if finer {
            GateMapping::Finer(n)
        } else {
            GateMapping::Coarser(n)
        })
    }

    fn reflectivity_gates(self, velocity_gate: usize) -> std::ops::Range<usize> {
        match self {
            GateMapping::Finer(n) => velocity_gate * n..velocity_gate * n + n,
            GateMapping::Coarser(n) => velocity_gate / n..velocity_gate / n + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrefilterReport {
    /// Leading near-field gates removed.
    pub leading_removed: usize,
    /// Gates removed for out-of-range or missing reflectivity.
    pub reflectivity_removed: usize,
}

impl PrefilterReport {
    pub fn total(&self) -> usize {
        self.leading_removed + self.reflectivity_removed
    }
}

/// Removes velocity gates lacking reliable co-located reflectivity.
pub struct ReflectivityFilter {
    low_dbz: f32,
    high_dbz: f32,
    del_num_bins: usize,
    missing_removes: bool,
    angle_variance: f32,
    logger: LogManager,
}

impl ReflectivityFilter {
    pub fn new(config: &DealiasConfig) -> Self {
        Self {
            low_dbz: config.low_dbz,
            high_dbz: config.high_dbz,
            del_num_bins: config.del_num_bins,
            missing_removes: config.dbz_missing_removes_velocity,
            angle_variance: config.angle_variance,
            logger: LogManager::verbose(config.verbose),
        }
    }

    /// Validates geometry of every sweep, then nulls velocity gates in place.
    ///
    /// On error the velocity volume is untouched.
    pub fn apply<G: GateStorage>(
        &self,
        reflectivity: &Volume,
        velocity: &mut Volume<G>,
    ) -> DealiasResult<PrefilterReport> {
        let mappings = self.validate(reflectivity, velocity)?;

        let missing = velocity.missing_value();
        let mut report = PrefilterReport::default();
        for (s, (vel_sweep, dbz_sweep)) in velocity
            .sweeps
            .iter_mut()
            .zip(reflectivity.sweeps.iter())
            .enumerate()
        {
            for (r, (vel_ray, dbz_ray)) in vel_sweep
                .rays
                .iter_mut()
                .zip(dbz_sweep.rays.iter())
                .enumerate()
            {
                let mapping = mappings[s][r];
                for (g, gate) in vel_ray.gates_mut().iter_mut().enumerate() {
                    if crate::grid::is_missing_value(*gate, missing) {
                        continue;
                    }
                    if g < self.del_num_bins {
                        *gate = missing;
                        report.leading_removed += 1;
                    } else if self.should_remove(reflectivity, dbz_ray, mapping, g) {
                        *gate = missing;
                        report.reflectivity_removed += 1;
                    }
                }
            }
        }
        self.logger.detail(|| {
            format!(
                "prefilter removed {} leading and {} reflectivity gates",
                report.leading_removed, report.reflectivity_removed
            )
        });
        Ok(report)
    }

    fn should_remove(
        &self,
        reflectivity: &Volume,
        dbz_ray: &Ray,
        mapping: GateMapping,
        velocity_gate: usize,
    ) -> bool {
        let mut any_valid = false;
        for index in mapping.reflectivity_gates(velocity_gate) {
            match dbz_ray.gate(index).filter(|v| !reflectivity.is_missing(*v)) {
                Some(dbz) => {
                    if dbz < self.low_dbz || dbz > self.high_dbz {
                        return true;
                    }
                    any_valid = true;
                }
                None if self.missing_removes => return true,
                None => {}
            }
        }
        // velocity beyond the end of the reflectivity ray counts as missing reflectivity
        !any_valid && self.missing_removes
    }

    fn validate<G: GateStorage>(
        &self,
        reflectivity: &Volume,
        velocity: &Volume<G>,
    ) -> DealiasResult<Vec<Vec<GateMapping>>> {
        if reflectivity.num_sweeps() != velocity.num_sweeps() {
            return Err(DealiasError::GeometryMismatch(format!(
                "reflectivity has {} sweeps, velocity has {}",
                reflectivity.num_sweeps(),
                velocity.num_sweeps()
            )));
        }
        let mut mappings = Vec::with_capacity(velocity.num_sweeps());
        for (s, (vel_sweep, dbz_sweep)) in velocity
            .sweeps
            .iter()
            .zip(reflectivity.sweeps.iter())
            .enumerate()
        {
            if vel_sweep.num_rays() != dbz_sweep.num_rays() {
                return Err(DealiasError::GeometryMismatch(format!(
                    "sweep {}: reflectivity has {} rays, velocity has {}",
                    s,
                    dbz_sweep.num_rays(),
                    vel_sweep.num_rays()
                )));
            }
            let mut sweep_mappings = Vec::with_capacity(vel_sweep.num_rays());
            for (r, (vel_ray, dbz_ray)) in vel_sweep.rays.iter().zip(dbz_sweep.rays.iter()).enumerate() {
                let vh = &vel_ray.header;
                let dh = &dbz_ray.header;
                if angular_distance(vh.azimuth, dh.azimuth) > self.angle_variance
                    || (vh.elevation - dh.elevation).abs() > self.angle_variance
                {
                    return Err(DealiasError::GeometryMismatch(format!(
                        "sweep {} ray {}: reflectivity at ({:.2}, {:.2}) vs velocity at ({:.2}, {:.2})",
                        s, r, dh.azimuth, dh.elevation, vh.azimuth, vh.elevation
                    )));
                }
                if (vh.range_first_gate - dh.range_first_gate).abs() > RANGE_TOLERANCE_M {
                    return Err(DealiasError::GeometryMismatch(format!(
                        "sweep {} ray {}: first gate at {} m vs {} m",
                        s, r, dh.range_first_gate, vh.range_first_gate
                    )));
                }
                let mapping = GateMapping::from_sizes(vh.gate_size, dh.gate_size).ok_or_else(|| {
                    DealiasError::GeometryMismatch(format!(
                        "sweep {} ray {}: gate sizes {} m and {} m are not integer multiples",
                        s, r, vh.gate_size, dh.gate_size
                    ))
                })?;
                sweep_mappings.push(mapping);
            }
            mappings.push(sweep_mappings);
        }
        Ok(mappings)
    }
}
