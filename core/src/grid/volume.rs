use crate::grid::{angular_distance, GateStorage, Ray, Sweep};
use crate::prelude::{DealiasError, DealiasResult};
use chrono::{DateTime, Utc};

/// Sentinel used for missing gates unless the caller supplies another.
pub const DEFAULT_MISSING: f32 = -32768.0;

const MISSING_TOLERANCE: f32 = 1e-4;

/// NaN or within `1e-4` of the sentinel.
pub fn is_missing_value(value: f32, missing: f32) -> bool {
    value.is_nan() || (value - missing).abs() < MISSING_TOLERANCE
}

/// A full scan: sweeps ordered from lowest to highest elevation.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<G = Vec<f32>> {
    pub sweeps: Vec<Sweep<G>>,
    missing: f32,
    time: Option<DateTime<Utc>>,
}

/// Volume whose gate buffers belong to the caller.
pub type VolumeView<'a> = Volume<&'a mut [f32]>;

impl<G: GateStorage> Volume<G> {
    pub fn new(sweeps: Vec<Sweep<G>>, missing: f32) -> Self {
        Self {
            sweeps,
            missing,
            time: None,
        }
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn missing_value(&self) -> f32 {
        self.missing
    }

    pub fn is_missing(&self, value: f32) -> bool {
        is_missing_value(value, self.missing)
    }

    pub fn time(&self) -> Option<DateTime<Utc>> {
        self.time
    }

    pub fn set_time(&mut self, time: Option<DateTime<Utc>>) {
        self.time = time;
    }

    pub fn num_sweeps(&self) -> usize {
        self.sweeps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sweeps.iter().all(|sweep| sweep.rays.is_empty())
    }

    pub fn total_gates(&self) -> usize {
        self.sweeps
            .iter()
            .flat_map(|sweep| sweep.rays.iter())
            .map(Ray::num_gates)
            .sum()
    }

    /// Gate value, or `None` when out of bounds or missing.
    pub fn value(&self, sweep: usize, ray: usize, gate: usize) -> Option<f32> {
        self.sweeps
            .get(sweep)
            .and_then(|s| s.gate(ray, gate))
            .filter(|v| !self.is_missing(*v))
    }

    pub fn deep_copy(&self) -> Volume {
        Volume {
            sweeps: self.sweeps.iter().map(Sweep::to_owned_sweep).collect(),
            missing: self.missing,
            time: self.time,
        }
    }

    /// Borrowed view over this volume's gates.
    pub fn view_mut(&mut self) -> VolumeView<'_> {
        Volume {
            sweeps: self
                .sweeps
                .iter_mut()
                .map(|sweep| Sweep::new(sweep.rays.iter_mut().map(Ray::view_mut).collect()))
                .collect(),
            missing: self.missing,
            time: self.time,
        }
    }

    /// Owned volume with the same geometry and every gate set to `value`.
    pub fn filled_like(&self, value: f32) -> Volume {
        Volume {
            sweeps: self
                .sweeps
                .iter()
                .map(|sweep| {
                    Sweep::new(
                        sweep
                            .rays
                            .iter()
                            .map(|ray| Ray::filled(ray.header, ray.num_gates(), value))
                            .collect(),
                    )
                })
                .collect(),
            missing: self.missing,
            time: self.time,
        }
    }

    /// Checks sweep, ray and gate counts only.
    pub fn verify_same_shape<H: GateStorage>(&self, other: &Volume<H>) -> DealiasResult<()> {
        if self.num_sweeps() != other.num_sweeps() {
            return Err(DealiasError::GeometryMismatch(format!(
                "sweep count {} != {}",
                self.num_sweeps(),
                other.num_sweeps()
            )));
        }
        for (index, (a, b)) in self.sweeps.iter().zip(other.sweeps.iter()).enumerate() {
            if a.num_rays() != b.num_rays() {
                return Err(DealiasError::GeometryMismatch(format!(
                    "sweep {} ray count {} != {}",
                    index,
                    a.num_rays(),
                    b.num_rays()
                )));
            }
            for (ray_index, (ra, rb)) in a.rays.iter().zip(b.rays.iter()).enumerate() {
                if ra.num_gates() != rb.num_gates() {
                    return Err(DealiasError::GeometryMismatch(format!(
                        "sweep {} ray {} gate count {} != {}",
                        index,
                        ray_index,
                        ra.num_gates(),
                        rb.num_gates()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Shape check plus per-ray azimuth/elevation agreement within `tolerance` degrees.
    pub fn verify_joint_dimensions<H: GateStorage>(
        &self,
        other: &Volume<H>,
        tolerance: f32,
    ) -> DealiasResult<()> {
        self.verify_same_shape(other)?;
        for (index, (a, b)) in self.sweeps.iter().zip(other.sweeps.iter()).enumerate() {
            verify_ray_angles(index, &a.rays, &b.rays, tolerance)?;
        }
        Ok(())
    }

    /// Copies every gate value from an identically shaped volume.
    pub fn copy_values_from<H: GateStorage>(&mut self, other: &Volume<H>) -> DealiasResult<()> {
        self.verify_same_shape(other)?;
        for (dst, src) in self.sweeps.iter_mut().zip(other.sweeps.iter()) {
            for (dst_ray, src_ray) in dst.rays.iter_mut().zip(src.rays.iter()) {
                dst_ray.gates_mut().copy_from_slice(src_ray.gates());
            }
        }
        Ok(())
    }

    pub fn override_nyquist(&mut self, nyquist_velocity: f32) {
        for ray in self.sweeps.iter_mut().flat_map(|sweep| sweep.rays.iter_mut()) {
            ray.header.nyquist_velocity = nyquist_velocity;
        }
    }

    /// Sets each sweep's Nyquist velocity to its largest absolute valid velocity.
    ///
    /// Sweeps without any valid gate keep their existing Nyquist values.
    pub fn estimate_nyquist_from_velocity(&mut self) {
        let missing = self.missing;
        for sweep in &mut self.sweeps {
            let estimate = sweep
                .rays
                .iter()
                .flat_map(|ray| ray.gates().iter().copied())
                .filter(|v| !is_missing_value(*v, missing))
                .fold(0.0_f32, |acc, v| acc.max(v.abs()));
            if estimate > 0.0 {
                for ray in &mut sweep.rays {
                    ray.header.nyquist_velocity = estimate;
                }
            }
        }
    }

    /// First sweep whose Nyquist velocity is not positive and finite, if any.
    pub fn find_invalid_nyquist(&self) -> Option<(usize, f32)> {
        self.sweeps.iter().enumerate().find_map(|(index, sweep)| {
            sweep
                .rays
                .iter()
                .map(|ray| ray.header.nyquist_velocity)
                .find(|nyq| !(nyq.is_finite() && *nyq > 0.0))
                .map(|nyq| (index, nyq))
        })
    }
}

fn verify_ray_angles<G: GateStorage, H: GateStorage>(
    sweep_index: usize,
    a: &[Ray<G>],
    b: &[Ray<H>],
    tolerance: f32,
) -> DealiasResult<()> {
    for (ray_index, (ra, rb)) in a.iter().zip(b.iter()).enumerate() {
        let az = angular_distance(ra.header.azimuth, rb.header.azimuth);
        let el = (ra.header.elevation - rb.header.elevation).abs();
        if az > tolerance || el > tolerance {
            return Err(DealiasError::GeometryMismatch(format!(
                "sweep {} ray {} angles ({:.2}, {:.2}) vs ({:.2}, {:.2}) exceed tolerance {:.2}",
                sweep_index,
                ray_index,
                ra.header.azimuth,
                ra.header.elevation,
                rb.header.azimuth,
                rb.header.elevation,
                tolerance
            )));
        }
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::uniform_volume;
    use super::*;

    #[test]
    fn deep_copy_is_independent() {
        let mut volume = uniform_volume(&[0.5], 4, 3, 10.0, |_, _, _| 1.0);
        let copy = volume.deep_copy();
        volume.sweeps[0].rays[0].gates_mut()[0] = 9.0;
        assert_eq!(copy.value(0, 0, 0), Some(1.0));
        assert_eq!(volume.value(0, 0, 0), Some(9.0));
    }

    #[test]
    fn ray_count_mismatch_is_rejected() {
        let a = uniform_volume(&[0.5], 4, 3, 10.0, |_, _, _| 1.0);
        let b = uniform_volume(&[0.5], 5, 3, 10.0, |_, _, _| 1.0);
        assert!(matches!(
            a.verify_joint_dimensions(&b, 1.0),
            Err(DealiasError::GeometryMismatch(_))
        ));
    }

    #[test]
    fn azimuth_tolerance_wraps_at_north() {
        let a = uniform_volume(&[0.5], 4, 3, 10.0, |_, _, _| 1.0);
        let mut b = a.clone();
        b.sweeps[0].rays[0].header.azimuth = 359.6;
        assert!(a.verify_joint_dimensions(&b, 1.0).is_ok());
        b.sweeps[0].rays[1].header.azimuth = 92.0;
        assert!(a.verify_joint_dimensions(&b, 1.0).is_err());
    }

    #[test]
    fn view_mutations_reach_owner() {
        let mut owned = uniform_volume(&[0.5, 1.5], 4, 3, 10.0, |_, _, _| 2.0);
        {
            let mut view = owned.view_mut();
            view.sweeps[1].rays[2].gates_mut()[1] = -4.0;
            view.override_nyquist(12.0);
        }
        assert_eq!(owned.value(1, 2, 1), Some(-4.0));
        // headers are copied into the view
        assert_eq!(owned.sweeps[0].nyquist_velocity(), Some(10.0));
    }

    #[test]
    fn nyquist_estimate_uses_largest_valid_magnitude() {
        let mut volume = uniform_volume(&[0.5], 4, 3, 0.0, |_, r, g| {
            if r == 1 && g == 2 {
                DEFAULT_MISSING
            } else {
                (r as f32 - 2.0) * 3.0 + g as f32
            }
        });
        volume.estimate_nyquist_from_velocity();
        assert_eq!(volume.sweeps[0].nyquist_velocity(), Some(6.0));
        assert!(volume.find_invalid_nyquist().is_none());
    }

    #[test]
    fn copy_values_restores_original() {
        let original = uniform_volume(&[0.5], 4, 3, 10.0, |_, r, g| (r * 3 + g) as f32);
        let mut working = original.filled_like(DEFAULT_MISSING);
        assert_eq!(working.value(0, 1, 1), None);
        working.copy_values_from(&original).unwrap();
        assert_eq!(working, original);
    }
}
