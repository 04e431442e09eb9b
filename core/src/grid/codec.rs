//! Encoded `u16` gate storage with per-ray scale/bias, decoded to physical
//! velocities on the way in and re-quantized only on the way out.

use crate::grid::{GateStorage, Ray, RayHeader, Sweep, Volume};
use crate::prelude::{DealiasError, DealiasResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MISSING_CODE: u16 = 0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedRay {
    pub header: RayHeader,
    pub codes: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedSweep {
    pub rays: Vec<EncodedRay>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedVolume {
    pub sweeps: Vec<EncodedSweep>,
    pub missing_code: u16,
    pub time: Option<DateTime<Utc>>,
}

impl EncodedVolume {
    /// Physical velocities; missing codes become `missing`.
    pub fn decode(&self, missing: f32) -> Volume {
        let sweeps = self
            .sweeps
            .iter()
            .map(|sweep| {
                Sweep::new(
                    sweep
                        .rays
                        .iter()
                        .map(|ray| {
                            let gates = ray
                                .codes
                                .iter()
                                .map(|&code| {
                                    if code == self.missing_code {
                                        missing
                                    } else {
                                        code as f32 * ray.header.scale + ray.header.bias
                                    }
                                })
                                .collect();
                            Ray::new(ray.header, gates)
                        })
                        .collect(),
                )
            })
            .collect();
        let volume = Volume::new(sweeps, missing);
        match self.time {
            Some(time) => volume.with_time(time),
            None => volume,
        }
    }

    /// Encodes a physical volume using each ray's own scale and bias.
    pub fn encode<G: GateStorage>(volume: &Volume<G>, missing_code: u16) -> DealiasResult<Self> {
        let sweeps = volume
            .sweeps
            .iter()
            .map(|sweep| {
                let rays = sweep
                    .rays
                    .iter()
                    .map(|ray| {
                        let mut codes = vec![missing_code; ray.num_gates()];
                        encode_ray(volume, ray, &mut codes, missing_code)?;
                        Ok(EncodedRay {
                            header: ray.header,
                            codes,
                        })
                    })
                    .collect::<DealiasResult<Vec<_>>>()?;
                Ok(EncodedSweep { rays })
            })
            .collect::<DealiasResult<Vec<_>>>()?;
        Ok(Self {
            sweeps,
            missing_code,
            time: volume.time(),
        })
    }

    /// Writes a processed volume back into these codes.
    ///
    /// The volume must have the shape this one was decoded into.
    pub fn encode_from<G: GateStorage>(&mut self, volume: &Volume<G>) -> DealiasResult<()> {
        if self.sweeps.len() != volume.num_sweeps() {
            return Err(DealiasError::GeometryMismatch(format!(
                "encoded sweep count {} != {}",
                self.sweeps.len(),
                volume.num_sweeps()
            )));
        }
        let missing_code = self.missing_code;
        for (index, (dst, src)) in self.sweeps.iter_mut().zip(volume.sweeps.iter()).enumerate() {
            if dst.rays.len() != src.num_rays() {
                return Err(DealiasError::GeometryMismatch(format!(
                    "encoded sweep {} ray count {} != {}",
                    index,
                    dst.rays.len(),
                    src.num_rays()
                )));
            }
            for (dst_ray, src_ray) in dst.rays.iter_mut().zip(src.rays.iter()) {
                if dst_ray.codes.len() != src_ray.num_gates() {
                    return Err(DealiasError::GeometryMismatch(format!(
                        "encoded sweep {} gate count {} != {}",
                        index,
                        dst_ray.codes.len(),
                        src_ray.num_gates()
                    )));
                }
                encode_ray(volume, src_ray, &mut dst_ray.codes, missing_code)?;
            }
        }
        Ok(())
    }
}

fn encode_ray<G: GateStorage>(
    volume: &Volume<G>,
    ray: &Ray<G>,
    codes: &mut [u16],
    missing_code: u16,
) -> DealiasResult<()> {
    let RayHeader { scale, bias, .. } = ray.header;
    if scale == 0.0 || !scale.is_finite() {
        return Err(DealiasError::InvalidInput(format!(
            "ray at azimuth {:.2} has unusable scale {}",
            ray.header.azimuth, scale
        )));
    }
    for (code, &value) in codes.iter_mut().zip(ray.gates()) {
        *code = if volume.is_missing(value) {
            missing_code
        } else {
            quantize(value, scale, bias, missing_code)
        };
    }
    Ok(())
}

fn quantize(value: f32, scale: f32, bias: f32, missing_code: u16) -> u16 {
    let raw = ((value - bias) / scale).round();
    let code = raw.clamp(0.0, u16::MAX as f32) as u16;
    if code != missing_code {
        code
    } else if raw > missing_code as f32 || missing_code == 0 {
        missing_code.saturating_add(1)
    } else {
        missing_code - 1
    }
}
