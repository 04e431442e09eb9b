//! Volume -> Sweep -> Ray hierarchy holding physical velocities.
//!
//! Containers are generic over their gate storage: `Vec<f32>` for owned
//! data, `&mut [f32]` for views over buffers owned by the caller.

pub mod azimuth;
pub mod codec;
pub mod ray;
pub mod sweep;
pub mod volume;

pub use azimuth::{angular_distance, AzimuthIndex};
pub use codec::{EncodedRay, EncodedSweep, EncodedVolume};
pub use ray::{Ray, RayHeader, RayView};
pub use sweep::{Sweep, SweepView};
pub use volume::{is_missing_value, Volume, VolumeView, DEFAULT_MISSING};

/// Gate buffer a ray can read and write in place.
pub trait GateStorage: AsRef<[f32]> + AsMut<[f32]> {}

impl<T> GateStorage for T where T: AsRef<[f32]> + AsMut<[f32]> {}
