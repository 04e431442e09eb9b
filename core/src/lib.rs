//! Four-dimensional Doppler velocity dealiasing for volumetric radar scans.
//!
//! Velocity gates folded into the Nyquist interval are unfolded against the
//! previous volume, the sweep above and a wind-profile first guess, then
//! grown outward through spatial continuity. Volumes are held as owned
//! containers or as views over caller buffers; see [`grid`].

pub mod grid;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod sounding;
pub mod telemetry;

pub use grid::{EncodedVolume, Ray, RayHeader, Sweep, Volume, VolumeView};
pub use prelude::{DealiasConfig, DealiasError, DealiasResult, SecondPassPolicy};
pub use processing::{DealiasOutcome, Dealiaser};
