use crate::grid::GateStorage;
use serde::{Deserialize, Serialize};

/// Per-ray geometry and encoding attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RayHeader {
    /// Degrees clockwise from north.
    pub azimuth: f32,
    /// Degrees above the horizon.
    pub elevation: f32,
    pub nyquist_velocity: f32,
    /// Meters between gate centers.
    pub gate_size: f32,
    /// Meters from the radar to the start of the first gate.
    pub range_first_gate: f32,
    /// Radar altitude in meters.
    pub altitude: f32,
    pub scale: f32,
    pub bias: f32,
}

impl Default for RayHeader {
    fn default() -> Self {
        Self {
            azimuth: 0.0,
            elevation: 0.5,
            nyquist_velocity: 0.0,
            gate_size: 250.0,
            range_first_gate: 0.0,
            altitude: 0.0,
            scale: 0.01,
            bias: -327.68,
        }
    }
}

impl RayHeader {
    /// Range in meters to the center of gate `index`.
    pub fn gate_center_range(&self, index: usize) -> f64 {
        self.range_first_gate as f64
            + index as f64 * self.gate_size as f64
            + self.gate_size as f64 / 2.0
    }

    pub fn nyquist_interval(&self) -> f32 {
        2.0 * self.nyquist_velocity
    }
}

/// One radial of gate values; `G` decides who owns the gate buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Ray<G = Vec<f32>> {
    pub header: RayHeader,
    gates: G,
}

/// Ray over a caller-owned gate buffer.
pub type RayView<'a> = Ray<&'a mut [f32]>;

impl<G: GateStorage> Ray<G> {
    pub fn new(header: RayHeader, gates: G) -> Self {
        Self { header, gates }
    }

    pub fn gates(&self) -> &[f32] {
        self.gates.as_ref()
    }

    pub fn gates_mut(&mut self) -> &mut [f32] {
        self.gates.as_mut()
    }

    pub fn num_gates(&self) -> usize {
        self.gates.as_ref().len()
    }

    pub fn gate(&self, index: usize) -> Option<f32> {
        self.gates.as_ref().get(index).copied()
    }

    /// Deep copy into owned storage.
    pub fn to_owned_ray(&self) -> Ray {
        Ray::new(self.header, self.gates.as_ref().to_vec())
    }

    /// Borrowed view over this ray's gates.
    pub fn view_mut(&mut self) -> RayView<'_> {
        Ray::new(self.header, self.gates.as_mut())
    }
}

impl Ray {
    pub fn filled(header: RayHeader, num_gates: usize, value: f32) -> Self {
        Ray::new(header, vec![value; num_gates])
    }
}
