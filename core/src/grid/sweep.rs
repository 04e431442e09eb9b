use crate::grid::{AzimuthIndex, GateStorage, Ray};

/// Rays collected at one nominal elevation, in acquisition order.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep<G = Vec<f32>> {
    pub rays: Vec<Ray<G>>,
}

pub type SweepView<'a> = Sweep<&'a mut [f32]>;

impl<G: GateStorage> Sweep<G> {
    pub fn new(rays: Vec<Ray<G>>) -> Self {
        Self { rays }
    }

    pub fn num_rays(&self) -> usize {
        self.rays.len()
    }

    pub fn max_gates(&self) -> usize {
        self.rays.iter().map(Ray::num_gates).max().unwrap_or(0)
    }

    /// Nominal elevation, taken from the first ray.
    pub fn elevation(&self) -> Option<f32> {
        self.rays.first().map(|ray| ray.header.elevation)
    }

    /// Nyquist velocity, taken from the first ray.
    pub fn nyquist_velocity(&self) -> Option<f32> {
        self.rays.first().map(|ray| ray.header.nyquist_velocity)
    }

    pub fn azimuth_index(&self) -> AzimuthIndex {
        AzimuthIndex::new(self.rays.iter().map(|ray| ray.header.azimuth))
    }

    pub fn gate(&self, ray: usize, gate: usize) -> Option<f32> {
        self.rays.get(ray).and_then(|r| r.gate(gate))
    }

    pub fn to_owned_sweep(&self) -> Sweep {
        Sweep::new(self.rays.iter().map(Ray::to_owned_ray).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::RayHeader;

    #[test]
    fn max_gates_covers_ragged_rays() {
        let sweep = Sweep::new(vec![
            Ray::filled(RayHeader::default(), 3, 0.0),
            Ray::filled(RayHeader::default(), 7, 0.0),
        ]);
        assert_eq!(sweep.num_rays(), 2);
        assert_eq!(sweep.max_gates(), 7);
        assert_eq!(sweep.gate(0, 5), None);
        assert_eq!(sweep.gate(1, 5), Some(0.0));
    }
}
