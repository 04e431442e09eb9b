//! Four-thirds-earth beam propagation (Doviak and Zrnic, 1993).

/// Height and slope of the beam at one gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamPoint {
    /// Meters above mean sea level.
    pub height: f64,
    /// Meters along the earth's surface.
    pub ground_range: f64,
    /// Local beam slope in radians.
    pub slope: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeamModel {
    /// Effective earth radius `ke * a`, in meters.
    effective_radius: f64,
}

impl BeamModel {
    /// `refractivity_gradient` is dN/dh in N-units per km.
    pub fn new(earth_radius_km: f64, refractivity_gradient: f64) -> Self {
        let ke = 1.0 / (1.0 + earth_radius_km * refractivity_gradient * 1e-6);
        Self {
            effective_radius: ke * earth_radius_km * 1000.0,
        }
    }

    pub fn effective_radius(&self) -> f64 {
        self.effective_radius
    }

    /// Beam position for a slant `range` (m) at `elevation_deg`, radar at `radar_altitude` (m).
    pub fn point(&self, range: f64, elevation_deg: f64, radar_altitude: f64) -> BeamPoint {
        let re = self.effective_radius;
        let elev = elevation_deg.to_radians();
        let height_above_radar =
            (range * range + re * re + 2.0 * range * re * elev.sin()).sqrt() - re;
        let ground_range = re * (range * elev.cos() / (re + height_above_radar)).asin();
        let arc = elev + ground_range / re;
        let slope = (elev.cos() * arc.sin() / (arc.cos() * arc.cos())).atan();
        BeamPoint {
            height: height_above_radar + radar_altitude,
            ground_range,
            slope,
        }
    }
}

impl Default for BeamModel {
    fn default() -> Self {
        Self::new(6371.0, -39.2464)
    }
}
