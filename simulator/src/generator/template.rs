use fourdd::grid::{Ray, Volume};

/// Storm-cell reflectivity shaped like the template velocity volume.
///
/// A cell centered at `cell_azimuth` and `cell_range` falls off to clear air,
/// which drops below the pre-filter's low threshold far from the cell.
pub fn storm_cell(
    template: &Volume,
    peak_dbz: f32,
    cell_azimuth: f32,
    cell_range: f64,
    cell_radius: f64,
) -> Volume {
    let mut reflectivity = template.filled_like(template.missing_value());
    for sweep in &mut reflectivity.sweeps {
        for ray in &mut sweep.rays {
            fill_ray(ray, peak_dbz, cell_azimuth, cell_range, cell_radius);
        }
    }
    reflectivity
}

fn fill_ray(ray: &mut Ray, peak_dbz: f32, cell_azimuth: f32, cell_range: f64, cell_radius: f64) {
    let header = ray.header;
    let cross = fourdd::grid::angular_distance(header.azimuth, cell_azimuth) as f64;
    for (gate, value) in ray.gates_mut().iter_mut().enumerate() {
        let range = header.gate_center_range(gate);
        let along = range - cell_range;
        let across = range * cross.to_radians();
        let distance = (along * along + across * across).sqrt() / cell_radius.max(1.0);
        *value = peak_dbz - 12.0 * distance as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::ScenarioConfig;

    #[test]
    fn reflectivity_peaks_inside_cell() {
        let config = ScenarioConfig::default();
        let template = config.empty_volume();
        let dbz = storm_cell(&template, 50.0, 0.0, 20_000.0, 10_000.0);
        let ray = &dbz.sweeps[0].rays[0];
        let center_gate = ((20_000.0 - ray.header.range_first_gate as f64)
            / ray.header.gate_size as f64) as usize;
        let peak = ray.gate(center_gate).unwrap();
        assert!(peak > 49.0);
        assert!(ray.gate(ray.num_gates() - 1).unwrap() < peak);
    }
}
