use crate::generator::profile::{fold_volume, sounding, truth_volume};
use crate::generator::template::storm_cell;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use fourdd::grid::codec::DEFAULT_MISSING_CODE;
use fourdd::grid::{EncodedVolume, Volume};
use fourdd::processing::Dealiaser;
use fourdd::sounding::{CatalogProfileSource, ProfileSource, UniformWindSource};
use fourdd::telemetry::{LogManager, MetricsRecorder, MetricsSnapshot};
use serde::Serialize;

/// Per-volume comparison against the unfolded truth.
#[derive(Debug, Clone, Serialize)]
pub struct VolumeSummary {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub unfolded: bool,
    pub first_guess_source: Option<String>,
    pub gates_dealiased: usize,
    pub gates_removed: usize,
    pub gates_prefiltered: usize,
    /// Output gates within a quarter Nyquist of the truth.
    pub gates_matched: usize,
    pub gates_valid: usize,
    pub rms_error: f32,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub volumes: Vec<VolumeSummary>,
    pub metrics: MetricsSnapshot,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let scenario = &self.config.scenario;
        let dealiaser =
            Dealiaser::new(self.config.dealias.clone()).context("building dealiaser")?;
        let metrics = MetricsRecorder::new();
        let logger = LogManager::verbose(self.config.dealias.verbose);
        let direction_sign = self.config.dealias.direction_sign;

        let mut previous: Option<Volume> = None;
        let mut volumes = Vec::with_capacity(scenario.volumes);
        for index in 0..scenario.volumes {
            let time = scenario.volume_time(index);
            let truth = truth_volume(scenario, index, direction_sign);
            let folded = fold_volume(&truth, scenario.noise, scenario.seed + index as u64);
            // exercise the same quantization an archive round trip applies
            let mut velocity = EncodedVolume::encode(&folded, DEFAULT_MISSING_CODE)
                .with_context(|| format!("encoding volume {}", index))?
                .decode(folded.missing_value());
            velocity.set_time(Some(time));
            if let Some(nyquist) = self.config.nyquist_override {
                velocity.override_nyquist(nyquist);
            } else if self.config.estimate_nyquist {
                velocity.estimate_nyquist_from_velocity();
            }

            let reflectivity = self.config.use_reflectivity.then(|| {
                storm_cell(
                    &velocity,
                    scenario.peak_dbz,
                    45.0,
                    scenario.range_first_gate as f64
                        + scenario.gate_size as f64 * scenario.num_gates as f64 / 2.0,
                    scenario.gate_size as f64 * scenario.num_gates as f64,
                )
            });
            let mut sources = self.sources(index)?;

            let mut summary = VolumeSummary {
                index,
                time,
                unfolded: false,
                first_guess_source: None,
                gates_dealiased: 0,
                gates_removed: 0,
                gates_prefiltered: 0,
                gates_matched: 0,
                gates_valid: 0,
                rms_error: 0.0,
                error: None,
            };

            if self.config.emit_first_guess {
                match dealiaser.emit_first_guess(&mut velocity, &mut sources, time) {
                    Ok(source) => summary.first_guess_source = source,
                    Err(err) => {
                        metrics.record_error();
                        summary.error = Some(err.to_string());
                    }
                }
            } else {
                // dealias through a borrowed view, as a caller owning the gate buffers would
                let mut view = velocity.view_mut();
                match dealiaser.dealias(
                    &mut view,
                    previous.as_ref(),
                    reflectivity.as_ref(),
                    &mut sources,
                    time,
                ) {
                    Ok(outcome) => {
                        summary.unfolded = outcome.unfolded;
                        summary.first_guess_source = outcome.first_guess_source;
                        summary.gates_prefiltered =
                            outcome.prefilter.map(|p| p.total()).unwrap_or(0);
                        if let Some(report) = &outcome.report {
                            summary.gates_dealiased = report.total_dealiased();
                            summary.gates_removed = report.total_removed();
                        }
                        metrics.record_volume(outcome.unfolded, summary.gates_dealiased);
                    }
                    Err(err) => {
                        logger.warn(&format!("volume {} failed: {}", index, err));
                        metrics.record_error();
                        summary.error = Some(err.to_string());
                    }
                }
            }

            score(&velocity, &truth, &mut summary);
            logger.record(&format!(
                "volume {}: {} of {} gates within tolerance, rms {:.3}",
                index, summary.gates_matched, summary.gates_valid, summary.rms_error
            ));
            if summary.unfolded {
                previous = Some(velocity);
            }
            volumes.push(summary);
        }

        Ok(WorkflowResult {
            volumes,
            metrics: metrics.snapshot(),
        })
    }

    fn sources(&self, index: usize) -> anyhow::Result<Vec<Box<dyn ProfileSource>>> {
        let scenario = &self.config.scenario;
        let look_back = Duration::seconds(self.config.dealias.sounding_look_back_secs);
        let mut sources: Vec<Box<dyn ProfileSource>> = Vec::new();
        if self.config.use_sounding {
            let record = sounding(scenario, index)
                .with_context(|| format!("building sounding for volume {}", index))?;
            sources.push(Box::new(CatalogProfileSource::from_records(
                vec![record],
                look_back,
            )));
        }
        if self.config.use_average_wind {
            let (u, v) = scenario.wind_at(0.0, index);
            sources.push(Box::new(UniformWindSource::new(
                u,
                v,
                self.config.dealias.wind_alt_min,
                self.config.dealias.wind_alt_max,
            )));
        }
        Ok(sources)
    }
}

fn score(output: &Volume, truth: &Volume, summary: &mut VolumeSummary) {
    let mut sum_sq = 0.0_f64;
    for (out_sweep, truth_sweep) in output.sweeps.iter().zip(&truth.sweeps) {
        for (out_ray, truth_ray) in out_sweep.rays.iter().zip(&truth_sweep.rays) {
            let tolerance = 0.25 * out_ray.header.nyquist_velocity;
            for (value, expected) in out_ray.gates().iter().zip(truth_ray.gates()) {
                if output.is_missing(*value) {
                    continue;
                }
                let error = value - expected;
                summary.gates_valid += 1;
                if error.abs() < tolerance {
                    summary.gates_matched += 1;
                }
                sum_sq += (error as f64).powi(2);
            }
        }
    }
    if summary.gates_valid > 0 {
        summary.rms_error = (sum_sq / summary.gates_valid as f64).sqrt() as f32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::ScenarioConfig;

    fn small_config() -> WorkflowConfig {
        let mut cfg = WorkflowConfig::from_args(2, 12.0, 3);
        cfg.scenario = ScenarioConfig {
            elevations: vec![0.5, 1.5],
            num_rays: 72,
            num_gates: 60,
            noise: 0.2,
            volumes: 2,
            ..cfg.scenario
        };
        cfg.use_reflectivity = false;
        cfg
    }

    #[test]
    fn runner_unfolds_sequence_against_truth() {
        let cfg = small_config();
        let result = Runner::new(cfg).execute().unwrap();
        assert_eq!(result.volumes.len(), 2);
        assert_eq!(result.metrics.processed, 2);
        for summary in &result.volumes {
            assert!(summary.unfolded);
            assert_eq!(summary.first_guess_source.as_deref(), Some("scenario sounding"));
            assert!(summary.gates_matched as f32 > 0.95 * summary.gates_valid as f32);
        }
    }

    #[test]
    fn estimated_nyquist_still_unfolds() {
        let mut cfg = small_config();
        cfg.estimate_nyquist = true;
        cfg.scenario.volumes = 1;
        let result = Runner::new(cfg).execute().unwrap();
        assert!(result.volumes[0].unfolded);
    }

    #[test]
    fn runner_without_references_restores_every_volume() {
        let mut cfg = small_config();
        cfg.use_sounding = false;
        let result = Runner::new(cfg).execute().unwrap();
        assert!(result.volumes.iter().all(|v| !v.unfolded));
        assert_eq!(result.metrics.restored, 2);
    }

    #[test]
    fn emit_first_guess_tracks_truth() {
        let mut cfg = small_config();
        cfg.emit_first_guess = true;
        cfg.scenario.volumes = 1;
        let result = Runner::new(cfg).execute().unwrap();
        let summary = &result.volumes[0];
        assert_eq!(summary.first_guess_source.as_deref(), Some("scenario sounding"));
        assert!(summary.rms_error < 0.5);
    }
}
