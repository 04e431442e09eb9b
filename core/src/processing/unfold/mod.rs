//! Multi-pass 4DD unfolding, one sweep at a time from the top down.
//!
//! Each sweep goes through classification, a reference-based initial pass,
//! spatial propagation, the window fallback and optionally a second pass
//! against the first guess alone. Classification lives in a scratch
//! [`StateGrid`] dropped when the sweep is done.

pub mod initial;
pub mod second_pass;
pub mod spatial;
pub mod state;
pub mod window;

pub use initial::{reference_unfold, References};
pub use state::{GateState, StateGrid};
pub use window::{judge_window, WindowDecision};

use crate::grid::{is_missing_value, AzimuthIndex, GateStorage, Sweep, Volume};
use crate::prelude::{DealiasConfig, DealiasError, DealiasResult};
use crate::telemetry::log::LogManager;
use serde::Serialize;

/// Shifts `value` by whole Nyquist intervals toward `reference`, at most `max_count` times.
pub fn unfold_toward(value: f32, reference: f32, nyquist: f32, max_count: usize) -> f32 {
    let interval = 2.0 * nyquist;
    let mut unfolded = value;
    let mut count = 0;
    while (reference - unfolded).abs() > 0.99999 * nyquist && count < max_count {
        if reference > unfolded {
            unfolded += interval;
        } else {
            unfolded -= interval;
        }
        count += 1;
    }
    unfolded
}

/// Gates resolved by each step of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub initial: usize,
    pub spatial: usize,
    pub window: usize,
    /// Written from the window but not trusted by neighbors.
    pub window_isolated: usize,
    /// Written unshifted because no window or reference could be found.
    pub kept_raw: usize,
    pub second_pass: usize,
    /// Valid input gates left missing in the output.
    pub removed: usize,
    /// Spatial propagation passes over the sweep.
    pub passes: usize,
    /// Gates classified dealiased when the sweep finished.
    pub dealiased: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnfoldReport {
    /// Indexed like the volume's sweeps.
    pub sweeps: Vec<SweepReport>,
}

impl UnfoldReport {
    pub fn total_dealiased(&self) -> usize {
        self.sweeps.iter().map(|s| s.dealiased).sum()
    }

    pub fn total_removed(&self) -> usize {
        self.sweeps.iter().map(|s| s.removed).sum()
    }
}

/// Sweep of a reference volume, with that volume's missing sentinel.
pub(crate) struct ReferenceSweep<'a> {
    pub sweep: &'a Sweep,
    pub missing: f32,
}

impl<'a> ReferenceSweep<'a> {
    pub fn value(&self, ray: usize, gate: usize) -> Option<f32> {
        self.sweep
            .gate(ray, gate)
            .filter(|v| !is_missing_value(*v, self.missing))
    }
}

/// Read-only inputs shared by every step of one sweep.
pub(crate) struct SweepContext<'a> {
    pub config: &'a DealiasConfig,
    /// Untouched input values.
    pub original: &'a Sweep,
    pub previous: Option<(ReferenceSweep<'a>, AzimuthIndex)>,
    pub first_guess: Option<ReferenceSweep<'a>>,
    pub has_previous: bool,
    pub has_first_guess: bool,
    pub is_top: bool,
    pub second_pass: bool,
    pub nyquist: f32,
    pub missing: f32,
    pub first_gate: usize,
}

impl<'a> SweepContext<'a> {
    pub fn raw(&self, ray: usize, gate: usize) -> Option<f32> {
        self.original
            .gate(ray, gate)
            .filter(|v| !is_missing_value(*v, self.missing))
    }

    pub fn first_guess_at(&self, ray: usize, gate: usize) -> Option<f32> {
        self.first_guess.as_ref().and_then(|fg| fg.value(ray, gate))
    }

    /// Value of the previous volume at the ray nearest `azimuth`.
    pub fn previous_at(&self, azimuth: f32, gate: usize) -> Option<f32> {
        let (reference, index) = self.previous.as_ref()?;
        reference.value(index.nearest(azimuth)?, gate)
    }

    /// Index of the last gate of `ray` in the input.
    pub fn last_gate(&self, ray: usize) -> usize {
        self.original
            .rays
            .get(ray)
            .map(|r| r.num_gates().saturating_sub(1))
            .unwrap_or(0)
    }
}

/// Runs the per-sweep state machine over a whole volume.
pub struct UnfoldEngine {
    config: DealiasConfig,
    logger: LogManager,
}

impl UnfoldEngine {
    pub fn new(config: &DealiasConfig) -> Self {
        Self {
            config: config.clone(),
            logger: LogManager::verbose(config.verbose),
        }
    }

    /// Unfolds `velocity` in place against the previous volume and/or first guess.
    ///
    /// Errors are raised before any gate is written.
    pub fn unfold<G: GateStorage>(
        &self,
        velocity: &mut Volume<G>,
        previous: Option<&Volume>,
        first_guess: Option<&Volume>,
    ) -> DealiasResult<UnfoldReport> {
        if previous.is_none() && first_guess.is_none() {
            return Err(DealiasError::InsufficientData(
                "neither a previous volume nor a first guess is available".into(),
            ));
        }
        if let Some(prev) = previous {
            if prev.num_sweeps() != velocity.num_sweeps() {
                return Err(DealiasError::GeometryMismatch(format!(
                    "previous volume has {} sweeps, current has {}",
                    prev.num_sweeps(),
                    velocity.num_sweeps()
                )));
            }
        }
        if let Some(guess) = first_guess {
            velocity.verify_same_shape(guess)?;
        }
        if let Some((sweep, nyquist)) = velocity.find_invalid_nyquist() {
            return Err(DealiasError::Degenerate(format!(
                "sweep {} has Nyquist velocity {}",
                sweep, nyquist
            )));
        }

        let original = velocity.deep_copy();
        let missing = velocity.missing_value();
        let num_sweeps = velocity.num_sweeps();
        let second_pass = self
            .config
            .second_pass
            .applies(previous.is_some(), first_guess.is_some());
        let mut report = UnfoldReport {
            sweeps: vec![SweepReport::default(); num_sweeps],
        };

        for s in (0..num_sweeps).rev() {
            let source = &original.sweeps[s];
            let Some(nyquist) = source.nyquist_velocity() else {
                continue;
            };
            let context = SweepContext {
                config: &self.config,
                original: source,
                previous: previous.map(|prev| {
                    (
                        ReferenceSweep {
                            sweep: &prev.sweeps[s],
                            missing: prev.missing_value(),
                        },
                        prev.sweeps[s].azimuth_index(),
                    )
                }),
                first_guess: first_guess.map(|guess| ReferenceSweep {
                    sweep: &guess.sweeps[s],
                    missing: guess.missing_value(),
                }),
                has_previous: previous.is_some(),
                has_first_guess: first_guess.is_some(),
                is_top: s + 1 == num_sweeps,
                second_pass,
                nyquist,
                missing,
                first_gate: self.config.del_num_bins,
            };
            let (lower, upper) = velocity.sweeps.split_at_mut(s + 1);
            let sweep_report = self.unfold_sweep(&context, &mut lower[s], upper.first());
            self.logger.detail(|| format!("sweep {}: {:?}", s, sweep_report));
            report.sweeps[s] = sweep_report;
        }

        self.logger.record(&format!(
            "unfolded {} gates across {} sweeps, {} removed",
            report.total_dealiased(),
            num_sweeps,
            report.total_removed()
        ));
        Ok(report)
    }

    fn unfold_sweep<G: GateStorage>(
        &self,
        context: &SweepContext<'_>,
        output: &mut Sweep<G>,
        above: Option<&Sweep<G>>,
    ) -> SweepReport {
        let mut report = SweepReport::default();
        let mut states = initial::classify(context, output);
        report.initial = initial::reference_pass(context, output, above, &mut states);

        let spatial = spatial::propagate(context, output, &mut states, spatial::Seeds::Any);
        report.spatial = spatial.dealiased;
        report.passes = spatial.passes;

        let tally = window::fallback(context, output, &mut states);
        report.window = tally.dealiased;
        report.window_isolated = tally.isolated;
        report.kept_raw = tally.kept_raw;

        if context.second_pass {
            report.second_pass = second_pass::run(context, output, &mut states);
        }

        report.dealiased = states.count(GateState::Dealiased);
        report.removed = count_removed(context, output);
        report
    }
}

fn count_removed<G: GateStorage>(context: &SweepContext<'_>, output: &Sweep<G>) -> usize {
    output
        .rays
        .iter()
        .enumerate()
        .map(|(r, ray)| {
            ray.gates()
                .iter()
                .enumerate()
                .filter(|(g, v)| {
                    is_missing_value(**v, context.missing) && context.raw(r, *g).is_some()
                })
                .count()
        })
        .sum()
}
