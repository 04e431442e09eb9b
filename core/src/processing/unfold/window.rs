use super::state::{GateState, StateGrid};
use super::{unfold_toward, SweepContext};
use crate::grid::{GateStorage, Sweep};
use crate::math::{StatsHelper, WindowStats};
use crate::prelude::DealiasConfig;

/// Verdict on one gate from the statistics of its dealiased surroundings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowDecision {
    /// Close to the window mean; trusted by later steps.
    Accept(f32),
    /// Within the relaxed threshold; written but not trusted.
    AcceptIsolated(f32),
    Reject,
    /// Too few dealiased gates to judge.
    Sparse,
}

/// Judges `raw` against window statistics.
///
/// Windows with fewer than `min_good` samples are sparse, and windows whose
/// spread exceeds `std_thresh` of the Nyquist velocity are rejected outright.
pub fn judge_window(
    stats: Option<WindowStats>,
    raw: f32,
    nyquist: f32,
    config: &DealiasConfig,
) -> WindowDecision {
    let Some(stats) = stats.filter(|s| s.count >= config.min_good.max(1)) else {
        return WindowDecision::Sparse;
    };
    if stats.std_dev > config.std_thresh * nyquist {
        return WindowDecision::Reject;
    }
    let unfolded = unfold_toward(raw, stats.mean, nyquist, config.max_count);
    let residual = (stats.mean - unfolded).abs();
    if residual < config.pfraction() * nyquist {
        WindowDecision::Accept(unfolded)
    } else if residual < config.relaxed_fraction() * nyquist {
        WindowDecision::AcceptIsolated(unfolded)
    } else {
        WindowDecision::Reject
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WindowTally {
    pub dealiased: usize,
    pub isolated: usize,
    pub kept_raw: usize,
}

/// Statistics of dealiased gates in the `(2h+1)` square around `(ray, gate)`.
///
/// Rays wrap around the seam; when the window spans the sweep every ray is used once.
fn window_stats<G: GateStorage>(
    output: &Sweep<G>,
    states: &StateGrid,
    ray: usize,
    gate: usize,
    half_width: usize,
) -> Option<WindowStats> {
    let num_rays = output.num_rays();
    let width = 2 * half_width + 1;
    let rays: Vec<usize> = if width >= num_rays {
        (0..num_rays).collect()
    } else {
        (0..width)
            .map(|k| (ray + num_rays - half_width + k) % num_rays)
            .collect()
    };
    let low = gate.saturating_sub(half_width);
    let samples = rays.into_iter().flat_map(|r| {
        let high = (gate + half_width).min(output.rays[r].num_gates().saturating_sub(1));
        (low..=high).filter_map(move |g| {
            (states.get(r, g) == GateState::Dealiased)
                .then(|| output.gate(r, g))
                .flatten()
        })
    });
    StatsHelper::mean_std(samples)
}

/// Resolves pending and unsuccessful gates from local window means.
pub(crate) fn fallback<G: GateStorage>(
    context: &SweepContext<'_>,
    output: &mut Sweep<G>,
    states: &mut StateGrid,
) -> WindowTally {
    let config = context.config;
    let mut tally = WindowTally::default();

    for g in context.first_gate..context.original.max_gates() {
        for r in 0..states.num_rays() {
            let state = states.get(r, g);
            if !matches!(state, GateState::Pending | GateState::Unsuccessful) {
                continue;
            }
            let Some(raw) = context.raw(r, g) else {
                states.set(r, g, GateState::Missing);
                continue;
            };

            let mut stats = window_stats(output, states, r, g, config.proximity);
            if stats.map_or(true, |s| s.count < config.min_good) {
                stats = window_stats(output, states, r, g, 2 * config.proximity);
            }

            match judge_window(stats, raw, context.nyquist, config) {
                WindowDecision::Accept(value) => {
                    output.rays[r].gates_mut()[g] = value;
                    states.set(r, g, GateState::Dealiased);
                    tally.dealiased += 1;
                }
                WindowDecision::AcceptIsolated(value) => {
                    output.rays[r].gates_mut()[g] = value;
                    states.set(r, g, GateState::Missing);
                    tally.isolated += 1;
                }
                WindowDecision::Reject => states.set(r, g, GateState::Missing),
                WindowDecision::Sparse => match state {
                    // left for the first-guess pass
                    GateState::Pending if context.second_pass => {}
                    GateState::Pending if !(context.has_previous && context.has_first_guess) => {
                        output.rays[r].gates_mut()[g] = raw;
                        states.set(r, g, GateState::Missing);
                        tally.kept_raw += 1;
                    }
                    _ => states.set(r, g, GateState::Missing),
                },
            }
        }
    }
    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::volume::test_support::uniform_volume;
    use crate::grid::{Ray, Volume, DEFAULT_MISSING};
    use crate::prelude::SecondPassPolicy;
    use crate::processing::unfold::{SweepReport, UnfoldEngine};

    fn stats(count: usize, mean: f32, std_dev: f32) -> Option<WindowStats> {
        Some(WindowStats {
            count,
            mean,
            std_dev,
        })
    }

    #[test]
    fn accepts_near_window_mean() {
        let config = DealiasConfig::default();
        assert_eq!(
            judge_window(stats(8, 14.0, 1.0), -7.0, 10.0, &config),
            WindowDecision::Accept(13.0)
        );
    }

    #[test]
    fn relaxed_band_writes_without_trusting() {
        let config = DealiasConfig::default();
        // residual 5.5: beyond 0.4 * 10 but within 0.7 * 10
        assert_eq!(
            judge_window(stats(8, 18.5, 1.0), -7.0, 10.0, &config),
            WindowDecision::AcceptIsolated(13.0)
        );
    }

    #[test]
    fn spread_threshold_is_inclusive() {
        let config = DealiasConfig::default();
        assert_eq!(
            judge_window(stats(8, 14.0, 7.999), -7.0, 10.0, &config),
            WindowDecision::Accept(13.0)
        );
        assert_eq!(
            judge_window(stats(8, 14.0, 8.001), -7.0, 10.0, &config),
            WindowDecision::Reject
        );
    }

    #[test]
    fn too_few_samples_is_sparse() {
        let config = DealiasConfig::default();
        assert_eq!(
            judge_window(stats(4, 14.0, 1.0), -7.0, 10.0, &config),
            WindowDecision::Sparse
        );
        assert_eq!(judge_window(None, -7.0, 10.0, &config), WindowDecision::Sparse);
    }

    #[test]
    fn window_wraps_across_seam_and_clamps_short_rays() {
        let mut sweep = uniform_volume(&[0.5], 12, 6, 10.0, |_, r, _| r as f32)
            .sweeps
            .remove(0);
        let header = sweep.rays[11].header;
        sweep.rays[11] = Ray::filled(header, 1, 11.0);
        let mut states = StateGrid::new(12, 6);
        for r in [10, 11, 0, 1, 2, 5] {
            for g in 0..6 {
                states.set(r, g, GateState::Dealiased);
            }
        }
        // rays 11, 0 and 1 at gates 0 and 1; ray 11 has a single gate
        let stats = window_stats(&sweep, &states, 0, 0, 1).unwrap();
        assert_eq!(stats.count, 5);
        assert!((stats.mean - 2.6).abs() < 1e-5);

        let everything = window_stats(&sweep, &states, 0, 3, 6).unwrap();
        assert_eq!(everything.count, 31);
    }

    const NYQ: f32 = 10.0;

    fn engine_config(second_pass: SecondPassPolicy) -> DealiasConfig {
        DealiasConfig {
            del_num_bins: 0,
            filter: false,
            second_pass,
            ..Default::default()
        }
    }

    /// 4 m/s over gates 0-9 of every ray, missing beyond.
    fn body() -> Volume {
        uniform_volume(&[0.5], 36, 40, NYQ, |_, _, g| {
            if g <= 9 {
                4.0
            } else {
                DEFAULT_MISSING
            }
        })
    }

    /// The body plus a detached cluster whose gates take `raw(ray, gate)`.
    fn with_cluster(raw: impl Fn(usize, usize) -> Option<f32>) -> Volume {
        uniform_volume(&[0.5], 36, 40, NYQ, |_, r, g| {
            if g <= 9 {
                4.0
            } else {
                raw(r, g).unwrap_or(DEFAULT_MISSING)
            }
        })
    }

    fn unfold_with_guess(
        policy: SecondPassPolicy,
        velocity: &mut Volume,
        previous: Option<&Volume>,
    ) -> SweepReport {
        let guess = body();
        UnfoldEngine::new(&engine_config(policy))
            .unfold(velocity, previous, Some(&guess))
            .unwrap()
            .sweeps[0]
    }

    #[test]
    fn relaxed_window_values_are_written_but_not_sampled() {
        // gate 14 would pass the strict threshold if gate 13's values joined its window
        let mut velocity = with_cluster(|r, g| match (r, g) {
            (18 | 19, 13) => Some(9.5),
            (18 | 19, 14) => Some(8.5),
            _ => None,
        });
        let report = unfold_with_guess(SecondPassPolicy::RequireBoth, &mut velocity, None);
        assert_eq!(report.initial, 360);
        assert_eq!(report.window, 0);
        assert_eq!(report.window_isolated, 4);
        assert_eq!(report.dealiased, 360);
        assert_eq!(report.removed, 0);
        assert_eq!(velocity.value(0, 18, 13), Some(9.5));
        assert_eq!(velocity.value(0, 19, 14), Some(8.5));
    }

    #[test]
    fn sparse_window_retries_at_double_width() {
        // nothing dealiased within 5 gates of the cluster, plenty within 10
        let mut velocity = with_cluster(|r, g| {
            (matches!(r, 18 | 19) && matches!(g, 16 | 17)).then_some(5.0)
        });
        let report = unfold_with_guess(SecondPassPolicy::RequireBoth, &mut velocity, None);
        assert_eq!(report.window, 4);
        assert_eq!(report.dealiased, 364);
        assert_eq!(velocity.value(0, 19, 17), Some(5.0));
    }

    fn far_cluster() -> Volume {
        with_cluster(|r, g| {
            ((18..=20).contains(&r) && (30..=32).contains(&g)).then_some(-7.0)
        })
    }

    #[test]
    fn unreachable_gates_keep_raw_values_with_a_single_reference() {
        let mut velocity = far_cluster();
        let report = unfold_with_guess(SecondPassPolicy::RequireBoth, &mut velocity, None);
        assert_eq!(report.kept_raw, 9);
        assert_eq!(report.removed, 0);
        assert_eq!(report.dealiased, 360);
        assert_eq!(velocity.value(0, 19, 31), Some(-7.0));
    }

    #[test]
    fn unreachable_gates_wait_for_the_second_pass() {
        let mut velocity = far_cluster();
        // no first guess over the cluster, so the second pass cannot resolve it either
        let report =
            unfold_with_guess(SecondPassPolicy::FirstGuessAvailable, &mut velocity, None);
        assert_eq!(report.kept_raw, 0);
        assert_eq!(report.second_pass, 0);
        assert_eq!(report.removed, 9);
        assert_eq!(velocity.value(0, 19, 31), None);
    }

    #[test]
    fn unreachable_gates_are_removed_with_both_references() {
        let mut velocity = far_cluster();
        let previous = body();
        let report =
            unfold_with_guess(SecondPassPolicy::Disabled, &mut velocity, Some(&previous));
        assert_eq!(report.initial, 360);
        assert_eq!(report.kept_raw, 0);
        assert_eq!(report.removed, 9);
        assert_eq!(velocity.value(0, 19, 31), None);
    }

    fn fallback_on_empty_window(second_pass: bool) -> (StateGrid, Sweep, WindowTally) {
        let config = engine_config(SecondPassPolicy::RequireBoth);
        let original = uniform_volume(&[0.5], 16, 40, NYQ, |_, _, _| 6.0)
            .sweeps
            .remove(0);
        let context = SweepContext {
            config: &config,
            original: &original,
            previous: None,
            first_guess: None,
            has_previous: false,
            has_first_guess: false,
            is_top: true,
            second_pass,
            nyquist: NYQ,
            missing: DEFAULT_MISSING,
            first_gate: 0,
        };
        let mut output = uniform_volume(&[0.5], 16, 40, NYQ, |_, _, _| DEFAULT_MISSING)
            .sweeps
            .remove(0);
        let mut states = StateGrid::new(16, 40);
        states.set(5, 20, GateState::Unsuccessful);
        states.set(9, 30, GateState::Pending);
        let tally = fallback(&context, &mut output, &mut states);
        (states, output, tally)
    }

    #[test]
    fn unsuccessful_gate_without_window_is_abandoned() {
        let (states, output, tally) = fallback_on_empty_window(false);
        assert_eq!(states.get(5, 20), GateState::Missing);
        assert_eq!(output.gate(5, 20), Some(DEFAULT_MISSING));
        // a pending gate in the same spot keeps its raw value instead
        assert_eq!(states.get(9, 30), GateState::Missing);
        assert_eq!(output.gate(9, 30), Some(6.0));
        assert_eq!(
            tally,
            WindowTally {
                dealiased: 0,
                isolated: 0,
                kept_raw: 1
            }
        );
    }

    #[test]
    fn pending_gate_without_window_is_left_for_second_pass() {
        let (states, output, tally) = fallback_on_empty_window(true);
        assert_eq!(states.get(9, 30), GateState::Pending);
        assert_eq!(output.gate(9, 30), Some(DEFAULT_MISSING));
        assert_eq!(states.get(5, 20), GateState::Missing);
        assert_eq!(tally, WindowTally::default());
    }
}
