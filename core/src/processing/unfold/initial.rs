use super::state::{GateState, StateGrid};
use super::{unfold_toward, SweepContext};
use crate::grid::{is_missing_value, GateStorage, Sweep};

const DENSE_NEIGHBORS: usize = 5;
const DENSE_NEIGHBORS_AT_EDGE: usize = 3;

/// Reference values available for one gate.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct References {
    pub previous: Option<f32>,
    pub above: Option<f32>,
    pub first_guess: Option<f32>,
}

/// Unfolds `raw` against whichever references the situation calls for.
///
/// Without a previous volume the first guess leads, cross-checked against
/// the sweep above when one exists. With a previous volume the previous
/// value leads and must agree with the sweep above; in strict mode it must
/// also agree with the first guess. Returns `None` when no combination of
/// references applies or the agreement checks fail.
pub fn reference_unfold(
    raw: f32,
    references: References,
    has_previous_volume: bool,
    strict: bool,
    nyquist: f32,
    threshold: f32,
    max_count: usize,
) -> Option<f32> {
    let agrees = |reference: f32, value: f32| (reference - value).abs() < threshold;
    let unfold = |reference: f32| unfold_toward(raw, reference, nyquist, max_count);

    let References {
        previous,
        above,
        first_guess,
    } = references;

    if !has_previous_volume {
        return match (first_guess, above) {
            (Some(guess), None) => Some(unfold(guess)).filter(|v| agrees(guess, *v)),
            (Some(guess), Some(above)) => {
                Some(unfold(above)).filter(|v| agrees(above, *v) && agrees(guess, *v))
            }
            _ => None,
        };
    }

    match (previous, above, first_guess) {
        (Some(prev), Some(above), Some(guess)) if strict => Some(unfold(prev))
            .filter(|v| agrees(prev, *v) && agrees(above, *v) && agrees(guess, *v)),
        (Some(prev), Some(above), _) if !strict => {
            Some(unfold(prev)).filter(|v| agrees(prev, *v) && agrees(above, *v))
        }
        _ => None,
    }
}

/// Blanks the output sweep and marks each gate pending or missing.
///
/// Gates before `first_gate`, missing input and, when the density filter is
/// on, isolated gates are missing.
pub(crate) fn classify<G: GateStorage>(
    context: &SweepContext<'_>,
    output: &mut Sweep<G>,
) -> StateGrid {
    let mut states = StateGrid::new(output.num_rays(), context.original.max_gates());
    for ray in output.rays.iter_mut() {
        ray.gates_mut().fill(context.missing);
    }
    for (r, ray) in context.original.rays.iter().enumerate() {
        for g in context.first_gate..ray.num_gates() {
            if context.raw(r, g).is_none() {
                continue;
            }
            if !context.config.filter || is_dense(context, &states, r, g) {
                states.set(r, g, GateState::Pending);
            }
        }
    }
    states
}

fn is_dense(context: &SweepContext<'_>, states: &StateGrid, ray: usize, gate: usize) -> bool {
    let last_gate = context.last_gate(ray);
    let valid = states
        .neighborhood(ray, gate, context.first_gate, last_gate)
        .iter()
        .filter(|(r, g)| context.raw(*r, *g).is_some())
        .count();
    let at_edge = gate == context.first_gate || gate == last_gate;
    valid >= DENSE_NEIGHBORS || (at_edge && valid >= DENSE_NEIGHBORS_AT_EDGE)
}

/// Seeds the sweep from the previous volume, the sweep above and the first guess.
pub(crate) fn reference_pass<G: GateStorage>(
    context: &SweepContext<'_>,
    output: &mut Sweep<G>,
    above: Option<&Sweep<G>>,
    states: &mut StateGrid,
) -> usize {
    let config = context.config;
    let threshold = config.fraction() * context.nyquist;
    let above_index = above.map(|sweep| sweep.azimuth_index());
    let mut seeded = 0;

    for (r, ray) in context.original.rays.iter().enumerate() {
        let azimuth = ray.header.azimuth;
        let above_ray = above
            .zip(above_index.as_ref())
            .and_then(|(sweep, index)| index.nearest(azimuth).map(|i| &sweep.rays[i]));

        for g in context.first_gate..ray.num_gates() {
            if states.get(r, g) != GateState::Pending {
                continue;
            }
            let Some(raw) = context.raw(r, g) else {
                continue;
            };
            if raw.abs() <= config.ck_val {
                continue;
            }
            let previous = context.previous_at(azimuth, g);
            // the top sweep has nothing above it, so the previous volume stands in
            let above_value = if context.is_top && context.has_previous {
                previous
            } else {
                above_ray
                    .and_then(|ray| ray.gate(g))
                    .filter(|v| !is_missing_value(*v, context.missing))
            };
            let references = References {
                previous,
                above: above_value,
                first_guess: context.first_guess_at(r, g),
            };
            if let Some(value) = reference_unfold(
                raw,
                references,
                context.has_previous,
                config.strict_first_pass,
                context.nyquist,
                threshold,
                config.max_count,
            ) {
                output.rays[r].gates_mut()[g] = value;
                states.set(r, g, GateState::Dealiased);
                seeded += 1;
            }
        }
    }
    seeded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::volume::test_support::uniform_volume;
    use crate::grid::DEFAULT_MISSING;
    use crate::prelude::DealiasConfig;

    const NYQ: f32 = 10.0;
    const THRESHOLD: f32 = 2.5;

    fn run(raw: f32, references: References, has_previous: bool, strict: bool) -> Option<f32> {
        reference_unfold(raw, references, has_previous, strict, NYQ, THRESHOLD, 10)
    }

    #[test]
    fn first_guess_alone_seeds_without_previous_volume() {
        let refs = References {
            first_guess: Some(12.0),
            ..Default::default()
        };
        assert_eq!(run(-7.0, refs, false, false), Some(13.0));
        // residual beyond the threshold is rejected
        assert_eq!(run(-4.0, refs, false, false), None);
    }

    #[test]
    fn sweep_above_must_agree_with_first_guess() {
        let agreeing = References {
            above: Some(14.0),
            first_guess: Some(12.5),
            ..Default::default()
        };
        assert_eq!(run(-7.0, agreeing, false, false), Some(13.0));
        let disagreeing = References {
            above: Some(14.0),
            first_guess: Some(5.0),
            ..Default::default()
        };
        assert_eq!(run(-7.0, disagreeing, false, false), None);
    }

    #[test]
    fn previous_volume_needs_sweep_above() {
        let refs = References {
            previous: Some(5.0),
            ..Default::default()
        };
        assert_eq!(run(-15.0, refs, true, false), None);
        let refs = References {
            above: Some(6.0),
            ..refs
        };
        assert_eq!(run(-15.0, refs, true, false), Some(5.0));
    }

    #[test]
    fn strict_mode_also_checks_first_guess() {
        let refs = References {
            previous: Some(5.0),
            above: Some(5.5),
            first_guess: Some(-3.0),
        };
        assert_eq!(run(-15.0, refs, true, false), Some(5.0));
        assert_eq!(run(-15.0, refs, true, true), None);
        let consistent = References {
            first_guess: Some(4.0),
            ..refs
        };
        assert_eq!(run(-15.0, consistent, true, true), Some(5.0));
        let no_guess = References {
            first_guess: None,
            ..refs
        };
        assert_eq!(run(-15.0, no_guess, true, true), None);
    }

    #[test]
    fn agreement_is_symmetric() {
        // reference below the unfolded value must be judged by magnitude
        let refs = References {
            previous: Some(-5.0),
            above: Some(-6.5),
            ..Default::default()
        };
        assert_eq!(run(15.0, refs, true, false), Some(-5.0));
        let refs = References {
            above: Some(-1.0),
            ..refs
        };
        assert_eq!(run(15.0, refs, true, false), None);
    }

    fn context<'a>(config: &'a DealiasConfig, sweep: &'a Sweep) -> SweepContext<'a> {
        SweepContext {
            config,
            original: sweep,
            previous: None,
            first_guess: None,
            has_previous: false,
            has_first_guess: false,
            is_top: true,
            second_pass: false,
            nyquist: NYQ,
            missing: DEFAULT_MISSING,
            first_gate: config.del_num_bins,
        }
    }

    /// Dense body at gates 0-9, a lone speckle, and a three-gate cluster at the far end.
    fn speckled_sweep() -> Sweep {
        uniform_volume(&[0.5], 16, 20, NYQ, |_, r, g| {
            let body = g <= 9;
            let speckle = (r, g) == (8, 15);
            let tail = matches!((r, g), (2, 19) | (3, 19) | (4, 19) | (3, 18));
            if body || speckle || tail {
                4.0
            } else {
                DEFAULT_MISSING
            }
        })
        .sweeps
        .remove(0)
    }

    #[test]
    fn density_filter_demotes_sparse_gates() {
        let config = DealiasConfig {
            del_num_bins: 0,
            ..Default::default()
        };
        let sweep = speckled_sweep();
        let mut output = sweep.clone();
        let states = classify(&context(&config, &sweep), &mut output);

        assert_eq!(states.get(8, 15), GateState::Missing);
        assert_eq!(states.get(5, 5), GateState::Pending);
        // first gate has five neighbors, gate 9 loses the row beyond it
        assert_eq!(states.get(5, 0), GateState::Pending);
        assert_eq!(states.get(5, 9), GateState::Pending);
        // last gate with exactly three valid neighbors survives
        assert_eq!(states.get(3, 19), GateState::Pending);
        // three neighbors away from the edge are not enough
        assert_eq!(states.get(3, 18), GateState::Missing);
        assert_eq!(states.get(2, 19), GateState::Missing);
        assert_eq!(states.get(0, 12), GateState::Missing);
        assert!(output.rays.iter().all(|ray| ray.gates().iter().all(|v| *v == DEFAULT_MISSING)));
    }

    #[test]
    fn disabled_density_filter_keeps_every_valid_gate() {
        let config = DealiasConfig {
            del_num_bins: 0,
            filter: false,
            ..Default::default()
        };
        let sweep = speckled_sweep();
        let mut output = sweep.clone();
        let states = classify(&context(&config, &sweep), &mut output);

        for (r, g) in [(8, 15), (3, 18), (2, 19), (3, 19), (5, 5)] {
            assert_eq!(states.get(r, g), GateState::Pending, "ray {} gate {}", r, g);
        }
        assert_eq!(states.get(0, 12), GateState::Missing);
        assert_eq!(states.count(GateState::Pending), 16 * 10 + 5);
    }

    #[test]
    fn leading_gates_stay_missing_with_shifted_edge() {
        let config = DealiasConfig {
            del_num_bins: 2,
            ..Default::default()
        };
        let sweep = speckled_sweep();
        let mut output = sweep.clone();
        let states = classify(&context(&config, &sweep), &mut output);
        assert_eq!(states.get(5, 1), GateState::Missing);
        // gate 2 is now the first usable gate: five neighbors, previous row excluded
        assert_eq!(states.get(5, 2), GateState::Pending);
    }
}
