use super::state::{GateState, StateGrid};
use super::SweepContext;
use crate::grid::{GateStorage, Sweep};

/// Which dealiased neighbors may vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Seeds {
    /// Every dealiased neighbor.
    Any,
    /// Only neighbors that agree with the first guess.
    ConsistentWithFirstGuess,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SpatialTally {
    pub dealiased: usize,
    pub passes: usize,
}

/// Neighbor votes for one candidate value.
#[derive(Debug, Clone, Copy, Default)]
struct Votes {
    within: usize,
    outside: usize,
    /// Neighbors more than a Nyquist above the candidate.
    positive: usize,
    negative: usize,
    pending: usize,
}

impl Votes {
    fn dealiased(&self) -> usize {
        self.within + self.outside
    }

    fn folds(&self) -> usize {
        self.positive + self.negative
    }
}

enum Outcome {
    Accept,
    /// No usable neighbor now or later.
    Isolated,
    /// No dealiased neighbor yet; revisit on the next pass.
    Wait,
    /// Undecided; revisit on a later pass.
    Defer,
    Fail,
}

/// Grows the dealiased region through neighbor continuity until a pass changes nothing.
///
/// Passes scan gate by gate outward in range, alternating the ray direction.
/// Gates that cannot be decided end up unsuccessful when seeded from any
/// neighbor, or missing when only first-guess-consistent neighbors vote.
pub(crate) fn propagate<G: GateStorage>(
    context: &SweepContext<'_>,
    output: &mut Sweep<G>,
    states: &mut StateGrid,
    seeds: Seeds,
) -> SpatialTally {
    let interval = 2.0 * context.nyquist;
    let max_gates = context.original.max_gates();
    let num_rays = states.num_rays();
    let fail_state = match seeds {
        Seeds::Any => GateState::Unsuccessful,
        Seeds::ConsistentWithFirstGuess => GateState::Missing,
    };
    let mut tally = SpatialTally::default();

    loop {
        tally.passes += 1;
        let pass = tally.passes;
        let mut changed = false;
        let mut deferred = false;

        for g in context.first_gate..max_gates {
            for k in 0..num_rays {
                let r = if pass % 2 == 1 { k } else { num_rays - 1 - k };
                if states.get(r, g) != GateState::Pending {
                    continue;
                }
                let Some(raw) = context.raw(r, g) else {
                    continue;
                };

                let mut candidate = raw;
                let mut outcome = Outcome::Fail;
                for _ in 0..context.config.max_count {
                    let votes = assess(context, output, states, seeds, r, g, candidate);
                    if pass == 1
                        && seeds == Seeds::Any
                        && votes.dealiased() == 0
                        && votes.pending == 0
                    {
                        outcome = Outcome::Isolated;
                        break;
                    }
                    if votes.dealiased() == 0 {
                        outcome = Outcome::Wait;
                        break;
                    }
                    if votes.within > 0 && votes.outside == 0 {
                        outcome = Outcome::Accept;
                        break;
                    }
                    if votes.folds() < votes.dealiased() - votes.folds() {
                        // mostly near but not within: settle only once the region has grown
                        outcome = if pass > 2 {
                            Outcome::Accept
                        } else {
                            Outcome::Defer
                        };
                        break;
                    }
                    if votes.positive > votes.negative {
                        candidate += interval;
                    } else if votes.negative > votes.positive {
                        candidate -= interval;
                    } else {
                        outcome = if pass > 4 {
                            Outcome::Fail
                        } else {
                            Outcome::Defer
                        };
                        break;
                    }
                }

                match outcome {
                    Outcome::Accept => {
                        output.rays[r].gates_mut()[g] = candidate;
                        states.set(r, g, GateState::Dealiased);
                        tally.dealiased += 1;
                        changed = true;
                    }
                    Outcome::Isolated => {
                        states.set(r, g, GateState::Missing);
                        changed = true;
                    }
                    Outcome::Fail => {
                        states.set(r, g, fail_state);
                        changed = true;
                    }
                    Outcome::Defer => deferred = true,
                    Outcome::Wait => {}
                }
            }
        }

        if !(changed || (deferred && pass <= 4)) {
            break;
        }
    }
    tally
}

fn assess<G: GateStorage>(
    context: &SweepContext<'_>,
    output: &Sweep<G>,
    states: &StateGrid,
    seeds: Seeds,
    ray: usize,
    gate: usize,
    candidate: f32,
) -> Votes {
    let nyquist = context.nyquist;
    let within_limit = context.config.pfraction() * nyquist;
    let guess_limit = context.config.fraction2() * nyquist;
    let mut votes = Votes::default();

    let cells = states.neighborhood(ray, gate, context.first_gate, context.last_gate(ray));
    for (r, g) in cells.iter() {
        match states.get(r, g) {
            GateState::Pending => votes.pending += 1,
            GateState::Dealiased => {
                let Some(value) = output.gate(r, g) else {
                    continue;
                };
                if seeds == Seeds::ConsistentWithFirstGuess {
                    match context.first_guess_at(r, g) {
                        Some(guess) if (value - guess).abs() < guess_limit => {}
                        _ => continue,
                    }
                }
                let diff = value - candidate;
                if diff.abs() < within_limit {
                    votes.within += 1;
                } else {
                    votes.outside += 1;
                    if diff > nyquist {
                        votes.positive += 1;
                    } else if diff < -nyquist {
                        votes.negative += 1;
                    }
                }
            }
            GateState::Missing | GateState::Unsuccessful => {}
        }
    }
    votes
}

#[cfg(test)]
mod tests {
    use super::super::ReferenceSweep;
    use super::*;
    use crate::grid::volume::test_support::uniform_volume;
    use crate::grid::{Volume, DEFAULT_MISSING};
    use crate::prelude::DealiasConfig;

    fn context<'a>(
        config: &'a DealiasConfig,
        original: &'a Volume,
        guess: Option<&'a Volume>,
    ) -> SweepContext<'a> {
        SweepContext {
            config,
            original: &original.sweeps[0],
            previous: None,
            first_guess: guess.map(|g| ReferenceSweep {
                sweep: &g.sweeps[0],
                missing: DEFAULT_MISSING,
            }),
            has_previous: false,
            has_first_guess: guess.is_some(),
            is_top: true,
            second_pass: false,
            nyquist: 10.0,
            missing: DEFAULT_MISSING,
            first_gate: 0,
        }
    }

    fn all_pending(num_rays: usize, num_gates: usize) -> StateGrid {
        let mut states = StateGrid::new(num_rays, num_gates);
        for r in 0..num_rays {
            for g in 0..num_gates {
                states.set(r, g, GateState::Pending);
            }
        }
        states
    }

    #[test]
    fn single_seed_unfolds_whole_sweep() {
        let config = DealiasConfig {
            del_num_bins: 0,
            ..Default::default()
        };
        // truth 12 everywhere, folded to -8
        let original = uniform_volume(&[0.5], 8, 5, 10.0, |_, _, _| -8.0);
        let mut output = original.clone();
        let ctx = context(&config, &original, None);
        let mut states = all_pending(8, 5);
        output.sweeps[0].rays[3].gates_mut()[2] = 12.0;
        states.set(3, 2, GateState::Dealiased);

        let tally = propagate(&ctx, &mut output.sweeps[0], &mut states, Seeds::Any);
        assert_eq!(tally.dealiased, 39);
        assert_eq!(states.count(GateState::Dealiased), 40);
        assert!(output.sweeps[0]
            .rays
            .iter()
            .all(|ray| ray.gates().iter().all(|v| *v == 12.0)));
    }

    #[test]
    fn gate_without_any_neighbor_becomes_missing() {
        let config = DealiasConfig::default();
        let original = uniform_volume(&[0.5], 4, 3, 10.0, |_, _, _| 2.0);
        let mut output = original.clone();
        let ctx = context(&config, &original, None);
        let mut states = StateGrid::new(4, 3);
        states.set(1, 1, GateState::Pending);
        propagate(&ctx, &mut output.sweeps[0], &mut states, Seeds::Any);
        assert_eq!(states.get(1, 1), GateState::Missing);
    }

    #[test]
    fn split_vote_fails_after_deferrals() {
        let config = DealiasConfig::default();
        let original = uniform_volume(&[0.5], 4, 3, 10.0, |_, _, _| 0.0);
        let mut output = original.clone();
        let ctx = context(&config, &original, None);
        let mut states = StateGrid::new(4, 3);
        states.set(1, 1, GateState::Pending);
        output.sweeps[0].rays[0].gates_mut()[1] = 15.0;
        states.set(0, 1, GateState::Dealiased);
        output.sweeps[0].rays[2].gates_mut()[1] = -15.0;
        states.set(2, 1, GateState::Dealiased);

        let tally = propagate(&ctx, &mut output.sweeps[0], &mut states, Seeds::Any);
        assert_eq!(states.get(1, 1), GateState::Unsuccessful);
        assert_eq!(tally.passes, 6);
        assert_eq!(output.sweeps[0].rays[1].gates()[1], 0.0);
    }

    #[test]
    fn second_pass_ignores_neighbors_that_contradict_first_guess() {
        let config = DealiasConfig::default();
        let original = uniform_volume(&[0.5], 4, 3, 10.0, |_, _, _| -8.0);
        let guess = uniform_volume(&[0.5], 4, 3, 10.0, |_, _, _| 12.0);
        let mut output = original.clone();
        let ctx = context(&config, &original, Some(&guess));
        let mut states = StateGrid::new(4, 3);
        states.set(1, 1, GateState::Pending);
        // agrees with the raw value but not with the first guess
        output.sweeps[0].rays[0].gates_mut()[1] = -8.0;
        states.set(0, 1, GateState::Dealiased);

        propagate(&ctx, &mut output.sweeps[0], &mut states, Seeds::ConsistentWithFirstGuess);
        assert_eq!(states.get(1, 1), GateState::Pending);

        output.sweeps[0].rays[2].gates_mut()[1] = 12.5;
        states.set(2, 1, GateState::Dealiased);
        propagate(&ctx, &mut output.sweeps[0], &mut states, Seeds::ConsistentWithFirstGuess);
        assert_eq!(states.get(1, 1), GateState::Dealiased);
        assert_eq!(output.sweeps[0].rays[1].gates()[1], 12.0);
    }
}
