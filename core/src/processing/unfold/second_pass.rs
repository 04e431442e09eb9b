use super::spatial::{self, Seeds};
use super::state::{GateState, StateGrid};
use super::{unfold_toward, SweepContext};
use crate::grid::{GateStorage, Sweep};

/// Unfolds leftover pending gates against the first guess alone, then
/// propagates from first-guess-consistent neighbors.
pub(crate) fn run<G: GateStorage>(
    context: &SweepContext<'_>,
    output: &mut Sweep<G>,
    states: &mut StateGrid,
) -> usize {
    if context.first_guess.is_none() {
        return 0;
    }
    let config = context.config;
    let threshold = config.fraction2() * context.nyquist;
    let mut dealiased = 0;

    for (r, ray) in context.original.rays.iter().enumerate() {
        for g in context.first_gate..ray.num_gates() {
            if states.get(r, g) != GateState::Pending {
                continue;
            }
            let (Some(raw), Some(guess)) = (context.raw(r, g), context.first_guess_at(r, g)) else {
                continue;
            };
            if raw.abs() <= config.ck_val {
                continue;
            }
            let unfolded = unfold_toward(raw, guess, context.nyquist, config.max_count);
            if (guess - unfolded).abs() < threshold {
                output.rays[r].gates_mut()[g] = unfolded;
                states.set(r, g, GateState::Dealiased);
                dealiased += 1;
            }
        }
    }

    dealiased + spatial::propagate(context, output, states, Seeds::ConsistentWithFirstGuess).dealiased
}
