pub mod dealiaser;
pub mod first_guess;
pub mod prefilter;
pub mod unfold;

pub use dealiaser::{DealiasOutcome, Dealiaser};
pub use first_guess::{radial_velocity, FirstGuess, FirstGuessGenerator, WindProfile};
pub use prefilter::{PrefilterReport, ReflectivityFilter};
pub use unfold::{unfold_toward, GateState, SweepReport, UnfoldEngine, UnfoldReport};
