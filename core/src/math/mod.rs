pub mod geometry;
pub mod stats;

pub use geometry::{BeamModel, BeamPoint};
pub use stats::{StatsHelper, WindowStats};
