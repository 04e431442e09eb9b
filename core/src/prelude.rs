use serde::{Deserialize, Serialize};

/// Controls when the first-guess-only refinement pass runs after the window fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SecondPassPolicy {
    /// Only when both a previous volume and a first guess are available.
    #[default]
    RequireBoth,
    /// Whenever a first guess is available.
    FirstGuessAvailable,
    Disabled,
}

impl SecondPassPolicy {
    pub fn applies(self, has_previous: bool, has_first_guess: bool) -> bool {
        match self {
            SecondPassPolicy::RequireBoth => has_previous && has_first_guess,
            SecondPassPolicy::FirstGuessAvailable => has_first_guess,
            SecondPassPolicy::Disabled => false,
        }
    }
}

/// Flat, immutable parameter set shared by every dealiasing entry point.
///
/// Threshold fields that are fractions of the Nyquist velocity fall back to
/// their operational defaults when set outside `(0, 1]`; see [`DealiasConfig::fraction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DealiasConfig {
    /// Fraction of Nyquist used when comparing against previous volume / sweep above.
    pub comp_thresh: f32,
    /// Fraction of Nyquist used when comparing against the first guess alone.
    pub comp_thresh2: f32,
    /// Fraction of Nyquist used for neighbor and window comparisons.
    pub thresh: f32,
    /// Maximum number of Nyquist-interval shifts per gate attempt.
    pub max_count: usize,
    /// Minimum absolute raw velocity before a reference comparison is trusted.
    pub ck_val: f32,
    /// Half-width, in rays and gates, of the fallback window.
    pub proximity: usize,
    /// Minimum number of dealiased gates required in a window.
    pub min_good: usize,
    /// Maximum window standard deviation, as a fraction of Nyquist.
    pub std_thresh: f32,
    /// Require the previous volume, sweep above and first guess to all agree.
    pub strict_first_pass: bool,
    /// Apply the 3x3 density filter during classification.
    pub filter: bool,
    /// Apply the reflectivity pre-filter when reflectivity is supplied.
    pub prefilter: bool,
    /// Leading gates of every ray that are always removed.
    pub del_num_bins: usize,
    pub low_dbz: f32,
    pub high_dbz: f32,
    /// Remove velocity where the co-located reflectivity is missing.
    pub dbz_missing_removes_velocity: bool,
    /// Tolerance, in degrees, when matching azimuth/elevation of two volumes.
    pub angle_variance: f32,
    /// Maximum vertical shear (s^-1) accepted between profile levels.
    pub max_shear: f64,
    /// Radial velocity sign convention: negative when negative velocities point toward the radar.
    pub direction_sign: i32,
    pub earth_radius_km: f64,
    /// Refractivity gradient in N-units per km.
    pub refractivity_gradient: f64,
    pub wind_alt_min: f64,
    pub wind_alt_max: f64,
    pub extrapolate_above_profile: bool,
    /// Oldest acceptable sounding, in seconds before the volume time.
    pub sounding_look_back_secs: i64,
    pub second_pass: SecondPassPolicy,
    pub verbose: bool,
}

impl Default for DealiasConfig {
    fn default() -> Self {
        Self {
            comp_thresh: 0.25,
            comp_thresh2: 0.49,
            thresh: 0.4,
            max_count: 10,
            ck_val: 1.0,
            proximity: 5,
            min_good: 5,
            std_thresh: 0.8,
            strict_first_pass: false,
            filter: true,
            prefilter: true,
            del_num_bins: 5,
            low_dbz: 0.0,
            high_dbz: 80.0,
            dbz_missing_removes_velocity: false,
            angle_variance: 1.0,
            max_shear: 0.05,
            direction_sign: -1,
            earth_radius_km: 6371.0,
            refractivity_gradient: -39.2464,
            wind_alt_min: 0.0,
            wind_alt_max: 15_000.0,
            extrapolate_above_profile: true,
            sounding_look_back_secs: 330 * 60,
            second_pass: SecondPassPolicy::RequireBoth,
            verbose: false,
        }
    }
}

fn fraction_or(value: f32, fallback: f32) -> f32 {
    if value > 0.0 && value <= 1.0 {
        value
    } else {
        fallback
    }
}

impl DealiasConfig {
    /// Threshold for the reference-based initial pass.
    pub fn fraction(&self) -> f32 {
        fraction_or(self.comp_thresh, 0.25)
    }

    /// Threshold for first-guess-only comparisons.
    pub fn fraction2(&self) -> f32 {
        fraction_or(self.comp_thresh2, 0.49)
    }

    /// Threshold for neighbor and window comparisons.
    pub fn pfraction(&self) -> f32 {
        fraction_or(self.thresh, 0.4)
    }

    /// Relaxed window threshold: halfway between `pfraction` and a full Nyquist.
    pub fn relaxed_fraction(&self) -> f32 {
        1.0 - (1.0 - self.pfraction()) / 2.0
    }

    pub fn validate(&self) -> DealiasResult<()> {
        if self.max_count == 0 {
            return Err(DealiasError::InvalidConfig(
                "max_count must be at least 1".into(),
            ));
        }
        if !(self.std_thresh >= 0.0) {
            return Err(DealiasError::InvalidConfig(format!(
                "std_thresh must be non-negative, got {}",
                self.std_thresh
            )));
        }
        if !(self.angle_variance >= 0.0) {
            return Err(DealiasError::InvalidConfig(format!(
                "angle_variance must be non-negative, got {}",
                self.angle_variance
            )));
        }
        if self.low_dbz > self.high_dbz {
            return Err(DealiasError::InvalidConfig(format!(
                "low_dbz {} exceeds high_dbz {}",
                self.low_dbz, self.high_dbz
            )));
        }
        if !(self.max_shear > 0.0) {
            return Err(DealiasError::InvalidConfig(format!(
                "max_shear must be positive, got {}",
                self.max_shear
            )));
        }
        if !(self.earth_radius_km > 0.0) {
            return Err(DealiasError::InvalidConfig(format!(
                "earth_radius_km must be positive, got {}",
                self.earth_radius_km
            )));
        }
        if self.wind_alt_min >= self.wind_alt_max {
            return Err(DealiasError::InvalidConfig(format!(
                "wind altitude window [{}, {}] is empty",
                self.wind_alt_min, self.wind_alt_max
            )));
        }
        if self.sounding_look_back_secs < 0 {
            return Err(DealiasError::InvalidConfig(
                "sounding_look_back_secs must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// Common error type for dealiasing operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DealiasError {
    #[error("geometry mismatch: {0}")]
    GeometryMismatch(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("numerical degeneracy: {0}")]
    Degenerate(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type DealiasResult<T> = Result<T, DealiasError>;
