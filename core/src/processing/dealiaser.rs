use crate::grid::{GateStorage, Volume};
use crate::prelude::{DealiasConfig, DealiasError, DealiasResult};
use crate::processing::first_guess::FirstGuessGenerator;
use crate::processing::prefilter::{PrefilterReport, ReflectivityFilter};
use crate::processing::unfold::{UnfoldEngine, UnfoldReport};
use crate::sounding::ProfileSource;
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Utc};

/// What happened to one velocity volume.
#[derive(Debug, Clone, Default)]
pub struct DealiasOutcome {
    pub first_guess: Option<Volume>,
    pub first_guess_source: Option<String>,
    pub prefilter: Option<PrefilterReport>,
    pub report: Option<UnfoldReport>,
    /// False when the input values were restored unchanged.
    pub unfolded: bool,
}

/// Pre-filter, first guess and unfolding for one volume at a time.
pub struct Dealiaser {
    config: DealiasConfig,
    prefilter: ReflectivityFilter,
    generator: FirstGuessGenerator,
    engine: UnfoldEngine,
    logger: LogManager,
}

impl Dealiaser {
    pub fn new(config: DealiasConfig) -> DealiasResult<Self> {
        config.validate()?;
        Ok(Self {
            prefilter: ReflectivityFilter::new(&config),
            generator: FirstGuessGenerator::new(&config),
            engine: UnfoldEngine::new(&config),
            logger: LogManager::verbose(config.verbose),
            config,
        })
    }

    pub fn config(&self) -> &DealiasConfig {
        &self.config
    }

    /// Dealiases `velocity` in place.
    ///
    /// Input errors are returned before any gate changes. If no reference is
    /// available, nothing gets dealiased, or unfolding fails, the original
    /// values are restored.
    pub fn dealias<G: GateStorage>(
        &self,
        velocity: &mut Volume<G>,
        previous: Option<&Volume>,
        reflectivity: Option<&Volume>,
        sources: &mut [Box<dyn ProfileSource>],
        time: DateTime<Utc>,
    ) -> DealiasResult<DealiasOutcome> {
        validate_velocity(velocity)?;
        if let Some(prev) = previous {
            if prev.num_sweeps() != velocity.num_sweeps() {
                return Err(DealiasError::GeometryMismatch(format!(
                    "previous volume has {} sweeps, current has {}",
                    prev.num_sweeps(),
                    velocity.num_sweeps()
                )));
            }
        }

        let backup = velocity.deep_copy();
        let mut outcome = DealiasOutcome::default();

        if let Some(dbz) = reflectivity.filter(|_| self.config.prefilter) {
            match self.prefilter.apply(dbz, velocity) {
                Ok(report) => outcome.prefilter = Some(report),
                Err(err) => self.logger.warn(&format!("pre-filter skipped: {}", err)),
            }
        }

        let guess = self.generator.from_sources(sources, velocity, time);
        if previous.is_none() && guess.is_none() {
            velocity.copy_values_from(&backup)?;
            self.logger
                .warn("no previous volume or first guess; velocity left unchanged");
            return Ok(outcome);
        }

        match self
            .engine
            .unfold(velocity, previous, guess.as_ref().map(|g| &g.volume))
        {
            Ok(report) => {
                if report.total_dealiased() == 0 {
                    velocity.copy_values_from(&backup)?;
                    self.logger.warn("no gates dealiased; velocity left unchanged");
                } else {
                    outcome.unfolded = true;
                }
                outcome.report = Some(report);
            }
            Err(err) => {
                velocity.copy_values_from(&backup)?;
                return Err(err);
            }
        }

        if let Some(guess) = guess {
            outcome.first_guess_source = Some(guess.source_name);
            outcome.first_guess = Some(guess.volume);
        }
        Ok(outcome)
    }

    /// Replaces the velocity values with the first guess for inspection.
    ///
    /// Returns the source name, or `None` with the volume untouched when no
    /// source yields a profile.
    pub fn emit_first_guess<G: GateStorage>(
        &self,
        velocity: &mut Volume<G>,
        sources: &mut [Box<dyn ProfileSource>],
        time: DateTime<Utc>,
    ) -> DealiasResult<Option<String>> {
        validate_velocity(velocity)?;
        let Some(guess) = self.generator.from_sources(sources, velocity, time) else {
            self.logger.warn("no profile source available for the first guess");
            return Ok(None);
        };
        velocity.copy_values_from(&guess.volume)?;
        Ok(Some(guess.source_name))
    }
}

fn validate_velocity<G: GateStorage>(velocity: &Volume<G>) -> DealiasResult<()> {
    if velocity.is_empty() {
        return Err(DealiasError::InvalidInput("velocity volume has no sweeps".into()));
    }
    if let Some((sweep, nyquist)) = velocity.find_invalid_nyquist() {
        return Err(DealiasError::InvalidInput(format!(
            "sweep {} has Nyquist velocity {}",
            sweep, nyquist
        )));
    }
    Ok(())
}
