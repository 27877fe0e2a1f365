use crate::entry::Key;
use crate::error::HarnessError;

/// Keys populated before the stress phase in the reference scenario.
pub const DEFAULT_POPULATION: u32 = 10_000;
/// Reader threads started in the reference scenario.
pub const DEFAULT_READERS: usize = 20;
/// The key every reader polls in the reference scenario.
pub const DEFAULT_TARGET_KEY: Key = 10;

/// Parameters of one stress run.
///
/// # Fields
///
/// * `population` - keys `0..population` are inserted before the run; the
///   mutator then removes `0..=population`, one past the populated range
/// * `readers` - number of reader threads, must be at least one
/// * `target_key` - the key every reader polls
/// * `stop_on_absence` - when set, a reader that observes the target key
///   gone also stops the whole run; by default it only ends itself and the
///   mutator runs to the end of its range
///
/// # Examples
///
/// ```
/// use lockrace_core::StressConfig;
///
/// let config = StressConfig::default()
///     .with_population(500)
///     .with_readers(4)
///     .with_target_key(3);
/// assert!(config.validate().is_ok());
/// assert!(StressConfig::default().with_readers(0).validate().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StressConfig {
    pub population: u32,
    pub readers: usize,
    pub target_key: Key,
    pub stop_on_absence: bool,
}

impl StressConfig {
    pub fn with_population(mut self, population: u32) -> Self {
        self.population = population;
        self
    }

    pub fn with_readers(mut self, readers: usize) -> Self {
        self.readers = readers;
        self
    }

    pub fn with_target_key(mut self, target_key: Key) -> Self {
        self.target_key = target_key;
        self
    }

    pub fn with_stop_on_absence(mut self, stop_on_absence: bool) -> Self {
        self.stop_on_absence = stop_on_absence;
        self
    }

    /// Checks the parameters before any thread is started.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.readers == 0 {
            return Err(HarnessError::InvalidConfig(
                "at least one reader is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            population: DEFAULT_POPULATION,
            readers: DEFAULT_READERS,
            target_key: DEFAULT_TARGET_KEY,
            stop_on_absence: false,
        }
    }
}
