use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::timing::Ticks;

/// Tunables for the note queue and its clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Number of notes that may be sounding at once.
    pub capacity: usize,
    /// Ticks in one unit note length.
    pub ticks_per_unit: Ticks,
    /// Gap forced between notes whose end times coincide.
    pub note_delay: Ticks,
    pub bend_velocity: i32,
    pub bend_acceleration: i32,
    /// Silence appended after the last note of a track.
    pub tail_padding: Ticks,
    /// Run the consistency checker after every schedule and advance.
    pub self_check: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 50,
            ticks_per_unit: 480,
            note_delay: 0,
            bend_velocity: 100,
            bend_acceleration: 300,
            tail_padding: 25,
            self_check: false,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".into()));
        }
        if self.ticks_per_unit <= 0 {
            return Err(ConfigError::Invalid(format!(
                "ticks_per_unit must be positive, got {}",
                self.ticks_per_unit
            )));
        }
        if self.note_delay < 0 {
            return Err(ConfigError::Invalid(format!(
                "note_delay must not be negative, got {}",
                self.note_delay
            )));
        }
        if self.tail_padding < 0 {
            return Err(ConfigError::Invalid(format!(
                "tail_padding must not be negative, got {}",
                self.tail_padding
            )));
        }
        Ok(())
    }

    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        let config: QueueConfig = ron::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path)?;
        Self::from_ron(&source)
    }
}
