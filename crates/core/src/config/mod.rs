use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, Value};

/// Top-level configuration structure for a conformance run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub scheduler: SchedulerConfig,
    pub sampling: SamplingConfig,
    pub values: ValueConfig,
    /// Candidate values keyed by type name or `"{Type}.{Property}"`.
    pub candidates: BTreeMap<String, Vec<Value>>,
    /// Known-issue regexes keyed by element type name.
    pub known_issues: BTreeMap<String, Vec<String>>,
    /// Only properties whose `"{Owner}.{Name}"` matches are tested.
    pub selection: Option<String>,
}

impl HarnessConfig {
    /// Reads a JSON configuration file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid configuration JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&text)
    }

    /// # Errors
    ///
    /// Fails if `text` is not valid configuration JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// # Errors
    ///
    /// Fails only if serialisation fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Duration of one forward pass of every generated animation: slightly
    /// less than one full sampling cycle.
    pub fn animation_duration(&self) -> Duration {
        // interval * (n + 1.75), kept in integer quarters
        let measurements = u32::try_from(self.sampling.number_of_measurements).unwrap_or(u32::MAX);
        self.scheduler.interval() * measurements.saturating_mul(4).saturating_add(7) / 4
    }
}

/// Step timer and frame cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_ms: u64,
    pub frame_interval_ms: u64,
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            frame_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Samples taken per property.
    pub number_of_measurements: usize,
    /// Frames `run_to_completion` may spend before giving up.
    pub max_frames: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            number_of_measurements: 8,
            max_frames: 200_000,
        }
    }
}

/// Constants used when deriving animation endpoints from current values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    pub low_multiplier: f64,
    pub high_multiplier: f64,
    /// Substitute endpoint when the derived endpoints coincide.
    pub distinct_value: f64,
}

impl Default for ValueConfig {
    fn default() -> Self {
        Self {
            low_multiplier: 0.3,
            high_multiplier: 1.5,
            distinct_value: 100.5,
        }
    }
}
