// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration system for the metronome.
//!
//! This module provides the startup configuration file and the
//! preference store used to remember the last session settings.

pub mod preferences;

pub use preferences::{
    FilePreferences, MemoryPreferences, PreferenceStore, SIGNATURE_KEY, SOUND_KEY, TEMPO_KEY,
};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::sequencer::SchedulerConfig;

/// Startup configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetronomeConfig {
    /// Tempo used when no preference is stored
    #[serde(default = "default_tempo")]
    pub tempo: i64,
    /// Time signature used when no preference is stored
    #[serde(default = "default_time_signature")]
    pub time_signature: String,
    /// Sound used when no preference is stored
    #[serde(default = "default_sound")]
    pub sound: String,
    /// Lookahead window in milliseconds
    #[serde(default = "default_schedule_ahead_ms")]
    pub schedule_ahead_ms: u64,
    /// Scheduler polling interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Preference file; preferences are kept in memory when absent
    #[serde(default)]
    pub preferences: Option<PathBuf>,
}

fn default_tempo() -> i64 {
    120
}
fn default_time_signature() -> String {
    "3/4".to_string()
}
fn default_sound() -> String {
    "click".to_string()
}
fn default_schedule_ahead_ms() -> u64 {
    100
}
fn default_poll_interval_ms() -> u64 {
    25
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            tempo: default_tempo(),
            time_signature: default_time_signature(),
            sound: default_sound(),
            schedule_ahead_ms: default_schedule_ahead_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            preferences: None,
        }
    }
}

impl MetronomeConfig {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse a configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Scheduler window and polling interval. Zero values fall back to defaults.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            schedule_ahead: if self.schedule_ahead_ms == 0 {
                defaults.schedule_ahead
            } else {
                self.schedule_ahead_ms as f64 / 1000.0
            },
            poll_interval: if self.poll_interval_ms == 0 {
                defaults.poll_interval
            } else {
                Duration::from_millis(self.poll_interval_ms)
            },
        }
    }
}
