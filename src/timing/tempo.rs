// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tempo value and beat-interval helpers.

use std::fmt;
use std::str::FromStr;

use super::TimingError;

/// Lowest accepted tempo. Zero means silent, not an error.
pub const MIN_TEMPO: u16 = 0;

/// Highest accepted tempo
pub const MAX_TEMPO: u16 = 400;

/// Tempo in beats per minute, always within `MIN_TEMPO..=MAX_TEMPO`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tempo(u16);

impl Tempo {
    /// Create a tempo, clamping into the valid range
    pub fn new(bpm: i64) -> Self {
        Self(bpm.clamp(MIN_TEMPO as i64, MAX_TEMPO as i64) as u16)
    }

    /// Beats per minute
    pub fn bpm(self) -> u16 {
        self.0
    }

    /// A silent tempo never schedules anything
    pub fn is_silent(self) -> bool {
        self.0 == 0
    }

    /// Seconds between two beats, `None` when silent
    pub fn seconds_per_beat(self) -> Option<f64> {
        if self.is_silent() {
            None
        } else {
            Some(60.0 / self.0 as f64)
        }
    }

    /// Tempo shifted by `delta` BPM, clamped
    pub fn nudged(self, delta: i64) -> Self {
        Self::new(self.0 as i64 + delta)
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self(120)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Tempo {
    type Err = TimingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(Tempo::new)
            .map_err(|_| TimingError::InvalidTempo(s.to_string()))
    }
}

/// Convert a tempo to the interval between beats in milliseconds
pub fn bpm_to_ms(bpm: f64) -> Result<f64, TimingError> {
    if bpm.is_nan() || bpm <= 0.0 {
        return Err(TimingError::NonPositiveTempo(bpm));
    }
    Ok(60_000.0 / bpm)
}

/// Time of the note following one at `time`, in seconds
pub fn next_note_time(time: f64, bpm: f64) -> f64 {
    time + 60.0 / bpm
}
