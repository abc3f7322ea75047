// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio clock abstraction.
//!
//! The scheduler never reads wall-clock time directly. It asks an
//! [`AudioClock`] for "now" in seconds, which for a real device is the
//! position of the output stream rather than the system timer.

use std::time::{Duration, Instant};

use crate::audio::AudioError;

/// A monotonic clock in seconds, tied to an audio resource that may be suspended
pub trait AudioClock {
    /// Current clock time in seconds
    fn now(&self) -> f64;

    /// Whether the underlying resource is suspended
    fn is_suspended(&self) -> bool;

    /// Resume a suspended resource
    fn resume(&mut self) -> Result<(), AudioError>;
}

/// Clock backed by the system monotonic timer, starting at zero.
///
/// While suspended the clock does not advance.
#[derive(Debug)]
pub struct SystemClock {
    /// When the current running stretch began
    resumed_at: Option<Instant>,
    /// Time accumulated before the current running stretch
    elapsed: Duration,
}

impl SystemClock {
    /// Create a running clock
    pub fn new() -> Self {
        Self {
            resumed_at: Some(Instant::now()),
            elapsed: Duration::ZERO,
        }
    }

    /// Create a clock that starts suspended
    pub fn suspended() -> Self {
        Self {
            resumed_at: None,
            elapsed: Duration::ZERO,
        }
    }

    /// Stop the clock from advancing
    pub fn suspend(&mut self) {
        if let Some(start) = self.resumed_at.take() {
            self.elapsed += start.elapsed();
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        let running = self.resumed_at.map(|start| start.elapsed()).unwrap_or_default();
        (self.elapsed + running).as_secs_f64()
    }

    fn is_suspended(&self) -> bool {
        self.resumed_at.is_none()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(Instant::now());
        }
        Ok(())
    }
}
