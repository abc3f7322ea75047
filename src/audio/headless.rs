// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Backend without an output device.
//!
//! Runs on the system clock and logs each pulse instead of sounding it.

use tracing::{debug, trace};

use super::{AudioBackend, AudioError, AudioTriggerPort, HAPTIC_PATTERN};
use crate::timing::{AudioClock, SoundKind, SystemClock};

#[derive(Debug, Default)]
pub struct HeadlessBackend;

impl AudioBackend for HeadlessBackend {
    type Context = HeadlessContext;

    fn open(&mut self) -> Result<HeadlessContext, AudioError> {
        Ok(HeadlessContext {
            clock: SystemClock::new(),
            triggered: 0,
        })
    }
}

#[derive(Debug)]
pub struct HeadlessContext {
    clock: SystemClock,
    triggered: u64,
}

impl HeadlessContext {
    /// Pulses triggered since the context was opened
    pub fn triggered(&self) -> u64 {
        self.triggered
    }
}

impl AudioClock for HeadlessContext {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn is_suspended(&self) -> bool {
        self.clock.is_suspended()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.clock.resume()
    }
}

impl AudioTriggerPort for HeadlessContext {
    fn trigger(&mut self, at: f64, accent: bool, sound: SoundKind) {
        self.triggered += 1;
        debug!(at, accent, %sound, "pulse");
        if accent {
            trace!(pattern = ?HAPTIC_PATTERN, "haptic cue");
        }
    }
}
