// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Hand-driven backend for tests and benchmarks.
//!
//! The clock only moves when told to, and every trigger is recorded so a
//! caller can inspect exactly what the scheduler emitted.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::{AudioBackend, AudioError, AudioTriggerPort};
use crate::timing::{AudioClock, SoundKind};

/// A recorded trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trigger {
    pub at: f64,
    pub accent: bool,
    pub sound: SoundKind,
}

/// Shared handle on the manual clock time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn now(&self) -> f64 {
        self.now.get()
    }

    pub fn set(&self, now: f64) {
        self.now.set(now);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

/// Backend whose contexts share one manual clock and one trigger log
#[derive(Debug, Clone, Default)]
pub struct ManualBackend {
    clock: ManualClock,
    triggers: Rc<RefCell<Vec<Trigger>>>,
    opens: Rc<Cell<usize>>,
    fail_open: Rc<Cell<bool>>,
    fail_resume: Rc<Cell<bool>>,
    start_suspended: bool,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contexts open in the suspended state, as a browser-style device would
    pub fn suspended() -> Self {
        Self {
            start_suspended: true,
            ..Self::default()
        }
    }

    pub fn clock(&self) -> ManualClock {
        self.clock.clone()
    }

    /// Everything triggered so far
    pub fn triggers(&self) -> Vec<Trigger> {
        self.triggers.borrow().clone()
    }

    /// Forget recorded triggers
    pub fn clear(&self) {
        self.triggers.borrow_mut().clear();
    }

    /// Number of contexts opened
    pub fn opens(&self) -> usize {
        self.opens.get()
    }

    /// Make `open` fail until reset
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.set(fail);
    }

    /// Make `resume` fail until reset
    pub fn set_fail_resume(&self, fail: bool) {
        self.fail_resume.set(fail);
    }
}

impl AudioBackend for ManualBackend {
    type Context = ManualContext;

    fn open(&mut self) -> Result<ManualContext, AudioError> {
        if self.fail_open.get() {
            return Err(AudioError::NoDevice);
        }
        self.opens.set(self.opens.get() + 1);
        Ok(ManualContext {
            clock: self.clock.clone(),
            triggers: Rc::clone(&self.triggers),
            fail_resume: Rc::clone(&self.fail_resume),
            suspended: self.start_suspended,
        })
    }
}

/// Context handed out by [`ManualBackend`]
#[derive(Debug)]
pub struct ManualContext {
    clock: ManualClock,
    triggers: Rc<RefCell<Vec<Trigger>>>,
    fail_resume: Rc<Cell<bool>>,
    suspended: bool,
}

impl ManualContext {
    pub fn suspend(&mut self) {
        self.suspended = true;
    }
}

impl AudioClock for ManualContext {
    fn now(&self) -> f64 {
        self.clock.now()
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.fail_resume.get() {
            return Err(AudioError::ResumeFailed("resume refused".to_string()));
        }
        self.suspended = false;
        Ok(())
    }
}

impl AudioTriggerPort for ManualContext {
    fn trigger(&mut self, at: f64, accent: bool, sound: SoundKind) {
        self.triggers.borrow_mut().push(Trigger { at, accent, sound });
    }
}
