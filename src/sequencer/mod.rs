// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sequencer core for scheduling metronome pulses.
//!
//! The scheduler turns a tempo and a bar length into a stream of
//! precisely timed pulses, a short window ahead of the audio clock.

pub mod scheduler;

pub use scheduler::{
    advance, BarMeter, FixedMeter, LookaheadScheduler, Pulse, SchedulerConfig, SchedulerCursor,
};
