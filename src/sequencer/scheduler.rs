// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Lookahead pulse scheduler.
//!
//! Each pass looks a fixed window ahead of the audio clock and emits every
//! pulse that falls inside it. Pulse times are derived from the previous
//! pulse time plus one beat, never from the time the pass ran, so polling
//! jitter cannot accumulate into drift.

use std::time::Duration;

use crate::timing::{next_note_time, Tempo};

/// Configuration for the scheduler
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// How far ahead of the clock pulses are emitted, in seconds
    pub schedule_ahead: f64,
    /// How often the session runs a pass
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            schedule_ahead: 0.1,
            poll_interval: Duration::from_millis(25),
        }
    }
}

/// Position of the next pulse to emit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SchedulerCursor {
    /// Clock time of the next pulse, in seconds
    pub next_event_time: f64,
    /// Beat index of the next pulse within its bar
    pub next_beat: u32,
}

impl SchedulerCursor {
    /// Cursor positioned on a downbeat at `now`
    pub fn at(now: f64) -> Self {
        Self {
            next_event_time: now,
            next_beat: 0,
        }
    }

    /// Move back to a downbeat at `now`
    pub fn reset(&mut self, now: f64) {
        *self = Self::at(now);
    }
}

/// One pulse handed to the emit callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pulse {
    /// Clock time at which the pulse should sound
    pub time: f64,
    /// Beat index within the bar
    pub beat: u32,
    /// True on the downbeat
    pub accent: bool,
}

/// Source of the bar length, with a hook that runs before every downbeat
pub trait BarMeter {
    /// Pulses in the current bar
    fn pulses_per_bar(&self) -> u32;

    /// Called right before a downbeat is emitted. May change `pulses_per_bar`.
    fn before_bar(&mut self) {}
}

/// A bar length that never changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedMeter(pub u32);

impl BarMeter for FixedMeter {
    fn pulses_per_bar(&self) -> u32 {
        self.0
    }
}

/// Run one lookahead pass over an explicit cursor.
///
/// Returns the number of pulses emitted. A silent tempo is an idle pass:
/// nothing is emitted and the cursor is left untouched.
pub fn advance<M, E>(
    cursor: &mut SchedulerCursor,
    now: f64,
    schedule_ahead: f64,
    tempo: Tempo,
    meter: &mut M,
    mut emit: E,
) -> usize
where
    M: BarMeter + ?Sized,
    E: FnMut(Pulse),
{
    if tempo.is_silent() {
        return 0;
    }
    let bpm = f64::from(tempo.bpm());

    let horizon = now + schedule_ahead;
    let mut emitted = 0;

    while cursor.next_event_time < horizon {
        if cursor.next_beat == 0 {
            meter.before_bar();
        }

        let beat = cursor.next_beat;
        emit(Pulse {
            time: cursor.next_event_time,
            beat,
            accent: beat == 0,
        });
        emitted += 1;

        // Bar length is read after the hook so a change lands on this downbeat
        let pulses = meter.pulses_per_bar().max(1);
        cursor.next_event_time = next_note_time(cursor.next_event_time, bpm);
        cursor.next_beat = (beat + 1) % pulses;
    }

    emitted
}

/// Scheduler owning the cursor and its window configuration
#[derive(Debug, Clone)]
pub struct LookaheadScheduler {
    config: SchedulerConfig,
    cursor: SchedulerCursor,
}

impl LookaheadScheduler {
    /// Create a scheduler with the default window
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Create scheduler with custom config
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            config,
            cursor: SchedulerCursor::default(),
        }
    }

    /// Current configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current cursor
    pub fn cursor(&self) -> &SchedulerCursor {
        &self.cursor
    }

    /// Restart on a downbeat at `now`
    pub fn reset(&mut self, now: f64) {
        self.cursor.reset(now);
    }

    /// Return to the downbeat without moving the event time
    pub fn rewind_bar(&mut self) {
        self.cursor.next_beat = 0;
    }

    /// Emit every pulse due before `now + schedule_ahead`
    pub fn advance<M, E>(&mut self, now: f64, tempo: Tempo, meter: &mut M, emit: E) -> usize
    where
        M: BarMeter + ?Sized,
        E: FnMut(Pulse),
    {
        advance(
            &mut self.cursor,
            now,
            self.config.schedule_ahead,
            tempo,
            meter,
            emit,
        )
    }
}

impl Default for LookaheadScheduler {
    fn default() -> Self {
        Self::new()
    }
}
