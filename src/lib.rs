// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Lookahead metronome.
//!
//! Pulses are scheduled a short window ahead of an audio clock so that the
//! beat stays steady regardless of how late the polling timer fires.

pub mod audio;
pub mod config;
pub mod control;
pub mod sequencer;
pub mod session;
pub mod timing;

pub use audio::{AudioBackend, AudioError, AudioTriggerPort};
pub use config::{MetronomeConfig, PreferenceStore};
pub use sequencer::{LookaheadScheduler, Pulse, SchedulerConfig, SchedulerCursor};
pub use session::{Command, Session, SessionHandle, SessionState, SessionStatus};
pub use timing::{AudioClock, SoundKind, Tempo, TimeSignature, TimingError};
