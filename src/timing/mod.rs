// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing and clock module.
//!
//! This module provides the tempo and time signature model and the
//! audio clock abstraction used by the scheduler.

pub mod clock;
pub mod signature;
pub mod tempo;

pub use clock::{AudioClock, SystemClock};
pub use signature::{SoundKind, TimeSignature};
pub use tempo::{bpm_to_ms, next_note_time, Tempo, MAX_TEMPO, MIN_TEMPO};

use thiserror::Error;

/// Invalid tempo, signature or sound input
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimingError {
    #[error("tempo must be greater than 0, got {0}")]
    NonPositiveTempo(f64),
    #[error("invalid tempo: {0:?}")]
    InvalidTempo(String),
    #[error("unknown time signature: {0:?}")]
    UnknownSignature(String),
    #[error("unknown sound: {0:?}")]
    UnknownSound(String),
}
