// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio side of the metronome.
//!
//! This module provides:
//! - The trigger port the scheduler emits pulses into
//! - Backends that open an audio context (clock + port)
//! - cpal output with simple click voices

pub mod headless;
pub mod manual;
pub mod output;
pub mod voice;

pub use headless::{HeadlessBackend, HeadlessContext};
pub use manual::{ManualBackend, ManualClock, ManualContext, Trigger};
pub use output::{AudioConfig, CpalBackend, CpalContext};
pub use voice::{Voice, VoiceParams};

use thiserror::Error;

use crate::timing::{AudioClock, SoundKind};

/// Vibration pattern (on, off, on) in milliseconds for accented pulses
pub const HAPTIC_PATTERN: [u64; 3] = [30, 10, 10];

/// Capability to sound one pulse at a clock time.
///
/// Implementations must not block; the sound is scheduled, not played inline.
pub trait AudioTriggerPort {
    /// Schedule a pulse at clock time `at`. Accented pulses also get a haptic cue.
    fn trigger(&mut self, at: f64, accent: bool, sound: SoundKind);
}

/// Factory for the audio context used by a session.
///
/// The session opens the context lazily on its first start and keeps it for
/// every later start/stop cycle.
pub trait AudioBackend {
    type Context: AudioClock + AudioTriggerPort;

    /// Create the audio context
    fn open(&mut self) -> Result<Self::Context, AudioError>;
}

/// Audio error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioError {
    /// No audio device available
    #[error("No audio device available")]
    NoDevice,
    /// Failed to initialize audio
    #[error("Audio initialization failed: {0}")]
    InitFailed(String),
    /// Failed to start audio stream
    #[error("Audio stream failed: {0}")]
    StreamFailed(String),
    /// Suspended context could not be resumed
    #[error("Audio resume failed: {0}")]
    ResumeFailed(String),
    /// Failed to acquire lock
    #[error("Failed to acquire audio lock")]
    LockFailed,
}
