// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pulse voices rendered by the cpal output.

use std::f32::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::timing::SoundKind;

/// Shape of one pulse sound
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceParams {
    /// Oscillator frequency in Hz, unused for noise
    pub frequency: f32,
    /// Peak gain
    pub gain: f32,
    /// Length in seconds
    pub duration: f32,
    /// Exponential decay rate, 0 for a flat gate
    pub decay: f32,
    /// White noise instead of a sine
    pub noise: bool,
}

impl VoiceParams {
    /// Sound parameters for a pulse
    pub fn for_pulse(sound: SoundKind, accent: bool) -> Self {
        match sound {
            SoundKind::Click => Self {
                frequency: if accent { 2000.0 } else { 1000.0 },
                gain: if accent { 1.0 } else { 0.5 },
                duration: if accent { 0.03 } else { 0.02 },
                decay: 0.0,
                noise: false,
            },
            SoundKind::Wood => Self {
                frequency: if accent { 1200.0 } else { 800.0 },
                gain: if accent { 0.9 } else { 0.6 },
                duration: 0.05,
                decay: 80.0,
                noise: false,
            },
            SoundKind::HiHat => Self {
                frequency: 0.0,
                gain: if accent { 0.6 } else { 0.35 },
                duration: if accent { 0.06 } else { 0.04 },
                decay: 60.0,
                noise: true,
            },
        }
    }
}

/// A pulse sound pinned to a starting frame of the output stream
#[derive(Debug, Clone)]
pub struct Voice {
    params: VoiceParams,
    start_frame: u64,
    length: u64,
    sample_rate: f32,
    rng: StdRng,
}

impl Voice {
    pub fn new(params: VoiceParams, start_frame: u64, sample_rate: u32) -> Self {
        Self {
            params,
            start_frame,
            length: (params.duration * sample_rate as f32).round() as u64,
            sample_rate: sample_rate as f32,
            rng: StdRng::seed_from_u64(start_frame),
        }
    }

    /// Whether the voice has nothing left to render at or after `frame`
    pub fn is_finished(&self, frame: u64) -> bool {
        frame >= self.start_frame + self.length
    }

    /// Sample value at an absolute stream frame
    pub fn sample(&mut self, frame: u64) -> f32 {
        if frame < self.start_frame || self.is_finished(frame) {
            return 0.0;
        }

        let t = (frame - self.start_frame) as f32 / self.sample_rate;
        let envelope = if self.params.decay > 0.0 {
            (-t * self.params.decay).exp()
        } else {
            1.0
        };

        let source = if self.params.noise {
            self.rng.gen_range(-1.0..1.0)
        } else {
            (t * self.params.frequency * TAU).sin()
        };

        source * envelope * self.params.gain
    }
}
