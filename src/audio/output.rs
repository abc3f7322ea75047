// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output via cpal.
//!
//! The context's clock is the stream position: frames rendered divided by
//! the sample rate. Pulses are queued as voices that start on the frame
//! matching their clock time, so timing does not depend on when the
//! scheduler happened to run.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tracing::{debug, info, trace, warn};

use super::voice::{Voice, VoiceParams};
use super::{AudioBackend, AudioError, AudioTriggerPort, HAPTIC_PATTERN};
use crate::timing::{AudioClock, SoundKind};

/// Audio output configuration
#[derive(Debug, Clone, Default)]
pub struct AudioConfig {
    /// Sample rate in Hz, device default when `None`
    pub sample_rate: Option<u32>,
    /// Buffer size in frames, device default when `None`
    pub buffer_size: Option<u32>,
}

/// Opens the default output device
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    config: AudioConfig,
}

impl CpalBackend {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl AudioBackend for CpalBackend {
    type Context = CpalContext;

    fn open(&mut self) -> Result<CpalContext, AudioError> {
        CpalContext::new(&self.config)
    }
}

/// Live output stream plus the voices waiting to sound
pub struct CpalContext {
    /// cpal stream
    stream: Stream,
    /// Output device
    _device: Device,
    voices: Arc<Mutex<Vec<Voice>>>,
    frames: Arc<AtomicU64>,
    sample_rate: u32,
    suspended: bool,
}

impl CpalContext {
    fn new(config: &AudioConfig) -> Result<Self, AudioError> {
        let host = cpal::default_host();

        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::InitFailed(format!("Failed to get default config: {}", e)))?;

        let mut stream_config: StreamConfig = supported.into();
        if let Some(rate) = config.sample_rate {
            stream_config.sample_rate = cpal::SampleRate(rate);
        }
        if let Some(frames) = config.buffer_size {
            stream_config.buffer_size = cpal::BufferSize::Fixed(frames);
        }

        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels as usize;
        let voices: Arc<Mutex<Vec<Voice>>> = Arc::new(Mutex::new(Vec::new()));
        let frames = Arc::new(AtomicU64::new(0));

        let render_voices = Arc::clone(&voices);
        let render_frames = Arc::clone(&frames);

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let first = render_frames.load(Ordering::Acquire);
                    let count = (data.len() / channels.max(1)) as u64;

                    for sample in data.iter_mut() {
                        *sample = 0.0;
                    }

                    if let Ok(mut voices) = render_voices.try_lock() {
                        for (i, frame) in data.chunks_mut(channels.max(1)).enumerate() {
                            let position = first + i as u64;
                            let value: f32 = voices.iter_mut().map(|v| v.sample(position)).sum();
                            for sample in frame.iter_mut() {
                                *sample = value.clamp(-1.0, 1.0);
                            }
                        }
                        voices.retain(|v| !v.is_finished(first + count));
                    }

                    render_frames.store(first + count, Ordering::Release);
                },
                move |err| {
                    warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| AudioError::StreamFailed(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamFailed(format!("Failed to start stream: {}", e)))?;

        info!(sample_rate, channels, "audio output opened");

        Ok(Self {
            stream,
            _device: device,
            voices,
            frames,
            sample_rate,
            suspended: false,
        })
    }

    /// Get sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Pause the stream; the clock stops with it
    pub fn suspend(&mut self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamFailed(format!("Failed to pause stream: {}", e)))?;
        self.suspended = true;
        Ok(())
    }
}

impl AudioClock for CpalContext {
    fn now(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::ResumeFailed(e.to_string()))?;
        self.suspended = false;
        debug!("audio output resumed");
        Ok(())
    }
}

impl AudioTriggerPort for CpalContext {
    fn trigger(&mut self, at: f64, accent: bool, sound: SoundKind) {
        let start_frame = frame_for_time(at, self.sample_rate);
        let voice = Voice::new(VoiceParams::for_pulse(sound, accent), start_frame, self.sample_rate);

        match self.voices.lock() {
            Ok(mut voices) => voices.push(voice),
            Err(_) => warn!("{}", AudioError::LockFailed),
        }

        if accent {
            trace!(pattern = ?HAPTIC_PATTERN, "haptic cue");
        }
    }
}

/// Stream frame at which a clock time falls
pub fn frame_for_time(at: f64, sample_rate: u32) -> u64 {
    (at.max(0.0) * sample_rate as f64).round() as u64
}

/// List available audio output devices
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}
