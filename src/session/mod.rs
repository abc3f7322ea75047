// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Metronome session.
//!
//! A [`Session`] owns the start/stop lifecycle, the scheduler cursor, the
//! active and pending time signature, tempo and sound, and publishes its
//! observable state on a watch channel. It is driven from a single task:
//! see [`driver`] for the polling loop.

pub mod driver;

pub use driver::{run, Command, SessionHandle};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::audio::{AudioBackend, AudioError, AudioTriggerPort};
use crate::config::{
    MetronomeConfig, PreferenceStore, SIGNATURE_KEY, SOUND_KEY, TEMPO_KEY,
};
use crate::sequencer::{BarMeter, LookaheadScheduler, SchedulerConfig};
use crate::timing::{AudioClock, SoundKind, Tempo, TimeSignature, TimingError};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Stopped,
    Running,
}

/// State published to observers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionState {
    pub tempo: Tempo,
    pub is_running: bool,
    /// Beat index of the latest emitted pulse, `None` while stopped
    pub current_pulse: Option<u32>,
    pub time_signature: TimeSignature,
    pub pulses_per_bar: u32,
    pub sound_kind: SoundKind,
}

impl SessionState {
    /// Pulse index with -1 standing for "no active pulse"
    pub fn pulse_index(&self) -> i64 {
        self.current_pulse.map(i64::from).unwrap_or(-1)
    }
}

/// Active signature plus at most one change waiting for the next downbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Meter {
    active: TimeSignature,
    pending: Option<TimeSignature>,
}

impl Meter {
    fn new(active: TimeSignature) -> Self {
        Self {
            active,
            pending: None,
        }
    }

    /// Make `signature` active and drop any pending change
    fn apply(&mut self, signature: TimeSignature) {
        self.active = signature;
        self.pending = None;
    }

    /// Apply the pending change, if it differs from the active signature
    fn flush(&mut self) -> Option<TimeSignature> {
        match self.pending.take() {
            Some(signature) if signature != self.active => {
                self.active = signature;
                Some(signature)
            }
            _ => None,
        }
    }
}

impl BarMeter for Meter {
    fn pulses_per_bar(&self) -> u32 {
        self.active.pulses_per_bar()
    }

    fn before_bar(&mut self) {
        if let Some(signature) = self.flush() {
            debug!(%signature, "time signature applied at downbeat");
        }
    }
}

/// Metronome session controller
pub struct Session<B: AudioBackend, P: PreferenceStore> {
    backend: B,
    /// Opened on the first start, then kept for every later cycle
    context: Option<B::Context>,
    preferences: P,
    scheduler: LookaheadScheduler,
    meter: Meter,
    tempo: Tempo,
    sound: SoundKind,
    status: SessionStatus,
    state: watch::Sender<SessionState>,
    /// Signature applied during a pass, not yet written to the store
    unsaved: Option<TimeSignature>,
}

impl<B: AudioBackend, P: PreferenceStore> Session<B, P> {
    /// Create a session with default settings, restoring stored preferences
    pub fn new(backend: B, preferences: P) -> Self {
        Self::with_config(backend, preferences, &MetronomeConfig::default())
    }

    /// Create a session whose fallbacks come from `config`.
    ///
    /// Stored preferences win over the config; invalid stored values are ignored.
    pub fn with_config(backend: B, preferences: P, config: &MetronomeConfig) -> Self {
        let tempo: Tempo = restore(&preferences, TEMPO_KEY)
            .unwrap_or_else(|| Tempo::new(config.tempo));
        let signature: TimeSignature = restore(&preferences, SIGNATURE_KEY)
            .or_else(|| config.time_signature.parse().ok())
            .unwrap_or_default();
        let sound: SoundKind = restore(&preferences, SOUND_KEY)
            .or_else(|| config.sound.parse().ok())
            .unwrap_or_default();

        let (state, _) = watch::channel(SessionState {
            tempo,
            is_running: false,
            current_pulse: None,
            time_signature: signature,
            pulses_per_bar: signature.pulses_per_bar(),
            sound_kind: sound,
        });

        debug!(%tempo, %signature, %sound, "session created");

        Self {
            backend,
            context: None,
            preferences,
            scheduler: LookaheadScheduler::with_config(config.scheduler_config()),
            meter: Meter::new(signature),
            tempo,
            sound,
            status: SessionStatus::Stopped,
            state,
            unsaved: None,
        }
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Snapshot of the published state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.meter.active
    }

    /// Signature waiting for the next downbeat
    pub fn pending_time_signature(&self) -> Option<TimeSignature> {
        self.meter.pending
    }

    pub fn sound_kind(&self) -> SoundKind {
        self.sound
    }

    pub fn scheduler_config(&self) -> &SchedulerConfig {
        self.scheduler.config()
    }

    /// The audio context, once a start has opened it
    pub fn context(&self) -> Option<&B::Context> {
        self.context.as_ref()
    }

    pub fn preferences(&self) -> &P {
        &self.preferences
    }

    /// Start playback.
    ///
    /// Does nothing when already running or when the tempo is silent. An
    /// error means the audio context could not be opened or resumed; the
    /// session stays stopped and the call may be retried.
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.is_running() || self.tempo.is_silent() {
            return Ok(());
        }

        let now = match self.ensure_context() {
            Ok(context) => context.now(),
            Err(e) => {
                warn!("Could not start metronome: {}", e);
                return Err(e);
            }
        };

        self.scheduler.reset(now);
        self.status = SessionStatus::Running;
        self.state.send_modify(|state| state.is_running = true);
        info!(tempo = %self.tempo, signature = %self.meter.active, "metronome started");

        // First pass right away so the downbeat is not delayed by a poll interval
        self.poll();
        Ok(())
    }

    /// Stop playback, applying any pending signature change
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }

        self.status = SessionStatus::Stopped;
        self.scheduler.rewind_bar();

        let flushed = self.meter.flush();
        let signature = self.meter.active;
        self.state.send_modify(|state| {
            state.is_running = false;
            state.current_pulse = None;
            state.time_signature = signature;
            state.pulses_per_bar = signature.pulses_per_bar();
        });

        if let Some(signature) = flushed {
            debug!(%signature, "pending time signature applied on stop");
            self.unsaved = Some(signature);
        }
        self.save_preferences();
        info!("metronome stopped");
    }

    /// Start when stopped, stop when running
    pub fn toggle(&mut self) -> Result<(), AudioError> {
        if self.is_running() {
            self.stop();
            Ok(())
        } else {
            self.start()
        }
    }

    /// Run one scheduler pass with the live tempo.
    ///
    /// Returns the number of pulses emitted; always 0 while stopped. A
    /// signature applied during the pass is not written to the store here;
    /// see [`Session::save_preferences`].
    pub fn poll(&mut self) -> usize {
        if !self.is_running() {
            return 0;
        }
        let Some(context) = self.context.as_mut() else {
            return 0;
        };

        let now = context.now();
        let sound = self.sound;
        let state = &self.state;
        let before = self.meter.active;

        let emitted = self.scheduler.advance(now, self.tempo, &mut self.meter, |pulse| {
            context.trigger(pulse.time, pulse.accent, sound);
            state.send_modify(|state| state.current_pulse = Some(pulse.beat));
        });

        let signature = self.meter.active;
        if signature != before {
            self.state.send_modify(|state| {
                state.time_signature = signature;
                state.pulses_per_bar = signature.pulses_per_bar();
            });
            self.unsaved = Some(signature);
        }

        emitted
    }

    /// Set the tempo, clamped to 0..=400. A tempo of 0 stops playback.
    pub fn set_tempo(&mut self, bpm: i64) {
        let tempo = Tempo::new(bpm);
        self.tempo = tempo;
        self.state.send_modify(|state| state.tempo = tempo);
        self.persist(TEMPO_KEY, &tempo.to_string());

        if tempo.is_silent() {
            self.stop();
        }
    }

    /// Shift the tempo by `delta` BPM
    pub fn nudge_tempo(&mut self, delta: i64) {
        self.set_tempo(self.tempo.nudged(delta).bpm().into());
    }

    /// Request a time signature by identifier. Unknown identifiers change nothing.
    pub fn set_time_signature(&mut self, value: &str) -> Result<(), TimingError> {
        let signature = value.parse::<TimeSignature>().map_err(|e| {
            debug!("ignoring time signature: {}", e);
            e
        })?;
        self.change_time_signature(signature);
        Ok(())
    }

    /// Request a time signature.
    ///
    /// Stopped: applies immediately. Running: waits for the next downbeat, or
    /// for `stop`, whichever comes first. Requesting the active signature
    /// while running cancels any pending request.
    pub fn change_time_signature(&mut self, signature: TimeSignature) {
        if !self.is_running() {
            self.meter.apply(signature);
            self.scheduler.rewind_bar();
            self.state.send_modify(|state| {
                state.time_signature = signature;
                state.pulses_per_bar = signature.pulses_per_bar();
            });
            self.unsaved = Some(signature);
            self.save_preferences();
            return;
        }

        if signature == self.meter.active {
            self.meter.pending = None;
        } else {
            debug!(%signature, "time signature pending until next downbeat");
            self.meter.pending = Some(signature);
        }
    }

    /// Select a sound by identifier. Unknown identifiers change nothing.
    pub fn set_sound_kind(&mut self, value: &str) -> Result<(), TimingError> {
        let sound = value.parse::<SoundKind>().map_err(|e| {
            debug!("ignoring sound: {}", e);
            e
        })?;
        self.change_sound_kind(sound);
        Ok(())
    }

    /// Select the sound for subsequent pulses
    pub fn change_sound_kind(&mut self, sound: SoundKind) {
        self.sound = sound;
        self.state.send_modify(|state| state.sound_kind = sound);
        self.persist(SOUND_KEY, sound.as_str());
    }

    /// True when a signature applied at a downbeat still has to be stored
    pub fn has_unsaved_preferences(&self) -> bool {
        self.unsaved.is_some()
    }

    /// Write preferences deferred by [`Session::poll`]
    pub fn save_preferences(&mut self) {
        if let Some(signature) = self.unsaved.take() {
            self.persist(SIGNATURE_KEY, signature.as_str());
        }
    }

    fn ensure_context(&mut self) -> Result<&mut B::Context, AudioError> {
        let mut context = match self.context.take() {
            Some(context) => context,
            None => self.backend.open()?,
        };

        let resumed = if context.is_suspended() {
            context.resume()
        } else {
            Ok(())
        };

        let context = self.context.insert(context);
        resumed.map(|_| context)
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.preferences.set(key, value) {
            warn!("Failed to store preference {}: {:#}", key, e);
        }
    }
}

fn restore<T: std::str::FromStr, P: PreferenceStore>(preferences: &P, key: &str) -> Option<T> {
    preferences.get(key)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ManualBackend, Trigger};
    use crate::config::MemoryPreferences;

    fn session() -> (Session<ManualBackend, MemoryPreferences>, ManualBackend) {
        let backend = ManualBackend::new();
        let session = Session::new(backend.clone(), MemoryPreferences::new());
        (session, backend)
    }

    fn beats(backend: &ManualBackend) -> Vec<bool> {
        backend.triggers().iter().map(|t| t.accent).collect()
    }

    #[test]
    fn test_session_defaults() {
        let (session, _) = session();
        let state = session.state();

        assert_eq!(session.status(), SessionStatus::Stopped);
        assert_eq!(state.tempo.bpm(), 120);
        assert!(!state.is_running);
        assert_eq!(state.current_pulse, None);
        assert_eq!(state.pulse_index(), -1);
        assert_eq!(state.time_signature, TimeSignature::ThreeFour);
        assert_eq!(state.pulses_per_bar, 3);
        assert_eq!(state.sound_kind, SoundKind::Click);
    }

    #[test]
    fn test_start_emits_downbeat_immediately() {
        let (mut session, backend) = session();
        backend.clock().set(4.0);

        session.start().unwrap();

        assert!(session.is_running());
        assert_eq!(
            backend.triggers(),
            vec![Trigger { at: 4.0, accent: true, sound: SoundKind::Click }]
        );
        assert_eq!(session.state().current_pulse, Some(0));
        assert_eq!(backend.opens(), 1);
    }

    #[test]
    fn test_start_and_stop_are_idempotent() {
        let (mut session, backend) = session();

        session.stop();
        assert_eq!(session.state().current_pulse, None);

        session.start().unwrap();
        let state = session.state();
        session.start().unwrap();
        assert_eq!(session.state(), state);
        assert_eq!(backend.triggers().len(), 1);

        session.stop();
        let state = session.state();
        session.stop();
        assert_eq!(session.state(), state);
        assert!(!state.is_running);
    }

    #[test]
    fn test_silent_tempo_does_not_start() {
        let (mut session, backend) = session();
        session.set_tempo(0);
        session.start().unwrap();

        assert!(!session.is_running());
        assert_eq!(backend.opens(), 0);
    }

    #[test]
    fn test_unavailable_device_keeps_session_stopped() {
        let (mut session, backend) = session();
        backend.set_fail_open(true);

        assert_eq!(session.start(), Err(AudioError::NoDevice));
        assert!(!session.is_running());
        assert!(backend.triggers().is_empty());

        backend.set_fail_open(false);
        session.start().unwrap();
        assert!(session.is_running());
    }

    #[test]
    fn test_suspended_context_is_resumed() {
        let backend = ManualBackend::suspended();
        let mut session = Session::new(backend.clone(), MemoryPreferences::new());

        backend.set_fail_resume(true);
        assert!(matches!(session.start(), Err(AudioError::ResumeFailed(_))));
        assert!(!session.is_running());

        backend.set_fail_resume(false);
        session.start().unwrap();
        assert!(session.is_running());
        assert!(!session.context().unwrap().is_suspended());
        // The context opened on the failed attempt is reused
        assert_eq!(backend.opens(), 1);
    }

    #[test]
    fn test_polling_follows_the_clock() {
        let (mut session, backend) = session();
        let clock = backend.clock();
        session.start().unwrap();

        for _ in 0..40 {
            clock.advance(0.025);
            session.poll();
        }

        // One second at 120 BPM: pulses at 0.0, 0.5, 1.0
        let times: Vec<f64> = backend.triggers().iter().map(|t| t.at).collect();
        assert_eq!(times.len(), 3);
        assert!((times[1] - 0.5).abs() < 1e-9);
        assert!((times[2] - 1.0).abs() < 1e-9);
        assert_eq!(beats(&backend), vec![true, false, false]);
        assert_eq!(session.state().current_pulse, Some(2));
    }

    #[test]
    fn test_poll_while_stopped_does_nothing() {
        let (mut session, backend) = session();
        assert_eq!(session.poll(), 0);

        session.start().unwrap();
        session.stop();
        backend.clock().advance(1.0);
        assert_eq!(session.poll(), 0);
        assert_eq!(backend.triggers().len(), 1);
    }

    #[test]
    fn test_signature_change_waits_for_downbeat() {
        let (mut session, backend) = session();
        let clock = backend.clock();
        session.start().unwrap(); // beat 0 of 3/4 at t=0

        clock.set(0.5);
        session.poll(); // beat 1

        session.set_time_signature("2/4").unwrap();
        assert_eq!(session.pending_time_signature(), Some(TimeSignature::TwoFour));
        assert_eq!(session.state().pulses_per_bar, 3);

        clock.set(1.0);
        session.poll(); // beat 2, still 3/4
        assert_eq!(session.state().current_pulse, Some(2));
        assert_eq!(session.time_signature(), TimeSignature::ThreeFour);

        clock.set(1.5);
        session.poll(); // downbeat picks up 2/4
        assert_eq!(session.time_signature(), TimeSignature::TwoFour);
        assert_eq!(session.state().pulses_per_bar, 2);
        assert_eq!(session.pending_time_signature(), None);

        // The store is written after the pass, not inside it
        assert!(session.has_unsaved_preferences());
        assert_eq!(session.preferences().get(SIGNATURE_KEY), None);
        session.save_preferences();
        assert!(!session.has_unsaved_preferences());

        for t in [2.0, 2.5, 3.0] {
            clock.set(t);
            session.poll();
        }

        assert_eq!(beats(&backend), vec![true, false, false, true, false, true, false]);
        assert_eq!(
            session.preferences().get(SIGNATURE_KEY),
            Some("2/4".to_string())
        );
    }

    #[test]
    fn test_requesting_active_signature_clears_pending() {
        let (mut session, backend) = session();
        let clock = backend.clock();
        session.start().unwrap();

        session.change_time_signature(TimeSignature::FourFour);
        assert_eq!(session.pending_time_signature(), Some(TimeSignature::FourFour));

        session.change_time_signature(TimeSignature::ThreeFour);
        assert_eq!(session.pending_time_signature(), None);

        for t in [0.5, 1.0, 1.5, 2.0] {
            clock.set(t);
            session.poll();
        }
        assert_eq!(session.time_signature(), TimeSignature::ThreeFour);
        assert_eq!(beats(&backend), vec![true, false, false, true, false]);
    }

    #[test]
    fn test_second_request_overwrites_first() {
        let (mut session, _) = session();
        session.start().unwrap();

        session.change_time_signature(TimeSignature::FourFour);
        session.change_time_signature(TimeSignature::TwelveEight);
        assert_eq!(session.pending_time_signature(), Some(TimeSignature::TwelveEight));
    }

    #[test]
    fn test_pending_signature_flushes_on_stop() {
        let (mut session, backend) = session();
        session.start().unwrap();
        backend.clock().set(0.5);
        session.poll();

        session.change_time_signature(TimeSignature::FourFour);
        session.stop();

        let state = session.state();
        assert_eq!(state.time_signature, TimeSignature::FourFour);
        assert_eq!(state.pulses_per_bar, 4);
        assert_eq!(state.current_pulse, None);
        assert_eq!(session.pending_time_signature(), None);
        assert_eq!(
            session.preferences().get(SIGNATURE_KEY),
            Some("4/4".to_string())
        );
    }

    #[test]
    fn test_signature_applies_immediately_while_stopped() {
        let (mut session, _) = session();
        session.set_time_signature("9/8").unwrap();

        assert_eq!(session.time_signature(), TimeSignature::NineEight);
        assert_eq!(session.state().pulses_per_bar, 3);
        assert_eq!(session.pending_time_signature(), None);
    }

    #[test]
    fn test_unknown_identifiers_are_ignored() {
        let (mut session, _) = session();
        let before = session.state();

        assert!(session.set_time_signature("7/8").is_err());
        assert!(session.set_sound_kind("cowbell").is_err());
        assert_eq!(session.state(), before);
        assert_eq!(session.preferences().get(SIGNATURE_KEY), None);
    }

    #[test]
    fn test_tempo_clamping() {
        let (mut session, _) = session();
        session.start().unwrap();

        session.set_tempo(1000);
        assert_eq!(session.tempo().bpm(), 400);
        assert!(session.is_running());

        session.set_tempo(-5);
        assert_eq!(session.tempo().bpm(), 0);
        assert!(!session.is_running());
        assert_eq!(session.state().current_pulse, None);
    }

    #[test]
    fn test_tempo_change_applies_on_next_pass() {
        let (mut session, backend) = session();
        let clock = backend.clock();
        session.start().unwrap(); // t=0, next at 0.5

        session.set_tempo(60);
        clock.set(0.45);
        session.poll(); // 0.5 emitted, next at 1.5 under the new tempo
        clock.set(1.45);
        session.poll();

        let times: Vec<f64> = backend.triggers().iter().map(|t| t.at).collect();
        assert_eq!(times, vec![0.0, 0.5, 1.5]);
    }

    #[test]
    fn test_nudge_tempo() {
        let (mut session, _) = session();
        session.nudge_tempo(5);
        assert_eq!(session.tempo().bpm(), 125);
        session.nudge_tempo(-500);
        assert_eq!(session.tempo().bpm(), 0);
    }

    #[test]
    fn test_sound_change_applies_to_next_pulse() {
        let (mut session, backend) = session();
        session.start().unwrap();
        session.set_sound_kind("hihat").unwrap();

        backend.clock().set(0.5);
        session.poll();

        let sounds: Vec<SoundKind> = backend.triggers().iter().map(|t| t.sound).collect();
        assert_eq!(sounds, vec![SoundKind::Click, SoundKind::HiHat]);
        assert_eq!(session.state().sound_kind, SoundKind::HiHat);
    }

    #[test]
    fn test_restart_resets_cursor_and_reuses_context() {
        let (mut session, backend) = session();
        let clock = backend.clock();

        session.start().unwrap();
        clock.set(0.5);
        session.poll();
        session.stop();

        clock.set(10.2);
        session.start().unwrap();

        let last = backend.triggers().last().copied().unwrap();
        assert_eq!(last.at, 10.2);
        assert!(last.accent);
        assert_eq!(backend.opens(), 1);
    }

    #[test]
    fn test_toggle() {
        let (mut session, _) = session();
        session.toggle().unwrap();
        assert!(session.is_running());
        session.toggle().unwrap();
        assert!(!session.is_running());
    }

    #[test]
    fn test_preferences_restored_and_written() {
        let preferences = MemoryPreferences::with_values([
            (TEMPO_KEY, "96"),
            (SIGNATURE_KEY, "6/8"),
            (SOUND_KEY, "wood"),
        ]);
        let mut session = Session::new(ManualBackend::new(), preferences);

        let state = session.state();
        assert_eq!(state.tempo.bpm(), 96);
        assert_eq!(state.time_signature, TimeSignature::SixEight);
        assert_eq!(state.sound_kind, SoundKind::Wood);

        session.set_tempo(150);
        session.change_sound_kind(SoundKind::Click);
        assert_eq!(session.preferences().get(TEMPO_KEY), Some("150".to_string()));
        assert_eq!(session.preferences().get(SOUND_KEY), Some("click".to_string()));
    }

    #[test]
    fn test_invalid_preferences_fall_back_to_config() {
        let preferences = MemoryPreferences::with_values([
            (TEMPO_KEY, "fast"),
            (SIGNATURE_KEY, "5/4"),
            (SOUND_KEY, "cowbell"),
        ]);
        let config = MetronomeConfig {
            tempo: 88,
            time_signature: "4/4".to_string(),
            sound: "hihat".to_string(),
            ..MetronomeConfig::default()
        };
        let session = Session::with_config(ManualBackend::new(), preferences, &config);

        let state = session.state();
        assert_eq!(state.tempo.bpm(), 88);
        assert_eq!(state.time_signature, TimeSignature::FourFour);
        assert_eq!(state.sound_kind, SoundKind::HiHat);
    }

    #[test]
    fn test_subscribers_see_pulses() {
        let (mut session, backend) = session();
        let mut rx = session.subscribe();

        session.start().unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().current_pulse, Some(0));

        backend.clock().set(0.5);
        session.poll();
        assert_eq!(rx.borrow_and_update().current_pulse, Some(1));

        session.stop();
        let state = *rx.borrow_and_update();
        assert!(!state.is_running);
        assert_eq!(state.pulse_index(), -1);
    }
}
