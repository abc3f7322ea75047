// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Polling loop for a session.
//!
//! The session is owned by one task. Commands arrive on a channel and the
//! scheduler pass runs on a fixed interval, both from the same `select!`, so
//! passes never overlap and no state is shared across threads.

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::{Session, SessionState};
use crate::audio::AudioBackend;
use crate::config::PreferenceStore;

/// Action requested of a running session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Toggle,
    SetTempo(i64),
    NudgeTempo(i64),
    SetTimeSignature(String),
    SetSoundKind(String),
    Shutdown,
}

/// Client side of a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    /// Handle plus the receiving end to pass to [`run`]
    pub fn new<B: AudioBackend, P: PreferenceStore>(
        session: &Session<B, P>,
    ) -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                commands: tx,
                state: session.subscribe(),
            },
            rx,
        )
    }

    /// Queue a command. Returns false once the session loop has exited.
    pub fn send(&self, command: Command) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn start(&self) -> bool {
        self.send(Command::Start)
    }

    pub fn stop(&self) -> bool {
        self.send(Command::Stop)
    }

    pub fn set_tempo(&self, bpm: i64) -> bool {
        self.send(Command::SetTempo(bpm))
    }

    pub fn set_time_signature(&self, value: impl Into<String>) -> bool {
        self.send(Command::SetTimeSignature(value.into()))
    }

    pub fn set_sound_kind(&self, value: impl Into<String>) -> bool {
        self.send(Command::SetSoundKind(value.into()))
    }

    pub fn shutdown(&self) -> bool {
        self.send(Command::Shutdown)
    }

    /// True once the session loop has exited
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    /// Latest published state
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Receiver for state changes
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }
}

impl<B: AudioBackend, P: PreferenceStore> Session<B, P> {
    /// Apply one command. Returns false for `Shutdown`.
    pub fn apply(&mut self, command: Command) -> bool {
        trace!(?command, "session command");
        match command {
            // Start failures are logged by the session and may be retried
            Command::Start => {
                let _ = self.start();
            }
            Command::Stop => self.stop(),
            Command::Toggle => {
                let _ = self.toggle();
            }
            Command::SetTempo(bpm) => self.set_tempo(bpm),
            Command::NudgeTempo(delta) => self.nudge_tempo(delta),
            Command::SetTimeSignature(value) => {
                let _ = self.set_time_signature(&value);
            }
            Command::SetSoundKind(value) => {
                let _ = self.set_sound_kind(&value);
            }
            Command::Shutdown => return false,
        }
        true
    }
}

/// Drive `session` until `Shutdown` arrives or every sender is dropped.
///
/// The session is stopped before it is handed back.
pub async fn run<B, P>(
    mut session: Session<B, P>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) -> Session<B, P>
where
    B: AudioBackend,
    P: PreferenceStore,
{
    let period = session.scheduler_config().poll_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                let was_running = session.is_running();
                if !session.apply(command) {
                    break;
                }
                if session.is_running() && !was_running {
                    // Start already ran a pass; the next one is a full period away
                    ticker.reset();
                }
            }
            _ = ticker.tick(), if session.is_running() => {
                let emitted = session.poll();
                if emitted > 0 {
                    trace!(emitted, "scheduler pass");
                }
            }
            // Store writes wait for the loop to come round after the pass
            _ = std::future::ready(()), if session.has_unsaved_preferences() => {
                session.save_preferences();
            }
        }
    }

    session.stop();
    session.save_preferences();
    debug!("session loop finished");
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ManualBackend;
    use crate::config::MemoryPreferences;
    use crate::timing::TimeSignature;

    #[tokio::test]
    async fn test_commands_are_applied_in_order() {
        let backend = ManualBackend::new();
        let session = Session::new(backend.clone(), MemoryPreferences::new());
        let (handle, rx) = SessionHandle::new(&session);

        assert!(handle.set_tempo(90));
        assert!(handle.set_time_signature("4/4"));
        assert!(handle.set_sound_kind("wood"));
        assert!(handle.start());
        assert!(handle.shutdown());

        let session = run(session, rx).await;

        assert_eq!(session.tempo().bpm(), 90);
        assert_eq!(session.time_signature(), TimeSignature::FourFour);
        assert!(!session.is_running());
        assert_eq!(backend.triggers().len(), 1);
        assert!(!handle.start());
    }

    #[tokio::test]
    async fn test_toggle_and_nudge_commands() {
        let backend = ManualBackend::new();
        let session = Session::new(backend.clone(), MemoryPreferences::new());
        let (handle, rx) = SessionHandle::new(&session);

        assert!(handle.send(Command::Toggle));
        assert!(handle.send(Command::NudgeTempo(1)));
        assert!(handle.send(Command::NudgeTempo(1)));
        assert!(handle.send(Command::NudgeTempo(-5)));
        assert!(handle.send(Command::Toggle));
        assert!(handle.shutdown());

        let session = run(session, rx).await;

        assert_eq!(session.tempo().bpm(), 117);
        assert!(!session.is_running());
        assert_eq!(backend.triggers().len(), 1);
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_loop_exits_when_senders_drop() {
        let session = Session::new(ManualBackend::new(), MemoryPreferences::new());
        let (handle, rx) = SessionHandle::new(&session);
        handle.start();
        drop(handle);

        let session = run(session, rx).await;
        assert!(!session.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_polls_while_running() {
        let backend = ManualBackend::new();
        let clock = backend.clock();
        let session = Session::new(backend.clone(), MemoryPreferences::new());
        let (handle, rx) = SessionHandle::new(&session);
        let mut state = handle.watch();

        // ManualBackend is single-threaded, so the loop runs on a local set
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let runner = tokio::task::spawn_local(run(session, rx));

                handle.start();
                state.changed().await.unwrap();
                assert_eq!(state.borrow_and_update().current_pulse, Some(0));

                // Next pulse at 0.5 s enters the window; only the ticker can emit it
                clock.set(0.45);
                state.changed().await.unwrap();
                assert_eq!(state.borrow_and_update().current_pulse, Some(1));

                handle.shutdown();
                let session = runner.await.unwrap();
                assert!(!session.is_running());
            })
            .await;

        assert_eq!(backend.triggers().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_resumes_after_restart() {
        let backend = ManualBackend::new();
        let clock = backend.clock();
        let session = Session::new(backend.clone(), MemoryPreferences::new());
        let (handle, rx) = SessionHandle::new(&session);
        let mut state = handle.watch();

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async move {
                let runner = tokio::task::spawn_local(run(session, rx));

                handle.start();
                state.changed().await.unwrap();
                assert_eq!(state.borrow_and_update().current_pulse, Some(0));

                handle.stop();
                state.changed().await.unwrap();
                assert!(!state.borrow_and_update().is_running);

                clock.set(10.0);
                handle.start();
                state.changed().await.unwrap();
                let restarted = *state.borrow_and_update();
                assert!(restarted.is_running);
                assert_eq!(restarted.current_pulse, Some(0));

                // Only the re-armed ticker can reach the pulse at 10.5 s
                clock.set(10.45);
                state.changed().await.unwrap();
                assert_eq!(state.borrow_and_update().current_pulse, Some(1));

                handle.shutdown();
                runner.await.unwrap();
            })
            .await;

        let times: Vec<f64> = backend.triggers().iter().map(|t| t.at).collect();
        assert_eq!(times, vec![0.0, 10.0, 10.5]);
    }
}
