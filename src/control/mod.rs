// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Keyboard control of a running session.
//!
//! The terminal is put in raw mode and key presses are read on a blocking
//! thread, then forwarded to the session loop as commands.

pub mod keyboard;

pub use keyboard::{format_shortcut, KeyBinding, KeyboardController, Shortcut};

use std::io;
use std::time::Duration;

use crossterm::event::{self, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing::{debug, warn};

use crate::session::SessionHandle;

/// How long a read waits before checking whether the session is gone
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Raw terminal mode, restored on drop
pub struct RawMode;

impl RawMode {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

/// Forward key presses to `handle` until the session loop exits.
///
/// Blocks the calling thread; run it on a blocking task.
pub fn read_keys(keys: &KeyboardController, handle: &SessionHandle) -> io::Result<()> {
    let _raw = RawMode::enable()?;

    while !handle.is_closed() {
        if !event::poll(POLL_TIMEOUT)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if let Some(command) = keys.process_key(&key) {
            debug!(?command, "key command");
            if !handle.send(command) {
                break;
            }
        }
    }

    Ok(())
}
