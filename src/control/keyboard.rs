// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Keyboard shortcut handling.
//!
//! Maps key presses to session commands: Space or Enter toggles playback,
//! the arrow keys nudge the tempo by one BPM.

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::session::Command;

/// A keyboard shortcut definition
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shortcut {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl Shortcut {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Shortcut with no modifiers
    pub fn key(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::NONE)
    }

    /// Shortcut with Ctrl held
    pub fn ctrl(code: KeyCode) -> Self {
        Self::new(code, KeyModifiers::CONTROL)
    }
}

/// A shortcut bound to a command
#[derive(Debug, Clone)]
pub struct KeyBinding {
    pub shortcut: Shortcut,
    pub command: Command,
    /// Description for help display
    pub description: String,
}

impl KeyBinding {
    pub fn new(shortcut: Shortcut, command: Command, description: impl Into<String>) -> Self {
        Self {
            shortcut,
            command,
            description: description.into(),
        }
    }
}

/// Keyboard controller with configurable bindings
#[derive(Debug, Clone, Default)]
pub struct KeyboardController {
    bindings: HashMap<Shortcut, KeyBinding>,
}

impl KeyboardController {
    /// Create an empty keyboard controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a keyboard controller with the default bindings
    pub fn with_defaults() -> Self {
        let mut controller = Self::new();

        // Transport
        controller.add(KeyBinding::new(
            Shortcut::key(KeyCode::Char(' ')),
            Command::Toggle,
            "Start/Stop",
        ));
        controller.add(KeyBinding::new(
            Shortcut::key(KeyCode::Enter),
            Command::Toggle,
            "Start/Stop",
        ));

        // Tempo
        controller.add(KeyBinding::new(
            Shortcut::key(KeyCode::Up),
            Command::NudgeTempo(1),
            "Tempo +1",
        ));
        controller.add(KeyBinding::new(
            Shortcut::key(KeyCode::Down),
            Command::NudgeTempo(-1),
            "Tempo -1",
        ));

        // Raw mode swallows the interrupt signal
        controller.add(KeyBinding::new(
            Shortcut::key(KeyCode::Char('q')),
            Command::Shutdown,
            "Quit",
        ));
        controller.add(KeyBinding::new(
            Shortcut::key(KeyCode::Esc),
            Command::Shutdown,
            "Quit",
        ));
        controller.add(KeyBinding::new(
            Shortcut::ctrl(KeyCode::Char('c')),
            Command::Shutdown,
            "Quit",
        ));

        controller
    }

    /// Add a key binding, replacing any binding for the same shortcut
    pub fn add(&mut self, binding: KeyBinding) {
        self.bindings.insert(binding.shortcut.clone(), binding);
    }

    /// Remove a key binding
    pub fn remove(&mut self, shortcut: &Shortcut) -> Option<KeyBinding> {
        self.bindings.remove(shortcut)
    }

    /// Command for a key event. Releases are ignored; held keys repeat.
    pub fn process_key(&self, event: &KeyEvent) -> Option<Command> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        self.bindings
            .get(&Shortcut::new(event.code, event.modifiers))
            .map(|binding| binding.command.clone())
    }

    /// All bindings, sorted for help display
    pub fn bindings(&self) -> Vec<&KeyBinding> {
        let mut bindings: Vec<_> = self.bindings.values().collect();
        bindings.sort_by_key(|b| format_shortcut(&b.shortcut));
        bindings
    }
}

/// Format a shortcut for display
pub fn format_shortcut(shortcut: &Shortcut) -> String {
    let key = match shortcut.code {
        KeyCode::Char(' ') => "Space".to_string(),
        KeyCode::Char(c) => c.to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        other => format!("{:?}", other),
    };

    if shortcut.modifiers.contains(KeyModifiers::CONTROL) {
        format!("Ctrl+{}", key)
    } else {
        key
    }
}
