// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn, Level};

use metronome::audio::output::list_devices;
use metronome::audio::{CpalBackend, HeadlessBackend};
use metronome::config::{FilePreferences, MemoryPreferences};
use metronome::control::{self, format_shortcut, KeyboardController};
use metronome::session::run;
use metronome::{AudioBackend, MetronomeConfig, PreferenceStore, Session, SessionHandle};

fn print_usage() {
    println!("METRONOME - Lookahead metronome");
    println!();
    println!("Usage: metronome [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --bpm <N>            Tempo, 0-400 (default: last used, else 120)");
    println!("  --signature <S>      2/4, 3/4, 4/4, 6/8, 9/8 or 12/8");
    println!("  --sound <K>          click, wood or hihat");
    println!("  --seconds <N>        Stop after N seconds (default: run until Ctrl+C)");
    println!("  --config <PATH>      YAML configuration file");
    println!("  --prefs <PATH>       Preference file remembering the last settings");
    println!("  --headless           Log pulses instead of playing them");
    println!("  --list-devices       List audio output devices");
    println!("  --verbose            Debug logging");
    println!("  --help               Show this help message");
    println!();
    println!("Keys:");
    for binding in KeyboardController::with_defaults().bindings() {
        println!("  {:<20} {}", format_shortcut(&binding.shortcut), binding.description);
    }
}

/// Longest accepted `--seconds` value: one week
const MAX_SECONDS: f64 = 7.0 * 24.0 * 3600.0;

#[derive(Debug, Default)]
struct Options {
    bpm: Option<i64>,
    signature: Option<String>,
    sound: Option<String>,
    seconds: Option<f64>,
    config: Option<PathBuf>,
    prefs: Option<PathBuf>,
    headless: bool,
    list_devices: bool,
    verbose: bool,
}

/// Parse command line flags. `None` means help was requested.
fn parse_args(args: &[String]) -> Result<Option<Options>> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| anyhow!("{} requires a value", flag))
        };

        match arg.as_str() {
            "--bpm" => {
                let raw = value("--bpm")?;
                options.bpm = Some(raw.parse().map_err(|_| anyhow!("Invalid tempo: {}", raw))?);
            }
            "--signature" => options.signature = Some(value("--signature")?),
            "--sound" => options.sound = Some(value("--sound")?),
            "--seconds" => {
                let raw = value("--seconds")?;
                let seconds: f64 = raw.parse().map_err(|_| anyhow!("Invalid duration: {}", raw))?;
                if !seconds.is_finite() || !(0.0..=MAX_SECONDS).contains(&seconds) {
                    return Err(anyhow!("Duration must be between 0 and {} seconds: {}", MAX_SECONDS, raw));
                }
                options.seconds = Some(seconds);
            }
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--prefs" => options.prefs = Some(PathBuf::from(value("--prefs")?)),
            "--headless" => options.headless = true,
            "--list-devices" => options.list_devices = true,
            "--verbose" | "-v" => options.verbose = true,
            "--help" | "-h" => return Ok(None),
            other => return Err(anyhow!("Unknown option: {}", other)),
        }
    }

    Ok(Some(options))
}

async fn play<B: AudioBackend>(
    backend: B,
    preferences: Box<dyn PreferenceStore>,
    config: &MetronomeConfig,
    options: &Options,
) -> Result<()> {
    let session = Session::with_config(backend, preferences, config);
    let (handle, commands) = SessionHandle::new(&session);

    if let Some(bpm) = options.bpm {
        handle.set_tempo(bpm);
    }
    if let Some(signature) = &options.signature {
        handle.set_time_signature(signature.as_str());
    }
    if let Some(sound) = &options.sound {
        handle.set_sound_kind(sound.as_str());
    }
    handle.start();

    // Beat display
    let mut state = handle.watch();
    let display = tokio::spawn(async move {
        let mut last = None;
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            if current.current_pulse == last {
                continue;
            }
            last = current.current_pulse;
            if let Some(beat) = current.current_pulse {
                let marker = if beat == 0 { "*" } else { " " };
                print!("\r{} {}/{}   ", marker, beat + 1, current.pulses_per_bar);
                let _ = io::stdout().flush();
            }
        }
    });

    let stopper = handle.clone();
    let seconds = options.seconds;
    tokio::spawn(async move {
        match seconds {
            Some(seconds) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        stopper.shutdown();
    });

    // Keyboard control, only when attached to a terminal
    let keys = if io::stdin().is_terminal() {
        let handle = handle.clone();
        Some(tokio::task::spawn_blocking(move || {
            control::read_keys(&KeyboardController::with_defaults(), &handle)
        }))
    } else {
        None
    };

    let session = run(session, commands).await;
    display.abort();
    if let Some(keys) = keys {
        match keys.await {
            Ok(Err(e)) => warn!("Keyboard input failed: {}", e),
            Err(e) => warn!("Keyboard task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }
    println!();

    let state = session.state();
    info!(
        tempo = %state.tempo,
        signature = %state.time_signature,
        sound = %state.sound_kind,
        "metronome finished"
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            print_usage();
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(if options.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    if options.list_devices {
        for (index, name) in list_devices().iter().enumerate() {
            println!("{}: {}", index, name);
        }
        return Ok(());
    }

    let mut config = match &options.config {
        Some(path) => MetronomeConfig::load(path)?,
        None => MetronomeConfig::default(),
    };
    if let Some(path) = &options.prefs {
        config.preferences = Some(path.clone());
    }

    let preferences: Box<dyn PreferenceStore> = match &config.preferences {
        Some(path) => Box::new(
            FilePreferences::open(path)
                .with_context(|| format!("Failed to open preferences at {:?}", path))?,
        ),
        None => Box::new(MemoryPreferences::new()),
    };

    if options.headless {
        play(HeadlessBackend, preferences, &config, &options).await
    } else {
        play(CpalBackend::default(), preferences, &config, &options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options = parse_args(&args(&[
            "--bpm", "96", "--signature", "6/8", "--sound", "wood", "--seconds", "2.5", "--headless",
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(options.bpm, Some(96));
        assert_eq!(options.signature.as_deref(), Some("6/8"));
        assert_eq!(options.sound.as_deref(), Some("wood"));
        assert_eq!(options.seconds, Some(2.5));
        assert!(options.headless);
        assert!(!options.verbose);
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["--bpm"])).is_err());
        assert!(parse_args(&args(&["--bpm", "fast"])).is_err());
        assert!(parse_args(&args(&["--tap"])).is_err());
        assert!(parse_args(&args(&["--help"])).unwrap().is_none());
        assert!(parse_args(&args(&["--seconds", "inf"])).is_err());
        assert!(parse_args(&args(&["--seconds", "NaN"])).is_err());
        assert!(parse_args(&args(&["--seconds", "1e300"])).is_err());
        assert!(parse_args(&args(&["--seconds", "-1"])).is_err());
        assert!(parse_args(&args(&["--seconds", "0"])).unwrap().is_some());
    }
}
