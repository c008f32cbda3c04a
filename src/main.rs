//! gesturetone - Headless driver for the gesture music engine.
//!
//! Loads (or synthesizes) a drawing and either plays it through the default
//! audio device or renders it to a WAV file.
//!
//! # Usage
//!
//! ```bash
//! gesturetone drawing.json --play              # Play a saved drawing
//! gesturetone drawing.json --out drawing.wav   # Render it to WAV
//! gesturetone --demo --drums --bass --play     # Draw a demo and play it
//! ```
//!
//! Set `RUST_LOG=gesturetone=debug` for engine logs.

use gesturetone::audio::{export_to_wav, AudioOutput};
use gesturetone::gesture::{Gesture, GestureFrame};
use gesturetone::music::name_to_note;
use gesturetone::playback::{AccompanimentParts, DrumPattern, PlaybackMode, PlaybackState};
use gesturetone::{App, EngineConfig, Notifier, Scheduler};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Command-line options for the application.
struct CliOptions {
    /// Project file to load (.json or .bin).
    project: Option<PathBuf>,
    /// Engine configuration file (JSON).
    config: Option<PathBuf>,
    mode: PlaybackMode,
    /// Tempo override.
    bpm: Option<u32>,
    drums: bool,
    bass: bool,
    chords: bool,
    metronome: bool,
    pattern: DrumPattern,
    /// Scale root, e.g. "D4".
    root: Option<u8>,
    /// WAV file to render into.
    out: Option<PathBuf>,
    /// Where to save the drawing (useful with --demo).
    save: Option<PathBuf>,
    /// Play through the audio device.
    play: bool,
    /// Draw a built-in demo instead of loading a project.
    demo: bool,
}

impl CliOptions {
    /// Parses command-line arguments.
    ///
    /// Supports:
    /// - `<project>`: a `.json` or `.bin` project file
    /// - `--config <path>`: engine configuration (JSON)
    /// - `--mode <scan|timeline>`: playback layout
    /// - `--bpm <n>`: tempo override
    /// - `--drums`, `--bass`, `--chords`, `--metronome`: accompaniment parts
    /// - `--pattern <basic|rock|four_on_floor>`: drum pattern
    /// - `--root <note>`: scale root such as `C4` or `F#3`
    /// - `--out <path>`: render to WAV
    /// - `--save <path>`: save the drawing
    /// - `--play`: play through the default output device
    /// - `--demo`: draw a built-in demo
    /// - `--help` or `-h`: Print help and exit
    fn parse() -> Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut options = Self {
            project: None,
            config: None,
            mode: PlaybackMode::default(),
            bpm: None,
            drums: false,
            bass: false,
            chords: false,
            metronome: false,
            pattern: DrumPattern::default(),
            root: None,
            out: None,
            save: None,
            play: false,
            demo: false,
        };
        let mut i = 1;

        let value = |i: usize, flag: &str| -> Result<String> {
            args.get(i)
                .cloned()
                .with_context(|| format!("{} requires a value", flag))
        };

        while i < args.len() {
            match args[i].as_str() {
                "--config" | "-c" => {
                    i += 1;
                    options.config = Some(PathBuf::from(value(i, "--config")?));
                }
                "--mode" | "-m" => {
                    i += 1;
                    options.mode = value(i, "--mode")?
                        .parse()
                        .map_err(anyhow::Error::msg)?;
                }
                "--bpm" => {
                    i += 1;
                    options.bpm = Some(
                        value(i, "--bpm")?
                            .parse()
                            .context("--bpm expects a whole number")?,
                    );
                }
                "--drums" => options.drums = true,
                "--bass" => options.bass = true,
                "--chords" => options.chords = true,
                "--metronome" => options.metronome = true,
                "--pattern" => {
                    i += 1;
                    options.pattern = value(i, "--pattern")?
                        .parse()
                        .map_err(anyhow::Error::msg)?;
                }
                "--root" => {
                    i += 1;
                    let name = value(i, "--root")?;
                    options.root = Some(
                        name_to_note(&name)
                            .with_context(|| format!("invalid note name '{}'", name))?,
                    );
                }
                "--out" | "-o" => {
                    i += 1;
                    options.out = Some(PathBuf::from(value(i, "--out")?));
                }
                "--save" | "-s" => {
                    i += 1;
                    options.save = Some(PathBuf::from(value(i, "--save")?));
                }
                "--play" | "-p" => options.play = true,
                "--demo" => options.demo = true,
                "--help" | "-h" => {
                    print_help(args.first().map(String::as_str).unwrap_or("gesturetone"));
                    std::process::exit(0);
                }
                other if other.starts_with('-') => {
                    eprintln!("Unknown option: {}", other);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
                other => options.project = Some(PathBuf::from(other)),
            }
            i += 1;
        }

        Ok(options)
    }

    fn accompaniment_parts(&self) -> AccompanimentParts {
        AccompanimentParts {
            drums: self.drums,
            bass: self.bass,
            chords: self.chords,
            metronome: self.metronome,
            pattern: self.pattern,
        }
    }
}

fn print_help(program: &str) {
    eprintln!("gesturetone - Gesture-driven music engine");
    eprintln!();
    eprintln!("Usage: {} [PROJECT] [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --config PATH      Engine configuration (JSON)");
    eprintln!("  -m, --mode MODE        Playback layout: scan or timeline (default: scan)");
    eprintln!("      --bpm N            Tempo override (60-200)");
    eprintln!("      --drums            Add drum accompaniment");
    eprintln!("      --bass             Add bass accompaniment");
    eprintln!("      --chords           Add chord accompaniment");
    eprintln!("      --metronome        Add a metronome click");
    eprintln!("      --pattern NAME     Drum pattern: basic, rock or four_on_floor");
    eprintln!("      --root NOTE        Scale root, e.g. C4 or F#3");
    eprintln!("  -o, --out PATH         Render to a WAV file");
    eprintln!("  -s, --save PATH        Save the drawing (.json or .bin)");
    eprintln!("  -p, --play             Play through the default audio device");
    eprintln!("      --demo             Draw a built-in demo instead of loading a project");
    eprintln!("  -h, --help             Print this help message");
}

/// Draws three wavy strokes through the live-input path.
///
/// Preview notes are muted; no device is open yet to play them.
fn draw_demo(app: &App) -> Result<()> {
    app.set_sound_enabled(false);
    let mut time = 0.0;
    for stroke in 0..3 {
        let base = 0.25 + 0.25 * stroke as f32;
        for i in 0..40 {
            let x = 0.05 + 0.9 * i as f32 / 39.0;
            let y = base + 0.1 * (x * 12.0 + stroke as f32).sin();
            app.handle_frame(&GestureFrame::draw(x, y.clamp(0.0, 1.0), time))?;
            time += 0.05;
        }
        // Lift the brush, then switch instrument for the next stroke.
        app.handle_frame(&GestureFrame::new(Gesture::Select, None, time))?;
        time += 0.1;
        app.handle_frame(&GestureFrame::new(Gesture::OpenPalm, None, time))?;
        time += 0.1;
        app.handle_frame(&GestureFrame::new(Gesture::None, None, time))?;
    }
    app.set_sound_enabled(true);
    tracing::info!(strokes = app.stroke_count(), "Drew demo");
    Ok(())
}

/// Plays the drawing on the default device until playback ends.
fn play(app: Arc<App>, cli: &CliOptions) -> Result<()> {
    let _output = AudioOutput::open(Arc::clone(app.mixer()), app.config())?;
    let scheduler = Scheduler::spawn(Arc::clone(&app)).context("Failed to start scheduler")?;

    app.start_playback(cli.mode, cli.bpm)
        .context("Failed to start playback")?;
    eprintln!("Playing ({})...", cli.mode);

    while app.playback_state() != PlaybackState::Stopped {
        thread::sleep(Duration::from_millis(50));
    }
    scheduler.shutdown();

    // Let release tails ring out before the stream closes.
    while !app.mixer().is_silent() {
        thread::sleep(Duration::from_millis(20));
    }
    let stats = app.mixer().stats();
    tracing::info!(
        steals = stats.steals,
        peak_active = stats.peak_active,
        underruns = stats.underruns,
        "Playback finished"
    );
    Ok(())
}

/// Main entry point.
fn main() -> Result<()> {
    let cli = CliOptions::parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let app = Arc::new(App::new(config, Notifier::detached()));
    app.set_accompaniment_parts(cli.accompaniment_parts());

    if cli.demo {
        draw_demo(&app)?;
    } else if let Some(path) = &cli.project {
        app.load_project(path)
            .with_context(|| format!("Failed to load project: {}", path.display()))?;
    } else {
        eprintln!("Nothing to do: pass a project file or --demo (see --help)");
        std::process::exit(1);
    }

    if let Some(root) = cli.root {
        app.update_settings(|project| project.root_note = root);
    }

    if let Some(path) = &cli.save {
        app.save_project(path)
            .with_context(|| format!("Failed to save project: {}", path.display()))?;
    }

    if let Some(path) = &cli.out {
        let mut project = app.snapshot();
        if let Some(bpm) = cli.bpm {
            project.bpm = gesturetone::music::clamp_bpm(bpm);
        }
        export_to_wav(
            &project,
            app.config(),
            cli.mode,
            app.accompaniment_parts(),
            path,
            None::<fn(f32)>,
        )
        .with_context(|| format!("Failed to export: {}", path.display()))?;
        eprintln!("Wrote {}", path.display());
    }

    if cli.play {
        play(Arc::clone(&app), &cli)?;
    }

    Ok(())
}
