// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use sfsynth::config::{self, SynthConfig};
use sfsynth::midi::{ParsedMidi, TimeDivision};
use sfsynth::sequencer::{PlaybackState, Sequencer};
use sfsynth::soundfont::SoundFont;
use sfsynth::synth;
use sfsynth::util::{filename_display, seconds_display, SignalLevels};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Seconds rendered after the last event so release tails can finish.
const MAX_TAIL_SECONDS: f64 = 6.0;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A SoundFont2 synthesizer and MIDI sequencer."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the presets and metadata of a SoundFont.
    Presets {
        /// The path to the SoundFont2 file.
        path: PathBuf,
    },
    /// Describes a MIDI file.
    Inspect {
        /// The path to the Standard MIDI File.
        path: PathBuf,
    },
    /// Renders a MIDI file offline and reports the output levels.
    Render {
        /// The path to the SoundFont2 file.
        soundfont: PathBuf,
        /// The path to the Standard MIDI File.
        midi: PathBuf,
        /// The path to the synthesizer config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// How many times to repeat the loop region.
        #[arg(short, long)]
        loops: Option<u32>,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Presets { path } => {
            let font = SoundFont::from_file(&path)?;
            let info = font.info();
            println!("{}:", filename_display(&path));
            if let Some((major, minor)) = info.version {
                println!("  version: {}.{}", major, minor);
            }
            for (tag, text) in info.entries.iter() {
                println!("  {}: {}", tag, text);
            }

            println!("\nPresets (count: {}):", font.presets().len());
            let mut presets: Vec<_> = font.presets().iter().collect();
            presets.sort_by_key(|p| (p.bank(), p.program()));
            for preset in presets {
                println!("- {:03}:{:03} {}", preset.bank(), preset.program(), preset.name());
            }
        }
        Commands::Inspect { path } => {
            let midi = ParsedMidi::from_file(&path)?;
            println!("{}:", filename_display(&path));
            println!("  title: {}", midi.title().unwrap_or("(none)"));
            println!("  format: {}", midi.format());
            println!("  tracks: {}", midi.tracks().len());
            println!("  events: {}", midi.event_count());
            match midi.division() {
                TimeDivision::Metrical(ticks) => println!("  division: {} ticks per quarter", ticks),
                TimeDivision::Smpte {
                    fps,
                    ticks_per_frame,
                } => println!("  division: {} fps, {} ticks per frame", fps, ticks_per_frame),
            }
            let region = midi.loop_region();
            println!("  loop: ticks {} to {}", region.start, region.end);
            if let Some((low, high)) = midi.key_range() {
                println!("  keys: {} to {}", low, high);
            }
            println!("  duration: {}", seconds_display(midi.duration()));

            println!("\nTempo map:");
            for change in midi.tempo().changes() {
                println!(
                    "- tick {} ({:.3}s): {:.2} BPM",
                    change.tick,
                    change.seconds,
                    change.bpm()
                );
            }

            println!("\nTracks:");
            for (index, name) in midi.track_names().iter().enumerate() {
                println!(
                    "- {}: {} ({} events)",
                    index,
                    name.as_deref().unwrap_or("(unnamed)"),
                    midi.tracks()[index].len()
                );
            }
        }
        Commands::Render {
            soundfont,
            midi,
            config,
            loops,
        } => {
            let config = match config {
                Some(path) => config::load(&path)?,
                None => SynthConfig::default(),
            };
            let font = Arc::new(SoundFont::from_file(&soundfont)?);
            let midi = ParsedMidi::from_file(&midi)?;

            let (control, mut synthesizer) = synth::create(font, &config)?;
            let mut sequencer = Sequencer::new(control, synthesizer.clock().clone(), midi);
            if let Some(loops) = loops {
                sequencer.set_loop(true);
                sequencer.set_loop_count(Some(loops));
            }

            let block_size = config.block_size();
            let mut levels = SignalLevels::default();
            let mut peak_voices = 0;
            sequencer.play(true);
            while sequencer.poll() == PlaybackState::Playing {
                levels.add(synthesizer.render(block_size));
                peak_voices = peak_voices.max(synthesizer.active_voices());
            }

            let finished_at = synthesizer.clock().seconds();
            while synthesizer.active_voices() > 0
                && synthesizer.clock().seconds() - finished_at < MAX_TAIL_SECONDS
            {
                levels.add(synthesizer.render(block_size));
            }

            let rendered = synthesizer.clock().seconds();
            info!(
                seconds = rendered,
                loops = sequencer.loops_played(),
                "Render complete"
            );
            println!(
                "Rendered {} ({:.3}s, {} loops)",
                seconds_display(rendered),
                rendered,
                sequencer.loops_played()
            );
            println!("Peak: {:.4}", levels.peak());
            println!("RMS: {:.4}", levels.rms());
            println!("Peak voices: {}", peak_voices);
        }
    }

    Ok(())
}
