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

use clap::{crate_version, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wtbank::bank::Bank;
use wtbank::config::{load_extraction_config, load_synth_config};
use wtbank::pipeline;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "Wavetable bank extraction and resynthesis."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extracts a wavetable bank from a directory of per-pitch recordings.
    Extract {
        /// The path to the extraction config.
        config_path: PathBuf,
    },
    /// Resynthesizes every pitch of a bank to audio files.
    Synth {
        /// The path to the bank JSON file.
        bank_path: PathBuf,
        /// The path to the synthesis config.
        config_path: PathBuf,
    },
    /// Writes the detected attack gates of one pitch as markers and gated audio.
    Gates {
        /// The path to the extraction config.
        config_path: PathBuf,
        /// The MIDI pitch to analyze.
        midi_pitch: u8,
        /// The directory receiving the gate files.
        out_dir: PathBuf,
    },
    /// Writes the loop points found in every note of one pitch as markers.
    Loops {
        /// The path to the extraction config.
        config_path: PathBuf,
        /// The MIDI pitch to analyze.
        midi_pitch: u8,
        /// The directory receiving the loop markers.
        out_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract { config_path } => {
            let config = load_extraction_config(&config_path)?;
            let bank = pipeline::extract_bank_batch(&config)?;

            println!(
                "Extracted {} pitches of {} to {}.",
                bank.pitches.len(),
                bank.instrument_name,
                config.output_path.display()
            );
        }
        Commands::Synth {
            bank_path,
            config_path,
        } => {
            let bank = Bank::read_json(&bank_path)?;
            let config = load_synth_config(&config_path)?;
            let paths = pipeline::render_bank(&bank, &config)?;

            if paths.is_empty() {
                println!("No pitches selected.");
                return Ok(());
            }

            println!("Rendered (count: {}):", paths.len());
            for path in paths {
                println!("- {}", path.display());
            }
        }
        Commands::Gates {
            config_path,
            midi_pitch,
            out_dir,
        } => {
            let config = load_extraction_config(&config_path)?;
            let analysis = pipeline::export_gates(&config, midi_pitch, &out_dir)?;

            println!(
                "Gates (count: {}, dominant channel: {}):",
                analysis.gates.len(),
                analysis.dominant_channel()
            );
            for gate in analysis.gates.iter() {
                println!(
                    "- {}..{}{}",
                    gate.begin,
                    gate.end,
                    if gate.forced { " (forced)" } else { "" }
                );
            }
        }
        Commands::Loops {
            config_path,
            midi_pitch,
            out_dir,
        } => {
            let config = load_extraction_config(&config_path)?;
            let loops = pipeline::export_loops(&config, midi_pitch, &out_dir)?;

            println!("Loops (count: {}):", loops.len());
            for segment in loops.iter() {
                println!(
                    "- channel {}: {}..{} (cost {:.3e})",
                    segment.channel, segment.begin, segment.end, segment.cost
                );
            }
        }
    }

    Ok(())
}
