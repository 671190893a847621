// Melody Harmonizer: CLI entry point.
//
// Reads a melody from a MIDI file, harmonizes it and writes a three-track
// arrangement (melody, harmony, bass) back to MIDI.
// The pipeline: load config -> read melody -> detect key -> harmonize -> write.
//
// Usage:
//   cargo run -p harmonizer -- <input.mid> [output.mid] [--seed N] [--key KEY]
//     [--tempo BPM] [--config path.json]
//
// Keys look like "C", "F# major", "a minor", "Bb:minor". Set RUST_LOG=debug
// to follow chord choices and voice-leading repairs.

use harmonizer::config::HarmonizerConfig;
use harmonizer::engine::Harmonizer;
use harmonizer::error::{HarmonizeError, Result};
use harmonizer::key::Key;
use harmonizer::melody::summary;
use harmonizer::midi::{read_melody, write_arrangement};
use harmonizer_prng::HarmonyRng;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Flags that take a value.
const VALUE_FLAGS: [&str; 4] = ["--seed", "--key", "--tempo", "--config"];

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let positional = positional_args(args);
    let Some(input) = positional.first().map(PathBuf::from) else {
        eprintln!(
            "Usage: harmonize <input.mid> [output.mid] [--seed N] [--key KEY] [--tempo BPM] [--config path.json]"
        );
        std::process::exit(2);
    };
    let output = positional
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| default_output(&input));

    let mut config = match flag_value(args, "--config") {
        Some(path) => HarmonizerConfig::load(Path::new(path))?,
        None => HarmonizerConfig::default(),
    };
    if let Some(key) = flag_value(args, "--key") {
        config.key = Some(key.parse::<Key>()?);
    }
    if let Some(tempo) = flag_value(args, "--tempo") {
        config.tempo_bpm = tempo
            .parse()
            .ok()
            .filter(|&t: &u16| t > 0)
            .ok_or_else(|| HarmonizeError::Config(format!("invalid tempo '{tempo}'")))?;
    }
    if let Some(seed) = flag_value(args, "--seed") {
        let seed = seed
            .parse()
            .map_err(|_| HarmonizeError::Config(format!("invalid seed '{seed}'")))?;
        config.seed = Some(seed);
    }
    let seed = config.seed.unwrap_or_else(clock_seed);

    println!("=== Melody Harmonizer ===");
    println!("Input: {}", input.display());
    println!("Output: {}", output.display());
    println!("Seed: {seed}");
    println!("Tempo: {} BPM", config.tempo_bpm);
    println!();

    println!("[1/3] Reading melody...");
    let melody = read_melody(&input)?;
    println!("  {}", summary(&melody));

    println!("[2/3] Harmonizing...");
    let tempo = config.tempo_bpm;
    let harmonizer = Harmonizer::new(config);
    let mut rng = HarmonyRng::new(seed);
    let arrangement = harmonizer.harmonize_events(&melody, &mut rng)?;
    let stats = arrangement.stats();
    println!("  Key: {}", arrangement.key);
    println!("  Phrase boundaries: {}", stats.phrase_boundaries);
    println!("  Progression: {}", arrangement.progression());
    println!(
        "  Notes: {} melody, {} harmony, {} bass",
        stats.melody_notes, stats.harmony_notes, stats.bass_notes
    );
    println!(
        "  Parallels against melody: {} fifths, {} octaves",
        stats.melody_harmony_parallels.fifths, stats.melody_harmony_parallels.octaves
    );

    println!("[3/3] Writing MIDI to {}...", output.display());
    write_arrangement(&arrangement, tempo, &output)?;
    println!("  Done!");
    Ok(())
}

/// Arguments that are neither flags nor flag values.
fn positional_args(args: &[String]) -> Vec<&str> {
    let mut positional = Vec::new();
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
        } else if !arg.starts_with("--") {
            positional.push(arg.as_str());
        }
    }
    positional
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// `song.mid` -> `song_harmonized.mid` next to the input.
fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "melody".to_string());
    input.with_file_name(format!("{stem}_harmonized.mid"))
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
