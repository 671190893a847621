// Melody Harmonizer
//
// Turns a monophonic melody into a three-voice arrangement: the melody, a
// harmony line beneath it, and a bass line. Chords follow a Markov model of
// functional progressions, re-weighted by how well each chord fits the
// melody note. Harmony pitches are ranked by voice-leading cost, and phrase
// endings get authentic V-I cadences.
//
// Architecture:
// - melody.rs: NoteEvent (notes and rests in quarter-note beats), voices,
//   pitch naming
// - key.rs: Key/scale model and Krumhansl-Schmuckler key detection
// - markov.rs: Chord roles, transition tables, melody-fit chord selection
// - voice_leading.rs: Parallel fifth/octave checks and motion cost
// - phrase.rs: Phrase boundary heuristics for cadence placement
// - engine.rs: The harmonization pass producing an Arrangement
// - config.rs: JSON-loadable configuration with defaults
// - midi.rs: Melody loading from and arrangement writing to MIDI files
// - error.rs: Crate error type
//
// All randomness goes through harmonizer_prng, so output is deterministic
// given a seed.

pub mod config;
pub mod engine;
pub mod error;
pub mod key;
pub mod markov;
pub mod melody;
pub mod midi;
pub mod phrase;
pub mod voice_leading;
