// Data-driven harmonizer configuration.
//
// Every tunable of a harmonization run lives in `HarmonizerConfig`: the
// rhythm of chord and bass changes, register limits for the generated
// voices, the melody-fit weights for chord selection, phrase detection
// thresholds, and the Markov transition tables themselves. Defaults
// reproduce the classic rule set; a JSON file may override any subset of
// fields (missing fields keep their defaults).
//
// The config is handed to `Harmonizer::new` and never mutated during a run.
// An optional seed and key override let the CLI pin down a run completely.

use crate::error::{HarmonizeError, Result};
use crate::key::Key;
use crate::markov::{ChordFit, ChordModel};
use crate::phrase::PhraseConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarmonizerConfig {
    /// Minimum beats between chord changes.
    pub chord_change_beats: f64,
    /// Minimum beats between bass onsets.
    pub bass_interval_beats: f64,
    /// Length of every bass note in beats.
    pub bass_duration_beats: f64,
    /// Lowest allowed harmony candidate (MIDI). C3 by default.
    pub harmony_floor: u8,
    /// Harmony candidates must sit at least this many semitones below the
    /// melody.
    pub melody_gap: u8,
    /// Interval below the melody used when no chord tone fits.
    pub fallback_interval: u8,
    /// Lowest allowed bass pitch (MIDI). C2 by default.
    pub bass_floor: u8,
    /// Octaves tried for the bass root, base octave first.
    pub bass_octaves: Vec<i16>,
    /// Number of cheapest harmony candidates kept for the weighted draw.
    pub harmony_top_k: usize,
    /// Melody-fit multipliers for chord selection.
    pub chord_fit: ChordFit,
    /// Phrase boundary thresholds.
    pub phrase: PhraseConfig,
    /// Transition tables for major and minor keys.
    pub chords: ChordModel,
    /// Use this key instead of detecting one.
    pub key: Option<Key>,
    /// Seed for the run's random generator; random when absent.
    pub seed: Option<u64>,
    /// Tempo written to the output file.
    pub tempo_bpm: u16,
}

impl Default for HarmonizerConfig {
    fn default() -> Self {
        HarmonizerConfig {
            chord_change_beats: 2.0,
            bass_interval_beats: 2.0,
            bass_duration_beats: 2.0,
            harmony_floor: 48,
            melody_gap: 2,
            fallback_interval: 4,
            bass_floor: 36,
            bass_octaves: vec![2, 3],
            harmony_top_k: 3,
            chord_fit: ChordFit::default(),
            phrase: PhraseConfig::default(),
            chords: ChordModel::default_model(),
            key: None,
            seed: None,
            tempo_bpm: 120,
        }
    }
}

impl HarmonizerConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parse from a JSON string and validate.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: HarmonizerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("chord_change_beats", self.chord_change_beats),
            ("bass_interval_beats", self.bass_interval_beats),
            ("bass_duration_beats", self.bass_duration_beats),
            ("phrase.long_note_ratio", self.phrase.long_note_ratio),
            ("phrase.period_beats", self.phrase.period_beats),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(HarmonizeError::Config(format!("{name} must be positive, got {value}")));
            }
        }
        if self.bass_octaves.is_empty() {
            return Err(HarmonizeError::Config("bass_octaves must not be empty".to_string()));
        }
        if self.harmony_top_k == 0 {
            return Err(HarmonizeError::Config("harmony_top_k must be at least 1".to_string()));
        }
        if self.tempo_bpm == 0 {
            return Err(HarmonizeError::Config("tempo_bpm must be positive".to_string()));
        }
        self.chords.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Tonality;

    #[test]
    fn test_default_config_is_valid() {
        assert!(HarmonizerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_default_config_serializes() {
        let config = HarmonizerConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = HarmonizerConfig::from_json(&json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "chord_change_beats": 4.0,
            "seed": 99,
            "key": { "tonic": 9, "tonality": "minor" },
            "phrase": { "period_beats": 16.0 }
        }"#;
        let config = HarmonizerConfig::from_json(json).unwrap();
        assert_eq!(config.chord_change_beats, 4.0);
        assert_eq!(config.seed, Some(99));
        assert_eq!(config.key, Some(Key::new(9, Tonality::Minor)));
        assert_eq!(config.phrase.period_beats, 16.0);
        assert_eq!(config.phrase.long_note_ratio, 1.5);
        assert_eq!(config.bass_octaves, vec![2, 3]);
        assert_eq!(config.chords, ChordModel::default_model());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(HarmonizerConfig::from_json(r#"{ "chord_change_beats": 0.0 }"#).is_err());
        assert!(HarmonizerConfig::from_json(r#"{ "bass_octaves": [] }"#).is_err());
        assert!(HarmonizerConfig::from_json(r#"{ "harmony_top_k": 0 }"#).is_err());
        assert!(HarmonizerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_rejects_unnormalized_table() {
        let mut config = HarmonizerConfig::default();
        config
            .chords
            .major
            .get_mut(&crate::markov::ChordRole::Tonic)
            .unwrap()
            .clear();
        let json = serde_json::to_string(&config).unwrap();
        let err = HarmonizerConfig::from_json(&json).unwrap_err();
        assert!(matches!(err, HarmonizeError::Config(_)), "{err}");
    }
}
