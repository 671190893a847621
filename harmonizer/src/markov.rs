// Markov chord-progression model for functional harmony.
//
// Chords are described by their role in the key (tonic, supertonic, ...,
// leading tone) rather than by absolute pitches. Each tonality has a
// first-order transition table: from the current role, the probability of
// moving to each of the seven roles. The default tables encode common
// practice tendencies (ii and IV lead to V, V resolves to I, vii resolves
// to I, and so on).
//
// Two ways to pick the next chord:
// - `next_role`: a plain Markov draw from the current row.
// - `best_role_for_melody`: the same row re-weighted by whether the melody
//   note is a chord tone of each candidate, which is what the engine uses.
//
// Tables can be replaced from JSON through the harmonizer configuration;
// `validate` rejects rows that do not sum to one. A role with no row falls
// back to the tonic row.
//
// All draws go through an injected `HarmonyRng` so runs are reproducible.

use crate::error::{HarmonizeError, Result};
use crate::key::{Key, Tonality};
use harmonizer_prng::HarmonyRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tolerance for a transition row summing to 1.0.
pub const ROW_SUM_TOLERANCE: f64 = 1e-6;

/// A diatonic chord function, named by the scale degree of its root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChordRole {
    Tonic = 0,
    Supertonic = 1,
    Mediant = 2,
    Subdominant = 3,
    Dominant = 4,
    Submediant = 5,
    LeadingTone = 6,
}

impl ChordRole {
    pub const ALL: [ChordRole; 7] = [
        ChordRole::Tonic,
        ChordRole::Supertonic,
        ChordRole::Mediant,
        ChordRole::Subdominant,
        ChordRole::Dominant,
        ChordRole::Submediant,
        ChordRole::LeadingTone,
    ];

    /// Scale degree (0-6) of the chord root.
    pub fn root_degree(self) -> u8 {
        self as u8
    }

    /// The three scale degrees of the triad, root first.
    pub fn chord_degrees(self) -> [u8; 3] {
        let root = self.root_degree();
        [root, (root + 2) % 7, (root + 4) % 7]
    }

    /// Whether a scale degree belongs to this chord.
    pub fn contains_degree(self, degree: u8) -> bool {
        self.chord_degrees().contains(&(degree % 7))
    }

    /// Roman numeral for this role in the given tonality.
    pub fn label(self, tonality: Tonality) -> &'static str {
        match (tonality, self) {
            (Tonality::Major, ChordRole::Tonic) => "I",
            (Tonality::Major, ChordRole::Supertonic) => "ii",
            (Tonality::Major, ChordRole::Mediant) => "iii",
            (Tonality::Major, ChordRole::Subdominant) => "IV",
            (Tonality::Minor, ChordRole::Tonic) => "i",
            (Tonality::Minor, ChordRole::Supertonic) => "iio",
            (Tonality::Minor, ChordRole::Mediant) => "III",
            (Tonality::Minor, ChordRole::Subdominant) => "iv",
            (_, ChordRole::Dominant) => "V",
            (Tonality::Major, ChordRole::Submediant) => "vi",
            (Tonality::Minor, ChordRole::Submediant) => "VI",
            (_, ChordRole::LeadingTone) => "viio",
        }
    }

    /// Parse a roman numeral label for the given tonality.
    pub fn from_label(label: &str, tonality: Tonality) -> Option<ChordRole> {
        ChordRole::ALL
            .into_iter()
            .find(|role| role.label(tonality) == label)
    }

    /// Pitch classes of the triad in a key, root first.
    pub fn pitch_classes(self, key: &Key) -> [u8; 3] {
        self.chord_degrees().map(|d| key.degree_pitch_class(d))
    }
}

/// Authentic cadence for a tonality: dominant then tonic. The roles are
/// the same in both tonalities (minor V uses the natural seventh degree);
/// only their labels differ.
pub fn cadence_roles(tonality: Tonality) -> [ChordRole; 2] {
    match tonality {
        Tonality::Major | Tonality::Minor => [ChordRole::Dominant, ChordRole::Tonic],
    }
}

/// Transition probabilities: from role -> (to role -> probability).
pub type TransitionTable = BTreeMap<ChordRole, BTreeMap<ChordRole, f64>>;

/// How strongly melody fit re-weights the Markov row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChordFit {
    /// Multiplier when the melody note is a chord tone.
    pub chord_tone: f64,
    /// Multiplier when it is not (treated as a passing tone).
    pub passing_tone: f64,
}

impl Default for ChordFit {
    fn default() -> Self {
        ChordFit {
            chord_tone: 2.0,
            passing_tone: 0.3,
        }
    }
}

/// Per-tonality chord transition tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordModel {
    pub major: TransitionTable,
    pub minor: TransitionTable,
}

impl Default for ChordModel {
    fn default() -> Self {
        ChordModel::default_model()
    }
}

impl ChordModel {
    /// Functional-harmony tables for common practice music.
    pub fn default_model() -> Self {
        // Rows and columns in ChordRole::ALL order: I ii iii IV V vi vii.
        let major = table_from_rows([
            [0.05, 0.15, 0.05, 0.25, 0.30, 0.15, 0.05],
            [0.05, 0.05, 0.05, 0.10, 0.60, 0.05, 0.10],
            [0.05, 0.10, 0.05, 0.30, 0.10, 0.35, 0.05],
            [0.20, 0.15, 0.05, 0.05, 0.40, 0.05, 0.10],
            [0.55, 0.05, 0.05, 0.10, 0.05, 0.15, 0.05],
            [0.10, 0.25, 0.10, 0.30, 0.15, 0.05, 0.05],
            [0.70, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
        ]);
        // i iio III iv V VI vii
        let minor = table_from_rows([
            [0.05, 0.10, 0.10, 0.25, 0.30, 0.15, 0.05],
            [0.05, 0.05, 0.05, 0.10, 0.60, 0.05, 0.10],
            [0.10, 0.05, 0.05, 0.30, 0.10, 0.35, 0.05],
            [0.20, 0.10, 0.05, 0.05, 0.45, 0.05, 0.10],
            [0.55, 0.05, 0.05, 0.10, 0.05, 0.15, 0.05],
            [0.10, 0.20, 0.10, 0.30, 0.20, 0.05, 0.05],
            [0.70, 0.05, 0.05, 0.05, 0.05, 0.05, 0.05],
        ]);
        ChordModel { major, minor }
    }

    pub fn table(&self, tonality: Tonality) -> &TransitionTable {
        match tonality {
            Tonality::Major => &self.major,
            Tonality::Minor => &self.minor,
        }
    }

    /// Transition row for `current`, falling back to the tonic row.
    pub fn row(&self, current: ChordRole, tonality: Tonality) -> Option<&BTreeMap<ChordRole, f64>> {
        let table = self.table(tonality);
        table.get(&current).or_else(|| table.get(&ChordRole::Tonic))
    }

    /// Draw the next role from the Markov row of `current`.
    pub fn next_role(&self, current: ChordRole, tonality: Tonality, rng: &mut HarmonyRng) -> ChordRole {
        let Some(row) = self.row(current, tonality) else {
            return ChordRole::Tonic;
        };
        let candidates: Vec<(ChordRole, f64)> = row.iter().map(|(&r, &p)| (r, p)).collect();
        sample_weighted(&candidates, rng).unwrap_or(current)
    }

    /// Pick the next role, favouring chords that contain the melody note.
    ///
    /// A non-diatonic melody note never changes the harmony: `prev` is
    /// returned as is. Otherwise each role in `prev`'s row is scored by its
    /// transition probability times `fit.chord_tone` (melody is a chord
    /// tone) or `fit.passing_tone` (it is not), and one is drawn in
    /// proportion to the scores.
    pub fn best_role_for_melody(
        &self,
        melody_pitch: u8,
        key: &Key,
        prev: ChordRole,
        fit: &ChordFit,
        rng: &mut HarmonyRng,
    ) -> ChordRole {
        let Some(degree) = key.scale_degree(melody_pitch) else {
            return prev;
        };
        let Some(row) = self.row(prev, key.tonality) else {
            return prev;
        };

        let scored: Vec<(ChordRole, f64)> = row
            .iter()
            .map(|(&role, &p)| {
                let weight = if role.contains_degree(degree) {
                    fit.chord_tone
                } else {
                    fit.passing_tone
                };
                (role, p * weight)
            })
            .collect();

        sample_weighted(&scored, rng).unwrap_or(prev)
    }

    /// Check that every row is a probability distribution and that both
    /// tables have a tonic row to fall back on.
    pub fn validate(&self) -> Result<()> {
        for tonality in [Tonality::Major, Tonality::Minor] {
            let table = self.table(tonality);
            if !table.contains_key(&ChordRole::Tonic) {
                return Err(HarmonizeError::Config(format!(
                    "{} table has no {} row",
                    tonality.name(),
                    ChordRole::Tonic.label(tonality)
                )));
            }
            for (from, row) in table {
                if row.values().any(|p| !p.is_finite() || *p < 0.0) {
                    return Err(HarmonizeError::Config(format!(
                        "{} row {} has a negative or non-finite probability",
                        tonality.name(),
                        from.label(tonality)
                    )));
                }
                let sum: f64 = row.values().sum();
                if (sum - 1.0).abs() > ROW_SUM_TOLERANCE {
                    return Err(HarmonizeError::Config(format!(
                        "{} row {} sums to {sum}, expected 1.0",
                        tonality.name(),
                        from.label(tonality)
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Draw one item with probability proportional to its weight.
/// Returns None when no weight is positive.
pub fn sample_weighted<T: Copy>(items: &[(T, f64)], rng: &mut HarmonyRng) -> Option<T> {
    let weights: Vec<f64> = items.iter().map(|&(_, w)| w).collect();
    rng.weighted_index(&weights).map(|i| items[i].0)
}

fn table_from_rows(rows: [[f64; 7]; 7]) -> TransitionTable {
    ChordRole::ALL
        .into_iter()
        .zip(rows)
        .map(|(from, row)| (from, ChordRole::ALL.into_iter().zip(row).collect()))
        .collect()
}
