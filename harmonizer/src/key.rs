// Key and scale support for tonal harmonization.
//
// A key is a tonic pitch class plus a tonality (major or minor). It exposes
// the seven scale pitch classes in degree order (degree 0 = tonic), which
// is all the engine needs: chord roles are expressed as scale-degree
// triples, and melody notes are located in the key by pitch class.
//
// Minor keys use the natural minor scale. The dominant chord in minor is
// therefore built on the unraised seventh degree; this matches the chord
// table in markov.rs, which shares one "V" label across both tonalities.
//
// This module also provides the key detector used when the caller does not
// supply a key: a duration-weighted pitch-class histogram correlated against
// the 24 rotations of the Krumhansl-Schmuckler major and minor profiles.

use crate::error::HarmonizeError;
use crate::melody::{NoteEvent, pitch_class, pitch_class_name};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Major or minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tonality {
    Major,
    Minor,
}

impl Tonality {
    /// Semitones from the tonic to each of the 7 scale degrees.
    pub fn intervals(self) -> [u8; 7] {
        match self {
            Tonality::Major => [0, 2, 4, 5, 7, 9, 11],
            Tonality::Minor => [0, 2, 3, 5, 7, 8, 10],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tonality::Major => "major",
            Tonality::Minor => "minor",
        }
    }
}

/// A concrete key: tonic pitch class plus tonality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Key {
    /// Pitch class of the tonic (0 = C, 2 = D, ...).
    pub tonic: u8,
    pub tonality: Tonality,
}

impl Key {
    pub fn new(tonic: u8, tonality: Tonality) -> Self {
        Key {
            tonic: tonic % 12,
            tonality,
        }
    }

    pub fn major(tonic: u8) -> Self {
        Key::new(tonic, Tonality::Major)
    }

    pub fn minor(tonic: u8) -> Self {
        Key::new(tonic, Tonality::Minor)
    }

    /// The 7 scale pitch classes in degree order.
    pub fn scale(&self) -> [u8; 7] {
        self.tonality.intervals().map(|iv| (self.tonic + iv) % 12)
    }

    /// Pitch class of a scale degree (taken mod 7).
    pub fn degree_pitch_class(&self, degree: u8) -> u8 {
        self.scale()[(degree % 7) as usize]
    }

    /// Scale degree (0-6) of a pitch, or None if it is not diatonic.
    pub fn scale_degree(&self, pitch: u8) -> Option<u8> {
        let pc = pitch_class(pitch);
        self.scale().iter().position(|&s| s == pc).map(|d| d as u8)
    }

    pub fn is_diatonic(&self, pitch: u8) -> bool {
        self.scale_degree(pitch).is_some()
    }

    /// Number of sharps (positive) or flats (negative) in the key
    /// signature, as MIDI key-signature meta events expect.
    pub fn signature_accidentals(&self) -> i8 {
        // Relative major tonic decides the signature.
        let major_tonic = match self.tonality {
            Tonality::Major => self.tonic,
            Tonality::Minor => (self.tonic + 3) % 12,
        };
        // Circle of fifths position, preferring flats past F#.
        let fifths = (major_tonic as i8 * 7).rem_euclid(12);
        if fifths > 6 { fifths - 12 } else { fifths }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", pitch_class_name(self.tonic), self.tonality.name())
    }
}

impl FromStr for Key {
    type Err = HarmonizeError;

    /// Accepts "C", "F# major", "bb:minor", "A min", "Eb". Without an
    /// explicit tonality, a lowercase tonic letter means minor.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HarmonizeError::InvalidKey(s.to_string());
        let mut parts = s
            .trim()
            .split(|c: char| c == ':' || c.is_whitespace())
            .filter(|p| !p.is_empty());

        let tonic_str = parts.next().ok_or_else(invalid)?;
        let mut chars = tonic_str.chars();
        let letter = chars.next().ok_or_else(invalid)?;
        let natural: i8 = match letter.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(invalid()),
        };
        let mut offset = 0i8;
        for c in chars {
            match c {
                '#' => offset += 1,
                'b' => offset -= 1,
                _ => return Err(invalid()),
            }
        }
        let tonic = (natural + offset).rem_euclid(12) as u8;

        let tonality = match parts.next().map(|m| m.to_ascii_lowercase()) {
            None if letter.is_ascii_lowercase() => Tonality::Minor,
            None => Tonality::Major,
            Some(m) => match m.as_str() {
                "major" | "maj" => Tonality::Major,
                "minor" | "min" | "m" => Tonality::Minor,
                _ => return Err(invalid()),
            },
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Key::new(tonic, tonality))
    }
}

/// Krumhansl-Schmuckler key profiles, indexed from the tonic.
const MAJOR_PROFILE: [f64; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f64; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];

/// Detect the most likely key of a melody.
///
/// Builds a pitch-class histogram weighted by note duration and returns the
/// key whose rotated profile correlates best with it. Ties keep the first
/// candidate in the order C major, C minor, C# major, ... Returns None when
/// the melody has no notes.
pub fn detect_key(events: &[NoteEvent]) -> Option<Key> {
    let mut histogram = [0.0f64; 12];
    let mut notes = 0usize;
    for event in events {
        if let Some(pitch) = event.pitch() {
            histogram[pitch_class(pitch) as usize] += event.duration().max(0.0);
            notes += 1;
        }
    }
    if notes == 0 {
        return None;
    }

    let mut best: Option<(Key, f64)> = None;
    for tonic in 0..12u8 {
        let rotated: [f64; 12] =
            std::array::from_fn(|i| histogram[(i + tonic as usize) % 12]);
        for (tonality, profile) in [
            (Tonality::Major, &MAJOR_PROFILE),
            (Tonality::Minor, &MINOR_PROFILE),
        ] {
            let r = correlation(&rotated, profile);
            if best.is_none_or(|(_, best_r)| r > best_r) {
                best = Some((Key::new(tonic, tonality), r));
            }
        }
    }

    best.map(|(key, r)| {
        log::debug!("key correlation {r:.3} for {key}");
        key
    })
}

/// Pearson correlation coefficient of two 12-bin profiles. Zero when either
/// side has no variance.
fn correlation(a: &[f64; 12], b: &[f64; 12]) -> f64 {
    let mean_a = a.iter().sum::<f64>() / 12.0;
    let mean_b = b.iter().sum::<f64>() / 12.0;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..12 {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a > 0.0 && var_b > 0.0 {
        cov / (var_a.sqrt() * var_b.sqrt())
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(pitches: &[u8]) -> Vec<NoteEvent> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| NoteEvent::note(p, i as f64, 1.0))
            .collect()
    }

    #[test]
    fn test_c_major_scale() {
        assert_eq!(Key::major(0).scale(), [0, 2, 4, 5, 7, 9, 11]);
    }

    #[test]
    fn test_a_minor_scale() {
        // A B C D E F G
        assert_eq!(Key::minor(9).scale(), [9, 11, 0, 2, 4, 5, 7]);
    }

    #[test]
    fn test_scale_degree() {
        let key = Key::major(7); // G major
        assert_eq!(key.scale_degree(67), Some(0)); // G
        assert_eq!(key.scale_degree(66), Some(6)); // F#
        assert_eq!(key.scale_degree(65), None); // F natural
        assert_eq!(key.degree_pitch_class(4), 2); // D
    }

    #[test]
    fn test_parse_keys() {
        assert_eq!("C".parse::<Key>().unwrap(), Key::major(0));
        assert_eq!("F# major".parse::<Key>().unwrap(), Key::major(6));
        assert_eq!("bb:minor".parse::<Key>().unwrap(), Key::minor(10));
        assert_eq!("a".parse::<Key>().unwrap(), Key::minor(9));
        assert_eq!("Eb min".parse::<Key>().unwrap(), Key::minor(3));
        assert!("H".parse::<Key>().is_err());
        assert!("C dorian".parse::<Key>().is_err());
        assert!("".parse::<Key>().is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::major(0).to_string(), "C major");
        assert_eq!(Key::minor(6).to_string(), "F# minor");
    }

    #[test]
    fn test_signature_accidentals() {
        assert_eq!(Key::major(0).signature_accidentals(), 0);
        assert_eq!(Key::major(7).signature_accidentals(), 1); // G
        assert_eq!(Key::major(5).signature_accidentals(), -1); // F
        assert_eq!(Key::minor(9).signature_accidentals(), 0); // A minor
        assert_eq!(Key::minor(2).signature_accidentals(), -1); // D minor
        assert_eq!(Key::major(3).signature_accidentals(), -3); // Eb
    }

    #[test]
    fn test_detect_c_major() {
        // C major arpeggio-heavy tune ending on C.
        let melody = line(&[60, 64, 67, 72, 67, 65, 64, 62, 60, 60]);
        assert_eq!(detect_key(&melody), Some(Key::major(0)));
    }

    #[test]
    fn test_detect_a_minor() {
        // A minor outline leaning on A, C and E.
        let melody = line(&[69, 72, 76, 74, 72, 71, 69, 64, 69, 69]);
        assert_eq!(detect_key(&melody), Some(Key::minor(9)));
    }

    #[test]
    fn test_detect_empty() {
        assert_eq!(detect_key(&[]), None);
        assert_eq!(detect_key(&[NoteEvent::rest(0.0, 4.0)]), None);
    }
}
