// Melody events and pitch helpers.
//
// A melodic line is an ordered sequence of `NoteEvent`s: pitched notes and
// rests, each with an onset and a duration measured in quarter-note beats.
// This is the common currency between the MIDI loader, the phrase detector,
// the harmonization engine, and the MIDI writer.
//
// Pitches are MIDI numbers (60 = middle C). Octaves follow scientific pitch
// notation, so C4 = 60 and `octave = pitch / 12 - 1`. Two pitches with the
// same number are always treated as identical; spelling only matters for
// display.

use serde::{Deserialize, Serialize};

/// One event in a monophonic line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoteEvent {
    Note { pitch: u8, onset: f64, duration: f64 },
    Rest { onset: f64, duration: f64 },
}

impl NoteEvent {
    pub fn note(pitch: u8, onset: f64, duration: f64) -> Self {
        NoteEvent::Note {
            pitch,
            onset,
            duration,
        }
    }

    pub fn rest(onset: f64, duration: f64) -> Self {
        NoteEvent::Rest { onset, duration }
    }

    /// Start time in beats.
    pub fn onset(&self) -> f64 {
        match *self {
            NoteEvent::Note { onset, .. } | NoteEvent::Rest { onset, .. } => onset,
        }
    }

    /// Length in beats.
    pub fn duration(&self) -> f64 {
        match *self {
            NoteEvent::Note { duration, .. } | NoteEvent::Rest { duration, .. } => duration,
        }
    }

    /// End time in beats.
    pub fn end(&self) -> f64 {
        self.onset() + self.duration()
    }

    /// The sounding pitch, or None for a rest.
    pub fn pitch(&self) -> Option<u8> {
        match *self {
            NoteEvent::Note { pitch, .. } => Some(pitch),
            NoteEvent::Rest { .. } => None,
        }
    }

    pub fn is_rest(&self) -> bool {
        matches!(self, NoteEvent::Rest { .. })
    }
}

/// The three voices of an arrangement, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Voice {
    Melody = 0,
    Harmony = 1,
    Bass = 2,
}

impl Voice {
    pub const ALL: [Voice; 3] = [Voice::Melody, Voice::Harmony, Voice::Bass];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Track name written to MIDI.
    pub fn label(self) -> &'static str {
        match self {
            Voice::Melody => "Melody",
            Voice::Harmony => "Harmony",
            Voice::Bass => "Bass",
        }
    }

    /// General MIDI program: acoustic grand piano for the upper voices,
    /// acoustic bass for the bass line.
    pub fn program(self) -> u8 {
        match self {
            Voice::Melody | Voice::Harmony => 0,
            Voice::Bass => 32,
        }
    }
}

const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Name of a pitch class (0-11), e.g. "F#".
pub fn pitch_class_name(pc: u8) -> &'static str {
    PITCH_CLASS_NAMES[(pc % 12) as usize]
}

/// Pitch class (0-11) of a MIDI pitch.
pub fn pitch_class(pitch: u8) -> u8 {
    pitch % 12
}

/// Scientific octave of a MIDI pitch (C4 = 60 is octave 4).
pub fn octave(pitch: u8) -> i16 {
    pitch as i16 / 12 - 1
}

/// MIDI number of a pitch class in a scientific octave. May fall outside
/// 0-127 for extreme octaves; callers filter.
pub fn pitch_in_octave(pc: u8, octave: i16) -> i16 {
    (octave + 1) * 12 + (pc % 12) as i16
}

/// Compact note name such as "C4" or "F#3".
pub fn pitch_name(pitch: u8) -> String {
    format!("{}{}", pitch_class_name(pitch), octave(pitch))
}

/// Render a line as space-separated note names with rests as '.', for logs.
pub fn summary(events: &[NoteEvent]) -> String {
    events
        .iter()
        .map(|e| match e.pitch() {
            Some(p) => pitch_name(p),
            None => ".".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}
