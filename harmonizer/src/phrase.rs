// Phrase boundary detection for cadence placement.
//
// Scans a melody and flags event indices that plausibly end a phrase. The
// engine forces a dominant chord at a flagged note and a tonic on the note
// after it, producing an authentic cadence.
//
// Cues, any of which flags an index:
// - a long event (duration at least `long_note_ratio` times the mean),
// - an event immediately followed by a rest,
// - a melodic peak (a note strictly higher than both neighbours, which must
//   themselves be notes).
// Afterwards a periodic pass walks the onsets and, at every event sitting
// within one beat after a multiple of `period_beats`, adds a boundary unless
// one is already flagged within `nearby_indices` positions.
//
// This is a heuristic: it is deterministic but makes no claim of exact
// segmentation. The final index is never preceded by a rest lookahead, so
// boundaries there are best effort.

use crate::melody::NoteEvent;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tunable thresholds for boundary detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhraseConfig {
    /// An event this many times longer than the mean duration ends a phrase.
    pub long_note_ratio: f64,
    /// Period (beats) of the fallback boundaries.
    pub period_beats: f64,
    /// How far past a period multiple an onset may sit and still count.
    pub period_tolerance_beats: f64,
    /// A fallback boundary is skipped if a flagged index is this close.
    pub nearby_indices: usize,
}

impl Default for PhraseConfig {
    fn default() -> Self {
        PhraseConfig {
            long_note_ratio: 1.5,
            period_beats: 8.0,
            period_tolerance_beats: 1.0,
            nearby_indices: 2,
        }
    }
}

/// Melodies shorter than this have no boundaries.
const MIN_EVENTS: usize = 4;

/// Detect phrase boundaries. Returns sorted, de-duplicated event indices.
pub fn detect_boundaries(events: &[NoteEvent], config: &PhraseConfig) -> BTreeSet<usize> {
    let mut boundaries = BTreeSet::new();
    if events.len() < MIN_EVENTS {
        return boundaries;
    }

    let mean_duration = events.iter().map(NoteEvent::duration).sum::<f64>() / events.len() as f64;

    for (i, event) in events.iter().enumerate() {
        let long_note = event.duration() >= mean_duration * config.long_note_ratio;
        let before_rest = events.get(i + 1).is_some_and(NoteEvent::is_rest);
        if long_note || before_rest || is_melodic_peak(events, i) {
            boundaries.insert(i);
        }
    }

    // Periodic fallback. Boundaries added here count as "nearby" for later
    // events in the same walk.
    for (i, event) in events.iter().enumerate() {
        let onset = event.onset();
        if onset <= 0.0 || onset % config.period_beats >= config.period_tolerance_beats {
            continue;
        }
        let low = i.saturating_sub(config.nearby_indices);
        let high = i + config.nearby_indices;
        if boundaries.range(low..=high).next().is_none() {
            boundaries.insert(i);
        }
    }

    boundaries
}

/// A note strictly higher than both immediate neighbours, both of which are
/// notes.
fn is_melodic_peak(events: &[NoteEvent], i: usize) -> bool {
    if i == 0 || i + 1 >= events.len() {
        return false;
    }
    match (events[i - 1].pitch(), events[i].pitch(), events[i + 1].pitch()) {
        (Some(prev), Some(cur), Some(next)) => cur > prev && cur > next,
        _ => false,
    }
}
