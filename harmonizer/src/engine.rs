// The harmonization engine: melody in, three-voice arrangement out.
//
// One left-to-right pass over the melody events, carrying a small
// `HarmonizationState` (current chord role, previous pitch of each voice,
// time of the last chord change and last bass onset). For every note:
//
// 1. Copy it to the melody line.
// 2. Chord update: once at least `chord_change_beats` have passed since the
//    last change, pick a new role. At a phrase boundary the role is forced
//    to the dominant; the opening note takes the tonic; elsewhere the
//    melody-weighted Markov draw decides.
//    The note after a boundary is always harmonized with the tonic, which
//    completes the V-I cadence.
// 3. Harmony: chord tones in the octaves around (melody octave - 1), kept
//    strictly under the melody and above `harmony_floor`, ranked by motion
//    cost with a bonus for thirds and sixths against the melody. One of the
//    cheapest `harmony_top_k` is drawn with weight 1/(cost+1); candidates at
//    cost -1 have unbounded weight and split the draw evenly between them.
// 4. Parallel repair: a parallel fifth or octave against the melody is
//    replaced by the first chord tone (at melody octave - 1) that avoids a
//    parallel fifth. Best effort: if none works, the violation stays.
// 5. Bass: every `bass_interval_beats`, the chord root in the base octave,
//    or another configured octave if that moves less.
//
// Rests only produce a melody rest. Nothing here fails: non-diatonic notes
// keep the current chord, an empty candidate set falls back to a fixed
// interval below the melody, and a melody too low for that fallback simply
// gets no harmony note. The only error path is key detection in
// `harmonize_events`.
//
// All randomness comes from the caller's `HarmonyRng`; the same seed and
// input always produce the same arrangement. The engine itself is
// immutable, so one `Harmonizer` can serve many runs.

use crate::config::HarmonizerConfig;
use crate::error::{HarmonizeError, Result};
use crate::key::{Key, detect_key};
use crate::markov::{ChordRole, cadence_roles, sample_weighted};
use crate::melody::{NoteEvent, Voice, octave, pitch_in_octave, pitch_name};
use crate::phrase::detect_boundaries;
use crate::voice_leading::{
    ParallelCount, count_parallels, is_imperfect_consonance, is_parallel_fifth,
    is_parallel_octave, voice_leading_cost,
};
use harmonizer_prng::HarmonyRng;
use std::collections::BTreeSet;

/// A chord role taking effect at a given onset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChordChange {
    pub onset: f64,
    pub role: ChordRole,
}

/// The result of one harmonization run.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrangement {
    pub key: Key,
    pub melody: Vec<NoteEvent>,
    pub harmony: Vec<NoteEvent>,
    pub bass: Vec<NoteEvent>,
    /// Melody event indices treated as phrase endings.
    pub boundaries: BTreeSet<usize>,
    /// The chord progression, one entry per change of role.
    pub chords: Vec<ChordChange>,
}

impl Arrangement {
    pub fn voice(&self, voice: Voice) -> &[NoteEvent] {
        match voice {
            Voice::Melody => &self.melody,
            Voice::Harmony => &self.harmony,
            Voice::Bass => &self.bass,
        }
    }

    /// Roman numerals of the progression, e.g. "I IV V I".
    pub fn progression(&self) -> String {
        self.chords
            .iter()
            .map(|c| c.role.label(self.key.tonality))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn stats(&self) -> ArrangementStats {
        let count_notes = |events: &[NoteEvent]| events.iter().filter(|e| !e.is_rest()).count();
        ArrangementStats {
            melody_notes: count_notes(&self.melody),
            harmony_notes: count_notes(&self.harmony),
            bass_notes: count_notes(&self.bass),
            chord_changes: self.chords.len(),
            phrase_boundaries: self.boundaries.len(),
            melody_harmony_parallels: count_parallels(&self.melody, &self.harmony),
        }
    }
}

/// Summary figures for logging and the CLI report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrangementStats {
    pub melody_notes: usize,
    pub harmony_notes: usize,
    pub bass_notes: usize,
    pub chord_changes: usize,
    pub phrase_boundaries: usize,
    pub melody_harmony_parallels: ParallelCount,
}

/// Mutable per-run state. Created fresh for every run and dropped after.
#[derive(Debug)]
struct HarmonizationState {
    role: ChordRole,
    prev_harmony: Option<u8>,
    prev_bass: Option<u8>,
    prev_melody: Option<u8>,
    last_chord_change: f64,
    last_bass_onset: Option<f64>,
}

impl HarmonizationState {
    fn new() -> Self {
        HarmonizationState {
            role: ChordRole::Tonic,
            prev_harmony: None,
            prev_bass: None,
            prev_melody: None,
            last_chord_change: f64::NEG_INFINITY,
            last_bass_onset: None,
        }
    }
}

/// Rule-based three-voice harmonizer.
#[derive(Debug, Clone, Default)]
pub struct Harmonizer {
    config: HarmonizerConfig,
}

impl Harmonizer {
    pub fn new(config: HarmonizerConfig) -> Self {
        Harmonizer { config }
    }

    pub fn config(&self) -> &HarmonizerConfig {
        &self.config
    }

    /// Harmonize a melody whose key is not known in advance.
    ///
    /// Uses the configured key override if present, otherwise detects the
    /// key from the melody. Fails when there is no key to be found.
    pub fn harmonize_events(&self, melody: &[NoteEvent], rng: &mut HarmonyRng) -> Result<Arrangement> {
        let key = match self.config.key {
            Some(key) => {
                log::info!("Using configured key: {key}");
                key
            }
            None => {
                let key = detect_key(melody).ok_or(HarmonizeError::KeyDetection)?;
                log::info!("Detected key: {key}");
                key
            }
        };
        Ok(self.harmonize(melody, key, rng))
    }

    /// Harmonize a melody in a known key.
    pub fn harmonize(&self, melody: &[NoteEvent], key: Key, rng: &mut HarmonyRng) -> Arrangement {
        let boundaries = detect_boundaries(melody, &self.config.phrase);
        log::info!("Detected {} phrase boundaries", boundaries.len());

        let mut state = HarmonizationState::new();
        let mut arrangement = Arrangement {
            key,
            melody: Vec::with_capacity(melody.len()),
            harmony: Vec::new(),
            bass: Vec::new(),
            boundaries,
            chords: Vec::new(),
        };

        for (i, event) in melody.iter().enumerate() {
            let (pitch, onset, duration) = match *event {
                NoteEvent::Rest { onset, duration } => {
                    arrangement.melody.push(NoteEvent::rest(onset, duration));
                    continue;
                }
                NoteEvent::Note {
                    pitch,
                    onset,
                    duration,
                } => (pitch, onset, duration),
            };

            arrangement.melody.push(NoteEvent::note(pitch, onset, duration));

            self.update_chord(&mut state, &arrangement.boundaries, i, pitch, onset, &key, rng);
            if arrangement.chords.last().is_none_or(|c| c.role != state.role) {
                log::debug!(
                    "beat {onset}: {} over {}",
                    state.role.label(key.tonality),
                    pitch_name(pitch)
                );
                arrangement.chords.push(ChordChange {
                    onset,
                    role: state.role,
                });
            }

            let chord = state.role.pitch_classes(&key);

            match self.choose_harmony(pitch, &chord, state.prev_harmony, rng) {
                Some(candidate) => {
                    let harmony = self.repair_parallels(pitch, candidate, &chord, &state);
                    arrangement.harmony.push(NoteEvent::note(harmony, onset, duration));
                    state.prev_harmony = Some(harmony);
                }
                None => state.prev_harmony = None,
            }

            let bass_due = state
                .last_bass_onset
                .is_none_or(|last| onset - last >= self.config.bass_interval_beats);
            if bass_due {
                let bass = self.choose_bass(state.role, &key, state.prev_bass);
                log::trace!("beat {onset}: bass {}", pitch_name(bass));
                arrangement
                    .bass
                    .push(NoteEvent::note(bass, onset, self.config.bass_duration_beats));
                state.prev_bass = Some(bass);
                state.last_bass_onset = Some(onset);
            }

            state.prev_melody = Some(pitch);
        }

        let stats = arrangement.stats();
        log::info!(
            "Harmonized {} melody notes: {} chord changes ({}), {} bass notes, {} parallel fifths, {} parallel octaves",
            stats.melody_notes,
            stats.chord_changes,
            arrangement.progression(),
            stats.bass_notes,
            stats.melody_harmony_parallels.fifths,
            stats.melody_harmony_parallels.octaves,
        );

        arrangement
    }

    /// Apply the chord-change rule and the post-boundary tonic resolution.
    #[allow(clippy::too_many_arguments)]
    fn update_chord(
        &self,
        state: &mut HarmonizationState,
        boundaries: &BTreeSet<usize>,
        index: usize,
        pitch: u8,
        onset: f64,
        key: &Key,
        rng: &mut HarmonyRng,
    ) {
        let [dominant, tonic] = cadence_roles(key.tonality);

        if onset - state.last_chord_change >= self.config.chord_change_beats {
            state.role = if boundaries.contains(&index) {
                dominant
            } else if state.prev_melody.is_none() {
                // The opening note establishes the key.
                tonic
            } else {
                self.config.chords.best_role_for_melody(
                    pitch,
                    key,
                    state.role,
                    &self.config.chord_fit,
                    rng,
                )
            };
            state.last_chord_change = onset;
        }

        if index > 0 && boundaries.contains(&(index - 1)) {
            state.role = tonic;
        }
    }

    /// Pick a harmony pitch from the chord below the melody. None when the
    /// melody is too low for even the fallback interval to fit under it.
    fn choose_harmony(
        &self,
        melody: u8,
        chord: &[u8; 3],
        prev_harmony: Option<u8>,
        rng: &mut HarmonyRng,
    ) -> Option<u8> {
        let ceiling = melody as i16 - self.config.melody_gap as i16;
        let target_octave = octave(melody) - 1;

        let mut candidates: Vec<(u8, f64)> = Vec::new();
        for &pc in chord {
            for offset in [-1, 0, 1] {
                let pitch = pitch_in_octave(pc, target_octave + offset);
                if pitch >= ceiling || pitch < self.config.harmony_floor as i16 || pitch > 127 {
                    continue;
                }
                let pitch = pitch as u8;
                let bonus = if is_imperfect_consonance(melody, pitch) { -1.0 } else { 0.0 };
                candidates.push((pitch, voice_leading_cost(prev_harmony, pitch) + bonus));
            }
        }

        if candidates.is_empty() {
            let fallback = melody
                .checked_sub(self.config.fallback_interval)
                .filter(|&p| (p as i16) <= ceiling);
            match fallback {
                Some(p) => log::trace!("no chord tone fits under {}, using {}", pitch_name(melody), pitch_name(p)),
                None => log::trace!("no room for harmony under {}", pitch_name(melody)),
            }
            return fallback;
        }

        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));
        candidates.truncate(self.config.harmony_top_k);

        // A cost of -1 (step plus third/sixth) has unbounded weight, so those
        // candidates share the draw equally and the rest get nothing.
        let unbounded: Vec<(u8, f64)> = candidates
            .iter()
            .filter(|&&(_, cost)| cost + 1.0 <= 0.0)
            .map(|&(pitch, _)| (pitch, 1.0))
            .collect();
        let weighted: Vec<(u8, f64)> = if unbounded.is_empty() {
            candidates
                .iter()
                .map(|&(pitch, cost)| (pitch, 1.0 / (cost + 1.0)))
                .collect()
        } else {
            unbounded
        };
        Some(sample_weighted(&weighted, rng).unwrap_or(candidates[0].0))
    }

    /// Replace a harmony pitch that forms parallel fifths or octaves with the
    /// melody. Alternatives are chord tones at melody octave - 1 that stay
    /// under the melody and avoid parallel fifths.
    fn repair_parallels(
        &self,
        melody: u8,
        harmony: u8,
        chord: &[u8; 3],
        state: &HarmonizationState,
    ) -> u8 {
        let (Some(prev_melody), Some(prev_harmony)) = (state.prev_melody, state.prev_harmony) else {
            return harmony;
        };
        let prev = (Some(prev_melody), Some(prev_harmony));
        if !is_parallel_fifth(prev.0, prev.1, melody, harmony)
            && !is_parallel_octave(prev.0, prev.1, melody, harmony)
        {
            return harmony;
        }

        let ceiling = melody as i16 - self.config.melody_gap as i16;
        let repaired = chord
            .iter()
            .map(|&pc| pitch_in_octave(pc, octave(melody) - 1))
            .filter(|&p| (0..ceiling).contains(&p))
            .map(|p| p as u8)
            .find(|&alt| !is_parallel_fifth(prev.0, prev.1, melody, alt));

        match repaired {
            Some(alt) => {
                log::debug!(
                    "parallel motion into {}/{}: harmony moved to {}",
                    pitch_name(melody),
                    pitch_name(harmony),
                    pitch_name(alt)
                );
                alt
            }
            None => {
                log::debug!(
                    "parallel motion into {}/{} left in place",
                    pitch_name(melody),
                    pitch_name(harmony)
                );
                harmony
            }
        }
    }

    /// Chord root in the base bass octave, or in another configured octave
    /// when that moves less from the previous bass note.
    fn choose_bass(&self, role: ChordRole, key: &Key, prev_bass: Option<u8>) -> u8 {
        let root = key.degree_pitch_class(role.root_degree());
        let octaves = &self.config.bass_octaves;
        let base_octave = octaves.first().copied().unwrap_or(2);
        let mut best = pitch_in_octave(root, base_octave);

        if let Some(prev) = prev_bass {
            let prev = prev as i16;
            let mut best_movement = (best - prev).abs();
            for &oct in octaves {
                let candidate = pitch_in_octave(root, oct);
                let movement = (candidate - prev).abs();
                if movement < best_movement && candidate >= self.config.bass_floor as i16 {
                    best = candidate;
                    best_movement = movement;
                }
            }
        }

        best.clamp(0, 127) as u8
    }
}
