// End-to-end tests for the harmonizer pipeline.
//
// Builds melodies in memory, runs them through the engine with seeded
// generators, and checks the arrangement-level guarantees: register limits
// for harmony and bass, the C-major scale scenario, seeded determinism, and
// a full MIDI write/read cycle through a temporary file.

use harmonizer::config::HarmonizerConfig;
use harmonizer::engine::{Arrangement, Harmonizer};
use harmonizer::key::Key;
use harmonizer::markov::ChordRole;
use harmonizer::melody::{NoteEvent, Voice};
use harmonizer::midi::{arrangement_to_smf, read_melody, write_arrangement};
use harmonizer::voice_leading::count_parallels;
use harmonizer_prng::HarmonyRng;

/// Helper: consecutive notes from (pitch, beats) pairs; pitch 0 is a rest.
fn line(shape: &[(u8, f64)]) -> Vec<NoteEvent> {
    let mut onset = 0.0;
    shape.iter()
        .map(|&(pitch, duration)| {
            let event = if pitch == 0 {
                NoteEvent::rest(onset, duration)
            } else {
                NoteEvent::note(pitch, onset, duration)
            };
            onset += duration;
            event
        })
        .collect()
}

fn c_major_scale() -> Vec<NoteEvent> {
    line(&[
        (60, 1.0),
        (62, 1.0),
        (64, 1.0),
        (65, 1.0),
        (67, 1.0),
        (69, 1.0),
        (71, 1.0),
        (72, 1.0),
    ])
}

/// Two phrases in G major with a rest, a long note and some leaps.
fn folk_tune() -> Vec<NoteEvent> {
    line(&[
        (67, 1.0),
        (71, 1.0),
        (74, 1.0),
        (71, 1.0),
        (72, 0.5),
        (71, 0.5),
        (69, 1.0),
        (67, 2.0),
        (0, 1.0),
        (66, 1.0),
        (67, 1.0),
        (69, 1.0),
        (71, 0.5),
        (72, 0.5),
        (74, 1.0),
        (76, 1.5),
        (74, 0.5),
        (72, 1.0),
        (69, 1.0),
        (67, 4.0),
    ])
}

fn run(melody: &[NoteEvent], seed: u64) -> Arrangement {
    let harmonizer = Harmonizer::default();
    let mut rng = HarmonyRng::new(seed);
    harmonizer.harmonize_events(melody, &mut rng).unwrap()
}

#[test]
fn register_limits_hold_for_many_seeds() {
    let melody = folk_tune();
    for seed in 0..200 {
        let out = run(&melody, seed);
        for h in &out.harmony {
            let m = out
                .melody
                .iter()
                .find(|e| e.onset() == h.onset())
                .and_then(NoteEvent::pitch)
                .unwrap();
            let h = h.pitch().unwrap();
            assert!(h + 2 <= m, "seed {seed}: harmony {h} vs melody {m}");
        }
        for b in out.bass.iter().filter_map(NoteEvent::pitch) {
            assert!((36..=59).contains(&b), "seed {seed}: bass {b}");
        }
    }
}

#[test]
fn melody_and_rests_pass_through() {
    let melody = folk_tune();
    let out = run(&melody, 11);
    assert_eq!(out.melody, melody);
    assert_eq!(out.key, Key::major(7));
    let notes = melody.iter().filter(|e| !e.is_rest()).count();
    assert_eq!(out.harmony.len(), notes);
    assert_eq!(out.voice(Voice::Harmony).len(), notes);
}

#[test]
fn c_major_scale_scenario() {
    let harmonizer = Harmonizer::default();
    for seed in 0..100 {
        let mut rng = HarmonyRng::new(seed);
        let out = harmonizer.harmonize(&c_major_scale(), Key::major(0), &mut rng);

        assert_eq!(out.chords[0].role, ChordRole::Tonic);
        assert!(out.chords.iter().skip(1).all(|c| c.onset >= 2.0));

        let first_bass = out.bass[0].pitch().unwrap();
        assert_eq!(first_bass % 12, 0);
        assert!(first_bass == 36 || first_bass == 48);

        assert_eq!(count_parallels(&out.melody, &out.harmony).fifths, 0, "seed {seed}");
    }
}

#[test]
fn same_seed_same_arrangement() {
    let melody = folk_tune();
    let a = run(&melody, 1234);
    let b = run(&melody, 1234);
    assert_eq!(a, b);

    let bytes = |arrangement: &Arrangement| {
        let mut buf = Vec::new();
        arrangement_to_smf(arrangement, 100).write_std(&mut buf).unwrap();
        buf
    };
    assert_eq!(bytes(&a), bytes(&b));
}

#[test]
fn seeds_vary_the_harmony() {
    let melody = folk_tune();
    let first = run(&melody, 0);
    let differs = (1..50).any(|seed| run(&melody, seed).harmony != first.harmony);
    assert!(differs);
}

#[test]
fn config_changes_bass_rhythm() {
    let config = HarmonizerConfig::from_json(
        r#"{ "bass_interval_beats": 4.0, "bass_duration_beats": 4.0 }"#,
    )
    .unwrap();
    let harmonizer = Harmonizer::new(config);
    let mut rng = HarmonyRng::new(5);
    let out = harmonizer.harmonize(&c_major_scale(), Key::major(0), &mut rng);
    let onsets: Vec<f64> = out.bass.iter().map(NoteEvent::onset).collect();
    assert_eq!(onsets, vec![0.0, 4.0]);
    assert!(out.bass.iter().all(|b| b.duration() == 4.0));
}

#[test]
fn midi_file_round_trip() {
    let dir = std::env::temp_dir().join(format!("harmonizer_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("folk.mid");

    let out = run(&folk_tune(), 77);
    write_arrangement(&out, 120, &path).unwrap();

    // The first track with notes is the melody.
    let melody = read_melody(&path).unwrap();
    assert_eq!(melody, out.melody);

    std::fs::remove_dir_all(&dir).unwrap();
}
