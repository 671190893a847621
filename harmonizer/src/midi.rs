// MIDI input and output.
//
// Loading: reads a Standard MIDI File and extracts a monophonic melody from
// the first track that contains note-ons. Ticks become quarter-note beats
// through the header's ticks-per-quarter; SMPTE timecode files are rejected.
// A note-on with velocity 0 is treated as a note-off. When notes overlap,
// each note is cut at the next onset, and simultaneous onsets keep only the
// highest pitch. Gaps (including one before the first note) become rests.
//
// Writing: Format 1 (multi-track) SMF at 480 ticks per quarter. Track 0
// holds tempo and key signature; each voice of the arrangement then gets its
// own track and channel with a track name, a program change and note on/off
// pairs. A note that would sound past the next onset in its own voice (the
// bass is longer than its spacing when notes are short) is cut there.
//
// Uses the `midly` crate for both directions.

use crate::engine::Arrangement;
use crate::error::{HarmonizeError, Result};
use crate::key::Tonality;
use crate::melody::{NoteEvent, Voice};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Velocity of every written note.
const NOTE_VELOCITY: u8 = 80;

/// Read a melody from a MIDI file on disk.
pub fn read_melody(path: &Path) -> Result<Vec<NoteEvent>> {
    let data = std::fs::read(path)?;
    let smf = Smf::parse(&data)?;
    let melody = melody_from_smf(&smf)?;
    log::info!("Loaded {} melody events from {}", melody.len(), path.display());
    Ok(melody)
}

/// Extract the melody from a parsed SMF.
pub fn melody_from_smf(smf: &Smf) -> Result<Vec<NoteEvent>> {
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(tpq) if tpq.as_int() > 0 => tpq.as_int() as f64,
        _ => return Err(HarmonizeError::UnsupportedTiming),
    };

    for (index, track) in smf.tracks.iter().enumerate() {
        let spans = note_spans(track);
        if spans.is_empty() {
            continue;
        }
        log::debug!("Using track {index} ({} notes)", spans.len());
        let spans = monophonic(spans);
        return Ok(spans_to_events(&spans, ticks_per_quarter));
    }

    Err(HarmonizeError::NoMelody)
}

/// A sounding note in absolute ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NoteSpan {
    pitch: u8,
    start: u64,
    end: u64,
}

/// Pair note-ons with their note-offs. Notes still held at the end of the
/// track end at the last event. Zero-length notes are dropped.
fn note_spans(track: &[TrackEvent]) -> Vec<NoteSpan> {
    let mut spans = Vec::new();
    let mut held: [Option<u64>; 128] = [None; 128];
    let mut tick: u64 = 0;

    for event in track {
        tick += event.delta.as_int() as u64;
        let TrackEventKind::Midi { message, .. } = event.kind else {
            continue;
        };
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                let pitch = key.as_int();
                // Retriggering a held key ends the earlier note.
                if let Some(start) = held[pitch as usize].replace(tick) {
                    close(&mut spans, pitch, start, tick);
                }
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                let pitch = key.as_int();
                if let Some(start) = held[pitch as usize].take() {
                    close(&mut spans, pitch, start, tick);
                }
            }
            _ => {}
        }
    }

    for (pitch, start) in held.iter().enumerate() {
        if let Some(start) = *start {
            close(&mut spans, pitch as u8, start, tick);
        }
    }

    spans
}

fn close(spans: &mut Vec<NoteSpan>, pitch: u8, start: u64, end: u64) {
    if end > start {
        spans.push(NoteSpan { pitch, start, end });
    }
}

/// Reduce to one note at a time: highest pitch wins on shared onsets, and
/// every note ends no later than the next onset.
fn monophonic(mut spans: Vec<NoteSpan>) -> Vec<NoteSpan> {
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.pitch.cmp(&a.pitch)));
    spans.dedup_by_key(|s| s.start);

    let next_starts: Vec<Option<u64>> = spans
        .iter()
        .skip(1)
        .map(|s| Some(s.start))
        .chain(std::iter::once(None))
        .collect();
    for (span, next) in spans.iter_mut().zip(next_starts) {
        if let Some(next) = next {
            span.end = span.end.min(next);
        }
    }
    spans
}

fn spans_to_events(spans: &[NoteSpan], ticks_per_quarter: f64) -> Vec<NoteEvent> {
    let mut events = Vec::with_capacity(spans.len() * 2);
    let mut cursor: u64 = 0;
    for span in spans {
        if span.start > cursor {
            events.push(NoteEvent::rest(
                cursor as f64 / ticks_per_quarter,
                (span.start - cursor) as f64 / ticks_per_quarter,
            ));
        }
        events.push(NoteEvent::note(
            span.pitch,
            span.start as f64 / ticks_per_quarter,
            (span.end - span.start) as f64 / ticks_per_quarter,
        ));
        cursor = span.end;
    }
    events
}

/// Convert an arrangement to MIDI and write it to a file.
pub fn write_arrangement(arrangement: &Arrangement, tempo_bpm: u16, path: &Path) -> Result<()> {
    let smf = arrangement_to_smf(arrangement, tempo_bpm);
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    std::fs::write(path, &buf)?;
    log::info!("Wrote {} ({} bytes)", path.display(), buf.len());
    Ok(())
}

/// Convert an arrangement to an in-memory SMF.
pub fn arrangement_to_smf(arrangement: &Arrangement, tempo_bpm: u16) -> Smf<'static> {
    let mut smf = Smf::new(Header::new(
        Format::Parallel,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // Track 0: tempo and key signature.
    let tempo_microseconds = 60_000_000 / tempo_bpm.max(1) as u32;
    let key = arrangement.key;
    smf.tracks.push(vec![
        meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
        meta(MetaMessage::KeySignature(
            key.signature_accidentals(),
            key.tonality == Tonality::Minor,
        )),
        meta(MetaMessage::EndOfTrack),
    ]);

    for voice in Voice::ALL {
        smf.tracks.push(voice_track(voice, arrangement.voice(voice)));
    }

    smf
}

fn meta(message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(message),
    }
}

fn beats_to_ticks(beats: f64) -> u64 {
    (beats * TICKS_PER_QUARTER as f64).round().max(0.0) as u64
}

fn voice_track(voice: Voice, events: &[NoteEvent]) -> Track<'static> {
    let channel = u4::new(voice.index() as u8);
    let mut track: Track<'static> = vec![
        meta(MetaMessage::TrackName(voice.label().as_bytes())),
        TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange {
                    program: u7::new(voice.program()),
                },
            },
        },
    ];

    let notes: Vec<(u8, u64, u64)> = events
        .iter()
        .filter_map(|e| {
            e.pitch()
                .map(|p| (p, beats_to_ticks(e.onset()), beats_to_ticks(e.end())))
        })
        .collect();

    let mut last_tick: u64 = 0;
    for (i, &(pitch, start, end)) in notes.iter().enumerate() {
        let end = match notes.get(i + 1) {
            Some(&(_, next_start, _)) => end.min(next_start),
            None => end,
        };
        if end <= start || start < last_tick {
            continue;
        }
        let key = u7::new(pitch.min(127));
        track.push(TrackEvent {
            delta: u28::new((start - last_tick) as u32),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn {
                    key,
                    vel: u7::new(NOTE_VELOCITY),
                },
            },
        });
        track.push(TrackEvent {
            delta: u28::new((end - start) as u32),
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOff {
                    key,
                    vel: u7::new(0),
                },
            },
        });
        last_tick = end;
    }

    track.push(meta(MetaMessage::EndOfTrack));
    track
}
