// Voice-leading rules: interval classes, parallel perfect intervals, and the
// motion cost used to rank harmony candidates.
//
// The cost scale is fixed: stepwise motion is ideal, repeated notes are
// slightly worse, and larger leaps cost progressively more.
//
//   movement (semitones)   cost
//   none (first note)      0
//   0                      0.5
//   1-2                    0
//   3-4                    1
//   5-7                    2
//   > 7                    4
//
// Parallel fifths/octaves follow the textbook definition: the same perfect
// interval class on two consecutive sonorities with both voices moving in
// the same direction. Oblique motion (one voice holding) is never parallel.
//
// Consumed by engine.rs for candidate ranking and repair, and by the
// arrangement statistics.

use crate::melody::NoteEvent;

/// Interval class 7: perfect fifth (and compound fifths).
pub const PERFECT_FIFTH: u8 = 7;
/// Interval class 0: unison or octave.
pub const PERFECT_OCTAVE: u8 = 0;

/// Absolute semitone distance mod 12 (0-11).
pub fn interval_class(p1: u8, p2: u8) -> u8 {
    ((p1 as i16 - p2 as i16).unsigned_abs() % 12) as u8
}

/// Signed motion from `prev` to `cur` in semitones.
pub fn motion(prev: u8, cur: u8) -> i16 {
    cur as i16 - prev as i16
}

/// Whether an interval is a third or sixth (interval class 3, 4, 8 or 9).
pub fn is_imperfect_consonance(p1: u8, p2: u8) -> bool {
    matches!(interval_class(p1, p2), 3 | 4 | 8 | 9)
}

/// Both voices moved, and in the same direction.
fn similar_motion(prev_a: u8, prev_b: u8, cur_a: u8, cur_b: u8) -> bool {
    let motion_a = motion(prev_a, cur_a);
    let motion_b = motion(prev_b, cur_b);
    (motion_a > 0 && motion_b > 0) || (motion_a < 0 && motion_b < 0)
}

fn is_parallel(
    class: u8,
    prev_a: Option<u8>,
    prev_b: Option<u8>,
    cur_a: u8,
    cur_b: u8,
) -> bool {
    let (Some(pa), Some(pb)) = (prev_a, prev_b) else {
        return false;
    };
    interval_class(pa, pb) == class
        && interval_class(cur_a, cur_b) == class
        && similar_motion(pa, pb, cur_a, cur_b)
}

/// Parallel perfect fifths between voices A and B. False when either
/// previous pitch is absent.
pub fn is_parallel_fifth(prev_a: Option<u8>, prev_b: Option<u8>, cur_a: u8, cur_b: u8) -> bool {
    is_parallel(PERFECT_FIFTH, prev_a, prev_b, cur_a, cur_b)
}

/// Parallel octaves or unisons between voices A and B. False when either
/// previous pitch is absent.
pub fn is_parallel_octave(prev_a: Option<u8>, prev_b: Option<u8>, cur_a: u8, cur_b: u8) -> bool {
    is_parallel(PERFECT_OCTAVE, prev_a, prev_b, cur_a, cur_b)
}

/// Cost of moving a voice from `prev` to `cur`. Lower is better.
pub fn voice_leading_cost(prev: Option<u8>, cur: u8) -> f64 {
    let Some(prev) = prev else {
        return 0.0;
    };
    match motion(prev, cur).unsigned_abs() {
        0 => 0.5,
        1..=2 => 0.0,
        3..=4 => 1.0,
        5..=7 => 2.0,
        _ => 4.0,
    }
}

/// Parallel-motion counts between two voices of an arrangement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParallelCount {
    pub fifths: usize,
    pub octaves: usize,
}

/// Count parallel fifths and octaves between an upper and a lower line.
///
/// Only notes that start together are compared, and each consecutive pair
/// of such dyads is checked once. Rests break the chain.
pub fn count_parallels(upper: &[NoteEvent], lower: &[NoteEvent]) -> ParallelCount {
    let mut count = ParallelCount::default();
    let mut prev: Option<(u8, u8)> = None;

    for event in upper {
        let Some(top) = event.pitch() else {
            prev = None;
            continue;
        };
        let bottom = lower
            .iter()
            .find(|e| e.onset() == event.onset())
            .and_then(NoteEvent::pitch);
        let Some(bottom) = bottom else {
            prev = None;
            continue;
        };

        let (prev_top, prev_bottom) = prev.unzip();
        if is_parallel_fifth(prev_top, prev_bottom, top, bottom) {
            count.fifths += 1;
        }
        if is_parallel_octave(prev_top, prev_bottom, top, bottom) {
            count.octaves += 1;
        }
        prev = Some((top, bottom));
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_class() {
        assert_eq!(interval_class(60, 67), 7);
        assert_eq!(interval_class(67, 60), 7);
        assert_eq!(interval_class(48, 67), 7); // compound fifth
        assert_eq!(interval_class(60, 72), 0);
        assert_eq!(interval_class(60, 65), 5);
    }

    #[test]
    fn test_parallel_fifth_detected() {
        // C4/F3 -> D4/G3, both up a step.
        assert!(is_parallel_fifth(Some(60), Some(53), 62, 55));
        // Both down.
        assert!(is_parallel_fifth(Some(62), Some(55), 60, 53));
    }

    #[test]
    fn test_parallel_octave_detected() {
        assert!(is_parallel_octave(Some(60), Some(48), 62, 50));
        assert!(!is_parallel_octave(Some(60), Some(48), 62, 55));
    }

    #[test]
    fn test_missing_previous_never_parallel() {
        for a in 36u8..84 {
            for b in 36u8..84 {
                assert!(!is_parallel_fifth(None, Some(b), a, b));
                assert!(!is_parallel_fifth(Some(a), None, a, b));
                assert!(!is_parallel_octave(None, None, a, b));
                assert!(!is_parallel_octave(Some(a), None, a, b));
            }
        }
    }

    #[test]
    fn test_contrary_motion_never_parallel() {
        for pa in 48u8..72 {
            for pb in 36u8..60 {
                for step in 1u8..=12 {
                    // A up, B down and A down, B up.
                    let (ca, cb) = (pa + step, pb - step);
                    assert!(!is_parallel_fifth(Some(pa), Some(pb), ca, cb));
                    assert!(!is_parallel_octave(Some(pa), Some(pb), ca, cb));
                    let (ca, cb) = (pa - step, pb + step);
                    assert!(!is_parallel_fifth(Some(pa), Some(pb), ca, cb));
                    assert!(!is_parallel_octave(Some(pa), Some(pb), ca, cb));
                }
            }
        }
    }

    #[test]
    fn test_oblique_motion_not_parallel() {
        // Repeated fifth with no motion at all.
        assert!(!is_parallel_fifth(Some(67), Some(60), 67, 60));
    }

    #[test]
    fn test_voice_leading_cost_buckets() {
        assert_eq!(voice_leading_cost(None, 60), 0.0);
        assert_eq!(voice_leading_cost(Some(60), 60), 0.5);
        assert_eq!(voice_leading_cost(Some(60), 61), 0.0);
        assert_eq!(voice_leading_cost(Some(60), 58), 0.0);
        assert_eq!(voice_leading_cost(Some(60), 64), 1.0);
        assert_eq!(voice_leading_cost(Some(60), 53), 2.0);
        assert_eq!(voice_leading_cost(Some(60), 68), 4.0);
    }

    #[test]
    fn test_voice_leading_cost_monotone_across_buckets() {
        // One representative per bucket past the step: 1-2, 3-4, 5-7, >7.
        let costs: Vec<f64> = [2u8, 3, 5, 8, 12]
            .iter()
            .map(|&m| voice_leading_cost(Some(60), 60 + m))
            .collect();
        assert!(costs.windows(2).all(|w| w[0] <= w[1]), "{costs:?}");
        for m in 1u8..24 {
            assert!(voice_leading_cost(Some(60), 60 + m) <= voice_leading_cost(Some(60), 61 + m));
        }
    }

    #[test]
    fn test_imperfect_consonance() {
        assert!(is_imperfect_consonance(64, 60)); // M3
        assert!(is_imperfect_consonance(69, 60)); // M6
        assert!(!is_imperfect_consonance(67, 60)); // P5
    }

    #[test]
    fn test_count_parallels() {
        let upper = vec![
            NoteEvent::note(60, 0.0, 1.0),
            NoteEvent::note(62, 1.0, 1.0),
            NoteEvent::rest(2.0, 1.0),
            NoteEvent::note(64, 3.0, 1.0),
        ];
        let lower = vec![
            NoteEvent::note(53, 0.0, 1.0),
            NoteEvent::note(55, 1.0, 1.0),
            NoteEvent::note(57, 3.0, 1.0),
        ];
        let count = count_parallels(&upper, &lower);
        assert_eq!(count, ParallelCount { fifths: 1, octaves: 0 });
    }
}
