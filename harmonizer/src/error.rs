// Error types for the harmonizer.
//
// Only boundary failures surface here: reading or writing MIDI, loading a
// configuration, parsing a key name, or failing to find any key at all.
// Musical degradation inside a run (non-diatonic melody notes, missing
// transition rows, empty harmony candidate sets) is recovered locally by
// the engine and never becomes an error.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarmonizeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI error: {0}")]
    Midi(#[from] midly::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The file uses SMPTE timecode instead of ticks per quarter note.
    #[error("unsupported MIDI timing: only metrical (ticks per quarter) files are supported")]
    UnsupportedTiming,

    /// No track in the file contains a single note.
    #[error("no melody found: the file contains no notes")]
    NoMelody,

    /// Key analysis produced nothing usable for this melody.
    #[error("key detection failed: melody has no pitched notes")]
    KeyDetection,

    #[error("invalid key '{0}': expected e.g. 'C', 'F# major', 'bb:minor'")]
    InvalidKey(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for harmonizer operations.
pub type Result<T> = std::result::Result<T, HarmonizeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_problem() {
        let err = HarmonizeError::InvalidKey("H".to_string());
        assert!(err.to_string().contains("'H'"));

        let err = HarmonizeError::Config("row V sums to 0.9".to_string());
        assert_eq!(err.to_string(), "invalid configuration: row V sums to 0.9");
    }

    #[test]
    fn test_io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: HarmonizeError = io.into();
        assert!(matches!(err, HarmonizeError::Io(_)));
    }
}
