use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, Clone, ThisError)]
pub enum CodecError {
    /// Fewer bytes than a type + payload pair.
    #[error("Malformed Frame Error: expected at least {expected} bytes, got {actual} {location}")]
    MalformedFrame {
        expected: usize,
        actual: usize,
        location: ErrorLocation,
    },
}
