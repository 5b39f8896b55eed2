use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Cannot {operation}: {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    #[error("Bit index out of bounds: {index} >= {total_bits}")]
    IndexOutOfBounds { index: usize, total_bits: usize },

    #[error(
        "Byte range out of bounds: offset {offset} + length {length} exceeds {len_bytes} bytes"
    )]
    RangeOutOfBounds {
        offset: u64,
        length: usize,
        len_bytes: u64,
    },

    #[error(
        "Backing file length mismatch: expected {expected} bytes, found {actual}"
    )]
    FileLengthMismatch { expected: u64, actual: u64 },

    #[error("Record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
