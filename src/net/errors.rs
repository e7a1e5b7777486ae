use thiserror::Error;

/// Errors raised while parsing wire formats.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("buffer too short: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("unsupported {field} value {value:#06x}")]
    Unsupported { field: &'static str, value: u32 },

    #[error("bad IPv4 header checksum")]
    BadChecksum,
}
