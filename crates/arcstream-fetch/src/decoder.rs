//! Record decoding interface.

use bytes::Bytes;
use thiserror::Error;

/// Errors from classifying or parsing a single record.
///
/// A decode error only discards the record it was raised for.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes than the header needs.
    #[error("record too short: need {needed} bytes, got {got}")]
    TooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        got: usize,
    },

    /// The sequence number field is not ASCII digits or spaces.
    #[error("invalid sequence number field")]
    InvalidSequence,

    /// Unknown data quality indicator.
    #[error("invalid quality indicator {0:#04x}")]
    InvalidQuality(u8),

    /// The start time is out of range in both byte orders.
    #[error("invalid record start time")]
    InvalidTime,

    /// The blockette chain does not reach a blockette 1000.
    #[error("no blockette 1000 in record header")]
    MissingBlockette1000,

    /// Blockette 1000 names an unsupported record length.
    #[error("invalid record length exponent {0}")]
    InvalidRecordLength(u8),
}

/// Classifies and parses the self-describing records of a response body.
///
/// The session reads [`PROBE_SIZE`](Self::PROBE_SIZE) bytes, asks
/// [`classify_length`](Self::classify_length) for the record's true length,
/// reads the rest and hands the whole record to [`parse`](Self::parse).
pub trait RecordDecoder {
    /// The decoded record type.
    type Record;

    /// Bytes read before the record length is known.
    const PROBE_SIZE: usize;

    /// Returns the full length of the record starting with `probe`.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if `probe` is not the start of a valid record.
    fn classify_length(&self, probe: &[u8]) -> Result<usize, DecodeError>;

    /// Parses one complete record.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the record is malformed.
    fn parse(&self, bytes: Bytes) -> Result<Self::Record, DecodeError>;
}
