//! Error types

use crate::binary::read::ReadEof;
use crate::tag::DisplayTag;
use std::fmt;

/// Errors that originate when parsing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum ParseError {
    BadEof,
    BadValue,
    BadVersion,
    BadOffset,
    BadIndex,
    LimitExceeded,
    MissingValue,
    MissingTable(u32),
    CompressionError,
    /// A construct that is legal per the OpenType specification but that the
    /// sanitizer refuses to process.
    Unsupported,
}

impl From<ReadEof> for ParseError {
    fn from(_error: ReadEof) -> Self {
        ParseError::BadEof
    }
}

impl From<std::num::TryFromIntError> for ParseError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        ParseError::BadValue
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BadEof => write!(f, "end of data reached unexpectedly"),
            ParseError::BadValue => write!(f, "invalid value"),
            ParseError::BadVersion => write!(f, "unexpected data version"),
            ParseError::BadOffset => write!(f, "invalid data offset"),
            ParseError::BadIndex => write!(f, "invalid data index"),
            ParseError::LimitExceeded => write!(f, "limit exceeded"),
            ParseError::MissingValue => write!(f, "an expected data value was missing"),
            ParseError::MissingTable(tag) => {
                write!(f, "font is missing '{}' table", DisplayTag(*tag))
            }
            ParseError::CompressionError => write!(f, "compression error"),
            ParseError::Unsupported => write!(f, "refusing unsupported construct"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors that originate when writing binary data
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum WriteError {
    BadValue,
    NotImplemented,
}

impl From<std::num::TryFromIntError> for WriteError {
    fn from(_error: std::num::TryFromIntError) -> Self {
        WriteError::BadValue
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::BadValue => write!(f, "write: bad value"),
            WriteError::NotImplemented => write!(f, "writing in this format is not implemented"),
        }
    }
}

impl std::error::Error for WriteError {}

/// Error returned from the top-level sanitize entry points.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SanitizeError {
    /// The input container could not be parsed or failed validation.
    Parse(ParseError),
    /// A specific table failed to parse or failed validation.
    Table(u32, ParseError),
    /// The sanitized output could not be serialized.
    Write(WriteError),
}

impl SanitizeError {
    /// Attach a table tag to a parse error.
    pub fn in_table(tag: u32, error: ParseError) -> SanitizeError {
        SanitizeError::Table(tag, error)
    }
}

impl From<ParseError> for SanitizeError {
    fn from(error: ParseError) -> Self {
        SanitizeError::Parse(error)
    }
}

impl From<WriteError> for SanitizeError {
    fn from(error: WriteError) -> Self {
        SanitizeError::Write(error)
    }
}

impl fmt::Display for SanitizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SanitizeError::Parse(err) => write!(f, "sanitize: {}", err),
            SanitizeError::Table(tag, err) => {
                write!(f, "sanitize: '{}' table: {}", DisplayTag(*tag), err)
            }
            SanitizeError::Write(err) => write!(f, "sanitize write: {}", err),
        }
    }
}

impl std::error::Error for SanitizeError {}
