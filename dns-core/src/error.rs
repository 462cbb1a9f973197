//! Common error type for the parts of the store-building pipeline that
//! can fail: CSV loading and record-value parsing.

use std::fmt;

/// An error encountered while loading or interpreting records.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Error {
    /// A row of the CSV file is malformed.  `line` is 1-based and
    /// counts the header row.
    CsvRow { line: usize, reason: String },

    /// A record's `value` field does not match its type's grammar.
    BadValue {
        rtype: String,
        reason: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::CsvRow { line, reason } => write!(f, "line {line}: {reason}"),
            Error::BadValue { rtype, reason } => write!(f, "{rtype}: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}
