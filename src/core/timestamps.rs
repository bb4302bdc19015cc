//! Timestamps embedded in log file names.
//!
//! Two encodings are in use:
//! - 2D test results: `YYYY-MM-DD_HH-MM-SS-{AM|PM}` (12-hour clock)
//! - Unity raw and summary logs: `HH_MM_SS_DD-MM-YYYY` (24-hour clock)
//!
//! The decoded value only orders files within one phase group; values from
//! the two encodings are never compared with each other.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use thiserror::Error;

static TEST_RESULTS_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2}-[AP]M").unwrap());
static UNITY_LOG_STAMP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d{2}_\d{2}_\d{2}_\d{2}-\d{2}-\d{4}").unwrap());

const TEST_RESULTS_FORMAT: &str = "%Y-%m-%d_%I-%M-%S-%p";
const UNITY_LOG_FORMAT: &str = "%H_%M_%S_%d-%m-%Y";

/// Errors raised while decoding a file name timestamp.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("no timestamp found in file name: {0}")]
    NotFound(String),

    #[error("invalid timestamp '{stamp}' in file name: {path}")]
    Invalid { path: String, stamp: String },
}

/// Decode the timestamp embedded anywhere in `path`.
///
/// The Unity log encoding takes precedence when, unexpectedly, both
/// encodings appear in the same path.
pub fn extract_timestamp(path: &Path) -> Result<NaiveDateTime, TimestampError> {
    let text = path.to_string_lossy();

    let (stamp, format) = if let Some(m) = UNITY_LOG_STAMP.find(&text) {
        (m.as_str(), UNITY_LOG_FORMAT)
    } else if let Some(m) = TEST_RESULTS_STAMP.find(&text) {
        (m.as_str(), TEST_RESULTS_FORMAT)
    } else {
        return Err(TimestampError::NotFound(text.into_owned()));
    };

    NaiveDateTime::parse_from_str(stamp, format).map_err(|_| TimestampError::Invalid {
        path: text.to_string(),
        stamp: stamp.to_string(),
    })
}
