//! Loaders for Unity summary and raw log files.
//!
//! Both formats interleave clock lines (a line starting with `-`, whose
//! first 20 characters hold a tick count) with data lines. The first clock
//! line fixes the origin; every later one advances the relative time.
//!
//! - Summary logs carry one event per data line, in one of two grammars
//!   depending on the phase that produced them.
//! - Raw logs carry one 10-component vector per tracked object per tick.

use std::fs;
use std::path::{Path, PathBuf};

use log::warn;
use thiserror::Error;

use super::items::{self, ITEM_COUNT};

/// Marker that identifies a study or practice summary log.
pub const STUDY_PRACTICE_MARKER: &str = "ChangeTextureEvent_ObjectClicked";
/// Marker that identifies a test summary log.
pub const TEST_MARKER: &str = "Object_Placed";

/// Width of the tick field at the start of a clock line.
const CLOCK_FIELD_WIDTH: usize = 20;

/// Errors that can occur while loading log files.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid clock line {line} in {path}: '{text}'")]
    InvalidClock {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("malformed event on line {line} of {path}: '{text}'")]
    MalformedEvent {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("unknown item '{label}' on line {line} of {path}")]
    UnknownItem {
        path: PathBuf,
        line: usize,
        label: String,
    },

    #[error("malformed sample on line {line} of {path}: '{text}'")]
    MalformedSample {
        path: PathBuf,
        line: usize,
        text: String,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Grammar of a summary log, detected from marker strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarySchema {
    /// `event, object` lines; locations come from the item table
    StudyPractice,
    /// `event, object : (x, y, z)` lines
    Test,
    /// Neither marker present; data lines are ignored
    Unknown,
}

impl SummarySchema {
    /// Detect the schema from the complete file contents.
    pub fn detect(content: &str) -> Self {
        if content.lines().any(|line| line.contains(STUDY_PRACTICE_MARKER)) {
            SummarySchema::StudyPractice
        } else if content.lines().any(|line| line.contains(TEST_MARKER)) {
            SummarySchema::Test
        } else {
            SummarySchema::Unknown
        }
    }
}

/// One event from a summary log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    /// Ticks since the first clock line.
    pub relative_time: i64,
    pub event_type: String,
    pub object_label: String,
    /// Two (table lookup) or three (recorded) components.
    pub location: Vec<f64>,
}

/// Parsed summary log, in file order.
#[derive(Debug, Clone)]
pub struct SummaryLog {
    pub schema: SummarySchema,
    pub events: Vec<LogEvent>,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl SummaryLog {
    /// A log with no events, standing in for a missing summary file.
    pub fn empty() -> Self {
        Self {
            schema: SummarySchema::Unknown,
            events: Vec::new(),
            source_path: None,
        }
    }

    /// Returns the number of events.
    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no event was parsed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Object labels in event order.
    pub fn object_labels(&self) -> impl Iterator<Item = &str> {
        self.events.iter().map(|e| e.object_label.as_str())
    }

    /// Position of the first event naming `label`.
    pub fn first_occurrence(&self, label: &str) -> Option<usize> {
        self.object_labels().position(|l| l == label)
    }
}

/// Tracks the clock origin and the current relative time of a log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogClock {
    origin: Option<i64>,
    current: i64,
}

impl LogClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a clock reading and return the relative time it represents.
    pub fn observe(&mut self, ticks: i64) -> i64 {
        let origin = *self.origin.get_or_insert(ticks);
        self.current = ticks - origin;
        self.current
    }

    /// Relative time of the latest clock line (0 before any).
    #[inline]
    pub fn current(&self) -> i64 {
        self.current
    }

    /// Returns true once a clock line has been seen.
    #[inline]
    pub fn is_started(&self) -> bool {
        self.origin.is_some()
    }
}

/// Returns true if `line` is a clock line.
#[inline]
pub fn is_clock_line(line: &str) -> bool {
    line.starts_with('-')
}

/// Decode the tick count of a clock line.
pub fn parse_clock_ticks(line: &str) -> Option<i64> {
    let field = line.get(..CLOCK_FIELD_WIDTH).unwrap_or(line);
    field.trim().parse().ok()
}

/// Read a whole log into memory, tolerating non-UTF-8 bytes.
pub fn read_log(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Load and parse a summary log.
///
/// Emits a warning, but still succeeds, when fewer events are present than
/// items in a full trial (half as many for practice logs).
pub fn load_summary_log<P: AsRef<Path>>(path: P) -> Result<SummaryLog> {
    let path = path.as_ref();
    let content = read_log(path)?;
    let summary = parse_summary_log(path, &content)?;

    let expected = expected_event_count(path);
    if summary.len() < expected {
        warn!(
            "The summary file {} contains an incomplete accounting of objects ({} of {}). \
             This may impact parsing in unpredictable ways.",
            path.display(),
            summary.len(),
            expected
        );
    }

    Ok(summary)
}

/// Minimum number of events a complete summary log holds. Practice logs
/// cover half the items.
pub fn expected_event_count(path: &Path) -> usize {
    if path.to_string_lossy().to_lowercase().contains("practice") {
        ITEM_COUNT / 2
    } else {
        ITEM_COUNT
    }
}

/// Parse summary log contents. The first line is a header and is skipped.
///
/// Clock readings and events are paired by position: the `k`-th event takes
/// the `k`-th clock reading, so the first event is always at time 0. Events
/// beyond the last clock line take the last reading (0 if there is none).
pub fn parse_summary_log(path: &Path, content: &str) -> Result<SummaryLog> {
    let schema = SummarySchema::detect(content);
    let mut clock = LogClock::new();
    let mut times = Vec::with_capacity(ITEM_COUNT * 2);
    let mut events = Vec::with_capacity(ITEM_COUNT * 2);

    for (idx, line) in content.lines().enumerate().skip(1) {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }

        if is_clock_line(line) {
            let ticks = parse_clock_ticks(line).ok_or_else(|| LoaderError::InvalidClock {
                path: path.to_path_buf(),
                line: line_no,
                text: line.to_string(),
            })?;
            times.push(clock.observe(ticks));
            continue;
        }

        let parsed = match schema {
            SummarySchema::Test => parse_test_event(line),
            SummarySchema::StudyPractice => parse_study_event(line),
            SummarySchema::Unknown => continue,
        };

        let (event_type, object_label, location) = match parsed {
            Some(Ok(fields)) => fields,
            Some(Err(label)) => {
                return Err(LoaderError::UnknownItem {
                    path: path.to_path_buf(),
                    line: line_no,
                    label,
                })
            }
            None => {
                return Err(LoaderError::MalformedEvent {
                    path: path.to_path_buf(),
                    line: line_no,
                    text: line.to_string(),
                })
            }
        };

        events.push(LogEvent {
            relative_time: 0,
            event_type,
            object_label,
            location,
        });
    }

    let last = times.last().copied().unwrap_or(0);
    for (k, event) in events.iter_mut().enumerate() {
        event.relative_time = times.get(k).copied().unwrap_or(last);
    }

    Ok(SummaryLog {
        schema,
        events,
        source_path: Some(path.to_path_buf()),
    })
}

type EventFields = (String, String, Vec<f64>);

/// `Object_Placed, PurseCube : (1.0, 0.5, 2.0)`
fn parse_test_event(line: &str) -> Option<std::result::Result<EventFields, String>> {
    let (head, tail) = line.split_once(':')?;
    let mut head_fields = head.trim().split(',');
    let event_type = head_fields.next()?.trim().to_string();
    let object_label = head_fields.next()?.trim().to_string();

    let tail = tail.trim();
    let inner = tail.strip_prefix('(')?.strip_suffix(')')?;
    let location = inner
        .split(',')
        .map(|v| v.trim().parse::<f64>().ok())
        .collect::<Option<Vec<f64>>>()?;

    Some(Ok((event_type, object_label, location)))
}

/// `ChangeTextureEvent_ObjectClicked, PurseCube`
fn parse_study_event(line: &str) -> Option<std::result::Result<EventFields, String>> {
    let mut fields = line.split(',');
    let event_type = fields.next()?.trim().to_string();
    let object_label = fields.next()?.trim().to_string();

    Some(match items::study_location(&object_label) {
        Some((x, z)) => Ok((event_type, object_label, vec![x, z])),
        None => Err(object_label),
    })
}

/// Which tracked object a raw log sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSource {
    /// Player body (movement path)
    Movement,
    /// Player camera (gaze direction)
    Gaze,
}

impl SampleSource {
    /// Return the vector payload of `line` if it is a sample for this source.
    ///
    /// The payload starts at a fixed offset after the object name.
    pub fn payload<'a>(&self, line: &'a str) -> Option<&'a str> {
        let offset = match self {
            SampleSource::Movement if line.contains("First Person Controller Test") => 29,
            SampleSource::Movement if line.contains("First Person Controller") => 24,
            SampleSource::Gaze if line.contains("Main Camera") => 12,
            _ => return None,
        };
        Some(line.get(offset..).unwrap_or(""))
    }
}

/// One tracked-object vector from a raw log.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    pub position: [f64; 3],
    /// Quaternion as (w, x, y, z)
    pub orientation: [f64; 4],
    /// Per-tick metadata, unused by the output tables
    pub auxiliary: [f64; 3],
}

impl RawSample {
    /// Parse a comma separated 10-component payload. Extra fields are ignored.
    pub fn parse(payload: &str) -> Option<Self> {
        let mut v = [0.0f64; 10];
        let mut fields = payload.split(',');
        for slot in v.iter_mut() {
            *slot = fields.next()?.trim().parse().ok()?;
        }
        Some(Self {
            position: [v[0], v[1], v[2]],
            orientation: [v[3], v[4], v[5], v[6]],
            auxiliary: [v[7], v[8], v[9]],
        })
    }
}

/// Decoded content of one raw log line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawLine {
    Clock(i64),
    Sample(RawSample),
    /// Any other line, including samples of other objects
    Other,
}

/// Decode one raw log line for the given sample source.
pub fn parse_raw_line(
    path: &Path,
    line_no: usize,
    line: &str,
    source: SampleSource,
) -> Result<RawLine> {
    if is_clock_line(line) {
        return parse_clock_ticks(line)
            .map(RawLine::Clock)
            .ok_or_else(|| LoaderError::InvalidClock {
                path: path.to_path_buf(),
                line: line_no,
                text: line.to_string(),
            });
    }

    match source.payload(line) {
        Some(payload) => RawSample::parse(payload)
            .map(RawLine::Sample)
            .ok_or_else(|| LoaderError::MalformedSample {
                path: path.to_path_buf(),
                line: line_no,
                text: line.to_string(),
            }),
        None => Ok(RawLine::Other),
    }
}
