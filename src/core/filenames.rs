//! Classification of input paths into log categories and study phases.

use std::fmt;
use std::path::Path;

use regex::Regex;

use crate::config::ClassifierConfig;

/// Raw category of an input file, decided from its full path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileCategory {
    /// Unity raw log (position and orientation per tick)
    RawLog,
    /// Unity summary event log
    SummaryLog,
    /// 2D placement test results
    Test2dRaw,
    Unrecognized,
}

/// Session phase of a log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Practice,
    Study,
    Test,
}

impl Phase {
    /// Phases in keyword search order.
    pub const ALL: [Phase; 3] = [Phase::Practice, Phase::Study, Phase::Test];

    /// Lowercase keyword searched for in the path.
    pub fn keyword(self) -> &'static str {
        match self {
            Phase::Practice => "practice",
            Phase::Study => "study",
            Phase::Test => "test",
        }
    }

    /// Find the first phase whose keyword occurs in `path`, case-insensitively.
    pub fn detect(path: &str) -> Option<Phase> {
        let lower = path.to_lowercase();
        Self::ALL.into_iter().find(|phase| lower.contains(phase.keyword()))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Which of the two Unity log kinds a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogKind {
    Raw,
    Summary,
}

/// Full classification of one input path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A Unity log. `phase` is `None` when no phase keyword is present.
    Log {
        kind: LogKind,
        subject_id: String,
        phase: Option<Phase>,
    },
    /// A 2D test results file.
    Test2d { subject_id: String },
    Unrecognized,
}

/// Final path component, splitting on either separator so that Windows
/// paths recorded on the lab machines are handled on any host.
pub fn basename(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Subject id of a Unity log: the second `_`-separated token of the
/// basename with its first three characters (the `Sub` prefix) removed.
pub fn log_subject_id(basename: &str) -> Option<String> {
    basename
        .split('_')
        .nth(1)
        .map(|token| token.chars().skip(3).collect())
}

/// Subject id of a 2D results file: characters 5..8 of the basename.
pub fn test_2d_subject_id(basename: &str) -> String {
    basename.chars().skip(5).take(3).collect()
}

/// Path classifier built from configurable category patterns.
#[derive(Debug, Clone)]
pub struct FilenameClassifier {
    raw_log: Regex,
    summary_log: Regex,
    test_2d: Regex,
}

impl FilenameClassifier {
    /// Compile the category patterns.
    pub fn new(config: &ClassifierConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            raw_log: Regex::new(&config.raw_log_pattern)?,
            summary_log: Regex::new(&config.summary_log_pattern)?,
            test_2d: Regex::new(&config.test_2d_pattern)?,
        })
    }

    /// Decide the raw category. Patterns are tested in a fixed order.
    pub fn category(&self, path: &Path) -> FileCategory {
        let text = path.to_string_lossy();
        if self.raw_log.is_match(&text) {
            FileCategory::RawLog
        } else if self.summary_log.is_match(&text) {
            FileCategory::SummaryLog
        } else if self.test_2d.is_match(&text) {
            FileCategory::Test2dRaw
        } else {
            FileCategory::Unrecognized
        }
    }

    /// Classify a path, extracting subject id and phase where applicable.
    ///
    /// A log whose basename has no second `_` token cannot yield a subject
    /// id and is reported as unrecognized.
    pub fn classify(&self, path: &Path) -> Classification {
        let text = path.to_string_lossy();
        let basename = basename(&text);

        let kind = match self.category(path) {
            FileCategory::RawLog => LogKind::Raw,
            FileCategory::SummaryLog => LogKind::Summary,
            FileCategory::Test2dRaw => {
                return Classification::Test2d {
                    subject_id: test_2d_subject_id(basename),
                }
            }
            FileCategory::Unrecognized => return Classification::Unrecognized,
        };

        match log_subject_id(basename) {
            Some(subject_id) => Classification::Log {
                kind,
                subject_id,
                phase: Phase::detect(&text),
            },
            None => Classification::Unrecognized,
        }
    }
}

impl Default for FilenameClassifier {
    fn default() -> Self {
        // The default patterns are literals and always compile.
        Self::new(&ClassifierConfig::default()).expect("default classifier patterns are valid")
    }
}
