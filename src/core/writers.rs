//! Row writers for the output tables.
//!
//! Every output table is written through the [`RowWriter`] capability:
//! one header, then rows appended in pipeline order, then `close`.
//! [`CsvRowWriter`] persists to disk; [`MemoryWriter`] keeps rows in memory.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::OutputConfig;

/// One output row, already formatted.
pub type Record = Vec<String>;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Row written after `close`.
    #[error("writer for '{0}' is already closed")]
    Closed(String),
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Sink for one output table.
pub trait RowWriter {
    fn write_header(&mut self, columns: &[&str]) -> Result<()>;
    fn write_rows(&mut self, rows: &[Record]) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

pub const PATH_COLUMNS: [&str; 11] = [
    "subject_id",
    "trial_number",
    "time",
    "x",
    "y",
    "z",
    "room_by_order",
    "room_by_color",
    "items_clicked",
    "distance_from_last_point",
    "time_since_last_point",
];

pub const LOOK_COLUMNS: [&str; 15] = [
    "subject_id",
    "trial_number",
    "time",
    "x",
    "y",
    "z",
    "w",
    "euler_x",
    "euler_y",
    "euler_z",
    "room_by_order",
    "room_by_color",
    "items_clicked",
    "distance_from_last_point",
    "time_since_last_point",
];

pub const TEST_2D_COLUMNS: [&str; 12] = [
    "subject_id",
    "trial_number",
    "item_id",
    "x_placed",
    "y_placed",
    "x_expected",
    "y_expected",
    "order_clicked_study",
    "expected_room_by_order",
    "expected_room_by_color",
    "actual_room_by_order",
    "actual_room_by_color",
];

pub const TEST_VR_COLUMNS: [&str; 14] = [
    "subject_id",
    "trial_number",
    "item_id",
    "x_placed",
    "y_placed",
    "x_expected",
    "y_expected",
    "order_clicked_study",
    "expected_room_by_order",
    "expected_room_by_color",
    "actual_room_by_order",
    "actual_room_by_color",
    "number_of_replacements",
    "time_placed",
];

/// Render a measured value, keeping a trailing `.0` on integral values so
/// float columns stay recognisable as such.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// Render an optional cell, empty when absent.
pub fn format_optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// The eight output tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputTable {
    StudyPath,
    StudyLook,
    TestPath,
    TestLook,
    PracticePath,
    PracticeLook,
    Test2d,
    TestVr,
}

impl OutputTable {
    /// Tables in processing order within a trial.
    pub const ALL: [OutputTable; 8] = [
        OutputTable::StudyPath,
        OutputTable::StudyLook,
        OutputTable::TestPath,
        OutputTable::TestLook,
        OutputTable::PracticePath,
        OutputTable::PracticeLook,
        OutputTable::Test2d,
        OutputTable::TestVr,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            OutputTable::StudyPath => "study_path.csv",
            OutputTable::StudyLook => "study_look.csv",
            OutputTable::TestPath => "test_path.csv",
            OutputTable::TestLook => "test_look.csv",
            OutputTable::PracticePath => "practice_path.csv",
            OutputTable::PracticeLook => "practice_look.csv",
            OutputTable::Test2d => "2d_test.csv",
            OutputTable::TestVr => "vr_test.csv",
        }
    }

    pub fn columns(self) -> &'static [&'static str] {
        match self {
            OutputTable::StudyPath | OutputTable::TestPath | OutputTable::PracticePath => {
                &PATH_COLUMNS
            }
            OutputTable::StudyLook | OutputTable::TestLook | OutputTable::PracticeLook => {
                &LOOK_COLUMNS
            }
            OutputTable::Test2d => &TEST_2D_COLUMNS,
            OutputTable::TestVr => &TEST_VR_COLUMNS,
        }
    }

    pub fn is_selected(self, outputs: &OutputConfig) -> bool {
        match self {
            OutputTable::StudyPath => outputs.study_path,
            OutputTable::StudyLook => outputs.study_look,
            OutputTable::TestPath => outputs.test_path,
            OutputTable::TestLook => outputs.test_look,
            OutputTable::PracticePath => outputs.practice_path,
            OutputTable::PracticeLook => outputs.practice_look,
            OutputTable::Test2d => outputs.test_2d,
            OutputTable::TestVr => outputs.test_vr,
        }
    }

    /// Selected tables, in processing order.
    pub fn selected(outputs: &OutputConfig) -> Vec<OutputTable> {
        Self::ALL
            .into_iter()
            .filter(|table| table.is_selected(outputs))
            .collect()
    }
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// CSV file writer for one output table.
pub struct CsvRowWriter {
    path: PathBuf,
    writer: Option<csv::Writer<BufWriter<File>>>,
}

impl CsvRowWriter {
    /// Create (or truncate) the file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        ensure_parent_dirs(path)?;

        let file = File::create(path).map_err(|e| WriteError::CreateFile {
            path: path.display().to_string(),
            source: e,
        })?;
        let writer = csv::WriterBuilder::new()
            .flexible(false)
            .from_writer(BufWriter::new(file));

        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn inner(&mut self) -> Result<&mut csv::Writer<BufWriter<File>>> {
        self.writer
            .as_mut()
            .ok_or_else(|| WriteError::Closed(self.path.display().to_string()))
    }

    fn csv_error(&self, source: csv::Error) -> WriteError {
        WriteError::CsvError {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl RowWriter for CsvRowWriter {
    fn write_header(&mut self, columns: &[&str]) -> Result<()> {
        let result = self.inner()?.write_record(columns);
        result.map_err(|e| self.csv_error(e))
    }

    fn write_rows(&mut self, rows: &[Record]) -> Result<()> {
        for row in rows {
            let result = self.inner()?.write_record(row);
            result.map_err(|e| self.csv_error(e))?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| WriteError::WriteFile {
                path: self.path.display().to_string(),
                source: e,
            })?;
        }
        Ok(())
    }
}

impl Drop for CsvRowWriter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// In-memory writer, used by tests and by callers that post-process rows.
#[derive(Debug, Default, Clone)]
pub struct MemoryWriter {
    pub header: Vec<String>,
    pub rows: Vec<Record>,
    pub closed: bool,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RowWriter for MemoryWriter {
    fn write_header(&mut self, columns: &[&str]) -> Result<()> {
        self.header = columns.iter().map(|c| c.to_string()).collect();
        Ok(())
    }

    fn write_rows(&mut self, rows: &[Record]) -> Result<()> {
        if self.closed {
            return Err(WriteError::Closed("memory".to_string()));
        }
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
