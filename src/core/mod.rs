//! Core data types, static tables and I/O operations.

pub mod filenames;
pub mod items;
pub mod loaders;
pub mod regions;
pub mod timestamps;
pub mod transforms;
pub mod writers;

pub use filenames::{Classification, FileCategory, FilenameClassifier, LogKind, Phase};
pub use loaders::{LoaderError, LogEvent, SummaryLog, SummarySchema};
pub use regions::Region;
pub use timestamps::{extract_timestamp, TimestampError};
pub use writers::{CsvRowWriter, MemoryWriter, OutputTable, Record, RowWriter, WriteError};
