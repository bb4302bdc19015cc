//! Cataloging and reconciliation of Holodeck navigation task logs.
//!
//! This crate provides tools for:
//! - Classifying raw, summary and 2D test result files by subject and phase
//! - Assembling them into per-subject trials under configurable inclusion criteria
//! - Turning raw Unity logs into annotated movement and gaze trajectories
//! - Reconciling 2D and VR test placements against the study session
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use std::path::Path;
//! use holodeck_pipeline::core::{FilenameClassifier, MemoryWriter, OutputTable};
//! use holodeck_pipeline::processors::{catalog_files, discover_files, export_all};
//! use holodeck_pipeline::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! let files = discover_files(Path::new("subject_data"));
//! let catalog = catalog_files(&files, &FilenameClassifier::default(), &config.catalog).unwrap();
//!
//! let mut writers: BTreeMap<OutputTable, MemoryWriter> = BTreeMap::new();
//! writers.insert(OutputTable::TestVr, MemoryWriter::new());
//! let stats = export_all(&catalog.individuals, &mut writers).unwrap();
//! println!("{} rows", stats.total_rows());
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{CatalogConfig, ClassifierConfig, OutputConfig, PipelineConfig};
pub use processors::{Catalog, Individual, Trial};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
