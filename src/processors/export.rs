//! Per-trial dispatch of input files into the output tables.
//!
//! Individuals are processed in catalog order, trials in assembled order,
//! and tables in [`OutputTable::ALL`] order; rows are appended in that same
//! order. A table that fails to parse for one trial is logged and skipped,
//! and processing continues with the next table. Write failures abort.

use std::collections::BTreeMap;
use std::path::Path;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::OutputConfig;
use crate::core::filenames::Phase;
use crate::core::loaders::{self, LoaderError, SampleSource, SummaryLog};
use crate::core::writers::{self, CsvRowWriter, OutputTable, Record, RowWriter};

use super::catalog::{Individual, Trial};
use super::placement::{self, PlacementError};
use super::trajectory;

/// Recoverable failure while producing one table for one trial.
#[derive(Debug, Error)]
pub enum TableError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// Row and skip counts of an export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub trials: usize,
    pub rows: BTreeMap<OutputTable, usize>,
    /// Table/trial combinations skipped after a parse failure.
    pub skipped: usize,
}

impl ExportStats {
    pub fn total_rows(&self) -> usize {
        self.rows.values().sum()
    }

    /// Add the counts of `other` to these.
    pub fn merge(&mut self, other: ExportStats) {
        self.trials += other.trials;
        self.skipped += other.skipped;
        for (table, count) in other.rows {
            *self.rows.entry(table).or_default() += count;
        }
    }
}

/// Create one CSV writer per selected table in `directory` and write the headers.
pub fn open_csv_writers(
    directory: &Path,
    outputs: &OutputConfig,
) -> writers::Result<BTreeMap<OutputTable, CsvRowWriter>> {
    let mut out = BTreeMap::new();
    for table in OutputTable::selected(outputs) {
        let mut writer = CsvRowWriter::create(&directory.join(table.file_name()))?;
        writer.write_header(table.columns())?;
        out.insert(table, writer);
    }
    Ok(out)
}

/// Write the headers of every table in `writers`.
pub fn write_headers<W: RowWriter>(writers: &mut BTreeMap<OutputTable, W>) -> writers::Result<()> {
    for (table, writer) in writers.iter_mut() {
        writer.write_header(table.columns())?;
    }
    Ok(())
}

/// Close every writer, reporting the first failure.
pub fn close_writers<W: RowWriter>(writers: &mut BTreeMap<OutputTable, W>) -> writers::Result<()> {
    let mut first_error = None;
    for writer in writers.values_mut() {
        if let Err(e) = writer.close() {
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Export every trial of every individual into the tables present in `writers`.
pub fn export_all<W: RowWriter>(
    individuals: &[Individual],
    writers: &mut BTreeMap<OutputTable, W>,
) -> writers::Result<ExportStats> {
    let mut stats = ExportStats::default();
    for (count, individual) in individuals.iter().enumerate() {
        info!(
            "Parsing Individual {} ({}/{}).",
            individual.subject_id,
            count + 1,
            individuals.len()
        );
        stats.merge(export_individual(individual, writers)?);
    }
    Ok(stats)
}

/// Export all trials of one individual.
pub fn export_individual<W: RowWriter>(
    individual: &Individual,
    writers: &mut BTreeMap<OutputTable, W>,
) -> writers::Result<ExportStats> {
    let mut stats = ExportStats::default();
    for (count, trial) in individual.trials.iter().enumerate() {
        info!(
            "Parsing Trial {} ({}/{}).",
            trial.num,
            count + 1,
            individual.trials.len()
        );
        stats.merge(export_trial(&individual.subject_id, trial, writers)?);
    }
    Ok(stats)
}

/// Export one trial into the tables present in `writers`.
pub fn export_trial<W: RowWriter>(
    subject_id: &str,
    trial: &Trial,
    writers: &mut BTreeMap<OutputTable, W>,
) -> writers::Result<ExportStats> {
    let mut stats = ExportStats {
        trials: 1,
        ..ExportStats::default()
    };

    let summaries = trial_summaries(trial, writers.keys().copied());

    for (&table, writer) in writers.iter_mut() {
        let Some(source) = table_source(table, trial) else {
            continue;
        };

        let outcome = match summaries.get(&summary_phase(table)) {
            Some(Ok(summary)) => {
                table_rows(table, source, trial, subject_id, summary).map_err(|e| e.to_string())
            }
            Some(Err(e)) => Err(e.to_string()),
            None => Ok(Vec::new()),
        };

        match outcome {
            Ok(rows) => {
                writer.write_rows(&rows)?;
                *stats.rows.entry(table).or_default() += rows.len();
            }
            Err(reason) => {
                warn!(
                    "Subject {}, Trial {}, ({}) did not parse successfully ({}). Skipping...",
                    subject_id,
                    trial.num,
                    source.display(),
                    reason
                );
                stats.skipped += 1;
            }
        }
    }

    Ok(stats)
}

/// Load, once each, the summaries paired with those of `tables` that have
/// an input file in `trial`.
fn trial_summaries(
    trial: &Trial,
    tables: impl Iterator<Item = OutputTable>,
) -> BTreeMap<Phase, Result<SummaryLog, LoaderError>> {
    let mut summaries = BTreeMap::new();
    for table in tables.filter(|&t| table_source(t, trial).is_some()) {
        let phase = summary_phase(table);
        summaries
            .entry(phase)
            .or_insert_with(|| paired_summary(phase, trial));
    }
    summaries
}

fn table_phase(table: OutputTable) -> Option<(Phase, SampleSource)> {
    match table {
        OutputTable::StudyPath => Some((Phase::Study, SampleSource::Movement)),
        OutputTable::StudyLook => Some((Phase::Study, SampleSource::Gaze)),
        OutputTable::TestPath => Some((Phase::Test, SampleSource::Movement)),
        OutputTable::TestLook => Some((Phase::Test, SampleSource::Gaze)),
        OutputTable::PracticePath => Some((Phase::Practice, SampleSource::Movement)),
        OutputTable::PracticeLook => Some((Phase::Practice, SampleSource::Gaze)),
        OutputTable::Test2d | OutputTable::TestVr => None,
    }
}

/// Primary input file of `table` for `trial`, if present.
fn table_source(table: OutputTable, trial: &Trial) -> Option<&Path> {
    let path = match table_phase(table) {
        Some((phase, SampleSource::Movement)) => trial.phase(phase).path_log.as_ref(),
        Some((phase, SampleSource::Gaze)) => trial.phase(phase).look_log.as_ref(),
        None if table == OutputTable::Test2d => trial.test_2d.as_ref(),
        None => trial.test_vr.as_ref(),
    };
    path.map(|p| p.as_path())
}

/// Phase whose summary `table` is computed against: the table's own phase
/// for trajectories, the study phase for both placement tables.
fn summary_phase(table: OutputTable) -> Phase {
    table_phase(table).map_or(Phase::Study, |(phase, _)| phase)
}

fn paired_summary(phase: Phase, trial: &Trial) -> Result<SummaryLog, LoaderError> {
    match &trial.phase(phase).summary {
        Some(path) => loaders::load_summary_log(path),
        None => {
            debug!("No {} summary log for trial {}; using an empty one", phase, trial.num);
            Ok(SummaryLog::empty())
        }
    }
}

fn table_rows(
    table: OutputTable,
    source: &Path,
    trial: &Trial,
    subject_id: &str,
    summary: &SummaryLog,
) -> Result<Vec<Record>, TableError> {
    let rows = match table_phase(table) {
        Some((_, kind)) => {
            let points = trajectory::load_trajectory(source, kind, summary)?;
            points
                .iter()
                .map(|p| match kind {
                    SampleSource::Movement => p.path_record(subject_id, trial.num),
                    SampleSource::Gaze => p.look_record(subject_id, trial.num),
                })
                .collect()
        }
        None => {
            let placements = if table == OutputTable::Test2d {
                placement::load_test_2d(source, summary)?
            } else {
                placement::load_test_vr(source, summary)?
            };
            placements
                .iter()
                .map(|p| p.record(subject_id, trial.num))
                .collect()
        }
    };

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use crate::config::CatalogConfig;
    use crate::core::filenames::FilenameClassifier;
    use crate::core::items::{ITEM_COUNT, STUDY_LABELS, TEST_LABELS, TEST_LOCATIONS};
    use crate::core::writers::MemoryWriter;
    use crate::processors::catalog::{catalog_files, discover_files};
    use crate::processors::placement::TEST_2D_SKIP_LINES;

    const STUDY_RAW: &str = "RawLog/RawLog_Sub001_Study_10_00_00_20-01-2016.txt";
    const TEST_RAW: &str = "RawLog/RawLog_Sub001_Test_11_00_00_20-01-2016.txt";
    const STUDY_SUMMARY: &str = "SummaryLog/SummaryLog_Sub001_Study_10_00_00_20-01-2016.txt";
    const TEST_SUMMARY: &str = "SummaryLog/SummaryLog_Sub001_Test_11_00_00_20-01-2016.txt";
    const TEST_2D: &str = "GMDA/GMDA_001_2016-01-20_11-30-00-AM_Raw.csv";

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    fn raw_log(movement_marker: &str) -> String {
        let mut lines = Vec::new();
        for (tick, (x, z)) in [(5.0, 5.0), (6.0, 5.0), (40.0, 5.0)].iter().enumerate() {
            lines.push(format!("-{:019}", 1_000_000 - tick as i64 * 10));
            lines.push(format!("{movement_marker}:{x},1.5,{z},1,0,0,0,0,0,0"));
            lines.push(format!("Main Camera:{x},1.8,{z},0.7071,0,0.7071,0,0,0,0"));
        }
        lines.join("\n")
    }

    fn study_summary() -> String {
        let mut lines = vec!["Study summary".to_string()];
        for (i, label) in STUDY_LABELS.iter().enumerate() {
            lines.push(format!("-{:019}", 1_000_000 - i as i64 * 5));
            lines.push(format!("ChangeTextureEvent_ObjectClicked, {label}"));
        }
        lines.join("\n")
    }

    fn test_summary() -> String {
        [
            "Test summary",
            "-0000000000000500000",
            "Object_Placed, PurseCube : (5.0, 0.5, 15.0)",
            "-0000000000000499990",
            "Object_PickedUp, PurseCube : (5.0, 0.5, 15.0)",
            "-0000000000000499980",
            "Object_Placed, PurseCube : (50.0, 0.5, 10.0)",
            "Object_Placed, CrabCube : (60.0, 0.5, 45.0)",
        ]
        .join("\n")
    }

    fn test_2d(item_lines: usize) -> String {
        let mut lines: Vec<String> = (0..TEST_2D_SKIP_LINES).map(|i| format!("# {i}")).collect();
        for (label, (x, y)) in TEST_LABELS.iter().zip(TEST_LOCATIONS.iter()).take(item_lines) {
            lines.push(format!("{label},0,0,{x},{y},0"));
        }
        lines.join("\n")
    }

    fn dataset(root: &Path, item_lines: usize) {
        write(root, STUDY_RAW, &raw_log("First Person Controller"));
        write(root, TEST_RAW, &raw_log("First Person Controller Test"));
        write(root, STUDY_SUMMARY, &study_summary());
        write(root, TEST_SUMMARY, &test_summary());
        write(root, TEST_2D, &test_2d(item_lines));
        write(root, "notes/readme.txt", "not a log");
    }

    fn memory_writers(outputs: &OutputConfig) -> BTreeMap<OutputTable, MemoryWriter> {
        let mut writers: BTreeMap<OutputTable, MemoryWriter> = OutputTable::selected(outputs)
            .into_iter()
            .map(|table| (table, MemoryWriter::new()))
            .collect();
        write_headers(&mut writers).unwrap();
        writers
    }

    fn run(root: &Path) -> (ExportStats, BTreeMap<OutputTable, MemoryWriter>) {
        let files = discover_files(root);
        let config = CatalogConfig {
            min_num_trials: 1,
            exclude_incomplete_trials: true,
        };
        let catalog = catalog_files(&files, &FilenameClassifier::default(), &config).unwrap();
        assert_eq!(catalog.non_matching.len(), 1);

        let mut writers = memory_writers(&OutputConfig::all());
        let stats = export_all(&catalog.individuals, &mut writers).unwrap();
        close_writers(&mut writers).unwrap();
        (stats, writers)
    }

    #[test]
    fn test_end_to_end_tables() {
        let dir = TempDir::new().unwrap();
        dataset(dir.path(), ITEM_COUNT);

        let (stats, writers) = run(dir.path());

        assert_eq!(stats.trials, 1);
        assert_eq!(stats.skipped, 0);
        assert_eq!(stats.rows.get(&OutputTable::StudyPath), Some(&3));
        assert_eq!(stats.rows.get(&OutputTable::TestLook), Some(&3));
        assert_eq!(stats.rows.get(&OutputTable::Test2d), Some(&ITEM_COUNT));
        assert_eq!(stats.rows.get(&OutputTable::TestVr), Some(&2));
        assert_eq!(stats.rows.get(&OutputTable::PracticePath), None);

        let study_path = &writers[&OutputTable::StudyPath];
        assert!(study_path.closed);
        assert_eq!(study_path.header[0], "subject_id");
        assert_eq!(
            study_path.rows[2],
            vec!["001", "0", "20", "40.0", "1.5", "5.0", "1", "yellow", "5", "34.0", "10"]
        );

        let test_path = &writers[&OutputTable::TestPath];
        let clicked: Vec<&str> = test_path.rows.iter().map(|r| r[8].as_str()).collect();
        assert_eq!(clicked, vec!["1", "0", "2"]);

        let practice = &writers[&OutputTable::PracticeLook];
        assert_eq!(practice.header.len(), 15);
        assert!(practice.rows.is_empty());

        let vr = &writers[&OutputTable::TestVr];
        assert_eq!(vr.rows[0][2], "PurseCube");
        assert_eq!(vr.rows[0][12], "1.0");
        assert_eq!(vr.rows[0][13], "20");
    }

    #[test]
    fn test_failed_table_is_skipped() {
        let dir = TempDir::new().unwrap();
        dataset(dir.path(), 10);

        let (stats, writers) = run(dir.path());

        assert_eq!(stats.skipped, 1);
        assert!(writers[&OutputTable::Test2d].rows.is_empty());
        assert_eq!(writers[&OutputTable::TestVr].rows.len(), 2);
        assert_eq!(writers[&OutputTable::StudyLook].rows.len(), 3);
    }

    #[test]
    fn test_export_is_deterministic() {
        let dir = TempDir::new().unwrap();
        dataset(dir.path(), ITEM_COUNT);

        let (first_stats, first) = run(dir.path());
        let (second_stats, second) = run(dir.path());

        assert_eq!(first_stats, second_stats);
        for table in OutputTable::ALL {
            assert_eq!(first[&table].rows, second[&table].rows, "{:?}", table);
        }
    }

    #[test]
    fn test_only_selected_tables_are_written() {
        let dir = TempDir::new().unwrap();
        dataset(dir.path(), ITEM_COUNT);
        let files = discover_files(dir.path());
        let catalog =
            catalog_files(&files, &FilenameClassifier::default(), &CatalogConfig {
                min_num_trials: 1,
                exclude_incomplete_trials: true,
            })
            .unwrap();

        let mut outputs = OutputConfig::none();
        outputs.test_vr = true;
        let mut writers = memory_writers(&outputs);
        let stats = export_all(&catalog.individuals, &mut writers).unwrap();

        assert_eq!(writers.len(), 1);
        assert_eq!(stats.total_rows(), 2);
    }

    #[test]
    fn test_summaries_loaded_once_per_phase() {
        let dir = TempDir::new().unwrap();
        dataset(dir.path(), ITEM_COUNT);
        let files = discover_files(dir.path());
        let config = CatalogConfig {
            min_num_trials: 1,
            exclude_incomplete_trials: true,
        };
        let catalog = catalog_files(&files, &FilenameClassifier::default(), &config).unwrap();
        let trial = &catalog.individuals[0].trials[0];

        let summaries = trial_summaries(trial, OutputTable::ALL.into_iter());

        let phases: Vec<Phase> = summaries.keys().copied().collect();
        assert_eq!(phases, vec![Phase::Study, Phase::Test]);
        assert!(summaries.values().all(|s| s.is_ok()));
    }

    #[test]
    fn test_unreadable_study_summary_skips_dependent_tables() {
        let dir = TempDir::new().unwrap();
        dataset(dir.path(), ITEM_COUNT);
        write(
            dir.path(),
            STUDY_SUMMARY,
            "Study summary\n-100\nChangeTextureEvent_ObjectClicked, MysteryCube\n",
        );

        let (stats, writers) = run(dir.path());

        assert_eq!(stats.skipped, 4);
        for table in [
            OutputTable::StudyPath,
            OutputTable::StudyLook,
            OutputTable::Test2d,
            OutputTable::TestVr,
        ] {
            assert!(writers[&table].rows.is_empty(), "{:?}", table);
        }
        assert_eq!(writers[&OutputTable::TestPath].rows.len(), 3);
        assert_eq!(writers[&OutputTable::TestLook].rows.len(), 3);
    }

    #[test]
    fn test_open_csv_writers() {
        let dir = TempDir::new().unwrap();
        let mut outputs = OutputConfig::none();
        outputs.study_path = true;
        outputs.test_2d = true;

        let mut writers = open_csv_writers(dir.path(), &outputs).unwrap();
        close_writers(&mut writers).unwrap();

        let header = fs::read_to_string(dir.path().join("2d_test.csv")).unwrap();
        assert!(header.starts_with("subject_id,trial_number,item_id,x_placed"));
        assert!(dir.path().join("study_path.csv").exists());
        assert!(!dir.path().join("vr_test.csv").exists());
    }
}
