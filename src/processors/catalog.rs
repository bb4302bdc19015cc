//! Cataloging of input files into individuals and trials.
//!
//! Files are classified, grouped per subject by (log kind, phase), ordered
//! by their file name timestamp within each group, and then zipped by index:
//! trial `i` takes the `i`-th file of every group that has one.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use log::{debug, error, info};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::CatalogConfig;
use crate::core::filenames::{Classification, FilenameClassifier, LogKind, Phase};
use crate::core::timestamps::extract_timestamp;

use super::filtering;

/// Errors that stop cataloging.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("no input files found")]
    EmptyInputSet,
}

/// Per-subject file group key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FileGroup {
    Raw(Phase),
    Summary(Phase),
    Test2d,
}

/// Files of one phase of a trial.
///
/// One raw log holds both the movement and gaze streams, so `path_log` and
/// `look_log` refer to the same file when present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseFiles {
    pub path_log: Option<PathBuf>,
    pub look_log: Option<PathBuf>,
    pub summary: Option<PathBuf>,
}

impl PhaseFiles {
    fn is_complete(&self) -> bool {
        self.path_log.is_some() && self.look_log.is_some() && self.summary.is_some()
    }

    fn files(&self) -> impl Iterator<Item = &PathBuf> {
        [&self.path_log, &self.look_log, &self.summary]
            .into_iter()
            .flatten()
    }

    /// All present files decode to the same timestamp.
    fn dates_match(&self) -> bool {
        let mut stamps = self.files().map(|f| extract_timestamp(f).ok());
        match stamps.next() {
            Some(Some(first)) => stamps.all(|s| s == Some(first)),
            Some(None) => false,
            None => true,
        }
    }
}

/// Files making up one session of a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trial {
    /// Position in the subject's session sequence, from 0.
    pub num: usize,
    pub practice: PhaseFiles,
    pub study: PhaseFiles,
    /// The test summary doubles as the VR results file.
    pub test: PhaseFiles,
    pub test_2d: Option<PathBuf>,
    pub test_vr: Option<PathBuf>,
}

impl Trial {
    /// Phase files for `phase`.
    pub fn phase(&self, phase: Phase) -> &PhaseFiles {
        match phase {
            Phase::Practice => &self.practice,
            Phase::Study => &self.study,
            Phase::Test => &self.test,
        }
    }

    /// Study and test phases plus both result files are present.
    /// Practice is optional.
    pub fn is_complete(&self) -> bool {
        self.study.is_complete()
            && self.test.is_complete()
            && self.test_2d.is_some()
            && self.test_vr.is_some()
    }

    /// Within each phase, all files carry the same timestamp.
    pub fn dates_consistent(&self) -> bool {
        Phase::ALL.iter().all(|&p| self.phase(p).dates_match())
    }

    /// Distinct files referenced by this trial.
    pub fn files(&self) -> Vec<PathBuf> {
        let set: BTreeSet<&PathBuf> = Phase::ALL
            .iter()
            .flat_map(|&p| self.phase(p).files())
            .chain(self.test_2d.iter())
            .chain(self.test_vr.iter())
            .collect();
        set.into_iter().cloned().collect()
    }

    fn assign(&mut self, group: FileGroup, path: PathBuf) {
        match group {
            FileGroup::Raw(phase) => {
                let files = self.phase_mut(phase);
                files.path_log = Some(path.clone());
                files.look_log = Some(path);
            }
            FileGroup::Summary(Phase::Test) => {
                self.test.summary = Some(path.clone());
                self.test_vr = Some(path);
            }
            FileGroup::Summary(phase) => self.phase_mut(phase).summary = Some(path),
            FileGroup::Test2d => self.test_2d = Some(path),
        }
    }

    fn phase_mut(&mut self, phase: Phase) -> &mut PhaseFiles {
        match phase {
            Phase::Practice => &mut self.practice,
            Phase::Study => &mut self.study,
            Phase::Test => &mut self.test,
        }
    }
}

/// A subject and their retained trials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    pub subject_id: String,
    pub trials: Vec<Trial>,
}

impl Individual {
    /// Distinct files referenced by any trial.
    pub fn files(&self) -> Vec<PathBuf> {
        let set: BTreeSet<PathBuf> = self.trials.iter().flat_map(|t| t.files()).collect();
        set.into_iter().collect()
    }
}

/// Result of cataloging a set of input files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    /// Individuals meeting the trial minimum, ordered by subject id.
    pub individuals: Vec<Individual>,
    /// Recognised files left out by the inclusion criteria, sorted.
    pub excluded: Vec<PathBuf>,
    /// Files matching no known file name format, sorted.
    pub non_matching: Vec<PathBuf>,
}

/// Index-aligned view over the ordered file groups of one subject.
///
/// Yields `(index, {group: path})` for every index below the size of the
/// largest group; groups shorter than the index are simply absent.
struct AlignedGroups<'a> {
    groups: &'a BTreeMap<FileGroup, Vec<PathBuf>>,
    count: usize,
    current: usize,
}

impl<'a> AlignedGroups<'a> {
    fn new(groups: &'a BTreeMap<FileGroup, Vec<PathBuf>>) -> Self {
        let count = groups.values().map(Vec::len).max().unwrap_or(0);
        Self {
            groups,
            count,
            current: 0,
        }
    }
}

impl Iterator for AlignedGroups<'_> {
    type Item = (usize, Vec<(FileGroup, PathBuf)>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.count {
            return None;
        }

        let idx = self.current;
        self.current += 1;

        let aligned = self
            .groups
            .iter()
            .filter_map(|(&group, files)| files.get(idx).map(|path| (group, path.clone())))
            .collect();

        Some((idx, aligned))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_sub(self.current);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AlignedGroups<'_> {}

/// Recursively list every file below `root`, sorted by path.
pub fn discover_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Classify, group, order and zip `files` into a catalog of individuals.
///
/// `files` is taken in discovery order; ties between equal timestamps keep
/// that order.
pub fn catalog_files(
    files: &[PathBuf],
    classifier: &FilenameClassifier,
    config: &CatalogConfig,
) -> Result<Catalog, CatalogError> {
    if files.is_empty() {
        return Err(CatalogError::EmptyInputSet);
    }

    let mut excluded: BTreeSet<PathBuf> = BTreeSet::new();
    let mut non_matching: BTreeSet<PathBuf> = BTreeSet::new();
    let mut subjects: BTreeMap<String, BTreeMap<FileGroup, Vec<(NaiveDateTime, PathBuf)>>> =
        BTreeMap::new();

    for path in files {
        let (subject_id, group) = match classifier.classify(path) {
            Classification::Log {
                kind,
                subject_id,
                phase: Some(phase),
            } => {
                let group = match kind {
                    LogKind::Raw => FileGroup::Raw(phase),
                    LogKind::Summary => FileGroup::Summary(phase),
                };
                (subject_id, group)
            }
            Classification::Log { phase: None, .. } => {
                excluded.insert(path.clone());
                continue;
            }
            Classification::Test2d { subject_id } => (subject_id, FileGroup::Test2d),
            Classification::Unrecognized => {
                non_matching.insert(path.clone());
                continue;
            }
        };

        match extract_timestamp(path) {
            Ok(stamp) => subjects
                .entry(subject_id)
                .or_default()
                .entry(group)
                .or_default()
                .push((stamp, path.clone())),
            Err(e) => {
                debug!("{}; treating as non-matching", e);
                non_matching.insert(path.clone());
            }
        }
    }

    let mut individuals = Vec::with_capacity(subjects.len());

    for (subject_id, stamped_groups) in subjects {
        let groups: BTreeMap<FileGroup, Vec<PathBuf>> = stamped_groups
            .into_iter()
            .map(|(group, mut files)| {
                files.sort_by_key(|(stamp, _)| *stamp);
                (group, files.into_iter().map(|(_, path)| path).collect())
            })
            .collect();

        let mut individual = Individual {
            subject_id,
            trials: Vec::new(),
        };

        for (num, aligned) in AlignedGroups::new(&groups) {
            let mut trial = Trial {
                num,
                ..Trial::default()
            };
            for (group, path) in aligned {
                trial.assign(group, path);
            }

            if config.exclude_incomplete_trials && !trial.is_complete() {
                excluded.extend(trial.files());
                continue;
            }

            if !trial.dates_consistent() {
                error!(
                    "In cataloging trials a trial was found to have non-matching dates \
                     (Subject ID: {}; Trial #: {}).",
                    individual.subject_id, trial.num
                );
                continue;
            }

            individual.trials.push(trial);
        }

        if filtering::meets_trial_requirement(
            &individual,
            config.min_num_trials,
            config.exclude_incomplete_trials,
        ) {
            individuals.push(individual);
        } else {
            debug!(
                "Subject {} has too few qualifying trials ({} < {})",
                individual.subject_id,
                filtering::qualifying_trial_count(&individual, config.exclude_incomplete_trials),
                config.min_num_trials
            );
        }
    }

    info!(
        "Cataloged {} individuals meeting the trial minimum ({}); {} non-matching, {} excluded",
        individuals.len(),
        config.min_num_trials,
        non_matching.len(),
        excluded.len()
    );

    Ok(Catalog {
        individuals,
        excluded: excluded.into_iter().collect(),
        non_matching: non_matching.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Paths of a complete trial for `subject` recorded on `day` of January 2016.
    fn trial_paths(root: &str, subject: &str, day: u32) -> Vec<PathBuf> {
        let stamp = |h: u32| format!("{:02}_00_00_{:02}-01-2016", h, day);
        vec![
            PathBuf::from(format!("{root}/RawLog/RawLog_Sub{subject}_Study_{}.txt", stamp(10))),
            PathBuf::from(format!("{root}/RawLog/RawLog_Sub{subject}_Test_{}.txt", stamp(11))),
            PathBuf::from(format!(
                "{root}/SummaryLog/SummaryLog_Sub{subject}_Study_{}.txt",
                stamp(10)
            )),
            PathBuf::from(format!(
                "{root}/SummaryLog/SummaryLog_Sub{subject}_Test_{}.txt",
                stamp(11)
            )),
            PathBuf::from(format!(
                "{root}/GMDA/GMDA_{subject}_2016-01-{:02}_11-30-00-AM_Raw.csv",
                day
            )),
        ]
    }

    fn config(min_num_trials: usize, exclude_incomplete_trials: bool) -> CatalogConfig {
        CatalogConfig {
            min_num_trials,
            exclude_incomplete_trials,
        }
    }

    fn classifier() -> FilenameClassifier {
        FilenameClassifier::default()
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let result = catalog_files(&[], &classifier(), &CatalogConfig::default());
        assert!(matches!(result, Err(CatalogError::EmptyInputSet)));
    }

    #[test]
    fn test_single_complete_trial() {
        let files = trial_paths("/data", "001", 20);
        let catalog = catalog_files(&files, &classifier(), &config(1, true)).unwrap();

        assert_eq!(catalog.individuals.len(), 1);
        let individual = &catalog.individuals[0];
        assert_eq!(individual.subject_id, "001");
        assert_eq!(individual.trials.len(), 1);

        let trial = &individual.trials[0];
        assert_eq!(trial.num, 0);
        assert!(trial.is_complete());
        assert_eq!(trial.study.path_log, trial.study.look_log);
        assert_eq!(trial.test.summary, trial.test_vr);
        assert!(trial.practice.summary.is_none());
        assert_eq!(trial.files().len(), 5);
        assert!(catalog.excluded.is_empty());
        assert!(catalog.non_matching.is_empty());
    }

    #[test]
    fn test_trials_are_ordered_by_timestamp_within_groups() {
        // Discovery order is reversed relative to recording order.
        let mut files = trial_paths("/data", "001", 21);
        files.extend(trial_paths("/data", "001", 20));

        let catalog = catalog_files(&files, &classifier(), &config(1, true)).unwrap();
        let trials = &catalog.individuals[0].trials;

        assert_eq!(trials.len(), 2);
        let first = trials[0].study.path_log.as_ref().unwrap();
        assert!(first.to_string_lossy().contains("20-01-2016"));
        assert_eq!(trials[1].num, 1);
    }

    #[test]
    fn test_incomplete_trial_excluded_with_files() {
        let mut files = trial_paths("/data", "001", 20);
        files.pop(); // drop the 2D results

        let catalog = catalog_files(&files, &classifier(), &config(1, true)).unwrap();

        assert!(catalog.individuals.is_empty());
        assert_eq!(catalog.excluded.len(), 4);
    }

    #[test]
    fn test_incomplete_trial_kept_without_policy() {
        let mut files = trial_paths("/data", "001", 20);
        files.pop();

        let catalog = catalog_files(&files, &classifier(), &config(1, false)).unwrap();

        assert_eq!(catalog.individuals.len(), 1);
        assert!(!catalog.individuals[0].trials[0].is_complete());
        assert!(catalog.excluded.is_empty());
    }

    #[test]
    fn test_date_inconsistent_trial_dropped_without_excluding_files() {
        let mut files = trial_paths("/data", "001", 20);
        // Study summary recorded one minute after the study raw log.
        files[2] = PathBuf::from("/data/SummaryLog/SummaryLog_Sub001_Study_10_01_00_20-01-2016.txt");

        let catalog = catalog_files(&files, &classifier(), &config(0, true)).unwrap();

        assert_eq!(catalog.individuals.len(), 1);
        assert!(catalog.individuals[0].trials.is_empty());
        assert!(catalog.excluded.is_empty());
    }

    #[test]
    fn test_non_matching_and_uncategorised_files() {
        let mut files = trial_paths("/data", "001", 20);
        files.push(PathBuf::from("/data/notes.txt"));
        files.push(PathBuf::from("/data/RawLog/RawLog_Sub001_Warmup_09_00_00_20-01-2016.txt"));
        files.push(PathBuf::from("/data/RawLog/RawLog_Sub001_Study_undated.txt"));

        let catalog = catalog_files(&files, &classifier(), &config(1, true)).unwrap();

        assert_eq!(catalog.individuals.len(), 1);
        assert_eq!(
            catalog.non_matching,
            vec![
                PathBuf::from("/data/RawLog/RawLog_Sub001_Study_undated.txt"),
                PathBuf::from("/data/notes.txt"),
            ]
        );
        assert_eq!(
            catalog.excluded,
            vec![PathBuf::from(
                "/data/RawLog/RawLog_Sub001_Warmup_09_00_00_20-01-2016.txt"
            )]
        );
    }

    #[test]
    fn test_trial_count_follows_largest_group() {
        let mut files = trial_paths("/data", "002", 20);
        files.push(PathBuf::from(
            "/data/RawLog/RawLog_Sub002_Practice_09_00_00_20-01-2016.txt",
        ));
        files.push(PathBuf::from(
            "/data/RawLog/RawLog_Sub002_Practice_09_00_00_22-01-2016.txt",
        ));

        let catalog = catalog_files(&files, &classifier(), &config(0, false)).unwrap();
        let trials = &catalog.individuals[0].trials;

        assert_eq!(trials.len(), 2);
        assert!(trials[0].is_complete());
        assert!(trials[1].study.path_log.is_none());
        assert!(trials[1].practice.path_log.is_some());
    }

    #[test]
    fn test_individuals_sorted_and_filtered() {
        let mut files = Vec::new();
        for day in [20, 21] {
            files.extend(trial_paths("/data", "009", day));
        }
        files.extend(trial_paths("/data", "003", 20));
        for day in [20, 21] {
            files.extend(trial_paths("/data", "001", day));
        }

        let catalog = catalog_files(&files, &classifier(), &config(2, true)).unwrap();
        let ids: Vec<&str> = catalog
            .individuals
            .iter()
            .map(|i| i.subject_id.as_str())
            .collect();

        assert_eq!(ids, vec!["001", "009"]);
    }

    #[test]
    fn test_cataloging_is_deterministic() {
        let mut files = Vec::new();
        for subject in ["004", "002", "007"] {
            files.extend(trial_paths("/data", subject, 20));
        }

        let first = catalog_files(&files, &classifier(), &config(1, true)).unwrap();
        let second = catalog_files(&files, &classifier(), &config(1, true)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_discover_files_recursive_sorted() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("b/c")).unwrap();
        std::fs::write(dir.path().join("b/c/z.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();

        let files = discover_files(dir.path());
        assert_eq!(files, vec![dir.path().join("a.txt"), dir.path().join("b/c/z.txt")]);
    }

    #[test]
    fn test_aligned_groups() {
        let mut groups = BTreeMap::new();
        groups.insert(FileGroup::Test2d, vec![PathBuf::from("a")]);
        groups.insert(
            FileGroup::Raw(Phase::Study),
            vec![PathBuf::from("b"), PathBuf::from("c")],
        );

        let aligned: Vec<_> = AlignedGroups::new(&groups).collect();
        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].1.len(), 2);
        assert_eq!(aligned[1], (1, vec![(FileGroup::Raw(Phase::Study), PathBuf::from("c"))]));
    }
}
