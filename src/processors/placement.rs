//! Reconciliation of test placements against the study session.
//!
//! Both test variants report, per item, where it was placed, where it
//! belonged, and which room each of those is, with rooms also expressed as
//! the order in which they were first entered during study.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::items::{self, ITEM_COUNT, STUDY_LABELS, TEST_LABELS};
use crate::core::loaders::{self, LoaderError, SummaryLog};
use crate::core::regions::{navigation_region, region_label, test_2d_region, Region};
use crate::core::writers::{format_float, format_optional, Record};

/// Header lines preceding the item rows of a 2D results file.
pub const TEST_2D_SKIP_LINES: usize = 124;

/// Errors raised while reconciling test results.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error("{path}: expected {expected} item lines after the header, found {found}")]
    TooFewLines {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("{path}: malformed item line {line}: '{text}'")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        text: String,
    },

    #[error("{path}: unknown item label '{label}'")]
    UnknownLabel { path: PathBuf, label: String },

    #[error("{path}: location of '{label}' has {len} components, expected 2 or 3")]
    BadLocation {
        path: PathBuf,
        label: String,
        len: usize,
    },
}

/// Result type for reconciliation.
pub type Result<T> = std::result::Result<T, PlacementError>;

/// Room color to the order in which it was first entered during study.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorOrder {
    orders: BTreeMap<Region, usize>,
}

impl ColorOrder {
    /// Walk the study events once, numbering rooms as they are entered.
    ///
    /// The counter advances on every room change; a room keeps the number it
    /// was given the first time. Events whose item is unknown or lies
    /// outside every room are skipped.
    pub fn from_study_summary(summary: &SummaryLog) -> Self {
        let mut orders = BTreeMap::new();
        let mut previous: Option<Region> = None;
        let mut counter = 0;

        let rooms = summary
            .object_labels()
            .filter_map(items::study_location)
            .filter_map(|(x, z)| navigation_region(x, z));

        for room in rooms {
            match previous {
                None => {
                    orders.entry(room).or_insert(counter);
                }
                Some(p) if p != room => {
                    counter += 1;
                    orders.entry(room).or_insert(counter);
                }
                Some(_) => {}
            }
            previous = Some(room);
        }

        Self { orders }
    }

    pub fn get(&self, room: Option<Region>) -> Option<usize> {
        room.and_then(|r| self.orders.get(&r).copied())
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// Replacement statistics of one VR item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VrPlacement {
    pub replacements: f64,
    pub time_placed: i64,
}

/// One reconciled item.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementRow {
    pub item_id: String,
    pub placed: (f64, f64),
    pub expected: (f64, f64),
    pub order_clicked_study: Option<usize>,
    pub expected_room: Option<Region>,
    pub actual_room: Option<Region>,
    pub expected_order: Option<usize>,
    pub actual_order: Option<usize>,
    /// Present for VR rows only.
    pub vr: Option<VrPlacement>,
}

impl PlacementRow {
    /// Row for the 2D or VR test table. 2D coordinates are whole pixels.
    pub fn record(&self, subject_id: &str, trial_number: usize) -> Record {
        let coordinate = |v: f64| match self.vr {
            Some(_) => format_float(v),
            None => v.to_string(),
        };

        let mut row = vec![
            subject_id.to_string(),
            trial_number.to_string(),
            self.item_id.clone(),
            coordinate(self.placed.0),
            coordinate(self.placed.1),
            coordinate(self.expected.0),
            coordinate(self.expected.1),
            format_optional(self.order_clicked_study),
            format_optional(self.expected_order),
            region_label(self.expected_room).to_string(),
            format_optional(self.actual_order),
            region_label(self.actual_room).to_string(),
        ];

        if let Some(vr) = self.vr {
            row.push(format_float(vr.replacements));
            row.push(vr.time_placed.to_string());
        }

        row
    }
}

/// Parse the item lines of a 2D results file.
///
/// Rows follow the fixed test label order; the item's own label, placed
/// coordinates and room are taken from the corresponding line.
pub fn reconcile_test_2d(
    path: &Path,
    content: &str,
    study: &SummaryLog,
) -> Result<Vec<PlacementRow>> {
    let colors = ColorOrder::from_study_summary(study);
    let lines: Vec<&str> = content
        .lines()
        .skip(TEST_2D_SKIP_LINES)
        .take(ITEM_COUNT)
        .collect();

    if lines.len() < ITEM_COUNT {
        return Err(PlacementError::TooFewLines {
            path: path.to_path_buf(),
            expected: ITEM_COUNT,
            found: lines.len(),
        });
    }

    let mut rows = Vec::with_capacity(ITEM_COUNT);

    for (j, line) in lines.iter().enumerate() {
        let malformed = || PlacementError::MalformedLine {
            path: path.to_path_buf(),
            line: TEST_2D_SKIP_LINES + j + 1,
            text: line.to_string(),
        };

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() < 5 {
            return Err(malformed());
        }
        let x: i64 = fields[3].parse().map_err(|_| malformed())?;
        let y: i64 = fields[4].parse().map_err(|_| malformed())?;

        let label = fields[0];
        let index = items::test_index(label).ok_or_else(|| PlacementError::UnknownLabel {
            path: path.to_path_buf(),
            label: label.to_string(),
        })?;

        let expected_room = items::expected_region(index);
        let actual_room = test_2d_region(x as f64, y as f64);

        rows.push(PlacementRow {
            item_id: TEST_LABELS[j].to_string(),
            placed: (x as f64, y as f64),
            expected: items::TEST_LOCATIONS[index],
            order_clicked_study: study.first_occurrence(STUDY_LABELS[index]),
            expected_room,
            actual_room,
            expected_order: colors.get(expected_room),
            actual_order: colors.get(actual_room),
            vr: None,
        });
    }

    Ok(rows)
}

/// Reconcile the VR test summary `test` against the study summary.
///
/// One row per distinct item, in order of first appearance. Every later
/// event for the same item counts half a replacement, and the last one
/// gives the final placement.
pub fn reconcile_test_vr(
    path: &Path,
    test: &SummaryLog,
    study: &SummaryLog,
) -> Result<Vec<PlacementRow>> {
    let colors = ColorOrder::from_study_summary(study);
    let mut finalized: HashSet<&str> = HashSet::new();
    let mut rows = Vec::new();

    for (i, event) in test.events.iter().enumerate() {
        let label = event.object_label.as_str();
        if !finalized.insert(label) {
            continue;
        }

        let mut last = event;
        let mut replacements = 0.0;
        for later in test.events[i + 1..]
            .iter()
            .filter(|e| e.object_label == label)
        {
            last = later;
            replacements += 0.5;
        }

        let placed = match last.location.as_slice() {
            [x, y] => (*x, *y),
            [x, _, z] => (*x, *z),
            other => {
                return Err(PlacementError::BadLocation {
                    path: path.to_path_buf(),
                    label: label.to_string(),
                    len: other.len(),
                })
            }
        };

        let index = items::study_index(label).ok_or_else(|| PlacementError::UnknownLabel {
            path: path.to_path_buf(),
            label: label.to_string(),
        })?;

        let expected_room = items::expected_region(index);
        let actual_room = navigation_region(placed.0, placed.1);

        rows.push(PlacementRow {
            item_id: label.to_string(),
            placed,
            expected: items::STUDY_LOCATIONS[index],
            order_clicked_study: study.first_occurrence(label),
            expected_room,
            actual_room,
            expected_order: colors.get(expected_room),
            actual_order: colors.get(actual_room),
            vr: Some(VrPlacement {
                replacements,
                time_placed: last.relative_time,
            }),
        });
    }

    Ok(rows)
}

/// Load and reconcile a 2D results file.
pub fn load_test_2d(path: &Path, study: &SummaryLog) -> Result<Vec<PlacementRow>> {
    let content = loaders::read_log(path)?;
    reconcile_test_2d(path, &content, study)
}

/// Load and reconcile a VR results file.
pub fn load_test_vr(path: &Path, study: &SummaryLog) -> Result<Vec<PlacementRow>> {
    let test = loaders::load_summary_log(path)?;
    reconcile_test_vr(path, &test, study)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::{LogEvent, SummarySchema};

    fn event(event_type: &str, label: &str, time: i64, location: Vec<f64>) -> LogEvent {
        LogEvent {
            relative_time: time,
            event_type: event_type.to_string(),
            object_label: label.to_string(),
            location,
        }
    }

    fn study_of(labels: &[&str]) -> SummaryLog {
        SummaryLog {
            schema: SummarySchema::StudyPractice,
            events: labels
                .iter()
                .enumerate()
                .map(|(i, label)| {
                    let (x, z) = items::study_location(label).unwrap();
                    event("ChangeTextureEvent_ObjectClicked", label, i as i64, vec![x, z])
                })
                .collect(),
            source_path: None,
        }
    }

    fn test_of(events: Vec<LogEvent>) -> SummaryLog {
        SummaryLog {
            schema: SummarySchema::Test,
            events,
            source_path: None,
        }
    }

    /// Study visiting red, red, green, blue.
    fn red_green_blue_study() -> SummaryLog {
        study_of(&["EmeraldCube", "GuitarCube", "HammerCube", "PurseCube"])
    }

    fn test_2d_content(lines: &[String]) -> String {
        let mut content: Vec<String> = (0..TEST_2D_SKIP_LINES).map(|i| format!("header {i}")).collect();
        content.extend_from_slice(lines);
        content.join("\n")
    }

    fn item_lines() -> Vec<String> {
        TEST_LABELS
            .iter()
            .zip(items::TEST_LOCATIONS.iter())
            .map(|(label, (x, y))| format!("{label},a,b,{x},{y},c"))
            .collect()
    }

    #[test]
    fn test_color_order_first_seen() {
        let colors = ColorOrder::from_study_summary(&red_green_blue_study());

        assert_eq!(colors.get(Some(Region::Red)), Some(0));
        assert_eq!(colors.get(Some(Region::Green)), Some(1));
        assert_eq!(colors.get(Some(Region::Blue)), Some(2));
        assert_eq!(colors.get(Some(Region::Yellow)), None);
        assert_eq!(colors.get(None), None);
        assert_eq!(colors.len(), 3);
    }

    #[test]
    fn test_color_order_keeps_first_number_on_return() {
        // red, green, red, blue: blue gets 3 since the counter advances on
        // every change, and red keeps 0.
        let study = study_of(&["EmeraldCube", "HammerCube", "GuitarCube", "PurseCube"]);
        let colors = ColorOrder::from_study_summary(&study);

        assert_eq!(colors.get(Some(Region::Red)), Some(0));
        assert_eq!(colors.get(Some(Region::Green)), Some(1));
        assert_eq!(colors.get(Some(Region::Blue)), Some(3));
    }

    #[test]
    fn test_color_order_empty_study() {
        assert!(ColorOrder::from_study_summary(&SummaryLog::empty()).is_empty());
    }

    #[test]
    fn test_2d_reconcile_exact_placements() {
        let study = study_of(&STUDY_LABELS);
        let content = test_2d_content(&item_lines());

        let rows = reconcile_test_2d(Path::new("gmda.csv"), &content, &study).unwrap();

        assert_eq!(rows.len(), ITEM_COUNT);
        for (i, row) in rows.iter().enumerate() {
            assert_eq!(row.item_id, TEST_LABELS[i]);
            assert_eq!(row.placed, row.expected);
            assert_eq!(row.expected_room, row.actual_room);
            assert_eq!(row.expected_order, row.actual_order);
            assert_eq!(row.order_clicked_study, Some(i));
        }
    }

    #[test]
    fn test_2d_item_id_follows_fixed_order() {
        let mut lines = item_lines();
        lines.swap(0, 1);
        let content = test_2d_content(&lines);

        let rows =
            reconcile_test_2d(Path::new("gmda.csv"), &content, &red_green_blue_study()).unwrap();

        // Row 0 keeps the fixed label but reports the crown line.
        assert_eq!(rows[0].item_id, "purse");
        assert_eq!(rows[0].expected, items::TEST_LOCATIONS[1]);
        assert_eq!(rows[0].order_clicked_study, None);
        assert_eq!(rows[2].order_clicked_study, None);
        assert_eq!(rows[4].order_clicked_study, Some(0));
    }

    #[test]
    fn test_2d_record_layout() {
        let content = test_2d_content(&item_lines());
        let rows =
            reconcile_test_2d(Path::new("gmda.csv"), &content, &red_green_blue_study()).unwrap();

        // Emerald: red room, visited first during study.
        assert_eq!(
            rows[4].record("001", 3),
            vec!["001", "3", "emerald", "-163", "164", "-163", "164", "0", "0", "red", "0", "red"]
        );
        // Boot: yellow room, never visited.
        assert_eq!(
            rows[3].record("001", 3)[7..],
            ["", "", "yellow", "", "yellow"]
        );
    }

    #[test]
    fn test_2d_too_few_lines() {
        let content = test_2d_content(&item_lines()[..10]);
        let result = reconcile_test_2d(Path::new("gmda.csv"), &content, &SummaryLog::empty());

        assert!(matches!(
            result,
            Err(PlacementError::TooFewLines {
                expected: 16,
                found: 10,
                ..
            })
        ));
    }

    #[test]
    fn test_2d_unknown_label_and_bad_number() {
        let mut lines = item_lines();
        lines[5] = "anvil,a,b,1,2".to_string();
        let result = reconcile_test_2d(
            Path::new("gmda.csv"),
            &test_2d_content(&lines),
            &SummaryLog::empty(),
        );
        assert!(matches!(result, Err(PlacementError::UnknownLabel { .. })));

        let mut lines = item_lines();
        lines[5] = "clover,a,b,1.5,2".to_string();
        let result = reconcile_test_2d(
            Path::new("gmda.csv"),
            &test_2d_content(&lines),
            &SummaryLog::empty(),
        );
        assert!(matches!(
            result,
            Err(PlacementError::MalformedLine { line: 130, .. })
        ));
    }

    #[test]
    fn test_vr_replacements_and_final_placement() {
        let test = test_of(vec![
            event("Object_Placed", "PurseCube", 0, vec![1.0, 0.5, 2.0]),
            event("Object_Placed", "CrabCube", 4, vec![60.0, 0.5, 45.0]),
            event("Object_PickedUp", "PurseCube", 7, vec![1.0, 0.5, 2.0]),
            event("Object_Placed", "PurseCube", 9, vec![50.0, 0.5, 10.0]),
        ]);
        let study = study_of(&["PurseCube", "CrabCube"]);

        let rows = reconcile_test_vr(Path::new("vr.txt"), &test, &study).unwrap();

        assert_eq!(rows.len(), 2);
        let purse = &rows[0];
        assert_eq!(purse.item_id, "PurseCube");
        assert_eq!(
            purse.vr,
            Some(VrPlacement {
                replacements: 1.0,
                time_placed: 9
            })
        );
        assert_eq!(purse.placed, (50.0, 10.0));
        assert_eq!(purse.expected_room, Some(Region::Blue));
        assert_eq!(purse.actual_room, Some(Region::Yellow));
        assert_eq!(purse.expected_order, Some(0));
        assert_eq!(purse.actual_order, None);
        assert_eq!(purse.order_clicked_study, Some(0));

        let crab = &rows[1];
        assert_eq!(crab.vr.map(|v| v.replacements), Some(0.0));
        assert_eq!(crab.placed, (60.0, 45.0));
        assert_eq!(crab.actual_order, Some(1));
    }

    #[test]
    fn test_vr_two_component_location() {
        let test = test_of(vec![event("Object_Placed", "LemonCube", 3, vec![-5.0, 25.0])]);
        let rows = reconcile_test_vr(Path::new("vr.txt"), &test, &SummaryLog::empty()).unwrap();

        assert_eq!(rows[0].placed, (-5.0, 25.0));
        let record = rows[0].record("002", 1);
        assert_eq!(record.len(), 14);
        assert_eq!(&record[3..5], &["-5.0", "25.0"]);
        let (x, z) = rows[0].expected;
        assert_eq!(&record[5..7], &[format_float(x), format_float(z)]);
        assert!(record[5].contains('.') && record[6].contains('.'));
        assert_eq!(&record[12..], &["0.0", "3"]);
    }

    #[test]
    fn test_vr_bad_location() {
        let test = test_of(vec![event("Object_Placed", "LemonCube", 3, vec![1.0])]);
        let result = reconcile_test_vr(Path::new("vr.txt"), &test, &SummaryLog::empty());
        assert!(matches!(
            result,
            Err(PlacementError::BadLocation { len: 1, .. })
        ));
    }

    #[test]
    fn test_vr_unknown_label() {
        let test = test_of(vec![event("Object_Placed", "Anvil", 3, vec![1.0, 2.0, 3.0])]);
        let result = reconcile_test_vr(Path::new("vr.txt"), &test, &SummaryLog::empty());
        assert!(matches!(result, Err(PlacementError::UnknownLabel { .. })));
    }
}
