//! Fixed item tables shared by the summary parser and the reconcilers.
//!
//! The sixteen study items are known under two naming schemes: the label
//! printed by the 2D test program and the Unity object name. Both tables are
//! in the same order, so an index identifies one item in either scheme.

use super::regions::Region;

/// Number of items placed in every trial.
pub const ITEM_COUNT: usize = 16;

/// Item labels as written by the 2D test program, in expected row order.
pub static TEST_LABELS: [&str; ITEM_COUNT] = [
    "purse",
    "crown",
    "basketball",
    "boot",
    "emerald",
    "clover",
    "bandana",
    "guitar",
    "fire extinguisher",
    "hammer",
    "lemon",
    "ice cube",
    "bottle",
    "ketchup",
    "boxing gloves",
    "crab",
];

/// Correct placements in 2D test image pixels.
pub static TEST_LOCATIONS: [(f64, f64); ITEM_COUNT] = [
    (-210.0, -211.0),
    (-163.0, -304.0),
    (-163.0, -70.0),
    (211.0, -258.0),
    (-163.0, 164.0),
    (352.0, -211.0),
    (71.0, -211.0),
    (-117.0, 258.0),
    (71.0, 258.0),
    (258.0, 258.0),
    (-304.0, -117.0),
    (-304.0, 258.0),
    (-70.0, 70.0),
    (305.0, 211.0),
    (305.0, -70.0),
    (305.0, 70.0),
];

/// Unity object names for the same items.
pub static STUDY_LABELS: [&str; ITEM_COUNT] = [
    "PurseCube",
    "CrownCube",
    "BasketballCube",
    "BootCube",
    "EmeraldCube",
    "CloverCube",
    "BandanaCube",
    "GuitarCube",
    "FireExtCube",
    "HammerCube",
    "LemonCube",
    "IceCubeCube",
    "BottleCube",
    "KetchupCube",
    "BoxingGloveCube",
    "CrabCube",
];

/// Item positions in the navigation environment as (x, z).
pub static STUDY_LOCATIONS: [(f64, f64); ITEM_COUNT] = [
    (5.0, 15.0),
    (10.0, 5.0),
    (10.0, 30.0),
    (50.0, 10.0),
    (10.0, 55.0),
    (65.0, 15.0),
    (35.0, 15.0),
    (15.0, 65.0),
    (35.0, 65.0),
    (55.0, 65.0),
    (-5.0, 25.0),
    (-5.0, 65.0),
    (20.0, 45.0),
    (60.0, 60.0),
    (60.0, 30.0),
    (60.0, 45.0),
];

/// Item indices belonging to each room.
pub static REGION_ITEMS: [(Region, [usize; 4]); 4] = [
    (Region::Red, [4, 7, 11, 12]),
    (Region::Green, [8, 9, 13, 15]),
    (Region::Blue, [0, 1, 2, 10]),
    (Region::Yellow, [3, 5, 6, 14]),
];

/// Index of a 2D test label.
pub fn test_index(label: &str) -> Option<usize> {
    let label = label.trim();
    TEST_LABELS.iter().position(|&l| l == label)
}

/// Index of a Unity object name.
pub fn study_index(label: &str) -> Option<usize> {
    let label = label.trim();
    STUDY_LABELS.iter().position(|&l| l == label)
}

/// Expected navigation-space location of a Unity object.
pub fn study_location(label: &str) -> Option<(f64, f64)> {
    study_index(label).map(|i| STUDY_LOCATIONS[i])
}

/// Expected 2D image location of a test label.
pub fn test_location(label: &str) -> Option<(f64, f64)> {
    test_index(label).map(|i| TEST_LOCATIONS[i])
}

/// Room an item is supposed to be in.
pub fn expected_region(index: usize) -> Option<Region> {
    REGION_ITEMS
        .iter()
        .find(|(_, items)| items.contains(&index))
        .map(|(region, _)| *region)
}
