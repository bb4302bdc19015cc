//! Point-in-rectangle region lookup for the four colored rooms.
//!
//! Two boundary tables are kept: the navigation environment (Unity world
//! units, x/z plane) and the 2D test image (pixels centred on the origin).
//! Both list the rooms in the same order and lookups are first-match-wins.

use std::fmt;

/// One of the four colored rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Red,
    Green,
    Blue,
    Yellow,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Red, Region::Green, Region::Blue, Region::Yellow];

    pub fn label(self) -> &'static str {
        match self {
            Region::Red => "red",
            Region::Green => "green",
            Region::Blue => "blue",
            Region::Yellow => "yellow",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label used in output tables for a point outside every room.
pub const NO_REGION: &str = "none";

/// Output label for an optional region.
pub fn region_label(region: Option<Region>) -> &'static str {
    region.map_or(NO_REGION, Region::label)
}

/// Axis-aligned rectangle given by its lower corner and extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Strict containment: points on an edge are outside.
    #[inline]
    pub fn contains(&self, px: f64, py: f64) -> bool {
        self.x < px && px < self.x + self.w && self.y < py && py < self.y + self.h
    }
}

/// Rooms of the navigation environment, indexed by (x, z).
pub static NAVIGATION_REGIONS: [(Region, Rect); 4] = [
    (Region::Red, Rect::new(-12.5, 37.5, 40.0, 40.0)),
    (Region::Green, Rect::new(27.5, 37.5, 40.0, 40.0)),
    (Region::Blue, Rect::new(-12.5, -2.5, 40.0, 40.0)),
    (Region::Yellow, Rect::new(27.5, -2.5, 40.0, 40.0)),
];

/// Quadrants of the 2D test image, indexed by (x, y).
pub static TEST_2D_REGIONS: [(Region, Rect); 4] = [
    (Region::Red, Rect::new(-375.0, 0.0, 375.0, 375.0)),
    (Region::Green, Rect::new(0.0, 0.0, 375.0, 375.0)),
    (Region::Blue, Rect::new(-375.0, -375.0, 375.0, 375.0)),
    (Region::Yellow, Rect::new(0.0, -375.0, 375.0, 375.0)),
];

/// Return the first region in `table` whose rectangle strictly contains the point.
pub fn classify_point(x: f64, y: f64, table: &[(Region, Rect)]) -> Option<Region> {
    table
        .iter()
        .find(|(_, rect)| rect.contains(x, y))
        .map(|(region, _)| *region)
}

/// Room of a navigation-space point given as (x, z).
pub fn navigation_region(x: f64, z: f64) -> Option<Region> {
    classify_point(x, z, &NAVIGATION_REGIONS)
}

/// Room of a 2D test image point.
pub fn test_2d_region(x: f64, y: f64) -> Option<Region> {
    classify_point(x, y, &TEST_2D_REGIONS)
}
