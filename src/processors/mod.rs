//! Data processing modules.

pub mod catalog;
pub mod export;
pub mod filtering;
pub mod placement;
pub mod trajectory;

// Re-export key types for convenience
pub use catalog::{catalog_files, discover_files, Catalog, CatalogError, Individual, PhaseFiles, Trial};
pub use export::{export_all, export_individual, export_trial, ExportStats, TableError};
pub use filtering::{meets_trial_requirement, qualifying_trial_count};
pub use placement::{
    reconcile_test_2d, reconcile_test_vr, ColorOrder, PlacementError, PlacementRow, VrPlacement,
};
pub use trajectory::{parse_trajectory, InteractionCursor, RoomVisits, TrajectoryPoint};
