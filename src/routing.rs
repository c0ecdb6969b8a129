//! Result routing to destination grids
//!
//! Each region's ordinal index maps to one fixed seat position on the table
//! grid. Recognized names are handed to the seat's name field exactly as if
//! the user had typed them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::calibration::REGION_COUNT;
use crate::error::PipelineError;
use crate::vision::RecognitionResult;

/// Number of destination tables
pub const TABLE_COUNT: usize = 3;

/// Stable identifier of a destination grid (table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridId(pub usize);

impl GridId {
    /// Every destination table
    pub fn all() -> impl Iterator<Item = GridId> {
        (0..TABLE_COUNT).map(GridId)
    }
}

impl fmt::Display for GridId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {}", self.0 + 1)
    }
}

/// One-based cell position on a table grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: u8,
    pub col: u8,
}

impl GridPosition {
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}, col {}", self.row, self.col)
    }
}

/// Seat cells of a table grid (3x3 with the center and bottom-middle empty)
pub const SEAT_POSITIONS: [GridPosition; REGION_COUNT] = [
    GridPosition::new(1, 1),
    GridPosition::new(1, 2),
    GridPosition::new(1, 3),
    GridPosition::new(2, 1),
    GridPosition::new(2, 3),
    GridPosition::new(3, 1),
    GridPosition::new(3, 3),
];

/// Seat receiving each region, by ordinal index
///
/// Regions are drawn clockwise starting at the bottom-left seat.
pub const SEAT_ROUTE_TABLE: [GridPosition; REGION_COUNT] = [
    GridPosition::new(3, 1),
    GridPosition::new(2, 1),
    GridPosition::new(1, 1),
    GridPosition::new(1, 2),
    GridPosition::new(1, 3),
    GridPosition::new(2, 3),
    GridPosition::new(3, 3),
];

/// Check a route table covers every seat exactly once
pub fn validate_route_table(table: &[GridPosition]) -> Result<(), PipelineError> {
    if table.len() != REGION_COUNT {
        return Err(PipelineError::RouteTableInvalid(format!(
            "expected {} entries, got {}",
            REGION_COUNT,
            table.len()
        )));
    }

    let mut seen = HashSet::new();
    for (index, position) in table.iter().enumerate() {
        if !SEAT_POSITIONS.contains(position) {
            return Err(PipelineError::RouteTableInvalid(format!(
                "index {} maps to {}, which is not a seat",
                index, position
            )));
        }
        if !seen.insert(*position) {
            return Err(PipelineError::RouteTableInvalid(format!(
                "{} is mapped more than once",
                position
            )));
        }
    }

    Ok(())
}

/// Seat position for an ordinal index
pub fn seat_for_index(index: usize) -> Option<GridPosition> {
    SEAT_ROUTE_TABLE.get(index).copied()
}

/// A seat's name field in the external grid
pub trait NameCell {
    /// Set the name text, triggering the grid's usual lookup and assignment
    fn set_name_text(&mut self, text: &str);
}

/// External grid collaborator
pub trait DestinationGrid {
    /// Resolve the cell at a position, `None` if the grid has no such cell
    fn cell_at(&mut self, grid: GridId, position: GridPosition) -> Option<&mut dyn NameCell>;
}

/// Counts over one routing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RouteSummary {
    /// Results handed to a cell
    pub delivered: usize,
    /// Recognized results whose cell could not be resolved
    pub skipped: usize,
}

/// Hand recognized texts to their seats
///
/// Every result the engine was asked about is routed, including failed
/// calls (with empty text). Disabled regions and regions that never reached
/// the engine are not. A seat that cannot be resolved is skipped and routing
/// continues with the next result.
pub fn route(
    results: Vec<RecognitionResult>,
    grid_id: GridId,
    grid: &mut dyn DestinationGrid,
) -> RouteSummary {
    let mut summary = RouteSummary::default();

    for result in results {
        if !result.ocr_performed || (result.error && result.language_used.is_none()) {
            continue;
        }

        let Some(position) = seat_for_index(result.index) else {
            debug!("No seat mapped for region {}", result.index);
            summary.skipped += 1;
            continue;
        };

        match grid.cell_at(grid_id, position) {
            Some(cell) => {
                cell.set_name_text(&result.text);
                summary.delivered += 1;
            }
            None => {
                debug!("{} has no cell at {}, skipping region {}", grid_id, position, result.index);
                summary.skipped += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeCell {
        typed: Vec<String>,
    }

    impl NameCell for FakeCell {
        fn set_name_text(&mut self, text: &str) {
            self.typed.push(text.to_string());
        }
    }

    #[derive(Default)]
    struct FakeGrid {
        cells: HashMap<(GridId, GridPosition), FakeCell>,
    }

    impl FakeGrid {
        fn with_all_seats(grid: GridId) -> Self {
            let mut fake = Self::default();
            for position in SEAT_POSITIONS {
                fake.cells.insert((grid, position), FakeCell::default());
            }
            fake
        }

        fn typed(&self, grid: GridId, position: GridPosition) -> Vec<String> {
            self.cells
                .get(&(grid, position))
                .map(|cell| cell.typed.clone())
                .unwrap_or_default()
        }
    }

    impl DestinationGrid for FakeGrid {
        fn cell_at(&mut self, grid: GridId, position: GridPosition) -> Option<&mut dyn NameCell> {
            self.cells
                .get_mut(&(grid, position))
                .map(|cell| cell as &mut dyn NameCell)
        }
    }

    fn recognized(index: usize, text: &str) -> RecognitionResult {
        RecognitionResult {
            index,
            text: text.to_string(),
            ocr_performed: true,
            language_used: Some("eng".to_string()),
            error: false,
        }
    }

    #[test]
    fn test_route_table_is_valid() {
        assert!(validate_route_table(&SEAT_ROUTE_TABLE).is_ok());
    }

    #[test]
    fn test_route_table_rejects_duplicates_and_non_seats() {
        let mut duplicate = SEAT_ROUTE_TABLE;
        duplicate[1] = duplicate[0];
        assert!(validate_route_table(&duplicate).is_err());

        let mut center = SEAT_ROUTE_TABLE;
        center[0] = GridPosition::new(2, 2);
        assert!(validate_route_table(&center).is_err());

        assert!(validate_route_table(&SEAT_ROUTE_TABLE[..3]).is_err());
    }

    #[test]
    fn test_route_delivers_to_mapped_seat_regardless_of_order() {
        let mut grid = FakeGrid::with_all_seats(GridId(0));
        let results = vec![recognized(2, "Carol"), recognized(0, "Alice"), recognized(1, "Bob")];

        let summary = route(results, GridId(0), &mut grid);

        assert_eq!(summary.delivered, 3);
        assert_eq!(grid.typed(GridId(0), GridPosition::new(3, 1)), vec!["Alice"]);
        assert_eq!(grid.typed(GridId(0), GridPosition::new(2, 1)), vec!["Bob"]);
        assert_eq!(grid.typed(GridId(0), GridPosition::new(1, 1)), vec!["Carol"]);
    }

    #[test]
    fn test_route_skips_disabled_and_uncropped_results() {
        let mut grid = FakeGrid::with_all_seats(GridId(1));
        let mut disabled = recognized(0, "");
        disabled.ocr_performed = false;
        disabled.language_used = None;
        let mut uncropped = recognized(1, "");
        uncropped.error = true;
        uncropped.language_used = None;

        let summary = route(vec![disabled, uncropped, recognized(2, "Dan")], GridId(1), &mut grid);

        assert_eq!(summary, RouteSummary { delivered: 1, skipped: 0 });
        assert!(grid.typed(GridId(1), SEAT_ROUTE_TABLE[0]).is_empty());
        assert!(grid.typed(GridId(1), SEAT_ROUTE_TABLE[1]).is_empty());
        assert_eq!(grid.typed(GridId(1), SEAT_ROUTE_TABLE[2]), vec!["Dan"]);
    }

    #[test]
    fn test_route_delivers_failed_call_with_empty_text() {
        let mut grid = FakeGrid::with_all_seats(GridId(0));
        let mut failed = recognized(0, "");
        failed.error = true;

        let summary = route(vec![failed], GridId(0), &mut grid);

        assert_eq!(summary, RouteSummary { delivered: 1, skipped: 0 });
        assert_eq!(grid.typed(GridId(0), SEAT_ROUTE_TABLE[0]), vec![""]);
    }

    #[test]
    fn test_route_continues_past_missing_cell() {
        let mut grid = FakeGrid::with_all_seats(GridId(0));
        grid.cells.remove(&(GridId(0), SEAT_ROUTE_TABLE[3]));

        let results = (0..REGION_COUNT)
            .map(|i| recognized(i, &format!("p{}", i)))
            .collect();
        let summary = route(results, GridId(0), &mut grid);

        assert_eq!(summary, RouteSummary { delivered: REGION_COUNT - 1, skipped: 1 });
        assert_eq!(grid.typed(GridId(0), SEAT_ROUTE_TABLE[6]), vec!["p6"]);
    }

    #[test]
    fn test_route_only_touches_given_grid() {
        let mut grid = FakeGrid::with_all_seats(GridId(0));
        for position in SEAT_POSITIONS {
            grid.cells.insert((GridId(2), position), FakeCell::default());
        }

        route(vec![recognized(0, "Alice")], GridId(2), &mut grid);

        assert!(grid.typed(GridId(0), SEAT_ROUTE_TABLE[0]).is_empty());
        assert_eq!(grid.typed(GridId(2), SEAT_ROUTE_TABLE[0]), vec!["Alice"]);
    }

    #[test]
    fn test_grid_ids() {
        let ids: Vec<_> = GridId::all().collect();
        assert_eq!(ids, vec![GridId(0), GridId(1), GridId(2)]);
        assert_eq!(GridId(0).to_string(), "table 1");
    }
}
