//! Fixed layout written by the provisioner: the worksheet, its static data
//! block and the named ranges defined over it.

use crate::types::{CellValue, GridRange};

/// Title of the worksheet that holds the static data.
pub const DEFAULT_WORKSHEET_NAME: &str = "StaticDataSheet";

/// Row count of a freshly created worksheet.
pub const DEFAULT_WORKSHEET_ROWS: u32 = 10;

/// Column count of a freshly created worksheet.
pub const DEFAULT_WORKSHEET_COLUMNS: u32 = 10;

/// Top-left cell of the static data block.
pub const DATA_ANCHOR: &str = "A1";

/// Header row followed by two data rows.
pub const STATIC_DATA: &[&[CellValue<'static>]] = &[
    &[CellValue::Text("Header1"), CellValue::Text("Header2")],
    &[CellValue::Integer(1), CellValue::Integer(2)],
    &[CellValue::Integer(3), CellValue::Integer(4)],
];

/// A named range over the static data, as half-open zero-based intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeDefinition {
    pub name: &'static str,
    pub start_row: u32,
    pub end_row: u32,
    pub start_column: u32,
    pub end_column: u32,
}

impl RangeDefinition {
    /// The region this definition covers on the sheet with `sheet_id`.
    pub fn grid_range(&self, sheet_id: u32) -> GridRange {
        GridRange {
            sheet_id,
            start_row_index: self.start_row,
            end_row_index: self.end_row,
            start_column_index: self.start_column,
            end_column_index: self.end_column,
        }
    }
}

/// `Range1` covers the first data row, `Range2` the second.
pub const RANGE_DEFINITIONS: [RangeDefinition; 2] = [
    RangeDefinition {
        name: "Range1",
        start_row: 1,
        end_row: 2,
        start_column: 0,
        end_column: 2,
    },
    RangeDefinition {
        name: "Range2",
        start_row: 2,
        end_row: 3,
        start_column: 0,
        end_column: 2,
    },
];

/// Returns `true` if `name` belongs to one of the [`RANGE_DEFINITIONS`].
pub fn is_managed_range(name: &str) -> bool {
    RANGE_DEFINITIONS.iter().any(|def| def.name == name)
}
