//! In-process implementation of [`SheetsApi`].
//!
//! [`InMemorySheets`] keeps spreadsheets, worksheets, cells and named ranges in
//! a mutex-protected map and mirrors the remote behaviour the provisioner
//! relies on:
//!
//! - worksheet lookup by exact title, failing with `WorksheetNotFound`
//! - batch updates applied in order and committed atomically
//! - `addNamedRange` rejected when the name is already taken
//! - writes outside the worksheet grid rejected
//!
//! Every call is recorded so tests can assert on the exact sequence, and
//! individual operations can be made to fail.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value as JsonValue;

use crate::{
    api::{SheetsApi, SpreadsheetFile, SpreadsheetHandle, WorksheetHandle},
    error::{ProvisionError, RemoteServiceError, Result},
    types::{CellValue, GridRange, NamedRangeEntry, Request},
};

const SERVICE: &str = "in-memory";
const DEFAULT_SHEET_TITLE: &str = "Sheet1";
const DEFAULT_SHEET_ROWS: u32 = 1000;
const DEFAULT_SHEET_COLUMNS: u32 = 26;

/// Kinds of [`SheetsApi`] calls, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListSpreadsheets,
    OpenSpreadsheet,
    CreateSpreadsheet,
    GetWorksheet,
    AddWorksheet,
    WriteCells,
    ListNamedRanges,
    BatchUpdate,
}

/// A recorded [`SheetsApi`] call with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListSpreadsheets {
        folder_id: Option<String>,
    },
    OpenSpreadsheet {
        id: String,
    },
    CreateSpreadsheet {
        name: String,
        folder_id: Option<String>,
    },
    GetWorksheet {
        spreadsheet_id: String,
        title: String,
    },
    AddWorksheet {
        spreadsheet_id: String,
        title: String,
        rows: u32,
        columns: u32,
    },
    WriteCells {
        spreadsheet_id: String,
        sheet_id: u32,
        anchor: String,
        grid: JsonValue,
    },
    ListNamedRanges {
        spreadsheet_id: String,
    },
    BatchUpdate {
        spreadsheet_id: String,
        requests: Vec<Request>,
    },
}

impl Call {
    pub fn operation(&self) -> Operation {
        match self {
            Self::ListSpreadsheets { .. } => Operation::ListSpreadsheets,
            Self::OpenSpreadsheet { .. } => Operation::OpenSpreadsheet,
            Self::CreateSpreadsheet { .. } => Operation::CreateSpreadsheet,
            Self::GetWorksheet { .. } => Operation::GetWorksheet,
            Self::AddWorksheet { .. } => Operation::AddWorksheet,
            Self::WriteCells { .. } => Operation::WriteCells,
            Self::ListNamedRanges { .. } => Operation::ListNamedRanges,
            Self::BatchUpdate { .. } => Operation::BatchUpdate,
        }
    }
}

#[derive(Debug, Clone)]
struct StoredSheet {
    sheet_id: u32,
    title: String,
    rows: u32,
    columns: u32,
    cells: BTreeMap<(u32, u32), JsonValue>,
}

#[derive(Debug, Clone)]
struct StoredSpreadsheet {
    id: String,
    name: String,
    folder_id: Option<String>,
    sheets: Vec<StoredSheet>,
    named_ranges: Vec<NamedRangeEntry>,
}

impl StoredSpreadsheet {
    fn handle(&self) -> SpreadsheetHandle {
        SpreadsheetHandle {
            id: self.id.clone(),
            title: self.name.clone(),
        }
    }

    fn apply(&mut self, request: &Request, next_id: &mut u64) -> Result<()> {
        match request {
            Request::DeleteNamedRange(delete) => {
                let index = self
                    .named_ranges
                    .iter()
                    .position(|r| r.named_range_id == delete.named_range_id)
                    .ok_or_else(|| {
                        rejected(format!(
                            "No named range with id {}",
                            delete.named_range_id
                        ))
                    })?;
                self.named_ranges.remove(index);
            }
            Request::AddNamedRange(add) => {
                let named = &add.named_range;
                if self.named_ranges.iter().any(|r| r.name == named.name) {
                    return Err(rejected(format!(
                        "Named range with name '{}' already exists",
                        named.name
                    )));
                }
                if !self.sheets.iter().any(|s| s.sheet_id == named.range.sheet_id) {
                    return Err(rejected(format!(
                        "No grid with id: {}",
                        named.range.sheet_id
                    )));
                }
                *next_id += 1;
                self.named_ranges.push(NamedRangeEntry {
                    named_range_id: format!("named-range-{next_id}"),
                    name: named.name.clone(),
                    range: named.range,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    spreadsheets: Vec<StoredSpreadsheet>,
    calls: Vec<Call>,
    failing: Vec<Operation>,
}

impl State {
    fn begin(&mut self, call: Call) -> Result<()> {
        let operation = call.operation();
        self.calls.push(call);
        if self.failing.contains(&operation) {
            return Err(RemoteServiceError::Api {
                service: SERVICE,
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: format!("injected failure for {operation:?}"),
            }
            .into());
        }
        Ok(())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn next_sheet_id(&mut self) -> u32 {
        u32::try_from(self.next_id()).unwrap_or(u32::MAX)
    }

    fn insert_spreadsheet(&mut self, name: &str, folder_id: Option<&str>) -> SpreadsheetHandle {
        let id = format!("spreadsheet-{}", self.next_id());
        let sheet_id = self.next_sheet_id();
        let spreadsheet = StoredSpreadsheet {
            id,
            name: name.to_string(),
            folder_id: folder_id.map(str::to_string),
            sheets: vec![StoredSheet {
                sheet_id,
                title: DEFAULT_SHEET_TITLE.to_string(),
                rows: DEFAULT_SHEET_ROWS,
                columns: DEFAULT_SHEET_COLUMNS,
                cells: BTreeMap::new(),
            }],
            named_ranges: Vec::new(),
        };
        let handle = spreadsheet.handle();
        self.spreadsheets.push(spreadsheet);
        handle
    }

    fn spreadsheet(&self, id: &str) -> Result<&StoredSpreadsheet> {
        self.spreadsheets
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found(format!("Requested entity was not found: {id}")))
    }

    fn spreadsheet_mut(&mut self, id: &str) -> Result<&mut StoredSpreadsheet> {
        self.spreadsheets
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| not_found(format!("Requested entity was not found: {id}")))
    }

    fn add_sheet(
        &mut self,
        spreadsheet_id: &str,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<WorksheetHandle> {
        let sheet_id = self.next_sheet_id();
        let spreadsheet = self.spreadsheet_mut(spreadsheet_id)?;
        if spreadsheet.sheets.iter().any(|s| s.title == title) {
            return Err(rejected(format!(
                "A sheet with the name \"{title}\" already exists"
            )));
        }
        spreadsheet.sheets.push(StoredSheet {
            sheet_id,
            title: title.to_string(),
            rows,
            columns,
            cells: BTreeMap::new(),
        });
        Ok(WorksheetHandle {
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_id,
            title: title.to_string(),
        })
    }
}

/// A [`SheetsApi`] backed by process memory.
#[derive(Debug, Default)]
pub struct InMemorySheets {
    state: Mutex<State>,
}

impl InMemorySheets {
    /// Creates an empty service with no spreadsheets.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent call of `operation` fail with a server error.
    pub fn fail_on(&self, operation: Operation) {
        self.state().failing.push(operation);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Calls of one kind, in order.
    pub fn calls_of(&self, operation: Operation) -> Vec<Call> {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Adds a spreadsheet without recording a call.
    pub fn seed_spreadsheet(&self, name: &str, folder_id: Option<&str>) -> SpreadsheetHandle {
        self.state().insert_spreadsheet(name, folder_id)
    }

    /// Adds a worksheet without recording a call.
    ///
    /// # Errors
    ///
    /// Returns an error if the spreadsheet does not exist or already has a
    /// worksheet with that title.
    pub fn seed_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<WorksheetHandle> {
        self.state().add_sheet(&spreadsheet.id, title, rows, columns)
    }

    /// Adds a named range without the duplicate-name check, returning its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the spreadsheet does not exist.
    pub fn seed_named_range(
        &self,
        spreadsheet: &SpreadsheetHandle,
        name: &str,
        range: GridRange,
    ) -> Result<String> {
        let mut state = self.state();
        let id = format!("named-range-{}", state.next_id());
        state
            .spreadsheet_mut(&spreadsheet.id)?
            .named_ranges
            .push(NamedRangeEntry {
                named_range_id: id.clone(),
                name: name.to_string(),
                range,
            });
        Ok(id)
    }

    /// Writes a single cell without recording a call.
    ///
    /// # Errors
    ///
    /// Returns an error if the worksheet does not exist.
    pub fn seed_cell(
        &self,
        worksheet: &WorksheetHandle,
        row: u32,
        column: u32,
        value: JsonValue,
    ) -> Result<()> {
        let mut state = self.state();
        let sheet = find_sheet_mut(&mut state, worksheet)?;
        sheet.cells.insert((row, column), value);
        Ok(())
    }

    /// Spreadsheets currently stored, in creation order.
    pub fn spreadsheets(&self) -> Vec<SpreadsheetFile> {
        self.state()
            .spreadsheets
            .iter()
            .map(|s| SpreadsheetFile {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect()
    }

    /// Worksheet titles of a spreadsheet, in tab order.
    pub fn worksheet_titles(&self, spreadsheet_id: &str) -> Vec<String> {
        self.state()
            .spreadsheet(spreadsheet_id)
            .map(|s| s.sheets.iter().map(|sheet| sheet.title.clone()).collect())
            .unwrap_or_default()
    }

    /// Named ranges of a spreadsheet, in definition order.
    pub fn named_ranges(&self, spreadsheet_id: &str) -> Vec<NamedRangeEntry> {
        self.state()
            .spreadsheet(spreadsheet_id)
            .map(|s| s.named_ranges.clone())
            .unwrap_or_default()
    }

    /// The value at zero-based `(row, column)`, or `None` for an empty cell.
    pub fn cell(&self, worksheet: &WorksheetHandle, row: u32, column: u32) -> Option<JsonValue> {
        let mut state = self.state();
        find_sheet_mut(&mut state, worksheet)
            .ok()
            .and_then(|sheet| sheet.cells.get(&(row, column)).cloned())
    }

    /// A `rows` × `columns` block from the top-left corner; empty cells are
    /// `null`.
    pub fn values(&self, worksheet: &WorksheetHandle, rows: u32, columns: u32) -> JsonValue {
        let grid: Vec<JsonValue> = (0..rows)
            .map(|row| {
                (0..columns)
                    .map(|column| self.cell(worksheet, row, column).unwrap_or(JsonValue::Null))
                    .collect()
            })
            .collect();
        JsonValue::Array(grid)
    }
}

#[async_trait]
impl SheetsApi for InMemorySheets {
    async fn list_spreadsheets(&self, folder_id: Option<&str>) -> Result<Vec<SpreadsheetFile>> {
        let mut state = self.state();
        state.begin(Call::ListSpreadsheets {
            folder_id: folder_id.map(str::to_string),
        })?;

        Ok(state
            .spreadsheets
            .iter()
            .filter(|s| folder_id.is_none_or(|folder| s.folder_id.as_deref() == Some(folder)))
            .map(|s| SpreadsheetFile {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect())
    }

    async fn open_spreadsheet(&self, file: &SpreadsheetFile) -> Result<SpreadsheetHandle> {
        let mut state = self.state();
        state.begin(Call::OpenSpreadsheet {
            id: file.id.clone(),
        })?;
        Ok(state.spreadsheet(&file.id)?.handle())
    }

    async fn create_spreadsheet(
        &self,
        name: &str,
        folder_id: Option<&str>,
    ) -> Result<SpreadsheetHandle> {
        let mut state = self.state();
        state.begin(Call::CreateSpreadsheet {
            name: name.to_string(),
            folder_id: folder_id.map(str::to_string),
        })?;
        Ok(state.insert_spreadsheet(name, folder_id))
    }

    async fn get_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        title: &str,
    ) -> Result<WorksheetHandle> {
        let mut state = self.state();
        state.begin(Call::GetWorksheet {
            spreadsheet_id: spreadsheet.id.clone(),
            title: title.to_string(),
        })?;

        state
            .spreadsheet(&spreadsheet.id)?
            .sheets
            .iter()
            .find(|sheet| sheet.title == title)
            .map(|sheet| WorksheetHandle {
                spreadsheet_id: spreadsheet.id.clone(),
                sheet_id: sheet.sheet_id,
                title: sheet.title.clone(),
            })
            .ok_or_else(|| ProvisionError::WorksheetNotFound {
                title: title.to_string(),
            })
    }

    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<WorksheetHandle> {
        let mut state = self.state();
        state.begin(Call::AddWorksheet {
            spreadsheet_id: spreadsheet.id.clone(),
            title: title.to_string(),
            rows,
            columns,
        })?;
        state.add_sheet(&spreadsheet.id, title, rows, columns)
    }

    async fn write_cells(
        &self,
        worksheet: &WorksheetHandle,
        anchor: &str,
        grid: &[&[CellValue<'_>]],
    ) -> Result<()> {
        let mut state = self.state();
        state.begin(Call::WriteCells {
            spreadsheet_id: worksheet.spreadsheet_id.clone(),
            sheet_id: worksheet.sheet_id,
            anchor: anchor.to_string(),
            grid: grid_to_json(grid),
        })?;

        let (start_row, start_column) = parse_a1(anchor).ok_or_else(|| {
            rejected(format!("Unable to parse range: {}", worksheet.absolute_range(anchor)))
        })?;
        let sheet = find_sheet_mut(&mut state, worksheet)?;

        let mut updates = Vec::new();
        for (row_offset, row) in grid.iter().enumerate() {
            for (column_offset, value) in row.iter().enumerate() {
                let row = start_row.saturating_add(offset(row_offset));
                let column = start_column.saturating_add(offset(column_offset));
                if row >= sheet.rows || column >= sheet.columns {
                    return Err(rejected(format!(
                        "Range ('{}'!{anchor}) exceeds grid limits. Max rows: {}, max columns: {}",
                        sheet.title, sheet.rows, sheet.columns
                    )));
                }
                updates.push(((row, column), cell_to_json(*value)));
            }
        }
        sheet.cells.extend(updates);
        Ok(())
    }

    async fn list_named_ranges(
        &self,
        spreadsheet: &SpreadsheetHandle,
    ) -> Result<Vec<NamedRangeEntry>> {
        let mut state = self.state();
        state.begin(Call::ListNamedRanges {
            spreadsheet_id: spreadsheet.id.clone(),
        })?;
        Ok(state.spreadsheet(&spreadsheet.id)?.named_ranges.clone())
    }

    async fn batch_update(
        &self,
        spreadsheet: &SpreadsheetHandle,
        requests: &[Request],
    ) -> Result<()> {
        let mut state = self.state();
        state.begin(Call::BatchUpdate {
            spreadsheet_id: spreadsheet.id.clone(),
            requests: requests.to_vec(),
        })?;
        if requests.is_empty() {
            return Err(rejected("Must specify at least one request.".to_string()));
        }

        // Apply to a copy so a failing request leaves nothing behind.
        let mut next_id = state.next_id;
        let mut updated = state.spreadsheet(&spreadsheet.id)?.clone();
        for request in requests {
            updated.apply(request, &mut next_id)?;
        }

        state.next_id = next_id;
        *state.spreadsheet_mut(&spreadsheet.id)? = updated;
        Ok(())
    }
}

fn find_sheet_mut<'a>(
    state: &'a mut State,
    worksheet: &WorksheetHandle,
) -> Result<&'a mut StoredSheet> {
    state
        .spreadsheet_mut(&worksheet.spreadsheet_id)?
        .sheets
        .iter_mut()
        .find(|sheet| sheet.sheet_id == worksheet.sheet_id)
        .ok_or_else(|| not_found(format!("No grid with id: {}", worksheet.sheet_id)))
}

fn grid_to_json(grid: &[&[CellValue<'_>]]) -> JsonValue {
    JsonValue::Array(
        grid.iter()
            .map(|row| JsonValue::Array(row.iter().copied().map(cell_to_json).collect()))
            .collect(),
    )
}

fn cell_to_json(value: CellValue<'_>) -> JsonValue {
    match value {
        CellValue::Text(text) => JsonValue::String(text.to_string()),
        CellValue::Integer(n) => JsonValue::from(n),
    }
}

fn offset(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Parses a single-cell A1 reference into zero-based `(row, column)`.
fn parse_a1(cell: &str) -> Option<(u32, u32)> {
    let split = cell.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = cell.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let column = letters.chars().try_fold(0u32, |acc, c| {
        let value = u32::from(c.to_ascii_uppercase()) - u32::from('A') + 1;
        acc.checked_mul(26)?.checked_add(value)
    })?;
    let row: u32 = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, column - 1))
}

fn rejected(message: String) -> ProvisionError {
    RemoteServiceError::Api {
        service: SERVICE,
        status: StatusCode::BAD_REQUEST,
        body: message,
    }
    .into()
}

fn not_found(message: String) -> ProvisionError {
    RemoteServiceError::Api {
        service: SERVICE,
        status: StatusCode::NOT_FOUND,
        body: message,
    }
    .into()
}
