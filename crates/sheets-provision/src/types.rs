//! Type definitions for the Google Sheets and Google Drive APIs.

use serde::{Deserialize, Serialize};

/// A value written into a single cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CellValue<'a> {
    /// A string value.
    Text(&'a str),
    /// An integer value.
    Integer(i64),
}

/// A rectangular region of one sheet, using half-open zero-based indices.
///
/// The API omits zero-valued fields from responses, so every field defaults
/// to `0` when deserializing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridRange {
    #[serde(default)]
    pub sheet_id: u32,
    #[serde(default)]
    pub start_row_index: u32,
    #[serde(default)]
    pub end_row_index: u32,
    #[serde(default)]
    pub start_column_index: u32,
    #[serde(default)]
    pub end_column_index: u32,
}

/// A named range as listed by the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRangeEntry {
    pub named_range_id: String,
    pub name: String,
    #[serde(default)]
    pub range: GridRange,
}

/// One request in a `spreadsheets.batchUpdate` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Request {
    DeleteNamedRange(DeleteNamedRange),
    AddNamedRange(AddNamedRange),
}

impl Request {
    pub fn delete_named_range(named_range_id: impl Into<String>) -> Self {
        Self::DeleteNamedRange(DeleteNamedRange {
            named_range_id: named_range_id.into(),
        })
    }

    pub fn add_named_range(name: impl Into<String>, range: GridRange) -> Self {
        Self::AddNamedRange(AddNamedRange {
            named_range: NamedRange {
                name: name.into(),
                range,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNamedRange {
    pub named_range_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddNamedRange {
    pub named_range: NamedRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedRange {
    pub name: String,
    pub range: GridRange,
}

// API request/response types for internal use with the Google APIs

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchUpdateRequest<T> {
    pub requests: Vec<T>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddSheetRequest {
    pub add_sheet: AddSheet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddSheet {
    pub properties: NewSheetProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewSheetProperties {
    pub title: String,
    pub grid_properties: GridProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GridProperties {
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BatchUpdateResponse {
    #[serde(default)]
    pub replies: Vec<Reply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Reply {
    #[serde(default)]
    pub add_sheet: Option<AddSheetReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddSheetReply {
    pub properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SheetProperties {
    #[serde(default)]
    pub sheet_id: u32,
    pub title: String,
}

/// Partial `spreadsheets.get` response; only the requested `fields` are set.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpreadsheetMetadata {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default)]
    pub properties: Option<SpreadsheetProperties>,
    #[serde(default)]
    pub sheets: Vec<Sheet>,
    #[serde(default)]
    pub named_ranges: Vec<NamedRangeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpreadsheetProperties {
    pub title: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Sheet {
    pub properties: SheetProperties,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ValueRangeInput<'a> {
    pub range: &'a str,
    pub major_dimension: &'static str,
    pub values: &'a [&'a [CellValue<'a>]],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateFileRequest<'a> {
    pub name: &'a str,
    pub mime_type: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<&'a str>,
}

/// Google Drive file metadata, restricted to the fields this crate requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct DriveFile {
    pub id: String,
    pub name: String,
}

/// Response from the Drive `files.list` API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileListResponse {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}
