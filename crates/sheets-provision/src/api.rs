//! The remote spreadsheet contract consumed by the provisioner.

use async_trait::async_trait;

use crate::{
    error::Result,
    types::{CellValue, NamedRangeEntry, Request},
};

/// A spreadsheet file as returned by a container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetFile {
    pub id: String,
    pub name: String,
}

/// An opened remote spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetHandle {
    pub id: String,
    pub title: String,
}

/// A worksheet (tab) inside a spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetHandle {
    pub spreadsheet_id: String,
    pub sheet_id: u32,
    pub title: String,
}

impl WorksheetHandle {
    /// Prefixes `cell` with this worksheet's quoted title (e.g. `'My Tab'!A1`).
    pub fn absolute_range(&self, cell: &str) -> String {
        format!("'{}'!{cell}", self.title.replace('\'', "''"))
    }
}

/// Operations the provisioner needs from a spreadsheet service.
///
/// Implementations perform one remote call per method and do not retry.
/// Every method fails with [`ProvisionError::Remote`](crate::ProvisionError::Remote)
/// when the service rejects the request or cannot be reached.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// Lists spreadsheet files, restricted to `folder_id` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing request fails.
    async fn list_spreadsheets(&self, folder_id: Option<&str>) -> Result<Vec<SpreadsheetFile>>;

    /// Opens a spreadsheet found by [`Self::list_spreadsheets`].
    ///
    /// # Errors
    ///
    /// Returns an error if the spreadsheet cannot be fetched.
    async fn open_spreadsheet(&self, file: &SpreadsheetFile) -> Result<SpreadsheetHandle>;

    /// Creates an empty spreadsheet called `name`, inside `folder_id` when
    /// given.
    ///
    /// # Errors
    ///
    /// Returns an error if the create request fails.
    async fn create_spreadsheet(
        &self,
        name: &str,
        folder_id: Option<&str>,
    ) -> Result<SpreadsheetHandle>;

    /// Fetches the worksheet titled `title`.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::WorksheetNotFound`](crate::ProvisionError::WorksheetNotFound)
    /// if no worksheet has that title, or a remote error if the lookup fails.
    async fn get_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        title: &str,
    ) -> Result<WorksheetHandle>;

    /// Adds a worksheet with the given grid size.
    ///
    /// # Errors
    ///
    /// Returns an error if the worksheet cannot be added.
    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        title: &str,
        rows: u32,
        columns: u32,
    ) -> Result<WorksheetHandle>;

    /// Overwrites cells starting at `anchor` with `grid`, row by row.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    async fn write_cells(
        &self,
        worksheet: &WorksheetHandle,
        anchor: &str,
        grid: &[&[CellValue<'_>]],
    ) -> Result<()>;

    /// Lists every named range defined on the spreadsheet.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing request fails.
    async fn list_named_ranges(&self, spreadsheet: &SpreadsheetHandle)
    -> Result<Vec<NamedRangeEntry>>;

    /// Applies `requests` as one atomic batch update.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch is rejected; no request of a rejected
    /// batch takes effect.
    async fn batch_update(&self, spreadsheet: &SpreadsheetHandle, requests: &[Request])
    -> Result<()>;
}
