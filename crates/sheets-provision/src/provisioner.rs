//! Idempotent reconciliation of the spreadsheet, worksheet and named ranges.

use tracing::{info, instrument};

use crate::{
    api::{SheetsApi, SpreadsheetHandle, WorksheetHandle},
    error::{ProvisionError, Result},
    layout::{
        DATA_ANCHOR, DEFAULT_WORKSHEET_COLUMNS, DEFAULT_WORKSHEET_NAME, DEFAULT_WORKSHEET_ROWS,
        RANGE_DEFINITIONS, STATIC_DATA, is_managed_range,
    },
    types::Request,
};

/// Handles touched by a successful [`SheetProvisioner::provision`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub spreadsheet: SpreadsheetHandle,
    pub worksheet: WorksheetHandle,
}

/// Brings one spreadsheet into the fixed layout described in [`crate::layout`].
///
/// Every operation looks remote state up by name and converges it, so running
/// [`Self::provision`] repeatedly leaves the same end state. Remote calls are
/// issued one at a time and the first failure aborts the run; nothing created
/// before the failure is rolled back.
///
/// Lookups are by name rather than by a stored id. Two concurrent runs for the
/// same name can both miss and both create; callers must serialize them.
#[derive(Debug)]
pub struct SheetProvisioner<A> {
    api: A,
    folder_id: Option<String>,
}

impl<A: SheetsApi> SheetProvisioner<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            folder_id: None,
        }
    }

    /// Restricts spreadsheet lookup and creation to a Drive folder.
    #[must_use]
    pub fn with_folder(mut self, folder_id: impl Into<String>) -> Self {
        self.folder_id = Some(folder_id.into());
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn folder_id(&self) -> Option<&str> {
        self.folder_id.as_deref()
    }

    /// Opens the spreadsheet called `name`, creating it if the folder has
    /// none.
    ///
    /// Names match exactly and case-sensitively. If several spreadsheets share
    /// the name, the first one listed is used. Names that are empty or only
    /// whitespace are rejected before any remote call.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or whitespace-only name, or the
    /// remote error from the listing, open or create call.
    #[instrument(skip(self), fields(folder_id = self.folder_id.as_deref()))]
    pub async fn ensure_spreadsheet(&self, name: &str) -> Result<SpreadsheetHandle> {
        if name.trim().is_empty() {
            return Err(ProvisionError::InvalidInput(
                "spreadsheet name must not be empty".to_string(),
            ));
        }

        let folder_id = self.folder_id.as_deref();
        let existing = self.api.list_spreadsheets(folder_id).await?;

        if let Some(file) = existing.iter().find(|file| file.name == name) {
            info!(id = %file.id, "spreadsheet '{name}' found, opening existing spreadsheet");
            self.api.open_spreadsheet(file).await
        } else {
            info!("spreadsheet '{name}' not found, creating a new spreadsheet");
            self.api.create_spreadsheet(name, folder_id).await
        }
    }

    /// Finds or adds the worksheet `worksheet_name`, then writes the static
    /// data block at its anchor.
    ///
    /// An existing worksheet is reused as-is; only the cells of the block are
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns any lookup error other than `WorksheetNotFound`, or the error
    /// from adding the worksheet or writing the cells.
    #[instrument(skip(self, spreadsheet), fields(spreadsheet_id = %spreadsheet.id))]
    pub async fn ensure_worksheet_with_data(
        &self,
        spreadsheet: &SpreadsheetHandle,
        worksheet_name: &str,
    ) -> Result<WorksheetHandle> {
        let worksheet = match self.api.get_worksheet(spreadsheet, worksheet_name).await {
            Ok(worksheet) => {
                info!("worksheet '{worksheet_name}' found, updating existing worksheet");
                worksheet
            }
            Err(ProvisionError::WorksheetNotFound { .. }) => {
                let worksheet = self
                    .api
                    .add_worksheet(
                        spreadsheet,
                        worksheet_name,
                        DEFAULT_WORKSHEET_ROWS,
                        DEFAULT_WORKSHEET_COLUMNS,
                    )
                    .await?;
                info!(sheet_id = worksheet.sheet_id, "worksheet '{worksheet_name}' created");
                worksheet
            }
            Err(err) => return Err(err),
        };

        self.api
            .write_cells(&worksheet, DATA_ANCHOR, STATIC_DATA)
            .await?;
        info!("static data written to worksheet '{worksheet_name}'");
        Ok(worksheet)
    }

    /// Redefines the named ranges of [`RANGE_DEFINITIONS`] on `worksheet`.
    ///
    /// Existing ranges with a managed name are deleted in one batch, then all
    /// definitions are added in a second batch. The delete batch is skipped
    /// when nothing matches. The add batch is only sent once the delete batch
    /// has committed, so no add collides with a name that is still defined.
    ///
    /// # Errors
    ///
    /// Returns the error of the failing listing or batch. A failed delete
    /// batch leaves the old ranges in place and skips the add batch.
    #[instrument(
        skip(self, spreadsheet, worksheet),
        fields(spreadsheet_id = %spreadsheet.id, sheet_id = worksheet.sheet_id)
    )]
    pub async fn ensure_named_ranges(
        &self,
        spreadsheet: &SpreadsheetHandle,
        worksheet: &WorksheetHandle,
    ) -> Result<()> {
        let deleted = self.delete_managed_ranges(spreadsheet).await?;
        if deleted > 0 {
            info!("deleted {deleted} existing named ranges");
        }

        let additions: Vec<Request> = RANGE_DEFINITIONS
            .iter()
            .map(|def| Request::add_named_range(def.name, def.grid_range(worksheet.sheet_id)))
            .collect();
        self.api.batch_update(spreadsheet, &additions).await?;

        let names: Vec<&str> = RANGE_DEFINITIONS.iter().map(|def| def.name).collect();
        info!("named ranges created: {}", names.join(", "));
        Ok(())
    }

    /// Deletes every named range whose name is managed, returning how many
    /// were deleted.
    async fn delete_managed_ranges(&self, spreadsheet: &SpreadsheetHandle) -> Result<usize> {
        let existing = self.api.list_named_ranges(spreadsheet).await?;

        let deletions: Vec<Request> = existing
            .iter()
            .filter(|range| is_managed_range(&range.name))
            .map(|range| {
                info!(id = %range.named_range_id, "deleting existing named range: {}", range.name);
                Request::delete_named_range(range.named_range_id.clone())
            })
            .collect();

        if !deletions.is_empty() {
            self.api.batch_update(spreadsheet, &deletions).await?;
        }
        Ok(deletions.len())
    }

    /// Ensures the spreadsheet `name`, its `StaticDataSheet` worksheet with
    /// the static data, and the named ranges over it.
    ///
    /// # Errors
    ///
    /// Returns the first error from any step, unchanged.
    #[instrument(name = "provision", skip(self), fields(folder_id = self.folder_id.as_deref()))]
    pub async fn provision(&self, name: &str) -> Result<Provisioned> {
        let spreadsheet = self.ensure_spreadsheet(name).await?;
        let worksheet = self
            .ensure_worksheet_with_data(&spreadsheet, DEFAULT_WORKSHEET_NAME)
            .await?;
        self.ensure_named_ranges(&spreadsheet, &worksheet).await?;
        Ok(Provisioned {
            spreadsheet,
            worksheet,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        memory::{Call, InMemorySheets, Operation},
        types::GridRange,
    };

    fn grid() -> serde_json::Value {
        json!([["Header1", "Header2"], [1, 2], [3, 4]])
    }

    fn provisioner() -> SheetProvisioner<InMemorySheets> {
        SheetProvisioner::new(InMemorySheets::new()).with_folder("folder-1")
    }

    fn range(sheet_id: u32, start_row: u32) -> GridRange {
        GridRange {
            sheet_id,
            start_row_index: start_row,
            end_row_index: start_row + 1,
            start_column_index: 0,
            end_column_index: 2,
        }
    }

    fn managed_names(sheets: &InMemorySheets, spreadsheet_id: &str) -> Vec<String> {
        let mut names: Vec<String> = sheets
            .named_ranges(spreadsheet_id)
            .into_iter()
            .map(|r| r.name)
            .collect();
        names.sort();
        names
    }

    // ========================================================================
    // ensure_spreadsheet
    // ========================================================================

    #[tokio::test]
    async fn test_ensure_spreadsheet_creates_when_absent() {
        let p = provisioner();
        p.api().seed_spreadsheet("Foo", Some("other-folder"));

        let handle = p.ensure_spreadsheet("Foo").await.unwrap();

        assert_eq!(handle.title, "Foo");
        assert_eq!(
            p.api().calls(),
            vec![
                Call::ListSpreadsheets {
                    folder_id: Some("folder-1".to_string())
                },
                Call::CreateSpreadsheet {
                    name: "Foo".to_string(),
                    folder_id: Some("folder-1".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_ensure_spreadsheet_opens_when_present() {
        let p = provisioner();
        let existing = p.api().seed_spreadsheet("Foo", Some("folder-1"));

        let handle = p.ensure_spreadsheet("Foo").await.unwrap();

        assert_eq!(handle, existing);
        assert!(p.api().calls_of(Operation::CreateSpreadsheet).is_empty());
        assert_eq!(
            p.api().calls_of(Operation::OpenSpreadsheet),
            vec![Call::OpenSpreadsheet { id: existing.id }]
        );
    }

    #[tokio::test]
    async fn test_ensure_spreadsheet_name_match_is_case_sensitive() {
        let p = provisioner();
        p.api().seed_spreadsheet("foo", Some("folder-1"));
        p.api().seed_spreadsheet("Foo ", Some("folder-1"));

        p.ensure_spreadsheet("Foo").await.unwrap();

        assert!(p.api().calls_of(Operation::OpenSpreadsheet).is_empty());
        assert_eq!(p.api().calls_of(Operation::CreateSpreadsheet).len(), 1);
    }

    #[tokio::test]
    async fn test_ensure_spreadsheet_first_duplicate_wins() {
        let p = provisioner();
        let first = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        p.api().seed_spreadsheet("Foo", Some("folder-1"));

        let handle = p.ensure_spreadsheet("Foo").await.unwrap();

        assert_eq!(handle.id, first.id);
    }

    #[tokio::test]
    async fn test_ensure_spreadsheet_rejects_blank_name() {
        let p = provisioner();

        for name in ["", "  ", "\t\n"] {
            let err = p.ensure_spreadsheet(name).await.unwrap_err();
            assert!(matches!(err, ProvisionError::InvalidInput(_)), "{name:?}");
        }
        assert!(p.api().calls().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_spreadsheet_keeps_surrounding_whitespace() {
        let p = provisioner();

        let handle = p.ensure_spreadsheet(" Foo ").await.unwrap();

        assert_eq!(handle.title, " Foo ");
    }

    #[tokio::test]
    async fn test_ensure_spreadsheet_propagates_listing_failure() {
        let p = provisioner();
        p.api().fail_on(Operation::ListSpreadsheets);

        let err = p.ensure_spreadsheet("Foo").await.unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(_)));
        assert_eq!(p.api().calls().len(), 1);
    }

    // ========================================================================
    // ensure_worksheet_with_data
    // ========================================================================

    #[tokio::test]
    async fn test_missing_worksheet_is_added_then_filled() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));

        let ws = p
            .ensure_worksheet_with_data(&sp, DEFAULT_WORKSHEET_NAME)
            .await
            .unwrap();

        assert_eq!(
            p.api().calls(),
            vec![
                Call::GetWorksheet {
                    spreadsheet_id: sp.id.clone(),
                    title: "StaticDataSheet".to_string()
                },
                Call::AddWorksheet {
                    spreadsheet_id: sp.id.clone(),
                    title: "StaticDataSheet".to_string(),
                    rows: 10,
                    columns: 10
                },
                Call::WriteCells {
                    spreadsheet_id: sp.id.clone(),
                    sheet_id: ws.sheet_id,
                    anchor: "A1".to_string(),
                    grid: grid()
                },
            ]
        );
        assert_eq!(p.api().values(&ws, 3, 2), grid());
    }

    #[tokio::test]
    async fn test_existing_worksheet_is_reused_and_overwritten() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        let existing = p
            .api()
            .seed_worksheet(&sp, DEFAULT_WORKSHEET_NAME, 4, 3)
            .unwrap();
        p.api().seed_cell(&existing, 0, 0, json!("stale")).unwrap();
        p.api().seed_cell(&existing, 3, 2, json!("outside")).unwrap();

        let ws = p
            .ensure_worksheet_with_data(&sp, DEFAULT_WORKSHEET_NAME)
            .await
            .unwrap();

        assert_eq!(ws, existing);
        assert!(p.api().calls_of(Operation::AddWorksheet).is_empty());
        assert_eq!(
            p.api().calls_of(Operation::WriteCells),
            vec![Call::WriteCells {
                spreadsheet_id: sp.id.clone(),
                sheet_id: ws.sheet_id,
                anchor: "A1".to_string(),
                grid: grid()
            }]
        );
        assert_eq!(p.api().values(&ws, 3, 2), grid());
        assert_eq!(p.api().cell(&ws, 3, 2), Some(json!("outside")));
    }

    #[tokio::test]
    async fn test_worksheet_lookup_failure_is_not_treated_as_missing() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        p.api().fail_on(Operation::GetWorksheet);

        let err = p
            .ensure_worksheet_with_data(&sp, DEFAULT_WORKSHEET_NAME)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(_)));
        assert!(p.api().calls_of(Operation::AddWorksheet).is_empty());
        assert!(p.api().calls_of(Operation::WriteCells).is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        p.api().fail_on(Operation::WriteCells);

        let err = p
            .ensure_worksheet_with_data(&sp, DEFAULT_WORKSHEET_NAME)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(_)));
        // The worksheet added before the failure stays.
        assert!(
            p.api()
                .worksheet_titles(&sp.id)
                .contains(&DEFAULT_WORKSHEET_NAME.to_string())
        );
    }

    // ========================================================================
    // ensure_named_ranges
    // ========================================================================

    #[tokio::test]
    async fn test_existing_ranges_deleted_in_single_batch() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        let ws = p.api().seed_worksheet(&sp, "StaticDataSheet", 10, 10).unwrap();
        let id1 = p.api().seed_named_range(&sp, "Range1", range(ws.sheet_id, 1)).unwrap();
        let id2 = p.api().seed_named_range(&sp, "Range2", range(ws.sheet_id, 2)).unwrap();

        p.ensure_named_ranges(&sp, &ws).await.unwrap();

        let batches = p.api().calls_of(Operation::BatchUpdate);
        assert_eq!(batches.len(), 2);
        assert_eq!(
            batches[0],
            Call::BatchUpdate {
                spreadsheet_id: sp.id.clone(),
                requests: vec![
                    Request::delete_named_range(id1),
                    Request::delete_named_range(id2),
                ],
            }
        );
    }

    #[tokio::test]
    async fn test_no_matching_ranges_skips_delete_batch() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        let ws = p.api().seed_worksheet(&sp, "StaticDataSheet", 10, 10).unwrap();
        p.api().seed_named_range(&sp, "range1", range(ws.sheet_id, 5)).unwrap();
        p.api().seed_named_range(&sp, "Other", range(ws.sheet_id, 6)).unwrap();

        p.ensure_named_ranges(&sp, &ws).await.unwrap();

        let batches = p.api().calls_of(Operation::BatchUpdate);
        assert_eq!(batches.len(), 1);
        let Call::BatchUpdate { requests, .. } = &batches[0] else {
            panic!("expected a batch update");
        };
        assert!(requests.iter().all(|r| matches!(r, Request::AddNamedRange(_))));
        assert_eq!(p.api().named_ranges(&sp.id).len(), 4);
    }

    #[tokio::test]
    async fn test_delete_managed_ranges_counts_only_managed_names() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        let ws = p.api().seed_worksheet(&sp, "StaticDataSheet", 10, 10).unwrap();
        p.api().seed_named_range(&sp, "Range1", range(ws.sheet_id, 1)).unwrap();
        p.api().seed_named_range(&sp, "Range1", range(ws.sheet_id, 3)).unwrap();
        p.api().seed_named_range(&sp, "Other", range(ws.sheet_id, 4)).unwrap();

        assert_eq!(p.delete_managed_ranges(&sp).await.unwrap(), 2);
        assert_eq!(p.delete_managed_ranges(&sp).await.unwrap(), 0);
        assert_eq!(p.api().calls_of(Operation::BatchUpdate).len(), 1);
    }

    #[tokio::test]
    async fn test_create_batch_matches_definitions_verbatim() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        let ws = p.api().seed_worksheet(&sp, "StaticDataSheet", 10, 10).unwrap();

        p.ensure_named_ranges(&sp, &ws).await.unwrap();

        let batches = p.api().calls_of(Operation::BatchUpdate);
        let Call::BatchUpdate { requests, .. } = &batches[0] else {
            panic!("expected a batch update");
        };
        assert_eq!(
            serde_json::to_value(requests).unwrap(),
            json!([
                {"addNamedRange": {"namedRange": {"name": "Range1", "range": {
                    "sheetId": ws.sheet_id, "startRowIndex": 1, "endRowIndex": 2,
                    "startColumnIndex": 0, "endColumnIndex": 2
                }}}},
                {"addNamedRange": {"namedRange": {"name": "Range2", "range": {
                    "sheetId": ws.sheet_id, "startRowIndex": 2, "endRowIndex": 3,
                    "startColumnIndex": 0, "endColumnIndex": 2
                }}}}
            ])
        );
    }

    #[tokio::test]
    async fn test_duplicate_ranges_collapse_to_one_each() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        let ws = p.api().seed_worksheet(&sp, "StaticDataSheet", 10, 10).unwrap();
        for _ in 0..3 {
            p.api().seed_named_range(&sp, "Range1", range(ws.sheet_id, 7)).unwrap();
        }
        p.api().seed_named_range(&sp, "Keep", range(ws.sheet_id, 8)).unwrap();

        p.ensure_named_ranges(&sp, &ws).await.unwrap();

        let Call::BatchUpdate { requests, .. } = &p.api().calls_of(Operation::BatchUpdate)[0]
        else {
            panic!("expected a batch update");
        };
        assert_eq!(requests.len(), 3);
        assert_eq!(managed_names(p.api(), &sp.id), vec!["Keep", "Range1", "Range2"]);
    }

    #[tokio::test]
    async fn test_failed_delete_batch_skips_create_batch() {
        let p = provisioner();
        let sp = p.api().seed_spreadsheet("Foo", Some("folder-1"));
        let ws = p.api().seed_worksheet(&sp, "StaticDataSheet", 10, 10).unwrap();
        let id1 = p.api().seed_named_range(&sp, "Range1", range(ws.sheet_id, 1)).unwrap();
        p.api().fail_on(Operation::BatchUpdate);

        let err = p.ensure_named_ranges(&sp, &ws).await.unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(_)));
        assert_eq!(p.api().calls_of(Operation::BatchUpdate).len(), 1);
        let remaining = p.api().named_ranges(&sp.id);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].named_range_id, id1);
    }

    // ========================================================================
    // provision
    // ========================================================================

    #[tokio::test]
    async fn test_provision_runs_steps_in_order() {
        let p = provisioner();

        let result = p.provision("Foo").await.unwrap();

        let operations: Vec<Operation> = p.api().calls().iter().map(Call::operation).collect();
        assert_eq!(
            operations,
            vec![
                Operation::ListSpreadsheets,
                Operation::CreateSpreadsheet,
                Operation::GetWorksheet,
                Operation::AddWorksheet,
                Operation::WriteCells,
                Operation::ListNamedRanges,
                Operation::BatchUpdate,
            ]
        );
        assert_eq!(result.spreadsheet.title, "Foo");
        assert_eq!(result.worksheet.title, "StaticDataSheet");
    }

    #[tokio::test]
    async fn test_provision_twice_converges() {
        let p = provisioner();

        let first = p.provision("Foo").await.unwrap();
        let ranges_after_first = p.api().named_ranges(&first.spreadsheet.id);
        p.api().clear_calls();

        let second = p.provision("Foo").await.unwrap();

        assert_eq!(first.spreadsheet, second.spreadsheet);
        assert_eq!(first.worksheet, second.worksheet);
        assert_eq!(p.api().spreadsheets().len(), 1);
        assert_eq!(
            p.api().worksheet_titles(&first.spreadsheet.id),
            vec!["Sheet1", "StaticDataSheet"]
        );
        assert_eq!(managed_names(p.api(), &first.spreadsheet.id), vec!["Range1", "Range2"]);
        assert_eq!(p.api().values(&second.worksheet, 3, 2), grid());

        // Second run replaces both ranges with identical regions.
        let ranges_after_second = p.api().named_ranges(&first.spreadsheet.id);
        for (before, after) in ranges_after_first.iter().zip(&ranges_after_second) {
            assert_eq!(before.name, after.name);
            assert_eq!(before.range, after.range);
            assert_ne!(before.named_range_id, after.named_range_id);
        }
        assert!(p.api().calls_of(Operation::CreateSpreadsheet).is_empty());
        assert!(p.api().calls_of(Operation::AddWorksheet).is_empty());
        assert_eq!(p.api().calls_of(Operation::BatchUpdate).len(), 2);
    }

    #[tokio::test]
    async fn test_provision_stops_at_first_failure() {
        let p = provisioner();
        p.api().fail_on(Operation::AddWorksheet);

        let err = p.provision("Foo").await.unwrap_err();

        assert!(matches!(err, ProvisionError::Remote(_)));
        assert!(p.api().calls_of(Operation::WriteCells).is_empty());
        assert!(p.api().calls_of(Operation::ListNamedRanges).is_empty());
        // The spreadsheet created before the failure is kept.
        assert_eq!(p.api().spreadsheets().len(), 1);
    }

    #[tokio::test]
    async fn test_provision_without_folder_lists_everything() {
        let p = SheetProvisioner::new(InMemorySheets::new());
        let existing = p.api().seed_spreadsheet("Foo", Some("somewhere"));

        let result = p.provision("Foo").await.unwrap();

        assert_eq!(result.spreadsheet, existing);
        assert_eq!(
            p.api().calls()[0],
            Call::ListSpreadsheets { folder_id: None }
        );
    }
}
