//! [`SheetsApi`] over the Google Sheets v4 and Google Drive v3 REST APIs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::IgnoredAny};
use tracing::debug;

use crate::{
    api::{SheetsApi, SpreadsheetFile, SpreadsheetHandle, WorksheetHandle},
    config::GoogleConfig,
    error::{ProvisionError, RemoteServiceError, Result},
    types::{
        AddSheet, AddSheetRequest, BatchUpdateRequest, BatchUpdateResponse, CellValue,
        CreateFileRequest, DriveFile, FileListResponse, GridProperties, NamedRangeEntry,
        NewSheetProperties, Request, SpreadsheetMetadata, ValueRangeInput,
    },
};

pub const DEFAULT_SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com/v4";
pub const DEFAULT_DRIVE_ENDPOINT: &str = "https://www.googleapis.com/drive/v3";

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";
const SHEETS_SERVICE: &str = "Google Sheets";
const DRIVE_SERVICE: &str = "Google Drive";
const LIST_PAGE_SIZE: &str = "1000";

/// HTTP client for the Google APIs, authenticated with a bearer access token.
#[derive(Debug, Clone)]
pub struct GoogleSheetsClient {
    http: reqwest::Client,
    sheets_base_url: String,
    drive_base_url: String,
    access_token: String,
}

impl GoogleSheetsClient {
    /// Creates a client for the public Google endpoints.
    ///
    /// # Errors
    ///
    /// Returns an error if `access_token` is blank.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(access_token, DEFAULT_SHEETS_ENDPOINT, DEFAULT_DRIVE_ENDPOINT)
    }

    /// Creates a client for custom endpoints (proxies, emulators, tests).
    ///
    /// # Errors
    ///
    /// Returns an error if `access_token` or either endpoint is blank.
    pub fn with_endpoints(
        access_token: impl Into<String>,
        sheets_endpoint: &str,
        drive_endpoint: &str,
    ) -> Result<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(ProvisionError::InvalidInput(
                "access_token must not be empty".to_string(),
            ));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            sheets_base_url: normalize_base_url(sheets_endpoint)?,
            drive_base_url: normalize_base_url(drive_endpoint)?,
            access_token,
        })
    }

    /// Creates a client from the `[google]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns an error if the token or an endpoint is blank.
    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        Self::with_endpoints(
            config.access_token.clone(),
            &config.sheets_endpoint,
            &config.drive_endpoint,
        )
    }

    fn sheets_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        url_with_segments(&self.sheets_base_url, segments)
    }

    fn drive_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        url_with_segments(&self.drive_base_url, segments)
    }

    async fn spreadsheet_metadata(
        &self,
        spreadsheet_id: &str,
        fields: &str,
    ) -> Result<SpreadsheetMetadata> {
        self.get_json(
            SHEETS_SERVICE,
            self.sheets_url(&["spreadsheets", spreadsheet_id])?,
            &[("fields", fields.to_string())],
        )
        .await
    }

    async fn post_batch_update<TReq: Serialize + Send + Sync>(
        &self,
        spreadsheet_id: &str,
        requests: Vec<TReq>,
    ) -> Result<BatchUpdateResponse> {
        let batch_update = format!("{spreadsheet_id}:batchUpdate");
        self.post_json(
            SHEETS_SERVICE,
            self.sheets_url(&["spreadsheets", &batch_update])?,
            &BatchUpdateRequest { requests },
            &[],
        )
        .await
    }

    async fn get_json<T: for<'de> Deserialize<'de> + Send>(
        &self,
        service: &'static str,
        url: reqwest::Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .send_request(service, self.http.get(url).query(query))
            .await?;
        Ok(response.json::<T>().await?)
    }

    async fn put_json<TReq: Serialize + Sync, TRes: for<'de> Deserialize<'de> + Send>(
        &self,
        service: &'static str,
        url: reqwest::Url,
        body: &TReq,
        query: &[(&str, String)],
    ) -> Result<TRes> {
        let response = self
            .send_request(service, self.http.put(url).query(query).json(body))
            .await?;
        Ok(response.json::<TRes>().await?)
    }

    async fn post_json<TReq: Serialize + Sync, TRes: for<'de> Deserialize<'de> + Send>(
        &self,
        service: &'static str,
        url: reqwest::Url,
        body: &TReq,
        query: &[(&str, String)],
    ) -> Result<TRes> {
        let response = self
            .send_request(service, self.http.post(url).query(query).json(body))
            .await?;
        Ok(response.json::<TRes>().await?)
    }

    async fn send_request(
        &self,
        service: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        debug!(service, %status, url = %response.url(), "received response");
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(RemoteServiceError::Api {
                service,
                status,
                body,
            }
            .into())
        }
    }
}

#[async_trait]
impl SheetsApi for GoogleSheetsClient {
    async fn list_spreadsheets(&self, folder_id: Option<&str>) -> Result<Vec<SpreadsheetFile>> {
        let q = match folder_id {
            Some(folder_id) => format!(
                "mimeType='{SPREADSHEET_MIME_TYPE}' and trashed=false and '{}' in parents",
                escape_query_literal(folder_id)
            ),
            None => format!("mimeType='{SPREADSHEET_MIME_TYPE}' and trashed=false"),
        };

        let mut files = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query = vec![
                ("q", q.clone()),
                ("fields", "nextPageToken,files(id,name)".to_string()),
                ("pageSize", LIST_PAGE_SIZE.to_string()),
                ("supportsAllDrives", "true".to_string()),
                ("includeItemsFromAllDrives", "true".to_string()),
            ];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let page: FileListResponse = self
                .get_json(DRIVE_SERVICE, self.drive_url(&["files"])?, &query)
                .await?;
            files.extend(page.files.into_iter().map(|file| SpreadsheetFile {
                id: file.id,
                name: file.name,
            }));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }

    async fn open_spreadsheet(&self, file: &SpreadsheetFile) -> Result<SpreadsheetHandle> {
        let metadata = self
            .spreadsheet_metadata(&file.id, "spreadsheetId,properties.title")
            .await?;

        Ok(SpreadsheetHandle {
            id: metadata.spreadsheet_id.unwrap_or_else(|| file.id.clone()),
            title: metadata
                .properties
                .map_or_else(|| file.name.clone(), |p| p.title),
        })
    }

    async fn create_spreadsheet(
        &self,
        name: &str,
        folder_id: Option<&str>,
    ) -> Result<SpreadsheetHandle> {
        let body = CreateFileRequest {
            name,
            mime_type: SPREADSHEET_MIME_TYPE,
            parents: folder_id.into_iter().collect(),
        };

        let created: DriveFile = self
            .post_json(
                DRIVE_SERVICE,
                self.drive_url(&["files"])?,
                &body,
                &[
                    ("supportsAllDrives", "true".to_string()),
                    ("fields", "id,name".to_string()),
                ],
            )
            .await?;

        Ok(SpreadsheetHandle {
            id: created.id,
            title: created.name,
        })
    }

    async fn get_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        title: &str,
    ) -> Result<WorksheetHandle> {
        let metadata = self
            .spreadsheet_metadata(&spreadsheet.id, "sheets.properties")
            .await?;

        metadata
            .sheets
            .into_iter()
            .find(|sheet| sheet.properties.title == title)
            .map(|sheet| WorksheetHandle {
                spreadsheet_id: spreadsheet.id.clone(),
                sheet_id: sheet.properties.sheet_id,
                title: sheet.properties.title,
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
        let request = AddSheetRequest {
            add_sheet: AddSheet {
                properties: NewSheetProperties {
                    title: title.to_string(),
                    grid_properties: GridProperties {
                        row_count: rows,
                        column_count: columns,
                    },
                },
            },
        };

        let response = self
            .post_batch_update(&spreadsheet.id, vec![request])
            .await?;

        let added = response
            .replies
            .into_iter()
            .find_map(|reply| reply.add_sheet)
            .ok_or_else(|| {
                RemoteServiceError::UnexpectedResponse(
                    "no sheet was added in the response".to_string(),
                )
            })?;

        Ok(WorksheetHandle {
            spreadsheet_id: spreadsheet.id.clone(),
            sheet_id: added.properties.sheet_id,
            title: added.properties.title,
        })
    }

    async fn write_cells(
        &self,
        worksheet: &WorksheetHandle,
        anchor: &str,
        grid: &[&[CellValue<'_>]],
    ) -> Result<()> {
        let range = worksheet.absolute_range(anchor);
        let body = ValueRangeInput {
            range: &range,
            major_dimension: "ROWS",
            values: grid,
        };

        let _: IgnoredAny = self
            .put_json(
                SHEETS_SERVICE,
                self.sheets_url(&["spreadsheets", &worksheet.spreadsheet_id, "values", &range])?,
                &body,
                &[("valueInputOption", "RAW".to_string())],
            )
            .await?;
        Ok(())
    }

    async fn list_named_ranges(
        &self,
        spreadsheet: &SpreadsheetHandle,
    ) -> Result<Vec<NamedRangeEntry>> {
        let metadata = self
            .spreadsheet_metadata(&spreadsheet.id, "namedRanges")
            .await?;
        Ok(metadata.named_ranges)
    }

    async fn batch_update(
        &self,
        spreadsheet: &SpreadsheetHandle,
        requests: &[Request],
    ) -> Result<()> {
        self.post_batch_update(&spreadsheet.id, requests.to_vec())
            .await?;
        Ok(())
    }
}

fn url_with_segments(base_url: &str, segments: &[&str]) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base_url)
        .map_err(|e| RemoteServiceError::InvalidEndpoint(format!("{base_url}: {e}")))?;
    {
        let mut path = url.path_segments_mut().map_err(|()| {
            RemoteServiceError::InvalidEndpoint(format!("{base_url} is not an absolute URL"))
        })?;
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

/// Escapes a value for use inside a single-quoted Drive query string.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub(crate) fn normalize_base_url(endpoint: &str) -> Result<String, RemoteServiceError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(RemoteServiceError::InvalidEndpoint(
            "endpoint must not be empty".to_string(),
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}
