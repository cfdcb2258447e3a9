//! Error types for provisioning operations.

use reqwest::StatusCode;

/// Errors returned by [`SheetsApi`](crate::SheetsApi) implementations and the
/// provisioner.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProvisionError {
    /// No worksheet with the requested title exists in the spreadsheet.
    ///
    /// The provisioner treats this as a signal to create the worksheet; it is
    /// never returned from [`SheetProvisioner::provision`](crate::SheetProvisioner::provision).
    #[error("worksheet '{title}' not found")]
    WorksheetNotFound { title: String },

    /// The remote service rejected a request or could not be reached.
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),

    /// An argument was rejected before any remote call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Failures talking to the remote spreadsheet service.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RemoteServiceError {
    /// The service answered with a non-success status.
    #[error("{service} API request failed ({status}): {body}")]
    Api {
        service: &'static str,
        status: StatusCode,
        body: String,
    },

    /// The request could not be sent or the response could not be decoded.
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// A configured base URL cannot be used to build request URLs.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A successful response was missing data the caller depends on.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl From<reqwest::Error> for ProvisionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(RemoteServiceError::Transport(err))
    }
}

pub type Result<T, E = ProvisionError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display_includes_status_and_body() {
        let err = ProvisionError::from(RemoteServiceError::Api {
            service: "Google Sheets",
            status: StatusCode::FORBIDDEN,
            body: "permission denied".to_string(),
        });

        assert_eq!(
            err.to_string(),
            "Google Sheets API request failed (403 Forbidden): permission denied"
        );
    }

    #[test]
    fn test_worksheet_not_found_display() {
        let err = ProvisionError::WorksheetNotFound {
            title: "StaticDataSheet".to_string(),
        };
        assert_eq!(err.to_string(), "worksheet 'StaticDataSheet' not found");
    }
}
