//! Idempotent provisioning of a Google Sheets spreadsheet.
//!
//! [`SheetProvisioner`] converges one spreadsheet to a fixed layout:
//! - the spreadsheet exists in the configured Drive folder
//! - a `StaticDataSheet` worksheet holds a small static data block
//! - the named ranges `Range1` and `Range2` cover the data rows
//!
//! Remote access goes through the [`SheetsApi`] trait. [`GoogleSheetsClient`]
//! talks to the Google Sheets and Drive REST APIs; [`InMemorySheets`] keeps
//! everything in process memory.
//!
//! # Example
//!
//! ```no_run
//! use sheets_provision::{GoogleSheetsClient, ProvisionConfig, SheetProvisioner};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProvisionConfig::resolve(None)?;
//! let client = GoogleSheetsClient::from_config(&config.google)?;
//! let mut provisioner = SheetProvisioner::new(client);
//! if let Some(folder_id) = &config.folder_id {
//!     provisioner = provisioner.with_folder(folder_id.clone());
//! }
//!
//! let provisioned = provisioner.provision("Quarterly Report").await?;
//! println!("provisioned spreadsheet {}", provisioned.spreadsheet.id);
//! # Ok(())
//! # }
//! ```

mod api;
mod client;
pub mod config;
mod error;
pub mod layout;
pub mod memory;
mod provisioner;
mod types;

pub use api::{SheetsApi, SpreadsheetFile, SpreadsheetHandle, WorksheetHandle};
pub use client::{DEFAULT_DRIVE_ENDPOINT, DEFAULT_SHEETS_ENDPOINT, GoogleSheetsClient};
pub use config::{ConfigError, GoogleConfig, ProvisionConfig};
pub use error::{ProvisionError, RemoteServiceError, Result};
pub use memory::InMemorySheets;
pub use provisioner::{Provisioned, SheetProvisioner};
pub use types::{
    AddNamedRange, CellValue, DeleteNamedRange, GridRange, NamedRange, NamedRangeEntry, Request,
};
