use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{DashboardError, Result};
use crate::table::RawTable;

/// Where a sheet's CSV comes from
///
/// Published spreadsheets are read over plain HTTP GET; a local file is
/// accepted too, which is what the bundled sample data and the tests use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetLocation {
    /// CSV export URL
    Url(String),

    /// CSV file on disk
    File(PathBuf),
}

impl std::fmt::Display for SheetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetLocation::Url(url) => write!(f, "{}", url),
            SheetLocation::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Build the CSV export URL of a published Google spreadsheet
///
/// # Arguments
/// * `sheet_id` - Document identifier from the sheet's URL
/// * `gid` - Tab identifier (`0` is the first tab)
///
/// # Examples
/// ```
/// use benefits_dashboard::loader::published_csv_url;
///
/// assert_eq!(
///     published_csv_url("abc123", 0),
///     "https://docs.google.com/spreadsheets/d/abc123/export?format=csv&gid=0"
/// );
/// ```
pub fn published_csv_url(sheet_id: &str, gid: u64) -> String {
    format!(
        "https://docs.google.com/spreadsheets/d/{}/export?format=csv&gid={}",
        sheet_id.trim(),
        gid
    )
}

/// Fetch the raw CSV text of a sheet
///
/// URLs are requested with a single GET through the shared client; any
/// transport error or non-success status is reported as
/// `DashboardError::Fetch`. There are no retries.
#[cfg(feature = "web")]
pub async fn fetch_sheet(client: &reqwest::Client, location: &SheetLocation) -> Result<String> {
    match location {
        SheetLocation::Url(url) => {
            let fetch_error = |reason: String| DashboardError::Fetch {
                sheet: url.clone(),
                reason,
            };

            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| fetch_error(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(fetch_error(format!("HTTP {}", status)));
            }

            response.text().await.map_err(|e| fetch_error(e.to_string()))
        }
        SheetLocation::File(path) => Ok(tokio::fs::read_to_string(path).await?),
    }
}

/// Fetch a sheet and parse it into a [`RawTable`] named `name`.
#[cfg(feature = "web")]
pub async fn load_table(
    client: &reqwest::Client,
    name: &str,
    location: &SheetLocation,
) -> Result<RawTable> {
    log::info!("Loading sheet `{}` from {}", name, location);
    let text = fetch_sheet(client, location).await?;
    let table = RawTable::from_csv_str(name, &text)?;
    log::info!(
        "Sheet `{}` loaded: {} columns, {} rows",
        name,
        table.headers.len(),
        table.len()
    );
    Ok(table)
}

/// Read a local CSV file synchronously (used outside the async server).
pub fn load_table_from_file(name: &str, path: impl AsRef<std::path::Path>) -> Result<RawTable> {
    let text = std::fs::read_to_string(path)?;
    RawTable::from_csv_str(name, &text)
}
