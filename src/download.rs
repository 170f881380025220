use std::fs;
use std::path::Path;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::ArchiveConfig;
use crate::domain::{DataLevel, TableFormat};
use crate::error::NeidError;
use crate::fs_util;
use crate::session::Session;
use crate::table::ResultTable;
use crate::tap::embedded_error;

/// One entry of a calibration-file list associated with a science frame.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CalibEntry {
    pub filename: String,
    pub filepath: String,
}

pub trait DownloadClient: Send + Sync {
    /// Fetch one archive file by its server-side path and write it to
    /// `destination`.
    fn fetch_file(
        &self,
        datalevel: DataLevel,
        filepath: &str,
        session: Option<&Session>,
        destination: &Path,
    ) -> Result<(), NeidError>;

    /// Fetch the calibration-file list associated with `filename`.
    fn fetch_caliblist(
        &self,
        datalevel: DataLevel,
        filename: &str,
        session: Option<&Session>,
    ) -> Result<Vec<CalibEntry>, NeidError>;
}

#[derive(Clone)]
pub struct DownloadHttpClient {
    client: Client,
    download_url: String,
    caliblist_url: String,
}

impl DownloadHttpClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self, NeidError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("neid-archive/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| NeidError::Filesystem(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            download_url: config.download_url(),
            caliblist_url: config.caliblist_url(),
        })
    }

    fn get(
        &self,
        url: &str,
        query: &[(&str, String)],
        session: Option<&Session>,
    ) -> Result<reqwest::blocking::Response, NeidError> {
        let mut builder = self.client.get(url).query(query);
        if let Some(session) = session {
            builder = builder.header(COOKIE, session.cookie_header());
        }
        Ok(builder.send()?)
    }
}

impl DownloadClient for DownloadHttpClient {
    fn fetch_file(
        &self,
        datalevel: DataLevel,
        filepath: &str,
        session: Option<&Session>,
        destination: &Path,
    ) -> Result<(), NeidError> {
        let server_path = format!("/{}", filepath.trim_start_matches('/'));
        let query = [
            ("datalevel", datalevel.to_string()),
            ("filepath", server_path),
        ];
        debug!(url = %self.download_url, filepath, "fetching archive file");
        let mut response = self.get(&self.download_url, &query, session)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(NeidError::DownloadStatus {
                status: status.as_u16(),
                message: message.trim().to_string(),
            });
        }
        // the download endpoint also reports missing/proprietary files as a
        // JSON payload under HTTP 200
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.contains("json"))
            .unwrap_or(false);
        if is_json {
            let body = response.text()?;
            return Err(NeidError::Query(embedded_error(&body)));
        }

        fs_util::write_reader_atomic(destination, &mut response)
    }

    fn fetch_caliblist(
        &self,
        datalevel: DataLevel,
        filename: &str,
        session: Option<&Session>,
    ) -> Result<Vec<CalibEntry>, NeidError> {
        let query = [
            ("datalevel", datalevel.to_string()),
            ("filename", filename.to_string()),
        ];
        let response = self.get(&self.caliblist_url, &query, session)?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(NeidError::DownloadStatus {
                status: status.as_u16(),
                message: body.trim().to_string(),
            });
        }

        let value: serde_json::Value = serde_json::from_str(&body).map_err(|err| {
            NeidError::Query(format!("unexpected caliblist response: {err}"))
        })?;
        let entries = match &value {
            serde_json::Value::Array(_) => value.clone(),
            serde_json::Value::Object(map) => match map.get("caliblist") {
                Some(list) => list.clone(),
                None => return Err(NeidError::Query(embedded_error(&body))),
            },
            _ => return Err(NeidError::Query(embedded_error(&body))),
        };
        serde_json::from_value(entries)
            .map_err(|err| NeidError::Query(format!("malformed caliblist entry: {err}")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadOptions {
    pub start_row: usize,
    /// Inclusive; `None` runs to the last row.
    pub end_row: Option<usize>,
    /// Also retrieve each row's associated calibration-file list.
    pub calibfiles: bool,
}

#[derive(Debug, Clone)]
pub struct RowFailure {
    pub row: usize,
    pub filename: String,
    pub reason: String,
}

/// Outcome of a download batch. Per-row failures are recorded here instead
/// of aborting the batch; `attempted == succeeded + skipped + failed`.
#[derive(Debug, Clone, Default)]
pub struct DownloadSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub calib_attempted: usize,
    pub calib_succeeded: usize,
    pub failures: Vec<RowFailure>,
}

/// Walk a previously retrieved result table and fetch one file per row in
/// the requested range. A failed row is recorded and the loop moves on; a
/// single missing file must not block the rest of the batch.
pub fn download(
    client: &impl DownloadClient,
    metapath: &Path,
    datalevel: DataLevel,
    format: TableFormat,
    outdir: &Path,
    session: Option<&Session>,
    options: &DownloadOptions,
) -> Result<DownloadSummary, NeidError> {
    let table = ResultTable::read(metapath, format)?;
    if table.is_empty() {
        return Err(NeidError::Table(format!(
            "metadata table {} contains no rows",
            metapath.display()
        )));
    }

    let filename_column = format!("{datalevel}filename");
    let filepath_column = format!("{datalevel}filepath");
    let filename_index = table
        .column_index(&filename_column)
        .ok_or_else(|| NeidError::MissingColumn(filename_column.clone()))?;
    let filepath_index = table
        .column_index(&filepath_column)
        .ok_or_else(|| NeidError::MissingColumn(filepath_column.clone()))?;

    let (first, last) = resolve_row_range(table.row_count(), options.start_row, options.end_row)?;
    fs::create_dir_all(outdir).map_err(|err| {
        NeidError::Filesystem(format!("create {}: {err}", outdir.display()))
    })?;

    info!(
        rows = last - first + 1,
        outdir = %outdir.display(),
        "starting download batch"
    );

    let mut summary = DownloadSummary::default();
    for row in first..=last {
        summary.attempted += 1;
        let filename = table.value(row, filename_index).to_string();
        let filepath = table.value(row, filepath_index).to_string();
        if filename.is_empty() || filepath.is_empty() {
            summary.failed += 1;
            summary.failures.push(RowFailure {
                row,
                filename,
                reason: "row has no file name/path".to_string(),
            });
            continue;
        }

        let destination = outdir.join(&filename);
        if destination.exists() {
            debug!(filename = %filename, "already present, skipping");
            summary.skipped += 1;
        } else {
            match client.fetch_file(datalevel, &filepath, session, &destination) {
                Ok(()) => summary.succeeded += 1,
                Err(err) => {
                    warn!(row, filename = %filename, error = %err, "file download failed");
                    summary.failed += 1;
                    summary.failures.push(RowFailure {
                        row,
                        filename,
                        reason: err.to_string(),
                    });
                    continue;
                }
            }
        }

        if options.calibfiles {
            follow_caliblist(client, datalevel, &filename, session, outdir, row, &mut summary);
        }
    }

    info!(
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        "download batch finished"
    );
    Ok(summary)
}

fn follow_caliblist(
    client: &impl DownloadClient,
    datalevel: DataLevel,
    filename: &str,
    session: Option<&Session>,
    outdir: &Path,
    row: usize,
    summary: &mut DownloadSummary,
) {
    let entries = match client.fetch_caliblist(datalevel, filename, session) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(row, filename = %filename, error = %err, "caliblist fetch failed");
            summary.failures.push(RowFailure {
                row,
                filename: filename.to_string(),
                reason: format!("calibration list: {err}"),
            });
            return;
        }
    };

    for entry in entries {
        let destination = outdir.join(&entry.filename);
        if destination.exists() {
            continue;
        }
        summary.calib_attempted += 1;
        match client.fetch_file(datalevel, &entry.filepath, session, &destination) {
            Ok(()) => summary.calib_succeeded += 1,
            Err(err) => {
                warn!(row, filename = %entry.filename, error = %err, "calibration file failed");
                summary.failures.push(RowFailure {
                    row,
                    filename: entry.filename,
                    reason: format!("calibration file: {err}"),
                });
            }
        }
    }
}

fn resolve_row_range(
    row_count: usize,
    start_row: usize,
    end_row: Option<usize>,
) -> Result<(usize, usize), NeidError> {
    let last = row_count - 1;
    if start_row > last {
        return Err(NeidError::RowRange(format!(
            "start_row {start_row} is past the last row {last}"
        )));
    }
    let end = match end_row {
        Some(end) if end < start_row => {
            return Err(NeidError::RowRange(format!(
                "end_row {end} is before start_row {start_row}"
            )));
        }
        Some(end) => end.min(last),
        None => last,
    };
    Ok((start_row, end))
}
