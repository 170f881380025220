use std::path::Path;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::{debug, info};

use crate::config::ArchiveConfig;
use crate::domain::TableFormat;
use crate::error::NeidError;
use crate::fs_util;
use crate::session::Session;

/// One synchronous TAP exchange: an ADQL statement plus the output options
/// forwarded to the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapRequest {
    pub query: String,
    pub format: TableFormat,
    pub maxrec: Option<u32>,
}

pub trait TapClient: Send + Sync {
    /// Run the query and write the result table to `outpath`.
    fn execute(
        &self,
        request: &TapRequest,
        session: Option<&Session>,
        outpath: &Path,
    ) -> Result<(), NeidError>;
}

#[derive(Clone)]
pub struct TapHttpClient {
    client: Client,
    sync_url: String,
}

impl TapHttpClient {
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
            sync_url: config.tap_sync_url(),
        })
    }
}

impl TapClient for TapHttpClient {
    fn execute(
        &self,
        request: &TapRequest,
        session: Option<&Session>,
        outpath: &Path,
    ) -> Result<(), NeidError> {
        let mut params = vec![
            ("request", "doQuery".to_string()),
            ("lang", "ADQL".to_string()),
            ("phase", "RUN".to_string()),
            ("format", request.format.tap_value().to_string()),
            ("query", request.query.clone()),
        ];
        if let Some(maxrec) = request.maxrec {
            params.push(("maxrec", maxrec.to_string()));
        }

        debug!(url = %self.sync_url, query = %request.query, "submitting TAP query");
        let mut builder = self.client.post(&self.sync_url).form(&params);
        if let Some(session) = session {
            builder = builder.header(COOKIE, session.cookie_header());
        }
        let response = builder.send()?;
        save_result(response, outpath)?;
        info!(outpath = %outpath.display(), "result table written");
        Ok(())
    }
}

/// The service signals failure on two channels: a non-2xx status, or a JSON
/// error payload under HTTP 200. Both are checked on every response; only a
/// verified table body reaches `outpath`, through a temp-file rename.
fn save_result(mut response: reqwest::blocking::Response, outpath: &Path) -> Result<(), NeidError> {
    let status = response.status();
    if !status.is_success() {
        let message = response.text().unwrap_or_default();
        return Err(NeidError::TapStatus {
            status: status.as_u16(),
            message: message.trim().to_string(),
        });
    }

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

    fs_util::write_reader_atomic(outpath, &mut response)
}

/// Pull the server's message out of an error payload, falling back to the
/// raw body when the shape is unexpected.
pub(crate) fn embedded_error(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => value
            .get("msg")
            .or_else(|| value.get("error"))
            .and_then(|field| field.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string()),
        Err(_) => body.trim().to_string(),
    }
}
