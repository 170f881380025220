use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::config::ArchiveConfig;
use crate::error::NeidError;

/// J2000 coordinates returned by the name-lookup service.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedCoords {
    pub objname: String,
    pub ra: f64,
    pub dec: f64,
}

pub trait NameResolver: Send + Sync {
    fn resolve(&self, object: &str) -> Result<ResolvedCoords, NeidError>;
}

/// Client for the archive's companion lookup service, which checks the
/// Exoplanet Archive and falls through to Sesame (SIMBAD/NED). The name is
/// passed through as-is; resolution happens entirely on the server.
#[derive(Clone)]
pub struct LookupHttpClient {
    client: Client,
    lookup_url: String,
}

impl LookupHttpClient {
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
            lookup_url: config.lookup_url.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LookupReply {
    stat: String,
    #[serde(default)]
    objname: Option<String>,
    #[serde(default)]
    ra2000: Option<String>,
    #[serde(default)]
    dec2000: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

impl NameResolver for LookupHttpClient {
    fn resolve(&self, object: &str) -> Result<ResolvedCoords, NeidError> {
        debug!(url = %self.lookup_url, object, "resolving object name");
        let response = self
            .client
            .get(&self.lookup_url)
            .query(&[("location", object)])
            .send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(NeidError::Query(format!(
                "lookup service returned status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let reply: LookupReply = serde_json::from_str(&body).map_err(|err| {
            NeidError::Query(format!("unexpected lookup response: {err}"))
        })?;
        if reply.stat.to_lowercase() != "ok" {
            let msg = reply.msg.unwrap_or_else(|| "unknown lookup error".to_string());
            return Err(NeidError::Query(format!(
                "object name [{object}] lookup error: {msg}"
            )));
        }

        let ra = parse_coord(reply.ra2000.as_deref(), object)?;
        let dec = parse_coord(reply.dec2000.as_deref(), object)?;
        Ok(ResolvedCoords {
            objname: reply.objname.unwrap_or_else(|| object.to_string()),
            ra,
            dec,
        })
    }
}

fn parse_coord(value: Option<&str>, object: &str) -> Result<f64, NeidError> {
    value
        .and_then(|text| text.trim().parse::<f64>().ok())
        .ok_or_else(|| {
            NeidError::Query(format!(
                "lookup for [{object}] returned malformed coordinates"
            ))
        })
}
