use std::fs;
use std::path::Path;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, SET_COOKIE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ArchiveConfig;
use crate::error::NeidError;
use crate::fs_util;

/// An authenticated archive session: the cookie pairs returned by the login
/// service. Passing `None` instead of a session scopes every call to public
/// data. Expiry is not tracked locally; a stale cookie surfaces as a
/// server-side error on the next call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    cookies: Vec<String>,
}

impl Session {
    /// Load a session saved by a previous `login`. Blank lines and `#`
    /// comments are skipped, so a Netscape-format jar written by other
    /// tooling also loads.
    pub fn load(cookiepath: &Path) -> Result<Self, NeidError> {
        let content = fs::read_to_string(cookiepath).map_err(|err| {
            NeidError::Filesystem(format!("read cookie file {}: {err}", cookiepath.display()))
        })?;
        let cookies: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(parse_cookie_line)
            .collect();
        if cookies.is_empty() {
            return Err(NeidError::Authentication(format!(
                "cookie file {} contains no cookie",
                cookiepath.display()
            )));
        }
        Ok(Self { cookies })
    }

    pub fn cookie_header(&self) -> String {
        self.cookies.join("; ")
    }
}

/// Netscape jar lines are tab-delimited with the cookie name and value in
/// the last two fields; our own files store bare `name=value` lines.
fn parse_cookie_line(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 7 {
        format!("{}={}", fields[fields.len() - 2], fields[fields.len() - 1])
    } else {
        line.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub status: String,
    pub msg: String,
    pub cookies: Vec<String>,
    pub raw_body: String,
}

pub trait LoginClient: Send + Sync {
    fn login(&self, userid: &str, password: &str) -> Result<LoginOutcome, NeidError>;
}

#[derive(Clone)]
pub struct LoginHttpClient {
    client: Client,
    login_url: String,
}

impl LoginHttpClient {
    pub fn new(config: &ArchiveConfig) -> Result<Self, NeidError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("neid-archive/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| NeidError::Authentication(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| NeidError::Authentication(err.to_string()))?;
        Ok(Self {
            client,
            login_url: config.login_url(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    status: String,
    #[serde(default)]
    msg: String,
}

impl LoginClient for LoginHttpClient {
    fn login(&self, userid: &str, password: &str) -> Result<LoginOutcome, NeidError> {
        debug!(url = %self.login_url, userid, "sending login request");
        let response = self
            .client
            .get(&self.login_url)
            .query(&[("userid", userid), ("password", password)])
            .send()
            .map_err(|err| NeidError::Authentication(err.to_string()))?;

        let cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(|value| {
                value
                    .split_once(';')
                    .map_or(value, |(pair, _)| pair)
                    .trim()
                    .to_string()
            })
            .collect::<Vec<_>>();

        let status = response.status();
        let raw_body = response
            .text()
            .map_err(|err| NeidError::Authentication(err.to_string()))?;
        if !status.is_success() {
            return Err(NeidError::Authentication(format!(
                "login endpoint returned status {}: {raw_body}",
                status.as_u16()
            )));
        }

        let reply: LoginReply = serde_json::from_str(&raw_body).map_err(|err| {
            NeidError::Authentication(format!("unexpected login response: {err}"))
        })?;
        Ok(LoginOutcome {
            status: reply.status,
            msg: reply.msg,
            cookies,
            raw_body,
        })
    }
}

/// Validate credentials against the login service and persist the returned
/// session cookie to `cookiepath`, overwriting any previous file. When
/// `debugfile` is given the raw login response body is written there as
/// well.
pub fn login(
    client: &impl LoginClient,
    userid: &str,
    password: &str,
    cookiepath: &Path,
    debugfile: Option<&Path>,
) -> Result<Session, NeidError> {
    if userid.trim().is_empty() {
        return Err(NeidError::EmptyParameter("userid"));
    }
    if password.trim().is_empty() {
        return Err(NeidError::EmptyParameter("password"));
    }

    let outcome = client.login(userid, password)?;
    if let Some(path) = debugfile {
        fs_util::write_bytes_atomic(path, outcome.raw_body.as_bytes())?;
    }

    if outcome.status != "ok" {
        return Err(NeidError::Authentication(outcome.msg));
    }
    if outcome.cookies.is_empty() {
        return Err(NeidError::Authentication(
            "login response carried no session cookie".to_string(),
        ));
    }

    let mut content = outcome.cookies.join("\n");
    content.push('\n');
    fs_util::write_bytes_atomic(cookiepath, content.as_bytes())?;
    info!(cookiepath = %cookiepath.display(), "logged in as {userid}");

    Ok(Session {
        cookies: outcome.cookies,
    })
}
