use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://neid.ipac.caltech.edu/";
pub const DEFAULT_LOOKUP_URL: &str =
    "https://exoplanetarchive.ipac.caltech.edu/cgi-bin/Lookup/nph-lookup";

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub base_url: String,
    pub lookup_url: String,
    pub timeout: Duration,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ArchiveConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn login_url(&self) -> String {
        self.join("cgi-bin/NeidAPI/nph-neidLogin.py")
    }

    pub fn tap_sync_url(&self) -> String {
        self.join("TAP/sync")
    }

    pub fn download_url(&self) -> String {
        self.join("cgi-bin/NeidAPI/nph-neidDownload.py")
    }

    pub fn caliblist_url(&self) -> String {
        self.join("cgi-bin/NeidAPI/nph-getCaliblist.py")
    }

    fn join(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
