//! Synchronous client for the NEID archive: session login, convenience
//! queries against the TAP service, and download of the FITS files a result
//! table references.
//!
//! Typical flow: [`session::login`] (or none, for public data) →
//! [`Archive::query_datetime`]/[`Archive::query_criteria`]/… writing a
//! result table to disk → [`Archive::download`] walking that table row by
//! row.

pub mod archive;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod fs_util;
pub mod lookup;
pub mod query;
pub mod session;
pub mod table;
pub mod tap;

pub use archive::{Archive, DEFAULT_OBJECT_RADIUS_DEG, QueryOptions};
pub use config::ArchiveConfig;
pub use domain::{Criteria, DataLevel, DatetimeRange, Position, TableFormat};
pub use download::{CalibEntry, DownloadOptions, DownloadSummary, RowFailure};
pub use error::NeidError;
pub use lookup::ResolvedCoords;
pub use session::{Session, login};
pub use table::ResultTable;
pub use tap::TapRequest;
