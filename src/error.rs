use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum NeidError {
    #[error("invalid data level: {0}")]
    InvalidDataLevel(String),

    #[error("invalid table format: {0}")]
    InvalidFormat(String),

    #[error("invalid datetime range: {0}")]
    InvalidDatetimeRange(String),

    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("unrecognized criteria key: {0}")]
    UnknownCriterion(String),

    #[error("conflicting criteria: {0}")]
    ConflictingCriteria(String),

    #[error("required parameter is empty: {0}")]
    EmptyParameter(&'static str),

    #[error("invalid row range: {0}")]
    RowRange(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("TAP service returned status {status}: {message}")]
    TapStatus { status: u16, message: String },

    #[error("download service returned status {status}: {message}")]
    DownloadStatus { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("failed to read result table: {0}")]
    Table(String),

    #[error("result table is missing required column: {0}")]
    MissingColumn(String),
}
