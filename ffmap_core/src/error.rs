//! Error taxonomy shared by the resolver, the marker cache and the Libra
//! database reader.

use thiserror::Error;

/// Failures raised by [`crate::coords::CoordinateTransformer`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinateError {
    #[error("map size factor {0} cannot be used as a divisor")]
    DivisionError(f64),
    #[error("non-finite coordinate component {0}")]
    NonFinite(f64),
}

/// Failure to read a single cell from a data row.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("column {index} out of range (row has {count} columns)")]
    OutOfRange { index: usize, count: usize },
    #[error("column {index} holds {found}, expected {expected}")]
    WrongType {
        index: usize,
        expected: &'static str,
        found: &'static str,
    },
}

/// Errors from the auxiliary SQLite location database.
#[derive(Debug, Error)]
pub enum LibraError {
    #[error("no Libra database found among {0} candidate paths")]
    NotFound(usize),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("malformed data blob for npc {npc_id}: {source}")]
    Blob {
        npc_id: u32,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error type of the kernel.
#[derive(Debug, Error)]
pub enum MapError {
    #[error("game data source is not available")]
    SourceUnavailable,
    #[error("map {0} not found")]
    MapNotFound(u32),
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    #[error("schema mismatch on {sheet}.{field}: {detail}")]
    SchemaMismatch {
        sheet: String,
        field: &'static str,
        detail: String,
    },
    #[error("failed to read {sheet}#{row}: {source}")]
    Extraction {
        sheet: String,
        row: u32,
        #[source]
        source: FieldError,
    },
    #[error(transparent)]
    Libra(#[from] LibraError),
    #[error("layer file {path}: {message}")]
    Layer { path: String, message: String },
    #[error("background load failed: {0}")]
    Offload(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = MapError> = std::result::Result<T, E>;
