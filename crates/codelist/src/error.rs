use arrow_schema::ArrowError;
use std::path::{Path, PathBuf};

/// Result type for runner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that halt a codelist run.
///
/// A failed cache write is not one of them: see [`CacheWriteError`] and
/// `RunOutcome::cache_error`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    QueryExecution(#[from] QueryExecutionError),

    #[error(transparent)]
    CacheRead(#[from] CacheReadError),
}

/// The warehouse did not produce a result for the query.
#[derive(Debug, thiserror::Error)]
pub enum QueryExecutionError {
    /// Non-success HTTP status (syntax error, permission denied, timeout)
    #[error("warehouse rejected query (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("warehouse request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("warehouse credentials unavailable: {0}")]
    Credentials(String),

    /// A response arrived but could not be understood
    #[error("unexpected warehouse response: {0}")]
    Response(String),

    #[error("warehouse returned unusable rows: {0}")]
    Table(#[from] TableError),

    #[error("{0}")]
    Other(String),
}

/// An existing cache file could not be turned back into a table.
#[derive(Debug, thiserror::Error)]
pub enum CacheReadError {
    #[error("cannot read cache file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cache file {} is not valid CSV: {source}", .path.display())]
    Csv { path: PathBuf, source: ArrowError },

    #[error("cache file {} has header {found:?}, expected {expected:?}", .path.display())]
    Header {
        path: PathBuf,
        found: Vec<String>,
        expected: Vec<String>,
    },

    #[error("cache file {} holds unusable rows: {source}", .path.display())]
    Table { path: PathBuf, source: TableError },
}

impl CacheReadError {
    pub fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        CacheReadError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn csv<P: AsRef<Path>>(path: P, source: ArrowError) -> Self {
        CacheReadError::Csv {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            CacheReadError::Io { path, .. }
            | CacheReadError::Csv { path, .. }
            | CacheReadError::Header { path, .. }
            | CacheReadError::Table { path, .. } => path,
        }
    }
}

/// The result could not be persisted. The run itself still succeeds.
#[derive(Debug, thiserror::Error)]
pub enum CacheWriteError {
    #[error("cannot write cache file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot encode cache file {}: {source}", .path.display())]
    Encode { path: PathBuf, source: TableError },
}

impl CacheWriteError {
    pub fn io<P: AsRef<Path>>(path: P, source: std::io::Error) -> Self {
        CacheWriteError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn encode<P: AsRef<Path>>(path: P, source: TableError) -> Self {
        CacheWriteError::Encode {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            CacheWriteError::Io { path, .. } | CacheWriteError::Encode { path, .. } => path,
        }
    }
}

/// Rows that do not fit the `type,id,bnf_code,name` shape
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("missing column {0}")]
    MissingColumn(String),

    #[error("column {0} is not text")]
    NotText(String),

    #[error("row {row}: unknown product type {value:?}")]
    UnknownProductType { row: usize, value: String },

    #[error("row {row}: expected {expected} cells, found {found}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("expected {expected} columns, found {found}")]
    ColumnCount { expected: usize, found: usize },

    #[error("arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

/// A codelist definition that cannot be turned into a query
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("codelist name {0:?} must be non-empty and use only letters, digits, '_' or '-'")]
    InvalidName(String),

    #[error("codelist {0} has no include filter and would select every product")]
    NoIncludeFilter(String),

    #[error("codelist {name}: invalid pattern {pattern:?}: {reason}")]
    InvalidPattern {
        name: String,
        pattern: String,
        reason: &'static str,
    },

    #[error("codelist {name}: comment {comment:?} must be a single line")]
    InvalidComment { name: String, comment: String },

    #[error("source table {0:?} may only use letters, digits, '_', '-' and '.'")]
    InvalidTableName(String),
}
