use crate::cache;
use crate::error::{CacheWriteError, QueryExecutionError, Result};
use crate::model::ResultTable;
use crate::query::Query;
use diagnostics::*;
use std::path::Path;

/// Something that can execute SQL and hand back codelist rows.
///
/// Implementations own connection and authentication details. Failures
/// are reported once; callers do not retry.
pub trait Warehouse {
    fn execute(&self, query: &Query) -> std::result::Result<ResultTable, QueryExecutionError>;
}

impl<W: Warehouse + ?Sized> Warehouse for &W {
    fn execute(&self, query: &Query) -> std::result::Result<ResultTable, QueryExecutionError> {
        (**self).execute(query)
    }
}

impl<W: Warehouse + ?Sized> Warehouse for Box<W> {
    fn execute(&self, query: &Query) -> std::result::Result<ResultTable, QueryExecutionError> {
        (**self).execute(query)
    }
}

/// Where a run's rows came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Cache,
    Warehouse,
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultSource::Cache => write!(f, "cache"),
            ResultSource::Warehouse => write!(f, "warehouse"),
        }
    }
}

/// Result of a successful run
#[derive(Debug)]
pub struct RunOutcome {
    pub table: ResultTable,
    pub source: ResultSource,
    /// Set when fresh rows could not be cached. The rows are still valid.
    pub cache_error: Option<CacheWriteError>,
}

/// Read-through cache in front of a [`Warehouse`].
///
/// The cache is keyed by path alone. An existing file is returned as is,
/// even if a different query produced it; deleting the file is the only
/// way to force the query to run again.
pub struct CachedQueryRunner<W> {
    warehouse: W,
}

impl<W: Warehouse> CachedQueryRunner<W> {
    pub fn new(warehouse: W) -> Self {
        Self { warehouse }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }

    pub fn into_inner(self) -> W {
        self.warehouse
    }

    /// Return the rows for `query`, from `cache_path` if it exists.
    ///
    /// On a miss the query runs and the rows are written to `cache_path`.
    /// A write failure is reported in [`RunOutcome::cache_error`], not as
    /// an error. A query failure leaves no cache file.
    pub fn run(&self, query: &Query, cache_path: &Path) -> Result<RunOutcome> {
        let file = cache_path.display().to_string();

        if cache::cache_exists(cache_path)? {
            let table = cache::read_cache(cache_path)?;
            let rows = table.len();
            info!("Cache hit for {file} ({rows} rows)");
            return Ok(RunOutcome {
                table,
                source: ResultSource::Cache,
                cache_error: None,
            });
        }

        info!("Cache miss for {file}, running query");
        debug!("SQL: {sql}", sql: query.as_str());

        let table = match self.warehouse.execute(query) {
            Ok(table) => table,
            Err(e) => {
                let reason = e.to_string();
                error!("Query for {file} failed: {reason}");
                return Err(e.into());
            }
        };

        let cache_error = match cache::write_cache(cache_path, &table) {
            Ok(()) => None,
            Err(e) => {
                let reason = e.to_string();
                warn!("Result not cached: {reason}");
                Some(e)
            }
        };

        let rows = table.len();
        info!("Query for {file} returned {rows} rows");

        Ok(RunOutcome {
            table,
            source: ResultSource::Warehouse,
            cache_error,
        })
    }
}
