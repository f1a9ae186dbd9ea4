//! Medication codelists from the NHS Dictionary of Medicines and Devices.
//!
//! A codelist definition becomes SQL ([`query`]), the SQL runs through a
//! [`CachedQueryRunner`] that consults a CSV file before the warehouse
//! ([`cache`], [`bigquery`]), and the rows are rendered as a table
//! ([`display`]).

pub mod bigquery;
pub mod cache;
pub mod config;
pub mod display;
pub mod error;
pub mod model;
pub mod query;
pub mod runner;

// Re-export key types for use in tests and external applications
pub use crate::bigquery::{BigQueryClient, WarehouseConfig};
pub use crate::config::{CodelistConfig, builtin_config, create_example_config, load_config};
pub use crate::display::{OutputFormat, render};
pub use crate::error::{
    CacheReadError, CacheWriteError, DefinitionError, Error, QueryExecutionError, Result,
    TableError,
};
pub use crate::model::{CodelistRow, ProductType, ResultTable};
pub use crate::query::{CodelistDefinition, Filter, FilterColumn, FilterMode, Query, SourceTables};
pub use crate::runner::{CachedQueryRunner, ResultSource, RunOutcome, Warehouse};
