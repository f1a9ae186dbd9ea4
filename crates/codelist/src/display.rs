use crate::cache::encode_csv;
use crate::error::TableError;
use crate::model::ResultTable;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How a table is shown to the user
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Boxed text table with every row and the full width of every cell
    #[default]
    Table,
    /// The cache file format
    Csv,
    /// Nothing
    None,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "none" => Ok(OutputFormat::None),
            other => Err(format!("unknown format {other:?}, expected table, csv or none")),
        }
    }
}

/// Render `table`. Nothing is truncated.
pub fn render(table: &ResultTable, format: OutputFormat) -> Result<String, TableError> {
    match format {
        OutputFormat::Table => {
            let batch = table.to_record_batch()?;
            let pretty = arrow_cast::pretty::pretty_format_batches(&[batch])?;
            Ok(format!("{pretty}\n"))
        }
        OutputFormat::Csv => {
            let mut buffer = Vec::new();
            encode_csv(table, &mut buffer)?;
            Ok(String::from_utf8_lossy(&buffer).into_owned())
        }
        OutputFormat::None => Ok(String::new()),
    }
}
