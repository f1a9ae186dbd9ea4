use crate::error::TableError;
use arrow::record_batch::RecordBatch;
use arrow_array::{Array, ArrayRef, StringArray};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Column names of every codelist table, in order.
pub const COLUMNS: [&str; 4] = ["type", "id", "bnf_code", "name"];

/// Older caches name the last column after the `dmd.vmp` field.
pub const NAME_ALIAS: &str = "nm";

/// Generic (VMP) or branded (AMP) product record in dm+d
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    /// Virtual Medicinal Product
    Vmp,
    /// Actual Medicinal Product
    Amp,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Vmp => "vmp",
            ProductType::Amp => "amp",
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vmp" => Ok(ProductType::Vmp),
            "amp" => Ok(ProductType::Amp),
            other => Err(other.to_string()),
        }
    }
}

/// One product in a codelist
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CodelistRow {
    #[serde(rename = "type")]
    pub product_type: ProductType,
    pub id: String,
    pub bnf_code: String,
    pub name: String,
}

impl CodelistRow {
    pub fn new(
        product_type: ProductType,
        id: impl Into<String>,
        bnf_code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            product_type,
            id: id.into(),
            bnf_code: bnf_code.into(),
            name: name.into(),
        }
    }
}

/// Ordered query result. Row order is whatever the query's ORDER BY
/// produced and is never changed here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultTable {
    rows: Vec<CodelistRow>,
}

impl ResultTable {
    pub fn new(rows: Vec<CodelistRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[CodelistRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<CodelistRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn count(&self, product_type: ProductType) -> usize {
        self.rows
            .iter()
            .filter(|row| row.product_type == product_type)
            .count()
    }

    /// Arrow schema shared by the cache and the table renderer
    pub fn schema() -> SchemaRef {
        Arc::new(Schema::new(
            COLUMNS
                .iter()
                .map(|name| Field::new(*name, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ))
    }

    pub fn to_record_batch(&self) -> Result<RecordBatch, TableError> {
        let rows = &self.rows;
        let columns = vec![
            text_array(rows.iter().map(|row| row.product_type.as_str())),
            text_array(rows.iter().map(|row| row.id.as_str())),
            text_array(rows.iter().map(|row| row.bnf_code.as_str())),
            text_array(rows.iter().map(|row| row.name.as_str())),
        ];

        Ok(RecordBatch::try_new(Self::schema(), columns)?)
    }

    /// Rebuild a table from batches in the order given.
    ///
    /// Columns are looked up by position and must be text; nulls become
    /// empty strings.
    pub fn from_record_batches(batches: &[RecordBatch]) -> Result<Self, TableError> {
        let mut rows = Vec::new();

        for batch in batches {
            if batch.num_columns() != COLUMNS.len() {
                return Err(TableError::ColumnCount {
                    expected: COLUMNS.len(),
                    found: batch.num_columns(),
                });
            }

            let types = text_column(batch, 0)?;
            let ids = text_column(batch, 1)?;
            let codes = text_column(batch, 2)?;
            let names = text_column(batch, 3)?;

            for i in 0..batch.num_rows() {
                let raw_type = cell(types, i);
                let product_type = raw_type.parse::<ProductType>().map_err(|value| {
                    TableError::UnknownProductType {
                        row: rows.len(),
                        value,
                    }
                })?;
                rows.push(CodelistRow {
                    product_type,
                    id: cell(ids, i).to_string(),
                    bnf_code: cell(codes, i).to_string(),
                    name: cell(names, i).to_string(),
                });
            }
        }

        Ok(Self { rows })
    }
}

impl From<Vec<CodelistRow>> for ResultTable {
    fn from(rows: Vec<CodelistRow>) -> Self {
        Self::new(rows)
    }
}

impl FromIterator<CodelistRow> for ResultTable {
    fn from_iter<I: IntoIterator<Item = CodelistRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn text_array<'a>(values: impl Iterator<Item = &'a str>) -> ArrayRef {
    Arc::new(StringArray::from_iter_values(values))
}

fn text_column(batch: &RecordBatch, index: usize) -> Result<&StringArray, TableError> {
    batch
        .column(index)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| TableError::NotText(COLUMNS[index].to_string()))
}

fn cell(array: &StringArray, i: usize) -> &str {
    if array.is_null(i) { "" } else { array.value(i) }
}
