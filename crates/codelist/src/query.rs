//! Codelist definitions and the SQL they produce.
//!
//! A definition is a list of LIKE patterns against `bnf_code` and
//! `form_route`. Patterns for the same column in `include` mode are ORed
//! together; every `exclude` pattern is its own `NOT LIKE` condition; the
//! resulting conditions are ANDed. The matching BNF codes then select
//! rows from both the VMP and AMP tables.

use crate::error::DefinitionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQL text ready to send to the warehouse.
///
/// Immutable once built. The cache never compares it against cached
/// content; the cache path alone identifies a result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Query {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

/// Column of the form/route reference table a filter applies to
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FilterColumn {
    BnfCode,
    FormRoute,
}

impl FilterColumn {
    /// Order in which column conditions appear in the generated SQL
    pub const ALL: [FilterColumn; 2] = [FilterColumn::BnfCode, FilterColumn::FormRoute];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterColumn::BnfCode => "bnf_code",
            FilterColumn::FormRoute => "form_route",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Include,
    Exclude,
}

/// One `LIKE` predicate with an optional explanation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub column: FilterColumn,
    pub mode: FilterMode,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Filter {
    pub fn include(column: FilterColumn, pattern: impl Into<String>) -> Self {
        Self {
            column,
            mode: FilterMode::Include,
            pattern: pattern.into(),
            comment: None,
        }
    }

    pub fn exclude(column: FilterColumn, pattern: impl Into<String>) -> Self {
        Self {
            column,
            mode: FilterMode::Exclude,
            pattern: pattern.into(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    fn predicate(&self) -> String {
        let op = match self.mode {
            FilterMode::Include => "LIKE",
            FilterMode::Exclude => "NOT LIKE",
        };
        let mut line = format!("{} {} '{}'", self.column.as_str(), op, self.pattern);
        if let Some(comment) = &self.comment {
            line.push_str("  -- ");
            line.push_str(comment);
        }
        line
    }
}

/// Tables the generated SQL reads from
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SourceTables {
    /// dm+d objects with their BNF code and form/route
    pub form_route_table: String,
    /// Generic products
    pub vmp_table: String,
    /// Branded products
    pub amp_table: String,
}

impl Default for SourceTables {
    fn default() -> Self {
        Self {
            form_route_table: "measures.dmd_objs_with_form_route".to_string(),
            vmp_table: "dmd.vmp".to_string(),
            amp_table: "dmd.amp".to_string(),
        }
    }
}

impl SourceTables {
    /// Table names are spliced into the SQL, so only plain identifiers
    /// are accepted.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        for table in [&self.form_route_table, &self.vmp_table, &self.amp_table] {
            let ok = !table.is_empty()
                && table
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
            if !ok {
                return Err(DefinitionError::InvalidTableName(table.clone()));
            }
        }
        Ok(())
    }
}

/// A named codelist and the filters that select it
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CodelistDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub filters: Vec<Filter>,
}

impl CodelistDefinition {
    pub fn new(name: impl Into<String>, filters: Vec<Filter>) -> Self {
        Self {
            name: name.into(),
            title: None,
            filters,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Cache file name, e.g. `saba_codelist.csv`
    pub fn cache_file_name(&self) -> String {
        format!("{}_codelist.csv", self.name)
    }

    pub fn validate(&self) -> Result<(), DefinitionError> {
        let name_ok = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !name_ok {
            return Err(DefinitionError::InvalidName(self.name.clone()));
        }

        if !self.filters.iter().any(|f| f.mode == FilterMode::Include) {
            return Err(DefinitionError::NoIncludeFilter(self.name.clone()));
        }

        for filter in &self.filters {
            let reason = if filter.pattern.is_empty() {
                Some("pattern is empty")
            } else if filter.pattern.contains('\'') || filter.pattern.contains('\\') {
                Some("quotes and backslashes are not allowed")
            } else if filter.pattern.contains(['\n', '\r']) {
                Some("pattern must be a single line")
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(DefinitionError::InvalidPattern {
                    name: self.name.clone(),
                    pattern: filter.pattern.clone(),
                    reason,
                });
            }

            if let Some(comment) = &filter.comment {
                if comment.contains(['\n', '\r']) {
                    return Err(DefinitionError::InvalidComment {
                        name: self.name.clone(),
                        comment: comment.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Validate and render the VMP/AMP union query.
    pub fn query(&self, sources: &SourceTables) -> Result<Query, DefinitionError> {
        self.validate()?;
        sources.validate()?;

        let mut sql = String::new();
        sql.push_str("WITH bnf_codes AS (\n");
        sql.push_str(&format!(
            "  SELECT DISTINCT bnf_code FROM {} WHERE\n",
            sources.form_route_table
        ));
        for line in self.where_lines() {
            sql.push_str(&line);
            sql.push('\n');
        }
        sql.push_str(")\n\n");

        sql.push_str(&format!(
            "SELECT \"vmp\" AS type, id, bnf_code, nm AS name\n\
             FROM {}\n\
             WHERE bnf_code IN (SELECT * FROM bnf_codes)\n\n\
             UNION ALL\n\n\
             SELECT \"amp\" AS type, id, bnf_code, descr AS name\n\
             FROM {}\n\
             WHERE bnf_code IN (SELECT * FROM bnf_codes)\n\n\
             ORDER BY type, name, bnf_code, id",
            sources.vmp_table, sources.amp_table
        ));

        Ok(Query::new(sql))
    }

    fn where_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        let mut first = true;
        let mut lead = |lines: &mut Vec<String>, rest: &str| {
            let prefix = if first { "    " } else { "    AND " };
            first = false;
            lines.push(format!("{prefix}{rest}"));
        };

        for column in FilterColumn::ALL {
            let includes: Vec<&Filter> = self
                .filters
                .iter()
                .filter(|f| f.column == column && f.mode == FilterMode::Include)
                .collect();

            match includes.as_slice() {
                [] => {}
                [only] => lead(&mut lines, &only.predicate()),
                many => {
                    lead(&mut lines, "(");
                    for (i, filter) in many.iter().enumerate() {
                        let or = if i == 0 { "" } else { "OR " };
                        lines.push(format!("      {or}{}", filter.predicate()));
                    }
                    lines.push("    )".to_string());
                }
            }

            for filter in self
                .filters
                .iter()
                .filter(|f| f.column == column && f.mode == FilterMode::Exclude)
            {
                lead(&mut lines, &filter.predicate());
            }
        }

        lines
    }
}
