use crate::bigquery::WarehouseConfig;
use crate::query::{CodelistDefinition, SourceTables};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Definitions shipped with the crate
const BUILTIN_CONFIG: &str = include_str!("../codelists.yaml");

/// Codelists, where they are cached, and how to reach the warehouse
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CodelistConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default)]
    pub sources: SourceTables,
    pub warehouse: WarehouseConfig,
    pub codelists: Vec<CodelistDefinition>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("data")
}

impl CodelistConfig {
    pub fn find(&self, name: &str) -> Option<&CodelistDefinition> {
        self.codelists.iter().find(|c| c.name == name)
    }

    /// Look up several definitions, failing on the first unknown name.
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<&CodelistDefinition>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.find(name).with_context(|| {
                    format!(
                        "Unknown codelist {name}; known codelists: {}",
                        self.names().join(", ")
                    )
                })
            })
            .collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.codelists.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn cache_path(&self, definition: &CodelistDefinition) -> PathBuf {
        self.cache_dir.join(definition.cache_file_name())
    }
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CodelistConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    parse_config(&content)
        .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))
}

/// The definitions embedded in the crate
pub fn builtin_config() -> Result<CodelistConfig> {
    parse_config(BUILTIN_CONFIG).context("Built-in codelist definitions are invalid")
}

/// Text of the embedded definitions, used as the example config
pub fn example_config() -> &'static str {
    BUILTIN_CONFIG
}

pub fn parse_config(content: &str) -> Result<CodelistConfig> {
    let config: CodelistConfig =
        serde_yaml_ng::from_str(content).with_context(|| "Failed to parse YAML configuration")?;

    validate_config(&config)?;
    Ok(config)
}

/// Write the example configuration to `path`. Refuses to overwrite.
pub fn create_example_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, BUILTIN_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub(crate) fn validate_config(config: &CodelistConfig) -> Result<()> {
    if config.warehouse.project.trim().is_empty() {
        anyhow::bail!("warehouse.project cannot be empty");
    }

    if config.warehouse.poll_timeout_ms == 0 {
        anyhow::bail!("warehouse.poll_timeout_ms must be greater than 0");
    }

    if config.warehouse.page_size == Some(0) {
        anyhow::bail!("warehouse.page_size must be greater than 0");
    }

    config.sources.validate()?;

    if config.codelists.is_empty() {
        anyhow::bail!("At least one codelist must be configured");
    }

    let mut seen = BTreeSet::new();
    for definition in &config.codelists {
        definition.validate()?;
        if !seen.insert(definition.name.as_str()) {
            anyhow::bail!("Codelist {} is defined more than once", definition.name);
        }
    }

    Ok(())
}
