//! Run configuration loaded from TOML.
//!
//! The file is optional. When no path is given on the command line the
//! per-user location (`<config dir>/bomgraph/config.toml`) is tried, and a
//! missing file there means "all defaults". Command-line flags are applied on
//! top by the binary.

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use bomgraph_engine::engine::{CleanerOptions, ExtractorOptions, FileAlias, ResolverOptions};

use crate::error::{BomError, Result};

pub const DEFAULT_BASE_MATERIAL_FILE: &str = "calculatie cat 2022 .xlsx";
pub const DEFAULT_WORKBOOK_CACHE: usize = 20;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Folder walked for workbooks.
    pub base_path: Option<PathBuf>,
    /// Control spreadsheet with the products to resolve.
    pub batch_file: Option<PathBuf>,
    /// Where the resolved trees are written.
    pub output: Option<PathBuf>,
    /// Product id to canonical cell id table.
    pub mapping: Option<PathBuf>,
    /// Debug log file, truncated on every run.
    pub log_file: Option<PathBuf>,
    pub resolver: ResolverOptions,
    pub workbooks: WorkbookOptions,
    pub cleaner: CleanerOptions,
    pub extractor: ExtractorOptions,
    pub aliases: Vec<FileAlias>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_path: None,
            batch_file: None,
            output: None,
            mapping: None,
            log_file: None,
            resolver: ResolverOptions::default(),
            workbooks: WorkbookOptions::default(),
            cleaner: CleanerOptions::default(),
            extractor: ExtractorOptions::default(),
            aliases: default_aliases(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkbookOptions {
    /// Open workbooks kept in memory.
    pub cache_capacity: usize,
    pub base_material_file: String,
}

impl Default for WorkbookOptions {
    fn default() -> Self {
        WorkbookOptions {
            cache_capacity: DEFAULT_WORKBOOK_CACHE,
            base_material_file: DEFAULT_BASE_MATERIAL_FILE.to_string(),
        }
    }
}

/// Renames known in the corpus.
pub fn default_aliases() -> Vec<FileAlias> {
    vec![FileAlias {
        from: "Berekening Ladenkasten 794.xlsx".to_string(),
        file: "2022 - P1 Berekening  Ladenkasten 794-KLEUR.xlsx".to_string(),
        sheet: Some("OVERZICHT COP".to_string()),
    }]
}

pub fn user_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "bomgraph")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

impl Config {
    /// Load `explicit` if given (it must exist), else the per-user file if
    /// present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(BomError::ConfigNotFound(path.to_path_buf()));
                }
                Config::from_file(path)
            }
            None => match user_config_path() {
                Some(path) if path.exists() => Config::from_file(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Config> {
        let content = std::fs::read_to_string(path)?;
        let config = Config::from_toml(&content).map_err(|source| BomError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> std::result::Result<Config, toml::de::Error> {
        toml::from_str(content)
    }
}
