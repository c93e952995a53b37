use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const DEFAULT_SEPARATOR: &str = "_";
pub const DEFAULT_PROBE_WORKERS: usize = 100;
pub const DEFAULT_PROBE_TOOL: &str = "ffprobe";

/// Override value that clears the base name when another segment is composed onto it.
pub const EMPTY_OVERRIDE: &str = "<empty>";

/// Where a composed segment goes relative to the current base name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Prefix,
    Suffix,
}

/// Immutable configuration for one rename run.
#[derive(Debug, Clone)]
pub struct RenameOptions {
    pub path: PathBuf,
    pub prefix: String,
    pub suffix: String,
    pub override_name: String,
    pub separator: String,
    pub include: String,
    pub exclude: String,
    pub replace: String,
    pub created_date: String,
    pub detect_resolution: Option<Placement>,
    pub aspect_ratio: bool,
    pub allow_dir: bool,
    pub unique_suffix: bool,
    pub dry_run: bool,
    pub yes: bool,
    pub probe_workers: usize,
}

impl Default for RenameOptions {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            prefix: String::new(),
            suffix: String::new(),
            override_name: String::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            include: String::new(),
            exclude: String::new(),
            replace: String::new(),
            created_date: String::new(),
            detect_resolution: None,
            aspect_ratio: false,
            allow_dir: false,
            unique_suffix: false,
            dry_run: false,
            yes: false,
            probe_workers: DEFAULT_PROBE_WORKERS,
        }
    }
}

impl RenameOptions {
    /// Starts from the persisted user defaults.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            separator: config.separator.clone(),
            aspect_ratio: config.aspect_ratio,
            probe_workers: config.probe_workers.max(1),
            ..Self::default()
        }
    }

    /// True when the override sentinel should wipe the base name.
    pub fn clears_base_name(&self) -> bool {
        self.override_name == EMPTY_OVERRIDE
            && (!self.prefix.is_empty() || !self.suffix.is_empty() || self.unique_suffix)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub separator: String,
    pub probe_workers: usize,
    pub probe_tool: String,
    pub aspect_ratio: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.to_string(),
            probe_workers: DEFAULT_PROBE_WORKERS,
            probe_tool: DEFAULT_PROBE_TOOL.to_string(),
            aspect_ratio: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "batch-renamer", "batch-renamer")
        .context("could not resolve the OS config directory")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    let paths = app_paths()?;
    if !paths.config_path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(&paths.config_path).with_context(|| {
        format!(
            "failed to read config file: {}",
            paths.config_path.display()
        )
    })?;

    parse_config(&raw)
}

pub fn save_config(config: &AppConfig) -> Result<PathBuf> {
    let paths = app_paths()?;
    fs::create_dir_all(&paths.config_dir).with_context(|| {
        format!(
            "failed to create config directory: {}",
            paths.config_dir.display()
        )
    })?;
    let body = toml::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(&paths.config_path, body).with_context(|| {
        format!(
            "failed to write config file: {}",
            paths.config_path.display()
        )
    })?;
    Ok(paths.config_path)
}

fn parse_config(raw: &str) -> Result<AppConfig> {
    toml::from_str::<AppConfig>(raw).context("failed to parse config file")
}
