use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::graph_edges::GraphMetrics;
use crate::graph_lanes::LayoutOptions;
use crate::lane_color::default_palette;

const CONFIG_DIR_NAME: &str = ".commit-graph";
const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_MAX_COMMITS: usize = 200;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub max_commits: usize,
    pub lane_width: f32,
    pub row_height: f32,
    pub palette: Vec<String>,
}

impl Default for GraphConfig {
    fn default() -> Self {
        let metrics = GraphMetrics::default();
        Self {
            max_commits: DEFAULT_MAX_COMMITS,
            lane_width: metrics.lane_width,
            row_height: metrics.row_height,
            palette: default_palette(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    pub use_difftool: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub graph: GraphConfig,
    pub diff: DiffConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            graph: GraphConfig::default(),
            diff: DiffConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn layout_options(&self) -> LayoutOptions {
        let defaults = GraphMetrics::default();
        let positive_or = |value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                fallback
            }
        };
        let palette = if self.graph.palette.is_empty() {
            default_palette()
        } else {
            self.graph.palette.clone()
        };

        LayoutOptions {
            palette,
            metrics: GraphMetrics {
                lane_width: positive_or(self.graph.lane_width, defaults.lane_width),
                row_height: positive_or(self.graph.row_height, defaults.row_height),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new() -> Result<Self> {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow!("failed to resolve home directory"))?;
        let path = home_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        Ok(Self { path })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_create_default(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read config file at {}", self.path.display()))?;
        toml::from_str::<AppConfig>(&raw).with_context(|| {
            format!(
                "failed to parse TOML config file at {}",
                self.path.display()
            )
        })
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("config path has no parent: {}", self.path.display()))?;

        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;

        let contents =
            toml::to_string_pretty(config).context("failed to serialize app config to TOML")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write config file at {}", self.path.display()))?;
        Ok(())
    }
}
