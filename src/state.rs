use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::warn;

const APP_DATA_DIR_NAME: &str = "commit-graph";
const STATE_FILE_NAME: &str = "state.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    pub last_repo_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppStateStore {
    path: PathBuf,
}

impl AppStateStore {
    pub fn new() -> Result<Self> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(dirs::home_dir)
            .ok_or_else(|| anyhow!("failed to resolve app data directory"))?;
        Ok(Self {
            path: base_dir.join(APP_DATA_DIR_NAME).join(STATE_FILE_NAME),
        })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_default(&self) -> Result<AppState> {
        if !self.path.exists() {
            return Ok(AppState::default());
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read state file at {}", self.path.display()))?;
        toml::from_str::<AppState>(&raw)
            .with_context(|| format!("failed to parse TOML state file at {}", self.path.display()))
    }

    /// Records `repo_path` as the most recently opened repository.
    pub fn remember_repo(&self, repo_path: &Path) -> Result<()> {
        let mut state = self.load_or_default().unwrap_or_else(|err| {
            warn!("replacing unreadable app state: {err:#}");
            AppState::default()
        });
        if state.last_repo_path.as_deref() == Some(repo_path) {
            return Ok(());
        }
        state.last_repo_path = Some(repo_path.to_path_buf());
        self.save(&state)
    }

    pub fn save(&self, state: &AppState) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("state path has no parent: {}", self.path.display()))?;

        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create state directory {}", parent.display()))?;

        let contents =
            toml::to_string_pretty(state).context("failed to serialize app state to TOML")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write state file at {}", self.path.display()))?;
        Ok(())
    }
}
