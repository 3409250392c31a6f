use std::collections::BTreeMap;

use anyhow::Result;
use tracing::{debug, warn};

use crate::file_tree::{ChangedFile, FileTreeNode, build_changed_file_tree};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPanelState {
    pub files_loaded: bool,
    pub files: Option<Vec<ChangedFile>>,
    pub tree: Vec<FileTreeNode>,
    pub loading: bool,
    /// Inline, non-fatal fetch error shown in the panel.
    pub error: Option<String>,
}

/// Correlates a changed-files fetch with the graph load and panel that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub commit_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Collapsed {
        commit_hash: String,
    },
    Expanded {
        commit_hash: String,
        /// Present only when files still need loading.
        fetch: Option<FetchTicket>,
    },
}

impl ToggleOutcome {
    pub fn fetch(&self) -> Option<&FetchTicket> {
        match self {
            Self::Expanded { fetch, .. } => fetch.as_ref(),
            Self::Collapsed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Loaded { commit_hash: String },
    Failed { commit_hash: String, error: String },
    Stale,
}

/// Single-open-panel controller. `expanded` is the only source of truth for
/// which panel is open, so at most one can be.
#[derive(Debug, Clone, Default)]
pub struct DetailPanelController {
    generation: u64,
    expanded: Option<String>,
    panels: BTreeMap<String, DetailPanelState>,
}

impl DetailPanelController {
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            expanded: None,
            panels: BTreeMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn expanded_hash(&self) -> Option<&str> {
        self.expanded.as_deref()
    }

    pub fn is_expanded(&self, commit_hash: &str) -> bool {
        self.expanded.as_deref() == Some(commit_hash)
    }

    pub fn panel(&self, commit_hash: &str) -> Option<&DetailPanelState> {
        self.panels.get(commit_hash)
    }

    pub fn toggle(&mut self, commit_hash: &str) -> ToggleOutcome {
        if self.is_expanded(commit_hash) {
            self.expanded = None;
            if let Some(panel) = self.panels.get_mut(commit_hash) {
                panel.loading = false;
            }
            debug!(commit = commit_hash, "collapsed detail panel");
            return ToggleOutcome::Collapsed {
                commit_hash: commit_hash.to_string(),
            };
        }

        if let Some(previous) = self.expanded.take()
            && let Some(panel) = self.panels.get_mut(previous.as_str())
        {
            panel.loading = false;
        }

        self.expanded = Some(commit_hash.to_string());
        let panel = self.panels.entry(commit_hash.to_string()).or_default();
        let fetch = if panel.files_loaded {
            None
        } else {
            panel.loading = true;
            panel.error = None;
            Some(FetchTicket {
                generation: self.generation,
                commit_hash: commit_hash.to_string(),
            })
        };
        debug!(
            commit = commit_hash,
            fetch = fetch.is_some(),
            "expanded detail panel"
        );

        ToggleOutcome::Expanded {
            commit_hash: commit_hash.to_string(),
            fetch,
        }
    }

    /// Applies a fetch result. Results from an older graph load, for a panel
    /// that is no longer the open one, or for files that already loaded are
    /// dropped.
    pub fn complete_fetch(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<ChangedFile>>,
    ) -> FetchOutcome {
        if ticket.generation != self.generation || !self.is_expanded(&ticket.commit_hash) {
            debug!(
                commit = ticket.commit_hash.as_str(),
                generation = ticket.generation,
                "dropping stale changed-files response"
            );
            return FetchOutcome::Stale;
        }
        let Some(panel) = self.panels.get_mut(ticket.commit_hash.as_str()) else {
            return FetchOutcome::Stale;
        };
        if panel.files_loaded {
            return FetchOutcome::Stale;
        }

        panel.loading = false;
        match result {
            Ok(files) => {
                panel.tree = build_changed_file_tree(&files);
                panel.files = Some(files);
                panel.files_loaded = true;
                panel.error = None;
                FetchOutcome::Loaded {
                    commit_hash: ticket.commit_hash.clone(),
                }
            }
            Err(err) => {
                let error = format!("{err:#}");
                warn!(
                    commit = ticket.commit_hash.as_str(),
                    "failed to load changed files: {error}"
                );
                panel.error = Some(error.clone());
                FetchOutcome::Failed {
                    commit_hash: ticket.commit_hash.clone(),
                    error,
                }
            }
        }
    }
}
