use anyhow::{Result, anyhow};
use tracing::{debug, info};

use crate::detail_panel::{
    DetailPanelController, DetailPanelState, FetchOutcome, FetchTicket, ToggleOutcome,
};
use crate::file_tree::ChangedFile;
use crate::graph::{GraphPayload, HeadsMap};
use crate::graph_lanes::{GraphLayout, LayoutOptions, build_graph_layout};
use crate::service::{CommandService, ContextActionRequest, MergeSource, OpenFileDiffRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextAction {
    CreateBranch,
    MergeIntoCurrent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    Toggle {
        commit_hash: String,
    },
    OpenFileDiff {
        commit_hash: String,
        file_path: String,
    },
    ContextAction {
        action: ContextAction,
        commit_hash: String,
        /// Name for a new branch; ignored by merges.
        branch_name: Option<String>,
    },
}

/// The single outbound request, if any, an event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    None,
    PanelToggled(ToggleOutcome),
    OpenFileDiff(OpenFileDiffRequest),
    ContextAction(ContextActionRequest),
}

/// Owns one graph load: its layout, its generation number, and its detail panels.
/// Events are handled one at a time.
#[derive(Debug)]
pub struct GraphSession {
    options: LayoutOptions,
    generation: u64,
    layout: GraphLayout,
    panels: DetailPanelController,
}

impl GraphSession {
    pub fn new(options: LayoutOptions) -> Self {
        Self {
            options,
            generation: 0,
            layout: GraphLayout::default(),
            panels: DetailPanelController::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn layout(&self) -> &GraphLayout {
        &self.layout
    }

    pub fn panels(&self) -> &DetailPanelController {
        &self.panels
    }

    pub fn panel(&self, commit_hash: &str) -> Option<&DetailPanelState> {
        self.panels.panel(commit_hash)
    }

    /// Replaces layout and every panel. Fetches issued before this call
    /// resolve as stale.
    pub fn reload(&mut self, payload: GraphPayload) -> &GraphLayout {
        self.generation = self.generation.saturating_add(1);
        self.layout = build_graph_layout(payload, &self.options);
        self.panels = DetailPanelController::new(self.generation);
        info!(
            generation = self.generation,
            commits = self.layout.nodes.len(),
            lanes = self.layout.lane_count,
            "reloaded commit graph"
        );
        &self.layout
    }

    pub fn dispatch(&mut self, event: GraphEvent) -> Result<SessionEffect> {
        match event {
            GraphEvent::Toggle { commit_hash } => {
                if !self.layout.contains(&commit_hash) {
                    debug!(commit = commit_hash.as_str(), "ignoring toggle for unknown commit");
                    return Ok(SessionEffect::None);
                }
                Ok(SessionEffect::PanelToggled(self.panels.toggle(&commit_hash)))
            }
            GraphEvent::OpenFileDiff {
                commit_hash,
                file_path,
            } => Ok(SessionEffect::OpenFileDiff(OpenFileDiffRequest {
                file_path,
                commit_hash,
            })),
            GraphEvent::ContextAction {
                action,
                commit_hash,
                branch_name,
            } => {
                let request = match action {
                    ContextAction::CreateBranch => {
                        let branch_name = branch_name
                            .map(|name| name.trim().to_string())
                            .filter(|name| !name.is_empty())
                            .ok_or_else(|| anyhow!("create branch requires a branch name"))?;
                        ContextActionRequest::CreateBranch {
                            commit_hash,
                            branch_name,
                        }
                    }
                    ContextAction::MergeIntoCurrent => ContextActionRequest::MergeIntoCurrent {
                        source: resolve_merge_source(
                            &self.layout.heads,
                            &self.layout.current_branch,
                            &commit_hash,
                        ),
                        commit_hash,
                    },
                };
                Ok(SessionEffect::ContextAction(request))
            }
        }
    }

    pub fn apply_changed_files(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<ChangedFile>>,
    ) -> FetchOutcome {
        self.panels.complete_fetch(ticket, result)
    }

    /// Toggles a panel and, when it opens without loaded files, awaits exactly
    /// one fetch from `service`.
    pub async fn toggle_and_load<S: CommandService + ?Sized>(
        &mut self,
        service: &S,
        commit_hash: &str,
    ) -> Result<Option<FetchOutcome>> {
        let effect = self.dispatch(GraphEvent::Toggle {
            commit_hash: commit_hash.to_string(),
        })?;
        let SessionEffect::PanelToggled(outcome) = effect else {
            return Ok(None);
        };
        let Some(ticket) = outcome.fetch().cloned() else {
            return Ok(None);
        };

        let result = service.changed_files(&ticket.commit_hash).await;
        Ok(Some(self.apply_changed_files(&ticket, result)))
    }

    /// Runs the request an event produced. Panel toggles are driven through
    /// [`GraphSession::toggle_and_load`] instead.
    pub async fn run_effect<S: CommandService + ?Sized>(
        &self,
        service: &S,
        effect: SessionEffect,
    ) -> Result<()> {
        match effect {
            SessionEffect::None | SessionEffect::PanelToggled(_) => Ok(()),
            SessionEffect::OpenFileDiff(request) => service.open_file_diff(request).await,
            SessionEffect::ContextAction(request) => {
                let label = request.label();
                service
                    .run_context_action(request)
                    .await
                    .map_err(|err| err.context(format!("failed to {label}")))
            }
        }
    }
}

/// A branch tip merges by name, preferring a branch other than the current one;
/// anything else merges as a raw commit.
pub fn resolve_merge_source(
    heads: &HeadsMap,
    current_branch: &str,
    commit_hash: &str,
) -> MergeSource {
    let mut branches = heads.branches_at(commit_hash).collect::<Vec<_>>();
    if branches.len() > 1 {
        branches.retain(|branch| *branch != current_branch);
    }
    match branches.first() {
        Some(branch) => MergeSource::Branch((*branch).to_string()),
        None => MergeSource::Commit(commit_hash.to_string()),
    }
}
