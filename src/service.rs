use anyhow::{Result, anyhow};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::file_tree::ChangedFile;

/// Response to a changed-files request, as carried over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangedFilesResponse {
    Files { files: Vec<ChangedFile> },
    Error { error: String },
}

impl ChangedFilesResponse {
    pub fn into_result(self) -> Result<Vec<ChangedFile>> {
        match self {
            Self::Files { files } => Ok(files),
            Self::Error { error } => Err(anyhow!(error)),
        }
    }
}

impl From<Result<Vec<ChangedFile>>> for ChangedFilesResponse {
    fn from(result: Result<Vec<ChangedFile>>) -> Self {
        match result {
            Ok(files) => Self::Files { files },
            Err(err) => Self::Error {
                error: format!("{err:#}"),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenFileDiffRequest {
    pub file_path: String,
    pub commit_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MergeSource {
    Branch(String),
    Commit(String),
}

impl MergeSource {
    pub fn revision(&self) -> &str {
        match self {
            Self::Branch(name) => name,
            Self::Commit(hash) => hash,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContextActionRequest {
    #[serde(rename_all = "camelCase")]
    CreateBranch {
        commit_hash: String,
        branch_name: String,
    },
    #[serde(rename_all = "camelCase")]
    MergeIntoCurrent {
        commit_hash: String,
        source: MergeSource,
    },
}

impl ContextActionRequest {
    pub fn commit_hash(&self) -> &str {
        match self {
            Self::CreateBranch { commit_hash, .. } | Self::MergeIntoCurrent { commit_hash, .. } => {
                commit_hash
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateBranch { .. } => "create branch",
            Self::MergeIntoCurrent { .. } => "merge into current branch",
        }
    }
}

/// The version-control engine as seen from the graph view: an asynchronous
/// request/response channel keyed by commit hash. Implementations own the
/// transport.
pub trait CommandService {
    fn changed_files(&self, commit_hash: &str) -> BoxFuture<'static, Result<Vec<ChangedFile>>>;

    /// Fire-and-forget; the diff viewer consumes the request.
    fn open_file_diff(&self, request: OpenFileDiffRequest) -> BoxFuture<'static, Result<()>>;

    fn run_context_action(&self, request: ContextActionRequest) -> BoxFuture<'static, Result<()>>;
}
