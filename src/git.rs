use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

use anyhow::{Context as _, Result, anyhow, bail};
use futures::FutureExt as _;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use git2::{BranchType, Delta, Oid, Repository, Sort};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, info};

use crate::file_tree::{ChangedFile, FileStatus};
use crate::graph::{CommitDate, GraphPayload, HeadsMap, PayloadNode};
use crate::service::{CommandService, ContextActionRequest, OpenFileDiffRequest};

const DETACHED_BRANCH_NAME: &str = "detached";
const DETACHED_HEAD_REF: &str = "HEAD";

/// Command service backed by a local git repository. Reads go through libgit2;
/// merges and diff viewing shell out to the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCommandService {
    repo_root: PathBuf,
    use_difftool: bool,
}

impl GitCommandService {
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).context("failed to discover git repository")?;
        let repo_root = repo_root(&repo)?;
        Ok(Self {
            repo_root,
            use_difftool: false,
        })
    }

    pub fn with_difftool(mut self, use_difftool: bool) -> Self {
        self.use_difftool = use_difftool;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn load_graph_payload(&self, max_commits: usize) -> Result<GraphPayload> {
        load_graph_payload(&self.repo_root, max_commits)
    }
}

impl CommandService for GitCommandService {
    fn changed_files(&self, commit_hash: &str) -> BoxFuture<'static, Result<Vec<ChangedFile>>> {
        let repo_root = self.repo_root.clone();
        let commit_hash = commit_hash.to_string();
        run_in_background(move || load_changed_files(&repo_root, &commit_hash))
    }

    fn open_file_diff(&self, request: OpenFileDiffRequest) -> BoxFuture<'static, Result<()>> {
        let repo_root = self.repo_root.clone();
        let use_difftool = self.use_difftool;
        run_in_background(move || open_file_diff(&repo_root, &request, use_difftool))
    }

    fn run_context_action(&self, request: ContextActionRequest) -> BoxFuture<'static, Result<()>> {
        let repo_root = self.repo_root.clone();
        run_in_background(move || run_context_action(&repo_root, &request))
    }
}

fn run_in_background<T, F>(job: F) -> BoxFuture<'static, Result<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    thread::spawn(move || {
        let _ = sender.send(job());
    });
    async move {
        match receiver.await {
            Ok(result) => result,
            Err(_) => Err(anyhow!("git worker exited before responding")),
        }
    }
    .boxed()
}

/// Walks every local branch (and a detached HEAD) newest first and emits the
/// graph load payload. The current branch is enumerated first so it owns lane 0.
pub fn load_graph_payload(repo_root: &Path, max_commits: usize) -> Result<GraphPayload> {
    let repo = Repository::open(repo_root)
        .or_else(|_| Repository::discover(repo_root))
        .context("failed to open git repository")?;

    let current_branch = current_branch_name(&repo);
    let mut tips = local_branch_tips(&repo)?;
    tips.sort_by(|left, right| {
        (left.0 != current_branch)
            .cmp(&(right.0 != current_branch))
            .then_with(|| left.0.cmp(&right.0))
    });
    if current_branch == DETACHED_BRANCH_NAME
        && let Some(head) = repo.head().ok().and_then(|head| head.target())
    {
        tips.insert(0, (DETACHED_HEAD_REF.to_string(), head));
    }

    let mut heads = HeadsMap::new();
    let mut refs_by_commit = BTreeMap::<Oid, Vec<String>>::new();
    for (name, oid) in &tips {
        heads.insert(name.clone(), oid.to_string());
        if name != DETACHED_HEAD_REF {
            refs_by_commit.entry(*oid).or_default().push(name.clone());
        }
    }

    let mut nodes = Vec::new();
    if !tips.is_empty() {
        let mut walk = repo.revwalk().context("failed to start revision walk")?;
        walk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)
            .context("failed to configure revision walk")?;
        for (_, oid) in &tips {
            walk.push(*oid)
                .with_context(|| format!("failed to walk from {oid}"))?;
        }

        for oid in walk.take(max_commits.max(1)) {
            let oid = oid.context("failed to read revision walk entry")?;
            let commit = repo
                .find_commit(oid)
                .with_context(|| format!("failed to load commit {oid}"))?;
            let parents = commit
                .parent_ids()
                .map(|parent| parent.to_string())
                .collect::<Vec<_>>();
            nodes.push(PayloadNode {
                hash: oid.to_string(),
                other_parent: parents.get(1).cloned(),
                parents,
                author: commit.author().name().unwrap_or_default().to_string(),
                date: commit_date(commit.time().seconds()),
                message: commit.message().unwrap_or_default().trim_end().to_string(),
                refs: refs_by_commit.get(&oid).cloned().unwrap_or_default(),
            });
        }
    }

    info!(
        repo = %repo_root.display(),
        commits = nodes.len(),
        branches = heads.len(),
        "loaded graph payload"
    );

    Ok(GraphPayload {
        nodes,
        heads,
        current_branch,
    })
}

/// Files touched by `commit_hash` relative to its primary parent, in diff order.
pub fn load_changed_files(repo_root: &Path, commit_hash: &str) -> Result<Vec<ChangedFile>> {
    let repo = Repository::open(repo_root).context("failed to open git repository")?;
    let oid = Oid::from_str(commit_hash)
        .with_context(|| format!("invalid commit hash '{commit_hash}'"))?;
    let commit = repo
        .find_commit(oid)
        .with_context(|| format!("failed to load commit {commit_hash}"))?;
    let tree = commit.tree().context("failed to read commit tree")?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree().context("failed to read parent tree")?),
        Err(_) => None,
    };

    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
        .with_context(|| format!("failed to diff commit {commit_hash}"))?;

    let files = diff
        .deltas()
        .filter_map(|delta| {
            let path = delta.new_file().path().or_else(|| delta.old_file().path())?;
            Some(ChangedFile::new(
                normalize_path(&path.to_string_lossy()),
                map_delta(delta.status()),
            ))
        })
        .filter(|file| !file.path.is_empty())
        .collect::<Vec<_>>();

    debug!(commit = commit_hash, files = files.len(), "loaded changed files");
    Ok(files)
}

fn open_file_diff(
    repo_root: &Path,
    request: &OpenFileDiffRequest,
    use_difftool: bool,
) -> Result<()> {
    let range = format!("{}^!", request.commit_hash);
    let args: Vec<&str> = if use_difftool {
        vec!["difftool", "-y", range.as_str(), "--", request.file_path.as_str()]
    } else {
        vec![
            "--no-pager",
            "show",
            "--format=",
            request.commit_hash.as_str(),
            "--",
            request.file_path.as_str(),
        ]
    };

    let status = Command::new("git")
        .current_dir(repo_root)
        .args(&args)
        .status()
        .context("failed to launch git diff viewer")?;
    if !status.success() {
        bail!(
            "diff viewer for {} at {} exited with {status}",
            request.file_path,
            request.commit_hash
        );
    }
    Ok(())
}

fn run_context_action(repo_root: &Path, request: &ContextActionRequest) -> Result<()> {
    match request {
        ContextActionRequest::CreateBranch {
            commit_hash,
            branch_name,
        } => create_branch_at(repo_root, branch_name, commit_hash),
        ContextActionRequest::MergeIntoCurrent { source, .. } => {
            run_git(repo_root, &["merge", "--no-edit", source.revision()])?;
            info!(source = source.revision(), "merged into current branch");
            Ok(())
        }
    }
}

pub fn create_branch_at(repo_root: &Path, branch_name: &str, commit_hash: &str) -> Result<()> {
    if !is_valid_branch_name(branch_name) {
        bail!("'{branch_name}' is not a valid branch name");
    }
    let repo = Repository::open(repo_root).context("failed to open git repository")?;
    let oid = Oid::from_str(commit_hash)
        .with_context(|| format!("invalid commit hash '{commit_hash}'"))?;
    let commit = repo
        .find_commit(oid)
        .with_context(|| format!("failed to load commit {commit_hash}"))?;
    repo.branch(branch_name, &commit, false)
        .with_context(|| format!("failed to create branch {branch_name}"))?;
    info!(branch = branch_name, commit = commit_hash, "created branch");
    Ok(())
}

fn run_git(repo_root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(repo_root)
        .args(args)
        .output()
        .with_context(|| format!("failed to run git {}", args.join(" ")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        bail!("git {} failed: {detail}", args.join(" "));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn repo_root(repo: &Repository) -> Result<PathBuf> {
    if let Some(workdir) = repo.workdir() {
        return Ok(workdir.to_path_buf());
    }

    repo.path()
        .parent()
        .map(|path| path.to_path_buf())
        .context("failed to resolve repository root")
}

fn current_branch_name(repo: &Repository) -> String {
    match repo.head() {
        Ok(head) if head.is_branch() => head
            .shorthand()
            .map(str::to_string)
            .unwrap_or_else(|| DETACHED_BRANCH_NAME.to_string()),
        Ok(_) => DETACHED_BRANCH_NAME.to_string(),
        // Unborn HEAD: report the branch HEAD points at.
        Err(_) => repo
            .find_reference(DETACHED_HEAD_REF)
            .ok()
            .and_then(|head| head.symbolic_target().map(str::to_string))
            .and_then(|target| target.strip_prefix("refs/heads/").map(str::to_string))
            .unwrap_or_else(|| DETACHED_BRANCH_NAME.to_string()),
    }
}

fn local_branch_tips(repo: &Repository) -> Result<Vec<(String, Oid)>> {
    let branches = repo
        .branches(Some(BranchType::Local))
        .context("failed to list local branches")?;
    let mut tips = Vec::new();
    for branch in branches {
        let (branch, _) = branch.context("failed to read local branch")?;
        let Some(name) = branch.name().ok().flatten().map(str::to_string) else {
            continue;
        };
        let Some(target) = branch.get().target() else {
            continue;
        };
        tips.push((name, target));
    }
    Ok(tips)
}

fn commit_date(seconds: i64) -> CommitDate {
    OffsetDateTime::from_unix_timestamp(seconds)
        .ok()
        .and_then(|date| date.format(&Rfc3339).ok())
        .map(CommitDate::Text)
        .unwrap_or(CommitDate::Unix(seconds))
}

fn map_delta(delta: Delta) -> FileStatus {
    match delta {
        Delta::Added | Delta::Copied | Delta::Untracked => FileStatus::Added,
        Delta::Deleted => FileStatus::Deleted,
        Delta::Modified | Delta::Renamed | Delta::Typechange => FileStatus::Modified,
        _ => FileStatus::Unknown,
    }
}

fn normalize_path(path: &str) -> String {
    path.trim().replace('\\', "/").trim_end_matches('/').to_string()
}

/// Turns free text into a branch name git accepts.
pub fn sanitize_branch_name(input: &str) -> String {
    let mapped = input
        .trim()
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            'a'..='z' | '0'..='9' | '/' | '.' | '_' | '-' => ch,
            _ => '-',
        })
        .collect::<String>();

    let segments = mapped
        .split('/')
        .map(|segment| {
            let mut clean = segment.to_string();
            while clean.contains("--") {
                clean = clean.replace("--", "-");
            }
            while clean.contains("..") {
                clean = clean.replace("..", ".");
            }
            let mut clean = clean.trim_matches(|c: char| c == '-' || c == '.').to_string();
            while let Some(stripped) = clean.strip_suffix(".lock") {
                clean = stripped.trim_end_matches(['.', '-']).to_string();
            }
            clean
        })
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>();

    let candidate = match segments.join("/") {
        joined if joined.is_empty() => "branch".to_string(),
        joined if joined.eq_ignore_ascii_case("head") => "head-branch".to_string(),
        joined => joined,
    };

    if is_valid_branch_name(&candidate) {
        candidate
    } else {
        "branch-new".to_string()
    }
}

pub fn is_valid_branch_name(name: &str) -> bool {
    if name.trim().is_empty() || name.eq_ignore_ascii_case(DETACHED_HEAD_REF) {
        return false;
    }

    if name.contains("//") || name.contains("..") || name.contains("@{") || name.ends_with(".lock")
    {
        return false;
    }

    if name.chars().any(|ch| {
        ch.is_ascii_control()
            || ch.is_whitespace()
            || matches!(ch, '~' | '^' | ':' | '?' | '*' | '[' | '\\')
    }) {
        return false;
    }

    name.split('/').all(|segment| {
        !segment.is_empty()
            && !segment.starts_with('.')
            && !segment.ends_with('.')
            && segment != "@"
    })
}
