use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};
use clap::{Parser, Subcommand};
use futures::executor::block_on;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use commit_graph::config::{AppConfig, ConfigStore};
use commit_graph::detail_panel::FetchOutcome;
use commit_graph::file_tree::{FileTreeNodeKind, flatten_file_tree_rows};
use commit_graph::git::{GitCommandService, sanitize_branch_name};
use commit_graph::graph_lanes::{GraphLayout, LayoutNode};
use commit_graph::session::{ContextAction, GraphEvent, GraphSession};
use commit_graph::state::AppStateStore;

const SHORT_HASH_LEN: usize = 8;

#[derive(Debug, Parser)]
#[command(
    name = "commit_graph",
    about = "Commit graph lanes and commit details for a git repository"
)]
struct Cli {
    /// Repository to open. Defaults to the last opened repository, then the working directory.
    #[arg(long, env = "COMMIT_GRAPH_REPO", global = true)]
    repo: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Print the laid-out commit graph.
    Log {
        #[arg(long)]
        max: Option<usize>,
        /// Emit the layout as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Expand a commit and print its changed files.
    Show { hash: String },
    /// Open one file of a commit in the diff viewer.
    Diff { hash: String, path: String },
    /// Create a branch at a commit.
    Branch { hash: String, name: String },
    /// Merge a commit (or the branch it tips) into the current branch.
    Merge { hash: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let loaded = ConfigStore::new().and_then(|store| store.load_or_create_default());
    let (config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(err) => (AppConfig::default(), Some(err)),
    };

    let default_level = config
        .log_level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    if let Some(err) = config_error {
        error!("failed to load config, using defaults: {err:#}");
    }

    let state_store = AppStateStore::new();
    let repo_path = match cli.repo.clone() {
        Some(path) => path,
        None => state_store
            .as_ref()
            .ok()
            .and_then(|store| store.load_or_default().ok())
            .and_then(|state| state.last_repo_path)
            .filter(|path| path.exists())
            .map(Ok)
            .unwrap_or_else(std::env::current_dir)
            .context("failed to resolve working directory")?,
    };

    let service = GitCommandService::open(&repo_path)?.with_difftool(config.diff.use_difftool);
    match &state_store {
        Ok(store) => {
            if let Err(err) = store.remember_repo(service.repo_root()) {
                warn!("failed to remember repository path: {err:#}");
            }
        }
        Err(err) => warn!("failed to initialize state path: {err:#}"),
    }

    let max_commits = match &cli.command {
        CliCommand::Log { max: Some(max), .. } => *max,
        _ => config.graph.max_commits,
    };
    let payload = service.load_graph_payload(max_commits)?;
    let mut session = GraphSession::new(config.layout_options());
    session.reload(payload);

    match cli.command {
        CliCommand::Log { json, .. } => {
            if json {
                let raw = serde_json::to_string_pretty(session.layout())
                    .context("failed to serialize graph layout")?;
                println!("{raw}");
            } else {
                for line in render_graph_lines(session.layout()) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        CliCommand::Show { hash } => {
            let hash = resolve_hash(session.layout(), &hash)?;
            let outcome = block_on(session.toggle_and_load(&service, &hash))?;
            if let Some(node) = session.layout().node(&hash) {
                print_commit_header(node);
            }
            match outcome {
                Some(FetchOutcome::Failed { error, .. }) => {
                    println!("  ! could not load changed files: {error}");
                }
                _ => {
                    let Some(panel) = session.panel(&hash) else {
                        return Ok(());
                    };
                    for row in flatten_file_tree_rows(&panel.tree) {
                        let indent = "  ".repeat(row.depth + 1);
                        match row.kind {
                            FileTreeNodeKind::Folder => println!("{indent}{}/", row.name),
                            FileTreeNodeKind::File => println!(
                                "{indent}{} {}",
                                row.symbol.unwrap_or('~'),
                                row.name
                            ),
                        }
                    }
                }
            }
            Ok(())
        }
        CliCommand::Diff { hash, path } => {
            let commit_hash = resolve_hash(session.layout(), &hash)?;
            let effect = session.dispatch(GraphEvent::OpenFileDiff {
                commit_hash,
                file_path: path,
            })?;
            block_on(session.run_effect(&service, effect))
        }
        CliCommand::Branch { hash, name } => {
            let commit_hash = resolve_hash(session.layout(), &hash)?;
            let branch_name = sanitize_branch_name(&name);
            if branch_name != name {
                warn!("using branch name '{branch_name}' for '{name}'");
            }
            run_context_action(
                &mut session,
                &service,
                ContextAction::CreateBranch,
                commit_hash,
                Some(branch_name),
            )
        }
        CliCommand::Merge { hash } => {
            let commit_hash = resolve_hash(session.layout(), &hash)?;
            run_context_action(
                &mut session,
                &service,
                ContextAction::MergeIntoCurrent,
                commit_hash,
                None,
            )
        }
    }
}

fn run_context_action(
    session: &mut GraphSession,
    service: &GitCommandService,
    action: ContextAction,
    commit_hash: String,
    branch_name: Option<String>,
) -> Result<()> {
    let effect = session.dispatch(GraphEvent::ContextAction {
        action,
        commit_hash,
        branch_name,
    })?;
    block_on(session.run_effect(service, effect)).inspect_err(|err| {
        error!("{err:#}");
    })
}

fn resolve_hash(layout: &GraphLayout, input: &str) -> Result<String> {
    layout
        .resolve_hash(input.trim())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no unique commit matches '{input}'"))
}

fn print_commit_header(node: &LayoutNode) {
    println!(
        "{} [{}] {} <{}>",
        short_hash(node.hash()),
        node.primary_branch_label,
        node.commit.subject(),
        node.commit.author
    );
}

fn short_hash(hash: &str) -> &str {
    hash.get(..SHORT_HASH_LEN).unwrap_or(hash)
}

/// One text line per row: a lane column per lane, `*` marking the commit.
fn render_graph_lines(layout: &GraphLayout) -> Vec<String> {
    let lane_count = layout.lane_count.max(1);
    layout
        .nodes
        .iter()
        .map(|node| {
            let mut columns = vec![' '; lane_count];
            for edge in &layout.edges {
                if edge.from_row < node.row && node.row < edge.to_row {
                    columns[edge.to_lane.min(lane_count - 1)] = '|';
                }
            }
            columns[node.lane.min(lane_count - 1)] = '*';
            let graph = columns
                .iter()
                .map(|column| format!("{column} "))
                .collect::<String>();
            let refs = if node.commit.refs.is_empty() {
                String::new()
            } else {
                format!(" ({})", node.commit.refs.join(", "))
            };
            format!(
                "{graph}{}{refs} {}",
                short_hash(node.hash()),
                node.commit.subject()
            )
        })
        .collect()
}
