use std::sync::Mutex;

use anyhow::{Result, anyhow};
use futures::FutureExt as _;
use futures::executor::block_on;
use futures::future::{BoxFuture, ready};

use commit_graph::file_tree::ChangedFile;
use commit_graph::graph::{GraphPayload, HeadsMap};
use commit_graph::graph_lanes::LayoutOptions;
use commit_graph::service::{
    ChangedFilesResponse, CommandService, ContextActionRequest, MergeSource, OpenFileDiffRequest,
};
use commit_graph::session::{
    ContextAction, GraphEvent, GraphSession, SessionEffect, resolve_merge_source,
};

#[derive(Default)]
struct RecordingService {
    reject_actions: bool,
    diffs: Mutex<Vec<OpenFileDiffRequest>>,
    actions: Mutex<Vec<ContextActionRequest>>,
}

impl CommandService for RecordingService {
    fn changed_files(&self, _: &str) -> BoxFuture<'static, Result<Vec<ChangedFile>>> {
        ready(Ok(Vec::new())).boxed()
    }

    fn open_file_diff(&self, request: OpenFileDiffRequest) -> BoxFuture<'static, Result<()>> {
        self.diffs.lock().expect("diff log lock").push(request);
        ready(Ok(())).boxed()
    }

    fn run_context_action(&self, request: ContextActionRequest) -> BoxFuture<'static, Result<()>> {
        self.actions.lock().expect("action log lock").push(request);
        let result = if self.reject_actions {
            Err(anyhow!("merge conflict in tracked.txt"))
        } else {
            Ok(())
        };
        ready(result).boxed()
    }
}

fn session() -> GraphSession {
    let payload = GraphPayload::from_json(
        r#"{
            "nodes": [
                {"hash": "c3", "parents": ["c1"], "date": 30, "message": "feature tip", "refs": ["feature", "review"]},
                {"hash": "c2", "parents": ["c1"], "date": 20, "message": "main tip", "refs": ["main"]},
                {"hash": "c1", "parents": [], "date": 10, "message": "root"}
            ],
            "heads": {"main": "c2", "feature": "c3", "review": "c3"},
            "currentBranch": "main"
        }"#,
    )
    .expect("payload should parse");
    let mut session = GraphSession::new(LayoutOptions::default());
    session.reload(payload);
    session
}

fn merge_event(commit_hash: &str) -> GraphEvent {
    GraphEvent::ContextAction {
        action: ContextAction::MergeIntoCurrent,
        commit_hash: commit_hash.to_string(),
        branch_name: None,
    }
}

#[test]
fn merging_a_branch_tip_attaches_the_branch_name() {
    let mut session = session();

    let effect = session.dispatch(merge_event("c3")).expect("merge should dispatch");

    assert_eq!(
        effect,
        SessionEffect::ContextAction(ContextActionRequest::MergeIntoCurrent {
            commit_hash: "c3".to_string(),
            source: MergeSource::Branch("feature".to_string()),
        })
    );
}

#[test]
fn merging_a_plain_commit_falls_back_to_its_hash() {
    let mut session = session();

    let effect = session.dispatch(merge_event("c1")).expect("merge should dispatch");

    assert_eq!(
        effect,
        SessionEffect::ContextAction(ContextActionRequest::MergeIntoCurrent {
            commit_hash: "c1".to_string(),
            source: MergeSource::Commit("c1".to_string()),
        })
    );
}

#[test]
fn merge_source_skips_current_branch_when_another_shares_the_tip() {
    let heads = [("main", "tip"), ("release", "tip")]
        .into_iter()
        .collect::<HeadsMap>();

    assert_eq!(
        resolve_merge_source(&heads, "main", "tip"),
        MergeSource::Branch("release".to_string())
    );
    assert_eq!(
        resolve_merge_source(&heads, "other", "tip"),
        MergeSource::Branch("main".to_string())
    );

    let only_current = [("main", "tip")].into_iter().collect::<HeadsMap>();
    assert_eq!(
        resolve_merge_source(&only_current, "main", "tip"),
        MergeSource::Branch("main".to_string())
    );
}

#[test]
fn create_branch_requires_a_name() {
    let mut session = session();

    let err = session
        .dispatch(GraphEvent::ContextAction {
            action: ContextAction::CreateBranch,
            commit_hash: "c1".to_string(),
            branch_name: Some("   ".to_string()),
        })
        .expect_err("blank branch name should be rejected");
    assert!(format!("{err:#}").contains("branch name"));

    let effect = session
        .dispatch(GraphEvent::ContextAction {
            action: ContextAction::CreateBranch,
            commit_hash: "c1".to_string(),
            branch_name: Some(" hotfix ".to_string()),
        })
        .expect("named branch should dispatch");
    assert_eq!(
        effect,
        SessionEffect::ContextAction(ContextActionRequest::CreateBranch {
            commit_hash: "c1".to_string(),
            branch_name: "hotfix".to_string(),
        })
    );
}

#[test]
fn open_file_diff_forwards_request_to_service() {
    let service = RecordingService::default();
    let mut session = session();

    let effect = session
        .dispatch(GraphEvent::OpenFileDiff {
            commit_hash: "c2".to_string(),
            file_path: "src/lib.rs".to_string(),
        })
        .expect("diff should dispatch");
    block_on(session.run_effect(&service, effect)).expect("diff request should succeed");

    let diffs = service.diffs.lock().expect("diff log lock");
    assert_eq!(
        *diffs,
        vec![OpenFileDiffRequest {
            file_path: "src/lib.rs".to_string(),
            commit_hash: "c2".to_string(),
        }]
    );
}

#[test]
fn failed_context_action_is_reported_once_without_retry() {
    let service = RecordingService {
        reject_actions: true,
        ..RecordingService::default()
    };
    let mut session = session();

    let effect = session.dispatch(merge_event("c3")).expect("merge should dispatch");
    let err = block_on(session.run_effect(&service, effect)).expect_err("merge should fail");

    let message = format!("{err:#}");
    assert!(message.contains("failed to merge into current branch"));
    assert!(message.contains("merge conflict"));
    assert_eq!(service.actions.lock().expect("action log lock").len(), 1);
}

#[test]
fn wire_formats_match_the_external_interface() {
    let request = ContextActionRequest::CreateBranch {
        commit_hash: "abc".to_string(),
        branch_name: "topic".to_string(),
    };
    let raw = serde_json::to_value(&request).expect("request should serialize");
    assert_eq!(raw["action"], "createBranch");
    assert_eq!(raw["commitHash"], "abc");

    let diff = serde_json::to_value(OpenFileDiffRequest {
        file_path: "a.txt".to_string(),
        commit_hash: "abc".to_string(),
    })
    .expect("diff request should serialize");
    assert_eq!(diff["filePath"], "a.txt");
    assert_eq!(diff["commitHash"], "abc");

    let ok: ChangedFilesResponse =
        serde_json::from_str(r#"{"files": [{"path": "a.txt", "status": "added"}]}"#)
            .expect("files response should parse");
    assert_eq!(ok.into_result().expect("files response").len(), 1);

    let failed: ChangedFilesResponse =
        serde_json::from_str(r#"{"error": "bad revision"}"#).expect("error response should parse");
    let err = failed.into_result().expect_err("error response should fail");
    assert_eq!(err.to_string(), "bad revision");
}

#[test]
fn heads_keep_payload_enumeration_order() {
    let session = session();
    let order = session
        .layout()
        .heads
        .iter()
        .map(|(branch, _)| branch)
        .collect::<Vec<_>>();

    assert_eq!(order, vec!["main", "feature", "review"]);
    assert_eq!(session.layout().node("c3").expect("c3").lane, 1);
    assert_eq!(session.layout().node("c2").expect("c2").lane, 0);
}
