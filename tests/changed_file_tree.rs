use commit_graph::file_tree::{
    ChangedFile, FileStatus, FileTreeNodeKind, build_changed_file_tree, flatten_file_tree_rows,
};

fn names(nodes: &[commit_graph::file_tree::FileTreeNode]) -> Vec<&str> {
    nodes.iter().map(|node| node.name.as_str()).collect()
}

#[test]
fn nested_paths_build_folders_with_status_symbols() {
    let files = vec![
        ChangedFile::new("a/b/c.txt", FileStatus::Added),
        ChangedFile::new("a/x.txt", FileStatus::Deleted),
    ];

    let tree = build_changed_file_tree(&files);

    assert_eq!(names(&tree), vec!["a"]);
    let folder_a = &tree[0];
    assert_eq!(folder_a.kind, FileTreeNodeKind::Folder);
    assert_eq!(folder_a.full_path, None);
    assert_eq!(folder_a.status, None);
    assert_eq!(names(&folder_a.children), vec!["b", "x.txt"]);

    let folder_b = &folder_a.children[0];
    assert_eq!(folder_b.kind, FileTreeNodeKind::Folder);
    assert_eq!(names(&folder_b.children), vec!["c.txt"]);
    let file_c = &folder_b.children[0];
    assert_eq!(file_c.kind, FileTreeNodeKind::File);
    assert_eq!(file_c.full_path.as_deref(), Some("a/b/c.txt"));
    assert_eq!(file_c.symbol(), Some('+'));

    let file_x = &folder_a.children[1];
    assert_eq!(file_x.kind, FileTreeNodeKind::File);
    assert_eq!(file_x.full_path.as_deref(), Some("a/x.txt"));
    assert_eq!(file_x.symbol(), Some('-'));
}

#[test]
fn entries_keep_first_seen_order_instead_of_sorting() {
    let files = vec![
        ChangedFile::new("zeta/one.rs", FileStatus::Modified),
        ChangedFile::new("README.md", FileStatus::Modified),
        ChangedFile::new("alpha/two.rs", FileStatus::Modified),
        ChangedFile::new("zeta/a.rs", FileStatus::Modified),
    ];

    let tree = build_changed_file_tree(&files);

    assert_eq!(names(&tree), vec!["zeta", "README.md", "alpha"]);
    assert_eq!(names(&tree[0].children), vec!["one.rs", "a.rs"]);
}

#[test]
fn modified_and_unknown_statuses_use_tilde() {
    assert_eq!(FileStatus::Added.symbol(), '+');
    assert_eq!(FileStatus::Deleted.symbol(), '-');
    assert_eq!(FileStatus::Modified.symbol(), '~');
    assert_eq!(FileStatus::Unknown.symbol(), '~');
}

#[test]
fn missing_or_unrecognized_status_parses_as_unknown() {
    let files: Vec<ChangedFile> = serde_json::from_str(
        r#"[
            {"path": "src/lib.rs", "status": "added"},
            {"path": "src/old.rs", "status": "renamed"},
            {"path": "Cargo.toml"}
        ]"#,
    )
    .expect("changed files should parse");

    assert_eq!(files[0].status, FileStatus::Added);
    assert_eq!(files[1].status, FileStatus::Unknown);
    assert_eq!(files[2].status, FileStatus::Unknown);

    let tree = build_changed_file_tree(&files);
    let symbols = flatten_file_tree_rows(&tree)
        .into_iter()
        .filter_map(|row| row.symbol)
        .collect::<String>();
    assert_eq!(symbols, "+~~");
}

#[test]
fn empty_segments_are_dropped() {
    let files = vec![ChangedFile::new("/docs//guide/intro.md/", FileStatus::Added)];

    let tree = build_changed_file_tree(&files);
    let rows = flatten_file_tree_rows(&tree);

    let shape = rows
        .iter()
        .map(|row| (row.name.as_str(), row.depth))
        .collect::<Vec<_>>();
    assert_eq!(shape, vec![("docs", 0), ("guide", 1), ("intro.md", 2)]);
    assert_eq!(
        rows[2].full_path.as_deref(),
        Some("/docs//guide/intro.md/"),
        "leaf keeps the path exactly as reported"
    );
}

#[test]
fn duplicate_paths_stay_separate_siblings() {
    let files = vec![
        ChangedFile::new("src/main.rs", FileStatus::Deleted),
        ChangedFile::new("src/main.rs", FileStatus::Added),
    ];

    let tree = build_changed_file_tree(&files);

    assert_eq!(names(&tree), vec!["src"]);
    let leaves = &tree[0].children;
    assert_eq!(names(leaves), vec!["main.rs", "main.rs"]);
    assert_eq!(leaves[0].symbol(), Some('-'));
    assert_eq!(leaves[1].symbol(), Some('+'));
}

#[test]
fn no_files_and_blank_paths_build_nothing() {
    assert!(build_changed_file_tree(&[]).is_empty());
    assert!(build_changed_file_tree(&[ChangedFile::new("//", FileStatus::Added)]).is_empty());
}
