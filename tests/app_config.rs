use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};

use commit_graph::config::{AppConfig, ConfigStore};
use commit_graph::lane_color::DEFAULT_LANE_PALETTE;

#[test]
fn app_config_defaults_use_seven_color_palette() {
    let config = AppConfig::default();

    assert_eq!(config.graph.palette.len(), 7);
    assert_eq!(config.graph.palette[0], DEFAULT_LANE_PALETTE[0]);
    assert_eq!(config.graph.max_commits, 200);
    assert_eq!(config.log_level, "info");
    assert!(!config.diff.use_difftool, "difftool should default to disabled");
}

#[test]
fn app_config_parses_partial_graph_table() {
    let raw = r#"
[graph]
max_commits = 50
palette = ["red", "blue"]
"#;
    let config: AppConfig = toml::from_str(raw).expect("partial config should parse");

    assert_eq!(config.graph.max_commits, 50);
    assert_eq!(config.graph.palette, vec!["red".to_string(), "blue".to_string()]);
    assert_eq!(config.graph.lane_width, 16.0);
    assert_eq!(config.log_level, "info");

    let options = config.layout_options();
    assert_eq!(options.palette.len(), 2);
}

#[test]
fn app_config_layout_options_fall_back_for_empty_palette_and_bad_metrics() {
    let raw = r#"
[graph]
palette = []
lane_width = 0.0
row_height = -4.0
"#;
    let config: AppConfig = toml::from_str(raw).expect("config should parse");
    let options = config.layout_options();

    assert_eq!(options.palette.len(), DEFAULT_LANE_PALETTE.len());
    assert_eq!(options.metrics.lane_width, 16.0);
    assert_eq!(options.metrics.row_height, 28.0);
}

#[test]
fn config_store_creates_default_file_then_reads_it_back() {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("commit-graph-config-{unique}"));
    let store = ConfigStore::at(dir.join("nested").join("config.toml"));

    let created = store
        .load_or_create_default()
        .expect("default config should be created");
    assert_eq!(created, AppConfig::default());
    assert!(store.path().exists(), "config file should be written");

    let mut changed = created.clone();
    changed.graph.max_commits = 12;
    changed.diff.use_difftool = true;
    store.save(&changed).expect("config should save");

    let loaded = store.load_or_create_default().expect("config should load");
    assert_eq!(loaded, changed);

    let _ = fs::remove_dir_all(dir);
}
