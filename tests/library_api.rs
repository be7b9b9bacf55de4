use std::io::Write;
use std::time::{Duration, Instant};

use collab_graph::{
    CollaborationWeights, Explorer, LoadError, Settings, TimeUnit, aggregate, link_id, load_events,
};
use tempfile::NamedTempFile;

const EVENTS: &str = r#"{
  "events": [
    {"type": "review", "actor": "alice", "target": "bob", "timestamp": "2024-01-05T10:00:00Z"},
    {"type": "comment", "user": "bob", "target": "carol", "timestamp": "2024-01-20T09:30:00Z"},
    {"type": "commit", "id": "c1", "actor": "alice", "files": ["src/lib.rs"],
     "lines_added": 40, "lines_deleted": 2, "timestamp": "2024-03-02T12:00:00Z"},
    {"type": "commit", "id": "c2", "actor": "dave", "files": ["src/lib.rs"],
     "lines_added": 5, "lines_deleted": 5, "timestamp": "2024-03-04T12:00:00Z"},
    {"type": "assign", "actor": "carol", "target": "dave", "timestamp": "2024-03-10T08:00:00Z"},
    {"type": "deploy", "actor": "ci"}
  ]
}"#;

fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp file");
    file.write_all(content.as_bytes()).expect("write temp file");
    file
}

fn all_time_settings() -> Settings {
    let mut settings = Settings::default();
    settings.timeline.enabled = false;
    settings
}

#[test]
fn loads_events_and_builds_full_graph() {
    let file = write_temp(EVENTS, ".json");
    let events = load_events(file.path()).expect("events");
    assert_eq!(events.len(), 5);

    let explorer = Explorer::with_seed(events, all_time_settings(), 800.0, 600.0, 11);
    let graph = explorer.graph();

    let ids = graph.nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, ["alice", "bob", "carol", "dave"]);
    assert!(graph.link(&link_id("alice", "bob")).is_some());
    assert!(graph.link(&link_id("bob", "carol")).is_some());
    assert!(graph.link(&link_id("carol", "dave")).is_some());

    let coedit = graph.link(&link_id("alice", "dave")).expect("co-edit link");
    assert!(coedit.types.commits > 0.0);
    assert!(coedit.weight < 1.0);
}

#[test]
fn exported_frame_is_finite_and_uses_endpoint_keys() {
    let file = write_temp(EVENTS, ".json");
    let events = load_events(file.path()).expect("events");
    let mut explorer = Explorer::with_seed(events, all_time_settings(), 800.0, 600.0, 3);

    for _ in 0..50 {
        explorer.step(Duration::from_millis(16));
    }

    let frame = explorer.frame();
    assert_eq!(frame.nodes.len(), 4);
    assert!(
        frame
            .nodes
            .iter()
            .all(|node| node.x.is_finite() && node.y.is_finite())
    );

    let json = serde_json::to_value(&frame).expect("serialize frame");
    let first_link = &json["links"][0];
    assert!(first_link.get("source").is_some());
    assert!(first_link.get("target").is_some());
    assert!(json["transform"]["k"].as_f64().is_some_and(|k| k > 0.0));
}

#[test]
fn seeded_explorers_agree() {
    let file = write_temp(EVENTS, ".json");
    let events = load_events(file.path()).expect("events");

    let first = Explorer::with_seed(events.clone(), all_time_settings(), 800.0, 600.0, 99);
    let second = Explorer::with_seed(events, all_time_settings(), 800.0, 600.0, 99);
    assert_eq!(first.frame(), second.frame());
}

#[test]
fn slider_commits_window_after_debounce() {
    let file = write_temp(EVENTS, ".json");
    let events = load_events(file.path()).expect("events");
    let explorer_settings = Settings::default();
    let mut explorer = Explorer::with_seed(events, explorer_settings, 800.0, 600.0, 5);

    assert_eq!(explorer.time_unit(), TimeUnit::Month);
    assert_eq!(explorer.buckets().len(), 2);
    assert_eq!(explorer.committed_index(), 0);
    assert!(explorer.graph().link(&link_id("alice", "bob")).is_some());
    assert!(explorer.graph().link(&link_id("carol", "dave")).is_none());

    let start = Instant::now();
    explorer.set_slider_index(1, start);
    assert!(!explorer.poll(start + Duration::from_millis(100)));
    assert!(explorer.has_pending_window());
    assert!(explorer.poll(start + Duration::from_millis(300)));

    assert_eq!(explorer.committed_index(), 1);
    assert!(explorer.graph().link(&link_id("carol", "dave")).is_some());
    assert!(explorer.graph().link(&link_id("alice", "bob")).is_none());
}

#[test]
fn settings_file_changes_link_weights() {
    let config = write_temp(
        r#"
        [weights]
        reviews = 5.0

        [timeline]
        enabled = false
        "#,
        ".toml",
    );
    let settings = Settings::load(Some(config.path())).expect("settings");
    assert_eq!(settings.weights.reviews, 5.0);
    assert!(!settings.timeline.enabled);

    let events = collab_graph::parse_events(
        r#"[{"type": "review", "actor": "alice", "target": "bob"}]"#,
    )
    .expect("events");
    let graph = aggregate(&events, None, &settings.weights);
    assert_eq!(graph.links[0].weight, 5.0);

    let default_graph = aggregate(&events, None, &CollaborationWeights::default());
    assert_eq!(default_graph.links[0].weight, 2.0);
}

#[test]
fn missing_event_file_reports_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.json");

    let error = load_events(&path).expect_err("missing file");
    assert!(matches!(error, LoadError::Io { .. }));
    assert!(error.to_string().contains("absent.json"));
}
