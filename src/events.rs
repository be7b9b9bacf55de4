//! Boundary normalization of loosely-typed collaboration records.
//!
//! Host payloads alias the same field under several names (`timestamp`, `time`, `ts`, ...)
//! and carry kind-specific fields as optional extras. Everything is folded into one
//! [`Event`] shape here so the aggregation code never inspects raw JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::LoadError;
use crate::graph::LinkCategory;
use crate::timeline::{TimeUnit, parse_timestamp};

const TIMESTAMP_KEYS: [&str; 5] = ["timestamp", "time", "t", "ts", "timestamp_ms"];
const KIND_KEYS: [&str; 2] = ["type", "event_type"];
const ACTOR_KEYS: [&str; 2] = ["actor", "user"];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Commit {
        files: Vec<String>,
        lines_added: u64,
        lines_deleted: u64,
    },
    /// Pairwise file co-edit inferred from commits; never present in raw input.
    #[serde(rename = "commit_coedit")]
    CoEdit {
        commit_id: Option<String>,
        file: String,
        lines_added: u64,
        lines_deleted: u64,
    },
    Review,
    Assign,
    Comment,
    PullRequest {
        pr_id: Option<String>,
    },
    Issue {
        issue_id: Option<String>,
    },
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Commit { .. } | Self::CoEdit { .. } => "commit",
            Self::Review => "review",
            Self::Assign => "assign",
            Self::Comment => "comment",
            Self::PullRequest { .. } => "pull_request",
            Self::Issue { .. } => "issue",
        }
    }

    /// Category credited on a link when this event connects two people.
    ///
    /// Raw commits only credit links through their inferred co-edits, and pull requests
    /// only mark node presence.
    pub fn link_category(&self) -> Option<LinkCategory> {
        match self {
            Self::CoEdit { .. } => Some(LinkCategory::Commits),
            Self::Review => Some(LinkCategory::Reviews),
            Self::Assign => Some(LinkCategory::Assigns),
            Self::Comment => Some(LinkCategory::Discussion),
            Self::Commit { .. } | Self::PullRequest { .. } | Self::Issue { .. } => None,
        }
    }

    pub fn line_delta(&self) -> Option<(u64, u64)> {
        match self {
            Self::Commit {
                lines_added,
                lines_deleted,
                ..
            }
            | Self::CoEdit {
                lines_added,
                lines_deleted,
                ..
            } => Some((*lines_added, *lines_deleted)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub id: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
    pub actor: Option<String>,
    pub target: Option<String>,
    pub timestamp_ms: Option<i64>,
}

impl Event {
    /// Same logical event: equal ids when both carry one, full equality otherwise.
    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.id, &other.id) {
            (Some(left), Some(right)) => left == right,
            _ => self == other,
        }
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.actor.as_deref().into_iter().chain(self.target.as_deref())
    }
}

fn first_value<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|value| !value.is_null())
}

fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_owned(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    if text.is_empty() { None } else { Some(text) }
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    first_value(object, keys).and_then(text_value)
}

fn count_field(object: &Map<String, Value>, key: &str) -> u64 {
    let Some(value) = object.get(key) else {
        return 0;
    };
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|number| number.is_finite() && *number > 0.0)
        .map(|number| number as u64)
        .unwrap_or(0)
}

fn parse_kind(object: &Map<String, Value>) -> Option<EventKind> {
    let label = text_field(object, &KIND_KEYS)?
        .to_ascii_lowercase()
        .replace('-', "_");

    let kind = match label.as_str() {
        "commit" => EventKind::Commit {
            files: object
                .get("files")
                .and_then(Value::as_array)
                .map(|files| files.iter().filter_map(text_value).collect())
                .unwrap_or_default(),
            lines_added: count_field(object, "lines_added"),
            lines_deleted: count_field(object, "lines_deleted"),
        },
        "review" => EventKind::Review,
        "assign" => EventKind::Assign,
        "comment" => EventKind::Comment,
        "pull_request" | "pullrequest" => EventKind::PullRequest {
            pr_id: text_field(object, &["pr_id"]),
        },
        "issue" => EventKind::Issue {
            issue_id: text_field(object, &["issue_id"]),
        },
        _ => return None,
    };
    Some(kind)
}

/// Maps one raw record onto an [`Event`]; records without a recognised kind yield `None`.
pub fn normalize_record(value: &Value) -> Option<Event> {
    let object = value.as_object()?;
    let kind = parse_kind(object)?;

    Some(Event {
        id: text_field(object, &["id"]),
        kind,
        actor: text_field(object, &ACTOR_KEYS),
        target: text_field(object, &["target"]),
        timestamp_ms: first_value(object, &TIMESTAMP_KEYS).and_then(parse_timestamp),
    })
}

pub fn normalize_records(records: &[Value]) -> Vec<Event> {
    let events = records
        .iter()
        .filter_map(normalize_record)
        .collect::<Vec<_>>();

    let dropped = records.len() - events.len();
    if dropped > 0 {
        debug!(dropped, kept = events.len(), "skipped records without a known event type");
    }
    if events.is_empty() && !records.is_empty() {
        warn!(records = records.len(), "no usable collaboration events in input");
    }
    events
}

fn looks_like_event(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|object| first_value(object, &KIND_KEYS).is_some() || object.contains_key("actor"))
}

/// Pulls the flat record list out of any accepted payload shape: a bare array of events,
/// `{"data": [...]}`, `{"events": [...]}`, `{"queriesData": [...]}` or a queriesData array
/// of `{"data": [...]}` entries.
pub fn extract_records(document: &Value) -> Result<Vec<Value>, LoadError> {
    match document {
        Value::Array(items) => {
            if items.is_empty() || items.iter().any(looks_like_event) {
                return Ok(items.clone());
            }

            let mut records = Vec::new();
            for item in items {
                match item.get("data") {
                    Some(Value::Array(rows)) => records.extend(rows.iter().cloned()),
                    _ => {
                        return Err(LoadError::UnexpectedShape(
                            "array entries are neither events nor query results".to_owned(),
                        ));
                    }
                }
            }
            Ok(records)
        }
        Value::Object(object) => {
            for key in ["events", "data", "queriesData"] {
                if let Some(inner) = object.get(key) {
                    return extract_records(inner);
                }
            }
            Err(LoadError::UnexpectedShape(
                "object has no `events`, `data` or `queriesData` field".to_owned(),
            ))
        }
        _ => Err(LoadError::UnexpectedShape(
            "expected a JSON array or object".to_owned(),
        )),
    }
}

pub fn parse_events(raw: &str) -> Result<Vec<Event>, LoadError> {
    let document: Value = serde_json::from_str(raw)?;
    let records = extract_records(&document)?;
    Ok(normalize_records(&records))
}

pub fn load_events(path: &Path) -> Result<Vec<Event>, LoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_events(&raw)
}

/// Control values the host form may carry alongside the query data.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormData {
    #[serde(default, alias = "distance_scale")]
    pub distance_scale: Option<f64>,
    #[serde(default, alias = "cluster_distance")]
    pub cluster_distance: Option<f64>,
    #[serde(default, alias = "time_unit")]
    pub time_unit: Option<TimeUnit>,
    #[serde(default, alias = "bucket_index")]
    pub bucket_index: Option<usize>,
}

/// The host's chart payload: viewport size, form values and raw query results.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartProps {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub form_data: FormData,
    #[serde(default)]
    pub queries_data: Value,
}

#[derive(Clone, Debug)]
pub struct ChartInput {
    pub width: f64,
    pub height: f64,
    pub form: FormData,
    pub events: Vec<Event>,
}

pub fn transform_props(props: ChartProps) -> Result<ChartInput, LoadError> {
    let records = if props.queries_data.is_null() {
        Vec::new()
    } else {
        extract_records(&props.queries_data)?
    };

    Ok(ChartInput {
        width: props.width,
        height: props.height,
        form: props.form_data,
        events: normalize_records(&records),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn normalizes_field_aliases() {
        let event = normalize_record(&json!({
            "event_type": "Review",
            "user": "alice",
            "target": "bob",
            "ts": "2024-01-01T00:00:00Z",
            "id": 42,
        }))
        .expect("event");

        assert_eq!(event.kind, EventKind::Review);
        assert_eq!(event.actor.as_deref(), Some("alice"));
        assert_eq!(event.target.as_deref(), Some("bob"));
        assert_eq!(event.id.as_deref(), Some("42"));
        assert_eq!(event.timestamp_ms, Some(1_704_067_200_000));
    }

    #[test]
    fn commit_fields_are_kept_on_the_variant() {
        let event = normalize_record(&json!({
            "type": "commit",
            "actor": "alice",
            "files": ["a.py", 7, "b.py"],
            "lines_added": "12",
            "lines_deleted": -3,
            "timestamp": "garbage",
        }))
        .expect("event");

        assert_eq!(
            event.kind,
            EventKind::Commit {
                files: vec!["a.py".to_owned(), "7".to_owned(), "b.py".to_owned()],
                lines_added: 12,
                lines_deleted: 0,
            }
        );
        assert_eq!(event.timestamp_ms, None);
    }

    #[test]
    fn unknown_kinds_are_dropped() {
        let events = normalize_records(&[
            json!({"type": "deploy", "actor": "ci"}),
            json!("not an object"),
            json!({"type": "comment", "actor": "a", "target": "b"}),
        ]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Comment);
    }

    #[test]
    fn extracts_records_from_query_payloads() {
        let bare = json!([{"type": "review", "actor": "a", "target": "b"}]);
        let wrapped = json!({"data": [{"type": "review", "actor": "a", "target": "b"}]});
        let queries = json!([
            {"data": [{"type": "review", "actor": "a", "target": "b"}]},
            {"data": [{"type": "assign", "actor": "b", "target": "c"}]},
        ]);

        assert_eq!(extract_records(&bare).expect("bare").len(), 1);
        assert_eq!(extract_records(&wrapped).expect("wrapped").len(), 1);
        assert_eq!(extract_records(&queries).expect("queries").len(), 2);
        assert!(extract_records(&json!(3)).is_err());
        assert!(extract_records(&json!({"rows": []})).is_err());
    }

    #[test]
    fn transform_props_reads_form_values() {
        let props: ChartProps = serde_json::from_value(json!({
            "width": 800,
            "height": 600,
            "formData": {"distanceScale": 25.0, "time_unit": "week", "bucketIndex": 3},
            "queriesData": [{"data": [{"type": "comment", "actor": "a", "target": "b"}]}],
        }))
        .expect("props");

        let input = transform_props(props).expect("input");
        assert_eq!(input.width, 800.0);
        assert_eq!(input.form.distance_scale, Some(25.0));
        assert_eq!(input.form.time_unit, Some(TimeUnit::Week));
        assert_eq!(input.form.bucket_index, Some(3));
        assert_eq!(input.events.len(), 1);
    }

    #[test]
    fn same_as_prefers_ids() {
        let base = Event {
            id: Some("e1".to_owned()),
            kind: EventKind::Review,
            actor: Some("a".to_owned()),
            target: Some("b".to_owned()),
            timestamp_ms: Some(1),
        };
        let mut renamed = base.clone();
        renamed.actor = Some("z".to_owned());
        assert!(base.same_as(&renamed));

        let mut anonymous = base.clone();
        anonymous.id = None;
        assert!(!anonymous.same_as(&renamed));
        assert!(anonymous.same_as(&anonymous.clone()));
    }
}
