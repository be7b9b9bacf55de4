//! Folds collaboration events into a weighted, undirected person graph.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use tracing::debug;

use crate::events::{Event, EventKind};
use crate::graph::{
    CollabGraph, CollaborationWeights, Link, LinkCategory, LinkTypes, MAX_NODE_RADIUS,
    MIN_NODE_RADIUS, Node, link_id,
};
use crate::timeline::WindowRange;

const COEDIT_LINE_FACTOR: f64 = 0.001;
const COEDIT_MIN_INCREMENT: f64 = 0.001;
const COEDIT_SUFFIX: &str = "-commit-coedit";

/// Builds the graph for `events`, keeping only events inside `window` when one is given.
///
/// Never fails: events without both endpoints, or without a parseable timestamp while a
/// window is active, simply do not contribute.
pub fn aggregate(
    events: &[Event],
    window: Option<WindowRange>,
    weights: &CollaborationWeights,
) -> CollabGraph {
    let retained = events
        .iter()
        .filter(|event| in_window(event, window))
        .collect::<Vec<_>>();

    let coedits = infer_coedits(events)
        .into_iter()
        .filter(|event| in_window(event, window))
        .collect::<Vec<_>>();

    let mut links = BTreeMap::<String, LinkAccumulator>::new();
    let mut duplicates = 0usize;
    for event in coedits.iter().chain(retained.iter().copied()) {
        let Some(category) = event.kind.link_category() else {
            continue;
        };
        let (Some(actor), Some(target)) = (event.actor.as_deref(), event.target.as_deref()) else {
            continue;
        };
        if actor == target {
            continue;
        }

        let accumulator = links
            .entry(link_id(actor, target))
            .or_insert_with(|| LinkAccumulator::new(actor, target));
        if !accumulator.record(event, category) {
            duplicates += 1;
        }
    }

    // Unfiltered graphs show everyone; windowed graphs only those active in the window.
    let mut activity = BTreeMap::<String, u64>::new();
    if window.is_none() {
        for participant in events.iter().flat_map(Event::participants) {
            activity.entry(participant.to_owned()).or_insert(0);
        }
    }
    for event in &retained {
        for participant in event.participants() {
            *activity.entry(participant.to_owned()).or_insert(0) += 1;
        }
    }

    let links = links
        .into_values()
        .filter_map(|accumulator| accumulator.finish(weights))
        .collect::<Vec<_>>();
    let nodes = sized_nodes(activity);

    debug!(
        events = events.len(),
        retained = retained.len(),
        coedits = coedits.len(),
        duplicates,
        nodes = nodes.len(),
        links = links.len(),
        windowed = window.is_some(),
        "aggregated collaboration graph"
    );

    CollabGraph { nodes, links }
}

fn in_window(event: &Event, window: Option<WindowRange>) -> bool {
    match window {
        None => true,
        Some(range) => event.timestamp_ms.is_some_and(|timestamp| range.contains(timestamp)),
    }
}

/// One co-edit per commit and per other author who committed to the same file.
///
/// The pseudo-event id names the commit, file and unordered author pair, so the same
/// pairing offered twice collapses during deduplication while separate files and commits
/// each count.
fn infer_coedits(events: &[Event]) -> Vec<Event> {
    let mut commits_by_file = BTreeMap::<&str, Vec<(usize, &Event)>>::new();
    for (index, event) in events.iter().enumerate() {
        let EventKind::Commit { files, .. } = &event.kind else {
            continue;
        };
        if event.actor.is_none() {
            continue;
        }
        let unique_files = files.iter().map(String::as_str).collect::<BTreeSet<_>>();
        for file in unique_files {
            commits_by_file.entry(file).or_default().push((index, event));
        }
    }

    let mut coedits = Vec::new();
    for (file, commits) in commits_by_file {
        let authors = commits
            .iter()
            .filter_map(|(_, event)| event.actor.as_deref())
            .collect::<BTreeSet<_>>();
        if authors.len() < 2 {
            continue;
        }

        for &(index, commit) in &commits {
            let Some(author) = commit.actor.as_deref() else {
                continue;
            };
            let EventKind::Commit {
                lines_added,
                lines_deleted,
                ..
            } = &commit.kind
            else {
                continue;
            };
            let commit_key = commit.id.clone().unwrap_or_else(|| format!("#{index}"));

            for &other in authors.iter().filter(|&&other| other != author) {
                let (low, high) = if author <= other { (author, other) } else { (other, author) };
                coedits.push(Event {
                    id: Some(format!("{commit_key}:{file}:{low}:{high}{COEDIT_SUFFIX}")),
                    kind: EventKind::CoEdit {
                        commit_id: commit.id.clone(),
                        file: file.to_owned(),
                        lines_added: *lines_added,
                        lines_deleted: *lines_deleted,
                    },
                    actor: Some(author.to_owned()),
                    target: Some(other.to_owned()),
                    timestamp_ms: commit.timestamp_ms,
                });
            }
        }
    }
    coedits
}

fn contribution(event: &Event) -> f64 {
    match event.kind {
        EventKind::CoEdit {
            lines_added,
            lines_deleted,
            ..
        } => {
            let increment = COEDIT_LINE_FACTOR * (lines_added + lines_deleted) as f64;
            if increment > 0.0 { increment } else { COEDIT_MIN_INCREMENT }
        }
        _ => 1.0,
    }
}

struct LinkAccumulator {
    source: String,
    target: String,
    types: LinkTypes,
    first: Option<i64>,
    last: Option<i64>,
    samples: Vec<Event>,
    seen_ids: HashSet<String>,
}

impl LinkAccumulator {
    fn new(a: &str, b: &str) -> Self {
        let (source, target) = if a <= b { (a, b) } else { (b, a) };
        Self {
            source: source.to_owned(),
            target: target.to_owned(),
            types: LinkTypes::default(),
            first: None,
            last: None,
            samples: Vec::new(),
            seen_ids: HashSet::new(),
        }
    }

    /// Returns `false` when the event was already counted on this link.
    fn record(&mut self, event: &Event, category: LinkCategory) -> bool {
        let duplicate = match &event.id {
            Some(id) => !self.seen_ids.insert(id.clone()),
            // An id-less event can only equal another id-less one.
            None => self
                .samples
                .iter()
                .filter(|sample| sample.id.is_none())
                .any(|sample| sample.same_as(event)),
        };
        if duplicate {
            return false;
        }

        self.types.add(category, contribution(event));
        if let Some(timestamp) = event.timestamp_ms {
            self.first = Some(self.first.map_or(timestamp, |first| first.min(timestamp)));
            self.last = Some(self.last.map_or(timestamp, |last| last.max(timestamp)));
        }
        self.samples.push(event.clone());
        true
    }

    fn finish(self, weights: &CollaborationWeights) -> Option<Link> {
        if self.types.total() <= 0.0 && self.samples.is_empty() {
            return None;
        }

        Some(Link {
            weight: self.types.weighted(weights),
            source: self.source,
            target: self.target,
            types: self.types,
            first: self.first,
            last: self.last,
            sample_events: self.samples,
        })
    }
}

/// Rescales raw activity linearly into the visual radius range; a flat distribution gets
/// the midpoint.
fn sized_nodes(activity: BTreeMap<String, u64>) -> Vec<Node> {
    let min = activity.values().copied().min().unwrap_or(0);
    let max = activity.values().copied().max().unwrap_or(0);
    let span = (max - min) as f64;

    activity
        .into_iter()
        .map(|(id, count)| {
            let size = if span > 0.0 {
                MIN_NODE_RADIUS + ((count - min) as f64 / span) * (MAX_NODE_RADIUS - MIN_NODE_RADIUS)
            } else {
                (MIN_NODE_RADIUS + MAX_NODE_RADIUS) / 2.0
            };
            Node {
                id,
                activity: count,
                size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, actor: &str, target: Option<&str>, timestamp_ms: Option<i64>) -> Event {
        Event {
            id: None,
            kind,
            actor: Some(actor.to_owned()),
            target: target.map(str::to_owned),
            timestamp_ms,
        }
    }

    fn commit(id: &str, actor: &str, files: &[&str], lines: u64, timestamp_ms: i64) -> Event {
        Event {
            id: Some(id.to_owned()),
            kind: EventKind::Commit {
                files: files.iter().map(|file| (*file).to_owned()).collect(),
                lines_added: lines,
                lines_deleted: 0,
            },
            actor: Some(actor.to_owned()),
            target: None,
            timestamp_ms: Some(timestamp_ms),
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{actual} != {expected}");
    }

    #[test]
    fn empty_input_gives_empty_graph() {
        let graph = aggregate(&[], None, &CollaborationWeights::default());
        assert!(graph.nodes.is_empty());
        assert!(graph.links.is_empty());
    }

    #[test]
    fn shared_file_commits_produce_one_coedit_link() {
        let events = [
            commit("c1", "alice", &["a.py"], 1, 1_000),
            commit("c2", "bob", &["a.py"], 1, 2_000),
        ];
        let weights = CollaborationWeights::default();
        let graph = aggregate(&events, None, &weights);

        assert_eq!(graph.links.len(), 1);
        let link = &graph.links[0];
        assert_eq!(link.id(), "alice||bob");
        assert_close(link.types.commits, 0.002);
        assert_close(link.weight, 0.002 * weights.commits);
        assert_eq!(link.first, Some(1_000));
        assert_eq!(link.last, Some(2_000));
        assert_eq!(link.sample_events.len(), 2);
    }

    #[test]
    fn coedit_weight_scales_with_lines_and_has_a_floor() {
        let events = [
            commit("c1", "alice", &["a.py", "b.py"], 10, 1_000),
            commit("c2", "bob", &["a.py", "b.py"], 0, 2_000),
        ];
        let graph = aggregate(&events, None, &CollaborationWeights::default());
        // Two files, each contributing 0.01 (alice) plus the 0.001 floor (bob).
        assert_close(graph.links[0].types.commits, 2.0 * (0.01 + 0.001));
    }

    #[test]
    fn review_creates_weighted_link() {
        let events = [event(EventKind::Review, "x", Some("y"), None)];
        let weights = CollaborationWeights::default();
        let graph = aggregate(&events, None, &weights);

        assert_eq!(graph.links.len(), 1);
        assert_eq!(graph.links[0].id(), "x||y");
        assert_eq!(graph.links[0].types.reviews, 1.0);
        assert_eq!(graph.links[0].weight, weights.reviews);
    }

    #[test]
    fn duplicate_ids_are_counted_once() {
        let mut review = event(EventKind::Review, "x", Some("y"), Some(5));
        review.id = Some("r1".to_owned());
        let graph = aggregate(&[review.clone(), review], None, &CollaborationWeights::default());
        assert_eq!(graph.links[0].types.reviews, 1.0);
        assert_eq!(graph.links[0].sample_events.len(), 1);
    }

    #[test]
    fn many_distinct_ids_on_one_link_all_count() {
        let mut events = (0..2_000)
            .map(|index| {
                let mut comment = event(EventKind::Comment, "x", Some("y"), Some(index));
                comment.id = Some(format!("n{index}"));
                comment
            })
            .collect::<Vec<_>>();
        events.extend(events.clone());

        let graph = aggregate(&events, None, &CollaborationWeights::default());
        assert_eq!(graph.links[0].types.discussion, 2_000.0);
        assert_eq!(graph.links[0].sample_events.len(), 2_000);
    }

    #[test]
    fn anonymous_events_dedup_by_full_equality() {
        let review = event(EventKind::Review, "x", Some("y"), Some(5));
        let later = event(EventKind::Review, "x", Some("y"), Some(6));
        let mut named = review.clone();
        named.id = Some("r1".to_owned());

        let events = [review.clone(), review, later, named];
        let graph = aggregate(&events, None, &CollaborationWeights::default());
        assert_eq!(graph.links[0].types.reviews, 3.0);
    }

    #[test]
    fn coedits_from_commits_outside_the_window_are_ignored() {
        let events = [
            commit("c1", "alice", &["src/lib.rs"], 40, 1_000),
            commit("c2", "dave", &["src/lib.rs"], 5, 9_000),
        ];
        let window = WindowRange {
            start_ms: 0,
            end_ms: 5_000,
        };
        let weights = CollaborationWeights::default();

        let full = aggregate(&events, None, &weights);
        assert_close(full.links[0].types.commits, 0.04 + 0.005);

        let graph = aggregate(&events, Some(window), &weights);
        assert_eq!(graph.links.len(), 1);
        let link = &graph.links[0];
        assert_eq!(link.id(), "alice||dave");
        assert_close(link.types.commits, 0.04);
        assert_close(link.weight, 0.04 * weights.commits);
        assert_eq!(link.first, Some(1_000));
        assert_eq!(link.last, Some(1_000));
        assert_eq!(link.sample_events.len(), 1);
    }

    #[test]
    fn weight_matches_weighted_type_sum() {
        let events = [
            event(EventKind::Review, "a", Some("b"), Some(1)),
            event(EventKind::Assign, "b", Some("a"), Some(2)),
            event(EventKind::Comment, "a", Some("b"), Some(3)),
            event(EventKind::Comment, "c", Some("a"), Some(4)),
        ];
        let weights = CollaborationWeights {
            commits: 3.0,
            reviews: 1.5,
            pull_requests: 7.0,
            assigns: 0.25,
            discussion: 2.0,
        };
        let graph = aggregate(&events, None, &weights);
        for link in &graph.links {
            assert_eq!(link.weight, link.types.weighted(&weights));
        }
    }

    #[test]
    fn unfiltered_graph_keeps_every_participant() {
        let events = [
            event(EventKind::Review, "x", Some("y"), Some(1)),
            event(EventKind::PullRequest { pr_id: Some("7".to_owned()) }, "loner", None, Some(2)),
            event(EventKind::Comment, "self", Some("self"), Some(3)),
        ];
        let graph = aggregate(&events, None, &CollaborationWeights::default());
        let ids = graph.nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["loner", "self", "x", "y"]);
        assert_eq!(graph.links.len(), 1);
    }

    #[test]
    fn window_drops_inactive_people_and_undated_events() {
        let events = [
            event(EventKind::Review, "x", Some("y"), Some(10)),
            event(EventKind::Review, "p", Some("q"), Some(500)),
            event(EventKind::Assign, "x", Some("z"), None),
        ];
        let window = WindowRange {
            start_ms: 0,
            end_ms: 100,
        };
        let graph = aggregate(&events, Some(window), &CollaborationWeights::default());
        let ids = graph.nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["x", "y"]);
        assert_eq!(graph.links.len(), 1);
    }

    #[test]
    fn sizes_are_rescaled_into_radius_range() {
        let events = [
            event(EventKind::Review, "a", Some("b"), None),
            event(EventKind::Review, "a", Some("c"), None),
            event(EventKind::Review, "a", Some("d"), None),
        ];
        let graph = aggregate(&events, None, &CollaborationWeights::default());
        let a = graph.node("a").expect("a");
        let b = graph.node("b").expect("b");
        assert_eq!(a.size, MAX_NODE_RADIUS);
        assert_eq!(b.size, MIN_NODE_RADIUS);

        let flat = aggregate(&events[..1], None, &CollaborationWeights::default());
        assert!(flat.nodes.iter().all(|node| node.size == 12.0));
    }

    #[test]
    fn aggregation_is_repeatable() {
        let events = [
            commit("c1", "alice", &["a.py"], 3, 1_000),
            commit("c2", "bob", &["a.py"], 4, 2_000),
            event(EventKind::Comment, "alice", Some("bob"), Some(3_000)),
        ];
        let weights = CollaborationWeights::default();
        let window = Some(WindowRange {
            start_ms: 0,
            end_ms: 2_500,
        });
        assert_eq!(aggregate(&events, window, &weights), aggregate(&events, window, &weights));
    }
}
