use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::events::Event;

pub const MIN_NODE_RADIUS: f64 = 4.0;
pub const MAX_NODE_RADIUS: f64 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkCategory {
    Commits,
    Reviews,
    PullRequests,
    Assigns,
    Discussion,
}

impl LinkCategory {
    pub const ALL: [Self; 5] = [
        Self::Commits,
        Self::Reviews,
        Self::PullRequests,
        Self::Assigns,
        Self::Discussion,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Commits => "commits",
            Self::Reviews => "reviews",
            Self::PullRequests => "pull requests",
            Self::Assigns => "assigns",
            Self::Discussion => "discussion",
        }
    }
}

/// Per-category contribution totals on a link. Commit totals are fractional because
/// co-edits are weighted by their line delta.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTypes {
    pub commits: f64,
    pub reviews: f64,
    pub pull_requests: f64,
    pub assigns: f64,
    pub discussion: f64,
}

impl LinkTypes {
    pub fn get(&self, category: LinkCategory) -> f64 {
        match category {
            LinkCategory::Commits => self.commits,
            LinkCategory::Reviews => self.reviews,
            LinkCategory::PullRequests => self.pull_requests,
            LinkCategory::Assigns => self.assigns,
            LinkCategory::Discussion => self.discussion,
        }
    }

    pub fn add(&mut self, category: LinkCategory, amount: f64) {
        let slot = match category {
            LinkCategory::Commits => &mut self.commits,
            LinkCategory::Reviews => &mut self.reviews,
            LinkCategory::PullRequests => &mut self.pull_requests,
            LinkCategory::Assigns => &mut self.assigns,
            LinkCategory::Discussion => &mut self.discussion,
        };
        *slot += amount;
    }

    pub fn total(&self) -> f64 {
        LinkCategory::ALL
            .iter()
            .map(|&category| self.get(category))
            .sum()
    }

    pub fn weighted(&self, weights: &CollaborationWeights) -> f64 {
        LinkCategory::ALL
            .iter()
            .map(|&category| self.get(category) * weights.get(category))
            .sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationWeights {
    pub commits: f64,
    pub reviews: f64,
    pub pull_requests: f64,
    pub assigns: f64,
    pub discussion: f64,
}

impl Default for CollaborationWeights {
    fn default() -> Self {
        Self {
            commits: 1.0,
            reviews: 2.0,
            pull_requests: 2.0,
            assigns: 1.0,
            discussion: 0.5,
        }
    }
}

impl CollaborationWeights {
    pub fn get(&self, category: LinkCategory) -> f64 {
        match category {
            LinkCategory::Commits => self.commits,
            LinkCategory::Reviews => self.reviews,
            LinkCategory::PullRequests => self.pull_requests,
            LinkCategory::Assigns => self.assigns,
            LinkCategory::Discussion => self.discussion,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    /// Raw contribution count before size normalization.
    pub activity: u64,
    /// Visual radius in `[MIN_NODE_RADIUS, MAX_NODE_RADIUS]`.
    pub size: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub weight: f64,
    pub types: LinkTypes,
    pub first: Option<i64>,
    pub last: Option<i64>,
    #[serde(skip)]
    pub sample_events: Vec<Event>,
}

impl Link {
    pub fn id(&self) -> String {
        link_id(&self.source, &self.target)
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn other_end(&self, node_id: &str) -> Option<&str> {
        if self.source == node_id {
            Some(&self.target)
        } else if self.target == node_id {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Order-independent link key: the lexicographically smaller id, `||`, then the larger.
pub fn link_id(a: &str, b: &str) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}||{high}")
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CollabGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl CollabGraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn link(&self, id: &str) -> Option<&Link> {
        self.links.iter().find(|link| link.id() == id)
    }

    pub fn links_for_node<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |link| link.touches(node_id))
    }

    /// The node itself plus every node sharing a link with it.
    pub fn connected_node_ids(&self, node_id: &str) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        ids.insert(node_id.to_owned());
        for link in self.links_for_node(node_id) {
            if let Some(other) = link.other_end(node_id) {
                ids.insert(other.to_owned());
            }
        }
        ids
    }
}

/// One row of the contributing-events table.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordRow {
    pub kind: &'static str,
    pub actor: String,
    pub target: String,
    pub timestamp_ms: Option<i64>,
    pub lines: Option<(u64, u64)>,
}

impl RecordRow {
    fn from_event(event: &Event) -> Self {
        Self {
            kind: event.kind.label(),
            actor: event.actor.clone().unwrap_or_default(),
            target: event.target.clone().unwrap_or_default(),
            timestamp_ms: event.timestamp_ms,
            lines: event.kind.line_delta(),
        }
    }
}

/// Sample events of the given links as table rows, newest first; undated rows sort last.
pub fn record_rows<'a>(links: impl IntoIterator<Item = &'a Link>) -> Vec<RecordRow> {
    let mut rows = links
        .into_iter()
        .flat_map(|link| link.sample_events.iter().map(RecordRow::from_event))
        .collect::<Vec<_>>();
    rows.sort_by(|a, b| b.timestamp_ms.cmp(&a.timestamp_ms));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    fn link(source: &str, target: &str) -> Link {
        Link {
            source: source.to_owned(),
            target: target.to_owned(),
            weight: 1.0,
            types: LinkTypes::default(),
            first: None,
            last: None,
            sample_events: Vec::new(),
        }
    }

    #[test]
    fn link_id_is_symmetric() {
        assert_eq!(link_id("alice", "bob"), "alice||bob");
        assert_eq!(link_id("bob", "alice"), "alice||bob");
        assert_eq!(link("bob", "alice").id(), link("alice", "bob").id());
    }

    #[test]
    fn weighted_sum_uses_every_category() {
        let mut types = LinkTypes::default();
        types.add(LinkCategory::Commits, 0.5);
        types.add(LinkCategory::Reviews, 2.0);
        types.add(LinkCategory::Discussion, 4.0);
        let weights = CollaborationWeights::default();
        assert_eq!(types.weighted(&weights), 0.5 + 4.0 + 2.0);
        assert_eq!(types.total(), 6.5);
    }

    #[test]
    fn neighbours_include_the_node_itself() {
        let graph = CollabGraph {
            nodes: Vec::new(),
            links: vec![link("a", "b"), link("c", "a"), link("c", "d")],
        };
        let ids = graph.connected_node_ids("a");
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), ["a", "b", "c"]);
    }

    #[test]
    fn records_are_newest_first() {
        let event = |id: &str, timestamp_ms: Option<i64>| Event {
            id: Some(id.to_owned()),
            kind: EventKind::Review,
            actor: Some("a".to_owned()),
            target: Some("b".to_owned()),
            timestamp_ms,
        };
        let mut first = link("a", "b");
        first.sample_events = vec![event("1", Some(10)), event("2", None)];
        let mut second = link("a", "c");
        second.sample_events = vec![event("3", Some(30))];

        let rows = record_rows([&first, &second]);
        let stamps = rows.iter().map(|row| row.timestamp_ms).collect::<Vec<_>>();
        assert_eq!(stamps, [Some(30), Some(10), None]);
        assert_eq!(rows[0].kind, "review");
    }
}
