//! Force-directed relaxation of the collaboration graph.
//!
//! A [`LayoutSession`] owns node positions for one topology. Each tick applies link
//! springs, Barnes–Hut repulsion, collision, a pull toward the origin and recentering, with
//! the step size governed by a cooling `alpha`.

mod forces;
mod quadtree;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::geometry::{MAX_LINK_DISTANCE, MIN_LINK_DISTANCE, MIN_WEIGHT, Vec2, clamp_link_distance, vec2};
use crate::graph::{Link, MIN_NODE_RADIUS, Node};
use forces::{
    CollisionParams, SpringLink, accumulate_charge, accumulate_collision_pairs, apply_links,
    apply_position_pull, center_positions,
};
use quadtree::QuadNode;

pub const MAX_CLUSTER_STRENGTH: f64 = 0.5;
pub const DEFAULT_CLUSTER_DISTANCE: f64 = MAX_CLUSTER_STRENGTH * 0.7;
pub const DEFAULT_DISTANCE_SCALE: f64 = 10.0;
pub const NODE_MIN_PADDING: f64 = 20.0;
pub const CHARGE_STRENGTH: f64 = -100.0;
pub const COLLISION_STRENGTH: f64 = 0.8;
pub const INITIAL_ALPHA: f64 = 0.5;
pub const RESTART_ALPHA: f64 = 0.3;
pub const DRAG_RELEASE_ALPHA_TARGET: f64 = 0.1;
pub const RELEASE_SUSTAIN_TICKS: u32 = 120;
pub const INITIAL_SETTLE_TICKS: usize = 60;
pub const FILTERED_SETTLE_TICKS: usize = 80;

const ALPHA_MIN: f64 = 0.001;
const VELOCITY_DECAY: f64 = 0.4;
const BARNES_HUT_THETA: f64 = 0.9;
const INITIAL_JITTER: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutParams {
    pub distance_scale: f64,
    /// Larger values weaken the pull toward the origin, spreading clusters apart.
    pub cluster_distance: f64,
    pub charge_strength: f64,
    pub collision_strength: f64,
    pub node_padding: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            distance_scale: DEFAULT_DISTANCE_SCALE,
            cluster_distance: DEFAULT_CLUSTER_DISTANCE,
            charge_strength: CHARGE_STRENGTH,
            collision_strength: COLLISION_STRENGTH,
            node_padding: NODE_MIN_PADDING,
        }
    }
}

impl LayoutParams {
    pub fn cluster_strength(&self) -> f64 {
        (MAX_CLUSTER_STRENGTH - self.cluster_distance).max(0.0)
    }
}

/// Partial parameter change applied to a live session.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ParamsUpdate {
    pub distance_scale: Option<f64>,
    pub cluster_distance: Option<f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    pub size: f64,
    pub position: Vec2,
    pub velocity: Vec2,
    /// Fixed coordinates while the node is held by a drag.
    pub pinned: Option<Vec2>,
}

impl LayoutNode {
    pub fn is_pinned(&self) -> bool {
        self.pinned.is_some()
    }
}

/// A link whose endpoints both exist in the session, by node index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedLink {
    pub source: usize,
    pub target: usize,
    pub weight: f64,
}

#[derive(Default)]
struct ForceScratch {
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    predicted: Vec<Vec2>,
    radii: Vec<f64>,
}

pub struct LayoutSession {
    nodes: Vec<LayoutNode>,
    index: HashMap<String, usize>,
    links: Vec<SpringLink>,
    params: LayoutParams,
    alpha: f64,
    alpha_target: f64,
    alpha_decay: f64,
    release_ticks_left: u32,
    scratch: ForceScratch,
}

impl LayoutSession {
    /// Builds a session with entropy-seeded starting jitter.
    pub fn build(nodes: &[Node], links: &[Link], params: LayoutParams) -> Self {
        Self::build_with_rng(nodes, links, params, &mut StdRng::from_entropy())
    }

    /// Builds a session whose starting positions are reproducible for a given seed.
    pub fn build_seeded(nodes: &[Node], links: &[Link], params: LayoutParams, seed: u64) -> Self {
        Self::build_with_rng(nodes, links, params, &mut StdRng::seed_from_u64(seed))
    }

    fn build_with_rng(nodes: &[Node], links: &[Link], params: LayoutParams, rng: &mut StdRng) -> Self {
        let mut layout_nodes = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());
        for node in nodes {
            if index.contains_key(&node.id) {
                continue;
            }
            index.insert(node.id.clone(), layout_nodes.len());
            layout_nodes.push(LayoutNode {
                id: node.id.clone(),
                size: node.size,
                position: vec2(
                    rng.gen_range(-INITIAL_JITTER..INITIAL_JITTER),
                    rng.gen_range(-INITIAL_JITTER..INITIAL_JITTER),
                ),
                velocity: Vec2::ZERO,
                pinned: None,
            });
        }

        let mut springs = Vec::with_capacity(links.len());
        let mut unresolved = 0usize;
        for link in links {
            match (index.get(&link.source), index.get(&link.target)) {
                (Some(&source), Some(&target)) if source != target => springs.push(SpringLink {
                    source,
                    target,
                    weight: link.weight,
                    distance: clamp_link_distance(params.distance_scale, link.weight),
                    strength: 0.0,
                    bias: 0.5,
                }),
                _ => unresolved += 1,
            }
        }
        if unresolved > 0 {
            debug!(unresolved, "dropped links with endpoints outside the node set");
        }

        let mut degree = vec![0usize; layout_nodes.len()];
        for spring in &springs {
            degree[spring.source] += 1;
            degree[spring.target] += 1;
        }
        for spring in &mut springs {
            let (source, target) = (degree[spring.source] as f64, degree[spring.target] as f64);
            spring.strength = 1.0 / source.min(target);
            spring.bias = source / (source + target);
        }

        Self {
            nodes: layout_nodes,
            index,
            links: springs,
            params,
            alpha: 1.0,
            alpha_target: 0.0,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / 300.0),
            release_ticks_left: 0,
            scratch: ForceScratch::default(),
        }
    }

    /// Reheats to the initial energy and advances `ticks` steps before positions are shown.
    pub fn settle(&mut self, ticks: usize) {
        self.alpha = INITIAL_ALPHA;
        for _ in 0..ticks {
            self.tick();
        }
        debug!(
            ticks,
            nodes = self.nodes.len(),
            links = self.links.len(),
            alpha = self.alpha,
            "settled layout"
        );
    }

    /// Advances the simulation by one step. Returns whether it is still above the rest
    /// threshold afterwards.
    pub fn tick(&mut self) -> bool {
        if self.release_ticks_left > 0 {
            self.release_ticks_left -= 1;
            if self.release_ticks_left == 0 {
                self.alpha_target = 0.0;
            }
        }
        self.alpha += (self.alpha_target - self.alpha) * self.alpha_decay;
        let alpha = self.alpha;

        let scratch = &mut self.scratch;
        scratch.positions.clear();
        scratch.velocities.clear();
        scratch.radii.clear();
        let mut max_radius = 0.0_f64;
        for node in &self.nodes {
            let radius = node.size.max(MIN_NODE_RADIUS) + (self.params.node_padding / 2.0);
            scratch.positions.push(node.position);
            scratch.velocities.push(node.velocity);
            scratch.radii.push(radius);
            max_radius = max_radius.max(radius);
        }

        let positions = &mut scratch.positions;
        let velocities = &mut scratch.velocities;

        apply_links(&self.links, positions, velocities, alpha);

        if self.params.charge_strength != 0.0
            && let Some(tree) = QuadNode::build(positions)
        {
            let theta_sq = BARNES_HUT_THETA * BARNES_HUT_THETA;
            for (index, velocity) in velocities.iter_mut().enumerate() {
                accumulate_charge(
                    &tree,
                    index,
                    positions,
                    self.params.charge_strength,
                    alpha,
                    theta_sq,
                    velocity,
                );
            }
        }

        if self.params.collision_strength > 0.0 {
            scratch.predicted.clear();
            scratch
                .predicted
                .extend(positions.iter().zip(velocities.iter()).map(|(p, v)| *p + *v));
            if let Some(tree) = QuadNode::build(&scratch.predicted) {
                let reach = max_radius * 2.0;
                accumulate_collision_pairs(
                    &tree,
                    &tree,
                    true,
                    &scratch.predicted,
                    &scratch.radii,
                    CollisionParams {
                        strength: self.params.collision_strength,
                        max_reach_sq: reach * reach,
                    },
                    velocities,
                );
            }
        }

        apply_position_pull(positions, velocities, self.params.cluster_strength(), alpha);
        center_positions(positions);

        for (node, (position, velocity)) in self
            .nodes
            .iter_mut()
            .zip(positions.iter().zip(velocities.iter()))
        {
            match node.pinned {
                Some(fixed) => {
                    node.position = fixed;
                    node.velocity = Vec2::ZERO;
                }
                None => {
                    node.velocity = *velocity * (1.0 - VELOCITY_DECAY);
                    node.position = *position + node.velocity;
                }
            }
        }

        self.is_active()
    }

    pub fn is_active(&self) -> bool {
        self.alpha >= ALPHA_MIN
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f64 {
        self.alpha_target
    }

    /// Injects energy so the layout visibly relaxes again.
    pub fn restart(&mut self) {
        self.alpha = self.alpha.max(RESTART_ALPHA);
    }

    pub fn params(&self) -> LayoutParams {
        self.params
    }

    /// Swaps link distances and cluster pull in place, keeping every position.
    pub fn reparameterize(&mut self, update: ParamsUpdate) {
        if let Some(distance_scale) = update.distance_scale {
            self.params.distance_scale = distance_scale;
            for spring in &mut self.links {
                spring.distance = clamp_link_distance(distance_scale, spring.weight);
            }
        }
        if let Some(cluster_distance) = update.cluster_distance {
            self.params.cluster_distance = cluster_distance.clamp(0.0, MAX_CLUSTER_STRENGTH);
        }
        self.alpha = RESTART_ALPHA;
    }

    /// Holds a node at `point` until [`unpin`](Self::unpin). Returns `false` for unknown ids.
    pub fn pin(&mut self, id: &str, point: Vec2) -> bool {
        let Some(&index) = self.index.get(id) else {
            return false;
        };
        let node = &mut self.nodes[index];
        node.position = point;
        node.pinned = Some(point);
        self.alpha = self.alpha.max(RESTART_ALPHA);
        true
    }

    /// Releases a held node and keeps the layout gently warm while it settles.
    pub fn unpin(&mut self, id: &str) -> bool {
        let Some(&index) = self.index.get(id) else {
            return false;
        };
        self.nodes[index].pinned = None;
        self.alpha_target = DRAG_RELEASE_ALPHA_TARGET;
        self.alpha = self.alpha.max(DRAG_RELEASE_ALPHA_TARGET);
        self.release_ticks_left = RELEASE_SUSTAIN_TICKS;
        true
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.index.get(id).map(|&index| &self.nodes[index])
    }

    pub fn position(&self, id: &str) -> Option<Vec2> {
        self.node(id).map(|node| node.position)
    }

    pub fn resolved_links(&self) -> impl Iterator<Item = ResolvedLink> + '_ {
        self.links.iter().map(|spring| ResolvedLink {
            source: spring.source,
            target: spring.target,
            weight: spring.weight,
        })
    }

    pub fn link_distances(&self) -> impl Iterator<Item = f64> + '_ {
        self.links.iter().map(|spring| spring.distance)
    }
}

/// Distance scale that makes an average link roughly a sixth of the smaller viewport side.
pub fn auto_distance_scale(links: &[Link], width: f64, height: f64) -> f64 {
    if links.is_empty() {
        return DEFAULT_DISTANCE_SCALE;
    }

    let total = links
        .iter()
        .map(|link| {
            let weight = if link.weight.is_finite() { link.weight } else { 0.0 };
            weight.max(MIN_WEIGHT)
        })
        .sum::<f64>();
    let mean_weight = total / links.len() as f64;

    let target_length = (width.min(height) / 6.0)
        .max(MIN_LINK_DISTANCE)
        .min(MAX_LINK_DISTANCE / 2.0);
    (target_length * mean_weight).round().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::LinkTypes;

    fn node(id: &str, size: f64) -> Node {
        Node {
            id: id.to_owned(),
            activity: 1,
            size,
        }
    }

    fn link(source: &str, target: &str, weight: f64) -> Link {
        Link {
            source: source.to_owned(),
            target: target.to_owned(),
            weight,
            types: LinkTypes::default(),
            first: None,
            last: None,
            sample_events: Vec::new(),
        }
    }

    fn triangle() -> (Vec<Node>, Vec<Link>) {
        (
            vec![node("a", 12.0), node("b", 12.0), node("c", 4.0), node("d", 20.0)],
            vec![link("a", "b", 2.0), link("b", "c", 1.0), link("c", "a", 0.5)],
        )
    }

    #[test]
    fn seeded_sessions_are_reproducible() {
        let (nodes, links) = triangle();
        let mut first = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 7);
        let mut second = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 7);
        first.settle(INITIAL_SETTLE_TICKS);
        second.settle(INITIAL_SETTLE_TICKS);
        assert_eq!(first.nodes(), second.nodes());
    }

    #[test]
    fn initial_jitter_is_small() {
        let (nodes, links) = triangle();
        let session = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 1);
        for node in session.nodes() {
            assert!(node.position.x.abs() <= INITIAL_JITTER);
            assert!(node.position.y.abs() <= INITIAL_JITTER);
        }
    }

    #[test]
    fn settling_keeps_positions_finite_and_separated() {
        let (nodes, links) = triangle();
        let mut session = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 3);
        session.settle(300);

        for node in session.nodes() {
            assert!(node.position.is_finite(), "{} diverged", node.id);
        }
        let a = session.position("a").expect("a");
        let b = session.position("b").expect("b");
        assert!(a.distance(b) > 12.0, "nodes overlap: {a:?} {b:?}");
    }

    #[test]
    fn unresolved_links_are_dropped() {
        let nodes = vec![node("a", 4.0), node("b", 4.0)];
        let links = vec![link("a", "b", 1.0), link("a", "ghost", 1.0), link("a", "a", 1.0)];
        let session = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 1);
        assert_eq!(session.resolved_links().count(), 1);
    }

    #[test]
    fn degree_sets_strength_and_bias() {
        let nodes = vec![node("hub", 4.0), node("x", 4.0), node("y", 4.0)];
        let links = vec![link("hub", "x", 1.0), link("hub", "y", 1.0)];
        let session = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 1);
        let spring = &session.links[0];
        assert_eq!(spring.strength, 1.0);
        assert!((spring.bias - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn pinned_node_stays_put_and_release_clears_pin() {
        let (nodes, links) = triangle();
        let mut session = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 5);
        session.settle(INITIAL_SETTLE_TICKS);

        assert!(session.pin("a", vec2(50.0, 50.0)));
        for _ in 0..10 {
            session.tick();
        }
        assert_eq!(session.position("a"), Some(vec2(50.0, 50.0)));
        assert!(session.alpha() >= 0.2);

        assert!(session.unpin("a"));
        let released = session.node("a").expect("a");
        assert!(released.pinned.is_none());
        assert_eq!(released.position, vec2(50.0, 50.0));
        assert_eq!(session.alpha_target(), DRAG_RELEASE_ALPHA_TARGET);
        assert!(!session.pin("ghost", Vec2::ZERO));
    }

    #[test]
    fn release_sustain_expires() {
        let (nodes, links) = triangle();
        let mut session = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 5);
        session.unpin("a");
        for _ in 0..RELEASE_SUSTAIN_TICKS {
            session.tick();
        }
        assert_eq!(session.alpha_target(), 0.0);
        for _ in 0..2_000 {
            if !session.tick() {
                break;
            }
        }
        assert!(!session.is_active());
    }

    #[test]
    fn reparameterize_keeps_positions_and_reheats() {
        let (nodes, links) = triangle();
        let mut session = LayoutSession::build_seeded(&nodes, &links, LayoutParams::default(), 9);
        session.settle(INITIAL_SETTLE_TICKS);
        let before = session.nodes().to_vec();

        session.reparameterize(ParamsUpdate {
            distance_scale: Some(200.0),
            cluster_distance: Some(0.9),
        });

        assert_eq!(session.nodes(), &before[..]);
        assert_eq!(session.alpha(), RESTART_ALPHA);
        assert_eq!(session.params().cluster_distance, MAX_CLUSTER_STRENGTH);
        assert_eq!(session.params().cluster_strength(), 0.0);
        let distances = session.link_distances().collect::<Vec<_>>();
        assert_eq!(distances, [100.0, 200.0, 400.0]);
    }

    #[test]
    fn auto_distance_scale_tracks_viewport_and_weights() {
        assert_eq!(auto_distance_scale(&[], 800.0, 600.0), DEFAULT_DISTANCE_SCALE);
        let links = [link("a", "b", 2.0), link("b", "c", 0.0)];
        // mean weight (2 + 0.1) / 2, target length 600 / 6
        assert_eq!(auto_distance_scale(&links, 800.0, 600.0), 105.0);
        // small viewports floor the target length at the minimum link distance
        assert_eq!(auto_distance_scale(&links, 30.0, 30.0), 21.0);
    }
}
