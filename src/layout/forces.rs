use std::f64::consts::TAU;

use crate::geometry::{Vec2, vec2};

use super::quadtree::QuadNode;

/// A link resolved to node indices, with its per-link force constants.
#[derive(Clone, Debug)]
pub(super) struct SpringLink {
    pub(super) source: usize,
    pub(super) target: usize,
    pub(super) weight: f64,
    pub(super) distance: f64,
    pub(super) strength: f64,
    pub(super) bias: f64,
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f64,
    pub(super) max_reach_sq: f64,
}

/// Tiny deterministic offset used when two bodies coincide exactly.
fn separation_hint(from: usize, to: usize) -> Vec2 {
    let angle = ((from as f64) * 0.618_034 + (to as f64) * 0.414_214) * TAU;
    vec2(angle.cos(), angle.sin()) * 1e-6
}

/// Spring pull toward each link's rest distance, evaluated on next-step positions and
/// split between the ends by degree.
pub(super) fn apply_links(links: &[SpringLink], positions: &[Vec2], velocities: &mut [Vec2], alpha: f64) {
    for link in links {
        let (source, target) = (link.source, link.target);
        if source == target {
            continue;
        }

        let mut delta =
            (positions[target] + velocities[target]) - (positions[source] + velocities[source]);
        if delta.length_squared() == 0.0 {
            delta = separation_hint(source, target);
        }

        let length = delta.length();
        let scaled = delta * (((length - link.distance) / length) * alpha * link.strength);
        velocities[target] -= scaled * link.bias;
        velocities[source] += scaled * (1.0 - link.bias);
    }
}

fn softened(distance_sq: f64) -> f64 {
    if distance_sq < 1.0 {
        distance_sq.sqrt()
    } else {
        distance_sq
    }
}

/// Barnes–Hut many-body force on one node. A negative `strength` repels.
pub(super) fn accumulate_charge(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    strength: f64,
    alpha: f64,
    theta_sq: f64,
    velocity: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other in &node.indices {
            if other == index {
                continue;
            }
            let mut delta = positions[other] - point;
            if delta.length_squared() == 0.0 {
                delta = separation_hint(index, other);
            }
            *velocity += delta * (strength * alpha / softened(delta.length_squared()));
        }
        return;
    }

    let delta = node.center_of_mass - point;
    let distance_sq = delta.length_squared();
    let side = node.bounds.side_length();
    if !node.bounds.contains(point) && (side * side) / theta_sq < distance_sq {
        *velocity += delta * (strength * node.mass * alpha / softened(distance_sq));
        return;
    }

    for child in node.children() {
        accumulate_charge(child, index, positions, strength, alpha, theta_sq, velocity);
    }
}

fn resolve_overlap(
    from: usize,
    to: usize,
    predicted: &[Vec2],
    radii: &[f64],
    strength: f64,
    velocities: &mut [Vec2],
) {
    let reach = radii[from] + radii[to];
    let mut delta = predicted[from] - predicted[to];
    if delta.length_squared() >= reach * reach {
        return;
    }
    if delta.length_squared() == 0.0 {
        delta = separation_hint(from, to);
    }

    let distance = delta.length();
    let push = delta * (((reach - distance) / distance) * strength);
    let from_sq = radii[from] * radii[from];
    let to_sq = radii[to] * radii[to];
    let share = if from_sq + to_sq > 0.0 { to_sq / (from_sq + to_sq) } else { 0.5 };

    velocities[from] += push * share;
    velocities[to] -= push * (1.0 - share);
}

/// Dual-tree walk over every pair of cells close enough to hold overlapping circles.
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    predicted: &[Vec2],
    radii: &[f64],
    params: CollisionParams,
    velocities: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_reach_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    resolve_overlap(from, to, predicted, radii, params.strength, velocities);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    resolve_overlap(from, to, predicted, radii, params.strength, velocities);
                }
            }
        }
        return;
    }

    if same_node {
        let children = node_a.children().collect::<Vec<_>>();
        for (first, child_a) in children.iter().enumerate() {
            accumulate_collision_pairs(child_a, child_a, true, predicted, radii, params, velocities);
            for child_b in &children[first + 1..] {
                accumulate_collision_pairs(
                    child_a, child_b, false, predicted, radii, params, velocities,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children() {
            accumulate_collision_pairs(child, node_b, false, predicted, radii, params, velocities);
        }
    } else {
        for child in node_b.children() {
            accumulate_collision_pairs(node_a, child, false, predicted, radii, params, velocities);
        }
    }
}

/// Independent pull of every node toward the origin on both axes.
pub(super) fn apply_position_pull(positions: &[Vec2], velocities: &mut [Vec2], strength: f64, alpha: f64) {
    for (position, velocity) in positions.iter().zip(velocities.iter_mut()) {
        *velocity -= *position * (strength * alpha);
    }
}

/// Translates the whole layout so its centroid sits on the origin.
pub(super) fn center_positions(positions: &mut [Vec2]) {
    if positions.is_empty() {
        return;
    }

    let mut centroid = Vec2::ZERO;
    for position in positions.iter() {
        centroid += *position;
    }
    centroid /= positions.len() as f64;

    for position in positions.iter_mut() {
        *position -= centroid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spring(distance: f64) -> SpringLink {
        SpringLink {
            source: 0,
            target: 1,
            weight: 1.0,
            distance,
            strength: 1.0,
            bias: 0.5,
        }
    }

    #[test]
    fn stretched_spring_pulls_ends_together() {
        let positions = [vec2(0.0, 0.0), vec2(100.0, 0.0)];
        let mut velocities = [Vec2::ZERO; 2];
        apply_links(&[spring(50.0)], &positions, &mut velocities, 1.0);
        assert!(velocities[0].x > 0.0);
        assert!(velocities[1].x < 0.0);
        assert_eq!(velocities[0].x, -velocities[1].x);
    }

    #[test]
    fn compressed_spring_pushes_ends_apart() {
        let positions = [vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let mut velocities = [Vec2::ZERO; 2];
        apply_links(&[spring(50.0)], &positions, &mut velocities, 1.0);
        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
    }

    #[test]
    fn negative_charge_repels() {
        let positions = [vec2(0.0, 0.0), vec2(10.0, 0.0), vec2(0.0, 10.0)];
        let tree = QuadNode::build(&positions).expect("tree");
        let mut velocity = Vec2::ZERO;
        accumulate_charge(&tree, 0, &positions, -100.0, 1.0, 0.81, &mut velocity);
        assert!(velocity.x < 0.0);
        assert!(velocity.y < 0.0);
    }

    #[test]
    fn overlapping_circles_are_pushed_apart() {
        let predicted = [vec2(0.0, 0.0), vec2(5.0, 0.0), vec2(500.0, 0.0)];
        let radii = [10.0, 10.0, 10.0];
        let tree = QuadNode::build(&predicted).expect("tree");
        let mut velocities = [Vec2::ZERO; 3];
        accumulate_collision_pairs(
            &tree,
            &tree,
            true,
            &predicted,
            &radii,
            CollisionParams {
                strength: 1.0,
                max_reach_sq: 400.0,
            },
            &mut velocities,
        );
        assert!(velocities[0].x < 0.0);
        assert!(velocities[1].x > 0.0);
        assert_eq!(velocities[2], Vec2::ZERO);
    }

    #[test]
    fn centering_moves_centroid_to_origin() {
        let mut positions = [vec2(10.0, 10.0), vec2(30.0, -10.0)];
        center_positions(&mut positions);
        assert_eq!(positions, [vec2(-10.0, 10.0), vec2(10.0, -10.0)]);
    }
}
