pub use glam::{DVec2 as Vec2, dvec2 as vec2};

pub const MIN_WEIGHT: f64 = 0.1;
pub const MIN_LINK_DISTANCE: f64 = 20.0;
pub const MAX_LINK_DISTANCE: f64 = 400.0;

/// Axis-aligned bounding box in graph space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    /// Returns `None` for an empty input or when any coordinate is not finite.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Option<Self> {
        Self::from_circles(points.into_iter().map(|point| (point, 0.0)))
    }

    /// Bounds of a set of circles, each inflated by its radius.
    pub fn from_circles(circles: impl IntoIterator<Item = (Vec2, f64)>) -> Option<Self> {
        let mut min = Vec2::INFINITY;
        let mut max = Vec2::NEG_INFINITY;

        for (center, radius) in circles {
            let reach = Vec2::splat(radius.max(0.0));
            min = min.min(center - reach);
            max = max.max(center + reach);
        }

        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        Some(Self { min, max })
    }

    pub fn center(self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn width(self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn contains(self, point: Vec2) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

/// Target separation for a link of the given weight.
///
/// Heavier links sit closer together; the weight is floored at [`MIN_WEIGHT`] and the
/// result is clamped to `[MIN_LINK_DISTANCE, MAX_LINK_DISTANCE]`.
pub fn clamp_link_distance(distance_scale: f64, weight: f64) -> f64 {
    let weight = if weight.is_finite() { weight } else { 0.0 };
    let effective = weight.max(MIN_WEIGHT);
    let raw = distance_scale / effective;
    if raw.is_nan() {
        return MIN_LINK_DISTANCE;
    }
    raw.clamp(MIN_LINK_DISTANCE, MAX_LINK_DISTANCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_distance_is_clamped_both_ways() {
        assert_eq!(clamp_link_distance(10.0, 100.0), MIN_LINK_DISTANCE);
        assert_eq!(clamp_link_distance(10.0, 0.0), 100.0);
        assert_eq!(clamp_link_distance(1000.0, 0.0), MAX_LINK_DISTANCE);
        assert_eq!(clamp_link_distance(60.0, 2.0), 30.0);
        assert_eq!(clamp_link_distance(60.0, f64::NAN), MAX_LINK_DISTANCE);
    }

    #[test]
    fn bounds_include_radius() {
        let bounds = Bounds::from_circles([(vec2(0.0, 0.0), 5.0), (vec2(10.0, 4.0), 1.0)])
            .expect("bounds");
        assert_eq!(bounds.min, vec2(-5.0, -5.0));
        assert_eq!(bounds.max, vec2(11.0, 5.0));
        assert_eq!(bounds.center(), vec2(3.0, 0.0));
    }

    #[test]
    fn empty_bounds_are_none() {
        assert!(Bounds::from_points(Vec::new()).is_none());
        assert!(Bounds::from_points([vec2(f64::NAN, 0.0)]).is_none());
    }
}
