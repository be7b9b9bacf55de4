use std::time::Duration;

use super::ViewTransform;

pub fn ease_in_out_quad(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        2.0 * t * t
    } else {
        -1.0 + (4.0 - 2.0 * t) * t
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Eased interpolation between two transforms, advanced explicitly by the host loop.
#[derive(Clone, Debug, PartialEq)]
pub struct TransformAnimation {
    from: ViewTransform,
    to: ViewTransform,
    duration: Duration,
    elapsed: Duration,
}

impl TransformAnimation {
    pub fn new(from: ViewTransform, to: ViewTransform, duration: Duration) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: Duration::ZERO,
        }
    }

    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        (self.elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    pub fn is_finished(&self) -> bool {
        self.progress() >= 1.0
    }

    pub fn current(&self) -> ViewTransform {
        let t = ease_in_out_quad(self.progress());
        ViewTransform {
            x: lerp(self.from.x, self.to.x, t),
            y: lerp(self.from.y, self.to.y, t),
            k: lerp(self.from.k, self.to.k, t),
        }
    }

    pub fn advance(&mut self, dt: Duration) -> ViewTransform {
        self.elapsed = self.elapsed.saturating_add(dt).min(self.duration);
        if self.is_finished() {
            return self.to;
        }
        self.current()
    }
}
