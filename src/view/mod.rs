//! Screen placement of the graph: pan, zoom toward a point, fit-to-content and eased
//! camera moves.

mod animation;

use std::time::Duration;

use glam::DAffine2;
use serde::Serialize;

use crate::geometry::{Bounds, Vec2, vec2};

pub use animation::{TransformAnimation, ease_in_out_quad};

pub const MIN_ZOOM_SCALE: f64 = 0.2;
pub const MAX_ZOOM_SCALE: f64 = 10.0;
pub const FIT_FILL_FRACTION: f64 = 0.7;
pub const FIT_MARGIN_PX: f64 = 40.0;
pub const CENTER_MAX_ZOOM: f64 = 4.0;
pub const VIEW_ANIMATION_DURATION: Duration = Duration::from_millis(300);
pub const WHEEL_ZOOM_SENSITIVITY: f64 = 0.001;

const MIN_AVAILABLE_SPACE: f64 = 10.0;

/// Affine map `screen = k * graph + (x, y)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ViewTransform {
    pub x: f64,
    pub y: f64,
    pub k: f64,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    fn from_parts(translation: Vec2, k: f64) -> Self {
        Self {
            x: translation.x,
            y: translation.y,
            k,
        }
    }

    pub fn translation(self) -> Vec2 {
        vec2(self.x, self.y)
    }

    pub fn to_affine(self) -> DAffine2 {
        DAffine2::from_scale_angle_translation(Vec2::splat(self.k), 0.0, self.translation())
    }

    pub fn apply(self, point: Vec2) -> Vec2 {
        self.to_affine().transform_point2(point)
    }

    pub fn invert(self, screen: Vec2) -> Vec2 {
        self.to_affine().inverse().transform_point2(screen)
    }

    pub fn panned(self, dx: f64, dy: f64) -> Self {
        Self::from_parts(self.translation() + vec2(dx, dy), self.k)
    }

    /// Rescales by `factor` within `[min_k, max_k]` keeping `anchor` (screen space) fixed.
    pub fn zoomed_at(self, anchor: Vec2, factor: f64, min_k: f64, max_k: f64) -> Self {
        if !factor.is_finite() || factor <= 0.0 {
            return self;
        }
        let k = (self.k * factor).clamp(min_k, max_k);
        let ratio = k / self.k;
        Self::from_parts(anchor - (anchor - self.translation()) * ratio, k)
    }
}

/// On-screen placement of the viewport, for converting absolute pointer positions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub origin: Vec2,
    pub size: Vec2,
}

impl ScreenRect {
    pub fn from_size(width: f64, height: f64) -> Self {
        Self {
            origin: Vec2::ZERO,
            size: vec2(width, height),
        }
    }

    pub fn center(self) -> Vec2 {
        self.origin + self.size * 0.5
    }
}

pub fn screen_to_graph(screen: Vec2, rect: ScreenRect, transform: ViewTransform) -> Vec2 {
    transform.invert(screen - rect.origin)
}

pub fn graph_to_screen(point: Vec2, rect: ScreenRect, transform: ViewTransform) -> Vec2 {
    rect.origin + transform.apply(point)
}

/// How much of the viewport fitted content may use.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitMargin {
    /// Keep content inside this fraction of each viewport dimension.
    Fraction(f64),
    /// Reserve this many pixels on every side.
    Pixels(f64),
}

impl FitMargin {
    fn available(self, extent: f64) -> f64 {
        let available = match self {
            Self::Fraction(fraction) => extent * fraction,
            Self::Pixels(margin) => extent - (margin * 2.0),
        };
        available.max(MIN_AVAILABLE_SPACE)
    }
}

/// Transform that centers `bounds` in a `width × height` viewport at the largest scale
/// that keeps it inside the available space.
pub fn fit_to_bounds(
    bounds: Bounds,
    width: f64,
    height: f64,
    margin: FitMargin,
    min_k: f64,
    max_k: f64,
) -> ViewTransform {
    let content_width = bounds.width().max(1.0);
    let content_height = bounds.height().max(1.0);
    let k = (margin.available(width) / content_width)
        .min(margin.available(height) / content_height)
        .clamp(min_k, max_k);

    let viewport_center = vec2(width, height) * 0.5;
    ViewTransform::from_parts(viewport_center - bounds.center() * k, k)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewConfig {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub fit_fill: f64,
    pub center_margin: f64,
    pub center_max_zoom: f64,
    pub animation_duration: Duration,
    pub wheel_sensitivity: f64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            min_zoom: MIN_ZOOM_SCALE,
            max_zoom: MAX_ZOOM_SCALE,
            fit_fill: FIT_FILL_FRACTION,
            center_margin: FIT_MARGIN_PX,
            center_max_zoom: CENTER_MAX_ZOOM,
            animation_duration: VIEW_ANIMATION_DURATION,
            wheel_sensitivity: WHEEL_ZOOM_SENSITIVITY,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum PanState {
    #[default]
    Idle,
    Panning {
        last: Vec2,
    },
}

/// Owns the current transform and at most one in-flight animation. Coordinates passed in
/// are viewport-local screen pixels.
#[derive(Clone, Debug)]
pub struct ViewController {
    config: ViewConfig,
    width: f64,
    height: f64,
    transform: ViewTransform,
    initial_view: Option<ViewTransform>,
    animation: Option<TransformAnimation>,
    pan: PanState,
}

impl ViewController {
    pub fn new(config: ViewConfig, width: f64, height: f64) -> Self {
        Self {
            config,
            width,
            height,
            transform: ViewTransform::IDENTITY,
            initial_view: None,
            animation: None,
            pan: PanState::Idle,
        }
    }

    pub fn config(&self) -> ViewConfig {
        self.config
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn set_transform(&mut self, transform: ViewTransform) {
        self.animation = None;
        self.transform = transform;
    }

    pub fn viewport(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.width = width;
        self.height = height;
    }

    pub fn initial_view(&self) -> Option<ViewTransform> {
        self.initial_view
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn pan_state(&self) -> PanState {
        self.pan
    }

    pub fn screen_to_graph(&self, screen: Vec2) -> Vec2 {
        self.transform.invert(screen)
    }

    pub fn graph_to_screen(&self, point: Vec2) -> Vec2 {
        self.transform.apply(point)
    }

    fn fit_transform(&self, circles: impl IntoIterator<Item = (Vec2, f64)>) -> Option<ViewTransform> {
        let bounds = Bounds::from_circles(circles)?;
        Some(fit_to_bounds(
            bounds,
            self.width,
            self.height,
            FitMargin::Fraction(self.config.fit_fill),
            self.config.min_zoom,
            self.config.max_zoom,
        ))
    }

    /// Jumps to a view containing every circle and remembers it as the initial view.
    /// Returns `false` (leaving the view untouched) when there is nothing to fit.
    pub fn fit_nodes(&mut self, circles: impl IntoIterator<Item = (Vec2, f64)>) -> bool {
        let Some(fitted) = self.fit_transform(circles) else {
            return false;
        };
        self.set_transform(fitted);
        self.initial_view = Some(fitted);
        true
    }

    /// Refreshes the remembered initial view without moving the camera.
    pub fn update_initial_view(&mut self, circles: impl IntoIterator<Item = (Vec2, f64)>) -> bool {
        let Some(fitted) = self.fit_transform(circles) else {
            return false;
        };
        self.initial_view = Some(fitted);
        true
    }

    /// Animates toward a view framing the given points with a fixed pixel margin.
    pub fn center_on(&mut self, points: impl IntoIterator<Item = Vec2>) -> bool {
        let Some(bounds) = Bounds::from_points(points) else {
            return false;
        };
        let target = fit_to_bounds(
            bounds,
            self.width,
            self.height,
            FitMargin::Pixels(self.config.center_margin),
            self.config.min_zoom,
            self.config.center_max_zoom,
        );
        self.animate_to(target);
        true
    }

    /// Starts an eased move to `target`, replacing any animation already running.
    pub fn animate_to(&mut self, target: ViewTransform) {
        self.animation = Some(TransformAnimation::new(
            self.transform,
            target,
            self.config.animation_duration,
        ));
    }

    pub fn restore_initial_view(&mut self) -> bool {
        let Some(initial) = self.initial_view else {
            return false;
        };
        self.animate_to(initial);
        true
    }

    /// Steps the running animation. Returns whether one is still in flight.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let Some(animation) = self.animation.as_mut() else {
            return false;
        };
        self.transform = animation.advance(dt);
        if animation.is_finished() {
            self.animation = None;
        }
        self.animation.is_some()
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.animation = None;
        self.transform = self.transform.panned(dx, dy);
    }

    pub fn zoom_at(&mut self, anchor: Vec2, factor: f64) {
        self.animation = None;
        self.transform =
            self.transform
                .zoomed_at(anchor, factor, self.config.min_zoom, self.config.max_zoom);
    }

    /// Wheel zoom toward the cursor; positive `delta_y` (scrolling down) zooms out.
    pub fn wheel(&mut self, anchor: Vec2, delta_y: f64) {
        self.zoom_at(anchor, 1.0 - (delta_y * self.config.wheel_sensitivity));
    }

    pub fn begin_pan(&mut self, screen: Vec2) {
        self.animation = None;
        self.pan = PanState::Panning { last: screen };
    }

    /// Applies the raw pointer delta while panning. Returns whether a pan is active.
    pub fn pan_move(&mut self, screen: Vec2) -> bool {
        let PanState::Panning { last } = self.pan else {
            return false;
        };
        let delta = screen - last;
        self.transform = self.transform.panned(delta.x, delta.y);
        self.pan = PanState::Panning { last: screen };
        true
    }

    pub fn end_pan(&mut self) -> bool {
        let was_panning = matches!(self.pan, PanState::Panning { .. });
        self.pan = PanState::Idle;
        was_panning
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_close(actual: Vec2, expected: Vec2) {
        assert!(actual.distance(expected) < 1e-9, "{actual:?} != {expected:?}");
    }

    #[test]
    fn screen_and_graph_round_trip() {
        let rect = ScreenRect {
            origin: vec2(12.0, 34.0),
            size: vec2(640.0, 480.0),
        };
        let transform = ViewTransform {
            x: -57.5,
            y: 210.25,
            k: 2.75,
        };
        for point in [vec2(0.0, 0.0), vec2(-120.5, 88.0), vec2(1e4, -3e3)] {
            let screen = graph_to_screen(point, rect, transform);
            assert_vec_close(screen_to_graph(screen, rect, transform), point);
        }
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let anchor = vec2(300.0, 200.0);
        let mut transform = ViewTransform {
            x: 40.0,
            y: -10.0,
            k: 1.3,
        };
        for factor in [1.1, 0.5, 3.0, 0.9] {
            let before = transform.invert(anchor);
            transform = transform.zoomed_at(anchor, factor, MIN_ZOOM_SCALE, MAX_ZOOM_SCALE);
            assert_vec_close(transform.invert(anchor), before);
        }
    }

    #[test]
    fn affine_form_matches_scale_then_translate() {
        let transform = ViewTransform {
            x: 15.0,
            y: -4.0,
            k: 0.5,
        };
        let point = vec2(30.0, 8.0);
        assert_vec_close(transform.apply(point), point * 0.5 + vec2(15.0, -4.0));
        assert_vec_close(transform.to_affine().transform_point2(point), vec2(30.0, 0.0));
        assert_vec_close(transform.invert(vec2(30.0, 0.0)), point);
    }

    #[test]
    fn zoom_is_clamped() {
        let transform = ViewTransform::IDENTITY.zoomed_at(Vec2::ZERO, 100.0, 0.2, 10.0);
        assert_eq!(transform.k, 10.0);
        let transform = transform.zoomed_at(Vec2::ZERO, 1e-6, 0.2, 10.0);
        assert_eq!(transform.k, 0.2);
        assert_eq!(transform.zoomed_at(Vec2::ZERO, -1.0, 0.2, 10.0), transform);
    }

    #[test]
    fn fit_centers_content() {
        let bounds = Bounds::from_points([vec2(-50.0, 10.0), vec2(150.0, 90.0)]).expect("bounds");
        let transform = fit_to_bounds(
            bounds,
            800.0,
            600.0,
            FitMargin::Fraction(0.7),
            MIN_ZOOM_SCALE,
            MAX_ZOOM_SCALE,
        );
        let center = transform.apply(bounds.center());
        assert!((center.x - 400.0).abs() <= 1.0);
        assert!((center.y - 300.0).abs() <= 1.0);
        assert!((transform.k - 2.8).abs() < 1e-9);
    }

    #[test]
    fn fit_handles_degenerate_content() {
        let bounds = Bounds::from_points([vec2(5.0, 5.0)]).expect("bounds");
        let transform =
            fit_to_bounds(bounds, 4.0, 4.0, FitMargin::Pixels(40.0), MIN_ZOOM_SCALE, 4.0);
        assert_eq!(transform.k, 4.0);
        assert_vec_close(transform.apply(vec2(5.0, 5.0)), vec2(2.0, 2.0));
    }

    #[test]
    fn center_on_animates_and_restore_returns() {
        let mut view = ViewController::new(ViewConfig::default(), 800.0, 600.0);
        assert!(view.fit_nodes([(vec2(0.0, 0.0), 10.0), (vec2(400.0, 300.0), 10.0)]));
        let initial = view.transform();
        assert_eq!(view.initial_view(), Some(initial));

        assert!(view.center_on([vec2(0.0, 0.0), vec2(10.0, 10.0)]));
        assert!(view.is_animating());
        while view.advance(Duration::from_millis(16)) {}
        let centered = view.transform();
        assert_eq!(centered.k, CENTER_MAX_ZOOM);
        assert_vec_close(centered.apply(vec2(5.0, 5.0)), vec2(400.0, 300.0));

        assert!(view.restore_initial_view());
        while view.advance(Duration::from_millis(16)) {}
        assert_eq!(view.transform(), initial);
    }

    #[test]
    fn new_animation_replaces_running_one() {
        let mut view = ViewController::new(ViewConfig::default(), 800.0, 600.0);
        let first = ViewTransform {
            x: 100.0,
            y: 0.0,
            k: 1.0,
        };
        let second = ViewTransform {
            x: -100.0,
            y: 50.0,
            k: 2.0,
        };
        view.animate_to(first);
        view.advance(Duration::from_millis(100));
        view.animate_to(second);
        view.advance(Duration::from_secs(1));
        assert_eq!(view.transform(), second);
        assert!(!view.is_animating());
    }

    #[test]
    fn panning_uses_raw_screen_delta() {
        let mut view = ViewController::new(ViewConfig::default(), 800.0, 600.0);
        view.set_transform(ViewTransform {
            x: 0.0,
            y: 0.0,
            k: 4.0,
        });
        assert!(!view.pan_move(vec2(5.0, 5.0)));

        view.begin_pan(vec2(10.0, 10.0));
        assert!(view.pan_move(vec2(25.0, 5.0)));
        assert!(view.pan_move(vec2(30.0, 0.0)));
        assert!(view.end_pan());
        assert_eq!(view.transform().translation(), vec2(20.0, -10.0));
        assert_eq!(view.pan_state(), PanState::Idle);
        assert!(!view.end_pan());
    }

    #[test]
    fn wheel_down_zooms_out_around_cursor() {
        let mut view = ViewController::new(ViewConfig::default(), 800.0, 600.0);
        let anchor = vec2(200.0, 100.0);
        let before = view.screen_to_graph(anchor);
        view.wheel(anchor, 100.0);
        assert!((view.transform().k - 0.9).abs() < 1e-12);
        assert_vec_close(view.screen_to_graph(anchor), before);
    }
}
