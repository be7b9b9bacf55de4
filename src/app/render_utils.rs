use collab_graph::{LinkTypes, ViewTransform, Vec2 as GraphVec2, vec2 as graph_vec2};
use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, pos2};

pub(super) const NODE_COLOR: Color32 = Color32::from_rgb(84, 160, 222);
pub(super) const SELECTED_COLOR: Color32 = Color32::from_rgb(245, 206, 93);
pub(super) const HIGHLIGHT_COLOR: Color32 = Color32::from_rgb(246, 137, 92);
pub(super) const SEARCH_COLOR: Color32 = Color32::from_rgb(103, 196, 255);
pub(super) const HOVER_COLOR: Color32 = Color32::from_rgb(255, 164, 101);

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let mix = |from: u8, to: u8| (from as f32 + (to as f32 - from as f32) * amount) as u8;

    Color32::from_rgba_unmultiplied(
        mix(base.r(), overlay.r()),
        mix(base.g(), overlay.g()),
        mix(base.b(), overlay.b()),
        mix(base.a(), overlay.a()),
    )
}

pub(super) fn dim_color(color: Color32, factor: f32) -> Color32 {
    let factor = factor.clamp(0.0, 1.0);
    Color32::from_rgba_unmultiplied(
        (color.r() as f32 * factor) as u8,
        (color.g() as f32 * factor) as u8,
        (color.b() as f32 * factor) as u8,
        (color.a() as f32 * (0.45 + (factor * 0.55))) as u8,
    )
}

/// Grid that moves and scales with the graph so panning reads as motion.
pub(super) fn draw_background(painter: &Painter, rect: Rect, transform: ViewTransform) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * (transform.k as f32).clamp(0.6, 1.8)).max(20.0);
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (transform.x as f32).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([pos2(x, rect.top()), pos2(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (transform.y as f32).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([pos2(rect.left(), y), pos2(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

pub(super) fn segment_visible(rect: Rect, start: Pos2, end: Pos2, padding: f32) -> bool {
    let min_x = start.x.min(end.x) - padding;
    let max_x = start.x.max(end.x) + padding;
    let min_y = start.y.min(end.y) - padding;
    let max_y = start.y.max(end.y) + padding;

    !(max_x < rect.left() || min_x > rect.right() || max_y < rect.top() || min_y > rect.bottom())
}

/// Canvas-local graph-screen coordinates to absolute egui coordinates.
pub(super) fn to_pos2(rect: Rect, local: GraphVec2) -> Pos2 {
    pos2(rect.left() + local.x as f32, rect.top() + local.y as f32)
}

pub(super) fn to_local(rect: Rect, position: Pos2) -> GraphVec2 {
    graph_vec2(
        f64::from(position.x - rect.left()),
        f64::from(position.y - rect.top()),
    )
}

/// Stroke width grows with the square root of the link weight.
pub(super) fn link_width(weight: f64, zoom: f64) -> f32 {
    let base = 0.8 + weight.max(0.0).sqrt() * 0.9;
    (base * zoom.sqrt()).clamp(0.5, 8.0) as f32
}

/// Tints a link by its dominant interaction category.
pub(super) fn link_color(types: &LinkTypes) -> Color32 {
    let categories = [
        (types.commits, Color32::from_rgb(120, 200, 140)),
        (types.reviews, Color32::from_rgb(190, 150, 240)),
        (types.pull_requests, Color32::from_rgb(240, 190, 110)),
        (types.assigns, Color32::from_rgb(110, 190, 230)),
        (types.discussion, Color32::from_rgb(200, 200, 200)),
    ];
    categories
        .into_iter()
        .filter(|(amount, _)| *amount > 0.0)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, color)| color)
        .unwrap_or(Color32::from_gray(140))
}
