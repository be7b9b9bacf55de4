//! Interactive session over one event dataset.
//!
//! [`Explorer`] ties the pieces together: it re-aggregates when the committed time window
//! changes, owns the single live [`LayoutSession`], routes pointer input to drag, pan and
//! selection, and produces the per-frame output the renderer draws.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::config::Settings;
use crate::events::{Event, FormData};
use crate::geometry::{Vec2, vec2};
use crate::graph::{CollabGraph, LinkTypes, MIN_NODE_RADIUS, RecordRow, link_id, record_rows};
use crate::layout::{LayoutSession, MAX_CLUSTER_STRENGTH, ParamsUpdate, auto_distance_scale};
use crate::schedule::Debouncer;
use crate::timeline::{
    TimeBucket, TimeUnit, WindowRange, build_time_buckets, clamp_bucket_index, collect_timestamps,
    window_for_index,
};
use crate::view::{ViewController, ViewTransform};

/// Pointer travel (screen pixels) below which a press counts as a click.
const CLICK_SLOP: f64 = 3.0;
/// Half-width of a link's hit area in screen pixels.
const LINK_HIT_HALF_WIDTH: f64 = 6.0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Node(String),
    Link(String),
}

#[derive(Clone, Debug, PartialEq)]
enum PointerState {
    Idle,
    Pressed { node: String, origin: Vec2 },
    Dragging { node: String },
    Panning { origin: Vec2, moved: bool },
}

/// What a completed press-release gesture turned out to be.
#[derive(Clone, Debug, PartialEq)]
pub enum PointerOutcome {
    None,
    ClickedNode { id: String, handled: bool },
    DraggedNode { id: String },
    ClickedLink { id: String },
    Panned,
    ClickedBackground,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FrameLink {
    #[serde(rename = "source")]
    pub source_id: String,
    #[serde(rename = "target")]
    pub target_id: String,
    pub weight: f64,
    pub types: LinkTypes,
    pub first: Option<i64>,
    pub last: Option<i64>,
}

/// Everything a renderer needs for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Frame {
    pub nodes: Vec<FrameNode>,
    pub links: Vec<FrameLink>,
    pub transform: ViewTransform,
}

struct TimeFilter {
    unit: TimeUnit,
    enabled: bool,
    buckets: Vec<TimeBucket>,
    slider_index: usize,
    committed_index: usize,
    debouncer: Debouncer<usize>,
}

impl TimeFilter {
    fn window(&self) -> Option<WindowRange> {
        if !self.enabled {
            return None;
        }
        window_for_index(&self.buckets, self.committed_index, self.unit)
    }
}

pub struct Explorer {
    settings: Settings,
    events: Vec<Event>,
    timestamps: Vec<i64>,
    graph: CollabGraph,
    time: TimeFilter,
    window: Option<WindowRange>,
    distance_scale: f64,
    cluster_distance: f64,
    layout: Option<LayoutSession>,
    view: ViewController,
    selection: Option<Selection>,
    pointer: PointerState,
    last_drag_end: Option<Instant>,
    seed: Option<u64>,
    generation: u64,
}

impl Explorer {
    pub fn new(events: Vec<Event>, settings: Settings, width: f64, height: f64) -> Self {
        Self::build(events, settings, width, height, None)
    }

    /// Like [`new`](Self::new) with reproducible layout jitter.
    pub fn with_seed(events: Vec<Event>, settings: Settings, width: f64, height: f64, seed: u64) -> Self {
        Self::build(events, settings, width, height, Some(seed))
    }

    fn build(events: Vec<Event>, settings: Settings, width: f64, height: f64, seed: Option<u64>) -> Self {
        let timestamps = collect_timestamps(&events);
        let full = aggregate(&events, None, &settings.weights);
        let distance_scale = settings
            .layout
            .distance_scale
            .unwrap_or_else(|| auto_distance_scale(&full.links, width, height));
        let unit = settings.timeline.unit;

        let mut explorer = Self {
            time: TimeFilter {
                unit,
                enabled: settings.timeline.enabled,
                buckets: build_time_buckets(&timestamps, unit),
                slider_index: 0,
                committed_index: 0,
                debouncer: Debouncer::new(settings.timeline.debounce),
            },
            view: ViewController::new(settings.view, width, height),
            cluster_distance: settings.layout.cluster_distance,
            distance_scale,
            graph: full,
            window: None,
            layout: None,
            selection: None,
            pointer: PointerState::Idle,
            last_drag_end: None,
            seed,
            generation: 0,
            timestamps,
            events,
            settings,
        };

        info!(
            events = explorer.events.len(),
            nodes = explorer.graph.nodes.len(),
            links = explorer.graph.links.len(),
            buckets = explorer.time.buckets.len(),
            distance_scale,
            "loaded collaboration dataset"
        );

        let ticks = explorer.settings.layout.initial_ticks;
        explorer.rebuild(ticks);
        explorer
    }

    /// Re-aggregates for the committed window and swaps in a freshly settled layout.
    fn rebuild(&mut self, ticks: usize) {
        self.window = self.time.window();
        self.graph = aggregate(&self.events, self.window, &self.settings.weights);

        self.layout = if self.graph.is_empty() {
            None
        } else {
            let mut params = self.settings.layout.params(self.distance_scale);
            params.cluster_distance = self.cluster_distance;
            let mut session = match self.seed {
                Some(seed) => LayoutSession::build_seeded(
                    &self.graph.nodes,
                    &self.graph.links,
                    params,
                    seed.wrapping_add(self.generation),
                ),
                None => LayoutSession::build(&self.graph.nodes, &self.graph.links, params),
            };
            session.settle(ticks);
            Some(session)
        };
        self.generation += 1;

        self.pointer = PointerState::Idle;
        self.view.end_pan();
        self.drop_stale_selection();
        self.fit_view();

        debug!(
            window = ?self.window,
            nodes = self.graph.nodes.len(),
            links = self.graph.links.len(),
            ticks,
            "rebuilt layout"
        );
    }

    fn drop_stale_selection(&mut self) {
        let stale = match &self.selection {
            Some(Selection::Node(id)) => self.graph.node(id).is_none(),
            Some(Selection::Link(id)) => self.graph.link(id).is_none(),
            None => false,
        };
        if stale {
            self.selection = None;
        }
    }

    fn circles(&self) -> Vec<(Vec2, f64)> {
        self.layout
            .as_ref()
            .map(|layout| {
                layout
                    .nodes()
                    .iter()
                    .map(|node| (node.position, node.size.max(MIN_NODE_RADIUS)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn graph(&self) -> &CollabGraph {
        &self.graph
    }

    pub fn layout(&self) -> Option<&LayoutSession> {
        self.layout.as_ref()
    }

    pub fn view(&self) -> &ViewController {
        &self.view
    }

    pub fn transform(&self) -> ViewTransform {
        self.view.transform()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.is_none()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn dragged_node(&self) -> Option<&str> {
        match &self.pointer {
            PointerState::Dragging { node } => Some(node),
            _ => None,
        }
    }

    pub fn window(&self) -> Option<WindowRange> {
        self.window
    }

    pub fn timestamp_span(&self) -> Option<(i64, i64)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time.unit
    }

    pub fn buckets(&self) -> &[TimeBucket] {
        &self.time.buckets
    }

    pub fn slider_index(&self) -> usize {
        self.time.slider_index
    }

    pub fn committed_index(&self) -> usize {
        self.time.committed_index
    }

    pub fn time_filter_enabled(&self) -> bool {
        self.time.enabled
    }

    pub fn has_pending_window(&self) -> bool {
        self.time.debouncer.is_pending()
    }

    /// Bumped on every rebuild; lets hosts invalidate caches keyed on the graph.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn distance_scale(&self) -> f64 {
        self.distance_scale
    }

    pub fn cluster_distance(&self) -> f64 {
        self.cluster_distance
    }

    /// Switches bucket granularity; the window jumps to the first bucket immediately.
    pub fn set_time_unit(&mut self, unit: TimeUnit) {
        if unit == self.time.unit {
            return;
        }
        self.time.unit = unit;
        self.time.buckets = build_time_buckets(&self.timestamps, unit);
        self.time.slider_index = 0;
        self.time.committed_index = 0;
        self.time.debouncer.cancel();
        info!(%unit, buckets = self.time.buckets.len(), "time unit changed");
        self.rebuild(self.settings.layout.filtered_ticks);
    }

    /// Moves the bucket slider. The window is committed by [`poll`](Self::poll) once the
    /// slider has been still for the debounce delay.
    pub fn set_slider_index(&mut self, index: usize, now: Instant) {
        let index = clamp_bucket_index(index, self.time.buckets.len());
        self.time.slider_index = index;
        self.time.debouncer.push(index, now);
    }

    /// Commits a settled slider value. Returns whether the graph was rebuilt.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(index) = self.time.debouncer.poll(now) else {
            return false;
        };
        if index == self.time.committed_index {
            return false;
        }
        self.time.committed_index = index;
        info!(
            index,
            label = self.time.buckets.get(index).map(|bucket| bucket.label.as_str()),
            "time window committed"
        );
        self.rebuild(self.settings.layout.filtered_ticks);
        true
    }

    pub fn set_time_filter_enabled(&mut self, enabled: bool) {
        if enabled == self.time.enabled {
            return;
        }
        self.time.enabled = enabled;
        self.time.debouncer.cancel();
        self.time.slider_index = self.time.committed_index;
        self.rebuild(self.settings.layout.filtered_ticks);
    }

    pub fn set_distance_scale(&mut self, distance_scale: f64) {
        if !distance_scale.is_finite() || distance_scale <= 0.0 {
            return;
        }
        self.distance_scale = distance_scale;
        if let Some(layout) = self.layout.as_mut() {
            layout.reparameterize(ParamsUpdate {
                distance_scale: Some(distance_scale),
                cluster_distance: None,
            });
        }
    }

    pub fn set_cluster_distance(&mut self, cluster_distance: f64) {
        if !cluster_distance.is_finite() {
            return;
        }
        self.cluster_distance = cluster_distance.clamp(0.0, MAX_CLUSTER_STRENGTH);
        if let Some(layout) = self.layout.as_mut() {
            layout.reparameterize(ParamsUpdate {
                distance_scale: None,
                cluster_distance: Some(self.cluster_distance),
            });
        }
    }

    /// Applies host form values; a bucket index goes through the debounce like the slider.
    pub fn apply_form(&mut self, form: &FormData, now: Instant) {
        if let Some(distance_scale) = form.distance_scale {
            self.set_distance_scale(distance_scale);
        }
        if let Some(cluster_distance) = form.cluster_distance {
            self.set_cluster_distance(cluster_distance);
        }
        if let Some(unit) = form.time_unit {
            self.set_time_unit(unit);
        }
        if let Some(index) = form.bucket_index {
            self.set_slider_index(index, now);
        }
    }

    pub fn reheat(&mut self) {
        if let Some(layout) = self.layout.as_mut() {
            layout.restart();
        }
    }

    /// Advances the layout one tick and the camera by `dt`. Returns whether anything is
    /// still moving.
    pub fn step(&mut self, dt: Duration) -> bool {
        let simulating = match self.layout.as_mut() {
            Some(layout) if layout.is_active() => layout.tick(),
            _ => false,
        };
        let animating = self.view.advance(dt);
        simulating || animating
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        let (current_width, current_height) = self.view.viewport();
        if current_width == width && current_height == height {
            return;
        }
        self.view.set_viewport(width, height);
        let circles = self.circles();
        self.view.update_initial_view(circles);
    }

    pub fn fit_view(&mut self) -> bool {
        let circles = self.circles();
        self.view.fit_nodes(circles)
    }

    pub fn reset_view(&mut self) -> bool {
        self.view.restore_initial_view()
    }

    /// Animates toward the given nodes; unknown ids are ignored.
    pub fn center_on_nodes<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> bool {
        let Some(layout) = self.layout.as_ref() else {
            return false;
        };
        let points = ids
            .into_iter()
            .filter_map(|id| layout.position(id))
            .collect::<Vec<_>>();
        self.view.center_on(points)
    }

    pub fn wheel(&mut self, screen: Vec2, delta_y: f64) {
        self.view.wheel(screen, delta_y);
    }

    /// Topmost node whose visual circle contains the screen point.
    pub fn node_at(&self, screen: Vec2) -> Option<&str> {
        let layout = self.layout.as_ref()?;
        let point = self.view.screen_to_graph(screen);
        layout
            .nodes()
            .iter()
            .filter_map(|node| {
                let distance = node.position.distance(point);
                (distance <= node.size.max(MIN_NODE_RADIUS)).then_some((node, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(node, _)| node.id.as_str())
    }

    /// Link whose on-screen segment passes within a few pixels of the point.
    pub fn link_at(&self, screen: Vec2) -> Option<String> {
        let layout = self.layout.as_ref()?;
        let nodes = layout.nodes();
        layout
            .resolved_links()
            .filter_map(|link| {
                let start = self.view.graph_to_screen(nodes[link.source].position);
                let end = self.view.graph_to_screen(nodes[link.target].position);
                let distance = distance_to_segment(screen, start, end);
                (distance <= LINK_HIT_HALF_WIDTH).then_some((link, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(link, _)| link_id(&nodes[link.source].id, &nodes[link.target].id))
    }

    pub fn pointer_down(&mut self, screen: Vec2) {
        if let Some(node) = self.node_at(screen).map(str::to_owned) {
            self.pointer = PointerState::Pressed {
                node,
                origin: screen,
            };
            return;
        }
        self.view.begin_pan(screen);
        self.pointer = PointerState::Panning {
            origin: screen,
            moved: false,
        };
    }

    pub fn pointer_move(&mut self, screen: Vec2) {
        match &mut self.pointer {
            PointerState::Pressed { node, origin } => {
                if screen.distance(*origin) < CLICK_SLOP {
                    return;
                }
                let node = std::mem::take(node);
                self.pointer = PointerState::Dragging { node };
                self.drag_to(screen);
            }
            PointerState::Dragging { .. } => self.drag_to(screen),
            PointerState::Panning { origin, moved } => {
                if screen.distance(*origin) >= CLICK_SLOP {
                    *moved = true;
                }
                self.view.pan_move(screen);
            }
            PointerState::Idle => {}
        }
    }

    fn drag_to(&mut self, screen: Vec2) {
        let PointerState::Dragging { node } = &self.pointer else {
            return;
        };
        let point = self.view.screen_to_graph(screen);
        if let Some(layout) = self.layout.as_mut() {
            layout.pin(node, point);
        }
    }

    pub fn pointer_up(&mut self, now: Instant) -> PointerOutcome {
        match std::mem::replace(&mut self.pointer, PointerState::Idle) {
            PointerState::Idle => PointerOutcome::None,
            PointerState::Pressed { node, .. } => {
                let handled = self.click_node(&node, now);
                PointerOutcome::ClickedNode { id: node, handled }
            }
            PointerState::Dragging { node } => {
                if let Some(layout) = self.layout.as_mut() {
                    layout.unpin(&node);
                }
                self.last_drag_end = Some(now);
                PointerOutcome::DraggedNode { id: node }
            }
            PointerState::Panning { origin, moved } => {
                self.view.end_pan();
                if moved {
                    return PointerOutcome::Panned;
                }
                match self.link_at(origin) {
                    Some(id) => {
                        self.click_link(&id);
                        PointerOutcome::ClickedLink { id }
                    }
                    None => {
                        if self.selection.is_some() {
                            self.clear_selection();
                        }
                        PointerOutcome::ClickedBackground
                    }
                }
            }
        }
    }

    /// Toggles node selection and frames the node with its neighbours. Clicks arriving
    /// right after a drag are ignored; returns whether the click was handled.
    pub fn click_node(&mut self, id: &str, now: Instant) -> bool {
        let suppression = self.settings.timeline.click_suppression;
        if self
            .last_drag_end
            .is_some_and(|ended| now.saturating_duration_since(ended) < suppression)
        {
            return false;
        }
        if self.graph.node(id).is_none() {
            return false;
        }

        if self.selection == Some(Selection::Node(id.to_owned())) {
            self.clear_selection();
            return true;
        }

        self.selection = Some(Selection::Node(id.to_owned()));
        let neighbours = self.graph.connected_node_ids(id);
        self.center_on_nodes(neighbours.iter().map(String::as_str));
        true
    }

    /// Toggles link expansion and frames its two endpoints.
    pub fn click_link(&mut self, id: &str) -> bool {
        let Some(link) = self.graph.link(id) else {
            return false;
        };
        if self.selection == Some(Selection::Link(id.to_owned())) {
            self.clear_selection();
            return true;
        }

        let ends = [link.source.clone(), link.target.clone()];
        self.selection = Some(Selection::Link(id.to_owned()));
        self.center_on_nodes(ends.iter().map(String::as_str));
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
        self.view.restore_initial_view();
    }

    /// Nodes emphasised by the current selection.
    pub fn highlighted_nodes(&self) -> BTreeSet<String> {
        match &self.selection {
            Some(Selection::Node(id)) => self.graph.connected_node_ids(id),
            Some(Selection::Link(id)) => self
                .graph
                .link(id)
                .map(|link| [link.source.clone(), link.target.clone()].into_iter().collect())
                .unwrap_or_default(),
            None => BTreeSet::new(),
        }
    }

    /// Contributing events of the selected node or link, newest first.
    pub fn records(&self) -> Vec<RecordRow> {
        match &self.selection {
            Some(Selection::Node(id)) => record_rows(self.graph.links_for_node(id)),
            Some(Selection::Link(id)) => record_rows(self.graph.link(id)),
            None => Vec::new(),
        }
    }

    pub fn frame(&self) -> Frame {
        let Some(layout) = self.layout.as_ref() else {
            return Frame {
                transform: self.view.transform(),
                ..Frame::default()
            };
        };

        let nodes = layout
            .nodes()
            .iter()
            .map(|node| FrameNode {
                id: node.id.clone(),
                x: node.position.x,
                y: node.position.y,
                size: node.size,
            })
            .collect();

        let links = self
            .graph
            .links
            .iter()
            .filter(|link| layout.node(&link.source).is_some() && layout.node(&link.target).is_some())
            .map(|link| FrameLink {
                source_id: link.source.clone(),
                target_id: link.target.clone(),
                weight: link.weight,
                types: link.types,
                first: link.first,
                last: link.last,
            })
            .collect();

        Frame {
            nodes,
            links,
            transform: self.view.transform(),
        }
    }
}

fn distance_to_segment(point: Vec2, start: Vec2, end: Vec2) -> f64 {
    let along = end - start;
    let length_sq = along.length_squared();
    if length_sq == 0.0 {
        return point.distance(start);
    }
    let t = ((point - start).dot(along) / length_sq).clamp(0.0, 1.0);
    point.distance(start + along * t)
}

/// Convenience for hosts that only have viewport-local `f32` pointer coordinates.
pub fn screen_point(x: f32, y: f32) -> Vec2 {
    vec2(f64::from(x), f64::from(y))
}
