use std::collections::{BTreeSet, HashMap};
use std::time::{Duration, Instant};

use collab_graph::{Selection, link_id};
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Sense, Stroke, Ui, vec2};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::super::render_utils::{
    HIGHLIGHT_COLOR, HOVER_COLOR, NODE_COLOR, SEARCH_COLOR, SELECTED_COLOR, blend_color,
    circle_visible, dim_color, draw_background, link_color, link_width, segment_visible, to_pos2,
};
use super::super::{SearchMatchCache, ViewModel};

/// Longest frame delta fed to the camera animation; keeps a stalled frame from skipping it.
const MAX_FRAME_DELTA: Duration = Duration::from_millis(100);

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

impl ViewModel {
    /// Node ids fuzzily matching the search box, cached per query and graph rebuild.
    pub(in crate::app) fn search_matches(&mut self) -> Option<&BTreeSet<String>> {
        let query = self.search.trim();
        if query.is_empty() {
            self.search_match_cache = None;
            return None;
        }

        let generation = self.explorer.generation();
        let stale = self
            .search_match_cache
            .as_ref()
            .is_none_or(|cached| cached.graph_revision != generation || cached.query != query);
        if stale {
            let matcher = SkimMatcherV2::default();
            let matches = self
                .explorer
                .graph()
                .nodes
                .iter()
                .filter(|node| fuzzy_match_score(&matcher, &node.id, query).is_some())
                .map(|node| node.id.clone())
                .collect();
            self.search_match_cache = Some(SearchMatchCache {
                query: query.to_owned(),
                graph_revision: generation,
                matches,
            });
        }

        self.search_match_cache.as_ref().map(|cached| &cached.matches)
    }

    fn advance_clock(&mut self) -> Duration {
        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| now.saturating_duration_since(last).min(MAX_FRAME_DELTA))
            .unwrap_or_default();
        self.last_frame = Some(now);
        dt
    }

    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.explorer
            .resize(f64::from(rect.width()), f64::from(rect.height()));

        let dt = self.advance_clock();
        let now = Instant::now();
        self.explorer.poll(now);

        self.handle_graph_wheel(ui, rect, &response);
        self.handle_graph_pointer(ui, rect, &response, now);

        let moving = self.explorer.step(dt);
        if moving || self.explorer.has_pending_window() || self.pointer_captured {
            ui.ctx().request_repaint();
        }

        let transform = self.explorer.transform();
        draw_background(&painter, rect, transform);

        if self.explorer.is_empty() {
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No collaboration events in the selected window.",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
            return;
        }

        let search_matches = self.search_matches().cloned();
        let frame = self.explorer.frame();
        let highlighted = self.explorer.highlighted_nodes();
        let selection = self.explorer.selection().cloned();
        let selection_active = selection.is_some();
        let search_active = search_matches
            .as_ref()
            .is_some_and(|matches| !matches.is_empty());
        let zoom = transform.k;

        let screen_positions = frame
            .nodes
            .iter()
            .map(|node| {
                let local = self
                    .explorer
                    .view()
                    .graph_to_screen(collab_graph::vec2(node.x, node.y));
                (node.id.as_str(), to_pos2(rect, local))
            })
            .collect::<HashMap<_, _>>();

        let selected_link = match &selection {
            Some(Selection::Link(id)) => Some(id.as_str()),
            _ => None,
        };

        for link in &frame.links {
            let (Some(&start), Some(&end)) = (
                screen_positions.get(link.source_id.as_str()),
                screen_positions.get(link.target_id.as_str()),
            ) else {
                continue;
            };
            if !segment_visible(rect, start, end, 4.0) {
                continue;
            }

            let is_selected = selected_link
                .is_some_and(|id| id == link_id(&link.source_id, &link.target_id));
            let is_related =
                highlighted.contains(&link.source_id) && highlighted.contains(&link.target_id);

            let base_color = link_color(&link.types);
            let color = if is_selected {
                SELECTED_COLOR
            } else if is_related {
                blend_color(base_color, HIGHLIGHT_COLOR, 0.55)
            } else if selection_active {
                dim_color(base_color, 0.35)
            } else {
                base_color.gamma_multiply(0.75)
            };
            let mut width = link_width(link.weight, zoom);
            if is_selected {
                width += 1.5;
            }
            painter.line_segment([start, end], Stroke::new(width, color));
        }

        let dragged = self.explorer.dragged_node().map(str::to_owned);
        for node in &frame.nodes {
            let Some(&position) = screen_positions.get(node.id.as_str()) else {
                continue;
            };
            let radius = (node.size * zoom).max(2.0) as f32;
            if !circle_visible(rect, position, radius) {
                continue;
            }

            let is_selected = matches!(&selection, Some(Selection::Node(id)) if *id == node.id);
            let is_related = highlighted.contains(&node.id);
            let is_hovered = self.hovered_node.as_deref() == Some(node.id.as_str());
            let is_dragged = dragged.as_deref() == Some(node.id.as_str());
            let is_search_match = search_matches
                .as_ref()
                .is_some_and(|matches| matches.contains(&node.id));

            let color = if is_selected || is_dragged {
                SELECTED_COLOR
            } else if is_hovered {
                HOVER_COLOR
            } else if is_related {
                blend_color(NODE_COLOR, HIGHLIGHT_COLOR, 0.6)
            } else if is_search_match {
                blend_color(NODE_COLOR, SEARCH_COLOR, 0.7)
            } else if selection_active {
                dim_color(NODE_COLOR, 0.5)
            } else if search_active {
                dim_color(NODE_COLOR, 0.4)
            } else {
                NODE_COLOR
            };

            painter.circle_filled(position, radius, color);
            painter.circle_stroke(
                position,
                radius,
                Stroke::new(
                    if is_selected { 2.2 } else { 1.0 },
                    Color32::from_rgba_unmultiplied(15, 15, 15, 190),
                ),
            );

            let show_label = is_selected
                || is_related
                || is_hovered
                || is_search_match
                || radius > 14.0
                || zoom > 1.6;
            if show_label {
                painter.text(
                    position + vec2(radius + 5.0, 0.0),
                    Align2::LEFT_CENTER,
                    node.id.as_str(),
                    FontId::proportional(12.0),
                    Color32::from_gray(238),
                );
            }
        }

        self.draw_hover_panel(&painter, rect.left_top() + vec2(10.0, 10.0));
    }

    fn draw_hover_panel(&self, painter: &egui::Painter, anchor: Pos2) {
        let Some(node) = self
            .hovered_node
            .as_deref()
            .and_then(|id| self.explorer.graph().node(id))
        else {
            return;
        };

        let link_count = self.explorer.graph().links_for_node(&node.id).count();
        painter.text(
            anchor,
            Align2::LEFT_TOP,
            format!(
                "{}  |  activity {}  |  links {}",
                node.id, node.activity, link_count
            ),
            FontId::proportional(13.0),
            Color32::from_gray(240),
        );
    }
}
