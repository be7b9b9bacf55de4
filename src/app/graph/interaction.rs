use std::time::Instant;

use collab_graph::PointerOutcome;
use eframe::egui::{self, CursorIcon, PointerButton, Rect, Ui};
use tracing::debug;

use super::super::ViewModel;
use super::super::render_utils::to_local;

impl ViewModel {
    pub(in crate::app) fn handle_graph_wheel(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
    ) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        // egui reports wheel-up as positive; the controller expects DOM-style deltas.
        self.explorer
            .wheel(to_local(rect, pointer), -f64::from(scroll));
    }

    /// Feeds raw primary-button input to the explorer so press, drag and release keep
    /// their own click and slop semantics.
    pub(in crate::app) fn handle_graph_pointer(
        &mut self,
        ui: &Ui,
        rect: Rect,
        response: &egui::Response,
        now: Instant,
    ) {
        let (pressed, released, position) = ui.input(|input| {
            (
                input.pointer.button_pressed(PointerButton::Primary),
                input.pointer.button_released(PointerButton::Primary),
                input.pointer.latest_pos(),
            )
        });

        self.hovered_node = if self.pointer_captured {
            self.explorer.dragged_node().map(str::to_owned)
        } else {
            position
                .filter(|_| response.hovered())
                .and_then(|position| self.explorer.node_at(to_local(rect, position)))
                .map(str::to_owned)
        };

        if pressed
            && response.hovered()
            && let Some(position) = position
        {
            self.explorer.pointer_down(to_local(rect, position));
            self.pointer_captured = true;
        }

        if self.pointer_captured
            && let Some(position) = position
        {
            self.explorer.pointer_move(to_local(rect, position));
        }

        if released && self.pointer_captured {
            self.pointer_captured = false;
            let outcome = self.explorer.pointer_up(now);
            if outcome != PointerOutcome::None && outcome != PointerOutcome::Panned {
                debug!(?outcome, "graph pointer released");
            }
        }

        if self.explorer.dragged_node().is_some() || self.pointer_captured {
            ui.ctx().set_cursor_icon(CursorIcon::Grabbing);
        } else if self.hovered_node.is_some() {
            ui.ctx().set_cursor_icon(CursorIcon::PointingHand);
        }
    }
}
