use collab_graph::Explorer;
use collab_graph::timeline::format_date;
use eframe::egui::{self, Align, Context, Layout};

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn new(explorer: Explorer, source_label: String) -> Self {
        Self {
            explorer,
            source_label,
            search: String::new(),
            search_match_cache: None,
            hovered_node: None,
            last_frame: None,
            pointer_captured: false,
        }
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        reload_requested: &mut bool,
        is_loading: bool,
    ) {
        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("collab-graph");
                    ui.separator();
                    ui.label(format!("source: {}", self.source_label));
                    ui.label(format!("events: {}", self.explorer.events().len()));
                    ui.label(format!("developers: {}", self.explorer.graph().nodes.len()));
                    ui.label(format!("links: {}", self.explorer.graph().links.len()));
                    if let Some((first, last)) = self.explorer.timestamp_span() {
                        ui.label(format!("data: {} .. {}", format_date(first), format_date(last)));
                    }
                    let reload_button =
                        ui.add_enabled(!is_loading, egui::Button::new("Reload events"));
                    if reload_button.clicked() {
                        *reload_requested = true;
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.window_text());
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui));

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(380.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                if is_loading {
                    ui.ctx().request_repaint();
                }
                self.draw_graph(ui);
            });
    }

    fn window_text(&self) -> String {
        match self.explorer.window() {
            Some(window) => format!(
                "window: {} .. {}",
                format_date(window.start_ms),
                format_date(window.end_ms)
            ),
            None => "window: all time".to_owned(),
        }
    }
}
