use std::time::Instant;

use collab_graph::TimeUnit;
use collab_graph::layout::MAX_CLUSTER_STRENGTH;
use eframe::egui::{self, Ui};

use super::super::ViewModel;

const DISTANCE_SCALE_RANGE: std::ops::RangeInclusive<f64> = 1.0..=400.0;

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        self.draw_search(ui);
        ui.separator();
        self.draw_layout_controls(ui);
        ui.separator();
        self.draw_time_controls(ui);
        ui.separator();
        self.draw_view_controls(ui);
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.label("Search developers")
            .on_hover_text("Fuzzy-highlight matching developers without changing the graph.");
        ui.text_edit_singleline(&mut self.search);

        let matches = self.search_matches().cloned().unwrap_or_default();
        ui.horizontal(|ui| {
            ui.label(format!("{} match(es)", matches.len()));
            let center = ui.add_enabled(!matches.is_empty(), egui::Button::new("Center on matches"));
            if center.clicked() {
                self.explorer
                    .center_on_nodes(matches.iter().map(String::as_str));
            }
        });
    }

    fn draw_layout_controls(&mut self, ui: &mut Ui) {
        ui.label("Layout");

        let mut distance_scale = self.explorer.distance_scale();
        let distance_response = ui
            .add(
                egui::Slider::new(&mut distance_scale, DISTANCE_SCALE_RANGE)
                    .logarithmic(true)
                    .text("link distance"),
            )
            .on_hover_text("Scales the rest length of every link.");
        if distance_response.changed() {
            self.explorer.set_distance_scale(distance_scale);
        }

        let mut cluster_distance = self.explorer.cluster_distance();
        let cluster_response = ui
            .add(
                egui::Slider::new(&mut cluster_distance, 0.0..=MAX_CLUSTER_STRENGTH)
                    .text("cluster distance"),
            )
            .on_hover_text("Higher values weaken the pull toward the center.");
        if cluster_response.changed() {
            self.explorer.set_cluster_distance(cluster_distance);
        }

        if ui
            .button("Reheat simulation")
            .on_hover_text("Restart the layout without re-randomizing positions.")
            .clicked()
        {
            self.explorer.reheat();
        }
    }

    fn draw_time_controls(&mut self, ui: &mut Ui) {
        ui.label("Time window");

        let mut enabled = self.explorer.time_filter_enabled();
        if ui
            .checkbox(&mut enabled, "Filter by time")
            .on_hover_text("Show only events between the first event and the selected bucket.")
            .changed()
        {
            self.explorer.set_time_filter_enabled(enabled);
        }

        let mut unit = self.explorer.time_unit();
        egui::ComboBox::from_label("bucket size")
            .selected_text(unit.label())
            .show_ui(ui, |ui| {
                for candidate in TimeUnit::ALL {
                    ui.selectable_value(&mut unit, candidate, candidate.label());
                }
            });
        if unit != self.explorer.time_unit() {
            self.explorer.set_time_unit(unit);
        }

        let bucket_count = self.explorer.buckets().len();
        if bucket_count == 0 {
            ui.label("No dated events.");
            return;
        }

        let mut index = self.explorer.slider_index();
        let label = self
            .explorer
            .buckets()
            .get(index)
            .map(|bucket| bucket.label.clone())
            .unwrap_or_default();
        let slider = ui.add_enabled(
            enabled,
            egui::Slider::new(&mut index, 0..=bucket_count - 1)
                .show_value(false)
                .text(label),
        );
        if slider.changed() {
            self.explorer.set_slider_index(index, Instant::now());
        }
        if self.explorer.has_pending_window() {
            ui.small("Applying window...");
        }
    }

    fn draw_view_controls(&mut self, ui: &mut Ui) {
        ui.label("View");
        ui.horizontal_wrapped(|ui| {
            if ui.button("Fit to graph").clicked() {
                self.explorer.fit_view();
            }
            if ui.button("Reset view").clicked() {
                self.explorer.reset_view();
            }
            let has_selection = self.explorer.selection().is_some();
            if ui
                .add_enabled(has_selection, egui::Button::new("Clear selection"))
                .clicked()
            {
                self.explorer.clear_selection();
            }
        });

        let transform = self.explorer.transform();
        ui.small(format!(
            "zoom {:.2}  |  offset ({:.0}, {:.0})",
            transform.k, transform.x, transform.y
        ));
    }
}
