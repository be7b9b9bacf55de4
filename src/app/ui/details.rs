use collab_graph::Selection;
use collab_graph::graph::{LinkCategory, RecordRow};
use collab_graph::timeline::{format_date, format_timestamp};
use eframe::egui::{self, RichText, Ui};

use super::super::ViewModel;

const RECORD_ROW_HEIGHT: f32 = 20.0;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Selection Details");
        ui.add_space(6.0);

        match self.explorer.selection().cloned() {
            Some(Selection::Node(id)) => self.draw_node_details(ui, &id),
            Some(Selection::Link(id)) => self.draw_link_details(ui, &id),
            None => {
                ui.label("Click a developer or a link to inspect its events.");
                return;
            }
        }

        ui.separator();
        let records = self.explorer.records();
        ui.label(RichText::new(format!("Events ({})", records.len())).strong());
        draw_records(ui, &records);
    }

    fn draw_node_details(&mut self, ui: &mut Ui, id: &str) {
        let graph = self.explorer.graph();
        let Some(node) = graph.node(id) else {
            ui.label("Selected developer is not in the current window.");
            return;
        };

        ui.label(RichText::new(node.id.as_str()).strong());
        ui.label(format!("Activity: {}", node.activity));
        ui.label(format!("Collaborators: {}", graph.links_for_node(id).count()));

        let mut partners = graph
            .links_for_node(id)
            .filter_map(|link| link.other_end(id).map(|other| (other.to_owned(), link.weight)))
            .collect::<Vec<_>>();
        partners.sort_by(|a, b| b.1.total_cmp(&a.1));

        if partners.is_empty() {
            return;
        }
        ui.add_space(6.0);
        ui.label(RichText::new("Strongest links").strong());
        let mut clicked = None;
        for (partner, weight) in partners.iter().take(8) {
            if ui.link(format!("{partner}  ({weight:.2})")).clicked() {
                clicked = Some(partner.clone());
            }
        }
        if let Some(partner) = clicked {
            let link = collab_graph::link_id(id, &partner);
            self.explorer.click_link(&link);
        }
    }

    fn draw_link_details(&self, ui: &mut Ui, id: &str) {
        let Some(link) = self.explorer.graph().link(id) else {
            ui.label("Selected link is not in the current window.");
            return;
        };

        ui.label(RichText::new(format!("{} \u{2194} {}", link.source, link.target)).strong());
        ui.label(format!("Weight: {:.3}", link.weight));
        if let (Some(first), Some(last)) = (link.first, link.last) {
            ui.label(format!("Active: {} .. {}", format_date(first), format_date(last)));
        }

        egui::Grid::new("link_types")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for category in LinkCategory::ALL {
                    let amount = link.types.get(category);
                    if amount <= 0.0 {
                        continue;
                    }
                    ui.label(category.label());
                    ui.label(format!("{amount:.3}"));
                    ui.end_row();
                }
            });
    }
}

fn draw_records(ui: &mut Ui, records: &[RecordRow]) {
    if records.is_empty() {
        ui.label("No contributing events.");
        return;
    }

    egui::ScrollArea::vertical()
        .id_salt("records_scroll")
        .auto_shrink([false, false])
        .show_rows(ui, RECORD_ROW_HEIGHT, records.len(), |ui, row_range| {
            egui::Grid::new("records_grid")
                .num_columns(5)
                .striped(true)
                .show(ui, |ui| {
                    for row in &records[row_range] {
                        ui.label(row.kind);
                        ui.label(row.actor.as_str());
                        ui.label(row.target.as_str());
                        ui.label(
                            row.timestamp_ms
                                .map(format_timestamp)
                                .unwrap_or_else(|| "undated".to_owned()),
                        );
                        ui.label(
                            row.lines
                                .map(|(added, deleted)| format!("+{added} -{deleted}"))
                                .unwrap_or_default(),
                        );
                        ui.end_row();
                    }
                });
        });
}
