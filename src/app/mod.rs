use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;

use collab_graph::{Explorer, Settings, load_events};
use eframe::egui::{self, Context};
use tracing::{error, info};

mod graph;
mod render_utils;
mod ui;

const INITIAL_VIEWPORT: (f64, f64) = (1000.0, 800.0);

/// Where the viewer reads its dataset from; cloned into every background load.
#[derive(Clone)]
pub struct LoadSource {
    pub events_path: PathBuf,
    pub settings: Settings,
    pub seed: Option<u64>,
}

pub struct CollabGraphApp {
    source: LoadSource,
    state: AppState,
    reload_rx: Option<Receiver<Result<Explorer, String>>>,
}

enum AppState {
    Loading {
        rx: Receiver<Result<Explorer, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    explorer: Explorer,
    source_label: String,
    search: String,
    search_match_cache: Option<SearchMatchCache>,
    hovered_node: Option<String>,
    last_frame: Option<Instant>,
    pointer_captured: bool,
}

struct SearchMatchCache {
    query: String,
    graph_revision: u64,
    matches: BTreeSet<String>,
}

impl CollabGraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, source: LoadSource) -> Self {
        let state = Self::start_load(source.clone());
        Self {
            source,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(source: LoadSource) -> Receiver<Result<Explorer, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = load_events(&source.events_path)
                .map(|events| {
                    let (width, height) = INITIAL_VIEWPORT;
                    match source.seed {
                        Some(seed) => {
                            Explorer::with_seed(events, source.settings, width, height, seed)
                        }
                        None => Explorer::new(events, source.settings, width, height),
                    }
                })
                .map_err(|error| error.to_string());
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(source: LoadSource) -> AppState {
        info!(path = %source.events_path.display(), "loading collaboration events");
        AppState::Loading {
            rx: Self::spawn_load(source),
        }
    }

    fn loaded(&self, result: Result<Explorer, String>) -> AppState {
        match result {
            Ok(explorer) => AppState::Ready(Box::new(ViewModel::new(
                explorer,
                self.source.events_path.display().to_string(),
            ))),
            Err(message) => {
                error!(%message, "failed to load collaboration events");
                AppState::Error(message)
            }
        }
    }
}

impl eframe::App for CollabGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;
        let mut retry = false;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(result) => transition = Some(result),
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(Err("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading collaboration events...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load collaboration events");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.source.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(result) => transition = Some(result),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(Err("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if retry {
            self.state = Self::start_load(self.source.clone());
        }

        if let Some(result) = transition {
            self.reload_rx = None;
            self.state = self.loaded(result);
        }
    }
}
