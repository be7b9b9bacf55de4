mod app;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use collab_graph::{Explorer, Settings, TimeUnit, load_events};
use tracing::info;
use tracing_subscriber::EnvFilter;

const WINDOW_SIZE: [f32; 2] = [1440.0, 920.0];
const FRAME_STEP: Duration = Duration::from_millis(16);

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON file with collaboration events (bare array, `{ "events": [...] }` or chart payload).
    events: PathBuf,

    /// TOML file overriding weights, layout, view and timeline defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Granularity of the time slider: year, month or week.
    #[arg(long)]
    time_unit: Option<TimeUnit>,

    /// Start with the time filter disabled and show every event.
    #[arg(long)]
    all_time: bool,

    /// Seed the layout jitter for reproducible positions.
    #[arg(long)]
    seed: Option<u64>,

    /// Write the settled layout as JSON to this path instead of opening a window.
    #[arg(long)]
    export: Option<PathBuf>,

    /// Extra simulation ticks to run before exporting.
    #[arg(long, default_value_t = 300)]
    ticks: usize,

    /// Viewport width used for fitting when exporting.
    #[arg(long, default_value_t = WINDOW_SIZE[0])]
    width: f32,

    /// Viewport height used for fitting when exporting.
    #[arg(long, default_value_t = WINDOW_SIZE[1])]
    height: f32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())
        .context("failed to load settings")?;
    if let Some(unit) = args.time_unit {
        settings.timeline.unit = unit;
    }
    if args.all_time {
        settings.timeline.enabled = false;
    }

    if let Some(export_path) = &args.export {
        return export(&args, settings, export_path);
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size(WINDOW_SIZE),
        ..Default::default()
    };

    let source = app::LoadSource {
        events_path: args.events,
        settings,
        seed: args.seed,
    };
    eframe::run_native(
        "collab-graph",
        options,
        Box::new(move |cc| Ok(Box::new(app::CollabGraphApp::new(cc, source)))),
    )
    .map_err(|error| anyhow!("failed to run viewer: {error}"))
}

fn export(args: &Args, settings: Settings, export_path: &Path) -> Result<()> {
    let events = load_events(&args.events)
        .with_context(|| format!("failed to load events from {}", args.events.display()))?;
    let width = f64::from(args.width);
    let height = f64::from(args.height);
    let mut explorer = match args.seed {
        Some(seed) => Explorer::with_seed(events, settings, width, height, seed),
        None => Explorer::new(events, settings, width, height),
    };

    let mut ticks = 0;
    while ticks < args.ticks && explorer.step(FRAME_STEP) {
        ticks += 1;
    }
    explorer.fit_view();

    let frame = explorer.frame();
    let json = serde_json::to_string_pretty(&frame).context("failed to serialize layout")?;
    fs::write(export_path, json)
        .with_context(|| format!("failed to write {}", export_path.display()))?;

    info!(
        nodes = frame.nodes.len(),
        links = frame.links.len(),
        ticks,
        path = %export_path.display(),
        "exported layout"
    );
    Ok(())
}
