use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::graph::CollaborationWeights;
use crate::layout::{
    CHARGE_STRENGTH, COLLISION_STRENGTH, DEFAULT_CLUSTER_DISTANCE, FILTERED_SETTLE_TICKS,
    INITIAL_SETTLE_TICKS, LayoutParams, MAX_CLUSTER_STRENGTH, NODE_MIN_PADDING,
};
use crate::schedule::TIME_SLIDER_DEBOUNCE;
use crate::timeline::TimeUnit;
use crate::view::ViewConfig;

pub const DRAG_CLICK_SUPPRESSION: Duration = Duration::from_millis(200);
const MAX_SETTLE_TICKS: usize = 10_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub weights: CollaborationWeights,
    pub layout: LayoutSettings,
    pub view: ViewConfig,
    pub timeline: TimelineSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutSettings {
    /// `None` derives the scale from the data and viewport.
    pub distance_scale: Option<f64>,
    pub cluster_distance: f64,
    pub charge_strength: f64,
    pub collision_strength: f64,
    pub node_padding: f64,
    pub initial_ticks: usize,
    pub filtered_ticks: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSettings {
    pub unit: TimeUnit,
    pub enabled: bool,
    pub debounce: Duration,
    pub click_suppression: Duration,
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            distance_scale: None,
            cluster_distance: DEFAULT_CLUSTER_DISTANCE,
            charge_strength: CHARGE_STRENGTH,
            collision_strength: COLLISION_STRENGTH,
            node_padding: NODE_MIN_PADDING,
            initial_ticks: INITIAL_SETTLE_TICKS,
            filtered_ticks: FILTERED_SETTLE_TICKS,
        }
    }
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            unit: TimeUnit::default(),
            enabled: true,
            debounce: TIME_SLIDER_DEBOUNCE,
            click_suppression: DRAG_CLICK_SUPPRESSION,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            weights: CollaborationWeights::default(),
            layout: LayoutSettings::default(),
            view: ViewConfig::default(),
            timeline: TimelineSettings::default(),
        }
    }
}

impl LayoutSettings {
    pub fn params(&self, distance_scale: f64) -> LayoutParams {
        LayoutParams {
            distance_scale,
            cluster_distance: self.cluster_distance,
            charge_strength: self.charge_strength,
            collision_strength: self.collision_strength,
            node_padding: self.node_padding,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSettings {
    weights: Option<RawWeights>,
    layout: Option<RawLayout>,
    view: Option<RawView>,
    timeline: Option<RawTimeline>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawWeights {
    commits: Option<f64>,
    reviews: Option<f64>,
    #[serde(alias = "pullRequests")]
    pull_requests: Option<f64>,
    assigns: Option<f64>,
    discussion: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLayout {
    distance_scale: Option<f64>,
    cluster_distance: Option<f64>,
    charge_strength: Option<f64>,
    collision_strength: Option<f64>,
    node_padding: Option<f64>,
    initial_ticks: Option<usize>,
    filtered_ticks: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawView {
    min_zoom: Option<f64>,
    max_zoom: Option<f64>,
    fit_fill: Option<f64>,
    center_margin: Option<f64>,
    center_max_zoom: Option<f64>,
    animation_ms: Option<u64>,
    wheel_sensitivity: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimeline {
    unit: Option<TimeUnit>,
    enabled: Option<bool>,
    debounce_ms: Option<u64>,
    click_suppression_ms: Option<u64>,
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

fn non_negative(key: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(invalid(key, format!("expected a finite value >= 0, got {value}")))
    }
}

fn positive(key: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(invalid(key, format!("expected a finite value > 0, got {value}")))
    }
}

fn within(key: &'static str, value: f64, min: f64, max: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(invalid(key, format!("expected a value in [{min}, {max}], got {value}")))
    }
}

fn ticks(key: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value <= MAX_SETTLE_TICKS {
        Ok(value)
    } else {
        Err(invalid(key, format!("at most {MAX_SETTLE_TICKS} ticks, got {value}")))
    }
}

impl Settings {
    /// Loads settings from a TOML file; `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(content)?;
        let mut settings = Self::default();

        if let Some(weights) = raw.weights {
            let target = &mut settings.weights;
            if let Some(value) = weights.commits {
                target.commits = non_negative("weights.commits", value)?;
            }
            if let Some(value) = weights.reviews {
                target.reviews = non_negative("weights.reviews", value)?;
            }
            if let Some(value) = weights.pull_requests {
                target.pull_requests = non_negative("weights.pull_requests", value)?;
            }
            if let Some(value) = weights.assigns {
                target.assigns = non_negative("weights.assigns", value)?;
            }
            if let Some(value) = weights.discussion {
                target.discussion = non_negative("weights.discussion", value)?;
            }
        }

        if let Some(layout) = raw.layout {
            let target = &mut settings.layout;
            if let Some(value) = layout.distance_scale {
                target.distance_scale = Some(positive("layout.distance_scale", value)?);
            }
            if let Some(value) = layout.cluster_distance {
                target.cluster_distance =
                    within("layout.cluster_distance", value, 0.0, MAX_CLUSTER_STRENGTH)?;
            }
            if let Some(value) = layout.charge_strength {
                if !value.is_finite() {
                    return Err(invalid("layout.charge_strength", "expected a finite value"));
                }
                target.charge_strength = value;
            }
            if let Some(value) = layout.collision_strength {
                target.collision_strength = within("layout.collision_strength", value, 0.0, 1.0)?;
            }
            if let Some(value) = layout.node_padding {
                target.node_padding = non_negative("layout.node_padding", value)?;
            }
            if let Some(value) = layout.initial_ticks {
                target.initial_ticks = ticks("layout.initial_ticks", value)?;
            }
            if let Some(value) = layout.filtered_ticks {
                target.filtered_ticks = ticks("layout.filtered_ticks", value)?;
            }
        }

        if let Some(view) = raw.view {
            let target = &mut settings.view;
            if let Some(value) = view.min_zoom {
                target.min_zoom = positive("view.min_zoom", value)?;
            }
            if let Some(value) = view.max_zoom {
                target.max_zoom = positive("view.max_zoom", value)?;
            }
            if let Some(value) = view.fit_fill {
                target.fit_fill = within("view.fit_fill", value, 0.05, 1.0)?;
            }
            if let Some(value) = view.center_margin {
                target.center_margin = non_negative("view.center_margin", value)?;
            }
            if let Some(value) = view.center_max_zoom {
                target.center_max_zoom = positive("view.center_max_zoom", value)?;
            }
            if let Some(value) = view.animation_ms {
                target.animation_duration = Duration::from_millis(value);
            }
            if let Some(value) = view.wheel_sensitivity {
                target.wheel_sensitivity = positive("view.wheel_sensitivity", value)?;
            }
            if target.min_zoom > target.max_zoom {
                return Err(invalid("view.min_zoom", "must not exceed view.max_zoom"));
            }
            if target.center_max_zoom < target.min_zoom {
                return Err(invalid("view.center_max_zoom", "must not be below view.min_zoom"));
            }
        }

        if let Some(timeline) = raw.timeline {
            let target = &mut settings.timeline;
            if let Some(unit) = timeline.unit {
                target.unit = unit;
            }
            if let Some(enabled) = timeline.enabled {
                target.enabled = enabled;
            }
            if let Some(value) = timeline.debounce_ms {
                target.debounce = Duration::from_millis(value);
            }
            if let Some(value) = timeline.click_suppression_ms {
                target.click_suppression = Duration::from_millis(value);
            }
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let settings = Settings::load(None).expect("defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.weights.reviews, 2.0);
        assert_eq!(settings.layout.initial_ticks, 60);
        assert_eq!(settings.timeline.debounce, Duration::from_millis(250));
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let settings = Settings::from_toml_str(
            r#"
            [weights]
            pullRequests = 0.0
            discussion = 1.5

            [layout]
            distance_scale = 80.0

            [timeline]
            unit = "week"
            enabled = false
            "#,
        )
        .expect("settings");

        assert_eq!(settings.weights.pull_requests, 0.0);
        assert_eq!(settings.weights.discussion, 1.5);
        assert_eq!(settings.weights.commits, 1.0);
        assert_eq!(settings.layout.distance_scale, Some(80.0));
        assert_eq!(settings.layout.cluster_distance, DEFAULT_CLUSTER_DISTANCE);
        assert_eq!(settings.timeline.unit, TimeUnit::Week);
        assert!(!settings.timeline.enabled);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            Settings::from_toml_str("[layout]\nspeed = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("[layout]\ncluster_distance = 0.9"),
            Err(ConfigError::Invalid { key: "layout.cluster_distance", .. })
        ));
        assert!(matches!(
            Settings::from_toml_str("[weights]\nreviews = -1.0"),
            Err(ConfigError::Invalid { key: "weights.reviews", .. })
        ));
        assert!(matches!(
            Settings::from_toml_str("[view]\nmin_zoom = 5.0\nmax_zoom = 2.0"),
            Err(ConfigError::Invalid { key: "view.min_zoom", .. })
        ));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[view]\nanimation_ms = 120").expect("write");
        let settings = Settings::load(Some(file.path())).expect("settings");
        assert_eq!(settings.view.animation_duration, Duration::from_millis(120));

        let missing = Settings::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
