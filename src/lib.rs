//! Force-directed collaboration graph core: event aggregation, layout, camera control and
//! the time-window machinery that drives them.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod events;
pub mod explorer;
pub mod geometry;
pub mod graph;
pub mod layout;
pub mod schedule;
pub mod timeline;
pub mod view;

pub use aggregate::aggregate;
pub use config::Settings;
pub use error::{ConfigError, LoadError};
pub use events::{Event, EventKind, load_events, parse_events};
pub use explorer::{Explorer, Frame, PointerOutcome, Selection};
pub use geometry::{Vec2, vec2};
pub use graph::{CollabGraph, CollaborationWeights, Link, LinkTypes, Node, link_id};
pub use layout::{LayoutParams, LayoutSession};
pub use timeline::{TimeBucket, TimeUnit, WindowRange};
pub use view::{ViewController, ViewTransform};
