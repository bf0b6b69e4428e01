//! Viewport-driven reveal choreography.
//!
//! Sections and cards each carry a small state machine; observer batches
//! and timer fires go in, [`RevealEffect`]s come out. Timers are entries in
//! a [`timeline::Timeline`] driven by the caller's clock.

use serde::{Deserialize, Serialize};

pub mod card;
pub mod geometry;
pub mod orchestrator;
pub mod section;
pub mod timeline;

pub use card::CardReveal;
pub use geometry::{IntersectionEntry, ObserverConfig, Rect, RootMargin, Viewport, ViewportObserver};
pub use orchestrator::{RevealConfig, RevealEvent, RevealOrchestrator};
pub use section::{RevealState, SectionTracker};
pub use timeline::Timeline;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum RevealEffect {
    SectionShown { section: String },
    SectionHidden { section: String },
    ActiveSection { section: String },
    CardShown { card: usize },
    CardHidden { card: usize },
    ChartReplay { card: usize },
    DetailShown { card: usize, detail: usize },
}
