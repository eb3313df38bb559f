//! chardiff core - character change detection and classification
//!
//! This crate compares two JSON snapshots of a tabletop character sheet and
//! reports what changed, including:
//! - Domain detectors for basic info, abilities, skills, combat, spells,
//!   equipment and features, run through an ordered composite registry
//! - Priority scoring from field, kind, magnitude and context rule tables
//! - Significance scoring on a five-level scale with batch roll-up
//! - Grouping, deduplication and merging of related changes
//! - A one-shot [`ChangeEngine`] producing a [`CharacterChangeSet`]
//!
//! Rule tables are plain data in [`EngineConfig`] and can be loaded from TOML.

pub mod analysis;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod errors;
pub mod grouping;
pub mod logging_facility;
pub mod model;
pub mod summary;
pub mod util;

// Used by the logging macros
pub use chardiff_core_types;

// Re-export commonly used types
pub use analysis::{PriorityAnalyzer, SignificanceAnalyzer};
pub use config::EngineConfig;
pub use detectors::{ChangeDetector, CompositeDetector};
pub use engine::ChangeEngine;
pub use errors::{DetectError, ExError, ExErrorKind, Result};
pub use model::{
    ChangeCategory, ChangeGroup, ChangeKind, ChangePriority, CharacterChangeSet,
    DetectionContext, DetectionResult, FieldChange, SignificanceLevel,
};
pub use summary::render_summary;
