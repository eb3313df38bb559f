pub mod change;
pub mod change_set;
pub mod context;
pub mod group;
pub mod kinds;
pub mod metadata;
pub mod result;

pub use change::FieldChange;
pub use change_set::{ChangeStatistics, CharacterChangeSet};
pub use context::DetectionContext;
pub use group::ChangeGroup;
pub use kinds::{ChangeCategory, ChangeKind, ChangePriority, SignificanceLevel};
pub use metadata::Metadata;
pub use result::DetectionResult;
