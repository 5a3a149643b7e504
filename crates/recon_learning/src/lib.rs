//! Learning Loop (C9, §4.9): closes the feedback loop from C8 back into C5 by turning reviewed
//! suggestions into new or reinforced patterns, with poisoning resistance against repeated
//! rejections (counters never go negative; each suggestion id is processed exactly once).

pub mod error;
pub mod learn;
pub mod mapping;
pub mod source;

pub use error::{LearningError, LearningResult};
pub use learn::{LearningLoop, LearningOutcome, DEDUPE_SIMILARITY_MIN};
pub use mapping::{derive, target_kind_for, DerivedPattern};
pub use source::ReviewedSuggestionSource;
