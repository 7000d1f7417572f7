// Importance resolution
//
// Maps (severity, component, function) to an importance through a layered
// override table. Readers work on an immutable snapshot; writers publish a new one.

mod resolver;
mod table;

pub use resolver::{ImportanceResolver, ResolutionCounts};
pub use table::{MatchedRule, OverrideTable, Resolution};
