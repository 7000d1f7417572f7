// Contextual persistence decisions
//
// Pure functions from (message, policy, context) to a verdict, plus the
// batch and grouping helpers the sink pipeline uses.

mod decider;

pub use decider::{
    decide, decide_batch, decide_importance, filter_persistable, group_by_method,
    should_persist_quick, PersistenceDecider,
};
