//! The Act phase: argument remapping, schema validation, timeout-bounded
//! execution, and failure recovery.

pub mod action;
pub mod recovery;
pub mod rules;

pub use action::{ActionExecutor, CapabilityStats, ExecutionMetrics, validate};
pub use recovery::{recover, recover_as};
pub use rules::{ArgumentRule, ArgumentRules};
