//! Safety categories, guard scoring and the verdict policy

pub mod guard;
mod policy;
mod taxonomy;

pub use policy::evaluate;
pub use taxonomy::Category;

/// Sole rationale entry when nothing triggered
pub const NO_ISSUES: &str = "No issues found";
