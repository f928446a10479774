//! Rule index module
//!
//! Three precedence-ordered in-memory tables (exact, prefix, regex), the
//! projection that turns source rule definitions into table entries, and the
//! atomically-replaceable snapshot store that publishes them to readers.

mod entry;
mod project;
mod store;

pub use entry::{RegexEntry, RuleEntry};
pub use project::{Projection, Projector};
pub use store::{IndexStats, IndexStore};
