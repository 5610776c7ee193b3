// Gateway module for query - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod classifier;
mod grammar;
mod normalizer;
mod parser;
mod types;

// Public re-exports - the ONLY way to access query functionality
pub use classifier::{needs_ai, route, Route};
pub use grammar::{team_name, COMPARISON_FORCES_AI, TEAM_OVER_LEAGUE};
pub use normalizer::normalize;
pub use parser::parse;
pub use types::{Intent, ParsedQuery, StatGroup, Statistic, UnresolvedReason};
