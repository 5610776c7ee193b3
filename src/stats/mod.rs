// Gateway module for stats - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod cached;
#[cfg(test)]
mod fake;
mod names;
mod service;
mod source;

// Pure record transformations are used as a namespace: `tables::leaders(..)`
pub mod tables;

// Public re-exports - the ONLY way to access stats functionality
pub use cached::CachedSource;
pub use names::{expand_alias, fold_name, last_name, names_match};
#[cfg(test)]
pub(crate) use fake::FakeSource;
pub use service::StatsService;
pub use source::{params, with_retry, DataSource, Params, RetryPolicy, StatsApiClient};
