// Gateway module for runtime - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod direct;
mod output;
mod repair;
mod resolver;

// Public re-exports - the ONLY way to access runtime functionality
pub use direct::DirectExecutor;
pub use output::format_resolution;
pub use repair::{Failure, Job, LoopOutcome, Progress, ProgressCallback, RepairLoop};
pub use resolver::{Resolution, Resolver, Stores};
