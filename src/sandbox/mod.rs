// Gateway module for sandbox - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod bindings;
mod engine;
mod executor;
mod libs;
mod types;
mod validator;

// Public re-exports - the ONLY way to access sandbox functionality
#[cfg(test)]
pub use executor::MockExecutor;
pub use executor::{Executor, Sandbox};
pub use libs::ALLOWED_MODULES;
pub use types::{ExecutionResult, ExecutionStatus, RuleId, ValidationVerdict, Violation};
pub use validator::Validator;
