// Gateway module for utils - follows the Train Station Pattern
// All external access must go through this gateway

// Private submodules - not directly accessible from outside
mod errors;
mod logger;
mod season;

// Public re-exports - the ONLY way to access utils functionality
pub use errors::{DugoutError, ErrorKind, GeneratorError, UpstreamError};
pub use logger::{init_logger, log_progress};
pub use season::{current_season, current_season_at, truncate_message};
