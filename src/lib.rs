pub mod app;
pub mod cache;
pub mod cli;
pub mod codegen;
pub mod constants;
pub mod query;
pub mod runtime;
pub mod sandbox;
pub mod stats;
pub mod utils;

pub use app::{load_config, Config};
pub use query::{normalize, parse, ParsedQuery};
pub use runtime::{Resolution, Resolver, Stores};
pub use utils::{DugoutError, ErrorKind};
