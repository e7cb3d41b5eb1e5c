pub mod config;
pub mod models;
pub mod parser;
pub mod retry;
pub mod rules;
pub mod session;
pub mod store;
pub mod sweeper;
pub mod utils;

// Re-export commonly used types
pub use utils::error::EngineError;

pub type Result<T> = std::result::Result<T, EngineError>;
