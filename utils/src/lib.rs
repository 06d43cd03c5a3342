//! Ambient stack shared by the trajectory-matching binaries: config-file
//! loading and CLI argument definitions.

pub mod cli;
pub mod config;

pub use cli::EngineArgs;
pub use config::ConfigError;
