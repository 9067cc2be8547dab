//! # Core Logic - Shared Utilities for Chain Crates
//!
//! This crate provides the ambient pieces every chain crate in the workspace
//! leans on: typed configuration errors, TOML/env configuration loading,
//! logger setup and a retry helper.
//!
//! ## Modules
//!
//! - [`config`] - TOML and environment configuration loading
//! - [`error`] - Typed error handling with thiserror
//! - `utils` - Logger and retry utilities

pub mod config;
pub mod error;
pub(crate) mod utils;

pub use config::{env_override, load_dotenv, load_toml};
pub use error::{ConfigError, CoreError};

pub use utils::setup_logger;

// Export retry utilities for testing
pub use utils::retry::{retry_while, RetryConfig};
