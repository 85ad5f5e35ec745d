//! Centralized configuration loading from config.toml.
//!
//! This crate provides the configuration structs and loading logic shared by
//! the searcher binary and benchmarks.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`APV_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (config.defaults.toml, embedded at compile time)
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! APV_<SECTION>_<KEY>=value
//!
//! Examples:
//!     APV_COMMON_SEED=7
//!     APV_SEARCH_ITERATIONS=1600
//!     APV_SEARCH_MAX_CONCURRENCY=16
//!     APV_BOARD_SIZE=13
//! ```

mod defaults;
mod loader;
mod structs;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;
