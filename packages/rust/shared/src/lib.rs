//! Shared error model and configuration for nbcolab.
//!
//! This crate is the foundation depended on by all other nbcolab crates.
//! It provides:
//! - [`NbColabError`]: the unified error type
//! - Configuration ([`AppConfig`], config loading) and the runtime rule set
//!   ([`RewriteConfig`]) consumed by the notebook rewriter

pub mod config;
pub mod error;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AssetsConfig, DependenciesConfig, NotebookConfig, RewriteConfig, TagsConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{NbColabError, Result};
