//! Configuration system for flowbridge.
//!
//! Provides TOML-based configuration with:
//! - A `[server]` section describing how the bridge process is launched
//! - Config file layering (XDG user config + project-local overrides)
//!
//! Every field is optional; unset fields fall back to the client's built-in
//! launch defaults.

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
