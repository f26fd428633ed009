//! Configuration loading and parsing for comby-client.
//!
//! This module handles:
//! - TOML config file parsing
//! - Directory cascade discovery
//! - Field-by-field merging, defaults, and environment overrides

pub mod cascade;
pub mod parser;
pub mod template;
pub mod types;

pub use cascade::{
	CONFIG_FILE_NAME, discover_configs, discover_project_configs, load_settings, merge_configs,
	user_config_path,
};
pub use parser::{parse_config_file, parse_config_str};
pub use template::init_template;
pub use types::{
	BINARY_ENV_VAR, EngineSettings, FileConfig, LoadedConfig, LogFormat, LoggingSettings,
	ServerSettings, Settings,
};
