use crate::config::types::FileConfig;
use crate::error::{CombyError, Result};
use std::path::Path;

/// Parse a config file from the given path.
pub fn parse_config_file(path: &Path) -> Result<FileConfig> {
	let content = std::fs::read_to_string(path).map_err(|source| CombyError::ConfigRead {
		path: path.to_path_buf(),
		source,
	})?;

	parse_config_str(&content, path)
}

/// Parse a config from a string (useful for testing).
pub fn parse_config_str(content: &str, path: &Path) -> Result<FileConfig> {
	toml::from_str(content).map_err(|source| CombyError::ConfigParse {
		path: path.to_path_buf(),
		source,
	})
}
