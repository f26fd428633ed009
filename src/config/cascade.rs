use crate::config::parser::parse_config_file;
use crate::config::types::{FileConfig, LoadedConfig, Settings};
use crate::error::{CombyError, Result};
use std::path::{Path, PathBuf};

/// Name of the config file looked up in each directory.
pub const CONFIG_FILE_NAME: &str = ".comby-client.toml";

/// Discover and load all config files in the cascade.
///
/// The cascade order is:
/// 1. Start from `start_dir` and look for `.comby-client.toml`
/// 2. If found and `root = true`, skip to user config only
/// 3. Otherwise, continue up the directory tree
/// 4. Finally, check ~/.comby-client.toml (unless disabled)
///
/// Returns configs in cascade order (most specific first).
pub fn discover_configs(start_dir: &Path) -> Result<Vec<LoadedConfig>> {
	let mut configs = discover_project_configs(start_dir)?;

	if let Some(user_config) = load_user_config(&configs)? {
		// The user file may also be the nearest project file when working
		// under the home directory.
		if !configs.iter().any(|loaded| loaded.path == user_config.path) {
			configs.push(user_config);
		}
	}

	Ok(configs)
}

/// Walk up from `start_dir` collecting config files, stopping after one
/// that sets `root = true`.
pub fn discover_project_configs(start_dir: &Path) -> Result<Vec<LoadedConfig>> {
	let mut configs = Vec::new();
	let mut current_dir = Some(start_dir);

	while let Some(dir) = current_dir {
		let config_path = dir.join(CONFIG_FILE_NAME);

		if config_path.exists() {
			let config = parse_config_file(&config_path)?;
			let stop = config.root;
			configs.push(LoadedConfig {
				config,
				path: config_path,
			});
			if stop {
				break;
			}
		}

		current_dir = dir.parent();
	}

	Ok(configs)
}

/// Load the user's ~/.comby-client.toml if it exists and isn't disabled.
fn load_user_config(existing_configs: &[LoadedConfig]) -> Result<Option<LoadedConfig>> {
	for loaded in existing_configs {
		if let Some(ref env_var) = loaded.config.user_config_disable_env_var
			&& is_env_truthy(env_var)
		{
			return Ok(None);
		}
	}

	let user_config_path = user_config_path()?;

	if user_config_path.exists() {
		let config = parse_config_file(&user_config_path)?;
		Ok(Some(LoadedConfig {
			config,
			path: user_config_path,
		}))
	} else {
		Ok(None)
	}
}

/// Check if an environment variable is set to a truthy value.
fn is_env_truthy(var_name: &str) -> bool {
	match std::env::var(var_name) {
		Ok(value) => {
			let lower = value.to_lowercase();
			!value.is_empty() && lower != "0" && lower != "false" && lower != "no"
		}
		Err(_) => false,
	}
}

/// Merge configs in cascade order: for each setting, the nearest file that
/// sets it wins.
pub fn merge_configs(configs: &[LoadedConfig]) -> FileConfig {
	let mut merged = FileConfig::default();
	for loaded in configs {
		merged.layer_under(&loaded.config);
	}
	merged
}

/// Discover, merge, default, override and validate settings for a directory.
pub fn load_settings(start_dir: &Path) -> Result<Settings> {
	let configs = discover_configs(start_dir)?;
	let mut settings = Settings::resolve(merge_configs(&configs));
	settings.sources = configs.into_iter().map(|loaded| loaded.path).collect();
	settings.apply_env(|name| std::env::var(name).ok());
	settings.validate()?;
	Ok(settings)
}

/// Get the path to the user's config file.
pub fn user_config_path() -> Result<PathBuf> {
	let home_dir = dirs::home_dir().ok_or(CombyError::HomeDirectoryNotFound)?;
	Ok(home_dir.join(CONFIG_FILE_NAME))
}
