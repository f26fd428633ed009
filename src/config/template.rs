/// Contents written by `comby-client --init`.
pub fn init_template() -> &'static str {
	r#"# comby-client configuration
#
# Files named .comby-client.toml are read from the current directory upwards.
# For each setting the nearest file wins; ~/.comby-client.toml is read last.

# Stop looking in parent directories after this file.
# root = true

# Skip ~/.comby-client.toml when this environment variable is truthy.
# user-config-disable-env-var = "CI"

[engine]
# Command that starts comby. COMBY_BIN overrides it.
# binary = "comby"
# Default matcher, by file extension.
# language = ".c"

[server]
# Command started by --ephemeral as `<command> -p <port>`.
# command = "comby-server"
# port = 8888
# An already running server, used by --server when no URL is given.
# url = "http://127.0.0.1:8888"
# timeout-secs = 30
# connection-timeout-secs = 30
# probe-interval-ms = 50
# verbose = false

[logging]
# RUST_LOG takes precedence over this filter.
# filter = "comby_client=info"
# format = "compact"
"#
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::parse_config_str;
	use crate::config::types::{FileConfig, Settings};
	use std::path::Path;

	#[test]
	fn test_template_parses_to_defaults() {
		let config = parse_config_str(init_template(), Path::new("template.toml")).unwrap();
		assert_eq!(config, FileConfig::default());
		assert_eq!(Settings::resolve(config), Settings::default());
	}

	#[test]
	fn test_template_uncommented_is_valid() {
		let uncommented: String = init_template()
			.lines()
			.map(|line| match line.strip_prefix("# ") {
				Some(rest) if rest.contains(" = ") => rest,
				_ => line,
			})
			.collect::<Vec<_>>()
			.join("\n");
		let config = parse_config_str(&uncommented, Path::new("template.toml")).unwrap();
		assert!(config.root);
		assert_eq!(config.server.port, Some(8888));
		assert!(Settings::resolve(config).validate().is_ok());
	}
}
