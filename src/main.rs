use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use comby_client::config::{
	CONFIG_FILE_NAME, Settings, discover_configs, init_template, load_settings, user_config_path,
};
use comby_client::exec::resolve_command;
use comby_client::{
	Arguments, CombyBinary, CombyError, CombyHttp, Engine, EphemeralServer, HttpOptions, Rewrite,
	ServerOptions, telemetry,
};

#[derive(Parser)]
#[command(name = "comby-client")]
#[command(
	author,
	version,
	about = "Run structural matches, rewrites and substitutions through Comby"
)]
#[command(arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Command that starts the engine (overrides config and COMBY_BIN)
	#[arg(long, global = true, value_name = "CMD")]
	binary: Option<String>,

	/// Matcher to use, as a file extension such as .py
	#[arg(long, global = true, value_name = "EXT")]
	language: Option<String>,

	/// Talk to a running engine server; without a URL, uses server.url from config
	#[arg(
		long,
		global = true,
		value_name = "URL",
		num_args = 0..=1,
		require_equals = true
	)]
	server: Option<Option<String>>,

	/// Launch a private engine server for this invocation
	#[arg(long, global = true, conflicts_with = "server")]
	ephemeral: bool,

	/// Create a template .comby-client.toml in the current directory
	#[arg(long)]
	init: bool,

	/// Overwrite existing .comby-client.toml when using --init
	#[arg(long, requires = "init")]
	force: bool,
}

#[derive(Subcommand)]
enum Commands {
	/// Print every match of TEMPLATE as one JSON object per line
	Matches {
		template: String,

		/// Read the source from FILE instead of stdin
		#[arg(long, value_name = "FILE")]
		source: Option<PathBuf>,

		/// Check each match against the source text before printing it
		#[arg(long)]
		verify: bool,
	},
	/// Rewrite every match of MATCH with REWRITE and print the result
	Rewrite {
		#[arg(value_name = "MATCH")]
		match_template: String,

		#[arg(value_name = "REWRITE")]
		rewrite_template: String,

		/// Read the source from FILE instead of stdin
		#[arg(long, value_name = "FILE")]
		source: Option<PathBuf>,

		/// Print a unified diff instead of the rewritten source
		#[arg(long)]
		diff: bool,

		/// Let holes at the top level match across newlines
		#[arg(long)]
		match_newline_at_toplevel: bool,

		/// Extra substitution for the rewrite template (repeatable)
		#[arg(long = "arg", value_name = "NAME=VALUE", value_parser = parse_binding)]
		args: Vec<(String, String)>,
	},
	/// Fill the holes of TEMPLATE with the given arguments
	Substitute {
		template: String,

		/// Value for one hole (repeatable)
		#[arg(long = "arg", value_name = "NAME=VALUE", value_parser = parse_binding)]
		args: Vec<(String, String)>,
	},
	/// Print the engine version
	Version,
	/// Configuration management commands
	Config {
		#[command(subcommand)]
		action: ConfigAction,
	},
}

#[derive(Subcommand)]
enum ConfigAction {
	/// Display the effective configuration and the files it came from
	Show,
	/// Check all config files for errors without running anything
	Validate,
}

fn main() -> ExitCode {
	match run() {
		Ok(code) => code,
		Err(e) => {
			eprintln!("error: {e:?}");
			engine_exit_code(&e).unwrap_or(ExitCode::FAILURE)
		}
	}
}

/// Exit with the engine's own status when it was the engine that failed.
fn engine_exit_code(error: &anyhow::Error) -> Option<ExitCode> {
	let code = error.downcast_ref::<CombyError>()?.exit_code()?;
	u8::try_from(code)
		.ok()
		.filter(|code| *code != 0)
		.map(ExitCode::from)
}

fn parse_binding(raw: &str) -> std::result::Result<(String, String), String> {
	match raw.split_once('=') {
		Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
		_ => Err(format!("expected NAME=VALUE, got `{raw}`")),
	}
}

fn run() -> Result<ExitCode> {
	let cli = Cli::parse();

	if cli.init {
		return handle_init(cli.force);
	}

	let Some(command) = cli.command else {
		return Ok(ExitCode::SUCCESS);
	};

	if let Commands::Config { action } = &command {
		return match action {
			ConfigAction::Show => handle_config_show(),
			ConfigAction::Validate => handle_config_validate(),
		};
	}

	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let mut settings = load_settings(&cwd).context("Failed to load configuration")?;
	if let Some(binary) = cli.binary {
		settings.engine.binary = binary;
	}
	settings.validate().context("Invalid command-line override")?;

	telemetry::initialise(&settings.logging).context("Failed to initialise logging")?;

	let engine = open_engine(&settings, cli.server, cli.ephemeral)?;
	let language = cli.language.as_deref();

	match command {
		Commands::Matches {
			template,
			source,
			verify,
		} => handle_matches(&*engine, &template, source.as_deref(), verify, language),
		Commands::Rewrite {
			match_template,
			rewrite_template,
			source,
			diff,
			match_newline_at_toplevel,
			args,
		} => {
			let source = read_source(source.as_deref())?;
			let mut request = Rewrite::new(&source, &match_template, &rewrite_template)
				.args(args.into_iter().collect())
				.diff(diff)
				.match_newline_at_toplevel(match_newline_at_toplevel);
			if let Some(language) = language {
				request = request.language(language);
			}
			let output = engine.rewrite(&request).context("Rewrite failed")?;
			print!("{output}");
			Ok(ExitCode::SUCCESS)
		}
		Commands::Substitute { template, args } => {
			let args: Arguments = args.into_iter().collect();
			let output = engine
				.substitute(&template, &args, language)
				.context("Substitution failed")?;
			println!("{output}");
			Ok(ExitCode::SUCCESS)
		}
		Commands::Version => {
			let version = engine.version().context("Failed to query engine version")?;
			println!("{version}");
			Ok(ExitCode::SUCCESS)
		}
		Commands::Config { .. } => Ok(ExitCode::SUCCESS),
	}
}

/// Pick the transport selected on the command line.
fn open_engine(
	settings: &Settings,
	server: Option<Option<String>>,
	ephemeral: bool,
) -> Result<Box<dyn Engine>> {
	if ephemeral {
		let options = ServerOptions::from_settings(&settings.server);
		let server = EphemeralServer::launch(&options)
			.with_context(|| format!("Failed to launch engine server `{}`", options.command))?;
		return Ok(Box::new(server));
	}

	if let Some(url) = server {
		let url = url
			.filter(|url| !url.is_empty())
			.or_else(|| settings.server.url.clone())
			.context("--server needs a URL or server.url in configuration")?;
		let client = CombyHttp::connect(&url, HttpOptions::from_settings(&settings.server))
			.with_context(|| format!("Failed to connect to engine server at {url}"))?;
		return Ok(Box::new(client));
	}

	Ok(Box::new(CombyBinary::from_settings(&settings.engine)))
}

fn read_source(path: Option<&Path>) -> Result<String> {
	match path {
		Some(path) => std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read source file {}", path.display())),
		None => {
			let mut source = String::new();
			io::stdin()
				.read_to_string(&mut source)
				.context("Failed to read source from stdin")?;
			Ok(source)
		}
	}
}

fn handle_matches(
	engine: &dyn Engine,
	template: &str,
	source: Option<&Path>,
	verify: bool,
	language: Option<&str>,
) -> Result<ExitCode> {
	let source = read_source(source)?;
	let matches = engine
		.find_matches(&source, template, language)
		.context("Failed to find matches")?;

	for (index, found) in matches.enumerate() {
		let found = found.with_context(|| format!("Failed to decode match {index}"))?;
		if verify {
			found
				.verify_against(&source)
				.with_context(|| format!("Match {index} does not agree with the source"))?;
		}
		let line = serde_json::to_string(&found).context("Failed to encode match")?;
		println!("{line}");
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_init(force: bool) -> Result<ExitCode> {
	let config_path = PathBuf::from(CONFIG_FILE_NAME);

	if config_path.exists() && !force {
		anyhow::bail!("{CONFIG_FILE_NAME} already exists. Use --force to overwrite.");
	}

	std::fs::write(&config_path, init_template())
		.with_context(|| format!("Failed to write {}", config_path.display()))?;

	println!("Created {CONFIG_FILE_NAME}");
	Ok(ExitCode::SUCCESS)
}

fn handle_config_show() -> Result<ExitCode> {
	let cwd = std::env::current_dir().context("Failed to get current directory")?;
	let settings = load_settings(&cwd).context("Failed to load configuration")?;

	if settings.sources.is_empty() {
		println!("# No configuration files found; showing defaults.");
	} else {
		println!("# Configuration files (in cascade order):");
		for source in &settings.sources {
			println!("#   {}", source.display());
		}
	}
	println!();

	let rendered = toml::to_string(&settings).context("Failed to render configuration")?;
	print!("{rendered}");

	if let Ok(user_path) = user_config_path() {
		println!();
		let state = if user_path.exists() { "exists" } else { "not found" };
		println!("# User config path: {} ({state})", user_path.display());
	}

	Ok(ExitCode::SUCCESS)
}

fn handle_config_validate() -> Result<ExitCode> {
	let cwd = std::env::current_dir().context("Failed to get current directory")?;

	let configs = match discover_configs(&cwd) {
		Ok(configs) => configs,
		Err(e) => {
			eprintln!("Configuration error: {}", e);
			return Ok(ExitCode::FAILURE);
		}
	};
	let settings = match load_settings(&cwd) {
		Ok(settings) => settings,
		Err(e) => {
			eprintln!("Configuration error: {}", e);
			return Ok(ExitCode::FAILURE);
		}
	};

	if configs.is_empty() {
		println!("No configuration files found.");
	} else {
		println!("All configuration files are valid:");
		for loaded in &configs {
			println!("  {}", loaded.path.display());
		}
	}

	let program = settings
		.engine
		.binary
		.split_whitespace()
		.next()
		.unwrap_or_default();
	if resolve_command(program).is_none() {
		println!("Warning: engine command `{program}` was not found on PATH");
	}

	Ok(ExitCode::SUCCESS)
}
