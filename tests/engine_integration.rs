//! End-to-end checks against a real `comby` executable.
//!
//! Run with `cargo test -- --ignored` on a machine with comby installed.

use comby_client::{Arguments, CombyBinary, Engine, Match, Rewrite};

fn comby() -> CombyBinary {
	CombyBinary::default()
}

fn collect(source: &str, template: &str) -> Vec<Match> {
	comby()
		.find_matches(source, template, None)
		.unwrap()
		.collect::<Result<_, _>>()
		.unwrap()
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_version() {
	let version = comby().version().unwrap();
	assert!(!version.is_empty());
	assert_eq!(version.trim(), version);
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_no_match_is_empty() {
	assert!(collect("foo", "bar").is_empty());
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_hello_world_match() {
	let source = "print('hello world')";
	let matches = collect(source, "print(:[1])");

	assert_eq!(matches.len(), 1);
	let found = &matches[0];
	assert_eq!(found.matched(), source);
	assert_eq!(found["1"].fragment(), "'hello world'");
	found.verify_against(source).unwrap();
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_matches_agree_with_source_spans() {
	let source = "let a = f(1);\nlet b = f(g(2, 3));\nlet c = f();\n";
	let matches = collect(source, "f(:[args])");

	assert_eq!(matches.len(), 3);
	for found in &matches {
		found.verify_against(source).unwrap();
	}
	assert!(
		matches
			.windows(2)
			.all(|pair| pair[0].location().start().is_at_or_before(&pair[1].location().start()))
	);
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_rewrite() {
	let request = Rewrite::new("print('hello world')", "print(:[1])", "println(:[1])");
	assert_eq!(comby().rewrite(&request).unwrap(), "println('hello world')");
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_rewrite_diff() {
	let request =
		Rewrite::new("print('hello world')\n", "print(:[1])", "println(:[1])").diff(true);
	let diff = comby().rewrite(&request).unwrap();
	assert!(diff.contains("-print('hello world')"));
	assert!(diff.contains("+println('hello world')"));
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_substitute() {
	let mut args = Arguments::new();
	args.insert("1".to_string(), "very secret".to_string());
	assert_eq!(
		comby().substitute("my name is :[1]", &args, None).unwrap(),
		"my name is very secret"
	);
}

#[test]
#[ignore = "requires comby on PATH"]
fn test_environment_round_trip_is_idempotent() {
	let source = "swap(first, second)";
	let matches = collect(source, "swap(:[a], :[b])");
	let args = matches[0].environment().fragments();

	let once = comby().substitute("swap(:[b], :[a])", &args, None).unwrap();
	let twice = comby().substitute("swap(:[b], :[a])", &args, None).unwrap();
	assert_eq!(once, "swap(second, first)");
	assert_eq!(once, twice);
}
