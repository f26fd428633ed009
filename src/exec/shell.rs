use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that never need quoting in a POSIX shell word.
static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| {
	Regex::new(r"[^A-Za-z0-9_@%+=:,./-]").expect("static shell-safe pattern compiles")
});

/// Quote a single word so the shell passes it through unchanged.
///
/// Words made only of shell-safe characters are returned as-is. Anything
/// else is wrapped in single quotes, with each embedded `'` closed, emitted
/// inside double quotes, and reopened.
pub fn quote(word: &str) -> String {
	if word.is_empty() {
		return "''".to_string();
	}
	if !UNSAFE_CHARS.is_match(word) {
		return word.to_string();
	}
	format!("'{}'", word.replace('\'', r#"'"'"'"#))
}

/// Join a program prefix and its arguments into one shell command line.
///
/// `program` is used verbatim so it may carry its own words (for example a
/// wrapper such as `docker run --rm -i comby/comby`); every argument is
/// quoted.
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
	let mut line = program.to_string();
	for arg in args {
		line.push(' ');
		line.push_str(&quote(arg.as_ref()));
	}
	line
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_quote_safe_word_unchanged() {
		assert_eq!(quote("-matcher"), "-matcher");
		assert_eq!(quote(".py"), ".py");
		assert_eq!(quote("a=b,c:d/e@f%g+h"), "a=b,c:d/e@f%g+h");
	}

	#[test]
	fn test_quote_empty() {
		assert_eq!(quote(""), "''");
	}

	#[test]
	fn test_quote_spaces_and_holes() {
		assert_eq!(quote("print(:[1])"), "'print(:[1])'");
		assert_eq!(quote("my name is :[1]"), "'my name is :[1]'");
	}

	#[test]
	fn test_quote_single_quotes() {
		assert_eq!(quote("it's"), r#"'it'"'"'s'"#);
	}

	#[test]
	fn test_quote_shell_metacharacters() {
		assert_eq!(quote("$HOME; rm -rf /"), "'$HOME; rm -rf /'");
		assert_eq!(quote("a\\nb"), "'a\\nb'");
		assert_eq!(quote("line\nbreak"), "'line\nbreak'");
	}

	#[test]
	fn test_command_line_joins_quoted_words() {
		let line = command_line("comby", &["-stdin", "print(:[1])", "foo"]);
		assert_eq!(line, "comby -stdin 'print(:[1])' foo");
	}

	#[test]
	fn test_command_line_keeps_program_words() {
		let line = command_line("docker run --rm -i comby/comby", &["-version"]);
		assert_eq!(line, "docker run --rm -i comby/comby -version");
	}
}
