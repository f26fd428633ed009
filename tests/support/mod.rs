//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

/// One request seen by [`FakeServer`].
#[derive(Debug, Clone)]
pub struct Recorded {
	pub method: String,
	pub path: String,
	pub body: String,
}

impl Recorded {
	pub fn json(&self) -> serde_json::Value {
		serde_json::from_str(&self.body).unwrap()
	}
}

/// A minimal HTTP/1.1 responder standing in for the engine server.
///
/// Every connection carries one request; the handler picks the status and
/// body of the response.
pub struct FakeServer {
	port: u16,
	requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeServer {
	pub fn start(handler: impl Fn(&Recorded) -> (u16, String) + Send + 'static) -> Self {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let port = listener.local_addr().unwrap().port();
		let requests = Arc::new(Mutex::new(Vec::new()));
		let seen = Arc::clone(&requests);

		thread::spawn(move || {
			for stream in listener.incoming() {
				let Ok(stream) = stream else { continue };
				if let Some(request) = read_request(&stream) {
					let (status, body) = handler(&request);
					seen.lock().unwrap().push(request);
					write_response(stream, status, &body);
				}
			}
		});

		FakeServer { port, requests }
	}

	/// Answers `/status` with 204 and every POST with `reply(path, body)`.
	pub fn engine(reply: impl Fn(&str, &str) -> String + Send + 'static) -> Self {
		FakeServer::start(move |request| match (request.method.as_str(), request.path.as_str()) {
			("GET", "/status") => (204, String::new()),
			("POST", path) => (200, reply(path, &request.body)),
			_ => (404, "not found".to_string()),
		})
	}

	pub fn port(&self) -> u16 {
		self.port
	}

	pub fn url(&self) -> String {
		format!("http://127.0.0.1:{}", self.port)
	}

	pub fn requests(&self) -> Vec<Recorded> {
		self.requests.lock().unwrap().clone()
	}

	pub fn posts(&self) -> Vec<Recorded> {
		self.requests()
			.into_iter()
			.filter(|request| request.method == "POST")
			.collect()
	}
}

fn read_request(stream: &TcpStream) -> Option<Recorded> {
	let mut reader = BufReader::new(stream);
	let mut request_line = String::new();
	reader.read_line(&mut request_line).ok()?;
	let mut parts = request_line.split_whitespace();
	let method = parts.next()?.to_string();
	let path = parts.next()?.to_string();

	let mut content_length = 0;
	loop {
		let mut header = String::new();
		reader.read_line(&mut header).ok()?;
		let header = header.trim_end();
		if header.is_empty() {
			break;
		}
		if let Some((name, value)) = header.split_once(':')
			&& name.eq_ignore_ascii_case("content-length")
		{
			content_length = value.trim().parse().ok()?;
		}
	}

	let mut body = vec![0; content_length];
	reader.read_exact(&mut body).ok()?;
	Some(Recorded {
		method,
		path,
		body: String::from_utf8(body).ok()?,
	})
}

fn write_response(mut stream: TcpStream, status: u16, body: &str) {
	let response = if status == 204 {
		"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n".to_string()
	} else {
		let reason = match status {
			200 => "OK",
			404 => "Not Found",
			503 => "Service Unavailable",
			_ => "Error",
		};
		format!(
			"HTTP/1.1 {status} {reason}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
			body.len()
		)
	};
	let _ = stream.write_all(response.as_bytes());
	let _ = stream.flush();
}

/// `-json-lines` output for `print(:[1])` over `print('hello world')`.
pub const HELLO_MATCH_LINE: &str = r#"{"uri":null,"matches":[{"range":{"start":{"offset":0,"line":1,"column":1},"end":{"offset":20,"line":1,"column":21}},"environment":[{"variable":"1","value":"'hello world'","range":{"start":{"offset":6,"line":1,"column":7},"end":{"offset":19,"line":1,"column":20}}}],"matched":"print('hello world')"}]}"#;

/// The same match as the HTTP `/matches` body.
pub const HELLO_MATCH_ARRAY: &str = r#"[{"range":{"start":{"offset":0,"line":1,"column":1},"end":{"offset":20,"line":1,"column":21}},"environment":[{"variable":"1","value":"'hello world'","range":{"start":{"offset":6,"line":1,"column":7},"end":{"offset":19,"line":1,"column":20}}}],"matched":"print('hello world')"}]"#;

/// A stand-in engine executable that logs its arguments and stdin next to
/// itself and answers like the engine for each request shape.
pub struct FakeEngine {
	dir: PathBuf,
}

impl FakeEngine {
	#[cfg(unix)]
	pub fn install(dir: &Path) -> Self {
		use std::os::unix::fs::PermissionsExt;

		let dir = dir.to_path_buf();
		fs::write(dir.join("matches.jsonl"), format!("{HELLO_MATCH_LINE}\n")).unwrap();

		let script = format!(
			r#"#!/bin/sh
dir='{dir}'
for arg in "$@"; do printf '%s\n' "$arg" >> "$dir/calls.log"; done
printf -- '--\n' >> "$dir/calls.log"
case " $* " in
	*" -version "*) echo "1.8.1 (fake)"; exit 0 ;;
	*" -match-only "*) cat > "$dir/stdin.txt"; cat "$dir/matches.jsonl"; exit 0 ;;
	*" -substitute-only "*) echo "my name is very secret"; exit 0 ;;
	*" -diff "*) cat > "$dir/stdin.txt"; printf -- '--- a\n+++ b\n'; exit 0 ;;
	*" -stdout "*) cat > "$dir/stdin.txt"; printf "println('hello world')"; exit 0 ;;
esac
echo "unexpected arguments: $*" >&2
exit 2
"#,
			dir = dir.display()
		);

		let path = dir.join("comby");
		fs::write(&path, script).unwrap();
		fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();

		FakeEngine { dir }
	}

	pub fn path(&self) -> PathBuf {
		self.dir.join("comby")
	}

	/// Arguments of every call, one vector per call.
	pub fn calls(&self) -> Vec<Vec<String>> {
		let log = fs::read_to_string(self.dir.join("calls.log")).unwrap_or_default();
		let mut calls = Vec::new();
		let mut current = Vec::new();
		for line in log.lines() {
			if line == "--" {
				calls.push(std::mem::take(&mut current));
			} else {
				current.push(line.to_string());
			}
		}
		calls
	}

	pub fn stdin(&self) -> String {
		fs::read_to_string(self.dir.join("stdin.txt")).unwrap_or_default()
	}
}
