mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use comby_client::{
	Arguments, ClientState, CombyError, CombyHttp, Engine, HttpOptions, Rewrite,
};
use support::{FakeServer, HELLO_MATCH_ARRAY};

fn options() -> HttpOptions {
	HttpOptions {
		timeout: Duration::from_secs(5),
		connection_timeout: Duration::from_secs(5),
		probe_interval: Duration::from_millis(10),
	}
}

fn secret() -> Arguments {
	let mut args = Arguments::new();
	args.insert("1".to_string(), "very secret".to_string());
	args
}

#[test]
fn test_connect_waits_for_ready_status() {
	let probes = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&probes);
	let server = FakeServer::start(move |request| {
		if request.path == "/status" && seen.fetch_add(1, Ordering::SeqCst) < 3 {
			(503, "starting".to_string())
		} else {
			(204, String::new())
		}
	});

	let client = CombyHttp::connect(&server.url(), options()).unwrap();
	assert_eq!(client.state(), ClientState::Ready);
	assert_eq!(probes.load(Ordering::SeqCst), 4);
	assert!(server.requests().iter().all(|r| r.method == "GET" && r.path == "/status"));
}

#[test]
fn test_connect_gives_up_when_never_ready() {
	let server = FakeServer::start(|_| (503, "starting".to_string()));
	let options = HttpOptions {
		connection_timeout: Duration::from_millis(200),
		..options()
	};

	match CombyHttp::connect(&server.url(), options).unwrap_err() {
		CombyError::ConnectionFailure { url, timeout } => {
			assert!(url.starts_with(&server.url()));
			assert_eq!(timeout, Duration::from_millis(200));
		}
		other => panic!("Expected ConnectionFailure, got {other:?}"),
	}
}

#[test]
fn test_find_matches_decodes_array() {
	let server = FakeServer::engine(|_, _| HELLO_MATCH_ARRAY.to_string());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	let source = "print('hello world')";
	let matches: Vec<_> = client
		.find_matches(source, "print(:[1])", Some(".py"))
		.unwrap()
		.collect::<Result<_, _>>()
		.unwrap();

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].matched(), source);
	assert_eq!(matches[0]["1"].fragment(), "'hello world'");
	matches[0].verify_against(source).unwrap();

	let posts = server.posts();
	assert_eq!(posts[0].path, "/matches");
	assert_eq!(
		posts[0].json(),
		serde_json::json!({"source": source, "template": "print(:[1])"})
	);
	assert_eq!(client.state(), ClientState::Ready);
}

#[test]
fn test_find_matches_decodes_older_server_shape() {
	let server = FakeServer::engine(|_, _| {
		r#"[{"location":"0:0::0:20","environment":{"1":{"term":"1","location":"0:6::0:19","content":"'hello world'"}}}]"#
			.to_string()
	});
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	let source = "print('hello world')";
	let matches: Vec<_> = client
		.find_matches(source, "print(:[1])", None)
		.unwrap()
		.collect::<Result<_, _>>()
		.unwrap();

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].matched(), source);
	assert_eq!(matches[0].location().to_string(), "0:0::0:20");
	assert_eq!(matches[0]["1"].fragment(), "'hello world'");
	matches[0].verify_against(source).unwrap();
}

#[test]
fn test_find_matches_empty_array() {
	let server = FakeServer::engine(|_, _| "[]".to_string());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	let mut matches = client.find_matches("foo", "bar", None).unwrap();
	assert_eq!(matches.len(), 0);
	assert!(matches.next().is_none());
}

#[test]
fn test_substitute_strips_one_newline() {
	let server = FakeServer::engine(|_, _| "my name is very secret\n".to_string());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	let output = client.substitute("my name is :[1]", &secret(), None).unwrap();
	assert_eq!(output, "my name is very secret");
	assert_eq!(
		server.posts()[0].json(),
		serde_json::json!({"template": "my name is :[1]", "arguments": {"1": "very secret"}})
	);
}

#[test]
fn test_rewrite_forwards_arguments() {
	let server = FakeServer::engine(|_, _| "println('hello world')".to_string());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	let request = Rewrite::new("print('hello world')", "print(:[1])", "println(:[1])")
		.args(secret());
	let output = client.rewrite(&request).unwrap();
	assert_eq!(output, "println('hello world')");

	let post = &server.posts()[0];
	assert_eq!(post.path, "/rewrite");
	assert_eq!(
		post.json(),
		serde_json::json!({
			"source": "print('hello world')",
			"match": "print(:[1])",
			"rewrite": "println(:[1])",
			"arguments": {"1": "very secret"}
		})
	);
}

#[test]
fn test_rewrite_diff_is_unsupported() {
	let server = FakeServer::engine(|_, _| String::new());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	let request = Rewrite::new("a", "a", "b").diff(true);
	match client.rewrite(&request).unwrap_err() {
		CombyError::UnsupportedOperation { operation, .. } => assert_eq!(operation, "rewrite"),
		other => panic!("Expected UnsupportedOperation, got {other:?}"),
	}

	let request = Rewrite::new("a", "a", "b").match_newline_at_toplevel(true);
	assert!(matches!(
		client.rewrite(&request),
		Err(CombyError::UnsupportedOperation { .. })
	));
	assert!(server.posts().is_empty());
}

#[test]
fn test_version_is_unsupported() {
	let server = FakeServer::engine(|_, _| String::new());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();
	assert!(matches!(
		client.version(),
		Err(CombyError::UnsupportedOperation { operation: "version", .. })
	));
}

#[test]
fn test_rejected_request_returns_to_ready() {
	let calls = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&calls);
	let server = FakeServer::start(move |request| match request.path.as_str() {
		"/status" => (204, String::new()),
		_ if seen.fetch_add(1, Ordering::SeqCst) == 0 => (500, "template parse error".to_string()),
		_ => (200, "ok\n".to_string()),
	});
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	match client.substitute(":[1]", &secret(), None).unwrap_err() {
		CombyError::EngineRejected { status, body } => {
			assert_eq!(status, 500);
			assert_eq!(body, "template parse error");
		}
		other => panic!("Expected EngineRejected, got {other:?}"),
	}
	assert_eq!(client.state(), ClientState::Ready);
	assert_eq!(client.substitute(":[1]", &secret(), None).unwrap(), "ok");
}

#[test]
fn test_malformed_matches_body() {
	let server = FakeServer::engine(|_, _| r#"{"not": "an array"}"#.to_string());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	match client.find_matches("src", "tmpl", None).unwrap_err() {
		CombyError::MalformedResponse { .. } => {}
		other => panic!("Expected MalformedResponse, got {other:?}"),
	}
	assert_eq!(client.state(), ClientState::Ready);
}

#[test]
fn test_closed_client_fails_fast() {
	let server = FakeServer::engine(|_, _| "[]".to_string());
	let client = CombyHttp::connect(&server.url(), options()).unwrap();

	client.close();
	client.close();
	assert_eq!(client.state(), ClientState::Closed);

	assert!(matches!(client.find_matches("a", "b", None), Err(CombyError::Closed)));
	assert!(matches!(client.substitute("a", &Arguments::new(), None), Err(CombyError::Closed)));
	assert!(matches!(client.version(), Err(CombyError::Closed)));
	assert!(server.posts().is_empty());
}
