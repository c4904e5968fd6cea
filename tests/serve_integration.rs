//! Purpose: End-to-end tests for the `faaskit serve` demo function server.
//! Exports: None (integration test module).
//! Role: Validate preflight, CORS headers, method rejection and decode errors over TCP.
//! Invariants: Uses loopback-only servers on freshly picked ports.
//! Invariants: Bounded waits avoid test flakiness.
//! Invariants: Server processes are cleaned up on drop.
use serde_json::{Value, json};
use std::net::TcpListener;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

const VALID: &str = "http://valid.com";
const INVALID: &str = "http://invalid.com";

static SERVER_LOCK: Mutex<()> = Mutex::new(());

struct TestServer {
    child: Child,
    base_url: String,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start(extra_args: &[&str]) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}/");

            let mut child = Command::new(env!("CARGO_BIN_EXE_faaskit"))
                .arg("serve")
                .arg("--bind")
                .arg(&bind)
                .arg("--cors-origin")
                .arg(VALID)
                .args(extra_args)
                .env_remove("ALLOWED_ORIGINS")
                .env_remove("MAX_BODY_BYTES")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()?;
            match wait_ready(&mut child, &base_url) {
                Ok(()) => {
                    return Ok(TestServer {
                        child,
                        base_url,
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn send(
        &self,
        method: &str,
        origin: Option<&str>,
        body: Option<&str>,
    ) -> TestResult<ureq::Response> {
        let mut request = ureq::request(method, &self.base_url);
        if let Some(origin) = origin {
            request = request.set("Origin", origin);
        }
        let result = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_string(body),
            None => request.call(),
        };
        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(_, response)) => Ok(response),
            Err(err) => Err(err.into()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_ready(child: &mut Child, base_url: &str) -> TestResult<()> {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait()? {
            return Err(format!("server exited early: {status}").into());
        }
        if ureq::get(base_url).call().is_ok() {
            return Ok(());
        }
        sleep(Duration::from_millis(50));
    }
    Err("server did not become ready".into())
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn json_body(response: ureq::Response) -> TestResult<Value> {
    Ok(serde_json::from_str(&response.into_string()?)?)
}

#[test]
fn matched_preflight_gets_204_and_full_cors_headers() -> TestResult<()> {
    let server = TestServer::start(&[])?;
    let response = server.send("OPTIONS", Some(VALID), None)?;

    assert_eq!(response.status(), 204);
    assert_eq!(
        response.header("access-control-allow-headers"),
        Some("Authorization")
    );
    assert_eq!(
        response.header("access-control-allow-methods"),
        Some("GET,POST,OPTIONS")
    );
    assert_eq!(response.header("access-control-allow-origin"), Some(VALID));
    assert_eq!(response.header("access-control-max-age"), Some("300"));
    Ok(())
}

#[test]
fn unmatched_preflight_gets_no_cors_headers() -> TestResult<()> {
    let server = TestServer::start(&[])?;
    let response = server.send("OPTIONS", Some(INVALID), None)?;

    assert_eq!(response.status(), 405);
    assert_eq!(response.header("access-control-allow-origin"), None);
    assert_eq!(response.header("access-control-max-age"), None);
    Ok(())
}

#[test]
fn simple_request_from_allowed_origin_gets_partial_cors_headers() -> TestResult<()> {
    let server = TestServer::start(&[])?;
    let response = server.send("GET", Some(VALID), None)?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("access-control-allow-origin"), Some(VALID));
    assert_eq!(
        response.header("access-control-allow-methods"),
        Some("GET,POST,OPTIONS")
    );
    assert_eq!(response.header("access-control-allow-headers"), None);
    assert_eq!(response.header("access-control-max-age"), None);
    assert_eq!(json_body(response)?, json!({ "ok": true }));
    Ok(())
}

#[test]
fn disallowed_method_gets_structured_error() -> TestResult<()> {
    let server = TestServer::start(&[])?;
    let response = server.send("PUT", Some(INVALID), Some("{}"))?;

    assert_eq!(response.status(), 405);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(
        json_body(response)?,
        json!({ "status": "Method Not Allowed", "reason": "method not allowed", "code": 405 })
    );
    Ok(())
}

#[test]
fn post_round_trips_payload() -> TestResult<()> {
    let server = TestServer::start(&[])?;
    let response = server.send(
        "POST",
        Some(VALID),
        Some(r#"{"message":"hello","uppercase":true}"#),
    )?;

    assert_eq!(response.status(), 200);
    assert_eq!(response.header("access-control-allow-origin"), Some(VALID));
    let body = json_body(response)?;
    assert_eq!(body["message"], "HELLO");
    let client = body["client"].as_str().unwrap_or_default();
    assert!(client.starts_with("127.0.0.1:"), "{client}");
    Ok(())
}

#[test]
fn decode_failures_are_reported_to_the_client() -> TestResult<()> {
    let server = TestServer::start(&[])?;
    let cases = [
        ("", "body must not be empty"),
        (
            r#"{"message":"a"}{"message":"b"}"#,
            "body must only contain a single JSON value",
        ),
        (
            r#"{"message":"a","unknown_key":1}"#,
            "body contains unknown key \"unknown_key\"",
        ),
        (
            r#"{"message":"a","uppercase":"yes"}"#,
            "body contains incorrect JSON type for field \"uppercase\"",
        ),
    ];

    for (body, reason) in cases {
        let response = server.send("POST", None, Some(body))?;
        assert_eq!(response.status(), 400, "body {body:?}");
        let value = json_body(response)?;
        assert_eq!(value["reason"], reason, "body {body:?}");
        assert_eq!(value["code"], 400);
    }
    Ok(())
}

#[test]
fn oversized_body_is_rejected_with_413() -> TestResult<()> {
    let server = TestServer::start(&["--max-body-bytes", "64"])?;
    let body = format!(r#"{{"message":"{}"}}"#, "x".repeat(200));
    let response = server.send("POST", None, Some(&body))?;

    assert_eq!(response.status(), 413);
    assert_eq!(
        json_body(response)?["reason"],
        "body must not be larger than 64 bytes"
    );
    Ok(())
}
