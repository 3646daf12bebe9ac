//! Integration tests for the HTTP surface over a real TCP socket.

use cuelink_auth::AuthEngine;
use cuelink_model::{Column, Cue, CueStack};
use cuelink_server::{AppState, MemoryCueDocument, Server, ServerConfig};
use cuelink_store::{unix_millis, CredentialStore};
use cuelink_timer::ShowTimer;
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start_server(dir: &TempDir) -> SocketAddr {
    let store =
        CredentialStore::open(&dir.path().join("credentials.json"), unix_millis()).unwrap();
    let auth = Arc::new(AuthEngine::new(store));
    auth.seed_default_admin().unwrap();

    let mut stack = CueStack::new(
        "Act One",
        vec![Column::new("Cue", 60.0), Column::new("Action", 120.0)],
    );
    stack
        .cues
        .push(Cue::new(vec!["1".into(), "House out".into()], "5:00"));

    let state = AppState {
        config: ServerConfig::new("127.0.0.1:0".parse().unwrap()),
        auth,
        timer: Arc::new(ShowTimer::new()),
        document: Arc::new(MemoryCueDocument::new(vec![stack])),
    };
    let server = Server::bind(state).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.serve());
    addr
}

fn raw_request(method: &str, path: &str, headers: &[(&str, &str)], body: &str) -> String {
    let mut out = format!("{method} {path} HTTP/1.1\r\nHost: cuelink\r\n");
    for (name, value) in headers {
        out.push_str(&format!("{name}: {value}\r\n"));
    }
    if !body.is_empty() {
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    out.push_str("\r\n");
    out.push_str(body);
    out
}

/// Reads one response off the stream: `(status, head, body)`.
async fn read_response(stream: &mut TcpStream) -> (u16, String, String) {
    let mut buf = Vec::new();
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before a full response head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..head_end].to_vec()).unwrap();
    let status: u16 = head
        .split_ascii_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .expect("status line");
    let content_length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + content_length {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8(buf[body_start..body_start + content_length].to_vec()).unwrap();
    (status, head, body)
}

async fn round_trip(
    stream: &mut TcpStream,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: &str,
) -> (u16, String, String) {
    stream
        .write_all(raw_request(method, path, headers, body).as_bytes())
        .await
        .unwrap();
    read_response(stream).await
}

#[tokio::test]
async fn open_endpoints_over_one_keep_alive_connection() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let (status, head, body) = round_trip(&mut stream, "GET", "/", &[], "").await;
    assert_eq!(status, 200);
    assert!(head.contains("Access-Control-Allow-Origin: *"));
    assert!(body.contains("CueLink"));

    // Same connection, next pipelined request.
    let (status, _, body) = round_trip(&mut stream, "GET", "/cues", &[], "").await;
    assert_eq!(status, 200);
    assert!(body.contains("\"cueStackName\":\"Act One\""));

    let (status, _, body) = round_trip(&mut stream, "GET", "/timer-state", &[], "").await;
    assert_eq!(status, 200);
    assert!(body.contains("currentTime"));

    let (status, _, _) = round_trip(&mut stream, "GET", "/no-such-route", &[], "").await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn preflight_from_a_browser_origin() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let (status, head, body) = round_trip(
        &mut stream,
        "OPTIONS",
        "/auth/login",
        &[("Origin", "http://viewer.local")],
        "",
    )
    .await;
    assert_eq!(status, 200);
    assert!(body.is_empty());
    assert!(head.contains("Access-Control-Allow-Methods: GET, POST, PUT, DELETE, OPTIONS"));
    assert!(head.contains("Access-Control-Max-Age: 86400"));
}

#[tokio::test]
async fn login_then_authenticated_requests() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let (status, _, body) = round_trip(
        &mut stream,
        "POST",
        "/auth/login",
        &[("Content-Type", "application/json")],
        r#"{"username":"admin","password":"wrong"}"#,
    )
    .await;
    assert_eq!(status, 401);
    assert!(body.contains("\"success\":false"));

    let (status, _, body) = round_trip(
        &mut stream,
        "POST",
        "/auth/login",
        &[("Content-Type", "application/json")],
        r#"{"username":"admin","password":"admin"}"#,
    )
    .await;
    assert_eq!(status, 200);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    let token = parsed["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    let bearer = format!("Bearer {token}");
    let (status, _, body) = round_trip(
        &mut stream,
        "GET",
        "/auth/me",
        &[("Authorization", &bearer)],
        "",
    )
    .await;
    assert_eq!(status, 200);
    assert!(body.contains("\"username\":\"admin\""));

    let (status, _, _) = round_trip(
        &mut stream,
        "POST",
        "/auth/logout",
        &[("Authorization", &bearer)],
        "",
    )
    .await;
    assert_eq!(status, 200);

    let (status, _, _) = round_trip(
        &mut stream,
        "GET",
        "/auth/me",
        &[("Authorization", &bearer)],
        "",
    )
    .await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn timer_commands_drive_the_shared_clock() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let (status, _, _) = round_trip(
        &mut stream,
        "POST",
        "/timer-command",
        &[("Content-Type", "application/json")],
        r#"{"action":"setCountdownTime","countdownTime":90}"#,
    )
    .await;
    assert_eq!(status, 200);

    let (status, _, _) = round_trip(
        &mut stream,
        "POST",
        "/timer-command",
        &[("Content-Type", "application/json")],
        r#"{"action":"startCountdown"}"#,
    )
    .await;
    assert_eq!(status, 200);

    // A second viewer sees the same running countdown.
    let mut viewer = TcpStream::connect(addr).await.unwrap();
    let (status, _, body) = round_trip(&mut viewer, "GET", "/timer-state", &[], "").await;
    assert_eq!(status, 200);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["countdownRunning"], true);
    assert!(parsed["countdownTime"].as_f64().unwrap() > 80.0);
    assert!(parsed["countdownTarget"].is_number());
}

#[tokio::test]
async fn malformed_bytes_get_a_500_and_the_connection_closes() {
    let dir = TempDir::new().unwrap();
    let addr = start_server(&dir).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"\xff\xfe garbage\r\n\r\n").await.unwrap();
    let (status, head, _) = read_response(&mut stream).await;
    assert_eq!(status, 500);
    assert!(head.contains("Connection: close"));

    // The server drops the connection after answering.
    let mut rest = Vec::new();
    let n = stream.read_to_end(&mut rest).await.unwrap();
    assert_eq!(n, 0);
}
