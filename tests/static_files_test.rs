// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 端到端测试
//!
//! 通过内存双工流驱动完整的请求循环，不占用真实端口。

use std::{
    fs,
    sync::{Arc, Mutex},
    time::Duration,
};

use tempfile::TempDir;
use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

use webserver::{AccessEntry, AccessLog, App, Config};

/// 把访问记录收集到内存中
#[derive(Default)]
struct RecordingAccessLog {
    entries: Mutex<Vec<AccessEntry>>,
}

impl AccessLog for RecordingAccessLog {
    fn log(&self, entry: &AccessEntry) {
        self.entries.lock().unwrap().push(entry.clone());
    }
}

struct Fixture {
    _dir: TempDir,
    app: Arc<App>,
    access: Arc<RecordingAccessLog>,
}

fn fixture(show_index: bool, extra: &str) -> Fixture {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("public");
    fs::create_dir(&root).unwrap();
    fs::write(root.join("a.txt"), b"hello world").unwrap();
    fs::create_dir(root.join("b")).unwrap();
    fs::write(root.join("b").join("c.css"), b"body{}").unwrap();

    let toml = format!(
        "debug = false\n{extra}\n[[mounts]]\nprefix = \"/static\"\nroot = {:?}\nshow_index = {show_index}\nchunk_size = 4\n\n[[routes]]\npath = \"/robots.txt\"\nbody = \"User-agent: *\"\ncontent_type = \"text/plain\"\n",
        root.to_string_lossy()
    );
    let config = Config::from_str(&toml).unwrap();
    let access = Arc::new(RecordingAccessLog::default());
    let app = App::with_access_log(&config, access.clone()).unwrap();
    Fixture {
        _dir: dir,
        app: Arc::new(app),
        access,
    }
}

/// 发送原始请求字节并关闭写端，读取到服务端关闭连接为止
async fn exchange(app: &Arc<App>, raw: &str) -> String {
    let (mut client, server) = duplex(64 * 1024);
    let task = tokio::spawn(Arc::clone(app).serve(server, "127.0.0.1:40000".to_string(), 0));

    client.write_all(raw.as_bytes()).await.unwrap();
    client.shutdown().await.unwrap();
    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut out))
        .await
        .unwrap()
        .unwrap();
    task.await.unwrap();
    String::from_utf8(out).unwrap()
}

fn status(response: &str) -> u16 {
    response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

fn body(response: &str) -> &str {
    response.split_once("\r\n\r\n").map_or("", |(_, b)| b)
}

#[tokio::test]
async fn test_directory_listing_order() {
    let f = fixture(true, "");
    let response = exchange(&f.app, "GET /static/ HTTP/1.1\r\nConnection: close\r\n\r\n").await;

    assert_eq!(status(&response), 200);
    assert!(response.contains("Content-Type: text/html; charset=utf-8\r\n"));
    let items: Vec<&str> = body(&response)
        .lines()
        .map(str::trim)
        .filter(|l| l.starts_with("<li>"))
        .collect();
    assert_eq!(
        items,
        vec![
            "<li><a href=\"/static/..\">../</a></li>",
            "<li><a href=\"/static/b/\">b/</a></li>",
            "<li><a href=\"/static/a.txt\">a.txt</a></li>",
        ]
    );
    assert!(body(&response).contains("<title>Index of /static/</title>"));
}

#[tokio::test]
async fn test_listing_disabled_is_forbidden() {
    let f = fixture(false, "");
    let response = exchange(&f.app, "GET /static/ HTTP/1.1\r\n\r\n").await;

    assert_eq!(status(&response), 403);
    assert_eq!(body(&response), "403: Forbidden");
    assert!(response.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn test_traversal_is_forbidden() {
    let f = fixture(true, "");
    let response = exchange(&f.app, "GET /static/../../etc/passwd HTTP/1.1\r\n\r\n").await;

    assert_eq!(status(&response), 403);
    assert!(!response.contains("root:"));
}

#[tokio::test]
async fn test_encoded_anchor_is_forbidden() {
    let f = fixture(true, "");
    let response = exchange(&f.app, "GET /static/%2Fetc%2Fpasswd HTTP/1.1\r\n\r\n").await;
    assert_eq!(status(&response), 403);
}

#[tokio::test]
async fn test_missing_file_not_found() {
    let f = fixture(true, "");
    let response = exchange(&f.app, "GET /static/missing.txt HTTP/1.1\r\n\r\n").await;

    assert_eq!(status(&response), 404);
    assert!(response.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    assert_eq!(body(&response), "404: Not Found");
}

#[tokio::test]
async fn test_file_streamed_whole() {
    let f = fixture(false, "");
    let response = exchange(
        &f.app,
        "GET /static/b/c.css HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(status(&response), 200);
    assert!(response.contains("Content-Type: text/css\r\n"));
    assert!(response.contains("Content-Length: 6\r\n"));
    assert_eq!(body(&response), "body{}");
}

#[tokio::test]
async fn test_head_sends_headers_only() {
    let f = fixture(false, "");
    let response = exchange(&f.app, "HEAD /static/a.txt HTTP/1.0\r\n\r\n").await;

    assert_eq!(status(&response), 200);
    assert!(response.contains("Content-Length: 11\r\n"));
    assert_eq!(body(&response), "");
}

#[tokio::test]
async fn test_write_method_not_allowed() {
    let f = fixture(false, "");
    let response = exchange(&f.app, "DELETE /static/a.txt HTTP/1.1\r\n\r\n").await;

    assert_eq!(status(&response), 405);
    assert!(response.contains("Allow: GET, HEAD\r\n"));
}

#[tokio::test]
async fn test_fixed_route_and_keep_alive() {
    let f = fixture(false, "");
    let response = exchange(
        &f.app,
        "GET /robots.txt HTTP/1.1\r\n\r\nGET /static/a.txt HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.matches("HTTP/1.1 200 OK\r\n").count(), 2);
    assert!(response.contains("User-agent: *"));
    assert!(response.ends_with("hello world"));
}

#[tokio::test]
async fn test_fallback_redirect() {
    let f = fixture(false, "fallback_redirect = \"https://www.example.com/\"");
    let response = exchange(&f.app, "POST /anything HTTP/1.1\r\nConnection: close\r\n\r\n").await;

    assert_eq!(status(&response), 302);
    assert!(response.contains("Location: https://www.example.com/\r\n"));
}

#[tokio::test]
async fn test_malformed_request() {
    let f = fixture(false, "");
    let response = exchange(&f.app, "garbage\r\n\r\n").await;

    assert_eq!(status(&response), 400);
    assert!(response.contains("Connection: close\r\n"));
    assert_eq!(body(&response), "Malformed request: garbage");
}

#[tokio::test]
async fn test_unsupported_version_message() {
    let f = fixture(false, "");
    let response = exchange(&f.app, "GET /static/a.txt HTTP/2.0\r\n\r\n").await;

    assert_eq!(status(&response), 400);
    assert_eq!(body(&response), "Unsupported HTTP version");
}

#[tokio::test]
async fn test_request_body_is_not_parsed_as_next_request() {
    let f = fixture(false, "fallback_redirect = \"https://www.example.com/\"");
    let inner = "GET /static/a.txt HTTP/1.1\r\nConnection: close\r\n\r\n";
    let raw = format!(
        "POST /form HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
        inner.len(),
        inner
    );
    let response = exchange(&f.app, &raw).await;

    assert_eq!(response.matches("HTTP/1.1 ").count(), 1);
    assert_eq!(status(&response), 302);
    assert!(!response.contains("hello world"));
}

#[tokio::test]
async fn test_keep_alive_after_request_body() {
    let f = fixture(false, "fallback_redirect = \"https://www.example.com/\"");
    let response = exchange(
        &f.app,
        "POST /form HTTP/1.1\r\nContent-Length: 5\r\n\r\nx=1&yGET /static/a.txt HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(response.matches("HTTP/1.1 ").count(), 2);
    assert!(response.starts_with("HTTP/1.1 302 Found\r\n"));
    assert!(response.ends_with("hello world"));
}

#[tokio::test]
async fn test_transfer_encoded_body_closes_connection() {
    let f = fixture(false, "fallback_redirect = \"https://www.example.com/\"");
    let response = exchange(
        &f.app,
        "POST /form HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n2d\r\nGET /static/a.txt HTTP/1.1\r\n\r\n\r\n0\r\n\r\n",
    )
    .await;

    assert_eq!(response.matches("HTTP/1.1 ").count(), 1);
    assert_eq!(status(&response), 302);
    assert!(response.contains("Connection: close\r\n"));
    assert!(!response.contains("hello world"));
}

#[tokio::test]
async fn test_truncated_request_body() {
    let f = fixture(false, "");
    let response = exchange(
        &f.app,
        "POST /static/a.txt HTTP/1.1\r\nContent-Length: 100\r\n\r\nshort",
    )
    .await;

    assert_eq!(status(&response), 400);
    assert!(response.contains("Connection: close\r\n"));
}

#[tokio::test]
async fn test_access_log_entries() {
    let f = fixture(false, "");
    exchange(
        &f.app,
        "GET /static/a.txt HTTP/1.1\r\nHost: example.com\r\n\r\nGET /static/nope HTTP/1.1\r\n\r\n",
    )
    .await;

    let entries = f.access.entries.lock().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, 200);
    assert_eq!(entries[0].host, "example.com");
    assert_eq!(entries[0].body_length, 11);
    assert_eq!(entries[1].status, 404);
    assert_eq!(entries[1].elapsed, Duration::ZERO);
}
