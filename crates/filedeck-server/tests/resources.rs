//! Router-level tests for the resource API.
//!
//! Each test gets a fresh data root in a temp dir with two users: `admin`
//! (every permission) and `viewer` (read only).

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;
use tower::ServiceExt;

use filedeck_kernel::{Permissions, VirtualConfig};
use filedeck_server::config::UserConfig;
use filedeck_server::{AppState, ServerConfig, router};

struct Harness {
    app: Router,
    root: TempDir,
    _logs: TempDir,
}

impl Harness {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let logs = TempDir::new().unwrap();
        std::fs::write(logs.path().join("app.log"), "started\n").unwrap();

        let user = |name: &str, permissions: Permissions| UserConfig {
            username: name.to_string(),
            scope: Some("shared".to_string()),
            permissions,
            rules: Vec::new(),
            hide_dotfiles: false,
            sorting: Default::default(),
        };
        let config = ServerConfig {
            root: root.path().to_path_buf(),
            virtual_ns: VirtualConfig {
                log_files: vec![logs.path().join("app.log"), logs.path().join("gone.log")],
                ..VirtualConfig::default()
            },
            users: vec![
                user("admin", Permissions::all()),
                user("viewer", Permissions::default()),
            ],
            ..ServerConfig::default()
        };

        let state = AppState::from_config(&config).unwrap();
        Self {
            app: router(state),
            root,
            _logs: logs,
        }
    }

    fn disk(&self, rel: &str) -> PathBuf {
        self.root.path().join("shared").join(rel)
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        user: Option<&str>,
        body: &str,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header("X-Forwarded-User", user);
        }
        let response = self
            .app
            .clone()
            .oneshot(request.body(Body::from(body.to_string())).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes.to_vec())
    }

    async fn json(&self, uri: &str, user: &str) -> (StatusCode, Value) {
        let (status, _, body) = self.send(Method::GET, uri, Some(user), "").await;
        let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, value)
    }
}

#[tokio::test]
async fn test_missing_or_unknown_user_is_unauthorized() {
    let h = Harness::new();
    let (status, _, _) = h.send(Method::GET, "/api/resources/", None, "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = h.send(Method::GET, "/api/resources/", Some("mallory"), "").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_then_read_back() {
    let h = Harness::new();

    let (status, headers, _) = h
        .send(Method::POST, "/api/resources/docs/hello.txt", Some("admin"), "hi there")
        .await;
    assert_eq!(status, StatusCode::OK);
    let etag = headers[header::ETAG].to_str().unwrap();
    assert!(etag.starts_with('"') && etag.ends_with("8\""));
    assert_eq!(std::fs::read_to_string(h.disk("docs/hello.txt")).unwrap(), "hi there");

    let (status, entry) = h.json("/api/resources/docs/hello.txt", "viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["name"], "hello.txt");
    assert_eq!(entry["type"], "text");
    assert_eq!(entry["content"], "hi there");
    assert_eq!(entry["isDir"], false);

    let (status, listing) = h.json("/api/resources/docs", "viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["numFiles"], 1);
    assert_eq!(listing["items"][0]["path"], "/docs/hello.txt");
}

#[tokio::test]
async fn test_upload_conflict_and_override() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/a.txt", Some("admin"), "one").await;

    let (status, _, _) = h.send(Method::POST, "/api/resources/a.txt", Some("admin"), "two").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = h
        .send(Method::POST, "/api/resources/a.txt?override=true", Some("admin"), "two")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(std::fs::read_to_string(h.disk("a.txt")).unwrap(), "two");
}

#[tokio::test]
async fn test_upload_override_keeps_existing_directory() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/dir/keep.txt", Some("admin"), "keep").await;

    let (status, _, _) = h
        .send(Method::POST, "/api/resources/dir?override=true", Some("admin"), "x")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(std::fs::read_to_string(h.disk("dir/keep.txt")).unwrap(), "keep");
}

#[tokio::test]
async fn test_mkdir_with_trailing_slash() {
    let h = Harness::new();
    let (status, _, _) = h
        .send(Method::POST, "/api/resources/new/nested/", Some("admin"), "")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(h.disk("new/nested").is_dir());
}

#[tokio::test]
async fn test_viewer_cannot_mutate() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/a.txt", Some("admin"), "data").await;

    for (method, uri) in [
        (Method::POST, "/api/resources/b.txt"),
        (Method::PUT, "/api/resources/a.txt"),
        (Method::DELETE, "/api/resources/a.txt"),
    ] {
        let (status, _, _) = h.send(method, uri, Some("viewer"), "x").await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }
    assert_eq!(std::fs::read_to_string(h.disk("a.txt")).unwrap(), "data");
}

#[tokio::test]
async fn test_put_updates_existing_only() {
    let h = Harness::new();
    let (status, _, _) = h
        .send(Method::PUT, "/api/resources/missing.txt", Some("admin"), "x")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = h.send(Method::PUT, "/api/resources/dir/", Some("admin"), "x").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    h.send(Method::POST, "/api/resources/a.txt", Some("admin"), "old").await;
    let (status, headers, _) = h
        .send(Method::PUT, "/api/resources/a.txt", Some("admin"), "newer")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(header::ETAG));
    assert_eq!(std::fs::read_to_string(h.disk("a.txt")).unwrap(), "newer");
}

#[tokio::test]
async fn test_checksum_query() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/hello.txt", Some("admin"), "hello").await;

    let (status, entry) = h.json("/api/resources/hello.txt?checksum=md5", "admin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["checksums"]["md5"], "5d41402abc4b2a76b9719d911017c592");
    assert!(entry.get("content").is_none());

    let (status, _, _) = h
        .send(Method::GET, "/api/resources/hello.txt?checksum=bogus", Some("admin"), "")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_root_is_forbidden() {
    let h = Harness::new();
    for uri in ["/api/resources", "/api/resources/"] {
        let (status, _, _) = h.send(Method::DELETE, uri, Some("admin"), "").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn test_delete_removes_tree() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/tree/a/b.txt", Some("admin"), "x").await;

    let (status, _, _) = h.send(Method::DELETE, "/api/resources/tree", Some("admin"), "").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!h.disk("tree").exists());

    let (status, _, _) = h.send(Method::DELETE, "/api/resources/tree", Some("admin"), "").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patch_rename_and_copy() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/a.txt", Some("admin"), "a").await;

    let (status, _, _) = h
        .send(
            Method::PATCH,
            "/api/resources/a.txt?action=rename&destination=%2Fmoved%2Fb.txt",
            Some("admin"),
            "",
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(!h.disk("a.txt").exists());
    assert_eq!(std::fs::read_to_string(h.disk("moved/b.txt")).unwrap(), "a");

    let (status, _, _) = h
        .send(
            Method::PATCH,
            "/api/resources/moved/b.txt?action=copy&destination=/moved/b.txt&rename=true",
            Some("admin"),
            "",
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(std::fs::read_to_string(h.disk("moved/b(1).txt")).unwrap(), "a");
}

#[tokio::test]
async fn test_patch_preconditions() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/a/b/c.txt", Some("admin"), "c").await;
    h.send(Method::POST, "/api/resources/d.txt", Some("admin"), "d").await;

    let cases = [
        ("/api/resources/a/b/c.txt?action=rename&destination=/a/b", StatusCode::BAD_REQUEST),
        ("/api/resources/a/b/c.txt?action=rename&destination=/", StatusCode::FORBIDDEN),
        ("/api/resources/a/b/c.txt?action=rename&destination=/virtual/x", StatusCode::FORBIDDEN),
        ("/api/resources/a/b/c.txt?action=copy&destination=/d.txt", StatusCode::CONFLICT),
        ("/api/resources/a/b/c.txt?action=shred&destination=/e.txt", StatusCode::BAD_REQUEST),
        ("/api/resources/nope.txt?action=rename&destination=/e.txt", StatusCode::NOT_FOUND),
    ];
    for (uri, expected) in cases {
        let (status, _, _) = h.send(Method::PATCH, uri, Some("admin"), "").await;
        assert_eq!(status, expected, "{uri}");
    }

    let (status, _, _) = h
        .send(
            Method::PATCH,
            "/api/resources/d.txt?action=copy&destination=/f.txt",
            Some("viewer"),
            "",
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_virtual_namespace() {
    let h = Harness::new();

    let (status, root) = h.json("/api/resources/virtual", "viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["numDirs"], 1);
    assert_eq!(root["numFiles"], 0);
    assert_eq!(root["items"][0]["name"], "logs");

    let (status, logs) = h.json("/api/resources/virtual/logs/", "viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(logs["items"].as_array().unwrap().len(), 1);
    assert_eq!(logs["items"][0]["path"], "/virtual/logs/app.log");

    let (status, log) = h.json("/api/resources/virtual/logs/app.log", "viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(log["content"], "started\n");
    assert_eq!(log["mode"], 0o444);

    let (status, missing) = h.json("/api/resources/virtual/logs/gone.log", "viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(missing["path"], "");

    let (status, _) = h.json("/api/resources/virtual/elsewhere", "viewer").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = h
        .send(Method::DELETE, "/api/resources/virtual/logs/app.log", Some("admin"), "")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_disk_usage() {
    let h = Harness::new();
    h.send(Method::POST, "/api/resources/a.txt", Some("admin"), "a").await;

    let (status, usage) = h.json("/api/usage/", "viewer").await;
    assert_eq!(status, StatusCode::OK);
    assert!(usage["total"].as_u64().unwrap() > 0);

    let (_, usage) = h.json("/api/usage/a.txt", "viewer").await;
    assert_eq!(usage["total"], 0);
    assert_eq!(usage["used"], 0);

    let (_, usage) = h.json("/api/usage/virtual/logs", "viewer").await;
    assert_eq!(usage["total"], 0);

    let (status, _) = h.json("/api/usage/missing", "viewer").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
