//! Shared fixtures for the live view integration tests: a mocked portal API
//! and a session wired to it.

#![allow(dead_code)]

use std::time::Duration;

use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::{json, Value};

use jobportal_live::config::PortalConfig;
use jobportal_live::session::{Credential, SessionContext};

pub const TOKEN: &str = "integration-token";

pub fn config_for(server: &MockServer) -> PortalConfig {
    PortalConfig {
        api_base_url: format!("{}/api", server.base_url()),
        request_timeout_ms: 5_000,
        ..PortalConfig::default()
    }
}

pub fn signed_in_session(server: &MockServer) -> SessionContext {
    SessionContext::init(
        config_for(server),
        Some(Credential::new(TOKEN, Some("u-1".to_string()))),
    )
    .expect("session should build")
}

pub fn anonymous_session(server: &MockServer) -> SessionContext {
    SessionContext::init(config_for(server), None).expect("session should build")
}

/// Serve `body` for `GET /api/{collection}` to authenticated callers.
pub fn serve_list(server: &MockServer, collection: &str, body: Value) {
    let path = format!("/api/{collection}");
    server.mock(|when, then| {
        when.method(GET)
            .path(path)
            .header("authorization", format!("Bearer {TOKEN}"));
        then.status(200).json_body(body);
    });
}

pub fn message_json(id: &str, at: &str, read: bool) -> Value {
    json!({
        "_id": id,
        "senderId": "u-2",
        "senderName": "Acme HR",
        "receiverId": "u-1",
        "content": format!("message {id}"),
        "createdAt": at,
        "read": read
    })
}

pub fn interview_json(id: &str, date: &str, created_at: &str) -> Value {
    json!({
        "_id": id,
        "jobId": "job-1",
        "jobTitle": "Backend Engineer",
        "employerName": "Acme",
        "jobSeekerName": "Ana",
        "date": date,
        "createdAt": created_at,
        "jobSeekerConfirmed": null
    })
}

pub fn feedback_json(id: &str, at: &str) -> Value {
    json!({
        "_id": id,
        "jobTitle": "Backend Engineer",
        "employerName": "Acme",
        "comment": "Strong systems background",
        "rating": 4,
        "createdAt": at
    })
}

/// Poll until `condition` holds; channel listeners apply events on their
/// own tasks.
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 2s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
