//! Common test utilities for API integration tests.
//!
//! The router is wired to the in-memory store and a scripted plug client,
//! so these tests need neither a database nor real devices.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request},
    Router,
};
use domain::services::{InMemoryStore, MockTelemetryClient};
use plug_monitor::{
    app::{create_app, AppState},
    config::ServerConfig,
    services::PlugControlService,
};
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub client: Arc<MockTelemetryClient>,
}

pub fn server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        request_timeout_secs: 5,
        cors_origins: Vec::new(),
    }
}

/// Build the app around a fresh in-memory store and the given plug client.
pub fn test_app(client: MockTelemetryClient) -> TestApp {
    let store = Arc::new(InMemoryStore::new());
    let client = Arc::new(client);
    let control = Arc::new(PlugControlService::new(store.clone(), client.clone()));
    let state = AppState {
        registry: store.clone(),
        store: store.clone(),
        control,
        metrics: None,
    };

    TestApp {
        router: create_app(state, &server_config()),
        store,
        client,
    }
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn post_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Send a request and return the status with the parsed JSON body.
pub async fn send(app: &TestApp, request: Request<Body>) -> (axum::http::StatusCode, serde_json::Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}
