//! Shared harness: an in-process server on an ephemeral port over the
//! in-memory store.

#![allow(dead_code)]

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use schoolhouse::api::{create_router, AppState};
use schoolhouse::auth::models::{Admin, NewAdmin};
use schoolhouse::auth::{Permission, Role};
use schoolhouse::config::Config;
use schoolhouse::db::{self, MemoryStore, SharedStore};
use serde_json::Value;

pub const PRINCIPAL_PASSWORD: &str = "principal-pass";

pub struct TestServer {
    pub base: String,
    pub state: AppState,
    pub client: reqwest::Client,
    pub principal: Admin,
}

/// Configuration for tests: cheap bcrypt, cache disabled
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    config.content.cache_enabled = false;
    config.bootstrap.username = "principal".to_string();
    config.bootstrap.password = PRINCIPAL_PASSWORD.to_string();
    config
}

pub async fn start() -> TestServer {
    start_with(test_config()).await
}

pub async fn start_with(config: Config) -> TestServer {
    let store: SharedStore = Arc::new(MemoryStore::new());
    let state = AppState::new(config, store).expect("valid test config");

    let principal = db::ensure_principal(state.store.as_ref(), &state.config.bootstrap, &state.hasher)
        .await
        .expect("bootstrap")
        .expect("principal created");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = create_router(state.clone());
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        state,
        client: reqwest::Client::new(),
        principal,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Bearer token for an existing admin, minted without a login round-trip
    pub fn token_for(&self, admin: &Admin) -> String {
        self.state.tokens.issue(admin).unwrap()
    }

    pub fn principal_token(&self) -> String {
        self.token_for(&self.principal)
    }

    /// Create an ADMIN holding exactly `permissions`
    pub async fn admin_with(&self, username: &str, password: &str, permissions: &[Permission]) -> Admin {
        self.state
            .store
            .create_admin(NewAdmin {
                username: username.to_string(),
                password_hash: self.state.hasher.hash(password).await.unwrap(),
                role: Role::Admin {
                    permissions: permissions.iter().copied().collect::<HashSet<_>>(),
                },
                full_name: None,
            })
            .await
            .unwrap()
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        self.client
            .post(self.url("/api/v1/auth/login/access-token"))
            .header("content-type", "application/x-www-form-urlencoded")
            .body(format!("username={}&password={}", username, password))
            .send()
            .await
            .unwrap()
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }
}

/// Response body's `detail` field
pub async fn detail(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["detail"].as_str().unwrap_or_default().to_string()
}
