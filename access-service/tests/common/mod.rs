//! Shared setup for access-service integration tests.
//!
//! Every test gets its own in-memory store and denylist behind the real
//! router, driven with `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::{
        AccessConfig, BootstrapConfig, DatabaseConfig, Environment, JwtConfig, RateLimitConfig,
        SecurityConfig, SigningKeyConfig, StoreConfig,
    },
    models::UserWithPermissions,
    services::{bootstrap, MemoryDenylist, MemoryStore},
    AppState,
};
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const PASSWORD: &str = "correct horse battery staple";

pub fn test_config() -> AccessConfig {
    AccessConfig {
        common: service_core::config::Config::default(),
        environment: Environment::Dev,
        service_name: "access-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: "postgres://unused".to_string(),
            max_connections: 1,
            min_connections: 0,
        },
        redis: None,
        jwt: JwtConfig {
            signing_key: SigningKeyConfig::Secret(TEST_SECRET.to_string()),
            login_token_expiry_minutes: 1,
            refresh_token_expiry_minutes: 15,
        },
        store: StoreConfig { timeout_ms: 1000 },
        security: SecurityConfig {
            allowed_origins: vec!["*".to_string()],
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
        },
        bootstrap: BootstrapConfig::default(),
    }
}

/// Response pieces the tests look at. `body` is `Null` for empty bodies.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Raw value of the `Authorization` response header, if a refreshed
    /// token was attached.
    pub fn refreshed_token(&self) -> Option<String> {
        self.headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub denylist: Arc<MemoryDenylist>,
    pub router: Router,
}

impl TestApp {
    /// App over an empty store.
    pub async fn empty() -> Self {
        Self::with_config(test_config()).await
    }

    /// App with the default permissions and the `Admin` and `User` groups.
    pub async fn seeded() -> Self {
        let app = Self::empty().await;
        bootstrap::seed_default_access(app.store.as_ref())
            .await
            .expect("seeding default access");
        app
    }

    pub async fn with_config(config: AccessConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let denylist = Arc::new(MemoryDenylist::new());

        let state = AppState::new(config, store.clone(), denylist.clone())
            .expect("building app state");
        let router = build_router(state.clone());

        Self {
            state,
            store,
            denylist,
            router,
        }
    }

    /// Provision a user straight into the store.
    pub async fn create_user(&self, email: &str, groups: &[&str]) -> UserWithPermissions {
        bootstrap::create_user(self.store.as_ref(), email, PASSWORD, "Test User", groups, &[])
            .await
            .expect("creating test user")
    }

    pub async fn create_admin(&self, email: &str) -> UserWithPermissions {
        self.create_user(email, &[bootstrap::ADMIN_GROUP]).await
    }

    /// Log in through the API and return the bearer token.
    pub async fn login(&self, email: &str) -> String {
        let res = self
            .send(
                Method::POST,
                "/api/auth",
                None,
                Some(serde_json::json!({ "email": email, "password": PASSWORD })),
            )
            .await;
        assert_eq!(res.status, StatusCode::OK, "login failed: {}", res.body);
        res.body["token"]
            .as_str()
            .expect("token in login response")
            .to_string()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.send(Method::DELETE, uri, Some(token), None).await
    }
}
