pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AccessConfig;
use crate::services::{
    AdminService, AuthService, IdentityResolver, JwtService, RecordService, Store, TokenDenylist,
};
use service_core::error::AppError;

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub store: Arc<dyn Store>,
    pub denylist: Arc<dyn TokenDenylist>,
    pub jwt: JwtService,
    pub identity: IdentityResolver,
    pub auth_service: AuthService,
    pub admin_service: AdminService,
    pub record_service: RecordService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire every service over the given store and denylist.
    pub fn new(
        config: AccessConfig,
        store: Arc<dyn Store>,
        denylist: Arc<dyn TokenDenylist>,
    ) -> Result<Self, AppError> {
        let jwt = JwtService::new(&config.jwt).map_err(AppError::ConfigError)?;

        let identity = IdentityResolver::new(
            jwt.clone(),
            store.clone(),
            denylist.clone(),
            config.store.timeout(),
        );
        let auth_service = AuthService::new(store.clone(), jwt.clone(), denylist.clone());
        let admin_service = AdminService::new(store.clone());
        let record_service = RecordService::new(store.clone());

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );

        Ok(Self {
            config,
            store,
            denylist,
            jwt,
            identity,
            auth_service,
            admin_service,
            record_service,
            login_rate_limiter,
            register_rate_limiter,
        })
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed_origins.iter().filter_map(|o| {
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e))
                .ok()
        }))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::HEAD,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        // Refreshed tokens come back in this header.
        .expose_headers([header::AUTHORIZATION])
}

pub fn build_router(state: AppState) -> Router {
    use handlers::{auth, group, permission, records, user};

    // Login and registration are public and rate limited per client IP
    let login_route = Router::new()
        .route("/auth", post(auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    // Logout is authenticated but never hands out a fresh token
    let logout_route = Router::new()
        .route("/auth/logout", post(auth::logout))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    // Refresh sits inside authenticate so it sees the resolved identity
    let protected = Router::new()
        .route("/user", get(user::list_users).post(user::create_user))
        .route(
            "/user/:id",
            get(user::show_user)
                .put(user::update_user)
                .delete(user::delete_user),
        )
        .route("/group", get(group::list_groups).post(group::create_group))
        .route(
            "/group/:id",
            get(group::show_group)
                .put(group::update_group)
                .delete(group::delete_group),
        )
        .route(
            "/permission",
            get(permission::list_permissions).post(permission::create_permission),
        )
        .route(
            "/permission/:id",
            get(permission::show_permission)
                .put(permission::update_permission)
                .delete(permission::delete_permission),
        )
        .route(
            "/auths",
            get(records::list_records).post(records::create_record),
        )
        .route(
            "/auths/:id",
            get(records::show_record)
                .patch(records::patch_record)
                .put(records::replace_record)
                .delete(records::delete_record),
        )
        .layer(from_fn_with_state(state.clone(), middleware::refresh_token))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ));

    let api = Router::new()
        .merge(login_route)
        .merge(register_route)
        .merge(logout_route)
        .merge(protected);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .nest("/api", api)
        .with_state(state.clone())
        // Add metrics middleware
        .layer(from_fn(metrics_middleware))
        // Add tracing layer
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        // Add tracing middleware for request_id
        .layer(from_fn(request_id_middleware))
        // Add security headers middleware
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

/// Service health check
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<service_core::axum::Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::ServiceUnavailable("store".to_string())
    })?;

    state.denylist.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Denylist health check failed");
        AppError::ServiceUnavailable("denylist".to_string())
    })?;

    Ok(service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up",
            "denylist": "up"
        }
    })))
}
