use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::{services::AuthenticatedUser, AppState};

/// Re-issue a longer-lived token on accepted responses.
///
/// Runs inside [`authenticate`](super::authenticate). The fresh token goes
/// out as the raw value of the `Authorization` response header, and only when
/// the request carried a resolved identity and the response is 1xx, 2xx or
/// 3xx.
pub async fn refresh_token(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let user = req.extensions().get::<AuthenticatedUser>().cloned();

    let mut response = next.run(req).await;

    let Some(user) = user else {
        return response;
    };

    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return response;
    }

    match state.jwt.issue_refresh_token(&user.identity.user) {
        Ok(issued) => match HeaderValue::from_str(&issued.token) {
            Ok(value) => {
                response.headers_mut().insert(header::AUTHORIZATION, value);
            }
            Err(e) => tracing::error!(error = %e, "Refreshed token is not a valid header value"),
        },
        // The original response still stands; the client keeps its old token.
        Err(e) => tracing::error!(error = %e, user_id = user.id(), "Failed to refresh token"),
    }

    response
}
