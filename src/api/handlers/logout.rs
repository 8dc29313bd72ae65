//! `GET /connect/logout`.

use axum::{
    extract::{Extension, Query},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};
use utoipa::IntoParams;

/// Session cookie settings and the redirect allowlist for sign-out.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    cookie_name: String,
    post_logout_redirect_uris: Vec<String>,
}

impl SessionConfig {
    #[must_use]
    pub fn new(cookie_name: String, post_logout_redirect_uris: Vec<String>) -> Self {
        Self {
            cookie_name,
            post_logout_redirect_uris,
        }
    }

    #[must_use]
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Exact match against the configured URIs.
    #[must_use]
    pub fn is_allowed_redirect(&self, uri: &str) -> bool {
        self.post_logout_redirect_uris.iter().any(|allowed| allowed == uri)
    }

    fn expired_cookie(&self) -> String {
        format!(
            "{}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Lax",
            self.cookie_name
        )
    }
}

#[derive(Deserialize, IntoParams, Debug)]
pub struct LogoutParams {
    /// Where to send the user agent afterwards; must be registered.
    post_logout_redirect_uri: Option<String>,
}

#[utoipa::path(
    get,
    path = "/connect/logout",
    params(LogoutParams),
    responses(
        (status = 204, description = "Session cleared"),
        (status = 303, description = "Session cleared, redirecting to the registered URI")
    ),
    tag = "connect"
)]
/// Clear the session cookie and optionally redirect.
pub async fn logout(
    session: Extension<Arc<SessionConfig>>,
    Query(params): Query<LogoutParams>,
) -> Response {
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&session.expired_cookie()) {
        Ok(cookie) => {
            headers.insert(SET_COOKIE, cookie);
        }
        Err(err) => warn!("Failed to build session cookie header: {err}"),
    }

    if let Some(uri) = params.post_logout_redirect_uri.as_deref() {
        if session.is_allowed_redirect(uri)
            && let Ok(location) = HeaderValue::from_str(uri)
        {
            headers.insert(LOCATION, location);
            return (StatusCode::SEE_OTHER, headers).into_response();
        }
        debug!("Ignoring unregistered post_logout_redirect_uri");
    }

    (StatusCode::NO_CONTENT, headers).into_response()
}
