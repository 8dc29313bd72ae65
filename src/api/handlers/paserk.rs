use crate::signer::PublicKeySet;
use axum::{
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;

#[utoipa::path(
    get,
    path = "/paserk.json",
    responses(
        (status = 200, description = "PASERK public keys for token verification", body = PublicKeySet),
    ),
    tag = "paserk"
)]
/// Publish the token verification keys.
pub async fn paserk(Extension(keys): Extension<Arc<PublicKeySet>>) -> impl IntoResponse {
    match keys.to_json_pretty() {
        Ok(keyset_json) => {
            let mut headers = HeaderMap::new();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            headers.insert(
                CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=300"),
            );
            (StatusCode::OK, headers, keyset_json).into_response()
        }
        Err(e) => {
            error!("Failed to render PASERK keyset: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, "{}".to_string()).into_response()
        }
    }
}
