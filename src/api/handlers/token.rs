//! `POST /connect/token` (resource-owner password grant).

use axum::{
    Form, Json,
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, PRAGMA},
    },
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::error;
use utoipa::ToSchema;

use crate::grant::{GrantError, GrantType, TokenExchange, TokenRequest, format_scopes, parse_scopes};

const TOKEN_TYPE: &str = "Bearer";

#[derive(Deserialize, ToSchema)]
pub struct TokenForm {
    grant_type: Option<String>,
    username: Option<String>,
    password: Option<String>,
    scope: Option<String>,
    client_id: Option<String>,
}

impl fmt::Debug for TokenForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenForm")
            .field("grant_type", &self.grant_type)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("scope", &self.scope)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl TokenForm {
    fn into_request(self) -> Result<TokenRequest, GrantError> {
        let grant_type = self
            .grant_type
            .filter(|value| !value.trim().is_empty())
            .ok_or(GrantError::InvalidRequest(
                "The mandatory 'grant_type' parameter is missing.",
            ))?;

        Ok(TokenRequest {
            grant_type: GrantType::from(grant_type.as_str()),
            username: self.username,
            password: self.password.map(SecretString::from),
            scopes: self.scope.as_deref().map(parse_scopes).unwrap_or_default(),
            client_id: self.client_id.filter(|value| !value.trim().is_empty()),
        })
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub scope: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
}

#[utoipa::path(
    post,
    path = "/connect/token",
    request_body(content = TokenForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Tokens issued", body = TokenResponse),
        (status = 400, description = "invalid_grant, unsupported_grant_type or invalid_request", body = ErrorResponse),
        (status = 500, description = "server_error", body = ErrorResponse)
    ),
    tag = "connect"
)]
/// Exchange a username and password for tokens.
pub async fn token(
    exchange: Extension<Arc<TokenExchange>>,
    form: Option<Form<TokenForm>>,
) -> Response {
    let Some(Form(form)) = form else {
        return error_response(&GrantError::InvalidRequest(
            "The token request is malformed.",
        ));
    };

    let request = match form.into_request() {
        Ok(request) => request,
        Err(err) => return error_response(&err),
    };

    match exchange.issue(&request).await {
        Ok(grant) => {
            let body = TokenResponse {
                access_token: grant.tokens.access_token,
                token_type: TOKEN_TYPE.to_string(),
                expires_in: grant.tokens.expires_in,
                id_token: grant.tokens.id_token,
                scope: format_scopes(&grant.scopes),
            };
            (StatusCode::OK, no_store_headers(), Json(body)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &GrantError) -> Response {
    let status = if err.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        error!("Token request failed: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let body = ErrorResponse {
        error: err.code().to_string(),
        error_description: err.description().to_string(),
    };
    (status, no_store_headers(), Json(body)).into_response()
}

fn no_store_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers
}
