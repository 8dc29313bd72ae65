#![allow(clippy::needless_for_each)]

use crate::{grant::TokenExchange, signer::PublicKeySet, store::UserStore};
use anyhow::Result;
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, debug_span, info};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;

pub use handlers::SessionConfig;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::token::token,
        handlers::logout::logout,
        handlers::health::health,
        handlers::paserk::paserk
    ),
    components(
        schemas(
            handlers::token::TokenForm,
            handlers::token::TokenResponse,
            handlers::token::ErrorResponse,
            handlers::health::Health,
            PublicKeySet
        )
    ),
    tags(
        (name = "connect", description = "Resource-owner password grant"),
        (name = "paserk", description = "Token verification keys"),
        (name = "health", description = "Service status"),
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Shared state handed to the handlers.
#[derive(Clone)]
pub struct Services {
    pub exchange: Arc<TokenExchange>,
    pub store: Arc<dyn UserStore>,
    pub keys: Arc<PublicKeySet>,
    pub session: Arc<SessionConfig>,
}

/// Build the application router with its layers.
#[must_use]
pub fn router(services: &Services, cors: Option<CorsLayer>) -> Router {
    let app = Router::new()
        .route("/connect/token", post(handlers::token))
        .route("/connect/logout", get(handlers::logout))
        .route("/paserk.json", get(handlers::paserk))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(services.exchange.clone()))
                .layer(Extension(services.keys.clone()))
                .layer(Extension(services.session.clone())),
        )
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(Extension(services.store.clone()));

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

/// Serve `app` on `[::]:port` until Ctrl-C or SIGTERM.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(port: u16, app: Router) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

// span
fn make_span(request: &Request<Body>) -> Span {
    let headers = request.headers();
    let path = request.uri().path();
    let request_id = headers
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    debug_span!("http-request", path, ?headers, request_id)
}
