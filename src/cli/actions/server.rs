use crate::{
    api::{self, Services, SessionConfig},
    cli::commands::{session, token},
    grant::{Clock, GrantConfig, LockoutPolicy, SystemClock, TokenExchange},
    signer::PasetoSigner,
    store::{PgUserStore, UserStore},
};
use anyhow::{Context, Result, anyhow};
use axum::http::{HeaderValue, Method, header};
use ed25519_dalek::SigningKey;
use sqlx::postgres::PgPoolOptions;
use std::{fs, path::Path, sync::Arc, time::Duration};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info};
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub issuer: String,
    pub resource: String,
    pub token: token::Options,
    pub lockout: LockoutPolicy,
    pub session: session::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid, the signing key cannot be
/// loaded, the database is unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = grant_config(&args);
    config.validate().context("Invalid grant configuration")?;
    if args.issuer.trim().is_empty() {
        return Err(anyhow!("Issuer must not be empty"));
    }

    let signing_key = load_signing_key(Path::new(&args.token.signing_key_path))?;
    let cors = cors_layer(&args.session.cors_origins)?;
    let dsn = Url::parse(&args.dsn).context("Invalid GRANTOR_DSN")?;

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn.as_str())
        .await
        .context("Failed to connect to database")?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(pool));
    let signer = Arc::new(PasetoSigner::new(
        signing_key,
        args.token.signing_key_id.clone(),
        args.issuer.clone(),
        Duration::from_secs(args.token.access_token_ttl_seconds),
        Arc::clone(&clock),
    ));
    let keys = Arc::new(signer.public_key_set());
    let exchange = Arc::new(TokenExchange::new(
        &config,
        Arc::clone(&store),
        signer,
        clock,
    ));

    let services = Services {
        exchange,
        store,
        keys,
        session: Arc::new(SessionConfig::new(
            args.session.cookie_name,
            args.session.post_logout_redirect_uris,
        )),
    };

    info!(
        resource = config.resource(),
        kid = %args.token.signing_key_id,
        "Token service configured"
    );

    api::serve(args.port, api::router(&services, cors)).await
}

fn grant_config(args: &Args) -> GrantConfig {
    GrantConfig::new(args.resource.clone())
        .with_allowed_scopes(args.token.allowed_scopes.iter().cloned())
        .with_security_stamp_claim_type(args.token.security_stamp_claim_type.clone())
        .with_lockout(args.lockout)
}

fn load_signing_key(path: &Path) -> Result<SigningKey> {
    let encoded = fs::read_to_string(path)
        .with_context(|| format!("Failed to read signing key file: {}", path.display()))?;
    PasetoSigner::signing_key_from_base64(&encoded)
        .with_context(|| format!("Invalid signing key in {}", path.display()))
}

fn cors_layer(origins: &[String]) -> Result<Option<CorsLayer>> {
    if origins.is_empty() {
        return Ok(None);
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("Invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(
        CorsLayer::new()
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_origin(AllowOrigin::list(origins)),
    ))
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        issuer = %args.issuer,
        resource = %args.resource,
        allowed_scopes = ?args.token.allowed_scopes,
        lockout_enabled = args.lockout.enabled(),
        lockout_max_failed_attempts = args.lockout.max_failed_attempts(),
        lockout_duration_seconds = args.lockout.lockout_duration().as_secs(),
        cors_origins = args.session.cors_origins.len(),
        "Startup arguments"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/grantor".to_string(),
            issuer: "https://auth.grantor.dev".to_string(),
            resource: "api.grantor.dev".to_string(),
            token: token::Options {
                allowed_scopes: vec!["openid".to_string(), "email".to_string()],
                security_stamp_claim_type: "stamp".to_string(),
                signing_key_path: "/nonexistent".to_string(),
                signing_key_id: "grantor-1".to_string(),
                access_token_ttl_seconds: 600,
            },
            lockout: LockoutPolicy::new(3, Duration::from_secs(60), true),
            session: session::Options {
                cors_origins: Vec::new(),
                post_logout_redirect_uris: Vec::new(),
                cookie_name: "grantor_session".to_string(),
            },
        }
    }

    #[test]
    fn grant_config_from_args() {
        let config = grant_config(&args());
        assert_eq!(config.resource(), "api.grantor.dev");
        assert_eq!(config.allowed_scopes().len(), 2);
        assert_eq!(config.security_stamp_claim_type(), "stamp");
        assert_eq!(config.lockout().max_failed_attempts(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unsupported_allowed_scope_fails_validation() {
        let mut args = args();
        args.token.allowed_scopes.push("offline_access".to_string());
        assert!(grant_config(&args).validate().is_err());
    }

    #[test]
    fn load_signing_key_from_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "BwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwcHBwc=")?;
        let key = load_signing_key(file.path())?;
        assert_eq!(key.to_bytes(), [7u8; 32]);
        Ok(())
    }

    #[test]
    fn load_signing_key_errors() -> Result<()> {
        assert!(load_signing_key(Path::new("/nonexistent/grantor.key")).is_err());

        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "too-short")?;
        assert!(load_signing_key(file.path()).is_err());
        Ok(())
    }

    #[test]
    fn cors_layer_from_origins() {
        assert!(matches!(cors_layer(&[]), Ok(None)));
        assert!(matches!(
            cors_layer(&["https://app.grantor.dev".to_string()]),
            Ok(Some(_))
        ));
        assert!(cors_layer(&["bad\norigin".to_string()]).is_err());
    }
}
