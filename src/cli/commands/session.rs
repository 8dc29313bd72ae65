use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_CORS_ORIGIN: &str = "cors-origin";
pub const ARG_POST_LOGOUT_REDIRECT_URI: &str = "post-logout-redirect-uri";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";

#[derive(Debug, Clone)]
pub struct Options {
    pub cors_origins: Vec<String>,
    pub post_logout_redirect_uris: Vec<String>,
    pub cookie_name: String,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let get_list = |id: &str| -> Vec<String> {
            matches
                .get_many::<String>(id)
                .map(|values| {
                    values
                        .map(|value| value.trim().to_string())
                        .filter(|value| !value.is_empty())
                        .collect()
                })
                .unwrap_or_default()
        };

        Self {
            cors_origins: get_list(ARG_CORS_ORIGIN),
            post_logout_redirect_uris: get_list(ARG_POST_LOGOUT_REDIRECT_URI),
            cookie_name: matches
                .get_one::<String>(ARG_SESSION_COOKIE_NAME)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "grantor_session".to_string()),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Allowed CORS origin (repeatable, exact match)")
                .env("GRANTOR_CORS_ORIGINS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_POST_LOGOUT_REDIRECT_URI)
                .long(ARG_POST_LOGOUT_REDIRECT_URI)
                .help("Registered post-logout redirect URI (repeatable, exact match)")
                .env("GRANTOR_POST_LOGOUT_REDIRECT_URIS")
                .value_delimiter(',')
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long(ARG_SESSION_COOKIE_NAME)
                .help("Session cookie cleared on logout")
                .env("GRANTOR_SESSION_COOKIE_NAME")
                .default_value("grantor_session"),
        )
}
