use clap::{Arg, ArgAction, ArgMatches, Command};

pub const ARG_ALLOWED_SCOPES: &str = "allowed-scopes";
pub const ARG_SECURITY_STAMP_CLAIM_TYPE: &str = "security-stamp-claim-type";
pub const ARG_SIGNING_KEY_PATH: &str = "signing-key-path";
pub const ARG_SIGNING_KEY_ID: &str = "signing-key-id";
pub const ARG_ACCESS_TOKEN_TTL_SECONDS: &str = "access-token-ttl-seconds";

#[derive(Debug, Clone)]
pub struct Options {
    pub allowed_scopes: Vec<String>,
    pub security_stamp_claim_type: String,
    pub signing_key_path: String,
    pub signing_key_id: String,
    pub access_token_ttl_seconds: u64,
}

impl Options {
    /// Parse token issuance arguments from matches.
    ///
    /// # Errors
    /// Returns an error if required arguments are missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(signing_key_path) = get_non_empty(ARG_SIGNING_KEY_PATH) else {
            anyhow::bail!("missing required argument: --{ARG_SIGNING_KEY_PATH}");
        };

        let allowed_scopes = matches
            .get_many::<String>(ARG_ALLOWED_SCOPES)
            .map(|values| {
                values
                    .map(|scope| scope.trim().to_string())
                    .filter(|scope| !scope.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            allowed_scopes,
            security_stamp_claim_type: get_non_empty(ARG_SECURITY_STAMP_CLAIM_TYPE)
                .unwrap_or_default(),
            signing_key_path,
            signing_key_id: get_non_empty(ARG_SIGNING_KEY_ID).unwrap_or_default(),
            access_token_ttl_seconds: matches
                .get_one::<u64>(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ALLOWED_SCOPES)
                .long(ARG_ALLOWED_SCOPES)
                .help("Scopes that may be granted (comma-separated)")
                .env("GRANTOR_ALLOWED_SCOPES")
                .value_delimiter(',')
                .action(ArgAction::Append)
                .default_value("openid,email,profile,roles"),
        )
        .arg(
            Arg::new(ARG_SECURITY_STAMP_CLAIM_TYPE)
                .long(ARG_SECURITY_STAMP_CLAIM_TYPE)
                .help("Claim type reserved for the account security stamp")
                .env("GRANTOR_SECURITY_STAMP_CLAIM_TYPE")
                .default_value("security_stamp"),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY_PATH)
                .long(ARG_SIGNING_KEY_PATH)
                .help("Path to the Ed25519 signing key (base64 32-byte seed)")
                .env("GRANTOR_SIGNING_KEY_PATH"),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY_ID)
                .long(ARG_SIGNING_KEY_ID)
                .help("Key id placed in token footers and the PASERK keyset")
                .env("GRANTOR_SIGNING_KEY_ID")
                .default_value("grantor-1"),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .long(ARG_ACCESS_TOKEN_TTL_SECONDS)
                .help("Access and identity token lifetime in seconds")
                .env("GRANTOR_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}
