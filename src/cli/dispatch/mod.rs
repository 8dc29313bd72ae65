//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, currently always the token
//! server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_ISSUER, ARG_PORT, ARG_RESOURCE, lockout, session, token};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let issuer = matches
        .get_one::<String>(ARG_ISSUER)
        .cloned()
        .context("missing required argument: --issuer")?;
    let resource = matches
        .get_one::<String>(ARG_RESOURCE)
        .cloned()
        .context("missing required argument: --resource")?;

    Ok(Action::Server(Args {
        port,
        dsn,
        issuer,
        resource,
        token: token::Options::parse(matches)?,
        lockout: lockout::parse(matches),
        session: session::Options::parse(matches),
    }))
}
