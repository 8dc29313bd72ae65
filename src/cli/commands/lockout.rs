use crate::grant::LockoutPolicy;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

pub const ARG_LOCKOUT_ENABLED: &str = "lockout-enabled";
pub const ARG_LOCKOUT_MAX_FAILED_ATTEMPTS: &str = "lockout-max-failed-attempts";
pub const ARG_LOCKOUT_DURATION_SECONDS: &str = "lockout-duration-seconds";

/// Read the lockout policy. Range checks happen in `LockoutPolicy::validate`.
#[must_use]
pub fn parse(matches: &ArgMatches) -> LockoutPolicy {
    let defaults = LockoutPolicy::default();
    LockoutPolicy::new(
        matches
            .get_one::<u32>(ARG_LOCKOUT_MAX_FAILED_ATTEMPTS)
            .copied()
            .unwrap_or(defaults.max_failed_attempts()),
        matches
            .get_one::<u64>(ARG_LOCKOUT_DURATION_SECONDS)
            .copied()
            .map_or(defaults.lockout_duration(), Duration::from_secs),
        matches
            .get_one::<bool>(ARG_LOCKOUT_ENABLED)
            .copied()
            .unwrap_or(defaults.enabled()),
    )
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_LOCKOUT_ENABLED)
                .long(ARG_LOCKOUT_ENABLED)
                .help("Lock accounts after repeated failed password attempts")
                .env("GRANTOR_LOCKOUT_ENABLED")
                .action(ArgAction::Set)
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_MAX_FAILED_ATTEMPTS)
                .long(ARG_LOCKOUT_MAX_FAILED_ATTEMPTS)
                .help("Failed attempts before an account is locked")
                .env("GRANTOR_LOCKOUT_MAX_FAILED_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_LOCKOUT_DURATION_SECONDS)
                .long(ARG_LOCKOUT_DURATION_SECONDS)
                .help("Lockout duration in seconds")
                .env("GRANTOR_LOCKOUT_DURATION_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
}
