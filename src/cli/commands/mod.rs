pub mod lockout;
pub mod logging;
pub mod session;
pub mod token;

use clap::{
    Arg, ColorChoice, Command,
    builder::styling::{AnsiColor, Effects, Styles},
};

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_ISSUER: &str = "issuer";
pub const ARG_RESOURCE: &str = "resource";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("grantor")
        .about("Resource-owner password grant token authority")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("GRANTOR_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Database connection string")
                .env("GRANTOR_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_ISSUER)
                .long(ARG_ISSUER)
                .help("Issuer (iss) placed in every token")
                .env("GRANTOR_ISSUER")
                .required(true),
        )
        .arg(
            Arg::new(ARG_RESOURCE)
                .long(ARG_RESOURCE)
                .help("Resource identifier used as the access token audience")
                .env("GRANTOR_RESOURCE")
                .required(true),
        );

    let command = token::with_args(command);
    let command = lockout::with_args(command);
    let command = session::with_args(command);
    logging::with_args(command)
}
