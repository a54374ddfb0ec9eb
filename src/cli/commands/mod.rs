pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SITE_KEY: &str = "site-key";
pub const ARG_STORE: &str = "store";
pub const ARG_URL: &str = "url";
pub const ARG_CHALLENGE_TOKEN: &str = "challenge-token";
pub const ARG_WATCH: &str = "watch";

pub const DEFAULT_STORE: &str = "authguard-session.json";
pub const DEFAULT_PAGE_URL: &str = "http://localhost/";

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

    let command = Command::new("authguard")
        .about("Headless driver for the AuthGuard client session core")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_BASE_URL)
                .short('b')
                .long("base-url")
                .help("Backend base URL, example: https://api.example.com")
                .env("AUTHGUARD_BASE_URL"),
        )
        .arg(
            Arg::new(ARG_SITE_KEY)
                .long("site-key")
                .help("Challenge widget site key")
                .env("AUTHGUARD_TURNSTILE_SITEKEY"),
        )
        .arg(
            Arg::new(ARG_STORE)
                .short('s')
                .long("store")
                .help("JSON file standing in for the browser's local storage")
                .default_value(DEFAULT_STORE)
                .env("AUTHGUARD_STORE"),
        )
        .arg(
            Arg::new(ARG_URL)
                .short('u')
                .long("url")
                .help("Page URL the client boots on, OAuth2 callback query included")
                .default_value(DEFAULT_PAGE_URL)
                .value_parser(clap::value_parser!(url::Url)),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TOKEN)
                .long("challenge-token")
                .help("Challenge solution to submit when the gate is not passed"),
        )
        .arg(
            Arg::new(ARG_WATCH)
                .short('w')
                .long("watch")
                .help("Keep renewing the session until interrupted")
                .action(clap::ArgAction::SetTrue),
        );

    logging::with_args(command)
}
