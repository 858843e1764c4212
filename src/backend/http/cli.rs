use clap::{Arg, ArgMatches, Command};
use url::Url;

use crate::backend::ClientContext;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

pub fn augment_command(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("api_url")
            .long("api-url")
            .help_heading("Backend")
            .help("Backend origin; the API is served under <origin>/api")
            .env("DUMU_API_URL")
            .default_value(DEFAULT_API_URL)
            .num_args(1),
    )
    .arg(
        Arg::new("user_agent")
            .long("user-agent")
            .help_heading("Backend")
            .help("HTTP User-Agent")
            .num_args(1),
    )
    .arg(
        Arg::new("timeout_secs")
            .long("timeout-secs")
            .help_heading("Backend")
            .help("Timeout for the upload and result requests, in seconds")
            .default_value("180")
            .num_args(1),
    )
    .arg(
        Arg::new("connect_timeout_secs")
            .long("connect-timeout-secs")
            .help_heading("Backend")
            .help("TCP connect timeout, in seconds")
            .default_value("10")
            .num_args(1),
    )
}

pub fn context_from_matches(matches: &ArgMatches) -> anyhow::Result<ClientContext> {
    let raw = matches
        .get_one::<String>("api_url")
        .map(String::as_str)
        .unwrap_or(DEFAULT_API_URL);
    let origin = Url::parse(raw).map_err(|e| anyhow::anyhow!("invalid --api-url {}: {}", raw, e))?;

    let mut ctx = ClientContext::new(origin);
    if let Some(ua) = matches.get_one::<String>("user_agent") {
        ctx.user_agent = ua.clone();
    }
    if let Some(s) = matches.get_one::<String>("timeout_secs") {
        ctx.timeout_secs = s.parse()?;
    }
    if let Some(s) = matches.get_one::<String>("connect_timeout_secs") {
        ctx.connect_timeout_secs = s.parse()?;
    }
    Ok(ctx)
}
