//! User agent handling for HTTP requests.

pub const USER_AGENT: &str = concat!(
    "crsacquire/",
    env!("CARGO_PKG_VERSION"),
    " (public-interest archiving)"
);

/// Resolve the user agent from config, falling back to the default.
pub fn resolve_user_agent(config_value: Option<&str>) -> String {
    match config_value.map(str::trim) {
        Some(ua) if !ua.is_empty() => ua.to_string(),
        _ => USER_AGENT.to_string(),
    }
}
