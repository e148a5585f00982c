//! Common validation utilities.

use validator::ValidationError;

/// Maximum accepted length of a plug control URL.
const MAX_URL_LENGTH: usize = 2048;

/// Validates that a plug control endpoint is an absolute http(s) URL with a host.
pub fn validate_plug_url(url: &str) -> Result<(), ValidationError> {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));

    let host = rest
        .map(|r| r.split(['/', '?', '#']).next().unwrap_or_default())
        .unwrap_or_default();

    if host.is_empty() || url.len() > MAX_URL_LENGTH || url.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("plug_url");
        err.message = Some("URL must be an absolute http:// or https:// address".into());
        return Err(err);
    }

    Ok(())
}
