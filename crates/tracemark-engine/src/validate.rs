use reqwest::Url;

use crate::error::EngineError;

pub(crate) const MAX_NAME_LEN: usize = 200;
pub(crate) const MAX_TEXT_LEN: usize = 5_000;
pub(crate) const MAX_URL_LEN: usize = 2_048;
pub(crate) const MAX_PROOF_URLS: usize = 10;

/// Trimmed, non-empty and bounded.
pub(crate) fn required(field: &str, value: &str, max: usize) -> Result<String, EngineError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(EngineError::Validation(format!("{} is required", field)));
    }
    if value.chars().count() > max {
        return Err(EngineError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value.to_string())
}

pub(crate) fn email(field: &str, value: &str) -> Result<String, EngineError> {
    let value = required(field, value, MAX_NAME_LEN)?;
    let valid = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(EngineError::Validation(format!("{} is not a valid email", field)));
    }
    Ok(value)
}

/// Absolute http(s) URL with a host.
pub(crate) fn url(field: &str, value: &str) -> Result<String, EngineError> {
    let value = required(field, value, MAX_URL_LEN)?;
    let invalid = || EngineError::Validation(format!("{} must be an http(s) URL", field));

    let parsed = Url::parse(&value).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }
    // The parser tolerates `https:///host`; the authority must follow `//` directly.
    let authority = value
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(invalid)?;
    if authority.starts_with(['/', '\\']) {
        return Err(invalid());
    }
    Ok(value)
}

/// Blank notes are treated as absent.
pub(crate) fn note(value: Option<String>) -> Result<Option<String>, EngineError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required("reason", v, MAX_TEXT_LEN).map(Some),
    }
}
