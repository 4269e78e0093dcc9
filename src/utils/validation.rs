use crate::utils::error::{RelayError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(RelayError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// A backend is either a Hugging Face Space id (`owner/name`) or an http(s) base URL.
pub fn validate_backend(field_name: &str, backend: &str) -> Result<()> {
    validate_non_empty_string(field_name, backend)?;

    if backend.contains("://") {
        return validate_url(field_name, backend);
    }

    let mut parts = backend.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => Ok(()),
        _ => Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: backend.to_string(),
            reason: "Expected a Space id like 'owner/name' or an http(s) URL".to_string(),
        }),
    }
}

/// API endpoint names look like `/tryon`.
pub fn validate_api_name(field_name: &str, api_name: &str) -> Result<()> {
    let name = api_name.strip_prefix('/').unwrap_or(api_name);
    if name.is_empty() || name.contains('/') || name.contains(char::is_whitespace) {
        return Err(RelayError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: api_name.to_string(),
            reason: "API name must be a single path segment such as '/tryon'".to_string(),
        });
    }
    Ok(())
}
