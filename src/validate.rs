//! Input checks for new URL entries.

use crate::error::{utils::validation_error, Result};
use crate::store::NewUrl;
use once_cell::sync::Lazy;
use regex::Regex;

/// `scheme://host[:port][/path]` with scheme `http` or `https`.
static URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(http|https)://[a-zA-Z0-9.-]+(\.[a-zA-Z0-9-]+)*(:[0-9]+)?(/.*)?$")
        .expect("URL pattern is a valid regex")
});

pub fn is_valid_url(candidate: &str) -> bool {
    URL_PATTERN.is_match(candidate)
}

/// Check a URL/name pair submitted for storage.
pub fn validate_new_url(url: &str, name: &str) -> Result<NewUrl> {
    if !is_valid_url(url) {
        return Err(validation_error("Invalid URL format"));
    }

    if name.is_empty() {
        return Err(validation_error("URL Name cannot be empty"));
    }

    Ok(NewUrl {
        url: url.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RedirectorError;

    #[test]
    fn test_accepts_absolute_http_urls() {
        for url in [
            "http://example.com",
            "https://example.com",
            "http://localhost:3000",
            "https://api.example.co.uk:8443/v1/items",
            "http://10.0.0.7/",
            "http://my-service.internal/path?with=query",
        ] {
            assert!(is_valid_url(url), "expected {} to be accepted", url);
        }
    }

    #[test]
    fn test_rejects_other_forms() {
        for url in [
            "",
            "example.com",
            "ftp://example.com",
            "http://",
            "http//example.com",
            "http://exa mple.com",
            "http://example.com:port",
            "https://user@example.com",
            "mailto:someone@example.com",
        ] {
            assert!(!is_valid_url(url), "expected {:?} to be rejected", url);
        }
    }

    #[test]
    fn test_validate_new_url() {
        let new = validate_new_url("http://example.com", "Example").unwrap();
        assert_eq!(new.url, "http://example.com");
        assert_eq!(new.name, "Example");

        let err = validate_new_url("nope", "Example").unwrap_err();
        assert!(matches!(err, RedirectorError::Validation { .. }));
        assert_eq!(err.to_string(), "Invalid URL format");

        let err = validate_new_url("http://example.com", "").unwrap_err();
        assert_eq!(err.to_string(), "URL Name cannot be empty");
    }
}
