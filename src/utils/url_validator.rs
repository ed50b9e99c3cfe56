// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{Context, Result};
use std::net::IpAddr;
use url::Url;

/// Maximum allowed URL length
const MAX_URL_LENGTH: usize = 2048;

/// Validate the remote store base URL.
///
/// Checks:
/// - Only allows http/https schemes
/// - Requires a host
/// - Plain http is only accepted for loopback hosts
pub fn validate_backend_url(url_str: &str) -> Result<Url> {
    if url_str.len() > MAX_URL_LENGTH {
        return Err(anyhow::anyhow!(
            "URL exceeds maximum length of {} characters",
            MAX_URL_LENGTH
        ));
    }

    let url = Url::parse(url_str).context("Invalid URL format")?;

    if url.cannot_be_a_base() {
        return Err(anyhow::anyhow!("URL cannot be used as a base: {}", url_str));
    }

    let host = url
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| anyhow::anyhow!("URL must have a host"))?;

    match url.scheme() {
        "https" => {}
        "http" if is_loopback(host) => {}
        "http" => {
            return Err(anyhow::anyhow!(
                "Plain http is only allowed for loopback hosts, got {}",
                host
            ));
        }
        scheme => {
            return Err(anyhow::anyhow!(
                "Invalid URL scheme: {} (only http and https are allowed)",
                scheme
            ));
        }
    }

    Ok(url)
}

/// Check if a hostname refers to the local machine
fn is_loopback(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        let url = validate_backend_url("https://records.example.com/v1/").unwrap();
        assert_eq!(url.host_str(), Some("records.example.com"));
    }

    #[test]
    fn test_http_loopback_accepted() {
        assert!(validate_backend_url("http://localhost:8080").is_ok());
        assert!(validate_backend_url("http://127.0.0.1:3000/api").is_ok());
        assert!(validate_backend_url("http://[::1]:3000").is_ok());
    }

    #[test]
    fn test_http_remote_rejected() {
        assert!(validate_backend_url("http://records.example.com").is_err());
        assert!(validate_backend_url("http://192.168.1.10").is_err());
    }

    #[test]
    fn test_invalid_scheme() {
        assert!(validate_backend_url("file:///etc/passwd").is_err());
        assert!(validate_backend_url("ftp://example.com").is_err());
    }

    #[test]
    fn test_invalid_format() {
        assert!(validate_backend_url("not-a-url").is_err());
        assert!(validate_backend_url("").is_err());
    }

    #[test]
    fn test_too_long() {
        let long_url = format!("https://example.com/{}", "a".repeat(MAX_URL_LENGTH));
        assert!(validate_backend_url(&long_url).is_err());
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback("LOCALHOST"));
        assert!(is_loopback("127.0.0.2"));
        assert!(is_loopback("[::1]"));
        assert!(!is_loopback("example.com"));
        assert!(!is_loopback("10.0.0.1"));
    }
}
