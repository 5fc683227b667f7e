// aurs-net/src/validation.rs
use aurs_common::error::{AursError, Result};
use url::{Host, Url};

/// Validates a URL, ensuring it uses the HTTPS scheme. Plain HTTP is only
/// accepted for loopback hosts.
pub fn validate_url(url_str: &str) -> Result<Url> {
    let url = Url::parse(url_str)
        .map_err(|e| AursError::Generic(format!("Failed to parse URL '{url_str}': {e}")))?;
    match url.scheme() {
        "https" => Ok(url),
        "http" if is_loopback(&url) => Ok(url),
        scheme => Err(AursError::ValidationError(format!(
            "Invalid URL scheme for '{url_str}': Must be https, but got '{scheme}'"
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(addr)) => addr.is_loopback(),
        Some(Host::Ipv6(addr)) => addr.is_loopback(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_is_accepted() {
        assert!(validate_url("https://aur.archlinux.org/rpc/").is_ok());
    }

    #[test]
    fn test_plain_http_only_on_loopback() {
        assert!(validate_url("http://127.0.0.1:1234/rpc/").is_ok());
        assert!(validate_url("http://localhost/rpc/").is_ok());
        assert!(matches!(
            validate_url("http://aur.archlinux.org/rpc/"),
            Err(AursError::ValidationError(_))
        ));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(validate_url("not a url").is_err());
    }
}
