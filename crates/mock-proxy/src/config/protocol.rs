//! Protocol of a mapped upstream host.

/// Protocol an upstream host can be reached with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// HTTP protocol
    Http,
    /// HTTPS protocol (HTTP over TLS)
    Https,
}

impl Protocol {
    /// Parse protocol from URL scheme
    pub fn from_scheme(scheme: &str) -> Result<Self, String> {
        match scheme.to_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "https" => Ok(Protocol::Https),
            _ => Err(format!("Unsupported protocol scheme: {scheme}")),
        }
    }

    /// Extract the protocol from an absolute URL such as `http://host:port/base`
    pub fn from_url(url: &str) -> Result<Self, String> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| format!("Invalid URL format (missing scheme): {url}"))?;
        if rest.is_empty() {
            return Err(format!("Invalid URL format (missing host): {url}"));
        }
        Self::from_scheme(scheme)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_scheme_case_insensitive() {
        assert_eq!(Protocol::from_scheme("HTTPS").unwrap(), Protocol::Https);
        assert_eq!(Protocol::from_scheme("http").unwrap(), Protocol::Http);
        assert!(Protocol::from_scheme("ftp").is_err());
    }

    #[test]
    fn test_from_url() {
        assert_eq!(
            Protocol::from_url("http://www.example.com").unwrap(),
            Protocol::Http
        );
        assert_eq!(
            Protocol::from_url("https://api.example.com/v2").unwrap(),
            Protocol::Https
        );
        assert!(Protocol::from_url("www.example.com").is_err());
        assert!(Protocol::from_url("http://").is_err());
    }
}
