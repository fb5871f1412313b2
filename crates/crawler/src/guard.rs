// ABOUTME: URL guard: scheme validation and private/internal host rejection (SSRF defense).
// ABOUTME: Synchronous checks run before anything is stored; DNS checks run inside the fetchers.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnet::{Ipv4Net, Ipv6Net};
use once_cell::sync::Lazy;
use url::{Host, Url};

use crate::error::CrawlError;

static PRIVATE_V4: Lazy<Vec<Ipv4Net>> = Lazy::new(|| {
    [
        "0.0.0.0/8",
        "10.0.0.0/8",
        "100.64.0.0/10",
        "127.0.0.0/8",
        "169.254.0.0/16",
        "172.16.0.0/12",
        "192.168.0.0/16",
    ]
    .iter()
    .filter_map(|net| net.parse().ok())
    .collect()
});

static PRIVATE_V6: Lazy<Vec<Ipv6Net>> = Lazy::new(|| {
    ["fc00::/7", "fe80::/10"]
        .iter()
        .filter_map(|net| net.parse().ok())
        .collect()
});

/// Hostnames that always point inside the deployment.
const INTERNAL_HOSTNAMES: &[&str] = &["localhost", "metadata", "metadata.google.internal"];

/// Suffixes reserved for internal or link-local naming.
const INTERNAL_SUFFIXES: &[&str] = &[".localhost", ".local", ".internal", ".lan", ".home.arpa"];

/// Check if an IP address is in a private/reserved range.
pub fn is_private_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(ip) => is_private_v4(ip),
        IpAddr::V6(ip) => {
            if ip.is_loopback() || ip.is_unspecified() {
                return true;
            }
            if let Some(mapped) = ip.to_ipv4_mapped() {
                return is_private_v4(&mapped);
            }
            is_private_v6(ip)
        }
    }
}

fn is_private_v4(ip: &Ipv4Addr) -> bool {
    PRIVATE_V4.iter().any(|net| net.contains(ip))
}

fn is_private_v6(ip: &Ipv6Addr) -> bool {
    PRIVATE_V6.iter().any(|net| net.contains(ip))
}

/// Returns true for hostnames that name internal infrastructure.
pub fn is_internal_hostname(host: &str) -> bool {
    let host = host.trim_end_matches('.').to_lowercase();
    INTERNAL_HOSTNAMES.contains(&host.as_str())
        || INTERNAL_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}

/// Validate a URL for crawling without touching the network.
///
/// Accepts only http/https URLs with a host. Literal private IPs and
/// internal hostnames are rejected unless `allow_private` is set.
pub fn validate_url(raw: &str, allow_private: bool) -> Result<Url, CrawlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(CrawlError::invalid_url(raw, "Validate", None));
    }

    let parsed = Url::parse(raw).map_err(|e| {
        CrawlError::invalid_url(raw, "Validate", Some(anyhow::anyhow!("{}", e)))
    })?;

    let scheme = parsed.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(CrawlError::invalid_url(
            raw,
            "Validate",
            Some(anyhow::anyhow!("unsupported scheme {}", scheme)),
        ));
    }

    let host = parsed.host().ok_or_else(|| {
        CrawlError::invalid_url(raw, "Validate", Some(anyhow::anyhow!("empty host")))
    })?;

    if allow_private {
        return Ok(parsed.clone());
    }

    let internal = match host {
        Host::Ipv4(ip) => is_private_ip(&IpAddr::V4(ip)),
        Host::Ipv6(ip) => is_private_ip(&IpAddr::V6(ip)),
        Host::Domain(name) => is_internal_hostname(name),
    };
    if internal {
        return Err(CrawlError::ssrf(
            raw,
            "Validate",
            Some(anyhow::anyhow!("internal hosts are not allowed")),
        ));
    }

    Ok(parsed.clone())
}

/// Resolve the URL's host and reject it if any address is private.
///
/// Literal IPs were already checked by [`validate_url`]; this covers
/// public-looking hostnames that resolve inward.
pub async fn ensure_public_host(url: &Url, allow_private: bool) -> Result<(), CrawlError> {
    if allow_private {
        return Ok(());
    }

    let host = match url.host() {
        Some(Host::Domain(name)) => name.to_string(),
        Some(Host::Ipv4(ip)) => return reject_if_private(url, IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => return reject_if_private(url, IpAddr::V6(ip)),
        None => {
            return Err(CrawlError::invalid_url(
                url.as_str(),
                "Resolve",
                Some(anyhow::anyhow!("empty host")),
            ))
        }
    };

    let port = url.port_or_known_default().unwrap_or(443);
    let addrs = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|e| {
            CrawlError::fetch(
                url.as_str(),
                "Resolve",
                Some(anyhow::anyhow!("DNS lookup failed: {}", e)),
            )
        })?;

    for socket_addr in addrs {
        reject_if_private(url, socket_addr.ip())?;
    }
    Ok(())
}

fn reject_if_private(url: &Url, ip: IpAddr) -> Result<(), CrawlError> {
    if is_private_ip(&ip) {
        return Err(CrawlError::ssrf(
            url.as_str(),
            "Resolve",
            Some(anyhow::anyhow!("private IP addresses are not allowed")),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_private_ip_v4() {
        assert!(is_private_ip(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_ip(&"172.31.255.255".parse().unwrap()));
        assert!(is_private_ip(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_ip(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_ip(&"169.254.169.254".parse().unwrap()));
        assert!(is_private_ip(&"0.0.0.0".parse().unwrap()));
        assert!(is_private_ip(&"100.64.0.1".parse().unwrap()));

        assert!(!is_private_ip(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_ip(&"172.32.0.1".parse().unwrap()));
    }

    #[test]
    fn test_is_private_ip_v6() {
        assert!(is_private_ip(&"::1".parse().unwrap()));
        assert!(is_private_ip(&"::".parse().unwrap()));
        assert!(is_private_ip(&"fd00::1".parse().unwrap()));
        assert!(is_private_ip(&"fe80::1".parse().unwrap()));
        assert!(is_private_ip(&"::ffff:127.0.0.1".parse().unwrap()));

        assert!(!is_private_ip(&"2001:4860:4860::8888".parse().unwrap()));
    }

    #[test]
    fn accepts_public_http_and_https() {
        assert!(validate_url("https://example.com/a", false).is_ok());
        assert!(validate_url("http://example.com", false).is_ok());
        assert!(validate_url("  https://example.com/padded  ", false).is_ok());
    }

    #[test]
    fn rejects_other_schemes() {
        let err = validate_url("ftp://example.com/file", false).unwrap_err();
        assert!(err.is_invalid_url());
        assert!(validate_url("javascript:alert(1)", false).is_err());
        assert!(validate_url("file:///etc/passwd", false).is_err());
    }

    #[test]
    fn rejects_garbage_and_empty() {
        assert!(validate_url("", false).unwrap_err().is_invalid_url());
        assert!(validate_url("not a url", false).unwrap_err().is_invalid_url());
    }

    #[test]
    fn rejects_internal_hosts() {
        assert!(validate_url("http://127.0.0.1:8080/", false).unwrap_err().is_ssrf());
        assert!(validate_url("http://[::1]/", false).unwrap_err().is_ssrf());
        assert!(validate_url("http://localhost/admin", false).unwrap_err().is_ssrf());
        assert!(validate_url("http://printer.local/", false).unwrap_err().is_ssrf());
        assert!(validate_url("http://metadata.google.internal/", false)
            .unwrap_err()
            .is_ssrf());
    }

    #[test]
    fn allow_private_skips_host_checks() {
        assert!(validate_url("http://127.0.0.1:8080/", true).is_ok());
        assert!(validate_url("ftp://127.0.0.1/", true).is_err());
    }

    #[tokio::test]
    async fn ensure_public_host_rejects_literal_private_ip() {
        let url = Url::parse("http://10.1.2.3/").unwrap();
        let err = ensure_public_host(&url, false).await.unwrap_err();
        assert!(err.is_ssrf());
        assert!(ensure_public_host(&url, true).await.is_ok());
    }
}
