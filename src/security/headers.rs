//! Header manipulation for forwarded requests.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Point `Host` at the selected backend
//! - Preserve the caller's host in `X-Forwarded-Host`
//! - Append the peer address to `X-Forwarded-For`

use std::net::IpAddr;

use axum::http::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    uri::Authority,
};

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Rewrite inbound headers so the request addresses `target`.
pub fn prepare_upstream_headers(headers: &mut HeaderMap, target: &Authority, client_ip: Option<IpAddr>) {
    let original_host = headers.get(header::HOST).cloned();

    strip_hop_by_hop(headers);

    if let Ok(host) = HeaderValue::from_str(target.as_str()) {
        headers.insert(header::HOST, host);
    }
    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }

    if let Some(ip) = client_ip {
        let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) if !prior.is_empty() => format!("{}, {}", prior, ip),
            _ => ip.to_string(),
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if !headers.contains_key(&X_FORWARDED_PROTO) {
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authority(s: &str) -> Authority {
        s.parse().unwrap()
    }

    #[test]
    fn test_rewrites_host_and_preserves_original() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.example.com"));

        prepare_upstream_headers(&mut headers, &authority("10.0.0.1:3000"), None);

        assert_eq!(headers[header::HOST], "10.0.0.1:3000");
        assert_eq!(headers[X_FORWARDED_HOST], "gateway.example.com");
        assert_eq!(headers[X_FORWARDED_PROTO], "http");
        assert!(!headers.contains_key(X_FORWARDED_FOR));
    }

    #[test]
    fn test_appends_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));

        prepare_upstream_headers(&mut headers, &authority("backend:80"), Some("198.51.100.2".parse().unwrap()));

        assert_eq!(headers[X_FORWARDED_FOR], "203.0.113.7, 198.51.100.2");
    }

    #[test]
    fn test_strips_connection_listed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session-hint"));
        headers.insert("x-session-hint", HeaderValue::from_static("abc"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);

        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key("x-session-hint"));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert_eq!(headers[header::ACCEPT], "*/*");
    }
}
