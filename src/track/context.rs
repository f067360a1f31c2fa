//! Request context extraction
//!
//! Builds a `VisitRecord` from an inbound tracking request: client IP with
//! proxy trust validation, the raw User-Agent / Referer / Accept-Language
//! headers, and the visited path. Supports:
//! - Trust chain validation for X-Forwarded-For and Forwarded headers
//! - Vendor-specific headers (CF-Connecting-IP)
//! - Fallback to the socket remote address when headers are untrusted
//! - IPv4 and IPv6, with optional prefix anonymization

use axum::http::HeaderMap;
use ipnet::IpNet;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{TrackingConfig, TrustedProxyMode};
use crate::stats::VisitRecord;

/// Build a visit record from the request parts.
///
/// Missing or unreadable headers degrade to empty strings; a missing or
/// empty Referer becomes the "Direct" sentinel. `timestamp` is the capture
/// time and is never changed afterwards.
pub fn build_record(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    url: &str,
    timestamp: i64,
    config: &TrackingConfig,
) -> VisitRecord {
    let mut client_ip = extract_client_ip(headers, socket_addr, config);
    if config.ip_anonymization {
        client_ip = anonymize_ip(client_ip);
    }

    let referrer = match header_str(headers, "referer") {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => "Direct".to_string(),
    };

    VisitRecord {
        timestamp,
        ip: client_ip.to_string(),
        user_agent: header_str(headers, "user-agent").unwrap_or("").to_string(),
        url: url.to_string(),
        referrer,
        language: header_str(headers, "accept-language")
            .unwrap_or("")
            .to_string(),
    }
}

/// Extract the client IP address according to the trust configuration
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: IpAddr,
    config: &TrackingConfig,
) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => extract_standard_ip(headers, config).unwrap_or(socket_addr),
        TrustedProxyMode::None => socket_addr,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|h| h.to_str().ok())
}

/// Extract IP from the Cloudflare-specific header
fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    header_str(headers, "cf-connecting-ip").and_then(|s| s.parse::<IpAddr>().ok())
}

/// Extract IP from standard headers (Forwarded, X-Forwarded-For)
fn extract_standard_ip(headers: &HeaderMap, config: &TrackingConfig) -> Option<IpAddr> {
    // Prefer the RFC 7239 Forwarded header
    if let Some(ip) = extract_from_forwarded(headers) {
        return Some(ip);
    }

    extract_from_x_forwarded_for(headers, config)
}

/// Parse the RFC 7239 Forwarded header, e.g.
/// `Forwarded: for=192.0.2.60;proto=http;by=203.0.113.43`
fn extract_from_forwarded(headers: &HeaderMap) -> Option<IpAddr> {
    let forwarded = header_str(headers, "forwarded")?;

    for element in forwarded.split(',') {
        for param in element.split(';') {
            let param = param.trim();
            if let Some(value) = param.strip_prefix("for=") {
                // Strip quotes, IPv6 brackets, and a trailing port
                let ip_str = value
                    .trim_matches('"')
                    .trim_start_matches('[')
                    .split(']')
                    .next()
                    .unwrap_or(value)
                    .split(':')
                    .next()
                    .unwrap_or(value);

                if let Ok(ip) = ip_str.parse::<IpAddr>() {
                    return Some(ip);
                }
            }
        }
    }

    None
}

/// Parse X-Forwarded-For with right-to-left trust validation
fn extract_from_x_forwarded_for(headers: &HeaderMap, config: &TrackingConfig) -> Option<IpAddr> {
    let xff = header_str(headers, "x-forwarded-for")?;

    let ips: Vec<IpAddr> = xff
        .split(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect();

    if ips.is_empty() {
        return None;
    }

    // A fixed proxy count skips that many entries from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        if ips.len() > num_trusted {
            return Some(ips[ips.len() - num_trusted - 1]);
        }
        // Not enough IPs in the chain, return the leftmost
        return ips.first().copied();
    }

    let trusted = trusted_networks(config);
    if !trusted.is_empty() {
        // Walk right to left, skipping proxies inside the trusted ranges;
        // the first address outside them is the client
        for ip in ips.iter().rev() {
            if !trusted.iter().any(|net| net.contains(ip)) {
                return Some(*ip);
            }
        }
        // The whole chain is trusted infrastructure
        return ips.first().copied();
    }

    // No trust configuration, return the rightmost IP
    ips.last().copied()
}

fn trusted_networks(config: &TrackingConfig) -> Vec<IpNet> {
    config
        .trusted_proxies
        .iter()
        .filter_map(|cidr| match cidr.parse::<IpNet>() {
            Ok(net) => Some(net),
            Err(e) => {
                warn!("Ignoring invalid trusted proxy CIDR '{}': {}", cidr, e);
                None
            }
        })
        .collect()
}

/// Anonymize an IP address by truncating to a network prefix
///
/// - IPv4: truncate to /24 (zero the last octet)
/// - IPv6: truncate to /48 (zero the last 80 bits)
pub fn anonymize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V4(addr) => {
            let octets = addr.octets();
            IpAddr::V4(std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], 0))
        }
        IpAddr::V6(addr) => {
            let segments = addr.segments();
            IpAddr::V6(std::net::Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                0,
                0,
                0,
                0,
                0,
            ))
        }
    }
}
