use std::{
    net::{IpAddr, SocketAddr},
    str::FromStr,
};

use http::HeaderMap;

pub mod response;

/// Resolves the client address of a request that may have passed through
/// reverse proxies.
///
/// Precedence: `X-Forwarded-For`, `X-Real-IP`, `Forwarded` (`for=`), then the
/// peer address of the TCP connection.
#[must_use]
pub fn get_request_ip(headers: &HeaderMap, addr: &SocketAddr) -> IpAddr {
    let first_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(str::trim)
            .map(ToString::to_string)
    };

    let x_forwarded_for = first_value("X-Forwarded-For").and_then(|ip| parse_ip(&ip));
    let x_real_ip = first_value("X-Real-IP").and_then(|ip| parse_ip(&ip));
    let forwarded = first_value("Forwarded").and_then(|value| {
        value
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.eq_ignore_ascii_case("for"))
            .and_then(|(_, ip)| parse_ip(ip))
    });

    tracing::debug!(?x_forwarded_for, ?x_real_ip, ?forwarded, ip_address = ?addr.ip());

    x_forwarded_for.or(x_real_ip).or(forwarded).unwrap_or_else(|| addr.ip())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');
    // `Forwarded` wraps IPv6 addresses in brackets, optionally with a port
    let value = value
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map_or(value, |(ip, _)| ip);

    IpAddr::from_str(value)
        .ok()
        .or_else(|| SocketAddr::from_str(value).ok().map(|socket| socket.ip()))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use http::HeaderValue;

    use super::*;

    fn peer() -> SocketAddr { SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 4000) }

    #[test]
    fn test_falls_back_to_peer_address() {
        assert_eq!(get_request_ip(&HeaderMap::new(), &peer()), peer().ip());
    }

    #[test]
    fn test_prefers_x_forwarded_for() {
        let mut headers = HeaderMap::new();
        assert!(headers
            .insert("X-Forwarded-For", HeaderValue::from_static("1.2.3.4, 10.0.0.2"))
            .is_none());
        assert!(headers.insert("X-Real-IP", HeaderValue::from_static("5.6.7.8")).is_none());

        assert_eq!(get_request_ip(&headers, &peer()), IpAddr::from([1, 2, 3, 4]));
    }

    #[test]
    fn test_reads_forwarded_header() {
        let mut headers = HeaderMap::new();
        assert!(headers
            .insert("Forwarded", HeaderValue::from_static("for=\"[2001:db8::1]:4711\";proto=https"))
            .is_none());

        assert_eq!(get_request_ip(&headers, &peer()), "2001:db8::1".parse::<IpAddr>().unwrap());
    }
}
