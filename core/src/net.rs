//! Local-host classification for `http://` base URLs (§6).

use std::net::IpAddr;

/// True if `host` should be treated as local/private for the purposes of
/// permitting an insecure `http://` base URL.
pub fn is_local_or_private_host(host: &str) -> bool {
    let host = host.trim();
    if host.is_empty() {
        return false;
    }
    if host.eq_ignore_ascii_case("localhost") || host == "::1" {
        return true;
    }
    if host.ends_with(".localhost") || host.ends_with(".local") {
        return true;
    }

    if let Ok(ip) = host.parse::<IpAddr>() {
        return is_local_or_private_ip(ip);
    }
    false
}

fn is_local_or_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let o = v4.octets();
            o[0] == 10
                || o[0] == 127
                || (o[0] == 192 && o[1] == 168)
                || (o[0] == 172 && (16..=31).contains(&o[1]))
        }
        IpAddr::V6(v6) => {
            let seg0 = v6.segments()[0];
            v6.is_loopback() || (0xfc00..=0xfdff).contains(&seg0) || (0xfe80..=0xfebf).contains(&seg0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_localhost_variants() {
        assert!(is_local_or_private_host("localhost"));
        assert!(is_local_or_private_host("app.localhost"));
        assert!(is_local_or_private_host("myhost.local"));
        assert!(is_local_or_private_host("127.0.0.1"));
        assert!(is_local_or_private_host("::1"));
    }

    #[test]
    fn classifies_private_ipv4_ranges() {
        assert!(is_local_or_private_host("10.0.0.5"));
        assert!(is_local_or_private_host("192.168.1.1"));
        assert!(is_local_or_private_host("172.20.0.1"));
        assert!(!is_local_or_private_host("172.32.0.1"));
        assert!(!is_local_or_private_host("8.8.8.8"));
    }

    #[test]
    fn classifies_ipv6_unique_and_link_local() {
        assert!(is_local_or_private_host("fd00::1"));
        assert!(is_local_or_private_host("fe80::1"));
        assert!(!is_local_or_private_host("2001:4860:4860::8888"));
    }

    #[test]
    fn public_host_is_not_local() {
        assert!(!is_local_or_private_host("example.com"));
    }
}
