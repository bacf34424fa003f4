//! Registrable-domain (eTLD+1) helpers
//!
//! A compact heuristic stands in for the full Public Suffix List: the last two
//! labels, or the last three when the final two form a well-known two-part
//! public suffix. Results are slices of the input, so nothing allocates.
//!
//! # Examples
//!
//! ```
//! use tb_core::psl::get_etld1;
//!
//! assert_eq!(get_etld1("sub.example.com"), "example.com");
//! assert_eq!(get_etld1("sub.example.co.uk"), "example.co.uk");
//! ```

use std::net::IpAddr;

/// Common two-part public suffixes.
const COMMON_TWO_PART_TLDS: &[&str] = &[
    "co.uk", "co.jp", "co.nz", "co.za", "co.in", "co.kr",
    "com.au", "com.br", "com.cn", "com.mx", "com.tw", "com.hk",
    "net.au", "net.nz",
    "org.uk", "org.au",
    "gov.uk", "gov.au",
    "ac.uk", "ac.jp",
    "ne.jp", "or.jp",
];

/// Get the eTLD+1 (registrable domain) for a hostname.
///
/// IP addresses and single-label hosts are returned unchanged. A trailing
/// dot is ignored.
pub fn get_etld1(host: &str) -> &str {
    let host = host.trim_end_matches('.');
    if host.parse::<IpAddr>().is_ok() {
        return host;
    }

    let mut dots = host.rmatch_indices('.').map(|(i, _)| i);
    if dots.next().is_none() {
        return host;
    }
    let second = match dots.next() {
        Some(i) => i,
        None => return host,
    };

    let last_two = &host[second + 1..];
    let is_two_part = COMMON_TWO_PART_TLDS
        .iter()
        .any(|suffix| suffix.eq_ignore_ascii_case(last_two));
    if !is_two_part {
        return last_two;
    }

    match dots.next() {
        Some(third) => &host[third + 1..],
        None => host,
    }
}

/// Check if two hosts share the same eTLD+1.
pub fn is_same_site(host1: &str, host2: &str) -> bool {
    get_etld1(host1).eq_ignore_ascii_case(get_etld1(host2))
}

/// Get the parent domain (strip leftmost label).
pub fn get_parent_domain(host: &str) -> Option<&str> {
    match host.find('.') {
        Some(idx) if idx < host.len() - 1 => Some(&host[idx + 1..]),
        _ => None,
    }
}

/// Iterator for suffix-walking a host from full to eTLD+1.
pub struct HostSuffixIter<'a> {
    current: Option<&'a str>,
    etld1_len: usize,
}

impl<'a> HostSuffixIter<'a> {
    pub fn new(host: &'a str) -> Self {
        let host = host.trim_end_matches('.');
        Self {
            current: if host.is_empty() { None } else { Some(host) },
            etld1_len: get_etld1(host).len(),
        }
    }
}

impl<'a> Iterator for HostSuffixIter<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let result = self.current?;
        self.current = get_parent_domain(result).filter(|parent| parent.len() >= self.etld1_len);
        Some(result)
    }
}

/// Walk host suffixes from most specific to least specific.
pub fn walk_host_suffixes(host: &str) -> HostSuffixIter<'_> {
    HostSuffixIter::new(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_etld1_simple() {
        assert_eq!(get_etld1("example.com"), "example.com");
        assert_eq!(get_etld1("sub.example.com"), "example.com");
        assert_eq!(get_etld1("a.b.example.com."), "example.com");
    }

    #[test]
    fn test_etld1_two_part() {
        assert_eq!(get_etld1("sub.example.co.uk"), "example.co.uk");
        assert_eq!(get_etld1("example.co.uk"), "example.co.uk");
        assert_eq!(get_etld1("co.uk"), "co.uk");
    }

    #[test]
    fn test_etld1_passthrough() {
        assert_eq!(get_etld1("localhost"), "localhost");
        assert_eq!(get_etld1("192.168.1.10"), "192.168.1.10");
        assert_eq!(get_etld1(""), "");
    }

    #[test]
    fn test_same_site() {
        assert!(is_same_site("www.example.com", "cdn.example.com"));
        assert!(is_same_site("Example.com", "example.COM"));
        assert!(!is_same_site("example.com", "tracker.net"));
    }

    #[test]
    fn test_get_parent_domain() {
        assert_eq!(get_parent_domain("sub.example.com"), Some("example.com"));
        assert_eq!(get_parent_domain("example.com"), Some("com"));
        assert_eq!(get_parent_domain("com"), None);
        assert_eq!(get_parent_domain(""), None);
    }

    #[test]
    fn test_walk_host_suffixes() {
        let suffixes: Vec<&str> = walk_host_suffixes("a.b.example.com").collect();
        assert_eq!(suffixes, vec!["a.b.example.com", "b.example.com", "example.com"]);

        let suffixes: Vec<&str> = walk_host_suffixes("example.com").collect();
        assert_eq!(suffixes, vec!["example.com"]);

        assert_eq!(walk_host_suffixes("").count(), 0);
    }
}
