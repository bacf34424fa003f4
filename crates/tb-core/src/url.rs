//! Fast URL utilities for the hot path
//!
//! These functions avoid allocations and work directly on string slices.
//! None of them validate URL well-formedness.

use crate::hash::hash_token_bytes;
use crate::types::SchemeMask;

// =============================================================================
// Domain Extraction
// =============================================================================

const HTTP_PREFIX: &str = "http://";
const HTTPS_PREFIX: &str = "https://";

/// Locate the domain used for matching inside `url`.
///
/// Returns a half-open byte range `(start, end)` into `url`. The start skips a
/// literal `http://` or `https://` prefix (no other scheme is recognised) and
/// the end is the first `/`, `?` or `:` after the start, or the end of the
/// string. Never fails: an empty URL yields `(0, 0)`.
#[inline]
pub fn extract_domain(url: &str) -> (usize, usize) {
    if url.is_empty() {
        return (0, 0);
    }

    let start = if url.starts_with(HTTP_PREFIX) {
        HTTP_PREFIX.len()
    } else if url.starts_with(HTTPS_PREFIX) {
        HTTPS_PREFIX.len()
    } else {
        0
    };

    let end = url.as_bytes()[start..]
        .iter()
        .position(|&b| matches!(b, b'/' | b'?' | b':'))
        .map_or(url.len(), |pos| start + pos);

    (start, end)
}

/// The domain substring located by [`extract_domain`].
#[inline]
pub fn resolve_domain(url: &str) -> &str {
    let (start, end) = extract_domain(url);
    &url[start..end]
}

// =============================================================================
// Scheme Extraction
// =============================================================================

/// Fast scheme extraction without URL parsing.
/// Returns the scheme mask or None if unknown.
#[inline]
pub fn extract_scheme(url: &str) -> Option<SchemeMask> {
    let bytes = url.as_bytes();
    let has_prefix = |prefix: &[u8]| {
        bytes.len() >= prefix.len() && bytes[..prefix.len()].eq_ignore_ascii_case(prefix)
    };

    if has_prefix(b"https://") {
        Some(SchemeMask::HTTPS)
    } else if has_prefix(b"http://") {
        Some(SchemeMask::HTTP)
    } else if has_prefix(b"wss://") {
        Some(SchemeMask::WSS)
    } else if has_prefix(b"ws://") {
        Some(SchemeMask::WS)
    } else if has_prefix(b"data:") {
        Some(SchemeMask::DATA)
    } else if has_prefix(b"ftp://") {
        Some(SchemeMask::FTP)
    } else {
        None
    }
}

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let bytes = url.as_bytes();

    let colon_pos = bytes.iter().position(|&b| b == b':')?;

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    // Data URLs use ":" not "://"
    if colon_pos >= 4 && bytes[..colon_pos].eq_ignore_ascii_case(b"data") {
        return Some(colon_pos + 1);
    }

    None
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
///
/// Unlike [`extract_domain`] this understands any `scheme://` prefix and
/// skips userinfo. Returns None when the URL has no scheme separator.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    let mut host_start = scheme_end;
    for (i, &b) in bytes.iter().enumerate().skip(scheme_end) {
        if b == b'@' {
            host_start = i + 1;
            break;
        }
        if b == b'/' || b == b'?' || b == b'#' {
            break;
        }
    }

    let host_end = bytes[host_start..]
        .iter()
        .position(|&b| matches!(b, b'/' | b'?' | b'#' | b':'))
        .map_or(bytes.len(), |pos| host_start + pos);

    Some((host_start, host_end))
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

// =============================================================================
// Path Extraction
// =============================================================================

/// Extract the path portion of a URL, without query or fragment.
#[inline]
pub fn extract_path(url: &str) -> &str {
    let (_, host_end) = match get_host_position(url) {
        Some(pos) => pos,
        None => return "/",
    };

    let bytes = url.as_bytes();
    let delimiter = bytes[host_end..]
        .iter()
        .position(|&b| matches!(b, b'/' | b'?' | b'#'));
    let path_start = match delimiter {
        Some(offset) if bytes[host_end + offset] == b'/' => host_end + offset,
        _ => return "/",
    };

    let path_end = bytes[path_start..]
        .iter()
        .position(|&b| b == b'?' || b == b'#')
        .map_or(bytes.len(), |pos| path_start + pos);

    &url[path_start..path_end]
}

// =============================================================================
// URL Tokenization
// =============================================================================

/// Minimum length of an indexable token.
pub const MIN_TOKEN_LEN: usize = 3;

/// Tokenize a URL into hashed alphanumeric runs of at least [`MIN_TOKEN_LEN`]
/// bytes. The result is sorted and deduplicated.
pub fn tokenize_url(url: &str) -> Vec<u32> {
    let bytes = url.as_bytes();
    let mut tokens = Vec::with_capacity(16);
    let mut token_start = None;

    for i in 0..=bytes.len() {
        let is_alnum = i < bytes.len() && bytes[i].is_ascii_alphanumeric();

        if is_alnum {
            if token_start.is_none() {
                token_start = Some(i);
            }
        } else if let Some(start) = token_start.take() {
            if i - start >= MIN_TOKEN_LEN {
                tokens.push(hash_token_bytes(&bytes[start..i]));
            }
        }
    }

    tokens.sort_unstable();
    tokens.dedup();
    tokens
}

// =============================================================================
// ABP Boundary Check
// =============================================================================

/// Check if a character is an ABP separator (boundary character).
/// ABP ^ matches: end of string, or any non-alphanumeric character other than
/// `_ - . %`.
#[inline]
pub fn is_boundary_char(c: u8) -> bool {
    !(c.is_ascii_alphanumeric() || matches!(c, b'_' | b'-' | b'.' | b'%'))
}
