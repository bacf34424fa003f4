//! Blocking exceptions
//!
//! Hosts or pages the user wants left alone. Exceptions are stored as a
//! small text file and turned into filter rules for a dedicated exception
//! engine, which is consulted with the URL of the page a request comes from.

use std::collections::BTreeSet;
use std::fmt::Write;

use tb_core::url::{extract_host, extract_path};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExceptionKind {
    /// Every page on the host is exempt
    Host,
    /// Only this page (and anything below it) is exempt
    Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockingException {
    /// `host` or `host/path`, without scheme, query or trailing slash
    pub source: String,
    pub kind: ExceptionKind,
}

impl BlockingException {
    /// Exempt the whole host of `url`. The scheme is optional.
    pub fn host(url: &str) -> Result<Self, EngineError> {
        let (host, _) = split_url(url)?;
        Ok(Self {
            source: host,
            kind: ExceptionKind::Host,
        })
    }

    /// Exempt the page at `url`, ignoring its query. The scheme is optional.
    pub fn page(url: &str) -> Result<Self, EngineError> {
        let (host, path) = split_url(url)?;
        Ok(Self {
            source: format!("{}{}", host, path),
            kind: ExceptionKind::Page,
        })
    }
}

/// Host and path (without trailing `/`) of a URL that may lack a scheme.
fn split_url(url: &str) -> Result<(String, String), EngineError> {
    let trimmed = url.trim();
    let with_scheme;
    let full = if trimmed.contains("://") {
        trimmed
    } else {
        with_scheme = format!("scheme://{}", trimmed);
        &with_scheme
    };

    let host = extract_host(full)
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .ok_or_else(|| EngineError::InvalidUrl(url.to_string()))?;
    let path = extract_path(full).trim().trim_end_matches('/');

    Ok((host.to_string(), path.to_string()))
}

/// Parse the stored text form: one exception per line, page exceptions
/// end in `/`. Lines that do not name a host are dropped.
pub fn parse_exceptions(text: &str) -> BTreeSet<BlockingException> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let parsed = if line.ends_with('/') {
                BlockingException::page(line)
            } else {
                BlockingException::host(line)
            };
            match parsed {
                Ok(exception) => Some(exception),
                Err(err) => {
                    log::debug!("dropping stored exception: {}", err);
                    None
                }
            }
        })
        .collect()
}

/// Text form of a set of exceptions, readable by [`parse_exceptions`].
pub fn format_exceptions<'a>(
    exceptions: impl IntoIterator<Item = &'a BlockingException>,
) -> String {
    let mut out = String::new();
    for exception in exceptions {
        match exception.kind {
            ExceptionKind::Host => {
                let _ = writeln!(out, "{}", exception.source);
            }
            ExceptionKind::Page => {
                let _ = writeln!(out, "{}/", exception.source);
            }
        }
    }
    out
}

/// Filter rules that match the exempt hosts and pages over http and https.
///
/// Returns None for an empty set.
pub fn exceptions_to_rules<'a>(
    exceptions: impl IntoIterator<Item = &'a BlockingException>,
) -> Option<String> {
    let mut rules = String::new();
    for exception in exceptions {
        let _ = writeln!(rules, "|http://{}^", exception.source);
        let _ = writeln!(rules, "|https://{}^", exception.source);
    }
    if rules.is_empty() {
        None
    } else {
        Some(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_exceptions() {
        let cases = [
            ("example.com", "example.com"),
            (" example.com ", "example.com"),
            ("example.com/foo", "example.com"),
            ("http://example.com/foo/bar?query=text", "example.com"),
            ("https://example.com/foo/bar?query=text", "example.com"),
            ("google-analytics.com/analytics.js", "google-analytics.com"),
        ];
        for (url, expected) in cases {
            let exception = BlockingException::host(url).unwrap();
            assert_eq!(exception.kind, ExceptionKind::Host);
            assert_eq!(exception.source, expected, "input {:?}", url);
        }
    }

    #[test]
    fn page_exceptions() {
        let cases = [
            ("example.com/about", "example.com/about"),
            (" example.com/about/ ", "example.com/about"),
            ("https://example.com/foo/bar/?query=text", "example.com/foo/bar"),
            ("google-analytics.com/analytics.js", "google-analytics.com/analytics.js"),
            ("example.com", "example.com"),
        ];
        for (url, expected) in cases {
            let exception = BlockingException::page(url).unwrap();
            assert_eq!(exception.kind, ExceptionKind::Page);
            assert_eq!(exception.source, expected, "input {:?}", url);
        }
    }

    #[test]
    fn urls_without_host_are_rejected() {
        for url in ["", "/bar/foo", " /bar/foo ", " ?&^^%*^^(*&&*(^*^%^$%#^%&(*)*)"] {
            assert!(matches!(BlockingException::host(url), Err(EngineError::InvalidUrl(_))));
            assert!(matches!(BlockingException::page(url), Err(EngineError::InvalidUrl(_))));
        }
    }

    #[test]
    fn converts_to_rules() {
        let host = BlockingException::host("https://foo.bar.com").unwrap();
        assert_eq!(
            exceptions_to_rules([&host]).unwrap(),
            "|http://foo.bar.com^\n|https://foo.bar.com^\n"
        );

        let page = BlockingException::page("foo.bar.com/contact/external?type=phone").unwrap();
        assert_eq!(
            exceptions_to_rules([&page]).unwrap(),
            "|http://foo.bar.com/contact/external^\n|https://foo.bar.com/contact/external^\n"
        );

        assert!(exceptions_to_rules(&BTreeSet::new()).is_none());
    }

    #[test]
    fn text_form_keeps_kinds() {
        let mut set = BTreeSet::new();
        set.insert(BlockingException::host("example.com").unwrap());
        set.insert(BlockingException::page("example.org/news").unwrap());

        let text = format_exceptions(&set);
        assert_eq!(text, "example.com\nexample.org/news/\n");
        assert_eq!(parse_exceptions(&text), set);
        assert!(parse_exceptions("\n  \n/no/host\n").is_empty());
    }
}
