//! Domain resolution policy
//!
//! The matcher never extracts a URL's domain on its own; it asks the
//! [`DomainResolver`] it is handed. The registry owns the single active
//! resolver and passes it into every match query.

use crate::url::extract_domain;

/// Locates the domain of a URL as a byte range into that URL.
pub trait DomainResolver: Send + Sync {
    /// Half-open `(start, end)` byte range of the domain within `url`.
    fn resolve(&self, url: &str) -> (usize, usize);

    /// The resolved domain as a slice of `url`.
    ///
    /// Out-of-range or non-boundary results from a custom resolver yield "".
    fn domain<'u>(&self, url: &'u str) -> &'u str {
        let (start, end) = self.resolve(url);
        url.get(start..end).unwrap_or("")
    }
}

/// The default policy: skip a literal `http://` or `https://` prefix and stop
/// at the first `/`, `?` or `:`. See [`extract_domain`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixDomainResolver;

impl DomainResolver for PrefixDomainResolver {
    #[inline]
    fn resolve(&self, url: &str) -> (usize, usize) {
        extract_domain(url)
    }
}

impl<F> DomainResolver for F
where
    F: Fn(&str) -> (usize, usize) + Send + Sync,
{
    #[inline]
    fn resolve(&self, url: &str) -> (usize, usize) {
        self(url)
    }
}
