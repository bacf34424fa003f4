//! Blocking provider
//!
//! Combines the blocking lists with an optional exception list. A request
//! is blocked when any blocking list blocks it, unless the page it comes
//! from matches the exception list.

use parking_lot::RwLock;

use tb_core::matcher::FilterRuleSet;
use tb_core::types::{MatchVerdict, RequestContext};
use tb_core::url::extract_host;

use crate::config::EngineConfig;
use crate::decision::MatchDecisionService;
use crate::error::EngineError;
use crate::registry::EngineRegistry;

#[derive(Debug, Default)]
pub struct BlockingProvider {
    /// Held for writing while both registries are swapped together
    gate: RwLock<()>,
    blocking: EngineRegistry,
    exceptions: EngineRegistry,
    decisions: MatchDecisionService,
}

impl BlockingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            decisions: MatchDecisionService::new(config),
            ..Self::default()
        }
    }

    /// Replace all blocking lists and the exception list.
    ///
    /// Everything is compiled first; on failure the previous rules stay.
    pub fn set_rules(
        &self,
        blocking_rules: &[&str],
        exception_rules: Option<&str>,
    ) -> Result<(), EngineError> {
        let blocking = compile_all(blocking_rules)?;
        let exceptions = match exception_rules {
            Some(text) => vec![tb_compiler::compile(text)?],
            None => Vec::new(),
        };

        let _gate = self.gate.write();
        self.blocking.replace_with(blocking);
        self.exceptions.replace_with(exceptions);
        log::info!(
            "blocking provider ready: {} blocker(s) active, exceptions {}",
            self.blocking.len(),
            if self.exceptions.is_initialized() { "on" } else { "off" }
        );
        Ok(())
    }

    /// True when `url` should be blocked.
    pub fn check_is_url_blocked(
        &self,
        url: &str,
        source_url: Option<&str>,
        resource_type: Option<&str>,
    ) -> bool {
        self.check(url, source_url, resource_type).matched
    }

    /// Full verdict for `url` requested by the page at `source_url`.
    ///
    /// With no blocking lists loaded nothing is blocked.
    pub fn check(
        &self,
        url: &str,
        source_url: Option<&str>,
        resource_type: Option<&str>,
    ) -> MatchVerdict {
        let request_host = extract_host(url).unwrap_or("");
        let source_host = source_url.and_then(extract_host).unwrap_or("");

        let _gate = self.gate.read();

        if let Some(source_url) = source_url.filter(|s| !s.trim().is_empty()) {
            if self.is_exempt(source_url, source_host, resource_type) {
                log::debug!("{} is on the exception list", source_url);
                return MatchVerdict {
                    saved_by_exception: true,
                    ..MatchVerdict::default()
                };
            }
        }

        let request = RequestContext {
            resource_url: url,
            source_url: source_url.unwrap_or(""),
            resource_type,
            request_host,
            source_host,
        };
        match self.decisions.evaluate(&request, &self.blocking) {
            Ok(verdict) => verdict,
            Err(EngineError::Uninitialized) => MatchVerdict::default(),
            Err(err) => {
                log::warn!("blocking check failed: {}", err);
                MatchVerdict::default()
            }
        }
    }

    /// The exception list blocks a page exactly when the page is exempt.
    fn is_exempt(&self, source_url: &str, source_host: &str, resource_type: Option<&str>) -> bool {
        let page = RequestContext {
            resource_url: source_url,
            source_url: "",
            resource_type,
            request_host: source_host,
            source_host: "",
        };
        self.decisions
            .evaluate(&page, &self.exceptions)
            .map(|verdict| verdict.matched)
            .unwrap_or(false)
    }

    /// Number of active blocking lists.
    pub fn blocker_count(&self) -> usize {
        self.blocking.len()
    }

    pub fn has_exceptions(&self) -> bool {
        self.exceptions.is_initialized()
    }

    /// Drop all rules.
    pub fn close(&self) {
        let _gate = self.gate.write();
        self.blocking.clear();
        self.exceptions.clear();
    }
}

fn compile_all(texts: &[&str]) -> Result<Vec<FilterRuleSet>, EngineError> {
    texts
        .iter()
        .map(|text| tb_compiler::compile(text).map_err(EngineError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exceptions::{exceptions_to_rules, BlockingException};

    const ADS: &str = "||ads.net^\n||tracker.org/pixel^\n";

    #[test]
    fn nothing_loaded_blocks_nothing() {
        let provider = BlockingProvider::new();
        assert!(!provider.check_is_url_blocked("https://ads.net/x.js", None, None));
    }

    #[test]
    fn blocks_from_any_list() {
        let provider = BlockingProvider::new();
        provider.set_rules(&["||other.com^", ADS], None).unwrap();
        assert_eq!(provider.blocker_count(), 2);

        let site = Some("https://site.com/");
        assert!(provider.check_is_url_blocked("https://ads.net/x.js", site, None));
        let pixel = "https://tracker.org/pixel?id=1";
        assert!(provider.check_is_url_blocked(pixel, None, Some("image")));
        assert!(!provider.check_is_url_blocked("https://site.com/app.js", site, None));
    }

    #[test]
    fn exception_page_is_never_blocked() {
        let exceptions = [
            BlockingException::host("news.example.com").unwrap(),
            BlockingException::page("https://shop.example.com/checkout").unwrap(),
        ];
        let exception_rules = exceptions_to_rules(&exceptions).unwrap();

        let provider = BlockingProvider::new();
        provider.set_rules(&[ADS], Some(exception_rules.as_str())).unwrap();
        assert!(provider.has_exceptions());

        let page = Some("https://news.example.com/today");
        let verdict = provider.check("https://ads.net/x.js", page, None);
        assert!(!verdict.matched);
        assert!(verdict.saved_by_exception);

        assert!(!provider.check_is_url_blocked(
            "https://ads.net/x.js",
            Some("http://shop.example.com/checkout/step2"),
            None
        ));
        assert!(provider.check_is_url_blocked(
            "https://ads.net/x.js",
            Some("https://shop.example.com/catalog"),
            None
        ));
        assert!(provider.check_is_url_blocked("https://ads.net/x.js", Some(""), None));
    }

    #[test]
    fn set_rules_replaces_and_close_clears() {
        let provider = BlockingProvider::new();
        provider.set_rules(&[ADS], None).unwrap();
        provider.set_rules(&["||other.com^"], None).unwrap();
        assert!(!provider.check_is_url_blocked("https://ads.net/x.js", None, None));
        assert!(provider.check_is_url_blocked("https://other.com/", None, None));

        provider.close();
        assert_eq!(provider.blocker_count(), 0);
        assert!(!provider.check_is_url_blocked("https://other.com/", None, None));
    }
}
