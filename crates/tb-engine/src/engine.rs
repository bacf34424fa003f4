//! Single-Instance Engine
//!
//! `AdBlockEngine` bundles a registry, a domain resolver and the decision
//! service behind the load / clear / should-load / resolve operations.

use std::sync::Arc;

use tb_core::resolver::DomainResolver;
use tb_core::types::{MatchVerdict, RequestContext};

use crate::config::EngineConfig;
use crate::decision::MatchDecisionService;
use crate::error::EngineError;
use crate::registry::EngineRegistry;

/// A blocker instance: the rule sets it has loaded plus the policy used to
/// decide requests against them.
///
/// All operations take `&self`; the instance can be shared between threads.
/// Dropping it releases every loaded rule set.
#[derive(Debug, Default)]
pub struct AdBlockEngine {
    registry: EngineRegistry,
    decisions: MatchDecisionService,
}

impl AdBlockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            registry: EngineRegistry::new(),
            decisions: MatchDecisionService::new(config),
        }
    }

    pub fn with_resolver(resolver: Arc<dyn DomainResolver>, config: EngineConfig) -> Self {
        Self {
            registry: EngineRegistry::with_resolver(resolver),
            decisions: MatchDecisionService::new(config),
        }
    }

    /// Compile `rule_text` and add it as another rule set.
    pub fn load_rules(&self, rule_text: &str) -> Result<(), EngineError> {
        self.registry.add_rules(rule_text)
    }

    /// Release every loaded rule set.
    pub fn clear_rules(&self) {
        self.registry.clear();
    }

    /// Decide whether a resource may be loaded. `true` means allow.
    pub fn should_load(
        &self,
        resource_url: &str,
        current_url: &str,
        resource_type: Option<&str>,
        request_host: &str,
        source_host: &str,
    ) -> Result<bool, EngineError> {
        let request = RequestContext {
            resource_url,
            source_url: current_url,
            resource_type,
            request_host,
            source_host,
        };
        self.decisions.should_allow(&request, &self.registry)
    }

    /// Like [`should_load`](Self::should_load), returning the full verdict.
    pub fn check(&self, request: &RequestContext<'_>) -> Result<MatchVerdict, EngineError> {
        self.decisions.evaluate(request, &self.registry)
    }

    /// The domain of `url` as the matcher sees it. Empty for an empty URL.
    pub fn resolve_domain(&self, url: &str) -> String {
        self.registry.resolver().domain(url).to_string()
    }

    pub fn is_initialized(&self) -> bool {
        self.registry.is_initialized()
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        self.decisions.config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_operations() {
        let engine = AdBlockEngine::new();
        assert_eq!(engine.resolve_domain("http://example.com/path"), "example.com");

        let site = "https://site.com/";
        assert!(matches!(
            engine.should_load("https://ads.net/x.js", site, None, "ads.net", "site.com"),
            Err(EngineError::Uninitialized)
        ));

        engine.load_rules("||ads.net^").unwrap();
        assert!(!engine
            .should_load("https://ads.net/x.js", site, None, "ads.net", "site.com")
            .unwrap());
        assert!(engine
            .should_load("https://cdn.site.com/x.js", site, None, "cdn.site.com", "site.com")
            .unwrap());

        engine.clear_rules();
        assert!(!engine.is_initialized());
    }

    #[test]
    fn resolve_domain_uses_injected_resolver() {
        let whole_url = |url: &str| (0, url.len());
        let engine = AdBlockEngine::with_resolver(Arc::new(whole_url), EngineConfig::default());
        assert_eq!(engine.resolve_domain("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn check_reports_redirects() {
        let engine = AdBlockEngine::new();
        engine.load_rules("||cdn.net/ads.js$redirect=noopjs").unwrap();

        let verdict = engine
            .check(&RequestContext {
                resource_url: "https://cdn.net/ads.js",
                source_url: "https://site.com/",
                resource_type: Some("script"),
                request_host: "cdn.net",
                source_host: "site.com",
            })
            .unwrap();
        assert!(verdict.matched);
        assert_eq!(verdict.redirect.as_deref(), Some("/redirects/noop.js"));
    }
}
