//! Match Decision Service
//!
//! Turns a caller's [`RequestContext`] into a match query and runs it
//! against every loaded rule set in load order. The first rule set that
//! blocks decides; if none does, the request is allowed.

use tb_core::matcher::FilterRuleSet;
use tb_core::psl::is_same_site;
use tb_core::resolver::DomainResolver;
use tb_core::types::{MatchQuery, MatchVerdict, RequestContext, RequestType, SchemeMask};
use tb_core::url::extract_scheme;

use crate::config::{EngineConfig, ThirdPartyPolicy};
use crate::error::EngineError;
use crate::registry::EngineRegistry;

#[derive(Debug, Clone, Default)]
pub struct MatchDecisionService {
    config: EngineConfig,
}

impl MatchDecisionService {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// True when the request may be loaded.
    pub fn should_allow(
        &self,
        request: &RequestContext<'_>,
        registry: &EngineRegistry,
    ) -> Result<bool, EngineError> {
        self.evaluate(request, registry).map(|verdict| verdict.is_allowed())
    }

    /// Full verdict for a request.
    ///
    /// Fails with [`EngineError::Uninitialized`] when no rules are loaded.
    pub fn evaluate(
        &self,
        request: &RequestContext<'_>,
        registry: &EngineRegistry,
    ) -> Result<MatchVerdict, EngineError> {
        let query = self.build_query(request);
        registry
            .with_engines(|engines, resolver| evaluate_engines(&query, engines, resolver))
            .ok_or(EngineError::Uninitialized)
    }

    /// Classify a request as third-party under the configured policy.
    pub fn is_third_party(&self, request_host: &str, source_host: &str) -> bool {
        match self.config.third_party {
            ThirdPartyPolicy::ExactHost => request_host != source_host,
            ThirdPartyPolicy::SameSite => !is_same_site(request_host, source_host),
        }
    }

    /// The request type to match as; a missing or blank tag falls back to
    /// the configured default.
    pub fn request_type(&self, resource_type: Option<&str>) -> RequestType {
        let tag = resource_type
            .filter(|tag| !tag.trim().is_empty())
            .unwrap_or(self.config.default_resource_type.as_str());
        RequestType::from_tag(tag)
    }

    pub fn build_query<'a>(&self, request: &RequestContext<'a>) -> MatchQuery<'a> {
        MatchQuery {
            url: request.resource_url,
            source_url: request.source_url,
            req_host: request.request_host,
            source_host: request.source_host,
            is_third_party: self.is_third_party(request.request_host, request.source_host),
            request_type: self.request_type(request.resource_type),
            scheme: extract_scheme(request.resource_url).unwrap_or(SchemeMask::empty()),
        }
    }
}

/// Query each rule set in order; the first block short-circuits.
///
/// When nothing blocks, the first exception that rescued the request is
/// reported so callers can tell "allowed" from "saved".
pub fn evaluate_engines(
    query: &MatchQuery<'_>,
    engines: &[FilterRuleSet],
    resolver: &dyn DomainResolver,
) -> MatchVerdict {
    let mut saved: Option<MatchVerdict> = None;

    for (engine_index, engine) in engines.iter().enumerate() {
        let mut verdict = engine.check(query, resolver);
        verdict.engine_index = Some(engine_index);

        if verdict.matched {
            log::debug!("blocked {} (rule set #{})", query.url, engine_index);
            return verdict;
        }
        if verdict.saved_by_exception && saved.is_none() {
            saved = Some(verdict);
        }
    }

    saved.unwrap_or_default()
}
