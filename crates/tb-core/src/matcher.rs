//! Core Matching Engine
//!
//! This is the hot path - every request goes through here, once per loaded
//! rule set. Candidates are gathered from the hostname table and the token
//! index, verified against their options and pattern, then reduced to one
//! verdict by precedence.

use crate::hash::hash_domain;
use crate::index::{PatternOp, PatternProgram, RuleEntry, RuleIndex};
use crate::psl::walk_host_suffixes;
use crate::resolver::DomainResolver;
use crate::types::{MatchQuery, MatchVerdict, PartyMask, RuleAction, RuleFlags};
use crate::url::{is_boundary_char, tokenize_url};

// =============================================================================
// FilterRuleSet
// =============================================================================

/// An immutable, matchable rule set compiled from one filter list.
#[derive(Debug, Clone, Default)]
pub struct FilterRuleSet {
    index: RuleIndex,
}

/// Hosts and the domain range resolved once per query.
struct MatchTarget<'q> {
    url: &'q str,
    req_host: &'q str,
    source_host: &'q str,
    domain: (usize, usize),
    query: &'q MatchQuery<'q>,
}

#[derive(Debug)]
struct MatchCandidate {
    rule_id: usize,
    action: RuleAction,
    is_important: bool,
}

impl FilterRuleSet {
    /// Wrap a compiled index.
    pub fn new(index: RuleIndex) -> Self {
        Self { index }
    }

    /// Number of rules in this set.
    pub fn rule_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Read-only view of the compiled index.
    pub fn index(&self) -> &RuleIndex {
        &self.index
    }

    /// Match a request against this rule set.
    ///
    /// `resolver` locates the URL's domain for hostname anchors. It also
    /// stands in for an empty `req_host` / `source_host`.
    pub fn check(&self, query: &MatchQuery<'_>, resolver: &dyn DomainResolver) -> MatchVerdict {
        let (start, end) = resolver.resolve(query.url);
        let domain = match query.url.get(start..end) {
            Some(_) => (start, end),
            None => (0, 0),
        };

        let req_host = if query.req_host.is_empty() {
            resolver.domain(query.url)
        } else {
            query.req_host
        };
        let source_host = if query.source_host.is_empty() {
            resolver.domain(query.source_url)
        } else {
            query.source_host
        };

        let target = MatchTarget {
            url: query.url,
            req_host,
            source_host,
            domain,
            query,
        };

        let mut candidates = Vec::new();
        self.match_domain_rules(&target, &mut candidates);
        self.match_token_rules(&target, &mut candidates);

        let verdict = self.apply_precedence(&candidates);
        if let Some(rule_id) = verdict.rule_id {
            log::trace!(
                "rule {} decided {} (matched={}, saved={})",
                rule_id,
                query.url,
                verdict.matched,
                verdict.saved_by_exception
            );
        }
        verdict
    }

    /// Match against the hostname table, walking request-host suffixes.
    fn match_domain_rules(&self, target: &MatchTarget<'_>, candidates: &mut Vec<MatchCandidate>) {
        if self.index.domain_rules.is_empty() {
            return;
        }

        for suffix in walk_host_suffixes(target.req_host) {
            let rule_ids = match self.index.domain_rules.get(&hash_domain(suffix)) {
                Some(ids) => ids,
                None => continue,
            };
            for &rule_id in rule_ids {
                self.consider(rule_id as usize, target, candidates);
            }
        }
    }

    /// Match against token-indexed and fallback pattern rules.
    fn match_token_rules(&self, target: &MatchTarget<'_>, candidates: &mut Vec<MatchCandidate>) {
        if !self.index.token_rules.is_empty() {
            for token in tokenize_url(target.url) {
                if let Some(rule_ids) = self.index.token_rules.get(&token) {
                    for &rule_id in rule_ids {
                        self.consider(rule_id as usize, target, candidates);
                    }
                }
            }
        }

        for &rule_id in &self.index.fallback_rules {
            self.consider(rule_id as usize, target, candidates);
        }
    }

    fn consider(
        &self,
        rule_id: usize,
        target: &MatchTarget<'_>,
        candidates: &mut Vec<MatchCandidate>,
    ) {
        let rule = match self.index.rules.get(rule_id) {
            Some(rule) => rule,
            None => return,
        };

        if !check_rule_options(rule, target.query)
            || !check_domain_constraints(rule, target.source_host)
        {
            return;
        }

        if let Some(program) = &rule.pattern {
            if !matches_pattern(program, target.url, target.domain) {
                return;
            }
        }

        candidates.push(MatchCandidate {
            rule_id,
            action: rule.action,
            is_important: rule.flags.contains(RuleFlags::IMPORTANT),
        });
    }

    /// Apply precedence rules to determine the final verdict.
    fn apply_precedence(&self, candidates: &[MatchCandidate]) -> MatchVerdict {
        let mut important_allow = None;
        let mut important_block = None;
        let mut allow = None;
        let mut block = None;
        let mut redirect_directive = None;

        for c in candidates {
            let slot = match (c.action, c.is_important) {
                (RuleAction::Allow, true) => &mut important_allow,
                (RuleAction::Allow, false) => &mut allow,
                (RuleAction::Block, true) => &mut important_block,
                (RuleAction::Block, false) => &mut block,
                (RuleAction::RedirectDirective, _) => &mut redirect_directive,
            };
            keep_lowest(slot, c.rule_id);
        }

        // 1. IMPORTANT ALLOW beats everything
        if let Some(rule_id) = important_allow {
            return MatchVerdict {
                saved_by_exception: important_block.or(block).is_some(),
                rule_id: Some(rule_id),
                ..MatchVerdict::default()
            };
        }

        // 2. IMPORTANT BLOCK wins over regular exceptions
        if let Some(rule_id) = important_block {
            return self.blocked(rule_id, redirect_directive);
        }

        // 3. Exception overrides a normal block
        if let (Some(rule_id), Some(_)) = (allow, block) {
            return MatchVerdict {
                saved_by_exception: true,
                rule_id: Some(rule_id),
                ..MatchVerdict::default()
            };
        }

        // 4. Normal block
        if let Some(rule_id) = block {
            return self.blocked(rule_id, redirect_directive);
        }

        MatchVerdict::default()
    }

    fn blocked(&self, rule_id: usize, redirect_directive: Option<usize>) -> MatchVerdict {
        let rule = &self.index.rules[rule_id];
        let redirect = rule.redirect.clone().or_else(|| {
            redirect_directive.and_then(|id| self.index.rules[id].redirect.clone())
        });

        MatchVerdict {
            matched: true,
            explicit_cancel: rule.flags.contains(RuleFlags::EXPLICIT_CANCEL),
            saved_by_exception: false,
            redirect,
            engine_index: None,
            rule_id: Some(rule_id),
        }
    }
}

fn keep_lowest(slot: &mut Option<usize>, rule_id: usize) {
    *slot = Some(slot.map_or(rule_id, |current| current.min(rule_id)));
}

// =============================================================================
// Option Checks
// =============================================================================

/// Check if a rule's type, party and scheme masks accept the request.
fn check_rule_options(rule: &RuleEntry, query: &MatchQuery<'_>) -> bool {
    if !rule.type_mask.is_empty() && !rule.type_mask.intersects(query.request_type) {
        return false;
    }

    if !rule.party_mask.is_empty() {
        let request_party = if query.is_third_party {
            PartyMask::THIRD_PARTY
        } else {
            PartyMask::FIRST_PARTY
        };
        if !rule.party_mask.intersects(request_party) {
            return false;
        }
    }

    if !rule.scheme_mask.is_empty() && !rule.scheme_mask.intersects(query.scheme) {
        return false;
    }

    true
}

/// Check domain constraints ($domain=) against the source host.
fn check_domain_constraints(rule: &RuleEntry, source_host: &str) -> bool {
    let constraints = match &rule.domain_constraints {
        Some(c) => c,
        None => return true,
    };

    if !constraints.include.is_empty() {
        let included = walk_host_suffixes(source_host)
            .any(|suffix| constraints.include.contains(&hash_domain(suffix)));
        if !included {
            return false;
        }
    }

    if !constraints.exclude.is_empty() {
        let excluded = walk_host_suffixes(source_host)
            .any(|suffix| constraints.exclude.contains(&hash_domain(suffix)));
        if excluded {
            return false;
        }
    }

    true
}

// =============================================================================
// Pattern Verification
// =============================================================================

/// Verify a URL against a compiled pattern program.
///
/// `domain` is the resolved domain range, used by `||` anchors.
pub fn matches_pattern(program: &PatternProgram, url: &str, domain: (usize, usize)) -> bool {
    let bytes = url.as_bytes();
    let mut run = PatternRun::new(program, bytes);

    match program.ops.first() {
        Some(PatternOp::AssertStart) => run.match_at(0, 0),
        Some(PatternOp::HostAnchor) => {
            let (start, end) = domain;
            if start >= end || end > bytes.len() {
                return false;
            }
            if run.match_at(1, start) {
                return true;
            }
            (start..end)
                .filter(|&i| bytes[i] == b'.')
                .any(|i| run.match_at(1, i + 1))
        }
        _ => run.match_from(0, 0),
    }
}

/// State of one pattern verification.
///
/// A search for `ops[op..]` that fails from position `p` also fails from
/// every later position, so each op remembers the lowest start that failed
/// and never rescans past it. This keeps `*`-heavy patterns linear in the
/// URL length per op.
struct PatternRun<'a> {
    ops: &'a [PatternOp],
    url: &'a [u8],
    match_case: bool,
    /// Per op; empty when the program has no `*`
    failed_from: Vec<usize>,
}

impl<'a> PatternRun<'a> {
    fn new(program: &'a PatternProgram, url: &'a [u8]) -> Self {
        let failed_from = if program.ops.contains(&PatternOp::SkipAny) {
            vec![usize::MAX; program.ops.len()]
        } else {
            Vec::new()
        };

        Self {
            ops: &program.ops,
            url,
            match_case: program.match_case,
            failed_from,
        }
    }

    /// Match `ops[op..]` starting exactly at `pos`.
    fn match_at(&mut self, op: usize, pos: usize) -> bool {
        let ops = self.ops;
        let current = match ops.get(op) {
            Some(current) => current,
            None => return true,
        };

        match current {
            PatternOp::Literal(lit) => {
                literal_at(self.url, pos, lit.as_bytes(), self.match_case)
                    && self.match_at(op + 1, pos + lit.len())
            }
            PatternOp::SkipAny => self.match_from(op + 1, pos),
            PatternOp::Separator => match self.url.get(pos) {
                None => self.match_at(op + 1, pos),
                Some(&b) if is_boundary_char(b) => self.match_at(op + 1, pos + 1),
                Some(_) => false,
            },
            PatternOp::AssertStart => pos == 0 && self.match_at(op + 1, pos),
            PatternOp::AssertEnd => pos == self.url.len() && self.match_at(op + 1, pos),
            // Only meaningful as the first op
            PatternOp::HostAnchor => self.match_at(op + 1, pos),
        }
    }

    /// Match `ops[op..]` starting anywhere at or after `from`.
    fn match_from(&mut self, op: usize, from: usize) -> bool {
        let ops = self.ops;
        let current = match ops.get(op) {
            Some(current) => current,
            None => return true,
        };

        let limit = self
            .failed_from
            .get(op)
            .copied()
            .unwrap_or(usize::MAX)
            .min(self.url.len() + 1);
        if from >= limit {
            return false;
        }

        let found = match current {
            PatternOp::Literal(lit) => {
                let needle = lit.as_bytes();
                let mut start = from;
                let mut found = false;
                while let Some(pos) = find_from(self.url, needle, start, self.match_case) {
                    if pos >= limit {
                        break;
                    }
                    if self.match_at(op + 1, pos + needle.len()) {
                        found = true;
                        break;
                    }
                    start = pos + 1;
                }
                found
            }
            _ => (from..limit).any(|pos| self.match_at(op, pos)),
        };

        if !found {
            if let Some(failed) = self.failed_from.get_mut(op) {
                *failed = from;
            }
        }
        found
    }
}

#[inline]
fn literal_at(url: &[u8], pos: usize, lit: &[u8], mc: bool) -> bool {
    match url.get(pos..pos + lit.len()) {
        Some(window) if mc => window == lit,
        Some(window) => window.eq_ignore_ascii_case(lit),
        None => false,
    }
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize, mc: bool) -> Option<usize> {
    if needle.len() + from > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| literal_at(haystack, i, needle, mc))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::index::DomainConstraint;
    use crate::resolver::PrefixDomainResolver;
    use crate::types::{RequestType, SchemeMask};
    use crate::url::extract_domain;

    fn lit(s: &str) -> PatternOp {
        PatternOp::Literal(s.into())
    }

    fn program(ops: Vec<PatternOp>) -> PatternProgram {
        PatternProgram { ops, match_case: false }
    }

    fn matches(ops: Vec<PatternOp>, url: &str) -> bool {
        matches_pattern(&program(ops), url, extract_domain(url))
    }

    fn entry(action: RuleAction, pattern: Option<PatternProgram>) -> RuleEntry {
        RuleEntry {
            action,
            flags: RuleFlags::empty(),
            type_mask: RequestType::empty(),
            party_mask: PartyMask::empty(),
            scheme_mask: SchemeMask::empty(),
            domain_constraints: None,
            pattern,
            redirect: None,
            list_id: 0,
        }
    }

    fn query(url: &str) -> MatchQuery<'_> {
        MatchQuery {
            url,
            source_url: "https://site.example/",
            req_host: "",
            source_host: "site.example",
            is_third_party: true,
            request_type: RequestType::SCRIPT,
            scheme: SchemeMask::HTTPS,
        }
    }

    #[test]
    fn test_unanchored_literal() {
        assert!(matches(vec![lit("/banner/")], "https://example.com/banner/ad.png"));
        assert!(!matches(vec![lit("/banner/")], "https://example.com/banners/ad.png"));
    }

    #[test]
    fn test_literal_is_case_insensitive_by_default() {
        assert!(matches(vec![lit("/banner/")], "https://example.com/BANNER/ad.png"));

        let strict = PatternProgram { ops: vec![lit("/Banner/")], match_case: true };
        let url = "https://example.com/banner/ad.png";
        assert!(!matches_pattern(&strict, url, extract_domain(url)));
    }

    #[test]
    fn test_separator_backtracks_to_later_occurrence() {
        // First "ads" is followed by 'x'; the second one is followed by '/'.
        let ops = vec![lit("ads"), PatternOp::Separator];
        assert!(matches(ops, "https://example.com/adsx/ads/1"));
    }

    #[test]
    fn test_separator_and_wildcard_backtrack_together() {
        let ops = vec![
            lit("ads"),
            PatternOp::Separator,
            PatternOp::SkipAny,
            lit("track"),
            PatternOp::Separator,
        ];
        // The first "ads" fails its separator; the second one leads to a match.
        assert!(matches(ops.clone(), "https://x.com/adsx/ads/y/track/1"));
        // The first "track" after "ads/" fails its separator; a later one matches.
        assert!(matches(ops.clone(), "https://x.com/ads/track-x/track?id=1"));
        assert!(matches(ops.clone(), "https://x.com/ads/track"));
        assert!(!matches(ops.clone(), "https://x.com/ads/trackers"));
        assert!(!matches(ops, "https://x.com/adsx/track/"));
    }

    #[test]
    fn test_many_wildcards_stay_fast() {
        let mut ops = Vec::new();
        for _ in 0..8 {
            ops.push(lit("a"));
            ops.push(PatternOp::SkipAny);
        }
        ops.push(lit("b"));

        let miss = format!("https://x.com/{}", "a".repeat(2_000));
        let hit = format!("{}b", miss);

        let started = Instant::now();
        assert!(!matches(ops.clone(), &miss));
        assert!(matches(ops, &hit));
        assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    }

    #[test]
    fn test_separator_matches_end_of_url() {
        assert!(matches(vec![lit("/track"), PatternOp::Separator], "https://example.com/track"));
        assert!(!matches(vec![lit("/track"), PatternOp::Separator], "https://example.com/tracker"));
    }

    #[test]
    fn test_wildcard() {
        let ops = vec![lit("/ads/"), PatternOp::SkipAny, lit(".gif")];
        assert!(matches(ops.clone(), "https://example.com/ads/x/y/z.gif"));
        assert!(!matches(ops, "https://example.com/ads/x/y/z.png"));
    }

    #[test]
    fn test_start_and_end_anchors() {
        let ops = vec![PatternOp::AssertStart, lit("https://example.com/")];
        assert!(matches(ops.clone(), "https://example.com/x"));
        assert!(!matches(ops, "http://evil.test/?https://example.com/"));

        let ops = vec![lit(".swf"), PatternOp::AssertEnd];
        assert!(matches(ops.clone(), "https://example.com/movie.swf"));
        assert!(!matches(ops, "https://example.com/movie.swf?x=1"));
    }

    #[test]
    fn test_host_anchor() {
        let ops = vec![PatternOp::HostAnchor, lit("example.com/ads")];
        assert!(matches(ops.clone(), "https://example.com/ads/1"));
        assert!(matches(ops.clone(), "https://cdn.example.com/ads/1"));
        assert!(!matches(ops.clone(), "https://badexample.com/ads/1"));
        assert!(!matches(ops, "https://other.com/example.com/ads"));
    }

    #[test]
    fn test_host_anchor_needs_domain() {
        let ops = vec![PatternOp::HostAnchor, lit("example.com")];
        assert!(!matches_pattern(&program(ops), "https://example.com", (0, 0)));
    }

    #[test]
    fn test_precedence_exception_saves_request() {
        let mut index = RuleIndex::default();
        index.rules.push(entry(RuleAction::Block, Some(program(vec![lit("/ads/")]))));
        index.rules.push(entry(RuleAction::Allow, Some(program(vec![lit("/ads/allowed")]))));
        index.fallback_rules = vec![0, 1];
        let set = FilterRuleSet::new(index);

        let verdict = set.check(&query("https://example.com/ads/banner"), &PrefixDomainResolver);
        assert!(verdict.matched);
        assert_eq!(verdict.rule_id, Some(0));

        let allowed = query("https://example.com/ads/allowed.js");
        let verdict = set.check(&allowed, &PrefixDomainResolver);
        assert!(!verdict.matched);
        assert!(verdict.saved_by_exception);
        assert_eq!(verdict.rule_id, Some(1));
    }

    #[test]
    fn test_precedence_important_block_beats_exception() {
        let mut index = RuleIndex::default();
        let mut important = entry(RuleAction::Block, Some(program(vec![lit("/ads/")])));
        important.flags = RuleFlags::IMPORTANT | RuleFlags::EXPLICIT_CANCEL;
        index.rules.push(important);
        index.rules.push(entry(RuleAction::Allow, Some(program(vec![lit("/ads/")]))));
        index.fallback_rules = vec![0, 1];
        let set = FilterRuleSet::new(index);

        let verdict = set.check(&query("https://example.com/ads/x"), &PrefixDomainResolver);
        assert!(verdict.matched);
        assert!(verdict.explicit_cancel);
        assert!(!verdict.saved_by_exception);
    }

    #[test]
    fn test_domain_table_and_constraints() {
        let mut index = RuleIndex::default();
        let mut rule = entry(RuleAction::Block, None);
        rule.domain_constraints = Some(DomainConstraint {
            include: vec![hash_domain("site.example")],
            exclude: vec![],
        });
        index.rules.push(rule);
        index.domain_rules = HashMap::from([(hash_domain("tracker.net"), vec![0])]);
        let set = FilterRuleSet::new(index);

        // req_host falls back to the resolved domain
        let verdict = set.check(&query("https://px.tracker.net/p.gif"), &PrefixDomainResolver);
        assert!(verdict.matched);

        let mut other_site = query("https://px.tracker.net/p.gif");
        other_site.source_host = "elsewhere.example";
        assert!(!set.check(&other_site, &PrefixDomainResolver).matched);
    }

    #[test]
    fn test_options_filter_candidates() {
        let mut index = RuleIndex::default();
        let mut rule = entry(RuleAction::Block, Some(program(vec![lit("/pixel")])));
        rule.type_mask = RequestType::IMAGE;
        rule.party_mask = PartyMask::THIRD_PARTY;
        index.rules.push(rule);
        index.fallback_rules = vec![0];
        let set = FilterRuleSet::new(index);

        let mut q = query("https://cdn.example/pixel.gif");
        assert!(!set.check(&q, &PrefixDomainResolver).matched);
        q.request_type = RequestType::IMAGE;
        assert!(set.check(&q, &PrefixDomainResolver).matched);
        q.is_third_party = false;
        assert!(!set.check(&q, &PrefixDomainResolver).matched);
    }

    #[test]
    fn test_redirect_directive_applies_to_block() {
        let mut index = RuleIndex::default();
        index.rules.push(entry(RuleAction::Block, Some(program(vec![lit("/ads.js")]))));
        let ads_js = Some(program(vec![lit("/ads.js")]));
        let mut directive = entry(RuleAction::RedirectDirective, ads_js);
        directive.redirect = Some("/redirects/noop.js".to_string());
        index.rules.push(directive);
        index.fallback_rules = vec![0, 1];
        let set = FilterRuleSet::new(index);

        let verdict = set.check(&query("https://example.com/ads.js"), &PrefixDomainResolver);
        assert!(verdict.matched);
        assert_eq!(verdict.redirect.as_deref(), Some("/redirects/noop.js"));
    }

    #[test]
    fn test_redirect_directive_alone_does_not_block() {
        let mut index = RuleIndex::default();
        let ads_js = Some(program(vec![lit("/ads.js")]));
        let mut directive = entry(RuleAction::RedirectDirective, ads_js);
        directive.redirect = Some("/redirects/noop.js".to_string());
        index.rules.push(directive);
        index.fallback_rules = vec![0];
        let set = FilterRuleSet::new(index);

        assert_eq!(
            set.check(&query("https://example.com/ads.js"), &PrefixDomainResolver),
            MatchVerdict::default()
        );
    }
}
