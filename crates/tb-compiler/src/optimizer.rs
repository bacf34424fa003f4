//! Rule list optimizer: drops duplicates and rules cancelled by `$badfilter`.

use std::collections::HashSet;

use crate::parser::{AnchorType, ParsedRule};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    pub before: usize,
    pub after: usize,
    pub deduped: usize,
    pub badfilter_rules: usize,
    pub badfiltered_rules: usize,
}

/// Apply `$badfilter` rules and drop exact duplicates, preserving order.
pub fn optimize_rules(rules: &mut Vec<ParsedRule>) -> OptimizeStats {
    let before = rules.len();
    let mut badfilter_keys: HashSet<BadfilterKey> = HashSet::new();
    let mut badfilter_rules = 0usize;

    for rule in rules.iter() {
        if rule.is_badfilter {
            badfilter_rules += 1;
            badfilter_keys.insert(BadfilterKey::from(rule));
        }
    }

    let mut badfiltered_rules = 0usize;
    if !badfilter_keys.is_empty() {
        rules.retain(|rule| {
            if rule.is_badfilter {
                return false;
            }
            if badfilter_keys.contains(&BadfilterKey::from(rule)) {
                badfiltered_rules += 1;
                return false;
            }
            true
        });
    }

    let mut seen: HashSet<RuleKey> = HashSet::new();
    let mut deduped = 0usize;
    rules.retain(|rule| {
        if seen.insert(RuleKey::from(rule)) {
            true
        } else {
            deduped += 1;
            false
        }
    });

    let after = rules.len();
    if badfiltered_rules > 0 || deduped > 0 {
        log::debug!(
            "optimizer: {} -> {} rules ({} duplicates, {} badfiltered)",
            before,
            after,
            deduped,
            badfiltered_rules
        );
    }

    OptimizeStats {
        before,
        after,
        deduped,
        badfilter_rules,
        badfiltered_rules,
    }
}

/// Identity of a rule within its list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RuleKey {
    list_id: u16,
    filter: BadfilterKey,
}

/// Identity of a rule across lists; a `$badfilter` rule cancels every rule
/// with the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BadfilterKey {
    action: u8,
    flags: u16,
    type_mask: u32,
    party_mask: u8,
    scheme_mask: u8,
    domain: String,
    pattern: Option<String>,
    anchor_type: AnchorType,
    constraint_include: Vec<u64>,
    constraint_exclude: Vec<u64>,
    redirect: Option<String>,
}

impl From<&ParsedRule> for RuleKey {
    fn from(rule: &ParsedRule) -> Self {
        Self {
            list_id: rule.list_id,
            filter: BadfilterKey::from(rule),
        }
    }
}

impl From<&ParsedRule> for BadfilterKey {
    fn from(rule: &ParsedRule) -> Self {
        let (include, exclude) = match &rule.domain_constraints {
            Some(c) => (
                c.include.iter().map(|h| h.to_u64()).collect(),
                c.exclude.iter().map(|h| h.to_u64()).collect(),
            ),
            None => (Vec::new(), Vec::new()),
        };
        Self {
            action: rule.action as u8,
            flags: rule.flags.bits(),
            type_mask: rule.type_mask.bits(),
            party_mask: rule.party_mask.bits(),
            scheme_mask: rule.scheme_mask.bits(),
            domain: rule.domain.clone(),
            pattern: rule.pattern.clone(),
            anchor_type: rule.anchor_type,
            constraint_include: include,
            constraint_exclude: exclude,
            redirect: rule.redirect.clone(),
        }
    }
}
