//! Rule Set Builder
//!
//! Turns parsed rules into a `FilterRuleSet`: hostname rules go into the
//! domain table, pattern rules are compiled to op programs and indexed by
//! their rarest token.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, TryReserveError};

use tb_core::hash::{hash_domain, hash_token_bytes};
use tb_core::index::{PatternOp, PatternProgram, RuleEntry, RuleIndex};
use tb_core::matcher::FilterRuleSet;
use tb_core::types::RuleFlags;
use tb_core::url::MIN_TOKEN_LEN;

use crate::parser::{AnchorType, ParsedRule};

/// Build a matchable rule set from parsed (and usually optimized) rules.
///
/// Rule ids are positions in `rules`, so earlier rules win ties.
pub fn build_rule_set(rules: &[ParsedRule]) -> Result<FilterRuleSet, TryReserveError> {
    let mut index = RuleIndex::default();
    index.rules.try_reserve_exact(rules.len())?;

    for (rule_id, rule) in rules.iter().enumerate() {
        let rule_id = rule_id as u32;
        let match_case = rule.flags.contains(RuleFlags::MATCH_CASE);

        let pattern = rule.pattern.as_deref().map(|pattern| {
            compile_pattern(
                pattern,
                rule.anchor_type,
                rule.flags.contains(RuleFlags::HAS_RIGHT_ANCHOR),
                match_case,
            )
        });

        match &rule.pattern {
            None => {
                push_posting(index.domain_rules.entry(hash_domain(&rule.domain)), rule_id)?;
            }
            Some(pattern) => {
                let tokens = extract_pattern_tokens(
                    pattern,
                    rule.anchor_type != AnchorType::None,
                    rule.flags.contains(RuleFlags::HAS_RIGHT_ANCHOR),
                );
                match pick_rarest_token(&index.token_rules, &tokens) {
                    Some(token) => push_posting(index.token_rules.entry(token), rule_id)?,
                    None => {
                        index.fallback_rules.try_reserve(1)?;
                        index.fallback_rules.push(rule_id);
                    }
                }
            }
        }

        index.rules.push(RuleEntry {
            action: rule.action,
            flags: rule.flags,
            type_mask: rule.type_mask,
            party_mask: rule.party_mask,
            scheme_mask: rule.scheme_mask,
            domain_constraints: rule.domain_constraints.clone(),
            pattern,
            redirect: rule.redirect.as_deref().map(redirect_resource_path),
            list_id: rule.list_id,
        });
    }

    log::debug!(
        "built rule set: {} rules, {} hostnames, {} tokens, {} fallback",
        index.rules.len(),
        index.domain_rules.len(),
        index.token_rules.len(),
        index.fallback_rules.len()
    );

    Ok(FilterRuleSet::new(index))
}

fn push_posting<K>(entry: Entry<'_, K, Vec<u32>>, rule_id: u32) -> Result<(), TryReserveError> {
    let postings = entry.or_default();
    postings.try_reserve(1)?;
    postings.push(rule_id);
    Ok(())
}

/// Compile a pattern body into matcher ops.
///
/// Literals are lowercased unless the rule is case-sensitive.
pub fn compile_pattern(
    pattern: &str,
    anchor_type: AnchorType,
    right_anchor: bool,
    match_case: bool,
) -> PatternProgram {
    let mut ops = Vec::new();

    match anchor_type {
        AnchorType::Hostname => ops.push(PatternOp::HostAnchor),
        AnchorType::Left => ops.push(PatternOp::AssertStart),
        AnchorType::None => {}
    }

    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' => {
                emit_literal(&mut ops, &mut literal, match_case);
                if ops.last() != Some(&PatternOp::SkipAny) {
                    ops.push(PatternOp::SkipAny);
                }
            }
            '^' => {
                emit_literal(&mut ops, &mut literal, match_case);
                ops.push(PatternOp::Separator);
            }
            _ => literal.push(ch),
        }
    }
    emit_literal(&mut ops, &mut literal, match_case);

    if right_anchor {
        ops.push(PatternOp::AssertEnd);
    }

    PatternProgram { ops, match_case }
}

fn emit_literal(ops: &mut Vec<PatternOp>, literal: &mut String, match_case: bool) {
    if literal.is_empty() {
        return;
    }
    let text = if match_case {
        std::mem::take(literal)
    } else {
        let lower = literal.to_ascii_lowercase();
        literal.clear();
        lower
    };
    ops.push(PatternOp::Literal(text.into_boxed_str()));
}

/// Hashed tokens of `pattern` that must appear as whole alphanumeric runs in
/// any URL the pattern matches.
///
/// A run qualifies when both of its ends are bounded by a literal
/// non-alphanumeric character, a `^`, or an anchor. A run touching `*` or an
/// unanchored pattern end may be part of a longer run in the URL.
pub fn extract_pattern_tokens(
    pattern: &str,
    left_anchored: bool,
    right_anchored: bool,
) -> Vec<u32> {
    let bytes = pattern.as_bytes();
    let mut tokens = Vec::new();
    let mut token_start = None;

    for i in 0..=bytes.len() {
        let is_alnum = i < bytes.len() && bytes[i].is_ascii_alphanumeric();

        if is_alnum {
            if token_start.is_none() {
                token_start = Some(i);
            }
            continue;
        }

        let start = match token_start.take() {
            Some(start) => start,
            None => continue,
        };
        if i - start < MIN_TOKEN_LEN {
            continue;
        }

        let left_ok = if start == 0 { left_anchored } else { bytes[start - 1] != b'*' };
        let right_ok = if i == bytes.len() { right_anchored } else { bytes[i] != b'*' };
        if left_ok && right_ok {
            tokens.push(hash_token_bytes(&bytes[start..i]));
        }
    }

    tokens
}

/// The token with the shortest posting list so far; ties keep the first.
fn pick_rarest_token(token_rules: &HashMap<u32, Vec<u32>>, tokens: &[u32]) -> Option<u32> {
    tokens
        .iter()
        .copied()
        .min_by_key(|token| token_rules.get(token).map_or(0, Vec::len))
}

/// Map a redirect resource name to the path the host serves it from.
pub fn redirect_resource_path(name: &str) -> String {
    if name.starts_with('/') || name.starts_with("data:") || name.contains("://") {
        return name.to_string();
    }
    if name == "noopjs" {
        return "/redirects/noop.js".to_string();
    }
    if name.starts_with("redirects/") {
        return format!("/{}", name);
    }
    format!("/redirects/{}", name)
}
