//! TrackerBlock Filter List Compiler
//!
//! This crate compiles ABP/uBO network filter lists into matchable
//! [`FilterRuleSet`]s: `parser` turns lines into rules, `optimizer` applies
//! `$badfilter` and removes duplicates, `builder` produces the index.
//!
//! Compilation is lenient. Lines that cannot be understood are skipped, so
//! the only failures are unusable input as a whole.

use std::collections::TryReserveError;
use std::str::Utf8Error;

use thiserror::Error;

use tb_core::matcher::FilterRuleSet;

pub mod builder;
pub mod optimizer;
pub mod parser;

pub use builder::build_rule_set;
pub use optimizer::{optimize_rules, OptimizeStats};
pub use parser::{parse_filter_list, AnchorType, ParsedList, ParsedRule};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("filter list is not valid UTF-8: {0}")]
    InvalidEncoding(#[from] Utf8Error),

    #[error("not enough memory to build the rule index")]
    ResourceExhausted(#[from] TryReserveError),
}

/// Counters describing one compilation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileStats {
    /// Network rules parsed from the input
    pub parsed: usize,
    /// Comment, header and cosmetic lines
    pub ignored: usize,
    /// Lines with unsupported or malformed syntax
    pub skipped: usize,
    pub optimize: OptimizeStats,
    pub domain_entries: usize,
    pub token_entries: usize,
    pub fallback_rules: usize,
}

/// Compile one filter list.
pub fn compile(text: &str) -> Result<FilterRuleSet, CompileError> {
    compile_with_stats(text).map(|(set, _)| set)
}

/// Compile one filter list given as raw bytes.
pub fn compile_bytes(bytes: &[u8]) -> Result<FilterRuleSet, CompileError> {
    compile(std::str::from_utf8(bytes)?)
}

/// Compile one filter list and report what happened to its lines.
pub fn compile_with_stats(text: &str) -> Result<(FilterRuleSet, CompileStats), CompileError> {
    compile_lists_with_stats(&[text])
}

/// Merge several filter lists into a single rule set.
///
/// Each rule remembers the position of its list; `$badfilter` rules apply
/// across lists.
pub fn compile_lists(texts: &[&str]) -> Result<FilterRuleSet, CompileError> {
    compile_lists_with_stats(texts).map(|(set, _)| set)
}

fn compile_lists_with_stats(texts: &[&str]) -> Result<(FilterRuleSet, CompileStats), CompileError> {
    let mut stats = CompileStats::default();
    let mut all_rules = Vec::new();

    for (list_id, text) in texts.iter().enumerate() {
        let parsed = parse_filter_list(text);
        stats.parsed += parsed.rules.len();
        stats.ignored += parsed.ignored;
        stats.skipped += parsed.skipped;

        all_rules.try_reserve(parsed.rules.len())?;
        all_rules.extend(parsed.rules.into_iter().map(|mut rule| {
            rule.list_id = list_id as u16;
            rule
        }));
    }

    stats.optimize = optimize_rules(&mut all_rules);

    let set = build_rule_set(&all_rules)?;
    let index = set.index();
    stats.domain_entries = index.domain_rules.len();
    stats.token_entries = index.token_rules.len();
    stats.fallback_rules = index.fallback_rules.len();

    if stats.skipped > 0 {
        log::debug!("skipped {} unsupported filter lines", stats.skipped);
    }

    Ok((set, stats))
}
