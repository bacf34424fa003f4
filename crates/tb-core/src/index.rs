//! Compiled rule index layout
//!
//! This is the in-memory structure the compiler fills and the matcher reads.
//! Rules are addressed by their position in [`RuleIndex::rules`]; every
//! lookup table stores rule ids into that vector.

use std::collections::HashMap;

use crate::hash::Hash64;
use crate::types::{PartyMask, RequestType, RuleAction, RuleFlags, SchemeMask};

/// `$domain=` constraint, as hashed hostnames.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DomainConstraint {
    pub include: Vec<Hash64>,
    pub exclude: Vec<Hash64>,
}

/// One step of a compiled URL pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternOp {
    /// Literal text that must appear at the current position
    Literal(Box<str>),
    /// `*` - any run of characters, possibly empty
    SkipAny,
    /// `^` - one separator character, or the end of the URL
    Separator,
    /// `|` at the start - the match begins at offset 0
    AssertStart,
    /// `|` at the end - the match ends at the end of the URL
    AssertEnd,
    /// `||` - the match begins at the domain start or right after a `.` in it
    HostAnchor,
}

/// A compiled URL pattern.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PatternProgram {
    pub ops: Vec<PatternOp>,
    /// Literals compare case-sensitively ($match-case)
    pub match_case: bool,
}

/// A compiled network rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleEntry {
    pub action: RuleAction,
    pub flags: RuleFlags,
    /// Empty mask matches any request type
    pub type_mask: RequestType,
    /// Empty mask matches any party
    pub party_mask: PartyMask,
    /// Empty mask matches any scheme
    pub scheme_mask: SchemeMask,
    pub domain_constraints: Option<DomainConstraint>,
    /// None for pure hostname rules, which live in the domain table
    pub pattern: Option<PatternProgram>,
    /// Resource path served instead of the blocked content
    pub redirect: Option<String>,
    /// Position of the source list when several lists were merged
    pub list_id: u16,
}

/// The full index of one compiled rule set.
#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    pub rules: Vec<RuleEntry>,
    /// Hostname hash -> rules anchored on exactly that hostname
    pub domain_rules: HashMap<Hash64, Vec<u32>>,
    /// Token hash -> pattern rules indexed under that token
    pub token_rules: HashMap<u32, Vec<u32>>,
    /// Pattern rules without a usable token, checked for every request
    pub fallback_rules: Vec<u32>,
}

impl RuleIndex {
    /// Number of rules in the index.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
