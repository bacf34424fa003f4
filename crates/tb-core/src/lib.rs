//! TrackerBlock Core Library
//!
//! This crate provides the core matching engine for the TrackerBlock request
//! blocker: URL and domain helpers, the compiled rule-set layout and the
//! matcher that runs a request against it.
//!
//! # Modules
//!
//! - `hash`: Murmur3 hash functions for domain and token hashing
//! - `psl`: registrable-domain (eTLD+1) helpers
//! - `url`: Fast URL parsing without allocations
//! - `resolver`: the pluggable domain-resolution policy
//! - `index`: compiled rule-set layout
//! - `matcher`: Core request matching engine
//! - `types`: Shared type definitions

pub mod hash;
pub mod index;
pub mod matcher;
pub mod psl;
pub mod resolver;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use hash::{hash64, hash_domain, hash_token, Hash64};
pub use matcher::FilterRuleSet;
pub use psl::{get_etld1, is_same_site};
pub use resolver::{DomainResolver, PrefixDomainResolver};
pub use types::{
    MatchQuery, MatchVerdict, PartyMask, RequestContext, RequestType, RuleAction, RuleFlags,
    SchemeMask,
};
pub use url::{extract_domain, resolve_domain};
