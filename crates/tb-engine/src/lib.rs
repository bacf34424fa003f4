//! TrackerBlock Engine
//!
//! The request-decision layer on top of `tb-core` and `tb-compiler`:
//!
//! - `registry`: ordered, lock-protected collection of compiled rule sets
//!   plus the active domain resolver
//! - `decision`: turns a request into a verdict across all rule sets
//! - `engine`: [`AdBlockEngine`], the four-operation facade
//!   (`load_rules`, `clear_rules`, `should_load`, `resolve_domain`)
//! - `exceptions` / `provider`: user exception lists and the provider that
//!   combines them with blocking lists
//! - `config`: serde-backed engine configuration

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod exceptions;
pub mod provider;
pub mod registry;

pub use config::{EngineConfig, ThirdPartyPolicy};
pub use decision::MatchDecisionService;
pub use engine::AdBlockEngine;
pub use error::EngineError;
pub use exceptions::{
    exceptions_to_rules, format_exceptions, parse_exceptions, BlockingException, ExceptionKind,
};
pub use provider::BlockingProvider;
pub use registry::EngineRegistry;

pub use tb_core::resolver::{DomainResolver, PrefixDomainResolver};
pub use tb_core::types::{MatchVerdict, RequestContext};
