//! Engine Registry
//!
//! Owns the ordered collection of compiled rule sets for one blocker
//! instance. Readers share a read lock; loading and clearing take the write
//! lock. Rule text is compiled before the lock is taken, so a failed
//! compilation never leaves a partial state behind.
//!
//! The registry also owns the domain-resolution policy. The injected
//! resolver is installed when the first rule set arrives and uninstalled
//! when the last one goes; readers only ever see it through
//! [`EngineRegistry::with_engines`], which is `None` while empty.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use tb_compiler::CompileError;
use tb_core::matcher::FilterRuleSet;
use tb_core::resolver::{DomainResolver, PrefixDomainResolver};

use crate::error::EngineError;

pub struct EngineRegistry {
    resolver: Arc<dyn DomainResolver>,
    state: RwLock<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    engines: Vec<FilterRuleSet>,
    /// Some exactly while `engines` is non-empty
    active_resolver: Option<Arc<dyn DomainResolver>>,
}

impl RegistryState {
    fn sync_resolver(&mut self, resolver: &Arc<dyn DomainResolver>) {
        match (self.engines.is_empty(), self.active_resolver.is_some()) {
            (false, false) => {
                self.active_resolver = Some(Arc::clone(resolver));
                log::info!("domain resolver installed");
            }
            (true, true) => {
                self.active_resolver = None;
                log::info!("domain resolver uninstalled");
            }
            _ => {}
        }
    }
}

impl EngineRegistry {
    /// An empty registry using the default prefix-based resolver.
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(PrefixDomainResolver))
    }

    /// An empty registry that will install `resolver` once rules arrive.
    pub fn with_resolver(resolver: Arc<dyn DomainResolver>) -> Self {
        Self {
            resolver,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Compile `rule_text` and append it as a new rule set.
    ///
    /// Malformed lines are skipped by the compiler; only resource exhaustion
    /// fails, and then the registry is unchanged.
    pub fn add_rules(&self, rule_text: &str) -> Result<(), EngineError> {
        let set = tb_compiler::compile(rule_text).map_err(log_compile_failure)?;
        self.add_rule_set(set)
    }

    /// Like [`add_rules`](Self::add_rules) for raw bytes, which must be UTF-8.
    pub fn add_rule_bytes(&self, bytes: &[u8]) -> Result<(), EngineError> {
        let set = tb_compiler::compile_bytes(bytes).map_err(log_compile_failure)?;
        self.add_rule_set(set)
    }

    /// Append an already compiled rule set.
    pub fn add_rule_set(&self, set: FilterRuleSet) -> Result<(), EngineError> {
        let mut state = self.state.write();
        state
            .engines
            .try_reserve(1)
            .map_err(|e| EngineError::Compile(CompileError::from(e)))?;

        log::debug!(
            "loaded rule set #{} with {} rules",
            state.engines.len(),
            set.rule_count()
        );
        state.engines.push(set);
        state.sync_resolver(&self.resolver);
        Ok(())
    }

    /// Compile every list, then swap the whole collection at once.
    ///
    /// On failure the current collection is kept.
    pub fn replace_all(&self, rule_texts: &[&str]) -> Result<(), EngineError> {
        let mut sets = Vec::new();
        sets.try_reserve_exact(rule_texts.len())
            .map_err(|e| EngineError::Compile(CompileError::from(e)))?;
        for text in rule_texts {
            sets.push(tb_compiler::compile(text).map_err(log_compile_failure)?);
        }
        self.replace_with(sets);
        Ok(())
    }

    /// Swap in `sets` as the whole collection.
    pub fn replace_with(&self, sets: Vec<FilterRuleSet>) {
        let previous = {
            let mut state = self.state.write();
            let previous = std::mem::replace(&mut state.engines, sets);
            state.sync_resolver(&self.resolver);
            log::info!("{} rule set(s) active", state.engines.len());
            previous
        };
        // Release the old sets outside the lock
        drop(previous);
    }

    /// Drop every rule set and uninstall the resolver. Idempotent.
    pub fn clear(&self) {
        let previous = {
            let mut state = self.state.write();
            let previous = std::mem::take(&mut state.engines);
            state.sync_resolver(&self.resolver);
            previous
        };
        if !previous.is_empty() {
            log::info!("cleared {} rule set(s)", previous.len());
        }
    }

    /// True while at least one rule set is loaded.
    pub fn is_initialized(&self) -> bool {
        !self.state.read().engines.is_empty()
    }

    /// Number of loaded rule sets.
    pub fn len(&self) -> usize {
        self.state.read().engines.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_initialized()
    }

    /// Total number of rules across all loaded sets.
    pub fn rule_count(&self) -> usize {
        self.state.read().engines.iter().map(FilterRuleSet::rule_count).sum()
    }

    /// The resolver this registry installs. Usable whether or not rules are
    /// loaded.
    pub fn resolver(&self) -> &dyn DomainResolver {
        self.resolver.as_ref()
    }

    /// Run `f` over the loaded rule sets, in load order, with the active
    /// resolver. Returns None when nothing is loaded.
    ///
    /// The read lock is held for the duration of `f`.
    pub fn with_engines<R>(
        &self,
        f: impl FnOnce(&[FilterRuleSet], &dyn DomainResolver) -> R,
    ) -> Option<R> {
        let state = self.state.read();
        let resolver = state.active_resolver.as_deref()?;
        Some(f(&state.engines, resolver))
    }
}

impl Default for EngineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("EngineRegistry")
            .field("engines", &state.engines.len())
            .field("resolver_installed", &state.active_resolver.is_some())
            .finish()
    }
}

fn log_compile_failure(err: CompileError) -> EngineError {
    log::warn!("rule compilation failed: {}", err);
    EngineError::Compile(err)
}
