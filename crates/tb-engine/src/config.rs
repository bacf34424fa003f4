//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How a request is classified as third-party.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThirdPartyPolicy {
    /// Third-party whenever the request host differs from the source host
    #[default]
    ExactHost,
    /// Third-party only when the registrable domains (eTLD+1) differ
    SameSite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resource type assumed when the caller supplies none
    pub default_resource_type: String,
    pub third_party: ThirdPartyPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_resource_type: "script".to_string(),
            third_party: ThirdPartyPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(text)?)
    }
}
