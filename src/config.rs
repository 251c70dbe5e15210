//! Connection configuration.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Configuration for one provider connection.
///
/// `provider` is the command used to start the provider executable. It is
/// run through `sh -c`, so it may carry arguments. `version` plays no part
/// in launching; hosts that resolve providers from a registry first keep
/// the requested version here. `provider_config` is the provider's own
/// configuration block as a JSON document shaped like the provider's
/// configuration schema; fields left out are sent as typed nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Command used to start the provider executable.
    pub provider: String,
    /// Requested provider version, for registry resolution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Provider configuration as a JSON document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_config: Option<JsonValue>,
}

impl BridgeConfig {
    /// Configuration launching `provider` with an empty provider
    /// configuration.
    pub fn new(provider: impl Into<String>) -> Self {
        BridgeConfig {
            provider: provider.into(),
            version: None,
            provider_config: None,
        }
    }

    /// Set the requested provider version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the provider configuration document.
    pub fn with_provider_config(mut self, config: JsonValue) -> Self {
        self.provider_config = Some(config);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_config() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"provider": "./terraform-provider-dns"}"#).unwrap();
        assert_eq!(config, BridgeConfig::new("./terraform-provider-dns"));
    }

    #[test]
    fn test_full_config_round_trip() {
        let config = BridgeConfig::new("./terraform-provider-github")
            .with_version("6.2.1")
            .with_provider_config(json!({"owner": "example", "token": "t0ken"}));
        let raw = serde_json::to_string(&config).unwrap();
        let parsed: BridgeConfig = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, config);
        assert_eq!(parsed.version.as_deref(), Some("6.2.1"));
    }
}
