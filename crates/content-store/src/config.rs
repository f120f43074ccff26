//! Static store configuration.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Default Kubo RPC address.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:5001";

/// Configuration used to construct the store handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the node's RPC API (without `/api/v0`).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Peer discovery and update subscription flags.
    #[serde(default)]
    pub routing: RoutingConfig,

    /// Remote pinning services, in the order they are tried.
    #[serde(default)]
    pub pinning: Vec<PinServiceConfig>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            routing: RoutingConfig::default(),
            pinning: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Checks the configuration before any connection attempt.
    ///
    /// Fails when the API URL is not http(s) or a required pinning
    /// credential is missing.
    pub fn validate(&self) -> Result<(), StoreError> {
        let url = self.api_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(StoreError::init(format!(
                "api_url must be an http(s) URL, got {:?}",
                self.api_url
            )));
        }

        if self.routing.pubsub && self.routing.topic.trim().is_empty() {
            return Err(StoreError::init("pubsub routing enabled without a topic"));
        }

        for service in &self.pinning {
            if service.endpoint.trim().is_empty() {
                return Err(StoreError::init(format!(
                    "pinning service {} has no endpoint",
                    service.name
                )));
            }
            if service.required && !service.has_token() {
                return Err(StoreError::init(format!(
                    "pinning service {} requires a credential",
                    service.name
                )));
            }
        }

        Ok(())
    }
}

/// Content routing flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Announce new content to the DHT after ingest.
    #[serde(default = "default_true")]
    pub dht: bool,

    /// Publish new identifiers on a pubsub topic. Off by default: the
    /// node must run with `--enable-pubsub-experiment`.
    #[serde(default)]
    pub pubsub: bool,

    /// Topic used for pubsub announcements.
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_true() -> bool {
    true
}

fn default_topic() -> String {
    "umc-landing/deployments".into()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            dht: default_true(),
            pubsub: false,
            topic: default_topic(),
        }
    }
}

/// API flavour spoken by a remote pinning service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PinServiceKind {
    /// IPFS Pinning Service API (`POST /pins`, bearer token).
    Psa,
    /// Hosted Kubo RPC (`POST /pin/add`, basic credentials).
    KuboRpc,
}

/// A remote pinning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinServiceConfig {
    pub name: String,
    pub endpoint: String,
    pub kind: PinServiceKind,
    /// Credential, usually resolved from the environment.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Fail initialization instead of skipping when the token is missing.
    #[serde(default)]
    pub required: bool,
}

impl PinServiceConfig {
    /// Returns `true` when a non-empty credential is present.
    pub fn has_token(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(required: bool, token: Option<&str>) -> PinServiceConfig {
        PinServiceConfig {
            name: "pinata".into(),
            endpoint: "https://api.pinata.cloud/psa".into(),
            kind: PinServiceKind::Psa,
            token: token.map(String::from),
            required,
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = StoreConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.routing.dht);
        assert!(!config.routing.pubsub);
        config.validate().unwrap();
    }

    #[test]
    fn rejects_non_http_api_url() {
        let config = StoreConfig {
            api_url: "/ip4/127.0.0.1/tcp/5001".into(),
            ..StoreConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, StoreError::Initialization { .. }));
    }

    #[test]
    fn missing_required_credential_fails() {
        let config = StoreConfig {
            pinning: vec![service(true, None)],
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());

        let config = StoreConfig {
            pinning: vec![service(true, Some("  "))],
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_optional_credential_is_allowed() {
        let config = StoreConfig {
            pinning: vec![service(false, None)],
            ..StoreConfig::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn pubsub_requires_topic() {
        let config = StoreConfig {
            routing: RoutingConfig {
                pubsub: true,
                topic: String::new(),
                ..RoutingConfig::default()
            },
            ..StoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn token_is_never_serialized() {
        let json = serde_json::to_string(&service(false, Some("secret"))).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"kind\":\"psa\""));
    }
}
