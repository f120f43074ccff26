//! Deployment configuration.
//!
//! Read from `umcdeploy.toml` in the project root (or `--config`). Every
//! field has a default, so the file is optional. Credentials never live
//! in the file: each pinning service names the environment variable
//! holding its token.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Deserializer, Serialize};
use umcdeploy_content_store::{PinServiceConfig, PinServiceKind, RoutingConfig, StoreConfig};
use umcdeploy_publish::DEFAULT_GATEWAYS;

/// Config file looked up in the project root.
pub const CONFIG_FILE: &str = "umcdeploy.toml";

/// Deployment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Build output directory, relative to the project root.
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    /// Command producing the build.
    #[serde(default = "default_build_command")]
    pub build_command: String,

    /// Latest deployment record, relative to the project root.
    #[serde(default = "default_record_path")]
    pub record_path: PathBuf,

    /// Optional append-only history log (one JSON line per publish).
    #[serde(default)]
    pub history_path: Option<PathBuf>,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub deployment: DeploymentSection,
}

/// Store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default = "default_pinning")]
    pub pinning: Vec<PinningEntry>,
}

/// A pinning service as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinningEntry {
    pub name: String,
    pub endpoint: String,
    pub kind: PinServiceKind,
    /// Environment variable holding the credential.
    pub token_env: String,
    /// Overrides the deployment-mode default.
    #[serde(default)]
    pub required: Option<bool>,
}

/// Publish policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSection {
    #[serde(default = "default_true")]
    pub auto_pin: bool,

    /// Gateway base URLs, in display order.
    #[serde(default = "default_gateways")]
    pub gateways: Vec<String>,

    /// ENS name meant to point at the latest deployment. Not updated
    /// automatically. An empty string disables it.
    #[serde(default = "default_ens_domain", deserialize_with = "non_empty")]
    pub ens_domain: Option<String>,
}

fn default_dist_dir() -> PathBuf {
    "dist".into()
}

fn default_build_command() -> String {
    "npm run build".into()
}

fn default_record_path() -> PathBuf {
    "deployment.json".into()
}

fn default_api_url() -> String {
    umcdeploy_content_store::config::DEFAULT_API_URL.into()
}

fn default_pinning() -> Vec<PinningEntry> {
    vec![
        PinningEntry {
            name: "pinata".into(),
            endpoint: "https://api.pinata.cloud/psa".into(),
            kind: PinServiceKind::Psa,
            token_env: "PINATA_TOKEN".into(),
            required: None,
        },
        PinningEntry {
            name: "infura".into(),
            endpoint: "https://ipfs.infura.io:5001/api/v0".into(),
            kind: PinServiceKind::KuboRpc,
            token_env: "INFURA_TOKEN".into(),
            required: None,
        },
    ]
}

fn default_true() -> bool {
    true
}

fn default_gateways() -> Vec<String> {
    DEFAULT_GATEWAYS.iter().map(|g| g.to_string()).collect()
}

fn default_ens_domain() -> Option<String> {
    Some("umc.eth".into())
}

/// TOML has no null; a blank string stands for "unset".
fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            routing: RoutingConfig::default(),
            pinning: default_pinning(),
        }
    }
}

impl Default for DeploymentSection {
    fn default() -> Self {
        Self {
            auto_pin: default_true(),
            gateways: default_gateways(),
            ens_domain: default_ens_domain(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
            build_command: default_build_command(),
            record_path: default_record_path(),
            history_path: None,
            store: StoreSection::default(),
            deployment: DeploymentSection::default(),
        }
    }
}

/// Deployment mode, from `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    Development,
    Production,
}

impl DeployMode {
    /// Parses the `NODE_ENV` value; unset or unknown means development.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl Config {
    /// Loads `explicit` if given, else `<root>/umcdeploy.toml` if present,
    /// else defaults.
    pub fn load(explicit: Option<&Path>, root: &Path) -> anyhow::Result<Self> {
        let (path, must_exist) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (root.join(CONFIG_FILE), false),
        };

        if !path.exists() {
            if must_exist {
                anyhow::bail!("config file {} not found", path.display());
            }
            tracing::debug!("no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Builds the store configuration, resolving credentials with `env`.
    ///
    /// In production every pinning service requires its credential unless
    /// the entry says otherwise.
    pub fn store_config(&self, env: impl Fn(&str) -> Option<String>, mode: DeployMode) -> StoreConfig {
        let pinning = self
            .store
            .pinning
            .iter()
            .map(|entry| PinServiceConfig {
                name: entry.name.clone(),
                endpoint: entry.endpoint.clone(),
                kind: entry.kind,
                token: env(&entry.token_env).filter(|t| !t.trim().is_empty()),
                required: entry
                    .required
                    .unwrap_or(mode == DeployMode::Production),
            })
            .collect();

        StoreConfig {
            api_url: self.store.api_url.clone(),
            routing: self.store.routing.clone(),
            pinning,
        }
    }
}
