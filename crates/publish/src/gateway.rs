//! Gateway URL composition.

use umcdeploy_content_store::ContentId;

/// Scheme of the canonical, gateway-independent URL.
pub const CANONICAL_SCHEME: &str = "ipfs://";

/// Public gateways used when none are configured.
pub const DEFAULT_GATEWAYS: &[&str] = &[
    "https://ipfs.io/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
];

/// Ordered set of gateway base URLs.
///
/// Order is display and priority order. Duplicates keep their first
/// position and every base ends with `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    bases: Vec<String>,
}

impl GatewayConfig {
    pub fn new<I, S>(bases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for base in bases {
            let base = base.as_ref().trim();
            if base.is_empty() {
                continue;
            }
            let base = if base.ends_with('/') {
                base.to_string()
            } else {
                format!("{base}/")
            };
            if !normalized.contains(&base) {
                normalized.push(base);
            }
        }
        Self { bases: normalized }
    }

    pub fn bases(&self) -> &[String] {
        &self.bases
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Access URLs for `cid`, one per gateway, in configured order.
    pub fn urls_for(&self, cid: &ContentId) -> Vec<String> {
        self.bases.iter().map(|base| format!("{base}{cid}")).collect()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAYS)
    }
}

/// Canonical `ipfs://<cid>` URL.
pub fn canonical_url(cid: &ContentId) -> String {
    format!("{CANONICAL_SCHEME}{cid}")
}
