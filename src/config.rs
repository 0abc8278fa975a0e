//! Network configuration
//!
//! The target network is an explicit value handed to every boundary
//! collaborator. Only testnet is supported; the types are parameterized
//! so a second network is an additive change.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Storage network to operate against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Testnet,
}

impl Network {
    /// Chain identifier sent with every signature request
    pub fn chain_id(&self) -> &'static str {
        match self {
            Network::Testnet => "quilt:testnet",
        }
    }

    /// Default publisher endpoint for this network
    pub fn default_publisher_url(&self) -> &'static str {
        match self {
            Network::Testnet => "https://publisher.quilt-testnet.example.net",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Testnet => f.write_str("testnet"),
        }
    }
}

impl std::str::FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testnet" => Ok(Network::Testnet),
            other => Err(format!("unsupported network: {}", other)),
        }
    }
}

/// Configuration shared by the upload pipeline and its collaborators
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Target network
    pub network: Network,
    /// Publisher endpoint for publisher-funded uploads
    pub publisher_url: String,
    /// Timeout applied at each network-facing suspension point
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let network = Network::Testnet;
        Self {
            network,
            publisher_url: network.default_publisher_url().to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl NetworkConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let network = std::env::var("WHARF_NETWORK")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Network::Testnet);

        let publisher_url = std::env::var("WHARF_PUBLISHER_URL")
            .unwrap_or_else(|_| network.default_publisher_url().to_string());

        let timeout_secs = std::env::var("WHARF_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Self {
            network,
            publisher_url,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}
