//! Node-side alert configuration.
//!
//! Key text is parsed once, at startup, into typed keys; the verifier only
//! ever sees the resolved [`AlertPublicKey`] for the configured network.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::keys::{AlertPublicKey, Network, NetworkKeys};

/// Serializable alert configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    /// The network this node participates in.
    #[serde(default)]
    pub network: Network,
    /// Hex SEC1 alert public key for mainnet.
    pub main_public_key: String,
    /// Hex SEC1 alert public key for testnet.
    pub test_public_key: String,
    /// How often to sweep expired alerts (in seconds).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

const fn default_sweep_interval_secs() -> u64 {
    60
}

impl AlertConfig {
    /// Creates a config for `network` with the given hex keys.
    #[must_use]
    pub fn new(
        network: Network,
        main_public_key: impl Into<String>,
        test_public_key: impl Into<String>,
    ) -> Self {
        Self {
            network,
            main_public_key: main_public_key.into(),
            test_public_key: test_public_key.into(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }

    /// Parses a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Config` if the JSON is invalid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses both keys and selects the one for the configured network.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::Key` if either key is malformed.
    pub fn resolve(&self) -> Result<ResolvedAlertConfig> {
        let keys = NetworkKeys::new(
            AlertPublicKey::from_hex(&self.main_public_key)?,
            AlertPublicKey::from_hex(&self.test_public_key)?,
        );
        Ok(ResolvedAlertConfig {
            network: self.network,
            public_key: keys.select(self.network).clone(),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs.max(1)),
        })
    }
}

/// Configuration with keys parsed and the network key selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAlertConfig {
    network: Network,
    public_key: AlertPublicKey,
    sweep_interval: Duration,
}

impl ResolvedAlertConfig {
    /// Builds a resolved config directly from a key.
    #[must_use]
    pub const fn new(network: Network, public_key: AlertPublicKey, sweep_interval: Duration) -> Self {
        Self {
            network,
            public_key,
            sweep_interval,
        }
    }

    /// Returns the configured network.
    #[must_use]
    pub const fn network(&self) -> Network {
        self.network
    }

    /// Returns the alert public key of the configured network.
    #[must_use]
    pub const fn public_key(&self) -> &AlertPublicKey {
        &self.public_key
    }

    /// Returns the expiry sweep interval.
    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}
