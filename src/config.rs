use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::IdKitError;

/// Relay used when the caller does not configure one.
pub const DEFAULT_BRIDGE_URL: &str = "https://bridge.worldcoin.org/";

/// Base of the deep link the wallet opens.
pub const DEFAULT_CONNECT_BASE_URL: &str = "https://world.org/verify";

/// Transport tag carried in the connect URI (`t=`).
pub const TRANSPORT_TAG: &str = "wld";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// A bridge url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
///
/// Only `https` is accepted, except for loopback hosts used in development.
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BridgeUrl(Url);

impl BridgeUrl {
    /// Whether this is the default relay; only a non-default relay is advertised in the
    /// connect URI.
    pub fn is_default(&self) -> bool {
        self.0.as_str() == DEFAULT_BRIDGE_URL
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// The URL as advertised to the wallet, without the trailing slash added for joining.
    pub fn advertised(&self) -> &str {
        self.0.as_str().trim_end_matches('/')
    }
}

impl Default for BridgeUrl {
    fn default() -> Self {
        DEFAULT_BRIDGE_URL
            .to_string()
            .try_into()
            .unwrap_or_else(|_| unreachable!("default bridge url is valid"))
    }
}

impl std::ops::Deref for BridgeUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BridgeUrl {
    type Error = IdKitError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        let url: Url = url
            .parse()
            .map_err(|e| IdKitError::InvalidConfiguration(format!("bridge url: {e}")))?;

        let loopback = matches!(url.host_str(), Some("localhost" | "127.0.0.1" | "[::1]"));
        match url.scheme() {
            "https" => {}
            "http" if loopback => {}
            scheme => {
                return Err(IdKitError::InvalidConfiguration(format!(
                    "bridge url must use https, found '{scheme}'"
                )))
            }
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(IdKitError::InvalidConfiguration(
                "bridge url must not carry a query or fragment".into(),
            ));
        }

        Ok(Self(url))
    }
}

impl TryFrom<&str> for BridgeUrl {
    type Error = IdKitError;

    fn try_from(url: &str) -> Result<Self, Self::Error> {
        url.to_string().try_into()
    }
}

/// Timing of a poll loop.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct PollOptions {
    /// Delay between two status fetches.
    #[serde(with = "duration_millis")]
    pub interval: Duration,
    /// Wall-clock budget for the whole loop, measured from its start.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
