use std::fmt;

use base64::prelude::*;
use url::Url;

use crate::{
    config::{BridgeUrl, TRANSPORT_TAG},
    core::crypto::BridgeKeyMaterial,
};

/// Deep link that lets the wallet fetch and decrypt a pending request.
///
/// `<base>?t=wld&i=<request_id>&k=<base64 key>[&b=<bridge url>][&partner=true]`
///
/// The bridge is only advertised when it is not the default one.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectUri(Url);

impl ConnectUri {
    pub fn new(
        base: &Url,
        request_id: &str,
        key: &BridgeKeyMaterial,
        bridge: &BridgeUrl,
        partner: bool,
    ) -> Self {
        let mut url = base.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("t", TRANSPORT_TAG)
                .append_pair("i", request_id)
                .append_pair("k", &BASE64_STANDARD.encode(key.key()));
            if !bridge.is_default() {
                query.append_pair("b", bridge.advertised());
            }
            if partner {
                query.append_pair("partner", "true");
            }
        }
        Self(url)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl From<ConnectUri> for Url {
    fn from(value: ConnectUri) -> Self {
        value.0
    }
}

impl fmt::Display for ConnectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

// The URI embeds the key.
impl fmt::Debug for ConnectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConnectUri").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use super::*;
    use crate::config::DEFAULT_CONNECT_BASE_URL;

    fn key() -> BridgeKeyMaterial {
        BridgeKeyMaterial::from_parts([0xfb; 32], [0u8; 12])
    }

    fn query(uri: &ConnectUri) -> HashMap<String, String> {
        uri.as_url().query_pairs().into_owned().collect()
    }

    #[test]
    fn default_bridge_is_not_advertised() {
        let base: Url = DEFAULT_CONNECT_BASE_URL.parse().unwrap();
        let uri = ConnectUri::new(&base, "req_1", &key(), &BridgeUrl::default(), false);

        assert!(uri.as_str().starts_with("https://world.org/verify?t=wld&i=req_1&k="));
        let query = query(&uri);
        assert_eq!(query["k"], BASE64_STANDARD.encode([0xfb; 32]));
        assert!(!query.contains_key("b"));
        assert!(!query.contains_key("partner"));
        // '+' and '/' from the base64 alphabet must be escaped.
        assert!(!uri.as_str().contains("k=+"));
        assert!(uri.as_str().contains("%2B") || uri.as_str().contains("%2F"));
    }

    #[test]
    fn custom_bridge_and_partner() {
        let base: Url = DEFAULT_CONNECT_BASE_URL.parse().unwrap();
        let bridge = BridgeUrl::try_from("https://relay.example.com/bridge").unwrap();
        let uri = ConnectUri::new(&base, "req_2", &key(), &bridge, true);

        let query = query(&uri);
        assert_eq!(query["b"], "https://relay.example.com/bridge");
        assert_eq!(query["partner"], "true");
        assert!(uri
            .as_str()
            .contains("b=https%3A%2F%2Frelay.example.com%2Fbridge"));
        assert_eq!(format!("{uri:?}"), "ConnectUri(..)");
    }
}
