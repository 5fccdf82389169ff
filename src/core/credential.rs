use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::crypto::{hash_to_field, to_hex_prefixed};

/// Class of verifiable credential a user can present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialType {
    Orb,
    Face,
    Device,
    Document,
    SecureDocument,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orb => "orb",
            Self::Face => "face",
            Self::Device => "device",
            Self::Document => "document",
            Self::SecureDocument => "secure_document",
        }
    }
}

impl fmt::Display for CredentialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

/// Verification level understood by verifiers that predate credential requests.
///
/// Each level accepts a fixed set of credential types, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationLevel {
    Orb,
    Face,
    Device,
    Document,
    SecureDocument,
}

impl VerificationLevel {
    pub fn accepted_credentials(&self) -> &'static [CredentialType] {
        use CredentialType as C;
        match self {
            Self::Orb => &[C::Orb],
            Self::Face => &[C::Orb, C::Face],
            Self::Device => &[C::Orb, C::Device],
            Self::Document => &[C::Document, C::SecureDocument, C::Orb],
            Self::SecureDocument => &[C::SecureDocument, C::Orb],
        }
    }
}

impl From<CredentialType> for VerificationLevel {
    fn from(value: CredentialType) -> Self {
        match value {
            CredentialType::Orb => Self::Orb,
            CredentialType::Face => Self::Face,
            CredentialType::Device => Self::Device,
            CredentialType::Document => Self::Document,
            CredentialType::SecureDocument => Self::SecureDocument,
        }
    }
}

impl From<VerificationLevel> for CredentialType {
    fn from(value: VerificationLevel) -> Self {
        match value {
            VerificationLevel::Orb => Self::Orb,
            VerificationLevel::Face => Self::Face,
            VerificationLevel::Device => Self::Device,
            VerificationLevel::Document => Self::Document,
            VerificationLevel::SecureDocument => Self::SecureDocument,
        }
    }
}

/// Payload bound into a credential request.
///
/// Bytes are the canonical form. On the wire a signal is a string: plain UTF-8 text is sent
/// as-is, anything else as `0x`-prefixed hex. Strings that look like `0x`-prefixed hex are
/// decoded to bytes, so `"0x68656c6c6f"` and `"hello"` are the same signal.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Signal(Vec<u8>);

impl Signal {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The string view, when the bytes are valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Field-element hash of the signal, as a `0x`-prefixed hex string.
    pub fn hash(&self) -> String {
        to_hex_prefixed(&hash_to_field(&self.0))
    }

    fn to_wire(&self) -> String {
        match self.as_str() {
            Some(s) if !s.starts_with("0x") => s.to_owned(),
            _ => to_hex_prefixed(&self.0),
        }
    }
}

impl From<&str> for Signal {
    fn from(value: &str) -> Self {
        if let Some(hex_body) = value.strip_prefix("0x") {
            if let Ok(bytes) = hex::decode(hex_body) {
                return Self(bytes);
            }
        }
        Self(value.as_bytes().to_vec())
    }
}

impl From<String> for Signal {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl From<Vec<u8>> for Signal {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signal").field(&self.to_wire()).finish()
    }
}

impl Serialize for Signal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for Signal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Signal::from)
    }
}

/// A leaf request for one credential type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialRequest {
    #[serde(rename = "type")]
    credential_type: CredentialType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signal: Option<Signal>,
    /// Minimum issuance time of the credential, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    genesis_issued_at_min: Option<u64>,
    /// Minimum expiry time of the credential, unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at_min: Option<u64>,
}

impl CredentialRequest {
    pub fn new(credential_type: CredentialType) -> Self {
        Self {
            credential_type,
            signal: None,
            genesis_issued_at_min: None,
            expires_at_min: None,
        }
    }

    pub fn with_signal(mut self, signal: impl Into<Signal>) -> Self {
        self.signal = Some(signal.into());
        self
    }

    pub fn with_genesis_issued_at_min(mut self, timestamp: u64) -> Self {
        self.genesis_issued_at_min = Some(timestamp);
        self
    }

    pub fn with_expires_at_min(mut self, timestamp: u64) -> Self {
        self.expires_at_min = Some(timestamp);
        self
    }

    pub fn credential_type(&self) -> CredentialType {
        self.credential_type
    }

    pub fn signal(&self) -> Option<&Signal> {
        self.signal.as_ref()
    }

    pub fn genesis_issued_at_min(&self) -> Option<u64> {
        self.genesis_issued_at_min
    }

    pub fn expires_at_min(&self) -> Option<u64> {
        self.expires_at_min
    }
}

impl From<CredentialType> for CredentialRequest {
    fn from(value: CredentialType) -> Self {
        Self::new(value)
    }
}
