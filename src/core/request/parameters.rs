use std::fmt;

use anyhow::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::core::{
    constraints::ConstraintNode,
    credential::{CredentialRequest, CredentialType, VerificationLevel},
    object::{serde_parameter, TypedParameter},
    preset::Preset,
    rp_signature::RpContext,
};

const PRODUCTION: &str = "production";
const STAGING: &str = "staging";

serde_parameter!(
    /// Application identifier registered with the developer portal (`app_...`).
    AppId(String) => "app_id"
);

serde_parameter!(Action(String) => "action");

serde_parameter!(
    /// Human readable description shown in the wallet.
    ActionDescription(String) => "action_description"
);

serde_parameter!(SessionId(String) => "session_id");

serde_parameter!(ProtocolVersion(String) => "protocol_version");

serde_parameter!(
    /// `0x`-prefixed field element the proof must be bound to.
    Nonce(String) => "nonce"
);

serde_parameter!(Constraints(ConstraintNode) => "constraints");

serde_parameter!(PresetParameter(Preset) => "preset");

serde_parameter!(
    /// Leaves of the constraint tree, for wallets that read a flat list.
    Requests(Vec<CredentialRequest>) => "requests"
);

serde_parameter!(RpContextParameter(RpContext) => "rp_context");

serde_parameter!(
    /// Whether proofs in a legacy shape are acceptable to the relying party.
    AllowLegacyProofs(bool) => "allow_legacy_proofs"
);

serde_parameter!(
    /// Legacy mirror: hashed signal of the leading request.
    LegacySignal(String) => "signal"
);

serde_parameter!(
    /// Legacy mirror: verification level understood by older verifiers.
    LegacyVerificationLevel(VerificationLevel) => "verification_level"
);

serde_parameter!(
    /// Legacy mirror: every credential type the request accepts.
    CredentialTypes(Vec<CredentialType>) => "credential_types"
);

/// Deployment the request and its proofs belong to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Staging,
}

impl TypedParameter for Environment {
    const KEY: &'static str = "environment";
}

impl TryFrom<Json> for Environment {
    type Error = Error;

    fn try_from(value: Json) -> Result<Self, Self::Error> {
        Ok(serde_json::from_value(value)?)
    }
}

impl From<Environment> for Json {
    fn from(value: Environment) -> Self {
        Json::String(value.to_string())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Production => PRODUCTION,
            Environment::Staging => STAGING,
        }
        .fmt(f)
    }
}
