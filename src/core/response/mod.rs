//! Proof responses.
//!
//! Wallets have answered in three shapes over time. All of them are decoded into the single
//! [IdKitResult] shape; see [decode_response].
use std::collections::HashSet;

use idkit_frontend::AppErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};

use self::legacy::{MultiVerificationResponse, SingleVerificationResponse};
use super::{
    constraints::ConstraintNode,
    credential::CredentialType,
    request::{parameters::Environment, RequestScope},
};

mod legacy;

/// Normalized proof response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdKitResult {
    pub protocol_version: String,
    pub nonce: String,
    #[serde(flatten)]
    pub scope: ResultScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_description: Option<String>,
    pub responses: Vec<ResponseItem>,
    #[serde(default)]
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultScope {
    Action { action: String },
    Session { session_id: String },
}

/// Outcome for one requested credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseItem {
    Proof(ProofItem),
    Error(ErrorItem),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofItem {
    pub identifier: CredentialType,
    /// Zero-knowledge proof, encoded by the wallet.
    pub proof: String,
    pub merkle_root: String,
    pub nullifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_schema_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_min: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorItem {
    pub identifier: CredentialType,
    pub error: AppErrorCode,
}

impl ResponseItem {
    pub fn identifier(&self) -> CredentialType {
        match self {
            ResponseItem::Proof(item) => item.identifier,
            ResponseItem::Error(item) => item.identifier,
        }
    }

    pub fn proof(&self) -> Option<&ProofItem> {
        match self {
            ResponseItem::Proof(item) => Some(item),
            ResponseItem::Error(_) => None,
        }
    }
}

impl IdKitResult {
    /// Credential types for which a proof was returned.
    pub fn proven_credentials(&self) -> HashSet<CredentialType> {
        self.responses
            .iter()
            .filter_map(ResponseItem::proof)
            .map(|item| item.identifier)
            .collect()
    }

    /// Whether the returned proofs satisfy `constraints`. Items carrying an error do not count.
    pub fn satisfies(&self, constraints: &ConstraintNode) -> bool {
        constraints.evaluate(&self.proven_credentials())
    }
}

/// What the request promised, used to fill in fields older shapes do not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultContext {
    pub protocol_version: String,
    pub nonce: String,
    pub scope: RequestScope,
    pub environment: Environment,
}

impl ResultContext {
    fn result_scope(&self) -> Option<ResultScope> {
        match &self.scope {
            RequestScope::Action { action, .. } => Some(ResultScope::Action {
                action: action.clone(),
            }),
            RequestScope::Session {
                session_id: Some(session_id),
            } => Some(ResultScope::Session {
                session_id: session_id.clone(),
            }),
            RequestScope::Session { session_id: None } => None,
        }
    }

    fn action_description(&self) -> Option<String> {
        match &self.scope {
            RequestScope::Action { description, .. } => description.clone(),
            RequestScope::Session { .. } => None,
        }
    }
}

/// A decoded response payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Confirmed(IdKitResult),
    Failed(AppErrorCode),
}

#[derive(Deserialize)]
struct ErrorResponse {
    error_code: AppErrorCode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireResponse {
    Current(IdKitResult),
    MultiVerification(MultiVerificationResponse),
    SingleVerification(SingleVerificationResponse),
}

/// Decode a decrypted response payload.
///
/// Recognized shapes, newest first:
/// - the current multi-credential shape (`responses: [...]`),
/// - the multi-verification legacy shape (`verifications: [...]`),
/// - the single-verification legacy shape (`proof`, `merkle_root`, `nullifier_hash`,
///   `verification_level`).
///
/// A payload carrying `error_code` is a failure. A result answering another nonce, or any other
/// payload, is [AppErrorCode::UnexpectedResponse].
pub fn decode_response(payload: Json, context: &ResultContext) -> ResponseOutcome {
    if let Ok(ErrorResponse { error_code }) = ErrorResponse::deserialize(&payload) {
        debug!(%error_code, "wallet reported an error");
        return ResponseOutcome::Failed(error_code);
    }

    let result = match WireResponse::deserialize(&payload) {
        Ok(WireResponse::Current(result)) => Some(result),
        Ok(WireResponse::MultiVerification(response)) => {
            debug!("normalizing multi-verification legacy response");
            response.normalize(context)
        }
        Ok(WireResponse::SingleVerification(response)) => {
            debug!("normalizing single-verification legacy response");
            response.normalize(context)
        }
        Err(e) => {
            warn!("unrecognized response shape: {e}");
            None
        }
    };

    match result {
        Some(result) if result.nonce == context.nonce => ResponseOutcome::Confirmed(result),
        Some(_) => {
            warn!("response nonce does not match the request nonce");
            ResponseOutcome::Failed(AppErrorCode::UnexpectedResponse)
        }
        None => ResponseOutcome::Failed(AppErrorCode::UnexpectedResponse),
    }
}
