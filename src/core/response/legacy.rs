use serde::Deserialize;

use super::{IdKitResult, ProofItem, ResponseItem, ResultContext};
use crate::core::credential::{CredentialType, VerificationLevel};

/// Oldest shape: one proof, identified by its verification level.
#[derive(Debug, Deserialize)]
pub(super) struct SingleVerificationResponse {
    #[serde(alias = "credential_type")]
    verification_level: VerificationLevel,
    proof: String,
    merkle_root: String,
    nullifier_hash: String,
}

/// Intermediate shape: several proofs, each identified by its verification level.
#[derive(Debug, Deserialize)]
pub(super) struct MultiVerificationResponse {
    verifications: Vec<SingleVerificationResponse>,
    #[serde(default)]
    nonce: Option<String>,
}

impl SingleVerificationResponse {
    fn into_item(self) -> ResponseItem {
        ResponseItem::Proof(ProofItem {
            identifier: CredentialType::from(self.verification_level),
            proof: self.proof,
            merkle_root: self.merkle_root,
            nullifier: self.nullifier_hash,
            issuer_schema_id: None,
            expires_at_min: None,
        })
    }

    pub(super) fn normalize(self, context: &ResultContext) -> Option<IdKitResult> {
        build(context, None, vec![self.into_item()])
    }
}

impl MultiVerificationResponse {
    pub(super) fn normalize(self, context: &ResultContext) -> Option<IdKitResult> {
        if self.verifications.is_empty() {
            return None;
        }
        let responses = self
            .verifications
            .into_iter()
            .map(SingleVerificationResponse::into_item)
            .collect();
        build(context, self.nonce, responses)
    }
}

fn build(
    context: &ResultContext,
    nonce: Option<String>,
    responses: Vec<ResponseItem>,
) -> Option<IdKitResult> {
    Some(IdKitResult {
        protocol_version: context.protocol_version.clone(),
        nonce: nonce.unwrap_or_else(|| context.nonce.clone()),
        scope: context.result_scope()?,
        action_description: context.action_description(),
        responses,
        environment: context.environment,
    })
}
