//! Relying-party request authentication.
//!
//! A backend holding the RP signing key produces `{sig, nonce, created_at, expires_at}`; the
//! client embeds it, together with the RP id, as the [RpContext] of a request.
//!
//! The signed message is 49 bytes:
//!
//! ```text
//! 0x01 || nonce (32) || created_at (u64 BE) || expires_at (u64 BE)
//! ```
//!
//! The action is not part of the message. Verifiers rely on this layout, so it must not change.
use std::time::{SystemTime, UNIX_EPOCH};

use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::crypto::{
    hash_to_field, keccak256, parse_signing_key, random_bytes, sign_recoverable,
    to_hex_prefixed, RecoverableSignature,
};
use crate::error::{IdKitError, Result};

/// Leading byte of the signed message.
pub const RP_SIGNATURE_VERSION: u8 = 0x01;

pub const RP_SIGNATURE_MSG_LEN: usize = 49;

/// Lifetime of a signature when the caller does not choose one, in seconds.
pub const DEFAULT_TTL_SECS: u64 = 300;

/// Where a key-bearing operation is being executed.
///
/// Callers assert this explicitly; nothing is inferred from the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A backend that controls the RP signing key.
    TrustedBackend,
    /// Anything user-facing: browsers, mobile apps, widgets.
    Client,
}

/// Signs RP message digests.
///
/// Implemented by [Secp256k1Signer]; keys held in an HSM or KMS can implement it too.
pub trait RequestSigner {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<RecoverableSignature>;
}

/// A [RequestSigner] over an in-memory secp256k1 key.
pub struct Secp256k1Signer {
    key: SigningKey,
}

impl Secp256k1Signer {
    /// Parse a hex signing key (`0x` prefix optional).
    ///
    /// # Errors
    /// [IdKitError::UntrustedContext] unless `context` is [ExecutionContext::TrustedBackend];
    /// [IdKitError::InvalidSigningKey] if the key is not 32 bytes of valid hex scalar material.
    pub fn from_hex(context: ExecutionContext, hex_key: &str) -> Result<Self> {
        if context != ExecutionContext::TrustedBackend {
            return Err(IdKitError::UntrustedContext);
        }
        Ok(Self {
            key: parse_signing_key(hex_key)?,
        })
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        self.key.verifying_key()
    }
}

impl std::fmt::Debug for Secp256k1Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secp256k1Signer").finish_non_exhaustive()
    }
}

impl RequestSigner for Secp256k1Signer {
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<RecoverableSignature> {
        sign_recoverable(&self.key, digest)
    }
}

/// Backend → frontend transport shape of an RP signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpSignature {
    /// `0x` + 130 hex characters.
    pub sig: String,
    /// `0x` + 64 hex characters.
    pub nonce: String,
    pub created_at: u64,
    pub expires_at: u64,
}

/// Build the 49-byte message an RP signs.
pub fn compute_rp_signature_msg(
    nonce: &[u8; 32],
    created_at: u64,
    expires_at: u64,
) -> [u8; RP_SIGNATURE_MSG_LEN] {
    let mut msg = [0u8; RP_SIGNATURE_MSG_LEN];
    msg[0] = RP_SIGNATURE_VERSION;
    msg[1..33].copy_from_slice(nonce);
    msg[33..41].copy_from_slice(&created_at.to_be_bytes());
    msg[41..49].copy_from_slice(&expires_at.to_be_bytes());
    msg
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Sign a fresh proof request.
///
/// `ttl_secs` defaults to [DEFAULT_TTL_SECS]. Two calls never share a nonce.
pub fn sign_request<S: RequestSigner + ?Sized>(
    signer: &S,
    ttl_secs: Option<u64>,
) -> Result<RpSignature> {
    let seed: [u8; 32] = random_bytes()?;
    sign_request_at(signer, &seed, unix_now(), ttl_secs.unwrap_or(DEFAULT_TTL_SECS))
}

pub(crate) fn sign_request_at<S: RequestSigner + ?Sized>(
    signer: &S,
    nonce_seed: &[u8],
    created_at: u64,
    ttl_secs: u64,
) -> Result<RpSignature> {
    let nonce = hash_to_field(nonce_seed);
    let expires_at = created_at
        .checked_add(ttl_secs)
        .ok_or_else(|| IdKitError::InvalidRpContext("ttl overflows the timestamp".into()))?;
    if expires_at <= created_at {
        return Err(IdKitError::InvalidRpContext(
            "ttl must be greater than zero".into(),
        ));
    }

    let msg = compute_rp_signature_msg(&nonce, created_at, expires_at);
    let signature = signer.sign_digest(&keccak256(&msg))?;
    debug!(created_at, expires_at, "signed rp request");

    Ok(RpSignature {
        sig: to_hex_prefixed(&signature.to_bytes()),
        nonce: to_hex_prefixed(&nonce),
        created_at,
        expires_at,
    })
}

/// Authenticated request metadata, as consumed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpContext {
    rp_id: String,
    nonce: [u8; 32],
    created_at: u64,
    expires_at: u64,
    signature: RecoverableSignature,
}

impl RpContext {
    /// Parse the transport shape produced by [sign_request].
    pub fn from_signature(rp_id: impl Into<String>, signature: &RpSignature) -> Result<Self> {
        let rp_id = rp_id.into();
        if rp_id.is_empty() {
            return Err(IdKitError::InvalidRpContext("rp_id is empty".into()));
        }
        if signature.expires_at <= signature.created_at {
            return Err(IdKitError::InvalidRpContext(
                "expires_at must be after created_at".into(),
            ));
        }

        let nonce: [u8; 32] = decode_hex(&signature.nonce, "nonce")?
            .try_into()
            .map_err(|_| IdKitError::InvalidRpContext("nonce must be 32 bytes".into()))?;
        let sig = RecoverableSignature::from_bytes(&decode_hex(&signature.sig, "sig")?)?;

        Ok(Self {
            rp_id,
            nonce,
            created_at: signature.created_at,
            expires_at: signature.expires_at,
            signature: sig,
        })
    }

    pub fn rp_id(&self) -> &str {
        &self.rp_id
    }

    pub fn nonce(&self) -> &[u8; 32] {
        &self.nonce
    }

    pub fn nonce_hex(&self) -> String {
        to_hex_prefixed(&self.nonce)
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn expires_at(&self) -> u64 {
        self.expires_at
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }

    pub fn message(&self) -> [u8; RP_SIGNATURE_MSG_LEN] {
        compute_rp_signature_msg(&self.nonce, self.created_at, self.expires_at)
    }

    /// Recover the key that signed this context.
    pub fn recover_signer(&self) -> Result<VerifyingKey> {
        let mut rs = [0u8; 64];
        rs[..32].copy_from_slice(&self.signature.r);
        rs[32..].copy_from_slice(&self.signature.s);
        let signature = Signature::from_slice(&rs)
            .map_err(|e| IdKitError::InvalidRpContext(format!("signature: {e}")))?;
        let recovery_id = RecoveryId::from_byte(self.signature.recovery_id)
            .ok_or_else(|| IdKitError::InvalidRpContext("recovery id".into()))?;
        VerifyingKey::recover_from_prehash(&keccak256(&self.message()), &signature, recovery_id)
            .map_err(|e| IdKitError::InvalidRpContext(format!("recovery failed: {e}")))
    }

    /// Whether this context was signed by `key`.
    pub fn verify(&self, key: &VerifyingKey) -> bool {
        self.recover_signer().is_ok_and(|recovered| &recovered == key)
    }
}

/// Wire form embedded in the bridge request payload.
#[derive(Serialize, Deserialize)]
struct RpContextWire {
    rp_id: String,
    nonce: String,
    created_at: u64,
    expires_at: u64,
    signature: String,
}

impl Serialize for RpContext {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RpContextWire {
            rp_id: self.rp_id.clone(),
            nonce: self.nonce_hex(),
            created_at: self.created_at,
            expires_at: self.expires_at,
            signature: to_hex_prefixed(&self.signature.to_bytes()),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RpContext {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = RpContextWire::deserialize(deserializer)?;
        RpContext::from_signature(
            wire.rp_id,
            &RpSignature {
                sig: wire.signature,
                nonce: wire.nonce,
                created_at: wire.created_at,
                expires_at: wire.expires_at,
            },
        )
        .map_err(serde::de::Error::custom)
    }
}

fn decode_hex(value: &str, field: &str) -> Result<Vec<u8>> {
    let body = value
        .strip_prefix("0x")
        .ok_or_else(|| IdKitError::InvalidRpContext(format!("{field} must be 0x-prefixed")))?;
    hex::decode(body).map_err(|e| IdKitError::InvalidRpContext(format!("{field}: {e}")))
}
