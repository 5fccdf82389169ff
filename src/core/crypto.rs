//! Cryptographic primitives shared by the RP signature, the bridge envelope and signal hashing.
//!
//! The byte layouts here are compatibility-critical: every host binding is validated against
//! the same fixtures, so changes must keep the test vectors below passing.
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use k256::ecdsa::SigningKey;
use rand::{rngs::OsRng, RngCore};
use sha3::{Digest, Keccak256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{IdKitError, Result};

pub const AEAD_KEY_LEN: usize = 32;
pub const AEAD_NONCE_LEN: usize = 12;

/// Keccak-256 of `bytes`.
pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    Keccak256::digest(bytes).into()
}

/// Hash arbitrary bytes into a value that fits the proof system's scalar field.
///
/// The Keccak-256 digest is shifted right by one byte, so the leading byte is always `0x00`.
pub fn hash_to_field(bytes: &[u8]) -> [u8; 32] {
    let digest = keccak256(bytes);
    let mut out = [0u8; 32];
    out[1..].copy_from_slice(&digest[..31]);
    out
}

/// `0x`-prefixed lowercase hex.
pub fn to_hex_prefixed(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Fill a buffer from the operating system's CSPRNG.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    OsRng
        .try_fill_bytes(&mut buf)
        .map_err(|e| IdKitError::EntropyFailure(e.to_string()))?;
    Ok(buf)
}

/// Symmetric key and nonce used for one bridge request.
///
/// Owned by exactly one session, never persisted, wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BridgeKeyMaterial {
    key: [u8; AEAD_KEY_LEN],
    nonce: [u8; AEAD_NONCE_LEN],
}

impl BridgeKeyMaterial {
    /// Fresh key material from the OS random source.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            key: random_bytes()?,
            nonce: random_bytes()?,
        })
    }

    pub fn from_parts(key: [u8; AEAD_KEY_LEN], nonce: [u8; AEAD_NONCE_LEN]) -> Self {
        Self { key, nonce }
    }

    pub fn key(&self) -> &[u8; AEAD_KEY_LEN] {
        &self.key
    }

    pub fn nonce(&self) -> &[u8; AEAD_NONCE_LEN] {
        &self.nonce
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    /// AES-256-GCM with this material's own nonce. The output is `ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.cipher()
            .encrypt(Nonce::from_slice(&self.nonce), plaintext)
            .map_err(|_| IdKitError::EncryptionError)
    }

    /// Decrypt `ciphertext || tag`. The nonce is taken from the message, since the counterpart
    /// may answer with a nonce of its own.
    pub fn decrypt(&self, nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if nonce.len() != AEAD_NONCE_LEN {
            return Err(IdKitError::DecryptionError);
        }
        self.cipher()
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| IdKitError::DecryptionError)
    }
}

impl std::fmt::Debug for BridgeKeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeKeyMaterial").finish_non_exhaustive()
    }
}

/// A secp256k1 ECDSA signature with its recovery id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Always 0 or 1.
    pub recovery_id: u8,
}

impl RecoverableSignature {
    /// `r || s || (recovery_id + 27)`.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.recovery_id + 27;
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; 65] = bytes.try_into().map_err(|_| {
            IdKitError::InvalidRpContext(format!("signature must be 65 bytes, got {}", bytes.len()))
        })?;
        let recovery_id = match bytes[64] {
            v @ (27 | 28) => v - 27,
            v @ (0 | 1) => v,
            v => {
                return Err(IdKitError::InvalidRpContext(format!(
                    "invalid recovery byte {v}"
                )))
            }
        };
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, recovery_id })
    }
}

/// Parse a 32-byte secp256k1 private key from hex, with or without a `0x` prefix.
pub fn parse_signing_key(hex_key: &str) -> Result<SigningKey> {
    let stripped = hex_key.strip_prefix("0x").unwrap_or(hex_key);
    if stripped.len() != 64 {
        return Err(IdKitError::InvalidSigningKey(format!(
            "expected 64 hex characters, got {}",
            stripped.len()
        )));
    }
    let mut bytes = hex::decode(stripped)
        .map_err(|e| IdKitError::InvalidSigningKey(format!("not hex: {e}")))?;
    let key = SigningKey::from_slice(&bytes)
        .map_err(|_| IdKitError::InvalidSigningKey("not a valid secp256k1 scalar".into()));
    bytes.zeroize();
    key
}

/// Deterministic-nonce (RFC 6979) ECDSA over secp256k1 on a precomputed digest.
///
/// `s` is normalized to the lower half of the curve order.
pub fn sign_recoverable(key: &SigningKey, digest: &[u8; 32]) -> Result<RecoverableSignature> {
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(digest)
        .map_err(|e| IdKitError::InvalidSigningKey(e.to_string()))?;
    let (r, s) = signature.split_bytes();
    Ok(RecoverableSignature {
        r: r.into(),
        s: s.into(),
        recovery_id: u8::from(recovery_id.is_y_odd()),
    })
}
