/// Errors that are raised rather than resolved into a [Status](crate::verifier::session::Status).
///
/// Construction-time validation fails fast with one of these. Anything the wallet or the bridge
/// reports as a terminal failure is a `Status::Failed` value instead.
#[derive(Debug, thiserror::Error)]
pub enum IdKitError {
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    #[error("entropy source unavailable: {0}")]
    EntropyFailure(String),

    #[error("encryption failed")]
    EncryptionError,

    #[error("decryption failed: bad tag or malformed ciphertext")]
    DecryptionError,

    #[error("constraint node must have at least one child")]
    EmptyConstraint,

    #[error("constraint tree exceeds limits: {0}")]
    ConstraintLimit(String),

    #[error("key-bearing operations require an explicitly trusted backend context")]
    UntrustedContext,

    #[error("invalid rp context: {0}")]
    InvalidRpContext(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("session is closed, create a new one")]
    SessionClosed,

    #[error("bridge request failed: {0:#}")]
    Bridge(anyhow::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = IdKitError> = std::result::Result<T, E>;
