//! IDKit data structures that are needed on the frontend, without all of the other
//! dependencies that can cause compilation issues with web targets.
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Coarse state of a verification request, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationState {
    /// The request is stored on the bridge, waiting for the wallet to fetch it.
    WaitingForConnection,
    /// The wallet fetched the request, waiting on the user to confirm.
    AwaitingConfirmation,
    /// The wallet responded with a proof.
    Confirmed,
    /// The request ended without a proof.
    Failed,
}

impl VerificationState {
    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

/// Error codes that end a verification request.
///
/// These are displayable outcomes, not integration bugs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppErrorCode {
    /// The bridge or the wallet could not be reached.
    ConnectionFailed,
    /// The user declined the request in the wallet.
    VerificationRejected,
    /// The user already verified the maximum number of times for this action.
    MaxVerificationsReached,
    /// The user does not hold any credential the request accepts.
    CredentialUnavailable,
    /// The wallet could not parse the request.
    MalformedRequest,
    /// The request targets a different network than the wallet.
    InvalidNetwork,
    /// The credential's inclusion proof could not be produced.
    InclusionProofFailed,
    /// The credential is not yet included in the identity tree.
    InclusionProofPending,
    /// The response did not match any known shape.
    UnexpectedResponse,
    /// The host application rejected the request.
    FailedByHostApp,
    /// The request was not answered in time.
    Timeout,
    /// The caller cancelled the request.
    Cancelled,
    /// Anything else.
    GenericError,
}

impl AppErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConnectionFailed => "connection_failed",
            Self::VerificationRejected => "verification_rejected",
            Self::MaxVerificationsReached => "max_verifications_reached",
            Self::CredentialUnavailable => "credential_unavailable",
            Self::MalformedRequest => "malformed_request",
            Self::InvalidNetwork => "invalid_network",
            Self::InclusionProofFailed => "inclusion_proof_failed",
            Self::InclusionProofPending => "inclusion_proof_pending",
            Self::UnexpectedResponse => "unexpected_response",
            Self::FailedByHostApp => "failed_by_host_app",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::GenericError => "generic_error",
        }
    }

    /// Parse a wire code. Unknown codes collapse into [AppErrorCode::GenericError].
    pub fn from_wire(code: &str) -> Self {
        match code {
            "connection_failed" => Self::ConnectionFailed,
            "verification_rejected" | "user_rejected" => Self::VerificationRejected,
            "max_verifications_reached" => Self::MaxVerificationsReached,
            "credential_unavailable" => Self::CredentialUnavailable,
            "malformed_request" => Self::MalformedRequest,
            "invalid_network" => Self::InvalidNetwork,
            "inclusion_proof_failed" => Self::InclusionProofFailed,
            "inclusion_proof_pending" => Self::InclusionProofPending,
            "unexpected_response" => Self::UnexpectedResponse,
            "failed_by_host_app" => Self::FailedByHostApp,
            "timeout" => Self::Timeout,
            "cancelled" => Self::Cancelled,
            _ => Self::GenericError,
        }
    }
}

impl<'de> Deserialize<'de> for AppErrorCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Ok(Self::from_wire(&code))
    }
}

impl fmt::Display for AppErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
