//! This library is the verification-request core of an IDKit client: it builds signed proof
//! requests, relays them to the wallet through an encrypted bridge, and normalizes the answer.
//!
//! # Relying Party Backend
//!
//! Requests are authenticated with an [`RpSignature`] produced where the RP signing key lives.
//! The key can only be loaded once the caller asserts it runs in a trusted backend:
//!
//! ```ignore
//! use idkit::core::rp_signature::{sign_request, ExecutionContext, Secp256k1Signer};
//!
//! let signer = Secp256k1Signer::from_hex(ExecutionContext::TrustedBackend, &rp_signing_key)?;
//! let signature = sign_request(&signer, None)?;
//!
//! // Hand `{sig, nonce, created_at, expires_at}` to the frontend.
//! let body = serde_json::to_string(&signature)?;
//! ```
//!
//! [`RpSignature`]: crate::core::rp_signature::RpSignature
//!
//! # Client Usage
//!
//! A request is described with a constraint tree (or a legacy preset), submitted to the bridge,
//! and polled until the wallet answers:
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use idkit::config::PollOptions;
//! use idkit::core::constraints::ConstraintNode;
//! use idkit::core::credential::CredentialType;
//! use idkit::core::response::ResponseOutcome;
//! use idkit::core::rp_signature::RpContext;
//! use idkit::core::util::ReqwestClient;
//! use idkit::verifier::IdKit;
//!
//! let idkit = IdKit::builder()
//!     .with_app_id("app_staging_0123456789")
//!     .with_http_client(Arc::new(ReqwestClient::new()?))
//!     .build()?;
//!
//! // Orb is preferred, a face credential is accepted as a fallback.
//! let constraints = ConstraintNode::any(vec![
//!     CredentialType::Orb.into(),
//!     CredentialType::Face.into(),
//! ])?;
//!
//! let mut session = idkit
//!     .build_request()
//!     .with_action("vote-2026")
//!     .with_constraints(constraints)
//!     .with_rp_context(RpContext::from_signature("rp_0123", &signature)?)
//!     .build()
//!     .await?;
//!
//! // Present the request to the user (e.g., as a QR code).
//! show_qr_code(session.connect_uri().as_str());
//!
//! // Cancel from elsewhere, e.g. when the user closes the modal.
//! let handle = session.handle();
//!
//! match session.poll_until_completion(PollOptions::default()).await? {
//!     ResponseOutcome::Confirmed(result) => forward_to_backend(result).await?,
//!     ResponseOutcome::Failed(code) => show_error(code),
//! }
//! ```
//!
//! The session is a state machine, see [`Status`]. Failures the user can see (rejection,
//! timeout, cancellation) are values; only integration bugs surface as an [`IdKitError`].
//!
//! [`Status`]: crate::verifier::session::Status
//! [`IdKitError`]: crate::error::IdKitError
//!
//! # Inside the Wallet
//!
//! When running inside the wallet app itself, the request is handed to the host instead of the
//! bridge, see [`native`].
//!
//! # Protocol Overview
//!
//! 1. *Authenticate*: the RP backend signs the 49-byte message
//!    `0x01 || nonce || created_at || expires_at`, see [`core::rp_signature`].
//! 2. *Describe*: credential requirements are a tree of `all`/`any`/`enumerate` nodes over
//!    credential requests, see [`core::constraints`].
//! 3. *Relay*: the payload is AES-256-GCM encrypted with a fresh key, stored on the bridge, and
//!    the key travels to the wallet in the connect URI only, see [`bridge`].
//! 4. *Resolve*: the answer is decrypted and every historical response shape is normalized into
//!    an [`IdKitResult`], see [`core::response`].
//!
//! [`IdKitResult`]: crate::core::response::IdKitResult

pub mod bridge;
pub mod config;
pub mod core;
pub mod error;
pub mod native;
pub mod utils;
pub mod verifier;

pub use idkit_frontend::{AppErrorCode, VerificationState};
