//! Requests answered by the wallet app hosting this code, without going through the bridge.
//!
//! The request travels as a `postMessage`-style envelope, and the host replies on the same
//! channel with a payload in one of the shapes [decode_response] understands.
use async_trait::async_trait;
use idkit_frontend::AppErrorCode;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::{
    core::{
        object::UntypedObject,
        response::{decode_response, ResultContext},
    },
    error::Result,
    verifier::session::Status,
};

/// Command name understood by the host.
pub const VERIFY_COMMAND: &str = "verify";

/// Envelope version of the `verify` command.
pub const VERIFY_COMMAND_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeRequest {
    pub command: String,
    pub version: u32,
    pub payload: UntypedObject,
}

impl NativeRequest {
    pub fn verify(payload: UntypedObject) -> Self {
        Self {
            command: VERIFY_COMMAND.to_owned(),
            version: VERIFY_COMMAND_VERSION,
            payload,
        }
    }
}

/// Message channel to the host runtime.
#[async_trait]
pub trait HostTransport {
    /// Post `message` to the host and wait for its reply.
    async fn post_message(&self, message: Json) -> anyhow::Result<Json>;
}

/// A verification request handed to the host app.
#[derive(Debug)]
pub struct NativeSession {
    request: NativeRequest,
    context: ResultContext,
    status: Status,
}

impl NativeSession {
    pub(crate) fn new(payload: UntypedObject, context: ResultContext) -> Self {
        Self {
            request: NativeRequest::verify(payload),
            context,
            status: Status::WaitingForConnection,
        }
    }

    pub fn request(&self) -> &NativeRequest {
        &self.request
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Post the request to the host and resolve its reply.
    ///
    /// A transport failure resolves to [AppErrorCode::FailedByHostApp].
    pub async fn send<T: HostTransport + ?Sized>(&mut self, transport: &T) -> Result<&Status> {
        if self.status.is_terminal() {
            return Ok(&self.status);
        }
        let message = serde_json::to_value(&self.request)?;
        self.status = Status::AwaitingConfirmation;
        match transport.post_message(message).await {
            Ok(reply) => Ok(self.resolve(reply)),
            Err(e) => {
                warn!("host app did not answer: {e:#}");
                self.status = Status::Failed(AppErrorCode::FailedByHostApp);
                Ok(&self.status)
            }
        }
    }

    /// Resolve a reply delivered by the host.
    ///
    /// Only the first reply counts; later ones are ignored.
    pub fn resolve(&mut self, reply: Json) -> &Status {
        if self.status.is_terminal() {
            debug!("ignoring host reply for a resolved request");
            return &self.status;
        }
        self.status = decode_response(reply, &self.context).into();
        &self.status
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use anyhow::bail;
    use serde_json::json;

    use super::*;
    use crate::core::{
        credential::CredentialType,
        request::{parameters::Environment, RequestScope},
        response::{ProofItem, ResponseItem},
    };

    fn session() -> NativeSession {
        let payload = UntypedObject::try_from(json!({"app_id": "app_1", "action": "vote"})).unwrap();
        NativeSession::new(
            payload,
            ResultContext {
                protocol_version: "4.0".into(),
                nonce: "0x0001".into(),
                scope: RequestScope::action("vote"),
                environment: Environment::Production,
            },
        )
    }

    struct Host {
        received: Mutex<Option<Json>>,
        reply: Option<Json>,
    }

    #[async_trait]
    impl HostTransport for Host {
        async fn post_message(&self, message: Json) -> anyhow::Result<Json> {
            *self.received.lock().unwrap() = Some(message);
            match &self.reply {
                Some(reply) => Ok(reply.clone()),
                None => bail!("host went away"),
            }
        }
    }

    #[tokio::test]
    async fn envelope_and_reply() {
        let host = Host {
            received: Mutex::new(None),
            reply: Some(json!({
                "verification_level": "orb",
                "proof": "0xaa",
                "merkle_root": "0xbb",
                "nullifier_hash": "0xcc"
            })),
        };
        let mut session = session();
        let status = session.send(&host).await.unwrap().clone();

        assert_eq!(
            host.received.lock().unwrap().clone().unwrap(),
            json!({
                "command": "verify",
                "version": 1,
                "payload": {"app_id": "app_1", "action": "vote"}
            })
        );
        let Status::Confirmed(result) = status else {
            panic!("expected a confirmed status, got {status:?}")
        };
        assert_eq!(result.nonce, "0x0001");
        assert_eq!(
            result.responses,
            vec![ResponseItem::Proof(ProofItem {
                identifier: CredentialType::Orb,
                proof: "0xaa".into(),
                merkle_root: "0xbb".into(),
                nullifier: "0xcc".into(),
                issuer_schema_id: None,
                expires_at_min: None,
            })]
        );

        // A second reply does not overwrite the first.
        session.resolve(json!({"error_code": "verification_rejected"}));
        assert!(matches!(session.status(), Status::Confirmed(_)));
    }

    #[tokio::test]
    async fn host_failure() {
        let host = Host {
            received: Mutex::new(None),
            reply: None,
        };
        let mut session = session();
        assert_eq!(
            session.send(&host).await.unwrap(),
            &Status::Failed(AppErrorCode::FailedByHostApp)
        );
    }

    #[test]
    fn host_reported_error() {
        let mut session = session();
        assert_eq!(
            session.resolve(json!({"error_code": "user_rejected"})),
            &Status::Failed(AppErrorCode::VerificationRejected)
        );
    }
}
