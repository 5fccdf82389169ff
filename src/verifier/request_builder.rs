use serde_json::Value as Json;
use tracing::{debug, info};

use crate::{
    bridge::{ConnectUri, EncryptedPayload},
    core::{
        constraints::ConstraintNode,
        credential::{Signal, VerificationLevel},
        crypto::{hash_to_field, random_bytes, to_hex_prefixed, BridgeKeyMaterial},
        object::{TypedParameter, UntypedObject},
        preset::Preset,
        request::{
            parameters::{
                AllowLegacyProofs, Constraints, CredentialTypes, LegacySignal,
                LegacyVerificationLevel, Nonce, PresetParameter, ProtocolVersion, Requests,
                RpContextParameter,
            },
            RequestScope, PROTOCOL_VERSION,
        },
        response::ResultContext,
        rp_signature::{unix_now, RpContext},
    },
    error::{IdKitError, Result},
    native::NativeSession,
};

use super::{session::Session, IdKit};

/// What the relying party asks for.
#[derive(Debug, Clone)]
enum Requirement {
    Constraints(ConstraintNode),
    Preset(Preset),
}

#[derive(Debug, Clone)]
#[must_use]
pub struct RequestBuilder<'a> {
    allow_legacy_proofs: bool,
    idkit: &'a IdKit,
    request_parameters: UntypedObject,
    requirement: Option<Requirement>,
    rp_context: Option<RpContext>,
    scope: Option<RequestScope>,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(idkit: &'a IdKit) -> Self {
        Self {
            allow_legacy_proofs: false,
            idkit,
            request_parameters: idkit.default_request_params.clone(),
            requirement: None,
            rp_context: None,
            scope: None,
        }
    }

    /// Require the credentials described by a constraint tree.
    pub fn with_constraints(mut self, constraints: ConstraintNode) -> Self {
        self.requirement = Some(Requirement::Constraints(constraints));
        self
    }

    /// Require the credentials of a legacy preset. Replaces any constraint tree.
    pub fn with_preset(mut self, preset: Preset) -> Self {
        self.requirement = Some(Requirement::Preset(preset));
        self
    }

    /// Scope the proof to an action: one nullifier per user and action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.scope = Some(RequestScope::action(action));
        self
    }

    /// Scope the proof to an action, with a description shown in the wallet.
    pub fn with_action_description(
        mut self,
        action: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.scope = Some(RequestScope::Action {
            action: action.into(),
            description: Some(description.into()),
        });
        self
    }

    /// Action-less flow. Pass the id of an existing session to resume it.
    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.scope = Some(RequestScope::Session { session_id });
        self
    }

    /// Authenticate the request with a context signed by the RP backend.
    pub fn with_rp_context(mut self, rp_context: RpContext) -> Self {
        self.rp_context = Some(rp_context);
        self
    }

    pub fn allow_legacy_proofs(mut self, allow: bool) -> Self {
        self.allow_legacy_proofs = allow;
        self
    }

    /// Set or override a request parameter.
    pub fn with_request_parameter<T: TypedParameter>(mut self, t: T) -> Result<Self> {
        self.request_parameters
            .insert(t)
            .map_err(|e| IdKitError::InvalidConfiguration(format!("{e:#}")))?;
        Ok(self)
    }

    /// Encrypt the request, store it on the bridge and start a session.
    ///
    /// ## Returns
    /// A [Session] in `WaitingForConnection`, whose connect URI the caller should present to the
    /// user.
    pub async fn build(self) -> Result<Session> {
        let idkit = self.idkit;
        let (payload, context) = self.into_payload()?;

        let key = BridgeKeyMaterial::generate()?;
        let sealed = EncryptedPayload::seal(&key, &Json::from(payload))?;
        let request_id = idkit.bridge.submit(&sealed).await?;

        let connect_uri = ConnectUri::new(
            &idkit.connect_base_url,
            &request_id,
            &key,
            idkit.bridge.base_url(),
            idkit.partner,
        );
        info!(%request_id, "verification request created");

        Ok(Session::new(
            request_id,
            key,
            connect_uri,
            idkit.bridge.clone(),
            context,
        ))
    }

    /// Build the request for a host wallet app instead of the bridge.
    pub fn build_native(self) -> Result<NativeSession> {
        let (payload, context) = self.into_payload()?;
        Ok(NativeSession::new(payload, context))
    }

    /// Assemble the request payload together with what is needed to read the answer.
    pub(crate) fn into_payload(self) -> Result<(UntypedObject, ResultContext)> {
        let Self {
            allow_legacy_proofs,
            idkit,
            mut request_parameters,
            requirement,
            rp_context,
            scope,
        } = self;

        let Some(requirement) = requirement else {
            return Err(IdKitError::InvalidConfiguration(
                "constraints are required, see `with_constraints` or `with_preset`".into(),
            ));
        };
        let Some(scope) = scope else {
            return Err(IdKitError::InvalidConfiguration(
                "a scope is required, see `with_action` or `with_session`".into(),
            ));
        };

        let nonce = match &rp_context {
            Some(rp_context) => {
                if rp_context.is_expired(unix_now()) {
                    return Err(IdKitError::InvalidRpContext("rp context has expired".into()));
                }
                rp_context.nonce_hex()
            }
            None => to_hex_prefixed(&hash_to_field(&random_bytes::<32>()?)),
        };

        let (constraints, level, preset) = match requirement {
            Requirement::Constraints(constraints) => {
                let level = constraints
                    .credential_requests()
                    .first()
                    .map(|request| VerificationLevel::from(request.credential_type()));
                (constraints, level, None)
            }
            Requirement::Preset(preset) => {
                (preset.to_constraints(), Some(preset.verification_level()), Some(preset))
            }
        };
        let leaves: Vec<_> = constraints
            .credential_requests()
            .into_iter()
            .cloned()
            .collect();
        let signal_hash = leaves
            .first()
            .and_then(|request| request.signal())
            .map(Signal::hash)
            .unwrap_or_else(|| Signal::default().hash());

        (|| -> anyhow::Result<()> {
            request_parameters.insert(idkit.app_id.clone())?;
            request_parameters.insert(ProtocolVersion(PROTOCOL_VERSION.to_owned()))?;
            request_parameters.insert(Nonce(nonce.clone()))?;
            request_parameters.insert(idkit.environment)?;
            scope.write_into(&mut request_parameters)?;
            request_parameters.insert(CredentialTypes(constraints.credential_types()))?;
            request_parameters.insert(Requests(leaves))?;
            request_parameters.insert(Constraints(constraints))?;
            if let Some(preset) = preset {
                request_parameters.insert(PresetParameter(preset))?;
            }
            if let Some(level) = level {
                request_parameters.insert(LegacyVerificationLevel(level))?;
            }
            request_parameters.insert(LegacySignal(signal_hash))?;
            if let Some(rp_context) = rp_context {
                request_parameters.insert(RpContextParameter(rp_context))?;
            }
            request_parameters.insert(AllowLegacyProofs(allow_legacy_proofs))?;
            Ok(())
        })()
        .map_err(|e| IdKitError::InvalidConfiguration(format!("{e:#}")))?;

        debug!(
            keys = ?request_parameters.0.keys().collect::<Vec<_>>(),
            "assembled request payload"
        );

        let context = ResultContext {
            protocol_version: PROTOCOL_VERSION.to_owned(),
            nonce,
            scope,
            environment: idkit.environment,
        };
        Ok((request_parameters, context))
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use anyhow::bail;
    use async_trait::async_trait;
    use http::{Request, Response};
    use serde_json::json;

    use super::*;
    use crate::core::{
        credential::{CredentialRequest, CredentialType},
        object::ParsingErrorContext,
        request::parameters::Environment,
        rp_signature::{sign_request_at, ExecutionContext, Secp256k1Signer},
        util::AsyncHttpClient,
    };

    const KEY: &str = "0x0101010101010101010101010101010101010101010101010101010101010101";

    struct Offline;

    #[async_trait]
    impl AsyncHttpClient for Offline {
        async fn execute(&self, _: Request<Vec<u8>>) -> anyhow::Result<Response<Vec<u8>>> {
            bail!("offline")
        }
    }

    fn idkit() -> IdKit {
        IdKit::builder()
            .with_app_id("app_staging_123")
            .with_environment(Environment::Staging)
            .with_http_client(Arc::new(Offline))
            .build()
            .unwrap()
    }

    #[test]
    fn payload_carries_constraints_and_mirrors() {
        let idkit = idkit();
        let constraints = ConstraintNode::any(vec![
            CredentialRequest::new(CredentialType::Device)
                .with_signal("hello")
                .into(),
            CredentialType::Orb.into(),
            CredentialType::Device.into(),
        ])
        .unwrap();

        let (payload, context) = idkit
            .build_request()
            .with_action("vote")
            .with_constraints(constraints.clone())
            .into_payload()
            .unwrap();

        assert_eq!(payload.get::<Constraints>().parsing_error().unwrap().0, constraints);
        assert_eq!(
            payload.get::<LegacyVerificationLevel>().parsing_error().unwrap().0,
            VerificationLevel::Device
        );
        assert_eq!(
            payload.get::<LegacySignal>().parsing_error().unwrap().0,
            Signal::from("hello").hash()
        );
        assert_eq!(
            payload.get::<CredentialTypes>().parsing_error().unwrap().0,
            vec![CredentialType::Device, CredentialType::Orb]
        );
        assert_eq!(payload.get::<Requests>().parsing_error().unwrap().0.len(), 3);

        let json = Json::from(payload.clone());
        assert_eq!(json["app_id"], json!("app_staging_123"));
        assert_eq!(json["action"], json!("vote"));
        assert_eq!(json["environment"], json!("staging"));
        assert_eq!(json["protocol_version"], json!(PROTOCOL_VERSION));
        assert_eq!(json["allow_legacy_proofs"], json!(false));
        assert!(json.get("rp_context").is_none());
        assert!(json.get("preset").is_none());

        let nonce = payload.get::<Nonce>().parsing_error().unwrap().0;
        assert_eq!(nonce, context.nonce);
        assert!(nonce.starts_with("0x00"));
        assert_eq!(nonce.len(), 66);
    }

    #[test]
    fn preset_payload() {
        let (payload, _) = idkit()
            .build_request()
            .with_session(None)
            .with_preset(Preset::DocumentLegacy {
                signal: Some("user-1".into()),
            })
            .into_payload()
            .unwrap();

        let json = Json::from(payload);
        assert_eq!(json["verification_level"], json!("document"));
        assert_eq!(
            json["credential_types"],
            json!(["document", "secure_document", "orb"])
        );
        assert_eq!(json["preset"]["type"], json!("DocumentLegacy"));
        assert_eq!(json["signal"], json!(Signal::from("user-1").hash()));
        assert!(json.get("action").is_none());
        assert!(json.get("session_id").is_none());
    }

    #[test]
    fn rp_context_supplies_the_nonce() {
        let signer = Secp256k1Signer::from_hex(ExecutionContext::TrustedBackend, KEY).unwrap();
        let now = unix_now();
        let signature = sign_request_at(&signer, b"seed", now, 300).unwrap();
        let rp_context = RpContext::from_signature("rp_123", &signature).unwrap();

        let (payload, context) = idkit()
            .build_request()
            .with_action("vote")
            .with_constraints(CredentialType::Orb.into())
            .with_rp_context(rp_context.clone())
            .into_payload()
            .unwrap();

        assert_eq!(context.nonce, signature.nonce);
        assert_eq!(
            payload.get::<RpContextParameter>().parsing_error().unwrap().0,
            rp_context
        );
    }

    #[test]
    fn expired_rp_context_is_refused() {
        let signer = Secp256k1Signer::from_hex(ExecutionContext::TrustedBackend, KEY).unwrap();
        let signature = sign_request_at(&signer, b"seed", 1_000, 300).unwrap();
        let rp_context = RpContext::from_signature("rp_123", &signature).unwrap();

        let result = idkit()
            .build_request()
            .with_action("vote")
            .with_constraints(CredentialType::Orb.into())
            .with_rp_context(rp_context)
            .into_payload();
        assert!(matches!(result, Err(IdKitError::InvalidRpContext(_))));
    }

    #[test]
    fn missing_pieces() {
        let idkit = idkit();
        assert!(matches!(
            idkit.build_request().with_action("vote").into_payload(),
            Err(IdKitError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            idkit
                .build_request()
                .with_constraints(CredentialType::Orb.into())
                .into_payload(),
            Err(IdKitError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn bridge_failure_surfaces_on_create() {
        let result = idkit()
            .build_request()
            .with_action("vote")
            .with_constraints(CredentialType::Orb.into())
            .build()
            .await;
        assert!(matches!(result, Err(IdKitError::Bridge(_))));
    }
}
