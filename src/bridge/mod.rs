//! Encrypted relay between the requesting client and the wallet.
//!
//! The bridge only ever sees ciphertext. A request is submitted once with `POST /request` and the
//! answer is fetched with `GET /response/{request_id}` until the wallet has replied.
use std::{fmt, sync::Arc};

use anyhow::{bail, Context};
use base64::prelude::*;
use http::header::CONTENT_TYPE;
use idkit_frontend::AppErrorCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::BridgeUrl,
    core::{
        crypto::BridgeKeyMaterial,
        util::{base_request, AsyncHttpClient},
    },
    error::{IdKitError, Result},
};

pub use self::connect_uri::ConnectUri;

mod connect_uri;

/// AEAD ciphertext as carried over the bridge, both ways.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Base64 of the 12-byte nonce.
    pub iv: String,
    /// Base64 of `ciphertext || tag`.
    pub payload: String,
}

impl EncryptedPayload {
    /// Serialize `value` to JSON and encrypt it with the material's own nonce.
    pub fn seal<T: Serialize + ?Sized>(key: &BridgeKeyMaterial, value: &T) -> Result<Self> {
        let plaintext = serde_json::to_vec(value)?;
        let ciphertext = key.encrypt(&plaintext)?;
        Ok(Self {
            iv: BASE64_STANDARD.encode(key.nonce()),
            payload: BASE64_STANDARD.encode(ciphertext),
        })
    }

    /// Decrypt and parse the payload.
    ///
    /// # Errors
    /// [IdKitError::DecryptionError] if either field is not base64 or authentication fails;
    /// [IdKitError::MalformedResponse] if the plaintext is not valid JSON for `T`.
    pub fn open<T: DeserializeOwned>(&self, key: &BridgeKeyMaterial) -> Result<T> {
        let iv = BASE64_STANDARD
            .decode(&self.iv)
            .map_err(|_| IdKitError::DecryptionError)?;
        let ciphertext = BASE64_STANDARD
            .decode(&self.payload)
            .map_err(|_| IdKitError::DecryptionError)?;
        let plaintext = key.decrypt(&iv, &ciphertext)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| IdKitError::MalformedResponse(format!("decrypted payload: {e}")))
    }
}

/// Progress of a request as reported by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeStatus {
    /// Stored, not fetched by a wallet yet.
    Initialized,
    /// A wallet fetched the request.
    Retrieved,
    /// The wallet answered.
    Completed,
    Failed,
}

/// What the bridge holds for a request once the wallet answered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BridgeResponse {
    Encrypted(EncryptedPayload),
    Error { error_code: AppErrorCode },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusResponse {
    pub status: BridgeStatus,
    #[serde(default)]
    pub response: Option<BridgeResponse>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    request_id: String,
}

/// HTTP client for one bridge deployment.
#[derive(Clone)]
pub struct BridgeClient {
    http_client: Arc<dyn AsyncHttpClient + Send + Sync>,
    base_url: BridgeUrl,
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl BridgeClient {
    pub fn new(http_client: Arc<dyn AsyncHttpClient + Send + Sync>, base_url: BridgeUrl) -> Self {
        Self {
            http_client,
            base_url,
        }
    }

    pub fn base_url(&self) -> &BridgeUrl {
        &self.base_url
    }

    /// Store an encrypted request on the bridge.
    ///
    /// ## Returns
    /// The bridge-assigned request id.
    pub async fn submit(&self, payload: &EncryptedPayload) -> Result<String> {
        self.try_submit(payload).await.map_err(IdKitError::Bridge)
    }

    async fn try_submit(&self, payload: &EncryptedPayload) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join("request")
            .context("unable to build the bridge request url")?;
        let request = base_request()
            .method("POST")
            .uri(url.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(payload)?)
            .context("failed to construct bridge request")?;

        let response = self
            .http_client
            .execute(request)
            .await
            .context("failed to submit the request to the bridge")?;

        let status = response.status();
        if !status.is_success() {
            bail!("bridge rejected the request (status: {status})")
        }

        let SubmitResponse { request_id } = serde_json::from_slice(response.body())
            .context("bridge returned an unexpected body for a submitted request")?;
        debug!(%request_id, "request stored on the bridge");
        Ok(request_id)
    }

    /// Fetch the status of a stored request.
    ///
    /// # Errors
    /// [IdKitError::Bridge] if the bridge could not be reached or answered with a non-success
    /// status; [IdKitError::MalformedResponse] if it answered with a body that is not a status.
    pub async fn fetch_status(&self, request_id: &str) -> Result<StatusResponse> {
        let body = self
            .try_fetch_status(request_id)
            .await
            .map_err(IdKitError::Bridge)?;
        serde_json::from_slice(&body)
            .map_err(|e| IdKitError::MalformedResponse(format!("bridge status: {e}")))
    }

    async fn try_fetch_status(&self, request_id: &str) -> anyhow::Result<Vec<u8>> {
        let mut url = self.base_url.as_url().clone();
        {
            let Ok(mut path) = url.path_segments_mut() else {
                bail!("invalid base URL for the bridge")
            };
            path.pop_if_empty().push("response").push(request_id);
        }
        let request = base_request()
            .method("GET")
            .uri(url.as_str())
            .body(Vec::new())
            .context("failed to construct bridge status request")?;

        let response = self
            .http_client
            .execute(request)
            .await
            .context("failed to fetch the request status from the bridge")?;

        let status = response.status();
        if !status.is_success() {
            bail!("bridge status request was unsuccessful (status: {status})")
        }
        Ok(response.into_body())
    }
}

#[cfg(test)]
mod test {
    use serde_json::{json, Value as Json};

    use super::*;

    #[test]
    fn seal_then_open() {
        let key = BridgeKeyMaterial::from_parts([7u8; 32], [9u8; 12]);
        let sealed = EncryptedPayload::seal(&key, &json!({"app_id": "app_123"})).unwrap();
        assert_eq!(sealed.iv, BASE64_STANDARD.encode([9u8; 12]));

        let opened: Json = sealed.open(&key).unwrap();
        assert_eq!(opened, json!({"app_id": "app_123"}));
    }

    #[test]
    fn open_with_wrong_key_or_garbage() {
        let key = BridgeKeyMaterial::from_parts([7u8; 32], [9u8; 12]);
        let other = BridgeKeyMaterial::from_parts([8u8; 32], [9u8; 12]);
        let sealed = EncryptedPayload::seal(&key, &json!({"a": 1})).unwrap();

        assert!(matches!(
            sealed.open::<Json>(&other),
            Err(IdKitError::DecryptionError)
        ));

        let garbage = EncryptedPayload {
            iv: "not base64!".into(),
            payload: sealed.payload.clone(),
        };
        assert!(matches!(
            garbage.open::<Json>(&key),
            Err(IdKitError::DecryptionError)
        ));
    }

    #[test]
    fn open_non_json_plaintext() {
        let key = BridgeKeyMaterial::from_parts([1u8; 32], [2u8; 12]);
        let sealed = EncryptedPayload {
            iv: BASE64_STANDARD.encode(key.nonce()),
            payload: BASE64_STANDARD.encode(key.encrypt(b"not json").unwrap()),
        };
        assert!(matches!(
            sealed.open::<Json>(&key),
            Err(IdKitError::MalformedResponse(_))
        ));
    }

    #[test]
    fn status_shapes() {
        let pending: StatusResponse =
            serde_json::from_value(json!({"status": "initialized"})).unwrap();
        assert_eq!(pending.status, BridgeStatus::Initialized);
        assert!(pending.response.is_none());

        let completed: StatusResponse = serde_json::from_value(json!({
            "status": "completed",
            "response": {"iv": "AAAA", "payload": "BBBB"}
        }))
        .unwrap();
        assert!(matches!(
            completed.response,
            Some(BridgeResponse::Encrypted(_))
        ));

        let failed: StatusResponse = serde_json::from_value(json!({
            "status": "failed",
            "response": {"error_code": "connection_failed"}
        }))
        .unwrap();
        assert_eq!(
            failed.response,
            Some(BridgeResponse::Error {
                error_code: AppErrorCode::ConnectionFailed
            })
        );

        assert!(serde_json::from_value::<StatusResponse>(json!({"status": "exploded"})).is_err());
    }
}
