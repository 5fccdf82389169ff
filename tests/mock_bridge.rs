use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::prelude::*;
use http::{Method, Request, Response, StatusCode};
use idkit::{
    bridge::{ConnectUri, EncryptedPayload},
    core::{crypto::BridgeKeyMaterial, util::AsyncHttpClient},
    verifier::IdKit,
};
use serde_json::{json, Value as Json};
use tokio::sync::Notify;

pub const REQUEST_ID: &str = "req_0123";

/// What the bridge answers to the next status fetch.
pub enum Reply {
    Status(Json),
    Unreachable,
}

/// In-memory bridge. Status fetches are answered from a script; once it runs dry the request
/// stays `initialized`.
#[derive(Default)]
pub struct MockBridge {
    stored: Mutex<Option<EncryptedPayload>>,
    script: Mutex<VecDeque<Reply>>,
    uris: Mutex<Vec<String>>,
    /// When set, each status fetch signals `entered` and waits for `release`.
    gate: Option<Gate>,
}

pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

impl MockBridge {
    pub fn gated() -> Self {
        Self {
            gate: Some(Gate {
                entered: Notify::new(),
                release: Notify::new(),
            }),
            ..Default::default()
        }
    }

    pub fn gate(&self) -> &Gate {
        self.gate.as_ref().unwrap()
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn push_status(&self, status: Json) {
        self.push(Reply::Status(status));
    }

    pub fn stored(&self) -> EncryptedPayload {
        self.stored.lock().unwrap().clone().unwrap()
    }

    pub fn uris(&self) -> Vec<String> {
        self.uris.lock().unwrap().clone()
    }

    pub fn status_fetches(&self) -> usize {
        self.uris()
            .iter()
            .filter(|uri| uri.contains("/response/"))
            .count()
    }
}

fn json_response(status: StatusCode, body: Json) -> Result<Response<Vec<u8>>> {
    Response::builder()
        .status(status)
        .body(serde_json::to_vec(&body)?)
        .context("unable to build mock response")
}

#[async_trait]
impl AsyncHttpClient for MockBridge {
    async fn execute(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>> {
        let uri = request.uri().to_string();
        self.uris.lock().unwrap().push(uri.clone());

        if request.method() == Method::POST && uri.ends_with("/request") {
            let payload: EncryptedPayload = serde_json::from_slice(request.body())?;
            *self.stored.lock().unwrap() = Some(payload);
            return json_response(StatusCode::CREATED, json!({ "request_id": REQUEST_ID }));
        }

        if request.method() == Method::GET && uri.ends_with(&format!("/response/{REQUEST_ID}")) {
            if let Some(gate) = &self.gate {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
            let next = self.script.lock().unwrap().pop_front();
            return match next {
                Some(Reply::Status(body)) => json_response(StatusCode::OK, body),
                Some(Reply::Unreachable) => bail!("connection reset by peer"),
                None => json_response(StatusCode::OK, json!({ "status": "initialized" })),
            };
        }

        json_response(StatusCode::NOT_FOUND, json!({ "error": "not found" }))
    }
}

pub fn idkit_client(bridge: Arc<MockBridge>) -> IdKit {
    IdKit::builder()
        .with_app_id("app_staging_0123456789")
        .with_http_client(bridge)
        .build()
        .unwrap()
}

/// The key a wallet would read from the connect URI.
pub fn key_from_uri(uri: &ConnectUri) -> BridgeKeyMaterial {
    let (_, k) = uri
        .as_url()
        .query_pairs()
        .find(|(name, _)| name == "k")
        .unwrap();
    let key: [u8; 32] = BASE64_STANDARD.decode(k.as_bytes()).unwrap().try_into().unwrap();
    BridgeKeyMaterial::from_parts(key, [0x42; 12])
}

/// A `completed` status carrying `payload`, encrypted the way a wallet would.
pub fn completed(uri: &ConnectUri, payload: &Json) -> Json {
    let sealed = EncryptedPayload::seal(&key_from_uri(uri), payload).unwrap();
    json!({ "status": "completed", "response": sealed })
}
