use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use idkit_frontend::{AppErrorCode, VerificationState};
use serde_json::Value as Json;
use tokio::time::{sleep_until, timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    bridge::{BridgeClient, BridgeResponse, BridgeStatus, ConnectUri, StatusResponse},
    config::PollOptions,
    core::{
        crypto::BridgeKeyMaterial,
        response::{decode_response, IdKitResult, ResponseOutcome, ResultContext},
    },
    error::{IdKitError, Result},
};

/// Where a verification request stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    /// Stored on the bridge, no wallet has fetched it yet.
    WaitingForConnection,
    /// A wallet fetched the request and is waiting on the user.
    AwaitingConfirmation,
    Confirmed(IdKitResult),
    Failed(AppErrorCode),
}

impl Status {
    pub fn state(&self) -> VerificationState {
        match self {
            Status::WaitingForConnection => VerificationState::WaitingForConnection,
            Status::AwaitingConfirmation => VerificationState::AwaitingConfirmation,
            Status::Confirmed(_) => VerificationState::Confirmed,
            Status::Failed(_) => VerificationState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// The outcome, once the status is terminal.
    pub fn outcome(&self) -> Option<ResponseOutcome> {
        match self {
            Status::Confirmed(result) => Some(ResponseOutcome::Confirmed(result.clone())),
            Status::Failed(code) => Some(ResponseOutcome::Failed(*code)),
            Status::WaitingForConnection | Status::AwaitingConfirmation => None,
        }
    }
}

impl From<ResponseOutcome> for Status {
    fn from(value: ResponseOutcome) -> Self {
        match value {
            ResponseOutcome::Confirmed(result) => Status::Confirmed(result),
            ResponseOutcome::Failed(code) => Status::Failed(code),
        }
    }
}

/// Signals that can reach a [Session] from outside the task polling it.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    engaged: Arc<AtomicBool>,
    cancellation: CancellationToken,
}

impl SessionHandle {
    /// Stop the session. A running poll loop resolves to [AppErrorCode::Cancelled] and nothing
    /// fetched afterwards is delivered.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Record that the wallet engaged with the request through a channel other than the bridge,
    /// such as a deep-link callback.
    ///
    /// From then on a `connection_failed` from the bridge is terminal instead of retried.
    pub fn notify_engaged(&self) {
        self.engaged.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// One verification request relayed through the bridge.
///
/// Created by [RequestBuilder::build](super::request_builder::RequestBuilder::build). The key
/// material lives exactly as long as the session is non-terminal.
#[derive(Debug)]
pub struct Session {
    request_id: String,
    connect_uri: ConnectUri,
    key: Option<BridgeKeyMaterial>,
    status: Status,
    bridge: BridgeClient,
    context: ResultContext,
    handle: SessionHandle,
}

impl Session {
    pub(crate) fn new(
        request_id: String,
        key: BridgeKeyMaterial,
        connect_uri: ConnectUri,
        bridge: BridgeClient,
        context: ResultContext,
    ) -> Self {
        Self {
            request_id,
            connect_uri,
            key: Some(key),
            status: Status::WaitingForConnection,
            bridge,
            context,
            handle: SessionHandle {
                engaged: Arc::new(AtomicBool::new(false)),
                cancellation: CancellationToken::new(),
            },
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Deep link to show as a QR code or open directly.
    pub fn connect_uri(&self) -> &ConnectUri {
        &self.connect_uri
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    /// Nonce the returned proofs are bound to.
    pub fn nonce(&self) -> &str {
        &self.context.nonce
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn notify_engaged(&self) {
        self.handle.notify_engaged();
    }

    /// Cancel the session and discard its key material.
    ///
    /// Any further poll fails with [IdKitError::SessionClosed].
    pub fn cancel(&mut self) {
        self.handle.cancel();
        self.close_cancelled();
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Fetch the bridge status once and advance the state machine.
    ///
    /// A terminal session is returned as is, without contacting the bridge.
    ///
    /// # Errors
    /// [IdKitError::SessionClosed] once the session has been cancelled. Decryption failures and
    /// malformed bridge payloads are returned as errors and leave the status untouched.
    pub async fn poll_once(&mut self) -> Result<&Status> {
        if self.is_closed() {
            return Err(IdKitError::SessionClosed);
        }
        if self.status.is_terminal() {
            return Ok(&self.status);
        }

        let fetched = self.bridge.fetch_status(&self.request_id).await;
        if self.is_closed() {
            debug!(request_id = %self.request_id, "discarding poll result after cancellation");
            self.close_cancelled();
            return Err(IdKitError::SessionClosed);
        }

        self.apply(fetched)?;
        Ok(&self.status)
    }

    /// Poll until the request reaches a terminal state, `options.timeout` elapses, or the session
    /// is cancelled through a [SessionHandle].
    ///
    /// Ordinary failures, including timeout and cancellation, are returned as
    /// [ResponseOutcome::Failed].
    pub async fn poll_until_completion(&mut self, options: PollOptions) -> Result<ResponseOutcome> {
        self.poll_until_completion_with(options, |_| ()).await
    }

    /// Like [Session::poll_until_completion], calling `observer` on every status change.
    ///
    /// The observer is never called once cancellation has been observed.
    pub async fn poll_until_completion_with<F>(
        &mut self,
        options: PollOptions,
        mut observer: F,
    ) -> Result<ResponseOutcome>
    where
        F: FnMut(&Status),
    {
        if self.is_closed() {
            return Err(IdKitError::SessionClosed);
        }

        // A timeout too large to represent never expires.
        let deadline = Instant::now().checked_add(options.timeout);
        let mut last_state = self.status.state();

        loop {
            if self.is_closed() {
                return Ok(self.close_cancelled());
            }
            if let Some(outcome) = self.status.outcome() {
                return Ok(outcome);
            }
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                let outcome = self.time_out();
                observer(&self.status);
                return Ok(outcome);
            }

            let fetch = self.bridge.fetch_status(&self.request_id);
            let fetched = match deadline {
                Some(deadline) => timeout_at(deadline, fetch).await,
                None => Ok(fetch.await),
            };
            let Ok(fetched) = fetched else {
                if self.is_closed() {
                    return Ok(self.close_cancelled());
                }
                let outcome = self.time_out();
                observer(&self.status);
                return Ok(outcome);
            };

            if self.is_closed() {
                debug!(request_id = %self.request_id, "discarding poll result after cancellation");
                return Ok(self.close_cancelled());
            }

            self.apply(fetched)?;
            if self.status.state() != last_state {
                last_state = self.status.state();
                observer(&self.status);
            }
            if let Some(outcome) = self.status.outcome() {
                return Ok(outcome);
            }

            let wake_at = match (Instant::now().checked_add(options.interval), deadline) {
                (Some(next), Some(deadline)) => Some(next.min(deadline)),
                (next, deadline) => next.or(deadline),
            };
            let Some(wake_at) = wake_at else {
                // Neither the interval nor the timeout ever elapses, only cancellation ends the
                // wait.
                self.handle.cancellation.cancelled().await;
                continue;
            };
            tokio::select! {
                _ = self.handle.cancellation.cancelled() => {}
                _ = sleep_until(wake_at) => {}
            }
        }
    }

    fn apply(&mut self, fetched: Result<StatusResponse>) -> Result<()> {
        let StatusResponse { status, response } = match fetched {
            Ok(response) => response,
            Err(IdKitError::Bridge(e)) => {
                self.connection_failed(&format!("{e:#}"));
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        match (status, response) {
            (BridgeStatus::Initialized, _) => {
                // A wallet that already engaged does not move the request back.
                if self.status == Status::WaitingForConnection {
                    debug!(request_id = %self.request_id, "waiting for a wallet to connect");
                }
            }
            (BridgeStatus::Retrieved, _) => self.transition(Status::AwaitingConfirmation),
            (BridgeStatus::Completed, Some(BridgeResponse::Encrypted(payload))) => {
                let Some(key) = &self.key else {
                    return Err(IdKitError::SessionClosed);
                };
                let plaintext: Json = payload.open(key)?;
                let outcome = decode_response(plaintext, &self.context);
                self.transition(outcome.into());
            }
            (
                BridgeStatus::Completed | BridgeStatus::Failed,
                Some(BridgeResponse::Error { error_code }),
            ) => self.wallet_error(error_code),
            (BridgeStatus::Completed, None) => {
                return Err(IdKitError::MalformedResponse(
                    "bridge reported completion without a response".into(),
                ))
            }
            (BridgeStatus::Failed, _) => self.transition(Status::Failed(AppErrorCode::GenericError)),
        }
        Ok(())
    }

    fn wallet_error(&mut self, error_code: AppErrorCode) {
        if error_code == AppErrorCode::ConnectionFailed {
            self.connection_failed("bridge reported connection_failed");
        } else {
            self.transition(Status::Failed(error_code));
        }
    }

    /// Before any counterpart activity the relay may simply not have stored the request yet, so
    /// the failure is retried. Afterwards it is terminal.
    fn connection_failed(&mut self, reason: &str) {
        if self.has_engaged() {
            warn!(request_id = %self.request_id, "connection failed: {reason}");
            self.transition(Status::Failed(AppErrorCode::ConnectionFailed));
        } else {
            debug!(
                request_id = %self.request_id,
                "bridge not ready yet, retrying: {reason}"
            );
        }
    }

    fn has_engaged(&self) -> bool {
        self.status != Status::WaitingForConnection
            || self.handle.engaged.load(Ordering::Acquire)
    }

    fn time_out(&mut self) -> ResponseOutcome {
        info!(request_id = %self.request_id, "verification request timed out");
        self.transition(Status::Failed(AppErrorCode::Timeout));
        ResponseOutcome::Failed(AppErrorCode::Timeout)
    }

    fn close_cancelled(&mut self) -> ResponseOutcome {
        self.key = None;
        if !self.status.is_terminal() {
            info!(request_id = %self.request_id, "verification request cancelled");
            self.status = Status::Failed(AppErrorCode::Cancelled);
        }
        ResponseOutcome::Failed(AppErrorCode::Cancelled)
    }

    fn transition(&mut self, status: Status) {
        if self.status == status {
            return;
        }
        debug!(
            request_id = %self.request_id,
            from = ?self.status.state(),
            to = ?status.state(),
            "status changed"
        );
        self.status = status;
        if self.status.is_terminal() {
            self.key = None;
        }
    }
}
