//! # Approval Orchestrator
//!
//! Drives a transaction or signature request from creation to a terminal
//! status:
//!
//! ```text
//! create ──► read status ──► success ──► receipt
//!               │    ▲  └──► failed  ──► RemoteFailure
//!               │    │
//!               ▼    │
//!        awaiting-approval ──► sign locally / submit external ──► approve
//! ```
//!
//! The loop is synchronous and bounded by an explicit [`PollPolicy`]. The
//! create response is only used for its id; every decision is made from a
//! fresh status read. Transient transport failures are retried within a
//! small budget before they surface as [`Error::Submission`].

use crate::delegated::DelegatedSignerRegistry;
use crate::intent::Intent;
use crate::locator::WalletLocator;
use crate::signer::SignerConfig;
use crate::transport::{CustodyTransport, TransportResult};
use crate::{ApprovalSubmission, Error, RemoteRequest, RequestKind, RequestStatus, Result, SignerRef};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// When polling gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollBound {
    /// Stop after this many status reads
    MaxAttempts(u32),
    /// Stop once this much time has passed since polling started
    Deadline(Duration),
}

/// How the orchestrator polls a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between status reads
    pub interval: Duration,
    /// When polling gives up: an attempt count or a wall-clock deadline
    pub bound: PollBound,
    /// Consecutive transient failures tolerated per call
    pub max_transient_retries: u32,
}

impl PollPolicy {
    pub const DEFAULT_TRANSIENT_RETRIES: u32 = 3;

    pub fn new(interval: Duration, bound: PollBound) -> Self {
        Self {
            interval,
            bound,
            max_transient_retries: Self::DEFAULT_TRANSIENT_RETRIES,
        }
    }

    /// A human approves from another device: poll every 3s for 10 minutes
    pub fn human_approval() -> Self {
        Self::new(
            Duration::from_secs(3),
            PollBound::Deadline(Duration::from_secs(600)),
        )
    }

    /// Every approval is signed in-process: poll every 2s for 60 seconds
    pub fn local_signer() -> Self {
        Self::new(
            Duration::from_secs(2),
            PollBound::Deadline(Duration::from_secs(60)),
        )
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_bound(mut self, bound: PollBound) -> Self {
        self.bound = bound;
        self
    }

    pub fn with_max_attempts(self, attempts: u32) -> Self {
        self.with_bound(PollBound::MaxAttempts(attempts))
    }

    pub fn with_deadline(self, deadline: Duration) -> Self {
        self.with_bound(PollBound::Deadline(deadline))
    }

    pub fn with_max_transient_retries(mut self, retries: u32) -> Self {
        self.max_transient_retries = retries;
        self
    }

    /// Reject policies that could never read a status
    pub fn validate(&self) -> Result<()> {
        if self.bound == PollBound::MaxAttempts(0) {
            return Err(Error::Configuration(
                "Poll bound must allow at least one attempt".into(),
            ));
        }
        Ok(())
    }

    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        match self.bound {
            PollBound::MaxAttempts(max) => attempts >= max,
            PollBound::Deadline(deadline) => elapsed >= deadline,
        }
    }

    /// Pause before the next read, never past the deadline
    fn pause_after(&self, elapsed: Duration) -> Duration {
        match self.bound {
            PollBound::MaxAttempts(_) => self.interval,
            PollBound::Deadline(deadline) => self.interval.min(deadline.saturating_sub(elapsed)),
        }
    }
}

/// Cooperative cancellation shared between a caller and a running poll loop
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake any waiting poll loop
    pub fn cancel(&self) {
        let (flag, wake) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep for up to `duration`; returns `true` if cancelled meanwhile
    pub fn sleep(&self, duration: Duration) -> bool {
        let (flag, wake) = &*self.inner;
        let guard = flag.lock().unwrap_or_else(PoisonError::into_inner);
        if duration.is_zero() {
            return *guard;
        }
        let (guard, _) = wake
            .wait_timeout_while(guard, duration, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// State machine shared by the EVM and Solana wallets
pub struct ApprovalOrchestrator<T: CustodyTransport> {
    transport: T,
    signer: SignerConfig,
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl<T: CustodyTransport> ApprovalOrchestrator<T> {
    pub fn new(transport: T, signer: SignerConfig, policy: PollPolicy) -> Self {
        Self {
            transport,
            signer,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `token` instead of the orchestrator's own token
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn signer(&self) -> &SignerConfig {
        &self.signer
    }

    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Handle that cancels polling from another thread
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Create a request for `intent` and drive it to a terminal status
    pub fn submit(&self, locator: &WalletLocator, intent: &Intent) -> Result<RemoteRequest> {
        let family = locator.family();
        self.policy.validate()?;
        self.signer.ensure_family(family)?;
        intent.validate(family)?;
        self.check_required_signers(locator.as_str(), &intent.required_signers)?;

        let kind = intent.kind();
        let created = self
            .transport
            .create_request(locator.as_str(), kind, &intent.to_body())
            .map_err(|source| Error::Submission {
                id: None,
                stage: "create",
                source,
            })?;

        info!(
            request_id = %created.id,
            locator = %locator,
            kind = %kind,
            chain = %intent.chain,
            "Request created"
        );

        let external: Vec<ApprovalSubmission> = intent
            .external_approvals
            .iter()
            .filter(|a| intent.required_signers.iter().any(|r| r.matches(&a.signer)))
            .cloned()
            .collect();

        self.poll(kind, locator.as_str(), &created.id, &external)
    }

    /// Drive an existing request, e.g. after a timeout or cancellation
    pub fn resume(&self, kind: RequestKind, locator: &str, id: &str) -> Result<RemoteRequest> {
        self.resume_with(kind, locator, id, &[])
    }

    /// Drive an existing request, submitting `external` approvals for any of
    /// their signers still pending
    pub fn resume_with(
        &self,
        kind: RequestKind,
        locator: &str,
        id: &str,
        external: &[ApprovalSubmission],
    ) -> Result<RemoteRequest> {
        self.policy.validate()?;
        info!(request_id = id, locator, kind = %kind, "Resuming request");
        self.poll(kind, locator, id, external)
    }

    /// Submit approvals for a request without polling it
    pub fn approve(
        &self,
        kind: RequestKind,
        locator: &str,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> Result<RemoteRequest> {
        if approvals.is_empty() {
            return Err(Error::Configuration("No approvals to submit".into()));
        }
        let request = self.with_retries("approve", id, || {
            self.transport.approve_request(locator, kind, id, approvals)
        })?;
        info!(
            request_id = id,
            locator,
            count = approvals.len(),
            status = %request.status,
            "Approvals submitted"
        );
        Ok(request)
    }

    /// Required signers other than us must be the wallet's admin, or
    /// registered and unexpired delegates
    fn check_required_signers(&self, locator: &str, required: &[SignerRef]) -> Result<()> {
        let identity = self.signer.signer_identity();
        let others: Vec<SignerRef> = required
            .iter()
            .filter(|s| !s.matches(&identity))
            .cloned()
            .collect();
        if others.is_empty() {
            return Ok(());
        }

        let check = DelegatedSignerRegistry::new(&self.transport).check(locator, &others)?;
        if check.all_active() {
            return Ok(());
        }

        // The admin is never a delegate; only look it up when something is missing
        let admin = self
            .transport
            .get_wallet(locator)
            .map_err(|source| Error::Submission {
                id: None,
                stage: "get wallet",
                source,
            })?
            .admin_ref();
        let absent: Vec<&str> = check
            .absent
            .iter()
            .filter(|s| !admin.as_ref().is_some_and(|a| a.matches(s)))
            .map(SignerRef::as_str)
            .collect();
        if !absent.is_empty() {
            return Err(Error::Configuration(format!(
                "Required signers not registered or expired: {}",
                absent.join(", ")
            )));
        }
        Ok(())
    }

    fn poll(
        &self,
        kind: RequestKind,
        locator: &str,
        id: &str,
        external: &[ApprovalSubmission],
    ) -> Result<RemoteRequest> {
        let identity = self.signer.signer_identity();
        let started = Instant::now();
        let mut attempts = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(self.cancelled(id));
            }

            attempts += 1;
            let request = self.with_retries("read status", id, || {
                self.transport.get_request(locator, kind, id)
            })?;
            debug!(request_id = id, status = %request.status, attempt = attempts, "Status read");

            match &request.status {
                RequestStatus::Success | RequestStatus::Failed => {
                    return self.settle(kind, id, request);
                }
                RequestStatus::AwaitingApproval => {
                    let approvals = self.collect_approvals(&request, &identity, external)?;
                    if approvals.is_empty() {
                        debug!(request_id = id, "Waiting on approvals from other signers");
                    } else {
                        let approved = self.approve(kind, locator, id, &approvals)?;
                        if approved.status.is_terminal() {
                            return self.settle(kind, id, approved);
                        }
                    }
                }
                RequestStatus::Pending => {}
                RequestStatus::Unknown(status) => {
                    warn!(request_id = id, status = %status, "Unknown request status, treating as pending");
                }
            }

            let elapsed = started.elapsed();
            if self.policy.exhausted(attempts, elapsed) {
                warn!(request_id = id, attempts, status = %request.status, "Poll bound exhausted");
                return Err(Error::Timeout {
                    id: id.to_string(),
                    last_status: request.status,
                    attempts,
                });
            }

            if self.cancel.sleep(self.policy.pause_after(elapsed)) {
                return Err(self.cancelled(id));
            }
        }
    }

    /// Approvals this process can contribute to `request` right now.
    ///
    /// A local keypair signs only the pending entry addressed to it. Failing
    /// that, caller-supplied signatures are submitted for every signer that
    /// is still pending.
    fn collect_approvals(
        &self,
        request: &RemoteRequest,
        identity: &SignerRef,
        external: &[ApprovalSubmission],
    ) -> Result<Vec<ApprovalSubmission>> {
        let Some(approvals) = request.approvals.as_ref() else {
            return Ok(Vec::new());
        };

        if self.signer.can_sign_locally() {
            if let Some(pending) = approvals.pending_for(identity) {
                let signature = self.signer.sign(&pending.message)?;
                debug!(request_id = %request.id, signer = %pending.signer, "Signed approval locally");
                return Ok(vec![ApprovalSubmission::new(pending.signer.clone(), signature)]);
            }
        }

        Ok(external
            .iter()
            .filter_map(|supplied| {
                approvals
                    .pending_for(&supplied.signer)
                    .map(|p| ApprovalSubmission::new(p.signer.clone(), supplied.signature.clone()))
            })
            .collect())
    }

    fn settle(&self, kind: RequestKind, id: &str, request: RemoteRequest) -> Result<RemoteRequest> {
        if request.status == RequestStatus::Failed {
            let reason = request.failure_reason();
            warn!(request_id = id, reason = %reason, "Request failed");
            return Err(Error::RemoteFailure {
                id: id.to_string(),
                reason,
            });
        }

        if kind == RequestKind::Signature && request.output_signature.is_none() {
            return Err(Error::MalformedResponse {
                id: id.to_string(),
                detail: "signature succeeded without outputSignature".into(),
            });
        }

        info!(request_id = id, tx_id = ?request.tx_id(), "Request succeeded");
        Ok(request)
    }

    fn with_retries<R>(
        &self,
        stage: &'static str,
        id: &str,
        mut call: impl FnMut() -> TransportResult<R>,
    ) -> Result<R> {
        let mut failures = 0u32;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && failures < self.policy.max_transient_retries => {
                    failures += 1;
                    warn!(request_id = id, stage, error = %e, failures, "Transient failure, retrying");
                    if self.cancel.sleep(self.policy.interval) {
                        return Err(self.cancelled(id));
                    }
                }
                Err(source) => {
                    return Err(Error::Submission {
                        id: Some(id.to_string()),
                        stage,
                        source,
                    });
                }
            }
        }
    }

    fn cancelled(&self, id: &str) -> Error {
        info!(request_id = id, "Polling cancelled");
        Error::Cancelled { id: id.to_string() }
    }
}
