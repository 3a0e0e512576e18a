//! Invariant tests for the approval orchestrator
//!
//! A scripted transport replays a fixed sequence of status reads so each
//! guarantee of the poll loop can be pinned down independently of the
//! in-memory service:
//! - Decisions come from status reads, never from the create response
//! - Unknown statuses are non-terminal
//! - Only our own pending entry is signed
//! - Failures and malformed successes surface as typed errors
//! - The attempt bound is exact

use custody_wallet_core::{
    ApprovalOrchestrator, ApprovalSubmission, Approvals, Chain, CustodyTransport, Error,
    EvmCall, EvmKeypair, Intent, OnChain, PendingApproval, PollPolicy, RemoteError,
    RemoteRequest, RequestKind, RequestStatus, SignerConfig, SignerRef, SignatureReceipt,
    TransactionReceipt, TransportError, WalletLocator, WalletType,
    delegated::{DelegatedSigner, RegisterSignerBody},
    intent::CreateRequestBody,
    transport::TransportResult,
    wallet::{BalanceQuery, CreateWalletBody, TokenBalance, WalletInfo},
};
use proptest::prelude::*;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const TO: &str = "0x1234567890123456789012345678901234567890";
const ID: &str = "req-1";

// ============================================================================
// Scripted transport
// ============================================================================

/// Transport that answers status reads from a script
struct Scripted {
    create: TransportResult<RemoteRequest>,
    reads: Mutex<VecDeque<TransportResult<RemoteRequest>>>,
    read_count: AtomicU32,
    approved: Mutex<Vec<Vec<ApprovalSubmission>>>,
}

impl Scripted {
    fn new(reads: Vec<TransportResult<RemoteRequest>>) -> Arc<Self> {
        Self::with_create(Ok(RemoteRequest::new(ID, RequestStatus::Pending)), reads)
    }

    fn with_create(
        create: TransportResult<RemoteRequest>,
        reads: Vec<TransportResult<RemoteRequest>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            create,
            reads: Mutex::new(reads.into()),
            read_count: AtomicU32::new(0),
            approved: Mutex::new(Vec::new()),
        })
    }

    fn reads(&self) -> u32 {
        self.read_count.load(Ordering::SeqCst)
    }

    fn approvals(&self) -> Vec<Vec<ApprovalSubmission>> {
        self.approved.lock().unwrap().clone()
    }
}

impl CustodyTransport for Scripted {
    fn create_wallet(&self, _body: &CreateWalletBody) -> TransportResult<WalletInfo> {
        Err(TransportError::NotFound("unscripted".into()))
    }

    fn get_wallet(&self, _locator: &str) -> TransportResult<WalletInfo> {
        Err(TransportError::NotFound("unscripted".into()))
    }

    fn create_request(
        &self,
        _locator: &str,
        _kind: RequestKind,
        _body: &CreateRequestBody,
    ) -> TransportResult<RemoteRequest> {
        self.create.clone()
    }

    fn get_request(
        &self,
        _locator: &str,
        _kind: RequestKind,
        id: &str,
    ) -> TransportResult<RemoteRequest> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        self.reads
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RemoteRequest::new(id, RequestStatus::Pending)))
    }

    fn approve_request(
        &self,
        _locator: &str,
        _kind: RequestKind,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> TransportResult<RemoteRequest> {
        self.approved.lock().unwrap().push(approvals.to_vec());
        Ok(RemoteRequest::new(id, RequestStatus::AwaitingApproval))
    }

    fn register_signer(
        &self,
        _locator: &str,
        _body: &RegisterSignerBody,
    ) -> TransportResult<DelegatedSigner> {
        Err(TransportError::NotFound("unscripted".into()))
    }

    fn get_signer(
        &self,
        _locator: &str,
        _signer: &SignerRef,
    ) -> TransportResult<Option<DelegatedSigner>> {
        Ok(None)
    }

    fn get_balances(
        &self,
        _locator: &str,
        _query: &BalanceQuery,
    ) -> TransportResult<Vec<TokenBalance>> {
        Ok(Vec::new())
    }
}

fn status(s: RequestStatus) -> TransportResult<RemoteRequest> {
    Ok(RemoteRequest::new(ID, s))
}

fn succeeded(tx_id: Option<&str>) -> TransportResult<RemoteRequest> {
    let mut request = RemoteRequest::new(ID, RequestStatus::Success);
    request.on_chain = tx_id.map(|t| OnChain {
        tx_id: Some(t.to_string()),
        explorer_link: None,
    });
    Ok(request)
}

fn awaiting(pending: Vec<PendingApproval>) -> TransportResult<RemoteRequest> {
    let mut request = RemoteRequest::new(ID, RequestStatus::AwaitingApproval);
    request.approvals = Some(Approvals {
        pending,
        submitted: Vec::new(),
    });
    Ok(request)
}

fn orchestrator(
    transport: &Arc<Scripted>,
    signer: SignerConfig,
    attempts: u32,
) -> ApprovalOrchestrator<Arc<Scripted>> {
    let policy = PollPolicy::local_signer()
        .with_interval(Duration::ZERO)
        .with_max_attempts(attempts);
    ApprovalOrchestrator::new(Arc::clone(transport), signer, policy)
}

fn locator() -> WalletLocator {
    WalletLocator::from_address(TO, WalletType::EvmSmartWallet).unwrap()
}

fn transfer() -> Intent {
    Intent::calls(Chain::Base, vec![EvmCall::transfer(TO, "1")])
}

fn custodial() -> SignerConfig {
    SignerConfig::custodial("api-key:ck_1")
}

// ============================================================================
// Status Handling Invariants
// ============================================================================

#[test]
fn invariant_create_response_is_not_trusted() {
    let mut created = RemoteRequest::new(ID, RequestStatus::Success);
    created.on_chain = Some(OnChain {
        tx_id: Some("from-create".into()),
        explorer_link: None,
    });
    let transport = Scripted::with_create(
        Ok(created),
        vec![status(RequestStatus::Pending), succeeded(Some("from-read"))],
    );

    let request = orchestrator(&transport, custodial(), 5)
        .submit(&locator(), &transfer())
        .unwrap();
    assert_eq!(request.tx_id(), Some("from-read"));
    assert_eq!(transport.reads(), 2);
}

#[test]
fn invariant_unknown_status_is_not_terminal() {
    let transport = Scripted::new(vec![
        status(RequestStatus::Unknown("broadcasting".into())),
        status(RequestStatus::Unknown("queued".into())),
        succeeded(Some("0x01")),
    ]);

    orchestrator(&transport, custodial(), 5)
        .submit(&locator(), &transfer())
        .unwrap();
    assert_eq!(transport.reads(), 3);
}

#[test]
fn invariant_timeout_reports_last_observed_status() {
    let transport = Scripted::new(vec![
        status(RequestStatus::Pending),
        status(RequestStatus::Unknown("queued".into())),
    ]);

    let err = orchestrator(&transport, custodial(), 2)
        .submit(&locator(), &transfer())
        .unwrap_err();
    match err {
        Error::Timeout {
            id,
            last_status,
            attempts,
        } => {
            assert_eq!(id, ID);
            assert_eq!(last_status, RequestStatus::Unknown("queued".into()));
            assert_eq!(attempts, 2);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn invariant_success_without_tx_id_is_still_success() {
    let transport = Scripted::new(vec![succeeded(None)]);
    let request = orchestrator(&transport, custodial(), 3)
        .submit(&locator(), &transfer())
        .unwrap();
    assert_eq!(TransactionReceipt::from(request).tx_id, None);
}

#[test]
fn invariant_signature_success_needs_output() {
    let transport = Scripted::new(vec![succeeded(None)]);
    let err = orchestrator(&transport, custodial(), 3)
        .submit(&locator(), &Intent::message(Chain::Base, "hi"))
        .unwrap_err();
    assert!(matches!(err, Error::MalformedResponse { .. }));

    let mut signed = RemoteRequest::new(ID, RequestStatus::Success);
    signed.output_signature = Some("0xsig".into());
    let transport = Scripted::new(vec![Ok(signed)]);
    let request = orchestrator(&transport, custodial(), 3)
        .submit(&locator(), &Intent::message(Chain::Base, "hi"))
        .unwrap();
    assert_eq!(SignatureReceipt::try_from(request).unwrap().signature, "0xsig");
}

// ============================================================================
// Failure Invariants
// ============================================================================

#[test]
fn invariant_failure_reason_passes_through() {
    let mut failed = RemoteRequest::new(ID, RequestStatus::Failed);
    failed.error = Some(RemoteError::Detail {
        reason: Some("policy_violation".into()),
        message: Some("daily limit exceeded".into()),
    });
    let transport = Scripted::new(vec![Ok(failed)]);

    match orchestrator(&transport, custodial(), 3).submit(&locator(), &transfer()) {
        Err(Error::RemoteFailure { id, reason }) => {
            assert_eq!(id, ID);
            assert_eq!(reason, "policy_violation: daily limit exceeded");
        }
        other => panic!("expected remote failure, got {:?}", other),
    }

    let transport = Scripted::new(vec![status(RequestStatus::Failed)]);
    match orchestrator(&transport, custodial(), 3).submit(&locator(), &transfer()) {
        Err(Error::RemoteFailure { reason, .. }) => assert_eq!(reason, ""),
        other => panic!("expected remote failure, got {:?}", other),
    }
}

#[test]
fn invariant_create_failure_is_not_retried() {
    let transport = Scripted::with_create(
        Err(TransportError::Network("refused".into())),
        vec![succeeded(Some("never"))],
    );
    let err = orchestrator(&transport, custodial(), 3)
        .submit(&locator(), &transfer())
        .unwrap_err();
    assert!(matches!(err, Error::Submission { stage: "create", .. }));
    assert_eq!(transport.reads(), 0);
}

#[test]
fn invariant_permanent_read_error_is_not_retried() {
    let transport = Scripted::new(vec![Err(TransportError::Http {
        status: 401,
        message: "bad api key".into(),
    })]);
    let err = orchestrator(&transport, custodial(), 5)
        .submit(&locator(), &transfer())
        .unwrap_err();
    assert!(matches!(err, Error::Submission { stage: "read status", .. }));
    assert_eq!(transport.reads(), 1);
}

// ============================================================================
// Approval Invariants
// ============================================================================

#[test]
fn invariant_only_own_entry_is_signed() {
    let kp = EvmKeypair::generate();
    let other = SignerRef::evm_keypair("0x000000000000000000000000000000000000beef");
    let transport = Scripted::new(vec![
        awaiting(vec![
            PendingApproval {
                signer: other.clone(),
                message: "0x01".into(),
            },
            PendingApproval {
                signer: kp.signer_ref(),
                message: "0x02".into(),
            },
        ]),
        awaiting(vec![PendingApproval {
            signer: other,
            message: "0x01".into(),
        }]),
        succeeded(Some("0xdone")),
    ]);

    orchestrator(&transport, SignerConfig::local(kp.clone()), 5)
        .submit(&locator(), &transfer())
        .unwrap();

    let approvals = transport.approvals();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].len(), 1);
    assert!(approvals[0][0].signer.matches(&kp.signer_ref()));
    let recovered =
        custody_wallet_core::signer::evm::recover_personal_signer(&[0x02], &approvals[0][0].signature)
            .unwrap();
    assert_eq!(recovered, kp.address());
}

#[test]
fn invariant_remote_signer_never_approves_alone() {
    let transport = Scripted::new(vec![
        awaiting(vec![PendingApproval {
            signer: SignerRef::new("api-key:ck_1"),
            message: "0x01".into(),
        }]);
        3
    ]);
    let err = orchestrator(&transport, custodial(), 3)
        .submit(&locator(), &transfer())
        .unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }));
    assert!(transport.approvals().is_empty());
}

// ============================================================================
// Attempt Bound Invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn invariant_attempt_bound_is_exact(waits in 0usize..8, max_attempts in 1u32..6) {
        let mut script: Vec<_> = (0..waits)
            .map(|i| if i % 2 == 0 {
                status(RequestStatus::Pending)
            } else {
                status(RequestStatus::Unknown("indexing".into()))
            })
            .collect();
        script.push(succeeded(Some("0xok")));
        let transport = Scripted::new(script);

        let result = orchestrator(&transport, custodial(), max_attempts)
            .submit(&locator(), &transfer());

        if waits < max_attempts as usize {
            prop_assert!(result.is_ok());
            prop_assert_eq!(transport.reads() as usize, waits + 1);
        } else {
            let is_timeout = matches!(result, Err(Error::Timeout { .. }));
            prop_assert!(is_timeout);
            prop_assert_eq!(transport.reads(), max_attempts);
        }
    }
}
