//! In-memory custody service for testing and local development
//!
//! Simulates the remote service closely enough to drive the orchestrator end
//! to end: each request carries a quorum of signers, every signer gets a
//! challenge in its own encoding, and approvals are verified before they
//! count. Knobs on the builder shape the lifecycle (slow starts, stalls,
//! forced failures, transient read errors).

use super::{CustodyTransport, TransportError, TransportResult};
use crate::delegated::{DelegatedSigner, RegisterSignerBody};
use crate::intent::CreateRequestBody;
use crate::locator::{LinkedUser, WalletType};
use crate::signer::{evm, solana, SignerConfig};
use crate::wallet::{
    admin_signer_ref, BalanceQuery, CreateWalletBody, TokenBalance, WalletInfo,
};
use crate::{
    ApprovalSubmission, Approvals, ChainFamily, OnChain, PendingApproval, RemoteError,
    RemoteRequest, RequestKind, RequestStatus, SignerRef,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use uuid::Uuid;

/// Snapshot of how often each endpoint was hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub wallet_creates: u32,
    pub wallet_reads: u32,
    pub creates: u32,
    pub reads: u32,
    pub approvals: u32,
    pub signer_registrations: u32,
    pub signer_reads: u32,
    pub balance_reads: u32,
}

impl CallCounts {
    /// Calls of any kind
    pub fn total(&self) -> u32 {
        self.wallet_creates
            + self.wallet_reads
            + self.creates
            + self.reads
            + self.approvals
            + self.signer_registrations
            + self.signer_reads
            + self.balance_reads
    }
}

#[derive(Debug, Default)]
struct Counters {
    wallet_creates: AtomicU32,
    wallet_reads: AtomicU32,
    creates: AtomicU32,
    reads: AtomicU32,
    approvals: AtomicU32,
    signer_registrations: AtomicU32,
    signer_reads: AtomicU32,
    balance_reads: AtomicU32,
}

impl Counters {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            wallet_creates: self.wallet_creates.load(Ordering::SeqCst),
            wallet_reads: self.wallet_reads.load(Ordering::SeqCst),
            creates: self.creates.load(Ordering::SeqCst),
            reads: self.reads.load(Ordering::SeqCst),
            approvals: self.approvals.load(Ordering::SeqCst),
            signer_registrations: self.signer_registrations.load(Ordering::SeqCst),
            signer_reads: self.signer_reads.load(Ordering::SeqCst),
            balance_reads: self.balance_reads.load(Ordering::SeqCst),
        }
    }

    fn reset(&self) {
        for counter in [
            &self.wallet_creates,
            &self.wallet_reads,
            &self.creates,
            &self.reads,
            &self.approvals,
            &self.signer_registrations,
            &self.signer_reads,
            &self.balance_reads,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[derive(Debug, Clone)]
struct StoredWallet {
    info: WalletInfo,
    admin: SignerRef,
}

#[derive(Debug, Clone)]
struct StoredRequest {
    address: String,
    kind: RequestKind,
    family: ChainFamily,
    /// Reads left before the request leaves `pending`
    pending_reads: u32,
    request: RemoteRequest,
}

#[derive(Debug, Clone, Default)]
struct Behavior {
    pending_reads: u32,
    challenge: Option<String>,
    tx_id: Option<String>,
    stall: bool,
    failure: Option<String>,
}

/// In-memory custody service
///
/// Clones share state, so a test can keep one handle for inspection while
/// the wallet under test owns another.
#[derive(Debug, Clone)]
pub struct MemoryCustody {
    /// Wallets by normalized address
    wallets: Arc<DashMap<String, StoredWallet>>,
    /// Linked-user locators -> address
    aliases: Arc<DashMap<String, String>>,
    /// Requests by id
    requests: Arc<DashMap<String, StoredRequest>>,
    /// (address, signer) -> delegated signer
    signers: Arc<DashMap<(String, String), DelegatedSigner>>,
    balances: Arc<DashMap<String, Vec<TokenBalance>>>,
    counters: Arc<Counters>,
    transient_failures: Arc<AtomicU32>,
    behavior: Behavior,
}

impl MemoryCustody {
    /// Service that moves requests to `awaiting-approval` on the first read
    pub fn new() -> Self {
        Self {
            wallets: Arc::new(DashMap::new()),
            aliases: Arc::new(DashMap::new()),
            requests: Arc::new(DashMap::new()),
            signers: Arc::new(DashMap::new()),
            balances: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
            transient_failures: Arc::new(AtomicU32::new(0)),
            behavior: Behavior::default(),
        }
    }

    /// Report `pending` for the first `reads` status reads of each request
    pub fn with_pending_reads(mut self, reads: u32) -> Self {
        self.behavior.pending_reads = reads;
        self
    }

    /// Use a fixed challenge for every signer instead of a random one
    pub fn with_challenge(mut self, challenge: impl Into<String>) -> Self {
        self.behavior.challenge = Some(challenge.into());
        self
    }

    /// Use a fixed on-chain id for successful transactions
    pub fn with_tx_id(mut self, tx_id: impl Into<String>) -> Self {
        self.behavior.tx_id = Some(tx_id.into());
        self
    }

    /// Never move requests out of `pending`
    pub fn stalled(mut self) -> Self {
        self.behavior.stall = true;
        self
    }

    /// Fail every request with `reason` once it leaves `pending`
    pub fn failing_with(mut self, reason: impl Into<String>) -> Self {
        self.behavior.failure = Some(reason.into());
        self
    }

    /// Make the next `count` status reads fail with a network error
    pub fn fail_next_reads(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Create a wallet directly, without counting a call
    pub fn register_wallet(
        &self,
        wallet_type: WalletType,
        admin: &SignerConfig,
        linked_user: Option<&LinkedUser>,
    ) -> WalletInfo {
        self.insert_wallet(
            wallet_type,
            admin.admin_signer_json(),
            admin.signer_identity(),
            linked_user.map(ToString::to_string),
        )
    }

    /// Replace the balances reported for a wallet
    pub fn set_balances(&self, locator: &str, balances: Vec<TokenBalance>) {
        let key = self.resolve(locator).unwrap_or_else(|| normalize(locator));
        self.balances.insert(key, balances);
    }

    /// Store a delegated signer as-is, expired or not
    pub fn seed_signer(&self, locator: &str, signer: DelegatedSigner) {
        let key = self.resolve(locator).unwrap_or_else(|| normalize(locator));
        self.signers
            .insert((key, signer.signer.as_str().to_string()), signer);
    }

    /// Current state of a request, without counting a read
    pub fn peek(&self, id: &str) -> Option<RemoteRequest> {
        self.requests.get(id).map(|stored| stored.request.clone())
    }

    /// Call counters so far
    pub fn counts(&self) -> CallCounts {
        self.counters.snapshot()
    }

    /// Zero all call counters
    pub fn reset_counts(&self) {
        self.counters.reset();
    }

    /// Number of stored requests
    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    fn insert_wallet(
        &self,
        wallet_type: WalletType,
        admin_json: Value,
        admin: SignerRef,
        linked_user: Option<String>,
    ) -> WalletInfo {
        let address = generate_address(wallet_type.family());
        let info = WalletInfo {
            address: address.clone(),
            wallet_type,
            admin_signer: Some(admin_json),
            linked_user: linked_user.clone(),
            created_at: Some(Utc::now()),
        };

        if let Some(user) = linked_user {
            self.aliases
                .insert(format!("{}:{}", user, wallet_type), normalize(&address));
        }
        self.wallets.insert(
            normalize(&address),
            StoredWallet {
                info: info.clone(),
                admin,
            },
        );
        info
    }

    fn resolve(&self, locator: &str) -> Option<String> {
        let key = normalize(locator);
        if self.wallets.contains_key(&key) {
            return Some(key);
        }
        self.aliases.get(&key).map(|address| address.value().clone())
    }

    fn wallet(&self, locator: &str) -> TransportResult<StoredWallet> {
        self.resolve(locator)
            .and_then(|address| self.wallets.get(&address).map(|w| w.value().clone()))
            .ok_or_else(|| TransportError::NotFound(format!("wallet {}", locator)))
    }

    fn request_mut(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
    ) -> TransportResult<RefMut<'_, String, StoredRequest>> {
        let not_found = || TransportError::NotFound(format!("{} {}", kind, id));
        let address = self.resolve(locator).ok_or_else(not_found)?;
        let stored = self.requests.get_mut(id).ok_or_else(not_found)?;
        if stored.address != address || stored.kind != kind {
            return Err(not_found());
        }
        Ok(stored)
    }

    fn challenge_for(&self, signer: &SignerRef, seed: &[u8; 32]) -> String {
        if let Some(challenge) = &self.behavior.challenge {
            return challenge.clone();
        }
        match signer.scheme() {
            Some(SignerRef::SOLANA_KEYPAIR) => STANDARD.encode(seed),
            _ => format!("0x{}", hex::encode(seed)),
        }
    }

    fn take_transient_failure(&self) -> bool {
        self.transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Move a request forward as far as its approvals allow
    fn advance(&self, stored: &mut StoredRequest) {
        if stored.request.status.is_terminal() || self.behavior.stall {
            return;
        }

        if let Some(reason) = &self.behavior.failure {
            stored.request.status = RequestStatus::Failed;
            stored.request.error = Some(RemoteError::Message(reason.clone()));
            return;
        }

        let approvals = stored.request.approvals.get_or_insert_with(Approvals::default);
        if !approvals.pending.is_empty() {
            stored.request.status = RequestStatus::AwaitingApproval;
            return;
        }

        stored.request.status = RequestStatus::Success;
        match stored.kind {
            RequestKind::Transaction => {
                let tx_id = self
                    .behavior
                    .tx_id
                    .clone()
                    .unwrap_or_else(|| generate_tx_id(stored.family));
                stored.request.on_chain = Some(OnChain {
                    tx_id: Some(tx_id),
                    explorer_link: None,
                });
            }
            RequestKind::Signature => {
                stored.request.output_signature =
                    approvals.submitted.first().map(|s| s.signature.clone());
            }
        }
    }
}

impl Default for MemoryCustody {
    fn default() -> Self {
        Self::new()
    }
}

impl CustodyTransport for MemoryCustody {
    fn create_wallet(&self, body: &CreateWalletBody) -> TransportResult<WalletInfo> {
        Counters::bump(&self.counters.wallet_creates);
        let admin = admin_signer_ref(&body.admin_signer);
        Ok(self.insert_wallet(
            body.wallet_type,
            body.admin_signer.clone(),
            admin,
            body.linked_user.clone(),
        ))
    }

    fn get_wallet(&self, locator: &str) -> TransportResult<WalletInfo> {
        Counters::bump(&self.counters.wallet_reads);
        self.wallet(locator).map(|w| w.info)
    }

    fn create_request(
        &self,
        locator: &str,
        kind: RequestKind,
        body: &CreateRequestBody,
    ) -> TransportResult<RemoteRequest> {
        Counters::bump(&self.counters.creates);
        let wallet = self.wallet(locator)?;

        let params = &body.params;
        let well_formed = match kind {
            RequestKind::Transaction => params.calls.is_some() || params.transaction.is_some(),
            RequestKind::Signature => params.message.is_some() || params.typed_data.is_some(),
        };
        if !well_formed {
            return Err(TransportError::Http {
                status: 400,
                message: format!("{} request without a payload", kind),
            });
        }

        let quorum = match (&params.required_signers, &params.signer) {
            (Some(required), _) if !required.is_empty() => required.clone(),
            (_, Some(signer)) => vec![signer.clone()],
            _ => vec![wallet.admin.clone()],
        };

        let seed: [u8; 32] = rand::random();
        let pending = quorum
            .iter()
            .map(|signer| PendingApproval {
                signer: signer.clone(),
                message: self.challenge_for(signer, &seed),
            })
            .collect();

        let id = Uuid::new_v4().to_string();
        let mut request = RemoteRequest::new(id.clone(), RequestStatus::Pending);
        request.approvals = Some(Approvals {
            pending,
            submitted: Vec::new(),
        });

        self.requests.insert(
            id,
            StoredRequest {
                address: normalize(&wallet.info.address),
                kind,
                family: wallet.info.wallet_type.family(),
                pending_reads: self.behavior.pending_reads,
                request: request.clone(),
            },
        );
        Ok(request)
    }

    fn get_request(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
    ) -> TransportResult<RemoteRequest> {
        Counters::bump(&self.counters.reads);
        if self.take_transient_failure() {
            return Err(TransportError::Network("connection reset".into()));
        }

        let mut stored = self.request_mut(locator, kind, id)?;
        if stored.pending_reads > 0 {
            stored.pending_reads -= 1;
        } else {
            self.advance(&mut stored);
        }
        Ok(stored.request.clone())
    }

    fn approve_request(
        &self,
        locator: &str,
        kind: RequestKind,
        id: &str,
        approvals: &[ApprovalSubmission],
    ) -> TransportResult<RemoteRequest> {
        Counters::bump(&self.counters.approvals);
        if approvals.is_empty() {
            return Err(bad_request("no approvals given"));
        }

        let mut stored = self.request_mut(locator, kind, id)?;
        if stored.request.status.is_terminal() {
            return Err(bad_request(format!(
                "request {} is already {}",
                id, stored.request.status
            )));
        }

        let current = stored.request.approvals.get_or_insert_with(Approvals::default);
        for submission in approvals {
            if current.has_submitted(&submission.signer) {
                continue;
            }
            let Some(index) = current
                .pending
                .iter()
                .position(|p| p.signer.matches(&submission.signer))
            else {
                return Err(bad_request(format!(
                    "signer {} is not required for {}",
                    submission.signer, id
                )));
            };
            if !verify(&current.pending[index], &submission.signature) {
                return Err(bad_request(format!(
                    "invalid signature from {}",
                    submission.signer
                )));
            }

            let entry = current.pending.remove(index);
            current
                .submitted
                .push(ApprovalSubmission::new(entry.signer, submission.signature.clone()));
        }

        if stored.pending_reads == 0 {
            self.advance(&mut stored);
        }
        Ok(stored.request.clone())
    }

    fn register_signer(
        &self,
        locator: &str,
        body: &RegisterSignerBody,
    ) -> TransportResult<DelegatedSigner> {
        Counters::bump(&self.counters.signer_registrations);
        let wallet = self.wallet(locator)?;
        let signer = DelegatedSigner {
            signer: body.signer.clone(),
            chain: body.chain,
            expires_at: body.expires_at,
            permissions: body.permissions.clone(),
        };
        self.signers.insert(
            (
                normalize(&wallet.info.address),
                body.signer.as_str().to_string(),
            ),
            signer.clone(),
        );
        Ok(signer)
    }

    fn get_signer(
        &self,
        locator: &str,
        signer: &SignerRef,
    ) -> TransportResult<Option<DelegatedSigner>> {
        Counters::bump(&self.counters.signer_reads);
        let wallet = self.wallet(locator)?;
        let key = (
            normalize(&wallet.info.address),
            signer.as_str().to_string(),
        );
        Ok(self.signers.get(&key).map(|s| s.value().clone()))
    }

    fn get_balances(
        &self,
        locator: &str,
        query: &BalanceQuery,
    ) -> TransportResult<Vec<TokenBalance>> {
        Counters::bump(&self.counters.balance_reads);
        let wallet = self.wallet(locator)?;
        let balances = self
            .balances
            .get(&normalize(&wallet.info.address))
            .map(|b| b.value().clone())
            .unwrap_or_default();
        Ok(balances.into_iter().filter(|b| query.admits(b)).collect())
    }
}

/// EVM addresses compare case-insensitively
fn normalize(locator: &str) -> String {
    if locator.starts_with("0x") {
        locator.to_ascii_lowercase()
    } else {
        locator.to_string()
    }
}

fn bad_request(message: impl Into<String>) -> TransportError {
    TransportError::Http {
        status: 400,
        message: message.into(),
    }
}

fn generate_address(family: ChainFamily) -> String {
    match family {
        ChainFamily::Evm => format!("0x{}", hex::encode(rand::random::<[u8; 20]>())),
        ChainFamily::Solana => bs58::encode(rand::random::<[u8; 32]>()).into_string(),
    }
}

fn generate_tx_id(family: ChainFamily) -> String {
    match family {
        ChainFamily::Evm => format!("0x{}", hex::encode(rand::random::<[u8; 32]>())),
        ChainFamily::Solana => {
            let mut signature = rand::random::<[u8; 32]>().to_vec();
            signature.extend_from_slice(&rand::random::<[u8; 32]>());
            bs58::encode(signature).into_string()
        }
    }
}

/// Check a signature against the challenge a pending entry carries.
///
/// Keypair signers are verified cryptographically; other schemes are opaque
/// and any non-empty signature is accepted.
fn verify(pending: &PendingApproval, signature: &str) -> bool {
    let signer = &pending.signer;
    match signer.scheme() {
        Some(SignerRef::EVM_KEYPAIR) => {
            evm::recover_personal_signer(&evm::decode_challenge(&pending.message), signature)
                .map(|address| address.eq_ignore_ascii_case(signer.value()))
                .unwrap_or(false)
        }
        Some(SignerRef::SOLANA_KEYPAIR) => solana::decode_challenge(&pending.message)
            .and_then(|message| solana::verify_signature(signer.value(), &message, signature))
            .unwrap_or(false),
        _ => !signature.is_empty(),
    }
}
