//! Unit tests for the delegated signer registry
//!
//! Tests cover:
//! - Registration pass-through
//! - Client-side expiry filtering without extra remote calls
//! - One fetch per distinct signer within a check

use chrono::{Duration, Utc};
use custody_wallet_core::{
    DelegatedSigner, DelegatedSignerRegistry, Error, MemoryCustody, Permission, SignerConfig,
    SignerRef, SolanaKeypair, WalletType,
};
use serde_json::json;

fn setup() -> (MemoryCustody, String) {
    let custody = MemoryCustody::new();
    let admin = SignerConfig::local(SolanaKeypair::generate());
    let wallet = custody.register_wallet(WalletType::SolanaSmartWallet, &admin, None);
    (custody, wallet.address)
}

fn delegate(expires_in: Option<Duration>) -> DelegatedSigner {
    DelegatedSigner {
        signer: SolanaKeypair::generate().signer_ref(),
        chain: None,
        expires_at: expires_in.map(|d| Utc::now() + d),
        permissions: vec![],
    }
}

// ============================================================================
// Registration Tests
// ============================================================================

#[test]
fn test_register_then_get() {
    let (custody, locator) = setup();
    let registry = DelegatedSignerRegistry::new(&custody);
    let signer = SolanaKeypair::generate().signer_ref();

    let registered = registry
        .register(
            &locator,
            signer.clone(),
            None,
            Some(Utc::now() + Duration::days(1)),
            vec![Permission::new("native-token-transfer", json!({ "allowance": "1000" }))],
        )
        .unwrap();
    assert_eq!(registered.signer, signer);

    let found = registry.get(&locator, &signer).unwrap().unwrap();
    assert_eq!(found.permissions.len(), 1);
    assert_eq!(custody.counts().signer_registrations, 1);
}

#[test]
fn test_register_rejects_past_expiry() {
    let (custody, locator) = setup();
    let registry = DelegatedSignerRegistry::new(&custody);

    let result = registry.register(
        &locator,
        SignerRef::new("solana-keypair:abc"),
        None,
        Some(Utc::now() - Duration::minutes(1)),
        vec![],
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(custody.counts().total(), 0);
}

#[test]
fn test_unknown_wallet_is_submission_error() {
    let custody = MemoryCustody::new();
    let registry = DelegatedSignerRegistry::new(&custody);
    let result = registry.get("email:nobody@b.com:solana-smart-wallet", &SignerRef::new("x"));
    assert!(matches!(result, Err(Error::Submission { .. })));
}

// ============================================================================
// Expiry Tests
// ============================================================================

#[test]
fn test_expired_signer_is_absent_after_one_call() {
    let (custody, locator) = setup();
    let expired = delegate(Some(-Duration::hours(1)));
    custody.seed_signer(&locator, expired.clone());

    let registry = DelegatedSignerRegistry::new(&custody);
    assert!(registry.get(&locator, &expired.signer).unwrap().is_none());
    assert_eq!(custody.counts().signer_reads, 1);
}

#[test]
fn test_check_partitions_and_dedups() {
    let (custody, locator) = setup();
    let active = delegate(None);
    let expired = delegate(Some(-Duration::seconds(5)));
    let missing = SolanaKeypair::generate().signer_ref();
    custody.seed_signer(&locator, active.clone());
    custody.seed_signer(&locator, expired.clone());

    let registry = DelegatedSignerRegistry::new(&custody);
    let check = registry
        .check(
            &locator,
            &[
                active.signer.clone(),
                expired.signer.clone(),
                missing.clone(),
                active.signer.clone(),
            ],
        )
        .unwrap();

    assert!(!check.all_active());
    assert_eq!(check.active.len(), 2);
    assert!(check.active.iter().all(|s| s.signer == active.signer));
    assert_eq!(check.absent, vec![expired.signer, missing]);
    assert_eq!(custody.counts().signer_reads, 3);
}
