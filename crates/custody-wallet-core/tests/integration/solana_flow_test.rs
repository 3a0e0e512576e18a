//! Integration tests for Solana smart wallets
//!
//! These tests verify:
//! - The linked-user transaction flow with a local Ed25519 keypair
//! - Instruction lists compiled with the wallet as fee payer
//! - Message signing refused without network calls
//! - Fireblocks-custodial admins leave approvals to the service

use custody_wallet_core::{
    Error, LinkedUser, MemoryCustody, PollPolicy, RequestStatus, SignerConfig, SolanaKeypair,
    SolanaSmartWallet, WalletLocator, WalletType,
    signer::solana,
};
use std::time::Duration;

fn fast(attempts: u32) -> PollPolicy {
    PollPolicy::local_signer()
        .with_interval(Duration::ZERO)
        .with_max_attempts(attempts)
}

fn serialized_tx() -> String {
    bs58::encode(b"unsigned solana transaction bytes").into_string()
}

// ============================================================================
// Linked-User Flow
// ============================================================================

#[test]
fn test_linked_user_transaction_with_local_signer() {
    let custody = MemoryCustody::new()
        .with_challenge("Zm9v")
        .with_tx_id("abc123");
    let kp = SolanaKeypair::generate();
    let signer = SignerConfig::local(kp.clone());
    let user = LinkedUser::Email("a@b.com".into());
    custody.register_wallet(WalletType::SolanaSmartWallet, &signer, Some(&user));

    let locator = WalletLocator::from_linked_user(&user, WalletType::SolanaSmartWallet).unwrap();
    assert_eq!(locator.as_str(), "email:a@b.com:solana-smart-wallet");

    let wallet = SolanaSmartWallet::new(custody.clone(), locator, signer, fast(5)).unwrap();
    let receipt = wallet.send_transaction(&serialized_tx()).unwrap();
    assert_eq!(receipt.tx_id.as_deref(), Some("abc123"));

    let counts = custody.counts();
    assert_eq!(counts.creates, 1);
    assert_eq!(counts.approvals, 1);

    let request = custody.peek(&receipt.id).unwrap();
    let submitted = &request.approvals.unwrap().submitted;
    assert_eq!(submitted.len(), 1);
    assert!(solana::verify_signature(kp.public_key(), b"foo", &submitted[0].signature).unwrap());
}

#[test]
fn test_slow_service_still_converges() {
    let custody = MemoryCustody::new().with_pending_reads(3);
    let signer = SignerConfig::local(SolanaKeypair::generate());
    let info = custody.register_wallet(WalletType::SolanaSmartWallet, &signer, None);
    let wallet =
        SolanaSmartWallet::new(custody.clone(), info.locator().unwrap(), signer, fast(10))
            .unwrap();

    let receipt = wallet.send_transaction(&serialized_tx()).unwrap();
    assert!(receipt.tx_id.is_some());
    assert_eq!(custody.counts().reads, 4);
    assert_eq!(custody.counts().approvals, 1);
}

#[test]
fn test_instruction_list_uses_wallet_as_payer() {
    use solana_sdk::instruction::{AccountMeta, Instruction};
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::transaction::VersionedTransaction;
    use std::str::FromStr;

    let custody = MemoryCustody::new();
    let signer = SignerConfig::local(SolanaKeypair::generate());
    let user = LinkedUser::UserId("agent-7".into());
    let info = custody.register_wallet(WalletType::SolanaSmartWallet, &signer, Some(&user));
    let locator = WalletLocator::from_linked_user(&user, WalletType::SolanaSmartWallet).unwrap();
    let wallet = SolanaSmartWallet::new(custody.clone(), locator, signer, fast(5)).unwrap();

    let payer = Pubkey::from_str(&info.address).unwrap();
    let ix = Instruction::new_with_bytes(
        Pubkey::new_unique(),
        &[42],
        vec![AccountMeta::new(payer, true)],
    );
    let receipt = wallet.send_instructions(&[ix]).unwrap();
    assert!(receipt.tx_id.is_some());
    assert_eq!(custody.counts().wallet_reads, 1);

    let serialized = custody_wallet_core::chain::solana::serialize_instructions(
        &payer,
        &[Instruction::new_with_bytes(Pubkey::new_unique(), &[], vec![])],
    )
    .unwrap();
    let bytes = bs58::decode(serialized).into_vec().unwrap();
    let tx: VersionedTransaction = bincode1::deserialize(&bytes).unwrap();
    assert_eq!(tx.message.static_account_keys()[0], payer);
}

// ============================================================================
// Unsupported and Remote Signers
// ============================================================================

#[test]
fn test_sign_message_is_unsupported() {
    let custody = MemoryCustody::new();
    let signer = SignerConfig::local(SolanaKeypair::generate());
    let info = custody.register_wallet(WalletType::SolanaSmartWallet, &signer, None);
    let wallet =
        SolanaSmartWallet::new(custody.clone(), info.locator().unwrap(), signer, fast(5)).unwrap();
    custody.reset_counts();

    assert!(matches!(
        wallet.sign_message("hello"),
        Err(Error::UnsupportedOperation(_))
    ));
    assert_eq!(custody.counts().total(), 0);
}

#[test]
fn test_fireblocks_admin_never_signs() {
    let custody = MemoryCustody::new();
    let signer = SignerConfig::FireblocksCustodial;
    let info = custody.register_wallet(WalletType::SolanaCustodialWallet, &signer, None);
    let wallet =
        SolanaSmartWallet::new(custody.clone(), info.locator().unwrap(), signer, fast(3)).unwrap();

    let err = wallet.send_transaction(&serialized_tx()).unwrap_err();
    assert!(matches!(
        err,
        Error::Timeout { last_status: RequestStatus::AwaitingApproval, attempts: 3, .. }
    ));
    assert_eq!(custody.counts().approvals, 0);
}
