//! Unit tests for signers
//!
//! Tests cover:
//! - EVM personal-message signatures and address recovery
//! - Solana Ed25519 signatures over base64 challenges
//! - The single decision point for local signing

use custody_wallet_core::{
    ChainFamily, Error, EvmKeypair, LocalKeypair, SignerConfig, SignerRef, SolanaKeypair,
    signer::{evm, solana},
};

// ============================================================================
// EVM Keypair Tests
// ============================================================================

#[test]
fn test_evm_signature_recovers_to_signer() {
    let kp = EvmKeypair::generate();
    let challenge = format!("0x{}", hex::encode(rand::random::<[u8; 32]>()));
    let signature = kp.sign_challenge(&challenge).unwrap();

    let recovered =
        evm::recover_personal_signer(&evm::decode_challenge(&challenge), &signature).unwrap();
    assert_eq!(recovered, kp.address());
}

#[test]
fn test_evm_secret_round_trip() {
    let kp = EvmKeypair::generate();
    let restored = EvmKeypair::from_hex(&kp.secret_hex()).unwrap();
    assert_eq!(restored.address(), kp.address());
    assert!(EvmKeypair::from_hex("0x1234").is_err());
}

#[test]
fn test_recover_rejects_malformed_signatures() {
    assert!(evm::recover_personal_signer(b"hi", "0x1234").is_err());
    let bad_v = format!("0x{}{}", "11".repeat(64), "05");
    assert!(evm::recover_personal_signer(b"hi", &bad_v).is_err());
}

// ============================================================================
// Solana Keypair Tests
// ============================================================================

#[test]
fn test_solana_signs_decoded_challenge() {
    let kp = SolanaKeypair::generate();
    let signature = kp.sign_challenge("Zm9v").unwrap();
    assert!(solana::verify_signature(kp.public_key(), b"foo", &signature).unwrap());

    let raw = bs58::decode(&signature).into_vec().unwrap();
    assert_eq!(raw.len(), 64);
}

#[test]
fn test_solana_key_file_form() {
    let kp = SolanaKeypair::generate();
    let secret = kp.secret_base58();
    assert_eq!(bs58::decode(secret.as_str()).into_vec().unwrap().len(), 64);
    assert_eq!(
        SolanaKeypair::from_base58(&secret).unwrap().public_key(),
        kp.public_key()
    );
}

// ============================================================================
// Signer Configuration Tests
// ============================================================================

#[test]
fn test_local_keypair_dispatch() {
    let local: LocalKeypair = SolanaKeypair::generate().into();
    assert_eq!(local.family(), ChainFamily::Solana);
    assert_eq!(local.signer_ref().value(), local.address());

    let local: LocalKeypair = EvmKeypair::generate().into();
    assert_eq!(local.family(), ChainFamily::Evm);
    assert_eq!(local.signer_ref().scheme(), Some(SignerRef::EVM_KEYPAIR));
}

#[test]
fn test_remote_signers_never_sign() {
    for config in [
        SignerConfig::custodial("api-key:ck_1"),
        SignerConfig::FireblocksCustodial,
    ] {
        assert!(!config.can_sign_locally());
        assert!(matches!(
            config.sign("0xdead"),
            Err(Error::UnsupportedOperation(_))
        ));
    }

    assert_eq!(
        SignerConfig::FireblocksCustodial.signer_identity().as_str(),
        SignerConfig::FIREBLOCKS_REF
    );
    assert!(SignerConfig::FireblocksCustodial
        .ensure_family(ChainFamily::Solana)
        .is_ok());
}

#[test]
fn test_debug_output_is_redacted() {
    let evm = EvmKeypair::generate();
    let debug = format!("{:?}", SignerConfig::local(evm.clone()));
    assert!(debug.contains(evm.address()));
    assert!(!debug.contains(&evm.secret_hex()[2..]));

    let sol = SolanaKeypair::generate();
    let debug = format!("{:?}", sol);
    assert!(!debug.contains(sol.secret_base58().as_str()));
}
