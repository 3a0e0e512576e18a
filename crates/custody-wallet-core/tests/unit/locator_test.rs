//! Unit tests for wallet locators
//!
//! Tests cover:
//! - Canonical formats for every linked-user scheme
//! - Rejection of missing and ambiguous identities
//! - Wallet type parsing and families

use custody_wallet_core::{
    ChainFamily, Error, LinkedUser, WalletLocator, WalletType,
    locator::resolve,
};

// ============================================================================
// Canonical Format Tests
// ============================================================================

#[test]
fn test_every_scheme_with_every_wallet_type() {
    let users = [
        (LinkedUser::Email("a@b.com".into()), "email:a@b.com"),
        (LinkedUser::Phone("+15550100".into()), "phone-number:+15550100"),
        (LinkedUser::UserId("u_42".into()), "userId:u_42"),
    ];
    let types = [
        WalletType::EvmSmartWallet,
        WalletType::EvmMpcWallet,
        WalletType::SolanaSmartWallet,
        WalletType::SolanaCustodialWallet,
    ];

    for (user, prefix) in &users {
        for wallet_type in types {
            let locator = resolve(None, Some(user), Some(wallet_type)).unwrap();
            assert_eq!(locator, format!("{}:{}", prefix, wallet_type.as_str()));
        }
    }
}

#[test]
fn test_address_passes_through_verbatim() {
    let solana = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin";
    let locator = WalletLocator::from_address(solana, WalletType::SolanaSmartWallet).unwrap();
    assert_eq!(locator.as_str(), solana);
    assert_eq!(locator.family(), ChainFamily::Solana);

    let evm = "0xAbCd00000000000000000000000000000000Ef01";
    assert_eq!(resolve(Some(evm), None, None).unwrap(), evm);
}

// ============================================================================
// Rejection Tests
// ============================================================================

#[test]
fn test_neither_identity_is_configuration_error() {
    for wallet_type in [None, Some(WalletType::EvmSmartWallet)] {
        assert!(matches!(
            resolve(None, None, wallet_type),
            Err(Error::Configuration(_))
        ));
    }
}

#[test]
fn test_both_identities_is_configuration_error() {
    let user = LinkedUser::UserId("u_1".into());
    assert!(matches!(
        resolve(Some("0x01"), Some(&user), Some(WalletType::EvmSmartWallet)),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_blank_identities_rejected() {
    assert!(resolve(Some("   "), None, None).is_err());
    assert!(resolve(None, Some(&LinkedUser::Email(String::new())), None).is_err());
    assert!(LinkedUser::from_fields(Some("a@b.com"), Some("+1"), None).is_err());
}

// ============================================================================
// Wallet Type Tests
// ============================================================================

#[test]
fn test_wallet_type_round_trip() {
    for wallet_type in [
        WalletType::EvmSmartWallet,
        WalletType::EvmMpcWallet,
        WalletType::SolanaSmartWallet,
        WalletType::SolanaCustodialWallet,
    ] {
        assert_eq!(wallet_type.as_str().parse::<WalletType>().unwrap(), wallet_type);
        let json = serde_json::to_string(&wallet_type).unwrap();
        assert_eq!(json, format!("\"{}\"", wallet_type));
    }
    assert!("bitcoin-wallet".parse::<WalletType>().is_err());
}
