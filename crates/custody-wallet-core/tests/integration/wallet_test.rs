//! Integration tests for wallet management
//!
//! These tests verify:
//! - Wallet creation for each signer kind
//! - Lookup by address and by linked user
//! - Balance filtering and formatting

use custody_wallet_core::{
    Chain, Error, EvmKeypair, LinkedUser, MemoryCustody, SignerConfig, SolanaKeypair,
    TokenBalance, WalletLocator, WalletManager, WalletType,
};

#[test]
fn test_create_and_get_by_linked_user() {
    let custody = MemoryCustody::new();
    let manager = WalletManager::new(custody.clone());
    let user = LinkedUser::Email("agent@example.com".into());
    let admin = SignerConfig::local(EvmKeypair::generate());

    let created = manager
        .create_wallet(WalletType::EvmSmartWallet, &admin, Some(&user))
        .unwrap();
    assert!(created.address.starts_with("0x"));
    assert_eq!(created.linked_user.as_deref(), Some("email:agent@example.com"));

    let locator = WalletLocator::from_linked_user(&user, WalletType::EvmSmartWallet).unwrap();
    let fetched = manager.get_wallet(locator.as_str()).unwrap();
    assert_eq!(fetched.address, created.address);

    let by_address = manager.get_wallet(&created.address.to_uppercase().replace("0X", "0x"));
    assert!(by_address.is_ok());
}

#[test]
fn test_create_rejects_mismatched_admin() {
    let custody = MemoryCustody::new();
    let manager = WalletManager::new(custody.clone());

    let result = manager.create_wallet(
        WalletType::EvmSmartWallet,
        &SignerConfig::local(SolanaKeypair::generate()),
        None,
    );
    assert!(matches!(result, Err(Error::Configuration(_))));

    let result = manager.create_wallet(
        WalletType::EvmSmartWallet,
        &SignerConfig::FireblocksCustodial,
        None,
    );
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(custody.counts().wallet_creates, 0);
}

#[test]
fn test_missing_wallet_is_configuration_error() {
    let manager = WalletManager::new(MemoryCustody::new());
    assert!(matches!(
        manager.get_wallet("email:ghost@example.com:evm-smart-wallet"),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_balances_filtered_by_chain_and_token() {
    let custody = MemoryCustody::new();
    let manager = WalletManager::new(custody.clone());
    let wallet = manager
        .create_wallet(
            WalletType::EvmSmartWallet,
            &SignerConfig::local(EvmKeypair::generate()),
            None,
        )
        .unwrap();

    custody.set_balances(
        &wallet.address,
        vec![
            TokenBalance::new("usdc", 6, "2500000").on_chain(Chain::Base),
            TokenBalance::new("usdc", 6, "1").on_chain(Chain::Polygon),
            TokenBalance::new("eth", 18, "500000000000000000").on_chain(Chain::Base),
        ],
    );

    let balances = manager
        .get_balances(&wallet.address, &[Chain::Base], &["usdc".into(), "eth".into()])
        .unwrap();
    assert_eq!(balances.len(), 2);
    assert_eq!(balances[0].formatted(), "2.5");
    assert_eq!(balances[1].formatted(), "0.5");

    assert!(matches!(
        manager.get_balances(&wallet.address, &[Chain::Base], &[]),
        Err(Error::Configuration(_))
    ));
}
