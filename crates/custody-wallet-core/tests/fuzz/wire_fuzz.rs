//! Fuzz tests for wire formats and signatures
//!
//! Property-based checks on the encodings exchanged with the custody
//! service and on the signatures local keypairs produce.

use custody_wallet_core::{
    EvmKeypair, RequestStatus, SolanaKeypair, TokenBalance,
    signer::{evm, solana},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use proptest::prelude::*;

// ============================================================================
// Status Parsing
// ============================================================================

proptest! {
    #[test]
    fn any_status_string_round_trips(raw in "[a-z-]{0,20}") {
        let status = RequestStatus::from(raw.clone());
        prop_assert_eq!(status.as_str(), raw.as_str());
        prop_assert_eq!(status.is_terminal(), raw == "success" || raw == "failed");

        let json = serde_json::to_string(&status).unwrap();
        let back: RequestStatus = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, status);
    }

    #[test]
    fn formatted_balance_preserves_value(amount in any::<u64>(), decimals in 0u8..=18) {
        let formatted = TokenBalance::new("tok", decimals, amount.to_string()).formatted();
        let (whole, fraction) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
        prop_assert!(!fraction.ends_with('0'));

        let digits = format!("{}{:0<width$}", whole, fraction, width = decimals as usize);
        prop_assert_eq!(digits.parse::<u128>().unwrap(), amount as u128);
    }
}

// ============================================================================
// Signatures
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn evm_signatures_recover(challenge in prop::array::uniform32(any::<u8>())) {
        let kp = EvmKeypair::generate();
        let encoded = format!("0x{}", hex::encode(challenge));
        let signature = kp.sign_challenge(&encoded).unwrap();

        let v = u8::from_str_radix(&signature[signature.len() - 2..], 16).unwrap();
        prop_assert!(v == 27 || v == 28);
        prop_assert_eq!(evm::recover_personal_signer(&challenge, &signature).unwrap(), kp.address());
    }

    #[test]
    fn solana_signatures_verify(message in prop::collection::vec(any::<u8>(), 0..128)) {
        let kp = SolanaKeypair::generate();
        let signature = kp.sign_challenge(&STANDARD.encode(&message)).unwrap();
        prop_assert!(solana::verify_signature(kp.public_key(), &message, &signature).unwrap());

        let mut tampered = message.clone();
        tampered.push(0);
        prop_assert!(!solana::verify_signature(kp.public_key(), &tampered, &signature).unwrap());
    }
}
