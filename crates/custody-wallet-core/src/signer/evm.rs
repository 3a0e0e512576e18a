//! secp256k1 keypairs and EIP-191 personal-message signing

use crate::{Error, Result, SignerRef};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

/// Locally held EVM keypair
#[derive(Clone)]
pub struct EvmKeypair {
    key: SigningKey,
    address: String,
}

impl EvmKeypair {
    /// Generate a fresh random keypair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::random(&mut rand::rngs::OsRng))
    }

    /// Load from a 32-byte hex secret, with or without `0x`
    pub fn from_hex(secret: &str) -> Result<Self> {
        let bytes = Zeroizing::new(hex::decode(strip_0x(secret.trim()))?);
        let key = SigningKey::from_slice(&bytes)
            .map_err(|e| Error::Crypto(format!("Invalid secp256k1 secret: {}", e)))?;
        Ok(Self::from_signing_key(key))
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let address = address_from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    /// Secret key as `0x`-prefixed hex
    pub fn secret_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("0x{}", hex::encode(self.key.to_bytes())))
    }

    /// Lowercase `0x` address
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn signer_ref(&self) -> SignerRef {
        SignerRef::evm_keypair(&self.address)
    }

    /// Sign a challenge as delivered by the custody service
    pub fn sign_challenge(&self, challenge: &str) -> Result<String> {
        self.sign_personal_message(&decode_challenge(challenge))
    }

    /// EIP-191 sign `message`, returning `0x`-hex `r || s || v`
    pub fn sign_personal_message(&self, message: &[u8]) -> Result<String> {
        let hash = eip191_hash(message);
        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&hash)
            .map_err(|e| Error::Crypto(format!("ECDSA signing failed: {}", e)))?;

        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&signature.to_bytes());
        bytes.push(27 + recovery_id.to_byte());
        Ok(format!("0x{}", hex::encode(bytes)))
    }
}

impl std::fmt::Debug for EvmKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmKeypair")
            .field("address", &self.address)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Bytes a challenge stands for: `0x`-hex when it parses, UTF-8 text otherwise
pub fn decode_challenge(challenge: &str) -> Vec<u8> {
    challenge
        .strip_prefix("0x")
        .and_then(|h| hex::decode(h).ok())
        .unwrap_or_else(|| challenge.as_bytes().to_vec())
}

/// Keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// `keccak256("\x19Ethereum Signed Message:\n" || len || message)`
pub fn eip191_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(b"\x19Ethereum Signed Message:\n");
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    hash
}

/// Address of a public key: last 20 bytes of keccak256 of the uncompressed point
pub fn address_from_verifying_key(key: &VerifyingKey) -> String {
    let encoded = key.to_encoded_point(false);
    // Skip the 0x04 prefix
    let hash = keccak256(&encoded.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recover the signing address of an EIP-191 signature over `message`
pub fn recover_personal_signer(message: &[u8], signature: &str) -> Result<String> {
    let bytes = hex::decode(strip_0x(signature))?;
    if bytes.len() != 65 {
        return Err(Error::Crypto(format!(
            "Invalid signature length: {}",
            bytes.len()
        )));
    }

    let sig = Signature::from_slice(&bytes[..64])
        .map_err(|e| Error::Crypto(format!("Invalid signature: {}", e)))?;
    let recovery_id = bytes[64]
        .checked_sub(27)
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| Error::Crypto(format!("Invalid recovery byte: {}", bytes[64])))?;

    let key = VerifyingKey::recover_from_prehash(&eip191_hash(message), &sig, recovery_id)
        .map_err(|e| Error::Crypto(format!("Signature recovery failed: {}", e)))?;
    Ok(address_from_verifying_key(&key))
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}
