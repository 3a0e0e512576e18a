//! Ed25519 keypairs with Solana encodings

use crate::{Error, Result, SignerRef};
use base64::{Engine, engine::general_purpose::STANDARD};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

/// Locally held Solana keypair
#[derive(Clone)]
pub struct SolanaKeypair {
    key: SigningKey,
    public_key: String,
}

impl SolanaKeypair {
    /// Generate a fresh random keypair
    pub fn generate() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Load from a base58 secret: either the 32-byte seed or the 64-byte
    /// `seed || public key` form used by Solana key files.
    pub fn from_base58(secret: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(secret.trim())
                .into_vec()
                .map_err(|e| Error::Crypto(format!("Invalid base58 secret: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Load from raw seed (32 bytes) or keypair (64 bytes) bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            32 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(bytes);
                Ok(Self::from_signing_key(SigningKey::from_bytes(&*seed)))
            }
            64 => {
                let mut keypair = Zeroizing::new([0u8; 64]);
                keypair.copy_from_slice(bytes);
                let key = SigningKey::from_keypair_bytes(&*keypair)
                    .map_err(|e| Error::Crypto(format!("Invalid Ed25519 keypair: {}", e)))?;
                Ok(Self::from_signing_key(key))
            }
            n => Err(Error::Crypto(format!(
                "Ed25519 secret must be 32 or 64 bytes, got {}",
                n
            ))),
        }
    }

    fn from_signing_key(key: SigningKey) -> Self {
        let public_key = bs58::encode(key.verifying_key().to_bytes()).into_string();
        Self { key, public_key }
    }

    /// 64-byte `seed || public key` secret in base58
    pub fn secret_base58(&self) -> Zeroizing<String> {
        Zeroizing::new(bs58::encode(self.key.to_keypair_bytes()).into_string())
    }

    /// Base58 public key, which is also the account address
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn signer_ref(&self) -> SignerRef {
        SignerRef::solana_keypair(&self.public_key)
    }

    /// Sign a base64 challenge, returning a base58 signature
    pub fn sign_challenge(&self, challenge: &str) -> Result<String> {
        let message = decode_challenge(challenge)?;
        Ok(self.sign_bytes(&message))
    }

    /// Sign raw bytes, returning a base58 signature
    pub fn sign_bytes(&self, message: &[u8]) -> String {
        let signature: Signature = self.key.sign(message);
        bs58::encode(signature.to_bytes()).into_string()
    }
}

impl std::fmt::Debug for SolanaKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaKeypair")
            .field("public_key", &self.public_key)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Bytes a base64 challenge stands for
pub fn decode_challenge(challenge: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(challenge.trim())
        .map_err(|e| Error::Crypto(format!("Invalid base64 challenge: {}", e)))
}

/// Check a base58 signature over `message` against a base58 public key
pub fn verify_signature(public_key: &str, message: &[u8], signature: &str) -> Result<bool> {
    let key_bytes: [u8; 32] = bs58::decode(public_key)
        .into_vec()
        .map_err(|e| Error::Crypto(format!("Invalid public key: {}", e)))?
        .try_into()
        .map_err(|_| Error::Crypto("Public key must be 32 bytes".into()))?;
    let sig_bytes: [u8; 64] = bs58::decode(signature)
        .into_vec()
        .map_err(|e| Error::Crypto(format!("Invalid signature: {}", e)))?
        .try_into()
        .map_err(|_| Error::Crypto("Signature must be 64 bytes".into()))?;

    let key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| Error::Crypto(format!("Invalid public key: {}", e)))?;
    Ok(key
        .verify(message, &Signature::from_bytes(&sig_bytes))
        .is_ok())
}
