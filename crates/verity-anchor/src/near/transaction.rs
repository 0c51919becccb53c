//! NEAR transaction encoding and signing
//!
//! Only the subset needed to send a single `FunctionCall` action is modelled.
//! Layout follows the protocol's borsh schema: enum variants are written as a
//! one-byte tag followed by the payload.

use borsh::io::{Result as IoResult, Write};
use borsh::BorshSerialize;
use ed25519_dalek::{Signer, SigningKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::LedgerError;

const ED25519_PREFIX: &str = "ed25519:";
const KEY_TYPE_ED25519: u8 = 0;
const ACTION_FUNCTION_CALL: u8 = 2;

/// ed25519 public key as `KeyType::ED25519` + 32 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PublicKey(pub [u8; 32]);

impl BorshSerialize for PublicKey {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        KEY_TYPE_ED25519.serialize(writer)?;
        writer.write_all(&self.0)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", ED25519_PREFIX, bs58::encode(self.0).into_string())
    }
}

struct Signature([u8; 64]);

impl BorshSerialize for Signature {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        KEY_TYPE_ED25519.serialize(writer)?;
        writer.write_all(&self.0)
    }
}

/// `Action::FunctionCall`; serialization includes the action tag
#[derive(Debug, Clone)]
pub(crate) struct FunctionCall {
    pub method_name: String,
    pub args: Vec<u8>,
    pub gas: u64,
    pub deposit: u128,
}

impl BorshSerialize for FunctionCall {
    fn serialize<W: Write>(&self, writer: &mut W) -> IoResult<()> {
        ACTION_FUNCTION_CALL.serialize(writer)?;
        self.method_name.serialize(writer)?;
        self.args.serialize(writer)?;
        self.gas.serialize(writer)?;
        self.deposit.serialize(writer)
    }
}

#[derive(Debug, Clone, BorshSerialize)]
pub(crate) struct Transaction {
    pub signer_id: String,
    pub public_key: PublicKey,
    pub nonce: u64,
    pub receiver_id: String,
    pub block_hash: [u8; 32],
    pub actions: Vec<FunctionCall>,
}

#[derive(BorshSerialize)]
pub(crate) struct SignedTransaction {
    transaction: Transaction,
    signature: Signature,
}

impl SignedTransaction {
    /// Base64 of the borsh encoding, as expected by `broadcast_tx_commit`
    pub fn to_base64(&self) -> IoResult<String> {
        use base64::Engine;
        let bytes = borsh::to_vec(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// Account key pair used to sign submissions
pub(crate) struct InMemorySigner {
    account_id: String,
    secret: SigningKey,
    public: PublicKey,
}

impl InMemorySigner {
    /// Parse an `ed25519:<base58>` secret key
    ///
    /// Accepts the 64-byte expanded form (seed followed by public key) and
    /// the bare 32-byte seed.
    pub fn from_secret_key(account_id: &str, secret_key: &str) -> Result<Self, LedgerError> {
        let encoded = secret_key.strip_prefix(ED25519_PREFIX).ok_or_else(|| {
            LedgerError::Configuration("private key must start with 'ed25519:'".to_string())
        })?;

        let bytes = Zeroizing::new(
            bs58::decode(encoded)
                .into_vec()
                .map_err(|e| LedgerError::Configuration(format!("invalid private key: {}", e)))?,
        );

        let mut seed = Zeroizing::new([0u8; 32]);
        match bytes.len() {
            32 | 64 => seed.copy_from_slice(&bytes[..32]),
            n => {
                return Err(LedgerError::Configuration(format!(
                    "private key has {} bytes, expected 32 or 64",
                    n
                )))
            }
        }

        let secret = SigningKey::from_bytes(&seed);
        let public = PublicKey(secret.verifying_key().to_bytes());

        if bytes.len() == 64 && bytes[32..] != public.0 {
            return Err(LedgerError::Configuration(
                "private key does not match its embedded public key".to_string(),
            ));
        }

        Ok(Self {
            account_id: account_id.to_string(),
            secret,
            public,
        })
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Sign `sha256(borsh(tx))`; returns the signed transaction and its hash
    pub fn sign(&self, transaction: Transaction) -> IoResult<(SignedTransaction, [u8; 32])> {
        let bytes = borsh::to_vec(&transaction)?;
        let hash: [u8; 32] = Sha256::digest(&bytes).into();
        let signature = Signature(self.secret.sign(&hash).to_bytes());
        Ok((
            SignedTransaction {
                transaction,
                signature,
            },
            hash,
        ))
    }
}

/// Decode a base58 block hash
pub(crate) fn decode_hash(encoded: &str) -> Result<[u8; 32], String> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|e| format!("invalid base58 hash '{}': {}", encoded, e))?;
    bytes
        .try_into()
        .map_err(|_| format!("hash '{}' is not 32 bytes", encoded))
}
