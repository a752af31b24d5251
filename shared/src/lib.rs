pub mod crypto;
pub mod error;
pub mod hash;
pub mod types;

pub use crypto::{
    sign_transaction_digest, verify_transaction_signature, wallet_address, KeyPair, PrivateKey,
    PublicKey, Signature, SignatureAlgorithm, Wallet, WalletFile,
};
pub use error::NodeError;
pub use hash::Digest;
pub use types::{unix_time_now, Address, Amount, BlockHeight, Gas, Timestamp};

pub type Result<T> = std::result::Result<T, NodeError>;
