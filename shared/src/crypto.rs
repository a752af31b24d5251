//! Criptografia de carteira do Xugenping (ML-DSA / CRYSTALS-Dilithium)

use crate::{Address, Digest, NodeError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pqcrypto_dilithium::dilithium5;
use pqcrypto_traits::sign::{
    PublicKey as PQCPublicKeyTrait, SecretKey as PQCSecretKeyTrait, SignedMessage,
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Algoritmos de assinatura suportados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    MLDSA87,
}

/// Chave pública ML-DSA
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    key_data: Vec<u8>,
    algorithm: SignatureAlgorithm,
}

/// Chave privada ML-DSA
#[derive(Debug, Clone)]
pub struct PrivateKey {
    key_data: Vec<u8>,
    algorithm: SignatureAlgorithm,
}

/// Par de chaves ML-DSA
#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub private_key: PrivateKey,
}

/// Assinatura digital pós-quântica
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    data: Vec<u8>,
    algorithm: SignatureAlgorithm,
}

impl PublicKey {
    /// Cria uma chave pública a partir de bytes
    #[allow(clippy::missing_const_for_fn)] // Vec::new() não é const
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            key_data: bytes,
            algorithm: SignatureAlgorithm::MLDSA87,
        }
    }

    /// Returns the raw bytes of the public key
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_data
    }

    /// Returns the signature algorithm used by this key
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn to_pqc_public_key(&self) -> Result<dilithium5::PublicKey> {
        dilithium5::PublicKey::from_bytes(&self.key_data)
            .map_err(|e| NodeError::CryptographicError(e.to_string()))
    }
}

impl PrivateKey {
    /// Cria uma chave privada a partir de bytes
    #[allow(clippy::missing_const_for_fn)] // Vec operations not const
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            key_data: bytes,
            algorithm: SignatureAlgorithm::MLDSA87,
        }
    }

    /// Returns the raw bytes of the private key
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key_data
    }

    /// Returns the signature algorithm used by this key
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn to_pqc_secret_key(&self) -> Result<dilithium5::SecretKey> {
        dilithium5::SecretKey::from_bytes(&self.key_data)
            .map_err(|e| NodeError::CryptographicError(e.to_string()))
    }
}

impl KeyPair {
    /// Gera um novo par de chaves ML-DSA
    #[must_use]
    pub fn generate() -> Self {
        let (public_key_bytes, secret_key_bytes) = dilithium5::keypair();

        Self {
            public_key: PublicKey::from_bytes(public_key_bytes.as_bytes().to_vec()),
            private_key: PrivateKey::from_bytes(secret_key_bytes.as_bytes().to_vec()),
        }
    }

    /// Assina uma mensagem com a chave privada
    ///
    /// # Errors
    ///
    /// Retorna erro se os bytes da chave privada forem inválidos
    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let secret_key = self.private_key.to_pqc_secret_key()?;
        let signed_message = dilithium5::sign(message, &secret_key);

        Ok(Signature {
            data: signed_message.as_bytes().to_vec(),
            algorithm: SignatureAlgorithm::MLDSA87,
        })
    }
}

impl Signature {
    /// Verifica a assinatura contra uma mensagem e uma chave pública
    ///
    /// # Errors
    ///
    /// Retorna erro se a chave pública for inválida
    pub fn verify(&self, message: &[u8], public_key: &PublicKey) -> Result<bool> {
        let public_key = public_key.to_pqc_public_key()?;
        let signed_message =
            SignedMessage::from_bytes(&self.data).map_err(|_| NodeError::InvalidSignature)?;

        dilithium5::open(&signed_message, &public_key).map_or(Ok(false), |verified_message| {
            Ok(verified_message == message)
        })
    }

    /// Codifica a assinatura em base64 para o formato de fio
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.data)
    }

    /// Decodifica uma assinatura a partir da sua forma base64
    ///
    /// # Errors
    ///
    /// Retorna erro se a string não for base64 válido
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let data = BASE64
            .decode(encoded)
            .map_err(|_| NodeError::InvalidSignature)?;
        Ok(Self {
            data,
            algorithm: SignatureAlgorithm::MLDSA87,
        })
    }

    /// Returns the size in bytes of this signature
    #[must_use]
    pub const fn size(&self) -> usize {
        self.data.len()
    }
}

impl Zeroize for PrivateKey {
    fn zeroize(&mut self) {
        self.key_data.zeroize();
    }
}

impl Drop for PrivateKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}

/// Deriva o endereço de carteira de uma chave pública
/// (primeiros 40 caracteres hex do SHA-256 da chave)
#[must_use]
pub fn wallet_address(public_key: &PublicKey) -> Address {
    Digest::sha256(public_key.as_bytes()).to_hex()[..40].to_string()
}

/// Assina o digest de uma transação com o par de chaves dado
///
/// # Errors
///
/// Retorna erro se a assinatura falhar
pub fn sign_transaction_digest(digest: &Digest, keypair: &KeyPair) -> Result<Signature> {
    keypair.sign(digest.as_bytes())
}

/// Verifica uma assinatura contra o digest de uma transação
///
/// # Errors
///
/// Retorna erro se a verificação falhar
pub fn verify_transaction_signature(
    digest: &Digest,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<bool> {
    signature.verify(digest.as_bytes(), public_key)
}

/// Carteira local: par de chaves e endereço derivado
#[derive(Debug, Clone)]
pub struct Wallet {
    pub keypair: KeyPair,
    pub address: Address,
}

/// Forma persistida da carteira (chaves em base64)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletFile {
    pub address: Address,
    pub public_key: String,
    pub private_key: String,
}

impl Wallet {
    /// Gera uma carteira nova
    #[must_use]
    pub fn generate() -> Self {
        let keypair = KeyPair::generate();
        let address = wallet_address(&keypair.public_key);
        Self { keypair, address }
    }

    /// Converte para a forma persistida
    #[must_use]
    pub fn to_file(&self) -> WalletFile {
        WalletFile {
            address: self.address.clone(),
            public_key: BASE64.encode(self.keypair.public_key.as_bytes()),
            private_key: BASE64.encode(self.keypair.private_key.as_bytes()),
        }
    }

    /// Reconstrói uma carteira a partir da forma persistida
    ///
    /// # Errors
    ///
    /// Retorna erro se as chaves não forem base64 válido
    pub fn from_file(file: &WalletFile) -> Result<Self> {
        let public_key = BASE64
            .decode(&file.public_key)
            .map_err(|e| NodeError::CryptographicError(e.to_string()))?;
        let private_key = BASE64
            .decode(&file.private_key)
            .map_err(|e| NodeError::CryptographicError(e.to_string()))?;

        Ok(Self {
            keypair: KeyPair {
                public_key: PublicKey::from_bytes(public_key),
                private_key: PrivateKey::from_bytes(private_key),
            },
            address: file.address.clone(),
        })
    }
}
