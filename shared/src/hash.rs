use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;

/// Digest SHA-256 de 256 bits usado para blocos, transações e pedidos de consenso
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Creates a zeroed digest
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a digest from a 32-byte array
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes of the digest
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes the SHA-256 digest of the provided data
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    /// Codifica o digest como string hexadecimal minúscula
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decodifica um digest a partir de uma string hexadecimal de 64 caracteres
    #[must_use]
    pub fn from_hex(hex_string: &str) -> Option<Self> {
        let bytes = hex::decode(hex_string).ok()?;
        let hash: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(hash))
    }

    /// Conta quantos nibbles (dígitos hex) iniciais do digest são zero
    #[must_use]
    pub fn leading_zero_nibbles(&self) -> u32 {
        let mut zeros = 0;
        for &byte in &self.0 {
            if byte == 0 {
                zeros += 2;
            } else if byte < 0x10 {
                zeros += 1;
                break;
            } else {
                break;
            }
        }
        zeros
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// No formato de fio os digests circulam como strings hexadecimais,
// tanto nos snapshots quanto nas mensagens PBFT.
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex_string = String::deserialize(deserializer)?;
        Self::from_hex(&hex_string)
            .ok_or_else(|| serde::de::Error::custom("digest must be 64 hex characters"))
    }
}
