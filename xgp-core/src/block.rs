use crate::token::{self, TOKEN_SYMBOL};
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use shared::{Digest, NodeError, Result};

/// Hash anterior do bloco gênese (64 zeros)
pub const GENESIS_PREVIOUS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

/// Bloco da cadeia Xugenping
///
/// O hash cobre exatamente os campos `index`, `timestamp`, `transactions`,
/// `previous_hash`, `nonce`, `miner_address` e `reward`, serializados como
/// JSON com chaves ordenadas e digeridos com SHA-256.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub previous_hash: String,
    pub nonce: u64,
    pub miner_address: Option<String>,
    pub reward: u64,
    pub hash: String,
    #[serde(default = "default_reward_symbol")]
    pub reward_symbol: String,
}

fn default_reward_symbol() -> String {
    TOKEN_SYMBOL.to_string()
}

impl Block {
    /// Cria um novo bloco com recompensa derivada da altura e hash calculado
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        timestamp: f64,
        previous_hash: String,
        nonce: u64,
        miner_address: Option<String>,
    ) -> Result<Self> {
        let mut block = Self {
            index,
            timestamp,
            transactions,
            previous_hash,
            nonce,
            miner_address,
            reward: token::block_reward(index),
            hash: String::new(),
            reward_symbol: default_reward_symbol(),
        };
        block.hash = block.compute_hash()?;
        Ok(block)
    }

    /// Cria o bloco gênese (altura 0, sem transações, sem minerador)
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn genesis(timestamp: f64) -> Result<Self> {
        Self::new(
            0,
            Vec::new(),
            timestamp,
            GENESIS_PREVIOUS_HASH.to_string(),
            0,
            None,
        )
    }

    /// Forma canônica do bloco: os sete campos cobertos pelo hash,
    /// com chaves ordenadas lexicograficamente
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização das transações falhar
    pub fn canonical_value(&self) -> Result<Value> {
        let transactions = serde_json::to_value(&self.transactions)
            .map_err(|e| NodeError::SerializationError(e.to_string()))?;

        Ok(json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": transactions,
            "previous_hash": self.previous_hash,
            "nonce": self.nonce,
            "miner_address": self.miner_address,
            "reward": self.reward,
        }))
    }

    /// Recalcula o hash SHA-256 hexadecimal da forma canônica
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica falhar
    pub fn compute_hash(&self) -> Result<String> {
        let canonical = self.canonical_value()?;
        Ok(Digest::sha256(canonical.to_string().as_bytes()).to_hex())
    }

    /// Verifica se o hash do bloco começa com `difficulty` zeros hexadecimais
    #[must_use]
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        self.hash.bytes().take(difficulty).all(|b| b == b'0')
            && self.hash.len() >= difficulty
    }

    /// Minera o bloco: incrementa o nonce até o hash atender à dificuldade
    ///
    /// # Errors
    ///
    /// Retorna erro se o recálculo do hash falhar
    pub fn mine(&mut self, difficulty: usize) -> Result<()> {
        while !self.meets_difficulty(difficulty) {
            self.nonce += 1;
            self.hash = self.compute_hash()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::unix_time_now;

    fn sample_block() -> Block {
        let tx = Transaction::new("alice".to_string(), "bob".to_string(), 10.0);
        Block::new(
            1,
            vec![tx],
            1_700_000_000.5,
            GENESIS_PREVIOUS_HASH.to_string(),
            0,
            Some("miner1".to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(unix_time_now()).unwrap();

        assert_eq!(genesis.index, 0);
        assert!(genesis.transactions.is_empty());
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert_eq!(genesis.nonce, 0);
        assert!(genesis.miner_address.is_none());
        assert_eq!(genesis.reward, 50);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = sample_block();

        assert_eq!(block.hash, block.compute_hash().unwrap());
        assert_eq!(block.compute_hash().unwrap(), block.compute_hash().unwrap());
        assert_eq!(block.hash.len(), 64);
    }

    #[test]
    fn test_hash_covers_exactly_seven_fields() {
        let block = sample_block();
        let canonical = block.canonical_value().unwrap();
        let object = canonical.as_object().unwrap();

        let keys: Vec<&str> = object.keys().map(String::as_str).collect();
        // serde_json mantém as chaves em ordem lexicográfica
        assert_eq!(
            keys,
            vec![
                "index",
                "miner_address",
                "nonce",
                "previous_hash",
                "reward",
                "timestamp",
                "transactions"
            ]
        );
    }

    #[test]
    fn test_nonce_changes_hash() {
        let mut block = sample_block();
        let original = block.hash.clone();

        block.nonce += 1;
        assert_ne!(block.compute_hash().unwrap(), original);
    }

    #[test]
    fn test_mining_meets_difficulty() {
        let mut block = sample_block();
        block.mine(2).unwrap();

        assert!(block.hash.starts_with("00"));
        assert!(block.meets_difficulty(2));
        // O hash armazenado continua consistente com a forma canônica
        assert_eq!(block.hash, block.compute_hash().unwrap());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let block = sample_block();
        let json = serde_json::to_string(&block).unwrap();
        let restored: Block = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, block);
        assert_eq!(restored.reward_symbol, TOKEN_SYMBOL);
    }
}
