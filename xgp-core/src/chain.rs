use crate::block::Block;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use shared::{unix_time_now, wallet_address, NodeError, PublicKey, Result};
use std::collections::VecDeque;

/// Parâmetros da cadeia Xugenping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Dificuldade de mineração (zeros hexadecimais iniciais do hash)
    pub difficulty: usize,
    /// Recompensa paga ao minerador por bloco minerado
    pub mining_reward: f64,
    /// Máximo de transações de usuários por bloco
    pub max_block_transactions: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: 4,
            mining_reward: 10.0,
            max_block_transactions: 500,
        }
    }
}

/// Cadeia de blocos com buffer FIFO de transações pendentes
#[derive(Debug, Clone)]
pub struct Chain {
    blocks: Vec<Block>,
    pending: VecDeque<Transaction>,
    config: ChainConfig,
}

/// Forma persistida da cadeia
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSnapshot {
    pub chain: Vec<Block>,
    pub difficulty: usize,
    pub pending_transactions: Vec<Transaction>,
}

/// Estatísticas agregadas da cadeia
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainStats {
    pub height: u64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub pending_transactions: u64,
    pub difficulty: usize,
    pub rewards_issued: f64,
}

impl Chain {
    /// Cria uma nova cadeia com o bloco gênese
    ///
    /// # Errors
    ///
    /// Retorna erro se a construção do bloco gênese falhar
    pub fn new(config: ChainConfig) -> Result<Self> {
        let genesis = Block::genesis(unix_time_now())?;

        Ok(Self {
            blocks: vec![genesis],
            pending: VecDeque::new(),
            config,
        })
    }

    /// Obtém o último bloco da cadeia
    ///
    /// # Panics
    ///
    /// Nunca entra em pânico pois o bloco gênese sempre existe
    #[must_use]
    pub fn latest_block(&self) -> &Block {
        self.blocks.last().unwrap() // Gênese sempre existe
    }

    /// Blocos da cadeia, em ordem de altura
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Transações aguardando mineração, em ordem de chegada
    #[must_use]
    pub const fn pending_transactions(&self) -> &VecDeque<Transaction> {
        &self.pending
    }

    /// Parâmetros configurados da cadeia
    #[must_use]
    pub const fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Admissão crua: anexa uma transação ao buffer pendente sem validação
    pub fn add_transaction(&mut self, sender: &str, recipient: &str, amount: f64) {
        self.pending
            .push_back(Transaction::new(sender.to_string(), recipient.to_string(), amount));
    }

    /// Anexa uma transação já construída ao buffer pendente
    pub fn push_transaction(&mut self, transaction: Transaction) {
        self.pending.push_back(transaction);
    }

    /// Admissão verificada: valida assinatura e saldo antes de aceitar
    ///
    /// O remetente deve corresponder ao endereço derivado da chave pública, a
    /// assinatura deve cobrir o corpo canônico e o valor não pode exceder o
    /// saldo confirmado menos os débitos já pendentes do mesmo remetente.
    ///
    /// # Errors
    ///
    /// Retorna erro se a transação for inválida, não assinada ou sem fundos
    pub fn submit_signed(&mut self, transaction: Transaction, public_key: &PublicKey) -> Result<()> {
        transaction.validate_basic()?;

        if transaction.sender != wallet_address(public_key) {
            return Err(NodeError::InvalidTransaction(
                "Sender does not match the public key".to_string(),
            ));
        }

        if !transaction.verify(public_key)? {
            return Err(NodeError::InvalidSignature);
        }

        let pending_debits: f64 = self
            .pending
            .iter()
            .filter(|tx| tx.sender == transaction.sender)
            .map(|tx| tx.amount)
            .sum();
        let available = self.balance(&transaction.sender) - pending_debits;

        if transaction.amount > available {
            return Err(NodeError::InvalidTransaction(format!(
                "Insufficient funds: {} available, {} required",
                available, transaction.amount
            )));
        }

        self.pending.push_back(transaction);
        Ok(())
    }

    /// Minera as transações pendentes em um novo bloco
    ///
    /// Injeta a transação de recompensa, constrói o bloco no topo da cadeia,
    /// minera até a dificuldade configurada e remove do buffer as transações
    /// incluídas. No máximo `max_block_transactions` transações de usuários
    /// entram por bloco; o excedente permanece pendente.
    ///
    /// # Errors
    ///
    /// Retorna erro se a construção ou mineração do bloco falhar
    pub fn mine_pending(&mut self, miner_address: &str) -> Result<&Block> {
        let take = self.pending.len().min(self.config.max_block_transactions);
        let mut transactions: Vec<Transaction> = self.pending.drain(..take).collect();
        transactions.push(Transaction::reward(miner_address, self.config.mining_reward));

        let mut block = Block::new(
            self.blocks.len() as u64,
            transactions,
            unix_time_now(),
            self.latest_block().hash.clone(),
            0,
            Some(miner_address.to_string()),
        )?;

        block.mine(self.config.difficulty)?;
        self.blocks.push(block);

        Ok(self.latest_block())
    }

    /// Saldo de um endereço: créditos menos débitos em toda a cadeia
    ///
    /// O valor pode ser negativo; a admissão crua não impede descobertos.
    #[must_use]
    pub fn balance(&self, address: &str) -> f64 {
        let mut balance = 0.0;

        for block in &self.blocks {
            for transaction in &block.transactions {
                if transaction.sender == address {
                    balance -= transaction.amount;
                }
                if transaction.recipient == address {
                    balance += transaction.amount;
                }
            }
        }

        balance
    }

    /// Verifica a integridade da cadeia: hash recalculável e encadeamento
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização canônica de algum bloco falhar
    pub fn is_valid(&self) -> Result<bool> {
        for i in 1..self.blocks.len() {
            let current = &self.blocks[i];
            let previous = &self.blocks[i - 1];

            if current.hash != current.compute_hash()? {
                return Ok(false);
            }

            if current.previous_hash != previous.hash {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Exporta a forma persistida da cadeia
    #[must_use]
    pub fn snapshot(&self) -> ChainSnapshot {
        ChainSnapshot {
            chain: self.blocks.clone(),
            difficulty: self.config.difficulty,
            pending_transactions: self.pending.iter().cloned().collect(),
        }
    }

    /// Reconstrói uma cadeia a partir de um snapshot, verificando invariantes
    ///
    /// # Errors
    ///
    /// Retorna erro se o snapshot estiver vazio ou violar os invariantes da
    /// cadeia (hash ou encadeamento inconsistentes)
    pub fn from_snapshot(snapshot: ChainSnapshot) -> Result<Self> {
        if snapshot.chain.is_empty() {
            return Err(NodeError::InvalidChain(
                "Snapshot has no genesis block".to_string(),
            ));
        }

        let chain = Self {
            blocks: snapshot.chain,
            pending: snapshot.pending_transactions.into(),
            config: ChainConfig {
                difficulty: snapshot.difficulty,
                ..ChainConfig::default()
            },
        };

        if !chain.is_valid()? {
            return Err(NodeError::InvalidChain(
                "Snapshot violates hash linkage".to_string(),
            ));
        }

        Ok(chain)
    }

    /// Estatísticas agregadas da cadeia
    #[must_use]
    pub fn stats(&self) -> ChainStats {
        let rewards_issued = self
            .blocks
            .iter()
            .flat_map(|block| &block.transactions)
            .filter(|tx| tx.is_reward())
            .map(|tx| tx.amount)
            .sum();

        ChainStats {
            height: (self.blocks.len() - 1) as u64,
            total_blocks: self.blocks.len() as u64,
            total_transactions: self
                .blocks
                .iter()
                .map(|block| block.transactions.len() as u64)
                .sum(),
            pending_transactions: self.pending.len() as u64,
            difficulty: self.config.difficulty,
            rewards_issued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::NETWORK_SENDER;
    use shared::Wallet;

    fn test_config() -> ChainConfig {
        ChainConfig {
            difficulty: 2, // Baixa para testes rápidos
            ..ChainConfig::default()
        }
    }

    #[test]
    fn test_genesis_and_one_block() {
        let mut chain = Chain::new(test_config()).unwrap();

        chain.add_transaction("alice", "bob", 10.0);
        chain.mine_pending("miner1").unwrap();

        assert_eq!(chain.blocks().len(), 2);

        let block = chain.latest_block();
        assert_eq!(block.transactions.len(), 2);
        assert_eq!(block.transactions[1].sender, NETWORK_SENDER);
        assert_eq!(block.transactions[1].recipient, "miner1");
        assert!((block.transactions[1].amount - 10.0).abs() < f64::EPSILON);

        assert!((chain.balance("miner1") - 10.0).abs() < f64::EPSILON);
        assert!((chain.balance("alice") + 10.0).abs() < f64::EPSILON);
        assert!((chain.balance("bob") - 10.0).abs() < f64::EPSILON);

        assert!(chain.is_valid().unwrap());
    }

    #[test]
    fn test_mined_blocks_meet_difficulty_and_link() {
        let mut chain = Chain::new(test_config()).unwrap();

        for round in 0..3 {
            chain.add_transaction("alice", "bob", f64::from(round));
            chain.mine_pending("miner1").unwrap();
        }

        for i in 1..chain.blocks().len() {
            let block = &chain.blocks()[i];
            assert!(block.hash.starts_with("00"));
            assert_eq!(block.previous_hash, chain.blocks()[i - 1].hash);
        }

        assert!(chain.is_valid().unwrap());
    }

    #[test]
    fn test_rewards_issued_matches_credit_sum() {
        let mut chain = Chain::new(test_config()).unwrap();

        chain.add_transaction("alice", "bob", 4.0);
        chain.mine_pending("miner1").unwrap();
        chain.add_transaction("bob", "carol", 1.0);
        chain.mine_pending("miner2").unwrap();

        // Créditos menos débitos de todos os endereços = recompensas emitidas
        // (o débito da "network" cancela tudo que não veio de recompensa)
        let net: f64 = ["alice", "bob", "carol", "miner1", "miner2"]
            .iter()
            .map(|address| chain.balance(address))
            .sum();

        assert!((net - chain.stats().rewards_issued).abs() < f64::EPSILON);
        assert!((chain.stats().rewards_issued - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_block_transaction_cap() {
        let mut chain = Chain::new(ChainConfig {
            difficulty: 1,
            max_block_transactions: 2,
            ..ChainConfig::default()
        })
        .unwrap();

        for i in 0..5 {
            chain.add_transaction("alice", "bob", f64::from(i));
        }
        chain.mine_pending("miner1").unwrap();

        // 2 transações de usuários + recompensa; o resto continua pendente
        assert_eq!(chain.latest_block().transactions.len(), 3);
        assert_eq!(chain.pending_transactions().len(), 3);

        // A fila é FIFO: as duas primeiras entraram no bloco
        assert!((chain.latest_block().transactions[0].amount - 0.0).abs() < f64::EPSILON);
        assert!((chain.latest_block().transactions[1].amount - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pending_buffer_drains_on_mining() {
        let mut chain = Chain::new(test_config()).unwrap();

        chain.add_transaction("alice", "bob", 1.0);
        chain.add_transaction("bob", "carol", 2.0);
        assert_eq!(chain.pending_transactions().len(), 2);

        chain.mine_pending("miner1").unwrap();
        assert!(chain.pending_transactions().is_empty());
    }

    #[test]
    fn test_signed_submission() {
        let mut chain = Chain::new(test_config()).unwrap();
        let wallet = Wallet::generate();

        // Dá fundos ao remetente via mineração
        chain.mine_pending(&wallet.address).unwrap();

        let mut tx = Transaction::new(wallet.address.clone(), "bob".to_string(), 4.0);
        tx.sign(&wallet.keypair).unwrap();
        chain.submit_signed(tx, &wallet.keypair.public_key).unwrap();

        assert_eq!(chain.pending_transactions().len(), 1);
    }

    #[test]
    fn test_signed_submission_rejects_overdraft() {
        let mut chain = Chain::new(test_config()).unwrap();
        let wallet = Wallet::generate();

        chain.mine_pending(&wallet.address).unwrap(); // saldo 10

        let mut tx = Transaction::new(wallet.address.clone(), "bob".to_string(), 8.0);
        tx.sign(&wallet.keypair).unwrap();
        chain.submit_signed(tx, &wallet.keypair.public_key).unwrap();

        // Segunda transação excede o saldo menos os débitos pendentes
        let mut overdraft = Transaction::new(wallet.address.clone(), "bob".to_string(), 8.0);
        overdraft.sign(&wallet.keypair).unwrap();
        assert!(chain
            .submit_signed(overdraft, &wallet.keypair.public_key)
            .is_err());
    }

    #[test]
    fn test_signed_submission_rejects_unsigned_and_foreign() {
        let mut chain = Chain::new(test_config()).unwrap();
        let wallet = Wallet::generate();
        let other = Wallet::generate();

        chain.mine_pending(&wallet.address).unwrap();

        // Sem assinatura
        let unsigned = Transaction::new(wallet.address.clone(), "bob".to_string(), 1.0);
        assert!(chain
            .submit_signed(unsigned, &wallet.keypair.public_key)
            .is_err());

        // Remetente não corresponde à chave pública apresentada
        let mut foreign = Transaction::new(wallet.address.clone(), "bob".to_string(), 1.0);
        foreign.sign(&other.keypair).unwrap();
        assert!(chain
            .submit_signed(foreign, &other.keypair.public_key)
            .is_err());
    }

    #[test]
    fn test_tampering_invalidates_chain() {
        let mut chain = Chain::new(test_config()).unwrap();
        chain.add_transaction("alice", "bob", 10.0);
        chain.mine_pending("miner1").unwrap();
        assert!(chain.is_valid().unwrap());

        chain.blocks[1].transactions[0].amount = 1_000_000.0;
        assert!(!chain.is_valid().unwrap());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let mut chain = Chain::new(test_config()).unwrap();
        chain.add_transaction("alice", "bob", 3.0);
        chain.mine_pending("miner1").unwrap();
        chain.add_transaction("bob", "carol", 1.0);

        let snapshot = chain.snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored =
            Chain::from_snapshot(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.blocks().len(), 2);
        assert_eq!(restored.pending_transactions().len(), 1);
        assert_eq!(restored.config().difficulty, 2);
        assert!((restored.balance("bob") - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_with_broken_linkage_is_fatal() {
        let mut chain = Chain::new(test_config()).unwrap();
        chain.add_transaction("alice", "bob", 3.0);
        chain.mine_pending("miner1").unwrap();

        let mut snapshot = chain.snapshot();
        snapshot.chain[1].previous_hash = "ff".repeat(32);

        assert!(Chain::from_snapshot(snapshot).is_err());
    }

    #[test]
    fn test_stats() {
        let mut chain = Chain::new(test_config()).unwrap();
        chain.add_transaction("alice", "bob", 1.0);
        chain.mine_pending("miner1").unwrap();
        chain.add_transaction("bob", "carol", 1.0);

        let stats = chain.stats();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.total_blocks, 2);
        assert_eq!(stats.total_transactions, 2);
        assert_eq!(stats.pending_transactions, 1);
        assert_eq!(stats.difficulty, 2);
    }
}
