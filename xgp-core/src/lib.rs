pub mod block;
pub mod chain;
pub mod contracts;
pub mod ethash;
pub mod gas;
pub mod miner;
pub mod security;
pub mod token;
pub mod transaction;
pub mod vm;

// Re-exports principais
pub use block::{Block, GENESIS_PREVIOUS_HASH};
pub use chain::{Chain, ChainConfig, ChainSnapshot, ChainStats};
pub use contracts::{contract_address, Contract, ContractRegistry};
pub use ethash::{Ethash, EthashMiner, MinedHeader, PowSolution};
pub use miner::{Miner, MiningStatus};
pub use security::{BlockTimingGuard, PeerPolicy, ReplayGuard};
pub use transaction::{Transaction, NETWORK_SENDER};
pub use vm::{BytecodeBuilder, ContractVm, Execution, OpCode, VmFault};

// Re-exports de tipos compartilhados
pub use shared::{Digest, NodeError, Result};
