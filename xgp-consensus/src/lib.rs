pub mod actor;
pub mod message;
pub mod replica;

// Re-exports principais
pub use actor::{spawn, ReplicaEvent, ReplicaHandle};
pub use message::{request_digest, ConsensusMessage, MessageType};
pub use replica::Replica;

// Re-exports de tipos compartilhados
pub use shared::{Digest, NodeError, Result};
