use thiserror::Error;

/// Erros do nó Xugenping
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Transação inválida: {0}")]
    InvalidTransaction(String),

    #[error("Bloco inválido: {0}")]
    InvalidBlock(String),

    #[error("Cadeia inválida: {0}")]
    InvalidChain(String),

    #[error("Contrato não encontrado: {0}")]
    ContractNotFound(String),

    #[error("Mensagem de consenso inválida: {0}")]
    InvalidMessage(String),

    #[error("Nó não é o primário da visão atual: {0}")]
    NotPrimary(String),

    #[error("Peer rejeitado: {0}")]
    PeerRejected(String),

    #[error("Assinatura inválida")]
    InvalidSignature,

    #[error("Erro criptográfico: {0}")]
    CryptographicError(String),

    #[error("Erro de serialização: {0}")]
    SerializationError(String),

    #[error("Erro de I/O: {0}")]
    IoError(String),
}
