use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::Digest;

/// Fases do protocolo PBFT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Request,
    PrePrepare,
    Prepare,
    Commit,
    Reply,
}

/// Mensagem do protocolo PBFT
///
/// Todas as fases compartilham o mesmo registro: tipo, visão, número de
/// sequência, identificador do pedido e digest. Apenas o PRE_PREPARE carrega
/// o pedido completo; apenas o REPLY carrega o resultado. O identificador do
/// pedido é igual ao digest do corpo canônico.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusMessage {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub view: u64,
    pub seq_num: u64,
    pub request_id: Digest,
    pub digest: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ConsensusMessage {
    /// Constrói o PRE_PREPARE emitido pelo primário
    #[must_use]
    pub const fn pre_prepare(view: u64, seq_num: u64, digest: Digest, request: Value) -> Self {
        Self {
            kind: MessageType::PrePrepare,
            view,
            seq_num,
            request_id: digest,
            digest,
            request: Some(request),
            result: None,
        }
    }

    /// Constrói o PREPARE emitido por uma réplica de backup
    #[must_use]
    pub const fn prepare(view: u64, seq_num: u64, digest: Digest) -> Self {
        Self {
            kind: MessageType::Prepare,
            view,
            seq_num,
            request_id: digest,
            digest,
            request: None,
            result: None,
        }
    }

    /// Constrói o COMMIT emitido ao atingir o quórum de prepares
    #[must_use]
    pub const fn commit(view: u64, seq_num: u64, digest: Digest) -> Self {
        Self {
            kind: MessageType::Commit,
            view,
            seq_num,
            request_id: digest,
            digest,
            request: None,
            result: None,
        }
    }

    /// Constrói o REPLY emitido após a execução do pedido
    #[must_use]
    pub const fn reply(view: u64, seq_num: u64, request_id: Digest, result: String) -> Self {
        Self {
            kind: MessageType::Reply,
            view,
            seq_num,
            request_id,
            digest: request_id,
            request: None,
            result: Some(result),
        }
    }
}

/// Digest de um pedido: SHA-256 do corpo canônico (JSON com chaves ordenadas)
#[must_use]
pub fn request_digest(request: &Value) -> Digest {
    Digest::sha256(request.to_string().as_bytes())
}
