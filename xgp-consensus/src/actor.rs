//! Ator de réplica: estado próprio, inbox tipado e broadcast de saída
//!
//! Cada réplica roda como uma tarefa tokio que é dona exclusiva do seu
//! estado; as transições de fase são atômicas em relação à chegada de
//! mensagens porque o inbox serializa os eventos.

use crate::message::{ConsensusMessage, MessageType};
use crate::replica::Replica;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Capacidade do inbox de cada réplica
const INBOX_CAPACITY: usize = 64;

/// Eventos aceitos pelo ator da réplica
#[derive(Debug)]
pub enum ReplicaEvent {
    /// Pedido de cliente entregue ao primário
    ClientRequest(Value),
    /// Mensagem de protocolo vinda de outra réplica
    Peer(ConsensusMessage),
}

/// Handle para entregar eventos ao ator
#[derive(Debug, Clone)]
pub struct ReplicaHandle {
    inbox: mpsc::Sender<ReplicaEvent>,
}

impl ReplicaHandle {
    /// Entrega um pedido de cliente; `false` se o ator já encerrou
    pub async fn submit_request(&self, request: Value) -> bool {
        self.inbox
            .send(ReplicaEvent::ClientRequest(request))
            .await
            .is_ok()
    }

    /// Entrega uma mensagem de protocolo; `false` se o ator já encerrou
    pub async fn deliver(&self, message: ConsensusMessage) -> bool {
        self.inbox.send(ReplicaEvent::Peer(message)).await.is_ok()
    }
}

/// Inicia o ator da réplica
///
/// A réplica passa a ser propriedade exclusiva da tarefa; toda mensagem
/// produzida pelos handlers é publicada no canal de saída para broadcast.
/// O ator encerra quando todos os handles forem descartados ou quando o
/// canal de saída fechar.
#[must_use]
pub fn spawn(
    mut replica: Replica,
    outbox: mpsc::Sender<ConsensusMessage>,
) -> (ReplicaHandle, JoinHandle<()>) {
    let (inbox_tx, mut inbox_rx) = mpsc::channel(INBOX_CAPACITY);

    let task = tokio::spawn(async move {
        while let Some(event) = inbox_rx.recv().await {
            let outcome = match event {
                ReplicaEvent::ClientRequest(request) => {
                    replica.handle_request(request).map(Some)
                }
                ReplicaEvent::Peer(message) => match message.kind {
                    MessageType::PrePrepare => replica.handle_pre_prepare(&message).map(Some),
                    MessageType::Prepare => replica.handle_prepare(&message),
                    MessageType::Commit => replica.handle_commit(&message),
                    // REQUEST chega pelo evento de cliente; REPLY é terminal
                    MessageType::Request | MessageType::Reply => Ok(None),
                },
            };

            match outcome {
                Ok(Some(message)) => {
                    if outbox.send(message).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "mensagem de consenso rejeitada"),
            }
        }
    });

    (ReplicaHandle { inbox: inbox_tx }, task)
}
