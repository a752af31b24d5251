use crate::message::{request_digest, ConsensusMessage};
use serde_json::Value;
use shared::{Digest, NodeError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use xgp_core::{Chain, Transaction};

/// Marcador de sucesso devolvido no REPLY
const SUCCESS: &str = "success";

/// Registro em andamento de um pedido, indexado pelo digest
///
/// Substitui os quatro logs paralelos do protocolo clássico: o pedido, o
/// pre-prepare e os contadores de fase vivem em uma única entrada.
#[derive(Debug, Default, Clone)]
struct InFlight {
    request: Option<Value>,
    pre_prepare: Option<ConsensusMessage>,
    prepare_count: u32,
    commit_count: u32,
}

/// Réplica PBFT de um nó
///
/// Mantém a visão corrente, o número de sequência atribuído pelo primário e
/// os registros por digest dos pedidos em andamento. Os limiares de quórum
/// `2f + 1` contam a participação da própria réplica: o primário conta o seu
/// pre-prepare implicitamente e os backups se contam ao emitir o próprio
/// prepare/commit, de modo que N = 4, f = 1 fecha quórum com 3 mensagens.
#[derive(Debug)]
pub struct Replica {
    node_id: String,
    nodes: Vec<String>,
    view: u64,
    seq_num: u64,
    in_flight: HashMap<Digest, InFlight>,
    chain: Option<Arc<Mutex<Chain>>>,
}

impl Replica {
    /// Cria uma réplica para o conjunto de nós dado
    ///
    /// # Panics
    ///
    /// Entra em pânico se a lista de nós estiver vazia
    #[must_use]
    pub fn new(node_id: String, nodes: Vec<String>) -> Self {
        assert!(!nodes.is_empty(), "replica set must not be empty");

        Self {
            node_id,
            nodes,
            view: 0,
            seq_num: 0,
            in_flight: HashMap::new(),
            chain: None,
        }
    }

    /// Conecta a cadeia executada quando um pedido atinge o quórum de commit
    pub fn attach_chain(&mut self, chain: Arc<Mutex<Chain>>) {
        self.chain = Some(chain);
    }

    /// Quantidade total de réplicas (N)
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Tolerância bizantina: f = ⌊(N − 1) / 3⌋
    #[must_use]
    pub fn fault_tolerance(&self) -> usize {
        (self.nodes.len() - 1) / 3
    }

    /// Limiar de quórum por fase: 2f + 1
    #[must_use]
    pub fn quorum(&self) -> u32 {
        2 * self.fault_tolerance() as u32 + 1
    }

    /// Visão corrente
    #[must_use]
    pub const fn view(&self) -> u64 {
        self.view
    }

    /// Próximo número de sequência a ser atribuído pelo primário
    #[must_use]
    pub const fn seq_num(&self) -> u64 {
        self.seq_num
    }

    /// Identidade do primário da visão corrente: `nodes[view mod N]`
    #[must_use]
    pub fn primary(&self) -> &str {
        &self.nodes[(self.view as usize) % self.nodes.len()]
    }

    /// Verifica se esta réplica é o primário da visão corrente
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.node_id == self.primary()
    }

    /// Contador de prepares registrado para um digest
    #[must_use]
    pub fn prepare_count(&self, digest: &Digest) -> u32 {
        self.in_flight.get(digest).map_or(0, |e| e.prepare_count)
    }

    /// Contador de commits registrado para um digest
    #[must_use]
    pub fn commit_count(&self, digest: &Digest) -> u32 {
        self.in_flight.get(digest).map_or(0, |e| e.commit_count)
    }

    /// Verifica se existe um pre-prepare registrado para o digest
    #[must_use]
    pub fn has_pre_prepare(&self, digest: &Digest) -> bool {
        self.in_flight
            .get(digest)
            .is_some_and(|e| e.pre_prepare.is_some())
    }

    /// Quantidade de pedidos em andamento
    #[must_use]
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Trata um pedido de cliente (caminho do primário)
    ///
    /// O primário registra o pedido sob o seu digest, atribui o próximo
    /// número de sequência e devolve o PRE_PREPARE para broadcast.
    ///
    /// # Errors
    ///
    /// Retorna erro se esta réplica não for o primário da visão corrente
    pub fn handle_request(&mut self, request: Value) -> Result<ConsensusMessage> {
        if !self.is_primary() {
            return Err(NodeError::NotPrimary(format!(
                "{} is not the primary of view {}",
                self.node_id, self.view
            )));
        }

        let digest = request_digest(&request);
        let seq_num = self.seq_num;
        self.seq_num += 1;

        let pre_prepare = ConsensusMessage::pre_prepare(self.view, seq_num, digest, request.clone());

        let entry = self.in_flight.entry(digest).or_default();
        entry.request = Some(request);
        entry.pre_prepare = Some(pre_prepare.clone());

        Ok(pre_prepare)
    }

    /// Trata um PRE_PREPARE (caminho do backup)
    ///
    /// Verifica que a visão da mensagem identifica o primário correto e que
    /// o digest bate com o pedido carregado; registra o pedido e devolve o
    /// PREPARE, já contando a própria participação.
    ///
    /// # Errors
    ///
    /// Retorna erro se a visão, o primário ou o digest não conferirem
    pub fn handle_pre_prepare(&mut self, message: &ConsensusMessage) -> Result<ConsensusMessage> {
        if self.nodes[(message.view as usize) % self.nodes.len()] != self.primary() {
            return Err(NodeError::InvalidMessage(
                "Pre-prepare from the wrong primary".to_string(),
            ));
        }

        let Some(request) = &message.request else {
            return Err(NodeError::InvalidMessage(
                "Pre-prepare without a request body".to_string(),
            ));
        };

        if request_digest(request) != message.digest {
            return Err(NodeError::InvalidMessage(
                "Pre-prepare digest does not match the request".to_string(),
            ));
        }

        let entry = self.in_flight.entry(message.digest).or_default();
        entry.request = Some(request.clone());
        entry.pre_prepare = Some(message.clone());
        entry.prepare_count = 1;

        Ok(ConsensusMessage::prepare(
            self.view,
            message.seq_num,
            message.digest,
        ))
    }

    /// Trata um PREPARE
    ///
    /// Incrementa o contador do digest; ao atingir `2f + 1` emite o COMMIT
    /// e inicializa o contador de commits com a própria participação.
    ///
    /// # Errors
    ///
    /// Retorna erro se não houver pre-prepare correspondente ou se visão,
    /// sequência e digest não estiverem alinhados
    pub fn handle_prepare(&mut self, message: &ConsensusMessage) -> Result<Option<ConsensusMessage>> {
        self.verify_against_pre_prepare(message)?;
        let quorum = self.quorum();

        let Some(entry) = self.in_flight.get_mut(&message.digest) else {
            return Err(NodeError::InvalidMessage(
                "Prepare without a pre-prepare".to_string(),
            ));
        };

        entry.prepare_count += 1;
        if entry.prepare_count == quorum {
            entry.commit_count = 1;
            return Ok(Some(ConsensusMessage::commit(
                message.view,
                message.seq_num,
                message.digest,
            )));
        }

        Ok(None)
    }

    /// Trata um COMMIT
    ///
    /// Incrementa o contador do digest; ao atingir `2f + 1` executa o pedido
    /// e devolve o REPLY.
    ///
    /// # Errors
    ///
    /// Retorna erro se a verificação falhar ou se a execução do pedido
    /// contra a cadeia falhar
    pub fn handle_commit(&mut self, message: &ConsensusMessage) -> Result<Option<ConsensusMessage>> {
        self.verify_against_pre_prepare(message)?;
        let quorum = self.quorum();

        let request = {
            let Some(entry) = self.in_flight.get_mut(&message.digest) else {
                return Err(NodeError::InvalidMessage(
                    "Commit without a pre-prepare".to_string(),
                ));
            };

            entry.commit_count += 1;
            if entry.commit_count != quorum {
                return Ok(None);
            }
            entry.request.clone()
        };

        let Some(request) = request else {
            return Err(NodeError::InvalidMessage(
                "Commit quorum without a recorded request".to_string(),
            ));
        };

        let result = self.execute_request(&request)?;
        Ok(Some(ConsensusMessage::reply(
            self.view,
            message.seq_num,
            message.request_id,
            result,
        )))
    }

    /// Verifica uma mensagem de fase contra o pre-prepare registrado
    fn verify_against_pre_prepare(&self, message: &ConsensusMessage) -> Result<()> {
        let pre_prepare = self
            .in_flight
            .get(&message.digest)
            .and_then(|entry| entry.pre_prepare.as_ref())
            .ok_or_else(|| {
                NodeError::InvalidMessage("No matching pre-prepare recorded".to_string())
            })?;

        if message.view != pre_prepare.view
            || message.seq_num != pre_prepare.seq_num
            || message.digest != pre_prepare.digest
        {
            return Err(NodeError::InvalidMessage(
                "View, sequence or digest mismatch".to_string(),
            ));
        }

        Ok(())
    }

    /// Executa um pedido que atingiu o quórum de commit
    ///
    /// Pedidos carregando um conjunto de transações e um endereço de
    /// minerador são aplicados à cadeia via `mine_pending`; qualquer outro
    /// pedido devolve o marcador de sucesso.
    fn execute_request(&self, request: &Value) -> Result<String> {
        let transactions = request.get("transactions");
        let miner_address = request.get("miner_address").and_then(Value::as_str);

        if let (Some(transactions), Some(miner_address), Some(chain)) =
            (transactions, miner_address, &self.chain)
        {
            let transactions: Vec<Transaction> = serde_json::from_value(transactions.clone())
                .map_err(|e| NodeError::InvalidMessage(e.to_string()))?;

            let mut chain = chain
                .lock()
                .map_err(|_| NodeError::InvalidChain("Chain mutex poisoned".to_string()))?;

            for transaction in transactions {
                chain.push_transaction(transaction);
            }
            let block = chain.mine_pending(miner_address)?;
            tracing::info!(index = block.index, "pedido comprometido minerado na cadeia");
        }

        Ok(SUCCESS.to_string())
    }

    /// Avança a visão: novo primário `nodes[view mod N]`, logs e contadores
    /// limpos. Disparo manual apenas; recuperação completa de troca de visão
    /// fica fora do protocolo.
    pub fn change_view(&mut self) {
        self.view += 1;
        self.in_flight.clear();
    }
}
