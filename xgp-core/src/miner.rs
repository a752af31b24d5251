use crate::chain::Chain;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Intervalo de sondagem do buffer de transações pendentes
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Estado corrente do minerador de transações
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiningStatus {
    pub is_mining: bool,
    pub miner_address: String,
    pub pending_transactions: usize,
    pub current_block: usize,
    pub mining_reward: f64,
}

/// Minerador de transações pendentes
///
/// Worker em background que sonda o buffer pendente da cadeia a cada
/// segundo e minera um bloco quando há transações aguardando. O sinal de
/// parada é observado entre as rodadas; nenhum bloco é descartado no meio
/// da mineração.
#[derive(Debug)]
pub struct Miner {
    chain: Arc<Mutex<Chain>>,
    miner_address: String,
    is_mining: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Miner {
    /// Cria um minerador para a cadeia compartilhada
    #[must_use]
    pub fn new(chain: Arc<Mutex<Chain>>, miner_address: String) -> Self {
        Self {
            chain,
            miner_address,
            is_mining: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// Inicia o worker de mineração; sem efeito se já estiver rodando
    pub fn start(&mut self) {
        if self.is_mining.swap(true, Ordering::SeqCst) {
            return;
        }

        let chain = Arc::clone(&self.chain);
        let is_mining = Arc::clone(&self.is_mining);
        let miner_address = self.miner_address.clone();

        self.worker = Some(thread::spawn(move || {
            while is_mining.load(Ordering::SeqCst) {
                let mined = {
                    let mut chain = chain.lock().unwrap();
                    if chain.pending_transactions().is_empty() {
                        None
                    } else {
                        match chain.mine_pending(&miner_address) {
                            Ok(block) => Some((block.index, block.hash.clone())),
                            Err(e) => {
                                tracing::warn!(error = %e, "falha ao minerar bloco");
                                None
                            }
                        }
                    }
                };

                if let Some((index, hash)) = mined {
                    tracing::info!(index, %hash, "bloco minerado");
                }

                thread::sleep(POLL_INTERVAL);
            }
        }));
    }

    /// Sinaliza a parada e espera o worker encerrar a rodada corrente
    pub fn stop(&mut self) {
        self.is_mining.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }

    /// Verifica se o worker está ativo
    #[must_use]
    pub fn is_mining(&self) -> bool {
        self.is_mining.load(Ordering::SeqCst)
    }

    /// Estado corrente do minerador e da cadeia
    ///
    /// # Panics
    ///
    /// Entra em pânico se o mutex da cadeia estiver envenenado
    #[must_use]
    pub fn status(&self) -> MiningStatus {
        let chain = self.chain.lock().unwrap();

        MiningStatus {
            is_mining: self.is_mining(),
            miner_address: self.miner_address.clone(),
            pending_transactions: chain.pending_transactions().len(),
            current_block: chain.blocks().len(),
            mining_reward: chain.config().mining_reward,
        }
    }
}
