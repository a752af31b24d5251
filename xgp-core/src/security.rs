//! Guardas de segurança da camada de rede e do mempool

use shared::{unix_time_now, NodeError, Result};
use std::collections::{HashMap, HashSet};

/// Janela padrão de proteção contra replay (segundos)
const DEFAULT_REPLAY_WINDOW: f64 = 3600.0;

/// Espaçamento mínimo padrão entre blocos (segundos)
const DEFAULT_MIN_BLOCK_SPACING: f64 = 15.0;

/// Máximo padrão de requisições por peer dentro da janela
const DEFAULT_MAX_REQUESTS: usize = 100;

/// Janela padrão do limitador de taxa (segundos)
const DEFAULT_RATE_WINDOW: f64 = 60.0;

/// Janela de digests já vistos para bloquear replay de transações
#[derive(Debug)]
pub struct ReplayGuard {
    seen: HashMap<String, f64>,
    window: f64,
}

impl Default for ReplayGuard {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_WINDOW)
    }
}

impl ReplayGuard {
    /// Cria uma guarda com a janela de expiração dada, em segundos
    #[must_use]
    pub fn new(window: f64) -> Self {
        Self {
            seen: HashMap::new(),
            window,
        }
    }

    /// Registra o digest de uma transação admitida
    pub fn record(&mut self, tx_digest: &str) {
        self.seen.insert(tx_digest.to_string(), unix_time_now());
    }

    /// Verifica se o digest ainda está protegido; entradas expiradas são
    /// removidas na consulta
    pub fn is_replay(&mut self, tx_digest: &str) -> bool {
        match self.seen.get(tx_digest) {
            Some(&recorded) if unix_time_now() - recorded > self.window => {
                self.seen.remove(tx_digest);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Remove todas as entradas expiradas
    pub fn purge_expired(&mut self) {
        let now = unix_time_now();
        self.seen.retain(|_, &mut recorded| now - recorded <= self.window);
    }
}

/// Verificação de espaçamento mínimo entre blocos
#[derive(Debug)]
pub struct BlockTimingGuard {
    timestamps: HashMap<String, f64>,
    min_spacing: f64,
}

impl Default for BlockTimingGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_BLOCK_SPACING)
    }
}

impl BlockTimingGuard {
    /// Cria uma guarda com o espaçamento mínimo dado, em segundos
    #[must_use]
    pub fn new(min_spacing: f64) -> Self {
        Self {
            timestamps: HashMap::new(),
            min_spacing,
        }
    }

    /// Verifica o timestamp de um bloco contra o último bloco observado;
    /// blocos aceitos são registrados
    pub fn check(&mut self, block_hash: &str, timestamp: f64) -> bool {
        if !self.timestamps.is_empty() {
            let last = self
                .timestamps
                .values()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
            if timestamp - last < self.min_spacing {
                return false;
            }
        }

        self.timestamps.insert(block_hash.to_string(), timestamp);
        true
    }

    /// Descarta registros mais antigos que `max_age` segundos
    pub fn purge_older_than(&mut self, max_age: f64) {
        let now = unix_time_now();
        self.timestamps.retain(|_, &mut t| now - t <= max_age);
    }
}

/// Política de peers: lista negra e limite de taxa por janela deslizante
#[derive(Debug)]
pub struct PeerPolicy {
    blacklist: HashSet<String>,
    requests: HashMap<String, Vec<f64>>,
    max_requests: usize,
    window: f64,
}

impl Default for PeerPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_RATE_WINDOW)
    }
}

impl PeerPolicy {
    /// Cria uma política com o limite e a janela dados
    #[must_use]
    pub fn new(max_requests: usize, window: f64) -> Self {
        Self {
            blacklist: HashSet::new(),
            requests: HashMap::new(),
            max_requests,
            window,
        }
    }

    /// Adiciona um peer à lista negra
    pub fn blacklist_peer(&mut self, peer_address: &str) {
        self.blacklist.insert(peer_address.to_string());
    }

    /// Verifica se um peer está na lista negra
    #[must_use]
    pub fn is_blacklisted(&self, peer_address: &str) -> bool {
        self.blacklist.contains(peer_address)
    }

    /// Conta uma requisição do peer dentro da janela deslizante
    ///
    /// Retorna `false` quando o peer excedeu o limite de taxa.
    pub fn allow_request(&mut self, peer_address: &str) -> bool {
        let now = unix_time_now();
        let window = self.window;
        let history = self.requests.entry(peer_address.to_string()).or_default();

        history.retain(|&t| now - t < window);
        if history.len() >= self.max_requests {
            return false;
        }

        history.push(now);
        true
    }

    /// Admite uma requisição de peer, como rejeição de protocolo
    ///
    /// # Errors
    ///
    /// Retorna erro se o peer estiver na lista negra ou acima do limite
    pub fn admit(&mut self, peer_address: &str) -> Result<()> {
        if self.is_blacklisted(peer_address) {
            return Err(NodeError::PeerRejected(format!(
                "{peer_address} is blacklisted"
            )));
        }

        if !self.allow_request(peer_address) {
            return Err(NodeError::PeerRejected(format!(
                "{peer_address} exceeded the rate limit"
            )));
        }

        Ok(())
    }

    /// Remove históricos vazios e registros fora da janela
    pub fn purge(&mut self) {
        let now = unix_time_now();
        let window = self.window;
        self.requests.retain(|_, history| {
            history.retain(|&t| now - t < window);
            !history.is_empty()
        });
    }
}
