//! PoW com dureza de memória no estilo Ethash
//!
//! Cada época de 30 000 cabeçalhos deriva um cache de palavras de 32 bits; a
//! função de mistura (hashimoto) percorre o cache 64 vezes por nonce. O SHA-3
//! usado em toda a cadeia de semente/cache/mistura é o SHA3-256 FIPS-202.
//!
//! A mistura colapsa para 32 bits logo no início, o que enfraquece bastante a
//! dureza de memória pretendida; o algoritmo é preservado mesmo assim por
//! compatibilidade de verificação.

use crate::token;
use sha3::{Digest as Sha3DigestTrait, Sha3_256};
use shared::{NodeError, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tamanho padrão do cache em bytes (16 MiB = 4 194 304 palavras de 32 bits)
pub const CACHE_SIZE: usize = 16 * 1024 * 1024;

/// Quantidade de cabeçalhos por época
pub const EPOCH_LENGTH: u32 = 30_000;

/// Passes de mistura na geração do cache
const CACHE_ROUNDS: usize = 3;

/// Iterações de mistura do hashimoto
const MIX_ROUNDS: usize = 64;

/// Máximo de épocas mantidas em memória (LRU)
const CACHED_EPOCHS: usize = 2;

/// Solução de PoW encontrada para um cabeçalho
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowSolution {
    pub nonce: u64,
    pub mix_digest: [u8; 32],
}

/// Gerador e verificador de PoW com caches por época
#[derive(Debug)]
pub struct Ethash {
    cache_size: usize,
    cache_dir: PathBuf,
    caches: VecDeque<(u32, Vec<u32>)>,
}

impl Default for Ethash {
    fn default() -> Self {
        Self::new()
    }
}

impl Ethash {
    /// Cria uma instância com o cache padrão de 16 MiB
    #[must_use]
    pub fn new() -> Self {
        Self::with_params(CACHE_SIZE, Path::new("."))
    }

    /// Cria uma instância com tamanho de cache e diretório customizados
    /// (caches pequenos tornam os testes viáveis)
    #[must_use]
    pub fn with_params(cache_size: usize, cache_dir: &Path) -> Self {
        Self {
            cache_size: cache_size.max(4),
            cache_dir: cache_dir.to_path_buf(),
            caches: VecDeque::new(),
        }
    }

    fn sha3(data: &[u8]) -> [u8; 32] {
        let mut hasher = Sha3_256::new();
        hasher.update(data);
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&hasher.finalize());
        digest
    }

    fn le_word(digest: &[u8; 32]) -> u32 {
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }

    /// Época de um cabeçalho: u32 big-endian dos 4 primeiros bytes / 30 000
    #[must_use]
    pub fn epoch_for_header(header: &[u8]) -> u32 {
        let take = header.len().min(4);
        let mut word = [0u8; 4];
        word[4 - take..].copy_from_slice(&header[..take]);
        u32::from_be_bytes(word) / EPOCH_LENGTH
    }

    /// Semente de uma época: SHA3-256 iterado `epoch` vezes sobre 32 zeros
    #[must_use]
    pub fn seed_hash(epoch: u32) -> [u8; 32] {
        let mut seed = [0u8; 32];
        for _ in 0..epoch {
            seed = Self::sha3(&seed);
        }
        seed
    }

    /// Gera o cache de uma época: inicialização encadeada seguida de três
    /// passes de mistura
    #[must_use]
    pub fn generate_cache(&self, epoch: u32) -> Vec<u32> {
        let n = self.cache_size / 4;
        let seed = Self::seed_hash(epoch);

        let mut cache = vec![0u32; n];
        cache[0] = Self::le_word(&Self::sha3(&seed));
        for i in 1..n {
            cache[i] = Self::le_word(&Self::sha3(&cache[i - 1].to_le_bytes()));
        }

        for _ in 0..CACHE_ROUNDS {
            for i in 0..n {
                let v = (cache[i] as usize) % n;
                let mixed = cache[i] ^ cache[v];
                cache[i] = Self::le_word(&Self::sha3(&mixed.to_le_bytes()));
            }
        }

        cache
    }

    fn cache_file(&self, epoch: u32) -> PathBuf {
        self.cache_dir.join(format!("ethash_cache_{epoch}.dat"))
    }

    fn load_cache_file(&self, epoch: u32) -> Option<Vec<u32>> {
        let bytes = std::fs::read(self.cache_file(epoch)).ok()?;
        if bytes.len() != self.cache_size / 4 * 4 {
            return None;
        }

        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    fn store_cache_file(&self, epoch: u32, cache: &[u32]) -> Result<()> {
        let mut bytes = Vec::with_capacity(cache.len() * 4);
        for word in cache {
            bytes.extend_from_slice(&word.to_le_bytes());
        }

        std::fs::write(self.cache_file(epoch), bytes)
            .map_err(|e| NodeError::IoError(e.to_string()))
    }

    /// Obtém o cache da época, na ordem: LRU em memória, arquivo lateral,
    /// geração (com persistência no arquivo da época)
    ///
    /// # Errors
    ///
    /// Retorna erro se o arquivo lateral não puder ser escrito
    fn cache(&mut self, epoch: u32) -> Result<&[u32]> {
        if let Some(position) = self.caches.iter().position(|(e, _)| *e == epoch) {
            // Reposiciona no fim da fila para manter a ordem LRU
            if let Some(entry) = self.caches.remove(position) {
                self.caches.push_back(entry);
            }
        } else {
            let cache = match self.load_cache_file(epoch) {
                Some(cache) => cache,
                None => {
                    let cache = self.generate_cache(epoch);
                    self.store_cache_file(epoch, &cache)?;
                    cache
                }
            };

            self.caches.push_back((epoch, cache));
            while self.caches.len() > CACHED_EPOCHS {
                self.caches.pop_front();
            }
        }

        match self.caches.back() {
            Some((_, cache)) => Ok(cache),
            None => Err(NodeError::IoError("Ethash cache unavailable".to_string())),
        }
    }

    /// Função de mistura: reduz cabeçalho e nonce a um índice de 32 bits e
    /// percorre o cache [`MIX_ROUNDS`] vezes
    ///
    /// Retorna o digest final e o resultado de 4 bytes comparado com o alvo.
    #[must_use]
    pub fn hashimoto(cache: &[u32], header: &[u8], nonce: u64) -> ([u8; 32], [u8; 4]) {
        let n = cache.len() as u32;

        let mut data = header.to_vec();
        data.extend_from_slice(&nonce.to_le_bytes());
        let mut mix = Self::le_word(&Self::sha3(&data)) % n;

        for _ in 0..MIX_ROUNDS {
            let slot = cache[(mix % n) as usize];
            mix = Self::le_word(&Self::sha3(&(slot ^ mix).to_le_bytes()));
        }

        let result = mix.to_le_bytes();
        (Self::sha3(&result), result)
    }

    /// Compara o resultado de 4 bytes (estendido a 256 bits, big-endian)
    /// com o alvo `2^(256 - difficulty)`
    #[must_use]
    pub fn meets_target(result: [u8; 4], difficulty: u32) -> bool {
        if difficulty == 0 {
            return true;
        }
        if difficulty > 256 {
            return false;
        }

        let bit = 256 - difficulty as usize;
        let mut target = [0u8; 32];
        target[31 - bit / 8] = 1 << (bit % 8);

        let mut extended = [0u8; 32];
        extended[28..].copy_from_slice(&result);

        extended < target
    }

    /// Procura um nonce a partir de `start_nonce` cujo resultado fique
    /// abaixo do alvo; o sinal de cancelamento é observado entre tentativas
    ///
    /// # Errors
    ///
    /// Retorna erro se o cache da época não puder ser obtido
    pub fn mine(
        &mut self,
        header: &[u8],
        difficulty: u32,
        start_nonce: u64,
        cancel: &AtomicBool,
    ) -> Result<Option<PowSolution>> {
        let epoch = Self::epoch_for_header(header);
        let cache = self.cache(epoch)?;

        let mut nonce = start_nonce;
        loop {
            if cancel.load(Ordering::SeqCst) {
                return Ok(None);
            }

            let (mix_digest, result) = Self::hashimoto(cache, header, nonce);
            if Self::meets_target(result, difficulty) {
                return Ok(Some(PowSolution { nonce, mix_digest }));
            }

            nonce = nonce.wrapping_add(1);
        }
    }

    /// Verifica o PoW de um cabeçalho repetindo a computação para o nonce
    ///
    /// # Errors
    ///
    /// Retorna erro se o cache da época não puder ser obtido
    pub fn verify(&mut self, header: &[u8], nonce: u64, difficulty: u32) -> Result<bool> {
        let epoch = Self::epoch_for_header(header);
        let cache = self.cache(epoch)?;

        let (_, result) = Self::hashimoto(cache, header, nonce);
        Ok(Self::meets_target(result, difficulty))
    }
}

/// Bloco minerado pelo minerador Ethash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinedHeader {
    pub nonce: u64,
    pub mix_digest: [u8; 32],
    pub reward: u64,
}

/// Minerador de cabeçalhos com cancelamento cooperativo
#[derive(Debug)]
pub struct EthashMiner {
    ethash: Ethash,
    difficulty: u32,
    cancel: Arc<AtomicBool>,
    current_block_height: u64,
}

impl EthashMiner {
    /// Cria um minerador com a instância Ethash dada
    #[must_use]
    pub fn new(ethash: Ethash, difficulty: u32) -> Self {
        Self {
            ethash,
            difficulty,
            cancel: Arc::new(AtomicBool::new(true)),
            current_block_height: 0,
        }
    }

    /// Minera um cabeçalho até encontrar solução ou ser cancelado
    ///
    /// # Errors
    ///
    /// Retorna erro se o cache da época não puder ser obtido
    pub fn start_mining(&mut self, header: &[u8]) -> Result<Option<MinedHeader>> {
        self.cancel.store(false, Ordering::SeqCst);
        let outcome = self.ethash.mine(header, self.difficulty, 0, &self.cancel);
        self.cancel.store(true, Ordering::SeqCst);

        match outcome? {
            Some(solution) => {
                let reward = token::block_reward(self.current_block_height);
                self.current_block_height += 1;
                tracing::info!(
                    nonce = solution.nonce,
                    reward,
                    "bloco encontrado pelo minerador Ethash"
                );
                Ok(Some(MinedHeader {
                    nonce: solution.nonce,
                    mix_digest: solution.mix_digest,
                    reward,
                }))
            }
            None => Ok(None),
        }
    }

    /// Sinaliza o cancelamento da mineração em andamento
    pub fn stop_mining(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Handle de cancelamento para uso por outra thread
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Verifica se há mineração em andamento
    #[must_use]
    pub fn is_mining(&self) -> bool {
        !self.cancel.load(Ordering::SeqCst)
    }

    /// Recompensa prevista para o próximo bloco minerado
    #[must_use]
    pub fn current_reward(&self) -> u64 {
        token::block_reward(self.current_block_height)
    }

    /// Verifica o PoW de um cabeçalho minerado
    ///
    /// # Errors
    ///
    /// Retorna erro se o cache da época não puder ser obtido
    pub fn verify_header(&mut self, header: &[u8], nonce: u64) -> Result<bool> {
        self.ethash.verify(header, nonce, self.difficulty)
    }
}
