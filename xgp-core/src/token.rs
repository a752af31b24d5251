//! Parâmetros econômicos do token nativo XGP

/// Nome do token
pub const TOKEN_NAME: &str = "Xugenping";

/// Símbolo do token
pub const TOKEN_SYMBOL: &str = "XGP";

/// Oferta total máxima
pub const TOTAL_SUPPLY: u64 = 19_840_228;

/// Recompensa inicial por bloco
pub const INITIAL_BLOCK_REWARD: u64 = 50;

/// Período de halving em blocos
/// (6 meses * 30 dias * 24 horas * 6 blocos por hora)
pub const HALVING_PERIOD: u64 = 6 * 30 * 24 * 6;

/// Tempo alvo entre blocos, em segundos (apenas indicativo)
pub const BLOCK_TIME: u64 = 600;

/// Calcula a recompensa de bloco para a altura dada, aplicando os halvings
#[must_use]
pub fn block_reward(height: u64) -> u64 {
    let halvings = height / HALVING_PERIOD;
    if halvings >= u64::from(u64::BITS) {
        return 0;
    }
    INITIAL_BLOCK_REWARD >> halvings
}

/// Oferta acumulada emitida até a altura dada, saturada em [`TOTAL_SUPPLY`]
#[must_use]
pub fn total_supply_at_height(height: u64) -> u64 {
    let mut total = 0u64;
    let mut h = 0u64;

    while h <= height {
        let reward = block_reward(h);
        if reward == 0 {
            break;
        }
        total = total.saturating_add(reward);
        if total >= TOTAL_SUPPLY {
            return TOTAL_SUPPLY;
        }
        h += 1;
    }

    total
}
