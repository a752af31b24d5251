//! Tabela de gás e limites de preço para operações de contrato

/// Preço mínimo de gás (em XGP)
pub const MIN_GAS_PRICE: f64 = 0.00001;

/// Preço máximo de gás (em XGP)
pub const MAX_GAS_PRICE: f64 = 0.001;

/// Preço de gás padrão (em XGP)
pub const DEFAULT_GAS_PRICE: f64 = 0.0001;

/// Taxa fixa de implantação de contrato (em XGP)
pub const CONTRACT_DEPLOYMENT_FEE: f64 = 1.0;

/// Limite de gás para implantação de contrato
pub const DEPLOY_CONTRACT: u64 = 1_000_000;

/// Limite de gás para execução de contrato
pub const EXECUTE_CONTRACT: u64 = 100_000;

/// Limite de gás para transferência simples
pub const TRANSFER: u64 = 21_000;

/// Custo de gás para escrita de dados
pub const STORE_DATA: u64 = 20_000;

/// Custo de gás para leitura de dados
pub const LOAD_DATA: u64 = 5_000;

/// Custo de gás base de computação
pub const COMPUTE: u64 = 1_000;

/// Ajusta o preço de gás para dentro da faixa permitida
#[must_use]
pub fn validate_gas_price(gas_price: f64) -> f64 {
    gas_price.clamp(MIN_GAS_PRICE, MAX_GAS_PRICE)
}

/// Custo total em XGP de uma quantidade de gás consumida
#[must_use]
#[allow(clippy::cast_precision_loss)] // Quantidades de gás cabem com folga em f64
pub fn gas_cost(gas_used: u64, gas_price: f64) -> f64 {
    gas_used as f64 * gas_price
}

/// Custo total de implantação de um contrato (gás + taxa fixa)
#[must_use]
pub fn deployment_cost(gas_price: f64) -> f64 {
    gas_cost(DEPLOY_CONTRACT, validate_gas_price(gas_price)) + CONTRACT_DEPLOYMENT_FEE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_price_clamping() {
        assert_eq!(validate_gas_price(0.0), MIN_GAS_PRICE);
        assert_eq!(validate_gas_price(1.0), MAX_GAS_PRICE);
        assert_eq!(validate_gas_price(DEFAULT_GAS_PRICE), DEFAULT_GAS_PRICE);
    }

    #[test]
    fn test_gas_price_validation_is_idempotent() {
        for price in [0.0, 0.000_001, DEFAULT_GAS_PRICE, 0.5] {
            let once = validate_gas_price(price);
            assert_eq!(validate_gas_price(once), once);
        }
    }

    #[test]
    fn test_gas_price_validation_is_monotone_in_range() {
        let low = validate_gas_price(0.00002);
        let high = validate_gas_price(0.0005);
        assert!(low < high);
    }

    #[test]
    fn test_gas_cost() {
        let cost = gas_cost(EXECUTE_CONTRACT, DEFAULT_GAS_PRICE);
        assert!((cost - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_deployment_cost_includes_fee() {
        let cost = deployment_cost(DEFAULT_GAS_PRICE);
        let gas_only = gas_cost(DEPLOY_CONTRACT, DEFAULT_GAS_PRICE);
        assert!((cost - gas_only - CONTRACT_DEPLOYMENT_FEE).abs() < f64::EPSILON);
    }
}
