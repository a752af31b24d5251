use crate::gas;
use crate::vm::{ContractVm, Execution};
use serde::{Deserialize, Serialize};
use shared::{unix_time_now, Digest, NodeError, Result};
use std::collections::HashMap;

/// Contrato implantado na cadeia
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub name: String,
    pub address: String,
    #[serde(with = "hex::serde")]
    pub code: Vec<u8>,
    pub creator: String,
    pub deployment_time: f64,
}

impl Contract {
    /// Cria um contrato com endereço derivado do próprio bytecode
    #[must_use]
    pub fn new(name: String, code: Vec<u8>, creator: String) -> Self {
        let address = contract_address(&code);
        Self {
            name,
            address,
            code,
            creator,
            deployment_time: unix_time_now(),
        }
    }
}

/// Endereço de contrato: primeiros 40 caracteres hex do SHA-256 do bytecode
///
/// Dois contratos com bytecode idêntico compartilham o mesmo endereço.
#[must_use]
pub fn contract_address(code: &[u8]) -> String {
    Digest::sha256(code).to_hex()[..40].to_string()
}

/// Catálogo de contratos implantados, indexado por endereço
///
/// Camada fina sobre a VM: despacha implantação e execução e expõe os
/// acessores de leitura. Reimplantar bytecode idêntico sobrescreve o
/// registro existente, sem erro.
#[derive(Debug, Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, Contract>,
    vm: ContractVm,
}

impl ContractRegistry {
    /// Cria um registro vazio
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Implanta um contrato e retorna o endereço e o custo cobrado
    pub fn deploy(&mut self, contract: Contract, gas_price: f64) -> (String, f64) {
        let address = contract.address.clone();
        let cost = self.vm.deploy_contract(&contract.code, &address, gas_price);
        self.contracts.insert(address.clone(), contract);
        (address, cost)
    }

    /// Executa um contrato implantado
    ///
    /// # Errors
    ///
    /// Retorna erro se nenhum contrato estiver implantado no endereço
    pub fn execute(
        &mut self,
        contract_address: &str,
        input_data: &[u8],
        gas_price: f64,
    ) -> Result<Execution> {
        if !self.contracts.contains_key(contract_address) {
            return Err(NodeError::ContractNotFound(contract_address.to_string()));
        }

        self.vm.execute_contract(contract_address, input_data, gas_price)
    }

    /// Obtém o registro de um contrato pelo endereço
    #[must_use]
    pub fn get(&self, contract_address: &str) -> Option<&Contract> {
        self.contracts.get(contract_address)
    }

    /// Snapshot do storage persistente do contrato
    ///
    /// # Errors
    ///
    /// Retorna erro se nenhum contrato estiver implantado no endereço
    pub fn state(&self, contract_address: &str) -> Result<HashMap<String, i128>> {
        if !self.contracts.contains_key(contract_address) {
            return Err(NodeError::ContractNotFound(contract_address.to_string()));
        }

        self.vm.contract_state(contract_address)
    }

    /// Estima o custo de implantação ao preço de gás dado
    #[must_use]
    pub fn estimate_deploy_cost(gas_price: f64) -> f64 {
        gas::deployment_cost(gas_price)
    }

    /// Estima o custo de execução executando o bytecode de verdade
    ///
    /// # Errors
    ///
    /// Retorna erro se nenhum contrato estiver implantado no endereço
    pub fn estimate_execute_cost(
        &mut self,
        contract_address: &str,
        input_data: &[u8],
        gas_price: f64,
    ) -> Result<f64> {
        Ok(self.execute(contract_address, input_data, gas_price)?.cost)
    }
}
