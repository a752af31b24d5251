use crate::gas;
use serde::{Deserialize, Serialize};
use shared::{NodeError, Result};
use std::collections::HashMap;
use thiserror::Error;

/// Opcodes interpreted by the contract VM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCode {
    /// Push the next 32 bytes (big-endian) onto the stack
    Push,
    /// Discard the top of the stack
    Pop,
    /// a, b -> a + b
    Add,
    /// a, b -> a - b
    Sub,
    /// a, b -> a * b
    Mul,
    /// a, b -> a / b (integer, truncated toward zero; faults on b = 0)
    Div,
    /// key, value popped (key first); memory[str(key)] = value
    Store,
    /// key popped; pushes memory[str(key)] when present
    Load,
    /// Unconditional jump to the popped target
    Jump,
    /// cond, target popped (cond first); jumps when cond != 0
    JumpI,
    /// Terminate execution
    Stop,
}

impl OpCode {
    /// Decodes an opcode byte; unknown bytes are an explicit fault
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x60 => Some(Self::Push),
            0x50 => Some(Self::Pop),
            0x01 => Some(Self::Add),
            0x02 => Some(Self::Sub),
            0x03 => Some(Self::Mul),
            0x04 => Some(Self::Div),
            0x52 => Some(Self::Store),
            0x51 => Some(Self::Load),
            0x56 => Some(Self::Jump),
            0x57 => Some(Self::JumpI),
            0x00 => Some(Self::Stop),
            _ => None,
        }
    }

    /// Encodes the opcode back to its byte form
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Self::Push => 0x60,
            Self::Pop => 0x50,
            Self::Add => 0x01,
            Self::Sub => 0x02,
            Self::Mul => 0x03,
            Self::Div => 0x04,
            Self::Store => 0x52,
            Self::Load => 0x51,
            Self::Jump => 0x56,
            Self::JumpI => 0x57,
            Self::Stop => 0x00,
        }
    }

    /// Gas charged when the opcode actually performs its effect,
    /// on top of the base compute cost charged per dispatched opcode
    #[must_use]
    pub const fn effect_gas(self) -> u64 {
        match self {
            Self::Push | Self::Store => gas::STORE_DATA,
            Self::Load => gas::LOAD_DATA,
            Self::Pop | Self::Add | Self::Sub | Self::Mul | Self::Div | Self::Jump
            | Self::JumpI => gas::COMPUTE,
            Self::Stop => 0,
        }
    }
}

/// Runtime faults; they never propagate past execution, the receipt
/// carries them alongside the gas spent up to the fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum VmFault {
    #[error("division by zero")]
    DivisionByZero,
    #[error("unknown opcode 0x{0:02x}")]
    UnknownOpcode(u8),
    #[error("invalid jump target {0}")]
    InvalidJump(i128),
}

/// Outcome of a single contract execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// Top of the stack at termination, or None on an empty stack or fault
    pub result: Option<i128>,
    /// Gas consumed, including everything spent before a fault
    pub gas_used: u64,
    /// Cost in XGP at the clamped gas price
    pub cost: f64,
    /// Runtime fault, when one interrupted the execution
    pub fault: Option<VmFault>,
}

/// Gas-metered stack virtual machine with per-contract persistent storage
///
/// Each deployed contract owns an isolated key/value storage map that
/// survives across executions. Per-execution scratch state (stack, program
/// counter, gas counters) is never shared between runs.
#[derive(Debug, Default)]
pub struct ContractVm {
    contracts: HashMap<String, Vec<u8>>,
    storage: HashMap<String, HashMap<String, i128>>,
}

impl ContractVm {
    /// Creates an empty VM
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records contract code under an address and charges the full
    /// deployment gas limit, regardless of code length
    pub fn deploy_contract(&mut self, code: &[u8], address: &str, gas_price: f64) -> f64 {
        let gas_price = gas::validate_gas_price(gas_price);
        self.contracts.insert(address.to_string(), code.to_vec());
        gas::gas_cost(gas::DEPLOY_CONTRACT, gas_price)
    }

    /// Returns whether code is deployed under the address
    #[must_use]
    pub fn has_contract(&self, address: &str) -> bool {
        self.contracts.contains_key(address)
    }

    /// Executes the contract deployed at `address`
    ///
    /// Runtime faults do not propagate: the receipt carries the fault and
    /// the cost accumulated so far, and storage writes performed before the
    /// fault are kept.
    ///
    /// # Errors
    ///
    /// Returns an error only when no contract is deployed at the address
    pub fn execute_contract(
        &mut self,
        address: &str,
        _input_data: &[u8],
        gas_price: f64,
    ) -> Result<Execution> {
        let code = self
            .contracts
            .get(address)
            .cloned()
            .ok_or_else(|| NodeError::ContractNotFound(address.to_string()))?;

        let gas_price = gas::validate_gas_price(gas_price);
        let memory = self.storage.entry(address.to_string()).or_default();

        let mut stack: Vec<i128> = Vec::new();
        let mut pc: usize = 0;
        let mut gas_used: u64 = 0;
        let mut fault: Option<VmFault> = None;

        while pc < code.len() && gas_used < gas::EXECUTE_CONTRACT {
            let byte = code[pc];
            pc += 1;
            gas_used += gas::COMPUTE;

            let Some(op) = OpCode::from_byte(byte) else {
                fault = Some(VmFault::UnknownOpcode(byte));
                break;
            };

            match op {
                OpCode::Push => {
                    stack.push(read_push_operand(&code, pc));
                    pc += 32;
                    gas_used += op.effect_gas();
                }

                OpCode::Pop => {
                    if stack.pop().is_some() {
                        gas_used += op.effect_gas();
                    }
                }

                OpCode::Add | OpCode::Sub | OpCode::Mul => {
                    if stack.len() >= 2 {
                        let b = stack.pop().unwrap();
                        let a = stack.pop().unwrap();
                        let value = match op {
                            OpCode::Add => a.wrapping_add(b),
                            OpCode::Sub => a.wrapping_sub(b),
                            _ => a.wrapping_mul(b),
                        };
                        stack.push(value);
                        gas_used += op.effect_gas();
                    }
                }

                OpCode::Div => {
                    if stack.len() >= 2 {
                        let b = stack.pop().unwrap();
                        let a = stack.pop().unwrap();
                        if b == 0 {
                            fault = Some(VmFault::DivisionByZero);
                            break;
                        }
                        stack.push(a.wrapping_div(b));
                        gas_used += op.effect_gas();
                    }
                }

                OpCode::Store => {
                    if stack.len() >= 2 {
                        let key = stack.pop().unwrap();
                        let value = stack.pop().unwrap();
                        memory.insert(key.to_string(), value);
                        gas_used += op.effect_gas();
                    }
                }

                OpCode::Load => {
                    if let Some(key) = stack.pop() {
                        if let Some(value) = memory.get(&key.to_string()) {
                            stack.push(*value);
                            gas_used += op.effect_gas();
                        }
                    }
                }

                OpCode::Jump => {
                    if let Some(target) = stack.pop() {
                        match usize::try_from(target) {
                            Ok(target) => {
                                pc = target;
                                gas_used += op.effect_gas();
                            }
                            Err(_) => {
                                fault = Some(VmFault::InvalidJump(target));
                                break;
                            }
                        }
                    }
                }

                OpCode::JumpI => {
                    if stack.len() >= 2 {
                        let condition = stack.pop().unwrap();
                        let target = stack.pop().unwrap();
                        if condition != 0 {
                            match usize::try_from(target) {
                                Ok(target) => {
                                    pc = target;
                                    gas_used += op.effect_gas();
                                }
                                Err(_) => {
                                    fault = Some(VmFault::InvalidJump(target));
                                    break;
                                }
                            }
                        }
                    }
                }

                OpCode::Stop => break,
            }
        }

        let result = if fault.is_some() {
            None
        } else {
            stack.last().copied()
        };

        Ok(Execution {
            result,
            gas_used,
            cost: gas::gas_cost(gas_used, gas_price),
            fault,
        })
    }

    /// Snapshot of a contract's persistent storage
    ///
    /// # Errors
    ///
    /// Returns an error when no contract is deployed at the address
    pub fn contract_state(&self, address: &str) -> Result<HashMap<String, i128>> {
        if !self.contracts.contains_key(address) {
            return Err(NodeError::ContractNotFound(address.to_string()));
        }

        Ok(self.storage.get(address).cloned().unwrap_or_default())
    }
}

/// Reads the 32-byte big-endian operand following a PUSH opcode, keeping
/// its low 128 bits; a truncated operand is read from the bytes available
fn read_push_operand(code: &[u8], pc: usize) -> i128 {
    let end = (pc + 32).min(code.len());
    let operand = &code[pc.min(end)..end];

    let mut word = [0u8; 32];
    word[32 - operand.len()..].copy_from_slice(operand);

    let mut tail = [0u8; 16];
    tail.copy_from_slice(&word[16..]);
    u128::from_be_bytes(tail) as i128
}

/// Builder de bytecode para testes e demonstrações
#[derive(Debug, Default)]
pub struct BytecodeBuilder {
    code: Vec<u8>,
}

impl BytecodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits PUSH with a 32-byte big-endian operand
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // Reinterpretação bit a bit intencional
    pub fn push(mut self, value: i128) -> Self {
        self.code.push(OpCode::Push.byte());
        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&(value as u128).to_be_bytes());
        self.code.extend_from_slice(&word);
        self
    }

    /// Emits a bare opcode
    #[must_use]
    pub fn op(mut self, op: OpCode) -> Self {
        self.code.push(op.byte());
        self
    }

    /// Emits a raw byte (for exercising unknown opcodes)
    #[must_use]
    pub fn raw(mut self, byte: u8) -> Self {
        self.code.push(byte);
        self
    }

    #[must_use]
    pub fn build(self) -> Vec<u8> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gas::DEFAULT_GAS_PRICE;

    fn deploy(vm: &mut ContractVm, code: Vec<u8>) -> String {
        let address = "c0ffee".to_string();
        vm.deploy_contract(&code, &address, DEFAULT_GAS_PRICE);
        address
    }

    #[test]
    fn test_push_add() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .push(7)
            .push(5)
            .op(OpCode::Add)
            .op(OpCode::Stop)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(12));
        assert!(execution.cost > 0.0);
        assert!(execution.fault.is_none());
    }

    #[test]
    fn test_add_is_commutative() {
        let mut vm = ContractVm::new();
        let ab = BytecodeBuilder::new().push(7).push(5).op(OpCode::Add).build();
        let ba = BytecodeBuilder::new().push(5).push(7).op(OpCode::Add).build();

        vm.deploy_contract(&ab, "a", DEFAULT_GAS_PRICE);
        vm.deploy_contract(&ba, "b", DEFAULT_GAS_PRICE);

        let first = vm.execute_contract("a", &[], DEFAULT_GAS_PRICE).unwrap();
        let second = vm.execute_contract("b", &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(first.result, second.result);
    }

    #[test]
    fn test_sub_and_mul_operand_order() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .push(7)
            .push(5)
            .op(OpCode::Sub)
            .push(3)
            .op(OpCode::Mul)
            .build();
        let address = deploy(&mut vm, code);

        // (7 - 5) * 3
        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(6));
    }

    #[test]
    fn test_div_truncates_toward_zero() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .push(-7)
            .push(2)
            .op(OpCode::Div)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(-3));
    }

    #[test]
    fn test_div_by_zero_faults_with_partial_cost() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .push(10)
            .push(0)
            .op(OpCode::Div)
            .op(OpCode::Stop)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, None);
        assert_eq!(execution.fault, Some(VmFault::DivisionByZero));
        assert!(execution.gas_used > 0);
        assert!(execution.cost > 0.0);
    }

    #[test]
    fn test_push_then_pop_restores_stack() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .push(42)
            .push(99)
            .op(OpCode::Pop)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(42));
    }

    #[test]
    fn test_stack_underflow_is_silent() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .op(OpCode::Add)
            .op(OpCode::Pop)
            .push(8)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(8));
        assert!(execution.fault.is_none());
    }

    #[test]
    fn test_store_pops_key_first_and_load_reads_it() {
        let mut vm = ContractVm::new();
        // PUSH 99 (valor), PUSH 7 (chave), STORE; depois PUSH 7, LOAD
        let code = BytecodeBuilder::new()
            .push(99)
            .push(7)
            .op(OpCode::Store)
            .push(7)
            .op(OpCode::Load)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(99));

        let state = vm.contract_state(&address).unwrap();
        assert_eq!(state.get("7"), Some(&99));
    }

    #[test]
    fn test_load_of_missing_key_pushes_nothing() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new().push(1).op(OpCode::Load).build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, None);
    }

    #[test]
    fn test_storage_persists_across_executions() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .push(5)
            .push(1)
            .op(OpCode::Store)
            .build();
        let address = deploy(&mut vm, code);

        vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();

        // Segundo programa lê o que o primeiro escreveu
        let reader = BytecodeBuilder::new().push(1).op(OpCode::Load).build();
        vm.deploy_contract(&reader, &address, DEFAULT_GAS_PRICE);
        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(5));
    }

    #[test]
    fn test_storage_is_partitioned_per_contract() {
        let mut vm = ContractVm::new();
        let writer = BytecodeBuilder::new()
            .push(5)
            .push(1)
            .op(OpCode::Store)
            .build();
        let reader = BytecodeBuilder::new().push(1).op(OpCode::Load).build();

        vm.deploy_contract(&writer, "writer", DEFAULT_GAS_PRICE);
        vm.deploy_contract(&reader, "reader", DEFAULT_GAS_PRICE);

        vm.execute_contract("writer", &[], DEFAULT_GAS_PRICE).unwrap();
        let execution = vm.execute_contract("reader", &[], DEFAULT_GAS_PRICE).unwrap();

        // O leitor não enxerga o storage do outro contrato
        assert_eq!(execution.result, None);
        assert!(vm.contract_state("reader").unwrap().is_empty());
        assert_eq!(vm.contract_state("writer").unwrap().get("1"), Some(&5));
    }

    #[test]
    fn test_fault_keeps_earlier_storage_writes() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new()
            .push(77)
            .push(2)
            .op(OpCode::Store)
            .push(10)
            .push(0)
            .op(OpCode::Div)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.fault, Some(VmFault::DivisionByZero));

        // A escrita anterior à falha não sofre rollback
        assert_eq!(vm.contract_state(&address).unwrap().get("2"), Some(&77));
    }

    #[test]
    fn test_jumpi_skips_when_condition_is_zero() {
        let mut vm = ContractVm::new();
        // PUSH alvo inválido, PUSH 0 (condição falsa), JUMPI, PUSH 11
        let code = BytecodeBuilder::new()
            .push(9999)
            .push(0)
            .op(OpCode::JumpI)
            .push(11)
            .build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(11));
    }

    #[test]
    fn test_jump_to_stop() {
        let mut vm = ContractVm::new();
        // O programa tem 34 bytes antes da cauda; saltar para 67 pula o
        // "PUSH 1" (33 bytes) e cai direto no STOP
        let mut code = BytecodeBuilder::new().push(67).op(OpCode::Jump).build();
        let tail = BytecodeBuilder::new().push(1).op(OpCode::Stop).build();
        code.extend_from_slice(&tail);
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        // O PUSH 1 foi saltado; a pilha termina vazia
        assert_eq!(execution.result, None);
        assert!(execution.fault.is_none());
    }

    #[test]
    fn test_negative_jump_faults() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new().push(-1).op(OpCode::Jump).build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.fault, Some(VmFault::InvalidJump(-1)));
        assert_eq!(execution.result, None);
    }

    #[test]
    fn test_unknown_opcode_faults() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new().push(1).raw(0xfe).push(2).build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.fault, Some(VmFault::UnknownOpcode(0xfe)));
        assert_eq!(execution.result, None);
    }

    #[test]
    fn test_gas_ceiling_stops_execution() {
        let mut vm = ContractVm::new();
        // Loop infinito: PUSH 0, JUMP (alvo 0 = início do programa)
        let code = BytecodeBuilder::new().push(0).op(OpCode::Jump).build();
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert!(execution.gas_used >= gas::EXECUTE_CONTRACT);
        assert!(execution.fault.is_none());
    }

    #[test]
    fn test_execute_unknown_contract_is_an_error() {
        let mut vm = ContractVm::new();
        assert!(vm.execute_contract("missing", &[], DEFAULT_GAS_PRICE).is_err());
        assert!(vm.contract_state("missing").is_err());
    }

    #[test]
    fn test_gas_price_is_clamped() {
        let mut vm = ContractVm::new();
        let code = BytecodeBuilder::new().push(1).build();
        let address = deploy(&mut vm, code);

        let cheap = vm.execute_contract(&address, &[], 0.0).unwrap();
        let floor = vm
            .execute_contract(&address, &[], gas::MIN_GAS_PRICE)
            .unwrap();
        assert!((cheap.cost - floor.cost).abs() < f64::EPSILON);
    }

    #[test]
    fn test_truncated_push_operand_reads_as_partial_word() {
        let mut vm = ContractVm::new();
        // PUSH seguido de apenas dois bytes: o operando é lido como 0x0102
        let code = vec![OpCode::Push.byte(), 0x01, 0x02];
        let address = deploy(&mut vm, code);

        let execution = vm.execute_contract(&address, &[], DEFAULT_GAS_PRICE).unwrap();
        assert_eq!(execution.result, Some(0x0102));
    }
}
