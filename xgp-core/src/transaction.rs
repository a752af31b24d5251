use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::{
    sign_transaction_digest, verify_transaction_signature, Digest, KeyPair, NodeError, PublicKey,
    Result, Signature,
};

/// Remetente reservado das transações de recompensa de mineração
pub const NETWORK_SENDER: &str = "network";

/// Transferência de valor entre dois endereços
///
/// Transações submetidas por clientes carregam uma assinatura ML-DSA sobre o
/// corpo canônico; transações de recompensa (remetente `"network"`) não são
/// assinadas. Uma vez incluída em um bloco a transação é imutável.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "from")]
    pub sender: String,
    #[serde(rename = "to")]
    pub recipient: String,
    pub amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Transaction {
    /// Cria uma transação ainda não assinada
    #[must_use]
    pub const fn new(sender: String, recipient: String, amount: f64) -> Self {
        Self {
            sender,
            recipient,
            amount,
            signature: None,
        }
    }

    /// Cria a transação de recompensa de mineração de um bloco
    #[must_use]
    pub fn reward(miner_address: &str, amount: f64) -> Self {
        Self::new(NETWORK_SENDER.to_string(), miner_address.to_string(), amount)
    }

    /// Verifica se esta é uma transação de recompensa da rede
    #[must_use]
    pub fn is_reward(&self) -> bool {
        self.sender == NETWORK_SENDER
    }

    /// Corpo canônico da transação: objeto JSON com chaves ordenadas,
    /// sem o campo de assinatura
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização falhar
    pub fn canonical_body(&self) -> Result<Value> {
        let mut value = serde_json::to_value(self)
            .map_err(|e| NodeError::SerializationError(e.to_string()))?;
        if let Some(object) = value.as_object_mut() {
            object.remove("signature");
        }
        Ok(value)
    }

    /// Digest SHA-256 do corpo canônico, usado para assinatura
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização falhar
    pub fn signing_digest(&self) -> Result<Digest> {
        let body = self.canonical_body()?;
        Ok(Digest::sha256(body.to_string().as_bytes()))
    }

    /// Assina a transação com o par de chaves do remetente
    ///
    /// # Errors
    ///
    /// Retorna erro se a serialização ou a assinatura falharem
    pub fn sign(&mut self, keypair: &KeyPair) -> Result<()> {
        let digest = self.signing_digest()?;
        let signature = sign_transaction_digest(&digest, keypair)?;
        self.signature = Some(signature.to_base64());
        Ok(())
    }

    /// Verifica a assinatura da transação contra uma chave pública
    ///
    /// Transações sem assinatura verificam como `false`.
    ///
    /// # Errors
    ///
    /// Retorna erro se a assinatura não decodificar ou a chave for inválida
    pub fn verify(&self, public_key: &PublicKey) -> Result<bool> {
        let Some(encoded) = &self.signature else {
            return Ok(false);
        };

        let signature = Signature::from_base64(encoded)?;
        let digest = self.signing_digest()?;
        verify_transaction_signature(&digest, &signature, public_key)
    }

    /// Validação básica da transação
    ///
    /// # Errors
    ///
    /// Retorna erro se os endereços estiverem vazios ou o valor for inválido
    pub fn validate_basic(&self) -> Result<()> {
        if self.sender.is_empty() || self.recipient.is_empty() {
            return Err(NodeError::InvalidTransaction(
                "Empty sender or recipient".to_string(),
            ));
        }

        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(NodeError::InvalidTransaction(
                "Amount must be a non-negative number".to_string(),
            ));
        }

        Ok(())
    }
}
