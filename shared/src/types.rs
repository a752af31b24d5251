//! Tipos compartilhados entre módulos do Xugenping

/// Alias para endereço de carteira ou contrato (string hexadecimal)
pub type Address = String;

/// Alias para valor monetário em XGP
pub type Amount = f64;

/// Alias para timestamp UNIX em segundos fracionários
pub type Timestamp = f64;

/// Alias para altura de bloco na cadeia
pub type BlockHeight = u64;

/// Alias para quantidade de gás consumida
pub type Gas = u64;

/// Lê o relógio de parede como segundos UNIX fracionários
#[must_use]
#[allow(clippy::cast_precision_loss)] // Microssegundos cabem com folga em f64
pub fn unix_time_now() -> Timestamp {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
