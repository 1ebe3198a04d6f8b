use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use transix_core::{CoreError, Money, UserId};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PROCESSING" => Ok(PaymentStatus::Processing),
            "COMPLETED" => Ok(PaymentStatus::Completed),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(CoreError::Storage(format!("unknown payment status {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    BankTransfer,
    Wallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CreditCard => "CREDIT_CARD",
            PaymentMethod::DebitCard => "DEBIT_CARD",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Wallet => "WALLET",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT_CARD" => Ok(PaymentMethod::CreditCard),
            "DEBIT_CARD" => Ok(PaymentMethod::DebitCard),
            "PAYPAL" => Ok(PaymentMethod::Paypal),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "WALLET" => Ok(PaymentMethod::Wallet),
            other => Err(CoreError::Storage(format!("unknown payment method {other}"))),
        }
    }
}

/// One payment per booking, enforced by the store's conditional insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    /// Externally stable reference ("PAY...").
    pub payment_ref: String,
    pub booking_id: Uuid,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub gateway: String,
    pub refund_amount: Money,
    pub refund_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: Uuid, amount: Money, method: PaymentMethod, gateway: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            payment_ref: new_payment_ref(),
            booking_id,
            amount,
            method,
            status: PaymentStatus::Processing,
            transaction_id: None,
            gateway: gateway.to_string(),
            refund_amount: Money::zero(),
            refund_reason: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Append-only audit record, one per status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentHistory {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub status_change: String,
    pub changed_by: Option<UserId>,
    pub change_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PaymentHistory {
    pub fn record(
        payment_id: Uuid,
        status_change: impl Into<String>,
        changed_by: Option<UserId>,
        change_reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id,
            status_change: status_change.into(),
            changed_by,
            change_reason,
            timestamp: Utc::now(),
        }
    }
}

pub fn new_payment_ref() -> String {
    format!(
        "PAY{}",
        &Uuid::new_v4().simple().to_string()[..8].to_uppercase()
    )
}

/// Gateway-side transaction reference, "TXN" + 6 digits.
pub fn new_transaction_id() -> String {
    format!("TXN{}", rand::thread_rng().gen_range(100_000..=999_999))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_shapes() {
        let payment_ref = new_payment_ref();
        assert!(payment_ref.starts_with("PAY"));
        assert_eq!(payment_ref.len(), 11);

        let txn = new_transaction_id();
        assert!(txn.starts_with("TXN"));
        assert_eq!(txn.len(), 9);
    }
}
