use async_trait::async_trait;
use transix_core::{CoreResult, Money};
use uuid::Uuid;

use crate::models::{Payment, PaymentHistory, PaymentMethod};

/// Payment persistence. The insert is conditional on the booking having no
/// payment yet, so two concurrent attempts can never produce two rows.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert unless a payment already exists for the booking. Returns the
    /// stored payment: the new row, or the row another writer got in first.
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<Payment>;

    async fn get_payment(&self, payment_ref: &str) -> CoreResult<Option<Payment>>;

    async fn payment_for_booking(&self, booking_id: Uuid) -> CoreResult<Option<Payment>>;

    /// Reopen a failed payment for another attempt: FAILED -> PROCESSING
    /// with a fresh method and transaction reference. Any other current
    /// status is `CoreError::InvalidStateTransition`.
    async fn reopen_for_retry(
        &self,
        payment_id: Uuid,
        method: PaymentMethod,
        transaction_id: &str,
    ) -> CoreResult<Payment>;

    /// PROCESSING -> COMPLETED, recording the gateway transaction id.
    async fn complete(&self, payment_id: Uuid, transaction_id: &str) -> CoreResult<Payment>;

    /// PROCESSING -> FAILED.
    async fn fail(&self, payment_id: Uuid) -> CoreResult<Payment>;

    /// COMPLETED -> REFUNDED, storing the refunded amount and reason. Any
    /// other current status is `CoreError::RefundNotAllowed`.
    async fn record_refund(
        &self,
        payment_id: Uuid,
        amount: Money,
        reason: &str,
    ) -> CoreResult<Payment>;

    async fn append_history(&self, entry: &PaymentHistory) -> CoreResult<()>;

    async fn payment_history(&self, payment_id: Uuid) -> CoreResult<Vec<PaymentHistory>>;
}
