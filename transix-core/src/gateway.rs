use async_trait::async_trait;
use uuid::Uuid;

use crate::{CoreResult, Money};

/// Charge request handed to a payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayCharge {
    pub payment_ref: String,
    pub booking_id: Uuid,
    pub amount: Money,
    pub currency: String,
    pub method: String,
}

/// Terminal outcome of a single gateway attempt. A declined charge is a
/// normal outcome; transport failures and timeouts surface as
/// `CoreError::GatewayError` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayOutcome {
    Approved { transaction_id: String },
    Declined { reason: String },
}

/// Payment gateway abstraction. The engine only ever talks to this trait;
/// whether the implementation is a real provider client or a deterministic
/// stub is wiring, not engine logic.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Gateway name recorded on the payment row.
    fn name(&self) -> &str;

    async fn charge(&self, charge: &GatewayCharge) -> CoreResult<GatewayOutcome>;
}
