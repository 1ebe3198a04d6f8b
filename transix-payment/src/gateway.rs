use async_trait::async_trait;
use std::time::Duration;
use transix_core::gateway::{GatewayCharge, GatewayOutcome, PaymentGateway};
use transix_core::CoreResult;

use crate::models::new_transaction_id;

/// What the mock gateway does with a charge. Injected at construction so
/// tests and local runs choose the outcome instead of relying on a hardcoded
/// success rate.
#[derive(Debug, Clone)]
pub enum GatewayBehavior {
    Approve,
    Decline(String),
    /// Sleep before approving; used to exercise the engine's request timeout.
    Delay(Duration),
}

pub struct MockGateway {
    name: String,
    behavior: GatewayBehavior,
}

impl MockGateway {
    pub fn approving(name: impl Into<String>) -> Self {
        Self::with_behavior(name, GatewayBehavior::Approve)
    }

    pub fn with_behavior(name: impl Into<String>, behavior: GatewayBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
        }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    fn name(&self) -> &str {
        &self.name
    }

    async fn charge(&self, charge: &GatewayCharge) -> CoreResult<GatewayOutcome> {
        tracing::debug!(
            payment_ref = %charge.payment_ref,
            amount = %charge.amount,
            method = %charge.method,
            "mock gateway charge"
        );

        match &self.behavior {
            GatewayBehavior::Approve => Ok(GatewayOutcome::Approved {
                transaction_id: new_transaction_id(),
            }),
            GatewayBehavior::Decline(reason) => Ok(GatewayOutcome::Declined {
                reason: reason.clone(),
            }),
            GatewayBehavior::Delay(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(GatewayOutcome::Approved {
                    transaction_id: new_transaction_id(),
                })
            }
        }
    }
}
