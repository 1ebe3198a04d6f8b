use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use transix_booking::{BookingHistory, BookingStatus, BookingStore};
use transix_catalog::{CatalogStore, FareCalculator};
use transix_core::gateway::{GatewayCharge, GatewayOutcome, PaymentGateway};
use transix_core::{CoreError, CoreResult, Money, UserId};

use crate::models::{new_transaction_id, Payment, PaymentHistory, PaymentMethod, PaymentStatus};
use crate::repository::PaymentStore;

/// Drives a payment from creation through the gateway to a terminal state,
/// keeping the booking's status in lockstep.
pub struct PaymentEngine {
    bookings: Arc<dyn BookingStore>,
    payments: Arc<dyn PaymentStore>,
    catalog: Arc<dyn CatalogStore>,
    gateway: Arc<dyn PaymentGateway>,
    fares: FareCalculator,
    gateway_timeout: Duration,
}

impl PaymentEngine {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        payments: Arc<dyn PaymentStore>,
        catalog: Arc<dyn CatalogStore>,
        gateway: Arc<dyn PaymentGateway>,
        fares: FareCalculator,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            bookings,
            payments,
            catalog,
            gateway,
            fares,
            gateway_timeout,
        }
    }

    /// Process a payment for a booking.
    ///
    /// At most one payment exists per booking. An existing completed payment
    /// is returned untouched; a pending/processing one is returned without a
    /// second charge attempt; a failed one is reopened for retry.
    pub async fn process_payment(
        &self,
        user: &UserId,
        booking_ref: &str,
        method: Option<PaymentMethod>,
    ) -> CoreResult<Payment> {
        let method = method.ok_or(CoreError::PaymentMethodRequired)?;

        let booking = self
            .bookings
            .get_booking(booking_ref)
            .await?
            .filter(|b| b.user == *user)
            .ok_or_else(|| CoreError::BookingNotFound(booking_ref.to_string()))?;

        if let Some(existing) = self.payments.payment_for_booking(booking.id).await? {
            match existing.status {
                PaymentStatus::Completed => {
                    info!(payment_ref = %existing.payment_ref, "payment already completed");
                    return Ok(existing);
                }
                PaymentStatus::Pending | PaymentStatus::Processing => {
                    info!(payment_ref = %existing.payment_ref, "payment already in flight");
                    return Ok(existing);
                }
                PaymentStatus::Refunded => {
                    return Err(CoreError::InvalidStateTransition {
                        from: PaymentStatus::Refunded.to_string(),
                        to: PaymentStatus::Processing.to_string(),
                    });
                }
                PaymentStatus::Failed => {
                    let payment = self
                        .payments
                        .reopen_for_retry(existing.id, method, &new_transaction_id())
                        .await?;
                    self.payments
                        .append_history(&PaymentHistory::record(
                            payment.id,
                            "FAILED -> PROCESSING",
                            Some(user.clone()),
                            Some("payment retry".to_string()),
                        ))
                        .await?;
                    return self.attempt_charge(user, booking.id, payment).await;
                }
            }
        }

        let amount = self.settlement_amount(&booking).await?;
        let payment = Payment::new(booking.id, amount, method, self.gateway.name());

        let stored = self.payments.insert_payment(&payment).await?;
        if stored.id != payment.id {
            // Lost the creation race; the concurrent attempt owns processing.
            info!(payment_ref = %stored.payment_ref, "payment already created by concurrent request");
            return Ok(stored);
        }

        self.payments
            .append_history(&PaymentHistory::record(
                stored.id,
                PaymentStatus::Processing.as_str(),
                Some(user.clone()),
                Some("payment created".to_string()),
            ))
            .await?;

        self.attempt_charge(user, booking.id, stored).await
    }

    /// Full refund of a completed payment; cascades the booking to cancelled
    /// and returns its seats.
    pub async fn refund(
        &self,
        user: &UserId,
        payment_ref: &str,
        reason: &str,
    ) -> CoreResult<Payment> {
        let payment = self
            .payments
            .get_payment(payment_ref)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(payment_ref.to_string()))?;

        let booking = self
            .bookings
            .get_booking_by_id(payment.booking_id)
            .await?
            .filter(|b| b.user == *user)
            .ok_or_else(|| CoreError::PaymentNotFound(payment_ref.to_string()))?;

        let refunded = self
            .payments
            .record_refund(payment.id, payment.amount, reason)
            .await?;

        self.payments
            .append_history(&PaymentHistory::record(
                refunded.id,
                "COMPLETED -> REFUNDED",
                Some(user.clone()),
                Some(reason.to_string()),
            ))
            .await?;

        let prior = self
            .bookings
            .update_status(booking.id, &[BookingStatus::Confirmed], BookingStatus::Cancelled)
            .await?;

        for seat in self.bookings.booking_seats(booking.id).await? {
            self.catalog
                .release_seat(booking.schedule_id, seat.seat_id)
                .await?;
        }

        self.bookings
            .append_history(&BookingHistory::record(
                booking.id,
                format!("{} -> {}", prior, BookingStatus::Cancelled),
                Some(user.clone()),
                Some("payment refunded".to_string()),
            ))
            .await?;

        info!(
            payment_ref = %refunded.payment_ref,
            amount = %refunded.refund_amount,
            "payment refunded"
        );
        Ok(refunded)
    }

    pub async fn get_payment(&self, user: &UserId, payment_ref: &str) -> CoreResult<Payment> {
        let payment = self
            .payments
            .get_payment(payment_ref)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(payment_ref.to_string()))?;
        let owned = self
            .bookings
            .get_booking_by_id(payment.booking_id)
            .await?
            .map(|b| b.user == *user)
            .unwrap_or(false);
        if !owned {
            return Err(CoreError::PaymentNotFound(payment_ref.to_string()));
        }
        Ok(payment)
    }

    /// The amount owed. Normally the booking's stored total; a stored total
    /// that is not positive (legacy rows written under the old zero-fallback
    /// policy) is recomputed from the schedule fare instead of being charged
    /// as-is.
    async fn settlement_amount(&self, booking: &transix_booking::Booking) -> CoreResult<Money> {
        if booking.total_amount.is_positive() {
            return Ok(booking.total_amount);
        }

        warn!(
            booking_ref = %booking.booking_ref,
            stored = %booking.total_amount,
            "stored booking total unusable; recomputing from schedule fare"
        );

        let schedule = self
            .catalog
            .get_schedule(booking.schedule_id)
            .await?
            .ok_or_else(|| CoreError::ScheduleNotFound(booking.schedule_id.to_string()))?;
        let seat_count = self.bookings.booking_seats(booking.id).await?.len();
        let fare = self.fares.quote(schedule.price, seat_count as u32)?;

        if !fare.total.is_positive() {
            return Err(CoreError::AmountInvalid(fare.total.to_string()));
        }
        Ok(fare.total)
    }

    async fn attempt_charge(
        &self,
        user: &UserId,
        booking_id: uuid::Uuid,
        payment: Payment,
    ) -> CoreResult<Payment> {
        let charge = GatewayCharge {
            payment_ref: payment.payment_ref.clone(),
            booking_id,
            amount: payment.amount,
            currency: self.fares.currency().to_string(),
            method: payment.method.as_str().to_string(),
        };

        let outcome = match tokio::time::timeout(self.gateway_timeout, self.gateway.charge(&charge))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(CoreError::GatewayError(
                "gateway request timed out".to_string(),
            )),
        };

        match outcome {
            Ok(GatewayOutcome::Approved { transaction_id }) => {
                let payment = self.payments.complete(payment.id, &transaction_id).await?;
                self.payments
                    .append_history(&PaymentHistory::record(
                        payment.id,
                        "PROCESSING -> COMPLETED",
                        Some(user.clone()),
                        Some("gateway approved".to_string()),
                    ))
                    .await?;

                let prior = self
                    .bookings
                    .update_status(
                        booking_id,
                        &[BookingStatus::Pending],
                        BookingStatus::Confirmed,
                    )
                    .await?;
                self.bookings
                    .append_history(&BookingHistory::record(
                        booking_id,
                        format!("{} -> {}", prior, BookingStatus::Confirmed),
                        Some(user.clone()),
                        Some("payment completed".to_string()),
                    ))
                    .await?;

                info!(payment_ref = %payment.payment_ref, amount = %payment.amount, "payment completed");
                Ok(payment)
            }
            Ok(GatewayOutcome::Declined { reason }) => {
                let payment = self.payments.fail(payment.id).await?;
                self.payments
                    .append_history(&PaymentHistory::record(
                        payment.id,
                        "PROCESSING -> FAILED",
                        Some(user.clone()),
                        Some(reason.clone()),
                    ))
                    .await?;

                warn!(payment_ref = %payment.payment_ref, %reason, "payment declined");
                // A decline is a normal terminal outcome for this attempt;
                // the booking stays untouched and the payment is retryable.
                Ok(payment)
            }
            Err(err) => {
                let payment = self.payments.fail(payment.id).await?;
                self.payments
                    .append_history(&PaymentHistory::record(
                        payment.id,
                        "PROCESSING -> FAILED",
                        Some(user.clone()),
                        Some(err.to_string()),
                    ))
                    .await?;

                warn!(payment_ref = %payment.payment_ref, error = %err, "gateway error");
                Err(err)
            }
        }
    }
}
