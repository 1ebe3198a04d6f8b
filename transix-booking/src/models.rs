use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use transix_core::{CoreError, Money, UserId};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            other => Err(CoreError::Storage(format!("unknown booking status {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "MALE",
            Gender::Female => "FEMALE",
            Gender::Other => "OTHER",
        }
    }
}

impl FromStr for Gender {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MALE" => Ok(Gender::Male),
            "FEMALE" => Ok(Gender::Female),
            "OTHER" => Ok(Gender::Other),
            other => Err(CoreError::Storage(format!("unknown gender {other}"))),
        }
    }
}

/// The reservation root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    /// Short, externally stable reference shown to the user.
    pub booking_ref: String,
    pub user: UserId,
    pub schedule_id: Uuid,
    pub total_amount: Money,
    pub status: BookingStatus,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user: UserId,
        schedule_id: Uuid,
        total_amount: Money,
        special_requests: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_ref: new_booking_ref(),
            user,
            schedule_id,
            total_amount,
            status: BookingStatus::Pending,
            special_requests,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One passenger in a booking request, paired positionally with a seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerDetails {
    pub name: String,
    pub age: i32,
    pub gender: Gender,
}

/// Join row between a booking and one reserved seat. Created atomically with
/// its booking and never updated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingSeat {
    pub booking_id: Uuid,
    pub seat_id: Uuid,
    pub passenger_name: String,
    pub passenger_age: i32,
    pub passenger_gender: Gender,
}

/// Append-only audit record, one per status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingHistory {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub status_change: String,
    pub changed_by: Option<UserId>,
    pub change_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl BookingHistory {
    pub fn record(
        booking_id: Uuid,
        status_change: impl Into<String>,
        changed_by: Option<UserId>,
        change_reason: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            status_change: status_change.into(),
            changed_by,
            change_reason,
            timestamp: Utc::now(),
        }
    }
}

/// 8-character uppercase reference, short enough to read over the phone.
pub fn new_booking_ref() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_ref_shape() {
        let reference = new_booking_ref();
        assert_eq!(reference.len(), 8);
        assert_eq!(reference, reference.to_uppercase());
    }

    #[test]
    fn test_new_booking_starts_pending() {
        let booking = Booking::new(
            UserId::new("user-1"),
            Uuid::new_v4(),
            Money::parse("92.00").unwrap(),
            None,
        );
        assert_eq!(booking.status, BookingStatus::Pending);
    }
}
