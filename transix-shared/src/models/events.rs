use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatReservedEvent {
    pub schedule_id: Uuid,
    pub seat_number: String,
    pub booking_ref: String,
    pub reserved_at: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatReleasedEvent {
    pub schedule_id: Uuid,
    pub seat_number: String,
    pub released_at: i64,
}

/// Envelope broadcast over the API's per-schedule event stream.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeatEvent {
    Reserved(SeatReservedEvent),
    Released(SeatReleasedEvent),
}

impl SeatEvent {
    pub fn schedule_id(&self) -> Uuid {
        match self {
            SeatEvent::Reserved(e) => e.schedule_id,
            SeatEvent::Released(e) => e.schedule_id,
        }
    }
}
