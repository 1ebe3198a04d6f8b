use crate::schedule::{SeatAssignment, SeatState};
use std::collections::HashMap;
use uuid::Uuid;

/// In-memory seat inventory, keyed by (schedule, seat).
///
/// Reserve and release are strict state transitions: a reserve only succeeds
/// on an open assignment, so two attempts for the same seat can never both
/// win as long as the caller serializes access (the memory store runs every
/// mutation under a single lock).
pub struct SeatInventory {
    assignments: HashMap<(Uuid, Uuid), SeatAssignment>,
}

impl SeatInventory {
    pub fn new() -> Self {
        Self {
            assignments: HashMap::new(),
        }
    }

    /// Open an assignment for a seat on a schedule, available for booking.
    pub fn open(&mut self, schedule_id: Uuid, seat_id: Uuid) {
        self.assignments
            .insert((schedule_id, seat_id), SeatAssignment::open(schedule_id, seat_id));
    }

    pub fn get(&self, schedule_id: Uuid, seat_id: Uuid) -> Option<&SeatAssignment> {
        self.assignments.get(&(schedule_id, seat_id))
    }

    /// Reserve one seat for a booking. Fails if the assignment does not exist
    /// or is already held.
    pub fn reserve(
        &mut self,
        schedule_id: Uuid,
        seat_id: Uuid,
        booking_id: Uuid,
    ) -> Result<(), InventoryError> {
        let assignment = self
            .assignments
            .get_mut(&(schedule_id, seat_id))
            .ok_or(InventoryError::NotOpen { schedule_id, seat_id })?;

        if !assignment.is_available() {
            return Err(InventoryError::AlreadyReserved { schedule_id, seat_id });
        }

        assignment.state = SeatState::Reserved;
        assignment.booking_id = Some(booking_id);
        Ok(())
    }

    /// Release a previously reserved seat back to available.
    pub fn release(&mut self, schedule_id: Uuid, seat_id: Uuid) -> Result<(), InventoryError> {
        let assignment = self
            .assignments
            .get_mut(&(schedule_id, seat_id))
            .ok_or(InventoryError::NotOpen { schedule_id, seat_id })?;

        assignment.state = SeatState::Available;
        assignment.booking_id = None;
        Ok(())
    }

    /// Live availability for a schedule, derived from assignment state.
    pub fn available_count(&self, schedule_id: Uuid) -> i64 {
        self.assignments
            .values()
            .filter(|a| a.schedule_id == schedule_id && a.is_available())
            .count() as i64
    }

    pub fn assignments_for(&self, schedule_id: Uuid) -> Vec<SeatAssignment> {
        self.assignments
            .values()
            .filter(|a| a.schedule_id == schedule_id)
            .cloned()
            .collect()
    }
}

impl Default for SeatInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("No assignment open for seat {seat_id} on schedule {schedule_id}")]
    NotOpen { schedule_id: Uuid, seat_id: Uuid },

    #[error("Seat {seat_id} on schedule {schedule_id} is already reserved")]
    AlreadyReserved { schedule_id: Uuid, seat_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seat_lifecycle() {
        let mut inventory = SeatInventory::new();
        let schedule_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();
        let booking_id = Uuid::new_v4();

        inventory.open(schedule_id, seat_id);
        assert_eq!(inventory.available_count(schedule_id), 1);

        inventory.reserve(schedule_id, seat_id, booking_id).unwrap();
        assert_eq!(inventory.available_count(schedule_id), 0);
        assert_eq!(
            inventory.get(schedule_id, seat_id).unwrap().booking_id,
            Some(booking_id)
        );

        inventory.release(schedule_id, seat_id).unwrap();
        assert_eq!(inventory.available_count(schedule_id), 1);
        assert_eq!(inventory.get(schedule_id, seat_id).unwrap().booking_id, None);
    }

    #[test]
    fn test_double_reserve_fails() {
        let mut inventory = SeatInventory::new();
        let schedule_id = Uuid::new_v4();
        let seat_id = Uuid::new_v4();

        inventory.open(schedule_id, seat_id);
        inventory.reserve(schedule_id, seat_id, Uuid::new_v4()).unwrap();

        let result = inventory.reserve(schedule_id, seat_id, Uuid::new_v4());
        assert!(matches!(result, Err(InventoryError::AlreadyReserved { .. })));
    }

    #[test]
    fn test_reserve_without_assignment_fails() {
        let mut inventory = SeatInventory::new();
        let result = inventory.reserve(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert!(matches!(result, Err(InventoryError::NotOpen { .. })));
    }

    #[test]
    fn test_availability_is_scoped_per_schedule() {
        let mut inventory = SeatInventory::new();
        let seat_id = Uuid::new_v4();
        let morning = Uuid::new_v4();
        let evening = Uuid::new_v4();

        // Same physical seat, two trips of the same vehicle.
        inventory.open(morning, seat_id);
        inventory.open(evening, seat_id);

        inventory.reserve(morning, seat_id, Uuid::new_v4()).unwrap();

        assert_eq!(inventory.available_count(morning), 0);
        assert_eq!(inventory.available_count(evening), 1);
    }
}
