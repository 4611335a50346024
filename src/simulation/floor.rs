//! Per-floor registry of waiting passengers and hall-call flags

use parking_lot::Mutex;

use super::error::{SimError, SimResult};
use super::passenger::Passenger;
use super::types::{CallDirection, FloorNumber, PassengerId};

/// One floor of the building.
///
/// Passengers are kept in arrival order; membership is unique by id, so
/// repeated adds or removes leave the floor unchanged.
#[derive(Debug, Clone)]
pub struct Floor {
    pub number: FloorNumber,
    passengers: Vec<Passenger>,
    called_up: bool,
    called_down: bool,
}

impl Floor {
    pub fn new(number: FloorNumber) -> Self {
        Self {
            number,
            passengers: Vec::new(),
            called_up: false,
            called_down: false,
        }
    }

    /// Add a passenger. Returns `false` (and discards `passenger`) when a
    /// passenger with the same id is already here.
    pub fn add(&mut self, passenger: Passenger) -> bool {
        if self.contains(passenger.id) {
            return false;
        }
        self.passengers.push(passenger);
        true
    }

    /// Remove a passenger; absent ids are a no-op
    pub fn remove(&mut self, id: PassengerId) -> Option<Passenger> {
        let index = self.passengers.iter().position(|p| p.id == id)?;
        Some(self.passengers.remove(index))
    }

    pub fn contains(&self, id: PassengerId) -> bool {
        self.passengers.iter().any(|p| p.id == id)
    }

    pub fn get_mut(&mut self, id: PassengerId) -> Option<&mut Passenger> {
        self.passengers.iter_mut().find(|p| p.id == id)
    }

    pub fn passenger_ids(&self) -> Vec<PassengerId> {
        self.passengers.iter().map(|p| p.id).collect()
    }

    pub fn len(&self) -> usize {
        self.passengers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passengers.is_empty()
    }

    /// Set the flag for `direction`. Returns `true` if it was not set yet.
    pub fn register_call(&mut self, direction: CallDirection) -> bool {
        let flag = match direction {
            CallDirection::Up => &mut self.called_up,
            CallDirection::Down => &mut self.called_down,
        };
        let newly_set = !*flag;
        *flag = true;
        newly_set
    }

    pub fn clear_calls(&mut self) {
        self.called_up = false;
        self.called_down = false;
    }

    /// Test-and-clear both flags; `true` if either was set
    pub fn take_calls(&mut self) -> bool {
        let called = self.is_called();
        self.clear_calls();
        called
    }

    pub fn called_up(&self) -> bool {
        self.called_up
    }

    pub fn called_down(&self) -> bool {
        self.called_down
    }

    pub fn is_called(&self) -> bool {
        self.called_up || self.called_down
    }

    /// Passengers that started here and want to go somewhere else,
    /// in arrival order
    pub fn pending_passengers_for_pickup(&self) -> Vec<&Passenger> {
        self.passengers
            .iter()
            .filter(|p| p.wants_pickup_at(self.number))
            .collect()
    }

    pub fn has_pending_pickups(&self) -> bool {
        self.passengers.iter().any(|p| p.wants_pickup_at(self.number))
    }
}

/// All floors of the building, each behind its own lock.
///
/// Lock order across the crate is elevator first, then floor; nothing
/// holds a floor lock while taking an elevator lock.
#[derive(Debug)]
pub struct FloorRegistry {
    min_floor: FloorNumber,
    floors: Vec<Mutex<Floor>>,
}

impl FloorRegistry {
    /// Floors `min_floor ..= max_floor`
    pub fn new(min_floor: FloorNumber, max_floor: FloorNumber) -> Self {
        Self {
            min_floor,
            floors: (min_floor..=max_floor)
                .map(|n| Mutex::new(Floor::new(n)))
                .collect(),
        }
    }

    pub fn min_floor(&self) -> FloorNumber {
        self.min_floor
    }

    pub fn max_floor(&self) -> FloorNumber {
        self.min_floor + self.floors.len() as FloorNumber - 1
    }

    pub fn len(&self) -> usize {
        self.floors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }

    pub fn contains(&self, floor: FloorNumber) -> bool {
        floor >= self.min_floor() && floor <= self.max_floor()
    }

    pub fn get(&self, floor: FloorNumber) -> SimResult<&Mutex<Floor>> {
        if !self.contains(floor) {
            return Err(SimError::OutOfBounds {
                floor,
                min: self.min_floor(),
                max: self.max_floor(),
            });
        }
        Ok(&self.floors[(floor - self.min_floor) as usize])
    }

    /// Floors from lowest to highest
    pub fn iter(&self) -> impl Iterator<Item = &Mutex<Floor>> {
        self.floors.iter()
    }
}
