//! Core types for the elevator simulation
//!
//! Identifiers and direction enums shared by every component.

use std::fmt;

/// A floor number. Floors are contiguous within `[min_floor, max_floor]`.
pub type FloorNumber = i32;

/// A wrapper type for passenger IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassengerId(pub u64);

/// A wrapper type for elevator IDs (index into the fleet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElevatorId(pub usize);

impl fmt::Display for PassengerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ElevatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Direction of travel for an elevator car
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    /// Only while the car has no queued stops
    Idle,
}

impl Direction {
    /// Direction needed to get from `from` to `to`; `Idle` when they are equal
    pub fn toward(from: FloorNumber, to: FloorNumber) -> Self {
        match to.cmp(&from) {
            std::cmp::Ordering::Greater => Direction::Up,
            std::cmp::Ordering::Less => Direction::Down,
            std::cmp::Ordering::Equal => Direction::Idle,
        }
    }

    /// Floor offset of one step in this direction
    pub fn step(self) -> FloorNumber {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
            Direction::Idle => 0,
        }
    }

    pub fn as_call(self) -> Option<CallDirection> {
        match self {
            Direction::Up => Some(CallDirection::Up),
            Direction::Down => Some(CallDirection::Down),
            Direction::Idle => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Idle => "idle",
        };
        f.write_str(s)
    }
}

/// Direction a hall call asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallDirection {
    Up,
    Down,
}

impl CallDirection {
    /// Call direction for a trip, `None` when origin and destination match
    pub fn for_trip(origin: FloorNumber, destination: FloorNumber) -> Option<Self> {
        Direction::toward(origin, destination).as_call()
    }

    pub fn as_direction(self) -> Direction {
        match self {
            CallDirection::Up => Direction::Up,
            CallDirection::Down => Direction::Down,
        }
    }
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_direction().fmt(f)
    }
}
