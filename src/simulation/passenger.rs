//! Passenger lifecycle
//!
//! A passenger waits on a floor, rides an elevator, and is dropped at its
//! destination. Dropped at the terminal floor it leaves the building;
//! anywhere else it picks a new destination after its decision delay.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

use super::error::{SimError, SimResult};
use super::probability::{DelayDistribution, ProbabilityModel};
use super::types::{CallDirection, FloorNumber, PassengerId};

/// 64-bit fractional golden-ratio constant for per-passenger seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassengerState {
    /// On a floor with a call registered
    Waiting,
    /// Aboard an elevator
    InTransit,
    /// Delivered, deciding on the next trip
    Dropped,
}

/// What happens to a passenger after it is dropped off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Reached the terminal floor, leaves the simulation
    Exited,
    /// Picks a new destination once `delay` has elapsed
    Redecide { delay: Duration },
}

#[derive(Debug, Clone)]
pub struct Passenger {
    pub id: PassengerId,
    pub origin: FloorNumber,
    pub destination: FloorNumber,
    pub state: PassengerState,
    /// Simulated time at which the current call was registered
    pub waiting_since: Duration,
    pub trips_completed: u32,
    decision_delay: DelayDistribution,
    rng: StdRng,
}

impl Passenger {
    /// Create a waiting passenger. `seed` is the run seed; each passenger
    /// derives its own RNG stream from it and its id.
    pub fn new(
        id: PassengerId,
        origin: FloorNumber,
        destination: FloorNumber,
        decision_delay: DelayDistribution,
        seed: u64,
    ) -> SimResult<Self> {
        if origin == destination {
            return Err(SimError::InvalidTrip { origin });
        }

        Ok(Self {
            id,
            origin,
            destination,
            state: PassengerState::Waiting,
            waiting_since: Duration::ZERO,
            trips_completed: 0,
            decision_delay,
            rng: StdRng::seed_from_u64(seed ^ id.0.wrapping_mul(MIXING_CONSTANT)),
        })
    }

    /// Direction of the current trip, `None` while deciding
    pub fn call_direction(&self) -> Option<CallDirection> {
        CallDirection::for_trip(self.origin, self.destination)
    }

    /// Whether this passenger should be picked up at `floor`
    pub fn wants_pickup_at(&self, floor: FloorNumber) -> bool {
        self.origin == floor && self.destination != floor
    }

    pub fn board(&mut self) {
        self.state = PassengerState::InTransit;
    }

    /// Called by the elevator when the passenger leaves the car at `floor`
    pub fn drop_off(&mut self, floor: FloorNumber) {
        self.origin = floor;
        self.state = PassengerState::Dropped;
        self.trips_completed += 1;
    }

    /// Drop callback: decide whether to leave or plan another trip
    pub fn on_dropped(&mut self, terminal_floor: FloorNumber) -> DropOutcome {
        if self.origin == self.destination && self.origin == terminal_floor {
            DropOutcome::Exited
        } else {
            DropOutcome::Redecide {
                delay: self.decision_delay.sample(&mut self.rng),
            }
        }
    }

    /// Pick a new destination different from the current floor and go back
    /// to waiting. Returns the direction of the new call.
    pub fn redecide(
        &mut self,
        model: &ProbabilityModel,
        now: Duration,
    ) -> SimResult<CallDirection> {
        let origin = self.origin;
        let picks = model.sample_unique(&mut self.rng, 2, Some(origin))?;
        let next = picks
            .into_iter()
            .find(|floor| *floor != origin)
            .ok_or(SimError::InvalidTrip { origin })?;

        self.destination = next;
        self.state = PassengerState::Waiting;
        self.waiting_since = now;
        self.call_direction().ok_or(SimError::InvalidTrip { origin })
    }
}
