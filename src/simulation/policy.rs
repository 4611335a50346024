//! Dispatch policies
//!
//! A policy maps one pending floor call to at most one elevator. Policies
//! only see snapshots of the fleet; committing the call is the
//! dispatcher's job.

use super::elevator::ElevatorSnapshot;
use super::error::{SimError, SimResult};
use super::types::{ElevatorId, FloorNumber};

pub trait DispatchPolicy: Send {
    fn name(&self) -> &'static str;

    /// Choose an elevator for a call at `floor`, or `None` to leave the
    /// call waiting for a later tick. `fleet` is in fleet order.
    fn assign(&mut self, floor: FloorNumber, fleet: &[ElevatorSnapshot]) -> Option<ElevatorId>;
}

/// First car in fleet order that is idle, or already moving toward the floor
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailable;

impl DispatchPolicy for FirstAvailable {
    fn name(&self) -> &'static str {
        "first-available"
    }

    fn assign(&mut self, floor: FloorNumber, fleet: &[ElevatorSnapshot]) -> Option<ElevatorId> {
        fleet
            .iter()
            .find(|car| car.available || car.is_heading_toward(floor))
            .map(|car| car.id)
    }
}

/// Hands calls out in turn, skipping full cars
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin {
    next: usize,
}

impl DispatchPolicy for RoundRobin {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn assign(&mut self, _floor: FloorNumber, fleet: &[ElevatorSnapshot]) -> Option<ElevatorId> {
        if fleet.is_empty() {
            return None;
        }
        let start = self.next % fleet.len();
        let offset = (0..fleet.len()).find(|i| !fleet[(start + i) % fleet.len()].is_full())?;
        let index = (start + offset) % fleet.len();
        self.next = index + 1;
        Some(fleet[index].id)
    }
}

/// Car with the smallest estimated service cost: distance to the floor
/// plus the stops it already has queued. Ties go to fleet order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortestJobFirst;

impl ShortestJobFirst {
    fn cost(floor: FloorNumber, car: &ElevatorSnapshot) -> u32 {
        (floor - car.current_floor).unsigned_abs() + car.queue.len() as u32
    }
}

impl DispatchPolicy for ShortestJobFirst {
    fn name(&self) -> &'static str {
        "shortest-job-first"
    }

    fn assign(&mut self, floor: FloorNumber, fleet: &[ElevatorSnapshot]) -> Option<ElevatorId> {
        fleet
            .iter()
            .filter(|car| !car.is_full())
            .min_by_key(|car| Self::cost(floor, car))
            .map(|car| car.id)
    }
}

/// Resolve a policy by name. Accepts the long names and the short aliases
/// `fcfs`, `random`, `rr` and `sjf`.
pub fn policy_from_name(name: &str) -> SimResult<Box<dyn DispatchPolicy>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "first-available" | "fcfs" | "random" => Ok(Box::new(FirstAvailable)),
        "round-robin" | "rr" => Ok(Box::new(RoundRobin::default())),
        "shortest-job-first" | "sjf" => Ok(Box::new(ShortestJobFirst)),
        _ => Err(SimError::UnsupportedPolicy(name.to_string())),
    }
}
