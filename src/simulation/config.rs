//! Simulation configuration
//!
//! Supplied once when the building is constructed. Parsing belongs to the
//! binary; this module only holds values and checks them.

use std::time::Duration;

use super::error::{SimError, SimResult};
use super::probability::DelayDistribution;
use super::types::FloorNumber;

/// Door open/close delay in milliseconds
pub const DEFAULT_DOOR_DELAY_MS: u64 = 1500;
/// Travel time per floor in milliseconds
pub const DEFAULT_FLOOR_TRAVEL_MS: u64 = 1000;
/// Time for one passenger to board or leave in milliseconds
pub const DEFAULT_TRANSFER_MS: u64 = 300;
/// Default elevator capacity
pub const DEFAULT_CAPACITY: usize = 100;
/// Default dispatch tick in milliseconds
pub const DEFAULT_DISPATCH_INTERVAL_MS: u64 = 1000;

/// Per-operation costs of an elevator car, in simulated time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevatorTiming {
    pub door_delay: Duration,
    pub floor_travel: Duration,
    pub passenger_transfer: Duration,
}

impl Default for ElevatorTiming {
    fn default() -> Self {
        Self {
            door_delay: Duration::from_millis(DEFAULT_DOOR_DELAY_MS),
            floor_travel: Duration::from_millis(DEFAULT_FLOOR_TRAVEL_MS),
            passenger_transfer: Duration::from_millis(DEFAULT_TRANSFER_MS),
        }
    }
}

impl ElevatorTiming {
    /// Every operation free; used by tests that only care about ordering
    pub fn instant() -> Self {
        Self {
            door_delay: Duration::ZERO,
            floor_travel: Duration::ZERO,
            passenger_transfer: Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Number of floors, numbered from `min_floor` upwards
    pub floors: usize,
    pub min_floor: FloorNumber,
    /// The lobby: trips start here and passengers leave from here
    pub terminal_floor: FloorNumber,
    pub elevators: usize,
    /// Passengers generated over the run
    pub passengers: usize,
    pub capacity: usize,
    /// Dispatch policy name, resolved at construction
    pub policy: String,
    pub timing: ElevatorTiming,
    /// Delay between a drop-off and the next trip decision
    pub decision_delay: DelayDistribution,
    /// Delay between two generated passengers
    pub arrival_gap: DelayDistribution,
    pub dispatch_interval: Duration,
    /// Real seconds per simulated second
    pub time_scale: f64,
    pub seed: Option<u64>,
    pub verbose: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            floors: 5,
            min_floor: 0,
            terminal_floor: 1,
            elevators: 1,
            passengers: 10,
            capacity: DEFAULT_CAPACITY,
            policy: "first-available".to_string(),
            timing: ElevatorTiming::default(),
            decision_delay: DelayDistribution::Uniform {
                min: Duration::ZERO,
                max: Duration::from_millis(100_000),
            },
            arrival_gap: DelayDistribution::Uniform {
                min: Duration::ZERO,
                max: Duration::from_millis(2000),
            },
            dispatch_interval: Duration::from_millis(DEFAULT_DISPATCH_INTERVAL_MS),
            time_scale: 0.01,
            seed: None,
            verbose: false,
        }
    }
}

impl SimConfig {
    pub fn max_floor(&self) -> FloorNumber {
        self.min_floor + self.floors as FloorNumber - 1
    }

    pub fn validate(&self) -> SimResult<()> {
        if self.floors == 0 {
            return Err(SimError::InvalidConfig("at least one floor is required".into()));
        }
        if self.elevators == 0 {
            return Err(SimError::InvalidConfig("at least one elevator is required".into()));
        }
        if self.capacity == 0 {
            return Err(SimError::InvalidConfig("elevator capacity must be positive".into()));
        }
        if self.terminal_floor < self.min_floor || self.terminal_floor > self.max_floor() {
            return Err(SimError::InvalidConfig(format!(
                "terminal floor {} is outside [{}, {}]",
                self.terminal_floor,
                self.min_floor,
                self.max_floor()
            )));
        }
        if !self.time_scale.is_finite() || self.time_scale <= 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "time scale {} must be a positive number",
                self.time_scale
            )));
        }
        if self.dispatch_interval.is_zero() {
            return Err(SimError::InvalidConfig("dispatch interval must be positive".into()));
        }
        self.decision_delay.validate()?;
        self.arrival_gap.validate()?;
        Ok(())
    }
}
