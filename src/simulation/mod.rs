//! Elevator dispatch simulation
//!
//! The core is usable two ways: `Building` runs a full threaded simulation
//! against a scaled clock, while `Elevator`, `Dispatcher` and `Floor` can be
//! driven step by step without any threads, which is how the tests pin down
//! ordering behavior.

mod building;
mod config;
mod dispatcher;
mod elevator;
mod error;
mod events;
mod floor;
mod passenger;
mod policy;
mod probability;
mod stats;
mod timer;
mod types;

pub use building::{Building, Population, SimContext};
pub use config::{
    ElevatorTiming, SimConfig, DEFAULT_CAPACITY, DEFAULT_DISPATCH_INTERVAL_MS,
    DEFAULT_DOOR_DELAY_MS, DEFAULT_FLOOR_TRAVEL_MS, DEFAULT_TRANSFER_MS,
};
pub use dispatcher::{Dispatcher, TickReport};
pub use elevator::{
    CallOutcome, Elevator, ElevatorSnapshot, ElevatorState, Movement, PhaseOutcome, StopPhase,
    StopReport,
};
pub use error::{SimError, SimResult};
pub use events::{EventSink, LogSink, NullSink, RecordingSink, SimEvent};
pub use floor::{Floor, FloorRegistry};
pub use passenger::{DropOutcome, Passenger, PassengerState};
pub use policy::{policy_from_name, DispatchPolicy, FirstAvailable, RoundRobin, ShortestJobFirst};
pub use probability::{DelayDistribution, ProbabilityModel};
pub use stats::{ElevatorStats, SimulationReport, SimulationStats, StatsRecorder};
pub use timer::{Action, SimClock, StopSignal, Timer};
pub use types::{CallDirection, Direction, ElevatorId, FloorNumber, PassengerId};
