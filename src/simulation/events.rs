//! Simulation events and the sinks that receive them
//!
//! The core never prints. Every observable step becomes a `SimEvent` handed
//! to an `EventSink`; turning events into console lines is the sink's job.

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fmt;
use std::time::Duration;

use super::types::{CallDirection, ElevatorId, FloorNumber, PassengerId};

#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    PassengerSpawned {
        passenger: PassengerId,
        origin: FloorNumber,
        destination: FloorNumber,
    },
    CallRegistered {
        floor: FloorNumber,
        direction: CallDirection,
    },
    CallAssigned {
        floor: FloorNumber,
        elevator: ElevatorId,
    },
    /// No elevator qualified; the call stays waiting for the next tick
    CallDeferred {
        floor: FloorNumber,
    },
    CallDropped {
        floor: FloorNumber,
        reason: String,
    },
    DoorOpened {
        elevator: ElevatorId,
        floor: FloorNumber,
    },
    DoorClosed {
        elevator: ElevatorId,
        floor: FloorNumber,
    },
    PassengerBoarded {
        elevator: ElevatorId,
        passenger: PassengerId,
        floor: FloorNumber,
        waited: Duration,
    },
    PassengerDropped {
        elevator: ElevatorId,
        passenger: PassengerId,
        floor: FloorNumber,
    },
    /// Passengers still waiting after a stop (car full or heading away)
    PassengersLeftBehind {
        elevator: ElevatorId,
        floor: FloorNumber,
        count: usize,
    },
    PassengerExited {
        passenger: PassengerId,
        floor: FloorNumber,
    },
    PassengerRedecided {
        passenger: PassengerId,
        origin: FloorNumber,
        destination: FloorNumber,
    },
    ElevatorMoved {
        elevator: ElevatorId,
        from: FloorNumber,
        to: FloorNumber,
    },
    ElevatorIdle {
        elevator: ElevatorId,
        floor: FloorNumber,
    },
}

impl SimEvent {
    /// Passenger and dispatch milestones, as opposed to car mechanics
    pub fn is_milestone(&self) -> bool {
        matches!(
            self,
            SimEvent::PassengerSpawned { .. }
                | SimEvent::PassengerExited { .. }
                | SimEvent::PassengerRedecided { .. }
                | SimEvent::CallAssigned { .. }
                | SimEvent::CallDropped { .. }
        )
    }
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimEvent::PassengerSpawned {
                passenger,
                origin,
                destination,
            } => write!(
                f,
                "BUILDING: New passenger {passenger} from floor {origin} to floor {destination}"
            ),
            SimEvent::CallRegistered { floor, direction } => {
                write!(f, "FLOOR {floor}: called {direction}")
            }
            SimEvent::CallAssigned { floor, elevator } => {
                write!(f, "ELEVATORS: Found elevator {elevator} for floor {floor}")
            }
            SimEvent::CallDeferred { floor } => write!(
                f,
                "ELEVATORS: No elevator available, floor {floor} stays waiting"
            ),
            SimEvent::CallDropped { floor, reason } => {
                write!(f, "ELEVATORS: Dropped call for floor {floor}: {reason}")
            }
            SimEvent::DoorOpened { elevator, floor } => {
                write!(f, "ELEVATOR {elevator}: Door opened on floor {floor}")
            }
            SimEvent::DoorClosed { elevator, floor } => {
                write!(f, "ELEVATOR {elevator}: Door closed on floor {floor}")
            }
            SimEvent::PassengerBoarded {
                elevator,
                passenger,
                floor,
                waited,
            } => write!(
                f,
                "ELEVATOR {elevator}: Loaded passenger {passenger} on floor {floor} after {:.2}s",
                waited.as_secs_f64()
            ),
            SimEvent::PassengerDropped {
                elevator,
                passenger,
                floor,
            } => write!(
                f,
                "ELEVATOR {elevator}: Dropped passenger {passenger} on floor {floor}"
            ),
            SimEvent::PassengersLeftBehind {
                elevator,
                floor,
                count,
            } => write!(
                f,
                "ELEVATOR {elevator}: Left {count} passengers waiting on floor {floor}"
            ),
            SimEvent::PassengerExited { passenger, floor } => {
                write!(f, "BUILDING: Passenger {passenger} left the building at floor {floor}")
            }
            SimEvent::PassengerRedecided {
                passenger,
                origin,
                destination,
            } => write!(
                f,
                "Passenger {passenger} decided to go from {origin} to {destination}"
            ),
            SimEvent::ElevatorMoved { elevator, from, to } => {
                write!(f, "ELEVATOR {elevator}: Moving from floor {from} to floor {to}")
            }
            SimEvent::ElevatorIdle { elevator, floor } => {
                write!(f, "ELEVATOR {elevator}: Idle on floor {floor}")
            }
        }
    }
}

/// Receiver of simulation events. Shared by every concurrent activity.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &SimEvent);
}

/// Writes events through the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink {
    /// Log car mechanics at `info` instead of `debug`
    pub verbose: bool,
}

impl LogSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl EventSink for LogSink {
    fn record(&self, event: &SimEvent) {
        if matches!(event, SimEvent::CallDropped { .. }) {
            warn!("{event}");
        } else if self.verbose || event.is_milestone() {
            info!("{event}");
        } else {
            debug!("{event}");
        }
    }
}

/// Keeps every event in memory, in the order received
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SimEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&SimEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &SimEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: &SimEvent) {}
}
