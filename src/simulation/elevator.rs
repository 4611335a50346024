//! Single-car elevator state machine
//!
//! A car cycles `Idle -> DoorOpen -> Moving -> DoorOpen ...` until its stop
//! queue is empty, then returns to `Idle`. Each phase is its own method and
//! returns the simulated time it costs, so a driver can suspend between
//! phases with the car unlocked. `execute_floor_move` and `run_until_idle`
//! chain the phases without suspending.

use sorted_vec::SortedSet;
use std::time::Duration;

use super::config::ElevatorTiming;
use super::error::{SimError, SimResult};
use super::events::{EventSink, SimEvent};
use super::floor::{Floor, FloorRegistry};
use super::passenger::Passenger;
use super::types::{CallDirection, Direction, ElevatorId, FloorNumber, PassengerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElevatorState {
    Idle,
    DoorOpen,
    Moving,
}

/// How a `call` was taken in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The car was idle and now heads for the floor
    Started,
    /// The floor is ahead in the current direction
    Merged,
    AlreadyQueued,
    /// Pinned onto the queue although it is behind the car
    Forced,
    /// Behind the car and not forced; nothing changed
    Ignored,
}

/// Result of moving one floor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    /// Travelled through a floor without a queued stop
    Passing { floor: FloorNumber, cost: Duration },
    /// Reached a queued stop
    Arrived { floor: FloorNumber, cost: Duration },
    /// Queue empty, the car is idle
    Idle,
}

/// What happened during one stop
#[derive(Debug, Clone, PartialEq)]
pub struct StopReport {
    pub floor: FloorNumber,
    pub dropped: Vec<PassengerId>,
    pub boarded: Vec<PassengerId>,
    pub left_behind: usize,
    pub cost: Duration,
}

/// The phases of a stop, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopPhase {
    OpenDoor,
    Unload,
    Load,
    CloseDoor,
}

impl StopPhase {
    pub const SEQUENCE: [StopPhase; 4] = [
        StopPhase::OpenDoor,
        StopPhase::Unload,
        StopPhase::Load,
        StopPhase::CloseDoor,
    ];
}

/// What a single stop phase did. Dropped passengers are handed back to the
/// caller, which decides where they go.
#[derive(Debug, Default)]
pub struct PhaseOutcome {
    pub dropped: Vec<Passenger>,
    pub boarded: Vec<PassengerId>,
    pub left_behind: usize,
    pub cost: Duration,
}

/// Read-only view of a car handed to dispatch policies
#[derive(Debug, Clone, PartialEq)]
pub struct ElevatorSnapshot {
    pub id: ElevatorId,
    pub current_floor: FloorNumber,
    pub direction: Direction,
    pub available: bool,
    pub queue: Vec<FloorNumber>,
    pub onboard: usize,
    pub capacity: usize,
}

impl ElevatorSnapshot {
    pub fn is_full(&self) -> bool {
        self.onboard >= self.capacity
    }

    /// Already moving toward `floor` in a direction that reaches it
    pub fn is_heading_toward(&self, floor: FloorNumber) -> bool {
        match self.direction {
            Direction::Up => floor > self.current_floor,
            Direction::Down => floor < self.current_floor,
            Direction::Idle => false,
        }
    }
}

#[derive(Debug)]
pub struct Elevator {
    pub id: ElevatorId,
    pub capacity: usize,
    min_floor: FloorNumber,
    max_floor: FloorNumber,
    current_floor: FloorNumber,
    direction: Direction,
    state: ElevatorState,
    available: bool,
    onboard: Vec<Passenger>,
    queue: SortedSet<FloorNumber>,
    timing: ElevatorTiming,

    /// Simulated time spent on doors, transfers and travel
    busy_time: Duration,
    stops: usize,
    floors_travelled: usize,
    passengers_carried: usize,
}

impl Elevator {
    pub fn new(
        id: ElevatorId,
        capacity: usize,
        min_floor: FloorNumber,
        max_floor: FloorNumber,
        start_floor: FloorNumber,
        timing: ElevatorTiming,
    ) -> SimResult<Self> {
        if start_floor < min_floor || start_floor > max_floor {
            return Err(SimError::OutOfBounds {
                floor: start_floor,
                min: min_floor,
                max: max_floor,
            });
        }

        Ok(Self {
            id,
            capacity,
            min_floor,
            max_floor,
            current_floor: start_floor,
            direction: Direction::Idle,
            state: ElevatorState::Idle,
            available: true,
            onboard: Vec::new(),
            queue: SortedSet::new(),
            timing,
            busy_time: Duration::ZERO,
            stops: 0,
            floors_travelled: 0,
            passengers_carried: 0,
        })
    }

    pub fn current_floor(&self) -> FloorNumber {
        self.current_floor
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> ElevatorState {
        self.state
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    pub fn queue(&self) -> Vec<FloorNumber> {
        self.queue.to_vec()
    }

    pub fn has_queued(&self, floor: FloorNumber) -> bool {
        self.queue.binary_search(&floor).is_ok()
    }

    pub fn has_pending_stops(&self) -> bool {
        !self.queue.is_empty()
    }

    pub fn onboard(&self) -> &[Passenger] {
        &self.onboard
    }

    pub fn busy_time(&self) -> Duration {
        self.busy_time
    }

    pub fn stops(&self) -> usize {
        self.stops
    }

    pub fn floors_travelled(&self) -> usize {
        self.floors_travelled
    }

    pub fn passengers_carried(&self) -> usize {
        self.passengers_carried
    }

    pub fn snapshot(&self) -> ElevatorSnapshot {
        ElevatorSnapshot {
            id: self.id,
            current_floor: self.current_floor,
            direction: self.direction,
            available: self.available,
            queue: self.queue(),
            onboard: self.onboard.len(),
            capacity: self.capacity,
        }
    }

    fn check_bounds(&self, floor: FloorNumber) -> SimResult<()> {
        if floor < self.min_floor || floor > self.max_floor {
            return Err(SimError::OutOfBounds {
                floor,
                min: self.min_floor,
                max: self.max_floor,
            });
        }
        Ok(())
    }

    /// Request service at `floor`.
    ///
    /// An idle car turns toward the floor and leaves the idle state. A busy
    /// car merges floors ahead of it; floors behind it are only queued when
    /// `force` is set.
    pub fn call(&mut self, floor: FloorNumber, force: bool) -> SimResult<CallOutcome> {
        self.check_bounds(floor)?;

        if self.has_queued(floor) {
            return Ok(CallOutcome::AlreadyQueued);
        }

        if self.available && self.queue.is_empty() {
            self.direction = match Direction::toward(self.current_floor, floor) {
                Direction::Idle => Direction::Up,
                direction => direction,
            };
            self.available = false;
            self.queue.push(floor);
            return Ok(CallOutcome::Started);
        }

        let ahead = match self.direction {
            Direction::Up => floor > self.current_floor,
            Direction::Down => floor < self.current_floor,
            Direction::Idle => false,
        };
        if ahead {
            self.queue.push(floor);
            Ok(CallOutcome::Merged)
        } else if force {
            self.queue.push(floor);
            Ok(CallOutcome::Forced)
        } else {
            Ok(CallOutcome::Ignored)
        }
    }

    fn stop_above(&self) -> Option<FloorNumber> {
        self.queue.iter().copied().find(|f| *f > self.current_floor)
    }

    fn stop_below(&self) -> Option<FloorNumber> {
        self.queue.iter().rev().copied().find(|f| *f < self.current_floor)
    }

    fn has_stops_ahead(&self, direction: Direction) -> bool {
        match direction {
            Direction::Up => self.stop_above().is_some(),
            Direction::Down => self.stop_below().is_some(),
            Direction::Idle => false,
        }
    }

    /// Next stop: the lowest queued floor above the car when going up, the
    /// highest below it when going down. A queued current floor is served
    /// once nothing is left ahead; after that the car turns around.
    pub fn next_floor(&self) -> Option<FloorNumber> {
        if self.queue.is_empty() {
            return None;
        }

        let here = self
            .has_queued(self.current_floor)
            .then_some(self.current_floor);
        let above = self.stop_above();
        let below = self.stop_below();
        match self.direction {
            Direction::Up => above.or(here).or(below),
            Direction::Down => below.or(here).or(above),
            Direction::Idle if here.is_some() => here,
            Direction::Idle => match (above, below) {
                (Some(a), Some(b)) if a - self.current_floor < self.current_floor - b => Some(a),
                (_, Some(b)) => Some(b),
                (a, None) => a,
            },
        }
    }

    pub fn open_door(&mut self, sink: &dyn EventSink) -> Duration {
        self.state = ElevatorState::DoorOpen;
        self.stops += 1;
        self.busy_time += self.timing.door_delay;
        sink.record(&SimEvent::DoorOpened {
            elevator: self.id,
            floor: self.current_floor,
        });
        self.timing.door_delay
    }

    /// Take every passenger whose destination is the current floor out of
    /// the car, with its origin already moved to this floor.
    pub fn unload(&mut self, sink: &dyn EventSink) -> (Vec<Passenger>, Duration) {
        let here = self.current_floor;
        let (mut leaving, staying): (Vec<Passenger>, Vec<Passenger>) =
            std::mem::take(&mut self.onboard)
                .into_iter()
                .partition(|p| p.destination == here);
        self.onboard = staying;

        for passenger in &mut leaving {
            passenger.drop_off(here);
            sink.record(&SimEvent::PassengerDropped {
                elevator: self.id,
                passenger: passenger.id,
                floor: here,
            });
        }

        let cost = self.timing.passenger_transfer * leaving.len() as u32;
        self.busy_time += cost;
        (leaving, cost)
    }

    /// Board waiting passengers heading the way the car will leave, in
    /// arrival order, until the car is full.
    ///
    /// The car keeps its direction while it has stops ahead; otherwise it
    /// takes the direction of the first passenger in line. Whoever stays
    /// behind re-raises their call on the floor.
    pub fn load(&mut self, floor: &mut Floor, now: Duration, sink: &dyn EventSink) -> PhaseOutcome {
        let here = self.current_floor;
        let candidates: Vec<(PassengerId, CallDirection)> = floor
            .pending_passengers_for_pickup()
            .iter()
            .filter_map(|p| p.call_direction().map(|d| (p.id, d)))
            .collect();

        let Some(&(_, first_direction)) = candidates.first() else {
            return PhaseOutcome::default();
        };

        let heading = match self.direction.as_call() {
            Some(d) if self.has_stops_ahead(d.as_direction()) => d,
            _ => first_direction,
        };
        self.direction = heading.as_direction();

        let mut boarded = Vec::new();
        let mut left_behind = Vec::new();
        for (id, direction) in candidates {
            if direction != heading || self.onboard.len() >= self.capacity {
                left_behind.push(direction);
                continue;
            }
            let Some(mut passenger) = floor.remove(id) else {
                continue;
            };
            passenger.board();
            let waited = now.saturating_sub(passenger.waiting_since);
            self.queue.push(passenger.destination);
            self.onboard.push(passenger);
            self.passengers_carried += 1;
            boarded.push(id);
            sink.record(&SimEvent::PassengerBoarded {
                elevator: self.id,
                passenger: id,
                floor: here,
                waited,
            });
        }

        if !left_behind.is_empty() {
            for direction in &left_behind {
                floor.register_call(*direction);
            }
            sink.record(&SimEvent::PassengersLeftBehind {
                elevator: self.id,
                floor: here,
                count: left_behind.len(),
            });
        }

        let cost = self.timing.passenger_transfer * boarded.len() as u32;
        self.busy_time += cost;
        PhaseOutcome {
            dropped: Vec::new(),
            boarded,
            left_behind: left_behind.len(),
            cost,
        }
    }

    /// Close the door and take the current floor off the queue
    pub fn close_door(&mut self, sink: &dyn EventSink) -> Duration {
        self.busy_time += self.timing.door_delay;
        self.queue.remove_item(&self.current_floor);
        sink.record(&SimEvent::DoorClosed {
            elevator: self.id,
            floor: self.current_floor,
        });
        self.timing.door_delay
    }

    /// Move one floor toward `next_floor`, or go idle when nothing is queued
    pub fn advance(&mut self, sink: &dyn EventSink) -> Movement {
        let Some(target) = self.next_floor() else {
            self.direction = Direction::Idle;
            self.state = ElevatorState::Idle;
            self.available = true;
            sink.record(&SimEvent::ElevatorIdle {
                elevator: self.id,
                floor: self.current_floor,
            });
            return Movement::Idle;
        };

        if target == self.current_floor {
            return Movement::Arrived {
                floor: target,
                cost: Duration::ZERO,
            };
        }

        let direction = Direction::toward(self.current_floor, target);
        let from = self.current_floor;
        self.direction = direction;
        self.state = ElevatorState::Moving;
        self.current_floor += direction.step();
        self.floors_travelled += 1;
        self.busy_time += self.timing.floor_travel;
        sink.record(&SimEvent::ElevatorMoved {
            elevator: self.id,
            from,
            to: self.current_floor,
        });

        let cost = self.timing.floor_travel;
        if self.has_queued(self.current_floor) {
            Movement::Arrived {
                floor: self.current_floor,
                cost,
            }
        } else {
            Movement::Passing {
                floor: self.current_floor,
                cost,
            }
        }
    }

    /// Run one phase of a stop at the current floor. Only `Load` touches
    /// the floor, locking it after the car.
    pub fn run_phase(
        &mut self,
        phase: StopPhase,
        floors: &FloorRegistry,
        now: Duration,
        sink: &dyn EventSink,
    ) -> SimResult<PhaseOutcome> {
        let outcome = match phase {
            StopPhase::OpenDoor => PhaseOutcome {
                cost: self.open_door(sink),
                ..PhaseOutcome::default()
            },
            StopPhase::Unload => {
                let (dropped, cost) = self.unload(sink);
                PhaseOutcome {
                    dropped,
                    cost,
                    ..PhaseOutcome::default()
                }
            }
            StopPhase::Load => {
                let mut floor = floors.get(self.current_floor)?.lock();
                self.load(&mut floor, now, sink)
            }
            StopPhase::CloseDoor => PhaseOutcome {
                cost: self.close_door(sink),
                ..PhaseOutcome::default()
            },
        };
        Ok(outcome)
    }

    /// One full stop at the current floor without suspending between
    /// phases. Dropped passengers are left on the floor for the caller to
    /// run their drop callback.
    pub fn execute_floor_move(
        &mut self,
        floors: &FloorRegistry,
        now: Duration,
        sink: &dyn EventSink,
    ) -> SimResult<StopReport> {
        let here = self.current_floor;
        let floor_lock = floors.get(here)?;
        let mut report = StopReport {
            floor: here,
            dropped: Vec::new(),
            boarded: Vec::new(),
            left_behind: 0,
            cost: Duration::ZERO,
        };

        for phase in StopPhase::SEQUENCE {
            let outcome = self.run_phase(phase, floors, now, sink)?;
            if !outcome.dropped.is_empty() {
                let mut floor = floor_lock.lock();
                for passenger in outcome.dropped {
                    report.dropped.push(passenger.id);
                    floor.add(passenger);
                }
            }
            report.boarded.extend(outcome.boarded);
            report.left_behind += outcome.left_behind;
            report.cost += outcome.cost;
        }
        Ok(report)
    }

    /// Serve the queue to exhaustion without suspending. Wait times are
    /// measured against the car's own accrued busy time.
    pub fn run_until_idle(
        &mut self,
        floors: &FloorRegistry,
        sink: &dyn EventSink,
    ) -> SimResult<Vec<StopReport>> {
        let mut reports = Vec::new();
        loop {
            match self.advance(sink) {
                Movement::Passing { .. } => continue,
                Movement::Arrived { .. } => {
                    let now = self.busy_time;
                    reports.push(self.execute_floor_move(floors, now, sink)?);
                }
                Movement::Idle => return Ok(reports),
            }
        }
    }
}
