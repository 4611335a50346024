//! Fleet controller
//!
//! Collects floor calls into a waiting set and binds each one to a single
//! elevator through the active policy. Only the dispatch activity mutates
//! `waiting` and `queued`.

use log::warn;
use parking_lot::Mutex;
use std::collections::BTreeSet;

use super::elevator::{Elevator, ElevatorSnapshot};
use super::error::SimResult;
use super::events::{EventSink, SimEvent};
use super::floor::FloorRegistry;
use super::policy::{policy_from_name, DispatchPolicy};
use super::types::{ElevatorId, FloorNumber};

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Floors moved into the waiting set by this tick's scan
    pub collected: Vec<FloorNumber>,
    pub assigned: Vec<(FloorNumber, ElevatorId)>,
    /// Left waiting because no elevator qualified
    pub deferred: Vec<FloorNumber>,
    pub dropped: Vec<FloorNumber>,
}

pub struct Dispatcher {
    policy: Box<dyn DispatchPolicy>,
    waiting: BTreeSet<FloorNumber>,
    /// Floors committed to some elevator and still in its queue
    queued: BTreeSet<FloorNumber>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("policy", &self.policy.name())
            .field("waiting", &self.waiting)
            .field("queued", &self.queued)
            .finish()
    }
}

impl Dispatcher {
    /// Fails with `UnsupportedPolicy` for an unknown name
    pub fn new(policy: &str) -> SimResult<Self> {
        Ok(Self::with_policy(policy_from_name(policy)?))
    }

    pub fn with_policy(policy: Box<dyn DispatchPolicy>) -> Self {
        Self {
            policy,
            waiting: BTreeSet::new(),
            queued: BTreeSet::new(),
        }
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    pub fn waiting(&self) -> Vec<FloorNumber> {
        self.waiting.iter().copied().collect()
    }

    pub fn queued(&self) -> Vec<FloorNumber> {
        self.queued.iter().copied().collect()
    }

    /// Put a call straight into the waiting set, bypassing the floor scan.
    /// Returns `false` if it is already waiting or committed.
    pub fn submit(&mut self, floor: FloorNumber) -> bool {
        if self.queued.contains(&floor) {
            return false;
        }
        self.waiting.insert(floor)
    }

    /// One dispatch round.
    ///
    /// 1. Forget commitments the fleet has already served.
    /// 2. Move called floors, and floors still holding passengers nobody
    ///    is coming for, into the waiting set. Call flags are cleared.
    /// 3. Drain the waiting set in ascending floor order, asking the policy
    ///    for each call. Unassigned calls stay waiting for the next tick;
    ///    calls an elevator rejects as out of bounds are dropped.
    pub fn tick(
        &mut self,
        floors: &FloorRegistry,
        fleet: &[Mutex<Elevator>],
        sink: &dyn EventSink,
    ) -> TickReport {
        let mut report = TickReport::default();

        let committed: BTreeSet<FloorNumber> =
            fleet.iter().flat_map(|car| car.lock().queue()).collect();
        self.queued.retain(|floor| committed.contains(floor));

        for floor_lock in floors.iter() {
            let (number, wanted) = {
                let mut floor = floor_lock.lock();
                let called = floor.take_calls();
                (floor.number, called || floor.has_pending_pickups())
            };
            if wanted && !self.queued.contains(&number) && self.waiting.insert(number) {
                report.collected.push(number);
            }
        }

        while let Some(floor) = self.waiting.pop_first() {
            if self.queued.contains(&floor) {
                continue;
            }

            let snapshots: Vec<ElevatorSnapshot> =
                fleet.iter().map(|car| car.lock().snapshot()).collect();
            let Some(id) = self.policy.assign(floor, &snapshots) else {
                report.deferred.push(floor);
                sink.record(&SimEvent::CallDeferred { floor });
                continue;
            };
            let Some(car) = fleet.get(id.0) else {
                warn!("Policy {} chose unknown elevator {id}", self.policy.name());
                report.deferred.push(floor);
                continue;
            };

            let outcome = car.lock().call(floor, true);
            match outcome {
                Ok(_) => {
                    self.queued.insert(floor);
                    report.assigned.push((floor, id));
                    sink.record(&SimEvent::CallAssigned { floor, elevator: id });
                }
                Err(e) => {
                    report.dropped.push(floor);
                    sink.record(&SimEvent::CallDropped {
                        floor,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.waiting.extend(report.deferred.iter().copied());
        report
    }

    /// No call waiting and no elevator with a stop left to serve
    pub fn is_quiescent(&self, fleet: &[Mutex<Elevator>]) -> bool {
        self.waiting.is_empty() && fleet.iter().all(|car| !car.lock().has_pending_stops())
    }
}
