//! Run statistics
//!
//! `StatsRecorder` sits in front of the real event sink and tallies events as
//! they pass through. The final `SimulationReport` is logged in the same
//! block format as the headless runner has always used.

use log::info;
use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::elevator::Elevator;
use super::events::{EventSink, SimEvent};
use super::types::ElevatorId;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationStats {
    pub passengers_spawned: u64,
    pub trips_completed: u64,
    pub passengers_exited: u64,
    pub redecisions: u64,
    pub calls_assigned: u64,
    pub calls_deferred: u64,
    pub calls_dropped: u64,
    /// Seconds from call registration to boarding, one sample per boarding
    pub wait_samples: Vec<OrderedFloat<f64>>,
}

impl SimulationStats {
    pub fn observe(&mut self, event: &SimEvent) {
        match event {
            SimEvent::PassengerSpawned { .. } => self.passengers_spawned += 1,
            SimEvent::PassengerDropped { .. } => self.trips_completed += 1,
            SimEvent::PassengerExited { .. } => self.passengers_exited += 1,
            SimEvent::PassengerRedecided { .. } => self.redecisions += 1,
            SimEvent::CallAssigned { .. } => self.calls_assigned += 1,
            SimEvent::CallDeferred { .. } => self.calls_deferred += 1,
            SimEvent::CallDropped { .. } => self.calls_dropped += 1,
            SimEvent::PassengerBoarded { waited, .. } => {
                self.wait_samples.push(OrderedFloat(waited.as_secs_f64()))
            }
            _ => {}
        }
    }

    pub fn mean_wait(&self) -> f64 {
        if self.wait_samples.is_empty() {
            return 0.0;
        }
        self.wait_samples.iter().map(|w| w.0).sum::<f64>() / self.wait_samples.len() as f64
    }

    pub fn max_wait(&self) -> f64 {
        self.wait_samples.iter().max().map_or(0.0, |w| w.0)
    }

    /// Nearest-rank percentile, `p` in `[0, 1]`
    pub fn percentile_wait(&self, p: f64) -> f64 {
        if self.wait_samples.is_empty() {
            return 0.0;
        }
        let mut sorted = self.wait_samples.clone();
        sorted.sort();
        let rank = (p.clamp(0.0, 1.0) * sorted.len() as f64).ceil() as usize;
        sorted[rank.saturating_sub(1).min(sorted.len() - 1)].0
    }
}

/// Counts events, then forwards them to `inner`
pub struct StatsRecorder {
    inner: Arc<dyn EventSink>,
    stats: Mutex<SimulationStats>,
}

impl StatsRecorder {
    pub fn new(inner: Arc<dyn EventSink>) -> Self {
        Self {
            inner,
            stats: Mutex::new(SimulationStats::default()),
        }
    }

    pub fn snapshot(&self) -> SimulationStats {
        self.stats.lock().clone()
    }
}

impl EventSink for StatsRecorder {
    fn record(&self, event: &SimEvent) {
        self.stats.lock().observe(event);
        self.inner.record(event);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElevatorStats {
    pub id: ElevatorId,
    pub stops: usize,
    pub floors_travelled: usize,
    pub passengers_carried: usize,
    pub busy_time: Duration,
}

impl From<&Elevator> for ElevatorStats {
    fn from(car: &Elevator) -> Self {
        Self {
            id: car.id,
            stops: car.stops(),
            floors_travelled: car.floors_travelled(),
            passengers_carried: car.passengers_carried(),
            busy_time: car.busy_time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    /// `false` when the stop signal ended the run early
    pub completed: bool,
    pub policy: String,
    pub seed: u64,
    /// Simulated time the run took
    pub elapsed: Duration,
    pub active_passengers: usize,
    pub stats: SimulationStats,
    pub elevators: Vec<ElevatorStats>,
}

impl SimulationReport {
    pub fn throughput_per_minute(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.stats.trips_completed as f64 / minutes
        } else {
            0.0
        }
    }

    pub fn log(&self) {
        if self.completed {
            info!("=== SIMULATION COMPLETE ===");
        } else {
            info!("=== SIMULATION STOPPED ===");
        }
        info!("Policy: {} (seed {})", self.policy, self.seed);
        info!("Elapsed time: {:.2}s", self.elapsed.as_secs_f64());
        info!("Total passengers spawned: {}", self.stats.passengers_spawned);
        info!("Total trips completed: {}", self.stats.trips_completed);
        info!("Passengers exited: {}", self.stats.passengers_exited);
        info!("Active passengers: {}", self.active_passengers);
        info!("Redecisions: {}", self.stats.redecisions);
        info!(
            "Calls assigned: {}, deferred: {}, dropped: {}",
            self.stats.calls_assigned, self.stats.calls_deferred, self.stats.calls_dropped
        );
        info!("Mean wait: {:.2}s", self.stats.mean_wait());
        info!("Max wait: {:.2}s", self.stats.max_wait());
        info!("P95 wait: {:.2}s", self.stats.percentile_wait(0.95));
        info!("Throughput: {:.2} trips/min", self.throughput_per_minute());
        for car in &self.elevators {
            info!(
                "Elevator {}: {} stops, {} floors travelled, {} passengers carried, busy {:.2}s",
                car.id,
                car.stops,
                car.floors_travelled,
                car.passengers_carried,
                car.busy_time.as_secs_f64()
            );
        }
    }
}
