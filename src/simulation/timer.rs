//! Simulated time, suspension and the delay service
//!
//! Simulated durations are scaled to wall-clock time by `time_scale`. Every
//! suspension waits on the stop channel with a timeout, so a stopped run
//! wakes all sleepers at once.

use anyhow::{Context, Result};
use crossbeam_channel::{at, never, select, unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Broadcast stop flag.
///
/// Nothing is ever sent on the channel; `trigger` drops the only sender and
/// every receiver observes the disconnect.
#[derive(Debug, Clone)]
pub struct StopSignal {
    sender: Arc<Mutex<Option<Sender<()>>>>,
    receiver: Receiver<()>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            receiver,
        }
    }

    pub fn trigger(&self) {
        self.sender.lock().take();
    }

    pub fn is_triggered(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Becomes ready (with an error) once the signal is triggered
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

#[derive(Debug, Clone)]
pub struct SimClock {
    start: Instant,
    scale: f64,
    stop: StopSignal,
}

impl SimClock {
    /// `scale` is real seconds per simulated second and must be positive
    pub fn new(scale: f64, stop: StopSignal) -> Self {
        Self {
            start: Instant::now(),
            scale,
            stop,
        }
    }

    pub fn real(&self, simulated: Duration) -> Duration {
        simulated.mul_f64(self.scale)
    }

    /// Simulated time since the clock was created
    pub fn now(&self) -> Duration {
        self.start.elapsed().div_f64(self.scale)
    }

    /// Suspend the calling thread for a simulated duration.
    /// Returns `false` if the run was stopped before or during the wait.
    pub fn pause(&self, simulated: Duration) -> bool {
        if self.stop.is_triggered() {
            return false;
        }
        if simulated.is_zero() {
            return true;
        }
        select! {
            recv(self.stop.receiver()) -> _ => false,
            default(self.real(simulated)) => true,
        }
    }
}

pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Runs actions after a simulated delay on one background thread.
///
/// Scheduling never blocks the caller. Pending actions are dropped
/// unexecuted when the run stops.
#[derive(Clone)]
pub struct Timer {
    requests: Sender<(Instant, Action)>,
    scale: f64,
}

impl Timer {
    pub fn spawn(scale: f64, stop: StopSignal) -> Result<(Self, JoinHandle<()>)> {
        let (requests, incoming) = unbounded();
        let handle = thread::Builder::new()
            .name("timer".into())
            .spawn(move || run_timer(incoming, stop))
            .context("failed to spawn timer thread")?;
        Ok((Self { requests, scale }, handle))
    }

    /// Schedule `action` to run once `delay` of simulated time has passed.
    /// Returns `false` if the timer thread is gone.
    pub fn after(&self, delay: Duration, action: Action) -> bool {
        let due = Instant::now() + delay.mul_f64(self.scale);
        self.requests.send((due, action)).is_ok()
    }
}

fn run_timer(incoming: Receiver<(Instant, Action)>, stop: StopSignal) {
    let mut deadlines: BinaryHeap<Reverse<(Instant, u64)>> = BinaryHeap::new();
    let mut pending: HashMap<u64, Action> = HashMap::new();
    let mut next_seq = 0u64;

    loop {
        let wake = match deadlines.peek() {
            Some(Reverse((due, _))) => at(*due),
            None => never(),
        };

        select! {
            recv(incoming) -> msg => match msg {
                Ok((due, action)) => {
                    deadlines.push(Reverse((due, next_seq)));
                    pending.insert(next_seq, action);
                    next_seq += 1;
                }
                Err(_) => break,
            },
            recv(stop.receiver()) -> _ => break,
            recv(wake) -> _ => {},
        }

        let now = Instant::now();
        while let Some(Reverse((due, seq))) = deadlines.peek().copied() {
            if due > now {
                break;
            }
            deadlines.pop();
            if let Some(action) = pending.remove(&seq) {
                action();
            }
        }
    }
}
