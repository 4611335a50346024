//! Building orchestrator
//!
//! Owns every floor and elevator and runs the simulation as a set of
//! threads: one passenger generator, one dispatch loop, one driver per
//! elevator and the timer thread for passenger decision delays. They share
//! state only through `SimContext`.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{select, unbounded, Receiver, Sender};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::config::SimConfig;
use super::dispatcher::Dispatcher;
use super::elevator::{Elevator, Movement, StopPhase};
use super::error::{SimError, SimResult};
use super::events::{EventSink, SimEvent};
use super::floor::FloorRegistry;
use super::passenger::{DropOutcome, Passenger};
use super::probability::ProbabilityModel;
use super::stats::{ElevatorStats, SimulationReport, StatsRecorder};
use super::timer::{SimClock, StopSignal, Timer};
use super::types::{ElevatorId, FloorNumber, PassengerId};

/// Attempts at drawing a valid trip before giving up on a passenger
const MAX_TRIP_ATTEMPTS: usize = 16;

/// Passengers currently inside the simulation
#[derive(Debug, Default)]
pub struct Population {
    alive: Mutex<HashSet<PassengerId>>,
    generated: AtomicU64,
    generation_done: AtomicBool,
}

impl Population {
    pub fn spawn(&self, id: PassengerId) {
        self.alive.lock().insert(id);
        self.generated.fetch_add(1, Ordering::SeqCst);
    }

    /// Remove a passenger for good. Returns `false` if it was not alive.
    pub fn retire(&self, id: PassengerId) -> bool {
        self.alive.lock().remove(&id)
    }

    pub fn alive(&self) -> usize {
        self.alive.lock().len()
    }

    pub fn generated(&self) -> u64 {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn finish_generation(&self) {
        self.generation_done.store(true, Ordering::SeqCst);
    }

    pub fn is_generation_done(&self) -> bool {
        self.generation_done.load(Ordering::SeqCst)
    }
}

/// Everything the simulation threads share
pub struct SimContext {
    pub config: SimConfig,
    pub seed: u64,
    pub floors: FloorRegistry,
    pub fleet: Vec<Mutex<Elevator>>,
    pub trip_model: ProbabilityModel,
    pub population: Population,
    pub clock: SimClock,
    pub stop: StopSignal,
    recorder: Arc<StatsRecorder>,
    timer: Timer,
    dispatch_notify: Sender<()>,
    wakes: Vec<Sender<()>>,
    completed: AtomicBool,
}

impl SimContext {
    pub fn sink(&self) -> &dyn EventSink {
        self.recorder.as_ref()
    }

    fn notify_dispatcher(&self) {
        // The dispatch loop may already be gone at shutdown
        let _ = self.dispatch_notify.send(());
    }
}

pub struct Building {
    config: SimConfig,
    seed: u64,
    floors: FloorRegistry,
    fleet: Vec<Mutex<Elevator>>,
    dispatcher: Dispatcher,
    trip_model: ProbabilityModel,
    recorder: Arc<StatsRecorder>,
    stop: StopSignal,
}

impl Building {
    /// Validate `config` and set up floors, fleet and dispatcher.
    /// Events go to `sink`.
    pub fn new(config: SimConfig, sink: Arc<dyn EventSink>) -> SimResult<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(&config.policy)?;

        let min = config.min_floor;
        let max = config.max_floor();
        let trip_model = ProbabilityModel::lobby_biased(min, max, config.terminal_floor)?;
        let available = trip_model.support_len();
        if available < 2 {
            return Err(SimError::ExhaustedDomain {
                requested: 2,
                available,
            });
        }

        let fleet = (0..config.elevators)
            .map(|i| {
                Elevator::new(
                    ElevatorId(i),
                    config.capacity,
                    min,
                    max,
                    config.terminal_floor,
                    config.timing,
                )
                .map(Mutex::new)
            })
            .collect::<SimResult<Vec<_>>>()?;

        let seed = config.seed.unwrap_or_else(|| rand::rng().random());

        Ok(Self {
            floors: FloorRegistry::new(min, max),
            fleet,
            dispatcher,
            trip_model,
            recorder: Arc::new(StatsRecorder::new(sink)),
            stop: StopSignal::new(),
            seed,
            config,
        })
    }

    /// Triggering the returned signal halts every activity of a running
    /// simulation; `run` then returns a report marked as not completed.
    pub fn stop_handle(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run until every generated passenger has left through the terminal
    /// floor, or until stopped.
    pub fn run(self) -> Result<SimulationReport> {
        let Building {
            config,
            seed,
            floors,
            fleet,
            dispatcher,
            trip_model,
            recorder,
            stop,
        } = self;

        info!(
            "Starting simulation: {} floors, {} elevators, {} passengers, policy {}, seed {}",
            config.floors,
            config.elevators,
            config.passengers,
            dispatcher.policy_name(),
            seed
        );

        let (timer, timer_handle) = Timer::spawn(config.time_scale, stop.clone())?;
        let (dispatch_notify, notify_rx) = unbounded();
        let (wakes, wake_rxs): (Vec<Sender<()>>, Vec<Receiver<()>>) =
            (0..fleet.len()).map(|_| unbounded()).unzip();

        let ctx = Arc::new(SimContext {
            clock: SimClock::new(config.time_scale, stop.clone()),
            config,
            seed,
            floors,
            fleet,
            trip_model,
            population: Population::default(),
            stop,
            recorder,
            timer,
            dispatch_notify,
            wakes,
            completed: AtomicBool::new(false),
        });

        let handles = match spawn_activities(&ctx, dispatcher, notify_rx, wake_rxs) {
            Ok(handles) => handles,
            Err(e) => {
                ctx.stop.trigger();
                return Err(e);
            }
        };

        let mut failure = None;
        for handle in handles {
            let outcome = handle
                .join()
                .map_err(|_| anyhow!("simulation thread panicked"))
                .and_then(|result| result);
            if let Err(e) = outcome {
                failure.get_or_insert(e);
            }
        }

        ctx.stop.trigger();
        timer_handle
            .join()
            .map_err(|_| anyhow!("timer thread panicked"))?;

        if let Some(e) = failure {
            return Err(e);
        }
        Ok(build_report(&ctx))
    }
}

fn build_report(ctx: &SimContext) -> SimulationReport {
    SimulationReport {
        completed: ctx.completed.load(Ordering::SeqCst),
        policy: ctx.config.policy.clone(),
        seed: ctx.seed,
        elapsed: ctx.clock.now(),
        active_passengers: ctx.population.alive(),
        stats: ctx.recorder.snapshot(),
        elevators: ctx
            .fleet
            .iter()
            .map(|car| ElevatorStats::from(&*car.lock()))
            .collect(),
    }
}

fn spawn_activities(
    ctx: &Arc<SimContext>,
    dispatcher: Dispatcher,
    notify: Receiver<()>,
    wakes: Vec<Receiver<()>>,
) -> Result<Vec<JoinHandle<Result<()>>>> {
    let mut handles = vec![spawn_activity("dispatcher", ctx, move |ctx| {
        dispatch_loop(ctx, dispatcher, notify)
    })?];
    for (index, wake) in wakes.into_iter().enumerate() {
        handles.push(spawn_activity(&format!("elevator-{index}"), ctx, move |ctx| {
            drive_elevator(ctx, index, wake)
        })?);
    }
    handles.push(spawn_activity("generator", ctx, generate_passengers)?);
    Ok(handles)
}

/// Spawn a named thread. A failing activity stops the whole run.
fn spawn_activity<F>(
    name: &str,
    ctx: &Arc<SimContext>,
    body: F,
) -> Result<JoinHandle<Result<()>>>
where
    F: FnOnce(&Arc<SimContext>) -> Result<()> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    let label = name.to_string();
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let result = body(&ctx);
            if let Err(e) = &result {
                warn!("{label} failed: {e:#}");
                ctx.stop.trigger();
            }
            result
        })
        .with_context(|| format!("failed to spawn {name} thread"))
}

fn generate_passengers(ctx: &Arc<SimContext>) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(ctx.seed);

    for n in 0..ctx.config.passengers {
        if ctx.stop.is_triggered() {
            break;
        }
        let passenger = new_passenger(ctx, PassengerId(n as u64), &mut rng)
            .context("failed to generate passenger")?;
        admit(ctx, passenger)?;

        let gap = ctx.config.arrival_gap.sample(&mut rng);
        if !ctx.clock.pause(gap) {
            break;
        }
    }

    ctx.population.finish_generation();
    ctx.notify_dispatcher();
    debug!("Passenger generation finished");
    Ok(())
}

/// Trips start at the terminal floor
fn new_passenger(ctx: &SimContext, id: PassengerId, rng: &mut StdRng) -> SimResult<Passenger> {
    let terminal = ctx.config.terminal_floor;
    for _ in 0..MAX_TRIP_ATTEMPTS {
        let picks = ctx.trip_model.sample_unique(rng, 2, Some(terminal))?;
        match Passenger::new(
            id,
            picks[0],
            picks[1],
            ctx.config.decision_delay,
            ctx.seed,
        ) {
            Err(SimError::InvalidTrip { .. }) => continue,
            other => return other,
        }
    }
    Err(SimError::InvalidTrip { origin: terminal })
}

fn admit(ctx: &SimContext, mut passenger: Passenger) -> Result<()> {
    let id = passenger.id;
    let origin = passenger.origin;
    let destination = passenger.destination;
    let direction = passenger
        .call_direction()
        .ok_or(SimError::InvalidTrip { origin })?;
    passenger.waiting_since = ctx.clock.now();

    ctx.population.spawn(id);
    {
        let mut floor = ctx.floors.get(origin)?.lock();
        floor.add(passenger);
        floor.register_call(direction);
    }

    ctx.sink().record(&SimEvent::PassengerSpawned {
        passenger: id,
        origin,
        destination,
    });
    ctx.sink().record(&SimEvent::CallRegistered {
        floor: origin,
        direction,
    });
    ctx.notify_dispatcher();
    Ok(())
}

fn dispatch_loop(
    ctx: &Arc<SimContext>,
    mut dispatcher: Dispatcher,
    notify: Receiver<()>,
) -> Result<()> {
    let interval = ctx.clock.real(ctx.config.dispatch_interval);

    loop {
        let report = dispatcher.tick(&ctx.floors, &ctx.fleet, ctx.sink());
        for (_, elevator) in &report.assigned {
            if let Some(wake) = ctx.wakes.get(elevator.0) {
                let _ = wake.send(());
            }
        }

        if ctx.population.is_generation_done()
            && ctx.population.alive() == 0
            && dispatcher.is_quiescent(&ctx.fleet)
        {
            info!(
                "All {} passengers left the building",
                ctx.population.generated()
            );
            ctx.completed.store(true, Ordering::SeqCst);
            ctx.stop.trigger();
            return Ok(());
        }

        select! {
            recv(notify) -> _ => {},
            recv(ctx.stop.receiver()) -> _ => return Ok(()),
            default(interval) => {},
        }
    }
}

fn drive_elevator(ctx: &Arc<SimContext>, index: usize, wake: Receiver<()>) -> Result<()> {
    let car = ctx
        .fleet
        .get(index)
        .with_context(|| format!("no elevator at index {index}"))?;

    loop {
        select! {
            recv(wake) -> msg => if msg.is_err() { return Ok(()) },
            recv(ctx.stop.receiver()) -> _ => return Ok(()),
        }
        while wake.try_recv().is_ok() {}

        if !serve_queue(ctx, car)? {
            return Ok(());
        }
    }
}

/// Move and stop until the queue is empty. `Ok(false)` when stopped.
fn serve_queue(ctx: &Arc<SimContext>, car: &Mutex<Elevator>) -> Result<bool> {
    loop {
        let movement = car.lock().advance(ctx.sink());
        match movement {
            Movement::Idle => return Ok(true),
            Movement::Passing { cost, .. } => {
                if !ctx.clock.pause(cost) {
                    return Ok(false);
                }
            }
            Movement::Arrived { cost, .. } => {
                if !ctx.clock.pause(cost) || !stop_at_floor(ctx, car)? {
                    return Ok(false);
                }
            }
        }
    }
}

/// Run the stop phases in order, suspending after each one with the car
/// unlocked so dispatch can keep adding stops.
fn stop_at_floor(ctx: &Arc<SimContext>, car: &Mutex<Elevator>) -> Result<bool> {
    for phase in StopPhase::SEQUENCE {
        let (here, outcome) = {
            let mut car = car.lock();
            let outcome = car.run_phase(phase, &ctx.floors, ctx.clock.now(), ctx.sink())?;
            (car.current_floor(), outcome)
        };
        for passenger in outcome.dropped {
            hand_off(ctx, here, passenger)?;
        }
        if !ctx.clock.pause(outcome.cost) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Drop callback: the passenger either leaves or is put on the floor to
/// decide on its next trip after its decision delay
fn hand_off(ctx: &Arc<SimContext>, floor: FloorNumber, mut passenger: Passenger) -> Result<()> {
    let id = passenger.id;
    match passenger.on_dropped(ctx.config.terminal_floor) {
        DropOutcome::Exited => {
            ctx.population.retire(id);
            ctx.sink().record(&SimEvent::PassengerExited {
                passenger: id,
                floor,
            });
        }
        DropOutcome::Redecide { delay } => {
            ctx.floors.get(floor)?.lock().add(passenger);
            let later = Arc::clone(ctx);
            if !ctx
                .timer
                .after(delay, Box::new(move || redecide(&later, floor, id)))
            {
                debug!("Timer gone, passenger {id} stays on floor {floor}");
            }
        }
    }
    Ok(())
}

fn redecide(ctx: &SimContext, floor_number: FloorNumber, id: PassengerId) {
    if ctx.stop.is_triggered() {
        return;
    }
    let Ok(floor_lock) = ctx.floors.get(floor_number) else {
        return;
    };

    let decided = {
        let mut floor = floor_lock.lock();
        let Some(passenger) = floor.get_mut(id) else {
            return;
        };
        let decided = passenger
            .redecide(&ctx.trip_model, ctx.clock.now())
            .map(|direction| (direction, passenger.destination));
        if let Ok((direction, _)) = decided {
            floor.register_call(direction);
        }
        decided
    };

    match decided {
        Ok((direction, destination)) => {
            ctx.sink().record(&SimEvent::PassengerRedecided {
                passenger: id,
                origin: floor_number,
                destination,
            });
            ctx.sink().record(&SimEvent::CallRegistered {
                floor: floor_number,
                direction,
            });
            ctx.notify_dispatcher();
        }
        Err(e) => warn!("Passenger {id} could not pick a new destination: {e}"),
    }
}
