//! A deterministic, single-threaded discrete-event executor.
//!
//! Actors are futures pinned to a host. The engine polls ready actors in the order they were
//! woken; once none is ready it advances the simulated clock to the earliest pending event,
//! which is either a timer or a phase change of an in-flight transfer.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context as TaskContext, Poll};

use futures::channel::oneshot;
use futures::task::{waker_ref, ArcWake};

use crate::platform::{HostId, Platform};
use crate::sim::comm::{Channel, Rendezvous};
use crate::sim::fluid::{Delivery, Fluid};
use crate::sim::meter::Meter;
use crate::units::{Flops, Joules, Nanosecs};

type BoxedActor = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Errors that end a run before every actor has finished.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// No actor can make progress and no event is pending.
    #[error("simulation stalled at {at} with blocked actors {blocked:?}")]
    Stalled {
        at: Nanosecs,
        blocked: Vec<String>,
        unmatched: Vec<Unmatched>,
    },

    /// An actor waits for a time the simulated clock cannot represent.
    #[error("simulated clock overflowed after {at} with running actors {blocked:?}")]
    ClockOverflow { at: Nanosecs, blocked: Vec<String> },

    /// The next event lies past the configured deadline.
    #[error("simulation passed its deadline of {deadline} with running actors {blocked:?}")]
    DeadlineExceeded {
        deadline: Nanosecs,
        blocked: Vec<String>,
    },
}

/// Operations left waiting on a channel when a run stalls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unmatched {
    pub channel: String,
    pub sends: usize,
    pub receives: usize,
}

/// A timer waiting for the clock to reach `at`.
#[derive(Debug)]
struct Alarm {
    at: Nanosecs,
    seq: u64,
    fire: oneshot::Sender<()>,
}

impl PartialEq for Alarm {
    fn eq(&self, other: &Self) -> bool {
        (self.at, self.seq) == (other.at, other.seq)
    }
}

impl Eq for Alarm {}

impl PartialOrd for Alarm {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Alarm {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq))
    }
}

/// Mutable simulation state shared by the engine and every actor.
#[derive(Debug)]
pub(crate) struct State {
    now: Nanosecs,
    next_seq: u64,
    alarms: BinaryHeap<Reverse<Alarm>>,
    pub(crate) channels: Vec<Rendezvous>,
    fluid: Fluid,
    meter: Meter,
}

impl State {
    fn schedule(&mut self, at: Nanosecs) -> oneshot::Receiver<()> {
        let (fire, rx) = oneshot::channel();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.alarms.push(Reverse(Alarm { at, seq, fire }));
        rx
    }

    /// Starts moving a matched payload from `from` to `to`.
    pub(crate) fn start_transfer(
        &mut self,
        platform: &Platform,
        from: HostId,
        to: HostId,
        delivery: Delivery,
    ) {
        match platform.route(from, to) {
            Some(route) => self.fluid.start(platform, route, delivery),
            None => {
                // Dropping the delivery leaves both sides waiting forever; the run then stalls
                log::warn!(
                    "no route from {} to {}, flow {} is never delivered",
                    platform.host(from).name,
                    platform.host(to).name,
                    delivery.payload.flow()
                );
            }
        }
    }

    fn unmatched(&self) -> Vec<Unmatched> {
        self.channels
            .iter()
            .filter(|c| !c.sends.is_empty() || !c.recvs.is_empty())
            .map(|c| Unmatched {
                channel: c.name.clone(),
                sends: c.sends.len(),
                receives: c.recvs.len(),
            })
            .collect()
    }
}

#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) platform: Arc<Platform>,
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.lock())
    }
}

type ReadyQueue = Arc<Mutex<VecDeque<Arc<Task>>>>;

struct Task {
    name: String,
    actor: Mutex<Option<BoxedActor>>,
    queued: AtomicBool,
    ready: ReadyQueue,
}

impl Task {
    fn is_done(&self) -> bool {
        self.actor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if !arc_self.queued.swap(true, Ordering::AcqRel) {
            arc_self
                .ready
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Arc::clone(arc_self));
        }
    }
}

/// The handle an actor uses to interact with the simulation.
#[derive(Debug, Clone)]
pub struct Context {
    shared: Arc<Shared>,
    host: HostId,
}

impl Context {
    /// Current simulated time.
    pub fn now(&self) -> Nanosecs {
        self.shared.lock().now
    }

    /// The host this actor runs on.
    pub fn host(&self) -> HostId {
        self.host
    }

    /// Suspends the actor for `duration` of simulated time.
    pub async fn sleep(&self, duration: Nanosecs) {
        let fired = self.shared.with_state(|state| {
            let at = state.now.saturating_add(duration);
            state.schedule(at)
        });
        // A dropped alarm means the engine is gone and the actor never resumes
        if fired.await.is_err() {
            futures::future::pending::<()>().await;
        }
    }

    /// Runs `flops` of computation on one core of this actor's host. The host counts as busy
    /// for the whole duration.
    pub async fn execute(&self, flops: Flops) {
        let speed = self.shared.platform.host(self.host).speed;
        let duration = Nanosecs::from_secs_f64(flops.into_f64() / speed.into_f64());
        self.shared
            .with_state(|state| state.meter.begin_execution(self.host));
        self.sleep(duration).await;
        self.shared
            .with_state(|state| state.meter.end_execution(self.host));
    }
}

/// Retrieves an actor's result once the run is over.
#[derive(Debug)]
pub struct Handle<T> {
    output: oneshot::Receiver<T>,
}

impl<T> Handle<T> {
    /// Returns the actor's result, or `None` if it did not finish.
    pub fn join(mut self) -> Option<T> {
        self.output.try_recv().ok().flatten()
    }
}

/// The discrete-event engine. Consumed by [`Engine::run`].
pub struct Engine {
    shared: Arc<Shared>,
    tasks: Vec<Arc<Task>>,
    ready: ReadyQueue,
    deadline: Option<Nanosecs>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tasks", &self.tasks.iter().map(|t| &t.name).collect::<Vec<_>>())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Engine {
    pub fn new(platform: Arc<Platform>) -> Self {
        let state = State {
            now: Nanosecs::ZERO,
            next_seq: 0,
            alarms: BinaryHeap::new(),
            channels: Vec::new(),
            fluid: Fluid::default(),
            meter: Meter::new(&platform),
        };
        Self {
            shared: Arc::new(Shared {
                platform,
                state: Mutex::new(state),
            }),
            tasks: Vec::new(),
            ready: Arc::new(Mutex::new(VecDeque::new())),
            deadline: None,
        }
    }

    /// Bounds the run: it fails once the next event would happen after `deadline`.
    pub fn with_deadline(mut self, deadline: Option<Nanosecs>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn platform(&self) -> &Platform {
        &self.shared.platform
    }

    /// Creates a rendezvous channel. The name only labels logs and errors.
    pub fn channel(&mut self, name: &str) -> Channel {
        let index = self.shared.with_state(|state| {
            state.channels.push(Rendezvous::new(name.to_owned()));
            state.channels.len() - 1
        });
        Channel::new(index, name, Arc::clone(&self.shared))
    }

    /// Spawns an actor on `host`. It first runs when [`Engine::run`] is called.
    ///
    /// PRECONDITION: `host` was issued by this engine's platform.
    pub fn spawn<F, Fut, T>(&mut self, name: &str, host: HostId, f: F) -> Handle<T>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let ctx = Context {
            shared: Arc::clone(&self.shared),
            host,
        };
        let fut = f(ctx);
        let (tx, output) = oneshot::channel();
        let actor: BoxedActor = Box::pin(async move {
            let out = fut.await;
            // The handle may have been dropped
            let _ = tx.send(out);
        });
        let task = Arc::new(Task {
            name: name.to_owned(),
            actor: Mutex::new(Some(actor)),
            queued: AtomicBool::new(false),
            ready: Arc::clone(&self.ready),
        });
        ArcWake::wake_by_ref(&task);
        self.tasks.push(task);
        log::debug!(
            "spawned actor {name} on {}",
            self.shared.platform.host(host).name
        );
        Handle { output }
    }

    /// Runs until every actor has finished.
    pub fn run(self) -> Result<Settled, SimError> {
        let platform = Arc::clone(&self.shared.platform);
        loop {
            self.poll_ready();
            if self.tasks.iter().all(|t| t.is_done()) {
                break;
            }
            let fired = {
                let mut guard = self.shared.lock();
                let state = &mut *guard;
                let next_alarm = state.alarms.peek().map(|Reverse(a)| a.at);
                let next_transfer = state
                    .fluid
                    .next_event()
                    .map(|dt| state.now.saturating_add(dt));
                let next = match (next_alarm, next_transfer) {
                    (Some(a), Some(t)) => a.min(t),
                    (Some(a), None) => a,
                    (None, Some(t)) => t,
                    (None, None) => {
                        return Err(SimError::Stalled {
                            at: state.now,
                            blocked: self.blocked(),
                            unmatched: state.unmatched(),
                        })
                    }
                };
                if next == Nanosecs::MAX {
                    return Err(SimError::ClockOverflow {
                        at: state.now,
                        blocked: self.blocked(),
                    });
                }
                if let Some(deadline) = self.deadline {
                    if next > deadline {
                        return Err(SimError::DeadlineExceeded {
                            deadline,
                            blocked: self.blocked(),
                        });
                    }
                }
                let dt = next - state.now;
                let usage = state.fluid.link_usage();
                state.meter.accumulate(&platform, dt, &usage);
                state.fluid.advance(&platform, dt);
                state.now = next;
                log::trace!("clock advanced to {next}");
                let mut fired = Vec::new();
                while let Some(Reverse(alarm)) = state.alarms.peek() {
                    if alarm.at > next {
                        break;
                    }
                    if let Some(Reverse(alarm)) = state.alarms.pop() {
                        fired.push(alarm.fire);
                    }
                }
                fired
            };
            // Wakes must happen with the state unlocked
            for fire in fired {
                let _ = fire.send(());
            }
        }
        let (now, meter) = {
            let state = self.shared.lock();
            (state.now, state.meter.clone())
        };
        log::debug!("all actors finished at {now}");
        Ok(Settled {
            platform,
            meter,
            clock: now,
        })
    }

    fn poll_ready(&self) {
        loop {
            let next = self
                .ready
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(task) = next else {
                break;
            };
            task.queued.store(false, Ordering::Release);
            let mut actor = task.actor.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(fut) = actor.as_mut() else {
                continue;
            };
            let waker = waker_ref(&task);
            let mut cx = TaskContext::from_waker(&waker);
            if fut.as_mut().poll(&mut cx).is_ready() {
                log::debug!("actor {} finished", task.name);
                *actor = None;
            }
        }
    }

    fn blocked(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| !t.is_done())
            .map(|t| t.name.clone())
            .collect()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Unfinished actors hold wakers that point back at their own tasks
        for task in &self.tasks {
            task.actor
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
        self.ready
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// A finished run. Holds the final clock and every energy counter.
#[derive(Debug, Clone)]
pub struct Settled {
    platform: Arc<Platform>,
    meter: Meter,
    clock: Nanosecs,
}

impl Settled {
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Simulated time at which the last actor finished.
    pub fn clock(&self) -> Nanosecs {
        self.clock
    }

    /// Energy consumed by a host or router, looked up by name.
    pub fn host_energy(&self, name: &str) -> Option<Joules> {
        self.platform
            .host_id(name)
            .map(|id| self.meter.host_energy(id))
    }

    /// Energy consumed by a link, looked up by name.
    pub fn link_energy(&self, name: &str) -> Option<Joules> {
        self.platform
            .link_id(name)
            .map(|id| self.meter.link_energy(id))
    }
}
