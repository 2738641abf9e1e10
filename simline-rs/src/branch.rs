//! Script-branch scheduling.
//!
//! A script branch runs a block of commands on its own thread, but only one
//! thread evaluates at a time.  The thread that spawns or resumes a branch
//! blocks on the branch's yield channel until the branch either suspends
//! (a `wait-for-*` command) or finishes; a suspended branch blocks on its
//! resume channel until the host wakes it.  That handoff is the only
//! synchronisation between branches and the main evaluator.
//!
//! Simulated time is owned by the [`Scheduler`]; the host moves it forward
//! with [`Scheduler::advance_time`], which wakes time waiters in deadline
//! order.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::error::CliError;
use crate::script::value::Value;

// ── Messages ──────────────────────────────────────────────────────────────────

/// Sent to a suspended branch.
#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    Wake(Value),
    Interrupt,
}

/// Sent by a branch to whoever is driving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Yield {
    Suspended,
    Finished,
}

/// What a suspended branch is waiting for.
#[derive(Debug, Clone, PartialEq)]
pub enum Wait {
    /// Absolute simulated time, in seconds.
    Time(f64),
    Signal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BranchState {
    Running,
    Waiting(Wait),
}

impl fmt::Display for BranchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BranchState::Running => write!(f, "running"),
            BranchState::Waiting(Wait::Time(t)) => write!(f, "wait-for-time {t}"),
            BranchState::Waiting(Wait::Signal(s)) => write!(f, "wait-for-signal {s}"),
        }
    }
}

/// Snapshot of one branch for listings.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchInfo {
    pub id: u64,
    pub desc: String,
    pub state: BranchState,
}

// ── BranchLink ────────────────────────────────────────────────────────────────

/// The branch side of the handoff, owned by the branch's evaluator.
#[derive(Debug)]
pub struct BranchLink {
    id: u64,
    resume_rx: UnboundedReceiver<Resume>,
    yield_tx: UnboundedSender<Yield>,
}

impl BranchLink {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Hand control back to the driver and block until resumed.  An
    /// interrupt, pending or delivered while waiting, comes back as
    /// [`CliError::Interrupted`].
    pub fn suspend(&mut self, sched: &Scheduler, wait: Wait) -> Result<Value, CliError> {
        if sched.take_interrupt(self.id) {
            return Err(CliError::Interrupted);
        }
        log::debug!("script branch {} suspends: {}", self.id, BranchState::Waiting(wait.clone()));
        sched.set_state(self.id, BranchState::Waiting(wait));
        self.yield_tx.send(Yield::Suspended).map_err(|_| CliError::Interrupted)?;
        match self.resume_rx.blocking_recv() {
            Some(Resume::Wake(v)) => Ok(v),
            Some(Resume::Interrupt) | None => Err(CliError::Interrupted),
        }
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

struct Slot {
    desc: String,
    state: BranchState,
    interrupted: bool,
    resume_tx: UnboundedSender<Resume>,
    yield_rx: Arc<Mutex<UnboundedReceiver<Yield>>>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    now: f64,
    slots: BTreeMap<u64, Slot>,
}

#[derive(Default)]
pub struct Scheduler {
    inner: Mutex<Inner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("branches", &inner.slots.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current simulated time in seconds.
    pub fn now(&self) -> f64 {
        self.lock().now
    }

    fn set_state(&self, id: u64, state: BranchState) {
        if let Some(slot) = self.lock().slots.get_mut(&id) {
            slot.state = state;
        }
    }

    fn take_interrupt(&self, id: u64) -> bool {
        self.lock().slots.get_mut(&id).is_some_and(|s| std::mem::take(&mut s.interrupted))
    }

    /// Start `body` on a new branch thread and run it until it first
    /// suspends or finishes.  Returns the branch id.
    pub fn spawn<F>(&self, desc: String, body: F) -> Result<u64, CliError>
    where
        F: FnOnce(BranchLink) + Send + 'static,
    {
        let (resume_tx, resume_rx) = mpsc::unbounded_channel();
        let (yield_tx, yield_rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let id = inner.next_id;
            inner.slots.insert(
                id,
                Slot {
                    desc,
                    state: BranchState::Running,
                    interrupted: false,
                    resume_tx,
                    yield_rx: Arc::new(Mutex::new(yield_rx)),
                },
            );
            id
        };
        let link = BranchLink { id, resume_rx, yield_tx: yield_tx.clone() };
        let spawned = std::thread::Builder::new().name(format!("script-branch-{id}")).spawn(move || {
            if panic::catch_unwind(AssertUnwindSafe(|| body(link))).is_err() {
                log::error!("script branch {id} panicked");
            }
            let _ = yield_tx.send(Yield::Finished);
        });
        if let Err(e) = spawned {
            self.lock().slots.remove(&id);
            return Err(CliError::runtime(format!("cannot start script branch: {e}")));
        }
        log::debug!("script branch {id} started");
        self.drive(id);
        Ok(id)
    }

    /// Block until branch `id` suspends again or finishes.
    fn drive(&self, id: u64) {
        let Some(rx) = self.lock().slots.get(&id).map(|s| s.yield_rx.clone()) else {
            return;
        };
        let msg = rx.lock().unwrap_or_else(PoisonError::into_inner).blocking_recv();
        if matches!(msg, Some(Yield::Finished) | None) {
            self.lock().slots.remove(&id);
            log::debug!("script branch {id} finished");
        }
    }

    fn resume(&self, id: u64, msg: Resume) -> Result<(), CliError> {
        let tx = {
            let mut inner = self.lock();
            let slot = inner.slots.get_mut(&id).ok_or_else(|| CliError::Argument(format!("no script branch {id}")))?;
            if slot.state == BranchState::Running {
                if msg == Resume::Interrupt {
                    slot.interrupted = true;
                    return Ok(());
                }
                return Err(CliError::Usage(format!("script branch {id} is not waiting")));
            }
            slot.state = BranchState::Running;
            slot.resume_tx.clone()
        };
        if tx.send(msg).is_err() {
            self.lock().slots.remove(&id);
            return Ok(());
        }
        self.drive(id);
        Ok(())
    }

    /// Wake a waiting branch with `value`.
    pub fn wake(&self, id: u64, value: Value) -> Result<(), CliError> {
        self.resume(id, Resume::Wake(value))
    }

    /// Cancel a branch.  A waiting branch is interrupted immediately; a
    /// running one at its next suspension.
    pub fn interrupt(&self, id: u64) -> Result<(), CliError> {
        log::debug!("interrupting script branch {id}");
        self.resume(id, Resume::Interrupt)
    }

    /// Move simulated time forward by `seconds`, waking time waiters in
    /// deadline order (ties by branch id).  Returns how many were woken.
    ///
    /// A branch is woken at most once per instant; waiting again for the
    /// instant it was just woken at defers it to the next call.
    pub fn advance_time(&self, seconds: f64) -> usize {
        let target = self.lock().now + seconds.max(0.0);
        let mut woken = 0;
        let mut instant = f64::NEG_INFINITY;
        let mut woken_at_instant = BTreeSet::new();
        loop {
            let next = {
                let mut inner = self.lock();
                let due = inner
                    .slots
                    .iter()
                    .filter_map(|(id, s)| match s.state {
                        BranchState::Waiting(Wait::Time(t)) if t <= target => Some((t, *id)),
                        _ => None,
                    })
                    .filter(|(t, id)| !(*t <= instant && woken_at_instant.contains(id)))
                    .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                if let Some((t, _)) = due {
                    inner.now = inner.now.max(t);
                }
                due
            };
            let Some((t, id)) = next else {
                break;
            };
            if t > instant {
                instant = t;
                woken_at_instant.clear();
            }
            woken_at_instant.insert(id);
            if self.wake(id, Value::Nil).is_ok() {
                woken += 1;
            }
        }
        self.lock().now = target;
        woken
    }

    /// Wake every branch waiting for `signal`, in id order.
    pub fn notify(&self, signal: &str) -> usize {
        let waiting: Vec<u64> = self
            .lock()
            .slots
            .iter()
            .filter(|(_, s)| matches!(&s.state, BranchState::Waiting(Wait::Signal(n)) if n == signal))
            .map(|(id, _)| *id)
            .collect();
        waiting.into_iter().filter(|id| self.wake(*id, Value::Str(signal.to_owned())).is_ok()).count()
    }

    pub fn list(&self) -> Vec<BranchInfo> {
        self.lock()
            .slots
            .iter()
            .map(|(id, s)| BranchInfo { id: *id, desc: s.desc.clone(), state: s.state.clone() })
            .collect()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.lock().slots.keys().copied().collect()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
