//! Round-generation synchronization primitives for lock-step play
//!
//! Both hosts march their tasks through the same six phases every round,
//! and the only coordination they use is here:
//! - [`Gate`]: a one-shot signal per round generation, re-armed explicitly
//!   by whichever task owns the round lifecycle
//! - [`Barrier`]: a counted rendezvous per round generation that re-arms
//!   itself the moment the last party arrives
//! - [`Shutdown`]: a host-wide abort signal that every blocked wait
//!   observes, so one failing task unwinds the whole host
//!
//! All three are built on `tokio::sync::watch`, which gives two properties
//! the protocol depends on: a wait never misses a signal that happened
//! before it started (the watch keeps the latest value), and state written
//! before a `signal`/`arrive` is visible to whoever wakes on it.
//!
//! Waiters identify the round they are synchronizing by a generation
//! number instead of a bare flag. That closes the classic re-arm hazard:
//! a task that shows up late, after the round it cares about was already
//! signaled and re-armed, sees a newer generation and falls through
//! instead of sleeping on a flag nobody will set again.

use std::sync::Arc;

use tokio::sync::watch;

use crate::error::{Fault, GameResult};

/// Host-wide abort signal.
///
/// Cloned into every task at spawn time. Tripping it is idempotent and
/// permanent for the life of the game; there is no un-trip.
#[derive(Debug, Clone)]
pub struct Shutdown {
    cell: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { cell: Arc::new(tx) }
    }

    /// Fire the signal. Every current and future [`Shutdown::tripped`]
    /// call completes, and every blocked gate or barrier wait returns
    /// [`Fault::Aborted`].
    pub fn trip(&self) {
        self.cell.send_modify(|tripped| *tripped = true);
    }

    pub fn is_tripped(&self) -> bool {
        *self.cell.borrow()
    }

    /// Completes once the signal has been tripped.
    pub async fn tripped(&self) {
        let mut rx = self.cell.subscribe();
        let _ = rx.wait_for(|tripped| *tripped).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
struct GateState {
    generation: u64,
    signaled: bool,
}

/// One-shot signal with an explicit re-arm, indexed by round generation.
///
/// One task signals, any number of tasks wait. `signal` and `wait` make a
/// happens-before edge, so round state written before the signal may be
/// read freely after the corresponding wait returns.
#[derive(Debug)]
pub struct Gate {
    cell: watch::Sender<GateState>,
}

impl Gate {
    /// A fresh gate is un-signaled at generation 0, ready for the first
    /// round without a re-arm.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(GateState {
            generation: 0,
            signaled: false,
        });
        Self { cell: tx }
    }

    /// Set the flag for the current generation and wake every waiter.
    pub fn signal(&self) {
        self.cell.send_modify(|state| state.signaled = true);
    }

    /// Clear the flag and advance to the next generation. Only the task
    /// that owns the round lifecycle calls this, and only after the
    /// round-reset rendezvous has proven that nobody is still waiting on
    /// the old generation.
    pub fn rearm(&self) {
        self.cell.send_modify(|state| {
            state.generation += 1;
            state.signaled = false;
        });
    }

    /// Block until the gate is signaled for `round`.
    ///
    /// Also returns immediately if the gate has already moved past
    /// `round`; a waiter that arrives after signal-and-rearm must fall
    /// through, not sleep forever on a flag that will never be set for a
    /// generation that is over.
    pub async fn wait(&self, round: u64, shutdown: &Shutdown) -> GameResult<()> {
        let mut rx = self.cell.subscribe();
        tokio::select! {
            changed = rx.wait_for(|s| s.generation > round || (s.generation == round && s.signaled)) => {
                changed.map(|_| ()).map_err(|_| Fault::Aborted)
            }
            _ = shutdown.tripped() => Err(Fault::Aborted),
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy)]
struct BarrierState {
    arrived: usize,
    completed: u64,
}

/// Counted rendezvous indexed by round generation.
///
/// `target` tasks call [`Barrier::arrive`] per round; everyone blocks
/// until the last of them shows up. Tasks that need to wait for the
/// rendezvous without being counted in it call [`Barrier::observe`]
/// instead.
///
/// The count-and-check runs inside a single `send_modify` critical
/// section, so the final arrival atomically resets the count for the next
/// generation and records the completion. Completions are recorded as a
/// monotone counter rather than a flag, which means a party still on its
/// way out of generation `k` cannot be confused by generation `k + 1`
/// already being underway.
#[derive(Debug)]
pub struct Barrier {
    target: usize,
    cell: watch::Sender<BarrierState>,
}

impl Barrier {
    /// `target` is the number of counted parties per generation; must be
    /// at least 1.
    pub fn new(target: usize) -> Self {
        debug_assert!(target >= 1);
        let (tx, _rx) = watch::channel(BarrierState {
            arrived: 0,
            completed: 0,
        });
        Self { target, cell: tx }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    /// Arrive for `round` and block until all `target` parties have.
    ///
    /// The caller must be one of the counted parties and must arrive
    /// exactly once per generation; the phase structure of the round loop
    /// is what enforces that.
    pub async fn arrive(&self, round: u64, shutdown: &Shutdown) -> GameResult<()> {
        self.cell.send_modify(|state| {
            state.arrived += 1;
            if state.arrived == self.target {
                state.arrived = 0;
                state.completed += 1;
            }
        });
        self.observe(round, shutdown).await
    }

    /// Block until the rendezvous for `round` has completed, without
    /// being counted toward it.
    pub async fn observe(&self, round: u64, shutdown: &Shutdown) -> GameResult<()> {
        let mut rx = self.cell.subscribe();
        tokio::select! {
            changed = rx.wait_for(|s| s.completed > round) => {
                changed.map(|_| ()).map_err(|_| Fault::Aborted)
            }
            _ = shutdown.tripped() => Err(Fault::Aborted),
        }
    }
}
