//! The per-round phase plan both hosts follow.
//!
//! A round is six phases, in order: round data becomes ready, choices are
//! submitted, choices are fanned out, the judge decides, confirmations
//! come back, and the round resets. [`RoundSync`] bundles one primitive
//! per phase; the server and client task loops drive the same six fields
//! with different rendezvous targets.

use std::future::Future;

use log::{debug, error};
use tokio::task::JoinHandle;

use crate::error::GameResult;
use crate::sync::{Barrier, Gate, Shutdown};

/// What a player does in a given round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundRole {
    /// Holds the prompt, receives no cards, picks the winner.
    Judge,
    /// Plays cards into the pool and waits for the verdict.
    Contestant,
}

impl RoundRole {
    pub fn of(player: usize, judge: usize) -> Self {
        if player == judge {
            RoundRole::Judge
        } else {
            RoundRole::Contestant
        }
    }

    pub fn is_judge(self) -> bool {
        matches!(self, RoundRole::Judge)
    }
}

/// One synchronization primitive per phase of a round.
///
/// A barrier's target counts only the tasks that perform that phase's
/// completing action on that host; everyone else observes. With `n`
/// players the server host counts:
///
/// - `choices_submitted`: `n - 1`, one receiver per contestant; the
///   judge's receiver never arrives
/// - `confirmations_done`: `n`, every receiver
/// - `round_reset`: `2 * n`, every sender and every receiver
///
/// The client host runs two tasks, so its targets are 1 (the sender,
/// which arrives vacuously when its player judges, keeping the
/// generation count in step with the round index), 2, and 2.
///
/// The three gates are armed per round by whichever task owns the round
/// lifecycle: the orchestrator on the server, the sender on the client.
#[derive(Debug)]
pub struct RoundSync {
    pub data_ready: Gate,
    pub choices_submitted: Barrier,
    pub choices_fanned_out: Gate,
    pub judge_choice_made: Gate,
    pub confirmations_done: Barrier,
    pub round_reset: Barrier,
}

impl RoundSync {
    /// Phase plan for the server host with `players` connected players.
    pub fn for_server(players: usize) -> Self {
        debug_assert!(players >= 2);
        Self {
            data_ready: Gate::new(),
            choices_submitted: Barrier::new(players - 1),
            choices_fanned_out: Gate::new(),
            judge_choice_made: Gate::new(),
            confirmations_done: Barrier::new(players),
            round_reset: Barrier::new(2 * players),
        }
    }

    /// Phase plan for a client host (one sender, one receiver).
    pub fn for_client() -> Self {
        Self {
            data_ready: Gate::new(),
            choices_submitted: Barrier::new(1),
            choices_fanned_out: Gate::new(),
            judge_choice_made: Gate::new(),
            confirmations_done: Barrier::new(2),
            round_reset: Barrier::new(2),
        }
    }

    /// Advance the three gates to the next round. Must only run after
    /// the round-reset rendezvous, when no task can still be waiting on
    /// the old generation. The barriers re-arm themselves.
    pub fn rearm_gates(&self) {
        self.data_ready.rearm();
        self.choices_fanned_out.rearm();
        self.judge_choice_made.rearm();
    }
}

/// Spawn one long-lived game task under the abort policy: if the task
/// fails, trip the shared shutdown signal so every sibling blocked on a
/// gate or barrier unwinds instead of waiting for a phase that will
/// never complete.
pub fn spawn_session_task<T, F>(
    label: &'static str,
    shutdown: &Shutdown,
    task: F,
) -> JoinHandle<GameResult<T>>
where
    T: Send + 'static,
    F: Future<Output = GameResult<T>> + Send + 'static,
{
    let shutdown = shutdown.clone();
    tokio::spawn(async move {
        let result = task.await;
        if let Err(fault) = &result {
            if fault.is_abort() {
                debug!("{} task unwound by shutdown signal", label);
            } else {
                error!("{} task failed: {}", label, fault);
            }
            shutdown.trip();
        }
        result
    })
}
