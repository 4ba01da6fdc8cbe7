//! # Card Game Server Library
//!
//! This library provides the authoritative host for the round-based
//! multiplayer card game. It seats a fixed table of players over TCP,
//! deals from shuffled decks, and drives every round through the same
//! sequence of phases on all connections at once.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Rounds
//! The server owns the decks, the judge rotation, and the scoreboard.
//! Clients only ever see their own hand and the anonymized submissions;
//! all pairing of submissions to players happens here.
//!
//! ### Session Management
//! Handles the complete lifecycle of a table:
//! - Join handshake with protocol and username vetting
//! - One Sender and one Receiver task per seated player
//! - Whole-game abort when any connection fails
//!
//! ### Lock-Step Synchronization
//! Every round advances through six phases (round data, submissions,
//! fan-out, judging, confirmations, reset). Gates open each phase and
//! barriers close it, so no task ever reads state a slower peer is
//! still producing.
//!
//! ## Module Organization
//!
//! ### Acceptor Module (`acceptor`)
//! Accepts connections and runs the join handshake until the table is
//! full, turning away duplicates and strangers speaking the wrong
//! protocol.
//!
//! ### Config Module (`config`)
//! Operator settings, their bounds, and the card budget that proves a
//! deck cannot run dry mid-game.
//!
//! ### Deck Module (`deck`)
//! Prompt and card deck files, parsed, shuffled once at load, and drawn
//! from without repetition.
//!
//! ### Orchestrator Module (`orchestrator`)
//! The single task that opens rounds, shuffles submissions, applies the
//! verdict, and resets for the next round.
//!
//! ### Roster Module (`roster`)
//! Seat assignment, usernames, and scores.
//!
//! ### Session Module (`session`)
//! The per-player Sender and Receiver tasks and the bootstrap block
//! each player gets before round one.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use server::config::GameConfig;
//! use server::orchestrator::JudgePolicy;
//! use shared::sync::Shutdown;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig {
//!         players: 3,
//!         rounds: 5,
//!         hand_size: 10,
//!         judge_policy: JudgePolicy::Rotation,
//!         seed: None,
//!     };
//!     config.validate()?;
//!
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let roster = server::run(
//!         listener,
//!         config,
//!         Path::new("data/prompts.txt"),
//!         Path::new("data/cards.txt"),
//!         Shutdown::new(),
//!     )
//!     .await?;
//!
//!     for player in roster.players() {
//!         println!("{}: {} point(s)", player.username, player.score);
//!     }
//!     Ok(())
//! }
//! ```

use std::path::Path;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinError;

use shared::error::{Fault, GameResult};
use shared::session::{spawn_session_task, RoundSync};
use shared::sync::Shutdown;

pub mod acceptor;
pub mod config;
pub mod deck;
pub mod orchestrator;
pub mod roster;
pub mod session;

use crate::config::GameConfig;
use crate::deck::{CardDeck, PromptDeck};
use crate::orchestrator::{RoundOrchestrator, RoundState};
use crate::roster::Roster;
use crate::session::SessionContext;

/// Host one complete game on `listener` and return the final roster.
///
/// Loads and vets the decks, fills the table, plays every round, and
/// joins all session tasks before returning. On any fault the shutdown
/// signal trips, every task unwinds, and the first root-cause fault is
/// returned rather than the aborts it caused.
pub async fn run(
    listener: TcpListener,
    config: GameConfig,
    prompt_path: &Path,
    card_path: &Path,
    shutdown: Shutdown,
) -> GameResult<Roster> {
    config.validate()?;
    let mut rng = config.rng();
    let prompts = PromptDeck::load(prompt_path, &mut rng)?;
    let cards = CardDeck::load(card_path, &mut rng)?;
    config.validate_decks(&prompts, &cards)?;

    info!(
        "Waiting for {} players on {}",
        config.players,
        listener.local_addr()?
    );
    let mut roster = Roster::new(config.players);
    let mut streams = acceptor::accept_players(&listener, &mut roster, &shutdown).await?;
    let usernames = roster.usernames();
    session::send_bootstrap(&mut streams, &usernames, config.rounds, config.hand_size).await?;
    info!(
        "Table full; playing {} rounds with {} players",
        config.rounds, config.players
    );

    let state = Arc::new(RwLock::new(RoundState::new(config.players)));
    let sync = Arc::new(RoundSync::for_server(config.players));

    let mut sessions = Vec::with_capacity(streams.len() * 2);
    for (player, stream) in streams {
        let ctx = SessionContext {
            player,
            username: usernames[player].clone(),
            players: config.players,
            rounds: config.rounds,
            hand_size: config.hand_size,
            state: Arc::clone(&state),
            sync: Arc::clone(&sync),
            shutdown: shutdown.clone(),
        };
        let (sender, receiver) = session::spawn_pair(ctx, stream);
        sessions.push(sender);
        sessions.push(receiver);
    }

    let orchestrator = RoundOrchestrator::new(
        roster,
        prompts,
        cards,
        config.judge_policy,
        rng,
        config.hand_size,
        config.rounds,
        Arc::clone(&state),
        Arc::clone(&sync),
        shutdown.clone(),
    );
    let game = spawn_session_task("orchestrator", &shutdown, orchestrator.run());

    // Every task is joined even after a fault, so nothing leaks past
    // this call. The earliest non-abort fault wins the error slot.
    let mut fault: Option<Fault> = None;
    for session in sessions {
        note_outcome(session.await, &mut fault, &shutdown);
    }
    let roster = match game.await {
        Ok(Ok(roster)) => Some(roster),
        Ok(Err(game_fault)) => {
            note_fault(game_fault, &mut fault);
            None
        }
        Err(join_err) => {
            note_panic(join_err, &mut fault, &shutdown);
            None
        }
    };

    match (roster, fault) {
        (Some(roster), None) => Ok(roster),
        (_, Some(fault)) => Err(fault),
        (None, None) => Err(Fault::Aborted),
    }
}

fn note_outcome(
    outcome: Result<GameResult<()>, JoinError>,
    slot: &mut Option<Fault>,
    shutdown: &Shutdown,
) {
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(fault)) => note_fault(fault, slot),
        Err(join_err) => note_panic(join_err, slot, shutdown),
    }
}

fn note_fault(fault: Fault, slot: &mut Option<Fault>) {
    match slot {
        None => *slot = Some(fault),
        // A real fault explains the game better than the aborts it set off.
        Some(existing) if existing.is_abort() && !fault.is_abort() => *slot = Some(fault),
        Some(_) => {}
    }
}

fn note_panic(join_err: JoinError, slot: &mut Option<Fault>, shutdown: &Shutdown) {
    error!("Session task panicked: {}", join_err);
    shutdown.trip();
    note_fault(Fault::Aborted, slot);
}
