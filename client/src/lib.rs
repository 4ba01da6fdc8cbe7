//! # Card Game Client Library
//!
//! This library provides the complete client side of the round-based
//! multiplayer card game. It joins a table over TCP, keeps a local view
//! of everything this player is allowed to see, and walks the player
//! through each round in lock step with the host.
//!
//! ## Architecture Overview
//!
//! The client mirrors the host's two-task session design. A Receiver
//! task owns the read half of the connection and turns each server
//! message into view state plus a phase signal; a Sender task owns the
//! write half and drives the player interaction as those phases open.
//! Blocking frame reads double as pacing, so the client can never run
//! ahead of the table.
//!
//! ### Partial Knowledge
//! The view holds only this player's hand, the anonymized submission
//! pool, and the public verdicts. Who submitted what stays on the host
//! until a verdict names its origin.
//!
//! ### Whole-Game Abort
//! Any fault on either task trips a shared shutdown signal. The peer
//! task unwinds at its next phase wait, the connection drops, and the
//! game ends for the whole table rather than limping on short-handed.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Connection, join handshake, bootstrap, and the two round loops.
//!
//! ### Ui Module (`ui`)
//! The [`ui::Ui`] trait the loops talk to, its interactive terminal
//! implementation, and a scripted player for driverless games.
//!
//! ### View Module (`view`)
//! The local picture of the game: roster, hand, pool, history.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use client::session::GameClient;
//! use client::ui::{TerminalUi, Ui};
//! use shared::sync::Shutdown;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ui: Arc<dyn Ui> = Arc::new(TerminalUi::new());
//!     let client =
//!         GameClient::connect("127.0.0.1:8080", "ada", Arc::clone(&ui), Shutdown::new()).await?;
//!     let summary = client.run().await?;
//!     ui.show_final(&summary);
//!     Ok(())
//! }
//! ```

pub mod session;
pub mod ui;
pub mod view;
