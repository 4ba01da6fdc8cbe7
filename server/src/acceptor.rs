//! Accepting connections and vetting joins until the table is full.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use shared::error::{Fault, GameResult};
use shared::frame::{FrameReceiver, FrameSender};
use shared::protocol;
use shared::sync::Shutdown;

use crate::roster::Roster;

/// A peer that connects but never completes the handshake would stall
/// every later join, so the handshake gets a deadline.
const JOIN_DEADLINE: Duration = Duration::from_secs(10);

/// Accept connections until `roster` is full, returning each seated
/// player's stream keyed by player id.
///
/// A failed join (bad handshake, duplicate username, peer dropping
/// mid-handshake) is logged and the listener keeps going. Only listener
/// errors and a tripped shutdown end the wait early.
pub async fn accept_players(
    listener: &TcpListener,
    roster: &mut Roster,
    shutdown: &Shutdown,
) -> GameResult<Vec<(usize, TcpStream)>> {
    let mut seated = Vec::new();
    while !roster.is_full() {
        let (stream, addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = shutdown.tripped() => return Err(Fault::Aborted),
        };
        debug!("Connection from {}", addr);
        match timeout(JOIN_DEADLINE, vet_join(stream, roster)).await {
            Ok(Ok((player, stream))) => {
                seated.push((player, stream));
                info!("{} of {} players seated", roster.len(), roster.capacity());
            }
            Ok(Err(fault)) => warn!("Rejected join from {}: {}", addr, fault),
            Err(_) => warn!("Join from {} timed out", addr),
        }
    }
    Ok(seated)
}

/// Run the join handshake on a fresh connection. The reply byte tells
/// the peer whether it was seated; a rejected peer's stream is dropped.
async fn vet_join(mut stream: TcpStream, roster: &mut Roster) -> GameResult<(usize, TcpStream)> {
    let (read_half, write_half) = stream.split();
    let mut rx = FrameReceiver::new(read_half);
    let mut tx = FrameSender::new(write_half);

    let seat = match protocol::recv_join(&mut rx).await {
        Ok(username) => roster.try_join(&username).map_err(Fault::from),
        Err(fault) => Err(fault),
    };
    match seat {
        Ok(player) => {
            tx.send_bool(true).await?;
            tx.flush().await?;
            drop(rx);
            drop(tx);
            Ok((player, stream))
        }
        Err(fault) => {
            // Best effort; the peer may already be gone.
            let _ = tx.send_bool(false).await;
            let _ = tx.flush().await;
            Err(fault)
        }
    }
}
