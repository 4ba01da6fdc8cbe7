//! Per-player session tasks.
//!
//! Each seated player gets a Sender task owning the write half of their
//! stream and a Receiver task owning the read half. Both walk the six
//! round phases against the shared [`RoundSync`], reading and writing
//! the canonical [`RoundState`] only in the phase windows the
//! orchestrator leaves open. Neither task ever blocks on anything but
//! frame i/o and phase waits, so the whole host either makes progress or
//! unwinds through the shutdown signal.

use std::sync::Arc;

use log::{debug, info};
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use shared::error::GameResult;
use shared::frame::{FrameReceiver, FrameSender};
use shared::protocol::{self, RoundData, Verdict, Welcome};
use shared::session::{spawn_session_task, RoundRole, RoundSync};
use shared::sync::Shutdown;

use crate::orchestrator::{RoundState, Submission};

/// Everything one player's task pair needs, cheap to clone per task.
#[derive(Clone)]
pub struct SessionContext {
    pub player: usize,
    pub username: String,
    pub players: usize,
    pub rounds: u64,
    pub hand_size: usize,
    pub state: Arc<RwLock<RoundState>>,
    pub sync: Arc<RoundSync>,
    pub shutdown: Shutdown,
}

/// Send every seated player their bootstrap block, in seat order, before
/// any session task exists.
pub async fn send_bootstrap(
    streams: &mut [(usize, TcpStream)],
    roster: &[String],
    rounds: u64,
    hand_size: usize,
) -> GameResult<()> {
    for (player, stream) in streams.iter_mut() {
        let welcome = Welcome {
            player_id: *player,
            roster: roster.to_vec(),
            rounds,
            hand_capacity: hand_size,
        };
        let mut tx = FrameSender::new(&mut *stream);
        welcome.write_to(&mut tx).await?;
        debug!("Bootstrap sent to player {}", player);
    }
    Ok(())
}

/// Split the stream and spawn the Sender/Receiver pair under the abort
/// policy.
pub fn spawn_pair(
    ctx: SessionContext,
    stream: TcpStream,
) -> (JoinHandle<GameResult<()>>, JoinHandle<GameResult<()>>) {
    let (read_half, write_half) = stream.into_split();
    let tx = FrameSender::new(BufWriter::new(write_half));
    let rx = FrameReceiver::new(BufReader::new(read_half));
    let sender = spawn_session_task("sender", &ctx.shutdown, sender_loop(ctx.clone(), tx));
    let shutdown = ctx.shutdown.clone();
    let receiver = spawn_session_task("receiver", &shutdown, receiver_loop(ctx, rx));
    (sender, receiver)
}

/// The outbound half of a session: everything the server tells this
/// player, one phase at a time.
async fn sender_loop(
    ctx: SessionContext,
    mut tx: FrameSender<BufWriter<OwnedWriteHalf>>,
) -> GameResult<()> {
    for round in 0..ctx.rounds {
        ctx.sync.data_ready.wait(round, &ctx.shutdown).await?;
        let data = {
            let state = ctx.state.read().await;
            let deal = if ctx.player == state.judge {
                None
            } else {
                Some(state.deal[ctx.player].clone())
            };
            RoundData {
                judge: state.judge,
                prompt: state.prompt()?.clone(),
                deal,
            }
        };
        data.write_to(&mut tx).await?;
        debug!("Round {} data sent to {:?}", round + 1, ctx.username);

        ctx.sync
            .choices_fanned_out
            .wait(round, &ctx.shutdown)
            .await?;
        let pool = {
            let state = ctx.state.read().await;
            state.fan_out_texts()
        };
        protocol::send_fan_out(&mut tx, &pool).await?;

        ctx.sync
            .judge_choice_made
            .wait(round, &ctx.shutdown)
            .await?;
        let verdict = {
            let state = ctx.state.read().await;
            state.verdict()?
        };
        verdict.write_to(&mut tx).await?;

        // Everyone has confirmed before the server acknowledges back.
        ctx.sync
            .confirmations_done
            .observe(round, &ctx.shutdown)
            .await?;
        tx.send_bool(true).await?;
        tx.flush().await?;

        ctx.sync.round_reset.arrive(round, &ctx.shutdown).await?;
    }
    Ok(())
}

/// The inbound half: the submission or the pick, then the confirmation.
async fn receiver_loop(
    ctx: SessionContext,
    mut rx: FrameReceiver<BufReader<OwnedReadHalf>>,
) -> GameResult<()> {
    for round in 0..ctx.rounds {
        ctx.sync.data_ready.wait(round, &ctx.shutdown).await?;
        let (role, blanks) = {
            let state = ctx.state.read().await;
            (
                RoundRole::of(ctx.player, state.judge),
                state.prompt()?.blanks,
            )
        };

        if role.is_judge() {
            // The pick only exists once the pool has been fanned out.
            ctx.sync
                .choices_fanned_out
                .wait(round, &ctx.shutdown)
                .await?;
            let pool_size = {
                let state = ctx.state.read().await;
                state.submissions.len()
            };
            let chosen = protocol::wire_index(rx.recv_i32().await?, pool_size)?;
            {
                let mut state = ctx.state.write().await;
                let origin = state.submissions[chosen].player;
                state.verdict = Some(Verdict { origin, chosen });
            }
            info!(
                "Judge {:?} picked list position {} for round {}",
                ctx.username,
                chosen,
                round + 1
            );
            ctx.sync.judge_choice_made.signal();
        } else {
            let picks = protocol::recv_card_choices(&mut rx, blanks, ctx.hand_size).await?;
            {
                let mut state = ctx.state.write().await;
                state.submissions.push(Submission {
                    player: ctx.player,
                    picks,
                });
            }
            debug!("Submission received from {:?}", ctx.username);
            ctx.sync
                .choices_submitted
                .arrive(round, &ctx.shutdown)
                .await?;
            ctx.sync
                .judge_choice_made
                .wait(round, &ctx.shutdown)
                .await?;
        }

        // Value ignored; the arrival is the signal.
        let _ready = rx.recv_bool().await?;
        ctx.sync
            .confirmations_done
            .arrive(round, &ctx.shutdown)
            .await?;
        ctx.sync.round_reset.arrive(round, &ctx.shutdown).await?;
    }
    Ok(())
}
