//! Connecting, joining, and the client-side round loops.
//!
//! The client mirrors the host's task split: a Receiver owns the read
//! half and turns server messages into [`GameView`] updates and phase
//! signals, while a Sender owns the write half and walks the player
//! through each phase as its gates open. Frame reads double as the
//! pacing signal, so the client advances exactly as fast as the server
//! feeds it.

use std::sync::Arc;

use log::{debug, info};
use tokio::io::{BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::RwLock;

use shared::error::{Fault, GameResult, ProtocolViolation};
use shared::frame::{FrameReceiver, FrameSender};
use shared::protocol::{self, DealtCard, RoundData, Verdict, Welcome};
use shared::session::{spawn_session_task, RoundSync};
use shared::sync::Shutdown;

use crate::ui::Ui;
use crate::view::{GameSummary, GameView};

/// Shared hooks for the Sender/Receiver pair, cheap to clone per task.
#[derive(Clone)]
struct ClientContext {
    me: usize,
    players: usize,
    rounds: u64,
    hand_capacity: usize,
    view: Arc<RwLock<GameView>>,
    ui: Arc<dyn Ui>,
    sync: Arc<RoundSync>,
    shutdown: Shutdown,
}

/// A joined, seated client ready to play one game.
pub struct GameClient {
    ctx: ClientContext,
    tx: FrameSender<BufWriter<OwnedWriteHalf>>,
    rx: FrameReceiver<BufReader<OwnedReadHalf>>,
}

impl GameClient {
    /// Connect, run the join handshake, and wait out the bootstrap.
    ///
    /// Returns once the table is full and this client knows its seat;
    /// the first round has not started yet.
    pub async fn connect(
        addr: &str,
        username: &str,
        ui: Arc<dyn Ui>,
        shutdown: Shutdown,
    ) -> GameResult<Self> {
        info!("Connecting to {}", addr);
        let stream = TcpStream::connect(addr).await?;
        let (read_half, write_half) = stream.into_split();
        let mut tx = FrameSender::new(BufWriter::new(write_half));
        let mut rx = FrameReceiver::new(BufReader::new(read_half));

        protocol::send_join(&mut tx, username).await?;
        if !rx.recv_bool().await? {
            return Err(ProtocolViolation::JoinRejected.into());
        }
        debug!("Join accepted, waiting for the table to fill");

        let welcome = Welcome::read_from(&mut rx).await?;
        info!(
            "Seated as player {} of {}; {} rounds ahead",
            welcome.player_id,
            welcome.roster.len(),
            welcome.rounds
        );
        let ctx = ClientContext {
            me: welcome.player_id,
            players: welcome.roster.len(),
            rounds: welcome.rounds,
            hand_capacity: welcome.hand_capacity,
            view: Arc::new(RwLock::new(GameView::new(&welcome))),
            ui,
            sync: Arc::new(RoundSync::for_client()),
            shutdown,
        };
        Ok(Self { ctx, tx, rx })
    }

    /// Play every round to the end and return what this client saw.
    ///
    /// Any fault on either task trips the shutdown signal, unwinds the
    /// other task, and comes back as the error here.
    pub async fn run(self) -> GameResult<GameSummary> {
        let Self { ctx, tx, rx } = self;
        let sender = spawn_session_task("sender", &ctx.shutdown, sender_loop(ctx.clone(), tx));
        let receiver =
            spawn_session_task("receiver", &ctx.shutdown, receiver_loop(ctx.clone(), rx));

        let mut fault: Option<Fault> = None;
        for task in [sender, receiver] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(task_fault)) => match &fault {
                    None => fault = Some(task_fault),
                    Some(existing) if existing.is_abort() && !task_fault.is_abort() => {
                        fault = Some(task_fault)
                    }
                    Some(_) => {}
                },
                Err(join_err) => {
                    log::error!("Session task panicked: {}", join_err);
                    ctx.shutdown.trip();
                    fault.get_or_insert(Fault::Aborted);
                }
            }
        }
        match fault {
            Some(fault) => Err(fault),
            None => {
                let view = ctx.view.read().await;
                Ok(view.summary())
            }
        }
    }
}

/// Player-facing half: shows the round, collects picks, and confirms.
async fn sender_loop(
    ctx: ClientContext,
    mut tx: FrameSender<BufWriter<OwnedWriteHalf>>,
) -> GameResult<()> {
    for round in 0..ctx.rounds {
        ctx.sync.data_ready.wait(round, &ctx.shutdown).await?;
        let judging = {
            let view = ctx.view.read().await;
            ctx.ui.show_round(&view);
            view.judged_by_me()
        };

        if !judging {
            let (prompt, hand) = {
                let view = ctx.view.read().await;
                (view.prompt.clone(), view.hand.clone())
            };
            let slots = ctx.ui.pick_cards(&prompt, &hand).await?;
            let picks: Vec<DealtCard> = slots
                .iter()
                .map(|&slot| DealtCard {
                    slot,
                    text: hand[slot].clone(),
                })
                .collect();
            protocol::send_card_choices(&mut tx, &picks).await?;
            let mut view = ctx.view.write().await;
            view.played = Some(picks.into_iter().map(|pick| pick.text).collect());
        }
        // The judge arrives with nothing to submit, keeping the round
        // count uniform across seats.
        ctx.sync
            .choices_submitted
            .arrive(round, &ctx.shutdown)
            .await?;

        ctx.sync
            .choices_fanned_out
            .wait(round, &ctx.shutdown)
            .await?;
        let pool = {
            let view = ctx.view.read().await;
            view.pool.clone()
        };
        ctx.ui.show_pool(&pool);
        if judging {
            let chosen = ctx.ui.pick_winner(&pool).await?;
            tx.send_i32(chosen as i32).await?;
            tx.flush().await?;
            debug!("Round {}: picked entry {}", round + 1, chosen + 1);
        }

        ctx.sync
            .judge_choice_made
            .wait(round, &ctx.shutdown)
            .await?;
        {
            let view = ctx.view.read().await;
            let verdict = view
                .verdict
                .ok_or(ProtocolViolation::PhaseDesync("verdict missing after judge choice"))?;
            // Decoded against this pool's length, so the index holds.
            let cards = view.pool[verdict.chosen].clone();
            ctx.ui
                .show_verdict(view.username(verdict.origin), &cards, verdict.origin == ctx.me);
        }
        ctx.ui.confirm_next_round().await?;
        tx.send_bool(true).await?;
        tx.flush().await?;
        ctx.sync
            .confirmations_done
            .arrive(round, &ctx.shutdown)
            .await?;

        {
            let mut view = ctx.view.write().await;
            view.close_round();
        }
        ctx.sync.rearm_gates();
        ctx.sync.round_reset.arrive(round, &ctx.shutdown).await?;
    }
    Ok(())
}

/// Wire-facing half: every server message lands here and becomes view
/// state plus a phase signal.
async fn receiver_loop(
    ctx: ClientContext,
    mut rx: FrameReceiver<BufReader<OwnedReadHalf>>,
) -> GameResult<()> {
    for round in 0..ctx.rounds {
        let data = RoundData::read_from(&mut rx, ctx.me, ctx.players, ctx.hand_capacity).await?;
        let blanks = data.prompt.blanks;
        {
            let mut view = ctx.view.write().await;
            view.round = round;
            view.judge = data.judge;
            view.prompt = data.prompt;
            if let Some(deal) = &data.deal {
                view.apply_deal(deal);
            }
        }
        debug!("Round {} data received", round + 1);
        ctx.sync.data_ready.signal();

        ctx.sync
            .choices_submitted
            .observe(round, &ctx.shutdown)
            .await?;
        let pool = protocol::recv_fan_out(&mut rx, blanks, ctx.players - 1).await?;
        let pool_size = pool.len();
        {
            let mut view = ctx.view.write().await;
            view.pool = pool;
        }
        ctx.sync.choices_fanned_out.signal();

        let verdict = Verdict::read_from(&mut rx, ctx.players, pool_size).await?;
        {
            let mut view = ctx.view.write().await;
            view.apply_verdict(verdict);
        }
        ctx.sync.judge_choice_made.signal();

        // Value ignored; its arrival means every player confirmed.
        let _ack = rx.recv_bool().await?;
        ctx.sync
            .confirmations_done
            .arrive(round, &ctx.shutdown)
            .await?;
        ctx.sync.round_reset.arrive(round, &ctx.shutdown).await?;
    }
    Ok(())
}
