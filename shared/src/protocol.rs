//! Typed messages over the frame layer.
//!
//! Every message the game exchanges is encoded and decoded here, in the
//! exact field order both hosts expect. Decoding validates every index
//! and count against its bound before it is used, so a hostile or
//! confused peer surfaces as a [`ProtocolViolation`] instead of a panic
//! or a bogus allocation.

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{GameResult, ProtocolViolation};
use crate::frame::{FrameReceiver, FrameSender};

/// First frame of every connection, "CZAR" in ASCII.
pub const PROTOCOL_MAGIC: i32 = 0x435A_4152;
/// Bumped whenever the wire layout changes.
pub const PROTOCOL_VERSION: i32 = 1;

/// Decode-time sanity caps. Server configuration is validated against the
/// same limits, so a conforming server can never trip them.
pub const MAX_PLAYERS: usize = 32;
pub const MAX_ROUNDS: usize = 1000;
pub const MAX_HAND: usize = 64;

/// Decode an i32 as an index strictly below `limit`.
pub fn wire_index(value: i32, limit: usize) -> GameResult<usize> {
    if value >= 0 && (value as usize) < limit {
        Ok(value as usize)
    } else {
        Err(ProtocolViolation::IndexOutOfRange { value, limit }.into())
    }
}

/// Decode an i32 as a count of at most `limit`.
pub fn wire_count(value: i32, limit: usize) -> GameResult<usize> {
    if value >= 0 && value as usize <= limit {
        Ok(value as usize)
    } else {
        Err(ProtocolViolation::IndexOutOfRange { value, limit }.into())
    }
}

/// A fill-in-the-blank prompt and how many cards it takes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub blanks: usize,
}

/// One freshly dealt card addressed to a hand slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DealtCard {
    pub slot: usize,
    pub text: String,
}

/// Bootstrap block sent to every player once the roster is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Welcome {
    pub player_id: usize,
    pub roster: Vec<String>,
    pub rounds: u64,
    pub hand_capacity: usize,
}

/// Everything a player needs to start a round. `deal` is `None` for the
/// judge (who plays no cards) and the redealt slots for everyone else.
/// A contestant's deal can legitimately be empty: last round's judge
/// played nothing, so there is nothing to replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundData {
    pub judge: usize,
    pub prompt: Prompt,
    pub deal: Option<Vec<DealtCard>>,
}

/// The judge's decision: the winning position in the fanned-out list and
/// the player who originally played it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub origin: usize,
    pub chosen: usize,
}

/// Client side of the join handshake: magic, version, username.
pub async fn send_join<W: AsyncWrite + Unpin>(
    tx: &mut FrameSender<W>,
    username: &str,
) -> GameResult<()> {
    tx.send_i32(PROTOCOL_MAGIC).await?;
    tx.send_i32(PROTOCOL_VERSION).await?;
    tx.send_string(username).await?;
    tx.flush().await
}

/// Server side of the join handshake. Returns the username, or the
/// violation that should be answered with a `false` join reply.
pub async fn recv_join<R: AsyncRead + Unpin>(rx: &mut FrameReceiver<R>) -> GameResult<String> {
    let magic = rx.recv_i32().await?;
    if magic != PROTOCOL_MAGIC {
        return Err(ProtocolViolation::BadMagic(magic).into());
    }
    let version = rx.recv_i32().await?;
    if version != PROTOCOL_VERSION {
        return Err(ProtocolViolation::VersionMismatch {
            peer: version,
            expected: PROTOCOL_VERSION,
        }
        .into());
    }
    rx.recv_string().await
}

impl Welcome {
    pub async fn write_to<W: AsyncWrite + Unpin>(
        &self,
        tx: &mut FrameSender<W>,
    ) -> GameResult<()> {
        tx.send_i32(self.player_id as i32).await?;
        tx.send_i32(self.roster.len() as i32).await?;
        for username in &self.roster {
            tx.send_string(username).await?;
        }
        tx.send_i32(self.rounds as i32).await?;
        tx.send_i32(self.hand_capacity as i32).await?;
        tx.flush().await
    }

    pub async fn read_from<R: AsyncRead + Unpin>(rx: &mut FrameReceiver<R>) -> GameResult<Self> {
        let player_id = wire_index(rx.recv_i32().await?, MAX_PLAYERS)?;
        let count = wire_count(rx.recv_i32().await?, MAX_PLAYERS)?;
        if player_id >= count {
            return Err(ProtocolViolation::IndexOutOfRange {
                value: player_id as i32,
                limit: count,
            }
            .into());
        }
        let mut roster = Vec::with_capacity(count);
        for _ in 0..count {
            roster.push(rx.recv_string().await?);
        }
        let rounds = wire_count(rx.recv_i32().await?, MAX_ROUNDS)? as u64;
        let hand_capacity = wire_count(rx.recv_i32().await?, MAX_HAND)?;
        Ok(Self {
            player_id,
            roster,
            rounds,
            hand_capacity,
        })
    }
}

impl RoundData {
    pub async fn write_to<W: AsyncWrite + Unpin>(
        &self,
        tx: &mut FrameSender<W>,
    ) -> GameResult<()> {
        tx.send_i32(self.judge as i32).await?;
        tx.send_string(&self.prompt.text).await?;
        tx.send_i32(self.prompt.blanks as i32).await?;
        if let Some(deal) = &self.deal {
            tx.send_i32(deal.len() as i32).await?;
            for card in deal {
                tx.send_i32(card.slot as i32).await?;
                tx.send_string(&card.text).await?;
            }
        }
        tx.flush().await
    }

    /// The deal block is only on the wire when the recipient is not the
    /// judge, so decoding needs to know who is reading.
    pub async fn read_from<R: AsyncRead + Unpin>(
        rx: &mut FrameReceiver<R>,
        me: usize,
        players: usize,
        hand_capacity: usize,
    ) -> GameResult<Self> {
        let judge = wire_index(rx.recv_i32().await?, players)?;
        let text = rx.recv_string().await?;
        let blanks = wire_count(rx.recv_i32().await?, hand_capacity)?;
        let deal = if judge == me {
            None
        } else {
            let count = wire_count(rx.recv_i32().await?, hand_capacity)?;
            let mut cards = Vec::with_capacity(count);
            for _ in 0..count {
                let slot = wire_index(rx.recv_i32().await?, hand_capacity)?;
                let text = rx.recv_string().await?;
                cards.push(DealtCard { slot, text });
            }
            Some(cards)
        };
        Ok(Self {
            judge,
            prompt: Prompt { text, blanks },
            deal,
        })
    }
}

/// One card per blank: slot index then the card text.
pub async fn send_card_choices<W: AsyncWrite + Unpin>(
    tx: &mut FrameSender<W>,
    picks: &[DealtCard],
) -> GameResult<()> {
    for pick in picks {
        tx.send_i32(pick.slot as i32).await?;
        tx.send_string(&pick.text).await?;
    }
    tx.flush().await
}

pub async fn recv_card_choices<R: AsyncRead + Unpin>(
    rx: &mut FrameReceiver<R>,
    blanks: usize,
    hand_capacity: usize,
) -> GameResult<Vec<DealtCard>> {
    let mut picks = Vec::with_capacity(blanks);
    for _ in 0..blanks {
        let slot = wire_index(rx.recv_i32().await?, hand_capacity)?;
        let text = rx.recv_string().await?;
        picks.push(DealtCard { slot, text });
    }
    Ok(picks)
}

/// The shuffled submission list, texts only; originator identity stays on
/// the server.
pub async fn send_fan_out<W: AsyncWrite + Unpin>(
    tx: &mut FrameSender<W>,
    submissions: &[Vec<String>],
) -> GameResult<()> {
    tx.send_i32(submissions.len() as i32).await?;
    for cards in submissions {
        for card in cards {
            tx.send_string(card).await?;
        }
    }
    tx.flush().await
}

pub async fn recv_fan_out<R: AsyncRead + Unpin>(
    rx: &mut FrameReceiver<R>,
    blanks: usize,
    max_submissions: usize,
) -> GameResult<Vec<Vec<String>>> {
    let count = wire_count(rx.recv_i32().await?, max_submissions)?;
    let mut submissions = Vec::with_capacity(count);
    for _ in 0..count {
        let mut cards = Vec::with_capacity(blanks);
        for _ in 0..blanks {
            cards.push(rx.recv_string().await?);
        }
        submissions.push(cards);
    }
    Ok(submissions)
}

impl Verdict {
    pub async fn write_to<W: AsyncWrite + Unpin>(
        &self,
        tx: &mut FrameSender<W>,
    ) -> GameResult<()> {
        tx.send_i32(self.origin as i32).await?;
        tx.send_i32(self.chosen as i32).await?;
        tx.flush().await
    }

    pub async fn read_from<R: AsyncRead + Unpin>(
        rx: &mut FrameReceiver<R>,
        players: usize,
        submissions: usize,
    ) -> GameResult<Self> {
        let origin = wire_index(rx.recv_i32().await?, players)?;
        let chosen = wire_index(rx.recv_i32().await?, submissions)?;
        Ok(Self { origin, chosen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fault;

    fn channel() -> (
        FrameSender<tokio::io::DuplexStream>,
        FrameReceiver<tokio::io::DuplexStream>,
    ) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (FrameSender::new(a), FrameReceiver::new(b))
    }

    #[test]
    fn test_wire_bounds() {
        assert_eq!(wire_index(0, 3).unwrap(), 0);
        assert_eq!(wire_index(2, 3).unwrap(), 2);
        assert!(wire_index(3, 3).is_err());
        assert!(wire_index(-1, 3).is_err());
        assert_eq!(wire_count(3, 3).unwrap(), 3);
        assert!(wire_count(4, 3).is_err());
    }

    #[tokio::test]
    async fn test_join_round_trip() {
        let (mut tx, mut rx) = channel();
        send_join(&mut tx, "ada").await.unwrap();
        assert_eq!(recv_join(&mut rx).await.unwrap(), "ada");
    }

    #[tokio::test]
    async fn test_join_rejects_bad_magic() {
        let (mut tx, mut rx) = channel();
        tx.send_i32(0x7F00_0000).await.unwrap();
        tx.flush().await.unwrap();
        assert!(matches!(
            recv_join(&mut rx).await,
            Err(Fault::Protocol(ProtocolViolation::BadMagic(_)))
        ));
    }

    #[tokio::test]
    async fn test_join_rejects_version_mismatch() {
        let (mut tx, mut rx) = channel();
        tx.send_i32(PROTOCOL_MAGIC).await.unwrap();
        tx.send_i32(PROTOCOL_VERSION + 1).await.unwrap();
        tx.flush().await.unwrap();
        assert!(matches!(
            recv_join(&mut rx).await,
            Err(Fault::Protocol(ProtocolViolation::VersionMismatch { .. }))
        ));
    }

    #[tokio::test]
    async fn test_welcome_round_trip() {
        let (mut tx, mut rx) = channel();
        let welcome = Welcome {
            player_id: 1,
            roster: vec!["ada".into(), "bob".into(), "cyd".into()],
            rounds: 5,
            hand_capacity: 10,
        };
        welcome.write_to(&mut tx).await.unwrap();
        assert_eq!(Welcome::read_from(&mut rx).await.unwrap(), welcome);
    }

    #[tokio::test]
    async fn test_round_data_for_contestant() {
        let (mut tx, mut rx) = channel();
        let data = RoundData {
            judge: 2,
            prompt: Prompt {
                text: "The _ ate my homework.".into(),
                blanks: 1,
            },
            deal: Some(vec![
                DealtCard {
                    slot: 0,
                    text: "a very polite goat".into(),
                },
                DealtCard {
                    slot: 4,
                    text: "the neighbour's trombone".into(),
                },
            ]),
        };
        data.write_to(&mut tx).await.unwrap();
        assert_eq!(RoundData::read_from(&mut rx, 0, 3, 10).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_round_data_for_judge_has_no_deal() {
        let (mut tx, mut rx) = channel();
        let data = RoundData {
            judge: 1,
            prompt: Prompt {
                text: "_".into(),
                blanks: 1,
            },
            deal: None,
        };
        data.write_to(&mut tx).await.unwrap();
        // Reader is player 1, i.e. the judge: no deal block on the wire.
        assert_eq!(RoundData::read_from(&mut rx, 1, 3, 10).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_card_choices_round_trip() {
        let (mut tx, mut rx) = channel();
        let picks = vec![
            DealtCard {
                slot: 3,
                text: "an unlicensed wizard".into(),
            },
            DealtCard {
                slot: 7,
                text: "breakfast for dinner".into(),
            },
        ];
        send_card_choices(&mut tx, &picks).await.unwrap();
        assert_eq!(recv_card_choices(&mut rx, 2, 10).await.unwrap(), picks);
    }

    #[tokio::test]
    async fn test_fan_out_round_trip() {
        let (mut tx, mut rx) = channel();
        let submissions = vec![
            vec!["first card".to_string(), "second card".to_string()],
            vec!["third card".to_string(), "fourth card".to_string()],
        ];
        send_fan_out(&mut tx, &submissions).await.unwrap();
        assert_eq!(recv_fan_out(&mut rx, 2, 4).await.unwrap(), submissions);
    }

    #[tokio::test]
    async fn test_verdict_round_trip_and_bounds() {
        let (mut tx, mut rx) = channel();
        let verdict = Verdict {
            origin: 2,
            chosen: 1,
        };
        verdict.write_to(&mut tx).await.unwrap();
        assert_eq!(Verdict::read_from(&mut rx, 3, 2).await.unwrap(), verdict);

        let out_of_range = Verdict {
            origin: 2,
            chosen: 5,
        };
        out_of_range.write_to(&mut tx).await.unwrap();
        assert!(matches!(
            Verdict::read_from(&mut rx, 3, 2).await,
            Err(Fault::Protocol(ProtocolViolation::IndexOutOfRange { .. }))
        ));
    }
}
