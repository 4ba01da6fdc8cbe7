//! The player's local picture of the game.
//!
//! [`GameView`] is written by the Receiver task as server messages land
//! and read by the Sender task when it talks to the player. It mirrors
//! only what this client is allowed to know: its own hand, the
//! anonymized pool, and the public verdicts.

use shared::protocol::{DealtCard, Prompt, Verdict, Welcome};

/// One roster row as this client tracks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerView {
    pub username: String,
    pub score: u32,
}

/// One finished round as this client saw it.
#[derive(Debug, Clone)]
pub struct RoundRecord {
    pub round: u64,
    pub judge: usize,
    /// The cards this player submitted, `None` when it judged.
    pub my_cards: Option<Vec<String>>,
    /// The anonymized pool in the order the judge saw it.
    pub pool: Vec<Vec<String>>,
    pub verdict: Verdict,
}

/// What a finished game leaves behind for display and inspection.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub me: usize,
    pub players: Vec<PlayerView>,
    pub history: Vec<RoundRecord>,
}

impl GameSummary {
    /// Highest score wins; earlier seat wins ties, matching the host.
    pub fn champion(&self) -> Option<&PlayerView> {
        let mut best: Option<&PlayerView> = None;
        for player in &self.players {
            match best {
                Some(current) if current.score >= player.score => {}
                _ => best = Some(player),
            }
        }
        best
    }
}

#[derive(Debug, Clone)]
pub struct GameView {
    pub me: usize,
    pub players: Vec<PlayerView>,
    pub rounds: u64,
    pub round: u64,
    pub judge: usize,
    pub prompt: Prompt,
    /// Slot-addressed hand; the server refreshes played slots each deal.
    pub hand: Vec<String>,
    pub pool: Vec<Vec<String>>,
    /// What this player submitted in the current round.
    pub played: Option<Vec<String>>,
    pub verdict: Option<Verdict>,
    pub history: Vec<RoundRecord>,
}

impl GameView {
    pub fn new(welcome: &Welcome) -> Self {
        Self {
            me: welcome.player_id,
            players: welcome
                .roster
                .iter()
                .map(|username| PlayerView {
                    username: username.clone(),
                    score: 0,
                })
                .collect(),
            rounds: welcome.rounds,
            round: 0,
            judge: 0,
            prompt: Prompt::default(),
            hand: vec![String::new(); welcome.hand_capacity],
            pool: Vec::new(),
            played: None,
            verdict: None,
            history: Vec::new(),
        }
    }

    pub fn judged_by_me(&self) -> bool {
        self.judge == self.me
    }

    pub fn username(&self, player: usize) -> &str {
        self.players
            .get(player)
            .map(|p| p.username.as_str())
            .unwrap_or("<unknown>")
    }

    /// Overwrite exactly the slots the server refreshed.
    pub fn apply_deal(&mut self, deal: &[DealtCard]) {
        for card in deal {
            self.hand[card.slot] = card.text.clone();
        }
    }

    /// Record the public outcome and mirror the score change.
    pub fn apply_verdict(&mut self, verdict: Verdict) {
        if let Some(origin) = self.players.get_mut(verdict.origin) {
            origin.score += 1;
        }
        self.verdict = Some(verdict);
    }

    /// Archive the round and clear everything round-scoped. The hand
    /// stays; the next deal refreshes only its played slots.
    pub fn close_round(&mut self) {
        let pool = std::mem::take(&mut self.pool);
        let my_cards = self.played.take();
        if let Some(verdict) = self.verdict.take() {
            self.history.push(RoundRecord {
                round: self.round,
                judge: self.judge,
                my_cards,
                pool,
                verdict,
            });
        }
    }

    pub fn summary(&self) -> GameSummary {
        GameSummary {
            me: self.me,
            players: self.players.clone(),
            history: self.history.clone(),
        }
    }
}
