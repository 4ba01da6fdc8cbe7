//! The player-facing surface.
//!
//! The session logic only ever talks to the [`Ui`] trait, so the same
//! loops drive the interactive terminal and the scripted player the
//! tests use.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use shared::error::{Fault, GameResult};
use shared::protocol::Prompt;

use crate::view::{GameSummary, GameView};

/// Everything the session loops need from a player.
///
/// Picking methods are async because a human takes their time; display
/// methods are fire-and-forget.
#[async_trait]
pub trait Ui: Send + Sync {
    async fn ask_username(&self) -> GameResult<String>;

    /// Called once per round as soon as the round data lands.
    fn show_round(&self, view: &GameView);

    /// Pick `prompt.blanks` distinct hand slots, in the order the cards
    /// fill the blanks.
    async fn pick_cards(&self, prompt: &Prompt, hand: &[String]) -> GameResult<Vec<usize>>;

    /// Called on every contestant once the anonymized pool is known.
    fn show_pool(&self, pool: &[Vec<String>]);

    /// Judge only: pick the winning entry's position in the pool.
    async fn pick_winner(&self, pool: &[Vec<String>]) -> GameResult<usize>;

    fn show_verdict(&self, winner: &str, cards: &[String], mine: bool);

    /// Hold the round open until the player is ready to move on.
    async fn confirm_next_round(&self) -> GameResult<()>;

    fn show_final(&self, summary: &GameSummary);
}

/// Line-oriented terminal player over async stdin.
pub struct TerminalUi {
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalUi {
    pub fn new() -> Self {
        Self {
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// One line of input; a closed stdin means the player quit.
    async fn read_line(&self) -> GameResult<String> {
        let mut input = self.input.lock().await;
        match input.next_line().await? {
            Some(line) => Ok(line),
            None => Err(Fault::Aborted),
        }
    }

    /// Keep asking until the player names a valid 1-based entry.
    async fn read_pick(&self, what: &str, limit: usize) -> GameResult<usize> {
        loop {
            println!("{} (1-{}):", what, limit);
            let line = self.read_line().await?;
            match line.trim().parse::<usize>() {
                Ok(n) if n >= 1 && n <= limit => return Ok(n - 1),
                _ => println!("Enter a number between 1 and {}.", limit),
            }
        }
    }
}

impl Default for TerminalUi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ui for TerminalUi {
    async fn ask_username(&self) -> GameResult<String> {
        loop {
            println!("Enter your username:");
            let line = self.read_line().await?;
            let username = line.trim();
            if !username.is_empty() {
                return Ok(username.to_string());
            }
        }
    }

    fn show_round(&self, view: &GameView) {
        println!();
        println!("=== Round {} of {} ===", view.round + 1, view.rounds);
        for (seat, player) in view.players.iter().enumerate() {
            let marker = if seat == view.judge { " [judge]" } else { "" };
            let you = if seat == view.me { " (you)" } else { "" };
            println!("  {}: {} point(s){}{}", player.username, player.score, marker, you);
        }
        println!("Prompt: {}", view.prompt.text);
        if view.judged_by_me() {
            println!("You judge this round. Waiting for submissions...");
        }
    }

    async fn pick_cards(&self, prompt: &Prompt, hand: &[String]) -> GameResult<Vec<usize>> {
        println!("Your hand:");
        for (i, card) in hand.iter().enumerate() {
            println!("  {:2}. {}", i + 1, card);
        }
        let mut picks: Vec<usize> = Vec::with_capacity(prompt.blanks);
        while picks.len() < prompt.blanks {
            let what = format!("Pick card {} of {}", picks.len() + 1, prompt.blanks);
            let slot = self.read_pick(&what, hand.len()).await?;
            if picks.contains(&slot) {
                println!("Card {} is already picked.", slot + 1);
            } else {
                picks.push(slot);
            }
        }
        Ok(picks)
    }

    fn show_pool(&self, pool: &[Vec<String>]) {
        println!("Submissions:");
        for (i, entry) in pool.iter().enumerate() {
            println!("  {:2}. {}", i + 1, entry.join(" / "));
        }
    }

    async fn pick_winner(&self, pool: &[Vec<String>]) -> GameResult<usize> {
        self.read_pick("Pick the winning entry", pool.len()).await
    }

    fn show_verdict(&self, winner: &str, cards: &[String], mine: bool) {
        println!("Winner: {} with {:?}", winner, cards.join(" / "));
        if mine {
            println!("You win this round!");
        }
    }

    async fn confirm_next_round(&self) -> GameResult<()> {
        println!("Press Enter to continue...");
        self.read_line().await?;
        Ok(())
    }

    fn show_final(&self, summary: &GameSummary) {
        println!();
        println!("=== Final scores ===");
        for player in &summary.players {
            println!("  {}: {} point(s)", player.username, player.score);
        }
        if let Some(champion) = summary.champion() {
            println!("{} wins the game!", champion.username);
        }
    }
}

/// A player that never waits: lowest slots for cards, queued picks for
/// verdicts. Drives full games in tests without a terminal.
pub struct ScriptedUi {
    winner_picks: Mutex<VecDeque<usize>>,
    linger: Option<Duration>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self {
            winner_picks: Mutex::new(VecDeque::new()),
            linger: None,
        }
    }

    /// Queue up judge picks; once drained, entry 0 wins every round.
    pub fn with_winner_picks(picks: impl IntoIterator<Item = usize>) -> Self {
        Self {
            winner_picks: Mutex::new(picks.into_iter().collect()),
            linger: None,
        }
    }

    /// Linger on every confirmation. A scripted table finishes in
    /// milliseconds otherwise, too fast to abort a game mid-round.
    pub fn with_confirm_delay(linger: Duration) -> Self {
        Self {
            winner_picks: Mutex::new(VecDeque::new()),
            linger: Some(linger),
        }
    }
}

impl Default for ScriptedUi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ui for ScriptedUi {
    async fn ask_username(&self) -> GameResult<String> {
        Ok("scripted".to_string())
    }

    fn show_round(&self, _view: &GameView) {}

    async fn pick_cards(&self, prompt: &Prompt, _hand: &[String]) -> GameResult<Vec<usize>> {
        Ok((0..prompt.blanks).collect())
    }

    fn show_pool(&self, _pool: &[Vec<String>]) {}

    async fn pick_winner(&self, pool: &[Vec<String>]) -> GameResult<usize> {
        let mut picks = self.winner_picks.lock().await;
        let pick = picks.pop_front().unwrap_or(0);
        Ok(pick.min(pool.len().saturating_sub(1)))
    }

    fn show_verdict(&self, _winner: &str, _cards: &[String], _mine: bool) {}

    async fn confirm_next_round(&self) -> GameResult<()> {
        if let Some(linger) = self.linger {
            tokio::time::sleep(linger).await;
        }
        Ok(())
    }

    fn show_final(&self, _summary: &GameSummary) {}
}
