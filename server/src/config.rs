//! Startup settings, bounds checking, and the deck budget.

use rand::rngs::StdRng;
use rand::SeedableRng;

use shared::error::ConfigFault;
use shared::protocol::{MAX_HAND, MAX_PLAYERS, MAX_ROUNDS};

use crate::deck::{CardDeck, PromptDeck};
use crate::orchestrator::JudgePolicy;

/// Everything the operator decides before the first connection.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub players: usize,
    pub rounds: u64,
    pub hand_size: usize,
    pub judge_policy: JudgePolicy,
    /// Fixed seed for reproducible games, entropy when absent.
    pub seed: Option<u64>,
}

impl GameConfig {
    /// Reject settings the protocol cannot carry before anything binds
    /// or loads.
    pub fn validate(&self) -> Result<(), ConfigFault> {
        if self.players < 2 || self.players > MAX_PLAYERS {
            return Err(ConfigFault::InvalidSetting(format!(
                "players must be between 2 and {}, got {}",
                MAX_PLAYERS, self.players
            )));
        }
        if self.rounds == 0 || self.rounds > MAX_ROUNDS as u64 {
            return Err(ConfigFault::InvalidSetting(format!(
                "rounds must be between 1 and {}, got {}",
                MAX_ROUNDS, self.rounds
            )));
        }
        if self.hand_size == 0 || self.hand_size > MAX_HAND {
            return Err(ConfigFault::InvalidSetting(format!(
                "hand size must be between 1 and {}, got {}",
                MAX_HAND, self.hand_size
            )));
        }
        Ok(())
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Worst-case card spend: every hand filled once, then every
    /// contestant replacing `max_blanks` cards each round. Over-counts
    /// on purpose, so a deck that passes can never run dry mid-game.
    pub fn card_budget(&self, max_blanks: usize) -> usize {
        self.players * self.hand_size + self.rounds as usize * (self.players - 1) * max_blanks
    }

    /// Check both decks against this game before any player connects.
    pub fn validate_decks(&self, prompts: &PromptDeck, cards: &CardDeck) -> Result<(), ConfigFault> {
        prompts.require(self.rounds as usize)?;
        let widest = prompts.max_blanks();
        if widest > self.hand_size {
            return Err(ConfigFault::InvalidSetting(format!(
                "a prompt asks for {} cards but hands hold only {}",
                widest, self.hand_size
            )));
        }
        cards.require(self.card_budget(widest))?;
        Ok(())
    }
}
