//! The round orchestrator: canonical game state and the master round loop.
//!
//! One orchestrator task owns the judge selection, the prompt draw, the
//! hand redeals, the submission shuffle, and the scoring. It never
//! touches a socket; the per-player session tasks do all the talking and
//! meet the orchestrator at the phase primitives. Round state crosses
//! between them through one `RwLock`, written only at phase boundaries.

use std::sync::Arc;

use clap::ValueEnum;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tokio::sync::RwLock;

use shared::error::{ConfigFault, GameResult, ProtocolViolation};
use shared::protocol::{DealtCard, Prompt, Verdict};
use shared::session::RoundSync;
use shared::sync::Shutdown;

use crate::deck::{CardDeck, PromptDeck};
use crate::roster::Roster;

/// How the judge seat moves between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum JudgePolicy {
    /// Seat `round mod players`; deterministic and fair.
    Rotation,
    /// Uniform over all seats, drawn from the injected RNG.
    Random,
}

impl JudgePolicy {
    pub fn pick(&self, round: u64, players: usize, rng: &mut StdRng) -> usize {
        match self {
            JudgePolicy::Rotation => (round % players as u64) as usize,
            JudgePolicy::Random => rng.gen_range(0..players),
        }
    }
}

/// Used-slot bookkeeping for every hand.
///
/// A slot's bit is set while the card in it has been consumed: all bits
/// start set (nothing has been dealt yet), a redeal clears exactly the
/// bits it refreshes, and playing a card sets its bit again. A player
/// judging a round keeps their bits untouched, which is why their first
/// contestant round after judging redeals more than `blanks` slots.
pub struct HandSlots {
    used: Vec<Vec<bool>>,
}

impl HandSlots {
    pub fn new(players: usize, capacity: usize) -> Self {
        Self {
            used: vec![vec![true; capacity]; players],
        }
    }

    /// Draw a replacement card into every used slot of `player`'s hand.
    /// Returns the dealt cards, slot-addressed; clears each refreshed bit.
    pub fn redeal(
        &mut self,
        player: usize,
        deck: &mut CardDeck,
    ) -> Result<Vec<DealtCard>, ConfigFault> {
        let slots = &mut self.used[player];
        let mut dealt = Vec::new();
        for (slot, used) in slots.iter_mut().enumerate() {
            if !*used {
                continue;
            }
            let text = deck.draw().ok_or(ConfigFault::DeckExhausted("card"))?;
            *used = false;
            dealt.push(DealtCard { slot, text });
        }
        Ok(dealt)
    }

    /// Consume the card in `slot`. Rejects a slot that is already
    /// consumed: the protocol never lets a player replay a card, so a
    /// set bit here means the peer is broken or hostile.
    pub fn mark_played(&mut self, player: usize, slot: usize) -> Result<(), ProtocolViolation> {
        let used = &mut self.used[player][slot];
        if *used {
            return Err(ProtocolViolation::SlotAlreadyPlayed { player, slot });
        }
        *used = true;
        Ok(())
    }

    #[cfg(test)]
    fn is_used(&self, player: usize, slot: usize) -> bool {
        self.used[player][slot]
    }
}

/// One player's play for the round. Carries the originating player so
/// identity survives the fan-out shuffle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub player: usize,
    pub picks: Vec<DealtCard>,
}

impl Submission {
    pub fn texts(&self) -> Vec<String> {
        self.picks.iter().map(|p| p.text.clone()).collect()
    }
}

/// Canonical state of the round in flight, shared between the
/// orchestrator and the session tasks behind one `RwLock`.
///
/// Writers take turns by phase: the orchestrator before `data_ready` and
/// after `round_reset`, contestant receivers during submission
/// collection, the judge's receiver at the pick. Everyone else reads.
pub struct RoundState {
    pub round: u64,
    pub judge: usize,
    pub prompt: Option<Prompt>,
    /// Freshly dealt cards per player; the judge's entry stays empty.
    pub deal: Vec<Vec<DealtCard>>,
    /// Arrival order until the orchestrator shuffles, fan-out order after.
    pub submissions: Vec<Submission>,
    pub verdict: Option<Verdict>,
}

impl RoundState {
    pub fn new(players: usize) -> Self {
        Self {
            round: 0,
            judge: 0,
            prompt: None,
            deal: vec![Vec::new(); players],
            submissions: Vec::new(),
            verdict: None,
        }
    }

    /// The round's prompt; a read before `data_ready` is a phase bug.
    pub fn prompt(&self) -> GameResult<&Prompt> {
        self.prompt
            .as_ref()
            .ok_or_else(|| ProtocolViolation::PhaseDesync("prompt read before data_ready").into())
    }

    /// The judge's verdict; a read before `judge_choice_made` is a
    /// phase bug.
    pub fn verdict(&self) -> GameResult<Verdict> {
        self.verdict
            .ok_or_else(|| ProtocolViolation::PhaseDesync("verdict read before judge choice").into())
    }

    /// The submissions as the clients will see them: texts only, in the
    /// current (post-shuffle) list order.
    pub fn fan_out_texts(&self) -> Vec<Vec<String>> {
        self.submissions.iter().map(|s| s.texts()).collect()
    }

    fn reset(&mut self) {
        self.prompt = None;
        for slots in &mut self.deal {
            slots.clear();
        }
        self.submissions.clear();
        self.verdict = None;
    }
}

/// The master round loop.
pub struct RoundOrchestrator {
    roster: Roster,
    prompts: PromptDeck,
    cards: CardDeck,
    policy: JudgePolicy,
    rng: StdRng,
    hands: HandSlots,
    rounds: u64,
    state: Arc<RwLock<RoundState>>,
    sync: Arc<RoundSync>,
    shutdown: Shutdown,
}

impl RoundOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        roster: Roster,
        prompts: PromptDeck,
        cards: CardDeck,
        policy: JudgePolicy,
        rng: StdRng,
        hand_size: usize,
        rounds: u64,
        state: Arc<RwLock<RoundState>>,
        sync: Arc<RoundSync>,
        shutdown: Shutdown,
    ) -> Self {
        let hands = HandSlots::new(roster.len(), hand_size);
        Self {
            roster,
            prompts,
            cards,
            policy,
            rng,
            hands,
            rounds,
            state,
            sync,
            shutdown,
        }
    }

    /// Drive every round to completion and return the final roster with
    /// its scores.
    pub async fn run(mut self) -> GameResult<Roster> {
        for round in 0..self.rounds {
            self.open_round(round).await?;
            self.sync
                .choices_submitted
                .observe(round, &self.shutdown)
                .await?;
            self.shuffle_submissions().await;
            self.sync.choices_fanned_out.signal();
            self.sync
                .judge_choice_made
                .wait(round, &self.shutdown)
                .await?;
            self.settle_round(round).await?;
            self.sync.round_reset.observe(round, &self.shutdown).await?;
            self.close_round().await;
        }
        info!("Game over after {} rounds", self.rounds);
        Ok(self.roster)
    }

    /// Pick the judge, draw the prompt, redeal every contestant's used
    /// slots, publish it all, and open the round.
    async fn open_round(&mut self, round: u64) -> GameResult<()> {
        let players = self.roster.len();
        let judge = self.policy.pick(round, players, &mut self.rng);
        let prompt = self
            .prompts
            .draw()
            .ok_or(ConfigFault::DeckExhausted("prompt"))?;
        info!(
            "Round {}/{}: {:?} judges, prompt takes {} card(s)",
            round + 1,
            self.rounds,
            self.roster.username(judge),
            prompt.blanks
        );

        let mut deal = vec![Vec::new(); players];
        for (player, slots) in deal.iter_mut().enumerate() {
            if player == judge {
                continue;
            }
            *slots = self.hands.redeal(player, &mut self.cards)?;
        }

        let mut state = self.state.write().await;
        state.round = round;
        state.judge = judge;
        state.prompt = Some(prompt);
        state.deal = deal;
        drop(state);

        self.sync.data_ready.signal();
        Ok(())
    }

    async fn shuffle_submissions(&mut self) {
        let mut state = self.state.write().await;
        state.submissions.shuffle(&mut self.rng);
        debug!("Fanning out {} submissions", state.submissions.len());
    }

    /// Award the verdict and consume the played slots so the next redeal
    /// refreshes them.
    async fn settle_round(&mut self, round: u64) -> GameResult<()> {
        let (verdict, played) = {
            let state = self.state.read().await;
            let played: Vec<(usize, usize)> = state
                .submissions
                .iter()
                .flat_map(|s| s.picks.iter().map(|p| (s.player, p.slot)))
                .collect();
            (state.verdict()?, played)
        };
        for (player, slot) in played {
            self.hands.mark_played(player, slot)?;
        }
        self.roster.award(verdict.origin);
        info!(
            "Round {} goes to {:?} (list position {})",
            round + 1,
            self.roster.username(verdict.origin),
            verdict.chosen
        );
        Ok(())
    }

    /// Clear round state and advance the gates once every session task
    /// has passed the reset rendezvous.
    async fn close_round(&mut self) {
        let mut state = self.state.write().await;
        state.reset();
        drop(state);
        self.sync.rearm_gates();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn card_deck(cards: usize) -> CardDeck {
        let mut file = NamedTempFile::new().unwrap();
        for i in 0..cards {
            writeln!(file, "card {}", i).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(99);
        CardDeck::load(file.path(), &mut rng).unwrap()
    }

    #[test]
    fn test_first_redeal_fills_whole_hand() {
        let mut hands = HandSlots::new(2, 4);
        let mut deck = card_deck(16);

        let dealt = hands.redeal(0, &mut deck).unwrap();
        assert_eq!(dealt.len(), 4);
        let slots: Vec<usize> = dealt.iter().map(|d| d.slot).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        for slot in 0..4 {
            assert!(!hands.is_used(0, slot));
        }
        // The other player's hand is untouched.
        for slot in 0..4 {
            assert!(hands.is_used(1, slot));
        }
    }

    #[test]
    fn test_redeal_touches_only_played_slots() {
        let mut hands = HandSlots::new(1, 4);
        let mut deck = card_deck(16);
        hands.redeal(0, &mut deck).unwrap();

        hands.mark_played(0, 2).unwrap();
        let dealt = hands.redeal(0, &mut deck).unwrap();
        assert_eq!(dealt.len(), 1);
        assert_eq!(dealt[0].slot, 2);
        assert!(!hands.is_used(0, 2));
    }

    #[test]
    fn test_untouched_hand_redeals_nothing() {
        let mut hands = HandSlots::new(1, 4);
        let mut deck = card_deck(16);
        hands.redeal(0, &mut deck).unwrap();
        // A judge round passes with no plays; the next redeal is empty.
        let dealt = hands.redeal(0, &mut deck).unwrap();
        assert!(dealt.is_empty());
    }

    #[test]
    fn test_replayed_slot_rejected() {
        let mut hands = HandSlots::new(1, 4);
        let mut deck = card_deck(16);
        hands.redeal(0, &mut deck).unwrap();

        hands.mark_played(0, 1).unwrap();
        let err = hands.mark_played(0, 1).unwrap_err();
        assert!(matches!(
            err,
            ProtocolViolation::SlotAlreadyPlayed { player: 0, slot: 1 }
        ));
    }

    #[test]
    fn test_dry_deck_is_config_fault() {
        let mut hands = HandSlots::new(1, 4);
        let mut deck = card_deck(2);
        let err = hands.redeal(0, &mut deck).unwrap_err();
        assert!(matches!(err, ConfigFault::DeckExhausted("card")));
    }

    #[test]
    fn test_rotation_policy_cycles() {
        let mut rng = StdRng::seed_from_u64(0);
        let picks: Vec<usize> = (0..6)
            .map(|round| JudgePolicy::Rotation.pick(round, 3, &mut rng))
            .collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_random_policy_stays_in_range_and_is_seeded() {
        let mut rng_a = StdRng::seed_from_u64(5);
        let mut rng_b = StdRng::seed_from_u64(5);
        for round in 0..50 {
            let a = JudgePolicy::Random.pick(round, 4, &mut rng_a);
            let b = JudgePolicy::Random.pick(round, 4, &mut rng_b);
            assert!(a < 4);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_shuffle_keeps_submission_identity() {
        let mut state = RoundState::new(4);
        for player in 0..3usize {
            state.submissions.push(Submission {
                player,
                picks: vec![DealtCard {
                    slot: player,
                    text: format!("card of {}", player),
                }],
            });
        }
        let mut rng = StdRng::seed_from_u64(11);
        state.submissions.shuffle(&mut rng);

        // However the list landed, position k's texts belong to position
        // k's recorded player, so a verdict for position k credits the
        // player whose card the judge actually saw.
        let texts = state.fan_out_texts();
        for (k, submission) in state.submissions.iter().enumerate() {
            assert_eq!(texts[k], vec![format!("card of {}", submission.player)]);
        }
    }

    #[test]
    fn test_phase_accessors_reject_unset_state() {
        let state = RoundState::new(3);
        assert!(state.prompt().is_err());
        assert!(state.verdict().is_err());
    }
}
