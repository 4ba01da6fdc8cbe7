//! Deck loading and drawing.
//!
//! Both decks are plain text. A prompt deck alternates a prompt line with
//! a line holding its blank count; a card deck is one card per line.
//! Each deck is shuffled once at load with the injected RNG and then
//! drawn front to back, so no entry is ever handed out twice.

use std::fs;
use std::path::Path;

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use shared::error::ConfigFault;
use shared::protocol::Prompt;

fn label(path: &Path) -> String {
    path.display().to_string()
}

/// The fill-in-the-blank prompts, one drawn per round.
#[derive(Debug)]
pub struct PromptDeck {
    path: String,
    prompts: Vec<Prompt>,
    next: usize,
}

impl PromptDeck {
    pub fn load(path: &Path, rng: &mut StdRng) -> Result<Self, ConfigFault> {
        let text = fs::read_to_string(path).map_err(|source| ConfigFault::DeckUnreadable {
            path: label(path),
            source,
        })?;
        let mut deck = Self::parse(label(path), &text)?;
        deck.prompts.shuffle(rng);
        info!("Loaded {} prompts from {}", deck.prompts.len(), deck.path);
        Ok(deck)
    }

    fn parse(path: String, text: &str) -> Result<Self, ConfigFault> {
        let mut prompts = Vec::new();
        let mut lines = text.lines().enumerate();
        while let Some((_, line)) = lines.next() {
            let prompt_text = line.trim();
            if prompt_text.is_empty() {
                continue;
            }
            let (count_no, count_line) = lines.next().ok_or_else(|| {
                ConfigFault::MalformedDeck {
                    path: path.clone(),
                    line: text.lines().count(),
                    detail: "prompt text without a blank-count line".to_string(),
                }
            })?;
            let count_line = count_line.trim();
            let blanks: usize =
                count_line
                    .parse()
                    .map_err(|_| ConfigFault::MalformedDeck {
                        path: path.clone(),
                        line: count_no + 1,
                        detail: format!("blank count {:?} is not a number", count_line),
                    })?;
            if blanks == 0 {
                return Err(ConfigFault::MalformedDeck {
                    path: path.clone(),
                    line: count_no + 1,
                    detail: "blank count must be at least 1".to_string(),
                });
            }
            prompts.push(Prompt {
                text: prompt_text.to_string(),
                blanks,
            });
        }
        if prompts.is_empty() {
            return Err(ConfigFault::EmptyDeck { path });
        }
        Ok(Self {
            path,
            prompts,
            next: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Largest blank count in the deck; bounds the per-round card spend.
    pub fn max_blanks(&self) -> usize {
        self.prompts.iter().map(|p| p.blanks).max().unwrap_or(0)
    }

    /// Fail unless the deck can cover `need` draws.
    pub fn require(&self, need: usize) -> Result<(), ConfigFault> {
        if self.prompts.len() < need {
            return Err(ConfigFault::DeckTooSmall {
                path: self.path.clone(),
                have: self.prompts.len(),
                need,
            });
        }
        Ok(())
    }

    /// Next never-drawn prompt, or `None` once the deck is spent.
    pub fn draw(&mut self) -> Option<Prompt> {
        let prompt = self.prompts.get(self.next).cloned()?;
        self.next += 1;
        Some(prompt)
    }
}

/// The playable answer cards.
pub struct CardDeck {
    path: String,
    cards: Vec<String>,
    next: usize,
}

impl CardDeck {
    pub fn load(path: &Path, rng: &mut StdRng) -> Result<Self, ConfigFault> {
        let text = fs::read_to_string(path).map_err(|source| ConfigFault::DeckUnreadable {
            path: label(path),
            source,
        })?;
        let cards: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if cards.is_empty() {
            return Err(ConfigFault::EmptyDeck { path: label(path) });
        }
        let mut deck = Self {
            path: label(path),
            cards,
            next: 0,
        };
        deck.cards.shuffle(rng);
        info!("Loaded {} cards from {}", deck.cards.len(), deck.path);
        Ok(deck)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn require(&self, need: usize) -> Result<(), ConfigFault> {
        if self.cards.len() < need {
            return Err(ConfigFault::DeckTooSmall {
                path: self.path.clone(),
                have: self.cards.len(),
                need,
            });
        }
        Ok(())
    }

    pub fn draw(&mut self) -> Option<String> {
        let card = self.cards.get(self.next).cloned()?;
        self.next += 1;
        Some(card)
    }
}
