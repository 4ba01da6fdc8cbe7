//! Player roster and score bookkeeping
//!
//! The roster is filled once by the acceptor before the game starts and
//! never changes shape afterwards: players keep their seat index for the
//! whole game, and that index is the player id the protocol and the
//! orchestrator use everywhere.

use log::info;

use shared::error::ProtocolViolation;

/// One seated player.
///
/// The id doubles as the seat index into every per-player structure the
/// orchestrator keeps. Scores only ever go up, one point per round won.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: usize,
    pub username: String,
    pub score: u32,
}

/// All seated players, in join order.
///
/// Username uniqueness is enforced here at join time; it is the only
/// identity check the game performs.
#[derive(Debug)]
pub struct Roster {
    players: Vec<Player>,
    capacity: usize,
}

impl Roster {
    /// An empty roster with seats for `capacity` players.
    pub fn new(capacity: usize) -> Self {
        Self {
            players: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Seat a new player.
    ///
    /// Returns the assigned player id, or the violation to answer the
    /// join with when the username is already taken. Callers stop
    /// accepting once the roster is full, so joining a full roster is a
    /// caller bug.
    pub fn try_join(&mut self, username: &str) -> Result<usize, ProtocolViolation> {
        debug_assert!(!self.is_full());
        if self.players.iter().any(|p| p.username == username) {
            return Err(ProtocolViolation::DuplicateUsername(username.to_string()));
        }
        let id = self.players.len();
        self.players.push(Player {
            id,
            username: username.to_string(),
            score: 0,
        });
        info!("Player {} joined as {:?}", id, username);
        Ok(id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn usernames(&self) -> Vec<String> {
        self.players.iter().map(|p| p.username.clone()).collect()
    }

    pub fn username(&self, id: usize) -> &str {
        self.players
            .get(id)
            .map(|p| p.username.as_str())
            .unwrap_or("<unknown>")
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// Credit one round win to `id`.
    pub fn award(&mut self, id: usize) {
        debug_assert!(id < self.players.len());
        if let Some(player) = self.players.get_mut(id) {
            player.score += 1;
            info!(
                "Point to {:?} (score now {})",
                player.username, player.score
            );
        }
    }

    /// The player with the highest score; ties go to the earlier seat.
    pub fn champion(&self) -> Option<&Player> {
        let mut best: Option<&Player> = None;
        for player in &self.players {
            if best.map_or(true, |b| player.score > b.score) {
                best = Some(player);
            }
        }
        best
    }
}
