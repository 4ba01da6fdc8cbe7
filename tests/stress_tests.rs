//! Stress tests for the round synchronization and whole tables
//!
//! These tests push the phase primitives through many tasks and many
//! generations, then play complete games at every supported table size.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use client::session::GameClient;
use client::ui::{ScriptedUi, Ui};
use client::view::GameSummary;
use server::config::GameConfig;
use server::orchestrator::JudgePolicy;
use server::roster::Roster;
use shared::error::{ConfigFault, Fault, GameResult};
use shared::sync::{Barrier, Gate, Shutdown};

const PATIENCE: Duration = Duration::from_secs(30);

/// SYNCHRONIZATION PRIMITIVE STRESS TESTS
mod sync_stress_tests {
    use super::*;

    /// Many tasks arriving at the same barrier for many generations in
    /// a row must release every generation exactly once and never lose
    /// an arrival to the re-arm.
    #[tokio::test]
    async fn barrier_survives_many_tasks_and_generations() {
        let tasks = 24;
        let generations = 50u64;
        let barrier = Arc::new(Barrier::new(tasks));
        let shutdown = Shutdown::new();

        let mut handles = Vec::new();
        for _ in 0..tasks {
            let barrier = Arc::clone(&barrier);
            let shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                for round in 0..generations {
                    barrier.arrive(round, &shutdown).await?;
                }
                Ok::<(), Fault>(())
            }));
        }

        for handle in handles {
            timeout(PATIENCE, handle)
                .await
                .expect("barrier rounds should all release")
                .expect("no panic")
                .expect("no fault");
        }

        // A watcher joining after the fact sees every generation done.
        timeout(PATIENCE, barrier.observe(generations - 1, &shutdown))
            .await
            .expect("completed generations release observers immediately")
            .expect("no fault");
    }

    /// A gate signaled and re-armed across many generations releases
    /// every waiter of the current generation and every straggler from
    /// an older one.
    #[tokio::test]
    async fn gate_reopens_cleanly_across_generations() {
        let gate = Arc::new(Gate::new());
        let shutdown = Shutdown::new();

        for round in 0..100u64 {
            let mut waiters = Vec::new();
            for _ in 0..8 {
                let gate = Arc::clone(&gate);
                let shutdown = shutdown.clone();
                waiters.push(tokio::spawn(
                    async move { gate.wait(round, &shutdown).await },
                ));
            }
            gate.signal();
            for waiter in waiters {
                timeout(PATIENCE, waiter)
                    .await
                    .expect("signaled gate should release")
                    .expect("no panic")
                    .expect("no fault");
            }
            gate.rearm();
        }

        // Stragglers of long-gone generations fall straight through.
        timeout(PATIENCE, gate.wait(5, &shutdown))
            .await
            .expect("old generations never block")
            .expect("no fault");
    }

    /// The shutdown signal must cut through every kind of blocked wait
    /// at once.
    #[tokio::test]
    async fn shutdown_releases_every_kind_of_waiter() {
        let gate = Arc::new(Gate::new());
        let barrier = Arc::new(Barrier::new(100));
        let shutdown = Shutdown::new();

        let mut blocked: Vec<JoinHandle<GameResult<()>>> = Vec::new();
        for _ in 0..10 {
            let gate = Arc::clone(&gate);
            let shutdown = shutdown.clone();
            blocked.push(tokio::spawn(
                async move { gate.wait(0, &shutdown).await },
            ));
        }
        for _ in 0..10 {
            let barrier = Arc::clone(&barrier);
            let shutdown = shutdown.clone();
            blocked.push(tokio::spawn(async move {
                barrier.arrive(0, &shutdown).await
            }));
        }
        for _ in 0..10 {
            let barrier = Arc::clone(&barrier);
            let shutdown = shutdown.clone();
            blocked.push(tokio::spawn(async move {
                barrier.observe(0, &shutdown).await
            }));
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trip();

        for handle in blocked {
            let fault = timeout(PATIENCE, handle)
                .await
                .expect("tripped shutdown should release waiters")
                .expect("no panic")
                .expect_err("blocked waiters must abort");
            assert!(fault.is_abort());
        }
    }
}

/// TABLE SIZE TESTS
mod table_size_tests {
    use super::*;

    /// The two-player minimum: one judge, one contestant, a pool of
    /// exactly one entry every round.
    #[tokio::test]
    async fn two_player_table_completes() {
        let rounds = 6;
        let host = spawn_host(config(2, rounds, 4), MIXED_PROMPTS, 80).await;
        let clients = vec![
            spawn_scripted(host.addr.clone(), "ada"),
            spawn_scripted(host.addr.clone(), "grace"),
        ];

        let roster = host.finish().await.expect("host should finish cleanly");
        let total: u32 = roster.players().iter().map(|p| p.score).sum();
        assert_eq!(total, rounds as u32);

        for client in clients {
            let summary = finish_client(client).await;
            for record in &summary.history {
                assert_eq!(record.pool.len(), 1);
                assert_eq!(record.verdict.chosen, 0);
                assert_ne!(record.verdict.origin, record.judge);
            }
        }
    }

    /// A five-player table with mixed one- and two-blank prompts plays
    /// every round with a full pool.
    #[tokio::test]
    async fn five_player_table_completes() {
        let rounds = 5;
        let host = spawn_host(config(5, rounds, 6), MIXED_PROMPTS, 160).await;
        let names = ["ada", "grace", "edsger", "barbara", "alan"];
        let clients: Vec<_> = names
            .iter()
            .map(|name| spawn_scripted(host.addr.clone(), name))
            .collect();

        let roster = host.finish().await.expect("host should finish cleanly");
        let total: u32 = roster.players().iter().map(|p| p.score).sum();
        assert_eq!(total, rounds as u32);

        for client in clients {
            let summary = finish_client(client).await;
            assert_eq!(summary.history.len(), rounds as usize);
            for record in &summary.history {
                assert_eq!(record.pool.len(), 4);
                let width = record.pool[0].len();
                assert!(width == 1 || width == 2);
                for entry in &record.pool {
                    assert_eq!(entry.len(), width, "uniform width per round");
                }
            }
        }
    }

    /// Back-to-back games on fresh listeners do not interfere.
    #[tokio::test]
    async fn consecutive_games_stay_independent() {
        for _ in 0..3 {
            let host = spawn_host(config(2, 2, 4), MIXED_PROMPTS, 40).await;
            let clients = vec![
                spawn_scripted(host.addr.clone(), "ada"),
                spawn_scripted(host.addr.clone(), "grace"),
            ];
            let roster = host.finish().await.expect("host should finish cleanly");
            let total: u32 = roster.players().iter().map(|p| p.score).sum();
            assert_eq!(total, 2);
            for client in clients {
                finish_client(client).await;
            }
        }
    }
}

/// STARTUP GUARD TESTS
mod startup_guard_tests {
    use super::*;

    /// A card deck too small for the worst case is refused before any
    /// player can connect.
    #[tokio::test]
    async fn scarce_deck_is_refused_at_startup() {
        let host = spawn_host(config(3, 10, 10), MIXED_PROMPTS, 20).await;
        let fault = host.finish().await.expect_err("a scarce deck cannot host");
        assert!(matches!(
            fault,
            Fault::Config(ConfigFault::DeckTooSmall { .. })
        ));
    }

    /// Fewer prompts than rounds is refused the same way.
    #[tokio::test]
    async fn short_prompt_deck_is_refused_at_startup() {
        let host = spawn_host(config(3, 50, 10), MIXED_PROMPTS, 400).await;
        let fault = host.finish().await.expect_err("too few prompts cannot host");
        assert!(matches!(
            fault,
            Fault::Config(ConfigFault::DeckTooSmall { .. })
        ));
    }
}

// HELPER FUNCTIONS

/// Ten prompts, one or two blanks each.
const MIXED_PROMPTS: &str = "Why _?\n1\nMix _ with _\n2\nBehold _\n1\nTrade _ for _\n2\nNever trust _\n1\nFirst _, then _\n2\nAlways pack _\n1\nThe prize: _\n1\nPack _ and _\n2\nBeware _\n1\n";

fn config(players: usize, rounds: u64, hand_size: usize) -> GameConfig {
    GameConfig {
        players,
        rounds,
        hand_size,
        judge_policy: JudgePolicy::Rotation,
        seed: Some(23),
    }
}

struct Host {
    addr: String,
    game: JoinHandle<GameResult<Roster>>,
    _decks: TempDir,
}

impl Host {
    async fn finish(self) -> GameResult<Roster> {
        timeout(PATIENCE, self.game)
            .await
            .expect("host should finish in time")
            .expect("host task should not panic")
    }
}

async fn spawn_host(config: GameConfig, prompts: &str, cards: usize) -> Host {
    let decks = tempfile::tempdir().expect("tempdir");
    let prompt_path: PathBuf = decks.path().join("prompts.txt");
    let card_path: PathBuf = decks.path().join("cards.txt");
    std::fs::write(&prompt_path, prompts).expect("write prompts");
    let card_lines: String = (0..cards).map(|i| format!("card number {}\n", i)).collect();
    std::fs::write(&card_path, card_lines).expect("write cards");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let game = tokio::spawn(async move {
        server::run(listener, config, &prompt_path, &card_path, Shutdown::new()).await
    });
    Host {
        addr,
        game,
        _decks: decks,
    }
}

fn spawn_scripted(addr: String, username: &str) -> JoinHandle<GameResult<GameSummary>> {
    let username = username.to_string();
    tokio::spawn(async move {
        let ui: Arc<dyn Ui> = Arc::new(ScriptedUi::new());
        let client = GameClient::connect(&addr, &username, ui, Shutdown::new()).await?;
        client.run().await
    })
}

async fn finish_client(client: JoinHandle<GameResult<GameSummary>>) -> GameSummary {
    timeout(PATIENCE, client)
        .await
        .expect("client should finish in time")
        .expect("client task should not panic")
        .expect("client should finish cleanly")
}
