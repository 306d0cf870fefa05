//! Round state machine
//!
//! One spawned task owns every piece of live round state: status, the
//! multiplier, the bet ledger and the fairness data. A biased select
//! interleaves the 100ms multiplier tick with a command mailbox, so crash
//! detection and player commands are strictly ordered instead of racing.
//! Anything slow (price lookups, archive writes) happens after the state
//! mutation, on other tasks.
//!
//! Within one round the engine guarantees:
//! - bets are only accepted during the betting window, and the wallet
//!   deduction happens inside the same serialized operation
//! - a bet settles at most once, at the multiplier of the processing tick
//! - once the crash tick runs, every remaining active bet is lost

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::accounts::AccountStore;
use crate::errors::{GameError, GameResult};
use crate::game::clock;
use crate::game::events::GameEvent;
use crate::game::fairness;
use crate::game::ledger::{BetLedger, Settlement};
use crate::game::types::{Bet, Currency, RoundStatus};
use crate::oracle::PriceSource;
use crate::round_store::{ArchiveJob, ArchiveSender, RoundRecord, TransactionKind, TransactionRecord};

const COMMAND_BUFFER: usize = 1024;
const EVENT_BUFFER: usize = 1024;

/// Source of per-round seeds.
pub type SeedFn = Box<dyn FnMut() -> String + Send>;

/// A bet already validated and priced by the API layer.
#[derive(Debug, Clone)]
pub struct PlaceBetRequest {
    pub player_id: Uuid,
    pub usd_amount: f64,
    pub crypto_amount: f64,
    pub currency: Currency,
    pub price_at_time: f64,
}

/// Reply to an accepted bet.
#[derive(Debug, Clone)]
pub struct BetReceipt {
    pub round_id: Uuid,
    pub crypto_amount: f64,
    pub currency: Currency,
    pub new_balance: f64,
}

/// Reply to a successful cashout.
#[derive(Debug, Clone)]
pub struct CashoutReceipt {
    pub username: String,
    pub cashout_multiplier: f64,
    pub payout_crypto: f64,
    pub currency: Currency,
}

/// Read-only view of the live round.
#[derive(Debug, Clone)]
pub struct EngineSnapshot {
    pub round_id: Uuid,
    pub status: RoundStatus,
    pub multiplier: f64,
    pub fairness_hash: Option<String>,
    pub bet_count: usize,
    pub started_at: Option<DateTime<Utc>>,
}

/// Reply to a round start.
#[derive(Debug, Clone)]
pub struct RoundStartInfo {
    pub round_id: Uuid,
    pub fairness_hash: String,
}

enum EngineCommand {
    PlaceBet {
        request: PlaceBetRequest,
        reply: oneshot::Sender<GameResult<BetReceipt>>,
    },
    CashOut {
        player_id: Uuid,
        reply: oneshot::Sender<GameResult<CashoutReceipt>>,
    },
    StartRound {
        reply: oneshot::Sender<GameResult<RoundStartInfo>>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
}

/// Cloneable handle to the engine task.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::Sender<EngineCommand>,
    events: broadcast::Sender<GameEvent>,
    status: watch::Receiver<RoundStatus>,
}

impl EngineHandle {
    pub async fn place_bet(&self, request: PlaceBetRequest) -> GameResult<BetReceipt> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::PlaceBet { request, reply: tx })
            .await
            .map_err(|_| GameError::EngineUnavailable)?;
        rx.await.map_err(|_| GameError::EngineUnavailable)?
    }

    pub async fn cash_out(&self, player_id: Uuid) -> GameResult<CashoutReceipt> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::CashOut { player_id, reply: tx })
            .await
            .map_err(|_| GameError::EngineUnavailable)?;
        rx.await.map_err(|_| GameError::EngineUnavailable)?
    }

    pub async fn start_round(&self) -> GameResult<RoundStartInfo> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::StartRound { reply: tx })
            .await
            .map_err(|_| GameError::EngineUnavailable)?;
        rx.await.map_err(|_| GameError::EngineUnavailable)?
    }

    pub async fn snapshot(&self) -> GameResult<EngineSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::Snapshot { reply: tx })
            .await
            .map_err(|_| GameError::EngineUnavailable)?;
        rx.await.map_err(|_| GameError::EngineUnavailable)
    }

    /// Subscribe to the event fan-out. Only events sent after the call
    /// are received.
    pub fn subscribe(&self) -> broadcast::Receiver<GameEvent> {
        self.events.subscribe()
    }

    /// Watch the round status. Used by the driver to await the crash.
    pub fn status(&self) -> watch::Receiver<RoundStatus> {
        self.status.clone()
    }
}

/// Fairness data fixed when the round starts.
struct RoundFairness {
    crash_point: f64,
    seed: String,
    hash: String,
}

pub struct GameEngine {
    accounts: Arc<AccountStore>,
    oracle: Arc<dyn PriceSource>,
    archive: ArchiveSender,
    events: broadcast::Sender<GameEvent>,
    status_tx: watch::Sender<RoundStatus>,
    seed_fn: SeedFn,

    round_id: Uuid,
    status: RoundStatus,
    multiplier: f64,
    ledger: BetLedger,
    fairness: Option<RoundFairness>,
    started_at: Option<(Instant, DateTime<Utc>)>,
}

impl GameEngine {
    /// Spawn the engine task and return its handle.
    pub fn spawn(
        accounts: Arc<AccountStore>,
        oracle: Arc<dyn PriceSource>,
        archive: ArchiveSender,
    ) -> EngineHandle {
        Self::spawn_with_seed_fn(accounts, oracle, archive, Box::new(fairness::random_seed))
    }

    /// Spawn with a custom seed source, for deterministic rounds.
    pub fn spawn_with_seed_fn(
        accounts: Arc<AccountStore>,
        oracle: Arc<dyn PriceSource>,
        archive: ArchiveSender,
        seed_fn: SeedFn,
    ) -> EngineHandle {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (status_tx, status_rx) = watch::channel(RoundStatus::Waiting);

        let mut engine = GameEngine {
            accounts,
            oracle,
            archive,
            events: event_tx.clone(),
            status_tx,
            seed_fn,
            round_id: Uuid::new_v4(),
            status: RoundStatus::Waiting,
            multiplier: 1.0,
            ledger: BetLedger::new(),
            fairness: None,
            started_at: None,
        };

        tokio::spawn(async move {
            let mut tick = tokio::time::interval(clock::TICK_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = tick.tick() => engine.on_tick(),
                    command = cmd_rx.recv() => match command {
                        Some(command) => engine.on_command(command),
                        None => break,
                    },
                }
            }
            debug!("Engine task stopped");
        });

        EngineHandle {
            commands: cmd_tx,
            events: event_tx,
            status: status_rx,
        }
    }

    fn on_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::PlaceBet { request, reply } => {
                let _ = reply.send(self.place_bet(request));
            }
            EngineCommand::CashOut { player_id, reply } => {
                let _ = reply.send(self.cash_out(player_id));
            }
            EngineCommand::StartRound { reply } => {
                let _ = reply.send(self.start_round());
            }
            EngineCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn on_tick(&mut self) {
        if self.status != RoundStatus::Running {
            return;
        }
        let Some((started, _)) = self.started_at else {
            return;
        };
        let Some(crash_point) = self.fairness.as_ref().map(|f| f.crash_point) else {
            return;
        };

        let multiplier = clock::multiplier_after(started.elapsed());
        if multiplier >= crash_point {
            self.crash_round();
        } else {
            self.multiplier = multiplier;
            trace!(round_id = %self.round_id, multiplier, "Tick");
            self.publish(GameEvent::MultiplierUpdate { multiplier });
        }
    }

    fn start_round(&mut self) -> GameResult<RoundStartInfo> {
        if self.status != RoundStatus::Waiting {
            return Err(GameError::NotWaiting);
        }

        let seed = (self.seed_fn)();
        let outcome = fairness::generate(&seed);

        self.status = RoundStatus::Running;
        self.multiplier = 1.0;
        self.started_at = Some((Instant::now(), Utc::now()));
        self.fairness = Some(RoundFairness {
            crash_point: outcome.crash_point,
            seed,
            hash: outcome.hash.clone(),
        });
        self.status_tx.send_replace(RoundStatus::Running);

        info!(
            round_id = %self.round_id,
            bets = self.ledger.len(),
            "🚀 Round started"
        );
        debug!(crash_point = outcome.crash_point, "Crash point fixed");

        self.publish(GameEvent::RoundStart {
            round_id: self.round_id.to_string(),
            fairness_hash: outcome.hash.clone(),
        });

        Ok(RoundStartInfo {
            round_id: self.round_id,
            fairness_hash: outcome.hash,
        })
    }

    fn crash_round(&mut self) {
        let Some(fairness) = self.fairness.take() else {
            return;
        };
        self.status = RoundStatus::Crashed;

        info!(
            round_id = %self.round_id,
            crash_point = fairness.crash_point,
            "💥 Round crashed"
        );
        self.publish(GameEvent::RoundCrash {
            crash_point: fairness.crash_point,
            seed: fairness.seed.clone(),
        });

        self.ledger.sweep_crashed();

        let started_at = self
            .started_at
            .take()
            .map(|(_, wall)| wall)
            .unwrap_or_else(Utc::now);
        let ledger = std::mem::take(&mut self.ledger);
        let record = RoundRecord {
            id: self.round_id,
            crash_point: fairness.crash_point,
            seed: fairness.seed,
            fairness_hash: fairness.hash,
            started_at,
            crashed_at: Utc::now(),
            bets: ledger.into_bets(),
        };
        if self.archive.send(ArchiveJob::SaveRound(record)).is_err() {
            warn!("Archive worker is gone, round record dropped");
        }

        // The next betting window opens immediately.
        self.round_id = Uuid::new_v4();
        self.multiplier = 1.0;
        self.status = RoundStatus::Waiting;
        self.status_tx.send_replace(RoundStatus::Waiting);
    }

    fn place_bet(&mut self, request: PlaceBetRequest) -> GameResult<BetReceipt> {
        if self.status != RoundStatus::Waiting {
            return Err(GameError::BettingClosed);
        }

        // Deduct and append under the same serialized command, so a bet
        // can never take funds without entering the ledger.
        let new_balance =
            self.accounts
                .deduct(request.player_id, request.currency, request.crypto_amount)?;

        let bet = Bet::new(
            request.player_id,
            request.usd_amount,
            request.crypto_amount,
            request.currency,
            request.price_at_time,
        );
        self.ledger.add_bet(self.status, bet)?;

        let record = TransactionRecord::new(
            request.player_id,
            request.usd_amount,
            request.crypto_amount,
            request.currency,
            TransactionKind::Bet,
            request.price_at_time,
        );
        if self.archive.send(ArchiveJob::SaveTransaction(record)).is_err() {
            warn!("Archive worker is gone, bet transaction dropped");
        }

        debug!(
            player_id = %request.player_id,
            usd = request.usd_amount,
            currency = %request.currency,
            "Bet placed"
        );

        Ok(BetReceipt {
            round_id: self.round_id,
            crypto_amount: request.crypto_amount,
            currency: request.currency,
            new_balance,
        })
    }

    fn cash_out(&mut self, player_id: Uuid) -> GameResult<CashoutReceipt> {
        if self.status != RoundStatus::Running {
            return Err(GameError::NotRunning);
        }

        let settlement = self.ledger.settle_cashout(player_id, self.multiplier)?;
        self.accounts
            .credit(player_id, settlement.currency, settlement.payout_crypto)?;

        let username = self
            .accounts
            .username(player_id)
            .unwrap_or_else(|| player_id.to_string());

        info!(
            %username,
            multiplier = settlement.cashout_multiplier,
            payout = settlement.payout_crypto,
            currency = %settlement.currency,
            "💰 Player cashed out"
        );

        self.announce_cashout(username.clone(), &settlement);

        Ok(CashoutReceipt {
            username,
            cashout_multiplier: settlement.cashout_multiplier,
            payout_crypto: settlement.payout_crypto,
            currency: settlement.currency,
        })
    }

    /// Price the payout and announce it without blocking the engine loop.
    fn announce_cashout(&self, username: String, settlement: &Settlement) {
        let oracle = self.oracle.clone();
        let events = self.events.clone();
        let archive = self.archive.clone();
        let player_id = settlement.player_id;
        let currency = settlement.currency;
        let payout_crypto = settlement.payout_crypto;
        let cashout_multiplier = settlement.cashout_multiplier;

        tokio::spawn(async move {
            let prices = oracle.prices().await;
            let price = prices.usd_price(currency);
            let payout_usd = payout_crypto * price;

            let event = GameEvent::PlayerCashedOut {
                username,
                cashout_multiplier,
                payout_usd: clock::round2(payout_usd),
            };
            if let Err(e) = events.send(event) {
                debug!("No clients to receive cashout event: {}", e);
            }

            let record = TransactionRecord::new(
                player_id,
                payout_usd,
                payout_crypto,
                currency,
                TransactionKind::Cashout,
                price,
            );
            if archive.send(ArchiveJob::SaveTransaction(record)).is_err() {
                warn!("Archive worker is gone, cashout transaction dropped");
            }
        });
    }

    fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            round_id: self.round_id,
            status: self.status,
            multiplier: self.multiplier,
            fairness_hash: self.fairness.as_ref().map(|f| f.hash.clone()),
            bet_count: self.ledger.len(),
            started_at: self.started_at.map(|(_, wall)| wall),
        }
    }

    fn publish(&self, event: GameEvent) {
        if let Err(e) = self.events.send(event) {
            debug!("No event subscribers: {}", e);
        }
    }
}

/// Drive the round cadence: start a round, wait for it to crash, hold the
/// betting window open for `round_interval`, repeat.
pub async fn run_round_driver(handle: EngineHandle, round_interval: Duration) {
    let mut status = handle.status();
    loop {
        match handle.start_round().await {
            Ok(_) => {
                // The crash path flips the engine back to waiting.
                if status
                    .wait_for(|s| *s == RoundStatus::Waiting)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(GameError::EngineUnavailable) => break,
            Err(e) => warn!("Could not start round: {}", e),
        }
        tokio::time::sleep(round_interval).await;
    }
    info!("Round driver stopped");
}
