//! Archived rounds and the transaction log
//!
//! Finished rounds and wallet movements are written once and read by the
//! history and verification endpoints. Data rows are JSON keyed by id;
//! index rows carry an inverted millisecond timestamp so a forward scan
//! returns newest first.

use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::errors::StorageError;
use crate::game::types::{Bet, Currency};
use crate::storage::Storage;

const ROUND_DATA_PREFIX: &str = "round:data:";
const ROUND_RECENT_PREFIX: &[u8] = b"round:index:recent:";
const TX_DATA_PREFIX: &str = "tx:data:";
const TX_PLAYER_PREFIX: &str = "tx:index:player:";

/// A finished round as persisted for history and fairness verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoundRecord {
    pub id: Uuid,
    pub crash_point: f64,
    /// Revealed seed; recomputing HMAC over it must reproduce `fairness_hash`
    pub seed: String,
    pub fairness_hash: String,
    pub started_at: DateTime<Utc>,
    pub crashed_at: DateTime<Utc>,
    pub bets: Vec<Bet>,
}

/// Direction of a wallet movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Bet,
    Cashout,
}

/// One wallet movement: a bet stake leaving or a payout arriving.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRecord {
    /// Mock on-chain hash, 16 random bytes hex encoded
    pub id: String,
    pub player_id: Uuid,
    pub usd_amount: f64,
    pub crypto_amount: f64,
    pub currency: Currency,
    pub kind: TransactionKind,
    /// USD price of the currency when the movement happened
    pub price_at_time: f64,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(
        player_id: Uuid,
        usd_amount: f64,
        crypto_amount: f64,
        currency: Currency,
        kind: TransactionKind,
        price_at_time: f64,
    ) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            id: hex::encode(bytes),
            player_id,
            usd_amount,
            crypto_amount,
            currency,
            kind,
            price_at_time,
            created_at: Utc::now(),
        }
    }
}

fn round_key(id: Uuid) -> Vec<u8> {
    format!("{}{}", ROUND_DATA_PREFIX, id).into_bytes()
}

fn round_recent_key(crashed_at_ms: i64, id: Uuid) -> Vec<u8> {
    let inverted = u64::MAX - crashed_at_ms.max(0) as u64;
    let mut key = Vec::with_capacity(ROUND_RECENT_PREFIX.len() + 8 + 16);
    key.extend_from_slice(ROUND_RECENT_PREFIX);
    key.extend_from_slice(&inverted.to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

fn tx_key(id: &str) -> Vec<u8> {
    format!("{}{}", TX_DATA_PREFIX, id).into_bytes()
}

fn tx_player_prefix(player_id: Uuid) -> Vec<u8> {
    format!("{}{}:", TX_PLAYER_PREFIX, player_id).into_bytes()
}

fn tx_player_key(player_id: Uuid, created_at_ms: i64, tx_id: &str) -> Vec<u8> {
    let inverted = u64::MAX - created_at_ms.max(0) as u64;
    let mut key = tx_player_prefix(player_id);
    key.extend_from_slice(&inverted.to_be_bytes());
    key.extend_from_slice(tx_id.as_bytes());
    key
}

/// Read/write access to the archive keyspace.
#[derive(Clone)]
pub struct RoundStore {
    storage: Storage,
}

impl RoundStore {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Persist a finished round and its newest-first index entry.
    pub fn store_round(&self, record: &RoundRecord) -> Result<(), StorageError> {
        let data = serde_json::to_vec(record)?;
        let items: Vec<(Vec<u8>, Vec<u8>)> = vec![
            (round_key(record.id), data),
            (
                round_recent_key(record.crashed_at.timestamp_millis(), record.id),
                Vec::new(),
            ),
        ];
        self.storage.batch_write(&items)?;
        Ok(())
    }

    pub fn round(&self, id: Uuid) -> Result<Option<RoundRecord>, StorageError> {
        match self.storage.get(&round_key(id)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Most recently crashed rounds, newest first.
    pub fn recent_rounds(&self, limit: usize) -> Result<Vec<RoundRecord>, StorageError> {
        let rows = self.storage.scan_prefix(ROUND_RECENT_PREFIX, limit);
        let mut records = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            if key.len() < ROUND_RECENT_PREFIX.len() + 8 + 16 {
                continue;
            }
            let id_bytes: [u8; 16] = key[key.len() - 16..].try_into().unwrap_or([0u8; 16]);
            if let Some(record) = self.round(Uuid::from_bytes(id_bytes))? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Persist a wallet movement and its per-player index entry.
    pub fn store_transaction(&self, record: &TransactionRecord) -> Result<(), StorageError> {
        let data = serde_json::to_vec(record)?;
        let items: Vec<(Vec<u8>, Vec<u8>)> = vec![
            (tx_key(&record.id), data),
            (
                tx_player_key(
                    record.player_id,
                    record.created_at.timestamp_millis(),
                    &record.id,
                ),
                Vec::new(),
            ),
        ];
        self.storage.batch_write(&items)?;
        Ok(())
    }

    pub fn transaction(&self, id: &str) -> Result<Option<TransactionRecord>, StorageError> {
        match self.storage.get(&tx_key(id)) {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// A player's wallet movements, newest first.
    pub fn player_transactions(
        &self,
        player_id: Uuid,
        limit: usize,
    ) -> Result<Vec<TransactionRecord>, StorageError> {
        let prefix = tx_player_prefix(player_id);
        let rows = self.storage.scan_prefix(&prefix, limit);
        let mut records = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            if key.len() <= prefix.len() + 8 {
                continue;
            }
            let Ok(tx_id) = String::from_utf8(key[prefix.len() + 8..].to_vec()) else {
                continue;
            };
            if let Some(record) = self.transaction(&tx_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }
}

/// Jobs accepted by the archive worker.
#[derive(Debug)]
pub enum ArchiveJob {
    SaveRound(RoundRecord),
    SaveTransaction(TransactionRecord),
}

/// Fire-and-forget handle to the archive worker.
pub type ArchiveSender = mpsc::UnboundedSender<ArchiveJob>;

/// Background worker that persists finished rounds and transactions.
///
/// Writes are best effort: failures are logged and absorbed so a slow or
/// broken disk never stalls the live round.
pub struct Archiver;

impl Archiver {
    pub fn spawn(store: RoundStore) -> ArchiveSender {
        Self::spawn_with_failure_counter(store, Arc::new(AtomicU64::new(0)))
    }

    /// Spawn the worker with an external failure counter for metrics.
    pub fn spawn_with_failure_counter(
        store: RoundStore,
        failures: Arc<AtomicU64>,
    ) -> ArchiveSender {
        let (tx, mut rx) = mpsc::unbounded_channel::<ArchiveJob>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let what = match &job {
                    ArchiveJob::SaveRound(record) => format!("round {}", record.id),
                    ArchiveJob::SaveTransaction(record) => format!("transaction {}", record.id),
                };
                let store = store.clone();
                let result = tokio::task::spawn_blocking(move || match job {
                    ArchiveJob::SaveRound(record) => store.store_round(&record),
                    ArchiveJob::SaveTransaction(record) => store.store_transaction(&record),
                })
                .await;

                match result {
                    Ok(Ok(())) => debug!("Archived {}", what),
                    Ok(Err(e)) => {
                        failures.fetch_add(1, Ordering::SeqCst);
                        error!("Failed to archive {}: {}", what, e);
                    }
                    Err(e) => {
                        failures.fetch_add(1, Ordering::SeqCst);
                        error!("Archive task panicked for {}: {}", what, e);
                    }
                }
            }
            debug!("Archive worker stopped");
        });

        tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::types::BetStatus;
    use std::time::Duration;
    use tempfile::tempdir;

    fn sample_round(crashed_at: DateTime<Utc>) -> RoundRecord {
        let player = Uuid::new_v4();
        let mut bet = Bet::new(player, 100.0, 0.001, Currency::Btc, 95_000.0);
        bet.status = BetStatus::Crashed;
        RoundRecord {
            id: Uuid::new_v4(),
            crash_point: 6.51,
            seed: "a3f1c2d4e5b6978812345678deadbeefcafebabe0123456789abcdef01234567"
                .to_string(),
            fairness_hash: "d90dfb84e105714ec2d13ba25203fbfa96ec79ea346894ed1752c57eccfbc17f"
                .to_string(),
            started_at: crashed_at - chrono::Duration::seconds(38),
            crashed_at,
            bets: vec![bet],
        }
    }

    fn open_store() -> (tempfile::TempDir, RoundStore) {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        (dir, RoundStore::new(storage))
    }

    #[test]
    fn test_round_roundtrip() {
        let (_dir, store) = open_store();
        let record = sample_round(Utc::now());

        store.store_round(&record).unwrap();
        let loaded = store.round(record.id).unwrap().unwrap();
        assert_eq!(loaded, record);

        assert!(store.round(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_recent_rounds_newest_first() {
        let (_dir, store) = open_store();
        let base = Utc::now();

        let old = sample_round(base - chrono::Duration::seconds(20));
        let mid = sample_round(base - chrono::Duration::seconds(10));
        let new = sample_round(base);
        for record in [&old, &mid, &new] {
            store.store_round(record).unwrap();
        }

        let recent = store.recent_rounds(10).unwrap();
        let ids: Vec<Uuid> = recent.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new.id, mid.id, old.id]);

        let limited = store.recent_rounds(2).unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].id, new.id);
    }

    #[test]
    fn test_transactions_isolated_per_player() {
        let (_dir, store) = open_store();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let stake = TransactionRecord::new(
            alice,
            100.0,
            0.001,
            Currency::Btc,
            TransactionKind::Bet,
            95_000.0,
        );
        let payout = TransactionRecord::new(
            alice,
            235.0,
            0.002_35,
            Currency::Btc,
            TransactionKind::Cashout,
            95_000.0,
        );
        let other = TransactionRecord::new(
            bob,
            50.0,
            0.015,
            Currency::Eth,
            TransactionKind::Bet,
            3_400.0,
        );
        for record in [&stake, &payout, &other] {
            store.store_transaction(record).unwrap();
        }

        let txs = store.player_transactions(alice, 10).unwrap();
        assert_eq!(txs.len(), 2);
        assert!(txs.iter().all(|t| t.player_id == alice));

        let txs = store.player_transactions(bob, 10).unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::Bet);
        assert_eq!(txs[0].currency, Currency::Eth);
    }

    #[test]
    fn test_transactions_newest_first() {
        let (_dir, store) = open_store();
        let player = Uuid::new_v4();
        let base = Utc::now();

        let mut first = TransactionRecord::new(
            player,
            100.0,
            0.001,
            Currency::Btc,
            TransactionKind::Bet,
            95_000.0,
        );
        first.created_at = base - chrono::Duration::seconds(5);
        let mut second = TransactionRecord::new(
            player,
            150.0,
            0.0015,
            Currency::Btc,
            TransactionKind::Cashout,
            95_000.0,
        );
        second.created_at = base;

        store.store_transaction(&first).unwrap();
        store.store_transaction(&second).unwrap();

        let txs = store.player_transactions(player, 10).unwrap();
        assert_eq!(txs[0].id, second.id);
        assert_eq!(txs[1].id, first.id);
    }

    #[tokio::test]
    async fn test_archiver_persists_jobs() {
        let (_dir, store) = open_store();
        let tx = Archiver::spawn(store.clone());

        let record = sample_round(Utc::now());
        tx.send(ArchiveJob::SaveRound(record.clone())).unwrap();

        let mut loaded = None;
        for _ in 0..100 {
            if let Some(found) = store.round(record.id).unwrap() {
                loaded = Some(found);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(loaded.expect("round was never archived"), record);
    }
}
