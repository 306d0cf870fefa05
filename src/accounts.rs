//! In-memory user accounts and demo wallets

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AccountError;
use crate::game::types::Currency;

/// Demo balances granted to every new account.
const STARTING_BTC: f64 = 1.0;
const STARTING_ETH: f64 = 10.0;

/// Per-currency balances of one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wallet {
    #[serde(rename = "BTC")]
    pub btc: f64,
    #[serde(rename = "ETH")]
    pub eth: f64,
}

impl Wallet {
    pub fn balance(&self, currency: Currency) -> f64 {
        match currency {
            Currency::Btc => self.btc,
            Currency::Eth => self.eth,
        }
    }

    fn balance_mut(&mut self, currency: Currency) -> &mut f64 {
        match currency {
            Currency::Btc => &mut self.btc,
            Currency::Eth => &mut self.eth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub wallet: Wallet,
}

/// Account registry with atomic per-entry balance updates.
///
/// DashMap locks a single shard for the duration of a mutation, so a
/// deduct checks and subtracts under one lock and concurrent updates to
/// the same wallet never interleave partially.
pub struct AccountStore {
    accounts: DashMap<Uuid, Account>,
    usernames: DashMap<String, Uuid>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            usernames: DashMap::new(),
        }
    }

    /// Create an account with the starting demo balances.
    pub fn create(&self, username: &str) -> Result<Account, AccountError> {
        let id = Uuid::new_v4();

        // Reserving the username first keeps two concurrent creates with
        // the same name from both succeeding.
        match self.usernames.entry(username.to_string()) {
            Entry::Occupied(_) => return Err(AccountError::UsernameTaken),
            Entry::Vacant(vacant) => {
                vacant.insert(id);
            }
        }

        let account = Account {
            id,
            username: username.to_string(),
            wallet: Wallet {
                btc: STARTING_BTC,
                eth: STARTING_ETH,
            },
        };
        self.accounts.insert(id, account.clone());
        Ok(account)
    }

    pub fn get(&self, id: Uuid) -> Option<Account> {
        self.accounts.get(&id).map(|entry| entry.clone())
    }

    pub fn username(&self, id: Uuid) -> Option<String> {
        self.accounts.get(&id).map(|entry| entry.username.clone())
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Deduct `amount` if the balance covers it, returning the new balance.
    pub fn deduct(&self, id: Uuid, currency: Currency, amount: f64) -> Result<f64, AccountError> {
        let mut account = self.accounts.get_mut(&id).ok_or(AccountError::NotFound)?;
        let balance = account.wallet.balance_mut(currency);
        if *balance < amount {
            return Err(AccountError::InsufficientFunds { currency });
        }
        *balance -= amount;
        Ok(*balance)
    }

    /// Credit `amount` unconditionally, returning the new balance.
    pub fn credit(&self, id: Uuid, currency: Currency, amount: f64) -> Result<f64, AccountError> {
        let mut account = self.accounts.get_mut(&id).ok_or(AccountError::NotFound)?;
        let balance = account.wallet.balance_mut(currency);
        *balance += amount;
        Ok(*balance)
    }
}

impl Default for AccountStore {
    fn default() -> Self {
        Self::new()
    }
}
