//! Per-round bet ledger
//!
//! The ledger owns every bet of the live round. It only ever runs inside
//! the engine task, so compound updates (find a bet, flip its status,
//! compute its payout) are atomic without any locking.

use uuid::Uuid;

use crate::errors::{GameError, GameResult};
use crate::game::types::{Bet, BetStatus, Currency, RoundStatus};

/// Result of settling one cashout against the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub player_id: Uuid,
    pub currency: Currency,
    pub cashout_multiplier: f64,
    pub payout_crypto: f64,
}

/// Bets of the round currently owned by the engine.
#[derive(Debug, Clone, Default)]
pub struct BetLedger {
    bets: Vec<Bet>,
}

impl BetLedger {
    pub fn new() -> Self {
        Self { bets: Vec::new() }
    }

    /// Append a bet. Betting is only open while the owning round waits.
    pub fn add_bet(&mut self, round_status: RoundStatus, bet: Bet) -> GameResult<()> {
        if round_status != RoundStatus::Waiting {
            return Err(GameError::BettingClosed);
        }
        self.bets.push(bet);
        Ok(())
    }

    /// The player's not-yet-settled bet, if any.
    pub fn find_active_bet(&self, player_id: Uuid) -> Option<&Bet> {
        self.bets
            .iter()
            .find(|b| b.player_id == player_id && b.status == BetStatus::Active)
    }

    /// Settle the player's active bet at `multiplier`.
    ///
    /// The status flip is the linearization point: a second settlement
    /// attempt for the same bet sees `cashed_out` and gets `NoActiveBet`.
    pub fn settle_cashout(
        &mut self,
        player_id: Uuid,
        multiplier: f64,
    ) -> GameResult<Settlement> {
        let bet = self
            .bets
            .iter_mut()
            .find(|b| b.player_id == player_id && b.status == BetStatus::Active)
            .ok_or(GameError::NoActiveBet)?;

        bet.status = BetStatus::CashedOut;
        bet.cashout_multiplier = Some(multiplier);
        bet.payout_crypto = bet.crypto_amount * multiplier;

        Ok(Settlement {
            player_id,
            currency: bet.currency,
            cashout_multiplier: multiplier,
            payout_crypto: bet.payout_crypto,
        })
    }

    /// Mark every still-active bet as lost. Runs once, at the crash.
    pub fn sweep_crashed(&mut self) {
        for bet in &mut self.bets {
            if bet.status == BetStatus::Active {
                bet.status = BetStatus::Crashed;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.bets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bets.is_empty()
    }

    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    pub fn into_bets(self) -> Vec<Bet> {
        self.bets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet_for(player_id: Uuid) -> Bet {
        Bet::new(player_id, 100.0, 0.001, Currency::Btc, 95_000.0)
    }

    #[test]
    fn test_betting_only_while_waiting() {
        let mut ledger = BetLedger::new();
        let player = Uuid::new_v4();

        assert_eq!(
            ledger.add_bet(RoundStatus::Running, bet_for(player)),
            Err(GameError::BettingClosed)
        );
        assert_eq!(
            ledger.add_bet(RoundStatus::Crashed, bet_for(player)),
            Err(GameError::BettingClosed)
        );
        assert!(ledger.is_empty());

        ledger.add_bet(RoundStatus::Waiting, bet_for(player)).unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.find_active_bet(player).is_some());
    }

    #[test]
    fn test_settle_cashout_computes_payout() {
        let mut ledger = BetLedger::new();
        let player = Uuid::new_v4();
        ledger.add_bet(RoundStatus::Waiting, bet_for(player)).unwrap();

        let settlement = ledger.settle_cashout(player, 2.35).unwrap();
        assert_eq!(settlement.cashout_multiplier, 2.35);
        assert_eq!(settlement.payout_crypto, 0.001 * 2.35);
        assert_eq!(settlement.currency, Currency::Btc);

        let bet = &ledger.bets()[0];
        assert_eq!(bet.status, BetStatus::CashedOut);
        assert_eq!(bet.cashout_multiplier, Some(2.35));
        assert_eq!(bet.payout_crypto, 0.001 * 2.35);
    }

    #[test]
    fn test_second_settlement_fails() {
        let mut ledger = BetLedger::new();
        let player = Uuid::new_v4();
        ledger.add_bet(RoundStatus::Waiting, bet_for(player)).unwrap();

        ledger.settle_cashout(player, 1.50).unwrap();
        assert_eq!(
            ledger.settle_cashout(player, 1.60),
            Err(GameError::NoActiveBet)
        );
        assert!(ledger.find_active_bet(player).is_none());
    }

    #[test]
    fn test_unknown_player_has_no_bet() {
        let mut ledger = BetLedger::new();
        ledger
            .add_bet(RoundStatus::Waiting, bet_for(Uuid::new_v4()))
            .unwrap();

        assert_eq!(
            ledger.settle_cashout(Uuid::new_v4(), 2.00),
            Err(GameError::NoActiveBet)
        );
    }

    #[test]
    fn test_sweep_only_touches_active_bets() {
        let mut ledger = BetLedger::new();
        let winner = Uuid::new_v4();
        let loser = Uuid::new_v4();
        ledger.add_bet(RoundStatus::Waiting, bet_for(winner)).unwrap();
        ledger.add_bet(RoundStatus::Waiting, bet_for(loser)).unwrap();

        ledger.settle_cashout(winner, 3.00).unwrap();
        ledger.sweep_crashed();

        let bets = ledger.bets();
        assert_eq!(bets[0].status, BetStatus::CashedOut);
        assert_eq!(bets[0].payout_crypto, 0.001 * 3.00);
        assert_eq!(bets[1].status, BetStatus::Crashed);
        assert_eq!(bets[1].payout_crypto, 0.0);
        assert_eq!(bets[1].cashout_multiplier, None);

        // Losers cannot settle after the sweep.
        assert_eq!(
            ledger.settle_cashout(loser, 3.00),
            Err(GameError::NoActiveBet)
        );
    }
}
