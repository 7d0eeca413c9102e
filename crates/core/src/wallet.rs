use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Amount, PackId, UserId, WalletError};

/// Per-worker funds ledger.
///
/// `balance` and `on_hold` form a two-state machine: either the wallet is
/// solvent (`on_hold == 0`) or funds are reserved against an insolvent
/// special task (`balance <= 0`, `on_hold > 0`). The two are never both
/// positive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user: UserId,
    pub balance: Amount,
    pub on_hold: Amount,
    pub commission: Amount,
    pub salary: Amount,
    pub credit_score: Amount,
    pub pack: Option<PackId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user,
            balance: Decimal::ZERO,
            on_hold: Decimal::ZERO,
            commission: Decimal::ZERO,
            salary: Decimal::ZERO,
            credit_score: Decimal::ONE_HUNDRED,
            pack: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add funds, clearing any negative balance first. Once the balance is
    /// back to non-negative territory the reserved `on_hold` funds are folded
    /// back into the balance, keeping the never-both-positive invariant.
    pub fn credit(&mut self, amount: Amount) -> Result<(), WalletError> {
        if amount < Decimal::ZERO {
            return Err(WalletError::NegativeAmount);
        }

        self.balance += amount;

        if self.balance >= Decimal::ZERO && self.on_hold > Decimal::ZERO {
            self.balance += self.on_hold;
            self.on_hold = Decimal::ZERO;
        }

        Ok(())
    }

    /// Deduct funds. When the balance cannot cover the amount, the balance
    /// goes negative by the deficit and the full amount is reserved on hold.
    ///
    /// Callers must not debit while a reservation is outstanding; doing so
    /// would overwrite the prior hold, so it is rejected outright.
    pub fn debit(&mut self, amount: Amount) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }

        if self.on_hold > Decimal::ZERO {
            return Err(WalletError::HoldStillReserved);
        }

        if self.balance >= amount {
            self.balance -= amount;
        } else {
            let deficit = amount - self.balance;
            self.balance = -deficit;
            self.on_hold = amount;
        }

        Ok(())
    }

    pub fn credit_commission(&mut self, amount: Amount) -> Result<(), WalletError> {
        if amount < Decimal::ZERO {
            return Err(WalletError::NegativeAmount);
        }

        self.commission += amount;

        Ok(())
    }

    pub fn debit_commission(&mut self, amount: Amount) -> Result<(), WalletError> {
        if amount < Decimal::ZERO {
            return Err(WalletError::NegativeAmount);
        }

        self.commission -= amount;

        Ok(())
    }

    /// Legacy transition pair. The sequential `debit` above supersedes these
    /// for the special-task flow; they remain for direct hold adjustments.
    pub fn add_on_hold(&mut self, amount: Amount) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO {
            return Err(WalletError::NonPositiveAmount);
        }

        self.on_hold += amount;

        Ok(())
    }

    pub fn release_on_hold(&mut self, amount: Amount) -> Result<(), WalletError> {
        if amount <= Decimal::ZERO || self.on_hold < amount {
            return Err(WalletError::InvalidRelease);
        }

        self.on_hold -= amount;
        self.balance += amount;

        Ok(())
    }

    /// Invariant check: `on_hold >= 0` and never both sides positive.
    pub fn is_consistent(&self) -> bool {
        self.on_hold >= Decimal::ZERO
            && !(self.balance > Decimal::ZERO && self.on_hold > Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    fn wallet(balance: Decimal, on_hold: Decimal) -> Wallet {
        let mut w = Wallet::new(1, Utc::now());
        w.balance = balance;
        w.on_hold = on_hold;
        w
    }

    #[test]
    fn credit_plain_deposit() {
        let mut w = wallet(dec!(100), dec!(0));
        w.credit(dec!(25)).unwrap();
        assert_eq!(w.balance, dec!(125));
        assert_eq!(w.on_hold, dec!(0));
        assert!(w.is_consistent());
    }

    #[test]
    fn credit_partially_clears_negative() {
        let mut w = wallet(dec!(-50), dec!(150));
        w.credit(dec!(20)).unwrap();
        assert_eq!(w.balance, dec!(-30));
        assert_eq!(w.on_hold, dec!(150));
        assert!(w.is_consistent());
    }

    #[test]
    fn credit_clears_negative_and_merges_hold() {
        let mut w = wallet(dec!(-50), dec!(150));
        w.credit(dec!(60)).unwrap();
        assert_eq!(w.balance, dec!(160));
        assert_eq!(w.on_hold, dec!(0));
        assert!(w.is_consistent());
    }

    #[test]
    fn credit_conserves_total() {
        // post balance + hold == pre balance + hold + amount
        let cases = [
            (dec!(100), dec!(0), dec!(40)),
            (dec!(-50), dec!(150), dec!(10)),
            (dec!(-50), dec!(150), dec!(50)),
            (dec!(0), dec!(0), dec!(0)),
        ];

        for (balance, on_hold, amount) in cases {
            let mut w = wallet(balance, on_hold);
            w.credit(amount).unwrap();
            assert_eq!(w.balance + w.on_hold, balance + on_hold + amount);
            assert!(w.on_hold == Decimal::ZERO || w.balance <= Decimal::ZERO);
        }
    }

    #[test]
    fn debit_with_sufficient_funds() {
        let mut w = wallet(dec!(100), dec!(0));
        w.debit(dec!(80)).unwrap();
        assert_eq!(w.balance, dec!(20));
        assert_eq!(w.on_hold, dec!(0));
    }

    #[test]
    fn debit_beyond_balance_reserves_full_amount() {
        let mut w = wallet(dec!(100), dec!(0));
        w.debit(dec!(150)).unwrap();
        assert_eq!(w.balance, dec!(-50));
        assert_eq!(w.on_hold, dec!(150));
        assert!(w.is_consistent());
    }

    #[test]
    fn debit_rejected_while_hold_outstanding() {
        let mut w = wallet(dec!(-50), dec!(150));
        let err = w.debit(dec!(10)).unwrap_err();
        assert!(matches!(err, WalletError::HoldStillReserved));
        assert_eq!(w.balance, dec!(-50));
        assert_eq!(w.on_hold, dec!(150));
    }

    #[test]
    fn release_moves_hold_to_balance() {
        let mut w = wallet(dec!(0), dec!(150));
        w.release_on_hold(dec!(150)).unwrap();
        assert_eq!(w.balance, dec!(150));
        assert_eq!(w.on_hold, dec!(0));
    }

    #[test]
    fn release_beyond_hold_rejected() {
        let mut w = wallet(dec!(0), dec!(100));
        assert!(matches!(
            w.release_on_hold(dec!(150)),
            Err(WalletError::InvalidRelease)
        ));
    }

    #[test]
    fn commission_ledger_is_plain_arithmetic() {
        let mut w = wallet(dec!(0), dec!(0));
        w.credit_commission(dec!(3.75)).unwrap();
        w.debit_commission(dec!(1.25)).unwrap();
        assert_eq!(w.commission, dec!(2.50));
    }
}
