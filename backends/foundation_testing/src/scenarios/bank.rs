//! Account ledger whose balances are guarded by one [`Mutex`].

use core::time::Duration;

use derive_more::From;
use foundation_sync::{Mutex, SyncError};

#[derive(From, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[from(ignore)]
    UnknownAccount(usize),

    #[from(ignore)]
    InsufficientFunds {
        account: usize,
        balance: i64,
        requested: i64,
    },

    Lock(SyncError),
}

impl std::error::Error for LedgerError {}

impl core::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

/// Fixed set of accounts; every operation holds the ledger lock for its
/// whole read-modify-write, so the total balance only changes through
/// deposits and withdrawals.
///
/// ```
/// use foundation_testing::scenarios::Ledger;
///
/// let ledger = Ledger::new(vec![100, 0]);
/// ledger.transfer(0, 1, 40).unwrap();
/// assert_eq!(ledger.balances(), vec![60, 40]);
/// assert_eq!(ledger.total(), 100);
/// ```
#[derive(Debug)]
pub struct Ledger {
    balances: Mutex<Vec<i64>>,
}

impl Ledger {
    #[must_use]
    pub fn new(opening: Vec<i64>) -> Self {
        Self {
            balances: Mutex::new(opening),
        }
    }

    /// # Errors
    ///
    /// [`LedgerError::UnknownAccount`] for an account outside the ledger.
    pub fn deposit(&self, account: usize, amount: i64) -> LedgerResult<i64> {
        let mut balances = self.balances.lock();
        let balance = balances
            .get_mut(account)
            .ok_or(LedgerError::UnknownAccount(account))?;
        *balance += amount;
        Ok(*balance)
    }

    /// # Errors
    ///
    /// [`LedgerError::InsufficientFunds`] when the balance would go
    /// negative, [`LedgerError::UnknownAccount`] for a bad account.
    pub fn withdraw(&self, account: usize, amount: i64) -> LedgerResult<i64> {
        let mut balances = self.balances.lock();
        Self::debit(&mut balances, account, amount)
    }

    /// Moves `amount` between two accounts atomically.
    ///
    /// # Errors
    ///
    /// As [`Ledger::withdraw`]; nothing changes on failure.
    pub fn transfer(&self, from: usize, to: usize, amount: i64) -> LedgerResult<()> {
        let mut balances = self.balances.lock();
        Self::apply_transfer(&mut balances, from, to, amount)
    }

    /// Like [`Ledger::transfer`], giving up if the ledger stays locked
    /// for longer than `timeout`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Lock`] wrapping [`SyncError::Timeout`], otherwise as
    /// [`Ledger::transfer`].
    pub fn transfer_timeout(
        &self,
        from: usize,
        to: usize,
        amount: i64,
        timeout: Duration,
    ) -> LedgerResult<()> {
        let mut balances = self.balances.lock_timeout(timeout)?;
        Self::apply_transfer(&mut balances, from, to, amount)
    }

    #[must_use]
    pub fn balances(&self) -> Vec<i64> {
        self.balances.lock().clone()
    }

    #[must_use]
    pub fn total(&self) -> i64 {
        self.balances.lock().iter().sum()
    }

    fn apply_transfer(balances: &mut [i64], from: usize, to: usize, amount: i64) -> LedgerResult<()> {
        if to >= balances.len() {
            return Err(LedgerError::UnknownAccount(to));
        }
        Self::debit(balances, from, amount)?;
        balances[to] += amount;
        Ok(())
    }

    fn debit(balances: &mut [i64], account: usize, amount: i64) -> LedgerResult<i64> {
        let balance = balances
            .get_mut(account)
            .ok_or(LedgerError::UnknownAccount(account))?;
        if *balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account,
                balance: *balance,
                requested: amount,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }
}
