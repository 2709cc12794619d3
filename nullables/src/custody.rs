//! Nullable custody: in-memory underlying balances with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use tide_pool::{Custody, CustodyError, Payout};
use tide_types::AccountId;

/// One completed movement of underlying.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferRecord {
    Deposit { from: AccountId, amount: u128 },
    Release { to: AccountId, amount: u128 },
}

#[derive(Default)]
struct Books {
    wallets: HashMap<AccountId, u128>,
    reserves: u128,
    log: Vec<TransferRecord>,
}

/// An in-memory custodian for testing.
///
/// Each account has an external underlying wallet; deposits move funds from
/// the wallet into the shared reserves, releases move them back out. Batches
/// and forwarded deposits are atomic. Thread-safe for use behind a service.
pub struct NullCustody {
    books: Mutex<Books>,
    fail_deposits: AtomicBool,
    fail_releases: AtomicBool,
    peg_deviation: AtomicU64,
}

impl NullCustody {
    pub fn new() -> Self {
        Self {
            books: Mutex::new(Books::default()),
            fail_deposits: AtomicBool::new(false),
            fail_releases: AtomicBool::new(false),
            peg_deviation: AtomicU64::new(0),
        }
    }

    /// Credit `amount` of underlying to `account`'s external wallet.
    pub fn fund(&self, account: &AccountId, amount: u128) {
        let mut books = self.books.lock().unwrap();
        *books.wallets.entry(account.clone()).or_insert(0) += amount;
    }

    /// Add underlying to the reserves directly, as a yield source would.
    pub fn fund_reserves(&self, amount: u128) {
        self.books.lock().unwrap().reserves += amount;
    }

    pub fn wallet_balance(&self, account: &AccountId) -> u128 {
        self.books
            .lock()
            .unwrap()
            .wallets
            .get(account)
            .copied()
            .unwrap_or(0)
    }

    pub fn reserves(&self) -> u128 {
        self.books.lock().unwrap().reserves
    }

    /// Every successful transfer, oldest first.
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.books.lock().unwrap().log.clone()
    }

    /// Make every subsequent transfer fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.set_fail_deposits(failing);
        self.set_fail_releases(failing);
    }

    pub fn set_fail_deposits(&self, failing: bool) {
        self.fail_deposits.store(failing, Ordering::SeqCst);
    }

    pub fn set_fail_releases(&self, failing: bool) {
        self.fail_releases.store(failing, Ordering::SeqCst);
    }

    pub fn set_peg_deviation(&self, deviation: u64) {
        self.peg_deviation.store(deviation, Ordering::SeqCst);
    }

    fn check_deposit(&self, books: &Books, from: &AccountId, amount: u128) -> Result<(), CustodyError> {
        if self.fail_deposits.load(Ordering::SeqCst) {
            return Err(CustodyError::Rejected(format!("deposit from {from} refused")));
        }
        let available = books.wallets.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(CustodyError::InsufficientFunds {
                account: from.clone(),
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    fn check_releases(&self, reserves: u128, payouts: &[Payout]) -> Result<(), CustodyError> {
        if self.fail_releases.load(Ordering::SeqCst) {
            return Err(CustodyError::Rejected("release refused".to_string()));
        }
        let needed = payouts
            .iter()
            .try_fold(0u128, |acc, p| acc.checked_add(p.amount))
            .ok_or_else(|| CustodyError::Rejected("payout total overflows".to_string()))?;
        if reserves < needed {
            return Err(CustodyError::InsufficientFunds {
                account: AccountId::new("reserves"),
                needed,
                available: reserves,
            });
        }
        Ok(())
    }

    fn apply_deposit(books: &mut Books, from: &AccountId, amount: u128) {
        if let Some(balance) = books.wallets.get_mut(from) {
            *balance -= amount;
        }
        books.reserves += amount;
        books.log.push(TransferRecord::Deposit {
            from: from.clone(),
            amount,
        });
    }

    fn apply_releases(books: &mut Books, payouts: &[Payout]) {
        for payout in payouts.iter().filter(|p| p.amount > 0) {
            books.reserves -= payout.amount;
            *books.wallets.entry(payout.to.clone()).or_insert(0) += payout.amount;
            books.log.push(TransferRecord::Release {
                to: payout.to.clone(),
                amount: payout.amount,
            });
        }
    }
}

impl Default for NullCustody {
    fn default() -> Self {
        Self::new()
    }
}

impl Custody for NullCustody {
    fn receive_deposit(&self, from: &AccountId, amount: u128) -> Result<(), CustodyError> {
        self.receive_and_forward(from, amount, &[])
    }

    fn release_withdrawal(&self, to: &AccountId, amount: u128) -> Result<(), CustodyError> {
        self.release_batch(&[Payout::new(to.clone(), amount)])
    }

    fn release_batch(&self, payouts: &[Payout]) -> Result<(), CustodyError> {
        let mut books = self.books.lock().unwrap();
        self.check_releases(books.reserves, payouts)?;
        Self::apply_releases(&mut books, payouts);
        Ok(())
    }

    fn receive_and_forward(
        &self,
        from: &AccountId,
        amount: u128,
        forward: &[Payout],
    ) -> Result<(), CustodyError> {
        let mut books = self.books.lock().unwrap();
        self.check_deposit(&books, from, amount)?;
        if !forward.is_empty() {
            self.check_releases(books.reserves + amount, forward)?;
        }
        Self::apply_deposit(&mut books, from, amount);
        Self::apply_releases(&mut books, forward);
        Ok(())
    }

    fn current_peg_deviation(&self) -> Result<u64, CustodyError> {
        Ok(self.peg_deviation.load(Ordering::SeqCst))
    }
}
