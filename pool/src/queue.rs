//! Withdrawal queue: one order per redeem, settled exactly once after maturity.
//!
//! Orders are never deleted and their amounts never change; the only mutable
//! field is `settled`. Ids start at 1 and are never reused.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

use tide_types::{AccountId, Timestamp};

pub type OrderId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("withdrawal order {0} not found")]
    OrderNotFound(OrderId),

    #[error("withdrawal order {id} belongs to {owner}, not {caller}")]
    NotOwner {
        id: OrderId,
        owner: AccountId,
        caller: AccountId,
    },

    #[error("withdrawal order {0} has already been settled")]
    AlreadySettled(OrderId),

    #[error("withdrawal order {id} matures at {matures_at}")]
    NotMatured { id: OrderId, matures_at: Timestamp },

    #[error("withdrawal order id space exhausted")]
    IdOverflow,
}

/// A pending or settled claim on underlying created by a redeem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalOrder {
    pub id: OrderId,
    pub owner: AccountId,
    /// Underlying value of the burned claim tokens.
    pub underlying_amount_gross: u128,
    /// What the owner receives at settlement.
    pub underlying_amount_after_fee: u128,
    pub protocol_fee_amount: u128,
    pub pool_fee_amount: u128,
    pub created_at: Timestamp,
    pub matures_at: Timestamp,
    pub settled: bool,
}

/// Lifecycle position of an order at a given time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Matured,
    Settled,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Matured => "matured",
            OrderStatus::Settled => "settled",
        };
        f.write_str(s)
    }
}

impl WithdrawalOrder {
    pub fn status(&self, now: Timestamp) -> OrderStatus {
        if self.settled {
            OrderStatus::Settled
        } else if self.matures_at.has_passed(now) {
            OrderStatus::Matured
        } else {
            OrderStatus::Pending
        }
    }
}

/// Amounts for a new order, as computed by the fee engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOrder {
    pub owner: AccountId,
    pub gross: u128,
    pub after_fee: u128,
    pub protocol_fee: u128,
    pub pool_fee: u128,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQueue {
    next_order_id: OrderId,
    orders: BTreeMap<OrderId, WithdrawalOrder>,
    /// Sum of unsettled `underlying_amount_after_fee` per owner.
    pending_by_owner: BTreeMap<AccountId, u128>,
}

impl WithdrawalQueue {
    pub fn new() -> Self {
        Self {
            next_order_id: 1,
            orders: BTreeMap::new(),
            pending_by_owner: BTreeMap::new(),
        }
    }

    /// Id the next order will receive.
    pub fn next_order_id(&self) -> OrderId {
        self.next_order_id
    }

    /// Id of the most recently created order (0 when the queue is empty).
    pub fn latest_order_id(&self) -> OrderId {
        self.next_order_id - 1
    }

    pub fn get(&self, id: OrderId) -> Option<&WithdrawalOrder> {
        self.orders.get(&id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> impl Iterator<Item = &WithdrawalOrder> {
        self.orders.values()
    }

    pub fn orders_of<'a>(
        &'a self,
        owner: &'a AccountId,
    ) -> impl Iterator<Item = &'a WithdrawalOrder> + 'a {
        self.orders.values().filter(move |o| &o.owner == owner)
    }

    /// Underlying still owed to `owner` across unsettled orders.
    pub fn pending_withdrawal(&self, owner: &AccountId) -> u128 {
        self.pending_by_owner.get(owner).copied().unwrap_or(0)
    }

    /// Underlying owed to every owner across unsettled orders.
    pub fn total_pending(&self) -> u128 {
        self.pending_by_owner.values().sum()
    }

    /// Fail unless `push` would succeed.
    pub fn ensure_capacity(&self, owner: &AccountId, after_fee: u128) -> Result<(), QueueError> {
        self.next_order_id
            .checked_add(1)
            .ok_or(QueueError::IdOverflow)?;
        self.pending_withdrawal(owner)
            .checked_add(after_fee)
            .ok_or(QueueError::IdOverflow)?;
        Ok(())
    }

    /// Append an order maturing at `matures_at`; returns its id.
    pub fn push(
        &mut self,
        order: NewOrder,
        created_at: Timestamp,
        matures_at: Timestamp,
    ) -> Result<OrderId, QueueError> {
        self.ensure_capacity(&order.owner, order.after_fee)?;
        let id = self.next_order_id;
        self.next_order_id += 1;
        *self.pending_by_owner.entry(order.owner.clone()).or_insert(0) += order.after_fee;
        self.orders.insert(
            id,
            WithdrawalOrder {
                id,
                owner: order.owner,
                underlying_amount_gross: order.gross,
                underlying_amount_after_fee: order.after_fee,
                protocol_fee_amount: order.protocol_fee,
                pool_fee_amount: order.pool_fee,
                created_at,
                matures_at,
                settled: false,
            },
        );
        Ok(id)
    }

    /// Check that `caller` may settle order `id` at `now`, without mutating.
    ///
    /// Checks run in a fixed order: existence, ownership, settlement, maturity.
    pub fn check_settle(
        &self,
        id: OrderId,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<&WithdrawalOrder, QueueError> {
        let order = self.orders.get(&id).ok_or(QueueError::OrderNotFound(id))?;
        if &order.owner != caller {
            return Err(QueueError::NotOwner {
                id,
                owner: order.owner.clone(),
                caller: caller.clone(),
            });
        }
        if order.settled {
            return Err(QueueError::AlreadySettled(id));
        }
        if !order.matures_at.has_passed(now) {
            return Err(QueueError::NotMatured {
                id,
                matures_at: order.matures_at,
            });
        }
        Ok(order)
    }

    /// Mark a checked order as settled; returns the amount paid out.
    pub fn mark_settled(&mut self, id: OrderId) -> Result<u128, QueueError> {
        let order = self
            .orders
            .get_mut(&id)
            .ok_or(QueueError::OrderNotFound(id))?;
        if order.settled {
            return Err(QueueError::AlreadySettled(id));
        }
        order.settled = true;
        let amount = order.underlying_amount_after_fee;
        if let Some(pending) = self.pending_by_owner.get_mut(&order.owner) {
            *pending = pending.saturating_sub(amount);
            if *pending == 0 {
                self.pending_by_owner.remove(&order.owner);
            }
        }
        Ok(amount)
    }

    /// Rebuild from raw orders; used when migrating older snapshots.
    pub fn from_orders(orders: impl IntoIterator<Item = WithdrawalOrder>) -> Self {
        let mut queue = Self::new();
        for order in orders {
            if !order.settled {
                *queue.pending_by_owner.entry(order.owner.clone()).or_insert(0) +=
                    order.underlying_amount_after_fee;
            }
            queue.next_order_id = queue.next_order_id.max(order.id.saturating_add(1));
            queue.orders.insert(order.id, order);
        }
        queue
    }
}

impl Default for WithdrawalQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acct(name: &str) -> AccountId {
        AccountId::new(name)
    }

    fn order_for(owner: &str, after_fee: u128) -> NewOrder {
        NewOrder {
            owner: acct(owner),
            gross: after_fee + 10,
            after_fee,
            protocol_fee: 4,
            pool_fee: 6,
        }
    }

    fn queue_with_one_order() -> (WithdrawalQueue, OrderId) {
        let mut queue = WithdrawalQueue::new();
        let id = queue
            .push(order_for("alice", 990), Timestamp::new(100), Timestamp::new(200))
            .unwrap();
        (queue, id)
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut queue = WithdrawalQueue::new();
        assert_eq!(queue.latest_order_id(), 0);
        let a = queue
            .push(order_for("alice", 1), Timestamp::new(0), Timestamp::new(0))
            .unwrap();
        let b = queue
            .push(order_for("bob", 1), Timestamp::new(0), Timestamp::new(0))
            .unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(queue.latest_order_id(), 2);
        assert_eq!(queue.next_order_id(), 3);
    }

    #[test]
    fn test_settle_checks_run_in_order() {
        let (queue, id) = queue_with_one_order();
        assert_eq!(
            queue.check_settle(99, &acct("alice"), Timestamp::new(500)).unwrap_err(),
            QueueError::OrderNotFound(99)
        );
        match queue.check_settle(id, &acct("mallory"), Timestamp::new(0)).unwrap_err() {
            QueueError::NotOwner { owner, caller, .. } => {
                assert_eq!(owner, acct("alice"));
                assert_eq!(caller, acct("mallory"));
            }
            other => panic!("Expected NotOwner, got {other:?}"),
        }
        assert_eq!(
            queue.check_settle(id, &acct("alice"), Timestamp::new(199)).unwrap_err(),
            QueueError::NotMatured {
                id,
                matures_at: Timestamp::new(200)
            }
        );
        assert!(queue.check_settle(id, &acct("alice"), Timestamp::new(200)).is_ok());
    }

    #[test]
    fn test_settle_exactly_once() {
        let (mut queue, id) = queue_with_one_order();
        assert_eq!(queue.pending_withdrawal(&acct("alice")), 990);
        assert_eq!(queue.mark_settled(id).unwrap(), 990);
        assert_eq!(queue.pending_withdrawal(&acct("alice")), 0);
        assert_eq!(
            queue.check_settle(id, &acct("alice"), Timestamp::new(500)).unwrap_err(),
            QueueError::AlreadySettled(id)
        );
        assert_eq!(queue.mark_settled(id).unwrap_err(), QueueError::AlreadySettled(id));
    }

    #[test]
    fn test_status_transitions() {
        let (mut queue, id) = queue_with_one_order();
        assert_eq!(queue.get(id).unwrap().status(Timestamp::new(150)), OrderStatus::Pending);
        assert_eq!(queue.get(id).unwrap().status(Timestamp::new(200)), OrderStatus::Matured);
        queue.mark_settled(id).unwrap();
        assert_eq!(queue.get(id).unwrap().status(Timestamp::new(150)), OrderStatus::Settled);
    }

    #[test]
    fn test_pending_sums_unsettled_orders() {
        let mut queue = WithdrawalQueue::new();
        let first = queue
            .push(order_for("alice", 100), Timestamp::new(0), Timestamp::new(10))
            .unwrap();
        queue
            .push(order_for("alice", 50), Timestamp::new(0), Timestamp::new(10))
            .unwrap();
        queue
            .push(order_for("bob", 7), Timestamp::new(0), Timestamp::new(10))
            .unwrap();
        assert_eq!(queue.pending_withdrawal(&acct("alice")), 150);
        assert_eq!(queue.total_pending(), 157);
        queue.mark_settled(first).unwrap();
        assert_eq!(queue.pending_withdrawal(&acct("alice")), 50);
        assert_eq!(queue.orders_of(&acct("alice")).count(), 2);
    }

    #[test]
    fn test_from_orders_restores_counters() {
        let (mut queue, id) = queue_with_one_order();
        queue
            .push(order_for("bob", 5), Timestamp::new(0), Timestamp::new(0))
            .unwrap();
        queue.mark_settled(id).unwrap();
        let rebuilt = WithdrawalQueue::from_orders(queue.orders().cloned());
        assert_eq!(rebuilt, queue);
    }
}
