use crate::order::Order;
use crate::types::{AccountBalance, Side};
use rust_decimal::Decimal;

/// Tracks the initial/current/net account balances and decides whether
/// enough free balance exists for a candidate order. A reservation must
/// leave at least the configured buffer free on the asset it draws from.
pub struct BalanceManager {
    initial: AccountBalance,
    current: AccountBalance,
    quote_buffer: Decimal,
    base_buffer: Decimal,
}

impl BalanceManager {
    pub fn new(initial: AccountBalance, quote_buffer: Decimal, base_buffer: Decimal) -> Self {
        Self {
            current: initial.clone(),
            initial,
            quote_buffer,
            base_buffer,
        }
    }

    pub fn initial(&self) -> &AccountBalance {
        &self.initial
    }

    pub fn current(&self) -> &AccountBalance {
        &self.current
    }

    /// Componentwise current - initial.
    pub fn net(&self) -> AccountBalance {
        self.current.sub(&self.initial)
    }

    /// The only path that mutates the current balance; called on every
    /// balance-change notification from the market.
    pub fn update_current(&mut self, balance: AccountBalance) {
        self.current = balance;
    }

    /// Returns `(true, needed)` when the order can be afforded, otherwise
    /// `(false, needed)`; the caller leaves the order in monitor and retries
    /// on a later tick.
    pub fn is_balance_enough(&self, order: &Order) -> (bool, Decimal) {
        match order.side {
            Side::Buy => {
                let needed = order.total();
                let ok = self.current.free_quote() - needed >= self.quote_buffer;
                if !ok {
                    tracing::debug!(uid=%order.uid, needed=%needed, free=%self.current.free_quote(),
                        buffer=%self.quote_buffer, "insufficient quote balance");
                }
                (ok, needed)
            }
            Side::Sell => {
                let needed = order.amount;
                let ok = self.current.free_base() - needed >= self.base_buffer;
                if !ok {
                    tracing::debug!(uid=%order.uid, needed=%needed, free=%self.current.free_base(),
                        buffer=%self.base_buffer, "insufficient base balance");
                }
                (ok, needed)
            }
        }
    }
}
