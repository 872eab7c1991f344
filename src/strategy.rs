use crate::book::PendingOrdersBook;
use crate::order::Order;
use crate::types::Side;
use rust_decimal::Decimal;

/// Tunable policy thresholds, parsed once from configuration.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    pub min_cycles_for_first_split: u64,
    pub distance_for_first_children: Decimal,
    pub inter_distance_children: Decimal,
    pub child_count: u32,
    pub compensation_enabled: bool,
    pub distance_for_compensation: Decimal,
    pub compensation_gap: Decimal,
    pub side_balance_distance: Decimal,
    pub concentration_gap: Decimal,
    pub max_compensation_qty: Decimal,
    pub buy_fee: Decimal,
    pub sell_fee: Decimal,
}

/// Per-price-tick decision logic over the monitor list: which stale orders
/// are split, compensated, or collected for side-rebalancing.
pub struct StrategyManager {
    params: StrategyParams,
}

impl StrategyManager {
    pub fn new(params: StrategyParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// Scans the monitor list and applies split and compensation triggers.
    /// Returns the net delta to the trades-to-new-pt counter: each un-traded
    /// order introduced beyond the replaced one postpones the next pt by one
    /// trade.
    pub async fn assess_strategy_actions(&self, book: &mut PendingOrdersBook, cmp: Decimal) -> i32 {
        let mut delta = 0;

        // candidates are snapshotted before any surgery mutates the list
        let split_candidates: Vec<String> = book
            .monitor
            .iter()
            .filter(|o| {
                o.cycles_count > self.params.min_cycles_for_first_split
                    && o.compensation_count == 0
                    && o.split_count == 0
                    && o.distance(cmp) > self.params.distance_for_first_children
            })
            .map(|o| o.uid.clone())
            .collect();

        for uid in split_candidates {
            if book
                .split_order(&uid, self.params.inter_distance_children, self.params.child_count)
                .await
            {
                delta -= (self.params.child_count as i32) - 1;
            }
        }

        if self.params.compensation_enabled {
            let compensation_candidates: Vec<String> = book
                .monitor
                .iter()
                .filter(|o| {
                    o.compensation_count == 0
                        && o.split_count == 1
                        && o.distance(cmp) > self.params.distance_for_compensation
                })
                .map(|o| o.uid.clone())
                .collect();

            for uid in compensation_candidates {
                if book
                    .compensate_order(
                        &uid,
                        cmp,
                        self.params.compensation_gap,
                        self.params.buy_fee,
                        self.params.sell_fee,
                        self.params.max_compensation_qty,
                    )
                    .await
                {
                    delta -= 1;
                } else {
                    tracing::error!(uid, "compensation failed");
                }
            }
        }

        delta
    }

    /// Collects stale orders worth collapsing when the book has gone fully
    /// one-sided: returns the candidates only if the opposite side has zero
    /// orders and more than two candidates accumulated. The caller invokes
    /// the concentration.
    pub fn assess_side_balance(&self, monitor: &[Order], cmp: Decimal) -> Vec<String> {
        let mut buy_count = 0usize;
        let mut sell_count = 0usize;
        let mut candidates: Vec<String> = Vec::new();

        for order in monitor {
            if order.concentration_count != 0 {
                continue;
            }
            match order.side {
                Side::Buy => buy_count += 1,
                Side::Sell => sell_count += 1,
            }
            if order.distance(cmp) > self.params.side_balance_distance {
                candidates.push(order.uid.clone());
            }
        }

        if (buy_count == 0 || sell_count == 0) && candidates.len() > 2 {
            candidates
        } else {
            Vec::new()
        }
    }
}
