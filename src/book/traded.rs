use crate::order::Order;

/// History of completed trades. An order lands in `completed` when no
/// sibling of its pt remains in the pending book, otherwise in `pending`
/// until the rest of the pt trades.
#[derive(Default)]
pub struct TradedOrdersBook {
    pub completed: Vec<Order>,
    pub pending: Vec<Order>,
}

impl TradedOrdersBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a traded order. When the last pending sibling of the pt is
    /// gone, previously pending history entries of the same pt are promoted
    /// to completed in the same operation.
    pub fn add(&mut self, order: Order, has_pending_sibling: bool) {
        if has_pending_sibling {
            self.pending.push(order);
        } else {
            let pt_id = order.pt_id.clone();
            self.completed.push(order);
            let mut i = 0;
            while i < self.pending.len() {
                if self.pending[i].pt_id == pt_id {
                    let promoted = self.pending.remove(i);
                    self.completed.push(promoted);
                } else {
                    i += 1;
                }
            }
        }
    }

    /// Relabels every history order whose pt_id is in `old_pt_ids`; returns
    /// the uids that changed so the caller can mirror the change durably.
    pub fn relabel_pt_ids(&mut self, old_pt_ids: &[String], new_pt_id: &str) -> Vec<String> {
        let mut changed = Vec::new();
        for order in self.completed.iter_mut().chain(self.pending.iter_mut()) {
            if old_pt_ids.contains(&order.pt_id) {
                order.pt_id = new_pt_id.to_string();
                changed.push(order.uid.clone());
            }
        }
        changed
    }

    pub fn count(&self) -> usize {
        self.completed.len() + self.pending.len()
    }

    pub fn iter_all(&self) -> impl Iterator<Item = &Order> {
        self.completed.iter().chain(self.pending.iter())
    }
}
