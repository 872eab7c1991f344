//! Closed-form perfect-trade math.
//!
//! A pt is a symmetric buy/sell limit pair around the market price. With
//! `abf = 1 - buy_fee` and `asf = 1 - sell_fee`, executing both legs yields
//! `abf * b1_qty - s1_qty` base and `asf * s1_price * s1_qty -
//! b1_price * b1_qty` quote, net of fees. `pt_values` solves the pair that
//! is quote-neutral and nets a target base amount; `compensation` solves the
//! pair that offsets an existing signed (qty, quote) imbalance at prices
//! pinned `gap` away from the market.
//!
//! No business limits are enforced here; callers validate that quantities
//! are non-negative and below their ceilings before use.

use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy)]
pub struct PtValues {
    pub b1_qty: Decimal,
    pub b1_price: Decimal,
    pub s1_price: Decimal,
    pub gap: Decimal,
}

#[derive(Debug, Clone, Copy)]
pub struct CompensationValues {
    pub s1_price: Decimal,
    pub b1_price: Decimal,
    pub s1_qty: Decimal,
    pub b1_qty: Decimal,
}

/// Computes the symmetric pair that, fully executed, nets `net_amount` base
/// asset and zero quote. Returns `None` on a degenerate input (zero
/// denominator), which callers treat as a failed computation.
pub fn pt_values(
    market_price: Decimal,
    net_amount: Decimal,
    s1_qty: Decimal,
    buy_fee: Decimal,
    sell_fee: Decimal,
) -> Option<PtValues> {
    let abf = Decimal::ONE - buy_fee;
    let asf = Decimal::ONE - sell_fee;
    if abf.is_zero() {
        return None;
    }

    let b1_qty = (net_amount + s1_qty) / abf;

    let denominator = b1_qty + asf * s1_qty;
    if denominator.is_zero() {
        return None;
    }
    let gap = market_price * (b1_qty - asf * s1_qty) / denominator;

    Some(PtValues {
        b1_qty,
        b1_price: market_price - gap,
        s1_price: market_price + gap,
        gap,
    })
}

/// Computes the pair at `cmp +/- gap` whose net execution effect equals an
/// existing imbalance of `qty_balance` base and `price_balance` quote
/// (signed, net cash-flow convention), so it can replace the stale order(s)
/// that carried that imbalance without changing aggregate exposure.
pub fn compensation(
    cmp: Decimal,
    gap: Decimal,
    qty_balance: Decimal,
    price_balance: Decimal,
    buy_fee: Decimal,
    sell_fee: Decimal,
) -> Option<CompensationValues> {
    let abf = Decimal::ONE - buy_fee;
    let asf = Decimal::ONE - sell_fee;

    let s1_price = cmp + gap;
    let b1_price = cmp - gap;

    let denominator = abf * asf * s1_price - b1_price;
    if denominator.is_zero() {
        return None;
    }

    let b1_qty = (price_balance + asf * s1_price * qty_balance) / denominator;
    let s1_qty = abf * b1_qty - qty_balance;

    Some(CompensationValues {
        s1_price,
        b1_price,
        s1_qty,
        b1_qty,
    })
}
