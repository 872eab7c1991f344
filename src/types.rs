use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Side> {
        match s {
            "BUY" => Some(Side::Buy),
            "SELL" => Some(Side::Sell),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl AssetBalance {
    pub fn new(asset: &str, free: Decimal, locked: Decimal) -> Self {
        Self {
            asset: asset.to_string(),
            free,
            locked,
        }
    }

    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    pub fn add(&self, other: &AssetBalance) -> AssetBalance {
        if self.asset != other.asset {
            tracing::error!(left=%self.asset, right=%other.asset, "adding balances of different assets");
        }
        AssetBalance {
            asset: self.asset.clone(),
            free: self.free + other.free,
            locked: self.locked + other.locked,
        }
    }

    pub fn sub(&self, other: &AssetBalance) -> AssetBalance {
        if self.asset != other.asset {
            tracing::error!(left=%self.asset, right=%other.asset, "subtracting balances of different assets");
        }
        AssetBalance {
            asset: self.asset.clone(),
            free: self.free - other.free,
            locked: self.locked - other.locked,
        }
    }
}

/// The three balances a session tracks: base asset (e.g. BTC), quote asset
/// (e.g. EUR) and the fee asset (e.g. BNB).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountBalance {
    pub base: AssetBalance,
    pub quote: AssetBalance,
    pub fee: AssetBalance,
}

impl AccountBalance {
    pub fn free_quote(&self) -> Decimal {
        self.quote.free
    }

    pub fn free_base(&self) -> Decimal {
        self.base.free
    }

    pub fn add(&self, other: &AccountBalance) -> AccountBalance {
        AccountBalance {
            base: self.base.add(&other.base),
            quote: self.quote.add(&other.quote),
            fee: self.fee.add(&other.fee),
        }
    }

    pub fn sub(&self, other: &AccountBalance) -> AccountBalance {
        AccountBalance {
            base: self.base.sub(&other.base),
            quote: self.quote.sub(&other.quote),
            fee: self.fee.sub(&other.fee),
        }
    }
}
