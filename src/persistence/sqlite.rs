use crate::order::{Order, OrderStatus};
use crate::types::Side;
use anyhow::{Context, Result};
use rusqlite::params;
use rust_decimal::Decimal;
use std::str::FromStr;
use tokio_rusqlite::Connection;

pub const PENDING_TABLE: &str = "pending_orders";
pub const TRADED_TABLE: &str = "traded_orders";

fn check_table(table: &str) -> Result<&'static str> {
    match table {
        PENDING_TABLE => Ok(PENDING_TABLE),
        TRADED_TABLE => Ok(TRADED_TABLE),
        other => anyhow::bail!("unknown orders table {other}"),
    }
}

/// Durable mirror of the pending and traded order collections. Every
/// split/compensate/concentrate/trade operation writes through here; a
/// write failure is logged by the caller and in-memory state proceeds.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path).await.context("open sqlite")?;
        Ok(Self { conn })
    }

    pub async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|c| -> Result<()> {
                c.execute_batch(
                    r#"
PRAGMA journal_mode=WAL;
PRAGMA synchronous=NORMAL;

CREATE TABLE IF NOT EXISTS pending_orders (
  uid TEXT PRIMARY KEY,
  session_id TEXT NOT NULL,
  pt_id TEXT NOT NULL,
  created_ts_ms INTEGER NOT NULL,
  side TEXT NOT NULL,
  price TEXT NOT NULL,
  amount TEXT NOT NULL,
  commission TEXT NOT NULL,
  status TEXT NOT NULL,
  exchange_order_id INTEGER,
  compensation_count INTEGER NOT NULL,
  split_count INTEGER NOT NULL,
  concentration_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS traded_orders (
  uid TEXT PRIMARY KEY,
  session_id TEXT NOT NULL,
  pt_id TEXT NOT NULL,
  created_ts_ms INTEGER NOT NULL,
  side TEXT NOT NULL,
  price TEXT NOT NULL,
  amount TEXT NOT NULL,
  commission TEXT NOT NULL,
  status TEXT NOT NULL,
  exchange_order_id INTEGER,
  compensation_count INTEGER NOT NULL,
  split_count INTEGER NOT NULL,
  concentration_count INTEGER NOT NULL
);
"#,
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn add_order(&self, table: &str, order: &Order) -> Result<()> {
        let table = check_table(table)?;
        let order = order.clone();
        self.conn
            .call(move |c| -> Result<()> {
                c.execute(
                    &format!(
                        "INSERT OR REPLACE INTO {table} \
                         (uid, session_id, pt_id, created_ts_ms, side, price, amount, commission, \
                          status, exchange_order_id, compensation_count, split_count, concentration_count) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                    ),
                    params![
                        order.uid,
                        order.session_id,
                        order.pt_id,
                        order.created_ts_ms,
                        order.side.as_str(),
                        order.price.to_string(),
                        order.amount.to_string(),
                        order.fee_commission.to_string(),
                        order.status.as_str(),
                        order.exchange_order_id,
                        order.compensation_count,
                        order.split_count,
                        order.concentration_count,
                    ],
                )?;
                Ok(())
            })
            .await
            .context("insert order")
    }

    pub async fn delete_order(&self, table: &str, uid: &str) -> Result<()> {
        let table = check_table(table)?;
        let uid = uid.to_string();
        self.conn
            .call(move |c| -> Result<()> {
                c.execute(&format!("DELETE FROM {table} WHERE uid = ?1"), params![uid])?;
                Ok(())
            })
            .await
            .context("delete order")
    }

    pub async fn update_pt_id(&self, table: &str, uid: &str, new_pt_id: &str) -> Result<()> {
        let table = check_table(table)?;
        let uid = uid.to_string();
        let new_pt_id = new_pt_id.to_string();
        self.conn
            .call(move |c| -> Result<()> {
                c.execute(
                    &format!("UPDATE {table} SET pt_id = ?1 WHERE uid = ?2"),
                    params![new_pt_id, uid],
                )?;
                Ok(())
            })
            .await
            .context("update pt_id")
    }

    pub async fn load_orders(&self, table: &str) -> Result<Vec<Order>> {
        let table = check_table(table)?;
        self.conn
            .call(move |c| -> Result<Vec<Order>> {
                let mut stmt = c.prepare(&format!(
                    "SELECT uid, session_id, pt_id, created_ts_ms, side, price, amount, commission, \
                     status, exchange_order_id, compensation_count, split_count, concentration_count \
                     FROM {table} ORDER BY created_ts_ms ASC"
                ))?;
                let rows = stmt.query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, String>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, String>(8)?,
                        row.get::<_, Option<i64>>(9)?,
                        row.get::<_, u32>(10)?,
                        row.get::<_, u32>(11)?,
                        row.get::<_, u32>(12)?,
                    ))
                })?;

                let mut out = Vec::new();
                for row in rows {
                    let (
                        uid,
                        session_id,
                        pt_id,
                        created_ts_ms,
                        side,
                        price,
                        amount,
                        commission,
                        status,
                        exchange_order_id,
                        compensation_count,
                        split_count,
                        concentration_count,
                    ) = row?;

                    let side = Side::parse(&side)
                        .with_context(|| format!("unknown side {side} for order {uid}"))?;
                    let status = OrderStatus::parse(&status)
                        .with_context(|| format!("unknown status {status} for order {uid}"))?;

                    out.push(Order {
                        uid,
                        session_id,
                        pt_id,
                        side,
                        price: Decimal::from_str(&price).context("price parse")?,
                        amount: Decimal::from_str(&amount).context("amount parse")?,
                        status,
                        created_ts_ms,
                        fee_commission: Decimal::from_str(&commission).context("commission parse")?,
                        exchange_order_id,
                        compensation_count,
                        split_count,
                        concentration_count,
                        cycles_count: 0,
                    });
                }
                Ok(out)
            })
            .await
            .context("load orders")
    }

    pub async fn count_orders(&self, table: &str) -> Result<i64> {
        let table = check_table(table)?;
        self.conn
            .call(move |c| -> Result<i64> {
                let n: i64 = c.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?;
                Ok(n)
            })
            .await
            .context("count orders")
    }
}
