//! Subscription billing: pending transactions created before the user is
//! handed to the payment gateway, settled by the gateway's callback.
//! Settlement is idempotent; premium is granted exactly once per
//! confirmation as an expiring `premium_until` extension.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use courier_types::models::{Transaction, TransactionStatus};

use crate::{Database, Result, StoreError, opt_ts_col, ts_col, ts_string, uuid_col};

/// One confirmed premium_subscription payment buys 30 days.
const BILLING_PERIOD_DAYS: i64 = 30;

/// The payment_type that grants premium on confirmation.
pub const PREMIUM_SUBSCRIPTION: &str = "premium_subscription";

const TX_COLUMNS: &str = "id, user_id, amount, currency, payment_type, payment_method, status, \
                          reference, created_at, completed_at";

impl Database {
    pub fn create_payment(
        &self,
        user_id: Uuid,
        payment_type: &str,
        payment_method: &str,
        amount: f64,
    ) -> Result<Transaction> {
        if amount <= 0.0 || !amount.is_finite() {
            return Err(StoreError::InvalidInput("amount must be positive"));
        }
        if payment_method.trim().is_empty() {
            return Err(StoreError::InvalidInput("payment_method must not be empty"));
        }

        let id = Uuid::new_v4();
        let now = Utc::now();
        // External reference the gateway echoes back on confirmation
        let reference = format!("TXN_{}_{}", user_id.simple(), now.timestamp_millis());

        self.with_conn_mut(|conn| {
            Database::require_user(conn, user_id)?;

            conn.execute(
                "INSERT INTO transactions (id, user_id, amount, payment_type, payment_method, status, reference, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    user_id.to_string(),
                    amount,
                    payment_type,
                    payment_method,
                    reference,
                    ts_string(now),
                ],
            )?;

            query_transaction(conn, &reference)?.ok_or(StoreError::NotFound("transaction"))
        })
    }

    /// pending -> confirmed. Extends the user's premium window for
    /// premium_subscription payments. Replays against a settled transaction
    /// fail with `AlreadyConfirmed` and grant nothing, so the untrusted
    /// gateway callback is safe to retry.
    pub fn confirm_payment(&self, reference: &str) -> Result<Transaction> {
        self.settle(reference, TransactionStatus::Confirmed)
    }

    /// pending -> failed. Terminal, no premium grant.
    pub fn fail_payment(&self, reference: &str) -> Result<Transaction> {
        self.settle(reference, TransactionStatus::Failed)
    }

    fn settle(&self, reference: &str, outcome: TransactionStatus) -> Result<Transaction> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let current = query_transaction(&tx, reference)?
                .ok_or(StoreError::NotFound("transaction"))?;
            if current.status.is_terminal() {
                return Err(StoreError::AlreadyConfirmed);
            }

            let now = Utc::now();
            tx.execute(
                "UPDATE transactions SET status = ?1, completed_at = ?2 WHERE reference = ?3",
                rusqlite::params![outcome.as_str(), ts_string(now), reference],
            )?;

            if outcome == TransactionStatus::Confirmed
                && current.payment_type == PREMIUM_SUBSCRIPTION
            {
                let until = extend_premium_from(&tx, current.user_id, now)?;
                tracing::info!(
                    "Premium extended for {} until {}",
                    current.user_id,
                    until
                );
            }

            let settled =
                query_transaction(&tx, reference)?.ok_or(StoreError::NotFound("transaction"))?;
            tx.commit()?;
            Ok(settled)
        })
    }

    /// Payment history, newest first.
    pub fn list_payments(&self, user_id: Uuid) -> Result<Vec<Transaction>> {
        self.with_conn(|conn| {
            Database::require_user(conn, user_id)?;

            let sql = format!(
                "SELECT {TX_COLUMNS} FROM transactions WHERE user_id = ?1 ORDER BY created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id.to_string()], transaction_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// New window starts from whichever is later: now, or the current expiry.
/// A renewal paid early therefore stacks instead of resetting.
fn extend_premium_from(
    conn: &Connection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let current: Option<Option<String>> = conn
        .query_row(
            "SELECT premium_until FROM users WHERE id = ?1",
            [user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let current = current.ok_or(StoreError::NotFound("user"))?;

    let base = current
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|until| *until > now)
        .unwrap_or(now);
    let until = base + Duration::days(BILLING_PERIOD_DAYS);

    conn.execute(
        "UPDATE users SET premium_until = ?1 WHERE id = ?2",
        rusqlite::params![ts_string(until), user_id.to_string()],
    )?;
    Ok(until)
}

fn query_transaction(conn: &Connection, reference: &str) -> Result<Option<Transaction>> {
    let sql = format!("SELECT {TX_COLUMNS} FROM transactions WHERE reference = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([reference], transaction_from_row).optional()?;
    Ok(row)
}

fn transaction_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Transaction> {
    let status_raw: String = row.get(6)?;
    Ok(Transaction {
        id: uuid_col(row, 0)?,
        user_id: uuid_col(row, 1)?,
        amount: row.get(2)?,
        currency: row.get(3)?,
        payment_type: row.get(4)?,
        payment_method: row.get(5)?,
        status: TransactionStatus::parse(&status_raw).unwrap_or(TransactionStatus::Pending),
        reference: row.get(7)?,
        created_at: ts_col(row, 8)?,
        completed_at: opt_ts_col(row, 9)?,
    })
}
