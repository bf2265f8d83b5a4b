//! Push subscription repository: the `push_subscriptions` table.

use rusqlite::{params, Row};

use super::{now_rfc3339, parse_timestamp, Database, DatabaseError};
use crate::push::subscription::{NewSubscription, PushSubscription, SubscriptionKeys};

const COLUMNS: &str = "endpoint_hash, endpoint, p256dh, auth, platform, user_agent, user_id,
    active, failure_count, last_error, last_used_at, created_at, updated_at";

fn from_row(row: &Row<'_>) -> Result<PushSubscription, rusqlite::Error> {
    let last_used: Option<String> = row.get(10)?;
    Ok(PushSubscription {
        endpoint_hash: row.get(0)?,
        endpoint: row.get(1)?,
        keys: SubscriptionKeys {
            p256dh: row.get(2)?,
            auth: row.get(3)?,
        },
        platform: row.get(4)?,
        user_agent: row.get(5)?,
        user_id: row.get(6)?,
        active: row.get(7)?,
        failure_count: row.get(8)?,
        last_error: row.get(9)?,
        last_used_at: last_used.map(|v| parse_timestamp(10, &v)).transpose()?,
        created_at: parse_timestamp(11, &row.get::<_, String>(11)?)?,
        updated_at: parse_timestamp(12, &row.get::<_, String>(12)?)?,
    })
}

/// Inserts or refreshes a subscription keyed by `endpoint_hash`.
///
/// Re-subscribing reactivates the row, replaces the keys and clears the
/// failure bookkeeping; `created_at` is preserved.
pub fn upsert(
    db: &Database,
    endpoint_hash: &str,
    sub: &NewSubscription,
) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO push_subscriptions (endpoint_hash, endpoint, p256dh, auth, platform,
                user_agent, user_id, active, failure_count, last_error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, NULL, ?8, ?8)
             ON CONFLICT(endpoint_hash) DO UPDATE SET
                endpoint = excluded.endpoint,
                p256dh = excluded.p256dh,
                auth = excluded.auth,
                platform = excluded.platform,
                user_agent = excluded.user_agent,
                user_id = COALESCE(excluded.user_id, push_subscriptions.user_id),
                active = 1,
                failure_count = 0,
                last_error = NULL,
                updated_at = excluded.updated_at",
            params![
                endpoint_hash,
                sub.endpoint.trim(),
                sub.keys.p256dh,
                sub.keys.auth,
                sub.platform,
                sub.user_agent,
                sub.user_id,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Finds a subscription by endpoint hash.
pub fn find(db: &Database, endpoint_hash: &str) -> Result<Option<PushSubscription>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM push_subscriptions WHERE endpoint_hash = ?1",
            COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![endpoint_hash], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all active subscriptions, oldest first.
pub fn list_active(db: &Database) -> Result<Vec<PushSubscription>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM push_subscriptions WHERE active = 1 ORDER BY created_at ASC, rowid ASC",
            COLUMNS
        ))?;
        let rows = stmt
            .query_map([], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Marks a subscription inactive. Returns false if it did not exist.
pub fn deactivate(db: &Database, endpoint_hash: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE push_subscriptions SET active = 0, updated_at = ?2 WHERE endpoint_hash = ?1",
            params![endpoint_hash, now_rfc3339()],
        )?;
        Ok(changed > 0)
    })
}

/// Records a successful delivery.
pub fn record_success(db: &Database, endpoint_hash: &str) -> Result<(), DatabaseError> {
    let now = now_rfc3339();
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE push_subscriptions SET failure_count = 0, last_used_at = ?2, updated_at = ?2
             WHERE endpoint_hash = ?1",
            params![endpoint_hash, now],
        )?;
        Ok(())
    })
}

/// Records a non-terminal delivery failure. The subscription stays active.
pub fn record_failure(db: &Database, endpoint_hash: &str, error: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE push_subscriptions SET failure_count = failure_count + 1, last_error = ?2,
             updated_at = ?3 WHERE endpoint_hash = ?1",
            params![endpoint_hash, error, now_rfc3339()],
        )?;
        Ok(())
    })
}
