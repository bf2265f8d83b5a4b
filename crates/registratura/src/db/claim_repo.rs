//! Message claim repository: the `message_claims` table.
//!
//! A claim is taken before a message is registered so that two intakes
//! racing on the same `Message-ID` produce exactly one record. A claim
//! with no record is a lease: once it is older than the lease window the
//! intake that took it is presumed dead and another may take it over.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use super::{now_rfc3339, parse_timestamp, Database, DatabaseError};

/// A row of `message_claims`.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageClaim {
    pub message_id: String,
    /// Set once the claim produced a record.
    pub record_id: Option<String>,
    pub claimed_at: DateTime<Utc>,
}

impl MessageClaim {
    /// True if no record was produced and the lease has run out.
    pub fn is_stale(&self, lease: Duration, now: DateTime<Utc>) -> bool {
        let lease = chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::MAX);
        self.record_id.is_none() && now.signed_duration_since(self.claimed_at) >= lease
    }
}

/// Attempts to claim a message id. Returns false if another intake holds a
/// live claim or the claim already produced a record. A stale claim is
/// taken over.
pub fn try_claim(db: &Database, message_id: &str, lease: Duration) -> Result<bool, DatabaseError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_rfc3339();

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO message_claims (message_id, claimed_at) VALUES (?1, ?2)",
            params![message_id, now],
        )?;
        if inserted == 1 {
            tx.commit()?;
            return Ok(true);
        }

        let existing = find_in(&tx, message_id)?;
        let taken_over = match existing {
            Some(claim) if claim.is_stale(lease, Utc::now()) => {
                log::warn!(
                    "Taking over stale claim for {} (claimed at {})",
                    message_id,
                    claim.claimed_at.to_rfc3339()
                );
                tx.execute(
                    "UPDATE message_claims SET claimed_at = ?2
                     WHERE message_id = ?1 AND record_id IS NULL",
                    params![message_id, now],
                )? == 1
            }
            _ => false,
        };
        tx.commit()?;
        Ok(taken_over)
    })
}

/// Links a claim to the record it produced.
pub fn attach_record(db: &Database, message_id: &str, record_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE message_claims SET record_id = ?2 WHERE message_id = ?1",
            params![message_id, record_id],
        )?;
        Ok(())
    })
}

/// Reads the claim for a message id, if one exists.
pub fn find(db: &Database, message_id: &str) -> Result<Option<MessageClaim>, DatabaseError> {
    db.with_conn(|conn| find_in(conn, message_id))
}

fn find_in(
    conn: &rusqlite::Connection,
    message_id: &str,
) -> Result<Option<MessageClaim>, DatabaseError> {
    let claim = conn
        .query_row(
            "SELECT message_id, record_id, claimed_at FROM message_claims WHERE message_id = ?1",
            params![message_id],
            |row| {
                let claimed_at: String = row.get(2)?;
                Ok(MessageClaim {
                    message_id: row.get(0)?,
                    record_id: row.get(1)?,
                    claimed_at: parse_timestamp(2, &claimed_at)?,
                })
            },
        )
        .optional()?;
    Ok(claim)
}

/// Returns true if the message id is claimed, settled or not.
pub fn is_claimed(db: &Database, message_id: &str) -> Result<bool, DatabaseError> {
    Ok(find(db, message_id)?.is_some())
}

/// Drops a claim so the message can be retried.
pub fn release(db: &Database, message_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM message_claims WHERE message_id = ?1",
            params![message_id],
        )?;
        Ok(())
    })
}

/// Drops the claim belonging to a deleted record.
pub fn release_for_record(db: &Database, record_id: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count = conn.execute(
            "DELETE FROM message_claims WHERE record_id = ?1",
            params![record_id],
        )?;
        Ok(count as u64)
    })
}
