//! Notification history repository: the append-only `notification_history` table.

use rusqlite::{params, Row};

use super::{parse_timestamp, Database, DatabaseError};
use crate::push::subscription::NotificationHistory;

fn from_row(row: &Row<'_>) -> Result<NotificationHistory, rusqlite::Error> {
    Ok(NotificationHistory {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        url: row.get(3)?,
        recipients: row.get(4)?,
        sent: row.get(5)?,
        failed: row.get(6)?,
        created_at: parse_timestamp(7, &row.get::<_, String>(7)?)?,
    })
}

/// Appends a history entry. Entries are never updated afterwards.
pub fn insert(db: &Database, entry: &NotificationHistory) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO notification_history (id, title, body, url, recipients, sent, failed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                entry.title,
                entry.body,
                entry.url,
                entry.recipients,
                entry.sent,
                entry.failed,
                entry.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Lists the most recent entries, newest first.
pub fn list_recent(db: &Database, limit: u64) -> Result<Vec<NotificationHistory>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT id, title, body, url, recipients, sent, failed, created_at
             FROM notification_history ORDER BY created_at DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
