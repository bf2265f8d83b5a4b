//! Registration counter repository: the `registration_counters` table.

use rusqlite::{params, TransactionBehavior};

use super::{now_rfc3339, Database, DatabaseError};

/// A persisted per-year counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterRow {
    pub year: i32,
    pub last_number: u32,
    pub updated_at: String,
}

/// Atomically increments the counter for `year`, creating it at 1 if absent,
/// and returns the new value.
///
/// Runs as a single UPSERT inside an IMMEDIATE transaction, so the write
/// lock is held from the start and no other writer can observe or take the
/// same value. Lock contention surfaces as a busy `DatabaseError`.
pub fn increment(db: &Database, year: i32) -> Result<u32, DatabaseError> {
    db.with_conn_mut(|conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let next: u32 = tx.query_row(
            "INSERT INTO registration_counters (year, last_number, updated_at)
             VALUES (?1, 1, ?2)
             ON CONFLICT(year) DO UPDATE SET
                last_number = last_number + 1,
                updated_at = excluded.updated_at
             RETURNING last_number",
            params![year, now_rfc3339()],
            |r| r.get(0),
        )?;
        tx.commit()?;
        Ok(next)
    })
}

/// Reads the counter for a year, if one exists.
pub fn find(db: &Database, year: i32) -> Result<Option<CounterRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT year, last_number, updated_at FROM registration_counters WHERE year = ?1",
        )?;
        let mut rows = stmt.query_map(params![year], |row| {
            Ok(CounterRow {
                year: row.get(0)?,
                last_number: row.get(1)?,
                updated_at: row.get(2)?,
            })
        })?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_increment_starts_at_one() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(increment(&db, 2025).unwrap(), 1);
        assert_eq!(increment(&db, 2025).unwrap(), 2);
        assert_eq!(find(&db, 2025).unwrap().unwrap().last_number, 2);
    }

    #[test]
    fn test_years_are_independent() {
        let db = Database::open_in_memory().unwrap();
        for _ in 0..5 {
            increment(&db, 2024).unwrap();
        }
        assert_eq!(increment(&db, 2025).unwrap(), 1);
        assert_eq!(find(&db, 2024).unwrap().unwrap().last_number, 5);
    }

    #[test]
    fn test_find_missing_year() {
        let db = Database::open_in_memory().unwrap();
        assert!(find(&db, 1999).unwrap().is_none());
    }
}
