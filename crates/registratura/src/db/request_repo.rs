//! Citizen request repository: the `citizen_requests` table.
//!
//! Category fields are stored as the tagged JSON of `RequestDetails`; the
//! `category` column duplicates the tag for filtering.

use rusqlite::{params, Row};

use super::{invalid_column, parse_json, parse_timestamp, Database, DatabaseError};
use crate::registry::record::RecordStatus;
use crate::requests::model::{CitizenRequest, RequestBase, RequestCategory, RequestDetails};

const COLUMNS: &str = "id, reference, applicant_name, email, phone, address, description,
    details, status, notes, submitted_at, updated_at";

fn from_row(row: &Row<'_>) -> Result<CitizenRequest, rusqlite::Error> {
    let details: String = row.get(7)?;
    let status: String = row.get(8)?;
    Ok(CitizenRequest {
        id: row.get(0)?,
        reference: row.get(1)?,
        base: RequestBase {
            applicant_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get(4)?,
            address: row.get(5)?,
            description: row.get(6)?,
        },
        details: parse_json::<RequestDetails>(7, &details)?,
        status: status
            .parse::<RecordStatus>()
            .map_err(|_| invalid_column(8, "status", &status))?,
        notes: row.get(9)?,
        submitted_at: parse_timestamp(10, &row.get::<_, String>(10)?)?,
        updated_at: parse_timestamp(11, &row.get::<_, String>(11)?)?,
    })
}

/// Inserts a new request.
pub fn insert(db: &Database, request: &CitizenRequest) -> Result<(), DatabaseError> {
    let details = serde_json::to_string(&request.details).map_err(|source| DatabaseError::Json {
        column: "details",
        source,
    })?;

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO citizen_requests (id, reference, category, applicant_name, email, phone,
                address, description, details, status, notes, submitted_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                request.id,
                request.reference,
                request.details.category().as_str(),
                request.base.applicant_name,
                request.base.email,
                request.base.phone,
                request.base.address,
                request.base.description,
                details,
                request.status.as_str(),
                request.notes,
                request.submitted_at.to_rfc3339(),
                request.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Finds a request by ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<CitizenRequest>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM citizen_requests WHERE id = ?1",
            COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![id], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists requests newest first, optionally restricted to one category.
pub fn list(
    db: &Database,
    category: Option<RequestCategory>,
    limit: u64,
) -> Result<Vec<CitizenRequest>, DatabaseError> {
    db.with_conn(|conn| {
        let rows = match category {
            Some(category) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM citizen_requests WHERE category = ?1
                     ORDER BY submitted_at DESC LIMIT ?2",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![category.as_str(), limit as i64], from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM citizen_requests ORDER BY submitted_at DESC LIMIT ?1",
                    COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![limit as i64], from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    })
}

/// Updates status and notes. Returns false if no row matched.
pub fn update_status(
    db: &Database,
    id: &str,
    status: RecordStatus,
    notes: Option<&str>,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE citizen_requests SET status = ?2, notes = COALESCE(?3, notes), updated_at = ?4
             WHERE id = ?1",
            params![id, status.as_str(), notes, updated_at],
        )?;
        Ok(changed > 0)
    })
}
