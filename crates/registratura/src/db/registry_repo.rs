//! Registry record repository: CRUD operations for the `registry_records` table.

use rusqlite::{params, Row};

use super::{invalid_column, parse_json, parse_timestamp, Database, DatabaseError};
use crate::registry::record::{
    AttachmentRecord, OfficialDocument, Priority, RecordStatus, RegistryRecord,
};

const COLUMNS: &str = "id, registration_number, message_id, sender_email, sender_name, recipient,
    subject, body, body_html, date_received, status, priority, department_id, department_name,
    assigned_to_user_id, assigned_to_user_name, deadline, notes, attachments, official_document,
    created_at, updated_at";

fn from_row(row: &Row<'_>) -> Result<RegistryRecord, rusqlite::Error> {
    let status: String = row.get(10)?;
    let priority: String = row.get(11)?;
    let deadline: Option<String> = row.get(16)?;
    let attachments: String = row.get(18)?;
    let official: Option<String> = row.get(19)?;

    Ok(RegistryRecord {
        id: row.get(0)?,
        registration_number: row.get(1)?,
        message_id: row.get(2)?,
        sender_email: row.get(3)?,
        sender_name: row.get(4)?,
        recipient: row.get(5)?,
        subject: row.get(6)?,
        body: row.get(7)?,
        body_html: row.get(8)?,
        date_received: parse_timestamp(9, &row.get::<_, String>(9)?)?,
        status: status
            .parse::<RecordStatus>()
            .map_err(|_| invalid_column(10, "status", &status))?,
        priority: priority
            .parse::<Priority>()
            .map_err(|_| invalid_column(11, "priority", &priority))?,
        department_id: row.get(12)?,
        department_name: row.get(13)?,
        assigned_to_user_id: row.get(14)?,
        assigned_to_user_name: row.get(15)?,
        deadline: deadline.map(|d| parse_timestamp(16, &d)).transpose()?,
        notes: row.get(17)?,
        attachments: parse_json::<Vec<AttachmentRecord>>(18, &attachments)?,
        official_document: official
            .map(|o| parse_json::<OfficialDocument>(19, &o))
            .transpose()?,
        created_at: parse_timestamp(20, &row.get::<_, String>(20)?)?,
        updated_at: parse_timestamp(21, &row.get::<_, String>(21)?)?,
    })
}

fn to_json<T: serde::Serialize>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|source| DatabaseError::Json { column, source })
}

/// Query filter parameters for record listing.
#[derive(Debug, Default, Clone)]
pub struct RecordFilter {
    pub status: Option<RecordStatus>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new registry record.
pub fn insert(db: &Database, record: &RegistryRecord) -> Result<(), DatabaseError> {
    let attachments = to_json("attachments", &record.attachments)?;
    let official = record
        .official_document
        .as_ref()
        .map(|o| to_json("official_document", o))
        .transpose()?;

    db.with_conn(|conn| {
        conn.execute(
            &format!(
                "INSERT INTO registry_records ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                  ?21, ?22)",
                COLUMNS
            ),
            params![
                record.id,
                record.registration_number,
                record.message_id,
                record.sender_email,
                record.sender_name,
                record.recipient,
                record.subject,
                record.body,
                record.body_html,
                record.date_received.to_rfc3339(),
                record.status.as_str(),
                record.priority.as_str(),
                record.department_id,
                record.department_name,
                record.assigned_to_user_id,
                record.assigned_to_user_name,
                record.deadline.map(|d| d.to_rfc3339()),
                record.notes,
                attachments,
                official,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Finds a record by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<RegistryRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM registry_records WHERE id = ?1",
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

/// Finds a record by its registration number.
pub fn find_by_registration_number(
    db: &Database,
    registration_number: &str,
) -> Result<Option<RegistryRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM registry_records WHERE registration_number = ?1",
            COLUMNS
        ))?;
        let mut rows = stmt.query_map(params![registration_number], from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Returns true if any record carries this message id.
pub fn exists_by_message_id(db: &Database, message_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM registry_records WHERE message_id = ?1",
            params![message_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    })
}

/// Queries records newest-first, returning (rows, total_count).
pub fn query(
    db: &Database,
    filter: &RecordFilter,
) -> Result<(Vec<RegistryRecord>, u64), DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(status) = filter.status {
            conditions.push(format!("status = ?{}", param_values.len() + 1));
            param_values.push(Box::new(status.as_str()));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM registry_records {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT {} FROM registry_records {} ORDER BY date_received DESC, created_at DESC LIMIT ?{} OFFSET ?{}",
            COLUMNS,
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<RegistryRecord> = stmt
            .query_map(params_ref.as_slice(), from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })
}

/// Overwrites the workflow fields of a record. Returns false if no row matched.
pub fn update_workflow(db: &Database, record: &RegistryRecord) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE registry_records SET status = ?2, priority = ?3, department_id = ?4,
             department_name = ?5, assigned_to_user_id = ?6, assigned_to_user_name = ?7,
             deadline = ?8, notes = ?9, updated_at = ?10
             WHERE id = ?1",
            params![
                record.id,
                record.status.as_str(),
                record.priority.as_str(),
                record.department_id,
                record.department_name,
                record.assigned_to_user_id,
                record.assigned_to_user_name,
                record.deadline.map(|d| d.to_rfc3339()),
                record.notes,
                record.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(changed > 0)
    })
}

/// Sets the official document reference. Returns false if no row matched.
pub fn set_official_document(
    db: &Database,
    id: &str,
    document: &OfficialDocument,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let official = to_json("official_document", document)?;
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE registry_records SET official_document = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, official, updated_at],
        )?;
        Ok(changed > 0)
    })
}

/// Deletes a record. Returns false if it did not exist.
pub fn delete(db: &Database, id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM registry_records WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    })
}
