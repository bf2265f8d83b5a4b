use chrono::{Datelike, Utc};
use tracing::info;
use uuid::Uuid;

use super::model::{self, CitizenRequest, RequestBase, RequestCategory, RequestDetails};
use super::RequestError;
use crate::db::{request_repo, Database};
use crate::registry::record::RecordStatus;

const DEFAULT_LIST_LIMIT: u64 = 100;

/// Submission and tracking of citizen requests.
#[derive(Clone)]
pub struct RequestService {
    db: Database,
}

impl RequestService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Validates and stores a new request with status `nou`.
    pub fn submit(
        &self,
        base: RequestBase,
        details: RequestDetails,
    ) -> Result<CitizenRequest, RequestError> {
        model::validate(&base, &details)?;

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let reference = format!(
            "CER-{}-{}",
            now.year(),
            id.split('-').next().unwrap_or(&id).to_uppercase()
        );

        let request = CitizenRequest {
            id,
            reference,
            base,
            details,
            status: RecordStatus::Nou,
            notes: None,
            submitted_at: now,
            updated_at: now,
        };
        request_repo::insert(&self.db, &request)?;

        info!(
            request_id = %request.id,
            reference = %request.reference,
            category = %request.details.category(),
            "Citizen request submitted"
        );
        Ok(request)
    }

    pub fn get(&self, id: &str) -> Result<CitizenRequest, RequestError> {
        request_repo::find_by_id(&self.db, id)?.ok_or_else(|| RequestError::NotFound(id.to_string()))
    }

    pub fn list(&self, category: Option<RequestCategory>) -> Result<Vec<CitizenRequest>, RequestError> {
        Ok(request_repo::list(&self.db, category, DEFAULT_LIST_LIMIT)?)
    }

    pub fn update_status(
        &self,
        id: &str,
        status: RecordStatus,
        notes: Option<&str>,
    ) -> Result<CitizenRequest, RequestError> {
        let updated = request_repo::update_status(
            &self.db,
            id,
            status,
            notes,
            &Utc::now().to_rfc3339(),
        )?;
        if !updated {
            return Err(RequestError::NotFound(id.to_string()));
        }
        info!(request_id = %id, status = %status, "Citizen request status updated");
        self.get(id)
    }
}
