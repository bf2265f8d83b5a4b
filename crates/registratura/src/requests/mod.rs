//! Citizen service requests (urbanism certificates, building permits,
//! complaints, certificates, social aid).

pub mod model;
pub mod service;

use thiserror::Error;

use crate::db::DatabaseError;

pub use model::{
    CitizenRequest, IssueType, RequestBase, RequestCategory, RequestDetails,
};
pub use service::RequestService;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Request not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}
