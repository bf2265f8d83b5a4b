//! Registration number generation: `{PREFIX}-{YYYY}-{NNNNNN}`.

use chrono::{Datelike, Utc};
use tracing::{debug, error};

use super::RegistryError;
use crate::db::{counter_repo, Database};
use crate::retry::{retry_transient, RetryPolicy};

pub const DEFAULT_PREFIX: &str = "REG";

/// Formats a registration number. The sequence is zero-padded to six digits
/// and grows wider rather than wrapping past 999999.
pub fn format_registration_number(prefix: &str, year: i32, sequence: u32) -> String {
    format!("{}-{:04}-{:06}", prefix, year, sequence)
}

/// Returns true if `prefix` can be used in a registration number
/// (1–10 ASCII uppercase letters or digits).
pub fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.len() <= 10
        && prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Issues unique, gap-free registration numbers backed by the per-year
/// counter table.
#[derive(Clone)]
pub struct RegistrationNumberGenerator {
    db: Database,
    prefix: String,
    retry: RetryPolicy,
}

impl RegistrationNumberGenerator {
    pub fn new(db: Database, prefix: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            db,
            prefix: prefix.into(),
            retry,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Next number for the current calendar year (UTC).
    pub async fn generate(&self) -> Result<String, RegistryError> {
        self.generate_for_year(Utc::now().year()).await
    }

    /// Next number for `year`. The first number of a year is `000001`.
    ///
    /// Contention on the counter row is retried with backoff; once the
    /// budget is spent the call fails rather than guess a number.
    pub async fn generate_for_year(&self, year: i32) -> Result<String, RegistryError> {
        let db = self.db.clone();
        let sequence = retry_transient(
            &self.retry,
            "registration_counter",
            |e: &crate::db::DatabaseError| e.is_busy(),
            || counter_repo::increment(&db, year),
        )
        .await
        .map_err(|failure| {
            if failure.exhausted {
                error!(
                    year,
                    attempts = failure.attempts,
                    error = %failure.error,
                    "Registration counter contention not resolved"
                );
                RegistryError::CounterContention {
                    year,
                    attempts: failure.attempts,
                }
            } else {
                RegistryError::Database(failure.error)
            }
        })?;

        let number = format_registration_number(&self.prefix, year, sequence);
        debug!(registration_number = %number, "Issued registration number");
        Ok(number)
    }
}
