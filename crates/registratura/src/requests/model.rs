//! Citizen request types.
//!
//! Every request shares a [`RequestBase`]; the category-specific fields
//! live in one [`RequestDetails`] variant, serialized with a `category` tag.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RequestError;
use crate::registry::record::RecordStatus;

/// Fields common to every category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBase {
    pub applicant_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Drumuri,
    Iluminat,
    Salubritate,
    SpatiiVerzi,
    Altele,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestCategory {
    CertificatUrbanism,
    AutorizatieConstruire,
    Sesizare,
    Adeverinta,
    AjutorSocial,
}

impl RequestCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestCategory::CertificatUrbanism => "certificat_urbanism",
            RequestCategory::AutorizatieConstruire => "autorizatie_construire",
            RequestCategory::Sesizare => "sesizare",
            RequestCategory::Adeverinta => "adeverinta",
            RequestCategory::AjutorSocial => "ajutor_social",
        }
    }
}

impl FromStr for RequestCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "certificat_urbanism" => Ok(RequestCategory::CertificatUrbanism),
            "autorizatie_construire" => Ok(RequestCategory::AutorizatieConstruire),
            "sesizare" => Ok(RequestCategory::Sesizare),
            "adeverinta" => Ok(RequestCategory::Adeverinta),
            "ajutor_social" => Ok(RequestCategory::AjutorSocial),
            other => Err(format!("unknown request category '{}'", other)),
        }
    }
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum RequestDetails {
    CertificatUrbanism {
        cadastral_number: String,
        land_address: String,
        purpose: String,
    },
    AutorizatieConstruire {
        cadastral_number: String,
        urbanism_certificate_number: String,
        works_description: String,
        #[serde(default)]
        estimated_value: Option<f64>,
    },
    Sesizare {
        location: String,
        issue_type: IssueType,
        #[serde(default)]
        photo_urls: Vec<String>,
    },
    Adeverinta {
        document_type: String,
        purpose: String,
    },
    AjutorSocial {
        household_size: u32,
        monthly_income: f64,
        reason: String,
    },
}

const MAX_PHOTOS: usize = 10;

impl RequestDetails {
    pub fn category(&self) -> RequestCategory {
        match self {
            RequestDetails::CertificatUrbanism { .. } => RequestCategory::CertificatUrbanism,
            RequestDetails::AutorizatieConstruire { .. } => RequestCategory::AutorizatieConstruire,
            RequestDetails::Sesizare { .. } => RequestCategory::Sesizare,
            RequestDetails::Adeverinta { .. } => RequestCategory::Adeverinta,
            RequestDetails::AjutorSocial { .. } => RequestCategory::AjutorSocial,
        }
    }

    fn validate(&self) -> Result<(), RequestError> {
        match self {
            RequestDetails::CertificatUrbanism {
                cadastral_number,
                land_address,
                purpose,
            } => {
                validate_cadastral(cadastral_number)?;
                require("landAddress", land_address)?;
                require("purpose", purpose)
            }
            RequestDetails::AutorizatieConstruire {
                cadastral_number,
                urbanism_certificate_number,
                works_description,
                estimated_value,
            } => {
                validate_cadastral(cadastral_number)?;
                require("urbanismCertificateNumber", urbanism_certificate_number)?;
                require("worksDescription", works_description)?;
                match estimated_value {
                    Some(v) if !v.is_finite() || *v < 0.0 => Err(RequestError::Validation(
                        "estimatedValue must be a non-negative amount".to_string(),
                    )),
                    _ => Ok(()),
                }
            }
            RequestDetails::Sesizare {
                location,
                photo_urls,
                ..
            } => {
                require("location", location)?;
                if photo_urls.len() > MAX_PHOTOS {
                    return Err(RequestError::Validation(format!(
                        "at most {} photos may be attached",
                        MAX_PHOTOS
                    )));
                }
                if let Some(bad) = photo_urls
                    .iter()
                    .find(|u| !(u.starts_with("https://") || u.starts_with("http://")))
                {
                    return Err(RequestError::Validation(format!(
                        "photo url '{}' is not an http(s) url",
                        bad
                    )));
                }
                Ok(())
            }
            RequestDetails::Adeverinta {
                document_type,
                purpose,
            } => {
                require("documentType", document_type)?;
                require("purpose", purpose)
            }
            RequestDetails::AjutorSocial {
                household_size,
                monthly_income,
                reason,
            } => {
                if *household_size == 0 {
                    return Err(RequestError::Validation(
                        "householdSize must be at least 1".to_string(),
                    ));
                }
                if !monthly_income.is_finite() || *monthly_income < 0.0 {
                    return Err(RequestError::Validation(
                        "monthlyIncome must be a non-negative amount".to_string(),
                    ));
                }
                require("reason", reason)
            }
        }
    }
}

/// A citizen-facing service request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenRequest {
    pub id: String,
    pub reference: String,
    #[serde(flatten)]
    pub base: RequestBase,
    pub details: RequestDetails,
    pub status: RecordStatus,
    pub notes: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Checks the shared fields and the category fields. Runs before any write.
pub fn validate(base: &RequestBase, details: &RequestDetails) -> Result<(), RequestError> {
    require("applicantName", &base.applicant_name)?;
    require("description", &base.description)?;
    let email = base.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
        _ => {
            return Err(RequestError::Validation(format!(
                "'{}' is not a valid email address",
                base.email
            )))
        }
    }
    details.validate()
}

fn require(field: &str, value: &str) -> Result<(), RequestError> {
    if value.trim().is_empty() {
        Err(RequestError::Validation(format!("{} is required", field)))
    } else {
        Ok(())
    }
}

fn validate_cadastral(value: &str) -> Result<(), RequestError> {
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return Err(RequestError::Validation(format!(
            "cadastral number '{}' must contain only digits",
            value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> RequestBase {
        RequestBase {
            applicant_name: "Ana Ionescu".to_string(),
            email: "ana@example.ro".to_string(),
            phone: None,
            address: None,
            description: "Solicit eliberarea documentului".to_string(),
        }
    }

    #[test]
    fn test_details_serialize_with_category_tag() {
        let details = RequestDetails::Sesizare {
            location: "Str. Libertății 12".to_string(),
            issue_type: IssueType::Iluminat,
            photo_urls: vec![],
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["category"], "sesizare");
        assert_eq!(json["issueType"], "iluminat");

        let back: RequestDetails = serde_json::from_value(json).unwrap();
        assert_eq!(back, details);
    }

    #[test]
    fn test_unknown_category_is_rejected_by_serde() {
        let json = r#"{"category": "pasaport", "purpose": "x"}"#;
        assert!(serde_json::from_str::<RequestDetails>(json).is_err());
    }

    #[test]
    fn test_missing_variant_field_is_rejected_by_serde() {
        let json = r#"{"category": "ajutor_social", "householdSize": 3, "reason": "x"}"#;
        assert!(serde_json::from_str::<RequestDetails>(json).is_err());
    }

    #[test]
    fn test_validate_accepts_complete_request() {
        let details = RequestDetails::CertificatUrbanism {
            cadastral_number: "50123".to_string(),
            land_address: "Str. Morii 4".to_string(),
            purpose: "construire locuință".to_string(),
        };
        validate(&base(), &details).unwrap();
        assert_eq!(details.category(), RequestCategory::CertificatUrbanism);
    }

    #[test]
    fn test_validate_rejects_bad_email() {
        let mut b = base();
        b.email = "not-an-email".to_string();
        let details = RequestDetails::Adeverinta {
            document_type: "adeverință de rol".to_string(),
            purpose: "bancă".to_string(),
        };
        match validate(&b, &details) {
            Err(RequestError::Validation(msg)) => assert!(msg.contains("email")),
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_variant_rules() {
        let zero_household = RequestDetails::AjutorSocial {
            household_size: 0,
            monthly_income: 1200.0,
            reason: "șomaj".to_string(),
        };
        assert!(validate(&base(), &zero_household).is_err());

        let bad_cadastral = RequestDetails::CertificatUrbanism {
            cadastral_number: "abc".to_string(),
            land_address: "x".to_string(),
            purpose: "y".to_string(),
        };
        assert!(validate(&base(), &bad_cadastral).is_err());

        let bad_photo = RequestDetails::Sesizare {
            location: "Parc Central".to_string(),
            issue_type: IssueType::SpatiiVerzi,
            photo_urls: vec!["file:///etc/passwd".to_string()],
        };
        assert!(validate(&base(), &bad_photo).is_err());
    }

    #[test]
    fn test_category_str_round_trip() {
        for c in [
            RequestCategory::CertificatUrbanism,
            RequestCategory::AutorizatieConstruire,
            RequestCategory::Sesizare,
            RequestCategory::Adeverinta,
            RequestCategory::AjutorSocial,
        ] {
            assert_eq!(c.as_str().parse::<RequestCategory>().unwrap(), c);
        }
    }
}
