//! Organizations (tenants) and their onboarding payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::access::OrganizationRef;
use crate::user::validate_mobile;

pub const MIN_CODE_LEN: usize = 2;
pub const MAX_CODE_LEN: usize = 10;

/// A tenant that owns users, templates and ID cards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// Short upper-case code used as the card-number prefix
    pub code: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub logo_url: Option<String>,
    /// Agent (user id) that onboarded this organization
    pub agent_id: Option<Uuid>,
    pub card_counter: i64,
    pub is_active: bool,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn org_ref(&self) -> OrganizationRef {
        OrganizationRef {
            id: self.id,
            agent_id: self.agent_id,
        }
    }
}

/// First administrator created together with an organization.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OrganizationAdmin {
    #[validate(length(min = 1, max = 255, message = "Admin name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(email(message = "Admin email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_mobile")]
    pub mobile: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 1, max = 255, message = "Organization name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(custom = "validate_code")]
    pub code: Option<String>,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_mobile")]
    pub mobile: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub logo_url: Option<String>,
    /// Only honoured for owners; agents always onboard for themselves.
    pub agent_id: Option<Uuid>,
    #[validate]
    pub admin: OrganizationAdmin,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 1, max = 255, message = "Organization name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_mobile")]
    pub mobile: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub logo_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrganizationFilter {
    pub search: Option<String>,
    pub agent_id: Option<Uuid>,
}

pub fn is_valid_code(code: &str) -> bool {
    (MIN_CODE_LEN..=MAX_CODE_LEN).contains(&code.len())
        && code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    if is_valid_code(code) {
        Ok(())
    } else {
        let mut error = ValidationError::new("code");
        error.message = Some("Code must be 2 to 10 upper-case letters or digits".into());
        Err(error)
    }
}

/// Derive a card-number prefix from an organization name.
///
/// Initials of each word are used when there are at least two words,
/// otherwise the leading characters of the name. The result always satisfies
/// [`is_valid_code`].
pub fn derive_code(name: &str) -> String {
    let words: Vec<String> = name
        .split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .to_ascii_uppercase()
        })
        .filter(|w| !w.is_empty())
        .collect();

    let mut code: String = if words.len() >= 2 {
        words.iter().filter_map(|w| w.chars().next()).collect()
    } else {
        words.concat()
    };
    code.truncate(6);

    match code.len() {
        0 => "ORG".to_string(),
        1 => format!("{code}X"),
        _ => code,
    }
}

/// Candidate code for the `attempt`-th collision, keeping within [`MAX_CODE_LEN`].
pub fn code_with_suffix(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let suffix = attempt.to_string();
    let keep = MAX_CODE_LEN.saturating_sub(suffix.len()).min(base.len());
    format!("{}{}", &base[..keep], suffix)
}
