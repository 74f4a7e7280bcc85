use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::user::{validate_mobile, User};

/// Agent profile. Its id is the id of the agent's user account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub user_id: Uuid,
    pub business_name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An agent as returned by the API: account plus profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    #[serde(flatten)]
    pub user: User,
    pub profile: AgentProfile,
    pub organization_count: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_mobile")]
    pub mobile: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 255, message = "Business name must be between 1 and 255 characters"))]
    pub business_name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateAgentRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be between 1 and 255 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom = "validate_mobile")]
    pub mobile: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Business name must be between 1 and 255 characters"))]
    pub business_name: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub city: Option<String>,
    #[validate(length(max = 100))]
    pub state: Option<String>,
    pub is_active: Option<bool>,
}
