//! # CardHub Core Domain Models
//!
//! Domain types for the CardHub ID-card issuance backend.
//! All models implement serialization with serde and request payloads are
//! validated with the validator crate.
//!
//! ## Key Models
//!
//! - **User**: an account with a [`Role`] and, for admins and staff, an organization
//! - **Agent**: a reseller account plus its business profile
//! - **Organization**: a tenant with a card-number code and an onboarding agent
//! - **Template**: an ordered list of front/back fields an ID card is laid out with
//! - **IdCard**: an issued card, its template data and its status lifecycle
//!
//! ## Access Policy
//!
//! [`Principal`] combines a user's id, role and organization. It decides which
//! actions a role may take ([`Principal::allows`]) and which rows it may see
//! ([`Principal::scope`]).

pub mod access;
pub mod agent;
pub mod id_card;
pub mod organization;
pub mod pagination;
pub mod role;
pub mod template;
pub mod user;

#[cfg(test)]
pub mod property_tests;

pub use access::*;
pub use agent::*;
pub use id_card::*;
pub use organization::*;
pub use pagination::*;
pub use role::*;
pub use template::*;
pub use user::*;
