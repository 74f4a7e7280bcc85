//! Repository module for database CRUD operations
//!
//! Typed repositories for every domain entity. Reads that depend on the
//! caller's role take an access `Scope` and filter in SQL.

pub mod agent;
pub mod id_card;
pub mod organization;
pub mod scope;
pub mod template;
pub mod user;

pub use agent::{AgentChanges, AgentRepository, NewAgentProfile};
pub use id_card::{IdCardChanges, IdCardRepository, NewIdCard};
pub use organization::{NewOrganization, OrganizationChanges, OrganizationRepository};
pub use scope::{push_scope, search_pattern, ScopeColumns};
pub use template::{NewTemplate, TemplateChanges, TemplateRepository};
pub use user::{NewUser, UserChanges, UserRepository};
