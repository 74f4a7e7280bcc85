//! Request handlers, one module per resource.
//!
//! Handlers check the capability matrix first, then load records through
//! scoped queries so that anything outside the caller's reach is a 404.

pub mod agents;
pub mod auth;
pub mod health;
pub mod id_cards;
pub mod organizations;
pub mod templates;
pub mod upload;
pub mod users;

pub use agents::*;
pub use auth::*;
pub use health::*;
pub use id_cards::*;
pub use organizations::*;
pub use templates::*;
pub use upload::*;
pub use users::*;

use cardhub_database::OrganizationRepository;
use cardhub_models::{Action, Organization, Principal, Resource};
use cardhub_utils::{CardHubError, CardHubResult};
use uuid::Uuid;

use crate::AppState;

/// Fail with 403 unless the caller's role may perform `action` on `resource`.
pub(crate) fn require(principal: &Principal, resource: Resource, action: Action) -> CardHubResult<()> {
    if principal.allows(resource, action) {
        Ok(())
    } else {
        Err(CardHubError::authorization(format!(
            "A {} cannot {} {}",
            principal.role,
            action_name(action),
            resource_name(resource)
        )))
    }
}

fn action_name(action: Action) -> &'static str {
    match action {
        Action::Create => "create",
        Action::Read => "view",
        Action::Update => "update",
        Action::Delete => "delete",
    }
}

fn resource_name(resource: Resource) -> &'static str {
    match resource {
        Resource::Organizations => "organizations",
        Resource::Agents => "agents",
        Resource::Users => "users",
        Resource::Templates => "templates",
        Resource::IdCards => "ID cards",
        Resource::Uploads => "uploads",
    }
}

/// Organization a write lands in.
///
/// Admins and staff always work inside their own organization; owners and
/// agents must name one.
pub(crate) fn target_organization(principal: &Principal, requested: Option<Uuid>) -> CardHubResult<Uuid> {
    if principal.role.is_organization_member() {
        let own = principal
            .organization_id
            .ok_or_else(|| CardHubError::authorization("Your account is not linked to an organization"))?;
        match requested {
            Some(id) if id != own => Err(CardHubError::not_found("Organization")),
            _ => Ok(own),
        }
    } else {
        requested.ok_or_else(|| CardHubError::validation("organization_id", "organization_id is required"))
    }
}

/// Load an organization the caller may write into, or 404.
pub(crate) async fn writable_organization(
    state: &AppState,
    principal: &Principal,
    organization_id: Uuid,
) -> CardHubResult<Organization> {
    let organization = OrganizationRepository::new(state.pool.clone())
        .find_by_id(organization_id)
        .await?
        .filter(|org| principal.can_act_in(&org.org_ref()))
        .ok_or_else(|| CardHubError::not_found("Organization"))?;

    if !organization.is_active {
        return Err(CardHubError::validation(
            "organization_id",
            "Organization is inactive",
        ));
    }
    Ok(organization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardhub_models::Role;

    #[test]
    fn test_require_names_the_refusal() {
        let staff = Principal::new(Uuid::new_v4(), Role::Staff, Some(Uuid::new_v4()));
        let error = require(&staff, Resource::Templates, Action::Create).unwrap_err();
        assert_eq!(error.http_status_code(), 403);
        assert_eq!(error.public_message(), "A staff cannot create templates");
        assert!(require(&staff, Resource::IdCards, Action::Create).is_ok());
    }

    #[test]
    fn test_members_write_into_their_own_organization() {
        let org = Uuid::new_v4();
        let admin = Principal::new(Uuid::new_v4(), Role::Admin, Some(org));
        assert_eq!(target_organization(&admin, None).unwrap(), org);
        assert_eq!(target_organization(&admin, Some(org)).unwrap(), org);
        assert_eq!(
            target_organization(&admin, Some(Uuid::new_v4()))
                .unwrap_err()
                .http_status_code(),
            404
        );
    }

    #[test]
    fn test_owners_must_name_an_organization() {
        let owner = Principal::new(Uuid::new_v4(), Role::Owner, None);
        let org = Uuid::new_v4();
        assert_eq!(target_organization(&owner, Some(org)).unwrap(), org);
        assert!(matches!(
            target_organization(&owner, None),
            Err(CardHubError::Validation { .. })
        ));
    }
}
