//! Role-based access policy.
//!
//! Every request is served on behalf of a [`Principal`]. The policy answers two
//! questions about it:
//!
//! - [`Principal::allows`]: may this role perform an action on a resource at all?
//! - [`Principal::scope`]: which rows of that resource may it see or touch?
//!
//! The database layer turns a [`Scope`] into a SQL predicate so that lists and
//! single-record lookups are filtered the same way.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

/// Protected resource families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Organizations,
    Agents,
    Users,
    Templates,
    IdCards,
    Uploads,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Read,
    Update,
    Delete,
}

/// Row filter derived from the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// No restriction
    All,
    /// Rows belonging to organizations onboarded by this agent
    AgentOrganizations(Uuid),
    /// Rows belonging to one organization
    Organization(Uuid),
    /// Rows of one organization created by one user
    CreatedBy { organization_id: Uuid, user_id: Uuid },
    /// Exactly one record, identified by its primary key
    Record(Uuid),
}

/// Organization facts needed to decide whether a caller may act inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrganizationRef {
    pub id: Uuid,
    pub agent_id: Option<Uuid>,
}

/// The authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    pub organization_id: Option<Uuid>,
}

impl Principal {
    pub fn new(user_id: Uuid, role: Role, organization_id: Option<Uuid>) -> Self {
        Self {
            user_id,
            role,
            organization_id,
        }
    }

    /// Static capability matrix.
    pub fn allows(&self, resource: Resource, action: Action) -> bool {
        use Action::*;
        use Resource::*;
        use Role::*;

        match (resource, action) {
            (Organizations, Create) => matches!(self.role, Owner | Agent),
            (Organizations, Read) => true,
            (Organizations, Update) => matches!(self.role, Owner | Agent | Admin),
            (Organizations, Delete) => matches!(self.role, Owner | Agent),

            (Agents, Read) => matches!(self.role, Owner | Agent),
            (Agents, _) => self.role == Owner,

            (Users, Read) => true,
            (Users, _) => self.role.is_at_least_admin(),

            (Templates, Read) => true,
            (Templates, _) => self.role.is_at_least_admin(),

            (IdCards, Delete) => self.role.is_at_least_admin(),
            (IdCards, _) => true,

            (Uploads, Create) => true,
            (Uploads, _) => false,
        }
    }

    /// Row filter for `resource`.
    ///
    /// Organization members without an organization get a filter that matches
    /// nothing rather than everything.
    pub fn scope(&self, resource: Resource) -> Scope {
        let org = self.organization_id.unwrap_or_else(Uuid::nil);

        match self.role {
            Role::Owner => Scope::All,
            Role::Agent => match resource {
                Resource::Agents => Scope::Record(self.user_id),
                _ => Scope::AgentOrganizations(self.user_id),
            },
            Role::Admin => match resource {
                Resource::Agents => Scope::Record(Uuid::nil()),
                _ => Scope::Organization(org),
            },
            Role::Staff => match resource {
                Resource::Users => Scope::Record(self.user_id),
                Resource::IdCards => Scope::CreatedBy {
                    organization_id: org,
                    user_id: self.user_id,
                },
                Resource::Agents => Scope::Record(Uuid::nil()),
                _ => Scope::Organization(org),
            },
        }
    }

    /// Whether the caller may create or modify data inside `org`.
    pub fn can_act_in(&self, org: &OrganizationRef) -> bool {
        match self.role {
            Role::Owner => true,
            Role::Agent => org.agent_id == Some(self.user_id),
            Role::Admin | Role::Staff => self.organization_id == Some(org.id),
        }
    }

    pub fn is_self(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Role, org: Option<Uuid>) -> Principal {
        Principal::new(Uuid::new_v4(), role, org)
    }

    #[test]
    fn test_owner_sees_everything() {
        let owner = principal(Role::Owner, None);
        for resource in [
            Resource::Organizations,
            Resource::Agents,
            Resource::Users,
            Resource::Templates,
            Resource::IdCards,
        ] {
            assert_eq!(owner.scope(resource), Scope::All);
            for action in [Action::Create, Action::Read, Action::Update, Action::Delete] {
                assert!(owner.allows(resource, action), "{resource:?} {action:?}");
            }
        }
    }

    #[test]
    fn test_agent_scope_is_its_organizations() {
        let agent = principal(Role::Agent, None);
        assert_eq!(
            agent.scope(Resource::IdCards),
            Scope::AgentOrganizations(agent.user_id)
        );
        assert_eq!(agent.scope(Resource::Agents), Scope::Record(agent.user_id));
        assert!(agent.allows(Resource::Organizations, Action::Create));
        assert!(!agent.allows(Resource::Agents, Action::Create));
        assert!(agent.allows(Resource::Agents, Action::Read));
    }

    #[test]
    fn test_staff_capabilities() {
        let org = Uuid::new_v4();
        let staff = principal(Role::Staff, Some(org));

        assert!(staff.allows(Resource::IdCards, Action::Create));
        assert!(staff.allows(Resource::IdCards, Action::Update));
        assert!(!staff.allows(Resource::IdCards, Action::Delete));
        assert!(!staff.allows(Resource::Templates, Action::Create));
        assert!(!staff.allows(Resource::Users, Action::Create));
        assert!(!staff.allows(Resource::Organizations, Action::Update));
        assert!(!staff.allows(Resource::Agents, Action::Read));

        assert_eq!(staff.scope(Resource::Templates), Scope::Organization(org));
        assert_eq!(staff.scope(Resource::Users), Scope::Record(staff.user_id));
        assert_eq!(
            staff.scope(Resource::IdCards),
            Scope::CreatedBy {
                organization_id: org,
                user_id: staff.user_id
            }
        );
    }

    #[test]
    fn test_admin_capabilities() {
        let org = Uuid::new_v4();
        let admin = principal(Role::Admin, Some(org));

        assert!(admin.allows(Resource::Templates, Action::Create));
        assert!(admin.allows(Resource::Users, Action::Delete));
        assert!(admin.allows(Resource::Organizations, Action::Update));
        assert!(!admin.allows(Resource::Organizations, Action::Create));
        assert!(!admin.allows(Resource::Organizations, Action::Delete));
        assert_eq!(admin.scope(Resource::IdCards), Scope::Organization(org));
    }

    #[test]
    fn test_member_without_organization_matches_nothing() {
        let orphan = principal(Role::Admin, None);
        assert_eq!(orphan.scope(Resource::Templates), Scope::Organization(Uuid::nil()));
        assert_eq!(orphan.scope(Resource::Agents), Scope::Record(Uuid::nil()));
    }

    #[test]
    fn test_can_act_in() {
        let agent = principal(Role::Agent, None);
        let own = OrganizationRef {
            id: Uuid::new_v4(),
            agent_id: Some(agent.user_id),
        };
        let foreign = OrganizationRef {
            id: Uuid::new_v4(),
            agent_id: Some(Uuid::new_v4()),
        };
        assert!(agent.can_act_in(&own));
        assert!(!agent.can_act_in(&foreign));

        let admin = principal(Role::Admin, Some(own.id));
        assert!(admin.can_act_in(&own));
        assert!(!admin.can_act_in(&foreign));

        assert!(principal(Role::Owner, None).can_act_in(&foreign));
    }
}
