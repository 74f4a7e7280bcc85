//! Organization onboarding and management.

use axum::{extract::State, http::StatusCode, Extension};
use cardhub_database::{
    AgentRepository, NewOrganization, NewUser, OrganizationChanges, OrganizationRepository,
    UserRepository,
};
use cardhub_models::{
    code_with_suffix, derive_code, Action, CreateOrganizationRequest, Organization,
    OrganizationFilter, Page, PageRequest, Principal, Resource, Role, UpdateOrganizationRequest,
    User,
};
use cardhub_utils::{hash_password, validate_model, CardHubError, CardHubResult};
use serde::Serialize;
use uuid::Uuid;

use super::require;
use crate::{
    extract::{Json, Path, Query},
    middleware::AuthUser,
    AppState,
};

/// Attempts at suffixing a derived code before giving up.
const MAX_CODE_ATTEMPTS: u32 = 100;

#[derive(Debug, Serialize)]
pub struct CreatedOrganization {
    pub organization: Organization,
    pub admin: User,
}

/// GET /api/organizations
pub async fn list_organizations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<OrganizationFilter>,
) -> CardHubResult<Json<Page<Organization>>> {
    require(&auth.principal, Resource::Organizations, Action::Read)?;

    let scope = auth.principal.scope(Resource::Organizations);
    let (organizations, total) = OrganizationRepository::new(state.pool.clone())
        .list(&scope, &filter, page)
        .await?;

    Ok(Json(Page::new(organizations, page, total)))
}

/// GET /api/organizations/:id
pub async fn get_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<Json<Organization>> {
    require(&auth.principal, Resource::Organizations, Action::Read)?;

    let organization = OrganizationRepository::new(state.pool.clone())
        .find_scoped(id, &auth.principal.scope(Resource::Organizations))
        .await?
        .ok_or_else(|| CardHubError::not_found("Organization"))?;

    Ok(Json(organization))
}

/// POST /api/organizations
///
/// Creates the organization together with its first admin.
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateOrganizationRequest>,
) -> CardHubResult<(StatusCode, Json<CreatedOrganization>)> {
    let principal = &auth.principal;
    require(principal, Resource::Organizations, Action::Create)?;
    validate_model(&request)?;

    let agent_id = onboarding_agent(&state, principal, request.agent_id).await?;

    let organizations = OrganizationRepository::new(state.pool.clone());
    let code = match &request.code {
        Some(code) => {
            if organizations.code_exists(code).await? {
                return Err(CardHubError::conflict(format!(
                    "Organization code '{code}' is already in use"
                )));
            }
            code.clone()
        }
        None => available_code(&organizations, &request.name).await?,
    };

    let admin_mobile = request.admin.mobile.trim();
    if UserRepository::new(state.pool.clone())
        .mobile_exists(admin_mobile, None)
        .await?
    {
        return Err(CardHubError::conflict("Admin mobile number is already registered"));
    }

    let organization = NewOrganization {
        name: request.name.trim().to_string(),
        code,
        email: request.email.clone(),
        mobile: request.mobile.clone(),
        address: request.address.clone(),
        logo_url: request.logo_url.clone(),
        agent_id,
        created_by: principal.user_id,
    };
    let admin = NewUser {
        name: request.admin.name.trim().to_string(),
        email: request.admin.email.clone(),
        mobile: admin_mobile.to_string(),
        password_hash: hash_password(&request.admin.password)?,
        role: Role::Admin,
        organization_id: None,
        created_by: Some(principal.user_id),
    };

    let (organization, admin) = organizations.create_with_admin(&organization, admin).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedOrganization { organization, admin }),
    ))
}

/// PUT /api/organizations/:id
pub async fn update_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrganizationRequest>,
) -> CardHubResult<Json<Organization>> {
    require(&auth.principal, Resource::Organizations, Action::Update)?;
    validate_model(&request)?;

    let organizations = OrganizationRepository::new(state.pool.clone());
    organizations
        .find_scoped(id, &auth.principal.scope(Resource::Organizations))
        .await?
        .ok_or_else(|| CardHubError::not_found("Organization"))?;

    let changes = OrganizationChanges {
        name: request.name.as_deref().map(|n| n.trim().to_string()),
        email: request.email.clone(),
        mobile: request.mobile.clone(),
        address: request.address.clone(),
        logo_url: request.logo_url.clone(),
        is_active: request.is_active,
    };

    let organization = organizations
        .update(id, &changes)
        .await?
        .ok_or_else(|| CardHubError::not_found("Organization"))?;

    Ok(Json(organization))
}

/// DELETE /api/organizations/:id
///
/// Removes the organization together with its users, templates and cards.
pub async fn delete_organization(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<StatusCode> {
    require(&auth.principal, Resource::Organizations, Action::Delete)?;

    let organizations = OrganizationRepository::new(state.pool.clone());
    organizations
        .find_scoped(id, &auth.principal.scope(Resource::Organizations))
        .await?
        .ok_or_else(|| CardHubError::not_found("Organization"))?;

    if !organizations.delete(id).await? {
        return Err(CardHubError::not_found("Organization"));
    }

    tracing::info!(organization_id = %id, deleted_by = %auth.principal.user_id, "Organization deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Agents always onboard for themselves; owners may name an agent.
async fn onboarding_agent(
    state: &AppState,
    principal: &Principal,
    requested: Option<Uuid>,
) -> CardHubResult<Option<Uuid>> {
    match principal.role {
        Role::Agent => Ok(Some(principal.user_id)),
        _ => match requested {
            Some(agent_id) => {
                if AgentRepository::new(state.pool.clone()).exists(agent_id).await? {
                    Ok(Some(agent_id))
                } else {
                    Err(CardHubError::validation("agent_id", "Agent does not exist"))
                }
            }
            None => Ok(None),
        },
    }
}

/// First free code derived from `name`.
async fn available_code(organizations: &OrganizationRepository, name: &str) -> CardHubResult<String> {
    let base = derive_code(name);
    for attempt in 0..MAX_CODE_ATTEMPTS {
        let candidate = code_with_suffix(&base, attempt);
        if !organizations.code_exists(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(CardHubError::conflict(format!(
        "No free organization code derived from '{base}'; pass an explicit code"
    )))
}
