//! Agent (reseller) management. Only owners create, edit or remove agents;
//! an agent may read its own record.

use axum::{extract::State, http::StatusCode, Extension};
use cardhub_database::{AgentChanges, AgentRepository, NewAgentProfile, NewUser, UserChanges, UserRepository};
use cardhub_models::{
    Action, Agent, CreateAgentRequest, Page, PageRequest, Resource, Role, UpdateAgentRequest,
};
use cardhub_utils::{hash_password, validate_model, CardHubError, CardHubResult};
use serde::Deserialize;
use uuid::Uuid;

use super::require;
use crate::{
    extract::{Json, Path, Query},
    middleware::AuthUser,
    AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct AgentQuery {
    pub search: Option<String>,
}

/// GET /api/agents
pub async fn list_agents(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageRequest>,
    Query(query): Query<AgentQuery>,
) -> CardHubResult<Json<Page<Agent>>> {
    require(&auth.principal, Resource::Agents, Action::Read)?;

    let scope = auth.principal.scope(Resource::Agents);
    let (agents, total) = AgentRepository::new(state.pool.clone())
        .list(&scope, query.search.as_deref(), page)
        .await?;

    Ok(Json(Page::new(agents, page, total)))
}

/// GET /api/agents/:id
pub async fn get_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<Json<Agent>> {
    require(&auth.principal, Resource::Agents, Action::Read)?;

    let agent = AgentRepository::new(state.pool.clone())
        .find_scoped(id, &auth.principal.scope(Resource::Agents))
        .await?
        .ok_or_else(|| CardHubError::not_found("Agent"))?;

    Ok(Json(agent))
}

/// POST /api/agents
pub async fn create_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateAgentRequest>,
) -> CardHubResult<(StatusCode, Json<Agent>)> {
    require(&auth.principal, Resource::Agents, Action::Create)?;
    validate_model(&request)?;

    let mobile = request.mobile.trim();
    if UserRepository::new(state.pool.clone())
        .mobile_exists(mobile, None)
        .await?
    {
        return Err(CardHubError::conflict("Mobile number is already registered"));
    }

    let user = NewUser {
        name: request.name.trim().to_string(),
        email: request.email.clone(),
        mobile: mobile.to_string(),
        password_hash: hash_password(&request.password)?,
        role: Role::Agent,
        organization_id: None,
        created_by: Some(auth.principal.user_id),
    };
    let profile = NewAgentProfile {
        business_name: request.business_name.trim().to_string(),
        address: request.address.clone(),
        city: request.city.clone(),
        state: request.state.clone(),
    };

    let agent = AgentRepository::new(state.pool.clone())
        .create(&user, &profile)
        .await?;

    Ok((StatusCode::CREATED, Json(agent)))
}

/// PUT /api/agents/:id
pub async fn update_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateAgentRequest>,
) -> CardHubResult<Json<Agent>> {
    require(&auth.principal, Resource::Agents, Action::Update)?;
    validate_model(&request)?;

    let agents = AgentRepository::new(state.pool.clone());
    agents
        .find_scoped(id, &auth.principal.scope(Resource::Agents))
        .await?
        .ok_or_else(|| CardHubError::not_found("Agent"))?;

    let mobile = request.mobile.as_deref().map(str::trim);
    if let Some(mobile) = mobile {
        if UserRepository::new(state.pool.clone())
            .mobile_exists(mobile, Some(id))
            .await?
        {
            return Err(CardHubError::conflict("Mobile number is already registered"));
        }
    }

    let changes = AgentChanges {
        user: UserChanges {
            name: request.name.as_deref().map(|n| n.trim().to_string()),
            email: request.email.clone(),
            mobile: mobile.map(str::to_string),
            password_hash: None,
            is_active: request.is_active,
        },
        business_name: request.business_name.as_deref().map(|n| n.trim().to_string()),
        address: request.address.clone(),
        city: request.city.clone(),
        state: request.state.clone(),
    };

    let agent = agents
        .update(id, &changes)
        .await?
        .ok_or_else(|| CardHubError::not_found("Agent"))?;

    Ok(Json(agent))
}

/// DELETE /api/agents/:id
///
/// Organizations the agent onboarded stay in place without an agent.
pub async fn delete_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<StatusCode> {
    require(&auth.principal, Resource::Agents, Action::Delete)?;

    if !AgentRepository::new(state.pool.clone()).delete(id).await? {
        return Err(CardHubError::not_found("Agent"));
    }

    tracing::info!(agent_id = %id, "Agent deleted");
    Ok(StatusCode::NO_CONTENT)
}
