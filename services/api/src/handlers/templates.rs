//! Card template endpoints.

use axum::{extract::State, http::StatusCode, Extension};
use cardhub_database::{NewTemplate, TemplateChanges, TemplateRepository};
use cardhub_models::{
    normalize_fields, Action, CreateTemplateRequest, Page, PageRequest, Resource, Template,
    TemplateFilter, UpdateTemplateRequest,
};
use cardhub_utils::{validate_model, CardHubError, CardHubResult};
use uuid::Uuid;

use super::{require, target_organization, writable_organization};
use crate::{
    extract::{Json, Path, Query},
    middleware::AuthUser,
    AppState,
};

/// GET /api/templates
pub async fn list_templates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<TemplateFilter>,
) -> CardHubResult<Json<Page<Template>>> {
    require(&auth.principal, Resource::Templates, Action::Read)?;

    let scope = auth.principal.scope(Resource::Templates);
    let (templates, total) = TemplateRepository::new(state.pool.clone())
        .list(&scope, &filter, page)
        .await?;

    Ok(Json(Page::new(templates, page, total)))
}

/// GET /api/templates/:id
pub async fn get_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<Json<Template>> {
    require(&auth.principal, Resource::Templates, Action::Read)?;

    let template = TemplateRepository::new(state.pool.clone())
        .find_scoped(id, &auth.principal.scope(Resource::Templates))
        .await?
        .ok_or_else(|| CardHubError::not_found("Template"))?;

    Ok(Json(template))
}

/// POST /api/templates
pub async fn create_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateTemplateRequest>,
) -> CardHubResult<(StatusCode, Json<Template>)> {
    let principal = &auth.principal;
    require(principal, Resource::Templates, Action::Create)?;
    validate_model(&request)?;

    let organization_id = target_organization(principal, request.organization_id)?;
    writable_organization(&state, principal, organization_id).await?;

    let templates = TemplateRepository::new(state.pool.clone());
    if templates.name_exists(organization_id, &request.name, None).await? {
        return Err(duplicate_name(&request.name));
    }

    let mut fields = request.fields;
    normalize_fields(&mut fields);

    let template = templates
        .create(&NewTemplate {
            organization_id,
            name: request.name,
            description: request.description,
            orientation: request.orientation,
            front_background_url: request.front_background_url,
            back_background_url: request.back_background_url,
            fields,
            created_by: principal.user_id,
        })
        .await?;

    tracing::info!(template_id = %template.id, organization_id = %organization_id, "Template created");
    Ok((StatusCode::CREATED, Json(template)))
}

/// PUT /api/templates/:id
pub async fn update_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTemplateRequest>,
) -> CardHubResult<Json<Template>> {
    require(&auth.principal, Resource::Templates, Action::Update)?;
    validate_model(&request)?;

    let templates = TemplateRepository::new(state.pool.clone());
    let existing = templates
        .find_scoped(id, &auth.principal.scope(Resource::Templates))
        .await?
        .ok_or_else(|| CardHubError::not_found("Template"))?;

    if let Some(name) = &request.name {
        if templates
            .name_exists(existing.organization_id, name, Some(id))
            .await?
        {
            return Err(duplicate_name(name));
        }
    }

    let fields = request.fields.map(|mut fields| {
        normalize_fields(&mut fields);
        fields
    });

    let changes = TemplateChanges {
        name: request.name,
        description: request.description,
        orientation: request.orientation,
        front_background_url: request.front_background_url,
        back_background_url: request.back_background_url,
        fields,
        is_active: request.is_active,
    };

    let template = templates
        .update(id, &changes)
        .await?
        .ok_or_else(|| CardHubError::not_found("Template"))?;

    Ok(Json(template))
}

/// DELETE /api/templates/:id
///
/// Refused while cards still use the template.
pub async fn delete_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<StatusCode> {
    require(&auth.principal, Resource::Templates, Action::Delete)?;

    let templates = TemplateRepository::new(state.pool.clone());
    templates
        .find_scoped(id, &auth.principal.scope(Resource::Templates))
        .await?
        .ok_or_else(|| CardHubError::not_found("Template"))?;

    let cards = templates.count_cards(id).await?;
    if cards > 0 {
        return Err(CardHubError::conflict(format!(
            "Template is used by {cards} ID card(s); deactivate it instead"
        )));
    }

    if !templates.delete(id).await? {
        return Err(CardHubError::not_found("Template"));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn duplicate_name(name: &str) -> CardHubError {
    CardHubError::conflict(format!(
        "A template named '{}' already exists in this organization",
        name.trim()
    ))
}
