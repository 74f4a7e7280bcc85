//! ID card issuance, editing and status changes.

use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Extension};
use cardhub_database::{IdCardChanges, IdCardRepository, NewIdCard, TemplateRepository};
use cardhub_models::{
    check_date_order, Action, CardStats, CardStatus, CreateIdCardRequest, FieldProblem,
    IdCardFilter, IdCardView, Page, PageRequest, Principal, RenderedCard, Resource, Template,
    UpdateCardStatusRequest, UpdateIdCardRequest,
};
use cardhub_utils::{validate_model, CardHubError, CardHubResult};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use super::{require, writable_organization};
use crate::{
    extract::{Json, Path, Query},
    middleware::AuthUser,
    AppState,
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// GET /api/id-cards
pub async fn list_id_cards(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<IdCardFilter>,
) -> CardHubResult<Json<Page<IdCardView>>> {
    require(&auth.principal, Resource::IdCards, Action::Read)?;

    let scope = auth.principal.scope(Resource::IdCards);
    let (cards, total) = IdCardRepository::new(state.pool.clone())
        .list(&scope, &filter, page)
        .await?;

    let today = today();
    Ok(Json(
        Page::new(cards, page, total).map(|card| IdCardView::new(card, today)),
    ))
}

/// GET /api/id-cards/stats
pub async fn id_card_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> CardHubResult<Json<CardStats>> {
    require(&auth.principal, Resource::IdCards, Action::Read)?;

    let counts = IdCardRepository::new(state.pool.clone())
        .stats(&auth.principal.scope(Resource::IdCards))
        .await?;

    Ok(Json(CardStats::from_counts(counts)))
}

/// GET /api/id-cards/:id
pub async fn get_id_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<Json<IdCardView>> {
    require(&auth.principal, Resource::IdCards, Action::Read)?;

    let card = IdCardRepository::new(state.pool.clone())
        .find_scoped(id, &auth.principal.scope(Resource::IdCards))
        .await?
        .ok_or_else(|| CardHubError::not_found("ID card"))?;

    Ok(Json(IdCardView::new(card, today())))
}

/// POST /api/id-cards
///
/// The card lands in the template's organization as a draft.
pub async fn create_id_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateIdCardRequest>,
) -> CardHubResult<(StatusCode, Json<IdCardView>)> {
    let principal = &auth.principal;
    require(principal, Resource::IdCards, Action::Create)?;
    validate_model(&request)?;

    let template = TemplateRepository::new(state.pool.clone())
        .find_scoped(request.template_id, &principal.scope(Resource::Templates))
        .await?
        .ok_or_else(|| CardHubError::not_found("Template"))?;
    if !template.is_active {
        return Err(CardHubError::validation("template_id", "Template is not active"));
    }

    writable_organization(&state, principal, template.organization_id).await?;
    check_card_data(&template, &request.data)?;

    let card = IdCardRepository::new(state.pool.clone())
        .create(&NewIdCard {
            organization_id: template.organization_id,
            template_id: template.id,
            holder_name: request.holder_name,
            photo_url: request.photo_url,
            data: request.data,
            issue_date: request.issue_date.unwrap_or_else(today),
            expiry_date: request.expiry_date,
            created_by: principal.user_id,
        })
        .await?;

    state.metrics.cards_created.inc();
    Ok((StatusCode::CREATED, Json(IdCardView::new(card, today()))))
}

/// PUT /api/id-cards/:id
///
/// Only drafts may be edited.
pub async fn update_id_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateIdCardRequest>,
) -> CardHubResult<Json<IdCardView>> {
    require(&auth.principal, Resource::IdCards, Action::Update)?;
    validate_model(&request)?;

    let cards = IdCardRepository::new(state.pool.clone());
    let existing = cards
        .find_scoped(id, &auth.principal.scope(Resource::IdCards))
        .await?
        .ok_or_else(|| CardHubError::not_found("ID card"))?;

    if !existing.status.is_editable() {
        return Err(CardHubError::conflict(format!(
            "Only draft cards can be edited; this card is {}",
            existing.status
        )));
    }

    if let Some(data) = &request.data {
        let template = TemplateRepository::new(state.pool.clone())
            .find_by_id(existing.template_id)
            .await?
            .ok_or_else(|| CardHubError::not_found("Template"))?;
        check_card_data(&template, data)?;
    }

    let issue_date = request.issue_date.unwrap_or(existing.issue_date);
    let expiry_date = request.expiry_date.or(existing.expiry_date);
    check_date_order(issue_date, expiry_date).map_err(|e| {
        CardHubError::validation(
            "expiry_date",
            e.message
                .map(|m| m.to_string())
                .unwrap_or_else(|| "Expiry date must be after the issue date".to_string()),
        )
    })?;

    let changes = IdCardChanges {
        holder_name: request.holder_name,
        photo_url: request.photo_url,
        data: request.data,
        issue_date: request.issue_date,
        expiry_date: request.expiry_date,
    };

    let card = cards
        .update(id, &changes)
        .await?
        .ok_or_else(|| CardHubError::not_found("ID card"))?;

    Ok(Json(IdCardView::new(card, today())))
}

/// PATCH /api/id-cards/:id/status
pub async fn update_id_card_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateCardStatusRequest>,
) -> CardHubResult<Json<IdCardView>> {
    let principal = &auth.principal;
    require(principal, Resource::IdCards, Action::Update)?;

    let cards = IdCardRepository::new(state.pool.clone());
    let existing = cards
        .find_scoped(id, &principal.scope(Resource::IdCards))
        .await?
        .ok_or_else(|| CardHubError::not_found("ID card"))?;

    let (from, to) = (existing.status, request.status);
    check_transition(principal, from, to)?;

    let card = cards
        .update_status(id, from, to)
        .await?
        .ok_or_else(|| CardHubError::conflict("The card's status changed meanwhile; reload and retry"))?;

    state
        .metrics
        .card_transitions
        .with_label_values(&[to.as_str()])
        .inc();
    tracing::info!(card_id = %id, from = %from, to = %to, changed_by = %principal.user_id, "ID card status changed");

    Ok(Json(IdCardView::new(card, today())))
}

/// Status-machine and role checks for moving a card from `from` to `to`.
fn check_transition(principal: &Principal, from: CardStatus, to: CardStatus) -> CardHubResult<()> {
    if from.is_terminal() {
        return Err(CardHubError::validation(
            "status",
            format!("A {from} card can no longer change status"),
        ));
    }
    if !from.can_transition_to(to) {
        return Err(CardHubError::validation(
            "status",
            format!("A {from} card cannot move to {to}"),
        ));
    }
    if from.requires_admin(to) && !principal.role.is_at_least_admin() {
        return Err(CardHubError::authorization(format!(
            "Only admins can move a {from} card to {to}"
        )));
    }
    Ok(())
}

/// DELETE /api/id-cards/:id
pub async fn delete_id_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<StatusCode> {
    require(&auth.principal, Resource::IdCards, Action::Delete)?;

    let cards = IdCardRepository::new(state.pool.clone());
    cards
        .find_scoped(id, &auth.principal.scope(Resource::IdCards))
        .await?
        .ok_or_else(|| CardHubError::not_found("ID card"))?;

    if !cards.delete(id).await? {
        return Err(CardHubError::not_found("ID card"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/id-cards/:id/render
pub async fn render_id_card(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<Json<RenderedCard>> {
    require(&auth.principal, Resource::IdCards, Action::Read)?;

    let card = IdCardRepository::new(state.pool.clone())
        .find_scoped(id, &auth.principal.scope(Resource::IdCards))
        .await?
        .ok_or_else(|| CardHubError::not_found("ID card"))?;

    let template = TemplateRepository::new(state.pool.clone())
        .find_by_id(card.template_id)
        .await?
        .ok_or_else(|| CardHubError::not_found("Template"))?;

    Ok(Json(card.render(&template)))
}

fn check_card_data(template: &Template, data: &BTreeMap<String, String>) -> CardHubResult<()> {
    let problems = template.validate_card_data(data);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(CardHubError::validation("data", describe_problems(&problems)))
    }
}

fn describe_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardhub_models::{CardSide, FieldType, Orientation, Role, TemplateField};

    fn template() -> Template {
        Template {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Staff".to_string(),
            description: None,
            orientation: Orientation::Portrait,
            front_background_url: None,
            back_background_url: None,
            fields: vec![TemplateField {
                key: "employee_id".to_string(),
                label: "Employee ID".to_string(),
                field_type: FieldType::Number,
                side: CardSide::Front,
                position: 0,
                required: true,
            }],
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_card_data_problems_become_one_validation_error() {
        let mut data = BTreeMap::new();
        data.insert("nickname".to_string(), "Ace".to_string());

        match check_card_data(&template(), &data) {
            Err(CardHubError::Validation { field, message }) => {
                assert_eq!(field, "data");
                assert_eq!(
                    message,
                    "'employee_id' is required; 'nickname' is not a field of this template"
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_valid_card_data_passes() {
        let mut data = BTreeMap::new();
        data.insert("employee_id".to_string(), "1042".to_string());
        assert!(check_card_data(&template(), &data).is_ok());
    }

    fn principal(role: Role) -> Principal {
        Principal::new(Uuid::new_v4(), role, Some(Uuid::new_v4()))
    }

    #[test]
    fn test_staff_cannot_approve() {
        let result = check_transition(&principal(Role::Staff), CardStatus::Draft, CardStatus::Approved);
        assert_eq!(result.unwrap_err().http_status_code(), 403);

        assert!(check_transition(&principal(Role::Admin), CardStatus::Draft, CardStatus::Approved).is_ok());
    }

    #[test]
    fn test_staff_can_print_and_issue() {
        let staff = principal(Role::Staff);
        assert!(check_transition(&staff, CardStatus::Approved, CardStatus::Printed).is_ok());
        assert!(check_transition(&staff, CardStatus::Printed, CardStatus::Issued).is_ok());
    }

    #[test]
    fn test_invalid_transition_is_a_validation_error() {
        let result = check_transition(&principal(Role::Owner), CardStatus::Draft, CardStatus::Issued);
        match result {
            Err(CardHubError::Validation { field, message }) => {
                assert_eq!(field, "status");
                assert_eq!(message, "A draft card cannot move to issued");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_revoked_cards_are_final() {
        let result = check_transition(&principal(Role::Owner), CardStatus::Revoked, CardStatus::Draft);
        assert_eq!(result.unwrap_err().http_status_code(), 400);
    }
}
