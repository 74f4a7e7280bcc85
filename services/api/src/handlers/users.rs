//! User account management.
//!
//! Agents are managed under `/api/agents`; these endpoints create and edit
//! organization admins and staff.

use axum::{extract::State, http::StatusCode, Extension};
use cardhub_database::{NewUser, UserChanges, UserRepository};
use cardhub_models::{
    Action, CreateUserRequest, Page, PageRequest, Principal, Resource, Role, UpdateUserRequest,
    User, UserFilter,
};
use cardhub_utils::{hash_password, validate_model, CardHubError, CardHubResult};
use uuid::Uuid;

use super::{require, target_organization, writable_organization};
use crate::{
    extract::{Json, Path, Query},
    middleware::AuthUser,
    AppState,
};

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Query(page): Query<PageRequest>,
    Query(filter): Query<UserFilter>,
) -> CardHubResult<Json<Page<User>>> {
    require(&auth.principal, Resource::Users, Action::Read)?;

    let scope = auth.principal.scope(Resource::Users);
    let (users, total) = UserRepository::new(state.pool.clone())
        .list(&scope, &filter, page)
        .await?;

    Ok(Json(Page::new(users, page, total)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<Json<User>> {
    require(&auth.principal, Resource::Users, Action::Read)?;

    let user = UserRepository::new(state.pool.clone())
        .find_scoped(id, &auth.principal.scope(Resource::Users))
        .await?
        .ok_or_else(|| CardHubError::not_found("User"))?;

    Ok(Json(user))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<CreateUserRequest>,
) -> CardHubResult<(StatusCode, Json<User>)> {
    let principal = &auth.principal;
    require(principal, Resource::Users, Action::Create)?;
    validate_model(&request)?;

    check_manages(principal, request.role, "create")?;

    let organization_id = target_organization(principal, request.organization_id)?;
    writable_organization(&state, principal, organization_id).await?;

    let users = UserRepository::new(state.pool.clone());
    let mobile = request.mobile.trim();
    if users.mobile_exists(mobile, None).await? {
        return Err(CardHubError::conflict("Mobile number is already registered"));
    }

    let user = users
        .create(&NewUser {
            name: request.name.trim().to_string(),
            email: request.email.clone(),
            mobile: mobile.to_string(),
            password_hash: hash_password(&request.password)?,
            role: request.role,
            organization_id: Some(organization_id),
            created_by: Some(principal.user_id),
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, organization_id = %organization_id, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// PUT /api/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRequest>,
) -> CardHubResult<Json<User>> {
    let principal = &auth.principal;
    require(principal, Resource::Users, Action::Update)?;
    validate_model(&request)?;

    let users = UserRepository::new(state.pool.clone());
    let existing = users
        .find_scoped(id, &principal.scope(Resource::Users))
        .await?
        .ok_or_else(|| CardHubError::not_found("User"))?;

    check_edit(principal, &existing, request.is_active)?;

    let mobile = request.mobile.as_deref().map(str::trim);
    if let Some(mobile) = mobile {
        if users.mobile_exists(mobile, Some(id)).await? {
            return Err(CardHubError::conflict("Mobile number is already registered"));
        }
    }

    let password_hash = match &request.password {
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let changes = UserChanges {
        name: request.name.as_deref().map(|n| n.trim().to_string()),
        email: request.email.clone(),
        mobile: mobile.map(str::to_string),
        password_hash,
        is_active: request.is_active,
    };

    let user = users
        .update(id, &changes)
        .await?
        .ok_or_else(|| CardHubError::not_found("User"))?;

    Ok(Json(user))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> CardHubResult<StatusCode> {
    let principal = &auth.principal;
    require(principal, Resource::Users, Action::Delete)?;

    refuse_self_delete(principal, id)?;

    let users = UserRepository::new(state.pool.clone());
    let existing = users
        .find_scoped(id, &principal.scope(Resource::Users))
        .await?
        .ok_or_else(|| CardHubError::not_found("User"))?;

    check_manages(principal, existing.role, "delete")?;

    if !users.delete(id).await? {
        return Err(CardHubError::not_found("User"));
    }

    tracing::info!(user_id = %id, deleted_by = %principal.user_id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Users may edit their own profile but not deactivate it; anyone else must
/// sit below the caller in the role hierarchy.
fn check_edit(principal: &Principal, target: &User, is_active: Option<bool>) -> CardHubResult<()> {
    if principal.is_self(target.id) {
        if is_active == Some(false) {
            return Err(CardHubError::validation(
                "is_active",
                "You cannot deactivate your own account",
            ));
        }
        return Ok(());
    }
    check_manages(principal, target.role, "edit")
}

fn check_manages(principal: &Principal, target: Role, verb: &str) -> CardHubResult<()> {
    if principal.role.can_create(target) {
        Ok(())
    } else {
        Err(CardHubError::authorization(format!(
            "A {} cannot {verb} {target} accounts",
            principal.role
        )))
    }
}

fn refuse_self_delete(principal: &Principal, id: Uuid) -> CardHubResult<()> {
    if principal.is_self(id) {
        return Err(CardHubError::authorization("You cannot delete your own account"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role, organization_id: Uuid) -> User {
        User {
            id: Uuid::new_v4(),
            name: format!("{role} user"),
            email: None,
            mobile: "9876543210".to_string(),
            password_hash: String::new(),
            role,
            organization_id: Some(organization_id),
            is_active: true,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_self_delete_is_forbidden() {
        let principal = Principal::new(Uuid::new_v4(), Role::Owner, None);
        let err = refuse_self_delete(&principal, principal.user_id).unwrap_err();
        assert_eq!(err.http_status_code(), 403);
        assert!(refuse_self_delete(&principal, Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_self_deactivation_is_a_validation_error() {
        let org = Uuid::new_v4();
        let admin = user(Role::Admin, org);
        let principal = admin.principal();

        match check_edit(&principal, &admin, Some(false)) {
            Err(CardHubError::Validation { field, .. }) => assert_eq!(field, "is_active"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(check_edit(&principal, &admin, None).is_ok());
    }

    #[test]
    fn test_admin_cannot_edit_another_admin() {
        let org = Uuid::new_v4();
        let principal = user(Role::Admin, org).principal();

        let err = check_edit(&principal, &user(Role::Admin, org), None).unwrap_err();
        assert_eq!(err.http_status_code(), 403);
        assert_eq!(err.public_message(), "A admin cannot edit admin accounts");

        assert!(check_edit(&principal, &user(Role::Staff, org), Some(false)).is_ok());
    }

    #[test]
    fn test_staff_manage_nobody() {
        let principal = Principal::new(Uuid::new_v4(), Role::Staff, Some(Uuid::new_v4()));
        for target in [Role::Owner, Role::Agent, Role::Admin, Role::Staff] {
            assert!(check_manages(&principal, target, "delete").is_err());
        }
    }
}
