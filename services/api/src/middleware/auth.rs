use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use cardhub_database::UserRepository;
use cardhub_models::{Principal, User};
use cardhub_utils::CardHubError;

use crate::AppState;

/// The authenticated caller, inserted into request extensions by [`require_auth`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub principal: Principal,
}

impl AuthUser {
    pub fn new(user: User) -> Self {
        let principal = user.principal();
        Self { user, principal }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, CardHubError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok());

    match auth_header {
        Some(header) => match header.strip_prefix("Bearer ") {
            Some(token) if !token.trim().is_empty() => Ok(token.trim()),
            _ => Err(CardHubError::authentication(
                "Invalid authorization header format",
            )),
        },
        None => Err(CardHubError::authentication("Missing authorization header")),
    }
}

/// Verify the bearer token and load the caller's current account.
///
/// Role and organization come from the database, not the token, so changes
/// apply to tokens that were issued earlier.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, CardHubError> {
    let claims = {
        let token = bearer_token(request.headers())?;
        state.tokens.verify(token)?
    };

    let user = UserRepository::new(state.pool.clone())
        .find_by_id(claims.sub)
        .await?
        .ok_or_else(|| CardHubError::authentication("Account no longer exists"))?;

    if !user.is_active {
        return Err(CardHubError::authentication("Account is disabled"));
    }

    tracing::debug!(user_id = %user.id, role = %user.role, "Authenticated request");
    request.extensions_mut().insert(AuthUser::new(user));

    Ok(next.run(request).await)
}
