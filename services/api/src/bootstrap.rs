//! First-run seeding of the platform owner account.

use anyhow::Result;
use cardhub_database::{NewUser, PostgresPool, UserRepository};
use cardhub_models::Role;
use cardhub_utils::{hash_password, AuthConfig};
use tracing::{info, warn};

/// Create the configured owner account when no owner exists yet.
///
/// Returns whether an account was created.
pub async fn ensure_owner(pool: &PostgresPool, auth: &AuthConfig) -> Result<bool> {
    let users = UserRepository::new(pool.clone());
    if users.count_by_role(Role::Owner).await? > 0 {
        return Ok(false);
    }

    let Some(owner) = &auth.bootstrap_owner else {
        warn!("No owner account exists and auth.bootstrap_owner is not configured");
        return Ok(false);
    };

    let created = users
        .create(&NewUser {
            name: owner.name.clone(),
            email: None,
            mobile: owner.mobile.clone(),
            password_hash: hash_password(&owner.password)?,
            role: Role::Owner,
            organization_id: None,
            created_by: None,
        })
        .await?;

    info!(user_id = %created.id, "Owner account created");
    Ok(true)
}
