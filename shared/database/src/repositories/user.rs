//! User Repository
//!
//! CRUD operations for user accounts.
//! Uses runtime SQL queries (unchecked) to avoid requiring DATABASE_URL at compile time.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use cardhub_models::{PageRequest, Role, Scope, User, UserFilter};

use super::scope::{push_scope, search_pattern, USER_SCOPE};

pub(crate) const USER_COLUMNS: &str = "u.id, u.name, u.email, u.mobile, u.password_hash, u.role, \
     u.organization_id, u.is_active, u.created_by, u.created_at, u.updated_at";

/// Fields of an account about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub mobile: String,
    pub password_hash: String,
    pub role: Role,
    pub organization_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
}

/// Partial update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password_hash: Option<String>,
    pub is_active: Option<bool>,
}

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find user by ID, ignoring scope
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by ID")?;

        row.map(User::try_from).transpose()
    }

    /// Find user by ID within the caller's scope
    pub async fn find_scoped(&self, id: Uuid, scope: &Scope) -> Result<Option<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = "));
        qb.push_bind(id).push(" AND ");
        push_scope(&mut qb, scope, &USER_SCOPE);

        let row: Option<UserRow> = qb
            .build_query_as::<UserRow>()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch scoped user")?;

        row.map(User::try_from).transpose()
    }

    pub async fn find_by_mobile(&self, mobile: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.mobile = $1");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(mobile)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by mobile")?;

        row.map(User::try_from).transpose()
    }

    /// Whether another account already uses `mobile`
    pub async fn mobile_exists(&self, mobile: &str, exclude: Option<Uuid>) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM users WHERE mobile = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(mobile)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check mobile uniqueness")?;

        Ok(row.0)
    }

    pub async fn count_by_role(&self, role: Role) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users by role")?;

        Ok(row.0)
    }

    /// List users visible in `scope`, newest first
    pub async fn list(
        &self,
        scope: &Scope,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<(Vec<User>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u WHERE ");
        push_filters(&mut count, scope, filter);
        let total: (i64,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users u WHERE "));
        push_filters(&mut select, scope, filter);
        select
            .push(" ORDER BY u.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<UserRow> = select
            .build_query_as::<UserRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;

        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((users, total.0))
    }

    /// Create new user
    pub async fn create(&self, user: &NewUser) -> Result<User> {
        Self::insert(&self.pool, user).await
    }

    /// Insert a user on any executor, so callers can use it inside a transaction
    pub async fn insert<'e, E>(executor: E, user: &NewUser) -> Result<User>
    where
        E: PgExecutor<'e>,
    {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO users AS u
                (id, name, email, mobile, password_hash, role, organization_id,
                 is_active, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8, $9, $9)
            RETURNING {USER_COLUMNS}
            "#
        );

        let row: UserRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.mobile)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.organization_id)
            .bind(user.created_by)
            .bind(now)
            .fetch_one(executor)
            .await
            .context("Failed to create user")?;

        User::try_from(row)
    }

    /// Update existing user
    pub async fn update(&self, id: Uuid, changes: &UserChanges) -> Result<Option<User>> {
        Self::apply_changes(&self.pool, id, changes).await
    }

    pub async fn apply_changes<'e, E>(executor: E, id: Uuid, changes: &UserChanges) -> Result<Option<User>>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            UPDATE users AS u SET
                name = COALESCE($2, u.name),
                email = COALESCE($3, u.email),
                mobile = COALESCE($4, u.mobile),
                password_hash = COALESCE($5, u.password_hash),
                is_active = COALESCE($6, u.is_active),
                updated_at = $7
            WHERE u.id = $1
            RETURNING {USER_COLUMNS}
            "#
        );

        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.email)
            .bind(&changes.mobile)
            .bind(&changes.password_hash)
            .bind(changes.is_active)
            .bind(Utc::now())
            .fetch_optional(executor)
            .await
            .context("Failed to update user")?;

        row.map(User::try_from).transpose()
    }

    /// Delete user by ID
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected() > 0)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, filter: &UserFilter) {
    push_scope(qb, scope, &USER_SCOPE);

    if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
        qb.push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.mobile ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(role) = filter.role {
        qb.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(organization_id) = filter.organization_id {
        qb.push(" AND u.organization_id = ").push_bind(organization_id);
    }
}

/// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
pub(crate) struct UserRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    mobile: String,
    password_hash: String,
    role: String,
    organization_id: Option<Uuid>,
    is_active: bool,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            mobile: row.mobile,
            password_hash: row.password_hash,
            role: row.role.parse().context("Stored user has an invalid role")?,
            organization_id: row.organization_id,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
