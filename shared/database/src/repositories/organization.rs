//! Organization Repository
//!
//! CRUD operations for organizations. Creating an organization inserts its
//! first admin in the same transaction.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use cardhub_models::{Organization, OrganizationFilter, PageRequest, Scope, User};

use super::scope::{push_scope, search_pattern, ORGANIZATION_SCOPE};
use super::user::{NewUser, UserRepository};

const ORGANIZATION_COLUMNS: &str = "o.id, o.name, o.code, o.email, o.mobile, o.address, o.logo_url, \
     o.agent_id, o.card_counter, o.is_active, o.created_by, o.created_at, o.updated_at";

#[derive(Debug, Clone)]
pub struct NewOrganization {
    pub name: String,
    pub code: String,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub logo_url: Option<String>,
    pub agent_id: Option<Uuid>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct OrganizationChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub address: Option<String>,
    pub logo_url: Option<String>,
    pub is_active: Option<bool>,
}

pub struct OrganizationRepository {
    pool: PgPool,
}

impl OrganizationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find organization by ID, ignoring scope
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Organization>> {
        let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations o WHERE o.id = $1");
        let row: Option<OrganizationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch organization by ID")?;

        Ok(row.map(Into::into))
    }

    /// Find organization by ID within the caller's scope
    pub async fn find_scoped(&self, id: Uuid, scope: &Scope) -> Result<Option<Organization>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations o WHERE o.id = "
        ));
        qb.push_bind(id).push(" AND ");
        push_scope(&mut qb, scope, &ORGANIZATION_SCOPE);

        let row: Option<OrganizationRow> = qb
            .build_query_as::<OrganizationRow>()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch scoped organization")?;

        Ok(row.map(Into::into))
    }

    pub async fn code_exists(&self, code: &str) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM organizations WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check organization code")?;

        Ok(row.0)
    }

    /// List organizations visible in `scope`, ordered by name
    pub async fn list(
        &self,
        scope: &Scope,
        filter: &OrganizationFilter,
        page: PageRequest,
    ) -> Result<(Vec<Organization>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM organizations o WHERE ");
        push_filters(&mut count, scope, filter);
        let total: (i64,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count organizations")?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations o WHERE "
        ));
        push_filters(&mut select, scope, filter);
        select
            .push(" ORDER BY o.name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<OrganizationRow> = select
            .build_query_as::<OrganizationRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list organizations")?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    /// Create an organization and its first admin atomically
    pub async fn create_with_admin(
        &self,
        organization: &NewOrganization,
        admin: NewUser,
    ) -> Result<(Organization, User)> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let now = Utc::now();

        let sql = format!(
            r#"
            INSERT INTO organizations AS o
                (id, name, code, email, mobile, address, logo_url, agent_id,
                 card_counter, is_active, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 0, TRUE, $9, $10, $10)
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        );

        let row: OrganizationRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(&organization.name)
            .bind(&organization.code)
            .bind(&organization.email)
            .bind(&organization.mobile)
            .bind(&organization.address)
            .bind(&organization.logo_url)
            .bind(organization.agent_id)
            .bind(organization.created_by)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to create organization")?;
        let created: Organization = row.into();

        let admin = NewUser {
            organization_id: Some(created.id),
            ..admin
        };
        let admin = UserRepository::insert(&mut *tx, &admin).await?;

        tx.commit().await.context("Failed to commit organization")?;
        tracing::info!(organization_id = %created.id, code = %created.code, "Organization created");

        Ok((created, admin))
    }

    /// Update existing organization
    pub async fn update(&self, id: Uuid, changes: &OrganizationChanges) -> Result<Option<Organization>> {
        let sql = format!(
            r#"
            UPDATE organizations AS o SET
                name = COALESCE($2, o.name),
                email = COALESCE($3, o.email),
                mobile = COALESCE($4, o.mobile),
                address = COALESCE($5, o.address),
                logo_url = COALESCE($6, o.logo_url),
                is_active = COALESCE($7, o.is_active),
                updated_at = $8
            WHERE o.id = $1
            RETURNING {ORGANIZATION_COLUMNS}
            "#
        );

        let row: Option<OrganizationRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&changes.name)
            .bind(&changes.email)
            .bind(&changes.mobile)
            .bind(&changes.address)
            .bind(&changes.logo_url)
            .bind(changes.is_active)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update organization")?;

        Ok(row.map(Into::into))
    }

    /// Delete an organization with its cards and members; templates cascade
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM id_cards WHERE organization_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete organization cards")?;

        sqlx::query("DELETE FROM users WHERE organization_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete organization members")?;

        let result = sqlx::query("DELETE FROM organizations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete organization")?;

        tx.commit().await.context("Failed to commit organization delete")?;
        Ok(result.rows_affected() > 0)
    }

    /// Reserve the next card serial of an organization, returning its code and the serial
    pub async fn next_card_serial<'e, E>(executor: E, id: Uuid) -> Result<Option<(String, i64)>>
    where
        E: PgExecutor<'e>,
    {
        let row: Option<(String, i64)> = sqlx::query_as(
            r#"
            UPDATE organizations
            SET card_counter = card_counter + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING code, card_counter
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("Failed to reserve card serial")?;

        Ok(row)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, filter: &OrganizationFilter) {
    push_scope(qb, scope, &ORGANIZATION_SCOPE);

    if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
        qb.push(" AND (o.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR o.code ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(agent_id) = filter.agent_id {
        qb.push(" AND o.agent_id = ").push_bind(agent_id);
    }
}

/// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    code: String,
    email: Option<String>,
    mobile: Option<String>,
    address: Option<String>,
    logo_url: Option<String>,
    agent_id: Option<Uuid>,
    card_counter: i64,
    is_active: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrganizationRow> for Organization {
    fn from(row: OrganizationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            code: row.code,
            email: row.email,
            mobile: row.mobile,
            address: row.address,
            logo_url: row.logo_url,
            agent_id: row.agent_id,
            card_counter: row.card_counter,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
