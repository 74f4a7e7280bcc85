//! Agent Repository
//!
//! An agent is a user account with role `agent` plus a row in `agents`
//! holding its business profile. Both are written in one transaction.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use cardhub_models::{Agent, AgentProfile, PageRequest, Scope, User};

use super::scope::{push_scope, search_pattern, AGENT_SCOPE};
use super::user::{NewUser, UserChanges, UserRepository, UserRow, USER_COLUMNS};

const PROFILE_COLUMNS: &str = "a.user_id, a.business_name, a.address, a.city, a.state, \
     a.created_at AS profile_created_at, a.updated_at AS profile_updated_at";

const ORGANIZATION_COUNT: &str =
    "(SELECT COUNT(*) FROM organizations o WHERE o.agent_id = a.user_id) AS organization_count";

#[derive(Debug, Clone)]
pub struct NewAgentProfile {
    pub business_name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct AgentChanges {
    pub user: UserChanges,
    pub business_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
}

pub struct AgentRepository {
    pool: PgPool,
}

impl AgentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find agent by user ID within the caller's scope
    pub async fn find_scoped(&self, id: Uuid, scope: &Scope) -> Result<Option<Agent>> {
        let mut qb = select_agents();
        qb.push("a.user_id = ").push_bind(id).push(" AND ");
        push_scope(&mut qb, scope, &AGENT_SCOPE);

        let row: Option<AgentRow> = qb
            .build_query_as::<AgentRow>()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch scoped agent")?;

        row.map(Agent::try_from).transpose()
    }

    /// List agents visible in `scope`, ordered by business name
    pub async fn list(
        &self,
        scope: &Scope,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<Agent>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM agents a JOIN users u ON u.id = a.user_id WHERE ",
        );
        push_filters(&mut count, scope, search);
        let total: (i64,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count agents")?;

        let mut select = select_agents();
        push_filters(&mut select, scope, search);
        select
            .push(" ORDER BY a.business_name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<AgentRow> = select
            .build_query_as::<AgentRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list agents")?;

        let agents = rows
            .into_iter()
            .map(Agent::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((agents, total.0))
    }

    /// Create the agent's account and profile atomically
    pub async fn create(&self, user: &NewUser, profile: &NewAgentProfile) -> Result<Agent> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let user = UserRepository::insert(&mut *tx, user).await?;
        let profile = insert_profile(&mut *tx, user.id, profile).await?;

        tx.commit().await.context("Failed to commit agent")?;
        tracing::info!(agent_id = %user.id, "Agent created");

        Ok(Agent {
            user,
            profile,
            organization_count: 0,
        })
    }

    /// Update account and profile atomically
    pub async fn update(&self, id: Uuid, changes: &AgentChanges) -> Result<Option<Agent>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let Some(user) = UserRepository::apply_changes(&mut *tx, id, &changes.user).await? else {
            return Ok(None);
        };

        let profile: Option<ProfileRow> = sqlx::query_as(
            r#"
            UPDATE agents AS a SET
                business_name = COALESCE($2, a.business_name),
                address = COALESCE($3, a.address),
                city = COALESCE($4, a.city),
                state = COALESCE($5, a.state),
                updated_at = $6
            WHERE a.user_id = $1
            RETURNING a.user_id, a.business_name, a.address, a.city, a.state,
                      a.created_at AS profile_created_at, a.updated_at AS profile_updated_at
            "#,
        )
        .bind(id)
        .bind(&changes.business_name)
        .bind(&changes.address)
        .bind(&changes.city)
        .bind(&changes.state)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update agent profile")?;

        let Some(profile) = profile else {
            return Ok(None);
        };

        let organization_count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM organizations WHERE agent_id = $1")
                .bind(id)
                .fetch_one(&mut *tx)
                .await
                .context("Failed to count agent organizations")?;

        tx.commit().await.context("Failed to commit agent update")?;

        Ok(Some(Agent {
            user,
            profile: profile.into(),
            organization_count: organization_count.0,
        }))
    }

    /// Delete the agent's account; the profile cascades and its organizations are unassigned
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND role = 'agent'")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete agent")?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether `id` is an agent account
    pub async fn exists(&self, id: Uuid) -> Result<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM agents WHERE user_id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check agent")?;

        Ok(row.0)
    }
}

fn select_agents() -> QueryBuilder<'static, Postgres> {
    QueryBuilder::new(format!(
        "SELECT {USER_COLUMNS}, {PROFILE_COLUMNS}, {ORGANIZATION_COUNT} \
         FROM agents a JOIN users u ON u.id = a.user_id WHERE "
    ))
}

async fn insert_profile<'e, E>(executor: E, user_id: Uuid, profile: &NewAgentProfile) -> Result<AgentProfile>
where
    E: PgExecutor<'e>,
{
    let row: ProfileRow = sqlx::query_as(
        r#"
        INSERT INTO agents AS a (user_id, business_name, address, city, state, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $6)
        RETURNING a.user_id, a.business_name, a.address, a.city, a.state,
                  a.created_at AS profile_created_at, a.updated_at AS profile_updated_at
        "#,
    )
    .bind(user_id)
    .bind(&profile.business_name)
    .bind(&profile.address)
    .bind(&profile.city)
    .bind(&profile.state)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
    .context("Failed to create agent profile")?;

    Ok(row.into())
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, search: Option<&str>) {
    push_scope(qb, scope, &AGENT_SCOPE);

    if let Some(pattern) = search.and_then(search_pattern) {
        qb.push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.business_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.mobile ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

#[derive(Debug, FromRow)]
struct ProfileRow {
    user_id: Uuid,
    business_name: String,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    profile_created_at: DateTime<Utc>,
    profile_updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for AgentProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            user_id: row.user_id,
            business_name: row.business_name,
            address: row.address,
            city: row.city,
            state: row.state,
            created_at: row.profile_created_at,
            updated_at: row.profile_updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AgentRow {
    #[sqlx(flatten)]
    user: UserRow,
    #[sqlx(flatten)]
    profile: ProfileRow,
    organization_count: i64,
}

impl TryFrom<AgentRow> for Agent {
    type Error = anyhow::Error;

    fn try_from(row: AgentRow) -> Result<Self> {
        Ok(Self {
            user: User::try_from(row.user)?,
            profile: row.profile.into(),
            organization_count: row.organization_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_scope_for_admin_matches_nothing() {
        let mut qb = select_agents();
        push_filters(&mut qb, &Scope::Record(Uuid::nil()), Some("north"));
        let sql = qb.sql();

        assert!(sql.contains("FROM agents a JOIN users u ON u.id = a.user_id WHERE (a.user_id = $1)"));
        assert!(sql.ends_with("AND (u.name ILIKE $2 OR a.business_name ILIKE $3 OR u.mobile ILIKE $4)"));
    }

    #[test]
    fn test_profile_columns_are_aliased() {
        assert!(PROFILE_COLUMNS.contains("AS profile_created_at"));
        assert!(!USER_COLUMNS.contains("profile_"));
    }
}
