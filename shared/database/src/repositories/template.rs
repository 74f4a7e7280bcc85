//! Template Repository
//!
//! CRUD operations for card templates. Fields are stored as a JSONB array.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use cardhub_models::{Orientation, PageRequest, Scope, Template, TemplateField, TemplateFilter};

use super::scope::{push_scope, search_pattern, TEMPLATE_SCOPE};

const TEMPLATE_COLUMNS: &str = "t.id, t.organization_id, t.name, t.description, t.orientation, \
     t.front_background_url, t.back_background_url, t.fields, t.is_active, t.created_by, \
     t.created_at, t.updated_at";

#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub organization_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub orientation: Orientation,
    pub front_background_url: Option<String>,
    pub back_background_url: Option<String>,
    pub fields: Vec<TemplateField>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub orientation: Option<Orientation>,
    pub front_background_url: Option<String>,
    pub back_background_url: Option<String>,
    pub fields: Option<Vec<TemplateField>>,
    pub is_active: Option<bool>,
}

pub struct TemplateRepository {
    pool: PgPool,
}

impl TemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Template>> {
        let sql = format!("SELECT {TEMPLATE_COLUMNS} FROM templates t WHERE t.id = $1");
        let row: Option<TemplateRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch template by ID")?;

        row.map(Template::try_from).transpose()
    }

    /// Find template by ID within the caller's scope
    pub async fn find_scoped(&self, id: Uuid, scope: &Scope) -> Result<Option<Template>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates t WHERE t.id = "
        ));
        qb.push_bind(id).push(" AND ");
        push_scope(&mut qb, scope, &TEMPLATE_SCOPE);

        let row: Option<TemplateRow> = qb
            .build_query_as::<TemplateRow>()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch scoped template")?;

        row.map(Template::try_from).transpose()
    }

    /// Whether the organization already has a template called `name`, ignoring case
    pub async fn name_exists(&self, organization_id: Uuid, name: &str, exclude: Option<Uuid>) -> Result<bool> {
        let row: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM templates
                WHERE organization_id = $1 AND LOWER(name) = LOWER($2)
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(organization_id)
        .bind(name.trim())
        .bind(exclude)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check template name")?;

        Ok(row.0)
    }

    /// List templates visible in `scope`, ordered by name
    pub async fn list(
        &self,
        scope: &Scope,
        filter: &TemplateFilter,
        page: PageRequest,
    ) -> Result<(Vec<Template>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM templates t WHERE ");
        push_filters(&mut count, scope, filter);
        let total: (i64,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count templates")?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates t WHERE "
        ));
        push_filters(&mut select, scope, filter);
        select
            .push(" ORDER BY t.name LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<TemplateRow> = select
            .build_query_as::<TemplateRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list templates")?;

        let templates = rows
            .into_iter()
            .map(Template::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((templates, total.0))
    }

    pub async fn create(&self, template: &NewTemplate) -> Result<Template> {
        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO templates AS t
                (id, organization_id, name, description, orientation, front_background_url,
                 back_background_url, fields, is_active, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, TRUE, $9, $10, $10)
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );

        let row: TemplateRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(template.organization_id)
            .bind(template.name.trim())
            .bind(&template.description)
            .bind(template.orientation.as_str())
            .bind(&template.front_background_url)
            .bind(&template.back_background_url)
            .bind(Json(&template.fields))
            .bind(template.created_by)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create template")?;

        Template::try_from(row)
    }

    pub async fn update(&self, id: Uuid, changes: &TemplateChanges) -> Result<Option<Template>> {
        let sql = format!(
            r#"
            UPDATE templates AS t SET
                name = COALESCE($2, t.name),
                description = COALESCE($3, t.description),
                orientation = COALESCE($4, t.orientation),
                front_background_url = COALESCE($5, t.front_background_url),
                back_background_url = COALESCE($6, t.back_background_url),
                fields = COALESCE($7, t.fields),
                is_active = COALESCE($8, t.is_active),
                updated_at = $9
            WHERE t.id = $1
            RETURNING {TEMPLATE_COLUMNS}
            "#
        );

        let row: Option<TemplateRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(changes.name.as_deref().map(str::trim))
            .bind(&changes.description)
            .bind(changes.orientation.map(|o| o.as_str()))
            .bind(&changes.front_background_url)
            .bind(&changes.back_background_url)
            .bind(changes.fields.as_ref().map(Json))
            .bind(changes.is_active)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update template")?;

        row.map(Template::try_from).transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM templates WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete template")?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of cards laid out with the template
    pub async fn count_cards(&self, id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM id_cards WHERE template_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count template cards")?;

        Ok(row.0)
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, filter: &TemplateFilter) {
    push_scope(qb, scope, &TEMPLATE_SCOPE);

    if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
        qb.push(" AND t.name ILIKE ").push_bind(pattern);
    }
    if let Some(organization_id) = filter.organization_id {
        qb.push(" AND t.organization_id = ").push_bind(organization_id);
    }
    if let Some(is_active) = filter.is_active {
        qb.push(" AND t.is_active = ").push_bind(is_active);
    }
}

/// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct TemplateRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    description: Option<String>,
    orientation: String,
    front_background_url: Option<String>,
    back_background_url: Option<String>,
    fields: Json<Vec<TemplateField>>,
    is_active: bool,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = anyhow::Error;

    fn try_from(row: TemplateRow) -> Result<Self> {
        let orientation = Orientation::parse(&row.orientation)
            .with_context(|| format!("Stored template has an invalid orientation '{}'", row.orientation))?;

        Ok(Self {
            id: row.id,
            organization_id: row.organization_id,
            name: row.name,
            description: row.description,
            orientation,
            front_background_url: row.front_background_url,
            back_background_url: row.back_background_url,
            fields: row.fields.0,
            is_active: row.is_active,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_filters_render() {
        let filter = TemplateFilter {
            search: Some("student".to_string()),
            organization_id: None,
            is_active: Some(true),
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM templates t WHERE ");
        push_filters(&mut qb, &Scope::AgentOrganizations(Uuid::new_v4()), &filter);

        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM templates t WHERE \
             (t.organization_id IN (SELECT id FROM organizations WHERE agent_id = $1)) \
             AND t.name ILIKE $2 AND t.is_active = $3"
        );
    }

    #[test]
    fn test_row_with_unknown_orientation_is_rejected() {
        let row = TemplateRow {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            name: "Visitor".to_string(),
            description: None,
            orientation: "diagonal".to_string(),
            front_background_url: None,
            back_background_url: None,
            fields: Json(Vec::new()),
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(Template::try_from(row).is_err());
    }
}
