//! ID Card Repository
//!
//! CRUD operations for issued cards. Card numbers are allocated from the
//! owning organization's counter inside the insert transaction.

use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use cardhub_models::{format_card_number, CardStatus, IdCard, IdCardFilter, PageRequest, Scope};

use super::organization::OrganizationRepository;
use super::scope::{push_scope, search_pattern, ID_CARD_SCOPE};

const ID_CARD_COLUMNS: &str = "c.id, c.organization_id, c.template_id, c.card_number, c.holder_name, \
     c.photo_url, c.data, c.issue_date, c.expiry_date, c.status, c.created_by, c.created_at, c.updated_at";

#[derive(Debug, Clone)]
pub struct NewIdCard {
    pub organization_id: Uuid,
    pub template_id: Uuid,
    pub holder_name: String,
    pub photo_url: Option<String>,
    pub data: BTreeMap<String, String>,
    pub issue_date: NaiveDate,
    pub expiry_date: Option<NaiveDate>,
    pub created_by: Uuid,
}

#[derive(Debug, Clone, Default)]
pub struct IdCardChanges {
    pub holder_name: Option<String>,
    pub photo_url: Option<String>,
    pub data: Option<BTreeMap<String, String>>,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
}

pub struct IdCardRepository {
    pool: PgPool,
}

impl IdCardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find card by ID within the caller's scope
    pub async fn find_scoped(&self, id: Uuid, scope: &Scope) -> Result<Option<IdCard>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ID_CARD_COLUMNS} FROM id_cards c WHERE c.id = "
        ));
        qb.push_bind(id).push(" AND ");
        push_scope(&mut qb, scope, &ID_CARD_SCOPE);

        let row: Option<IdCardRow> = qb
            .build_query_as::<IdCardRow>()
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch scoped ID card")?;

        row.map(IdCard::try_from).transpose()
    }

    /// List cards visible in `scope`, newest first
    pub async fn list(
        &self,
        scope: &Scope,
        filter: &IdCardFilter,
        page: PageRequest,
    ) -> Result<(Vec<IdCard>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM id_cards c WHERE ");
        push_filters(&mut count, scope, filter);
        let total: (i64,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await
            .context("Failed to count ID cards")?;

        let mut select = QueryBuilder::<Postgres>::new(format!(
            "SELECT {ID_CARD_COLUMNS} FROM id_cards c WHERE "
        ));
        push_filters(&mut select, scope, filter);
        select
            .push(" ORDER BY c.created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows: Vec<IdCardRow> = select
            .build_query_as::<IdCardRow>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to list ID cards")?;

        let cards = rows
            .into_iter()
            .map(IdCard::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok((cards, total.0))
    }

    /// Insert a draft card with the organization's next card number
    pub async fn create(&self, card: &NewIdCard) -> Result<IdCard> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let (code, serial) = OrganizationRepository::next_card_serial(&mut *tx, card.organization_id)
            .await?
            .ok_or_else(|| anyhow!("Organization {} does not exist", card.organization_id))?;
        let card_number = format_card_number(&code, card.issue_date, serial);

        let now = Utc::now();
        let sql = format!(
            r#"
            INSERT INTO id_cards AS c
                (id, organization_id, template_id, card_number, holder_name, photo_url, data,
                 issue_date, expiry_date, status, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $12)
            RETURNING {ID_CARD_COLUMNS}
            "#
        );

        let row: IdCardRow = sqlx::query_as(&sql)
            .bind(Uuid::new_v4())
            .bind(card.organization_id)
            .bind(card.template_id)
            .bind(&card_number)
            .bind(card.holder_name.trim())
            .bind(&card.photo_url)
            .bind(Json(&card.data))
            .bind(card.issue_date)
            .bind(card.expiry_date)
            .bind(CardStatus::Draft.as_str())
            .bind(card.created_by)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to create ID card")?;

        tx.commit().await.context("Failed to commit ID card")?;
        tracing::info!(card_number = %card_number, organization_id = %card.organization_id, "ID card created");

        IdCard::try_from(row)
    }

    pub async fn update(&self, id: Uuid, changes: &IdCardChanges) -> Result<Option<IdCard>> {
        let sql = format!(
            r#"
            UPDATE id_cards AS c SET
                holder_name = COALESCE($2, c.holder_name),
                photo_url = COALESCE($3, c.photo_url),
                data = COALESCE($4, c.data),
                issue_date = COALESCE($5, c.issue_date),
                expiry_date = COALESCE($6, c.expiry_date),
                updated_at = $7
            WHERE c.id = $1
            RETURNING {ID_CARD_COLUMNS}
            "#
        );

        let row: Option<IdCardRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(changes.holder_name.as_deref().map(str::trim))
            .bind(&changes.photo_url)
            .bind(changes.data.as_ref().map(Json))
            .bind(changes.issue_date)
            .bind(changes.expiry_date)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update ID card")?;

        row.map(IdCard::try_from).transpose()
    }

    /// Move a card from `from` to `to`; `None` when the card no longer has status `from`
    pub async fn update_status(&self, id: Uuid, from: CardStatus, to: CardStatus) -> Result<Option<IdCard>> {
        let sql = format!(
            r#"
            UPDATE id_cards AS c SET status = $3, updated_at = $4
            WHERE c.id = $1 AND c.status = $2
            RETURNING {ID_CARD_COLUMNS}
            "#
        );

        let row: Option<IdCardRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(from.as_str())
            .bind(to.as_str())
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update ID card status")?;

        row.map(IdCard::try_from).transpose()
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM id_cards WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete ID card")?;

        Ok(result.rows_affected() > 0)
    }

    /// Card counts per status within `scope`
    pub async fn stats(&self, scope: &Scope) -> Result<Vec<(CardStatus, i64)>> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT c.status, COUNT(*) FROM id_cards c WHERE ");
        push_scope(&mut qb, scope, &ID_CARD_SCOPE);
        qb.push(" GROUP BY c.status");

        let rows: Vec<(String, i64)> = qb
            .build_query_as::<(String, i64)>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to count ID cards by status")?;

        rows.into_iter()
            .map(|(status, count)| {
                let status = status
                    .parse::<CardStatus>()
                    .map_err(|e| anyhow!("Stored ID card has an invalid status: {e}"))?;
                Ok((status, count))
            })
            .collect()
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, scope: &Scope, filter: &IdCardFilter) {
    push_scope(qb, scope, &ID_CARD_SCOPE);

    if let Some(pattern) = filter.search.as_deref().and_then(search_pattern) {
        qb.push(" AND (c.holder_name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.card_number ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        qb.push(" AND c.status = ").push_bind(status.as_str());
    }
    if let Some(template_id) = filter.template_id {
        qb.push(" AND c.template_id = ").push_bind(template_id);
    }
    if let Some(organization_id) = filter.organization_id {
        qb.push(" AND c.organization_id = ").push_bind(organization_id);
    }
}

/// Internal row type for SQLx mapping
#[derive(Debug, FromRow)]
struct IdCardRow {
    id: Uuid,
    organization_id: Uuid,
    template_id: Uuid,
    card_number: String,
    holder_name: String,
    photo_url: Option<String>,
    data: Json<BTreeMap<String, String>>,
    issue_date: NaiveDate,
    expiry_date: Option<NaiveDate>,
    status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IdCardRow> for IdCard {
    type Error = anyhow::Error;

    fn try_from(row: IdCardRow) -> Result<Self> {
        let status = row
            .status
            .parse::<CardStatus>()
            .map_err(|e| anyhow!("Stored ID card has an invalid status: {e}"))?;

        Ok(Self {
            id: row.id,
            organization_id: row.organization_id,
            template_id: row.template_id,
            card_number: row.card_number,
            holder_name: row.holder_name,
            photo_url: row.photo_url,
            data: row.data.0,
            issue_date: row.issue_date,
            expiry_date: row.expiry_date,
            status,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
