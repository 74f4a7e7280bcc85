use anyhow::Result;
use sqlx::PgPool;

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    // Create users table. organization_id is not a foreign key because
    // organizations reference their creator in users.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR(255) NOT NULL,
            email VARCHAR(255),
            mobile VARCHAR(16) NOT NULL,
            password_hash VARCHAR NOT NULL,
            role VARCHAR(16) NOT NULL CHECK (role IN ('owner', 'agent', 'admin', 'staff')),
            organization_id UUID,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_by UUID,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT users_mobile_key UNIQUE (mobile)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create agents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            user_id UUID PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            business_name VARCHAR(255) NOT NULL,
            address TEXT,
            city VARCHAR(100),
            state VARCHAR(100),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create organizations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organizations (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name VARCHAR(255) NOT NULL,
            code VARCHAR(10) NOT NULL,
            email VARCHAR(255),
            mobile VARCHAR(16),
            address TEXT,
            logo_url TEXT,
            agent_id UUID REFERENCES users(id) ON DELETE SET NULL,
            card_counter BIGINT NOT NULL DEFAULT 0,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_by UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT organizations_code_key UNIQUE (code)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create templates table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS templates (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            name VARCHAR(255) NOT NULL,
            description TEXT,
            orientation VARCHAR(16) NOT NULL DEFAULT 'portrait',
            front_background_url TEXT,
            back_background_url TEXT,
            fields JSONB NOT NULL DEFAULT '[]',
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_by UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create id_cards table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS id_cards (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            organization_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
            template_id UUID NOT NULL REFERENCES templates(id),
            card_number VARCHAR(32) NOT NULL,
            holder_name VARCHAR(255) NOT NULL,
            photo_url TEXT,
            data JSONB NOT NULL DEFAULT '{}',
            issue_date DATE NOT NULL,
            expiry_date DATE,
            status VARCHAR(16) NOT NULL DEFAULT 'draft',
            created_by UUID NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT id_cards_card_number_key UNIQUE (card_number),
            CONSTRAINT id_cards_expiry_after_issue CHECK (expiry_date IS NULL OR expiry_date > issue_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Template names are unique per organization, ignoring case
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS templates_organization_name_key ON templates(organization_id, LOWER(name))",
    )
    .execute(pool)
    .await?;

    // Create indexes for scoped lookups
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_organization_id ON users(organization_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_organizations_agent_id ON organizations(agent_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_id_cards_organization_id ON id_cards(organization_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_id_cards_created_by ON id_cards(created_by)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_id_cards_template_id ON id_cards(template_id)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations completed successfully");
    Ok(())
}
