//! Host registry table and per-tenant forum tables. DDL is idempotent (`IF NOT EXISTS`).

use crate::error::{AppError, TenantError};
use crate::tenant::{Tenant, TenantDirectory};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};

/// Schema-qualified name of a host table (e.g. "host.tenants"). `schema` must be a validated identifier.
pub fn qualified_host_table(schema: &str, table: &str) -> String {
    format!("{}.{}", schema, table)
}

/// Create the host schema and the tenant registry table.
/// Tenant names carry a unique index; lookups stay deterministic if it is ever dropped.
pub async fn ensure_host_tables(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema))
        .execute(pool)
        .await?;

    let q_tenants = qualified_host_table(schema, "tenants");
    let ddl = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            db_server TEXT NOT NULL,
            db_name TEXT NOT NULL,
            db_user TEXT NOT NULL,
            db_password TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
        q_tenants
    );
    sqlx::query(&ddl).execute(pool).await?;
    sqlx::query(&format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS tenants_name_key ON {} (name)",
        q_tenants
    ))
    .execute(pool)
    .await?;
    Ok(())
}

/// Tenant registry backed by the host database. Every call is one query.
#[derive(Clone)]
pub struct PgTenantDirectory {
    pool: PgPool,
    table: String,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool, schema: &str) -> Self {
        PgTenantDirectory {
            pool,
            table: qualified_host_table(schema, "tenants"),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Provision a tenant record. Fails with a unique violation when the name is taken.
    pub async fn insert(&self, tenant: &Tenant) -> Result<(), AppError> {
        sqlx::query(&format!(
            "INSERT INTO {} (id, name, db_server, db_name, db_user, db_password) VALUES ($1, $2, $3, $4, $5, $6)",
            self.table
        ))
        .bind(tenant.id)
        .bind(&tenant.name)
        .bind(&tenant.db_server)
        .bind(&tenant.db_name)
        .bind(&tenant.db_user)
        .bind(&tenant.db_password)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError> {
        let sql = format!(
            "SELECT id, name, db_server, db_name, db_user, db_password FROM {} WHERE name = $1 ORDER BY created_at, id LIMIT 1",
            self.table
        );
        tracing::debug!(sql = %sql, tenant = %name, "tenant lookup");
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tenant)
    }
}

const FORUM_DDL: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        username TEXT NOT NULL UNIQUE,
        is_banned BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS tags (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS posts (
        id UUID PRIMARY KEY,
        author_id UUID NOT NULL,
        title VARCHAR(50) NOT NULL,
        description VARCHAR(500) NOT NULL,
        location VARCHAR(50),
        visibility TEXT NOT NULL DEFAULT 'published',
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_tags (
        post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        tag_id UUID NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
        PRIMARY KEY (post_id, tag_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_votes (
        id UUID PRIMARY KEY,
        post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        voter_id UUID NOT NULL,
        vote_type TEXT NOT NULL,
        voted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (post_id, voter_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comments (
        id UUID PRIMARY KEY,
        post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        author_id UUID NOT NULL,
        content VARCHAR(500) NOT NULL,
        visibility TEXT NOT NULL DEFAULT 'published',
        is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS comment_votes (
        id UUID PRIMARY KEY,
        comment_id UUID NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
        voter_id UUID NOT NULL,
        vote_type TEXT NOT NULL,
        voted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (comment_id, voter_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS media (
        id UUID PRIMARY KEY,
        post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        object_key TEXT NOT NULL,
        url TEXT NOT NULL,
        content_type TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS post_bookmarks (
        post_id UUID NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        user_id UUID NOT NULL,
        bookmarked_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (post_id, user_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_reports (
        id UUID PRIMARY KEY,
        target_user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        reporter_id UUID NOT NULL,
        reason VARCHAR(500) NOT NULL,
        reported_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        UNIQUE (target_user_id, reporter_id)
    )
    "#,
    // databases bootstrapped before hiding existed
    "ALTER TABLE posts ADD COLUMN IF NOT EXISTS visibility TEXT NOT NULL DEFAULT 'published'",
    "ALTER TABLE comments ADD COLUMN IF NOT EXISTS visibility TEXT NOT NULL DEFAULT 'published'",
    "CREATE INDEX IF NOT EXISTS post_bookmarks_user_idx ON post_bookmarks (user_id, bookmarked_at, post_id)",
    "CREATE INDEX IF NOT EXISTS posts_created_at_idx ON posts (created_at, id)",
    "CREATE INDEX IF NOT EXISTS comments_post_id_idx ON comments (post_id, created_at, id)",
    "CREATE INDEX IF NOT EXISTS media_post_id_idx ON media (post_id)",
];

/// Create the forum tables in a tenant database.
pub async fn ensure_forum_tables(conn: &mut PgConnection) -> Result<(), AppError> {
    for ddl in FORUM_DDL {
        sqlx::query(ddl).execute(&mut *conn).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_host_tables() {
        assert_eq!(qualified_host_table("host", "tenants"), "host.tenants");
    }

    #[test]
    fn forum_ddl_is_idempotent() {
        for ddl in FORUM_DDL {
            assert!(ddl.contains("IF NOT EXISTS"), "{ddl}");
        }
    }
}
