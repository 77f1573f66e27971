//! PostgreSQL module store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)
//!
//! ## Edits
//!
//! `apply_edit` runs in a single `SERIALIZABLE` transaction. Serialization
//! failures (`40001`) and deadlocks (`40P01`) are reported as conflicts so
//! the editor can retry the whole transaction.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Row};
use std::time::Duration;

use crate::config::env_or;
use crate::types::{
    Authorship, AuthorshipId, Handle, License, LicenseId, Module, ModuleEdit, ModuleId,
    ModuleType, ModuleTypeId, ProfileUpdate, Suffix, Workspace, WorkspaceId,
};
use super::{EditCommit, ModuleStore, NewLicense, NewModuleType, StoreError};

/// Schema applied by [`PostgresModuleStore::migrate`].
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS module_types (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    wikidata TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS licenses (
    id SERIAL PRIMARY KEY,
    name TEXT NOT NULL,
    url TEXT NOT NULL,
    price INTEGER NOT NULL DEFAULT 0,
    price_id TEXT,
    UNIQUE (name, url)
);
CREATE TABLE IF NOT EXISTS workspaces (
    id SERIAL PRIMARY KEY,
    handle TEXT NOT NULL UNIQUE,
    first_name TEXT,
    last_name TEXT,
    avatar TEXT,
    bio TEXT,
    pronouns TEXT,
    url TEXT,
    orcid TEXT
);
CREATE TABLE IF NOT EXISTS modules (
    id SERIAL PRIMARY KEY,
    prefix TEXT NOT NULL,
    suffix TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    display_color TEXT,
    type_id INTEGER NOT NULL REFERENCES module_types (id),
    license_id INTEGER REFERENCES licenses (id),
    published BOOLEAN NOT NULL DEFAULT FALSE,
    published_at TIMESTAMPTZ,
    published_where TEXT,
    url TEXT
);
CREATE TABLE IF NOT EXISTS authorships (
    id SERIAL PRIMARY KEY,
    module_id INTEGER NOT NULL REFERENCES modules (id),
    workspace_id INTEGER NOT NULL REFERENCES workspaces (id),
    authorship_rank INTEGER NOT NULL DEFAULT 0,
    ready_to_publish BOOLEAN NOT NULL DEFAULT FALSE,
    accepted_invitation BOOLEAN NOT NULL DEFAULT FALSE,
    UNIQUE (module_id, workspace_id)
);
CREATE TABLE IF NOT EXISTS module_references (
    citing_id INTEGER NOT NULL REFERENCES modules (id),
    cited_id INTEGER NOT NULL REFERENCES modules (id),
    PRIMARY KEY (citing_id, cited_id)
);
CREATE TABLE IF NOT EXISTS module_derivations (
    parent_id INTEGER NOT NULL REFERENCES modules (id),
    child_id INTEGER NOT NULL REFERENCES modules (id),
    PRIMARY KEY (parent_id, child_id)
);
CREATE TABLE IF NOT EXISTS workspace_follows (
    follower_id INTEGER NOT NULL REFERENCES workspaces (id),
    followee_id INTEGER NOT NULL REFERENCES workspaces (id),
    PRIMARY KEY (follower_id, followee_id)
);
"#;

const MODULE_COLUMNS: &str = "m.id, m.prefix, m.suffix, m.title, m.description, m.display_color, \
     m.type_id, m.license_id, m.published, m.published_at, m.published_where, m.url";

const WORKSPACE_COLUMNS: &str = "w.id, w.handle, w.first_name, w.last_name, w.avatar, w.bio, \
     w.pronouns, w.url, w.orcid";

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/researchequals".to_string()),
            max_connections: env_or("DB_MAX_CONNECTIONS", 10),
            min_connections: env_or("DB_MIN_CONNECTIONS", 2),
            connect_timeout_secs: env_or("DB_CONNECT_TIMEOUT_SECS", 10),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
            max_lifetime_secs: env_or("DB_MAX_LIFETIME_SECS", 1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL store.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError for PostgresError {
    fn is_conflict(&self) -> bool {
        match self {
            Self::Database(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
            }
            _ => false,
        }
    }
}

/// PostgreSQL module store.
///
/// Uses connection pooling with production-tuned settings.
pub struct PostgresModuleStore {
    pool: PgPool,
}

impl PostgresModuleStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        self.pool.execute(SCHEMA_SQL).await?;
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    fn parse_module_row(row: &PgRow) -> Result<Module, sqlx::Error> {
        let license_id: Option<i32> = row.try_get("license_id")?;
        Ok(Module {
            id: ModuleId::new(row.try_get("id")?),
            prefix: row.try_get("prefix")?,
            suffix: Suffix::new(row.try_get::<String, _>("suffix")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            display_color: row.try_get("display_color")?,
            type_id: ModuleTypeId::new(row.try_get("type_id")?),
            license_id: license_id.map(LicenseId::new),
            published: row.try_get("published")?,
            published_at: row.try_get("published_at")?,
            published_where: row.try_get("published_where")?,
            url: row.try_get("url")?,
        })
    }

    fn parse_workspace_row(row: &PgRow) -> Result<Workspace, sqlx::Error> {
        Ok(Workspace {
            id: WorkspaceId::new(row.try_get("id")?),
            handle: Handle::new(row.try_get::<String, _>("handle")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            avatar: row.try_get("avatar")?,
            bio: row.try_get("bio")?,
            pronouns: row.try_get("pronouns")?,
            url: row.try_get("url")?,
            orcid: row.try_get("orcid")?,
        })
    }

    fn parse_authorship_row(row: &PgRow) -> Result<Authorship, sqlx::Error> {
        Ok(Authorship {
            id: AuthorshipId::new(row.try_get("id")?),
            module_id: ModuleId::new(row.try_get("module_id")?),
            workspace_id: WorkspaceId::new(row.try_get("workspace_id")?),
            authorship_rank: row.try_get("authorship_rank")?,
            ready_to_publish: row.try_get("ready_to_publish")?,
            accepted_invitation: row.try_get("accepted_invitation")?,
        })
    }

    async fn fetch_modules(&self, sql: &str, module: ModuleId) -> Result<Vec<Module>, PostgresError> {
        let rows = sqlx::query(sql)
            .bind(module.get())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(Self::parse_module_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }
}

#[async_trait]
impl ModuleStore for PostgresModuleStore {
    type Error = PostgresError;

    async fn module_by_id(&self, id: ModuleId) -> Result<Option<Module>, Self::Error> {
        let row = sqlx::query(&format!("SELECT {MODULE_COLUMNS} FROM modules m WHERE m.id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_module_row).transpose()?)
    }

    async fn module_by_suffix(&self, suffix: &Suffix) -> Result<Option<Module>, Self::Error> {
        let row = sqlx::query(&format!("SELECT {MODULE_COLUMNS} FROM modules m WHERE m.suffix = $1"))
            .bind(suffix.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_module_row).transpose()?)
    }

    async fn authorships(&self, module: ModuleId) -> Result<Vec<Authorship>, Self::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, module_id, workspace_id, authorship_rank,
                   ready_to_publish, accepted_invitation
            FROM authorships
            WHERE module_id = $1
            ORDER BY authorship_rank, id
            "#
        )
        .bind(module.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_authorship_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn workspaces(&self, ids: &[WorkspaceId]) -> Result<Vec<Workspace>, Self::Error> {
        let raw: Vec<i32> = ids.iter().map(WorkspaceId::get).collect();
        let rows = sqlx::query(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces w WHERE w.id = ANY($1) ORDER BY w.id"
        ))
        .bind(&raw)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_workspace_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn workspace_by_handle(&self, handle: &Handle) -> Result<Option<Workspace>, Self::Error> {
        let row = sqlx::query(&format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces w WHERE w.handle = $1"))
            .bind(handle.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(Self::parse_workspace_row).transpose()?)
    }

    async fn references(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error> {
        self.fetch_modules(
            &format!(
                "SELECT {MODULE_COLUMNS} FROM modules m \
                 JOIN module_references r ON r.cited_id = m.id \
                 WHERE r.citing_id = $1 ORDER BY m.title, m.id"
            ),
            module,
        ).await
    }

    async fn parents(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error> {
        self.fetch_modules(
            &format!(
                "SELECT {MODULE_COLUMNS} FROM modules m \
                 JOIN module_derivations d ON d.parent_id = m.id \
                 WHERE d.child_id = $1 ORDER BY m.id"
            ),
            module,
        ).await
    }

    async fn children(&self, module: ModuleId) -> Result<Vec<Module>, Self::Error> {
        self.fetch_modules(
            &format!(
                "SELECT {MODULE_COLUMNS} FROM modules m \
                 JOIN module_derivations d ON d.child_id = m.id \
                 WHERE d.parent_id = $1 ORDER BY m.id"
            ),
            module,
        ).await
    }

    async fn module_type(&self, id: ModuleTypeId) -> Result<Option<ModuleType>, Self::Error> {
        let row = sqlx::query("SELECT id, name, wikidata FROM module_types WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(ModuleType {
                id: ModuleTypeId::new(r.try_get("id")?),
                name: r.try_get("name")?,
                wikidata: r.try_get("wikidata")?,
            })),
            None => Ok(None),
        }
    }

    async fn license(&self, id: LicenseId) -> Result<Option<License>, Self::Error> {
        let row = sqlx::query("SELECT id, name, url, price, price_id FROM licenses WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(License {
                id: LicenseId::new(r.try_get("id")?),
                name: r.try_get("name")?,
                url: r.try_get("url")?,
                price: r.try_get("price")?,
                price_id: r.try_get("price_id")?,
            })),
            None => Ok(None),
        }
    }

    async fn apply_edit(&self, edit: &ModuleEdit) -> Result<EditCommit, Self::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;

        let module_row = sqlx::query("SELECT id FROM modules WHERE id = $1 FOR UPDATE")
            .bind(edit.module_id.get())
            .fetch_optional(&mut *tx)
            .await?;
        if module_row.is_none() {
            tx.rollback().await?;
            return Ok(EditCommit::ModuleMissing);
        }

        let type_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM module_types WHERE id = $1)")
            .bind(edit.type_id.get())
            .fetch_one(&mut *tx)
            .await?;
        if !type_exists {
            tx.rollback().await?;
            return Ok(EditCommit::TypeMissing(edit.type_id));
        }

        let license_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM licenses WHERE id = $1)")
            .bind(edit.license_id.get())
            .fetch_one(&mut *tx)
            .await?;
        if !license_exists {
            tx.rollback().await?;
            return Ok(EditCommit::LicenseMissing(edit.license_id));
        }

        sqlx::query(
            r#"
            UPDATE modules
            SET type_id = $2, title = $3, description = $4, display_color = $5, license_id = $6
            WHERE id = $1
            "#
        )
        .bind(edit.module_id.get())
        .bind(edit.type_id.get())
        .bind(&edit.title)
        .bind(&edit.description)
        .bind(&edit.display_color)
        .bind(edit.license_id.get())
        .execute(&mut *tx)
        .await?;

        // Every author re-approves after any edit.
        let reset = sqlx::query("UPDATE authorships SET ready_to_publish = FALSE WHERE module_id = $1")
            .bind(edit.module_id.get())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::debug!(
            module_id = %edit.module_id,
            authorships_reset = reset.rows_affected(),
            "Module edit committed"
        );

        Ok(EditCommit::Applied {
            module_id: edit.module_id,
            authorships_reset: reset.rows_affected(),
        })
    }

    async fn following(&self, workspace: WorkspaceId) -> Result<Vec<Workspace>, Self::Error> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKSPACE_COLUMNS} FROM workspaces w \
             JOIN workspace_follows f ON f.followee_id = w.id \
             WHERE f.follower_id = $1 ORDER BY w.handle"
        ))
        .bind(workspace.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(Self::parse_workspace_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(PostgresError::from)
    }

    async fn follow(&self, follower: WorkspaceId, followee: WorkspaceId) -> Result<bool, Self::Error> {
        let result = sqlx::query(
            "INSERT INTO workspace_follows (follower_id, followee_id) VALUES ($1, $2) ON CONFLICT DO NOTHING"
        )
        .bind(follower.get())
        .bind(followee.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, follower: WorkspaceId, followee: WorkspaceId) -> Result<bool, Self::Error> {
        let result = sqlx::query("DELETE FROM workspace_follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower.get())
            .bind(followee.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_profile(
        &self,
        workspace: WorkspaceId,
        update: &ProfileUpdate,
    ) -> Result<Option<Workspace>, Self::Error> {
        // NULL leaves a column untouched, '' clears it.
        let row = sqlx::query(&format!(
            "UPDATE workspaces w SET \
                 bio = CASE WHEN $2::text IS NULL THEN w.bio ELSE NULLIF($2, '') END, \
                 pronouns = CASE WHEN $3::text IS NULL THEN w.pronouns ELSE NULLIF($3, '') END, \
                 avatar = CASE WHEN $4::text IS NULL THEN w.avatar ELSE NULLIF($4, '') END \
             WHERE w.id = $1 RETURNING {WORKSPACE_COLUMNS}"
        ))
        .bind(workspace.get())
        .bind(&update.bio)
        .bind(&update.pronouns)
        .bind(&update.avatar)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(Self::parse_workspace_row).transpose()?)
    }

    async fn insert_module_types(&self, types: &[NewModuleType]) -> Result<u64, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for new in types {
            let result = sqlx::query(
                "INSERT INTO module_types (wikidata, name) VALUES ($1, $2) ON CONFLICT DO NOTHING"
            )
            .bind(new.wikidata)
            .bind(new.name)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert_licenses(&self, licenses: &[NewLicense]) -> Result<u64, Self::Error> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for new in licenses {
            let result = sqlx::query(
                "INSERT INTO licenses (url, name, price, price_id) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING"
            )
            .bind(new.url)
            .bind(new.name)
            .bind(new.price)
            .bind(new.price_id)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn ping(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}
