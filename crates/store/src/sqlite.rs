//! SQLite backend — durable state for authenticated principals.
//!
//! One database file with two tables:
//! - `profiles` — one row per principal holding the entitlement columns
//!   (credits, flags) and the persona columns, mirroring the original
//!   per-account profile record.
//! - `messages` — insert-only conversation turns, ordered by a monotonic
//!   `seq` rowid so same-instant appends still have a total order.
//!
//! Credit consumption is a single conditional UPDATE
//! (`credits = credits - 1 WHERE ... AND credits > 0 AND is_unlimited = 0`),
//! so concurrent decrements for one principal cannot lose updates and the
//! balance can never go below zero.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use warmline_core::{
    ConversationLog, ConversationTurn, CreditOutcome, EntitlementRecord, EntitlementStore,
    INITIAL_CREDITS, PersonaConfig, PersonaStore, PersonaUpdate, Principal, Role, StoreError,
};

/// A durable store backed by SQLite via sqlx.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `":memory:"` for an in-process ephemeral database (tests).
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        // An in-memory database exists per connection, so it must stay on one.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                principal      TEXT PRIMARY KEY,
                credits        INTEGER NOT NULL,
                is_unlimited   INTEGER NOT NULL DEFAULT 0,
                has_purchased  INTEGER NOT NULL DEFAULT 0,
                companion_name TEXT NOT NULL,
                user_alias     TEXT NOT NULL,
                personality    TEXT NOT NULL,
                backstory      TEXT NOT NULL,
                texting_style  TEXT NOT NULL,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("profiles table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq        INTEGER PRIMARY KEY AUTOINCREMENT,
                id         TEXT UNIQUE NOT NULL,
                principal  TEXT NOT NULL,
                role       TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_principal_seq ON messages(principal, seq)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    /// Insert the default profile row if the principal has none yet.
    async fn ensure_profile(&self, principal: &Principal) -> Result<(), StoreError> {
        let defaults = PersonaConfig::default();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO profiles
                (principal, credits, is_unlimited, has_purchased,
                 companion_name, user_alias, personality, backstory, texting_style,
                 created_at, updated_at)
            VALUES (?1, ?2, 0, 0, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(principal) DO NOTHING
            "#,
        )
        .bind(principal.key())
        .bind(i64::from(INITIAL_CREDITS))
        .bind(&defaults.companion_name)
        .bind(&defaults.user_alias)
        .bind(&defaults.personality)
        .bind(&defaults.backstory)
        .bind(&defaults.texting_style)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("ensure profile: {e}")))?;
        Ok(())
    }

    async fn fetch_entitlement(
        &self,
        principal: &Principal,
    ) -> Result<EntitlementRecord, StoreError> {
        let row = sqlx::query(
            "SELECT credits, is_unlimited, has_purchased, updated_at
             FROM profiles WHERE principal = ?1",
        )
        .bind(principal.key())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("fetch entitlement: {e}")))?;

        let credits: i64 = row
            .try_get("credits")
            .map_err(|e| StoreError::QueryFailed(format!("credits column: {e}")))?;
        let is_unlimited: i64 = row
            .try_get("is_unlimited")
            .map_err(|e| StoreError::QueryFailed(format!("is_unlimited column: {e}")))?;
        let has_purchased: i64 = row
            .try_get("has_purchased")
            .map_err(|e| StoreError::QueryFailed(format!("has_purchased column: {e}")))?;
        let updated_at_str: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::QueryFailed(format!("updated_at column: {e}")))?;

        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(EntitlementRecord {
            credits: credits.max(0) as u32,
            is_unlimited: is_unlimited != 0,
            has_purchased: has_purchased != 0,
            updated_at,
        })
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, StoreError> {
        let id_str: String = row
            .try_get("id")
            .map_err(|e| StoreError::QueryFailed(format!("id column: {e}")))?;
        let role_str: String = row
            .try_get("role")
            .map_err(|e| StoreError::QueryFailed(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::QueryFailed(format!("content column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::QueryFailed(format!("created_at column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(ConversationTurn {
            id: Uuid::parse_str(&id_str).unwrap_or_else(|_| Uuid::new_v4()),
            role: Role::parse(&role_str),
            content,
            created_at,
        })
    }
}

#[async_trait]
impl EntitlementStore for SqliteStore {
    async fn entitlement(
        &self,
        principal: &Principal,
    ) -> Result<EntitlementRecord, StoreError> {
        self.ensure_profile(principal).await?;
        self.fetch_entitlement(principal).await
    }

    async fn consume_one(&self, principal: &Principal) -> Result<CreditOutcome, StoreError> {
        self.ensure_profile(principal).await?;

        // Atomic decrement-if-positive: the WHERE clause makes concurrent
        // consumes for one principal monotonically consistent.
        let result = sqlx::query(
            "UPDATE profiles
             SET credits = credits - 1, updated_at = ?2
             WHERE principal = ?1 AND is_unlimited = 0 AND credits > 0",
        )
        .bind(principal.key())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("consume credit: {e}")))?;

        if result.rows_affected() == 1 {
            let record = self.fetch_entitlement(principal).await?;
            return Ok(CreditOutcome::Remaining(record.credits));
        }

        let record = self.fetch_entitlement(principal).await?;
        if record.is_unlimited {
            Ok(CreditOutcome::Unlimited)
        } else {
            Ok(CreditOutcome::Exhausted)
        }
    }

    async fn grant_credits(
        &self,
        principal: &Principal,
        amount: u32,
    ) -> Result<CreditOutcome, StoreError> {
        self.ensure_profile(principal).await?;

        let result = sqlx::query(
            "UPDATE profiles
             SET credits = credits + ?3, has_purchased = 1, updated_at = ?2
             WHERE principal = ?1 AND is_unlimited = 0",
        )
        .bind(principal.key())
        .bind(Utc::now().to_rfc3339())
        .bind(i64::from(amount))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("grant credits: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(CreditOutcome::Unlimited);
        }
        let record = self.fetch_entitlement(principal).await?;
        Ok(CreditOutcome::Remaining(record.credits))
    }

    async fn grant_unlimited(&self, principal: &Principal) -> Result<(), StoreError> {
        self.ensure_profile(principal).await?;
        sqlx::query(
            "UPDATE profiles
             SET is_unlimited = 1, has_purchased = 1, updated_at = ?2
             WHERE principal = ?1",
        )
        .bind(principal.key())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("grant unlimited: {e}")))?;
        Ok(())
    }

    async fn reset(&self, principal: &Principal) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE profiles
             SET credits = ?2, is_unlimited = 0, has_purchased = 0, updated_at = ?3
             WHERE principal = ?1",
        )
        .bind(principal.key())
        .bind(i64::from(INITIAL_CREDITS))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("reset entitlement: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationLog for SqliteStore {
    async fn append(
        &self,
        principal: &Principal,
        role: Role,
        content: &str,
    ) -> Result<ConversationTurn, StoreError> {
        let turn = ConversationTurn::new(role, content);
        sqlx::query(
            "INSERT INTO messages (id, principal, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(turn.id.to_string())
        .bind(principal.key())
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("append turn: {e}")))?;
        Ok(turn)
    }

    async fn recent_turns(
        &self,
        principal: &Principal,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        // Most recent `limit` rows, then reversed back to oldest-first.
        let rows = sqlx::query(
            "SELECT id, role, content, created_at FROM messages
             WHERE principal = ?1 ORDER BY seq DESC LIMIT ?2",
        )
        .bind(principal.key())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("recent turns: {e}")))?;

        let mut turns: Vec<ConversationTurn> = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<_, _>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn clear(&self, principal: &Principal) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM messages WHERE principal = ?1")
            .bind(principal.key())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("clear log: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl PersonaStore for SqliteStore {
    async fn persona(&self, principal: &Principal) -> Result<PersonaConfig, StoreError> {
        self.ensure_profile(principal).await?;
        let row = sqlx::query(
            "SELECT companion_name, user_alias, personality, backstory, texting_style
             FROM profiles WHERE principal = ?1",
        )
        .bind(principal.key())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("fetch persona: {e}")))?;

        Ok(PersonaConfig {
            companion_name: row
                .try_get("companion_name")
                .map_err(|e| StoreError::QueryFailed(format!("companion_name column: {e}")))?,
            user_alias: row
                .try_get("user_alias")
                .map_err(|e| StoreError::QueryFailed(format!("user_alias column: {e}")))?,
            personality: row
                .try_get("personality")
                .map_err(|e| StoreError::QueryFailed(format!("personality column: {e}")))?,
            backstory: row
                .try_get("backstory")
                .map_err(|e| StoreError::QueryFailed(format!("backstory column: {e}")))?,
            texting_style: row
                .try_get("texting_style")
                .map_err(|e| StoreError::QueryFailed(format!("texting_style column: {e}")))?,
        })
    }

    async fn save(
        &self,
        principal: &Principal,
        update: PersonaUpdate,
    ) -> Result<PersonaConfig, StoreError> {
        let merged = self.persona(principal).await?.merged(&update);
        sqlx::query(
            "UPDATE profiles
             SET companion_name = ?2, user_alias = ?3, personality = ?4,
                 backstory = ?5, texting_style = ?6, updated_at = ?7
             WHERE principal = ?1",
        )
        .bind(principal.key())
        .bind(&merged.companion_name)
        .bind(&merged.user_alias)
        .bind(&merged.personality)
        .bind(&merged.backstory)
        .bind(&merged.texting_style)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("save persona: {e}")))?;
        Ok(merged)
    }

    async fn reset(&self, principal: &Principal) -> Result<(), StoreError> {
        let defaults = PersonaConfig::default();
        sqlx::query(
            "UPDATE profiles
             SET companion_name = ?2, user_alias = ?3, personality = ?4,
                 backstory = ?5, texting_style = ?6, updated_at = ?7
             WHERE principal = ?1",
        )
        .bind(principal.key())
        .bind(&defaults.companion_name)
        .bind(&defaults.user_alias)
        .bind(&defaults.personality)
        .bind(&defaults.backstory)
        .bind(&defaults.texting_style)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("reset persona: {e}")))?;
        Ok(())
    }
}
