//! SQLite Persistent Storage
//!
//! Durable storage for job and subscription records that survives service
//! restarts. Uses connection pooling via r2d2 for concurrent access.
//!
//! The waiting → active claim runs inside an IMMEDIATE transaction so that
//! exactly one worker can claim a given job.

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use std::path::Path;

use super::traits::{JobStore, StorageError, StorageResult, SubscriptionStore};
use crate::types::job::{Job, JobKind, JobState, QueueCounts};
use crate::types::webhook::{DeadLetter, WebhookSubscription};

/// SQLite-backed store with connection pooling
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                state TEXT NOT NULL DEFAULT 'waiting',
                attempts_made INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL,
                backoff_base_ms INTEGER NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                run_at INTEGER NOT NULL,
                signature TEXT,
                explorer_url TEXT,
                failure_reason TEXT,
                caused_by TEXT,
                fallback_job_id TEXT,
                created_at INTEGER NOT NULL,
                started_at INTEGER,
                finished_at INTEGER,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state);
            CREATE INDEX IF NOT EXISTS idx_jobs_claim ON jobs(kind, state, run_at, created_at);

            CREATE TABLE IF NOT EXISTS subscriptions (
                subscriber_id TEXT PRIMARY KEY,
                callback_url TEXT NOT NULL,
                shared_secret TEXT NOT NULL,
                tracked_signatures TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                last_used INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS webhook_dead_letters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                subscriber_id TEXT NOT NULL,
                signature TEXT NOT NULL,
                payload TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    /// Convert a database row to a Job
    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<Job> {
        let kind_str: String = row.get("kind")?;
        let kind = kind_str.parse().unwrap_or(JobKind::Credit);

        let state_str: String = row.get("state")?;
        let state = state_str.parse().unwrap_or(JobState::Waiting);

        let payload_json: String = row.get("payload")?;
        let payload = serde_json::from_str(&payload_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        Ok(Job {
            id: row.get("id")?,
            kind,
            payload,
            state,
            attempts_made: row.get::<_, i64>("attempts_made")? as u32,
            max_attempts: row.get::<_, i64>("max_attempts")? as u32,
            backoff_base_ms: row.get::<_, i64>("backoff_base_ms")? as u64,
            progress: row.get::<_, i64>("progress")? as u8,
            run_at: row.get("run_at")?,
            signature: row.get("signature")?,
            explorer_url: row.get("explorer_url")?,
            failure_reason: row.get("failure_reason")?,
            caused_by: row.get("caused_by")?,
            fallback_job_id: row.get("fallback_job_id")?,
            created_at: row.get("created_at")?,
            started_at: row.get("started_at")?,
            finished_at: row.get("finished_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_subscription(row: &rusqlite::Row) -> rusqlite::Result<WebhookSubscription> {
        let tracked_json: String = row.get("tracked_signatures")?;
        let tracked_signatures = serde_json::from_str(&tracked_json).unwrap_or_default();

        Ok(WebhookSubscription {
            subscriber_id: row.get("subscriber_id")?,
            callback_url: row.get("callback_url")?,
            shared_secret: row.get("shared_secret")?,
            tracked_signatures,
            created_at: row.get("created_at")?,
            last_used: row.get("last_used")?,
        })
    }

    // Synchronous helpers for the trait implementations

    fn insert_job_sync(&self, job: &Job) -> StorageResult<()> {
        let conn = self.conn()?;

        let payload_json = serde_json::to_string(&job.payload)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO jobs (
                id, kind, payload, state, attempts_made, max_attempts,
                backoff_base_ms, progress, run_at, signature, explorer_url,
                failure_reason, caused_by, fallback_job_id,
                created_at, started_at, finished_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17, ?18
            )
            "#,
            params![
                job.id,
                job.kind.to_string(),
                payload_json,
                job.state.to_string(),
                job.attempts_made as i64,
                job.max_attempts as i64,
                job.backoff_base_ms as i64,
                job.progress as i64,
                job.run_at,
                job.signature,
                job.explorer_url,
                job.failure_reason,
                job.caused_by,
                job.fallback_job_id,
                job.created_at,
                job.started_at,
                job.finished_at,
                job.updated_at,
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 1555 || err.extended_code == 2067 {
                    return StorageError::Duplicate(job.id.clone());
                }
            }
            StorageError::Database(e.to_string())
        })?;

        Ok(())
    }

    fn update_job_sync(&self, job: &Job) -> StorageResult<()> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        // Terminal states are immutable once set
        let stored_state: Option<String> = tx
            .query_row(
                "SELECT state FROM jobs WHERE id = ?1",
                params![job.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        match stored_state {
            None => return Err(StorageError::NotFound(job.id.clone())),
            Some(s) => {
                let state: JobState = s
                    .parse()
                    .map_err(|e: String| StorageError::InvalidData(e))?;
                if state.is_terminal() {
                    return Err(StorageError::Terminal(job.id.clone()));
                }
            }
        }

        tx.execute(
            r#"
            UPDATE jobs SET
                state = ?2,
                attempts_made = ?3,
                progress = ?4,
                run_at = ?5,
                signature = ?6,
                explorer_url = ?7,
                failure_reason = ?8,
                fallback_job_id = ?9,
                started_at = ?10,
                finished_at = ?11,
                updated_at = ?12
            WHERE id = ?1
            "#,
            params![
                job.id,
                job.state.to_string(),
                job.attempts_made as i64,
                job.progress as i64,
                job.run_at,
                job.signature,
                job.explorer_url,
                job.failure_reason,
                job.fallback_job_id,
                job.started_at,
                job.finished_at,
                job.updated_at,
            ],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.commit().map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(())
    }

    fn get_job_sync(&self, id: &str) -> StorageResult<Option<Job>> {
        let conn = self.conn()?;

        conn.query_row("SELECT * FROM jobs WHERE id = ?1", params![id], |row| {
            Self::row_to_job(row)
        })
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn claim_next_sync(&self, kind: JobKind, now_ms: i64) -> StorageResult<Option<Job>> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let id: Option<String> = tx
            .query_row(
                r#"
                SELECT id FROM jobs
                WHERE kind = ?1 AND state = 'waiting' AND run_at <= ?2
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                "#,
                params![kind.to_string(), now_ms],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let id = match id {
            Some(id) => id,
            None => return Ok(None),
        };

        let claimed = tx
            .execute(
                r#"
                UPDATE jobs SET
                    state = 'active',
                    attempts_made = attempts_made + 1,
                    progress = 0,
                    started_at = ?2,
                    updated_at = ?2
                WHERE id = ?1 AND state = 'waiting'
                "#,
                params![id, now_ms],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if claimed == 0 {
            // Lost the race to another worker
            return Ok(None);
        }

        let job = tx
            .query_row("SELECT * FROM jobs WHERE id = ?1", params![id], |row| {
                Self::row_to_job(row)
            })
            .map_err(|e| StorageError::Database(e.to_string()))?;

        tx.commit().map_err(|e| StorageError::Database(e.to_string()))?;
        Ok(Some(job))
    }

    fn list_by_states_sync(&self, states: &[JobState]) -> StorageResult<Vec<Job>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;

        let placeholders = states
            .iter()
            .enumerate()
            .map(|(i, _)| format!("?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT * FROM jobs WHERE state IN ({}) ORDER BY created_at DESC",
            placeholders
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let state_params: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        let jobs = stmt
            .query_map(
                rusqlite::params_from_iter(state_params.iter()),
                |row| Self::row_to_job(row),
            )
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(jobs)
    }

    fn counts_sync(&self, kind: JobKind) -> StorageResult<QueueCounts> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT state, COUNT(*) FROM jobs WHERE kind = ?1 GROUP BY state")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![kind.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let (state, count) = row.map_err(|e| StorageError::Database(e.to_string()))?;
            let count = count as u64;
            match state.parse::<JobState>() {
                Ok(JobState::Waiting) => counts.waiting += count,
                Ok(JobState::Active) => counts.active += count,
                Ok(JobState::Completed) => counts.completed += count,
                Ok(JobState::Failed) | Ok(JobState::FallbackQueued) => counts.failed += count,
                Err(_) => {}
            }
        }

        Ok(counts)
    }

    fn requeue_orphaned_sync(&self, now_ms: i64) -> StorageResult<u64> {
        let conn = self.conn()?;

        // The interrupted attempt is handed back: the next claim re-increments,
        // so the re-run must not consume extra budget
        let rows = conn
            .execute(
                r#"
                UPDATE jobs SET
                    state = 'waiting',
                    attempts_made = MAX(attempts_made - 1, 0),
                    run_at = ?1,
                    updated_at = ?1
                WHERE state = 'active'
                "#,
                params![now_ms],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(rows as u64)
    }

    fn upsert_subscription_sync(&self, sub: &WebhookSubscription) -> StorageResult<()> {
        let conn = self.conn()?;

        let tracked_json = serde_json::to_string(&sub.tracked_signatures)
            .map_err(|e| StorageError::InvalidData(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO subscriptions (
                subscriber_id, callback_url, shared_secret,
                tracked_signatures, created_at, last_used
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(subscriber_id) DO UPDATE SET
                callback_url = excluded.callback_url,
                shared_secret = excluded.shared_secret,
                tracked_signatures = excluded.tracked_signatures,
                last_used = excluded.last_used
            "#,
            params![
                sub.subscriber_id,
                sub.callback_url,
                sub.shared_secret,
                tracked_json,
                sub.created_at,
                sub.last_used,
            ],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn delete_subscription_sync(&self, subscriber_id: &str) -> StorageResult<bool> {
        let conn = self.conn()?;

        let rows = conn
            .execute(
                "DELETE FROM subscriptions WHERE subscriber_id = ?1",
                params![subscriber_id],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(rows > 0)
    }

    fn get_subscription_sync(&self, subscriber_id: &str) -> StorageResult<Option<WebhookSubscription>> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT * FROM subscriptions WHERE subscriber_id = ?1",
            params![subscriber_id],
            |row| Self::row_to_subscription(row),
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn get_all_subscriptions_sync(&self) -> StorageResult<Vec<WebhookSubscription>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare("SELECT * FROM subscriptions ORDER BY created_at ASC")
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let subs = stmt
            .query_map([], |row| Self::row_to_subscription(row))
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(subs)
    }

    fn push_dead_letter_sync(&self, letter: &DeadLetter) -> StorageResult<()> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO webhook_dead_letters (
                subscriber_id, signature, payload, attempts, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                letter.subscriber_id,
                letter.signature,
                letter.payload,
                letter.attempts as i64,
                letter.created_at,
            ],
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn dead_letters_sync(&self) -> StorageResult<Vec<DeadLetter>> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT subscriber_id, signature, payload, attempts, created_at
                 FROM webhook_dead_letters ORDER BY created_at ASC",
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let letters = stmt
            .query_map([], |row| {
                Ok(DeadLetter {
                    subscriber_id: row.get(0)?,
                    signature: row.get(1)?,
                    payload: row.get(2)?,
                    attempts: row.get::<_, i64>(3)? as u32,
                    created_at: row.get(4)?,
                })
            })
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(letters)
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn insert(&self, job: &Job) -> StorageResult<()> {
        self.insert_job_sync(job)
    }

    async fn update(&self, job: &Job) -> StorageResult<()> {
        self.update_job_sync(job)
    }

    async fn get(&self, id: &str) -> StorageResult<Option<Job>> {
        self.get_job_sync(id)
    }

    async fn claim_next(&self, kind: JobKind, now_ms: i64) -> StorageResult<Option<Job>> {
        self.claim_next_sync(kind, now_ms)
    }

    async fn list_by_states(&self, states: &[JobState]) -> StorageResult<Vec<Job>> {
        self.list_by_states_sync(states)
    }

    async fn counts(&self, kind: JobKind) -> StorageResult<QueueCounts> {
        self.counts_sync(kind)
    }

    async fn requeue_orphaned(&self, now_ms: i64) -> StorageResult<u64> {
        self.requeue_orphaned_sync(now_ms)
    }
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn upsert(&self, sub: &WebhookSubscription) -> StorageResult<()> {
        self.upsert_subscription_sync(sub)
    }

    async fn delete(&self, subscriber_id: &str) -> StorageResult<bool> {
        self.delete_subscription_sync(subscriber_id)
    }

    async fn get(&self, subscriber_id: &str) -> StorageResult<Option<WebhookSubscription>> {
        self.get_subscription_sync(subscriber_id)
    }

    async fn get_all(&self) -> StorageResult<Vec<WebhookSubscription>> {
        self.get_all_subscriptions_sync()
    }

    async fn push_dead_letter(&self, letter: &DeadLetter) -> StorageResult<()> {
        self.push_dead_letter_sync(letter)
    }

    async fn dead_letters(&self) -> StorageResult<Vec<DeadLetter>> {
        self.dead_letters_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::job::{now_ms, JobPayload};

    fn test_job(lamports: u64) -> Job {
        Job::new(
            JobPayload::Credit {
                recipient: "recipient_pubkey".to_string(),
                lamports,
            },
            3,
            2000,
            0,
        )
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteStore::in_memory().unwrap();
        let job = test_job(1_000_000_000);

        store.insert(&job).await.unwrap();

        let retrieved = JobStore::get(&store, &job.id).await.unwrap().unwrap();
        assert_eq!(retrieved.id, job.id);
        assert_eq!(retrieved.state, JobState::Waiting);
        assert_eq!(retrieved.payload.lamports(), 1_000_000_000);
    }

    #[tokio::test]
    async fn test_duplicate_id() {
        let store = SqliteStore::in_memory().unwrap();
        let job = test_job(100);

        store.insert(&job).await.unwrap();
        let result = JobStore::insert(&store, &job).await;
        assert!(matches!(result, Err(StorageError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let store = SqliteStore::in_memory().unwrap();
        let job = test_job(100);
        store.insert(&job).await.unwrap();

        let first = store.claim_next(JobKind::Credit, now_ms()).await.unwrap();
        let second = store.claim_next(JobKind::Credit, now_ms()).await.unwrap();

        let claimed = first.unwrap();
        assert_eq!(claimed.id, job.id);
        assert_eq!(claimed.state, JobState::Active);
        assert_eq!(claimed.attempts_made, 1);
        assert!(claimed.started_at.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_claim_respects_run_at() {
        let store = SqliteStore::in_memory().unwrap();
        let mut job = test_job(100);
        job.run_at = now_ms() + 60_000;
        store.insert(&job).await.unwrap();

        let claimed = store.claim_next(JobKind::Credit, now_ms()).await.unwrap();
        assert!(claimed.is_none());

        let claimed = store
            .claim_next(JobKind::Credit, job.run_at + 1)
            .await
            .unwrap();
        assert!(claimed.is_some());
    }

    #[tokio::test]
    async fn test_claim_respects_kind() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&test_job(100)).await.unwrap();

        let claimed = store.claim_next(JobKind::Transfer, now_ms()).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_terminal_states_are_immutable() {
        let store = SqliteStore::in_memory().unwrap();
        let job = test_job(100);
        store.insert(&job).await.unwrap();

        let mut claimed = store
            .claim_next(JobKind::Credit, now_ms())
            .await
            .unwrap()
            .unwrap();
        claimed.mark_completed("sig".to_string(), "url".to_string());
        store.update(&claimed).await.unwrap();

        claimed.mark_failed("should not happen");
        let result = JobStore::update(&store, &claimed).await;
        assert!(matches!(result, Err(StorageError::Terminal(_))));

        let stored = JobStore::get(&store, &job.id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Completed);
    }

    #[tokio::test]
    async fn test_requeue_orphaned() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&test_job(100)).await.unwrap();
        store.insert(&test_job(200)).await.unwrap();

        store.claim_next(JobKind::Credit, now_ms()).await.unwrap();
        store.claim_next(JobKind::Credit, now_ms()).await.unwrap();

        let requeued = store.requeue_orphaned(now_ms()).await.unwrap();
        assert_eq!(requeued, 2);

        let counts = store.counts(JobKind::Credit).await.unwrap();
        assert_eq!(counts.waiting, 2);
        assert_eq!(counts.active, 0);
    }

    #[tokio::test]
    async fn test_requeue_preserves_attempt_budget() {
        let store = SqliteStore::in_memory().unwrap();
        let mut job = test_job(100);
        job.max_attempts = 1;
        store.insert(&job).await.unwrap();

        // Crash during the final attempt: claim, then recover
        store.claim_next(JobKind::Credit, now_ms()).await.unwrap();
        store.requeue_orphaned(now_ms()).await.unwrap();

        let reclaimed = store
            .claim_next(JobKind::Credit, now_ms())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reclaimed.attempts_made, 1);
        assert!(reclaimed.attempts_made <= reclaimed.max_attempts);
    }

    #[tokio::test]
    async fn test_counts() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert(&test_job(100)).await.unwrap();
        store.insert(&test_job(200)).await.unwrap();

        let mut claimed = store
            .claim_next(JobKind::Credit, now_ms())
            .await
            .unwrap()
            .unwrap();
        claimed.mark_fallback_queued("child".to_string(), "exhausted");
        store.update(&claimed).await.unwrap();

        let counts = store.counts(JobKind::Credit).await.unwrap();
        assert_eq!(counts.waiting, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_subscription_round_trip() {
        let store = SqliteStore::in_memory().unwrap();

        let mut sub = WebhookSubscription::new(
            "user1".to_string(),
            "https://example.com/hook".to_string(),
            "secret".to_string(),
        );
        sub.track("sig1");

        store.upsert(&sub).await.unwrap();

        let retrieved = SubscriptionStore::get(&store, "user1").await.unwrap().unwrap();
        assert_eq!(retrieved.callback_url, "https://example.com/hook");
        assert!(retrieved.is_tracking("sig1"));

        assert!(store.delete("user1").await.unwrap());
        assert!(!store.delete("user1").await.unwrap());
    }

    #[tokio::test]
    async fn test_dead_letters() {
        let store = SqliteStore::in_memory().unwrap();

        let letter = DeadLetter::new("user1", "sig1", "{}".to_string(), 3);
        store.push_dead_letter(&letter).await.unwrap();

        let letters = store.dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].subscriber_id, "user1");
        assert_eq!(letters[0].attempts, 3);
    }
}
