//! Job Types
//!
//! Types for tracking money-movement jobs through their lifecycle:
//! waiting → active → completed / failed / fallback_queued
//!
//! A job is created by the submission boundary, claimed by exactly one
//! worker per attempt, and ends in a terminal state that never changes.

use serde::{Deserialize, Serialize};

/// Current unix timestamp in milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Queue a job belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Faucet credit to a target account
    Credit,
    /// Point-to-point transfer from held key material
    Transfer,
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Credit => "credit",
            Self::Transfer => "transfer",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "credit" => Ok(Self::Credit),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("unknown kind: {}", s)),
        }
    }
}

/// State of a job in the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Enqueued, eligible to run once `run_at` has passed
    Waiting,
    /// Claimed by a worker, attempt in progress
    Active,
    /// Confirmed terminal by the ledger with no error
    Completed,
    /// Terminal failure
    Failed,
    /// Terminal failure with a reduced-amount fallback job enqueued
    FallbackQueued,
}

impl JobState {
    /// Terminal states are immutable once set
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::FallbackQueued)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::FallbackQueued => "fallback_queued",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(Self::Waiting),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "fallback_queued" => Ok(Self::FallbackQueued),
            _ => Err(format!("unknown state: {}", s)),
        }
    }
}

/// Kind-specific immutable job input
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobPayload {
    Credit {
        /// Target account (base58 pubkey)
        recipient: String,
        /// Amount in lamports
        lamports: u64,
    },
    Transfer {
        /// Base64-encoded source keypair bytes
        from_secret_b64: String,
        /// Recipient account (base58 pubkey)
        recipient: String,
        /// Amount in lamports
        lamports: u64,
    },
}

impl JobPayload {
    pub fn kind(&self) -> JobKind {
        match self {
            Self::Credit { .. } => JobKind::Credit,
            Self::Transfer { .. } => JobKind::Transfer,
        }
    }

    pub fn lamports(&self) -> u64 {
        match self {
            Self::Credit { lamports, .. } | Self::Transfer { lamports, .. } => *lamports,
        }
    }
}

/// A job record tracking one submitted operation through its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID, assigned at enqueue
    pub id: String,
    /// Queue the job belongs to
    pub kind: JobKind,
    /// Immutable operation input
    pub payload: JobPayload,
    /// Current state
    pub state: JobState,
    /// Attempts started so far, never exceeds `max_attempts`
    pub attempts_made: u32,
    /// Attempt budget
    pub max_attempts: u32,
    /// Base delay for the exponential backoff policy, in milliseconds
    pub backoff_base_ms: u64,
    /// Progress 0-100, monotonically non-decreasing within an attempt
    pub progress: u8,
    /// Earliest time the job may be claimed (unix millis)
    pub run_at: i64,

    /// Ledger signature, recorded once submission is accepted
    pub signature: Option<String>,
    /// Explorer-style reference for the confirmed transaction
    pub explorer_url: Option<String>,
    /// Last error encountered (terminal reason on failed states)
    pub failure_reason: Option<String>,

    /// Parent job id, set on fallback children only
    pub caused_by: Option<String>,
    /// Child job id, set when a fallback was enqueued for this job
    pub fallback_job_id: Option<String>,

    /// Timestamp when the job was enqueued (unix millis)
    pub created_at: i64,
    /// Timestamp when the latest attempt started
    pub started_at: Option<i64>,
    /// Timestamp when the job reached a terminal state
    pub finished_at: Option<i64>,
    /// Timestamp of the last mutation
    pub updated_at: i64,
}

impl Job {
    /// Create a new waiting job, eligible to run after `delay_ms`
    pub fn new(payload: JobPayload, max_attempts: u32, backoff_base_ms: u64, delay_ms: u64) -> Self {
        let now = now_ms();
        let id = format!("job_{}_{:08x}", now / 1000, rand::random::<u32>());

        Self {
            id,
            kind: payload.kind(),
            payload,
            state: JobState::Waiting,
            attempts_made: 0,
            max_attempts: max_attempts.max(1),
            backoff_base_ms,
            progress: 0,
            run_at: now + delay_ms as i64,
            signature: None,
            explorer_url: None,
            failure_reason: None,
            caused_by: None,
            fallback_job_id: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    /// Create the reduced-amount fallback child for an exhausted credit job
    pub fn fallback_for(
        parent: &Job,
        lamports: u64,
        max_attempts: u32,
        backoff_base_ms: u64,
        delay_ms: u64,
    ) -> Self {
        let recipient = match &parent.payload {
            JobPayload::Credit { recipient, .. } => recipient.clone(),
            JobPayload::Transfer { recipient, .. } => recipient.clone(),
        };

        let mut child = Self::new(
            JobPayload::Credit { recipient, lamports },
            max_attempts,
            backoff_base_ms,
            delay_ms,
        );
        child.caused_by = Some(parent.id.clone());
        child
    }

    /// Delay before the next retry is eligible: `base * 2^(attempt - 1)`
    pub fn backoff_delay_ms(&self) -> u64 {
        let shift = self.attempts_made.saturating_sub(1).min(31);
        self.backoff_base_ms.saturating_mul(1u64 << shift)
    }

    /// Begin a new attempt (waiting → active)
    pub fn mark_active(&mut self) {
        self.state = JobState::Active;
        self.attempts_made += 1;
        self.progress = 0;
        self.started_at = Some(now_ms());
        self.touch();
    }

    /// Update progress; never moves backwards within an attempt
    pub fn set_progress(&mut self, progress: u8) {
        self.progress = self.progress.max(progress.min(100));
        self.touch();
    }

    /// Schedule a retry after a transient failure (active → waiting)
    pub fn mark_retrying(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.state = JobState::Waiting;
        self.run_at = now_ms() + self.backoff_delay_ms() as i64;
        self.touch();
    }

    /// Record authoritative success (active → completed)
    pub fn mark_completed(&mut self, signature: String, explorer_url: String) {
        self.signature = Some(signature);
        self.explorer_url = Some(explorer_url);
        self.progress = 100;
        self.state = JobState::Completed;
        self.finished_at = Some(now_ms());
        self.touch();
    }

    /// Record terminal failure (active → failed)
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.state = JobState::Failed;
        self.finished_at = Some(now_ms());
        self.touch();
    }

    /// Record terminal failure with a fallback child enqueued
    pub fn mark_fallback_queued(&mut self, child_id: String, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.fallback_job_id = Some(child_id);
        self.state = JobState::FallbackQueued;
        self.finished_at = Some(now_ms());
        self.touch();
    }

    /// Whether another attempt remains in the budget
    pub fn can_retry(&self) -> bool {
        self.attempts_made < self.max_attempts
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn touch(&mut self) {
        self.updated_at = now_ms();
    }
}

/// Per-state job counts for one queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub waiting: u64,
    pub active: u64,
    pub completed: u64,
    /// Includes the fallback_queued terminal variant
    pub failed: u64,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.waiting + self.active + self.completed + self.failed
    }
}

impl std::fmt::Display for QueueCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "waiting: {} | active: {} | completed: {} | failed: {}",
            self.waiting, self.active, self.completed, self.failed
        )
    }
}

/// GET job boundary response, consumed by the (external) HTTP layer
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub id: String,
    pub kind: String,
    pub state: String,
    pub progress: u8,
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub signature: Option<String>,
    pub explorer_url: Option<String>,
    pub failure_reason: Option<String>,
    pub fallback_job_id: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            id: job.id.clone(),
            kind: job.kind.to_string(),
            state: job.state.to_string(),
            progress: job.progress,
            attempts_made: job.attempts_made,
            max_attempts: job.max_attempts,
            signature: job.signature.clone(),
            explorer_url: job.explorer_url.clone(),
            failure_reason: job.failure_reason.clone(),
            fallback_job_id: job.fallback_job_id.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}
