use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::ResumptionToken;
use domain::{ApprovalState, Decision, SplitPaymentApproval};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    ApprovalStoreError, Result, StoreError,
    store::{
        ApprovalStore, ClaimOutcome, ClaimState, IdempotencyKey, IdempotencyStore, PendingInsert,
    },
};

const APPROVAL_COLUMNS: &str = "token, state, approved, comment, created_at, resolved_at";

/// PostgreSQL-backed state store.
#[derive(Clone)]
pub struct PostgresStateStore {
    pool: PgPool,
}

impl PostgresStateStore {
    /// Creates a new PostgreSQL state store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_approval(row: PgRow) -> Result<SplitPaymentApproval> {
        let state: String = row.try_get("state")?;
        let state = ApprovalState::parse(&state)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown approval state '{state}'")))?;

        let approved: Option<bool> = row.try_get("approved")?;
        let comment: Option<String> = row.try_get("comment")?;
        let decision = approved.map(|approved| Decision { approved, comment });

        Ok(SplitPaymentApproval {
            token: ResumptionToken::from_stored(row.try_get::<String, _>("token")?),
            state,
            decision,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            resolved_at: row.try_get::<Option<DateTime<Utc>>, _>("resolved_at")?,
        })
    }
}

#[async_trait]
impl IdempotencyStore for PostgresStateStore {
    #[tracing::instrument(skip(self), fields(key = %key))]
    async fn try_claim(&self, key: &IdempotencyKey, stale_after: Duration) -> Result<ClaimOutcome> {
        // The primary key makes the insert the check-and-set; the conflict
        // branch only fires for an in-flight claim older than the stale bound.
        let result = sqlx::query(
            r#"
            INSERT INTO idempotency_keys (intent_id, action, claimed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (intent_id, action) DO UPDATE SET claimed_at = NOW()
            WHERE idempotency_keys.completed_at IS NULL
              AND idempotency_keys.claimed_at < NOW() - make_interval(secs => $3)
            "#,
        )
        .bind(key.intent_id().as_str())
        .bind(key.action())
        .bind(stale_after.as_secs_f64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(ClaimOutcome::Acquired);
        }

        // A claim released between the two statements reads as in flight; the
        // caller's retry will acquire it.
        Ok(match self.claim_state(key).await? {
            Some(ClaimState::Completed) => ClaimOutcome::Completed,
            Some(ClaimState::InFlight) | None => ClaimOutcome::InFlight,
        })
    }

    async fn complete(&self, key: &IdempotencyKey) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE idempotency_keys SET completed_at = NOW()
            WHERE intent_id = $1 AND action = $2 AND completed_at IS NULL
            "#,
        )
        .bind(key.intent_id().as_str())
        .bind(key.action())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM idempotency_keys
            WHERE intent_id = $1 AND action = $2 AND completed_at IS NULL
            "#,
        )
        .bind(key.intent_id().as_str())
        .bind(key.action())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn claim_state(&self, key: &IdempotencyKey) -> Result<Option<ClaimState>> {
        let completed: Option<bool> = sqlx::query_scalar(
            r#"
            SELECT completed_at IS NOT NULL FROM idempotency_keys
            WHERE intent_id = $1 AND action = $2
            "#,
        )
        .bind(key.intent_id().as_str())
        .bind(key.action())
        .fetch_optional(&self.pool)
        .await?;

        Ok(completed.map(|completed| {
            if completed {
                ClaimState::Completed
            } else {
                ClaimState::InFlight
            }
        }))
    }
}

#[async_trait]
impl ApprovalStore for PostgresStateStore {
    async fn insert_pending(&self, token: &ResumptionToken) -> Result<PendingInsert> {
        let inserted: Option<PgRow> = sqlx::query(&format!(
            r#"
            INSERT INTO approvals (token, state, created_at)
            VALUES ($1, 'pending', NOW())
            ON CONFLICT (token) DO NOTHING
            RETURNING {APPROVAL_COLUMNS}
            "#
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(PendingInsert::Created(Self::row_to_approval(row)?));
        }

        let existing = self.get(token).await?.ok_or_else(|| {
            StoreError::Corrupt(format!("approval {token} vanished after conflict"))
        })?;
        Ok(PendingInsert::Existing(existing))
    }

    #[tracing::instrument(skip(self, decision), fields(token = %token))]
    async fn resolve(
        &self,
        token: &ResumptionToken,
        decision: &Decision,
    ) -> std::result::Result<SplitPaymentApproval, ApprovalStoreError> {
        // Only a pending row matches, so two concurrent decisions cannot both win.
        let updated: Option<PgRow> = sqlx::query(&format!(
            r#"
            UPDATE approvals
            SET state = 'resolved', approved = $2, comment = $3, resolved_at = NOW()
            WHERE token = $1 AND state = 'pending'
            RETURNING {APPROVAL_COLUMNS}
            "#
        ))
        .bind(token.as_str())
        .bind(decision.approved)
        .bind(decision.comment.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = updated {
            return Ok(Self::row_to_approval(row)?);
        }

        match self.get(token).await? {
            Some(_) => Err(ApprovalStoreError::AlreadyResolved(token.clone())),
            None => Err(ApprovalStoreError::NotFound(token.clone())),
        }
    }

    async fn get(&self, token: &ResumptionToken) -> Result<Option<SplitPaymentApproval>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE token = $1"
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_approval).transpose()
    }

    async fn list_pending(&self) -> Result<Vec<SplitPaymentApproval>> {
        let rows = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals WHERE state = 'pending' ORDER BY created_at ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_approval).collect()
    }
}
