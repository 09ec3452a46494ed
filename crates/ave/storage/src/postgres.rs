//! PostgreSQL adapter for AVE storage.
//!
//! Entities are stored as JSONB documents next to the few scalar columns the
//! adapter needs for uniqueness and compare-and-set (`revision`, `status`,
//! `sealed_at`). Insertion order is kept with `BIGSERIAL` sequence columns.

use crate::traits::{
    check_job_transition, AcceptanceStore, DeliveryStore, EvidenceStore, JobStore, ReportStore,
    SnapshotStore, SpecStore, StorageLifecycle,
};
use crate::{StorageError, StorageResult};
use ave_types::{
    AskSnapshot, BundleId, DeliveryId, EvaluationSpec, EvidenceBundle, EvidenceItem, JobId,
    JobTransition, NormalizedDelivery, ReportId, SnapshotId, SpecAcceptanceEvent, SpecId,
    VerificationJob, VerificationReport,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow, Postgres};
use sqlx::{Row, Transaction};

/// PostgreSQL-backed storage adapter.
#[derive(Clone)]
pub struct PostgresVerifyStorage {
    pool: PgPool,
}

impl PostgresVerifyStorage {
    /// Connect to PostgreSQL and initialize required schema.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        Self::from_pool(pool).await
    }

    /// Create adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StorageResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StorageResult<()> {
        let ddl = [
            r#"
            CREATE TABLE IF NOT EXISTS ave_ask_snapshots (
                id TEXT PRIMARY KEY,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ave_evaluation_specs (
                id TEXT PRIMARY KEY,
                snapshot_id TEXT NOT NULL,
                revision BIGINT NOT NULL,
                body JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ave_spec_acceptances (
                seq BIGSERIAL PRIMARY KEY,
                id TEXT NOT NULL UNIQUE,
                spec_id TEXT NOT NULL,
                actor_type TEXT NOT NULL,
                spec_hash TEXT NOT NULL,
                body JSONB NOT NULL,
                UNIQUE (spec_id, actor_type, spec_hash)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ave_normalized_deliveries (
                id TEXT PRIMARY KEY,
                spec_id TEXT NOT NULL,
                body JSONB NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ave_evidence_bundles (
                id TEXT PRIMARY KEY,
                spec_id TEXT NOT NULL,
                delivery_id TEXT NOT NULL,
                sealed_at TIMESTAMPTZ,
                body JSONB NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ave_evidence_items (
                seq BIGSERIAL PRIMARY KEY,
                bundle_id TEXT NOT NULL REFERENCES ave_evidence_bundles (id),
                item_id TEXT NOT NULL,
                body JSONB NOT NULL,
                UNIQUE (bundle_id, item_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ave_verification_jobs (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                revision BIGINT NOT NULL,
                body JSONB NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS ave_verification_reports (
                id TEXT PRIMARY KEY,
                job_id TEXT NOT NULL UNIQUE,
                body JSONB NOT NULL
            )
            "#,
        ];

        for stmt in ddl {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;
        }
        Ok(())
    }

    async fn fetch_body<T: DeserializeOwned>(
        &self,
        sql: &str,
        id: &str,
    ) -> StorageResult<Option<T>> {
        let row = sqlx::query(sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;
        row.map(|row| decode_body(&row)).transpose()
    }
}

#[async_trait]
impl SnapshotStore for PostgresVerifyStorage {
    async fn insert_snapshot(&self, snapshot: AskSnapshot) -> StorageResult<()> {
        sqlx::query("INSERT INTO ave_ask_snapshots (id, body, created_at) VALUES ($1, $2, $3)")
            .bind(snapshot.id.0.clone())
            .bind(to_body(&snapshot)?)
            .bind(snapshot.created_at)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_snapshot(&self, id: &SnapshotId) -> StorageResult<Option<AskSnapshot>> {
        self.fetch_body("SELECT body FROM ave_ask_snapshots WHERE id = $1", id.as_str())
            .await
    }
}

#[async_trait]
impl SpecStore for PostgresVerifyStorage {
    async fn insert_spec(&self, spec: EvaluationSpec) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ave_evaluation_specs (id, snapshot_id, revision, body, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(spec.id.0.clone())
        .bind(spec.snapshot_id.0.clone())
        .bind(to_i64(spec.revision)?)
        .bind(to_body(&spec)?)
        .bind(spec.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_spec(&self, id: &SpecId) -> StorageResult<Option<EvaluationSpec>> {
        self.fetch_body("SELECT body FROM ave_evaluation_specs WHERE id = $1", id.as_str())
            .await
    }

    async fn update_spec(
        &self,
        spec: EvaluationSpec,
        expected_revision: u64,
    ) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE ave_evaluation_specs
               SET revision = $1,
                   body = $2,
                   updated_at = $3
             WHERE id = $4
               AND revision = $5
            "#,
        )
        .bind(to_i64(spec.revision)?)
        .bind(to_body(&spec)?)
        .bind(spec.updated_at)
        .bind(spec.id.0.clone())
        .bind(to_i64(expected_revision)?)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            if self.get_spec(&spec.id).await?.is_some() {
                return Err(StorageError::Conflict(format!(
                    "spec {} revision mismatch: expected {}",
                    spec.id, expected_revision
                )));
            }
            return Err(StorageError::NotFound(format!("spec {} not found", spec.id)));
        }
        Ok(())
    }
}

#[async_trait]
impl AcceptanceStore for PostgresVerifyStorage {
    async fn record_acceptance(
        &self,
        event: SpecAcceptanceEvent,
    ) -> StorageResult<(SpecAcceptanceEvent, bool)> {
        let result = sqlx::query(
            r#"
            INSERT INTO ave_spec_acceptances (id, spec_id, actor_type, spec_hash, body)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (spec_id, actor_type, spec_hash) DO NOTHING
            "#,
        )
        .bind(event.id.0.clone())
        .bind(event.spec_id.0.clone())
        .bind(event.actor_type.as_str())
        .bind(event.spec_hash.to_hex())
        .bind(to_body(&event)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;

        if result.rows_affected() == 1 {
            return Ok((event, true));
        }

        let row = sqlx::query(
            r#"
            SELECT body FROM ave_spec_acceptances
             WHERE spec_id = $1 AND actor_type = $2 AND spec_hash = $3
            "#,
        )
        .bind(event.spec_id.0.clone())
        .bind(event.actor_type.as_str())
        .bind(event.spec_hash.to_hex())
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok((decode_body(&row)?, false))
    }

    async fn list_acceptances(&self, spec_id: &SpecId) -> StorageResult<Vec<SpecAcceptanceEvent>> {
        let rows = sqlx::query("SELECT body FROM ave_spec_acceptances WHERE spec_id = $1 ORDER BY seq")
            .bind(spec_id.0.clone())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(decode_body).collect()
    }
}

#[async_trait]
impl DeliveryStore for PostgresVerifyStorage {
    async fn insert_delivery(&self, delivery: NormalizedDelivery) -> StorageResult<()> {
        sqlx::query("INSERT INTO ave_normalized_deliveries (id, spec_id, body) VALUES ($1, $2, $3)")
            .bind(delivery.id.0.clone())
            .bind(delivery.spec_id.0.clone())
            .bind(to_body(&delivery)?)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_delivery(&self, id: &DeliveryId) -> StorageResult<Option<NormalizedDelivery>> {
        self.fetch_body(
            "SELECT body FROM ave_normalized_deliveries WHERE id = $1",
            id.as_str(),
        )
        .await
    }
}

#[async_trait]
impl EvidenceStore for PostgresVerifyStorage {
    async fn insert_bundle(&self, bundle: EvidenceBundle) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO ave_evidence_bundles (id, spec_id, delivery_id, sealed_at, body)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(bundle.id.0.clone())
        .bind(bundle.spec_id.0.clone())
        .bind(bundle.delivery_id.0.clone())
        .bind(bundle.sealed_at)
        .bind(to_body(&bundle)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_bundle(&self, id: &BundleId) -> StorageResult<Option<EvidenceBundle>> {
        self.fetch_body("SELECT body FROM ave_evidence_bundles WHERE id = $1", id.as_str())
            .await
    }

    async fn append_item(&self, item: EvidenceItem) -> StorageResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        // Row lock so a concurrent seal cannot slip in between check and insert.
        let row = sqlx::query("SELECT sealed_at FROM ave_evidence_bundles WHERE id = $1 FOR UPDATE")
            .bind(item.bundle_id.0.clone())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or_else(|| StorageError::NotFound(format!("bundle {} not found", item.bundle_id)))?;
        let sealed_at: Option<DateTime<Utc>> = row.try_get("sealed_at").map_err(backend)?;
        if sealed_at.is_some() {
            return Err(StorageError::InvariantViolation(format!(
                "bundle {} is sealed",
                item.bundle_id
            )));
        }

        sqlx::query("INSERT INTO ave_evidence_items (bundle_id, item_id, body) VALUES ($1, $2, $3)")
            .bind(item.bundle_id.0.clone())
            .bind(item.id.0.clone())
            .bind(to_body(&item)?)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_conflict)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn list_items(&self, bundle_id: &BundleId) -> StorageResult<Vec<EvidenceItem>> {
        let rows = sqlx::query("SELECT body FROM ave_evidence_items WHERE bundle_id = $1 ORDER BY seq")
            .bind(bundle_id.0.clone())
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        rows.iter().map(decode_body).collect()
    }

    async fn seal_bundle(
        &self,
        bundle_id: &BundleId,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let bundle = seal_in_tx(&mut tx, bundle_id, sealed_at).await?;
        tx.commit().await.map_err(backend)?;
        Ok(bundle)
    }
}

async fn seal_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    bundle_id: &BundleId,
    sealed_at: DateTime<Utc>,
) -> StorageResult<EvidenceBundle> {
    let row = sqlx::query("SELECT body FROM ave_evidence_bundles WHERE id = $1 FOR UPDATE")
        .bind(bundle_id.0.clone())
        .fetch_optional(&mut **tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| StorageError::NotFound(format!("bundle {bundle_id} not found")))?;
    let mut bundle: EvidenceBundle = decode_body(&row)?;

    if bundle.sealed_at.is_none() {
        bundle.sealed_at = Some(sealed_at);
        sqlx::query("UPDATE ave_evidence_bundles SET sealed_at = $1, body = $2 WHERE id = $3")
            .bind(sealed_at)
            .bind(to_body(&bundle)?)
            .bind(bundle_id.0.clone())
            .execute(&mut **tx)
            .await
            .map_err(backend)?;
    }
    Ok(bundle)
}

#[async_trait]
impl JobStore for PostgresVerifyStorage {
    async fn insert_job(&self, job: VerificationJob) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO ave_verification_jobs (id, status, revision, body) VALUES ($1, $2, $3, $4)",
        )
        .bind(job.id.0.clone())
        .bind(job.status.as_str())
        .bind(to_i64(job.revision)?)
        .bind(to_body(&job)?)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn enqueue_job(
        &self,
        job: VerificationJob,
        sealed_at: DateTime<Utc>,
    ) -> StorageResult<EvidenceBundle> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let bundle = seal_in_tx(&mut tx, &job.bundle_id, sealed_at).await?;
        sqlx::query(
            "INSERT INTO ave_verification_jobs (id, status, revision, body) VALUES ($1, $2, $3, $4)",
        )
        .bind(job.id.0.clone())
        .bind(job.status.as_str())
        .bind(to_i64(job.revision)?)
        .bind(to_body(&job)?)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_conflict)?;
        tx.commit().await.map_err(backend)?;
        Ok(bundle)
    }

    async fn get_job(&self, id: &JobId) -> StorageResult<Option<VerificationJob>> {
        self.fetch_body("SELECT body FROM ave_verification_jobs WHERE id = $1", id.as_str())
            .await
    }

    async fn transition_job(
        &self,
        id: &JobId,
        transition: JobTransition,
    ) -> StorageResult<VerificationJob> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let row = sqlx::query("SELECT body FROM ave_verification_jobs WHERE id = $1 FOR UPDATE")
            .bind(id.0.clone())
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or_else(|| StorageError::NotFound(format!("job {id} not found")))?;
        let mut job: VerificationJob = decode_body(&row)?;

        check_job_transition(&job, &transition)?;
        transition.apply(&mut job);

        sqlx::query(
            "UPDATE ave_verification_jobs SET status = $1, revision = $2, body = $3 WHERE id = $4",
        )
        .bind(job.status.as_str())
        .bind(to_i64(job.revision)?)
        .bind(to_body(&job)?)
        .bind(id.0.clone())
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(job)
    }
}

#[async_trait]
impl ReportStore for PostgresVerifyStorage {
    async fn insert_report(&self, report: VerificationReport) -> StorageResult<()> {
        sqlx::query("INSERT INTO ave_verification_reports (id, job_id, body) VALUES ($1, $2, $3)")
            .bind(report.id.0.clone())
            .bind(report.job_id.0.clone())
            .bind(to_body(&report)?)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_conflict)?;
        Ok(())
    }

    async fn get_report(&self, id: &ReportId) -> StorageResult<Option<VerificationReport>> {
        self.fetch_body(
            "SELECT body FROM ave_verification_reports WHERE id = $1",
            id.as_str(),
        )
        .await
    }

    async fn get_report_for_job(
        &self,
        job_id: &JobId,
    ) -> StorageResult<Option<VerificationReport>> {
        self.fetch_body(
            "SELECT body FROM ave_verification_reports WHERE job_id = $1",
            job_id.as_str(),
        )
        .await
    }
}

#[async_trait]
impl StorageLifecycle for PostgresVerifyStorage {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn close(&self) -> StorageResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn to_body<T: Serialize>(value: &T) -> StorageResult<Value> {
    Ok(serde_json::to_value(value)?)
}

fn decode_body<T: DeserializeOwned>(row: &PgRow) -> StorageResult<T> {
    let body: Value = row.try_get("body").map_err(backend)?;
    Ok(serde_json::from_value(body)?)
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn map_sqlx_conflict(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            return StorageError::Conflict(db_err.message().to_string());
        }
    }
    StorageError::Backend(err.to_string())
}

fn to_i64(value: u64) -> StorageResult<i64> {
    i64::try_from(value)
        .map_err(|_| StorageError::InvalidInput("revision value too large".to_string()))
}
