//! ScheduleMaterializer: atomically replaces the persisted occurrence set
//! for a rule. Delete-then-insert under one transaction; readers never see a
//! partial set, and a failed replace leaves the prior set untouched.

use crate::error::CoreError;
use crate::models::ScheduleOccurrence;
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::OccurrenceRepository for SqliteRepository {
    async fn replace_for_rule(
        &self,
        rule_id: Uuid,
        occurrences: Vec<ScheduleOccurrence>,
    ) -> Result<usize, CoreError> {
        let mut tx = self.pool().begin().await?;

        let inserted =
            match Self::replace_for_rule_in_transaction(&mut tx, rule_id, &occurrences).await {
                Ok(count) => count,
                // Storage failures surface as MaterializationFailure; the
                // transaction rolls back on drop, so retrying is safe.
                Err(CoreError::Database(e)) => {
                    return Err(CoreError::Materialization(e.to_string()))
                }
                Err(other) => return Err(other),
            };

        tx.commit()
            .await
            .map_err(|e| CoreError::Materialization(e.to_string()))?;
        Ok(inserted)
    }

    async fn find_for_rule(&self, rule_id: Uuid) -> Result<Vec<ScheduleOccurrence>, CoreError> {
        let occurrences = sqlx::query_as(
            r#"SELECT * FROM schedule_occurrences
            WHERE rule_id = $1 AND deleted_at IS NULL
            ORDER BY due_at"#,
        )
        .bind(rule_id)
        .fetch_all(self.pool())
        .await?;
        Ok(occurrences)
    }

    async fn find_for_task(
        &self,
        task_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<ScheduleOccurrence>, CoreError> {
        let occurrences = sqlx::query_as(
            r#"SELECT * FROM schedule_occurrences
            WHERE task_id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            ORDER BY due_at"#,
        )
        .bind(task_id)
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(occurrences)
    }
}

impl SqliteRepository {
    /// Replaces the occurrence set for a rule within an existing transaction.
    ///
    /// The opening fetch of the rule row is the per-rule serialization point:
    /// two concurrent replaces for the same rule serialize here instead of
    /// interleaving writes.
    pub(crate) async fn replace_for_rule_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rule_id: Uuid,
        occurrences: &[ScheduleOccurrence],
    ) -> Result<usize, CoreError> {
        let rule_row: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM recurrence_rules WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(rule_id)
        .fetch_optional(&mut **tx)
        .await?;

        if rule_row.is_none() {
            return Err(CoreError::NotFound(format!(
                "Rule with id {} not found",
                rule_id
            )));
        }

        if occurrences.iter().any(|o| o.rule_id != rule_id) {
            return Err(CoreError::Materialization(format!(
                "occurrence set contains rows not owned by rule {}",
                rule_id
            )));
        }

        let removed = Self::soft_delete_occurrences_in_transaction(tx, rule_id).await?;

        for occurrence in occurrences {
            sqlx::query(
                r#"INSERT INTO schedule_occurrences
                (id, rule_id, task_id, tenant_id, due_at, assigned_user_id, assigned_profile_id, created_at, deleted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"#,
            )
            .bind(occurrence.id)
            .bind(occurrence.rule_id)
            .bind(occurrence.task_id)
            .bind(occurrence.tenant_id)
            .bind(occurrence.due_at)
            .bind(occurrence.assigned_user_id)
            .bind(occurrence.assigned_profile_id)
            .bind(occurrence.created_at)
            .bind(occurrence.deleted_at)
            .execute(&mut **tx)
            .await?;
        }

        debug!(
            rule_id = %rule_id,
            removed,
            inserted = occurrences.len(),
            "replaced occurrence set"
        );

        Ok(occurrences.len())
    }

    /// Soft-deletes all live occurrences for a rule.
    pub(crate) async fn soft_delete_occurrences_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rule_id: Uuid,
    ) -> Result<u64, CoreError> {
        let result = sqlx::query(
            "UPDATE schedule_occurrences SET deleted_at = $1 WHERE rule_id = $2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(rule_id)
        .execute(&mut **tx)
        .await?;

        Ok(result.rows_affected())
    }

    /// Whether any occurrence rows, live or soft-deleted, have ever existed
    /// for this rule. Drives the regeneration anchor policy.
    pub(crate) async fn had_occurrences_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rule_id: Uuid,
    ) -> Result<bool, CoreError> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM schedule_occurrences WHERE rule_id = $1")
                .bind(rule_id)
                .fetch_one(&mut **tx)
                .await?;
        Ok(count.0 > 0)
    }
}
