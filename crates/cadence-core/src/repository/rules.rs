//! RecurrenceRuleStore: rule CRUD plus the enable/disable lifecycle.
//!
//! Any operation that leaves a rule enabled regenerates its full occurrence
//! window inside the same transaction, so a rule's occurrence set is never
//! partially written.

use crate::error::CoreError;
use crate::models::{NewRuleData, OwnerTask, RecurrenceRule, UpdateRuleData};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl super::RuleRepository for SqliteRepository {
    async fn create_rule(
        &self,
        data: NewRuleData,
        owner: &OwnerTask,
    ) -> Result<RecurrenceRule, CoreError> {
        let now = Utc::now();
        let rule = RecurrenceRule {
            id: Uuid::now_v7(),
            task_id: owner.task_id,
            tenant_id: owner.tenant_id,
            kind: data.kind,
            start_date: data.start_date,
            interval: data.interval.unwrap_or(1),
            day_of_month: data.day_of_month,
            weekday: data.weekday,
            ordinal: data.ordinal,
            month: data.month,
            reference_time: owner.due_time_of_day,
            enabled: data.enabled,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        // Shape errors are rejected here, before anything is written.
        rule.validate()?;

        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"INSERT INTO recurrence_rules
            (id, task_id, tenant_id, kind, start_date, interval, day_of_month, weekday, ordinal, month, reference_time, enabled, created_at, updated_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"#,
        )
        .bind(rule.id)
        .bind(rule.task_id)
        .bind(rule.tenant_id)
        .bind(rule.kind)
        .bind(rule.start_date)
        .bind(rule.interval)
        .bind(rule.day_of_month)
        .bind(rule.weekday)
        .bind(rule.ordinal)
        .bind(rule.month)
        .bind(rule.reference_time)
        .bind(rule.enabled)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .bind(rule.deleted_at)
        .execute(&mut *tx)
        .await?;

        if rule.enabled {
            self.regenerate_in_transaction(&mut tx, &rule, owner).await?;
        }

        tx.commit().await?;
        Ok(rule)
    }

    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError> {
        let rule =
            sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(self.pool())
                .await?;
        Ok(rule)
    }

    async fn find_rules_for_task(
        &self,
        task_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<RecurrenceRule>, CoreError> {
        let rules = sqlx::query_as(
            r#"SELECT * FROM recurrence_rules
            WHERE task_id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            ORDER BY created_at"#,
        )
        .bind(task_id)
        .bind(tenant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rules)
    }

    async fn update_rule(
        &self,
        id: Uuid,
        data: UpdateRuleData,
        owner: &OwnerTask,
    ) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;

        let current: RecurrenceRule =
            sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", id)))?;

        let merged = RecurrenceRule {
            kind: data.kind.unwrap_or(current.kind),
            start_date: data.start_date.unwrap_or(current.start_date),
            interval: data.interval.unwrap_or(current.interval),
            day_of_month: data.day_of_month.unwrap_or(current.day_of_month),
            weekday: data.weekday.unwrap_or(current.weekday),
            ordinal: data.ordinal.unwrap_or(current.ordinal),
            month: data.month.unwrap_or(current.month),
            reference_time: owner.due_time_of_day,
            updated_at: Utc::now(),
            ..current
        };

        // The merged shape must be valid as a whole; a kind change can
        // invalidate parameters that were fine before.
        merged.validate()?;

        sqlx::query(
            r#"UPDATE recurrence_rules
            SET kind = $1, start_date = $2, interval = $3, day_of_month = $4, weekday = $5,
                ordinal = $6, month = $7, reference_time = $8, updated_at = $9
            WHERE id = $10"#,
        )
        .bind(merged.kind)
        .bind(merged.start_date)
        .bind(merged.interval)
        .bind(merged.day_of_month)
        .bind(merged.weekday)
        .bind(merged.ordinal)
        .bind(merged.month)
        .bind(merged.reference_time)
        .bind(merged.updated_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if merged.enabled {
            self.regenerate_in_transaction(&mut tx, &merged, owner).await?;
        }

        tx.commit().await?;
        Ok(merged)
    }

    async fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
        owner: &OwnerTask,
        note: Option<String>,
    ) -> Result<RecurrenceRule, CoreError> {
        let mut tx = self.pool().begin().await?;

        let current: RecurrenceRule =
            sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Rule with id {} not found", id)))?;

        // No-op transitions are not audited and touch nothing.
        if current.enabled == enabled {
            return Ok(current);
        }

        let updated = RecurrenceRule {
            enabled,
            updated_at: Utc::now(),
            ..current.clone()
        };

        sqlx::query("UPDATE recurrence_rules SET enabled = $1, updated_at = $2 WHERE id = $3")
            .bind(updated.enabled)
            .bind(updated.updated_at)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        Self::append_audit_in_transaction(&mut tx, &updated, current.enabled, enabled, note)
            .await?;

        if enabled {
            // Re-enabling always regenerates a complete fresh set; the old
            // soft-deleted set is never reused.
            self.regenerate_in_transaction(&mut tx, &updated, owner).await?;
        } else {
            let removed = Self::soft_delete_occurrences_in_transaction(&mut tx, id).await?;
            debug!(rule_id = %id, removed, "disabled rule, cleared occurrences");
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_rule(&self, id: Uuid) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let rule: Option<RecurrenceRule> =
            sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = $1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if rule.is_none() {
            return Err(CoreError::NotFound(format!("Rule with id {} not found", id)));
        }

        let now = Utc::now();

        Self::soft_delete_occurrences_in_transaction(&mut tx, id).await?;

        sqlx::query("UPDATE schedule_audit SET deleted_at = $1 WHERE rule_id = $2 AND deleted_at IS NULL")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE recurrence_rules SET deleted_at = $1, updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

impl SqliteRepository {
    /// Builds and persists a complete fresh occurrence window for `rule`
    /// within an existing transaction.
    pub(crate) async fn regenerate_in_transaction(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        rule: &RecurrenceRule,
        owner: &OwnerTask,
    ) -> Result<usize, CoreError> {
        let had_occurrences = Self::had_occurrences_in_transaction(tx, rule.id).await?;
        let occurrences = self.builder().build(rule, owner, Utc::now(), had_occurrences)?;
        Self::replace_for_rule_in_transaction(tx, rule.id, &occurrences).await
    }
}
