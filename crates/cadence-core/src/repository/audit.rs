//! Schedule audit trail: one row per enable/disable transition, with old and
//! new state and an optional free-text note.

use crate::error::CoreError;
use crate::models::{RecurrenceRule, ScheduleAuditEntry};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use uuid::Uuid;

#[async_trait]
impl super::AuditRepository for SqliteRepository {
    async fn find_audit_for_rule(
        &self,
        rule_id: Uuid,
    ) -> Result<Vec<ScheduleAuditEntry>, CoreError> {
        let entries = sqlx::query_as(
            r#"SELECT * FROM schedule_audit
            WHERE rule_id = $1 AND deleted_at IS NULL
            ORDER BY created_at"#,
        )
        .bind(rule_id)
        .fetch_all(self.pool())
        .await?;
        Ok(entries)
    }
}

impl SqliteRepository {
    /// Appends a transition entry within an existing lifecycle transaction.
    pub(crate) async fn append_audit_in_transaction(
        tx: &mut Transaction<'_, Sqlite>,
        rule: &RecurrenceRule,
        enabled_before: bool,
        enabled_after: bool,
        note: Option<String>,
    ) -> Result<ScheduleAuditEntry, CoreError> {
        let entry = ScheduleAuditEntry {
            id: Uuid::now_v7(),
            rule_id: rule.id,
            tenant_id: rule.tenant_id,
            enabled_before,
            enabled_after,
            note,
            created_at: Utc::now(),
            deleted_at: None,
        };

        sqlx::query(
            r#"INSERT INTO schedule_audit
            (id, rule_id, tenant_id, enabled_before, enabled_after, note, created_at, deleted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(entry.id)
        .bind(entry.rule_id)
        .bind(entry.tenant_id)
        .bind(entry.enabled_before)
        .bind(entry.enabled_after)
        .bind(&entry.note)
        .bind(entry.created_at)
        .bind(entry.deleted_at)
        .execute(&mut **tx)
        .await?;

        Ok(entry)
    }
}
