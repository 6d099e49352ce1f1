use crate::db::DbPool;
use crate::error::CoreError;
use crate::models::{
    NewRuleData, OwnerTask, RecurrenceRule, ScheduleAuditEntry, ScheduleOccurrence,
    UpdateRuleData,
};
use crate::schedule::ScheduleBuilder;
use async_trait::async_trait;
use uuid::Uuid;

// Re-export domain modules
pub mod audit;
pub mod occurrences;
pub mod rules;

/// CRUD and lifecycle over recurrence rules. Enabling, editing or creating
/// an enabled rule regenerates its full occurrence window inside the same
/// transaction.
#[async_trait]
pub trait RuleRepository {
    async fn create_rule(
        &self,
        data: NewRuleData,
        owner: &OwnerTask,
    ) -> Result<RecurrenceRule, CoreError>;
    async fn find_rule_by_id(&self, id: Uuid) -> Result<Option<RecurrenceRule>, CoreError>;
    async fn find_rules_for_task(
        &self,
        task_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<RecurrenceRule>, CoreError>;
    async fn update_rule(
        &self,
        id: Uuid,
        data: UpdateRuleData,
        owner: &OwnerTask,
    ) -> Result<RecurrenceRule, CoreError>;
    async fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
        owner: &OwnerTask,
        note: Option<String>,
    ) -> Result<RecurrenceRule, CoreError>;
    async fn delete_rule(&self, id: Uuid) -> Result<(), CoreError>;
}

/// Materialization: the only stateful, concurrency-sensitive surface.
/// `replace_for_rule` is transactional, all-or-nothing and idempotent.
#[async_trait]
pub trait OccurrenceRepository {
    async fn replace_for_rule(
        &self,
        rule_id: Uuid,
        occurrences: Vec<ScheduleOccurrence>,
    ) -> Result<usize, CoreError>;
    async fn find_for_rule(&self, rule_id: Uuid) -> Result<Vec<ScheduleOccurrence>, CoreError>;
    async fn find_for_task(
        &self,
        task_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Vec<ScheduleOccurrence>, CoreError>;
}

/// Read access to the schedule audit trail. Appends happen inside lifecycle
/// transactions.
#[async_trait]
pub trait AuditRepository {
    async fn find_audit_for_rule(
        &self,
        rule_id: Uuid,
    ) -> Result<Vec<ScheduleAuditEntry>, CoreError>;
}

/// Main repository trait that composes all domain traits
#[async_trait]
pub trait Repository: RuleRepository + OccurrenceRepository + AuditRepository {}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
    builder: ScheduleBuilder,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, builder: ScheduleBuilder) -> Self {
        Self { pool, builder }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Get a reference to the schedule builder for internal use
    pub(crate) fn builder(&self) -> &ScheduleBuilder {
        &self.builder
    }
}

impl Repository for SqliteRepository {}
