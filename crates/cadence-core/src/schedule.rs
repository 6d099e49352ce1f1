//! ScheduleBuilder: turns a recurrence rule plus its owner-task snapshot
//! into a fixed-size window of unpersisted occurrences.
//!
//! Building is pure and deterministic for a fixed `now`: no clock is read
//! here, no storage is touched. Persistence is the materializer's job.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{OwnerTask, RecurrenceRule, ScheduleOccurrence};
use crate::recurrence;
use crate::timezone;

/// Where regeneration restarts the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPolicy {
    /// First-time builds anchor at the current time; regeneration (the rule
    /// has had occurrences before) re-anchors at the rule's start date.
    StartDateOnRegenerate,
    /// Always anchor at the current time, skipping historical slots.
    AlwaysNow,
}

/// Configuration for schedule generation.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Number of future occurrences materialized per regeneration.
    pub window_size: usize,
    /// Application default zone, used when the owning location has no
    /// timezone set or names one that cannot be resolved.
    pub default_timezone: String,
    pub anchor: AnchorPolicy,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            default_timezone: "UTC".to_string(),
            anchor: AnchorPolicy::StartDateOnRegenerate,
        }
    }
}

/// Orchestrates strategy resolution, windowed expansion, timezone projection
/// and assignee snapshotting.
pub struct ScheduleBuilder {
    config: ScheduleConfig,
}

impl ScheduleBuilder {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ScheduleConfig::default())
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Builds the full occurrence window for `rule`.
    ///
    /// `now` is injected by the caller; `had_occurrences` reports whether any
    /// occurrence rows (live or soft-deleted) have ever existed for the rule,
    /// which drives the anchor policy. The returned list is ordered, exactly
    /// `window_size` long, and strictly increasing in `due_at`.
    pub fn build(
        &self,
        rule: &RecurrenceRule,
        owner: &OwnerTask,
        now: DateTime<Utc>,
        had_occurrences: bool,
    ) -> Result<Vec<ScheduleOccurrence>, CoreError> {
        let tz = self.owner_timezone(rule, owner);

        let from = match self.config.anchor {
            AnchorPolicy::AlwaysNow => now.with_timezone(&tz).date_naive(),
            AnchorPolicy::StartDateOnRegenerate => {
                if had_occurrences {
                    rule.start_date
                } else {
                    now.with_timezone(&tz).date_naive()
                }
            }
        };

        let occurrences: Vec<ScheduleOccurrence> = recurrence::occurrence_dates(rule, from)?
            .take(self.config.window_size)
            .map(|date| ScheduleOccurrence {
                id: Uuid::now_v7(),
                rule_id: rule.id,
                task_id: owner.task_id,
                tenant_id: owner.tenant_id,
                due_at: timezone::project(date, rule.reference_time, tz),
                assigned_user_id: owner.assigned_user_id,
                assigned_profile_id: owner.assigned_profile_id,
                created_at: now,
                deleted_at: None,
            })
            .collect();

        debug!(
            rule_id = %rule.id,
            kind = %rule.kind,
            count = occurrences.len(),
            anchor = %from,
            "built occurrence window"
        );

        Ok(occurrences)
    }

    /// Resolves the owner's location timezone, falling back to the
    /// configured default. The fallback is deliberate and observable.
    fn owner_timezone(&self, rule: &RecurrenceRule, owner: &OwnerTask) -> Tz {
        match owner.timezone.as_deref() {
            Some(name) => match timezone::resolve_timezone(name) {
                Ok(tz) => tz,
                Err(_) => {
                    warn!(
                        rule_id = %rule.id,
                        timezone = name,
                        fallback = %self.config.default_timezone,
                        "unresolvable location timezone, using application default"
                    );
                    self.default_timezone()
                }
            },
            None => {
                debug!(
                    rule_id = %rule.id,
                    fallback = %self.config.default_timezone,
                    "location has no timezone set, using application default"
                );
                self.default_timezone()
            }
        }
    }

    fn default_timezone(&self) -> Tz {
        timezone::resolve_timezone(&self.config.default_timezone).unwrap_or(chrono_tz::UTC)
    }
}
