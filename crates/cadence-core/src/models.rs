use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::error::CoreError;

/// How often a task recurs. Closed set; every variant has a dedicated
/// expansion strategy in [`crate::recurrence`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    Daily,
    Weekly,
    MonthlyOnDay,
    MonthlyOnWeekday,
    AnnualOnDay,
    AnnualOnWeekday,
}

impl RecurrenceKind {
    /// Maps a legacy numeric schedule type code onto a kind. The surrounding
    /// CRUD layer still speaks these codes at its boundary.
    pub fn from_type_code(code: i64) -> Result<Self, CoreError> {
        match code {
            1 => Ok(RecurrenceKind::Daily),
            2 => Ok(RecurrenceKind::Weekly),
            3 => Ok(RecurrenceKind::MonthlyOnDay),
            4 => Ok(RecurrenceKind::MonthlyOnWeekday),
            5 => Ok(RecurrenceKind::AnnualOnDay),
            6 => Ok(RecurrenceKind::AnnualOnWeekday),
            other => Err(CoreError::UnknownRecurrenceKind(other)),
        }
    }

    pub fn type_code(&self) -> i64 {
        match self {
            RecurrenceKind::Daily => 1,
            RecurrenceKind::Weekly => 2,
            RecurrenceKind::MonthlyOnDay => 3,
            RecurrenceKind::MonthlyOnWeekday => 4,
            RecurrenceKind::AnnualOnDay => 5,
            RecurrenceKind::AnnualOnWeekday => 6,
        }
    }
}

impl std::fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecurrenceKind::Daily => write!(f, "daily"),
            RecurrenceKind::Weekly => write!(f, "weekly"),
            RecurrenceKind::MonthlyOnDay => write!(f, "monthly_on_day"),
            RecurrenceKind::MonthlyOnWeekday => write!(f, "monthly_on_weekday"),
            RecurrenceKind::AnnualOnDay => write!(f, "annual_on_day"),
            RecurrenceKind::AnnualOnWeekday => write!(f, "annual_on_weekday"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence kind: {0}")]
pub struct ParseRecurrenceKindError(String);

impl FromStr for RecurrenceKind {
    type Err = ParseRecurrenceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(RecurrenceKind::Daily),
            "weekly" => Ok(RecurrenceKind::Weekly),
            "monthly_on_day" => Ok(RecurrenceKind::MonthlyOnDay),
            "monthly_on_weekday" => Ok(RecurrenceKind::MonthlyOnWeekday),
            "annual_on_day" => Ok(RecurrenceKind::AnnualOnDay),
            "annual_on_weekday" => Ok(RecurrenceKind::AnnualOnWeekday),
            _ => Err(ParseRecurrenceKindError(s.to_string())),
        }
    }
}

/// Weekday parameter for weekday-based kinds, stored as lowercase text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RuleWeekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<RuleWeekday> for Weekday {
    fn from(day: RuleWeekday) -> Self {
        match day {
            RuleWeekday::Monday => Weekday::Mon,
            RuleWeekday::Tuesday => Weekday::Tue,
            RuleWeekday::Wednesday => Weekday::Wed,
            RuleWeekday::Thursday => Weekday::Thu,
            RuleWeekday::Friday => Weekday::Fri,
            RuleWeekday::Saturday => Weekday::Sat,
            RuleWeekday::Sunday => Weekday::Sun,
        }
    }
}

impl From<Weekday> for RuleWeekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => RuleWeekday::Monday,
            Weekday::Tue => RuleWeekday::Tuesday,
            Weekday::Wed => RuleWeekday::Wednesday,
            Weekday::Thu => RuleWeekday::Thursday,
            Weekday::Fri => RuleWeekday::Friday,
            Weekday::Sat => RuleWeekday::Saturday,
            Weekday::Sun => RuleWeekday::Sunday,
        }
    }
}

/// "The Nth weekday of the month". `Last` is the sentinel for the final
/// such weekday regardless of count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrdinalWeek {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Last,
}

impl OrdinalWeek {
    /// 1-based week index, or `None` for `Last`.
    pub fn index(&self) -> Option<u8> {
        match self {
            OrdinalWeek::First => Some(1),
            OrdinalWeek::Second => Some(2),
            OrdinalWeek::Third => Some(3),
            OrdinalWeek::Fourth => Some(4),
            OrdinalWeek::Fifth => Some(5),
            OrdinalWeek::Last => None,
        }
    }
}

/// Declarative description of how often and when a task recurs.
///
/// `day_of_month`, `weekday`, `ordinal` and `month` are interpreted per
/// `kind`; `validate` enforces the kind-specific shape before any expansion
/// runs.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RecurrenceRule {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    /// The owning task.
    #[serde(with = "uuid::serde::compact")]
    pub task_id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub tenant_id: Uuid,
    pub kind: RecurrenceKind,
    /// Calendar date the recurrence grid is anchored to.
    pub start_date: NaiveDate,
    /// Repeat every N units of the kind's period. Always >= 1.
    pub interval: u32,
    pub day_of_month: Option<u8>,
    pub weekday: Option<RuleWeekday>,
    pub ordinal: Option<OrdinalWeek>,
    /// 1-based month, for annual kinds.
    pub month: Option<u8>,
    /// Wall-clock time of day every occurrence is due at, taken from the
    /// owning task's due timestamp when the rule is built.
    pub reference_time: NaiveTime,
    /// Occurrences exist only while true.
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl RecurrenceRule {
    /// Validates the kind-specific parameter shape. Called at create/update
    /// and again before expansion; a rule that fails here never generates.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.interval == 0 {
            return Err(CoreError::InvalidRuleParameter(
                "interval must be at least 1".to_string(),
            ));
        }

        match self.kind {
            RecurrenceKind::Daily | RecurrenceKind::Weekly => Ok(()),
            RecurrenceKind::MonthlyOnDay => {
                Self::check_day_of_month(self.day_of_month, 31)
            }
            RecurrenceKind::MonthlyOnWeekday => self.check_ordinal_weekday(),
            RecurrenceKind::AnnualOnDay => {
                let month = self.check_month()?;
                // Day 29 in February is allowed and leap-clamped; day 30 is not.
                Self::check_day_of_month(
                    self.day_of_month,
                    crate::calendar::days_in_month(2000, u32::from(month)),
                )
            }
            RecurrenceKind::AnnualOnWeekday => {
                self.check_month()?;
                self.check_ordinal_weekday()
            }
        }
    }

    fn check_day_of_month(day: Option<u8>, max: u8) -> Result<(), CoreError> {
        match day {
            Some(d) if (1..=max).contains(&d) => Ok(()),
            Some(d) => Err(CoreError::InvalidRuleParameter(format!(
                "day_of_month {} out of range 1..={}",
                d, max
            ))),
            None => Err(CoreError::InvalidRuleParameter(
                "day_of_month is required for this kind".to_string(),
            )),
        }
    }

    fn check_ordinal_weekday(&self) -> Result<(), CoreError> {
        if self.weekday.is_none() {
            return Err(CoreError::InvalidRuleParameter(
                "weekday is required for this kind".to_string(),
            ));
        }
        if self.ordinal.is_none() {
            return Err(CoreError::InvalidRuleParameter(
                "ordinal is required for this kind".to_string(),
            ));
        }
        Ok(())
    }

    fn check_month(&self) -> Result<u8, CoreError> {
        match self.month {
            Some(m) if (1..=12).contains(&m) => Ok(m),
            Some(m) => Err(CoreError::InvalidRuleParameter(format!(
                "month {} out of range 1..=12",
                m
            ))),
            None => Err(CoreError::InvalidRuleParameter(
                "month is required for this kind".to_string(),
            )),
        }
    }

    /// Weekly rules without an explicit weekday follow the weekday of
    /// `start_date`.
    pub fn effective_weekday(&self) -> Weekday {
        self.weekday
            .map(Weekday::from)
            .unwrap_or_else(|| self.start_date.weekday())
    }
}

/// One concrete future due-instant expanded from a rule. Rows are created
/// only by materialization and never edited in place, only replaced en masse.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleOccurrence {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub rule_id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub task_id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub tenant_id: Uuid,
    /// UTC due instant, serialized with microsecond precision and `Z` suffix.
    #[serde(with = "utc_micros")]
    pub due_at: DateTime<Utc>,
    /// Assignee snapshot taken at generation time.
    pub assigned_user_id: Option<Uuid>,
    pub assigned_profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Snapshot of the owning task and its location, resolved by the CRUD layer.
///
/// The schedule engine never looks tasks or locations up itself; the caller
/// hands it this value on every lifecycle operation.
#[derive(Debug, Clone)]
pub struct OwnerTask {
    pub task_id: Uuid,
    pub tenant_id: Uuid,
    /// Wall-clock due time from the task's due timestamp.
    pub due_time_of_day: NaiveTime,
    /// IANA name of the task location's timezone, when the location has one.
    pub timezone: Option<String>,
    pub assigned_user_id: Option<Uuid>,
    pub assigned_profile_id: Option<Uuid>,
}

/// Data required to create a new recurrence rule.
#[derive(Debug, Clone)]
pub struct NewRuleData {
    pub kind: RecurrenceKind,
    pub start_date: NaiveDate,
    /// Defaults to 1 when `None`.
    pub interval: Option<u32>,
    pub day_of_month: Option<u8>,
    pub weekday: Option<RuleWeekday>,
    pub ordinal: Option<OrdinalWeek>,
    pub month: Option<u8>,
    pub enabled: bool,
}

/// Data for modifying an existing rule. `None` leaves a field untouched;
/// for the optional kind parameters, `Some(None)` clears the field.
#[derive(Debug, Clone, Default)]
pub struct UpdateRuleData {
    pub kind: Option<RecurrenceKind>,
    pub start_date: Option<NaiveDate>,
    pub interval: Option<u32>,
    pub day_of_month: Option<Option<u8>>,
    pub weekday: Option<Option<RuleWeekday>>,
    pub ordinal: Option<Option<OrdinalWeek>>,
    pub month: Option<Option<u8>>,
}

/// One enable/disable transition of a rule, with old/new state and a
/// free-text note.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleAuditEntry {
    #[serde(with = "uuid::serde::compact")]
    pub id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub rule_id: Uuid,
    #[serde(with = "uuid::serde::compact")]
    pub tenant_id: Uuid,
    pub enabled_before: bool,
    pub enabled_after: bool,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Serde helpers for the ISO-8601 UTC output format the schedule-listing
/// endpoints expect: fractional seconds to microsecond precision, `Z` suffix.
pub mod utc_micros {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
