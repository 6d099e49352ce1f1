//! # Cadence Core Library
//!
//! The recurrence schedule expansion engine behind the Cadence task backend:
//! given a recurrence rule attached to a task, compute a deterministic,
//! timezone-correct window of future due instants and materialize them as
//! persisted occurrence records.
//!
//! ## Features
//!
//! - **Six recurrence kinds**: daily, weekly, monthly by day or weekday,
//!   annual by day or weekday, each an exhaustively-matched strategy
//! - **Timezone Awareness**: full IANA timezone support; wall-clock time of
//!   day is preserved across DST transitions
//! - **Atomic Materialization**: a rule's occurrence set is replaced
//!   wholesale under one transaction, never partially written
//! - **Multi-Tenancy**: rules, occurrences and audit entries are tenant
//!   scoped
//! - **Deterministic Generation**: the reference instant is an injected
//!   parameter, never a hidden clock
//!
//! ## Core Modules
//!
//! - [`db`]: Database connection and migration management
//! - [`models`]: Core data structures and transfer objects
//! - [`calendar`]: Pure date arithmetic (clamping, ordinal weekdays)
//! - [`recurrence`]: The six date-expansion strategies
//! - [`timezone`]: Wall-clock to UTC projection
//! - [`schedule`]: Occurrence window generation
//! - [`repository`]: Data access layer with Repository pattern
//! - [`error`]: Error types with context
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     models::{NewRuleData, OwnerTask, RecurrenceKind},
//!     repository::{RuleRepository, SqliteRepository},
//!     schedule::ScheduleBuilder,
//! };
//! use chrono::{NaiveDate, NaiveTime};
//! use uuid::Uuid;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cadence_core::error::CoreError> {
//!     let pool = db::establish_connection("schedules.db").await?;
//!     let repo = SqliteRepository::new(pool, ScheduleBuilder::with_defaults());
//!
//!     let owner = OwnerTask {
//!         task_id: Uuid::now_v7(),
//!         tenant_id: Uuid::now_v7(),
//!         due_time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
//!         timezone: Some("America/New_York".to_string()),
//!         assigned_user_id: None,
//!         assigned_profile_id: None,
//!     };
//!
//!     let rule = repo
//!         .create_rule(
//!             NewRuleData {
//!                 kind: RecurrenceKind::Daily,
//!                 start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
//!                 interval: None,
//!                 day_of_month: None,
//!                 weekday: None,
//!                 ordinal: None,
//!                 month: None,
//!                 enabled: true,
//!             },
//!             &owner,
//!         )
//!         .await?;
//!     println!("Created rule {}", rule.id);
//!
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod schedule;
pub mod timezone;
