use cadence_core::db::establish_connection;
use cadence_core::error::CoreError;
use cadence_core::models::{
    NewRuleData, OrdinalWeek, OwnerTask, RecurrenceKind, RuleWeekday, UpdateRuleData,
};
use cadence_core::repository::{
    AuditRepository, OccurrenceRepository, RuleRepository, SqliteRepository,
};
use cadence_core::schedule::ScheduleBuilder;
use cadence_core::timezone::resolve_timezone;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use tempfile::TempDir;
use uuid::Uuid;

/// Helper function to create a test database
async fn setup_test_db() -> (SqliteRepository, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = temp_dir.path().join("test.db");

    let pool = establish_connection(&db_path.to_string_lossy())
        .await
        .expect("Failed to establish test database connection");

    let repository = SqliteRepository::new(pool, ScheduleBuilder::with_defaults());

    (repository, temp_dir)
}

fn test_owner() -> OwnerTask {
    OwnerTask {
        task_id: Uuid::now_v7(),
        tenant_id: Uuid::now_v7(),
        due_time_of_day: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        timezone: Some("America/New_York".to_string()),
        assigned_user_id: Some(Uuid::now_v7()),
        assigned_profile_id: Some(Uuid::now_v7()),
    }
}

fn daily_rule_data(enabled: bool) -> NewRuleData {
    NewRuleData {
        kind: RecurrenceKind::Daily,
        start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        interval: None,
        day_of_month: None,
        weekday: None,
        ordinal: None,
        month: None,
        enabled,
    }
}

#[tokio::test]
async fn test_create_enabled_rule_materializes_full_window() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo
        .create_rule(daily_rule_data(true), &owner)
        .await
        .expect("Failed to create rule");

    let occurrences = repo
        .find_for_rule(rule.id)
        .await
        .expect("Failed to list occurrences");

    assert_eq!(occurrences.len(), 60);
    assert!(occurrences.windows(2).all(|w| w[0].due_at < w[1].due_at));

    // Every occurrence reads 09:00:00 in the task's location timezone.
    let tz = resolve_timezone("America/New_York").unwrap();
    assert!(occurrences.iter().all(|o| {
        let local = o.due_at.with_timezone(&tz).time();
        local.hour() == 9 && local.minute() == 0 && local.second() == 0
    }));

    // Assignees were snapshotted from the owner.
    assert!(occurrences
        .iter()
        .all(|o| o.assigned_user_id == owner.assigned_user_id
            && o.assigned_profile_id == owner.assigned_profile_id
            && o.task_id == owner.task_id
            && o.tenant_id == owner.tenant_id));
}

#[tokio::test]
async fn test_create_disabled_rule_materializes_nothing() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo
        .create_rule(daily_rule_data(false), &owner)
        .await
        .expect("Failed to create rule");

    let occurrences = repo.find_for_rule(rule.id).await.unwrap();
    assert!(occurrences.is_empty());
}

#[tokio::test]
async fn test_invalid_parameters_rejected_before_any_write() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let data = NewRuleData {
        kind: RecurrenceKind::MonthlyOnDay,
        day_of_month: None, // required for this kind
        ..daily_rule_data(true)
    };

    let result = repo.create_rule(data, &owner).await;
    assert!(matches!(result, Err(CoreError::InvalidRuleParameter(_))));

    let rules = repo
        .find_rules_for_task(owner.task_id, owner.tenant_id)
        .await
        .unwrap();
    assert!(rules.is_empty());
}

#[tokio::test]
async fn test_toggle_semantics_regenerate_fresh_set() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    let original: Vec<Uuid> = repo
        .find_for_rule(rule.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();
    assert_eq!(original.len(), 60);

    // Disabling removes all occurrences without regenerating.
    let disabled = repo
        .set_enabled(rule.id, false, &owner, Some("paused for audit".to_string()))
        .await
        .unwrap();
    assert!(!disabled.enabled);
    assert!(repo.find_for_rule(rule.id).await.unwrap().is_empty());

    // Re-enabling produces a complete fresh set with new identifiers.
    let enabled = repo
        .set_enabled(rule.id, true, &owner, Some("resumed".to_string()))
        .await
        .unwrap();
    assert!(enabled.enabled);

    let regenerated = repo.find_for_rule(rule.id).await.unwrap();
    assert_eq!(regenerated.len(), 60);
    assert!(regenerated.iter().all(|o| !original.contains(&o.id)));

    // Regeneration re-anchors at the rule's start date.
    let tz = resolve_timezone("America/New_York").unwrap();
    assert_eq!(
        regenerated[0].due_at.with_timezone(&tz).date_naive(),
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    );
}

#[tokio::test]
async fn test_audit_trail_records_transitions() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();

    // A no-op transition is not audited.
    repo.set_enabled(rule.id, true, &owner, None).await.unwrap();
    assert!(repo.find_audit_for_rule(rule.id).await.unwrap().is_empty());

    repo.set_enabled(rule.id, false, &owner, Some("seasonal pause".to_string()))
        .await
        .unwrap();
    repo.set_enabled(rule.id, true, &owner, None).await.unwrap();

    let entries = repo.find_audit_for_rule(rule.id).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].enabled_before && !entries[0].enabled_after);
    assert_eq!(entries[0].note.as_deref(), Some("seasonal pause"));
    assert!(!entries[1].enabled_before && entries[1].enabled_after);
    assert_eq!(entries[1].tenant_id, owner.tenant_id);
}

#[tokio::test]
async fn test_update_rule_regenerates_occurrences() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    let before: Vec<Uuid> = repo
        .find_for_rule(rule.id)
        .await
        .unwrap()
        .iter()
        .map(|o| o.id)
        .collect();

    let updated = repo
        .update_rule(
            rule.id,
            UpdateRuleData {
                kind: Some(RecurrenceKind::Weekly),
                weekday: Some(Some(RuleWeekday::Friday)),
                interval: Some(2),
                ..Default::default()
            },
            &owner,
        )
        .await
        .unwrap();
    assert_eq!(updated.kind, RecurrenceKind::Weekly);

    let after = repo.find_for_rule(rule.id).await.unwrap();
    assert_eq!(after.len(), 60);
    assert!(after.iter().all(|o| !before.contains(&o.id)));

    let tz = resolve_timezone("America/New_York").unwrap();
    assert!(after
        .iter()
        .all(|o| o.due_at.with_timezone(&tz).date_naive().weekday() == Weekday::Fri));
}

#[tokio::test]
async fn test_update_to_invalid_shape_leaves_state_untouched() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    let before = repo.find_for_rule(rule.id).await.unwrap();

    // Switching kind without the parameters the new kind requires.
    let result = repo
        .update_rule(
            rule.id,
            UpdateRuleData {
                kind: Some(RecurrenceKind::AnnualOnWeekday),
                ..Default::default()
            },
            &owner,
        )
        .await;
    assert!(matches!(result, Err(CoreError::InvalidRuleParameter(_))));

    let current = repo.find_rule_by_id(rule.id).await.unwrap().unwrap();
    assert_eq!(current.kind, RecurrenceKind::Daily);

    let after = repo.find_for_rule(rule.id).await.unwrap();
    let ids = |v: &[cadence_core::models::ScheduleOccurrence]| {
        v.iter().map(|o| o.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&before), ids(&after));
}

#[tokio::test]
async fn test_replace_failure_preserves_prior_set() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    let before = repo.find_for_rule(rule.id).await.unwrap();

    // A duplicated primary key makes the insert phase fail mid-way.
    let mut broken = before.clone();
    let mut dup = broken[0].clone();
    dup.due_at = dup.due_at + chrono::Duration::days(200);
    broken.push(dup);
    for occurrence in &mut broken {
        // Fresh ids for all but the deliberate duplicate.
        occurrence.id = Uuid::now_v7();
    }
    let clash_id = broken[5].id;
    broken[6].id = clash_id;

    let result = repo.replace_for_rule(rule.id, broken).await;
    assert!(matches!(result, Err(CoreError::Materialization(_))));

    // The previously persisted set is unchanged.
    let after = repo.find_for_rule(rule.id).await.unwrap();
    assert_eq!(
        before.iter().map(|o| o.id).collect::<Vec<_>>(),
        after.iter().map(|o| o.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_replace_rejects_foreign_occurrences() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    let mut occurrences = repo.find_for_rule(rule.id).await.unwrap();
    for occurrence in &mut occurrences {
        occurrence.id = Uuid::now_v7();
    }
    occurrences[0].rule_id = Uuid::now_v7();

    let result = repo.replace_for_rule(rule.id, occurrences).await;
    assert!(matches!(result, Err(CoreError::Materialization(_))));
}

#[tokio::test]
async fn test_replace_is_idempotent_over_instants() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    let first = repo.find_for_rule(rule.id).await.unwrap();

    // A second replace with an equivalent freshly-built list (new ids, same
    // instants) yields the same persisted schedule.
    let mut rebuilt = first.clone();
    for occurrence in &mut rebuilt {
        occurrence.id = Uuid::now_v7();
    }
    let count = repo.replace_for_rule(rule.id, rebuilt).await.unwrap();
    assert_eq!(count, 60);

    let second = repo.find_for_rule(rule.id).await.unwrap();
    assert_eq!(
        first.iter().map(|o| o.due_at).collect::<Vec<_>>(),
        second.iter().map(|o| o.due_at).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_replace_unknown_rule_fails() {
    let (repo, _temp_dir) = setup_test_db().await;

    let result = repo.replace_for_rule(Uuid::now_v7(), vec![]).await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_rule_cascades_soft_deletes() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    repo.set_enabled(rule.id, false, &owner, None).await.unwrap();
    repo.set_enabled(rule.id, true, &owner, None).await.unwrap();

    repo.delete_rule(rule.id).await.unwrap();

    assert!(repo.find_rule_by_id(rule.id).await.unwrap().is_none());
    assert!(repo.find_for_rule(rule.id).await.unwrap().is_empty());
    assert!(repo.find_audit_for_rule(rule.id).await.unwrap().is_empty());

    let result = repo.delete_rule(rule.id).await;
    assert!(matches!(result, Err(CoreError::NotFound(_))));
}

#[tokio::test]
async fn test_tenant_scoping_on_reads() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();

    let other_tenant = Uuid::now_v7();
    assert!(repo
        .find_rules_for_task(owner.task_id, other_tenant)
        .await
        .unwrap()
        .is_empty());
    assert!(repo
        .find_for_task(owner.task_id, other_tenant)
        .await
        .unwrap()
        .is_empty());

    let scoped = repo
        .find_for_task(owner.task_id, owner.tenant_id)
        .await
        .unwrap();
    assert_eq!(scoped.len(), 60);
    assert_eq!(
        repo.find_rules_for_task(owner.task_id, owner.tenant_id)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(scoped.iter().all(|o| o.rule_id == rule.id));
}

#[tokio::test]
async fn test_monthly_on_weekday_round_trip() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    let data = NewRuleData {
        kind: RecurrenceKind::MonthlyOnWeekday,
        weekday: Some(RuleWeekday::Tuesday),
        ordinal: Some(OrdinalWeek::Second),
        ..daily_rule_data(true)
    };

    let rule = repo.create_rule(data, &owner).await.unwrap();
    let fetched = repo.find_rule_by_id(rule.id).await.unwrap().unwrap();
    assert_eq!(fetched.kind, RecurrenceKind::MonthlyOnWeekday);
    assert_eq!(fetched.weekday, Some(RuleWeekday::Tuesday));
    assert_eq!(fetched.ordinal, Some(OrdinalWeek::Second));
    assert_eq!(fetched.reference_time, owner.due_time_of_day);

    let occurrences = repo.find_for_rule(rule.id).await.unwrap();
    assert_eq!(occurrences.len(), 60);
    let tz = resolve_timezone("America/New_York").unwrap();
    assert!(occurrences
        .iter()
        .all(|o| o.due_at.with_timezone(&tz).date_naive().weekday() == Weekday::Tue));
}

#[tokio::test]
async fn test_rules_created_after_epoch_anchor_at_now() {
    let (repo, _temp_dir) = setup_test_db().await;
    let owner = test_owner();

    // First-time build of a rule whose start date is long past: the window
    // begins at the current date, not in 2024.
    let rule = repo.create_rule(daily_rule_data(true), &owner).await.unwrap();
    let occurrences = repo.find_for_rule(rule.id).await.unwrap();

    let tz = resolve_timezone("America/New_York").unwrap();
    let today = Utc::now().with_timezone(&tz).date_naive();
    assert_eq!(occurrences[0].due_at.with_timezone(&tz).date_naive(), today);
}
