use std::collections::BTreeSet;

use rapport_core::prelude::*;
use rapport_core::steps::{
    AddClientTimelineIndexes, AddTenantCompositeIndexes, UniqueClientEmailPerTherapist,
};
use rapport_mem::{DdlRecord, InMemoryLedger, InMemorySchema};

const SESSIONS_INDEX: &str = "idx_sessions_therapist_date";
const CLIENTS_INDEX: &str = "idx_clients_therapist_email";
const CLIENTS_UNIQUE: &str = "uq_clients_therapist_email";
const NOTES_INDEX: &str = "idx_notes_client_created";
const REFLECTIONS_INDEX: &str = "idx_reflections_client_created";

fn migrator(
    schema: &InMemorySchema,
    ledger: &InMemoryLedger,
) -> Migrator<InMemorySchema, InMemoryLedger> {
    let _ = env_logger::builder().is_test(true).try_init();
    Migrator::new(schema.clone(), ledger.clone())
}

fn ids(steps: &[&'static dyn MigrationStep]) -> Vec<&'static str> {
    steps.iter().map(|s| s.id()).collect()
}

fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Objects that must exist given which steps are recorded as applied.
fn expected_objects(applied: &[&str]) -> BTreeSet<String> {
    let mut objects = BTreeSet::new();
    if applied.contains(&AddTenantCompositeIndexes.id()) {
        objects.insert(SESSIONS_INDEX.to_string());
        objects.insert(CLIENTS_INDEX.to_string());
    }
    if applied.contains(&UniqueClientEmailPerTherapist.id()) {
        objects.insert(CLIENTS_UNIQUE.to_string());
        objects.remove(CLIENTS_INDEX);
    }
    if applied.contains(&AddClientTimelineIndexes.id()) {
        objects.insert(NOTES_INDEX.to_string());
        objects.insert(REFLECTIONS_INDEX.to_string());
    }
    objects
}

async fn assert_ledger_matches_schema(
    migrator: &Migrator<InMemorySchema, InMemoryLedger>,
    schema: &InMemorySchema,
) {
    let applied: Vec<&str> = migrator.applied_ids().await.unwrap().into_iter().collect();
    assert_eq!(
        schema.object_names().await,
        expected_objects(&applied),
        "schema objects disagree with ledger {applied:?}"
    );
}

#[tokio::test]
async fn up_applies_every_step_in_order() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    let applied = migrator.up().await.expect("Should apply steps");

    assert_eq!(applied, ids(rapport_core::steps::ALL));
    assert_eq!(
        schema.object_names().await,
        names(&[SESSIONS_INDEX, CLIENTS_UNIQUE, NOTES_INDEX, REFLECTIONS_INDEX])
    );
    assert_eq!(
        schema.ddl_log().await,
        vec![
            DdlRecord::CreateIndex {
                table: "sessions".into(),
                name: SESSIONS_INDEX.into(),
                columns: vec!["therapistId".into(), "date".into()],
            },
            DdlRecord::CreateIndex {
                table: "clients".into(),
                name: CLIENTS_INDEX.into(),
                columns: vec!["therapistId".into(), "email".into()],
            },
            DdlRecord::AddConstraint {
                table: "clients".into(),
                name: CLIENTS_UNIQUE.into(),
                columns: vec!["therapistId".into(), "email".into()],
            },
            DdlRecord::DropIndex {
                table: "clients".into(),
                name: CLIENTS_INDEX.into(),
            },
            DdlRecord::CreateIndex {
                table: "notes".into(),
                name: NOTES_INDEX.into(),
                columns: vec!["clientId".into(), "createdAt".into()],
            },
            DdlRecord::CreateIndex {
                table: "reflections".into(),
                name: REFLECTIONS_INDEX.into(),
                columns: vec!["clientId".into(), "createdAt".into()],
            },
        ]
    );
}

#[tokio::test]
async fn up_is_idempotent() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    let first = migrator.up().await.expect("Should apply steps");
    assert_eq!(first.len(), 3);
    let statements = schema.ddl_log().await.len();

    let second = migrator.up().await.expect("Should run again");
    assert!(second.is_empty(), "Nothing should be applied twice");

    let third = migrator.up().await.expect("Should run a third time");
    assert!(third.is_empty());

    assert_eq!(ledger.executed().await.unwrap().len(), 3);
    assert_eq!(schema.ddl_log().await.len(), statements);
}

#[tokio::test]
async fn snake_case_columns_produce_the_same_objects() {
    let camel = InMemorySchema::practice_camel_case();
    let snake = InMemorySchema::practice_snake_case();

    migrator(&camel, &InMemoryLedger::new()).up().await.unwrap();
    migrator(&snake, &InMemoryLedger::new()).up().await.unwrap();

    assert_eq!(camel.object_names().await, snake.object_names().await);

    let snake_index = snake.index("sessions", SESSIONS_INDEX).await.unwrap();
    assert_eq!(snake_index.columns, vec!["therapist_id", "date"]);
    let camel_index = camel.index("sessions", SESSIONS_INDEX).await.unwrap();
    assert_eq!(camel_index.columns, vec!["therapistId", "date"]);

    let constraint = snake.constraint("clients", CLIENTS_UNIQUE).await.unwrap();
    assert_eq!(constraint.columns, vec!["therapist_id", "email"]);
}

#[tokio::test]
async fn failed_sub_operation_leaves_no_ledger_entry() {
    let schema = InMemorySchema::practice_snake_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    schema.fail_next_ddl(CLIENTS_INDEX, "lock timeout").await;

    let err = migrator.up().await.expect_err("Step should fail");
    match &err {
        MigrationError::StepFailed {
            step_id,
            direction,
            source: StepError::SubOperations { attempted, failures },
        } => {
            assert_eq!(step_id, AddTenantCompositeIndexes.id());
            assert_eq!(*direction, Direction::Up);
            assert_eq!(*attempted, 2);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].label, format!("ensure index {CLIENTS_INDEX}"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.step_id(), Some(AddTenantCompositeIndexes.id()));

    assert!(ledger.executed().await.unwrap().is_empty());
    assert_eq!(schema.object_names().await, names(&[SESSIONS_INDEX]));
    assert_eq!(
        ids(&migrator.pending().await.unwrap()),
        ids(rapport_core::steps::ALL),
        "Later steps stay pending"
    );

    schema.clear_ddl_log().await;
    migrator.up().await.expect("Re-run should complete");

    let log = schema.ddl_log().await;
    assert_eq!(
        log.first(),
        Some(&DdlRecord::CreateIndex {
            table: "clients".into(),
            name: CLIENTS_INDEX.into(),
            columns: vec!["therapist_id".into(), "email".into()],
        }),
        "Only the missing sub-operation of the failed step runs"
    );
    assert!(
        !log.iter().any(|r| r.object() == SESSIONS_INDEX),
        "The completed sub-operation is not repeated"
    );
    assert_eq!(ledger.executed().await.unwrap().len(), 3);
}

#[tokio::test]
async fn sibling_sub_operations_run_after_a_failure() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    schema.fail_next_ddl(SESSIONS_INDEX, "disk full").await;

    assert!(migrator.up().await.is_err());
    assert_eq!(schema.object_names().await, names(&[CLIENTS_INDEX]));
    assert!(ledger.executed().await.unwrap().is_empty());
}

#[tokio::test]
async fn catalog_failure_is_not_treated_as_absence() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    schema
        .fail_next_catalog_query("sessions", "connection reset by peer")
        .await;

    let err = migrator.up().await.expect_err("Step should fail");
    match err {
        MigrationError::StepFailed {
            source: StepError::SubOperations { failures, .. },
            ..
        } => {
            assert!(matches!(failures[0].error, SchemaError::Catalog { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(
        !schema
            .ddl_log()
            .await
            .iter()
            .any(|r| r.object() == SESSIONS_INDEX),
        "No DDL is issued for an object whose existence is unknown"
    );
    assert!(ledger.executed().await.unwrap().is_empty());
}

#[tokio::test]
async fn crash_before_ledger_write_is_recovered_without_new_ddl() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    ledger.fail_next_record("connection lost").await;

    let err = migrator.up().await.expect_err("Ledger write should fail");
    assert!(matches!(
        err,
        MigrationError::RecordFailed {
            direction: Direction::Up,
            ..
        }
    ));
    assert!(ledger.executed().await.unwrap().is_empty());
    assert_eq!(
        schema.object_names().await,
        names(&[SESSIONS_INDEX, CLIENTS_INDEX])
    );

    schema.clear_ddl_log().await;
    migrator.up().await.expect("Re-run should record the step");

    let log = schema.ddl_log().await;
    assert!(
        !log.iter().any(|r| matches!(
            r,
            DdlRecord::CreateIndex { name, .. } if name == SESSIONS_INDEX || name == CLIENTS_INDEX
        )),
        "Existing objects are not re-created: {log:?}"
    );
    assert_eq!(ledger.executed().await.unwrap().len(), 3);
    assert_ledger_matches_schema(&migrator, &schema).await;
}

#[tokio::test]
async fn unresolvable_column_is_skipped_not_fatal() {
    let schema = InMemorySchema::builder()
        .table("sessions", &["id", "therapistId", "date"])
        .table("clients", &["id", "therapistId", "email"])
        .table("notes", &["id", "clientId", "createdAt"])
        .table("reflections", &["id", "client_ref", "inserted"])
        .build();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    let applied = migrator.up().await.expect("Drift should not fail the run");

    assert_eq!(applied.len(), 3);
    assert!(schema.index("notes", NOTES_INDEX).await.is_some());
    assert!(schema.index("reflections", REFLECTIONS_INDEX).await.is_none());
}

#[tokio::test]
async fn missing_table_is_skipped_not_fatal() {
    let schema = InMemorySchema::builder()
        .table("sessions", &["id", "therapist_id", "session_date"])
        .table("clients", &["id", "user_id", "email_address"])
        .build();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    migrator.up().await.expect("Missing tables should not fail the run");

    assert_eq!(
        schema.object_names().await,
        names(&[SESSIONS_INDEX, CLIENTS_UNIQUE])
    );
    let unique = schema.constraint("clients", CLIENTS_UNIQUE).await.unwrap();
    assert_eq!(unique.columns, vec!["user_id", "email_address"]);
}

#[tokio::test]
async fn pre_existing_index_is_accepted() {
    let schema = InMemorySchema::builder()
        .table("sessions", &["id", "therapistId", "date"])
        .index("sessions", SESSIONS_INDEX, &["therapistId", "date"])
        .table("clients", &["id", "therapistId", "email"])
        .table("notes", &["id", "clientId", "createdAt"])
        .table("reflections", &["id", "clientId", "createdAt"])
        .build();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    migrator.up().await.expect("Existing objects are success");

    assert!(
        !schema
            .ddl_log()
            .await
            .iter()
            .any(|r| r.object() == SESSIONS_INDEX)
    );
    assert_ledger_matches_schema(&migrator, &schema).await;
}

#[tokio::test]
async fn down_reverts_the_most_recent_step() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);
    migrator.up().await.unwrap();

    let reverted = migrator.down(1).await.expect("Should revert");

    assert_eq!(reverted, vec![AddClientTimelineIndexes.id()]);
    assert_eq!(
        ids(&migrator.pending().await.unwrap()),
        vec![AddClientTimelineIndexes.id()]
    );
    assert_eq!(
        schema.object_names().await,
        names(&[SESSIONS_INDEX, CLIENTS_UNIQUE])
    );
}

#[tokio::test]
async fn down_of_the_promotion_restores_the_legacy_index() {
    let schema = InMemorySchema::practice_snake_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);
    migrator.up().await.unwrap();

    let reverted = migrator.down(2).await.expect("Should revert two steps");

    assert_eq!(
        reverted,
        vec![
            AddClientTimelineIndexes.id(),
            UniqueClientEmailPerTherapist.id()
        ]
    );
    assert_eq!(
        schema.object_names().await,
        names(&[SESSIONS_INDEX, CLIENTS_INDEX])
    );
    let restored = schema.index("clients", CLIENTS_INDEX).await.unwrap();
    assert_eq!(restored.columns, vec!["therapist_id", "email"]);
    assert!(!restored.unique);
}

#[tokio::test]
async fn up_down_up_round_trip_restores_the_same_objects() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    migrator.up().await.unwrap();
    let after_up = schema.object_names().await;

    migrator.down(1).await.unwrap();
    assert_ne!(schema.object_names().await, after_up);

    let reapplied = migrator.up().await.unwrap();
    assert_eq!(reapplied, vec![AddClientTimelineIndexes.id()]);
    assert_eq!(schema.object_names().await, after_up);
}

#[tokio::test]
async fn single_step_round_trip() {
    let schema = InMemorySchema::practice_snake_case();
    let ledger = InMemoryLedger::new();
    let migrator = Migrator::with_steps(
        schema.clone(),
        ledger.clone(),
        vec![&AddTenantCompositeIndexes as &'static dyn MigrationStep],
    );

    migrator.up().await.unwrap();
    let once = schema.object_names().await;
    migrator.down(1).await.unwrap();
    assert!(schema.object_names().await.is_empty());
    migrator.up().await.unwrap();

    assert_eq!(schema.object_names().await, once);
    assert_eq!(once, names(&[SESSIONS_INDEX, CLIENTS_INDEX]));
}

#[tokio::test]
async fn down_beyond_the_ledger_reverts_everything() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);
    migrator.up().await.unwrap();

    let reverted = migrator.down(10).await.unwrap();

    assert_eq!(reverted.len(), 3);
    assert!(schema.object_names().await.is_empty());
    assert!(migrator.executed().await.unwrap().is_empty());
    assert!(migrator.down(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_down_keeps_the_ledger_entry() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);
    migrator.up().await.unwrap();

    schema.fail_next_ddl(NOTES_INDEX, "lock timeout").await;

    let err = migrator.down(1).await.expect_err("Revert should fail");
    assert!(matches!(
        err,
        MigrationError::StepFailed {
            direction: Direction::Down,
            ..
        }
    ));
    assert_eq!(ledger.executed().await.unwrap().len(), 3);
    assert!(schema.index("reflections", REFLECTIONS_INDEX).await.is_none());

    migrator.down(1).await.expect("Retry should finish the revert");
    assert_eq!(ledger.executed().await.unwrap().len(), 2);
    assert_ledger_matches_schema(&migrator, &schema).await;
}

#[tokio::test]
async fn failed_erase_restores_the_reverted_objects() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);
    migrator.up().await.unwrap();

    ledger.fail_next_erase("connection lost").await;

    let err = migrator.down(1).await.expect_err("Ledger erase should fail");
    assert!(matches!(
        err,
        MigrationError::RecordFailed {
            direction: Direction::Down,
            ref step_id,
            ..
        } if step_id == AddClientTimelineIndexes.id()
    ));
    assert_eq!(ledger.executed().await.unwrap().len(), 3);
    assert!(schema.index("notes", NOTES_INDEX).await.is_some());
    assert!(schema.index("reflections", REFLECTIONS_INDEX).await.is_some());
    assert_ledger_matches_schema(&migrator, &schema).await;

    assert!(migrator.up().await.unwrap().is_empty());
    let reverted = migrator.down(1).await.expect("Retry should finish the revert");
    assert_eq!(reverted, vec![AddClientTimelineIndexes.id()]);
    assert_ledger_matches_schema(&migrator, &schema).await;
}

/// Applies only the tenant index step, leaving the legacy client index in place.
async fn apply_tenant_indexes(schema: &InMemorySchema, ledger: &InMemoryLedger) {
    Migrator::with_steps(
        schema.clone(),
        ledger.clone(),
        vec![&AddTenantCompositeIndexes as &'static dyn MigrationStep],
    )
    .up()
    .await
    .unwrap();
}

#[tokio::test]
async fn failed_constraint_keeps_the_legacy_index() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    apply_tenant_indexes(&schema, &ledger).await;
    let migrator = migrator(&schema, &ledger);

    schema.fail_next_ddl(CLIENTS_UNIQUE, "duplicate key value").await;

    let err = migrator.up().await.expect_err("Promotion should fail");
    assert!(matches!(
        err,
        MigrationError::StepFailed {
            direction: Direction::Up,
            ref step_id,
            ..
        } if step_id == UniqueClientEmailPerTherapist.id()
    ));
    assert!(schema.index("clients", CLIENTS_INDEX).await.is_some());
    assert!(schema.constraint("clients", CLIENTS_UNIQUE).await.is_none());
    assert_eq!(
        ledger.step_ids().await,
        vec![AddTenantCompositeIndexes.id()]
    );
    assert!(schema.index("notes", NOTES_INDEX).await.is_none());
    assert_ledger_matches_schema(&migrator, &schema).await;
}

#[tokio::test]
async fn failed_legacy_drop_is_finished_by_the_next_up() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    apply_tenant_indexes(&schema, &ledger).await;
    let migrator = migrator(&schema, &ledger);

    schema.fail_next_ddl(CLIENTS_INDEX, "lock timeout").await;

    migrator.up().await.expect_err("Legacy drop should fail");
    assert!(schema.constraint("clients", CLIENTS_UNIQUE).await.is_some());
    assert!(schema.index("clients", CLIENTS_INDEX).await.is_some());
    assert_eq!(
        ledger.step_ids().await,
        vec![AddTenantCompositeIndexes.id()]
    );

    schema.clear_ddl_log().await;
    let applied = migrator.up().await.expect("Re-run should finish the promotion");

    assert_eq!(
        applied,
        vec![
            UniqueClientEmailPerTherapist.id(),
            AddClientTimelineIndexes.id()
        ]
    );
    let log = schema.ddl_log().await;
    assert!(
        !log.iter().any(|r| matches!(r, DdlRecord::AddConstraint { .. })),
        "The constraint is not added twice: {log:?}"
    );
    assert_eq!(
        log[0],
        DdlRecord::DropIndex {
            table: "clients".into(),
            name: CLIENTS_INDEX.into(),
        }
    );
    assert_ledger_matches_schema(&migrator, &schema).await;
}

#[tokio::test]
async fn failed_restore_keeps_the_constraint() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);
    migrator.up().await.unwrap();
    migrator.down(1).await.unwrap();

    schema.fail_next_ddl(CLIENTS_INDEX, "out of disk").await;

    let err = migrator.down(1).await.expect_err("Restore should fail");
    assert!(matches!(
        err,
        MigrationError::StepFailed {
            direction: Direction::Down,
            ref step_id,
            ..
        } if step_id == UniqueClientEmailPerTherapist.id()
    ));
    assert!(schema.constraint("clients", CLIENTS_UNIQUE).await.is_some());
    assert!(schema.index("clients", CLIENTS_INDEX).await.is_none());
    assert_eq!(
        ledger.step_ids().await,
        vec![
            AddTenantCompositeIndexes.id(),
            UniqueClientEmailPerTherapist.id()
        ]
    );
    assert_ledger_matches_schema(&migrator, &schema).await;
}

#[tokio::test]
async fn index_name_taken_on_another_table_is_accepted() {
    let schema = InMemorySchema::builder()
        .table("sessions", &["id", "therapistId", "date"])
        .index("sessions", NOTES_INDEX, &["therapistId", "date"])
        .table("clients", &["id", "therapistId", "email"])
        .table("notes", &["id", "clientId", "createdAt"])
        .table("reflections", &["id", "clientId", "createdAt"])
        .build();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    let applied = migrator.up().await.expect("A taken name is not a failure");

    assert_eq!(applied.len(), 3);
    assert!(schema.index("notes", NOTES_INDEX).await.is_none());
    assert!(schema.index("sessions", NOTES_INDEX).await.is_some());
    assert!(
        !schema
            .ddl_log()
            .await
            .iter()
            .any(|r| r.object() == NOTES_INDEX)
    );
}

#[tokio::test]
async fn ledger_and_schema_agree_throughout() {
    let schema = InMemorySchema::practice_snake_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    assert_ledger_matches_schema(&migrator, &schema).await;
    migrator.up().await.unwrap();
    assert_ledger_matches_schema(&migrator, &schema).await;
    for _ in 0..3 {
        migrator.down(1).await.unwrap();
        assert_ledger_matches_schema(&migrator, &schema).await;
    }
    migrator.up().await.unwrap();
    assert_ledger_matches_schema(&migrator, &schema).await;
}

#[tokio::test]
async fn pending_and_executed_reports() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    let migrator = migrator(&schema, &ledger);

    assert_eq!(
        ids(&migrator.pending().await.unwrap()),
        ids(rapport_core::steps::ALL)
    );
    assert!(migrator.executed().await.unwrap().is_empty());
    assert!(
        !ledger.is_provisioned().await,
        "Reports do not provision the ledger"
    );

    migrator.up().await.unwrap();
    assert!(ledger.is_provisioned().await);

    assert!(migrator.pending().await.unwrap().is_empty());
    let executed = migrator.executed().await.unwrap();
    let executed_ids: Vec<&str> = executed.iter().map(|e| e.step_id.as_str()).collect();
    assert_eq!(executed_ids, ids(rapport_core::steps::ALL));
    for (entry, step) in executed.iter().zip(rapport_core::steps::ALL) {
        assert_eq!(entry.checksum, step.checksum());
    }
}

#[tokio::test]
async fn checksum_mismatch_aborts_up() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    ledger
        .insert(AddTenantCompositeIndexes.id(), "edited-after-release")
        .await;
    let migrator = migrator(&schema, &ledger);

    let err = migrator.up().await.expect_err("Checksum should not match");

    match err {
        MigrationError::ChecksumMismatch {
            step_id,
            expected,
            found,
        } => {
            assert_eq!(step_id, AddTenantCompositeIndexes.id());
            assert_eq!(expected, "edited-after-release");
            assert_eq!(found, AddTenantCompositeIndexes.checksum());
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(schema.ddl_log().await.is_empty());
}

#[tokio::test]
async fn unknown_recorded_step_cannot_be_reverted() {
    let schema = InMemorySchema::practice_camel_case();
    let ledger = InMemoryLedger::new();
    ledger
        .insert("20990101000000-from-a-newer-build", "whatever")
        .await;
    let migrator = migrator(&schema, &ledger);

    let applied = migrator.up().await.expect("Unknown entries are ignored by up");
    assert_eq!(applied.len(), 3);

    let err = migrator.down(1).await.expect_err("Cannot revert an unknown step");
    assert!(matches!(
        err,
        MigrationError::UnknownStep { ref step_id } if step_id == "20990101000000-from-a-newer-build"
    ));
    assert_eq!(ledger.executed().await.unwrap().len(), 4);
}
