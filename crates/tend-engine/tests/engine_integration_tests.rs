//! End-to-end tests for promotion and orphan repair against a real
//! temporary vault.

use std::sync::Arc;
use tend_config::VaultConfig;
use tend_core::lifecycle::RejectReason;
use tend_core::{DirRole, NoteId, NoteStatus, NoteType, VaultLayout};
use tend_engine::{
    BatchOptions, ItemOutcome, OrphanDetector, OrphanKind, PromotionEngine, RepairOutcome,
    SkipReason,
};
use tend_store::{AtomicFileStore, VaultScanner};
use tokio_util::sync::CancellationToken;

struct Vault {
    _tmp: tempfile::TempDir,
    layout: Arc<VaultLayout>,
    store: Arc<AtomicFileStore>,
    engine: Arc<PromotionEngine>,
    detector: OrphanDetector,
}

async fn vault() -> Vault {
    let tmp = tempfile::tempdir().unwrap();
    let config = VaultConfig::with_root(tmp.path());
    let layout = Arc::new(VaultLayout::from_config(&config));
    for (_, dir) in layout.tracked_dirs() {
        tokio::fs::create_dir_all(dir).await.unwrap();
    }
    let store = Arc::new(AtomicFileStore::new(Arc::clone(&layout)));
    let scanner = VaultScanner::new((*layout).clone(), config.scan.clone());
    let engine = Arc::new(PromotionEngine::new(
        Arc::clone(&store),
        Arc::clone(&layout),
        scanner.clone(),
        config.promotion.threshold,
    ));
    let detector = OrphanDetector::new(Arc::clone(&engine), scanner);
    Vault {
        _tmp: tmp,
        layout,
        store,
        engine,
        detector,
    }
}

async fn write_note(vault: &Vault, role: DirRole, id: &str, header: &str, body: &str) {
    let path = vault.layout.note_path(role, &NoteId::from(id));
    let content = format!("---\n{header}---\n{body}");
    tokio::fs::write(&path, content).await.unwrap();
}

/// The location invariant: status and physical directory agree for every
/// note in the vault.
async fn assert_invariant(vault: &Vault) {
    let scanner = VaultScanner::new((*vault.layout).clone(), Default::default());
    for scanned in scanner.scan() {
        let record = vault
            .store
            .load_at(&scanned.id, &scanned.path)
            .await
            .unwrap();
        if let Ok(expected) = vault
            .layout
            .expected_dir(record.status, record.note_type)
        {
            assert_eq!(
                scanned.path.parent().unwrap(),
                expected,
                "note {} with status {} sits in the wrong directory",
                scanned.id,
                record.status
            );
        }
    }
}

#[tokio::test]
async fn scenario_a_high_scoring_literature_note_is_promoted() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Inbox,
        "paper",
        "status: inbox\ntype: literature\nquality_score: 0.85\n",
        "notes\n",
    )
    .await;

    let result = vault
        .engine
        .auto_promote(BatchOptions::default(), &CancellationToken::new())
        .await;

    assert_eq!(result.promoted.len(), 1);
    let expected = vault
        .layout
        .note_path(DirRole::Literature, &NoteId::from("paper"));
    assert_eq!(result.promoted[0].1, expected);
    assert!(expected.is_file());

    let record = vault
        .store
        .load_at(&NoteId::from("paper"), &expected)
        .await
        .unwrap();
    assert_eq!(record.status, NoteStatus::Promoted);
    assert!(record.promoted_at.is_some());
    assert_invariant(&vault).await;
}

#[tokio::test]
async fn mark_processed_is_a_metadata_only_transition() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Fleeting,
        "done",
        "status: promoted\ntype: fleeting\nquality_score: 0.9\n",
        "body\n",
    )
    .await;
    let id = NoteId::from("done");
    let path = vault.layout.note_path(DirRole::Fleeting, &id);

    let result = vault.engine.mark_processed(&id, false).await.unwrap();

    assert_eq!(
        result.outcome,
        ItemOutcome::Promoted {
            resulting_path: path.clone()
        }
    );
    let record = vault.store.load_at(&id, &path).await.unwrap();
    assert_eq!(record.status, NoteStatus::Processed);
    assert!(record.processed_at.is_some());
    assert_invariant(&vault).await;

    // Processed is terminal; a second call is rejected, not repeated.
    let again = vault.engine.mark_processed(&id, false).await.unwrap();
    assert_eq!(
        again.outcome,
        ItemOutcome::Rejected {
            reason: RejectReason::AlreadyTerminal
        }
    );
}

#[tokio::test]
async fn scenario_b_below_threshold_note_is_skipped_untouched() {
    let vault = vault().await;
    let header = "status: inbox\ntype: literature\nquality_score: 0.5\n";
    write_note(&vault, DirRole::Inbox, "meh", header, "body\n").await;
    let inbox_path = vault.layout.note_path(DirRole::Inbox, &NoteId::from("meh"));
    let before = tokio::fs::read_to_string(&inbox_path).await.unwrap();

    let result = vault
        .engine
        .auto_promote(BatchOptions::default(), &CancellationToken::new())
        .await;

    assert!(result.promoted.is_empty());
    assert_eq!(result.skipped.len(), 1);
    assert!(matches!(
        result.skipped[0].1,
        SkipReason::Rejected(RejectReason::BelowThreshold { .. })
    ));
    assert_eq!(
        tokio::fs::read_to_string(&inbox_path).await.unwrap(),
        before,
        "a skipped note must be untouched"
    );
}

#[tokio::test]
async fn scenario_c_status_ahead_of_location_is_repaired_via_engine() {
    let vault = vault().await;
    // Status says promoted but the file still sits in the inbox: the exact
    // shape of the historical decoupling bug.
    write_note(
        &vault,
        DirRole::Inbox,
        "stray",
        "status: promoted\ntype: fleeting\nquality_score: 0.9\n",
        "body\n",
    )
    .await;

    let reports = vault.detector.scan().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, OrphanKind::StatusAheadOfLocation);

    let result = vault
        .detector
        .repair(reports, false, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.repaired_count(), 1);
    assert!(result.snapshot.is_some(), "repair takes a vault snapshot");

    let fixed = vault
        .layout
        .note_path(DirRole::Fleeting, &NoteId::from("stray"));
    assert!(fixed.is_file());
    assert_invariant(&vault).await;
    assert!(vault.detector.scan().await.is_empty());
}

#[tokio::test]
async fn location_ahead_of_status_gets_status_recomputed() {
    let vault = vault().await;
    // File already in its type directory, status never updated.
    write_note(
        &vault,
        DirRole::Literature,
        "moved",
        "status: inbox\ntype: literature\nquality_score: 0.2\n",
        "body\n",
    )
    .await;

    let reports = vault.detector.scan().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, OrphanKind::LocationAheadOfStatus);

    vault
        .detector
        .repair(reports, false, &CancellationToken::new())
        .await
        .unwrap();

    let path = vault
        .layout
        .note_path(DirRole::Literature, &NoteId::from("moved"));
    let record = vault
        .store
        .load_at(&NoteId::from("moved"), &path)
        .await
        .unwrap();
    assert_eq!(record.status, NoteStatus::Promoted);
    assert_invariant(&vault).await;
}

#[tokio::test]
async fn unsupported_type_is_reported_not_silently_skipped() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Inbox,
        "mystery",
        "status: promoted\ntype: unknown\n",
        "body\n",
    )
    .await;

    let reports = vault.detector.scan().await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].kind, OrphanKind::UnsupportedType);

    let result = vault
        .detector
        .repair(reports, false, &CancellationToken::new())
        .await
        .unwrap();
    assert!(matches!(result.outcomes[0].1, RepairOutcome::Unsupported));
    // No repairable orphans, so no snapshot was needed.
    assert!(result.snapshot.is_none());
}

#[tokio::test]
async fn promote_one_is_idempotent() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Inbox,
        "once",
        "status: inbox\ntype: permanent\nquality_score: 0.95\n",
        "body\n",
    )
    .await;

    let id = NoteId::from("once");
    let first = vault.engine.promote_one(&id, false).await.unwrap();
    let ItemOutcome::Promoted { resulting_path } = &first.outcome else {
        panic!("first call must promote, got {:?}", first.outcome);
    };

    let second = vault.engine.promote_one(&id, false).await.unwrap();
    let ItemOutcome::NoOp {
        resulting_path: second_path,
    } = &second.outcome
    else {
        panic!("second call must be a no-op, got {:?}", second.outcome);
    };
    assert_eq!(resulting_path, second_path);

    // promoted_at survives: the no-op never rewrites the file.
    let record = vault.store.load_at(&id, resulting_path).await.unwrap();
    assert!(record.promoted_at.is_some());
}

#[tokio::test]
async fn concurrent_promotions_of_one_note_settle_exactly_once() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Inbox,
        "race",
        "status: inbox\ntype: literature\nquality_score: 0.9\n",
        "body\n",
    )
    .await;

    // Both calls interleave at their awaits; the note's write lock makes
    // the loser wait out the winner's move and then observe the settled
    // state instead of erroring on a file that is no longer there.
    let id = NoteId::from("race");
    let (first, second) = tokio::join!(
        vault.engine.promote_one(&id, false),
        vault.engine.promote_one(&id, false),
    );
    let outcomes = [first.unwrap().outcome, second.unwrap().outcome];

    let promoted = outcomes
        .iter()
        .filter(|o| matches!(o, ItemOutcome::Promoted { .. }))
        .count();
    let noops = outcomes
        .iter()
        .filter(|o| matches!(o, ItemOutcome::NoOp { .. }))
        .count();
    assert_eq!(
        (promoted, noops),
        (1, 1),
        "one winner, one idempotent no-op; got {outcomes:?}"
    );

    let destination = vault.layout.note_path(DirRole::Literature, &id);
    for outcome in &outcomes {
        match outcome {
            ItemOutcome::Promoted { resulting_path } | ItemOutcome::NoOp { resulting_path } => {
                assert_eq!(resulting_path, &destination);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert!(destination.is_file());
    assert!(!vault.layout.note_path(DirRole::Inbox, &id).is_file());
    assert_invariant(&vault).await;
}

#[tokio::test]
async fn dry_run_predicts_a_real_run() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Inbox,
        "good",
        "status: inbox\ntype: literature\nquality_score: 0.8\n",
        "",
    )
    .await;
    write_note(
        &vault,
        DirRole::Inbox,
        "bad",
        "status: inbox\ntype: literature\nquality_score: 0.1\n",
        "",
    )
    .await;
    write_note(
        &vault,
        DirRole::Inbox,
        "untyped",
        "status: inbox\nquality_score: 0.9\n",
        "",
    )
    .await;

    let dry = vault
        .engine
        .auto_promote(
            BatchOptions {
                dry_run: true,
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await;
    // Dry run touched nothing.
    assert!(vault
        .layout
        .note_path(DirRole::Inbox, &NoteId::from("good"))
        .is_file());

    let real = vault
        .engine
        .auto_promote(BatchOptions::default(), &CancellationToken::new())
        .await;

    let dry_ids: Vec<_> = dry.promoted.iter().map(|(id, _)| id.clone()).collect();
    let real_ids: Vec<_> = real.promoted.iter().map(|(id, _)| id.clone()).collect();
    assert_eq!(dry_ids, real_ids);
    assert_eq!(dry.skipped.len(), real.skipped.len());
    for ((dry_id, dry_reason), (real_id, real_reason)) in
        dry.skipped.iter().zip(real.skipped.iter())
    {
        assert_eq!(dry_id, real_id);
        assert_eq!(dry_reason, real_reason);
    }
}

#[tokio::test]
async fn type_filter_limits_the_batch() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Inbox,
        "lit",
        "status: inbox\ntype: literature\nquality_score: 0.9\n",
        "",
    )
    .await;
    write_note(
        &vault,
        DirRole::Inbox,
        "perm",
        "status: inbox\ntype: permanent\nquality_score: 0.9\n",
        "",
    )
    .await;

    let result = vault
        .engine
        .auto_promote(
            BatchOptions {
                type_filter: Some(NoteType::Literature),
                ..Default::default()
            },
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(result.promoted.len(), 1);
    assert_eq!(result.promoted[0].0, NoteId::from("lit"));
    assert!(matches!(
        result.skipped[0].1,
        SkipReason::FilteredByType {
            actual: NoteType::Permanent
        }
    ));
}

#[tokio::test]
async fn batch_processes_oldest_first() {
    let vault = vault().await;
    write_note(
        &vault,
        DirRole::Inbox,
        "newer",
        "status: inbox\ntype: fleeting\nquality_score: 0.9\ncreated_at: 2025-06-01T00:00:00Z\n",
        "",
    )
    .await;
    write_note(
        &vault,
        DirRole::Inbox,
        "older",
        "status: inbox\ntype: fleeting\nquality_score: 0.9\ncreated_at: 2025-01-01T00:00:00Z\n",
        "",
    )
    .await;

    let result = vault
        .engine
        .auto_promote(BatchOptions::default(), &CancellationToken::new())
        .await;

    let ids: Vec<_> = result
        .promoted
        .iter()
        .map(|(id, _)| id.as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["older", "newer"]);
}

#[tokio::test]
async fn cancelled_batch_leaves_remaining_items_consistent() {
    let vault = vault().await;
    for i in 0..5 {
        write_note(
            &vault,
            DirRole::Inbox,
            &format!("n{i}"),
            "status: inbox\ntype: fleeting\nquality_score: 0.9\n",
            "",
        )
        .await;
    }

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = vault.engine.auto_promote(BatchOptions::default(), &cancel).await;

    assert!(result.cancelled);
    assert_eq!(result.total(), 0);
    assert_invariant(&vault).await;
}

#[tokio::test]
async fn invariant_holds_across_a_random_looking_operation_mix() {
    let vault = vault().await;
    let specs = [
        ("a", "status: inbox\ntype: literature\nquality_score: 0.9\n"),
        ("b", "status: promoted\ntype: fleeting\n"),
        ("c", "status: inbox\ntype: permanent\nquality_score: 0.3\n"),
        ("d", "status: inbox\nquality_score: 0.99\n"),
    ];
    for (id, header) in specs {
        write_note(&vault, DirRole::Inbox, id, header, "body\n").await;
    }

    let cancel = CancellationToken::new();
    for _ in 0..3 {
        vault
            .engine
            .auto_promote(BatchOptions::default(), &cancel)
            .await;
        assert_invariant(&vault).await;

        let reports = vault.detector.scan().await;
        vault.detector.repair(reports, false, &cancel).await.unwrap();
        assert_invariant(&vault).await;
    }
}
