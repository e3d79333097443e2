//! Batch execution over the savings-ordered queue.

mod fixtures;

use fixtures::{advisor, scope, GIB};
use strata_core::model::{ExecState, PriorityTier};
use strata_core::id::RecommendationId;
use strata_exec::{AdvisorError, BatchOptions};
use strata_store::{CatalogObject, MemoryCatalog, RecommendationFilter, StatementFault};

/// Five cold tables; projected savings grow with the table number.
fn five_tables() -> MemoryCatalog {
    let mut cat = MemoryCatalog::new();
    for i in 1..=5u64 {
        cat = cat.with(CatalogObject::table("APP", &format!("T{i}"), i * GIB).flat_ratio(4.0));
    }
    cat
}

#[tokio::test]
async fn batch_takes_the_largest_savings_first() {
    let cat = five_tables();
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();

    let opts = BatchOptions {
        max_objects: 2,
        ..BatchOptions::default()
    };
    let summary = adv.batch_execute("balanced", opts).await.unwrap();
    assert_eq!(summary.processed, 2);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 0);
    let names: Vec<&str> = summary.items.iter().map(|i| i.object.name.as_str()).collect();
    assert_eq!(names, vec!["T5", "T4"]);
    assert!(summary.items.iter().all(|i| i.tier == PriorityTier::High));
    // default is a dry run
    assert_eq!(summary.total_savings_bytes, 0);
    assert!(cat.executed().is_empty());
}

#[tokio::test]
async fn batch_respects_total_size_cap() {
    let cat = five_tables();
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();

    let opts = BatchOptions {
        max_objects: 5,
        max_total_size_bytes: Some(8 * GIB),
        ..BatchOptions::default()
    };
    let summary = adv.batch_execute("balanced", opts).await.unwrap();
    let names: Vec<&str> = summary.items.iter().map(|i| i.object.name.as_str()).collect();
    // 5 + 3 fits, 4 and then 2 or 1 would not
    assert_eq!(names, vec!["T5", "T3"]);
}

#[tokio::test]
async fn batch_continues_past_failures() {
    let cat = five_tables();
    cat.insert(
        CatalogObject::table("APP", "T4", 4 * GIB)
            .flat_ratio(4.0)
            .fault(StatementFault::Reject {
                message: "ORA-00054: resource busy".into(),
            }),
    );
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();

    let opts = BatchOptions {
        max_objects: 3,
        dry_run: false,
        ..BatchOptions::default()
    };
    let summary = adv.batch_execute("balanced", opts).await.unwrap();
    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
    // T5 and T3 each shrink to a quarter
    assert_eq!(summary.total_savings_bytes, (5 * GIB - 5 * GIB / 4) + (3 * GIB - 3 * GIB / 4));

    let t4 = summary.items.iter().find(|i| i.object.name == "T4").unwrap();
    let record = t4.record.as_ref().unwrap();
    assert_eq!(record.status, ExecState::RolledBack);
    assert!(!t4.succeeded());
    assert_eq!(cat.executed().len(), 2);
}

#[tokio::test]
async fn batch_over_nothing_is_empty() {
    let cat = MemoryCatalog::new();
    let adv = advisor(&cat);
    let summary = adv.batch_execute("balanced", BatchOptions::default()).await.unwrap();
    assert_eq!(summary.processed, 0);
    assert!(summary.items.is_empty());
}

#[tokio::test]
async fn batch_by_ids_runs_exactly_the_chosen_items() {
    let cat = five_tables();
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();
    let rows = adv.recommendations(&RecommendationFilter::default()).unwrap();
    let id_of = |name: &str| rows.iter().find(|r| r.object.name == name).unwrap().id;

    let ids = vec![id_of("T1"), id_of("T3"), id_of("T1")];
    let opts = BatchOptions {
        dry_run: false,
        parallel_degree: Some(4),
        ..BatchOptions::default()
    };
    let summary = adv.batch_execute_ids(&ids, opts).await.unwrap();
    let names: Vec<&str> = summary.items.iter().map(|i| i.object.name.as_str()).collect();
    assert_eq!(names, vec!["T1", "T3"]);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(cat.executed().len(), 2);
    assert!(cat.executed().iter().all(|s| s.contains("PARALLEL 4")));
}

#[tokio::test]
async fn batch_with_unknown_id_runs_nothing() {
    let cat = five_tables();
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();
    let known = adv.recommendations(&RecommendationFilter::default()).unwrap()[0].id;

    let opts = BatchOptions {
        dry_run: false,
        ..BatchOptions::default()
    };
    let err = adv
        .batch_execute_ids(&[known, RecommendationId::new(9999)], opts)
        .await
        .unwrap_err();
    assert!(matches!(err, AdvisorError::Store(_)), "{err}");
    assert!(cat.executed().is_empty());
    assert!(adv.history(None, Default::default()).unwrap().is_empty());
}
