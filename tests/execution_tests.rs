//! Execution safety pipeline: dry runs, applies, prechecks, rollback, history.

mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use fixtures::{advisor, advisor_with, config, scope, GIB};
use strata_core::config::AdvisorConfig;
use strata_core::model::{ExecState, Recommendation};
use strata_core::types::{Encoding, ObjectRef};
use strata_exec::{Advisor, ExecuteOptions};
use strata_store::{CatalogObject, HistoryFilter, Ledger, MemoryCatalog, RecommendationFilter, StatementFault};

fn orders() -> CatalogObject {
    CatalogObject::table("APP", "ORDERS", 4 * GIB).flat_ratio(4.0)
}

async fn analyzed(cat: &MemoryCatalog) -> (Advisor, Recommendation) {
    analyzed_with(cat, config()).await
}

async fn analyzed_with(cat: &MemoryCatalog, cfg: AdvisorConfig) -> (Advisor, Recommendation) {
    let adv = advisor_with(Arc::new(cat.clone()), cfg, Arc::new(Ledger::in_memory()));
    adv.start_analysis(scope(), "balanced", None).await.unwrap();
    let rec = adv
        .recommendations(&RecommendationFilter::default())
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    (adv, rec)
}

fn encoding_of(cat: &MemoryCatalog, obj: &ObjectRef) -> Encoding {
    cat.metrics(obj).unwrap().current_encoding
}

#[tokio::test]
async fn dry_run_is_default_and_changes_nothing() {
    let cat = MemoryCatalog::new().with(orders());
    let (adv, rec) = analyzed(&cat).await;

    let record = adv.execute(rec.id, ExecuteOptions::default()).await.unwrap();
    assert_eq!(record.status, ExecState::Succeeded);
    assert!(record.dry_run);
    assert_eq!(
        record.path,
        vec![ExecState::Pending, ExecState::Precheck, ExecState::DryRun, ExecState::Succeeded]
    );
    assert_eq!(encoding_of(&cat, &rec.object), Encoding::None);
    assert!(cat.executed().is_empty());
    assert_eq!(record.savings_bytes(), 0);
}

#[tokio::test]
async fn apply_records_before_and_after_size() {
    let cat = MemoryCatalog::new().with(orders());
    let (adv, rec) = analyzed(&cat).await;

    let record = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(record.status, ExecState::Succeeded);
    assert_eq!(record.size_before_bytes, 4 * GIB);
    assert_eq!(record.size_after_bytes, Some(GIB));
    assert_eq!(record.savings_bytes(), 3 * GIB);
    assert_eq!(encoding_of(&cat, &rec.object), rec.encoding);
    assert_eq!(cat.executed(), vec![record.statement.clone()]);
    assert_eq!(record.statement_digest.len(), 64);
    assert!(!record.is_open());
}

#[tokio::test]
async fn online_and_parallel_reach_the_statement() {
    let cat = MemoryCatalog::new().with(orders());
    let (adv, rec) = analyzed(&cat).await;
    let opts = ExecuteOptions {
        online: true,
        parallel_degree: Some(8),
        ..ExecuteOptions::apply()
    };
    let record = adv.execute(rec.id, opts).await.unwrap();
    assert!(record.statement.ends_with("ONLINE PARALLEL 8"), "{}", record.statement);
    assert!(record.online);
}

#[tokio::test]
async fn second_attempt_on_busy_object_fails_without_running() {
    let cat = MemoryCatalog::new().with(orders());
    let (adv, rec) = analyzed(&cat).await;
    cat.set_statement_delay(Duration::from_millis(300));

    let first = {
        let adv = adv.clone();
        let id = rec.id;
        tokio::spawn(async move { adv.execute(id, ExecuteOptions::apply()).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let second = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(second.status, ExecState::Failed);
    assert!(second.error.as_deref().unwrap().contains("object busy"));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status, ExecState::Succeeded);
    assert_eq!(cat.executed().len(), 1);
}

#[tokio::test]
async fn failed_apply_is_rolled_back() {
    let cat = MemoryCatalog::new().with(orders().fault(StatementFault::FailAfterApply {
        message: "ORA-01652: unable to extend temp segment".into(),
    }));
    let (adv, rec) = analyzed(&cat).await;

    let record = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(record.status, ExecState::RolledBack);
    assert_eq!(
        record.path,
        vec![
            ExecState::Pending,
            ExecState::Precheck,
            ExecState::Applying,
            ExecState::Failed,
            ExecState::RolledBack
        ]
    );
    assert!(record.error.as_deref().unwrap().contains("ORA-01652"));
    let m = cat.metrics(&rec.object).unwrap();
    assert_eq!(m.current_encoding, Encoding::None);
    assert_eq!(m.size_bytes, 4 * GIB);
}

#[tokio::test]
async fn unverifiable_rollback_stays_failed() {
    let cat = MemoryCatalog::new().with(orders().fault(StatementFault::Irreversible {
        message: "ORA-00600".into(),
    }));
    let (adv, rec) = analyzed(&cat).await;

    let record = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(record.status, ExecState::Failed);
    let err = record.error.as_deref().unwrap();
    assert!(err.contains("ORA-00600"), "{err}");
    assert!(err.contains("rollback failed"), "{err}");
}

#[tokio::test]
async fn timed_out_statement_is_rolled_back_not_assumed_done() {
    let cat = MemoryCatalog::new().with(orders());
    let (adv, rec) = analyzed(&cat).await;
    cat.set_statement_delay(Duration::from_millis(400));

    let opts = ExecuteOptions {
        timeout: Some(Duration::from_millis(50)),
        ..ExecuteOptions::apply()
    };
    let record = adv.execute(rec.id, opts).await.unwrap();
    assert_eq!(record.status, ExecState::RolledBack);
    assert!(record.error.as_deref().unwrap().contains("timed out"));

    // the cancelled statement must not land after the fact
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(encoding_of(&cat, &rec.object), Encoding::None);
    assert!(cat.executed().is_empty());
}

#[tokio::test]
async fn object_stays_claimed_until_timed_out_statement_returns() {
    let cat = MemoryCatalog::new().with(orders());
    let (adv, rec) = analyzed(&cat).await;
    cat.set_statement_delay(Duration::from_millis(400));

    let first = {
        let adv = adv.clone();
        let id = rec.id;
        let opts = ExecuteOptions {
            timeout: Some(Duration::from_millis(50)),
            ..ExecuteOptions::apply()
        };
        tokio::spawn(async move { adv.execute(id, opts).await })
    };

    // past the timeout, while the statement is still running
    tokio::time::sleep(Duration::from_millis(150)).await;
    let retry = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(retry.status, ExecState::Failed);
    assert!(retry.error.as_deref().unwrap().contains("object busy"));

    let first = first.await.unwrap().unwrap();
    assert_eq!(first.status, ExecState::RolledBack);
    assert!(cat.executed().is_empty());

    cat.set_statement_delay(Duration::ZERO);
    let again = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(again.status, ExecState::Succeeded);
    assert_eq!(encoding_of(&cat, &rec.object), rec.encoding);
    assert_eq!(cat.executed().len(), 1);
}

#[tokio::test]
async fn precheck_rejections_never_touch_the_object() {
    let cat = MemoryCatalog::new().with(orders());
    let (adv, rec) = analyzed(&cat).await;

    cat.set_lock(&rec.object, Some("SID 311"));
    let locked = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(locked.status, ExecState::Failed);
    assert_eq!(locked.path, vec![ExecState::Pending, ExecState::Precheck, ExecState::Failed]);
    assert!(locked.error.as_deref().unwrap().contains("locked by SID 311"));
    cat.set_lock(&rec.object, None);

    cat.set_free_space("USERS", 10);
    let full = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert!(full.error.as_deref().unwrap().contains("insufficient free space"));
    cat.set_free_space("USERS", 100 * GIB);

    cat.insert(orders().encoding(Encoding::Basic));
    let moved = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert!(moved.error.as_deref().unwrap().contains("changed since analysis"));

    assert!(cat.executed().is_empty());
    // a rejected attempt releases the object
    cat.insert(orders());
    let ok = adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
    assert_eq!(ok.status, ExecState::Succeeded);
}

#[tokio::test]
async fn every_record_ends_closed() {
    let cat = MemoryCatalog::new()
        .with(orders())
        .with(CatalogObject::table("APP", "BAD", 2 * GIB).flat_ratio(4.0).fault(StatementFault::Reject {
            message: "ORA-00054: resource busy".into(),
        }))
        .with(CatalogObject::index("APP", "ORDERS_IX", GIB).flat_ratio(2.0));
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();
    for rec in adv.recommendations(&RecommendationFilter::default()).unwrap() {
        adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();
        adv.execute(rec.id, ExecuteOptions::default()).await.unwrap();
    }

    let history = adv.history(None, HistoryFilter::default()).unwrap();
    assert_eq!(history.len(), 6);
    for r in &history {
        assert!(r.finished_ms.is_some(), "{:?}", r);
        assert!(r.status.is_terminal());
        if !r.dry_run && r.status != ExecState::Succeeded {
            assert_eq!(encoding_of(&cat, &r.object), r.encoding_before);
        }
    }
    let bad = history.iter().find(|r| r.object.name == "BAD" && !r.dry_run).unwrap();
    assert_eq!(bad.status, ExecState::RolledBack);
    assert!(bad.error.as_deref().unwrap().contains("ORA-00054"));
}

#[tokio::test]
async fn history_filters_and_orders_newest_first() {
    let cat = MemoryCatalog::new()
        .with(orders())
        .with(CatalogObject::table("SALES", "LINES", GIB).flat_ratio(4.0));
    let adv = advisor(&cat);
    adv.start_analysis(Default::default(), "balanced", None).await.unwrap();
    let recs = adv.recommendations(&RecommendationFilter::default()).unwrap();
    for r in &recs {
        adv.execute(r.id, ExecuteOptions::default()).await.unwrap();
    }

    let all = adv.history(Some(1), HistoryFilter::default()).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all[0].id > all[1].id);

    let sales = adv
        .history(
            Some(30),
            HistoryFilter {
                owner: Some("SALES".into()),
                ..HistoryFilter::default()
            },
        )
        .unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].object.owner, "SALES");

    let failed = adv
        .history(
            None,
            HistoryFilter {
                status: Some(ExecState::Failed),
                ..HistoryFilter::default()
            },
        )
        .unwrap();
    assert!(failed.is_empty());

    let one = adv.execution(all[0].id).unwrap();
    assert_eq!(one, all[0]);
}
