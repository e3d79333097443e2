//! Journal-backed state survives a restart; reporting reads it back.

mod fixtures;

use std::sync::Arc;

use fixtures::{advisor, advisor_with, config, scope, GIB};
use strata_core::id::RecommendationId;
use strata_core::model::{ExecState, ExecutionDraft, RunStatus};
use strata_core::types::{Encoding, ObjectRef};
use strata_exec::{AdvisorError, ExecuteOptions};
use strata_store::{CatalogObject, ExecutionStore, HistoryFilter, Ledger, MemoryCatalog, RecommendationFilter, RunStore};

fn catalog() -> MemoryCatalog {
    MemoryCatalog::new()
        .with(CatalogObject::table("APP", "ORDERS", 4 * GIB).flat_ratio(4.0))
        .with(CatalogObject::index("APP", "ORDERS_PK", GIB).flat_ratio(2.0))
}

#[tokio::test]
async fn history_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let cat = catalog();

    let (run_id, exec_id) = {
        let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
        let adv = advisor_with(Arc::new(cat.clone()), config(), ledger);
        let summary = adv.start_analysis(scope(), "balanced", None).await.unwrap();
        let top = adv.recommendations(&RecommendationFilter::default()).unwrap()[0].clone();
        let record = adv.execute(top.id, ExecuteOptions::apply()).await.unwrap();
        assert_eq!(record.status, ExecState::Succeeded);
        (summary.run.id, record.id)
    };

    let ledger = Arc::new(Ledger::open(dir.path()).unwrap());
    let run = ledger.run(run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(ledger.latest_run().unwrap().unwrap().id, run_id);

    let adv = advisor_with(Arc::new(cat.clone()), config(), ledger);
    assert_eq!(adv.recommendations(&RecommendationFilter::all()).unwrap().len(), 2);
    let history = adv.history(None, HistoryFilter::default()).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, exec_id);
    assert_eq!(history[0].status, ExecState::Succeeded);

    // ids keep counting after replay
    let next = adv.start_analysis(scope(), "balanced", None).await.unwrap();
    assert!(next.run.id > run_id);
}

#[tokio::test]
async fn open_execution_is_closed_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let object = ObjectRef::table("APP", "ORDERS");
    let open_id = {
        let ledger = Ledger::open(dir.path()).unwrap();
        let rec = ledger
            .begin(ExecutionDraft {
                recommendation_id: RecommendationId::new(1),
                object: object.clone(),
                statement: "ALTER TABLE \"APP\".\"ORDERS\" MOVE ROW STORE COMPRESS ADVANCED".into(),
                statement_digest: "00".into(),
                dry_run: false,
                online: false,
                encoding_before: Encoding::None,
                encoding_target: Encoding::Oltp,
                size_before_bytes: GIB,
            })
            .unwrap();
        ledger.advance(rec.id, ExecState::Precheck).unwrap();
        ledger.advance(rec.id, ExecState::Applying).unwrap();
        rec.id
    };

    let ledger = Ledger::open(dir.path()).unwrap();
    let rec = ledger.execution(open_id).unwrap();
    assert_eq!(rec.status, ExecState::Failed);
    assert!(rec.finished_ms.is_some());
    assert!(rec.error.as_deref().unwrap().contains("interrupted"));
    assert!(ledger.open_execution_for(&object).unwrap().is_none());
}

#[tokio::test]
async fn savings_statistics_and_csv_export() {
    let cat = catalog();
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();
    adv.start_analysis(scope(), "aggressive", None).await.unwrap();

    let stats = adv.savings_by_strategy().unwrap();
    let names: Vec<&str> = stats.iter().map(|s| s.strategy.as_str()).collect();
    assert_eq!(names, vec!["aggressive", "balanced"]);
    for s in &stats {
        assert_eq!(s.objects, 2);
        assert_eq!(s.total_size_bytes, 5 * GIB);
        assert_eq!(s.total_savings_bytes, 3 * GIB + GIB / 2);
    }

    let mut out = Vec::new();
    let filter = RecommendationFilter::default().strategy("balanced");
    let n = adv.export_recommendations_csv(&filter, &mut out).unwrap();
    assert_eq!(n, 2);
    let text = String::from_utf8(out).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("id,run_id,strategy,owner,object"));
    assert_eq!(lines.count(), 2);
    assert!(text.contains("ORDERS_PK"));
}

#[tokio::test]
async fn estate_and_table_statistics() {
    let cat = catalog();
    let adv = advisor(&cat);
    adv.start_analysis(scope(), "balanced", None).await.unwrap();
    adv.start_analysis(scope(), "aggressive", None).await.unwrap();

    let estate = adv.compression_statistics().unwrap();
    assert_eq!(estate.total_objects, 2);
    assert_eq!(estate.total_size_bytes, 5 * GIB);
    assert_eq!(estate.compressed_objects, 0);
    assert_eq!(estate.actionable, 2);
    assert_eq!(estate.projected_savings_bytes, 3 * GIB + GIB / 2);
    assert!((estate.avg_savings_pct - 62.5).abs() < 1e-9);

    let orders = ObjectRef::table("APP", "ORDERS");
    let rec = adv
        .recommendations(&RecommendationFilter::default().strategy("balanced"))
        .unwrap()
        .into_iter()
        .find(|r| r.object == orders)
        .unwrap();
    adv.execute(rec.id, ExecuteOptions::apply()).await.unwrap();

    let table = adv.table_statistics(&orders).await.unwrap();
    let metrics = table.metrics.as_ref().unwrap();
    assert_eq!(metrics.current_encoding, rec.encoding);
    assert_eq!(metrics.size_bytes, GIB);
    let strategies: Vec<&str> = table.recommendations.iter().map(|r| r.strategy.as_str()).collect();
    assert_eq!(strategies.len(), 2);
    assert!(strategies.contains(&"balanced") && strategies.contains(&"aggressive"));
    assert_eq!(table.executions.len(), 1);
    assert_eq!(table.realized_savings_bytes(), 3 * GIB);

    let missing = adv.table_statistics(&ObjectRef::table("APP", "NOPE")).await.unwrap_err();
    assert!(matches!(missing, AdvisorError::NotFound(_)));
}
