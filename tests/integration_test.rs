use serde_json::json;
use settle_pipeline::catalog::{ImageCatalog, ImageQuery, InMemoryImageStore};
use settle_pipeline::config::{ConfigLoader, DispatchMode};
use settle_pipeline::metrics::metrics::ACTIVE_RUNS;
use settle_pipeline::metrics::MetricsCollector;
use settle_pipeline::PipelineOptions;
use settle_pipeline::{
    error_lookup_fn, lookup_fn, transform_fn, validate_fn, PipelineBuilder, PipelineError,
    PipelineInput, Rejection, Settled, Stage, TransformStep,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

type Dispatched = Arc<Mutex<Vec<(String, usize, bool)>>>;

// Serialises tests whose runs move the process-wide active-runs gauge.
static METRICS_RUNS: Mutex<()> = Mutex::new(());

fn dispatch_recorder() -> (
    Dispatched,
    impl Fn(&Rejection, usize, bool) + Send + Sync + 'static,
) {
    let seen: Dispatched = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |reason: &Rejection, index: usize, current: bool| {
        sink.lock()
            .unwrap()
            .push((reason.to_string(), index, current));
    })
}

fn guard() -> Stage<i64, i64> {
    Stage::new(
        "guard",
        transform_fn(|x: &i64, _index: usize| {
            let x = *x;
            async move {
                if x < 0 {
                    anyhow::bail!("negative");
                }
                Ok(x)
            }
        }),
    )
}

fn divide() -> Stage<i64, i64> {
    Stage::new(
        "divide",
        transform_fn(|x: &i64, _index: usize| {
            let x = *x;
            async move { Ok::<_, anyhow::Error>(10 / x) }
        }),
    )
}

/// Records `(index, status, step, current_rejection)` of every record a stage emits
type Snapshot = Arc<Mutex<Vec<(usize, bool, TransformStep, Option<bool>)>>>;

fn snapshot_lookup(snapshot: Snapshot) -> impl settle_pipeline::Lookup<i64> {
    lookup_fn(move |_: Option<&i64>, index: usize, records: &[Settled<i64>]| {
        let record = &records[index];
        snapshot.lock().unwrap().push((
            record.index(),
            record.is_fulfilled(),
            record.transform_step(),
            record.current_rejection(),
        ));
    })
}

// ═══════════════════════════════════════════════════════════════════════════
// SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_guard_then_divide_per_stage() {
    let after_guard: Snapshot = Arc::default();
    let after_divide: Snapshot = Arc::default();
    let (seen, handler) = dispatch_recorder();

    let pipeline = PipelineBuilder::new()
        .stage(guard().with_lookup(snapshot_lookup(after_guard.clone())))
        .stage(divide().with_lookup(snapshot_lookup(after_divide.clone())))
        .with_error_lookup(error_lookup_fn(handler))
        .build()
        .unwrap();

    let report = pipeline.run_values(vec![1, 2, -1]).await.unwrap();

    assert_eq!(
        *after_guard.lock().unwrap(),
        vec![
            (0, true, TransformStep::Stage(0), None),
            (1, true, TransformStep::Stage(0), None),
            (2, false, TransformStep::Stage(0), Some(true)),
        ]
    );
    assert_eq!(
        *after_divide.lock().unwrap(),
        vec![
            (0, true, TransformStep::Stage(1), None),
            (1, true, TransformStep::Stage(1), None),
            (2, false, TransformStep::Stage(0), Some(false)),
        ]
    );

    let values: Vec<Option<i64>> = report.records.iter().map(|r| r.value().copied()).collect();
    assert_eq!(values, vec![Some(10), Some(5), None]);
    assert_eq!(report.records[2].reason().unwrap().to_string(), "negative");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("negative".to_string(), 2, false)]
    );
}

#[tokio::test]
async fn test_empty_input_never_dispatches() {
    let (seen, handler) = dispatch_recorder();
    let pipeline = PipelineBuilder::new()
        .stage(guard())
        .stage(divide())
        .with_error_lookup(error_lookup_fn(handler))
        .build()
        .unwrap();

    let report = pipeline.run_values(Vec::new()).await.unwrap();

    assert!(report.is_empty());
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_final_stage_validation_dispatches_every_item() {
    let (seen, handler) = dispatch_recorder();
    let pipeline = PipelineBuilder::new()
        .stage(guard())
        .stage(divide().with_validate(validate_fn(|x: &i64, _index: usize| {
            let x = *x;
            async move { Err::<(), _>(anyhow::anyhow!("rejected {x}")) }
        })))
        .with_error_lookup(error_lookup_fn(handler))
        .build()
        .unwrap();

    let report = pipeline.run_values(vec![5, 2, 1, 10]).await.unwrap();

    for record in &report.records {
        assert!(record.is_rejected());
        assert_eq!(record.transform_step(), TransformStep::Stage(1));
        assert_eq!(record.current_rejection(), Some(true));
    }
    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("rejected 2".to_string(), 0, true),
            ("rejected 5".to_string(), 1, true),
            ("rejected 10".to_string(), 2, true),
            ("rejected 1".to_string(), 3, true),
        ]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// INVARIANTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_length_and_index_hold_at_every_stage() {
    let snapshots: Vec<Snapshot> = (0..3).map(|_| Snapshot::default()).collect();

    let pipeline = PipelineBuilder::new()
        .stage(guard().with_lookup(snapshot_lookup(snapshots[0].clone())))
        .stage(divide().with_lookup(snapshot_lookup(snapshots[1].clone())))
        .stage(guard().with_lookup(snapshot_lookup(snapshots[2].clone())))
        .build()
        .unwrap();

    let inputs: Vec<i64> = (-20..20).filter(|x| *x != 0).collect();
    let report = pipeline.run_values(inputs.clone()).await.unwrap();

    assert_eq!(report.len(), inputs.len());
    for (i, record) in report.records.iter().enumerate() {
        assert_eq!(record.index(), i);
    }
    for snapshot in &snapshots {
        let snapshot = snapshot.lock().unwrap();
        assert_eq!(snapshot.len(), inputs.len());
        assert!(snapshot.iter().enumerate().all(|(i, entry)| entry.0 == i));
    }
}

#[tokio::test]
async fn test_rejected_items_short_circuit() {
    let calls: Arc<Mutex<HashMap<usize, usize>>> = Arc::default();
    let counting = {
        let calls = calls.clone();
        transform_fn(move |x: &i64, index: usize| {
            *calls.lock().unwrap().entry(index).or_default() += 1;
            let x = *x;
            async move { Ok::<_, anyhow::Error>(x) }
        })
    };
    let after_last: Snapshot = Arc::default();

    let pipeline = PipelineBuilder::new()
        .stage(guard())
        .stage(Stage::new("count", counting))
        .stage(divide().with_lookup(snapshot_lookup(after_last.clone())))
        .build()
        .unwrap();

    pipeline.run_values(vec![3, -3, 5]).await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.get(&0), Some(&1));
    assert_eq!(calls.get(&1), None);
    assert_eq!(calls.get(&2), Some(&1));

    let last = after_last.lock().unwrap();
    assert_eq!(last[1], (1, false, TransformStep::Stage(0), Some(false)));
}

#[tokio::test]
async fn test_rejection_is_never_promoted() {
    let pipeline = PipelineBuilder::new()
        .stage(Stage::new(
            "recover",
            transform_fn(|x: &i64, _index: usize| {
                let x = *x;
                async move { Ok::<_, anyhow::Error>(x.abs()) }
            }),
        ))
        .build()
        .unwrap();

    let inputs: Vec<PipelineInput<i64>> = vec![
        PipelineInput::Value(-4),
        Err::<i64, _>(anyhow::anyhow!("lost upstream")).into(),
    ];
    let report = pipeline.run(inputs).await.unwrap();

    assert_eq!(report.records[0].value(), Some(&4));
    assert!(report.records[1].is_rejected());
    assert_eq!(report.records[1].transform_step(), TransformStep::Initial);
}

#[tokio::test]
async fn test_serialized_records_hold_value_or_reason() {
    let pipeline = PipelineBuilder::new().stage(guard()).build().unwrap();
    let report = pipeline.run_values(vec![7, -7]).await.unwrap();

    let json = serde_json::to_value(&report.records).unwrap();
    assert_eq!(
        json[0],
        json!({ "status": "fulfilled", "value": 7, "index": 0, "transform_step": 0 })
    );
    assert_eq!(json[1]["status"], "rejected");
    assert_eq!(json[1]["reason"], "negative");
    assert_eq!(json[1]["current_rejection"], true);
    assert!(json[1].get("value").is_none());
}

#[tokio::test]
async fn test_configuration_errors_stop_before_any_stage() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counting = {
        let calls = calls.clone();
        transform_fn(move |x: &i64, _index: usize| {
            calls.fetch_add(1, Ordering::SeqCst);
            let x = *x;
            async move { Ok::<_, anyhow::Error>(x) }
        })
    };

    let pipeline = PipelineBuilder::new()
        .stage(Stage::new("count", counting))
        .build()
        .unwrap();

    let inputs = vec![
        PipelineInput::Settled(Settled::initial(1, 1)),
        PipelineInput::Settled(Settled::initial(2, 1)),
    ];
    let result = pipeline.run(inputs).await;

    assert!(matches!(result, Err(PipelineError::DuplicateIndex { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let empty = PipelineBuilder::<i64, i64>::new().build();
    assert!(matches!(empty, Err(PipelineError::NoStages)));
}

// ═══════════════════════════════════════════════════════════════════════════
// CONFIG, METRICS AND CATALOG
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_pipeline_from_toml_config_with_metrics() {
    let _runs = METRICS_RUNS.lock().unwrap_or_else(PoisonError::into_inner);
    let config = ConfigLoader::from_toml(
        r#"
        [run]
        max_concurrency = 2
        dispatch = "every_stage"

        [metrics]
        enabled = true
        "#,
    )
    .unwrap();
    assert_eq!(config.run.dispatch, DispatchMode::EveryStage);

    let (seen, handler) = dispatch_recorder();
    let metrics = Arc::new(MetricsCollector::new());
    let pipeline = PipelineBuilder::new()
        .stage(guard())
        .stage(divide())
        .with_config(&config)
        .with_metrics(metrics.clone())
        .with_error_lookup(error_lookup_fn(handler))
        .build()
        .unwrap();

    pipeline.run_values(vec![-1, 5]).await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ("negative".to_string(), 0, true),
            ("negative".to_string(), 0, false),
        ]
    );

    let exported = metrics.export_metrics().unwrap();
    assert!(exported.contains("settle_pipeline_runs_settled_total"));
    assert!(exported.contains("settle_pipeline_items_rejected_total"));
}

#[tokio::test]
async fn test_active_runs_released_when_lookup_panic_propagates() {
    let _runs = METRICS_RUNS.lock().unwrap_or_else(PoisonError::into_inner);
    let before = ACTIVE_RUNS.get();

    let pipeline = PipelineBuilder::new()
        .stage(guard().with_lookup(lookup_fn(
            |_: Option<&i64>, _: usize, _: &[Settled<i64>]| panic!("observer bug"),
        )))
        .with_options(PipelineOptions::default().with_lookup_isolation(false))
        .with_metrics(Arc::new(MetricsCollector::new()))
        .build()
        .unwrap();

    let outcome = tokio::spawn(async move { pipeline.run_values(vec![1, 2]).await }).await;

    assert!(outcome.unwrap_err().is_panic());
    assert_eq!(ACTIVE_RUNS.get(), before);
}

#[tokio::test]
async fn test_catalog_ingest_then_query() {
    let store = Arc::new(InMemoryImageStore::new());
    let catalog = ImageCatalog::new(store.clone());

    let outcome = catalog
        .ingest(vec![
            json!({ "zipPath": "trip.zip", "filename": "beach.jpg", "size": 2048 }),
            json!({ "zipPath": "trip.zip", "filename": "", "size": 10 }),
            json!({ "zipPath": "trip.zip", "filename": "beach-2.jpg", "size": 4096 }),
        ])
        .await
        .unwrap();

    assert_eq!(outcome.created().count(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].index, 1);
    assert_eq!(
        outcome.failures[0].reason.to_string(),
        "Invalid image data: Filename is required"
    );

    let images = catalog
        .query(ImageQuery::new("trip.zip").with_image_name("beach"))
        .await
        .unwrap();
    assert_eq!(images.len(), 2);
    assert!(images.iter().all(|image| image.content_type == "image/jpeg"));
}
