//! # Integration Tests
//!
//! Integration and end-to-end tests.
//!
//! Covers:
//! - Shipped configuration and model agree with each other
//! - Still/gap scenarios through the whole recognition chain
//! - Concurrent multi-stream service, replay input and result dispatch

#[cfg(test)]
mod support {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use classifier::ModelHandle;
    use contracts::RecognitionBlueprint;
    use observability::CounterRegistry;
    use recognition::{OrchestratorConfig, RecognitionOrchestrator};

    pub const PERIOD_US: i64 = 10_000;

    fn repo_path(relative: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..").join(relative)
    }

    /// The shipped configuration, with the model path made absolute
    pub fn blueprint() -> RecognitionBlueprint {
        let mut blueprint =
            config_loader::ConfigLoader::load_from_path(&repo_path("config/recognizer.toml"))
                .unwrap();
        blueprint.classifier.model_path = repo_path("models/activity_model.json");
        blueprint
    }

    pub fn model(blueprint: &RecognitionBlueprint) -> ModelHandle {
        ModelHandle::load(&blueprint.classifier.model_path).unwrap()
    }

    pub fn orchestrator() -> RecognitionOrchestrator {
        let blueprint = blueprint();
        RecognitionOrchestrator::new(
            OrchestratorConfig::from_blueprint(&blueprint),
            model(&blueprint),
            Arc::new(CounterRegistry::new()),
        )
        .unwrap()
    }
}

#[cfg(test)]
mod contract_tests {
    use super::support::*;
    use contracts::ActivityLabel;
    use features::FeatureExtractor;

    #[test]
    fn test_shipped_config_matches_model() {
        let blueprint = blueprint();
        let schema = FeatureExtractor::new(&blueprint.features).schema();
        let model = model(&blueprint).current();

        model.check_schema(&schema).unwrap();
        assert_eq!(blueprint.window.expected_samples(), 256);
        assert!(model
            .labels()
            .iter()
            .all(|l| ActivityLabel::ALL.contains(l) && *l != ActivityLabel::Unknown));
    }
}

/// Orchestrator-level scenarios, single caller
#[cfg(test)]
mod e2e_tests {
    use super::support::*;
    use contracts::{ActivityLabel, QualityFlag, Sample, StreamId};
    use features::FeatureExtractor;
    use windowing::WindowingEngine;

    /// 256 still samples at 100 Hz: one full window labelled as a posture
    #[test]
    fn test_still_stream_one_window() {
        let blueprint = blueprint();

        // Window and features on their own first
        let mut engine = WindowingEngine::new(blueprint.window.clone());
        let mut windows = Vec::new();
        for i in 0..256 {
            windows.extend(engine.push(Sample {
                stream_id: "s1".into(),
                timestamp_us: i * PERIOD_US,
                x: 0.0,
                y: 0.0,
                z: 9.8,
            }));
        }
        assert_eq!(windows.len(), 1);
        let features = FeatureExtractor::new(&blueprint.features)
            .extract(&windows[0])
            .unwrap();
        assert!((features.get("mag_mean").unwrap() - 9.8).abs() < 1e-9);
        assert!(features.get("mag_std").unwrap().abs() < 1e-9);

        // Then through the orchestrator
        let mut orch = orchestrator();
        let mut results = Vec::new();
        for i in 0..256 {
            results.extend(orch.ingest_reading("s1", i * PERIOD_US, 0.0, 0.0, 9.8).unwrap());
        }

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.predicted_label, ActivityLabel::Sitting);
        assert!(result.predicted_label.is_sedentary());
        assert!(result.confidence >= blueprint.classifier.confidence_threshold);
        assert_eq!(result.quality, QualityFlag::Complete);
        assert_eq!((result.start_us, result.end_us), (0, 2_560_000));
    }

    /// A 5 s gap force-closes the open window and the next one starts at the gap
    #[test]
    fn test_gap_mid_stream() {
        let mut orch = orchestrator();
        let id: StreamId = "s1".into();
        let mut results = Vec::new();

        for i in 0..150 {
            results.extend(orch.ingest_reading("s1", i * PERIOD_US, 0.0, 0.0, 9.8).unwrap());
        }
        assert!(results.is_empty());

        let resume = 150 * PERIOD_US + 5_000_000;
        for i in 0..256 {
            results.extend(
                orch.ingest_reading("s1", resume + i * PERIOD_US, 0.0, 0.0, 9.8)
                    .unwrap(),
            );
        }

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].quality, QualityFlag::Incomplete);
        assert_eq!(results[0].start_us, 0);
        assert_eq!(results[1].quality, QualityFlag::Complete);
        assert_eq!(results[1].start_us, resume);

        let counters = orch.counters(&id).unwrap();
        assert_eq!(counters.windows_incomplete, 1);
        assert_eq!(counters.gap_events, 1);
        assert_eq!(counters.total_rejected(), 0);
    }

    /// Constant-rate stream: floor((T - L) / S) + 1 windows, overlapping by L - S
    #[test]
    fn test_window_count_formula() {
        let blueprint = blueprint();
        let (l, s) = (blueprint.window.window_us(), blueprint.window.step_us());
        let mut orch = orchestrator();

        let n = 1500;
        let mut results = Vec::new();
        for i in 0..n {
            results.extend(orch.ingest_reading("s1", i * PERIOD_US, 0.0, 0.0, 9.8).unwrap());
        }

        let total = n * PERIOD_US;
        assert_eq!(results.len() as i64, (total - l) / s + 1);
        for pair in results.windows(2) {
            assert_eq!(pair[1].start_us - pair[0].start_us, s);
            assert_eq!(pair[0].end_us - pair[1].start_us, l - s);
        }
    }

    /// Bad samples never surface as errors, only as counters
    #[test]
    fn test_bad_samples_are_absorbed() {
        let mut orch = orchestrator();
        let id: StreamId = "s1".into();

        orch.ingest_reading("s1", 0, 0.0, 0.0, 9.8).unwrap();
        orch.ingest_reading("s1", 0, 0.0, 0.0, 9.8).unwrap();
        orch.ingest_reading("s1", 10_000, f64::INFINITY, 0.0, 9.8).unwrap();
        orch.ingest(contracts::RawSample {
            stream_id: id.clone(),
            timestamp_us: Some(20_000),
            x: None,
            y: Some(0.0),
            z: Some(9.8),
        })
        .unwrap();

        let counters = orch.counters(&id).unwrap();
        assert_eq!(counters.samples_received, 4);
        assert_eq!(counters.samples_accepted, 1);
        assert_eq!(counters.total_rejected(), 3);
    }
}

/// Concurrent service, replay input and dispatch
#[cfg(test)]
mod service_tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Arc;

    use super::support::*;
    use contracts::{ClassificationResult, RejectionReason, SinkConfig, SinkType};
    use ingestion::{ActivityProfile, IngestionPipeline, ReplaySource, SyntheticConfig, SyntheticSignal};
    use observability::CounterRegistry;
    use recognition::{OrchestratorConfig, RecognitionService};
    use tokio::sync::mpsc;

    fn spawn_service(
        output: Option<mpsc::Sender<ClassificationResult>>,
    ) -> (RecognitionService, Arc<CounterRegistry>) {
        let blueprint = blueprint();
        let registry = Arc::new(CounterRegistry::new());
        let service = RecognitionService::spawn(
            &blueprint.service,
            OrchestratorConfig::from_blueprint(&blueprint),
            model(&blueprint),
            registry.clone(),
            output,
        )
        .unwrap();
        (service, registry)
    }

    fn signal(stream: &str, profile: ActivityProfile, seed: u64) -> SyntheticSignal {
        SyntheticSignal::new(SyntheticConfig {
            stream_id: stream.into(),
            profile,
            seed,
            ..Default::default()
        })
    }

    /// Streams fed concurrently keep their own order and do not interfere
    #[tokio::test]
    async fn test_concurrent_streams_are_isolated() {
        let (service, registry) = spawn_service(None);
        let service = Arc::new(service);

        let streams = [
            ("wrist-a", ActivityProfile::Sitting),
            ("wrist-b", ActivityProfile::Walking),
            ("hip-a", ActivityProfile::Lying),
            ("hip-b", ActivityProfile::Running),
            ("ankle-a", ActivityProfile::Standing),
            ("ankle-b", ActivityProfile::Walking),
        ];

        let mut tasks = Vec::new();
        for (seed, (stream, profile)) in streams.into_iter().enumerate() {
            let service = service.clone();
            tasks.push(tokio::spawn(async move {
                let mut results = Vec::new();
                for raw in signal(stream, profile, seed as u64).take(640) {
                    results.extend(service.ingest(raw).await.unwrap());
                }
                (stream, results)
            }));
        }

        for task in tasks {
            let (stream, results) = task.await.unwrap();
            // 640 samples: windows at 0, 1.28 s, 2.56 s, 3.84 s
            assert_eq!(results.len(), 4, "stream {stream}");
            assert!(results.iter().all(|r| r.stream_id.as_ref() == stream));
            assert!(results.windows(2).all(|p| p[0].start_us <= p[1].start_us));

            let counters = registry.snapshot(&stream.into()).unwrap();
            assert_eq!(counters.samples_accepted, 640);
            assert_eq!(counters.total_rejected(), 0);
        }

        let service = Arc::try_unwrap(service).ok().unwrap();
        // the last window of every stream closed on its final sample
        assert!(service.shutdown().await.is_empty());
    }

    /// A saturated shard drops samples with a counted reason instead of queueing them
    #[tokio::test]
    async fn test_backpressure_drops_are_counted() {
        let blueprint = blueprint();
        let registry = Arc::new(CounterRegistry::new());
        let mut service_config = blueprint.service.clone();
        service_config.shards = 1;
        service_config.queue_capacity = 4;
        let service = RecognitionService::spawn(
            &service_config,
            OrchestratorConfig::from_blueprint(&blueprint),
            model(&blueprint),
            registry.clone(),
            None,
        )
        .unwrap();

        let mut accepted = 0u64;
        for raw in signal("burst", ActivityProfile::Sitting, 1).take(2000) {
            if service.submit(raw).unwrap() {
                accepted += 1;
            }
        }
        service.shutdown().await;

        let counters = registry.snapshot(&"burst".into()).unwrap();
        let dropped = counters.rejected(RejectionReason::BackpressureDrop);
        assert!(dropped > 0);
        assert_eq!(accepted + dropped, 2000);
        assert_eq!(counters.samples_received, 2000);
    }

    /// Submitted samples end up as JSON lines through the dispatcher
    #[tokio::test]
    async fn test_results_dispatched_to_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.jsonl");

        let (result_tx, result_rx) = mpsc::channel(256);
        let dispatcher = dispatcher::create_dispatcher(
            vec![
                SinkConfig {
                    name: "log".to_string(),
                    sink_type: SinkType::Log,
                    queue_capacity: 100,
                    params: HashMap::new(),
                },
                SinkConfig {
                    name: "jsonl".to_string(),
                    sink_type: SinkType::JsonLines,
                    queue_capacity: 100,
                    params: HashMap::from([(
                        "path".to_string(),
                        path.to_string_lossy().into_owned(),
                    )]),
                },
            ],
            result_rx,
        )
        .unwrap();
        let dispatcher_handle = dispatcher.spawn();

        let (service, _) = spawn_service(Some(result_tx.clone()));
        for raw in signal("wrist", ActivityProfile::Walking, 2).take(512) {
            assert!(service.submit(raw).unwrap());
        }
        for result in service.shutdown().await {
            result_tx.send(result).await.unwrap();
        }
        drop(result_tx);

        let sink_metrics = dispatcher_handle.await.unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        // 512 samples: full windows at 0, 1.28 s and 2.56 s, nothing left to flush
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|v| v["stream_id"] == "wrist"));
        assert!(lines.iter().all(|v| v["written_at"].is_string()));
        assert!(sink_metrics
            .iter()
            .all(|(_, m)| m.write_count == 3 && m.dropped_count == 0));
    }

    /// Recorded file with two streams, one bad record
    #[tokio::test]
    async fn test_replay_file_through_service() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.jsonl");
        let mut file = std::fs::File::create(&path).unwrap();

        let mut a = signal("a", ActivityProfile::Standing, 3);
        let mut b = signal("b", ActivityProfile::Lying, 4);
        for i in 0..300 {
            for sample in [a.next_sample(), b.next_sample()] {
                if sample.stream_id.as_ref() == "b" && i == 10 {
                    // missing z
                    writeln!(
                        file,
                        r#"{{"stream_id":"b","timestamp_us":{},"x":9.8,"y":0.0}}"#,
                        sample.timestamp_us.unwrap()
                    )
                    .unwrap();
                    continue;
                }
                writeln!(file, "{}", serde_json::to_string(&sample).unwrap()).unwrap();
            }
        }
        drop(file);

        let mut ingestion = IngestionPipeline::new(64);
        for source in ReplaySource::open_all(&path, None).unwrap() {
            ingestion.register_source(Box::new(source), None).unwrap();
        }
        let rx = ingestion.take_receiver().unwrap();
        ingestion.start_all().unwrap();

        let (service, registry) = spawn_service(None);
        let mut results: Vec<ClassificationResult> = Vec::new();
        while let Ok(raw) = rx.recv().await {
            results.extend(service.ingest(raw).await.unwrap());
        }
        results.extend(service.shutdown().await);

        let a = registry.snapshot(&"a".into()).unwrap();
        let b = registry.snapshot(&"b".into()).unwrap();
        assert_eq!(a.samples_accepted, 300);
        assert_eq!(b.samples_accepted, 299);
        assert_eq!(b.rejected(RejectionReason::MissingField), 1);

        let per_stream = |id: &str| results.iter().filter(|r| r.stream_id.as_ref() == id).count();
        // one full window plus the flushed tail each
        assert_eq!(per_stream("a"), 2);
        assert_eq!(per_stream("b"), 2);
    }

    /// Summaries over a real result series
    #[tokio::test]
    async fn test_activity_summary_of_a_session() {
        let (service, _) = spawn_service(None);
        let mut results = Vec::new();

        let mut sitting = signal("day", ActivityProfile::Sitting, 5);
        for raw in sitting.take(1280) {
            results.extend(service.ingest(raw).await.unwrap());
        }
        let mut walking = SyntheticSignal::new(SyntheticConfig {
            stream_id: "day".into(),
            profile: ActivityProfile::Walking,
            start_us: 12_800_000,
            seed: 6,
            ..Default::default()
        });
        for raw in walking.take(640) {
            results.extend(service.ingest(raw).await.unwrap());
        }
        service.shutdown().await;

        let summary = recognition::summarize(&results);
        assert!(summary.segments.len() >= 2);
        assert_eq!(summary.segments[0].label, contracts::ActivityLabel::Sitting);
        assert_eq!(summary.dominant_activity, contracts::ActivityLabel::Sitting);
        assert!(summary.metrics.peak_intensity > summary.metrics.average_intensity);
    }

    /// Model and feature layout disagree
    #[tokio::test]
    async fn test_incompatible_model_fails_at_startup() {
        let blueprint = blueprint();
        let mut incompatible = blueprint.clone();
        incompatible.features.bands.pop();

        let spawned = RecognitionService::spawn(
            &blueprint.service,
            OrchestratorConfig::from_blueprint(&incompatible),
            model(&blueprint),
            Arc::new(CounterRegistry::new()),
            None,
        );
        assert!(matches!(
            spawned,
            Err(classifier::ClassifierError::SchemaMismatch { .. })
        ));
    }
}
