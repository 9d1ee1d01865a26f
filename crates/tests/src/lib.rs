//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 端到端路由测试（Broker -> Ingestion -> Dispatcher -> Sinks）
//! - 故障隔离与并发提交

#[cfg(test)]
mod contract_tests {
    use contracts::{FailureKind, FailureReason, Outcome};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_outcome_wire_format() {
        let failed = Outcome::Failed(FailureReason::sink_error("ODD", "disk full"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["Failed"]["kind"], "sink_error");
        assert_eq!(json["Failed"]["sink"], "ODD");

        let back: Outcome = serde_json::from_value(json).unwrap();
        let kind = back.failure().map(FailureReason::kind);
        assert_eq!(kind, Some(FailureKind::SinkError));
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use chrono::{Datelike, NaiveDate};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ContractError, FailureKind, FailureReason, Outcome, ParsedRecord, Producer, Record,
        RouteConfig, SinkConfig, SinkType,
    };
    use dispatcher::{
        create_dispatcher, Dispatcher, DispatcherConfig, FnSink, MemoryErrorReporter, SinkHandle,
        SinkSettings,
    };
    use ingestion::{IngestionPipeline, MemoryBroker};
    use serde_json::Value;
    use tempfile::TempDir;

    const REFERENCE_DATE: &str = "2024-06-15";

    fn router_toml(dir: &TempDir) -> String {
        let even = dir.path().join("even.jsonl");
        let odd = dir.path().join("odd.jsonl");
        format!(
            r#"
version = "V1"
ingress_topic = "SOURCE"

[broker]
topic_capacity = 256
consumers_per_topic = 1

[reporting]
excerpt_chars = 32

[[routes]]
topic = "SOURCE"
[routes.sink]
name = "SOURCE"
sink_type = "age_parity"
params = {{ even_topic = "EVEN", odd_topic = "ODD", reference_date = "{REFERENCE_DATE}" }}

[[routes]]
topic = "EVEN"
[routes.sink]
name = "EVEN"
sink_type = "file"
params = {{ path = "{}" }}

[[routes]]
topic = "ODD"
[routes.sink]
name = "ODD"
sink_type = "file"
params = {{ path = "{}" }}
"#,
            even.display(),
            odd.display()
        )
    }

    fn user(name: &str, dob: &str) -> String {
        serde_json::json!({"name": name, "address": "1 Main St", "dateOfBirth": dob}).to_string()
    }

    fn read_lines(path: &std::path::Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn age(dob: &str) -> i32 {
        let born = NaiveDate::parse_from_str(dob, "%Y-%m-%d").unwrap();
        let today = NaiveDate::parse_from_str(REFERENCE_DATE, "%Y-%m-%d").unwrap();
        let mut age = today.year() - born.year();
        if (today.month(), today.day()) < (born.month(), born.day()) {
            age -= 1;
        }
        age
    }

    /// End-to-end test: Broker -> IngestionPipeline -> Dispatcher -> AgeParity -> File sinks
    ///
    /// 验证完整的数据流：
    /// 1. 用户数据发布到 SOURCE
    /// 2. AgeParity sink 按年龄奇偶转发到 EVEN / ODD
    /// 3. 每条记录恰好落在一个文件中
    #[tokio::test]
    async fn test_e2e_source_splits_into_even_and_odd() {
        let dir = TempDir::new().unwrap();
        let blueprint =
            ConfigLoader::load_from_str(&router_toml(&dir), ConfigFormat::Toml).unwrap();

        let broker = Arc::new(MemoryBroker::from_blueprint(&blueprint));
        let reporter = Arc::new(MemoryErrorReporter::new());
        let dispatcher = Arc::new(
            create_dispatcher(&blueprint, Arc::clone(&broker), reporter.clone())
                .await
                .unwrap(),
        );
        let pipeline = IngestionPipeline::start(
            Arc::clone(&broker),
            Arc::clone(&dispatcher),
            blueprint.broker.consumers_per_topic,
        )
        .unwrap();

        let people = [
            ("Ada", "1990-06-15"),
            ("Bob", "1990-06-16"),
            ("Cy", "2001-01-01"),
            ("Di", "1985-12-31"),
            ("Ed", "2024-06-15"),
        ];
        for (name, dob) in people {
            broker
                .send("SOURCE", Bytes::from(user(name, dob)))
                .await
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), broker.wait_idle())
            .await
            .unwrap();
        broker.close();
        let summary = pipeline.join().await;
        Arc::try_unwrap(dispatcher).ok().unwrap().shutdown().await;

        // 5 SOURCE deliveries + 5 forwards
        assert_eq!(summary.total, 10);
        assert_eq!(summary.delivered, 10);
        assert!(reporter.is_empty());

        let even = read_lines(&dir.path().join("even.jsonl"));
        let odd = read_lines(&dir.path().join("odd.jsonl"));
        assert_eq!(even.len() + odd.len(), people.len());

        for (name, dob) in people {
            let in_even = even.iter().any(|l| l["data"]["name"] == name);
            let in_odd = odd.iter().any(|l| l["data"]["name"] == name);
            assert_ne!(in_even, in_odd, "{name} must land in exactly one topic");
            assert_eq!(in_even, age(dob) % 2 == 0, "{name} is {}", age(dob));
        }
    }

    #[tokio::test]
    async fn test_e2e_failures_are_reported_and_isolated() {
        let dir = TempDir::new().unwrap();
        let blueprint =
            ConfigLoader::load_from_str(&router_toml(&dir), ConfigFormat::Toml).unwrap();

        let broker = Arc::new(MemoryBroker::new(["SOURCE", "EVEN", "ODD", "FOO"], 64));
        let reporter = Arc::new(MemoryErrorReporter::new());
        let dispatcher = Arc::new(
            create_dispatcher(&blueprint, Arc::clone(&broker), reporter.clone())
                .await
                .unwrap(),
        );
        let pipeline =
            IngestionPipeline::start(Arc::clone(&broker), Arc::clone(&dispatcher), 1).unwrap();

        broker.send("SOURCE", Bytes::from("not-json")).await.unwrap();
        broker
            .send("SOURCE", Bytes::from(user("Future", "2999-01-01")))
            .await
            .unwrap();
        broker.send("FOO", Bytes::from("{}")).await.unwrap();
        broker
            .send("SOURCE", Bytes::from(user("Ada", "1990-06-15")))
            .await
            .unwrap();

        broker.wait_idle().await;
        broker.close();
        let summary = pipeline.join().await;

        assert_eq!(summary.parse_errors, 1);
        assert_eq!(summary.sink_errors, 1);
        assert_eq!(summary.unknown_topic, 1);
        // Ada still reaches SOURCE and EVEN after the failures
        assert_eq!(summary.delivered, 2);

        let events = reporter.events();
        assert_eq!(events.len(), 3);
        for event in &events {
            assert!(event.payload_excerpt.chars().count() <= 35);
        }
        let kinds: Vec<FailureKind> = events.iter().map(|e| e.reason.kind()).collect();
        assert!(kinds.contains(&FailureKind::ParseError));
        assert!(kinds.contains(&FailureKind::SinkError));
        assert!(kinds.contains(&FailureKind::UnknownTopic));
    }

    type Received = Arc<Mutex<Vec<(String, Value)>>>;

    fn recording(name: &'static str, received: &Received) -> SinkHandle {
        let received = Arc::clone(received);
        SinkHandle::spawn(
            FnSink::new(name, move |record: &ParsedRecord| {
                received
                    .lock()
                    .unwrap()
                    .push((name.to_string(), Value::Object(record.data.clone())));
                Ok(())
            }),
            SinkSettings::default(),
        )
    }

    fn three_topic_dispatcher(
        received: &Received,
        reporter: Arc<MemoryErrorReporter>,
    ) -> Dispatcher {
        Dispatcher::with_routes(
            [
                ("SOURCE".to_string(), recording("A", received)),
                ("EVEN".to_string(), recording("B", received)),
                ("ODD".to_string(), recording("C", received)),
            ],
            reporter,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_examples() {
        let received = Received::default();
        let reporter = Arc::new(MemoryErrorReporter::new());
        let dispatcher = three_topic_dispatcher(&received, reporter.clone());

        let delivered = dispatcher.submit(Record::new("EVEN", r#"{"n":2}"#, 0)).await;
        assert_eq!(delivered, Outcome::Delivered("B".to_string()));
        assert_eq!(
            *received.lock().unwrap(),
            vec![("B".to_string(), serde_json::json!({"n": 2}))]
        );

        let unknown = dispatcher.submit(Record::new("FOO", "...", 1)).await;
        let expected = Outcome::Failed(FailureReason::unknown_topic("FOO"));
        assert_eq!(unknown, expected);

        let malformed = dispatcher.submit(Record::new("SOURCE", "not-json", 2)).await;
        assert_eq!(failure_kind(&malformed), Some(FailureKind::ParseError));

        // Neither failure reached a sink
        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(reporter.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submitters_preserve_per_topic_order() {
        let received = Received::default();
        let dispatcher = Arc::new(three_topic_dispatcher(
            &received,
            Arc::new(MemoryErrorReporter::new()),
        ));

        // One submitter per topic, each submitting sequentially
        let tasks: Vec<_> = ["SOURCE", "EVEN", "ODD"]
            .into_iter()
            .map(|topic| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    for n in 0..50 {
                        let payload = format!(r#"{{"n":{n}}}"#);
                        let outcome = dispatcher.submit(Record::new(topic, payload, n)).await;
                        assert!(outcome.is_delivered());
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 150);
        for sink in ["A", "B", "C"] {
            let order: Vec<u64> = received
                .iter()
                .filter(|(name, _)| name == sink)
                .map(|(_, data)| data["n"].as_u64().unwrap())
                .collect();
            assert_eq!(order, (0..50).collect::<Vec<_>>(), "sink {sink}");
        }
    }

    async fn submit(dispatcher: &Dispatcher, topic: &str, payload: &str) -> Outcome {
        dispatcher
            .submit(Record::new(topic, payload.to_owned(), 0))
            .await
    }

    fn failure_kind(outcome: &Outcome) -> Option<FailureKind> {
        outcome.failure().map(FailureReason::kind)
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_affect_others() {
        let received = Received::default();
        let reporter = Arc::new(MemoryErrorReporter::new());
        let flaky = SinkHandle::spawn(
            FnSink::new("FLAKY", |record: &ParsedRecord| {
                if record.get("explode").is_some() {
                    panic!("exploding record");
                }
                if record.get("fail").is_some() {
                    return Err(ContractError::sink_write("FLAKY", "refused"));
                }
                Ok(())
            }),
            SinkSettings::default(),
        );
        let config = DispatcherConfig::new(vec![RouteConfig::new(
            "EVEN",
            SinkConfig::new("EVEN", SinkType::Log),
        )]);
        let dispatcher = Dispatcher::builder(config)
            .reporter(reporter.clone())
            .route("FLAKY", flaky)
            .route("ODD", recording("C", &received))
            .build()
            .await
            .unwrap();

        let outcomes = [
            submit(&dispatcher, "FLAKY", r#"{"explode":1}"#).await,
            submit(&dispatcher, "FLAKY", r#"{"fail":1}"#).await,
            submit(&dispatcher, "FLAKY", r#"{"ok":1}"#).await,
            submit(&dispatcher, "ODD", r#"{"n":1}"#).await,
            submit(&dispatcher, "EVEN", r#"{"n":2}"#).await,
        ];

        let kinds: Vec<_> = outcomes.iter().map(failure_kind).collect();
        assert_eq!(kinds[0], Some(FailureKind::SinkError));
        assert_eq!(kinds[1], Some(FailureKind::SinkError));
        assert_eq!(outcomes[2], Outcome::Delivered("FLAKY".to_string()));
        assert_eq!(outcomes[3], Outcome::Delivered("C".to_string()));
        assert_eq!(outcomes[4], Outcome::Delivered("EVEN".to_string()));
        assert_eq!(reporter.len(), 2);

        let metrics = dispatcher.metrics();
        let flaky = metrics.iter().find(|(name, _)| name == "FLAKY").unwrap().1;
        assert_eq!(flaky.panic_count, 1);
        assert_eq!(flaky.failure_count, 1);
        assert_eq!(flaky.delivered_count, 1);

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_send_boundary_reports_errors_synchronously() {
        let broker = MemoryBroker::new(["SOURCE"], 1);

        let ack = broker.send("SOURCE", Bytes::from("{}")).await.unwrap();
        assert_eq!(ack.offset, 0);

        let full = broker.send("SOURCE", Bytes::from("{}")).await.unwrap_err();
        assert!(full.is_retriable());

        let unknown = broker.send("NOPE", Bytes::from("{}")).await.unwrap_err();
        assert!(!unknown.is_retriable());
    }
}
