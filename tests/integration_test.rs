// Integration tests for jsonflood
//
// These tests drive the public API end to end: schema compilation and
// generation, delivery workers against live mock endpoints, and the final
// performance report.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

use jsonflood::{
    engine::{DeliveryEngine, EngineConfig, ShutdownCoordinator, ShutdownReason},
    error::SchemaError,
    mock_server::{MockEndpoint, MockEndpointConfig, RANDOM_STATUS_CODES},
    report::PerformanceReport,
    schema::InstanceGenerator,
};

// ==================================================================================================
// Test Helpers
// ==================================================================================================

fn generator(schema: Value) -> InstanceGenerator {
    InstanceGenerator::from_schema(&schema).expect("schema should compile")
}

/// Run `engine` for `duration`, then trigger shutdown and return the report
async fn run_for(engine: &DeliveryEngine, duration: Duration) -> PerformanceReport {
    let coordinator = ShutdownCoordinator::new();
    let token = coordinator.token();

    let run = engine.run_until_shutdown(&coordinator);
    let stop = async {
        tokio::time::sleep(duration).await;
        assert!(coordinator.trigger(ShutdownReason::Requested));
    };

    let (report, ()) = tokio::join!(run, stop);
    assert!(token.is_cancelled());
    report.expect("run should produce a report")
}

fn fast_config(url: &str, clients: usize) -> EngineConfig {
    let mut config = EngineConfig::new(Url::parse(url).unwrap()).with_clients(clients);
    config.connect_timeout = Duration::from_secs(2);
    config.request_timeout = Duration::from_secs(2);
    config
}

fn decimals(value: f64) -> usize {
    let text = value.to_string();
    text.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0)
}

// ==================================================================================================
// Generation properties
// ==================================================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_enum_values_are_members(
        values in prop::collection::vec(any::<i32>(), 1..8),
        seed in any::<u64>(),
    ) {
        let gen = generator(json!({"type": "string", "enum": values}));
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let value = gen.generate_with(&mut rng);
            prop_assert!(values.iter().any(|v| json!(v) == value));
        }
    }

    #[test]
    fn test_integer_within_bounds(a in -1000i64..1000, b in -1000i64..1000, seed in any::<u64>()) {
        let (lo, hi) = (a.min(b), a.max(b));
        let gen = generator(json!({"type": "integer", "minimum": lo, "maximum": hi}));
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let value = gen.generate_with(&mut rng).as_i64().unwrap();
            prop_assert!((lo..=hi).contains(&value));
        }
    }

    #[test]
    fn test_number_within_bounds_two_decimals(
        a in -1000.0f64..1000.0,
        b in -1000.0f64..1000.0,
        seed in any::<u64>(),
    ) {
        let (lo, hi) = (a.min(b), a.max(b));
        let gen = generator(json!({"type": "number", "minimum": lo, "maximum": hi}));
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let value = gen.generate_with(&mut rng).as_f64().unwrap();
            prop_assert!(value >= lo && value <= hi);
            if hi - lo >= 0.02 {
                prop_assert!(decimals(value) <= 2);
            }
        }
    }

    #[test]
    fn test_fractional_integer_bounds_respected(
        a in -1000.0f64..1000.0,
        b in -1000.0f64..1000.0,
        seed in any::<u64>(),
    ) {
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assume!(lo.ceil() <= hi.floor());
        let gen = generator(json!({"type": "integer", "minimum": lo, "maximum": hi}));
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let value = gen.generate_with(&mut rng).as_i64().unwrap() as f64;
            prop_assert!(value >= lo && value <= hi);
        }
    }

    #[test]
    fn test_array_length_within_bounds(min in 0usize..6, extra in 0usize..6, seed in any::<u64>()) {
        let max = min + extra;
        let gen = generator(json!({
            "type": "array",
            "minItems": min,
            "maxItems": max,
            "items": {"type": "boolean"}
        }));
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let value = gen.generate_with(&mut rng);
            let items = value.as_array().unwrap();
            prop_assert!(items.len() >= min && items.len() <= max);
            prop_assert!(items.iter().all(Value::is_boolean));
        }
    }

    #[test]
    fn test_object_keys_required_plus_bounded_optional(
        optional_count in 0usize..6,
        seed in any::<u64>(),
    ) {
        let mut properties = serde_json::Map::new();
        properties.insert("id".to_string(), json!({"type": "string", "format": "uuid"}));
        for i in 0..optional_count {
            properties.insert(format!("opt{i}"), json!({"type": "boolean"}));
        }
        let gen = generator(json!({
            "type": "object",
            "required": ["id"],
            "properties": properties
        }));

        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..16 {
            let value = gen.generate_with(&mut rng);
            let object = value.as_object().unwrap();
            prop_assert!(object.contains_key("id"));
            let extra = object.len() - 1;
            prop_assert!(extra <= optional_count.min(2));
            prop_assert!(object.keys().all(|k| k == "id" || properties.contains_key(k)));
        }
    }
}

#[test]
fn test_extreme_number_range_generates() {
    let gen = generator(json!({"type": "number", "minimum": -1e308, "maximum": 1e308}));
    for _ in 0..1000 {
        let value = gen.generate().as_f64().unwrap();
        assert!((-1e308..=1e308).contains(&value));
    }
}

#[test]
fn test_out_of_range_schemas_rejected_at_compile_time() {
    for schema in [
        json!({"type": "array", "minItems": u64::MAX}),
        json!({"type": "integer", "minimum": 1.2, "maximum": 1.8}),
    ] {
        let err = InstanceGenerator::from_schema(&schema).unwrap_err();
        assert!(matches!(err, SchemaError::Structure { .. }), "{schema}");
    }
}

#[test]
fn test_array_default_length() {
    let gen = generator(json!({"type": "array", "items": {"type": "null"}}));
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let len = gen.generate_with(&mut rng).as_array().unwrap().len();
        assert!((1..=3).contains(&len), "unexpected length {len}");
    }
}

// ==================================================================================================
// End-to-end generation scenarios
// ==================================================================================================

#[test]
fn test_constant_integer_object() {
    let gen = generator(json!({
        "type": "object",
        "required": ["x"],
        "properties": {"x": {"type": "integer", "minimum": 5, "maximum": 5}}
    }));
    for _ in 0..50 {
        assert_eq!(gen.generate(), json!({"x": 5}));
    }
}

#[test]
fn test_uuid_instances_are_distinct_v4() {
    let gen = generator(json!({"type": "string", "format": "uuid"}));
    let first = gen.generate();
    let second = gen.generate();

    for value in [&first, &second] {
        let parsed = uuid::Uuid::parse_str(value.as_str().unwrap()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
        assert_eq!(parsed.get_variant(), uuid::Variant::RFC4122);
    }
    assert_ne!(first, second);
}

#[test]
fn test_self_referencing_schema_is_bounded() {
    let gen = generator(json!({
        "type": "object",
        "required": ["name", "child"],
        "properties": {
            "name": {"type": "string", "format": "email"},
            "child": {"$ref": "#"}
        }
    }));

    let mut value = gen.generate();
    let mut depth = 0;
    while let Some(child) = value.get("child").cloned() {
        value = child;
        depth += 1;
    }
    assert!(depth <= jsonflood::schema::MAX_DEPTH + 1);
    assert_eq!(value, json!(jsonflood::schema::MAX_DEPTH_SENTINEL));
}

// ==================================================================================================
// Delivery scenarios
// ==================================================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_always_ok_endpoint_completes_every_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/events/")
        .with_status(200)
        .expect_at_least(1)
        .create_async()
        .await;

    let url = format!("{}/events/", server.url());
    let engine = DeliveryEngine::new(
        generator(json!({"type": "object", "required": ["id"], "properties": {"id": {"type": "string", "format": "uuid"}}})),
        fast_config(&url, 4),
    );

    let report = run_for(&engine, Duration::from_millis(300)).await;

    assert!(report.requests_sent > 0);
    assert_eq!(report.requests_completed, report.requests_sent);
    assert_eq!(report.dead_connections, 0);
    assert!(report.errors_by_status.is_empty());
    assert_eq!(report.clients, 4);
    assert!((report.completion_rate - 100.0).abs() < f64::EPSILON);
    mock.assert_async().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_always_failing_endpoint_records_every_status() {
    let mut endpoint = MockEndpoint::new(MockEndpointConfig {
        port: 0,
        status: Some(500),
    })
    .unwrap();
    endpoint.start().await.unwrap();

    let engine = DeliveryEngine::new(generator(json!({"type": "boolean"})), fast_config(&endpoint.url(), 4));
    let report = run_for(&engine, Duration::from_millis(300)).await;

    assert!(report.requests_sent > 0);
    assert_eq!(report.requests_completed, 0);
    assert_eq!(report.errors_by_status.get(&500), Some(&report.requests_sent));
    assert_eq!(report.errors_by_status.len(), 1);
    assert!(report.dead_connections > 0);
    assert_eq!(endpoint.received(), report.requests_sent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sub_path_is_accepted() {
    let mut endpoint = MockEndpoint::new(MockEndpointConfig {
        port: 0,
        status: Some(202),
    })
    .unwrap();
    let port = endpoint.start().await.unwrap();

    let url = format!("http://127.0.0.1:{port}/events/batch/7");
    let engine = DeliveryEngine::new(generator(json!({"type": "null"})), fast_config(&url, 1));
    let report = run_for(&engine, Duration::from_millis(150)).await;

    assert!(report.requests_completed > 0);
    assert_eq!(report.requests_completed, report.requests_sent);
}

// ==================================================================================================
// Mock endpoint routing
// ==================================================================================================

#[tokio::test]
async fn test_mock_router_fixed_status() {
    let endpoint = MockEndpoint::new(MockEndpointConfig {
        port: 0,
        status: Some(404),
    })
    .unwrap();

    let response = endpoint
        .router()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/events/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"a":1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(endpoint.received(), 1);
}

#[tokio::test]
async fn test_mock_router_random_status() {
    let endpoint = MockEndpoint::new(MockEndpointConfig::default()).unwrap();

    for _ in 0..20 {
        let response = endpoint
            .router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/events/nested/path")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(RANDOM_STATUS_CODES.contains(&response.status().as_u16()));
    }
    assert_eq!(endpoint.received(), 20);
}

#[tokio::test]
async fn test_mock_router_rejects_other_methods() {
    let endpoint = MockEndpoint::new(MockEndpointConfig {
        port: 0,
        status: Some(200),
    })
    .unwrap();

    let response = endpoint
        .router()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/events/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(endpoint.received(), 0);
}
