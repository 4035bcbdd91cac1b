//! Integration tests for the validator/research pipeline
//!
//! The agent runtime is scripted; RAG, the three research backends, the
//! geocoder, and the insight store run on wiremock.

mod common;

use common::{MockRuntime, test_config};
use std::sync::Arc;
use wayfarer::agents::AgentKind;
use wayfarer::metrics::Metrics;
use wayfarer::research::{ResearchError, ResearchPipeline};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SPECIFIC: &str =
    r#"{"type": "specific", "queries": ["Where can I find the best biryani in Karachi?"]}"#;

const SYNTHESIS_OK: &str = r#"{
    "similarity_score": 2.5,
    "similarity_explanation": "Sources largely agree",
    "combined_research": "Karachi is renowned for biryani; the dish is widely rated highly.",
    "location": "Karachi, Pakistan"
}"#;

const CONVERSION_OK: &str = r#"{
    "country": "PK",
    "city": "Karachi",
    "region_code": "Sindh",
    "latitude": "24.8607343",
    "longitude": "67.0011364",
    "category": "Food & Dining",
    "source": "https://example.com/biryani",
    "title": "Best biryani in Karachi",
    "content": "Karachi is renowned for biryani.",
    "tags": "biryani,food,karachi",
    "query": "model-invented query",
    "meta_obj": {"audience": ["FAMILY"], "location": "Karachi, Pakistan"}
}"#;

fn scripted_runtime() -> MockRuntime {
    MockRuntime::new()
        .with_response(AgentKind::ResearchClassifier, SPECIFIC)
        .with_response(AgentKind::Synthesis, SYNTHESIS_OK)
        .with_response(AgentKind::Conversion, CONVERSION_OK)
}

fn pipeline_for(server: &MockServer, runtime: MockRuntime) -> Arc<ResearchPipeline> {
    let config = test_config(&server.uri());
    Arc::new(
        ResearchPipeline::new(&config, Arc::new(runtime), Arc::new(Metrics::new().unwrap()))
            .unwrap(),
    )
}

async fn mount_rag_empty(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/rag/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entities": [], "chunks": [], "audience": [], "travel_style": []
        })))
        .mount(server)
        .await;
}

async fn mount_source(server: &MockServer, name: &str, status: u16) {
    let template = if status == 200 {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": format!("{name} research findings"),
            "citations": [format!("https://example.com/{name}")],
        }))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("POST"))
        .and(path(format!("/src-{name}/search")))
        .respond_with(template)
        .mount(server)
        .await;
}

async fn mount_geocode_ok(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "OK",
            "results": [{
                "geometry": {"location": {"lat": 24.8607343, "lng": 67.0011364}},
                "address_components": [
                    {"long_name": "Karachi", "short_name": "Karachi", "types": ["locality"]},
                    {"long_name": "Pakistan", "short_name": "PK", "types": ["country"]}
                ],
                "formatted_address": "Karachi, Pakistan",
                "place_id": "abc123"
            }]
        })))
        .mount(server)
        .await;
}

async fn mount_store(server: &MockServer, status: u16) {
    let template = if status < 400 {
        ResponseTemplate::new(status)
            .set_body_json(serde_json::json!({"id": 7, "created_at": "2025-11-02T10:00:00Z"}))
    } else {
        ResponseTemplate::new(status)
    };
    Mock::given(method("POST"))
        .and(path("/research_insights"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_specific_query_full_pipeline() {
    let server = MockServer::start().await;
    mount_rag_empty(&server).await;
    for name in ["alpha", "beta", "gamma"] {
        mount_source(&server, name, 200).await;
    }
    mount_geocode_ok(&server).await;
    mount_store(&server, 201).await;

    let pipeline = pipeline_for(&server, scripted_runtime());
    let run = pipeline.run("best biryani karachi", "test-suite").await.unwrap();

    assert_eq!(run.outcomes.len(), 1);
    let outcome = &run.outcomes[0];
    assert!(outcome.research.synthesized);
    assert_eq!(outcome.research.score.to_string(), "2.5/3");
    assert_eq!(outcome.research.location, "Karachi, Pakistan");
    assert_eq!(outcome.research.citations.len(), 3);
    assert_eq!(outcome.stored_id, Some(serde_json::json!(7)));
    assert!(outcome.store_error.is_none());

    // The originating sub-query overrides whatever the model invented.
    let insight = outcome.insight.as_ref().unwrap();
    assert_eq!(insight.query, "Where can I find the best biryani in Karachi?");
}

#[tokio::test]
async fn test_two_of_three_sources_still_synthesize() {
    let server = MockServer::start().await;
    mount_rag_empty(&server).await;
    mount_source(&server, "alpha", 200).await;
    mount_source(&server, "beta", 200).await;
    mount_source(&server, "gamma", 500).await;
    mount_geocode_ok(&server).await;
    mount_store(&server, 201).await;

    let pipeline = pipeline_for(&server, scripted_runtime());
    let run = pipeline.run("best biryani karachi", "test-suite").await.unwrap();

    let outcome = &run.outcomes[0];
    assert!(outcome.research.synthesized);
    assert_eq!(outcome.research.citations.len(), 2);
    assert!(outcome.stored_id.is_some());
}

#[tokio::test]
async fn test_single_source_yields_zero_confidence_and_no_insert() {
    let server = MockServer::start().await;
    mount_rag_empty(&server).await;
    mount_source(&server, "alpha", 200).await;
    mount_source(&server, "beta", 503).await;
    mount_source(&server, "gamma", 503).await;
    mount_geocode_ok(&server).await;
    // Zero-confidence sub-queries must never reach the store.
    Mock::given(method("POST"))
        .and(path("/research_insights"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let pipeline = pipeline_for(&server, scripted_runtime());
    let run = pipeline.run("best biryani karachi", "test-suite").await.unwrap();

    let outcome = &run.outcomes[0];
    assert!(!outcome.research.synthesized);
    assert_eq!(outcome.research.score.to_string(), "0/3");
    assert_eq!(outcome.research.location, "Unknown");
    assert!(outcome.insight.is_none());
}

#[tokio::test]
async fn test_store_failure_keeps_result_with_error_marker() {
    let server = MockServer::start().await;
    mount_rag_empty(&server).await;
    for name in ["alpha", "beta", "gamma"] {
        mount_source(&server, name, 200).await;
    }
    mount_geocode_ok(&server).await;
    mount_store(&server, 503).await;

    let pipeline = pipeline_for(&server, scripted_runtime());
    let run = pipeline.run("best biryani karachi", "test-suite").await.unwrap();

    let outcome = &run.outcomes[0];
    assert!(outcome.research.synthesized);
    assert!(outcome.insight.is_some());
    assert!(outcome.stored_id.is_none());
    assert!(outcome.store_error.as_ref().unwrap().contains("503"));
}

#[tokio::test]
async fn test_geocode_failure_does_not_invalidate_sub_query() {
    let server = MockServer::start().await;
    mount_rag_empty(&server).await;
    for name in ["alpha", "beta", "gamma"] {
        mount_source(&server, name, 200).await;
    }
    Mock::given(method("GET"))
        .and(path("/geocode/json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_store(&server, 201).await;

    let pipeline = pipeline_for(&server, scripted_runtime());
    let run = pipeline.run("best biryani karachi", "test-suite").await.unwrap();

    assert!(run.outcomes[0].stored_id.is_some());
}

#[tokio::test]
async fn test_arity_violation_aborts_before_fan_out() {
    let server = MockServer::start().await;
    let runtime = MockRuntime::new().with_response(
        AgentKind::ResearchClassifier,
        r#"{"type": "generic", "queries": ["only", "two"]}"#,
    );
    let pipeline = pipeline_for(&server, runtime);

    let err = pipeline.run("things to do in Karachi", "test-suite").await.unwrap_err();
    match err {
        ResearchError::ArityViolation { expected, got, .. } => {
            assert_eq!(expected, 5);
            assert_eq!(got, 2);
        }
        other => panic!("expected arity violation, got {other}"),
    }
}

#[tokio::test]
async fn test_ignore_classification_yields_no_outcomes() {
    let server = MockServer::start().await;
    let runtime = MockRuntime::new()
        .with_response(AgentKind::ResearchClassifier, r#"{"type": "ignore", "queries": []}"#);
    let pipeline = pipeline_for(&server, runtime);

    let run = pipeline.run("what time is it", "test-suite").await.unwrap();
    assert!(run.outcomes.is_empty());
}

#[tokio::test]
async fn test_generic_fans_out_five_sub_queries_positionally() {
    let server = MockServer::start().await;
    mount_rag_empty(&server).await;
    for name in ["alpha", "beta", "gamma"] {
        mount_source(&server, name, 200).await;
    }
    mount_geocode_ok(&server).await;
    mount_store(&server, 201).await;

    let queries = [
        "Top 10 historical sites in Karachi",
        "Top 10 beaches in Karachi",
        "Top 10 restaurants in Karachi",
        "Top 10 family attractions in Karachi",
        "Top 10 markets in Karachi",
    ];
    let classification = serde_json::json!({"type": "generic", "queries": queries}).to_string();
    let runtime = MockRuntime::new()
        .with_response(AgentKind::ResearchClassifier, &classification)
        .with_response(AgentKind::Synthesis, SYNTHESIS_OK)
        .with_response(AgentKind::Conversion, CONVERSION_OK);
    let pipeline = pipeline_for(&server, runtime);

    let run = pipeline
        .run("What are the best places to visit in Karachi?", "test-suite")
        .await
        .unwrap();

    assert_eq!(run.outcomes.len(), 5);
    for (outcome, query) in run.outcomes.iter().zip(queries) {
        assert_eq!(outcome.query, query);
        assert!(outcome.research.synthesized);
    }
}

#[tokio::test]
async fn test_known_rag_content_still_researches() {
    let server = MockServer::start().await;
    // Knowledge store already covers the topic: research continues anyway.
    Mock::given(method("POST"))
        .and(path("/rag/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entities": ["Biryani Centre"],
            "chunks": ["Biryani Centre is highly rated."],
            "audience": [],
            "travel_style": []
        })))
        .mount(&server)
        .await;
    for name in ["alpha", "beta", "gamma"] {
        mount_source(&server, name, 200).await;
    }
    mount_geocode_ok(&server).await;
    mount_store(&server, 201).await;

    let pipeline = pipeline_for(&server, scripted_runtime());
    let run = pipeline.run("best biryani karachi", "test-suite").await.unwrap();

    assert!(run.outcomes[0].research.synthesized);
    assert!(run.outcomes[0].stored_id.is_some());
}
