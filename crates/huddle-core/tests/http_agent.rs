//! HTTP agents against a mock agent service.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use huddle_core::{
    AgentClient, AgentError, AgentKind, HttpAgent, InsightStatus, Orchestrator, PredictionAgent,
    PredictionRequest, RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request() -> PredictionRequest {
    let kickoff = Utc.with_ymd_and_hms(2025, 9, 7, 17, 0, 0).unwrap();
    PredictionRequest::new(9001, "Packers", "Bears", kickoff)
}

fn client(agent: HttpAgent, retries: u32) -> AgentClient {
    AgentClient::new(Arc::new(agent))
        .with_timeout(Duration::from_millis(500))
        .with_retry_policy(RetryPolicy::fixed(retries, Duration::from_millis(10)))
}

#[tokio::test]
async fn test_predict_posts_game_data_and_parses_vote() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agents/weather/predict"))
        .and(body_partial_json(json!({
            "game_data": {
                "game_id": 9001,
                "home_team_name": "Packers",
                "away_team_name": "Bears",
                "venue": "Packers Stadium",
                "is_dome": false
            },
            "include_reasoning": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "winner": "packers",
            "confidence": 0.71,
            "reasoning": "Lake effect snow slows the Bears passing game"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Weather, server.uri()).unwrap();
    let vote = client(agent, 0)
        .vote(&request(), Duration::from_millis(500))
        .await
        .unwrap();

    assert_eq!(vote.predicted_winner, "Packers");
    assert_eq!(vote.confidence, 0.71);
    assert!(vote.reasoning.contains("Lake effect"));
}

#[tokio::test]
async fn test_predicted_winner_alias_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agents/market/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predicted_winner": "Bears",
            "confidence": 0.55
        })))
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Market, server.uri()).unwrap();
    let raw = agent.predict(&request()).await.unwrap();
    assert_eq!(raw.winner, "Bears");
    assert!(raw.reasoning.is_empty());
}

#[tokio::test]
async fn test_server_errors_are_retried_until_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agents/basic/predict"))
        .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
        .expect(3)
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Statistical, server.uri()).unwrap();
    let err = client(agent, 2)
        .vote(&request(), Duration::from_millis(500))
        .await
        .unwrap_err();

    match err {
        AgentError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, AgentError::Transport { .. }));
        }
        other => panic!("expected exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_request_is_retried_like_any_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agents/news/predict"))
        .respond_with(ResponseTemplate::new(422).set_body_string("missing game_time"))
        .expect(4)
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Sentiment, server.uri()).unwrap();
    let err = client(agent, 3)
        .vote(&request(), Duration::from_millis(500))
        .await
        .unwrap_err();

    match err {
        AgentError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*last, AgentError::InvalidResponse { .. }));
        }
        other => panic!("expected exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_garbled_body_then_valid_answer_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agents/market/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/agents/market/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "winner": "Bears",
            "confidence": 0.9
        })))
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Market, server.uri()).unwrap();
    let vote = client(agent, 3)
        .vote(&request(), Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(vote.predicted_winner, "Bears");
}

#[tokio::test]
async fn test_recovers_after_transient_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/agents/basic/predict"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/agents/basic/predict"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "winner": "Bears",
            "confidence": 0.6,
            "reasoning": "healthier roster"
        })))
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Statistical, server.uri()).unwrap();
    let vote = client(agent, 3)
        .vote(&request(), Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(vote.predicted_winner, "Bears");
}

#[tokio::test]
async fn test_unknown_team_in_response_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "winner": "Vikings",
            "confidence": 0.9
        })))
        .expect(1)
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Weather, server.uri()).unwrap();
    let err = client(agent, 3)
        .vote(&request(), Duration::from_millis(500))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Vikings"));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"winner": "Bears", "confidence": 0.6}))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let agent = HttpAgent::new(AgentKind::Market, server.uri()).unwrap();
    let err = client(agent, 0)
        .vote(&request(), Duration::from_millis(50))
        .await
        .unwrap_err();
    match err {
        AgentError::Exhausted { last, .. } => {
            assert!(matches!(*last, AgentError::Timeout { timeout_ms: 50, .. }));
        }
        other => panic!("expected exhausted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_probe_reads_health_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/degraded/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "degraded"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ok = HttpAgent::new(AgentKind::Statistical, server.uri()).unwrap();
    assert!(ok.probe().await.is_ok());

    let degraded = HttpAgent::new(AgentKind::Weather, server.uri())
        .unwrap()
        .with_health_path("/degraded/health");
    assert!(matches!(
        degraded.probe().await,
        Err(AgentError::Unhealthy { status, .. }) if status == "degraded"
    ));

    let broken = HttpAgent::new(AgentKind::Market, server.uri())
        .unwrap()
        .with_health_path("/broken/health");
    assert!(matches!(broken.probe().await, Err(AgentError::Transport { .. })));
}

#[tokio::test]
async fn test_orchestrator_over_http_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&server)
        .await;
    for (slug, winner, confidence) in [
        ("basic", "Packers", 0.66),
        ("weather", "Packers", 0.58),
        ("news", "Bears", 0.52),
    ] {
        Mock::given(method("POST"))
            .and(path(format!("/agents/{slug}/predict")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "winner": winner,
                "confidence": confidence,
                "reasoning": format!("{slug} model output")
            })))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path("/agents/market/predict"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let orchestrator = AgentKind::ALL
        .iter()
        .fold(Orchestrator::builder(), |builder, kind| {
            builder.register(client(HttpAgent::new(*kind, server.uri()).unwrap(), 1))
        })
        .probe_timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let report = orchestrator.check_health().await;
    assert!(report.all_healthy);

    let result = orchestrator.predict(request()).await.unwrap();
    // Market fails and falls back to the home team at 0.5.
    assert_eq!(result.overall_winner, "Packers");
    assert_eq!(result.consensus_label, "3/4 agents");
    assert!((result.overall_confidence - 0.58).abs() < 1e-9);
    assert_eq!(
        result.insight(AgentKind::Market).map(|i| i.status),
        Some(InsightStatus::Fallback)
    );
    assert!(result.consensus_reasoning.contains("basic model output"));
}
