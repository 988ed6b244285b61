//! End-to-end consensus behaviour through the orchestrator facade.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use huddle_core::fakes::{ScriptedAgent, Step};
use huddle_core::{
    AgentClient, AgentKind, ConsensusStrength, FanOutDispatcher, HealthMonitor,
    InsightStatus, Orchestrator, PredictionRequest, RetryPolicy,
};

const HOME: &str = "Chiefs";
const AWAY: &str = "Bills";

fn request() -> PredictionRequest {
    let kickoff = Utc.with_ymd_and_hms(2025, 1, 26, 23, 30, 0).unwrap();
    PredictionRequest::new(401, HOME, AWAY, kickoff).with_venue("Arrowhead Stadium")
}

fn client(agent: &Arc<ScriptedAgent>) -> AgentClient {
    AgentClient::new(agent.clone())
        .with_timeout(Duration::from_secs(30))
        .with_retry_policy(RetryPolicy::fixed(3, Duration::from_secs(1)))
}

fn orchestrator(agents: &[Arc<ScriptedAgent>]) -> Orchestrator {
    agents
        .iter()
        .fold(Orchestrator::builder(), |b, a| b.register(client(a)))
        .build()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_result_set_always_covers_every_registered_agent() {
    let agents = vec![
        ScriptedAgent::always(AgentKind::Statistical, HOME, 0.7).shared(),
        ScriptedAgent::new(AgentKind::Weather).repeat(Step::Hang).shared(),
        ScriptedAgent::new(AgentKind::Sentiment)
            .repeat(Step::fail("503"))
            .with_probe(Step::fail("down"))
            .shared(),
        ScriptedAgent::new(AgentKind::Market)
            .repeat(Step::Invalid("garbage".into()))
            .shared(),
    ];
    let clients: Vec<AgentClient> = agents.iter().map(client).collect();
    let health = Arc::new(HealthMonitor::new(clients.clone()));
    health.check_all().await;
    let dispatcher = FanOutDispatcher::new(clients, health);

    let set = dispatcher.dispatch(Arc::new(request())).await;
    assert_eq!(set.len(), agents.len());
    assert_eq!(set.live_count(), 1);
    assert_eq!(set.fallback_count(), 2);
    assert_eq!(set.excluded_count(), 1);
    for vote in set.represented_votes() {
        assert!(vote.predicted_winner == HOME || vote.predicted_winner == AWAY);
    }
}

#[tokio::test(start_paused = true)]
async fn test_unanimous_confident_agents_win_together() {
    let agents = vec![
        ScriptedAgent::always(AgentKind::Statistical, AWAY, 0.6).shared(),
        ScriptedAgent::always(AgentKind::Weather, AWAY, 0.75).shared(),
        ScriptedAgent::always(AgentKind::Sentiment, AWAY, 0.9).shared(),
        ScriptedAgent::always(AgentKind::Market, AWAY, 0.65).shared(),
    ];
    let result = orchestrator(&agents).predict(request()).await.unwrap();

    assert_eq!(result.overall_winner, AWAY);
    assert!(result.overall_confidence >= 0.6);
    assert_eq!(result.aligned_agents, result.total_agents);
    assert_eq!(result.strength, ConsensusStrength::Unanimous);
    assert_eq!(result.consensus_label, "4/4 agents");
    assert!(!result.low_confidence);
}

#[tokio::test(start_paused = true)]
async fn test_always_timing_out_agent_contributes_home_fallback() {
    let agents = vec![
        ScriptedAgent::always(AgentKind::Statistical, AWAY, 0.8).shared(),
        ScriptedAgent::new(AgentKind::Weather).repeat(Step::Hang).shared(),
    ];
    let result = orchestrator(&agents).predict(request()).await.unwrap();

    let weather = result.insight(AgentKind::Weather).unwrap();
    assert_eq!(weather.status, InsightStatus::Fallback);
    assert_eq!(weather.confidence, Some(0.5));
    assert_eq!(weather.predicted_winner.as_deref(), Some(HOME));
    assert_eq!(agents[1].calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_mass_weighted_scenario_three_of_four() {
    let agents = vec![
        ScriptedAgent::new(AgentKind::Statistical)
            .repeat(Step::vote(HOME, 0.8, "better point differential"))
            .shared(),
        ScriptedAgent::new(AgentKind::Weather)
            .repeat(Step::vote(HOME, 0.6, "cold favors the home run game"))
            .shared(),
        ScriptedAgent::new(AgentKind::Sentiment)
            .repeat(Step::vote(AWAY, 0.55, "positive press"))
            .shared(),
        ScriptedAgent::new(AgentKind::Market)
            .repeat(Step::vote(HOME, 0.5, "line is a pick'em"))
            .shared(),
    ];
    let result = orchestrator(&agents).predict(request()).await.unwrap();

    assert_eq!(result.overall_winner, HOME);
    assert!((result.overall_confidence - 0.6333).abs() < 1e-9);
    assert_eq!(result.consensus_label, "3/4 agents");
    assert_eq!(result.aligned_agents, 3);
    assert_eq!(result.strength, ConsensusStrength::Majority);
    assert!(result.consensus_reasoning.contains("confidence mass 1.90 vs 0.55"));

    let flags: Vec<bool> = result.agent_predictions.iter().map(|i| i.is_aligned).collect();
    assert_eq!(flags, vec![true, true, false, true]);
}

#[tokio::test(start_paused = true)]
async fn test_excluded_agent_counts_in_denominator() {
    let agents = vec![
        ScriptedAgent::always(AgentKind::Statistical, HOME, 0.9)
            .with_probe(Step::fail("connection refused"))
            .shared(),
        ScriptedAgent::always(AgentKind::Weather, AWAY, 0.7).shared(),
        ScriptedAgent::always(AgentKind::Sentiment, AWAY, 0.7).shared(),
        ScriptedAgent::new(AgentKind::Market).repeat(Step::Hang).shared(),
    ];
    let orchestrator = orchestrator(&agents);
    let report = orchestrator.check_health().await;
    assert_eq!(report.unhealthy_agents, vec![AgentKind::Statistical]);

    let result = orchestrator.predict(request()).await.unwrap();

    assert_eq!(result.overall_winner, AWAY);
    assert_eq!(result.consensus_label, "2/4 agents");
    assert_eq!(result.total_agents, 4);
    assert!((result.overall_confidence - 0.7).abs() < 1e-9);
    assert_eq!(agents[0].calls(), 0);

    let statuses: Vec<InsightStatus> = result.agent_predictions.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![
            InsightStatus::Excluded,
            InsightStatus::Live,
            InsightStatus::Live,
            InsightStatus::Fallback
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_alignment_never_exceeds_total() {
    let agents = vec![
        ScriptedAgent::always(AgentKind::Statistical, HOME, 0.51).shared(),
        ScriptedAgent::always(AgentKind::Weather, AWAY, 0.52).shared(),
        ScriptedAgent::new(AgentKind::Sentiment).repeat(Step::Hang).shared(),
    ];
    let result = orchestrator(&agents).predict(request()).await.unwrap();

    assert!(result.aligned_agents <= result.total_agents);
    assert!(result.aligned_agents < result.total_agents);
    // Home 0.51 + fallback 0.5 outweighs away 0.52.
    assert_eq!(result.overall_winner, HOME);
    assert_eq!(result.aligned_agents, 2);
}

#[tokio::test(start_paused = true)]
async fn test_all_agents_down_still_answers() {
    let agents = vec![
        ScriptedAgent::new(AgentKind::Statistical).repeat(Step::fail("refused")).shared(),
        ScriptedAgent::new(AgentKind::Weather).repeat(Step::Hang).shared(),
    ];
    let result = orchestrator(&agents).predict(request()).await.unwrap();

    assert!(result.low_confidence);
    assert_eq!(result.overall_winner, HOME);
    assert_eq!(result.overall_confidence, 0.5);
    assert_eq!(result.consensus_label, "2/2 agents");
}

#[tokio::test(start_paused = true)]
async fn test_repeated_predictions_are_identical() {
    let agents = vec![
        ScriptedAgent::always(AgentKind::Statistical, HOME, 0.62).shared(),
        ScriptedAgent::always(AgentKind::Weather, AWAY, 0.62).shared(),
        ScriptedAgent::always(AgentKind::Market, AWAY, 0.4).shared(),
    ];
    let orchestrator = orchestrator(&agents);
    let first = orchestrator.predict(request()).await.unwrap();
    let second = orchestrator.predict(request()).await.unwrap();

    assert_eq!(first.overall_winner, second.overall_winner);
    assert_eq!(first.overall_confidence, second.overall_confidence);
    assert_eq!(first.consensus_reasoning, second.consensus_reasoning);
    assert_eq!(first.consensus_label, second.consensus_label);
    assert_eq!(first.aligned_agents, second.aligned_agents);
    let alignment = |r: &huddle_core::ConsensusResult| {
        r.agent_predictions
            .iter()
            .map(|i| (i.agent, i.is_aligned, i.predicted_winner.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(alignment(&first), alignment(&second));
}

#[tokio::test(start_paused = true)]
async fn test_agents_are_called_concurrently() {
    let agents: Vec<Arc<ScriptedAgent>> = AgentKind::ALL
        .iter()
        .map(|kind| {
            ScriptedAgent::new(*kind)
                .repeat(Step::delayed(Duration::from_secs(5), HOME, 0.6))
                .shared()
        })
        .collect();
    let started = tokio::time::Instant::now();
    let result = orchestrator(&agents).predict(request()).await.unwrap();

    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(result.aligned_agents, 4);
}

#[tokio::test(start_paused = true)]
async fn test_clamped_confidence_is_flagged_not_fatal() {
    let agents = vec![ScriptedAgent::always(AgentKind::Market, AWAY, 1.7).shared()];
    let orchestrator = orchestrator(&agents);
    let result = orchestrator.predict(request()).await.unwrap();
    assert_eq!(result.overall_confidence, 1.0);
    assert_eq!(result.agent_predictions[0].confidence, Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn test_recovered_agent_rejoins_after_recheck() {
    let flaky = ScriptedAgent::always(AgentKind::Weather, AWAY, 0.8)
        .with_probe(Step::fail("down"))
        .shared();
    let orchestrator = orchestrator(&[flaky.clone()]);

    orchestrator.check_health().await;
    let excluded = orchestrator.predict(request()).await.unwrap();
    assert_eq!(excluded.agent_predictions[0].status, InsightStatus::Excluded);
    assert!(excluded.low_confidence);

    flaky.set_probe(Step::ok());
    orchestrator.check_health().await;
    let live = orchestrator.predict(request()).await.unwrap();
    assert_eq!(live.agent_predictions[0].status, InsightStatus::Live);
    assert_eq!(live.overall_winner, AWAY);
}

#[tokio::test(start_paused = true)]
async fn test_garbled_first_answer_is_retried_into_live_vote() {
    let agents = vec![ScriptedAgent::new(AgentKind::Market)
        .then(Step::Invalid("garbled body".into()))
        .repeat(Step::vote(AWAY, 0.9, "sharp money"))
        .shared()];
    let result = orchestrator(&agents).predict(request()).await.unwrap();

    assert_eq!(agents[0].calls(), 2);
    assert_eq!(result.overall_winner, AWAY);
    assert_eq!(result.agent_predictions[0].status, InsightStatus::Live);
    assert!(!result.low_confidence);
}
