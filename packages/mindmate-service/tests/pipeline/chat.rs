use std::time::Duration;

use serde_json::json;

use mindmate_domain::{DataType, MemoryKind, Role};
use mindmate_service::{ChatRequest, ChatService, ClientContext, Error, IngestRequest};

use super::{Harness, ScriptedProvider, Stage, test_config};

fn service(harness: &Harness) -> ChatService {
	ChatService::new(test_config(), harness.provider.clone(), harness.stores())
}

fn request(session_id: &str, user_message: &str) -> ChatRequest {
	ChatRequest {
		session_id: session_id.to_string(),
		user_id: "U1".to_string(),
		user_message: user_message.to_string(),
		context: ClientContext::default(),
	}
}

async fn wait_for_processed(harness: &Harness, at_least: usize) {
	for _ in 0..1_000 {
		if harness.messages.processed_ids().len() >= at_least {
			return;
		}

		tokio::task::yield_now().await;
	}
}

#[tokio::test]
async fn turn_stores_both_sides_and_cleans_the_reply() {
	let harness = Harness::new(ScriptedProvider::new());
	let service = service(&harness);
	let response = service
		.handle_turn(request("S1", "Exams next week and I can't sleep."))
		.await
		.expect("Chat turn failed.");

	assert_eq!(response.message, "That sounds like a lot to carry.");
	assert_eq!(response.modality, "CBT");
	assert_eq!(response.session_insights.analysis.emotional_state, "stressed");
	assert_eq!(response.session_insights.context_turns, 0);
	assert!(!response.consolidation.triggered);

	let stored = harness.messages.all("S1");

	assert_eq!(stored.len(), 2);
	assert_eq!(stored[0].role, Role::User);
	assert_eq!(stored[0].content, "Exams next week and I can't sleep.");
	assert_eq!(stored[1].role, Role::Assistant);
	assert_eq!(stored[1].content, "That sounds like a lot to carry.");
}

#[tokio::test]
async fn later_turns_see_earlier_context() {
	let harness = Harness::new(ScriptedProvider::new());
	let service = service(&harness);

	service.handle_turn(request("S1", "First message.")).await.expect("Chat turn failed.");

	let response =
		service.handle_turn(request("S1", "Second message.")).await.expect("Chat turn failed.");

	assert_eq!(response.session_insights.context_turns, 2);
}

#[tokio::test]
async fn invalid_requests_are_rejected_before_any_call() {
	let harness = Harness::new(ScriptedProvider::new());
	let service = service(&harness);
	let empty = service.handle_turn(request("S1", "   ")).await.expect_err("Expected rejection.");
	let too_long = service
		.handle_turn(request("S1", &"a".repeat(4_001)))
		.await
		.expect_err("Expected rejection.");
	let no_session = service.handle_turn(request("", "Hello.")).await.expect_err("Expected rejection.");

	assert!(matches!(empty, Error::InvalidRequest { .. }));
	assert!(matches!(too_long, Error::InvalidRequest { .. }));
	assert!(matches!(no_session, Error::InvalidRequest { .. }));
	assert!(harness.messages.all("S1").is_empty());
	assert!(harness.provider.calls(Stage::Analysis).is_empty());
}

#[tokio::test]
async fn fourth_exchange_consolidates_the_session() {
	let harness = Harness::new(
		ScriptedProvider::new()
			.reply(Stage::Semantic, r#"[{"content": "Preparing for board exams.", "confidence": 0.9}]"#),
	);
	let service = service(&harness);
	let mut last = None;

	for index in 0..4 {
		last = Some(
			service
				.handle_turn(request("S1", &format!("Message {index}.")))
				.await
				.expect("Chat turn failed."),
		);
	}

	let last = last.expect("Expected a response.");

	assert!(last.consolidation.triggered);
	assert_eq!(last.consolidation.effective_count, 8);

	for _ in 0..1_000 {
		if harness.messages.processed_ids().len() == 8 {
			break;
		}

		tokio::task::yield_now().await;
	}

	let records = harness.memories.records();

	assert_eq!(harness.messages.processed_ids().len(), 8);
	assert_eq!(records.len(), 1);
	assert_eq!(records[0].kind(), MemoryKind::Semantic);
	assert_eq!(records[0].user_id, "U1");

	let memories = service.session_memories("S1").await.expect("Memories failed.");

	assert_eq!(memories.get(MemoryKind::Semantic).len(), 1);
}

#[tokio::test]
async fn disabled_consolidation_never_starts_a_cycle() {
	let harness = Harness::new(ScriptedProvider::new());
	let mut cfg = test_config();

	cfg.consolidation.enabled = false;

	let service = ChatService::new(cfg, harness.provider.clone(), harness.stores());
	let mut triggered = Vec::new();

	for index in 0..4 {
		let response = service
			.handle_turn(request("S1", &format!("Message {index}.")))
			.await
			.expect("Chat turn failed.");

		triggered.push(response.consolidation.triggered);
	}

	tokio::task::yield_now().await;

	assert_eq!(triggered, vec![false; 4]);
	assert!(harness.messages.processed_ids().is_empty());
	assert!(harness.provider.calls(Stage::Procedural).is_empty());
}

#[tokio::test]
async fn stats_report_store_and_hint_counts() {
	let harness = Harness::new(ScriptedProvider::new());
	let service = service(&harness);

	service.handle_turn(request("S1", "Hello.")).await.expect("Chat turn failed.");

	let stats = service.session_stats("S1").await.expect("Stats failed.");

	assert_eq!(stats.session_id, "S1");
	assert_eq!(stats.counts.database, 2);
	assert_eq!(stats.counts.in_memory, 2);
	assert_eq!(stats.counts.effective, 2);
	assert_eq!(stats.next_memory_trigger, 8);
	assert_eq!(stats.turns_until_trigger, 6);
	assert!(!stats.consolidation_in_flight);

	let err = service.session_stats("  ").await.expect_err("Expected rejection.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
}

#[tokio::test]
async fn provider_failure_keeps_the_user_turn() {
	let harness = Harness::new(ScriptedProvider::new().fail(Stage::Analysis, 1));
	let service = service(&harness);
	let err = service.handle_turn(request("S1", "Hello.")).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::Provider { .. }));

	let stored = harness.messages.all("S1");

	assert_eq!(stored.len(), 1);
	assert_eq!(stored[0].role, Role::User);
	assert_eq!(service.counters().get("S1"), 1);
	assert!(harness.provider.calls(Stage::Counselor).is_empty());
}

#[tokio::test]
async fn store_outage_does_not_fail_the_turn() {
	let harness = Harness::new(ScriptedProvider::new());

	harness.messages.fail_append();

	let service = service(&harness);
	let response = service.handle_turn(request("S1", "Hello.")).await.expect("Chat turn failed.");

	assert_eq!(response.message, "That sounds like a lot to carry.");
	assert_eq!(response.consolidation.effective_count, 2);
	assert!(harness.messages.all("S1").is_empty());
	assert_eq!(service.counters().get("S1"), 2);
}

#[tokio::test]
async fn failed_exchange_does_not_stall_the_trigger() {
	let harness = Harness::new(ScriptedProvider::new().fail(Stage::Counselor, 1));
	let service = service(&harness);
	let err = service.handle_turn(request("S1", "Message 0.")).await.expect_err("Expected failure.");

	assert!(matches!(err, Error::Provider { .. }));
	assert_eq!(service.counters().get("S1"), 1);

	let mut fired_on = Vec::new();

	for exchange in 1..=12 {
		let response = service
			.handle_turn(request("S1", &format!("Message {exchange}.")))
			.await
			.expect("Chat turn failed.");

		if response.consolidation.triggered {
			fired_on.push(exchange);
		}
	}

	// After the odd start the user turn of every fourth exchange lands on a multiple of eight.
	assert_eq!(fired_on, vec![4, 8, 12]);
	assert_eq!(harness.messages.all("S1").len(), 25);

	wait_for_processed(&harness, 8).await;

	assert!(harness.messages.processed_ids().len() >= 8);
}

#[tokio::test(start_paused = true)]
async fn concurrent_turns_on_one_session_still_reach_each_boundary() {
	let harness = Harness::new(ScriptedProvider::with_latency(Duration::from_millis(10)));
	let service = service(&harness);
	let mut triggered = 0;

	for round in 0..4 {
		let (first, second) = tokio::join!(
			service.handle_turn(request("S1", &format!("Round {round} first."))),
			service.handle_turn(request("S1", &format!("Round {round} second."))),
		);

		for response in [first, second] {
			if response.expect("Chat turn failed.").consolidation.triggered {
				triggered += 1;
			}
		}
	}

	assert_eq!(service.counters().get("S1"), 16);
	assert_eq!(harness.messages.all("S1").len(), 16);
	assert!(triggered >= 2, "expected a trigger at 8 and at 16, saw {triggered}");

	wait_for_processed(&harness, 8).await;

	assert!(harness.messages.processed_ids().len() >= 8);
}

#[tokio::test]
async fn client_context_reaches_the_analysis_prompt() {
	let harness = Harness::new(ScriptedProvider::new());
	let service = service(&harness);
	let mut req = request("S1", "Feeling low today.");

	req.context = serde_json::from_value(json!({
		"user_activities": [{ "activity_type": "breathing_exercise", "score": 8 }],
		"voice_analysis": { "emotional_tone": "flat", "stress_level": "high" }
	}))
	.expect("Failed to decode client context.");

	service.handle_turn(req).await.expect("Chat turn failed.");

	let analysis = harness.provider.last_prompt(Stage::Analysis).expect("No analysis prompt.");
	let reply = harness.provider.last_prompt(Stage::Counselor).expect("No counselor prompt.");

	assert!(analysis.contains("Activities: breathing exercise: 8"));
	assert!(analysis.contains("- Stress level: high"));
	assert!(reply.contains("VOICE ANALYSIS INSIGHTS:"));
}

#[tokio::test]
async fn structured_input_is_ingested_as_memories() {
	let harness = Harness::new(
		ScriptedProvider::new()
			.reply(Stage::Procedural, r#"[{"content": "Rotates between two opening moves."}]"#)
			.reply(Stage::Episodic, r#"[{"event_description": "Beat level 4 after three tries."}]"#),
	);
	let service = service(&harness);

	harness.messages.seed("S1", 3);

	let report = service
		.ingest(
			"S1",
			IngestRequest {
				user_id: "U1".to_string(),
				data: json!({
					"player": { "name": "Asha", "level": 4 },
					"game_sessions": [{ "level": 4, "attempts": 3, "result": "won" }]
				}),
			},
		)
		.await
		.expect("Ingest failed.");

	assert_eq!(report.data_type, DataType::Game);
	assert_eq!((report.extracted.procedural, report.extracted.episodic), (1, 1));
	assert_eq!((report.persisted, report.failed_writes), (2, 0));

	let prompt = harness.provider.last_prompt(Stage::Episodic).expect("No episodic prompt.");

	assert!(prompt.contains("Analyze the following game data"));

	let records = harness.memories.records();

	assert_eq!(records.len(), 2);
	assert!(records.iter().all(|record| record.session_id == "S1" && record.user_id == "U1"));
	assert!(harness.messages.processed_ids().is_empty());
}

#[tokio::test]
async fn ingest_rejects_non_object_data() {
	let harness = Harness::new(ScriptedProvider::new());
	let service = service(&harness);
	let err = service
		.ingest("S1", IngestRequest { user_id: "U1".to_string(), data: json!(["loose"]) })
		.await
		.expect_err("Expected rejection.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(harness.provider.calls(Stage::Procedural).is_empty());
}

#[tokio::test(start_paused = true)]
async fn ingest_surfaces_exhausted_extraction() {
	let harness = Harness::new(ScriptedProvider::new().fail(Stage::Semantic, 3));
	let service = service(&harness);
	let err = service
		.ingest("S1", IngestRequest { user_id: "U1".to_string(), data: json!({ "note": "x" }) })
		.await
		.expect_err("Expected extraction failure.");

	assert!(matches!(err, Error::Extraction { .. }));
	assert!(harness.memories.records().is_empty());
}
