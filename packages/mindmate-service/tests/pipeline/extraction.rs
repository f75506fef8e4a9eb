use std::{sync::Arc, time::Duration};

use serde_json::json;
use time::OffsetDateTime;
use tokio::time::Instant;
use uuid::Uuid;

use mindmate_config::Consolidation;
use mindmate_domain::{ConversationTurn, DataType, Role};
use mindmate_service::{Error, ExtractionEngine};

use super::{ScriptedProvider, Stage, dummy_llm_provider};

fn engine(provider: &Arc<ScriptedProvider>) -> ExtractionEngine {
	ExtractionEngine::new(provider.clone(), dummy_llm_provider(), &Consolidation::default())
}

fn turns(count: usize) -> Vec<ConversationTurn> {
	let start = OffsetDateTime::now_utc();

	(0..count)
		.map(|index| ConversationTurn {
			id: Uuid::new_v4(),
			session_id: "S1".to_string(),
			role: if index % 2 == 0 { Role::User } else { Role::Assistant },
			content: format!("turn {index}"),
			created_at: start + time::Duration::seconds(index as i64),
			processed: false,
		})
		.collect()
}

#[tokio::test]
async fn every_kind_is_returned_in_model_order() {
	let provider = Arc::new(
		ScriptedProvider::new()
			.reply(Stage::Procedural, r#"[{"content": "first"}, {"content": "second"}]"#)
			.reply(Stage::Semantic, "[]")
			.reply(
				Stage::Episodic,
				r#"[{"event_description": "e1"}, {"event_description": "e2"}, {"event_description": "e3"}]"#,
			),
	);
	let extracted =
		engine(&provider).extract(&turns(4), DataType::Chat).await.expect("Extraction failed.");

	assert_eq!((extracted.procedural.len(), extracted.semantic.len(), extracted.episodic.len()), (2, 0, 3));
	assert_eq!(extracted.procedural[0].content, "first");
	assert_eq!(extracted.procedural[1].content, "second");
	assert_eq!(
		extracted.episodic.iter().map(|memory| memory.event_description.as_str()).collect::<Vec<_>>(),
		vec!["e1", "e2", "e3"]
	);
}

#[tokio::test(start_paused = true)]
async fn failing_kind_succeeds_on_third_attempt_with_fixed_spacing() {
	let provider = Arc::new(
		ScriptedProvider::new()
			.fail(Stage::Procedural, 2)
			.reply(Stage::Procedural, r#"[{"content": "Grounding with 5-4-3-2-1."}]"#),
	);
	let started = Instant::now();
	let extracted =
		engine(&provider).extract(&turns(2), DataType::Chat).await.expect("Extraction failed.");
	let calls = provider.calls(Stage::Procedural);

	assert_eq!(extracted.procedural.len(), 1);
	assert_eq!(calls.len(), 3);
	assert!(calls[1] - calls[0] >= Duration::from_secs(2));
	assert!(calls[2] - calls[1] >= Duration::from_secs(2));
	assert!(started.elapsed() >= Duration::from_secs(4));
	assert_eq!(provider.calls(Stage::Semantic).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausting_one_kind_fails_the_whole_extraction() {
	let provider = Arc::new(ScriptedProvider::new().fail(Stage::Semantic, 3));
	let err = engine(&provider)
		.extract(&turns(2), DataType::Chat)
		.await
		.expect_err("Expected extraction to fail.");

	assert!(matches!(err, Error::Extraction { .. }));
	assert!(err.to_string().contains("semantic extraction failed after 3 attempts"));
	assert_eq!(provider.calls(Stage::Semantic).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn non_array_reply_is_retried() {
	let provider = Arc::new(
		ScriptedProvider::new()
			.reply(Stage::Episodic, r#"{"event_description": "not wrapped"}"#)
			.reply(Stage::Episodic, "```json\n[{\"event_description\": \"wrapped\"}]\n```"),
	);
	let extracted =
		engine(&provider).extract(&turns(2), DataType::Chat).await.expect("Extraction failed.");

	assert_eq!(provider.calls(Stage::Episodic).len(), 2);
	assert_eq!(extracted.episodic[0].event_description, "wrapped");
}

#[tokio::test]
async fn undecodable_items_are_dropped_without_retry() {
	let provider = Arc::new(
		ScriptedProvider::new()
			.reply(Stage::Semantic, r#"[{"content": "Has two siblings."}, {"category": "orphan"}, "loose text"]"#),
	);
	let extracted =
		engine(&provider).extract(&turns(2), DataType::Chat).await.expect("Extraction failed.");

	assert_eq!(provider.calls(Stage::Semantic).len(), 1);
	assert_eq!(extracted.semantic.len(), 1);
	assert_eq!(extracted.semantic[0].content, "Has two siblings.");
	assert_eq!(extracted.semantic[0].confidence, 0.5);
}

#[tokio::test(start_paused = true)]
async fn kinds_are_requested_concurrently() {
	let provider = Arc::new(ScriptedProvider::with_latency(Duration::from_secs(1)));
	let started = Instant::now();

	engine(&provider).extract(&turns(2), DataType::Chat).await.expect("Extraction failed.");

	assert!(started.elapsed() < Duration::from_secs(2));

	let first_calls = [Stage::Procedural, Stage::Semantic, Stage::Episodic]
		.map(|stage| provider.calls(stage)[0]);

	assert!(first_calls.iter().all(|at| *at == first_calls[0]));
}

#[tokio::test]
async fn structured_input_is_detected_and_formatted() {
	let provider = Arc::new(
		ScriptedProvider::new().reply(Stage::Episodic, r#"[{"event_description": "Won the quiz round."}]"#),
	);
	let input = json!({
		"player": { "name": "Asha", "level": 4 },
		"achievements": [{ "name": "Quiz Whiz", "description": "Answered 10 in a row" }],
	});
	let (data_type, extracted) =
		engine(&provider).extract_value(&input).await.expect("Extraction failed.");

	assert_eq!(data_type, DataType::Game);
	assert_eq!(extracted.episodic.len(), 1);
}
