use std::collections::HashSet;

use mindmate_config::Consolidation;
use mindmate_domain::{MemoryKind, MemoryPayload};
use mindmate_service::{Consolidator, CycleOutcome, ExtractionEngine};

use super::{Harness, ScriptedProvider, Stage, dummy_llm_provider};

fn consolidator(harness: &Harness) -> Consolidator {
	let engine = ExtractionEngine::new(
		harness.provider.clone(),
		dummy_llm_provider(),
		&Consolidation::default(),
	);

	Consolidator::new(harness.stores(), engine, 15)
}

#[tokio::test]
async fn empty_session_is_a_no_op() {
	let harness = Harness::new(ScriptedProvider::new());
	let report = consolidator(&harness).run_cycle("S1", "U1").await;

	assert_eq!(report.outcome, CycleOutcome::NothingToDo);
	assert_eq!(report.fetched, 0);
	assert!(harness.provider.calls(Stage::Procedural).is_empty());
	assert!(harness.memories.records().is_empty());
}

#[tokio::test]
async fn eight_turns_become_tagged_records_and_are_consumed() {
	let provider = ScriptedProvider::new()
		.reply(Stage::Procedural, r#"[{"type": "procedural", "content": "Box breathing before class."}]"#)
		.reply(Stage::Semantic, r#"[{"type": "semantic", "content": "Preparing for JEE."}]"#);
	let harness = Harness::new(provider);
	let ids = harness.messages.seed("S1", 8);
	let report = consolidator(&harness).run_cycle("S1", "U1").await;
	let records = harness.memories.records();

	assert_eq!(report.outcome, CycleOutcome::Completed);
	assert_eq!(report.persisted, 2);
	assert_eq!(report.marked, 8);
	assert_eq!(records.len(), 2);
	assert!(records.iter().all(|record| record.session_id == "S1" && record.user_id == "U1"));
	assert_eq!(records[0].kind(), MemoryKind::Procedural);
	assert_eq!(records[1].kind(), MemoryKind::Semantic);
	assert_eq!(harness.messages.processed_ids(), ids.into_iter().collect::<HashSet<_>>());
}

#[tokio::test]
async fn marked_turns_are_never_selected_again() {
	let harness = Harness::new(ScriptedProvider::new());
	let ids = harness.messages.seed("S1", 20);
	let consolidator = consolidator(&harness);
	let first = consolidator.run_cycle("S1", "U1").await;
	let after_first = harness.messages.processed_ids();

	assert_eq!(first.fetched, 15);
	assert_eq!(after_first, ids[..15].iter().copied().collect::<HashSet<_>>());

	let second = consolidator.run_cycle("S1", "U1").await;

	assert_eq!(second.fetched, 5);
	assert_eq!(second.marked, 5);
	assert_eq!(harness.messages.processed_ids().len(), 20);

	let third = consolidator.run_cycle("S1", "U1").await;

	assert_eq!(third.outcome, CycleOutcome::NothingToDo);
}

#[tokio::test]
async fn failed_write_does_not_block_marking() {
	let provider = ScriptedProvider::new()
		.reply(Stage::Procedural, r#"[{"content": "a"}]"#)
		.reply(Stage::Semantic, r#"[{"content": "b"}]"#)
		.reply(Stage::Episodic, r#"[{"event_description": "c"}]"#);
	let harness = Harness::new(provider);

	harness.messages.seed("S1", 8);
	harness.memories.fail_insert(1);

	let report = consolidator(&harness).run_cycle("S1", "U1").await;

	assert_eq!(report.outcome, CycleOutcome::Completed);
	assert_eq!(report.persisted, 2);
	assert_eq!(report.failed_writes, 1);
	assert_eq!(report.marked, 8);
	assert_eq!(harness.memories.records().len(), 2);
	assert_eq!(harness.messages.processed_ids().len(), 8);
}

#[tokio::test(start_paused = true)]
async fn exhausted_extraction_leaves_turns_unprocessed() {
	let provider = ScriptedProvider::new()
		.reply(Stage::Semantic, r#"[{"content": "kept back"}]"#)
		.fail(Stage::Procedural, 3);
	let harness = Harness::new(provider);

	harness.messages.seed("S1", 8);

	let report = consolidator(&harness).run_cycle("S1", "U1").await;

	assert_eq!(report.outcome, CycleOutcome::ExtractionFailed);
	assert_eq!(report.persisted, 0);
	assert_eq!(harness.provider.calls(Stage::Procedural).len(), 3);
	assert!(harness.memories.records().is_empty());
	assert!(harness.messages.processed_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycle_for_same_session_is_skipped() {
	let provider = ScriptedProvider::new().fail(Stage::Episodic, 1);
	let harness = Harness::new(provider);

	harness.messages.seed("S1", 8);

	let consolidator = consolidator(&harness);
	let running = consolidator.spawn_cycle("S1".to_string(), "U1".to_string());

	for _ in 0..1_000 {
		if consolidator.is_in_flight("S1") {
			break;
		}

		tokio::task::yield_now().await;
	}

	assert!(consolidator.is_in_flight("S1"));

	let skipped = consolidator.run_cycle("S1", "U1").await;

	assert_eq!(skipped.outcome, CycleOutcome::SkippedInFlight);

	let other_session = consolidator.run_cycle("S2", "U2").await;

	assert_eq!(other_session.outcome, CycleOutcome::NothingToDo);

	let finished = running.await.expect("Cycle task panicked.");

	assert_eq!(finished.outcome, CycleOutcome::Completed);
	assert!(!consolidator.is_in_flight("S1"));
}

#[tokio::test]
async fn mark_failure_is_reported_after_persisting() {
	let provider = ScriptedProvider::new().reply(Stage::Semantic, r#"[{"content": "Likes chai."}]"#);
	let harness = Harness::new(provider);

	harness.messages.seed("S1", 8);
	harness.messages.fail_mark();

	let report = consolidator(&harness).run_cycle("S1", "U1").await;

	assert_eq!(report.outcome, CycleOutcome::MarkFailed);
	assert_eq!(report.persisted, 1);
	assert!(matches!(
		harness.memories.records()[0].payload,
		MemoryPayload::Semantic(ref memory) if memory.content == "Likes chai."
	));
	assert!(harness.messages.processed_ids().is_empty());
}
