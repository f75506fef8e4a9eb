use std::{
	sync::{Arc, atomic::Ordering},
	time::Duration,
};

use mindmate_config::Consolidation;
use mindmate_service::{ConsolidationTrigger, SessionCounters};

use super::{Harness, InMemoryMessages, ScriptedProvider};

fn trigger(messages: &Arc<InMemoryMessages>) -> ConsolidationTrigger {
	ConsolidationTrigger::new(messages.clone(), &Consolidation::default())
}

#[tokio::test]
async fn fires_on_multiples_of_the_interval() {
	let harness = Harness::new(ScriptedProvider::new());

	harness.messages.seed("empty-store", 0);
	harness.messages.seed("lagging", 7);
	harness.messages.seed("ahead", 16);

	let trigger = trigger(&harness.messages);
	let hint_only = trigger.should_trigger("empty-store", 8).await;
	let lagging = trigger.should_trigger("lagging", 5).await;
	let ahead = trigger.should_trigger("ahead", 1).await;

	assert!(hint_only.fire);
	assert_eq!(hint_only.effective_count, 8);
	assert_eq!(hint_only.next_trigger_at, 16);

	assert!(!lagging.fire);
	assert_eq!(lagging.effective_count, 7);
	assert_eq!(lagging.turns_until_trigger, 1);

	assert!(ahead.fire);
	assert_eq!(ahead.authoritative_count, 16);
	assert_eq!(ahead.local_hint, 1);
}

#[tokio::test]
async fn store_error_falls_back_to_the_local_hint() {
	let harness = Harness::new(ScriptedProvider::new());

	harness.messages.seed("S1", 3);
	harness.messages.fail_count();

	let decision = trigger(&harness.messages).should_trigger("S1", 8).await;

	assert!(decision.fire);
	assert_eq!(decision.authoritative_count, 0);
	assert_eq!(decision.effective_count, 8);
	assert_eq!(harness.messages.count_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_count_times_out_as_zero() {
	let harness = Harness::new(ScriptedProvider::new());

	harness.messages.seed("S1", 8);
	harness.messages.slow_count(Duration::from_secs(30));

	let started = tokio::time::Instant::now();
	let decision = trigger(&harness.messages).should_trigger("S1", 3).await;

	assert!(started.elapsed() < Duration::from_secs(30));
	assert!(!decision.fire);
	assert_eq!(decision.authoritative_count, 0);
	assert_eq!(decision.effective_count, 3);
	assert_eq!(decision.turns_until_trigger, 5);
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
	let counters = Arc::new(SessionCounters::new());
	let mut tasks = Vec::new();

	for _ in 0..50 {
		let counters = counters.clone();

		tasks.push(tokio::spawn(async move { counters.increment("S1") }));
	}

	let mut seen = Vec::new();

	for task in tasks {
		seen.push(task.await.expect("Increment task panicked."));
	}

	seen.sort_unstable();

	assert_eq!(counters.get("S1"), 50);
	assert_eq!(seen, (1..=50).collect::<Vec<_>>());
}
