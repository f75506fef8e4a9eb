use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
	time::Duration,
};

use serde::Serialize;

use mindmate_config::Consolidation;
use mindmate_domain::trigger;

use crate::MessageStore;

/// Per-session turn counters kept in process memory.
///
/// Values only grow. They are a hint for when the store lags or is unreachable.
#[derive(Debug, Default)]
pub struct SessionCounters {
	counts: Mutex<HashMap<String, u64>>,
}
impl SessionCounters {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds one and returns the new value.
	pub fn increment(&self, session_id: &str) -> u64 {
		let mut counts = self.counts.lock().unwrap_or_else(|err| err.into_inner());
		let count = counts.entry(session_id.to_string()).or_insert(0);

		*count += 1;

		*count
	}

	pub fn get(&self, session_id: &str) -> u64 {
		let counts = self.counts.lock().unwrap_or_else(|err| err.into_inner());

		counts.get(session_id).copied().unwrap_or(0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerDecision {
	pub fire: bool,
	pub effective_count: u64,
	pub authoritative_count: u64,
	pub local_hint: u64,
	pub next_trigger_at: u64,
	pub turns_until_trigger: u64,
}

/// Decides whether a consolidation cycle is due for a session.
#[derive(Clone)]
pub struct ConsolidationTrigger {
	messages: Arc<dyn MessageStore>,
	every: u64,
	count_timeout: Duration,
}
impl ConsolidationTrigger {
	pub fn new(messages: Arc<dyn MessageStore>, consolidation: &Consolidation) -> Self {
		Self {
			messages,
			every: consolidation.trigger_every,
			count_timeout: Duration::from_millis(consolidation.count_timeout_ms),
		}
	}

	/// Never fails: an unreachable or slow store counts as zero.
	pub async fn should_trigger(&self, session_id: &str, local_hint: u64) -> TriggerDecision {
		let authoritative_count = self.authoritative_count(session_id).await;
		let effective_count = trigger::effective_count(authoritative_count, local_hint);

		TriggerDecision {
			fire: trigger::is_due(effective_count, self.every),
			effective_count,
			authoritative_count,
			local_hint,
			next_trigger_at: trigger::next_trigger_at(effective_count, self.every),
			turns_until_trigger: trigger::turns_until_trigger(effective_count, self.every),
		}
	}

	async fn authoritative_count(&self, session_id: &str) -> u64 {
		match tokio::time::timeout(self.count_timeout, self.messages.count_all_turns(session_id))
			.await
		{
			Ok(Ok(count)) => count,
			Ok(Err(err)) => {
				tracing::warn!(session_id, error = %err, "Turn count unavailable. Using local hint.");

				0
			},
			Err(_) => {
				tracing::warn!(
					session_id,
					timeout_ms = self.count_timeout.as_millis() as u64,
					"Turn count timed out. Using local hint."
				);

				0
			},
		}
	}
}
