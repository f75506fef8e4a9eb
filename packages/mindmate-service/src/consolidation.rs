//! One consolidation cycle: fetch unprocessed turns, extract, persist, mark processed.

use std::{
	collections::HashSet,
	sync::{Arc, Mutex},
};

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::task::JoinHandle;

use mindmate_domain::{DataType, ExtractedMemories, MemoryRecord};

use crate::{ExtractionEngine, MemoryCounts, Result, Stores};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleOutcome {
	Completed,
	NothingToDo,
	SkippedInFlight,
	FetchFailed,
	ExtractionFailed,
	MarkFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
	pub session_id: String,
	pub outcome: CycleOutcome,
	pub fetched: usize,
	pub persisted: usize,
	pub failed_writes: usize,
	pub marked: u64,
}
impl CycleReport {
	fn new(session_id: &str, outcome: CycleOutcome) -> Self {
		Self {
			session_id: session_id.to_string(),
			outcome,
			fetched: 0,
			persisted: 0,
			failed_writes: 0,
			marked: 0,
		}
	}
}

/// Result of turning one structured input into stored memories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
	pub session_id: String,
	pub data_type: DataType,
	pub extracted: MemoryCounts,
	pub persisted: usize,
	pub failed_writes: usize,
}

#[derive(Clone)]
pub struct Consolidator {
	stores: Stores,
	engine: ExtractionEngine,
	batch_limit: u32,
	in_flight: Arc<Mutex<HashSet<String>>>,
}
impl Consolidator {
	pub fn new(stores: Stores, engine: ExtractionEngine, batch_limit: u32) -> Self {
		Self { stores, engine, batch_limit, in_flight: Arc::default() }
	}

	pub fn is_in_flight(&self, session_id: &str) -> bool {
		self.in_flight.lock().unwrap_or_else(|err| err.into_inner()).contains(session_id)
	}

	/// Runs a cycle on a detached task. Nothing about its outcome reaches the caller's request.
	pub fn spawn_cycle(&self, session_id: String, user_id: String) -> JoinHandle<CycleReport> {
		let consolidator = self.clone();

		tokio::spawn(async move { consolidator.run_cycle(&session_id, &user_id).await })
	}

	pub async fn run_cycle(&self, session_id: &str, user_id: &str) -> CycleReport {
		let Some(_permit) = InFlightPermit::acquire(&self.in_flight, session_id) else {
			tracing::info!(session_id, "Consolidation already running for session. Skipping.");

			return CycleReport::new(session_id, CycleOutcome::SkippedInFlight);
		};
		let turns =
			match self.stores.messages.fetch_unprocessed_turns(session_id, self.batch_limit).await {
				Ok(turns) => turns,
				Err(err) => {
					tracing::error!(session_id, error = %err, "Failed to fetch unprocessed turns.");

					return CycleReport::new(session_id, CycleOutcome::FetchFailed);
				},
			};

		if turns.is_empty() {
			tracing::debug!(session_id, "No unprocessed turns to consolidate.");

			return CycleReport::new(session_id, CycleOutcome::NothingToDo);
		}

		let mut report = CycleReport::new(session_id, CycleOutcome::Completed);

		report.fetched = turns.len();

		let extracted = match self.engine.extract(&turns, DataType::Chat).await {
			Ok(extracted) => extracted,
			Err(err) => {
				tracing::error!(
					session_id,
					turns = turns.len(),
					error = %err,
					"Memory extraction failed. Turns stay unprocessed."
				);

				report.outcome = CycleOutcome::ExtractionFailed;

				return report;
			},
		};

		(report.persisted, report.failed_writes) = self.persist(session_id, user_id, extracted).await;

		let turn_ids = turns.iter().map(|turn| turn.id).collect::<Vec<_>>();

		match self.stores.messages.mark_processed(&turn_ids).await {
			Ok(marked) => report.marked = marked,
			Err(err) => {
				tracing::error!(session_id, error = %err, "Failed to mark turns as processed.");

				report.outcome = CycleOutcome::MarkFailed;
			},
		}

		if report.failed_writes > 0 {
			tracing::warn!(
				session_id,
				failed_writes = report.failed_writes,
				persisted = report.persisted,
				"Consolidated turns lost memory records that could not be written."
			);
		}

		tracing::info!(
			session_id,
			outcome = ?report.outcome,
			fetched = report.fetched,
			persisted = report.persisted,
			marked = report.marked,
			"Consolidation cycle finished."
		);

		report
	}

	/// Extracts memories from structured input and stores them. Nothing is marked processed.
	pub async fn ingest(
		&self,
		session_id: &str,
		user_id: &str,
		input: &Value,
	) -> Result<IngestReport> {
		let (data_type, extracted) = self.engine.extract_value(input).await?;
		let counts = MemoryCounts::from(&extracted);
		let (persisted, failed_writes) = self.persist(session_id, user_id, extracted).await;

		tracing::info!(
			session_id,
			data_type = %data_type,
			persisted,
			failed_writes,
			"Structured input ingested."
		);

		Ok(IngestReport {
			session_id: session_id.to_string(),
			data_type,
			extracted: counts,
			persisted,
			failed_writes,
		})
	}

	/// Writes each memory independently. Returns `(persisted, failed)`.
	async fn persist(
		&self,
		session_id: &str,
		user_id: &str,
		extracted: ExtractedMemories,
	) -> (usize, usize) {
		let now = OffsetDateTime::now_utc();
		let mut persisted = 0;
		let mut failed = 0;

		for payload in extracted.into_payloads() {
			let record = MemoryRecord::new(session_id, user_id, payload, now);

			match self.stores.memories.insert_memory_record(&record).await {
				Ok(()) => persisted += 1,
				Err(err) => {
					tracing::warn!(
						session_id,
						kind = %record.kind(),
						error = %err,
						"Failed to persist memory record."
					);

					failed += 1;
				},
			}
		}

		(persisted, failed)
	}
}

/// Membership in the in-flight set. Released on drop, including during unwinding.
struct InFlightPermit {
	sessions: Arc<Mutex<HashSet<String>>>,
	session_id: String,
}
impl InFlightPermit {
	fn acquire(sessions: &Arc<Mutex<HashSet<String>>>, session_id: &str) -> Option<Self> {
		let inserted =
			sessions.lock().unwrap_or_else(|err| err.into_inner()).insert(session_id.to_string());

		inserted.then(|| Self { sessions: sessions.clone(), session_id: session_id.to_string() })
	}
}
impl Drop for InFlightPermit {
	fn drop(&mut self) {
		self.sessions.lock().unwrap_or_else(|err| err.into_inner()).remove(&self.session_id);
	}
}
