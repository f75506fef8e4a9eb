pub mod chat;
pub mod consolidation;
pub mod extraction;
pub mod prompts;
pub mod stores;
pub mod trigger;

mod error;

pub use chat::{
	ChatRequest, ChatResponse, ChatService, ClientContext, ConsolidationStatus, IngestRequest,
	MemoryCounts, PsychologicalAnalysis, SessionCounts, SessionInsights, SessionStats,
};
pub use consolidation::{Consolidator, CycleOutcome, CycleReport, IngestReport};
pub use error::{Error, Result};
pub use extraction::ExtractionEngine;
pub use stores::PgStores;
pub use trigger::{ConsolidationTrigger, SessionCounters, TriggerDecision};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use uuid::Uuid;

use mindmate_config::LlmProviderConfig;
use mindmate_domain::{ConversationTurn, MemoryRecord, NewTurn, SessionMemories};
use mindmate_providers::llm;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Text generation against a chat-completions model.
pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

/// Access to stored conversation turns.
pub trait MessageStore
where
	Self: Send + Sync,
{
	fn count_all_turns<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<u64>>;

	/// Oldest-first turns that no consolidation cycle has consumed yet.
	fn fetch_unprocessed_turns<'a>(
		&'a self,
		session_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ConversationTurn>>>;

	/// Returns how many turns flipped to processed.
	fn mark_processed<'a>(&'a self, turn_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>>;

	fn append_turn<'a>(&'a self, turn: NewTurn) -> BoxFuture<'a, Result<ConversationTurn>>;

	/// The newest `limit` turns in chronological order.
	fn recent_turns<'a>(
		&'a self,
		session_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ConversationTurn>>>;
}

/// Append-only memory persistence.
pub trait MemoryStore
where
	Self: Send + Sync,
{
	fn insert_memory_record<'a>(&'a self, record: &'a MemoryRecord) -> BoxFuture<'a, Result<()>>;

	fn fetch_memories_by_session<'a>(
		&'a self,
		session_id: &'a str,
	) -> BoxFuture<'a, Result<SessionMemories>>;
}

#[derive(Clone)]
pub struct Stores {
	pub messages: Arc<dyn MessageStore>,
	pub memories: Arc<dyn MemoryStore>,
}
impl Stores {
	pub fn postgres(stores: Arc<PgStores>) -> Self {
		Self { messages: stores.clone(), memories: stores }
	}
}

pub struct DefaultProviders;

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(llm::generate(cfg, messages))
	}
}
