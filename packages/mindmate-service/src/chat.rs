//! The request path: analyze, reply, record the turns, and schedule consolidation.

use std::{sync::Arc, time::Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use unicode_segmentation::UnicodeSegmentation as _;

use mindmate_config::Config;
use mindmate_domain::{
	ConversationTurn, ExtractedMemories, MemoryKind, NewTurn, Role, SessionMemories, model_output,
};

use crate::{
	ConsolidationTrigger, Consolidator, Error, ExtractionEngine, GenerationProvider, IngestReport,
	Result, SessionCounters, Stores, prompts,
};

const DEFAULT_APPROACH: &str = "Person-centered";
const RESPONSE_CONFIDENCE: f32 = 0.9;
const TECHNIQUE_LABEL: &str = r"(?i)\s*\((?:CBT|ACT|MBCT|DBT|validation|reframe|reframing|strategy|empathy|question)\)";
const LEADING_NUMBER: &str = r"(?m)^\s*\d+[.)]\s+";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
	pub session_id: String,
	pub user_id: String,
	pub user_message: String,
	#[serde(flatten)]
	pub context: ClientContext,
}

/// What the client knows about the user beyond the message itself. Every part is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientContext {
	/// Recent wellness activities, newest first; `activity_type` and `score` are read.
	#[serde(default)]
	pub user_activities: Vec<Value>,
	/// `emotional_tone`, `stress_level`, `speech_pace`, `cultural_context`, `insights`.
	#[serde(default)]
	pub voice_analysis: Map<String, Value>,
	/// `therapeutic_progress`, `emotional_patterns`, `cultural_context`.
	#[serde(default)]
	pub conversation_summary: Map<String, Value>,
	#[serde(default)]
	pub user_patterns: Map<String, Value>,
}

/// Structured input (game sessions, activities, lessons, and so on) to turn into memories.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
	pub user_id: String,
	pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PsychologicalAnalysis {
	pub emotional_state: String,
	pub stress_categories: Vec<String>,
	pub therapeutic_approach: String,
	pub cultural_pressures: String,
	pub language_style: String,
	pub psychological_insights: Vec<String>,
	pub coping_assessment: String,
	pub intervention_priority: String,
	pub activity_recommendations: Vec<String>,
}
impl Default for PsychologicalAnalysis {
	fn default() -> Self {
		Self {
			emotional_state: String::new(),
			stress_categories: Vec::new(),
			therapeutic_approach: DEFAULT_APPROACH.to_string(),
			cultural_pressures: String::new(),
			language_style: String::new(),
			psychological_insights: Vec::new(),
			coping_assessment: String::new(),
			intervention_priority: String::new(),
			activity_recommendations: Vec::new(),
		}
	}
}
impl PsychologicalAnalysis {
	/// Tolerates missing keys and list-or-string mixups. An unusable reply yields the defaults.
	pub fn from_model_output(raw: &str) -> Self {
		match model_output::parse_json_object(raw) {
			Ok(object) => Self::from_object(&object),
			Err(err) => {
				tracing::warn!(error = %err, "Psychological analysis unparsable. Using defaults.");

				Self::default()
			},
		}
	}

	fn from_object(object: &Map<String, Value>) -> Self {
		let text = |key: &str| match object.get(key) {
			Some(Value::String(value)) => value.trim().to_string(),
			Some(Value::Array(items)) => string_items(items).join(", "),
			Some(Value::Null) | None => String::new(),
			Some(other) => other.to_string(),
		};
		let list = |key: &str| match object.get(key) {
			Some(Value::Array(items)) => string_items(items),
			Some(Value::String(value)) => value
				.split([',', ';', '\n'])
				.map(str::trim)
				.filter(|item| !item.is_empty())
				.map(ToString::to_string)
				.collect(),
			_ => Vec::new(),
		};
		let approach = text("therapeutic_approach");

		Self {
			emotional_state: text("emotional_state"),
			stress_categories: list("stress_categories"),
			therapeutic_approach: if approach.is_empty() {
				DEFAULT_APPROACH.to_string()
			} else {
				approach
			},
			cultural_pressures: text("cultural_pressures"),
			language_style: text("language_style"),
			psychological_insights: list("psychological_insights"),
			coping_assessment: text("coping_assessment"),
			intervention_priority: text("intervention_priority"),
			activity_recommendations: list("activity_recommendations"),
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemoryCounts {
	pub procedural: usize,
	pub semantic: usize,
	pub episodic: usize,
}
impl From<&SessionMemories> for MemoryCounts {
	fn from(memories: &SessionMemories) -> Self {
		Self {
			procedural: memories.procedural.len(),
			semantic: memories.semantic.len(),
			episodic: memories.episodic.len(),
		}
	}
}
impl From<&ExtractedMemories> for MemoryCounts {
	fn from(extracted: &ExtractedMemories) -> Self {
		Self {
			procedural: extracted.count(MemoryKind::Procedural),
			semantic: extracted.count(MemoryKind::Semantic),
			episodic: extracted.count(MemoryKind::Episodic),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInsights {
	#[serde(flatten)]
	pub analysis: PsychologicalAnalysis,
	pub memory_counts: MemoryCounts,
	pub context_turns: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsolidationStatus {
	pub triggered: bool,
	pub effective_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
	pub message: String,
	pub modality: String,
	pub confidence: f32,
	pub processing_time_ms: u64,
	pub session_insights: SessionInsights,
	pub consolidation: ConsolidationStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
	pub database: u64,
	pub in_memory: u64,
	pub effective: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStats {
	pub session_id: String,
	pub counts: SessionCounts,
	pub next_memory_trigger: u64,
	pub turns_until_trigger: u64,
	pub consolidation_in_flight: bool,
}

pub struct ChatService {
	pub cfg: Config,
	provider: Arc<dyn GenerationProvider>,
	stores: Stores,
	counters: Arc<SessionCounters>,
	trigger: ConsolidationTrigger,
	consolidator: Consolidator,
}
impl ChatService {
	pub fn new(cfg: Config, provider: Arc<dyn GenerationProvider>, stores: Stores) -> Self {
		let engine =
			ExtractionEngine::new(provider.clone(), cfg.providers.llm.clone(), &cfg.consolidation);
		let trigger = ConsolidationTrigger::new(stores.messages.clone(), &cfg.consolidation);
		let consolidator =
			Consolidator::new(stores.clone(), engine, cfg.consolidation.batch_limit);

		Self {
			cfg,
			provider,
			stores,
			counters: Arc::new(SessionCounters::new()),
			trigger,
			consolidator,
		}
	}

	pub fn counters(&self) -> &SessionCounters {
		&self.counters
	}

	pub async fn handle_turn(&self, req: ChatRequest) -> Result<ChatResponse> {
		let started = Instant::now();
		let req = self.validate(req)?;

		tracing::info!(
			session_id = %req.session_id,
			user_id = %req.user_id,
			chars = req.user_message.chars().count(),
			activities = req.context.user_activities.len(),
			voice = !req.context.voice_analysis.is_empty(),
			"Chat turn received."
		);

		let (user_turn, on_user_turn) = self
			.record_turn(&req.session_id, &req.user_id, Role::User, req.user_message.clone())
			.await;
		let recent = self.load_recent(&req.session_id, user_turn.as_ref()).await;
		let memories = self.load_memories(&req.session_id).await;
		let analysis = self.analyze(&req, &recent, &memories).await?;
		let message = self.respond(&req, &analysis, &recent).await?;
		let (_, on_reply) = self
			.record_turn(&req.session_id, &req.user_id, Role::Assistant, message.clone())
			.await;
		let consolidation = ConsolidationStatus {
			triggered: on_user_turn.triggered || on_reply.triggered,
			effective_count: on_reply.effective_count,
		};

		Ok(ChatResponse {
			message,
			modality: analysis.therapeutic_approach.clone(),
			confidence: RESPONSE_CONFIDENCE,
			processing_time_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
			session_insights: SessionInsights {
				analysis,
				memory_counts: MemoryCounts::from(&memories),
				context_turns: recent.len(),
			},
			consolidation,
		})
	}

	pub async fn session_stats(&self, session_id: &str) -> Result<SessionStats> {
		let session_id = non_empty("session_id", session_id)?;
		let decision = self.trigger.should_trigger(&session_id, self.counters.get(&session_id)).await;

		Ok(SessionStats {
			counts: SessionCounts {
				database: decision.authoritative_count,
				in_memory: decision.local_hint,
				effective: decision.effective_count,
			},
			next_memory_trigger: decision.next_trigger_at,
			turns_until_trigger: decision.turns_until_trigger,
			consolidation_in_flight: self.consolidator.is_in_flight(&session_id),
			session_id,
		})
	}

	pub async fn session_memories(&self, session_id: &str) -> Result<SessionMemories> {
		let session_id = non_empty("session_id", session_id)?;

		self.stores.memories.fetch_memories_by_session(&session_id).await
	}

	/// Extracts memories from structured input for a session and stores them right away.
	pub async fn ingest(&self, session_id: &str, req: IngestRequest) -> Result<IngestReport> {
		let session_id = non_empty("session_id", session_id)?;
		let user_id = non_empty("user_id", &req.user_id)?;

		if !req.data.is_object() {
			return Err(Error::InvalidRequest { message: "data must be a JSON object.".to_string() });
		}

		self.consolidator.ingest(&session_id, &user_id, &req.data).await
	}

	fn validate(&self, req: ChatRequest) -> Result<ChatRequest> {
		let session_id = non_empty("session_id", &req.session_id)?;
		let user_id = non_empty("user_id", &req.user_id)?;
		let user_message = non_empty("user_message", &req.user_message)?;
		let length = user_message.graphemes(true).count();

		if length > self.cfg.chat.max_message_chars as usize {
			return Err(Error::InvalidRequest {
				message: format!(
					"user_message is {length} characters; the limit is {}.",
					self.cfg.chat.max_message_chars
				),
			});
		}

		Ok(ChatRequest { session_id, user_id, user_message, context: req.context })
	}

	/// Stores a turn, bumps the local hint, and checks the trigger against the bumped value.
	///
	/// Every stored turn gets its own check, so a failed exchange or a concurrent request on the
	/// same session cannot step over a trigger boundary. A store failure is logged, never surfaced.
	async fn record_turn(
		&self,
		session_id: &str,
		user_id: &str,
		role: Role,
		content: String,
	) -> (Option<ConversationTurn>, ConsolidationStatus) {
		let turn = NewTurn {
			session_id: session_id.to_string(),
			user_id: user_id.to_string(),
			role,
			content,
		};
		let stored = match self.stores.messages.append_turn(turn).await {
			Ok(stored) => Some(stored),
			Err(err) => {
				tracing::warn!(session_id, role = %role, error = %err, "Failed to store chat turn.");

				None
			},
		};

		let hint = self.counters.increment(session_id);
		let status = self.schedule_consolidation(session_id, user_id, hint).await;

		(stored, status)
	}

	async fn load_recent(
		&self,
		session_id: &str,
		current: Option<&ConversationTurn>,
	) -> Vec<ConversationTurn> {
		// One extra row so the turn just written can be dropped without shrinking the window.
		let limit = self.cfg.chat.recent_turns.saturating_add(1);

		match self.stores.messages.recent_turns(session_id, limit).await {
			Ok(mut turns) => {
				if let Some(current) = current {
					turns.retain(|turn| turn.id != current.id);
				}

				let excess = turns.len().saturating_sub(self.cfg.chat.recent_turns as usize);

				turns.drain(..excess);

				turns
			},
			Err(err) => {
				tracing::warn!(session_id, error = %err, "Failed to load recent turns.");

				Vec::new()
			},
		}
	}

	async fn load_memories(&self, session_id: &str) -> SessionMemories {
		match self.stores.memories.fetch_memories_by_session(session_id).await {
			Ok(memories) => memories,
			Err(err) => {
				tracing::warn!(session_id, error = %err, "Failed to load session memories.");

				SessionMemories::default()
			},
		}
	}

	async fn analyze(
		&self,
		req: &ChatRequest,
		recent: &[ConversationTurn],
		memories: &SessionMemories,
	) -> Result<PsychologicalAnalysis> {
		let messages =
			prompts::analysis_messages(&req.user_message, &req.context, recent, memories);
		let raw = self.provider.generate(&self.cfg.providers.llm, &messages).await?;

		Ok(PsychologicalAnalysis::from_model_output(&raw))
	}

	async fn respond(
		&self,
		req: &ChatRequest,
		analysis: &PsychologicalAnalysis,
		recent: &[ConversationTurn],
	) -> Result<String> {
		let messages = prompts::counselor_messages(
			&req.user_message,
			analysis,
			recent,
			&req.context.voice_analysis,
		);
		let raw = self.provider.generate(&self.cfg.providers.llm, &messages).await?;
		let message = clean_response(&raw);

		if message.is_empty() {
			return Err(Error::Provider { message: "Model returned an empty reply.".to_string() });
		}

		Ok(message)
	}

	async fn schedule_consolidation(
		&self,
		session_id: &str,
		user_id: &str,
		local_hint: u64,
	) -> ConsolidationStatus {
		let decision = self.trigger.should_trigger(session_id, local_hint).await;
		let triggered = decision.fire && self.cfg.consolidation.enabled;

		if triggered {
			tracing::info!(
				session_id,
				effective_count = decision.effective_count,
				"Consolidation due. Starting background cycle."
			);

			drop(self.consolidator.spawn_cycle(session_id.to_string(), user_id.to_string()));
		} else {
			tracing::debug!(
				session_id,
				effective_count = decision.effective_count,
				turns_until_trigger = decision.turns_until_trigger,
				"Consolidation not due."
			);
		}

		ConsolidationStatus { triggered, effective_count: decision.effective_count }
	}
}

/// Strips quoting, JSON envelopes, numbering, and technique labels from a model reply.
pub fn clean_response(raw: &str) -> String {
	let mut text = raw.trim().to_string();

	if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
		text = text[1..text.len() - 1].to_string();
	}
	if text.starts_with('{') || text.starts_with('[') {
		match serde_json::from_str::<Value>(&text) {
			Ok(Value::Object(object)) =>
				if let Some(Value::String(content)) = object.get("content") {
					text = content.clone();
				},
			Ok(Value::String(inner)) => text = inner,
			_ => {},
		}
	}
	if let Ok(labels) = Regex::new(TECHNIQUE_LABEL) {
		text = labels.replace_all(&text, "").into_owned();
	}
	if let Ok(numbering) = Regex::new(LEADING_NUMBER) {
		text = numbering.replace_all(&text, "").into_owned();
	}

	text.trim().to_string()
}

fn non_empty(field: &str, value: &str) -> Result<String> {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return Err(Error::InvalidRequest { message: format!("{field} must be non-empty.") });
	}

	Ok(trimmed.to_string())
}

fn string_items(items: &[Value]) -> Vec<String> {
	items
		.iter()
		.filter_map(|item| match item {
			Value::String(value) => Some(value.trim().to_string()),
			Value::Null => None,
			other => Some(other.to_string()),
		})
		.filter(|value| !value.is_empty())
		.collect()
}
