use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Cognitive-memory category a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
	Procedural,
	Semantic,
	Episodic,
}
impl MemoryKind {
	pub const ALL: [Self; 3] = [Self::Procedural, Self::Semantic, Self::Episodic];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Procedural => "procedural",
			Self::Semantic => "semantic",
			Self::Episodic => "episodic",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"procedural" => Some(Self::Procedural),
			"semantic" => Some(Self::Semantic),
			"episodic" => Some(Self::Episodic),
			_ => None,
		}
	}
}

impl fmt::Display for MemoryKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effectiveness {
	High,
	Medium,
	Low,
	#[default]
	Unknown,
}
impl Effectiveness {
	pub fn from_label(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"high" => Some(Self::High),
			"medium" => Some(Self::Medium),
			"low" => Some(Self::Low),
			"unknown" => Some(Self::Unknown),
			_ => None,
		}
	}
}

/// Shared high / medium / low scale for importance and significance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
	High,
	#[default]
	Medium,
	Low,
}
impl Level {
	pub fn from_label(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"high" => Some(Self::High),
			"medium" => Some(Self::Medium),
			"low" => Some(Self::Low),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticSource {
	Stated,
	#[default]
	Inferred,
	Observed,
}
impl SemanticSource {
	pub fn from_label(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"stated" => Some(Self::Stated),
			"inferred" => Some(Self::Inferred),
			"observed" => Some(Self::Observed),
			_ => None,
		}
	}
}

/// Skills, strategies, and processes the user can repeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProceduralMemory {
	pub category: String,
	pub content: String,
	pub steps: Vec<String>,
	pub triggers: Vec<String>,
	pub effectiveness: Effectiveness,
	#[serde(default, with = "crate::time_serde::date_option")]
	pub last_used: Option<Date>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_type: Option<String>,
}

/// Facts, preferences, and relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMemory {
	pub category: String,
	pub content: String,
	/// Always within `0.0..=1.0`.
	pub confidence: f32,
	pub source: SemanticSource,
	pub related_concepts: Vec<String>,
	pub importance: Level,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodicContext {
	pub temporal: String,
	pub location: String,
	pub participants: Vec<String>,
	pub emotional_state: String,
}

/// A specific event with its context and outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodicMemory {
	pub event_description: String,
	pub context: EpisodicContext,
	pub outcome: String,
	/// Always within `1..=10`.
	pub emotional_intensity: u8,
	pub significance: Level,
	pub learned_from: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source_type: Option<String>,
}

/// Kind-tagged memory content. The tag is stored inside the serialized payload as `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MemoryPayload {
	Procedural(ProceduralMemory),
	Semantic(SemanticMemory),
	Episodic(EpisodicMemory),
}
impl MemoryPayload {
	pub fn kind(&self) -> MemoryKind {
		match self {
			Self::Procedural(_) => MemoryKind::Procedural,
			Self::Semantic(_) => MemoryKind::Semantic,
			Self::Episodic(_) => MemoryKind::Episodic,
		}
	}

	/// Human-readable gist used when memories are fed back into prompts.
	pub fn summary(&self) -> &str {
		match self {
			Self::Procedural(memory) => memory.content.as_str(),
			Self::Semantic(memory) => memory.content.as_str(),
			Self::Episodic(memory) => memory.event_description.as_str(),
		}
	}
}

/// A persisted memory. The kind is derived from the payload, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
	pub id: Uuid,
	pub session_id: String,
	pub user_id: String,
	pub payload: MemoryPayload,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
}
impl MemoryRecord {
	pub fn new(
		session_id: impl Into<String>,
		user_id: impl Into<String>,
		payload: MemoryPayload,
		created_at: OffsetDateTime,
	) -> Self {
		Self {
			id: Uuid::new_v4(),
			session_id: session_id.into(),
			user_id: user_id.into(),
			payload,
			created_at,
		}
	}

	pub fn kind(&self) -> MemoryKind {
		self.payload.kind()
	}
}

/// Output of one extraction: three independently ordered sequences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMemories {
	pub procedural: Vec<ProceduralMemory>,
	pub semantic: Vec<SemanticMemory>,
	pub episodic: Vec<EpisodicMemory>,
}
impl ExtractedMemories {
	pub fn len(&self) -> usize {
		self.procedural.len() + self.semantic.len() + self.episodic.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn count(&self, kind: MemoryKind) -> usize {
		match kind {
			MemoryKind::Procedural => self.procedural.len(),
			MemoryKind::Semantic => self.semantic.len(),
			MemoryKind::Episodic => self.episodic.len(),
		}
	}

	/// Flattens into payloads: procedural first, then semantic, then episodic.
	pub fn into_payloads(self) -> Vec<MemoryPayload> {
		let mut payloads = Vec::with_capacity(self.len());

		payloads.extend(self.procedural.into_iter().map(MemoryPayload::Procedural));
		payloads.extend(self.semantic.into_iter().map(MemoryPayload::Semantic));
		payloads.extend(self.episodic.into_iter().map(MemoryPayload::Episodic));

		payloads
	}
}

/// Memories of one session grouped by kind, newest first within each group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMemories {
	pub procedural: Vec<MemoryRecord>,
	pub semantic: Vec<MemoryRecord>,
	pub episodic: Vec<MemoryRecord>,
}
impl SessionMemories {
	pub fn push(&mut self, record: MemoryRecord) {
		match record.kind() {
			MemoryKind::Procedural => self.procedural.push(record),
			MemoryKind::Semantic => self.semantic.push(record),
			MemoryKind::Episodic => self.episodic.push(record),
		}
	}

	pub fn get(&self, kind: MemoryKind) -> &[MemoryRecord] {
		match kind {
			MemoryKind::Procedural => &self.procedural,
			MemoryKind::Semantic => &self.semantic,
			MemoryKind::Episodic => &self.episodic,
		}
	}

	pub fn total(&self) -> usize {
		self.procedural.len() + self.semantic.len() + self.episodic.len()
	}

	pub fn is_empty(&self) -> bool {
		self.total() == 0
	}
}

impl FromIterator<MemoryRecord> for SessionMemories {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = MemoryRecord>,
	{
		let mut grouped = Self::default();

		for record in iter {
			grouped.push(record);
		}

		grouped
	}
}
