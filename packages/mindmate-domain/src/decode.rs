//! Lenient decoding of model-produced memory items into typed payloads.
//!
//! Optional fields fall back to documented defaults and unknown enum labels are treated as
//! missing. Only a missing or blank required field rejects an item.

use serde_json::{Map, Value};

use crate::{
	memory::{
		Effectiveness, EpisodicContext, EpisodicMemory, Level, MemoryKind, MemoryPayload,
		ProceduralMemory, SemanticMemory, SemanticSource,
	},
	time_serde::date_option,
};

const DEFAULT_PROCEDURAL_CATEGORY: &str = "strategy";
const DEFAULT_SEMANTIC_CATEGORY: &str = "knowledge";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_EMOTIONAL_INTENSITY: i64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Rejected {kind} item at index {index}: {reason}.")]
pub struct DecodeError {
	pub kind: MemoryKind,
	pub index: usize,
	pub reason: DecodeReason,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeReason {
	#[error("item is not a JSON object")]
	NotAnObject,
	#[error("required field `{0}` is missing or blank")]
	MissingField(&'static str),
}

pub fn decode_procedural(index: usize, item: &Value) -> Result<ProceduralMemory, DecodeError> {
	let object = as_object(MemoryKind::Procedural, index, item)?;
	let content = required_str(MemoryKind::Procedural, index, object, "content")?;

	Ok(ProceduralMemory {
		category: str_or(object, "category", DEFAULT_PROCEDURAL_CATEGORY),
		content,
		steps: string_list(object, "steps"),
		triggers: string_list(object, "triggers"),
		effectiveness: label(object, "effectiveness", Effectiveness::from_label),
		last_used: object.get("last_used").and_then(Value::as_str).and_then(date_option::parse_lenient),
		source_type: optional_str(object, "source_type"),
	})
}

pub fn decode_semantic(index: usize, item: &Value) -> Result<SemanticMemory, DecodeError> {
	let object = as_object(MemoryKind::Semantic, index, item)?;
	let content = required_str(MemoryKind::Semantic, index, object, "content")?;
	let confidence = object
		.get("confidence")
		.and_then(number)
		.filter(|value| value.is_finite())
		.map(|value| value.clamp(0.0, 1.0) as f32)
		.unwrap_or(DEFAULT_CONFIDENCE);

	Ok(SemanticMemory {
		category: str_or(object, "category", DEFAULT_SEMANTIC_CATEGORY),
		content,
		confidence,
		source: label(object, "source", SemanticSource::from_label),
		related_concepts: string_list(object, "related_concepts"),
		importance: label(object, "importance", Level::from_label),
		source_type: optional_str(object, "source_type"),
	})
}

pub fn decode_episodic(index: usize, item: &Value) -> Result<EpisodicMemory, DecodeError> {
	let object = as_object(MemoryKind::Episodic, index, item)?;
	let event_description =
		required_str(MemoryKind::Episodic, index, object, "event_description")?;
	let context = match object.get("context").and_then(Value::as_object) {
		Some(context) => EpisodicContext {
			temporal: str_or(context, "temporal", ""),
			location: str_or(context, "location", ""),
			participants: string_list(context, "participants"),
			emotional_state: str_or(context, "emotional_state", ""),
		},
		None => EpisodicContext::default(),
	};
	let emotional_intensity = object
		.get("emotional_intensity")
		.and_then(number)
		.filter(|value| value.is_finite())
		.map(|value| value.round() as i64)
		.unwrap_or(DEFAULT_EMOTIONAL_INTENSITY)
		.clamp(1, 10) as u8;

	Ok(EpisodicMemory {
		event_description,
		context,
		outcome: str_or(object, "outcome", ""),
		emotional_intensity,
		significance: label(object, "significance", Level::from_label),
		learned_from: str_or(object, "learned_from", ""),
		source_type: optional_str(object, "source_type"),
	})
}

pub fn decode_item(kind: MemoryKind, index: usize, item: &Value) -> Result<MemoryPayload, DecodeError> {
	match kind {
		MemoryKind::Procedural => decode_procedural(index, item).map(MemoryPayload::Procedural),
		MemoryKind::Semantic => decode_semantic(index, item).map(MemoryPayload::Semantic),
		MemoryKind::Episodic => decode_episodic(index, item).map(MemoryPayload::Episodic),
	}
}

/// Decodes every item of one kind, keeping accepted items in input order.
pub fn decode_all<T>(
	items: &[Value],
	decode: impl Fn(usize, &Value) -> Result<T, DecodeError>,
) -> (Vec<T>, Vec<DecodeError>) {
	let mut accepted = Vec::with_capacity(items.len());
	let mut rejected = Vec::new();

	for (index, item) in items.iter().enumerate() {
		match decode(index, item) {
			Ok(value) => accepted.push(value),
			Err(err) => rejected.push(err),
		}
	}

	(accepted, rejected)
}

impl MemoryPayload {
	/// Rebuilds a payload from its stored JSON. The stored kind wins over any embedded tag.
	pub fn from_stored(kind: MemoryKind, content: &Value) -> Result<Self, DecodeError> {
		decode_item(kind, 0, content)
	}
}

fn as_object<'a>(
	kind: MemoryKind,
	index: usize,
	item: &'a Value,
) -> Result<&'a Map<String, Value>, DecodeError> {
	item.as_object().ok_or(DecodeError { kind, index, reason: DecodeReason::NotAnObject })
}

fn required_str(
	kind: MemoryKind,
	index: usize,
	object: &Map<String, Value>,
	field: &'static str,
) -> Result<String, DecodeError> {
	optional_str(object, field)
		.ok_or(DecodeError { kind, index, reason: DecodeReason::MissingField(field) })
}

fn optional_str(object: &Map<String, Value>, field: &str) -> Option<String> {
	object
		.get(field)
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(ToString::to_string)
}

fn str_or(object: &Map<String, Value>, field: &str, default: &str) -> String {
	optional_str(object, field).unwrap_or_else(|| default.to_string())
}

fn string_list(object: &Map<String, Value>, field: &str) -> Vec<String> {
	match object.get(field) {
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(Value::as_str)
			.map(str::trim)
			.filter(|value| !value.is_empty())
			.map(ToString::to_string)
			.collect(),
		// A bare string is a single-element list.
		Some(Value::String(value)) if !value.trim().is_empty() => vec![value.trim().to_string()],
		_ => Vec::new(),
	}
}

fn label<T>(object: &Map<String, Value>, field: &str, parse: impl Fn(&str) -> Option<T>) -> T
where
	T: Default,
{
	object.get(field).and_then(Value::as_str).and_then(parse).unwrap_or_default()
}

fn number(value: &Value) -> Option<f64> {
	match value {
		Value::Number(number) => number.as_f64(),
		Value::String(raw) => raw.trim().parse().ok(),
		_ => None,
	}
}
