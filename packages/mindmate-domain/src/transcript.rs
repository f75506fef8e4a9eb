//! Renders conversation turns and other structured input into prompt-ready text.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{memory::MemoryKind, time_serde, turn::ConversationTurn};

const GAME_KEYS: [&str; 4] = ["game_sessions", "gameplay", "achievements", "player_actions"];
const ACTIVITY_KEYS: [&str; 3] = ["activities", "events", "actions"];
const LEARNING_KEYS: [&str; 3] = ["lessons", "courses", "learning_progress"];

/// Shape of the input handed to extraction. Selects the formatter and the prompt focus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
	Chat,
	Game,
	Activity,
	Learning,
	#[default]
	General,
}
impl DataType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Chat => "chat",
			Self::Game => "game",
			Self::Activity => "activity",
			Self::Learning => "learning",
			Self::General => "general",
		}
	}

	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"chat" => Some(Self::Chat),
			"game" => Some(Self::Game),
			"activity" => Some(Self::Activity),
			"learning" => Some(Self::Learning),
			"general" => Some(Self::General),
			_ => None,
		}
	}

	/// An explicit `data_type` field wins over key-based detection when it names a known type.
	pub fn resolve(input: &Value) -> Self {
		input
			.get("data_type")
			.and_then(Value::as_str)
			.and_then(Self::parse)
			.unwrap_or_else(|| Self::detect(input))
	}

	pub fn detect(input: &Value) -> Self {
		let Some(object) = input.as_object() else {
			return Self::General;
		};
		let has_any = |keys: &[&str]| keys.iter().any(|key| object.contains_key(*key));

		if has_any(&["chat_history", "messages"]) {
			Self::Chat
		} else if has_any(&GAME_KEYS) {
			Self::Game
		} else if has_any(&ACTIVITY_KEYS) {
			Self::Activity
		} else if has_any(&LEARNING_KEYS) {
			Self::Learning
		} else {
			Self::General
		}
	}

	/// What the extraction prompt for `kind` should look for in this kind of input.
	pub fn focus(self, kind: MemoryKind) -> &'static str {
		match (kind, self) {
			(MemoryKind::Procedural, Self::Chat) =>
				"therapeutic techniques, coping strategies, communication skills",
			(MemoryKind::Procedural, Self::Game) =>
				"gameplay strategies, skill combinations, progression techniques, game mechanics",
			(MemoryKind::Procedural, Self::Activity) =>
				"activity procedures, workflow processes, task methodologies",
			(MemoryKind::Procedural, Self::Learning) =>
				"study techniques, problem-solving methods, learning strategies",
			(MemoryKind::Procedural, Self::General) =>
				"processes, procedures, step-by-step methods, systematic approaches",
			(MemoryKind::Semantic, Self::Chat) =>
				"personal facts, preferences, relationships, mental health concepts",
			(MemoryKind::Semantic, Self::Game) =>
				"game knowledge, player preferences, character abilities, game world facts",
			(MemoryKind::Semantic, Self::Activity) =>
				"activity preferences, skill levels, social connections, interests",
			(MemoryKind::Semantic, Self::Learning) =>
				"knowledge concepts, subject mastery, learning preferences, academic facts",
			(MemoryKind::Semantic, Self::General) =>
				"facts, concepts, preferences, relationships, knowledge",
			(MemoryKind::Episodic, Self::Chat) =>
				"personal experiences, emotional episodes, significant conversations",
			(MemoryKind::Episodic, Self::Game) =>
				"gameplay events, achievements, memorable moments, game experiences",
			(MemoryKind::Episodic, Self::Activity) =>
				"specific events, activities participated in, memorable experiences",
			(MemoryKind::Episodic, Self::Learning) =>
				"learning experiences, breakthrough moments, educational milestones",
			(MemoryKind::Episodic, Self::General) =>
				"specific events, experiences, memorable moments, significant occurrences",
		}
	}
}

impl fmt::Display for DataType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One `[timestamp] role: content` line per turn, in the given order.
pub fn format_turns(turns: &[ConversationTurn]) -> String {
	turns
		.iter()
		.map(|turn| {
			let timestamp = time_serde::format(turn.created_at).unwrap_or_default();

			format!("[{timestamp}] {}: {}", turn.role, turn.content)
		})
		.collect::<Vec<_>>()
		.join("\n")
}

pub fn format_value(data_type: DataType, input: &Value) -> String {
	let empty = Map::new();
	let object = input.as_object().unwrap_or(&empty);

	match data_type {
		DataType::Chat => format_chat(object),
		DataType::Game => format_game(object),
		DataType::Activity => format_activity(object),
		DataType::Learning => format_learning(object),
		DataType::General => format_general(object, 0).join("\n"),
	}
}

fn format_chat(object: &Map<String, Value>) -> String {
	let mut lines = Vec::new();

	for message in list(object, "chat_history").or_else(|| list(object, "messages")).unwrap_or(&[]) {
		let role = text_or(message, "role", "unknown");
		let content = message
			.get("content")
			.map(scalar)
			.unwrap_or_else(|| message.get("text").map(scalar).unwrap_or_default());
		let timestamp = text_or(message, "timestamp", "");

		lines.push(format!("[{timestamp}] {role}: {content}"));
	}

	if let Some(context) = object.get("context").filter(|context| !is_blank(context)) {
		let rendered = serde_json::to_string_pretty(context).unwrap_or_default();

		lines.push(format!("\nContext: {rendered}"));
	}

	lines.join("\n")
}

fn format_game(object: &Map<String, Value>) -> String {
	let mut lines = vec!["=== GAME DATA ===".to_string()];

	if let Some(player) = object.get("player") {
		lines.push(format!("Player: {}", text_or(player, "name", "Unknown")));
		lines.push(format!("Level: {}", text_or(player, "level", "N/A")));
		lines.push(format!("Experience: {}", text_or(player, "experience", "N/A")));
	}
	if let Some(sessions) = list(object, "game_sessions") {
		lines.push("\n--- Game Sessions ---".to_string());

		for session in sessions {
			lines.push(format!(
				"Session {}: {} minutes",
				text_or(session, "id", "N/A"),
				text_or(session, "duration", "N/A")
			));

			for action in session.get("actions").and_then(Value::as_array).into_iter().flatten() {
				lines.push(format!(
					"  - {}: {}",
					text_or(action, "type", "action"),
					text_or(action, "description", "")
				));
			}
		}
	}
	if let Some(achievements) = list(object, "achievements") {
		lines.push("\n--- Achievements ---".to_string());

		for achievement in achievements {
			lines.push(format!(
				"✓ {}: {}",
				text_or(achievement, "name", "Unknown"),
				text_or(achievement, "description", "")
			));
		}
	}
	if let Some(actions) = list(object, "player_actions") {
		lines.push("\n--- Player Actions ---".to_string());

		for action in actions {
			lines.push(format!(
				"[{}] {}: {}",
				text_or(action, "timestamp", ""),
				text_or(action, "type", "action"),
				text_or(action, "description", "")
			));
		}
	}

	lines.join("\n")
}

fn format_activity(object: &Map<String, Value>) -> String {
	let mut lines = vec!["=== ACTIVITY DATA ===".to_string()];

	for activity in list(object, "activities").or_else(|| list(object, "events")).unwrap_or(&[]) {
		let name = activity
			.get("name")
			.or_else(|| activity.get("type"))
			.map(scalar)
			.unwrap_or_else(|| "Unknown".to_string());
		let time = activity
			.get("timestamp")
			.or_else(|| activity.get("time"))
			.map(scalar)
			.unwrap_or_else(|| "N/A".to_string());

		lines.push(format!("Activity: {name}"));
		lines.push(format!("Time: {time}"));
		lines.push(format!("Description: {}", text_or(activity, "description", "")));

		if let Some(participants) = activity.get("participants").and_then(Value::as_array) {
			lines.push(format!("Participants: {}", join_scalars(participants)));
		}
		if let Some(outcome) = activity.get("outcome") {
			lines.push(format!("Outcome: {}", scalar(outcome)));
		}

		lines.push("---".to_string());
	}

	lines.join("\n")
}

fn format_learning(object: &Map<String, Value>) -> String {
	let mut lines = vec!["=== LEARNING DATA ===".to_string()];

	for course in list(object, "courses").unwrap_or(&[]) {
		lines.push(format!("Course: {}", text_or(course, "name", "Unknown")));
		lines.push(format!("Progress: {}%", text_or(course, "progress", "N/A")));

		for lesson in course.get("lessons").and_then(Value::as_array).into_iter().flatten() {
			lines.push(format!("  Lesson: {}", text_or(lesson, "title", "N/A")));
			lines.push(format!("  Completed: {}", text_or(lesson, "completed", "false")));
		}
	}
	if let Some(progress) = object.get("learning_progress") {
		let skills = progress.get("skills").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);

		lines.push(format!("\nOverall Progress: {}%", text_or(progress, "completion_rate", "N/A")));
		lines.push(format!("Skills Acquired: {}", join_scalars(skills)));
	}

	lines.join("\n")
}

fn format_general(object: &Map<String, Value>, depth: usize) -> Vec<String> {
	let indent = "  ".repeat(depth);
	let mut lines = Vec::new();

	for (key, value) in object {
		match value {
			Value::Object(nested) => {
				lines.push(format!("{indent}{key}:"));
				lines.extend(format_general(nested, depth + 1));
			},
			Value::Array(items) => {
				lines.push(format!("{indent}{key}:"));

				for item in items {
					match item {
						Value::Object(nested) => lines.extend(format_general(nested, depth + 1)),
						other => lines.push(format!("{indent}  - {}", scalar(other))),
					}
				}
			},
			other => lines.push(format!("{indent}{key}: {}", scalar(other))),
		}
	}

	lines
}

fn list<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a [Value]> {
	object.get(key).and_then(Value::as_array).map(Vec::as_slice)
}

fn text_or(value: &Value, key: &str, default: &str) -> String {
	value.get(key).map(scalar).unwrap_or_else(|| default.to_string())
}

fn scalar(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

fn join_scalars(values: &[Value]) -> String {
	values.iter().map(scalar).collect::<Vec<_>>().join(", ")
}

fn is_blank(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Object(object) => object.is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::String(text) => text.is_empty(),
		_ => false,
	}
}
