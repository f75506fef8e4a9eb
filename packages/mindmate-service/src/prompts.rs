//! Prompt text for extraction, analysis, and the counselor reply.

use serde_json::{Map, Value};

use mindmate_domain::{ConversationTurn, DataType, MemoryKind, Role, SessionMemories};
use mindmate_providers::prompt_messages;

use crate::chat::{ClientContext, PsychologicalAnalysis};

const EXTRACTION_SYSTEM: &str = "You classify conversation data into long-term memories for a \
wellness companion. Reply with a JSON array only. Do not wrap it in prose.";

const COUNSELOR_SYSTEM: &str = "You are MindMate, a culturally aware wellness companion for \
young people in India (ages 16 to 25). Blend evidence-based psychology with the warmth of a \
trusted friend.

Draw on CBT (cognitive restructuring, behavioral activation), ACT (values, psychological \
flexibility, mindful awareness) and MBCT (emotional regulation, self-compassion). Address the \
stress categories named in the analysis.

Be sensitive to academic pressure, board and competitive exams, family expectations, joint \
family dynamics, generational differences, and the stigma around mental health. Validate \
struggles without dismissing traditional values.

Use a warm, non-judgmental tone and mirror the user's language comfort, including Hinglish \
words such as yaar or bhai when they use them. Offer practical coping ideas that fit their \
family and social context and ask an exploratory question when it helps.

Reply with the conversational message only. Never add numbered annotations, technique labels \
such as (CBT) or (ACT), structural notes such as (validation), or commentary about the reply. \
Keep everyday replies short enough for a back-and-forth chat and go deeper only when the user \
needs more support.";

const RECENT_CONTEXT_CHARS: usize = 100;
const ANALYSIS_CONTEXT_CHARS: usize = 500;
const SUMMARY_FIELD_CHARS: usize = 100;
const ACTIVITIES_IN_PROMPT: usize = 2;
const VOICE_FIELDS: [(&str, &str); 5] = [
	("Emotional tone", "emotional_tone"),
	("Stress level", "stress_level"),
	("Speech pace", "speech_pace"),
	("Cultural context", "cultural_context"),
	("Voice insights", "insights"),
];

/// Chat messages for one memory kind's extraction request.
pub fn extraction_messages(kind: MemoryKind, data_type: DataType, transcript: &str) -> Vec<Value> {
	let user = format!(
		"Analyze the following {data_type} data and extract {label} MEMORY items.\n\n\
Focus on {focus}.\n\n\
{definition}\n\n\
Data:\n{transcript}\n\n\
Return ONLY a JSON array in this format:\n{schema}\n\n\
If nothing qualifies, return an empty array [].",
		label = kind.as_str().to_ascii_uppercase(),
		focus = data_type.focus(kind),
		definition = definition(kind),
		schema = schema(kind, data_type),
	);

	prompt_messages(EXTRACTION_SYSTEM, &user)
}

fn definition(kind: MemoryKind) -> &'static str {
	match kind {
		MemoryKind::Procedural => "Procedural memory covers skills, techniques, step-by-step \
processes, strategies for reaching goals, and behavior patterns that can be repeated.",
		MemoryKind::Semantic => "Semantic memory covers facts, concepts, personal preferences and \
characteristics, relationships, identity, goals, values, and beliefs.",
		MemoryKind::Episodic => "Episodic memory covers specific events and experiences with their \
context, outcome, and emotional or practical significance.",
	}
}

fn schema(kind: MemoryKind, data_type: DataType) -> String {
	match kind {
		MemoryKind::Procedural => format!(
			r#"[{{"type": "procedural", "category": "strategy|technique|skill|process|method", "content": "description of the procedure", "steps": ["step 1", "step 2"], "triggers": ["when to use it"], "effectiveness": "high|medium|low|unknown", "last_used": "YYYY-MM-DD or null", "source_type": "{data_type}"}}]"#
		),
		MemoryKind::Semantic => format!(
			r#"[{{"type": "semantic", "category": "personal_fact|concept|preference|relationship|goal|knowledge", "content": "the fact or concept", "confidence": 0.0, "source": "stated|inferred|observed", "related_concepts": ["concept"], "importance": "high|medium|low", "source_type": "{data_type}"}}]"#
		),
		MemoryKind::Episodic => format!(
			r#"[{{"type": "episodic", "event_description": "what happened", "context": {{"temporal": "when", "location": "where, if known", "participants": ["person"], "emotional_state": "emotional context"}}, "outcome": "result or resolution", "emotional_intensity": 1, "significance": "high|medium|low", "learned_from": "insight gained", "source_type": "{data_type}"}}]"#
		),
	}
}

/// Single-message request for the structured psychological analysis.
pub fn analysis_messages(
	user_message: &str,
	client: &ClientContext,
	recent: &[ConversationTurn],
	memories: &SessionMemories,
) -> Vec<Value> {
	let context = match summary_line(&client.conversation_summary) {
		Some(summary) => format!("{summary}\n{}", recent_context(recent, "AI")),
		None => recent_context(recent, "AI"),
	};
	let context = truncate_chars(&context, ANALYSIS_CONTEXT_CHARS);
	let activities = activities_line(&client.user_activities);
	let voice = if client.voice_analysis.is_empty() {
		String::new()
	} else {
		let lines = VOICE_FIELDS
			.iter()
			.map(|(label, key)| format!("- {label}: {}", field_text(&client.voice_analysis, key)))
			.collect::<Vec<_>>()
			.join("\n");

		format!("\n\nVoice analysis:\n{lines}")
	};
	let patterns = if client.user_patterns.is_empty() {
		String::new()
	} else {
		format!("\n\nKnown patterns: {}", Value::Object(client.user_patterns.clone()))
	};
	let memory_digest = if memories.is_empty() {
		String::new()
	} else {
		format!(
			"\n\nSession memories ({} total):\n- Procedural: {} skills or techniques learned\n- Semantic: {} facts or preferences known\n- Episodic: {} past experiences recorded{}",
			memories.total(),
			memories.procedural.len(),
			memories.semantic.len(),
			memories.episodic.len(),
			memory_highlights(memories),
		)
	};
	let user = format!(
		"Analyze this user's mental health state. The user is a young person in India (16 to 25).\n\n\
User's message: \"{user_message}\"\n\n\
Recent context:\n{context}\n\n\
Activities: {activities}{voice}{patterns}{memory_digest}\n\n\
Reply with a single JSON object with these keys:\n\
- emotional_state: current condition\n\
- stress_categories: array drawn from Academic, Family, Social, Emotional, Identity, Career\n\
- therapeutic_approach: CBT, ACT, or MBCT recommendation\n\
- cultural_pressures: family, academic, or social pressures at play\n\
- language_style: formal, casual, or hindi-mixed\n\
- psychological_insights: array of 2 or 3 key observations\n\
- coping_assessment: current resilience level\n\
- intervention_priority: immediate, supportive, or long-term\n\
- activity_recommendations: array of specific helpful activities"
	);

	prompt_messages("", &user)
}

/// System and user messages for the counselor reply.
pub fn counselor_messages(
	user_message: &str,
	analysis: &PsychologicalAnalysis,
	recent: &[ConversationTurn],
	voice_analysis: &Map<String, Value>,
) -> Vec<Value> {
	let analysis_json = serde_json::to_string_pretty(analysis).unwrap_or_default();
	let tail = &recent[recent.len().saturating_sub(3)..];
	let context = if tail.is_empty() {
		format!("User's message: '{user_message}' (New conversation)")
	} else {
		format!("{}\nUser (current): {user_message}", recent_context(tail, "MindMate"))
	};
	let voice = if voice_analysis.is_empty() {
		String::new()
	} else {
		let voice_json =
			serde_json::to_string_pretty(&Value::Object(voice_analysis.clone())).unwrap_or_default();

		format!("\n\nVOICE ANALYSIS INSIGHTS:\n{voice_json}")
	};
	let user = format!(
		"PSYCHOLOGICAL ANALYSIS:\n{analysis_json}\n\n\
CONVERSATION CONTEXT:\n{context}{voice}\n\n\
USER'S CURRENT MESSAGE: \"{user_message}\"\n\n\
Write a natural, conversational reply as MindMate."
	);

	prompt_messages(COUNSELOR_SYSTEM, &user)
}

fn recent_context(turns: &[ConversationTurn], assistant_label: &str) -> String {
	if turns.is_empty() {
		return "New conversation".to_string();
	}

	turns
		.iter()
		.map(|turn| {
			let speaker = match turn.role {
				Role::User => "User",
				Role::Assistant => assistant_label,
			};

			format!("{speaker}: {}", truncate_chars(&turn.content, RECENT_CONTEXT_CHARS))
		})
		.collect::<Vec<_>>()
		.join("\n")
}

fn summary_line(summary: &Map<String, Value>) -> Option<String> {
	if summary.is_empty() {
		return None;
	}

	let part = |key: &str| truncate_chars(&field_text(summary, key), SUMMARY_FIELD_CHARS);

	Some(format!(
		"SUMMARY: Progress: {} | Patterns: {} | Culture: {}",
		part("therapeutic_progress"),
		part("emotional_patterns"),
		part("cultural_context"),
	))
}

fn activities_line(activities: &[Value]) -> String {
	let parts = activities
		.iter()
		.take(ACTIVITIES_IN_PROMPT)
		.filter_map(Value::as_object)
		.map(|activity| {
			let name = match activity.get("activity_type").and_then(Value::as_str) {
				Some(name) => name.replace('_', " "),
				None => "Unknown".to_string(),
			};

			format!("{name}: {}", field_text(activity, "score"))
		})
		.collect::<Vec<_>>();

	if parts.is_empty() { "No recent activities".to_string() } else { parts.join(" | ") }
}

fn field_text(object: &Map<String, Value>, key: &str) -> String {
	match object.get(key) {
		Some(Value::String(text)) => text.clone(),
		Some(Value::Null) | None => "N/A".to_string(),
		Some(other) => other.to_string(),
	}
}

fn memory_highlights(memories: &SessionMemories) -> String {
	let mut lines = String::new();

	for kind in MemoryKind::ALL {
		for record in memories.get(kind).iter().take(3) {
			lines.push_str(&format!("\n  * [{kind}] {}", record.payload.summary()));
		}
	}

	lines
}

fn truncate_chars(text: &str, max: usize) -> String {
	match text.char_indices().nth(max) {
		Some((end, _)) => text[..end].to_string(),
		None => text.to_string(),
	}
}
