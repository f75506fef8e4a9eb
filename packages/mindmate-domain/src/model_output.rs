//! Recovering JSON from free-form model replies.

use regex::Regex;
use serde_json::{Map, Value};

const OPENING_FENCE: &str = r"^```[A-Za-z0-9_-]*\s*";
const CLOSING_FENCE: &str = r"\s*```$";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OutputError {
	#[error("Model returned an empty reply.")]
	Empty,
	#[error("Model reply is not valid JSON: {0}.")]
	InvalidJson(String),
	#[error("Model reply does not contain a JSON array.")]
	NotArray,
	#[error("Model reply does not contain a JSON object.")]
	NotObject,
}

/// Removes a leading ```` ```json ```` (or bare ```` ``` ````) fence and a trailing fence.
pub fn strip_code_fences(raw: &str) -> &str {
	let mut text = raw.trim();

	if let Ok(opening) = Regex::new(OPENING_FENCE)
		&& let Some(found) = opening.find(text)
	{
		text = &text[found.end()..];
	}
	if let Ok(closing) = Regex::new(CLOSING_FENCE)
		&& let Some(found) = closing.find(text)
	{
		text = &text[..found.start()];
	}

	text.trim()
}

/// Parses the span between the first `[` and the last `]` as a JSON array.
pub fn parse_json_array(raw: &str) -> Result<Vec<Value>, OutputError> {
	let text = strip_code_fences(raw);

	if text.is_empty() {
		return Err(OutputError::Empty);
	}

	let span = bracketed(text, '[', ']').ok_or(OutputError::NotArray)?;

	match serde_json::from_str::<Value>(span) {
		Ok(Value::Array(items)) => Ok(items),
		Ok(_) => Err(OutputError::NotArray),
		Err(err) => Err(OutputError::InvalidJson(err.to_string())),
	}
}

/// Parses the span between the first `{` and the last `}` as a JSON object.
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>, OutputError> {
	let text = strip_code_fences(raw);

	if text.is_empty() {
		return Err(OutputError::Empty);
	}

	let span = bracketed(text, '{', '}').ok_or(OutputError::NotObject)?;

	match serde_json::from_str::<Value>(span) {
		Ok(Value::Object(object)) => Ok(object),
		Ok(_) => Err(OutputError::NotObject),
		Err(err) => Err(OutputError::InvalidJson(err.to_string())),
	}
}

fn bracketed(text: &str, open: char, close: char) -> Option<&str> {
	let start = text.find(open)?;
	let end = text.rfind(close)?;

	(end > start).then(|| &text[start..=end])
}
