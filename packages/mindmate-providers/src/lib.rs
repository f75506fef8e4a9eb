pub mod llm;

use color_eyre::{Result, eyre};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);

	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header {key} must be a string."));
		};

		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}

	Ok(headers)
}

/// Builds an OpenAI-style message list from a system prompt and a user prompt.
pub fn prompt_messages(system: &str, user: &str) -> Vec<Value> {
	let mut messages = Vec::with_capacity(2);

	if !system.trim().is_empty() {
		messages.push(serde_json::json!({ "role": "system", "content": system }));
	}

	messages.push(serde_json::json!({ "role": "user", "content": user }));

	messages
}
