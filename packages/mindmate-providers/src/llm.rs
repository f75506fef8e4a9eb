use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Sends one chat-completions request and returns the first choice's text.
///
/// A single call, no retries. Callers own their retry policy.
pub async fn generate(cfg: &mindmate_config::LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion_text(&json)
}

fn parse_completion_text(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"));

	match content {
		Some(Value::String(text)) => Ok(text.clone()),
		// Some gateways return content parts instead of a plain string.
		Some(Value::Array(parts)) => {
			let text = parts
				.iter()
				.filter_map(|part| part.get("text").and_then(Value::as_str))
				.collect::<Vec<_>>()
				.join("");

			Ok(text)
		},
		_ => Err(eyre::eyre!("Completion response is missing message content.")),
	}
}
