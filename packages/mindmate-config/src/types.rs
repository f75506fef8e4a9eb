use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub consolidation: Consolidation,
	#[serde(default)]
	pub chat: Chat,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
}

/// An OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Consolidation {
	#[serde(default = "default_enabled")]
	pub enabled: bool,
	/// A cycle is due whenever the effective turn count is a positive multiple of this value.
	#[serde(default = "default_trigger_every")]
	pub trigger_every: u64,
	/// Maximum number of unprocessed turns consumed by one cycle.
	#[serde(default = "default_batch_limit")]
	pub batch_limit: u32,
	/// Attempts per memory kind before the whole extraction fails.
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	/// Upper bound on the authoritative count read performed inline with a chat turn.
	#[serde(default = "default_count_timeout_ms")]
	pub count_timeout_ms: u64,
}
impl Default for Consolidation {
	fn default() -> Self {
		Self {
			enabled: default_enabled(),
			trigger_every: default_trigger_every(),
			batch_limit: default_batch_limit(),
			max_attempts: default_max_attempts(),
			retry_delay_ms: default_retry_delay_ms(),
			count_timeout_ms: default_count_timeout_ms(),
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
	/// Prior turns shown to the analysis and response stages.
	#[serde(default = "default_recent_turns")]
	pub recent_turns: u32,
	#[serde(default = "default_max_message_chars")]
	pub max_message_chars: u32,
}
impl Default for Chat {
	fn default() -> Self {
		Self {
			recent_turns: default_recent_turns(),
			max_message_chars: default_max_message_chars(),
		}
	}
}

fn default_enabled() -> bool {
	true
}

fn default_trigger_every() -> u64 {
	8
}

fn default_batch_limit() -> u32 {
	15
}

fn default_max_attempts() -> u32 {
	3
}

fn default_retry_delay_ms() -> u64 {
	2_000
}

fn default_count_timeout_ms() -> u64 {
	1_500
}

fn default_recent_turns() -> u32 {
	6
}

fn default_max_message_chars() -> u32 {
	4_000
}
