use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	User,
	Assistant,
}
impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::User => "user",
			Self::Assistant => "assistant",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(raw: &str) -> Result<Self, Self::Err> {
		match raw.trim().to_ascii_lowercase().as_str() {
			"user" => Ok(Self::User),
			"assistant" => Ok(Self::Assistant),
			other => Err(format!("Unknown conversation role: {other}.")),
		}
	}
}

/// One stored message of a conversation.
///
/// `processed` flips to `true` exactly once, when a consolidation cycle has consumed the turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
	pub id: Uuid,
	pub session_id: String,
	pub role: Role,
	pub content: String,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	pub processed: bool,
}

/// A turn that has not been written yet; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
	pub session_id: String,
	pub user_id: String,
	pub role: Role,
	pub content: String,
}
