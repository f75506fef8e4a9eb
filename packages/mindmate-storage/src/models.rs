use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChatMessageRow {
	pub id: Uuid,
	pub session_id: String,
	pub user_id: String,
	pub role: String,
	pub content: String,
	pub processed_into_memory: bool,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MemoryRow {
	pub id: Uuid,
	pub session_id: String,
	pub user_id: String,
	pub memory_type: String,
	pub content: Value,
	pub created_at: OffsetDateTime,
}
