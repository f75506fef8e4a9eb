use std::str::FromStr as _;

use time::OffsetDateTime;
use uuid::Uuid;

use mindmate_domain::{
	ConversationTurn, MemoryKind, MemoryPayload, MemoryRecord, NewTurn, Role, SessionMemories,
};
use mindmate_storage::{
	db::Db,
	models::{ChatMessageRow, MemoryRow},
	queries,
};

use crate::{BoxFuture, Error, MemoryStore, MessageStore, Result};

/// Both store adapters over one Postgres pool.
pub struct PgStores {
	pub db: Db,
}
impl PgStores {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	async fn count(&self, session_id: &str) -> Result<u64> {
		Ok(queries::count_session_messages(&self.db.pool, session_id).await?)
	}

	async fn unprocessed(&self, session_id: &str, limit: u32) -> Result<Vec<ConversationTurn>> {
		let rows = queries::fetch_unprocessed_messages(&self.db.pool, session_id, limit).await?;

		rows.into_iter().map(turn_from_row).collect()
	}

	async fn mark(&self, turn_ids: &[Uuid]) -> Result<u64> {
		Ok(queries::mark_messages_processed(&self.db.pool, turn_ids).await?)
	}

	async fn append(&self, turn: NewTurn) -> Result<ConversationTurn> {
		let row = ChatMessageRow {
			id: Uuid::new_v4(),
			session_id: turn.session_id,
			user_id: turn.user_id,
			role: turn.role.as_str().to_string(),
			content: turn.content,
			processed_into_memory: false,
			created_at: OffsetDateTime::now_utc(),
		};

		queries::insert_chat_message(&self.db.pool, &row).await?;

		turn_from_row(row)
	}

	async fn recent(&self, session_id: &str, limit: u32) -> Result<Vec<ConversationTurn>> {
		let rows = queries::fetch_recent_messages(&self.db.pool, session_id, limit).await?;

		rows.into_iter().map(turn_from_row).collect()
	}

	async fn insert_record(&self, record: &MemoryRecord) -> Result<()> {
		let content = serde_json::to_value(&record.payload)
			.map_err(|err| Error::Storage { message: format!("Failed to encode payload: {err}.") })?;
		let row = MemoryRow {
			id: record.id,
			session_id: record.session_id.clone(),
			user_id: record.user_id.clone(),
			memory_type: record.kind().as_str().to_string(),
			content,
			created_at: record.created_at,
		};

		Ok(queries::insert_memory(&self.db.pool, &row).await?)
	}

	async fn session_memories(&self, session_id: &str) -> Result<SessionMemories> {
		let rows = queries::fetch_session_memories(&self.db.pool, session_id).await?;
		let mut grouped = SessionMemories::default();

		for row in rows {
			match record_from_row(&row) {
				Some(record) => grouped.push(record),
				None => tracing::warn!(
					memory_id = %row.id,
					memory_type = %row.memory_type,
					"Skipping stored memory that no longer decodes."
				),
			}
		}

		Ok(grouped)
	}
}

impl MessageStore for PgStores {
	fn count_all_turns<'a>(&'a self, session_id: &'a str) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.count(session_id))
	}

	fn fetch_unprocessed_turns<'a>(
		&'a self,
		session_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ConversationTurn>>> {
		Box::pin(self.unprocessed(session_id, limit))
	}

	fn mark_processed<'a>(&'a self, turn_ids: &'a [Uuid]) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.mark(turn_ids))
	}

	fn append_turn<'a>(&'a self, turn: NewTurn) -> BoxFuture<'a, Result<ConversationTurn>> {
		Box::pin(self.append(turn))
	}

	fn recent_turns<'a>(
		&'a self,
		session_id: &'a str,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<ConversationTurn>>> {
		Box::pin(self.recent(session_id, limit))
	}
}

impl MemoryStore for PgStores {
	fn insert_memory_record<'a>(&'a self, record: &'a MemoryRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.insert_record(record))
	}

	fn fetch_memories_by_session<'a>(
		&'a self,
		session_id: &'a str,
	) -> BoxFuture<'a, Result<SessionMemories>> {
		Box::pin(self.session_memories(session_id))
	}
}

fn turn_from_row(row: ChatMessageRow) -> Result<ConversationTurn> {
	let role = Role::from_str(&row.role).map_err(|message| Error::Storage { message })?;

	Ok(ConversationTurn {
		id: row.id,
		session_id: row.session_id,
		role,
		content: row.content,
		created_at: row.created_at,
		processed: row.processed_into_memory,
	})
}

fn record_from_row(row: &MemoryRow) -> Option<MemoryRecord> {
	let kind = MemoryKind::parse(&row.memory_type)?;
	let payload = MemoryPayload::from_stored(kind, &row.content).ok()?;

	Some(MemoryRecord {
		id: row.id,
		session_id: row.session_id.clone(),
		user_id: row.user_id.clone(),
		payload,
		created_at: row.created_at,
	})
}
