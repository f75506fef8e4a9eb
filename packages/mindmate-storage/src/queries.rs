use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{ChatMessageRow, MemoryRow},
};

pub async fn insert_chat_message<'e, E>(executor: E, row: &ChatMessageRow) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO chat_messages (
	id,
	session_id,
	user_id,
	role,
	content,
	processed_into_memory,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)",
	)
	.bind(row.id)
	.bind(row.session_id.as_str())
	.bind(row.user_id.as_str())
	.bind(row.role.as_str())
	.bind(row.content.as_str())
	.bind(row.processed_into_memory)
	.bind(row.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn count_session_messages<'e, E>(executor: E, session_id: &str) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	let count: i64 = sqlx::query_scalar("SELECT count(*) FROM chat_messages WHERE session_id = $1")
		.bind(session_id)
		.fetch_one(executor)
		.await?;

	Ok(u64::try_from(count).unwrap_or_default())
}

/// Oldest-first unprocessed messages of a session.
pub async fn fetch_unprocessed_messages<'e, E>(
	executor: E,
	session_id: &str,
	limit: u32,
) -> Result<Vec<ChatMessageRow>>
where
	E: Executor<'e, Database = Postgres>,
{
	if limit == 0 {
		return Err(Error::InvalidArgument("limit must be greater than zero.".to_string()));
	}

	let rows = sqlx::query_as::<_, ChatMessageRow>(
		"\
SELECT id, session_id, user_id, role, content, processed_into_memory, created_at
FROM chat_messages
WHERE session_id = $1
	AND processed_into_memory = false
ORDER BY created_at ASC, id ASC
LIMIT $2",
	)
	.bind(session_id)
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// The newest `limit` messages of a session, returned oldest-first.
pub async fn fetch_recent_messages<'e, E>(
	executor: E,
	session_id: &str,
	limit: u32,
) -> Result<Vec<ChatMessageRow>>
where
	E: Executor<'e, Database = Postgres>,
{
	let mut rows = sqlx::query_as::<_, ChatMessageRow>(
		"\
SELECT id, session_id, user_id, role, content, processed_into_memory, created_at
FROM chat_messages
WHERE session_id = $1
ORDER BY created_at DESC, id DESC
LIMIT $2",
	)
	.bind(session_id)
	.bind(i64::from(limit))
	.fetch_all(executor)
	.await?;

	rows.reverse();

	Ok(rows)
}

/// Flags the given messages as consumed. Already-processed ids are left untouched.
pub async fn mark_messages_processed<'e, E>(executor: E, ids: &[Uuid]) -> Result<u64>
where
	E: Executor<'e, Database = Postgres>,
{
	if ids.is_empty() {
		return Ok(0);
	}

	let result = sqlx::query(
		"\
UPDATE chat_messages
SET processed_into_memory = true
WHERE id = ANY($1)
	AND processed_into_memory = false",
	)
	.bind(ids)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn insert_memory<'e, E>(executor: E, row: &MemoryRow) -> Result<()>
where
	E: Executor<'e, Database = Postgres>,
{
	sqlx::query(
		"\
INSERT INTO memories (id, session_id, user_id, memory_type, content, created_at)
VALUES ($1, $2, $3, $4, $5, $6)",
	)
	.bind(row.id)
	.bind(row.session_id.as_str())
	.bind(row.user_id.as_str())
	.bind(row.memory_type.as_str())
	.bind(&row.content)
	.bind(row.created_at)
	.execute(executor)
	.await?;

	Ok(())
}

/// All memories of a session, newest first.
pub async fn fetch_session_memories<'e, E>(executor: E, session_id: &str) -> Result<Vec<MemoryRow>>
where
	E: Executor<'e, Database = Postgres>,
{
	let rows = sqlx::query_as::<_, MemoryRow>(
		"\
SELECT id, session_id, user_id, memory_type, content, created_at
FROM memories
WHERE session_id = $1
ORDER BY created_at DESC, id DESC",
	)
	.bind(session_id)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}
