//! Classifies a batch of turns into procedural, semantic, and episodic memories.
//!
//! Each kind is one independent model call with its own retry budget. The three calls run
//! concurrently and the extraction succeeds only if all three do.

use std::{sync::Arc, time::Duration};

use serde_json::Value;
use tokio::task::JoinSet;

use mindmate_config::{Consolidation, LlmProviderConfig};
use mindmate_domain::{
	ConversationTurn, DataType, ExtractedMemories, MemoryKind,
	decode::{self, DecodeError},
	model_output, transcript,
};

use crate::{Error, GenerationProvider, Result, prompts};

#[derive(Clone)]
pub struct ExtractionEngine {
	provider: Arc<dyn GenerationProvider>,
	llm: Arc<LlmProviderConfig>,
	max_attempts: u32,
	retry_delay: Duration,
}
impl ExtractionEngine {
	pub fn new(
		provider: Arc<dyn GenerationProvider>,
		llm: LlmProviderConfig,
		consolidation: &Consolidation,
	) -> Self {
		Self {
			provider,
			llm: Arc::new(llm),
			max_attempts: consolidation.max_attempts.max(1),
			retry_delay: Duration::from_millis(consolidation.retry_delay_ms),
		}
	}

	/// Extracts memories from chronologically ordered turns.
	pub async fn extract(
		&self,
		turns: &[ConversationTurn],
		data_type: DataType,
	) -> Result<ExtractedMemories> {
		self.extract_text(transcript::format_turns(turns), data_type).await
	}

	/// Extracts memories from arbitrary structured input, resolving its shape first.
	pub async fn extract_value(&self, input: &Value) -> Result<(DataType, ExtractedMemories)> {
		let data_type = DataType::resolve(input);
		let memories = self.extract_text(transcript::format_value(data_type, input), data_type).await?;

		Ok((data_type, memories))
	}

	async fn extract_text(&self, text: String, data_type: DataType) -> Result<ExtractedMemories> {
		let mut tasks = JoinSet::new();

		for kind in MemoryKind::ALL {
			let request = KindRequest {
				provider: self.provider.clone(),
				llm: self.llm.clone(),
				kind,
				messages: prompts::extraction_messages(kind, data_type, &text),
				max_attempts: self.max_attempts,
				retry_delay: self.retry_delay,
			};

			tasks.spawn(async move { (kind, request.run().await) });
		}

		let mut extracted = ExtractedMemories::default();

		// Returning early drops the set, which aborts the calls still in flight.
		while let Some(joined) = tasks.join_next().await {
			let (kind, outcome) = joined.map_err(|err| Error::Extraction {
				message: format!("Extraction task did not complete: {err}."),
			})?;
			let items = outcome?;

			match kind {
				MemoryKind::Procedural => {
					extracted.procedural = accept(kind, &items, decode::decode_procedural);
				},
				MemoryKind::Semantic => {
					extracted.semantic = accept(kind, &items, decode::decode_semantic);
				},
				MemoryKind::Episodic => {
					extracted.episodic = accept(kind, &items, decode::decode_episodic);
				},
			}
		}

		tracing::info!(
			data_type = %data_type,
			procedural = extracted.procedural.len(),
			semantic = extracted.semantic.len(),
			episodic = extracted.episodic.len(),
			"Memory extraction completed."
		);

		Ok(extracted)
	}
}

struct KindRequest {
	provider: Arc<dyn GenerationProvider>,
	llm: Arc<LlmProviderConfig>,
	kind: MemoryKind,
	messages: Vec<Value>,
	max_attempts: u32,
	retry_delay: Duration,
}
impl KindRequest {
	async fn run(self) -> Result<Vec<Value>> {
		let mut last_error = String::new();

		for attempt in 1..=self.max_attempts {
			let outcome = match self.provider.generate(&self.llm, &self.messages).await {
				Ok(reply) => model_output::parse_json_array(&reply).map_err(|err| err.to_string()),
				Err(err) => Err(err.to_string()),
			};

			match outcome {
				Ok(items) => return Ok(items),
				Err(err) => {
					tracing::warn!(
						kind = %self.kind,
						attempt,
						max_attempts = self.max_attempts,
						error = %err,
						"Memory extraction attempt failed."
					);

					last_error = err;
				},
			}

			if attempt < self.max_attempts {
				tokio::time::sleep(self.retry_delay).await;
			}
		}

		Err(Error::Extraction {
			message: format!(
				"{} extraction failed after {} attempts: {last_error}",
				self.kind, self.max_attempts
			),
		})
	}
}

fn accept<T>(
	kind: MemoryKind,
	items: &[Value],
	decode: impl Fn(usize, &Value) -> std::result::Result<T, DecodeError>,
) -> Vec<T> {
	let (accepted, rejected) = decode::decode_all(items, decode);

	for err in &rejected {
		tracing::warn!(kind = %kind, index = err.index, error = %err, "Dropping undecodable memory item.");
	}

	accepted
}
