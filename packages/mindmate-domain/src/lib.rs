pub mod decode;
pub mod memory;
pub mod model_output;
pub mod time_serde;
pub mod transcript;
pub mod trigger;
pub mod turn;

pub use decode::{DecodeError, DecodeReason};
pub use memory::{
	Effectiveness, EpisodicContext, EpisodicMemory, ExtractedMemories, Level, MemoryKind,
	MemoryPayload, MemoryRecord, ProceduralMemory, SemanticMemory, SemanticSource,
	SessionMemories,
};
pub use model_output::OutputError;
pub use transcript::DataType;
pub use turn::{ConversationTurn, NewTurn, Role};
