pub mod chat;
pub mod community;
pub mod dataset;
pub mod error;
pub mod export;
pub mod labeling;
pub mod outputs;
pub mod storage;
pub mod text;
pub mod user;

pub use chat::{ChatMessage, ChatTarget};
pub use community::{CommunityShare, LikeOutcome};
pub use dataset::{
    Dataset, GenerationParams, HistoryEntry, InputSource, LabelMode, LabeledRow, OutputFormat,
};
pub use error::{Error, Result};
pub use export::{ExportError, ExportResult};
pub use labeling::{LabelError, LabelOutput, LabelPipeline};
pub use outputs::OutputDirectory;
pub use storage::{open_store, DatasetStore, FallbackStore, FileStore, SqliteStore};
pub use user::{Registration, User};
