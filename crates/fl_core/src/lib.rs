pub mod conversation;
pub mod error;
pub mod models;
pub mod progress;
pub mod search;
pub mod storage;
pub mod types;

pub use conversation::{Conversation, ConversationTurn, ToolCall, ToolDeclaration};
pub use error::Error;
pub use models::{InferenceRequest, InferenceResponse, InferenceService, ResponseFormat};
pub use progress::{AnalysisStatus, ProgressState, ProgressUpdate};
pub use search::{SearchRequest, SearchResult, WebSearch};
pub use storage::{AnalysisStore, ArticleId, ProgressPublisher, StorePublisher};
pub use types::{
    AlternativeHeadlines, AnalysisResult, Article, Claim, Confidence, DeepResult, LiteResult,
    Metadata,
};

pub type Result<T> = std::result::Result<T, Error>;
