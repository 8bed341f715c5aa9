pub mod chunk;
pub mod config;
pub mod context;
pub mod dictionary;
pub mod error;
pub mod indexer;
pub mod metrics;
pub mod text;
pub mod tokenizer;

pub use chunk::{ChunkCompleted, ChunkId, DocumentId, Entry, InstanceOffset, TextIndex};
pub use config::{ContextConfig, IndexSettings, TokenizerConfig};
pub use context::{ContextBuilder, ContextError, DocumentContext, Highlight};
pub use dictionary::{TermDictionary, TermId, TrieTermDictionary};
pub use error::{IndexError, Result};
pub use indexer::{IndexJob, IndexingQueue};
pub use metrics::IndexMetrics;
pub use text::{InMemoryTextProvider, TextConsumer, TextPart, TextProvider};
pub use tokenizer::{GrammarTag, Position, Token, TokenType, Tokenizer};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
