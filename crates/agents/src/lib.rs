//! FoodFinder agents
//!
//! This crate contains everything that talks to models:
//! - inference: text embeddings (TEI), CLIP (fastembed) and the chat model
//! - retriever: text and image search over the indices
//! - indexer: offline index build
//! - tools: `rag_text_search`, `rag_image_search` and `image_qa`
//! - agent: the ReAct loop tying the model to the tools

pub mod agent;
pub mod error;
pub mod indexer;
pub mod inference;
pub mod retriever;
pub mod tools;

pub use agent::{AgentAnswer, AgentEvent, FoodFinderAgent, DEFAULT_MAX_STEPS, SYSTEM_PROMPT};
pub use error::{AgentError, Result};
pub use indexer::{BuildPlan, BuildReport, ImageBuildReport, Indexer, MetadataReport};
pub use inference::{ChatClient, ChatMessage, ChatModel, ClipEncoder, TeiClient};
pub use retriever::{ImageHit, MultimodalRetriever};
pub use tools::{ToolDispatch, Toolkit};
