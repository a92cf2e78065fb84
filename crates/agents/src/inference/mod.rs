//! Clients for the models FoodFinder talks to: text embeddings (TEI),
//! CLIP image/label embeddings (fastembed) and the chat model.

pub mod chat;
pub mod clip;
pub mod tei;

pub use chat::{ChatClient, ChatMessage, ChatModel, FunctionCall, Role, ToolCall, ToolSpec};
pub use clip::{cosine_similarity, ClipEncoder};
pub use tei::TeiClient;

pub(crate) fn env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

pub(crate) fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn trim_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
