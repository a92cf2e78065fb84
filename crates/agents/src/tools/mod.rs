//! The tools the agent can call, and the toolkit that dispatches them.

pub mod image_qa;
pub mod rag_image;
pub mod rag_text;

use crate::inference::{ClipEncoder, ToolSpec};
use crate::retriever::MultimodalRetriever;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub use image_qa::ImageQaArgs;
pub use rag_image::RagImageArgs;
pub use rag_text::RagTextArgs;

/// Default number of results for the search tools
pub const DEFAULT_K: usize = 5;

pub(crate) fn default_k() -> usize {
    DEFAULT_K
}

/// Executes tool calls by name.
///
/// Tool failures never surface as errors: the model gets a message it can
/// read and react to.
#[allow(async_fn_in_trait)]
pub trait ToolDispatch {
    fn specs(&self) -> Vec<ToolSpec>;

    async fn invoke(&self, name: &str, arguments: &Value) -> String;
}

/// The FoodFinder tools with their shared dependencies
#[derive(Clone)]
pub struct Toolkit {
    retriever: Option<Arc<MultimodalRetriever>>,
    clip: ClipEncoder,
}

impl Toolkit {
    /// All three tools, backed by the retriever
    pub fn new(retriever: Arc<MultimodalRetriever>) -> Self {
        let clip = retriever.clip().clone();
        Self {
            retriever: Some(retriever),
            clip,
        }
    }

    /// Only `image_qa`, which needs no index
    pub fn image_only(clip: ClipEncoder) -> Self {
        Self {
            retriever: None,
            clip,
        }
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        let mut names = Vec::with_capacity(3);
        if self.retriever.is_some() {
            names.push(rag_text::NAME);
            names.push(rag_image::NAME);
        }
        names.push(image_qa::NAME);
        names
    }

    pub async fn rag_text_search(&self, args: RagTextArgs) -> String {
        match &self.retriever {
            Some(retriever) => rag_text::run(retriever, args).await,
            None => unavailable(rag_text::NAME),
        }
    }

    pub async fn rag_image_search(&self, args: RagImageArgs) -> String {
        match &self.retriever {
            Some(retriever) => rag_image::run(retriever, args).await,
            None => unavailable(rag_image::NAME),
        }
    }

    pub async fn image_qa(&self, args: ImageQaArgs) -> String {
        image_qa::run(&self.clip, args).await
    }
}

impl ToolDispatch for Toolkit {
    fn specs(&self) -> Vec<ToolSpec> {
        let mut specs = Vec::with_capacity(3);
        if self.retriever.is_some() {
            specs.push(rag_text::spec());
            specs.push(rag_image::spec());
        }
        specs.push(image_qa::spec());
        specs
    }

    #[instrument(skip(self, arguments))]
    async fn invoke(&self, name: &str, arguments: &Value) -> String {
        debug!("Invoking {} with {}", name, arguments);

        let available = self.tool_names();
        if !available.contains(&name) {
            warn!("Model asked for unknown tool {}", name);
            return format!(
                "Error: unknown tool '{}'. Available tools: {}",
                name,
                available.join(", ")
            );
        }

        match name {
            rag_text::NAME => match parse_args(name, arguments) {
                Ok(args) => self.rag_text_search(args).await,
                Err(message) => message,
            },
            rag_image::NAME => match parse_args(name, arguments) {
                Ok(args) => self.rag_image_search(args).await,
                Err(message) => message,
            },
            _ => match parse_args(name, arguments) {
                Ok(args) => self.image_qa(args).await,
                Err(message) => message,
            },
        }
    }
}

fn parse_args<T: DeserializeOwned>(name: &str, arguments: &Value) -> Result<T, String> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| format!("Error: invalid arguments for {}: {}", name, e))
}

fn unavailable(name: &str) -> String {
    format!("Error: {} is unavailable because no index is loaded", name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image_only() -> Toolkit {
        Toolkit::image_only(ClipEncoder::new(std::env::temp_dir()))
    }

    #[test]
    fn test_image_only_toolkit_offers_image_qa() {
        let toolkit = image_only();
        let names: Vec<String> = toolkit.specs().into_iter().map(|s| s.name).collect();

        assert_eq!(names, vec!["image_qa".to_string()]);
        assert_eq!(toolkit.tool_names(), vec!["image_qa"]);
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let output = image_only()
            .invoke("rag_text_search", &json!({"query": "pizza"}))
            .await;

        assert!(output.starts_with("Error: unknown tool 'rag_text_search'"));
        assert!(output.contains("image_qa"));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let output = image_only()
            .invoke("image_qa", &json!({"image_path": "x.jpg"}))
            .await;

        assert!(output.starts_with("Error: invalid arguments for image_qa"));
        assert!(output.contains("question"));
    }
}
