//! `rag_image_search`: restaurants whose photos look like a given image.

use super::default_k;
use crate::inference::ToolSpec;
use crate::retriever::MultimodalRetriever;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

pub const NAME: &str = "rag_image_search";

const DESCRIPTION: &str = "Search for restaurants using image similarity. \
Use this tool when the user provides an image and wants to find restaurants with \
similar food, ambiance, or style. The tool uses visual embeddings to find matches. \
Returns restaurant information with similarity scores.";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RagImageArgs {
    pub image_path: String,
    #[serde(default = "default_k")]
    pub k: usize,
}

pub fn spec() -> ToolSpec {
    ToolSpec {
        name: NAME.to_string(),
        description: DESCRIPTION.to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "image_path": {
                    "type": "string",
                    "description": "Path to the image file for similarity search. Can be a photo of food, restaurant interior, or ambiance."
                },
                "k": {
                    "type": "integer",
                    "description": "Number of similar restaurant results to return (default: 5)",
                    "default": 5
                }
            },
            "required": ["image_path"]
        }),
    }
}

pub async fn run(retriever: &MultimodalRetriever, args: RagImageArgs) -> String {
    let results = match retriever.load_indices().await {
        Ok(_) => retriever.search_image(&args.image_path, args.k).await,
        Err(e) => Err(e),
    };

    match results {
        Ok(results) if results.is_empty() => {
            "No similar restaurants found for the provided image.".to_string()
        }
        Ok(results) => serde_json::to_string_pretty(&results)
            .unwrap_or_else(|e| format!("Error retrieving similar restaurants: {}", e)),
        Err(e) => {
            warn!("{} failed: {}", NAME, e);
            format!("Error retrieving similar restaurants: {}", e)
        }
    }
}
