//! `rag_text_search`: restaurants matching a text query.

use super::default_k;
use crate::inference::ToolSpec;
use crate::retriever::MultimodalRetriever;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

pub const NAME: &str = "rag_text_search";

const DESCRIPTION: &str = "Search for restaurants using text-based queries. \
Use this tool when the user asks about restaurants by cuisine type, location, \
ratings, price, or other text-based criteria. Returns detailed restaurant information \
including name, cuisine, rating, location, and address.";

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RagTextArgs {
    pub query: String,
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
                "query": {
                    "type": "string",
                    "description": "The text search query for finding restaurants. Examples: 'Italian restaurants in Philadelphia', 'Best pizza places with high ratings', 'Sushi restaurants near downtown'"
                },
                "k": {
                    "type": "integer",
                    "description": "Number of restaurant results to return (default: 5)",
                    "default": 5
                }
            },
            "required": ["query"]
        }),
    }
}

pub async fn run(retriever: &MultimodalRetriever, args: RagTextArgs) -> String {
    let results = match retriever.load_indices().await {
        Ok(_) => retriever.search_text(&args.query, args.k).await,
        Err(e) => Err(e),
    };

    match results {
        Ok(results) if results.is_empty() => "No restaurants found matching your query.".to_string(),
        Ok(results) => serde_json::to_string_pretty(&results)
            .unwrap_or_else(|e| format!("Error retrieving restaurants: {}", e)),
        Err(e) => {
            warn!("{} failed: {}", NAME, e);
            format!("Error retrieving restaurants: {}", e)
        }
    }
}
