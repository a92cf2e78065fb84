//! Integration tests for FoodFinder
//!
//! Note: the CLIP models are downloaded on first use, so tests that need
//! them are marked with #[ignore]. Run them with: cargo test -- --ignored

mod common;

use foodfinder_agents::inference::{ChatMessage, ChatModel, ToolCall, ToolSpec};
use foodfinder_agents::{
    AgentEvent, BuildPlan, FoodFinderAgent, Indexer, Result, ToolDispatch, Toolkit,
};
use foodfinder_core::TextMode;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

struct ScriptedModel {
    replies: Mutex<VecDeque<ChatMessage>>,
}

impl ChatModel for ScriptedModel {
    async fn complete(&self, _messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<ChatMessage> {
        assert_eq!(tools.len(), 3);
        Ok(self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ChatMessage::assistant("done")))
    }
}

/// Build the text index over the sample restaurants and return a toolkit
async fn indexed_toolkit(server_uri: &str) -> Toolkit {
    let repo = common::create_test_repo().await;
    let indexer = Indexer::new(
        repo.clone(),
        foodfinder_agents::TeiClient::new(server_uri),
        foodfinder_agents::ClipEncoder::new(std::env::temp_dir()),
    );

    let restaurants = common::sample_restaurants();
    let plan = BuildPlan::decide(true, false, false, &repo.stats().await.unwrap());
    let report = indexer
        .run(&plan, &restaurants, TextMode::Rich, None)
        .await
        .expect("Failed to build text index");
    assert_eq!(report.text, Some(3));

    Toolkit::new(common::retriever(repo, server_uri))
}

#[tokio::test]
async fn test_text_search_tool_over_built_index() {
    let server = common::mock_tei(3).await;
    let toolkit = indexed_toolkit(&server.uri()).await;

    let output = toolkit
        .invoke("rag_text_search", &json!({"query": "pizza in Philadelphia", "k": 2}))
        .await;

    let results: Vec<Value> = serde_json::from_str(&output).expect("tool output is JSON");
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result["name"].is_string());
        assert!(result["rating"].is_number());
    }
}

#[tokio::test]
async fn test_text_search_tool_without_index() {
    let server = common::mock_tei(1).await;
    let repo = common::create_test_repo().await;
    let toolkit = Toolkit::new(common::retriever(repo, &server.uri()));

    let output = toolkit
        .invoke("rag_text_search", &json!({"query": "sushi"}))
        .await;

    assert!(output.starts_with("Error retrieving restaurants: "));
    assert!(output.contains("build-indices"));
}

#[tokio::test]
async fn test_image_search_tool_with_missing_file() {
    let server = common::mock_tei(3).await;
    let toolkit = indexed_toolkit(&server.uri()).await;

    let output = toolkit
        .invoke("rag_image_search", &json!({"image_path": "/nope/dish.png"}))
        .await;

    assert!(output.starts_with("Error retrieving similar restaurants: "));
}

#[tokio::test]
async fn test_agent_uses_tools_end_to_end() {
    let server = common::mock_tei(3).await;
    let toolkit = indexed_toolkit(&server.uri()).await;

    let model = ScriptedModel {
        replies: Mutex::new(VecDeque::from(vec![
            ChatMessage::assistant_tool_calls(vec![ToolCall::new(
                "call_1",
                "rag_text_search",
                json!({"query": "vietnamese soup", "k": 1}),
            )]),
            ChatMessage::assistant("Pho Saigon is a good bet."),
        ])),
    };
    let agent = FoodFinderAgent::new(model, toolkit);

    let mut tool_outputs = Vec::new();
    let answer = agent
        .run_streaming("Where can I get pho?", |event| {
            if let AgentEvent::ToolResult { output, .. } = event {
                tool_outputs.push(output);
            }
        })
        .await
        .expect("agent run failed");

    assert_eq!(answer.answer, "Pho Saigon is a good bet.");
    assert_eq!(tool_outputs.len(), 1);
    let results: Vec<Value> = serde_json::from_str(&tool_outputs[0]).unwrap();
    assert_eq!(results.len(), 1);
}

/// Needs the CLIP models (downloaded on first run)
#[tokio::test]
#[ignore]
async fn test_clip_labels_share_space() {
    let clip = foodfinder_agents::ClipEncoder::default_local();
    let labels = vec!["a pizza".to_string(), "a bowl of soup".to_string()];

    let embeddings = clip.embed_labels(&labels).await.expect("CLIP failed");

    assert_eq!(embeddings.len(), 2);
    assert_eq!(embeddings[0].len(), foodfinder_db::schema::IMAGE_DIMENSION);
}
