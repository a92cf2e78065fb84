//! FoodFinder ReAct agent.
//!
//! The model reasons, asks for tools, sees their output and repeats until it
//! answers without a tool call.

use crate::inference::{ChatMessage, ChatModel};
use crate::tools::ToolDispatch;
use crate::{AgentError, Result};
use serde_json::Value;
use tracing::{debug, info, instrument};

pub const DEFAULT_MAX_STEPS: usize = 25;

pub const SYSTEM_PROMPT: &str = r#"You are a helpful restaurant recommendation assistant with access to specialized tools.

You have access to the following tools:
- rag_text_search: Search for restaurants using text queries (cuisine, location, ratings, etc.)
- rag_image_search: Find similar restaurants based on food/restaurant images
- image_qa: Answer questions about specific images (cuisine type, dish description, etc.)

Follow the ReAct (Reasoning + Acting) pattern:
1. REASON about what information you need to answer the user's question
2. ACT by calling the appropriate tool(s)
3. OBSERVE the results from the tools
4. REPEAT if you need more information, or provide a final answer

**IMPORTANT - Tool Combination Strategy:**

When the user uploads an image and asks to find restaurants:
1. First, use `rag_image_search` to find visually similar restaurants
2. OBSERVE the results - they will be in JSON format with restaurant names
3. If the JSON results lack complete information (missing details like full address, hours, reviews, etc.):
   - Extract the restaurant names from the image search results
   - Use `rag_text_search` with those restaurant names to get complete details
   - Combine both results for a comprehensive answer

Example workflow:
- User uploads pizza image and asks "Find similar restaurants"
- Step 1: Call rag_image_search(image_path, k=5) to get 5 similar restaurants with names
- Step 2: Observe results - if they only have basic info (name, cuisine, rating)
- Step 3: Call rag_text_search("Restaurant Name 1") to get full details
- Step 4: Combine visual similarity scores with detailed information
- Step 5: Provide comprehensive recommendation

When you have enough information, provide a comprehensive and enthusiastic recommendation.
The tool results are in JSON format - parse them to extract relevant details like name, cuisine, rating, location, etc.

Be conversational and helpful!"#;

/// Progress reported while the agent works
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The model is being asked for step `n` (1-based)
    Thinking(usize),
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, output: String },
    /// Assistant text, intermediate or final
    Message(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentAnswer {
    pub answer: String,
    /// The conversation without the system prompt: history, the query,
    /// every assistant turn and every tool result
    pub messages: Vec<ChatMessage>,
}

pub struct FoodFinderAgent<M, T> {
    model: M,
    tools: T,
    system_prompt: String,
    max_steps: usize,
}

impl<M: ChatModel, T: ToolDispatch> FoodFinderAgent<M, T> {
    pub fn new(model: M, tools: T) -> Self {
        Self {
            model,
            tools,
            system_prompt: SYSTEM_PROMPT.to_string(),
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn tools(&self) -> &T {
        &self.tools
    }

    /// Answer a single query
    pub async fn run(&self, query: &str) -> Result<AgentAnswer> {
        self.run_streaming(query, |_| {}).await
    }

    /// Answer a single query, reporting progress as it happens
    pub async fn run_streaming<F>(&self, query: &str, on_event: F) -> Result<AgentAnswer>
    where
        F: FnMut(AgentEvent),
    {
        self.run_conversation(&[], query, on_event).await
    }

    /// Answer a query that follows earlier turns of a conversation
    #[instrument(skip(self, history, on_event), fields(history = history.len()))]
    pub async fn run_conversation<F>(
        &self,
        history: &[ChatMessage],
        query: &str,
        mut on_event: F,
    ) -> Result<AgentAnswer>
    where
        F: FnMut(AgentEvent),
    {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        messages.extend(history.iter().cloned());
        messages.push(ChatMessage::user(query));

        let specs = self.tools.specs();

        for step in 1..=self.max_steps {
            on_event(AgentEvent::Thinking(step));
            let reply = self.model.complete(&messages, &specs).await?;

            if !reply.has_tool_calls() {
                let answer = reply.text().to_string();
                info!("Answered after {} step(s)", step);
                on_event(AgentEvent::Message(answer.clone()));
                messages.push(reply);
                messages.remove(0);
                return Ok(AgentAnswer { answer, messages });
            }

            if !reply.text().trim().is_empty() {
                on_event(AgentEvent::Message(reply.text().to_string()));
            }

            let calls = reply.tool_calls.clone();
            messages.push(reply);

            for call in calls {
                let name = call.name().to_string();
                let output = match call.arguments() {
                    Ok(arguments) => {
                        on_event(AgentEvent::ToolCall {
                            name: name.clone(),
                            arguments: arguments.clone(),
                        });
                        self.tools.invoke(&name, &arguments).await
                    }
                    Err(e) => {
                        on_event(AgentEvent::ToolCall {
                            name: name.clone(),
                            arguments: Value::String(call.function.arguments.clone()),
                        });
                        format!("Error: {}", e)
                    }
                };
                debug!("{} returned {} chars", name, output.len());

                on_event(AgentEvent::ToolResult {
                    name,
                    output: output.clone(),
                });
                messages.push(ChatMessage::tool(call.id, output));
            }
        }

        Err(AgentError::StepLimit(self.max_steps))
    }
}
