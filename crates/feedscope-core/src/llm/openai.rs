use crate::error::FeedError;
use crate::llm::traits::*;
use crate::tools::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Client for any OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
}

impl OpenAIClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com".to_string(),
            temperature: 0.1,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, FeedError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_tool_defs(&self, tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }

    fn build_messages(&self, messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|m| match m.role {
                Role::Tool => serde_json::json!({
                    "role": "tool",
                    "tool_call_id": m.tool_call_id,
                    "content": m.content,
                }),
                Role::Assistant if !m.invocations().is_empty() => {
                    let tcs: Vec<Value> = m
                        .invocations()
                        .iter()
                        .map(|tc| {
                            serde_json::json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.function.name,
                                    "arguments": tc.function.arguments,
                                }
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "role": "assistant",
                        "content": m.content,
                        "tool_calls": tcs,
                    })
                }
                _ => serde_json::json!({
                    "role": m.role,
                    "content": m.content,
                }),
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "default_call_type")]
    call_type: String,
    function: OpenAIFunction,
}

fn default_call_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct OpenAIFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<Value>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[async_trait::async_trait]
impl LlmClient for OpenAIClient {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LlmResponse, FeedError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request_body = OpenAIRequest {
            model: self.model.clone(),
            messages: self.build_messages(messages),
            temperature: self.temperature,
            tools: if tools.is_empty() {
                None
            } else {
                Some(self.build_tool_defs(tools))
            },
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            "sending chat completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            return Err(FeedError::Llm(format!(
                "OpenAI API error ({}): {}",
                status, response_text
            )));
        }

        parse_response(&response_text)
    }
}

fn parse_response(body: &str) -> Result<LlmResponse, FeedError> {
    let api_response: OpenAIResponse = serde_json::from_str(body)
        .map_err(|e| FeedError::Llm(format!("Failed to parse response: {e}")))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| FeedError::Llm("No response from API".into()))?;

    let content = choice.message.content.unwrap_or_default();

    let tool_calls: Vec<ToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            call_type: tc.call_type,
            function: FunctionCall {
                name: tc.function.name,
                arguments: tc.function.arguments,
            },
        })
        .collect();

    let message = if tool_calls.is_empty() {
        Message::assistant(content)
    } else {
        Message::assistant_with_tools(content, tool_calls)
    };

    Ok(LlmResponse {
        message,
        usage: api_response.usage.map(|u| Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_maps_tool_roles() {
        let client = OpenAIClient::new("key");
        let messages = vec![
            Message::system("sys"),
            Message::user("hi"),
            Message::assistant_with_tools("", vec![ToolCall::function("call_1", "encoder_get_params", "{}")]),
            Message::tool_result("call_1", "{\"ok\":true}"),
            Message::assistant("done"),
        ];

        let built = client.build_messages(&messages);

        assert_eq!(built[0]["role"], "system");
        assert_eq!(built[1]["role"], "user");
        assert_eq!(built[2]["role"], "assistant");
        assert_eq!(built[2]["tool_calls"][0]["id"], "call_1");
        assert_eq!(built[2]["tool_calls"][0]["function"]["name"], "encoder_get_params");
        assert_eq!(built[3]["role"], "tool");
        assert_eq!(built[3]["tool_call_id"], "call_1");
        assert!(built[4].get("tool_calls").is_none());
    }

    #[test]
    fn test_parse_tool_call_response() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_9", "type": "function",
                 "function": {"name": "feeds_search", "arguments": "{\"top_k\":2}"}}
            ]}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 14}
        }"#;

        let response = parse_response(body).unwrap();
        assert!(response.has_tool_calls());
        assert_eq!(response.message.content, "");
        assert_eq!(response.message.invocations()[0].function.name, "feeds_search");
        assert_eq!(response.usage.unwrap().input_tokens, 120);
    }

    #[test]
    fn test_parse_plain_answer_with_null_tool_calls() {
        let body = r#"{"choices": [{"message": {"content": "Two feeds.", "tool_calls": null}}]}"#;
        let response = parse_response(body).unwrap();
        assert!(!response.has_tool_calls());
        assert_eq!(response.message.content, "Two feeds.");
    }

    #[test]
    fn test_parse_empty_choices_is_llm_error() {
        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, FeedError::Llm(_)));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = OpenAIClient::new("key").with_base_url("http://localhost:11434/");
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
