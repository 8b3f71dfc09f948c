use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestToolMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolType, CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::config::ModelConfig;
use crate::error::AgentError;
use crate::message::{Message, ToolCall};
use crate::registry::ToolDescriptor;

/// A chat model that answers with exactly one assistant message per call.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Message, AgentError>;
}

pub struct Brain {
    client: Client<OpenAIConfig>,
    config: ModelConfig,
}

impl Brain {
    pub fn new(config: ModelConfig) -> Self {
        let openai = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.base_url.clone());
        let client = Client::with_config(openai);

        if config.is_vision() {
            info!("Using vision model: {} with virtual key", config.model);
        } else {
            info!("Using text model: {} with virtual key", config.model);
        }
        Self { client, config }
    }
}

#[async_trait]
impl ChatModel for Brain {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Message, AgentError> {
        let request = build_request(&self.config, messages, tools).map_err(model_error)?;

        let response = self.client.chat().create(request).await.map_err(model_error)?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Model("response contained no choices".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                // Invalid JSON arguments become an empty object.
                arguments: serde_json::from_str(&call.function.arguments)
                    .unwrap_or_else(|_| Value::Object(Default::default())),
            })
            .collect();

        Ok(Message::Assistant {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

// LiteLLM and vLLM read the classic `max_tokens` field, not `max_completion_tokens`.
#[allow(deprecated)]
fn build_request(
    config: &ModelConfig,
    messages: &[Message],
    tools: &[ToolDescriptor],
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let request_messages = messages
        .iter()
        .map(to_request_message)
        .collect::<Result<Vec<_>, _>>()?;

    let mut builder = CreateChatCompletionRequestArgs::default();
    builder
        .model(&config.model)
        .messages(request_messages)
        .temperature(config.temperature)
        .max_tokens(config.max_tokens);
    if !tools.is_empty() {
        let openai_tools = tools
            .iter()
            .map(to_openai_tool)
            .collect::<Result<Vec<_>, _>>()?;
        builder.tools(openai_tools);
    }
    builder.build()
}

fn model_error(e: OpenAIError) -> AgentError {
    AgentError::Model(e.to_string())
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let converted: ChatCompletionRequestMessage = match message {
        Message::User { content } => ChatCompletionRequestUserMessageArgs::default()
            .content(content.as_str())
            .build()?
            .into(),
        Message::Assistant {
            content,
            tool_calls,
        } => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            builder.content(content.as_str());
            if !tool_calls.is_empty() {
                builder.tool_calls(
                    tool_calls
                        .iter()
                        .map(|call| ChatCompletionMessageToolCall {
                            id: call.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: call.name.clone(),
                                arguments: call.arguments.to_string(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            builder.build()?.into()
        }
        Message::Tool {
            call_id, content, ..
        } => ChatCompletionRequestToolMessageArgs::default()
            .content(content.as_str())
            .tool_call_id(call_id.as_str())
            .build()?
            .into(),
    };
    Ok(converted)
}

fn to_openai_tool(tool: &ToolDescriptor) -> Result<ChatCompletionTool, OpenAIError> {
    ChatCompletionToolArgs::default()
        .r#type(ChatCompletionToolType::Function)
        .function(
            FunctionObjectArgs::default()
                .name(&tool.name)
                .description(&tool.description)
                .parameters(tool.parameters.clone())
                .build()?,
        )
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assistant_tool_calls_survive_conversion() {
        let message = Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "get_fruit_price".into(),
                arguments: json!({ "fruit_name": "apples" }),
            }],
        };

        let converted = to_request_message(&message).unwrap();
        let value = serde_json::to_value(&converted).unwrap();
        assert_eq!(value["role"], "assistant");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "get_fruit_price");
        assert_eq!(
            value["tool_calls"][0]["function"]["arguments"],
            "{\"fruit_name\":\"apples\"}"
        );
    }

    #[test]
    fn tool_results_reference_their_call() {
        let message = Message::Tool {
            call_id: "call_1".into(),
            name: "get_fruit_price".into(),
            content: "Price for apples is $2.99 per kg".into(),
        };
        let value = serde_json::to_value(to_request_message(&message).unwrap()).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
    }

    #[test]
    fn descriptors_become_function_tools() {
        let tool = ToolDescriptor {
            name: "get_fruit_price".into(),
            description: "Get price".into(),
            parameters: json!({ "type": "object" }),
        };
        let value = serde_json::to_value(to_openai_tool(&tool).unwrap()).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "get_fruit_price");
    }

    #[test]
    fn request_carries_sampling_settings() {
        let config = ModelConfig {
            api_key: "sk-test".into(),
            base_url: "http://localhost:4000".into(),
            model: "qwen3-vllm".into(),
            temperature: 0.0,
            max_tokens: 1500,
        };
        let request = build_request(&config, &[Message::user("apples?")], &[]).unwrap();
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "qwen3-vllm");
        assert_eq!(value["max_tokens"], 1500);
        assert_eq!(value["temperature"], 0.0);
        assert!(value.get("max_completion_tokens").is_none());
        assert!(value.get("tools").is_none());
    }
}
