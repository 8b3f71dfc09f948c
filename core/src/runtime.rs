use async_stream::try_stream;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::DEFAULT_RECURSION_LIMIT;
use crate::error::AgentError;
use crate::llm::ChatModel;
use crate::message::Message;
use crate::registry::{ToolDescriptor, ToolSource};
use crate::trace::RunObserver;

pub const NEED_MORE_STEPS: &str = "Sorry, need more steps to process this request.";

#[derive(Debug, Clone, Serialize)]
pub struct Step {
    pub index: usize,
    pub message: Message,
    pub at: DateTime<Utc>,
}

impl Step {
    fn new(index: usize, message: Message) -> Self {
        Self {
            index,
            message,
            at: Utc::now(),
        }
    }
}

// Handed to observers when a run ends, failed or not.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub name: String,
    pub model: String,
    pub input: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub steps: Vec<Step>,
    pub answer: Option<String>,
    pub error: Option<String>,
}

/// A ReAct-style agent: the model either answers or asks for tools, tool
/// results are fed back, and the loop repeats until a tool-free answer.
///
/// Each model call and each round of tool execution counts as one step.
/// The loop never takes more than `recursion_limit` steps.
pub struct Agent {
    model: Arc<dyn ChatModel>,
    tools: Arc<dyn ToolSource>,
    recursion_limit: usize,
    run_name: String,
    observers: Vec<Arc<dyn RunObserver>>,
}

impl Agent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<dyn ToolSource>) -> Self {
        Self {
            model,
            tools,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            run_name: "agent".to_string(),
            observers: Vec::new(),
        }
    }

    pub fn with_recursion_limit(mut self, limit: usize) -> Self {
        self.recursion_limit = limit.max(1);
        self
    }

    pub fn with_run_name(mut self, name: impl Into<String>) -> Self {
        self.run_name = name.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_observers<I>(mut self, observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn RunObserver>>,
    {
        self.observers.extend(observers);
        self
    }

    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Stream the invocation as it happens, starting with the user message.
    ///
    /// The stream ends after the first tool-free assistant message. A model
    /// turn that asks for tools without room for another tool round and model
    /// turn is replaced by [`NEED_MORE_STEPS`].
    pub fn stream<'a>(
        &'a self,
        prompt: &'a str,
    ) -> impl Stream<Item = Result<Step, AgentError>> + Send + 'a {
        try_stream! {
            let tools = self.tools.tools().to_vec();
            let mut history = vec![Message::user(prompt)];
            let mut index = 0;
            let mut steps = 0;
            yield Step::new(index, history[0].clone());

            loop {
                steps += 1;
                debug!("{}: model turn (step {}/{})", self.run_name, steps, self.recursion_limit);

                let mut reply = self.model.complete(&history, &tools).await?;
                // A tool round plus one more model turn needs two steps.
                let remaining = self.recursion_limit.saturating_sub(steps);
                if !reply.tool_calls().is_empty() && remaining < 2 {
                    warn!(
                        "{}: step ceiling of {} reached, forcing a final answer",
                        self.run_name, self.recursion_limit
                    );
                    reply = Message::assistant(NEED_MORE_STEPS);
                }
                let calls = reply.tool_calls().to_vec();
                history.push(reply.clone());
                index += 1;
                yield Step::new(index, reply);

                if calls.is_empty() {
                    break;
                }
                steps += 1;

                for call in calls {
                    debug!("{}: calling tool '{}' with {}", self.run_name, call.name, call.arguments);
                    let content = if tools.iter().any(|t| t.name == call.name) {
                        match self.tools.call(&call.name, call.arguments.clone()).await {
                            Ok(output) => output,
                            Err(e) => {
                                warn!("Tool '{}' failed: {}", call.name, e);
                                format!("Error: {}", e)
                            }
                        }
                    } else {
                        format!("Error: {} is not a valid tool, try one of [{}].", call.name, tool_names(&tools))
                    };

                    let result = Message::Tool {
                        call_id: call.id,
                        name: call.name,
                        content,
                    };
                    history.push(result.clone());
                    index += 1;
                    yield Step::new(index, result);
                }
            }
        }
    }

    pub async fn run(&self, prompt: &str) -> Result<String, AgentError> {
        let mut record = RunRecord {
            id: Uuid::new_v4(),
            name: self.run_name.clone(),
            model: self.model.name().to_string(),
            input: prompt.to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            steps: Vec::new(),
            answer: None,
            error: None,
        };

        let mut final_answer = String::new();
        let mut failure = None;
        {
            let stream = self.stream(prompt);
            futures::pin_mut!(stream);
            while let Some(item) = stream.next().await {
                match item {
                    Ok(step) => {
                        for observer in &self.observers {
                            observer.on_step(&self.run_name, &step);
                        }
                        if step.message.is_final_answer() {
                            final_answer = step.message.content().to_string();
                        }
                        record.steps.push(step);
                    }
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
        }

        record.finished_at = Utc::now();
        let outcome = match failure {
            Some(e) => {
                record.error = Some(e.to_string());
                Err(e)
            }
            None => {
                record.answer = Some(final_answer.clone());
                Ok(final_answer)
            }
        };
        for observer in &self.observers {
            observer.on_end(&record);
        }
        outcome
    }
}

fn tool_names(tools: &[ToolDescriptor]) -> String {
    tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ToolCall;
    use crate::registry::{StaticTools, ToolDescriptor};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fruit_tools() -> Arc<dyn ToolSource> {
        Arc::new(StaticTools::new().with_tool(
            ToolDescriptor {
                name: "get_fruit_price".into(),
                description: "Get price with the fruit_name passed in as parameter.".into(),
                parameters: json!({
                    "type": "object",
                    "properties": { "fruit_name": { "type": "string" } },
                    "required": ["fruit_name"]
                }),
            },
            |args| {
                format!(
                    "Price for {} is $2.99 per kg",
                    args["fruit_name"].as_str().unwrap_or_default()
                )
            },
        ))
    }

    fn price_call(id: &str, tool: &str) -> Message {
        Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: id.into(),
                name: tool.into(),
                arguments: json!({ "fruit_name": "apples" }),
            }],
        }
    }

    /// Asks for the price once, then repeats the tool output.
    struct PriceModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for PriceModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(
            &self,
            messages: &[Message],
            _tools: &[ToolDescriptor],
        ) -> Result<Message, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match messages.last() {
                Some(Message::Tool { content, .. }) => {
                    Ok(Message::assistant(format!("Apples: {}", content)))
                }
                _ => Ok(price_call("call_1", "get_fruit_price")),
            }
        }
    }

    /// Never stops asking for tools.
    struct LoopingModel {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChatModel for LoopingModel {
        fn name(&self) -> &str {
            "looping"
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _tools: &[ToolDescriptor],
        ) -> Result<Message, AgentError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(price_call(&format!("call_{}", n), "get_fruit_price"))
        }
    }

    #[derive(Default)]
    struct Recorder {
        steps: Mutex<Vec<usize>>,
        ended: Mutex<Option<RunRecord>>,
    }

    impl RunObserver for Recorder {
        fn on_step(&self, _run_name: &str, step: &Step) {
            self.steps.lock().unwrap().push(step.index);
        }

        fn on_end(&self, record: &RunRecord) {
            *self.ended.lock().unwrap() = Some(record.clone());
        }
    }

    #[tokio::test]
    async fn streams_messages_in_order() {
        let model = Arc::new(PriceModel {
            calls: AtomicUsize::new(0),
        });
        let agent = Agent::new(model, fruit_tools());

        let steps: Vec<Step> = agent
            .stream("What is the price of apples?")
            .map(|s| s.unwrap())
            .collect()
            .await;

        assert_eq!(steps.len(), 4);
        assert!(matches!(steps[0].message, Message::User { .. }));
        assert_eq!(steps[1].message.tool_calls().len(), 1);
        assert_eq!(
            steps[2].message,
            Message::Tool {
                call_id: "call_1".into(),
                name: "get_fruit_price".into(),
                content: "Price for apples is $2.99 per kg".into(),
            }
        );
        assert!(steps[3].message.is_final_answer());
        let indexes: Vec<usize> = steps.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn run_returns_final_answer_and_notifies_observers() {
        let model = Arc::new(PriceModel {
            calls: AtomicUsize::new(0),
        });
        let recorder = Arc::new(Recorder::default());
        let agent = Agent::new(model.clone(), fruit_tools())
            .with_run_name("fruit_agent")
            .with_observer(recorder.clone());

        let answer = agent.run("What is the price of apples?").await.unwrap();
        assert_eq!(answer, "Apples: Price for apples is $2.99 per kg");
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);

        assert_eq!(*recorder.steps.lock().unwrap(), vec![0, 1, 2, 3]);
        let record = recorder.ended.lock().unwrap().clone().unwrap();
        assert_eq!(record.name, "fruit_agent");
        assert_eq!(record.model, "scripted");
        assert_eq!(record.answer.as_deref(), Some(answer.as_str()));
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn step_ceiling_forces_a_final_answer() {
        let model = Arc::new(LoopingModel {
            calls: AtomicUsize::new(0),
        });
        let recorder = Arc::new(Recorder::default());
        let agent = Agent::new(model.clone(), fruit_tools()).with_observer(recorder.clone());
        assert_eq!(agent.recursion_limit(), 25);

        let answer = agent.run("What is the price of apples?").await.unwrap();
        assert_eq!(answer, NEED_MORE_STEPS);

        // 13 model turns and 12 tool rounds fill the 25 steps.
        assert_eq!(model.calls.load(Ordering::SeqCst), 13);
        let record = recorder.ended.lock().unwrap().clone().unwrap();
        // user + 12 tool-calling turns + 12 tool results + forced answer
        assert_eq!(record.steps.len(), 26);
        assert_eq!(record.steps.iter().filter(|s| matches!(s.message, Message::Tool { .. })).count(), 12);
        assert!(record.steps.last().unwrap().message.is_final_answer());
        assert_eq!(record.answer.as_deref(), Some(NEED_MORE_STEPS));
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn tiny_ceiling_answers_without_calling_tools() {
        let model = Arc::new(LoopingModel {
            calls: AtomicUsize::new(0),
        });
        let agent = Agent::new(model.clone(), fruit_tools()).with_recursion_limit(2);

        let steps: Vec<Step> = agent
            .stream("price?")
            .map(|s| s.unwrap())
            .collect()
            .await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].message, Message::assistant(NEED_MORE_STEPS));
    }

    #[tokio::test]
    async fn unknown_tools_are_reported_back_to_the_model() {
        struct WrongToolModel;

        #[async_trait]
        impl ChatModel for WrongToolModel {
            fn name(&self) -> &str {
                "wrong"
            }

            async fn complete(
                &self,
                messages: &[Message],
                _tools: &[ToolDescriptor],
            ) -> Result<Message, AgentError> {
                match messages.last() {
                    Some(Message::Tool { content, .. }) => Ok(Message::assistant(content.clone())),
                    _ => Ok(price_call("call_1", "get_vegetable_price")),
                }
            }
        }

        let agent = Agent::new(Arc::new(WrongToolModel), fruit_tools());
        let answer = agent.run("price?").await.unwrap();
        assert!(answer.starts_with("Error: get_vegetable_price is not a valid tool"));
        assert!(answer.contains("get_fruit_price"));
    }

    #[tokio::test]
    async fn model_failure_ends_the_run() {
        struct BrokenModel;

        #[async_trait]
        impl ChatModel for BrokenModel {
            fn name(&self) -> &str {
                "broken"
            }

            async fn complete(
                &self,
                _messages: &[Message],
                _tools: &[ToolDescriptor],
            ) -> Result<Message, AgentError> {
                Err(AgentError::Model("connection refused".into()))
            }
        }

        let agent = Agent::new(Arc::new(BrokenModel), fruit_tools()).with_recursion_limit(3);
        let err = agent.run("price?").await.unwrap_err();
        assert_eq!(err.kind(), "model");
    }
}
