use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    User {
        content: String,
    },
    Assistant {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        name: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::User { content }
            | Message::Assistant { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Message::Assistant { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    /// An assistant message that asks for no further tools.
    pub fn is_final_answer(&self) -> bool {
        matches!(self, Message::Assistant { tool_calls, .. } if tool_calls.is_empty())
    }
}

// Banner-style rendering used when streaming steps to the log.
impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = match self {
            Message::User { .. } => "Human Message",
            Message::Assistant { .. } => "Ai Message",
            Message::Tool { .. } => "Tool Message",
        };
        writeln!(f, "{:=^64}", format!(" {} ", title))?;

        if let Message::Tool { name, .. } = self {
            writeln!(f, "Name: {}", name)?;
        }
        if !self.content().is_empty() {
            writeln!(f, "{}", self.content())?;
        }
        let calls = self.tool_calls();
        if !calls.is_empty() {
            writeln!(f, "Tool Calls:")?;
            for call in calls {
                writeln!(f, "  {} ({})", call.name, call.id)?;
                writeln!(f, "  Args: {}", call.arguments)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn final_answer_means_no_tool_calls() {
        assert!(Message::assistant("done").is_final_answer());
        assert!(!Message::user("hi").is_final_answer());

        let asking = Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "get_fruit_price".into(),
                arguments: json!({ "fruit_name": "apples" }),
            }],
        };
        assert!(!asking.is_final_answer());
    }

    #[test]
    fn rendering_lists_tool_calls() {
        let msg = Message::Assistant {
            content: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "get_fruit_price".into(),
                arguments: json!({ "fruit_name": "apples" }),
            }],
        };
        let text = msg.to_string();
        assert!(text.contains("Ai Message"));
        assert!(text.contains("get_fruit_price (call_1)"));
        assert!(text.contains("apples"));
    }

    #[test]
    fn serializes_with_role_tag() {
        let value = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(value, json!({ "role": "user", "content": "hello" }));
    }
}
